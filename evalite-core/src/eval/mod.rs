//! Evaluation execution
//!
//! An [`EvaluationDefinition`] names a dataset, a task and an ordered list of
//! scorers. The [`Evaluator`] runs the task for every row concurrently, each
//! invocation in its own trace scope, scores the outputs and records a
//! [`RunRecord`] whose results keep dataset order.
//!
//! # Example
//!
//! ```rust,no_run
//! use evalite_core::prelude::*;
//!
//! # async fn example() -> evalite_core::Result<()> {
//! let definition = EvaluationDefinition::<String, String, String>::builder("Concat")
//!     .rows(vec![DatasetRow::new("abc".to_string(), "abcdef".to_string())])
//!     .task(|input: String| async move { Ok::<_, anyhow::Error>(format!("{input}def")) })
//!     .scorer(Levenshtein)
//!     .build()?;
//!
//! let evaluator = Evaluator::new();
//! let run = evaluator.run_evaluation(&definition).await?;
//! assert_eq!(run.results[0].scores[0].score, Some(1.0));
//! # Ok(())
//! # }
//! ```

mod definition;
mod orchestrator;
mod record;
mod runner;

pub use definition::{
    ColumnsFn, Dataset, DatasetRow, EvaluationBuilder, EvaluationDefinition, JsonDataset,
    StaticDataset, Task,
};
pub use orchestrator::Evaluator;
pub use record::{RenderedColumn, ResultRecord, ResultStatus, RunRecord, RunStatus, RunSummary};
pub use runner::TaskRunner;

#[cfg(test)]
mod tests;
