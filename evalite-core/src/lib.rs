//! # Evalite - Evaluation harness for non-deterministic tasks
//!
//! Evalite scores the outputs of LLM-backed (or otherwise non-deterministic)
//! tasks against expected values, run after run, with nested traces for
//! debugging:
//! - Datasets of input/expected rows, produced once per run
//! - Concurrent task execution with per-row scoring
//! - Invocation-scoped trace reporting with timing and token usage
//! - Run history for run-over-run score comparison
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use evalite_core::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let definition = EvaluationDefinition::<String, String, String>::builder("Traces")
//!         .rows(vec![DatasetRow::new("abc".to_string(), "abcdef".to_string())])
//!         .task(|input: String| async move {
//!             report_trace(
//!                 TraceEvent::new(0.0, 100.0, serde_json::json!(input), serde_json::json!("abcdef"))
//!                     .with_usage(1, 1),
//!             )?;
//!             Ok::<_, anyhow::Error>(format!("{input}def"))
//!         })
//!         .scorer(Levenshtein)
//!         .build()?;
//!
//!     let evaluator = Evaluator::new();
//!     let run = evaluator.run_evaluation(&definition).await?;
//!     println!("{:?} in {}ms", run.status, run.duration);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - **Trace**: task-local collector behind the [`trace::report_trace`] free function
//! - **Scorer**: the scoring contract plus Levenshtein and numeric-difference scorers
//! - **Eval**: definitions, the per-row [`eval::TaskRunner`] and the [`eval::Evaluator`]
//! - **History**: run log ordered by start time, in-flight registry and the result read API
//! - **Metrics**: token usage sums, score states and trace timelines

pub mod config;
pub mod error;
pub mod eval;
pub mod fingerprint;
pub mod history;
pub mod metrics;
pub mod scorer;
pub mod trace;

pub use error::{EvalError, Result};

/// Current library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::{ConfigBuilder, EvaliteConfig};
    pub use crate::error::{EvalError, Result};
    pub use crate::eval::{
        Dataset, DatasetRow, EvaluationDefinition, Evaluator, JsonDataset, RenderedColumn,
        ResultRecord, ResultStatus, RunRecord, RunStatus, RunSummary, StaticDataset, Task,
    };
    pub use crate::history::{InMemoryRunHistory, ResultView, RunHistory, RunRegistry};
    pub use crate::metrics::{ScoreState, TimelineSegment, sum_token_usage, timeline};
    pub use crate::scorer::{
        FnScorer, Levenshtein, NumericDifference, Score, ScoreInput, ScoreRecord, Scorer,
    };
    pub use crate::trace::{TokenUsage, TraceEvent, report_trace};
}
