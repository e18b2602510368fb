//! Evaluation orchestration
//!
//! [`Evaluator`] produces the dataset once, stores a `running` run record,
//! runs every row concurrently, fills each row in as it completes and
//! finally stores the finished record with results in dataset order.

use chrono::Utc;
use futures::future::join_all;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

use super::definition::{DatasetRow, EvaluationDefinition};
use super::record::{ResultRecord, RunRecord, RunStatus};
use super::runner::{TaskRunner, round_millis};
use crate::config::EvaliteConfig;
use crate::error::{EvalError, Result};
use crate::history::{InMemoryRunHistory, ResultView, RunHistory, RunRegistry, get_result};
use crate::metrics::ScoreState;
use crate::scorer::Scorer;

/// Runs evaluations and serves their results
pub struct Evaluator {
    config: EvaliteConfig,
    history: Arc<dyn RunHistory>,
    registry: RunRegistry,
}

impl Evaluator {
    /// Evaluator with default configuration and in-memory history
    pub fn new() -> Self {
        Self::with_config(EvaliteConfig::default())
    }

    pub fn with_config(config: EvaliteConfig) -> Self {
        let history = match config.history.max_runs_per_eval {
            Some(max) => InMemoryRunHistory::with_retention(max),
            None => InMemoryRunHistory::new(),
        };
        Self {
            config,
            history: Arc::new(history),
            registry: RunRegistry::new(),
        }
    }

    /// Store runs somewhere else
    pub fn with_history(mut self, history: Arc<dyn RunHistory>) -> Self {
        self.history = history;
        self
    }

    pub fn config(&self) -> &EvaliteConfig {
        &self.config
    }

    pub fn history(&self) -> &Arc<dyn RunHistory> {
        &self.history
    }

    pub fn registry(&self) -> &RunRegistry {
        &self.registry
    }

    /// Whether any run of `eval_name` is in flight
    pub fn is_running(&self, eval_name: &str) -> bool {
        self.registry.is_running(eval_name)
    }

    /// Run every row of an evaluation and record the run.
    ///
    /// Once the dataset is validated the run is stored with status
    /// `running` and one placeholder row per dataset row. Rows run
    /// concurrently (bounded by `runner.max_concurrency` when set), each is
    /// stored as it completes, and `results` keeps dataset order. A failing
    /// row marks the run as failed but never stops the other rows.
    ///
    /// # Errors
    ///
    /// [`EvalError::Configuration`] when no scorer is configured or a scorer
    /// needs an expected value that a row lacks, [`EvalError::Dataset`] when
    /// the dataset cannot be produced. No row runs in either case.
    pub async fn run_evaluation<I, O, E>(
        &self,
        definition: &EvaluationDefinition<I, O, E>,
    ) -> Result<RunRecord>
    where
        I: Serialize + Clone + Send + Sync,
        O: Serialize + Send + Sync,
        E: Serialize + Send + Sync,
    {
        let eval_name = definition.name();
        if definition.scorers().is_empty() {
            return Err(EvalError::Configuration(
                "You must provide at least one scorer.".to_string(),
            ));
        }

        let created_at = Utc::now();
        let started = Instant::now();
        let _guard = self.registry.start(eval_name, created_at);

        let rows = definition.dataset().rows().await.map_err(|e| {
            warn!(eval = eval_name, error = %e, "Dataset failed to load");
            EvalError::Dataset(format!("{e:#}"))
        })?;
        check_expected(eval_name, definition.scorers(), &rows)?;

        let mut run = RunRecord {
            id: Uuid::new_v4(),
            eval_name: eval_name.to_string(),
            created_at,
            status: RunStatus::Running,
            results: rows.iter().map(pending_result).collect(),
            duration: 0,
            source_code_hash: definition.source_code_hash().to_string(),
        };
        self.history.append(run.clone()).await?;

        info!(eval = eval_name, run_id = %run.id, rows = rows.len(), "Evaluation started");

        let run_id = run.id;
        let history = &self.history;
        let runner = &TaskRunner::from_config(&self.config.runner);
        let limiter = &self
            .config
            .runner
            .max_concurrency
            .map(|max| Semaphore::new(max.max(1)));
        let results = join_all(rows.iter().enumerate().map(|(index, row)| async move {
            let _permit = match limiter {
                Some(semaphore) => semaphore.acquire().await.ok(),
                None => None,
            };
            let result = runner
                .run(
                    row,
                    definition.task(),
                    definition.scorers(),
                    definition.columns(),
                )
                .await;
            if let Err(err) = history
                .update_result(eval_name, run_id, index, result.clone())
                .await
            {
                warn!(eval = eval_name, index, error = %err, "Failed to store row result");
            }
            result
        }))
        .await;

        run.status = if results.iter().all(|r| r.is_success()) {
            RunStatus::Success
        } else {
            RunStatus::Fail
        };
        run.results = results;
        run.duration = round_millis(started.elapsed());

        info!(
            eval = eval_name,
            run_id = %run.id,
            status = ?run.status,
            failed = run.failed_count(),
            duration_ms = run.duration,
            "Evaluation finished"
        );

        self.history.update(run.clone()).await?;
        Ok(run)
    }

    /// One row of a stored run; see [`get_result`]
    pub async fn get_result(
        &self,
        eval_name: &str,
        index: usize,
        timestamp: Option<chrono::DateTime<Utc>>,
    ) -> Result<ResultView> {
        get_result(
            self.history.as_ref(),
            &self.registry,
            eval_name,
            index,
            timestamp,
        )
        .await
    }
}

impl Evaluator {
    /// Row score state of a view, using the configured tolerance
    pub fn score_state(&self, view: &ResultView) -> Option<ScoreState> {
        view.score_state(self.config.metrics.score_tolerance)
    }
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new()
    }
}

/// Placeholder stored for a row until its task and scorers complete
fn pending_result<I: Serialize, E: Serialize>(row: &DatasetRow<I, E>) -> ResultRecord {
    let input = serde_json::to_value(&row.input).unwrap_or(Value::Null);
    let expected = row
        .expected
        .as_ref()
        .and_then(|expected| serde_json::to_value(expected).ok());
    ResultRecord::running(input, expected)
}

/// Refuse to start when a scorer needs an expected value a row lacks
fn check_expected<I, O, E>(
    eval_name: &str,
    scorers: &[Arc<dyn Scorer<O, E>>],
    rows: &[DatasetRow<I, E>],
) -> Result<()> {
    let Some(scorer) = scorers.iter().find(|s| s.requires_expected()) else {
        return Ok(());
    };
    match rows.iter().position(|row| row.expected.is_none()) {
        Some(index) => Err(EvalError::Configuration(format!(
            "scorer '{}' in evaluation '{}' requires an expected value, but row {} has none",
            scorer.name(),
            eval_name,
            index
        ))),
        None => Ok(()),
    }
}
