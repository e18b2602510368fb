//! Read API consumed by viewers

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::registry::RunRegistry;
use super::storage::RunHistory;
use crate::error::{EvalError, Result};
use crate::eval::{ResultRecord, RunSummary};
use crate::metrics::{ScoreState, Timeline, score_state_for, score_state_with_tolerance, timeline};
use crate::trace::TokenUsage;

/// One row of a run, next to the same row of the run before it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultView {
    pub result: ResultRecord,
    pub prev_result: Option<ResultRecord>,
    pub evaluation: RunSummary,
    /// The view was requested by timestamp and that run is still in flight
    pub is_running: bool,
}

impl ResultView {
    /// Row score against the previous run's row score
    pub fn score_state(&self, tolerance: f64) -> Option<ScoreState> {
        let current = self.result.score()?;
        let previous = self.prev_result.as_ref().and_then(ResultRecord::score);
        Some(score_state_with_tolerance(current, previous, tolerance))
    }

    /// Named score against the previous run's score of the same name
    pub fn scorer_state(&self, scorer: &str, tolerance: f64) -> Option<ScoreState> {
        score_state_for(&self.result, self.prev_result.as_ref(), scorer, tolerance)
    }

    pub fn token_usage(&self) -> Option<TokenUsage> {
        self.result.token_usage()
    }

    pub fn timeline(&self) -> Timeline {
        timeline(&self.result.traces)
    }
}

/// Look up one row of a run.
///
/// Without a timestamp the latest run is used, which may still be running.
/// `prev_result` is the row at the same index in the closest finished run
/// created before the chosen one. `is_running` is only set when the run was
/// requested by its timestamp and the registry still has that run in flight.
///
/// # Errors
///
/// [`EvalError::RunNotFound`] when the evaluation has no run (at that
/// timestamp), [`EvalError::ResultNotFound`] when the index is out of range.
pub async fn get_result(
    history: &dyn RunHistory,
    registry: &RunRegistry,
    eval_name: &str,
    index: usize,
    timestamp: Option<DateTime<Utc>>,
) -> Result<ResultView> {
    let run = match timestamp {
        Some(created_at) => history.run_at(eval_name, created_at).await?,
        None => history.latest(eval_name).await?,
    }
    .ok_or_else(|| EvalError::RunNotFound {
        eval_name: eval_name.to_string(),
    })?;

    let result = run
        .results
        .get(index)
        .cloned()
        .ok_or_else(|| EvalError::ResultNotFound {
            eval_name: eval_name.to_string(),
            index,
        })?;

    let prev_result = history
        .previous(eval_name, run.created_at)
        .await?
        .and_then(|prev| prev.results.into_iter().nth(index));

    let is_running = timestamp == Some(run.created_at)
        && registry.is_running_at(eval_name, run.created_at);

    Ok(ResultView {
        result,
        prev_result,
        evaluation: run.summary(),
        is_running,
    })
}
