//! Score comparison across runs

use serde::{Deserialize, Serialize};

use crate::eval::ResultRecord;
use crate::scorer::ScoreRecord;

/// How a score moved relative to the previous run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScoreState {
    Improved,
    Regressed,
    Unchanged,
    /// No previous run to compare against
    FirstRun,
}

/// Compare a score with the previous run's score using strict ordering
pub fn score_state(current: f64, previous: Option<f64>) -> ScoreState {
    score_state_with_tolerance(current, previous, 0.0)
}

/// Compare a score with the previous run's score.
///
/// Differences within `tolerance` count as unchanged. Comparisons involving
/// NaN are never ordered and so also report unchanged.
pub fn score_state_with_tolerance(
    current: f64,
    previous: Option<f64>,
    tolerance: f64,
) -> ScoreState {
    let Some(previous) = previous else {
        return ScoreState::FirstRun;
    };

    let delta = current - previous;
    if delta > tolerance {
        ScoreState::Improved
    } else if delta < -tolerance {
        ScoreState::Regressed
    } else {
        ScoreState::Unchanged
    }
}

/// Mean of a row's scores.
///
/// A failed score (no value) counts as zero. `None` when there are no
/// scores at all.
pub fn average_score(scores: &[ScoreRecord]) -> Option<f64> {
    if scores.is_empty() {
        return None;
    }
    let sum: f64 = scores.iter().map(|s| s.score.unwrap_or(0.0)).sum();
    Some(sum / scores.len() as f64)
}

/// State of one named score on a row against the same row of a previous run.
///
/// The previous score is looked up by scorer name, so scorers added since the
/// previous run report [`ScoreState::FirstRun`]. A failed score compares as
/// zero.
pub fn score_state_for(
    current: &ResultRecord,
    previous: Option<&ResultRecord>,
    scorer: &str,
    tolerance: f64,
) -> Option<ScoreState> {
    let score = current.score_named(scorer)?.score.unwrap_or(0.0);
    let previous = previous
        .and_then(|p| p.score_named(scorer))
        .map(|s| s.score.unwrap_or(0.0));
    Some(score_state_with_tolerance(score, previous, tolerance))
}
