//! Scorers
//!
//! A scorer is a function of `(output, expected)` to a named score,
//! conventionally in `[0, 1]`. The harness never clamps scores: range is the
//! scorer's decision, and non-finite values are passed through as-is.

mod levenshtein;
mod numeric;

pub use levenshtein::Levenshtein;
pub use numeric::NumericDifference;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

/// Arguments handed to a scorer
#[derive(Debug)]
pub struct ScoreInput<'a, O, E> {
    /// Task output for the row
    pub output: &'a O,
    /// Expected value for the row, when the dataset provided one
    pub expected: Option<&'a E>,
}

impl<'a, O, E> ScoreInput<'a, O, E> {
    /// Bundle scorer arguments
    pub fn new(output: &'a O, expected: Option<&'a E>) -> Self {
        Self { output, expected }
    }
}

/// Raw value produced by a scorer
#[derive(Debug, Clone, PartialEq)]
pub struct Score {
    pub score: f64,
    pub metadata: Option<Value>,
}

impl Score {
    /// A score without metadata
    pub fn new(score: f64) -> Self {
        Self {
            score,
            metadata: None,
        }
    }

    /// Attach metadata shown alongside the score
    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// A named score stored on a row
///
/// `score` is `None` only when the scorer failed; `error` then says why.
/// NaN and infinite scores serialize to JSON `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreRecord {
    pub name: String,
    pub score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ScoreRecord {
    /// Record a successful score
    pub fn scored(name: impl Into<String>, description: Option<String>, score: Score) -> Self {
        Self {
            name: name.into(),
            score: Some(score.score),
            description,
            metadata: score.metadata,
            error: None,
        }
    }

    /// Record a scorer failure
    pub fn failed(
        name: impl Into<String>,
        description: Option<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            score: None,
            description,
            metadata: None,
            error: Some(error.into()),
        }
    }

    /// Whether the scorer failed for this row
    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }
}

/// Interface every scorer implements
#[async_trait]
pub trait Scorer<O, E>: Send + Sync {
    /// Name stored on the score record
    fn name(&self) -> &str;

    /// Human-readable description of what the score means
    fn description(&self) -> Option<&str> {
        None
    }

    /// Whether this scorer cannot run without an expected value.
    ///
    /// Evaluations check this before any row runs and refuse to start when a
    /// row has no expected value.
    fn requires_expected(&self) -> bool {
        false
    }

    /// Score one row's output.
    ///
    /// # Errors
    ///
    /// Scorers that require an expected value return
    /// [`EvalError::InvalidScorerInput`](crate::error::EvalError::InvalidScorerInput)
    /// when called without one.
    async fn score(&self, args: ScoreInput<'_, O, E>) -> Result<Score>;
}

/// Adapts a synchronous closure into a [`Scorer`]
pub struct FnScorer<F> {
    name: String,
    description: Option<String>,
    requires_expected: bool,
    scorer: F,
}

impl<F> FnScorer<F> {
    /// Wrap `scorer` under `name`
    pub fn new(name: impl Into<String>, scorer: F) -> Self {
        Self {
            name: name.into(),
            description: None,
            requires_expected: false,
            scorer,
        }
    }

    /// Set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Mark the scorer as needing an expected value
    pub fn requiring_expected(mut self) -> Self {
        self.requires_expected = true;
        self
    }
}

impl<F> std::fmt::Debug for FnScorer<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnScorer")
            .field("name", &self.name)
            .field("requires_expected", &self.requires_expected)
            .finish()
    }
}

#[async_trait]
impl<O, E, F> Scorer<O, E> for FnScorer<F>
where
    O: Sync,
    E: Sync,
    F: for<'a> Fn(ScoreInput<'a, O, E>) -> Result<Score> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    fn requires_expected(&self) -> bool {
        self.requires_expected
    }

    async fn score(&self, args: ScoreInput<'_, O, E>) -> Result<Score> {
        if self.requires_expected && args.expected.is_none() {
            return Err(crate::error::EvalError::missing_expected(&self.name));
        }
        (self.scorer)(args)
    }
}
