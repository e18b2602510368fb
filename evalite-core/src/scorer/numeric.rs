use async_trait::async_trait;

use super::{Score, ScoreInput, Scorer};
use crate::error::{EvalError, Result};

/// Relative numeric closeness: `1 - |output - expected| / expected`.
///
/// There is no guard for `expected == 0`: the division yields `NaN` (output
/// also zero) or an infinity, and that value is the score. Negative scores
/// are possible when the output is far from the expected value.
#[derive(Debug, Clone, Copy, Default)]
pub struct NumericDifference;

impl NumericDifference {
    pub const NAME: &'static str = "NumericDifference";

    /// Score two numbers
    pub fn difference(output: f64, expected: f64) -> f64 {
        1.0 - (output - expected).abs() / expected
    }
}

#[async_trait]
impl<O, E> Scorer<O, E> for NumericDifference
where
    O: Copy + Into<f64> + Sync,
    E: Copy + Into<f64> + Sync,
{
    fn name(&self) -> &str {
        Self::NAME
    }

    fn requires_expected(&self) -> bool {
        true
    }

    async fn score(&self, args: ScoreInput<'_, O, E>) -> Result<Score> {
        let expected = args
            .expected
            .ok_or_else(|| EvalError::missing_expected(Self::NAME))?;
        Ok(Score::new(Self::difference(
            (*args.output).into(),
            (*expected).into(),
        )))
    }
}
