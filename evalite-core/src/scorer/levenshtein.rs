use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use super::{Score, ScoreInput, Scorer};
use crate::error::{EvalError, Result};

/// Normalized edit-distance similarity between output and expected.
///
/// Both values are rendered as text and compared as UTF-16 code units:
/// `1 - distance / max(len(output), len(expected))`, and `1` when both
/// strings are empty. Strings (including JSON string values) are compared
/// without quotes; numbers, booleans and null use their JSON spelling, and
/// arrays and objects their compact JSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct Levenshtein;

impl Levenshtein {
    pub const NAME: &'static str = "Levenshtein";

    /// Similarity of two strings in `[0, 1]`
    pub fn similarity(output: &str, expected: &str) -> f64 {
        let output: Vec<u16> = output.encode_utf16().collect();
        let expected: Vec<u16> = expected.encode_utf16().collect();
        let max_len = output.len().max(expected.len());
        if max_len == 0 {
            return 1.0;
        }
        let distance = strsim::generic_levenshtein(&output, &expected);
        1.0 - distance as f64 / max_len as f64
    }

    /// Text a value is compared as
    pub fn render<T: Serialize + ?Sized>(value: &T) -> Result<String> {
        Ok(match serde_json::to_value(value)? {
            Value::String(text) => text,
            other => other.to_string(),
        })
    }
}

#[async_trait]
impl<O, E> Scorer<O, E> for Levenshtein
where
    O: Serialize + Sync,
    E: Serialize + Sync,
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
        Ok(Score::new(Self::similarity(
            &Self::render(args.output)?,
            &Self::render(expected)?,
        )))
    }
}
