//! Trace event types

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Token usage reported for a single trace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

impl TokenUsage {
    /// Create a usage record
    pub fn new(prompt_tokens: u64, completion_tokens: u64) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
        }
    }

    /// Prompt plus completion tokens, saturating at `u64::MAX`
    pub fn total(&self) -> u64 {
        self.prompt_tokens.saturating_add(self.completion_tokens)
    }
}

/// A reported sub-span of work inside one task invocation
///
/// Timestamps are milliseconds on whatever clock the task reports with.
/// `start <= end` is expected but not checked; consumers degrade gracefully
/// when it does not hold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceEvent {
    /// When the traced work started
    #[serde(rename = "start_time")]
    pub start: f64,

    /// When the traced work ended
    #[serde(rename = "end_time")]
    pub end: f64,

    /// Input given to the traced work (e.g. chat messages)
    pub input: Value,

    /// Output produced by the traced work
    pub output: Value,

    /// Token usage, when the traced work reported it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
}

impl TraceEvent {
    /// Create a trace without usage
    pub fn new(start: f64, end: f64, input: Value, output: Value) -> Self {
        Self {
            start,
            end,
            input,
            output,
            usage: None,
        }
    }

    /// Attach token usage
    pub fn with_usage(mut self, prompt_tokens: u64, completion_tokens: u64) -> Self {
        self.usage = Some(TokenUsage::new(prompt_tokens, completion_tokens));
        self
    }

    /// Span length in milliseconds (negative for malformed traces)
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}
