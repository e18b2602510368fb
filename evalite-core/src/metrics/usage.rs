//! Token usage totals

use crate::trace::{TokenUsage, TraceEvent};

/// Sum token usage across traces.
///
/// The total is all-or-nothing: `None` when there are no traces, when any
/// trace lacks usage, or when a count overflows `u64`, so a partial or
/// wrapped sum is never presented as the whole.
pub fn sum_token_usage(traces: &[TraceEvent]) -> Option<TokenUsage> {
    if traces.is_empty() {
        return None;
    }

    traces.iter().try_fold(TokenUsage::default(), |total, trace| {
        let usage = trace.usage?;
        Some(TokenUsage::new(
            total.prompt_tokens.checked_add(usage.prompt_tokens)?,
            total.completion_tokens.checked_add(usage.completion_tokens)?,
        ))
    })
}
