//! Trace reporting
//!
//! Tasks call [`report_trace`] to expose their internal structure (LLM calls,
//! retrieval steps) to the run record. Traces are buffered per task
//! invocation and attached to the row's result once the task returns.
//!
//! # Example
//!
//! ```rust,ignore
//! use evalite_core::trace::{report_trace, TraceEvent};
//!
//! let task = |input: String| async move {
//!     report_trace(
//!         TraceEvent::new(0.0, 100.0, json!([{"role": "input", "content": input}]), json!("abcdef"))
//!             .with_usage(1, 1),
//!     )?;
//!     Ok(format!("{input}def"))
//! };
//! ```

mod collector;
mod event;

pub use collector::{TraceCollector, report_trace};
pub use event::{TokenUsage, TraceEvent};
