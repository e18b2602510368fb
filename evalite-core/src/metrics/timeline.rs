//! Trace timeline layout

use serde::{Deserialize, Serialize};

use crate::trace::TraceEvent;

/// Position of a trace within its row's timeline, in percent
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimelineSegment {
    pub start_percent: f64,
    pub end_percent: f64,
    /// Trace duration in milliseconds
    pub duration: f64,
}

impl TimelineSegment {
    /// Width of the segment in percent
    pub fn width(&self) -> f64 {
        self.end_percent - self.start_percent
    }
}

/// Layout of all traces of one row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timeline {
    /// Start of the first trace
    pub start: f64,
    /// End of the last trace
    pub end: f64,
    /// One segment per trace, in report order
    pub segments: Vec<TimelineSegment>,
}

impl Timeline {
    /// Total span covered by the row's traces
    pub fn span(&self) -> f64 {
        self.end - self.start
    }
}

/// Place a trace on a row timeline.
///
/// Returns `(start_percent, end_percent)` relative to `row_start`. A zero
/// (or NaN) span yields `(0, 0)` rather than dividing by zero.
pub fn timeline_percent(trace: &TraceEvent, row_start: f64, row_total_span: f64) -> (f64, f64) {
    if row_total_span == 0.0 || row_total_span.is_nan() {
        return (0.0, 0.0);
    }
    (
        (trace.start - row_start) / row_total_span * 100.0,
        (trace.end - row_start) / row_total_span * 100.0,
    )
}

/// Start and span of a row's traces.
///
/// The row runs from the first trace's start to the last trace's end, in
/// report order. Rows without traces have a zero span at zero.
pub fn row_span(traces: &[TraceEvent]) -> (f64, f64) {
    match (traces.first(), traces.last()) {
        (Some(first), Some(last)) => (first.start, last.end - first.start),
        _ => (0.0, 0.0),
    }
}

/// Lay out every trace of a row
pub fn timeline(traces: &[TraceEvent]) -> Timeline {
    let (start, span) = row_span(traces);
    let segments = traces
        .iter()
        .map(|trace| {
            let (start_percent, end_percent) = timeline_percent(trace, start, span);
            TimelineSegment {
                start_percent,
                end_percent,
                duration: trace.duration(),
            }
        })
        .collect();

    Timeline {
        start,
        end: start + span,
        segments,
    }
}
