//! Derived metrics
//!
//! Pure computations over stored records: token usage totals, score movement
//! between runs and trace timeline layout. Nothing here is persisted.

mod score;
mod timeline;
mod usage;

pub use score::{
    ScoreState, average_score, score_state, score_state_for, score_state_with_tolerance,
};
pub use timeline::{Timeline, TimelineSegment, row_span, timeline, timeline_percent};
pub use usage::sum_token_usage;
