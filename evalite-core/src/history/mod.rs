//! Run history
//!
//! Runs are stored per evaluation name in creation order, from the moment
//! they start, and looked up by timestamp or row index for run-over-run
//! comparison. The registry answers which runs are in flight right now.

mod registry;
mod storage;
mod view;


pub use registry::{RunGuard, RunRegistry};
pub use storage::{InMemoryRunHistory, RunHistory};
pub use view::{ResultView, get_result};
