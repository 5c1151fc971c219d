//! Look-ahead motion planning.
//!
//! Buffers pending linear moves and keeps their junction speeds optimal so
//! the whole queue forms one acceleration-bounded velocity plan.

mod block;
mod queue;

pub use block::{BufferStatus, LineData, PlanBlock, RateMode};
pub use queue::{ExecutingBlock, Planner};
