//! The drag-and-reorder engine: height estimation, swap thresholds, the
//! gesture state machine, and the serialized runtime that drives them.

pub mod drag;
pub mod heights;
pub mod runtime;
pub mod thresholds;
