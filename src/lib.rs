#![forbid(unsafe_code)]

//! habitgrid — engine for a sectioned habit/goal tracker.
//!
//! Three layers:
//! 1. **Section store** — sections of trackers per time period, owned by
//!    [`store::position::PositionStore`] and persisted in WAL-mode SQLite
//! 2. **Reorder engine** — the drag-and-reorder gesture state machine with
//!    swap thresholds, edge auto-scroll, and commit-on-release
//! 3. **Runtime** — one serialized event loop marshaling touch events, ticker
//!    ticks, and background persistence
//!
//! # Library usage
//!
//! Use the [`prelude`] for convenient access to the most common types:
//!
//! ```rust,no_run
//! use habitgrid::prelude::*;
//! ```
//!
//! Individual modules can also be imported directly:
//!
//! ```rust,no_run
//! use habitgrid::core::config::Config;
//! use habitgrid::reorder::drag::{DragController, GestureEvent};
//! ```

pub mod prelude;

pub mod core;
pub mod journal;
pub mod model;
pub mod reorder;
pub mod store;
