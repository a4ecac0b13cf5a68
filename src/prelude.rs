//! Convenience re-exports for library consumers.
//!
//! ```rust,no_run
//! use habitgrid::prelude::*;
//! ```

// Core
pub use crate::core::config::Config;
pub use crate::core::errors::{HgError, Result};

// Model
pub use crate::model::progress::{average_progress, average_progress_pct};
pub use crate::model::section::{Section, SectionKey, TimePeriod, Tracker};

// Store
pub use crate::store::position::{MoveOutcome, PositionStore, SectionView};
#[cfg(feature = "sqlite")]
pub use crate::store::sqlite::SectionDb;

// Reorder engine
pub use crate::reorder::drag::{
    DragCmd, DragController, DragSession, FrameSection, FrameSnapshot, GestureEvent,
    ScrollDirection, ScrollMetrics, SectionRect,
};
pub use crate::reorder::heights::HeightOracle;
pub use crate::reorder::thresholds::compute_thresholds;

// Runtime
#[cfg(feature = "sqlite")]
pub use crate::reorder::runtime::hydrate_store;
pub use crate::reorder::runtime::{
    ReorderRuntime, ReorderSink, ScrollHost, SectionSurface, UiEvent, ViewAnimator,
};

// Journal
pub use crate::journal::{JournalEntry, JournalEvent, JournalWriter};
