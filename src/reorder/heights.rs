//! Section height estimation from tracker counts and layout constants.

use crate::core::config::LayoutConfig;
use crate::model::section::{Section, TimePeriod};
use crate::store::position::SectionView;

/// Estimates rendered section heights for one period group.
///
/// Heights are a pure function of tracker count and the layout constants, so
/// they are recomputed only when the store revision or the active period
/// changes — never per drag pixel. The cached snapshot is what seeds
/// threshold computation at drag start.
#[derive(Debug)]
pub struct HeightOracle {
    layout: LayoutConfig,
    cache: Option<Cached>,
}

#[derive(Debug)]
struct Cached {
    revision: u64,
    period: TimePeriod,
    heights: Vec<f64>,
}

impl HeightOracle {
    /// Create an oracle over the given layout constants.
    #[must_use]
    pub const fn new(layout: LayoutConfig) -> Self {
        Self {
            layout,
            cache: None,
        }
    }

    /// Layout constants in use.
    #[must_use]
    pub const fn layout(&self) -> &LayoutConfig {
        &self.layout
    }

    /// Estimated height of one section. An absent section measures 0.
    #[must_use]
    pub fn height_for(&self, section: Option<&Section>) -> f64 {
        section.map_or(0.0, |s| self.height_of_count(s.trackers.len()))
    }

    /// Estimated height for a section holding `tracker_count` trackers.
    ///
    /// The grid always renders one extra cell after the last tracker (the
    /// "add tracker" affordance), hence the `+ 1` in the row count.
    #[must_use]
    pub fn height_of_count(&self, tracker_count: usize) -> f64 {
        let per_row = self.layout.items_per_row.max(1);
        let rows = (tracker_count + 1).div_ceil(per_row);
        #[allow(clippy::cast_precision_loss)]
        let rows_f = rows as f64;
        self.layout.base_row_height
            + rows_f * self.layout.item_size
            + (rows_f - 1.0) * self.layout.item_spacing
    }

    /// Height snapshot of `period`'s sections in position order, recomputed
    /// only when the view revision or the period changed since the last call.
    pub fn heights(&mut self, view: &SectionView, period: TimePeriod) -> &[f64] {
        let revision = view.revision();
        let stale = !matches!(
            &self.cache,
            Some(c) if c.revision == revision && c.period == period
        );
        if stale {
            let sections = view.sections();
            let mut group: Vec<&Section> =
                sections.iter().filter(|s| s.period == period).collect();
            group.sort_by_key(|s| s.position);
            let heights = group
                .iter()
                .map(|s| self.height_of_count(s.trackers.len()))
                .collect();
            self.cache = Some(Cached {
                revision,
                period,
                heights,
            });
        }
        &self.cache.as_ref().expect("cache populated above").heights
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::section::{SectionKey, Tracker};
    use crate::store::position::PositionStore;

    fn oracle() -> HeightOracle {
        HeightOracle::new(LayoutConfig::default())
    }

    #[test]
    fn empty_section_still_renders_the_add_cell() {
        let o = oracle();
        // 0 trackers + add cell = 1 row.
        let expected = 66.666 + 76.0;
        assert!((o.height_of_count(0) - expected).abs() < 1e-9);
    }

    #[test]
    fn row_boundary_at_items_per_row() {
        let o = oracle();
        // 3 trackers + add cell = exactly one full row of 4.
        assert!((o.height_of_count(3) - o.height_of_count(0)).abs() < 1e-9);
        // A 4th tracker pushes the add cell onto a second row.
        let two_rows = 66.666 + 2.0 * 76.0 + 12.0;
        assert!((o.height_of_count(4) - two_rows).abs() < 1e-9);
    }

    #[test]
    fn absent_section_measures_zero() {
        assert_eq!(oracle().height_for(None), 0.0);
    }

    #[test]
    fn heights_follow_position_order_not_insertion_order() {
        let mut store = PositionStore::new();
        store.add_section("A", TimePeriod::Daily).unwrap();
        store.add_section("B", TimePeriod::Daily).unwrap();
        store
            .add_tracker_to_section(
                &SectionKey::new("B", TimePeriod::Daily),
                Tracker::new("Run", TimePeriod::Daily, 5, "shoe"),
            )
            .unwrap();
        // B (taller) moves to the front.
        store
            .move_by(&SectionKey::new("B", TimePeriod::Daily), -1)
            .unwrap();

        let mut o = oracle();
        let view = store.view();
        let heights = o.heights(&view, TimePeriod::Daily).to_vec();
        assert_eq!(heights.len(), 2);
        assert!(
            (heights[0] - o.height_of_count(1)).abs() < 1e-9,
            "B leads the order"
        );
        assert!((heights[1] - o.height_of_count(0)).abs() < 1e-9);
    }

    #[test]
    fn cache_refreshes_on_revision_or_period_change() {
        let mut store = PositionStore::new();
        store.add_section("A", TimePeriod::Daily).unwrap();
        let view = store.view();

        let mut o = oracle();
        assert_eq!(o.heights(&view, TimePeriod::Daily).len(), 1);
        // Same revision + period hits the cache (observed via length equality
        // after a no-op call).
        assert_eq!(o.heights(&view, TimePeriod::Daily).len(), 1);
        // Switching period recomputes against the other (empty) group.
        assert_eq!(o.heights(&view, TimePeriod::Weekly).len(), 0);

        store.add_section("B", TimePeriod::Daily).unwrap();
        assert_eq!(o.heights(&view, TimePeriod::Daily).len(), 2);
    }
}
