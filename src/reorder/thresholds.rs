//! Swap-boundary computation for a drag in progress.

/// Cumulative Y-offsets at which a dragged section crosses into each sibling's
/// slot.
///
/// `central` is the dragged section's rank at drag start; `heights` is the
/// period group's height snapshot in position order. The entry for `central`
/// is always 0 (a section cannot swap with itself). Entries below `central`
/// grow by `heights[i-1] + margin` per slot — the downward distance needed to
/// fully pass sibling `i-1` and occupy slot `i`. Entries above descend
/// symmetrically into negative offsets.
///
/// The result depends only on the inputs; it is computed once at drag start
/// and never re-measured mid-drag.
#[must_use]
pub fn compute_thresholds(central: usize, heights: &[f64], margin: f64) -> Vec<f64> {
    let mut thresholds = vec![0.0; heights.len()];

    // Siblings below the dragged section.
    for i in (central + 1)..heights.len() {
        thresholds[i] = thresholds[i - 1] + heights[i - 1] + margin;
    }

    // Siblings above, descending into negative offsets.
    for i in (0..central).rev() {
        thresholds[i] = thresholds[i + 1] - heights[i] - margin;
    }

    thresholds
}
