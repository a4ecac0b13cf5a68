//! Period progress aggregation for the summary dial.

use std::collections::HashSet;

use crate::model::section::{Section, TimePeriod};

/// Average completion ratio across the distinct bounded trackers of one period.
///
/// A tracker attached to several sections is counted once. Trackers without a
/// bound are skipped entirely; each counted ratio is clamped to `[0, 1]` so an
/// overshot goal cannot drag the average above 100%. Returns 0.0 when the
/// period has no bounded trackers.
#[must_use]
pub fn average_progress(sections: &[Section], period: TimePeriod) -> f64 {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut total = 0.0;
    let mut counted = 0u32;

    for section in sections.iter().filter(|s| s.period == period) {
        for tracker in &section.trackers {
            let Some(ratio) = tracker.completion() else {
                continue;
            };
            if !seen.insert(tracker.name.as_str()) {
                continue;
            }
            total += ratio;
            counted += 1;
        }
    }

    if counted == 0 {
        return 0.0;
    }
    total / f64::from(counted)
}

/// `average_progress` rounded to a whole percentage for display.
#[must_use]
pub fn average_progress_pct(sections: &[Section], period: TimePeriod) -> u32 {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let pct = (average_progress(sections, period) * 100.0).round() as u32;
    pct
}
