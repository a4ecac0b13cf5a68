//! In-memory section collection with exclusive ownership and atomic moves.
//!
//! `PositionStore` is the single owner of the section list. Mutations happen
//! through its methods only; other threads observe the collection through
//! cheap read-only snapshots ([`SectionView`]). Within each time-period group
//! the `position` fields always form a contiguous permutation of
//! `0..count-1` between mutations.

use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;

use crate::core::errors::{HgError, Result};
use crate::model::section::{Section, SectionKey, TimePeriod, Tracker};

/// Result of a completed `move_by` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveOutcome {
    /// Identity of the moved section.
    pub key: SectionKey,
    /// Rank before the move.
    pub old_position: u32,
    /// Rank after the move (clamped into the group).
    pub new_position: u32,
}

impl MoveOutcome {
    /// Signed number of slots actually moved.
    #[must_use]
    pub const fn applied_delta(&self) -> i64 {
        self.new_position as i64 - self.old_position as i64
    }
}

#[derive(Debug)]
struct Snapshot {
    revision: u64,
    sections: Arc<Vec<Section>>,
}

/// Read-only, thread-safe view of the section collection.
#[derive(Debug, Clone)]
pub struct SectionView {
    inner: Arc<RwLock<Snapshot>>,
}

impl SectionView {
    /// Current snapshot of all sections.
    #[must_use]
    pub fn sections(&self) -> Arc<Vec<Section>> {
        Arc::clone(&self.inner.read().sections)
    }

    /// Monotonic revision counter; bumped on every mutation.
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.inner.read().revision
    }
}

/// Exclusive owner of the section collection.
#[derive(Debug)]
pub struct PositionStore {
    sections: Vec<Section>,
    revision: u64,
    shared: Arc<RwLock<Snapshot>>,
}

impl Default for PositionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl PositionStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            sections: Vec::new(),
            revision: 0,
            shared: Arc::new(RwLock::new(Snapshot {
                revision: 0,
                sections: Arc::new(Vec::new()),
            })),
        }
    }

    /// Replace the collection wholesale (startup load, failure reconciliation).
    ///
    /// Positions are normalized per period: sections are ranked by their
    /// stored position and renumbered `0..count-1`, so a store holding gapped
    /// or duplicated ranks (e.g. after a partial external write) heals here.
    pub fn hydrate(&mut self, sections: Vec<Section>) {
        self.sections = sections;
        for period in TimePeriod::all() {
            let mut idx: Vec<usize> = (0..self.sections.len())
                .filter(|&i| self.sections[i].period == period)
                .collect();
            idx.sort_by_key(|&i| self.sections[i].position);
            for (rank, &i) in idx.iter().enumerate() {
                self.sections[i].position = rank as u32;
            }
        }
        self.bump();
    }

    /// Read-only view handle for other threads.
    #[must_use]
    pub fn view(&self) -> SectionView {
        SectionView {
            inner: Arc::clone(&self.shared),
        }
    }

    /// Current revision; bumped on every mutation.
    #[must_use]
    pub const fn revision(&self) -> u64 {
        self.revision
    }

    /// All sections, in storage order.
    #[must_use]
    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    /// Sections of one period, sorted by position.
    #[must_use]
    pub fn ordered(&self, period: TimePeriod) -> Vec<&Section> {
        let mut group: Vec<&Section> = self
            .sections
            .iter()
            .filter(|s| s.period == period)
            .collect();
        group.sort_by_key(|s| s.position);
        group
    }

    /// Find a section by identity.
    #[must_use]
    pub fn find(&self, key: &SectionKey) -> Option<&Section> {
        self.sections.iter().find(|s| s.matches(key))
    }

    /// Number of sections in one period group.
    #[must_use]
    pub fn group_len(&self, period: TimePeriod) -> usize {
        self.sections.iter().filter(|s| s.period == period).count()
    }

    /// Re-rank `key` by `delta` slots, shifting the in-between siblings one
    /// slot the other way. The target rank is clamped into the group; a zero
    /// (or fully clamped-away) delta is a no-op. One atomic state transition:
    /// the snapshot other threads see is either the old or the new permutation.
    pub fn move_by(&mut self, key: &SectionKey, delta: i64) -> Result<MoveOutcome> {
        let moved_idx = self
            .sections
            .iter()
            .position(|s| s.matches(key))
            .ok_or_else(|| HgError::UnknownSection {
                title: key.title.clone(),
                period: key.period.as_str(),
            })?;

        let old = self.sections[moved_idx].position;
        let group_len = self.group_len(key.period) as i64;
        let new = (i64::from(old) + delta).clamp(0, group_len - 1);
        let new = new as u32;

        let outcome = MoveOutcome {
            key: key.clone(),
            old_position: old,
            new_position: new,
        };
        if new == old {
            return Ok(outcome);
        }

        for section in &mut self.sections {
            if section.period != key.period {
                continue;
            }
            let pos = section.position;
            if new > old && pos > old && pos <= new {
                section.position = pos - 1;
            } else if new < old && pos >= new && pos < old {
                section.position = pos + 1;
            }
        }
        self.sections[moved_idx].position = new;
        self.sections[moved_idx].last_modified = Utc::now();
        self.bump();
        Ok(outcome)
    }

    /// Append a new empty section at the end of its period group.
    pub fn add_section(&mut self, title: impl Into<String>, period: TimePeriod) -> Result<SectionKey> {
        let title = title.into();
        let key = SectionKey::new(title.clone(), period);
        if self.find(&key).is_some() {
            return Err(HgError::Duplicate {
                what: "section",
                details: key.to_string(),
            });
        }
        let position = self.group_len(period) as u32;
        self.sections.push(Section::new(title, period, position));
        self.bump();
        Ok(key)
    }

    /// Remove a section and close the position gap for its siblings.
    pub fn delete_section(&mut self, key: &SectionKey) -> Result<Section> {
        let idx = self
            .sections
            .iter()
            .position(|s| s.matches(key))
            .ok_or_else(|| HgError::UnknownSection {
                title: key.title.clone(),
                period: key.period.as_str(),
            })?;
        let removed = self.sections.remove(idx);
        for section in &mut self.sections {
            if section.period == removed.period && section.position > removed.position {
                section.position -= 1;
            }
        }
        self.bump();
        Ok(removed)
    }

    /// Attach a tracker to a section. Rejects a duplicate within the section.
    pub fn add_tracker_to_section(&mut self, key: &SectionKey, tracker: Tracker) -> Result<()> {
        let section = self
            .sections
            .iter_mut()
            .find(|s| s.matches(key))
            .ok_or_else(|| HgError::UnknownSection {
                title: key.title.clone(),
                period: key.period.as_str(),
            })?;
        if section
            .trackers
            .iter()
            .any(|t| t.name == tracker.name && t.period == tracker.period)
        {
            return Err(HgError::Duplicate {
                what: "tracker",
                details: format!("{} in {key}", tracker.name),
            });
        }
        section.trackers.push(tracker);
        section.last_modified = Utc::now();
        self.bump();
        Ok(())
    }

    /// Detach a tracker from a section, returning it.
    pub fn remove_tracker_from_section(&mut self, key: &SectionKey, name: &str) -> Result<Tracker> {
        let section = self
            .sections
            .iter_mut()
            .find(|s| s.matches(key))
            .ok_or_else(|| HgError::UnknownSection {
                title: key.title.clone(),
                period: key.period.as_str(),
            })?;
        let idx = section
            .trackers
            .iter()
            .position(|t| t.name == name)
            .ok_or_else(|| HgError::UnknownTracker {
                name: name.to_string(),
                period: key.period.as_str(),
            })?;
        let removed = section.trackers.remove(idx);
        section.last_modified = Utc::now();
        self.bump();
        Ok(removed)
    }

    /// Adjust a tracker's current amount by `by` across every section holding
    /// it (a tracker attached to several sections is one logical entity).
    /// Amounts saturate at zero on decrement.
    pub fn increment_tracker(&mut self, name: &str, period: TimePeriod, by: i64) -> Result<()> {
        let now = Utc::now();
        let mut touched = false;
        for section in &mut self.sections {
            if section.period != period {
                continue;
            }
            for tracker in &mut section.trackers {
                if tracker.name == name && tracker.period == period {
                    tracker.current_amount = (tracker.current_amount + by).max(0);
                    tracker.last_modified = now;
                    touched = true;
                }
            }
        }
        if !touched {
            return Err(HgError::UnknownTracker {
                name: name.to_string(),
                period: period.as_str(),
            });
        }
        self.bump();
        Ok(())
    }

    fn bump(&mut self) {
        self.revision += 1;
        let mut guard = self.shared.write();
        guard.revision = self.revision;
        guard.sections = Arc::new(self.sections.clone());
    }

    /// Whether every period group holds a contiguous `0..count-1` permutation.
    #[must_use]
    pub fn positions_are_contiguous(&self) -> bool {
        TimePeriod::all().into_iter().all(|period| {
            let mut ranks: Vec<u32> = self
                .sections
                .iter()
                .filter(|s| s.period == period)
                .map(|s| s.position)
                .collect();
            ranks.sort_unstable();
            ranks.iter().enumerate().all(|(i, &r)| r == i as u32)
        })
    }
}
