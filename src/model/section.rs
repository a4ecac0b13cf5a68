//! Domain types: time periods, trackers, sections, and section identity.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Reporting window a section or tracker belongs to.
///
/// Sections and trackers are partitioned independently per period; identity
/// and display order are always scoped to one period.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimePeriod {
    /// Resets every day.
    #[default]
    Daily,
    /// Resets every week.
    Weekly,
    /// Resets every month.
    Monthly,
}

impl TimePeriod {
    /// Stable label used in storage rows and log entries.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Daily => "Daily",
            Self::Weekly => "Weekly",
            Self::Monthly => "Monthly",
        }
    }

    /// Parse a storage label back into a period. Returns `None` for unknown labels.
    #[must_use]
    pub fn from_str_opt(raw: &str) -> Option<Self> {
        match raw {
            "Daily" => Some(Self::Daily),
            "Weekly" => Some(Self::Weekly),
            "Monthly" => Some(Self::Monthly),
            _ => None,
        }
    }

    /// All periods, in display order.
    #[must_use]
    pub const fn all() -> [Self; 3] {
        [Self::Daily, Self::Weekly, Self::Monthly]
    }
}

impl fmt::Display for TimePeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unique identity of a section: title plus period.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SectionKey {
    /// User-chosen section title.
    pub title: String,
    /// Period the section belongs to.
    pub period: TimePeriod,
}

impl SectionKey {
    /// Build a key from a title and period.
    #[must_use]
    pub fn new(title: impl Into<String>, period: TimePeriod) -> Self {
        Self {
            title: title.into(),
            period,
        }
    }
}

impl fmt::Display for SectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.title, self.period)
    }
}

/// A single trackable habit/goal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tracker {
    /// Tracker name; unique within its period.
    pub name: String,
    /// Period the tracker belongs to.
    pub period: TimePeriod,
    /// Target: positive = goal, negative = limit, 0 = plain counter.
    pub bound: i64,
    /// Current accumulated amount.
    pub current_amount: i64,
    /// Icon identifier resolved by the rendering layer.
    pub icon: String,
    /// Optional unit label ("ml", "pages", ...).
    pub unit: Option<String>,
    /// Last mutation timestamp.
    pub last_modified: DateTime<Utc>,
}

impl Tracker {
    /// Create a tracker with a zero starting amount, stamped now.
    #[must_use]
    pub fn new(name: impl Into<String>, period: TimePeriod, bound: i64, icon: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            period,
            bound,
            current_amount: 0,
            icon: icon.into(),
            unit: None,
            last_modified: Utc::now(),
        }
    }

    /// Completion ratio in `[0, 1]`, or `None` when the tracker has no bound.
    #[must_use]
    pub fn completion(&self) -> Option<f64> {
        if self.bound == 0 {
            return None;
        }
        #[allow(clippy::cast_precision_loss)]
        let ratio = self.current_amount as f64 / (self.bound.unsigned_abs() as f64);
        Some(ratio.clamp(0.0, 1.0))
    }
}

/// A named, ordered group of trackers scoped to one time period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    /// User-chosen title; unique within the period.
    pub title: String,
    /// Period the section belongs to.
    pub period: TimePeriod,
    /// Zero-based rank among sections sharing `period`.
    pub position: u32,
    /// Trackers shown inside this section.
    pub trackers: Vec<Tracker>,
    /// Last mutation timestamp.
    pub last_modified: DateTime<Utc>,
}

impl Section {
    /// Create an empty section at the given position, stamped now.
    #[must_use]
    pub fn new(title: impl Into<String>, period: TimePeriod, position: u32) -> Self {
        Self {
            title: title.into(),
            period,
            position,
            trackers: Vec::new(),
            last_modified: Utc::now(),
        }
    }

    /// This section's identity key.
    #[must_use]
    pub fn key(&self) -> SectionKey {
        SectionKey::new(self.title.clone(), self.period)
    }

    /// Whether this section matches the given key.
    #[must_use]
    pub fn matches(&self, key: &SectionKey) -> bool {
        self.period == key.period && self.title == key.title
    }
}
