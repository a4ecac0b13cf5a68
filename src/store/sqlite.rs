//! SQLite persistence: WAL-mode database for sections, trackers, and membership.
//!
//! Uses Write-Ahead Logging for concurrent read/write and prepared statements
//! for the hot reorder path. The reorder commit follows a strict
//! delete → shift → re-insert order so a concurrent reader can never observe
//! two rows sharing one (period, position) slot.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OpenFlags, OptionalExtension, params};

use crate::core::errors::{HgError, Result};
use crate::model::section::{Section, SectionKey, TimePeriod, Tracker};

/// SQLite section store with WAL mode and prepared-statement patterns.
pub struct SectionDb {
    conn: Connection,
    path: PathBuf,
}

impl SectionDb {
    /// Open (or create) the database at `path`, applying schema and PRAGMAs.
    pub fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists.
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| HgError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;

        apply_pragmas(&conn)?;
        apply_schema(&conn)?;

        Ok(Self {
            conn,
            path: path.to_path_buf(),
        })
    }

    /// Path to the database file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Check that WAL mode is active (for diagnostics).
    pub fn is_wal_mode(&self) -> bool {
        self.conn
            .query_row("PRAGMA journal_mode", [], |row| row.get::<_, String>(0))
            .map(|mode| mode.eq_ignore_ascii_case("wal"))
            .unwrap_or(false)
    }

    // ──────────────────── sections ────────────────────

    /// Insert a section row (trackers are attached separately).
    pub fn insert_section(&self, section: &Section) -> Result<()> {
        self.conn
            .prepare_cached(
                "INSERT INTO sections (section_title, time_period, position, last_modified)
                 VALUES (?1, ?2, ?3, ?4)",
            )?
            .execute(params![
                section.title,
                section.period.as_str(),
                section.position,
                format_ts(section.last_modified),
            ])?;
        Ok(())
    }

    /// Delete a section row and close the position gap for its period group.
    pub fn delete_section(&self, key: &SectionKey) -> Result<()> {
        let (id, position) = self.section_row(key)?;
        self.conn
            .prepare_cached("DELETE FROM section_trackers WHERE section_id = ?1")?
            .execute(params![id])?;
        self.conn
            .prepare_cached("DELETE FROM sections WHERE section_id = ?1")?
            .execute(params![id])?;
        self.conn
            .prepare_cached(
                "UPDATE sections SET position = position - 1
                 WHERE time_period = ?1 AND position > ?2",
            )?
            .execute(params![key.period.as_str(), position])?;
        Ok(())
    }

    /// Re-rank a section by `delta` slots within its period group.
    ///
    /// Protocol: read the full row, delete it, shift the in-between rows
    /// toward the vacated slot, then re-insert the row (same `section_id`,
    /// all non-position fields preserved) at the new rank. The delete happens
    /// first so the shifts can never collide with the moved row. A zero or
    /// fully clamped-away delta is a no-op.
    pub fn persist_reorder(&self, key: &SectionKey, delta: i64) -> Result<()> {
        if delta == 0 {
            return Ok(());
        }

        let (id, old) = self.section_row(key)?;
        let group_len: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM sections WHERE time_period = ?1",
            params![key.period.as_str()],
            |row| row.get(0),
        )?;
        let new = (i64::from(old) + delta).clamp(0, group_len - 1);
        if new == i64::from(old) {
            return Ok(());
        }

        let last_modified: String = self.conn.query_row(
            "SELECT last_modified FROM sections WHERE section_id = ?1",
            params![id],
            |row| row.get(0),
        )?;

        self.conn
            .prepare_cached("DELETE FROM sections WHERE section_id = ?1")?
            .execute(params![id])?;

        if new > i64::from(old) {
            self.conn
                .prepare_cached(
                    "UPDATE sections SET position = position - 1
                     WHERE time_period = ?1 AND position > ?2 AND position <= ?3",
                )?
                .execute(params![key.period.as_str(), old, new])?;
        } else {
            self.conn
                .prepare_cached(
                    "UPDATE sections SET position = position + 1
                     WHERE time_period = ?1 AND position >= ?2 AND position < ?3",
                )?
                .execute(params![key.period.as_str(), new, old])?;
        }

        self.conn
            .prepare_cached(
                "INSERT INTO sections (section_id, section_title, time_period, position, last_modified)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?
            .execute(params![id, key.title, key.period.as_str(), new, last_modified])?;
        Ok(())
    }

    // ──────────────────── trackers ────────────────────

    /// Insert a tracker row.
    pub fn insert_tracker(&self, tracker: &Tracker) -> Result<()> {
        self.conn
            .prepare_cached(
                "INSERT INTO trackers (tracker_name, icon, time_period, unit,
                                       bound_amount, current_amount, last_modified)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?
            .execute(params![
                tracker.name,
                tracker.icon,
                tracker.period.as_str(),
                tracker.unit,
                tracker.bound,
                tracker.current_amount,
                format_ts(tracker.last_modified),
            ])?;
        Ok(())
    }

    /// Update a tracker's current amount.
    pub fn update_tracker_amount(
        &self,
        name: &str,
        period: TimePeriod,
        amount: i64,
    ) -> Result<()> {
        let changed = self
            .conn
            .prepare_cached(
                "UPDATE trackers SET current_amount = ?1, last_modified = ?2
                 WHERE tracker_name = ?3 AND time_period = ?4",
            )?
            .execute(params![
                amount,
                format_ts(Utc::now()),
                name,
                period.as_str()
            ])?;
        if changed == 0 {
            return Err(HgError::UnknownTracker {
                name: name.to_string(),
                period: period.as_str(),
            });
        }
        Ok(())
    }

    /// Load a single tracker row by identity.
    pub fn load_tracker(&self, name: &str, period: TimePeriod) -> Result<Tracker> {
        self.conn
            .query_row(
                "SELECT tracker_name, icon, time_period, unit,
                        bound_amount, current_amount, last_modified
                 FROM trackers WHERE tracker_name = ?1 AND time_period = ?2",
                params![name, period.as_str()],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, Option<String>>(3)?,
                        row.get::<_, i64>(4)?,
                        row.get::<_, i64>(5)?,
                        row.get::<_, String>(6)?,
                    ))
                },
            )
            .optional()?
            .map_or_else(
                || {
                    Err(HgError::UnknownTracker {
                        name: name.to_string(),
                        period: period.as_str(),
                    })
                },
                |(name, icon, period_raw, unit, bound, current_amount, last_modified)| {
                    Ok(Tracker {
                        name,
                        period: parse_period(&period_raw)?,
                        bound,
                        current_amount,
                        icon,
                        unit,
                        last_modified: parse_ts(&last_modified)?,
                    })
                },
            )
    }

    /// Record a tracker's membership in a section at the given slot.
    pub fn attach_tracker(&self, key: &SectionKey, tracker_name: &str, slot: u32) -> Result<()> {
        let (section_id, _) = self.section_row(key)?;
        let tracker_id = self.tracker_id(tracker_name, key.period)?;
        self.conn
            .prepare_cached(
                "INSERT INTO section_trackers (section_id, tracker_id, tracker_position, last_modified)
                 VALUES (?1, ?2, ?3, ?4)",
            )?
            .execute(params![section_id, tracker_id, slot, format_ts(Utc::now())])?;
        Ok(())
    }

    /// Remove a tracker's membership from a section.
    pub fn detach_tracker(&self, key: &SectionKey, tracker_name: &str) -> Result<()> {
        let (section_id, _) = self.section_row(key)?;
        let tracker_id = self.tracker_id(tracker_name, key.period)?;
        self.conn
            .prepare_cached(
                "DELETE FROM section_trackers WHERE section_id = ?1 AND tracker_id = ?2",
            )?
            .execute(params![section_id, tracker_id])?;
        Ok(())
    }

    // ──────────────────── loading ────────────────────

    /// Load every section with its trackers, ordered by period then position.
    pub fn load_sections(&self) -> Result<Vec<Section>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT section_id, section_title, time_period, position, last_modified
             FROM sections ORDER BY time_period, position",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, u32>(3)?,
                    row.get::<_, String>(4)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut sections = Vec::with_capacity(rows.len());
        for (id, title, period_raw, position, last_modified) in rows {
            let period = parse_period(&period_raw)?;
            sections.push(Section {
                title,
                period,
                position,
                trackers: self.section_trackers(id)?,
                last_modified: parse_ts(&last_modified)?,
            });
        }
        Ok(sections)
    }

    /// Positions of one period group, ordered ascending (for inspection/tests).
    pub fn group_positions(&self, period: TimePeriod) -> Result<Vec<(String, u32)>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT section_title, position FROM sections
             WHERE time_period = ?1 ORDER BY position",
        )?;
        let rows = stmt
            .query_map(params![period.as_str()], |row| {
                Ok((row.get(0)?, row.get(1)?))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Whether any (period, position) slot is held by more than one row.
    pub fn has_duplicate_positions(&self) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM (
                 SELECT time_period, position FROM sections
                 GROUP BY time_period, position HAVING COUNT(*) > 1
             )",
            [],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    // ──────────────────── row helpers ────────────────────

    fn section_row(&self, key: &SectionKey) -> Result<(i64, u32)> {
        self.conn
            .query_row(
                "SELECT section_id, position FROM sections
                 WHERE section_title = ?1 AND time_period = ?2",
                params![key.title, key.period.as_str()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?
            .ok_or_else(|| HgError::UnknownSection {
                title: key.title.clone(),
                period: key.period.as_str(),
            })
    }

    fn tracker_id(&self, name: &str, period: TimePeriod) -> Result<i64> {
        self.conn
            .query_row(
                "SELECT tracker_id FROM trackers
                 WHERE tracker_name = ?1 AND time_period = ?2",
                params![name, period.as_str()],
                |row| row.get(0),
            )
            .optional()?
            .ok_or_else(|| HgError::UnknownTracker {
                name: name.to_string(),
                period: period.as_str(),
            })
    }

    fn section_trackers(&self, section_id: i64) -> Result<Vec<Tracker>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT t.tracker_name, t.icon, t.time_period, t.unit,
                    t.bound_amount, t.current_amount, t.last_modified
             FROM trackers t
             JOIN section_trackers st ON st.tracker_id = t.tracker_id
             WHERE st.section_id = ?1
             ORDER BY st.tracker_position",
        )?;
        let rows = stmt
            .query_map(params![section_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, Option<String>>(3)?,
                    row.get::<_, i64>(4)?,
                    row.get::<_, i64>(5)?,
                    row.get::<_, String>(6)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut trackers = Vec::with_capacity(rows.len());
        for (name, icon, period_raw, unit, bound, current_amount, last_modified) in rows {
            trackers.push(Tracker {
                name,
                period: parse_period(&period_raw)?,
                bound,
                current_amount,
                icon,
                unit,
                last_modified: parse_ts(&last_modified)?,
            });
        }
        Ok(trackers)
    }
}

// ──────────────────── schema & pragmas ────────────────────

fn apply_pragmas(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA synchronous = NORMAL;
         PRAGMA foreign_keys = ON;
         PRAGMA temp_store = MEMORY;
         PRAGMA busy_timeout = 5000;",
    )?;
    let mode: String = conn.query_row("PRAGMA journal_mode", [], |row| row.get(0))?;
    if !mode.eq_ignore_ascii_case("wal") {
        eprintln!("[HG-SQLITE] WARNING: requested WAL mode but got '{mode}'");
    }
    Ok(())
}

fn apply_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS sections (
            section_id INTEGER PRIMARY KEY AUTOINCREMENT,
            section_title TEXT NOT NULL,
            time_period TEXT NOT NULL,
            position INTEGER NOT NULL,
            last_modified TEXT NOT NULL,
            UNIQUE (section_title, time_period)
        );

        CREATE TABLE IF NOT EXISTS trackers (
            tracker_id INTEGER PRIMARY KEY AUTOINCREMENT,
            tracker_name TEXT NOT NULL,
            icon TEXT NOT NULL,
            time_period TEXT NOT NULL,
            unit TEXT,
            bound_amount INTEGER NOT NULL DEFAULT 0,
            current_amount INTEGER NOT NULL DEFAULT 0,
            last_modified TEXT NOT NULL,
            UNIQUE (tracker_name, time_period)
        );

        CREATE TABLE IF NOT EXISTS section_trackers (
            section_id INTEGER NOT NULL REFERENCES sections(section_id),
            tracker_id INTEGER NOT NULL REFERENCES trackers(tracker_id),
            tracker_position INTEGER NOT NULL,
            last_modified TEXT NOT NULL,
            PRIMARY KEY (section_id, tracker_id)
        );

        CREATE INDEX IF NOT EXISTS idx_sections_period_position
            ON sections(time_period, position);
        CREATE INDEX IF NOT EXISTS idx_section_trackers_section
            ON section_trackers(section_id);",
    )?;
    Ok(())
}

fn format_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

fn parse_ts(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|error| HgError::Serialization {
            context: "timestamp",
            details: format!("{raw:?}: {error}"),
        })
}

fn parse_period(raw: &str) -> Result<TimePeriod> {
    TimePeriod::from_str_opt(raw).ok_or_else(|| HgError::Serialization {
        context: "time_period",
        details: format!("unknown period label {raw:?}"),
    })
}

// ──────────────────── tests ────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_db() -> (tempfile::TempDir, SectionDb) {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = SectionDb::open(&db_path).unwrap();
        (dir, db)
    }

    fn seed_daily(db: &SectionDb, titles: &[&str]) {
        for (i, title) in titles.iter().enumerate() {
            db.insert_section(&Section::new(*title, TimePeriod::Daily, i as u32))
                .unwrap();
        }
    }

    fn daily_order(db: &SectionDb) -> Vec<String> {
        db.group_positions(TimePeriod::Daily)
            .unwrap()
            .into_iter()
            .map(|(title, _)| title)
            .collect()
    }

    #[test]
    fn schema_created_and_wal_active() {
        let (_dir, db) = temp_db();
        assert!(db.is_wal_mode());
    }

    #[test]
    fn idempotent_schema_creation() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("idempotent.db");
        let _ = SectionDb::open(&db_path).unwrap();
        let db = SectionDb::open(&db_path).unwrap();
        assert!(db.is_wal_mode());
    }

    #[test]
    fn insert_and_load_round_trip() {
        let (_dir, db) = temp_db();
        seed_daily(&db, &["Morning", "Evening"]);

        let mut water = Tracker::new("Water", TimePeriod::Daily, 8, "cup");
        water.current_amount = 3;
        water.unit = Some("cups".to_string());
        db.insert_tracker(&water).unwrap();
        db.attach_tracker(&SectionKey::new("Morning", TimePeriod::Daily), "Water", 0)
            .unwrap();

        let sections = db.load_sections().unwrap();
        assert_eq!(sections.len(), 2);
        let morning = sections.iter().find(|s| s.title == "Morning").unwrap();
        assert_eq!(morning.trackers.len(), 1);
        assert_eq!(morning.trackers[0].name, "Water");
        assert_eq!(morning.trackers[0].current_amount, 3);
        assert_eq!(morning.trackers[0].unit.as_deref(), Some("cups"));
    }

    #[test]
    fn reorder_moves_down_and_renumbers() {
        let (_dir, db) = temp_db();
        seed_daily(&db, &["A", "B", "C"]);

        db.persist_reorder(&SectionKey::new("A", TimePeriod::Daily), 2)
            .unwrap();

        assert_eq!(daily_order(&db), ["B", "C", "A"]);
        let positions: Vec<u32> = db
            .group_positions(TimePeriod::Daily)
            .unwrap()
            .into_iter()
            .map(|(_, p)| p)
            .collect();
        assert_eq!(positions, [0, 1, 2]);
        assert!(!db.has_duplicate_positions().unwrap());
    }

    #[test]
    fn reorder_moves_up_and_renumbers() {
        let (_dir, db) = temp_db();
        seed_daily(&db, &["A", "B", "C", "D"]);

        db.persist_reorder(&SectionKey::new("D", TimePeriod::Daily), -3)
            .unwrap();

        assert_eq!(daily_order(&db), ["D", "A", "B", "C"]);
        assert!(!db.has_duplicate_positions().unwrap());
    }

    #[test]
    fn reorder_zero_delta_is_noop() {
        let (_dir, db) = temp_db();
        seed_daily(&db, &["A", "B"]);
        db.persist_reorder(&SectionKey::new("A", TimePeriod::Daily), 0)
            .unwrap();
        assert_eq!(daily_order(&db), ["A", "B"]);
    }

    #[test]
    fn reorder_clamps_out_of_range_delta() {
        let (_dir, db) = temp_db();
        seed_daily(&db, &["A", "B", "C"]);
        db.persist_reorder(&SectionKey::new("B", TimePeriod::Daily), 99)
            .unwrap();
        assert_eq!(daily_order(&db), ["A", "C", "B"]);
    }

    #[test]
    fn reorder_preserves_membership_links() {
        let (_dir, db) = temp_db();
        seed_daily(&db, &["A", "B"]);
        db.insert_tracker(&Tracker::new("Run", TimePeriod::Daily, 5, "shoe"))
            .unwrap();
        db.attach_tracker(&SectionKey::new("A", TimePeriod::Daily), "Run", 0)
            .unwrap();

        db.persist_reorder(&SectionKey::new("A", TimePeriod::Daily), 1)
            .unwrap();

        let sections = db.load_sections().unwrap();
        let a = sections.iter().find(|s| s.title == "A").unwrap();
        assert_eq!(a.position, 1);
        assert_eq!(a.trackers.len(), 1, "membership must survive the reorder");
    }

    #[test]
    fn reorder_unknown_section_errors() {
        let (_dir, db) = temp_db();
        seed_daily(&db, &["A"]);
        let err = db
            .persist_reorder(&SectionKey::new("nope", TimePeriod::Daily), 1)
            .unwrap_err();
        assert_eq!(err.code(), "HG-2001");
    }

    #[test]
    fn reorder_ignores_other_periods() {
        let (_dir, db) = temp_db();
        seed_daily(&db, &["A", "B"]);
        db.insert_section(&Section::new("W", TimePeriod::Weekly, 0))
            .unwrap();

        db.persist_reorder(&SectionKey::new("A", TimePeriod::Daily), 1)
            .unwrap();

        let weekly = db.group_positions(TimePeriod::Weekly).unwrap();
        assert_eq!(weekly, [("W".to_string(), 0)]);
    }

    #[test]
    fn delete_section_closes_gap_and_drops_membership() {
        let (_dir, db) = temp_db();
        seed_daily(&db, &["A", "B", "C"]);
        db.insert_tracker(&Tracker::new("Run", TimePeriod::Daily, 5, "shoe"))
            .unwrap();
        db.attach_tracker(&SectionKey::new("B", TimePeriod::Daily), "Run", 0)
            .unwrap();

        db.delete_section(&SectionKey::new("B", TimePeriod::Daily))
            .unwrap();

        assert_eq!(daily_order(&db), ["A", "C"]);
        let positions: Vec<u32> = db
            .group_positions(TimePeriod::Daily)
            .unwrap()
            .into_iter()
            .map(|(_, p)| p)
            .collect();
        assert_eq!(positions, [0, 1]);
    }

    #[test]
    fn load_tracker_by_identity() {
        let (_dir, db) = temp_db();
        let mut tracker = Tracker::new("Water", TimePeriod::Daily, 8, "cup");
        tracker.current_amount = 5;
        db.insert_tracker(&tracker).unwrap();

        let loaded = db.load_tracker("Water", TimePeriod::Daily).unwrap();
        assert_eq!(loaded.current_amount, 5);
        assert_eq!(loaded.bound, 8);

        let err = db.load_tracker("Water", TimePeriod::Weekly).unwrap_err();
        assert_eq!(err.code(), "HG-2002");
    }

    #[test]
    fn update_tracker_amount_unknown_errors() {
        let (_dir, db) = temp_db();
        let err = db
            .update_tracker_amount("ghost", TimePeriod::Daily, 1)
            .unwrap_err();
        assert_eq!(err.code(), "HG-2002");
    }

    #[test]
    fn duplicate_section_identity_rejected_by_schema() {
        let (_dir, db) = temp_db();
        seed_daily(&db, &["A"]);
        let err = db
            .insert_section(&Section::new("A", TimePeriod::Daily, 1))
            .unwrap_err();
        assert_eq!(err.code(), "HG-2102");
    }
}
