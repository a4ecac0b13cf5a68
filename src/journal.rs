//! Reorder journal: append-only line-delimited JSON of commit activity.
//!
//! Each line is a self-contained JSON object. Lines are assembled in memory
//! and written atomically via `write_all` to prevent interleaved partial
//! lines when the file is being tailed by another process.
//!
//! Degradation chain:
//! 1. Primary file path
//! 2. stderr with `[HG-JOURNAL]` prefix
//! 3. Silent discard (the gesture path must never fail for logging reasons)

#![allow(missing_docs)]

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::model::section::SectionKey;

/// Journal event types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JournalEvent {
    ReorderCommit,
    PersistFailure,
    Hydrate,
}

/// A single journal entry — one JSON object per line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalEntry {
    /// ISO 8601 UTC timestamp.
    pub ts: String,
    /// Event type identifier.
    pub event: JournalEvent,
    /// Section title involved (when applicable).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    /// Period label of the section.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub period: Option<String>,
    /// Net positions moved by the commit.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delta: Option<i64>,
    /// Whether the operation succeeded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ok: Option<bool>,
    /// HG error code if the operation failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    /// Human-readable error message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl JournalEntry {
    /// Create a new entry stamped with the current UTC time.
    #[must_use]
    pub fn new(event: JournalEvent) -> Self {
        Self {
            ts: Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            event,
            section: None,
            period: None,
            delta: None,
            ok: None,
            error_code: None,
            error_message: None,
        }
    }

    /// Entry for a committed reorder.
    #[must_use]
    pub fn commit(key: &SectionKey, delta: i64) -> Self {
        let mut entry = Self::new(JournalEvent::ReorderCommit);
        entry.section = Some(key.title.clone());
        entry.period = Some(key.period.as_str().to_string());
        entry.delta = Some(delta);
        entry.ok = Some(true);
        entry
    }

    /// Entry for a persistence failure (commit kept in memory only).
    #[must_use]
    pub fn failure(key: &SectionKey, delta: i64, code: &str, message: &str) -> Self {
        let mut entry = Self::new(JournalEvent::PersistFailure);
        entry.section = Some(key.title.clone());
        entry.period = Some(key.period.as_str().to_string());
        entry.delta = Some(delta);
        entry.ok = Some(false);
        entry.error_code = Some(code.to_string());
        entry.error_message = Some(message.to_string());
        entry
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriterState {
    /// Writing to the journal file.
    Normal,
    /// File failed, writing to stderr.
    Stderr,
    /// Everything failed, silently discarding.
    Discard,
}

/// Append-only JSONL journal writer with graceful degradation.
pub struct JournalWriter {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
    state: WriterState,
}

impl JournalWriter {
    /// Open the journal file for appending. Falls through the degradation
    /// chain on failure rather than erroring.
    #[must_use]
    pub fn open(path: &Path) -> Self {
        let mut journal = Self {
            path: path.to_path_buf(),
            writer: None,
            state: WriterState::Discard,
        };
        journal.try_open();
        journal
    }

    /// Path this journal writes to.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether entries currently reach the journal file.
    #[must_use]
    pub const fn is_healthy(&self) -> bool {
        matches!(self.state, WriterState::Normal)
    }

    /// Write a single entry as one atomic JSONL line.
    pub fn write_entry(&mut self, entry: &JournalEntry) {
        let Ok(mut line) = serde_json::to_string(entry) else {
            // An unserializable entry is a programming error; drop it rather
            // than poisoning the writer.
            return;
        };
        line.push('\n');

        match self.state {
            WriterState::Normal => {
                let ok = self
                    .writer
                    .as_mut()
                    .is_some_and(|w| w.write_all(line.as_bytes()).and_then(|()| w.flush()).is_ok());
                if !ok {
                    self.writer = None;
                    self.state = WriterState::Stderr;
                    eprint!("[HG-JOURNAL] {line}");
                }
            }
            WriterState::Stderr => {
                eprint!("[HG-JOURNAL] {line}");
            }
            WriterState::Discard => {}
        }
    }

    fn try_open(&mut self) {
        if let Some(parent) = self.path.parent()
            && std::fs::create_dir_all(parent).is_err()
        {
            self.state = WriterState::Stderr;
            return;
        }
        match OpenOptions::new().create(true).append(true).open(&self.path) {
            Ok(file) => {
                self.writer = Some(BufWriter::new(file));
                self.state = WriterState::Normal;
            }
            Err(_) => {
                self.state = WriterState::Stderr;
            }
        }
    }
}
