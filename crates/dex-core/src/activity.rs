//! Bounded user-facing activity log.
//!
//! Distinct from the `tracing` diagnostic stream: these entries are
//! what the kiosk display renders in its terminal panel.

use chrono::Local;
use serde::Serialize;
use std::collections::VecDeque;

/// Retained entries; appending beyond this evicts the oldest first.
pub const MAX_ENTRIES: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogKind {
    Info,
    Success,
    Warning,
    Error,
}

/// Immutable once created.
#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    /// Local wall-clock time, second precision (e.g. "14:03:27").
    pub timestamp: String,
    pub kind: LogKind,
    pub message: String,
}

/// FIFO log of discrete kiosk events, capped at [`MAX_ENTRIES`].
/// Insertion order is the display order, oldest first.
#[derive(Debug, Default)]
pub struct ActivityLog {
    entries: VecDeque<LogEntry>,
}

impl ActivityLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry stamped with the current local time, evicting
    /// the oldest entry if the log is full.
    pub fn push(&mut self, kind: LogKind, message: impl Into<String>) {
        if self.entries.len() == MAX_ENTRIES {
            self.entries.pop_front();
        }
        self.entries.push_back(LogEntry {
            timestamp: Local::now().format("%H:%M:%S").to_string(),
            kind,
            message: message.into(),
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Snapshot in display order for the read-only status interface.
    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.iter().cloned().collect()
    }
}
