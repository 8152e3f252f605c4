//! User-facing diagnostic log, newest first.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use printqc_core::types::Severity;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub message: String,
    pub severity: Severity,
    pub timestamp: DateTime<Utc>,
}

/// Append-only entry list. When `capacity` is non-zero the oldest entries
/// are evicted beyond it.
#[derive(Debug, Clone)]
pub struct EventLog {
    entries: VecDeque<LogEntry>,
    capacity: usize,
}

impl Default for EventLog {
    fn default() -> Self {
        Self::unbounded()
    }
}

impl EventLog {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            capacity,
        }
    }

    pub fn unbounded() -> Self {
        Self::with_capacity(0)
    }

    pub fn push(&mut self, message: impl Into<String>, severity: Severity) -> &LogEntry {
        self.entries.push_front(LogEntry {
            message: message.into(),
            severity,
            timestamp: Utc::now(),
        });
        if self.capacity > 0 {
            self.entries.truncate(self.capacity);
        }
        &self.entries[0]
    }

    /// Entries, newest first.
    pub fn iter(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }

    pub fn latest(&self) -> Option<&LogEntry> {
        self.entries.front()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn to_vec(&self) -> Vec<LogEntry> {
        self.entries.iter().cloned().collect()
    }
}
