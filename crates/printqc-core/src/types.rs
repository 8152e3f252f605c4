use std::fmt;

use serde::{Deserialize, Serialize};

/// Number of slots that make up one batch.
pub const SLOT_COUNT: usize = 4;

/// Highest first sequence number a batch may take. Keeps `start + 3` and the
/// following counter value inside `u64`.
pub const MAX_START_SEQUENCE: u64 = u64::MAX - SLOT_COUNT as u64;

// =============================================================================
// Enums
// =============================================================================

/// Severity of a user-facing event log entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Success => write!(f, "success"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

/// How command keywords are matched against a token.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeywordMatch {
    /// The keyword must appear as a whole word (or whole word sequence).
    #[default]
    Word,
    /// Raw substring containment anywhere in the token.
    Substring,
}

/// Time zone used when rendering export timestamps.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportTimezone {
    #[default]
    Local,
    Utc,
}

/// A failure reported by the speech recognition collaborator.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListenerFault {
    /// The recognizer heard nothing. Routine during continuous listening.
    NoSpeech,
    /// Any other recognizer failure (permission denied, device lost, ...).
    Other(String),
}

impl ListenerFault {
    /// Whether this fault should be surfaced to the user.
    pub fn is_reportable(&self) -> bool {
        !matches!(self, ListenerFault::NoSpeech)
    }
}

impl fmt::Display for ListenerFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListenerFault::NoSpeech => write!(f, "no-speech"),
            ListenerFault::Other(msg) => write!(f, "{}", msg),
        }
    }
}

/// Default slot labels, in slot order.
pub fn default_labels() -> [String; SLOT_COUNT] {
    [
        "Label 1".to_string(),
        "Label 2".to_string(),
        "Label 3".to_string(),
        "Label 4".to_string(),
    ]
}
