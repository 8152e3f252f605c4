use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{PrintQcError, Result};
use crate::types::{default_labels, ExportTimezone, KeywordMatch, MAX_START_SEQUENCE, SLOT_COUNT};

/// Number of columns in an export row.
pub const EXPORT_COLUMNS: usize = 5;

/// Top-level configuration for the printqc application.
///
/// Loaded from `~/.printqc/config.toml` by default. Every section falls
/// back to its defaults when missing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PrintQcConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub batch: BatchConfig,
    #[serde(default)]
    pub keywords: KeywordConfig,
    #[serde(default)]
    pub event_log: EventLogConfig,
    #[serde(default)]
    pub listener: ListenerConfig,
    #[serde(default)]
    pub export: ExportConfig,
}

impl PrintQcConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read, parsed, or fails validation.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: PrintQcConfig = toml::from_str(&content)?;
        config.validate()?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or is invalid.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }

    /// Check cross-field constraints that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.batch.start_sequence > MAX_START_SEQUENCE {
            return Err(PrintQcError::Config(format!(
                "batch.start_sequence must be at most {}, got {}",
                MAX_START_SEQUENCE, self.batch.start_sequence
            )));
        }
        if self.batch.auto_print_delay_ms == 0 {
            return Err(PrintQcError::Config(
                "batch.auto_print_delay_ms must be greater than zero".into(),
            ));
        }
        if self.batch.notification_ms == 0 {
            return Err(PrintQcError::Config(
                "batch.notification_ms must be greater than zero".into(),
            ));
        }
        if let Some(label) = self.batch.labels.iter().find(|l| l.trim().is_empty()) {
            return Err(PrintQcError::Config(format!(
                "batch.labels contains an empty label: {:?}",
                label
            )));
        }
        for (section, words) in [
            ("keywords.print", &self.keywords.print),
            ("keywords.reset", &self.keywords.reset),
        ] {
            if words.iter().any(|w| w.trim().is_empty()) {
                return Err(PrintQcError::Config(format!(
                    "{} contains an empty keyword",
                    section
                )));
            }
        }
        if self.export.header.len() != EXPORT_COLUMNS {
            return Err(PrintQcError::Config(format!(
                "export.header must have {} columns, got {}",
                EXPORT_COLUMNS,
                self.export.header.len()
            )));
        }
        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// Batch lifecycle settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Sequence number assigned to the first slot of the first batch.
    pub start_sequence: u64,
    /// Fixed label of each slot, in slot order.
    pub labels: [String; SLOT_COUNT],
    /// Print automatically once the last slot is filled.
    pub auto_print: bool,
    /// Grace window between filling the last slot and auto-printing.
    pub auto_print_delay_ms: u64,
    /// How long the "last printed" notification stays visible.
    pub notification_ms: u64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            start_sequence: 1000,
            labels: default_labels(),
            auto_print: true,
            auto_print_delay_ms: 1000,
            notification_ms: 3000,
        }
    }
}

impl BatchConfig {
    pub fn auto_print_delay(&self) -> Duration {
        Duration::from_millis(self.auto_print_delay_ms)
    }

    pub fn notification_duration(&self) -> Duration {
        Duration::from_millis(self.notification_ms)
    }
}

/// Command keyword sets used by the token classifier.
///
/// Keywords match whole words by default, so "okay" or "printing" are not
/// print commands and "in" does not fire inside "again" or "xin". Set
/// `match_mode = "substring"` for plain containment matching, where any
/// token containing a keyword triggers it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KeywordConfig {
    /// Keywords that trigger a print.
    pub print: Vec<String>,
    /// Keywords that clear the in-progress batch.
    pub reset: Vec<String>,
    /// Whole-word or raw substring matching.
    pub match_mode: KeywordMatch,
}

impl Default for KeywordConfig {
    fn default() -> Self {
        Self {
            print: ["in", "print", "xong", "ok", "done"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            reset: ["xóa", "lại", "hủy", "reset", "clear", "again", "cancel"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            match_mode: KeywordMatch::Word,
        }
    }
}

/// Event log retention.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EventLogConfig {
    /// Maximum retained entries. `0` keeps everything.
    pub capacity: usize,
}

impl Default for EventLogConfig {
    fn default() -> Self {
        Self { capacity: 500 }
    }
}

/// Speech listener supervision.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Recognition language tag handed to the speech engine.
    pub language: String,
    /// Pause before restarting a session that ended on its own.
    pub restart_delay_ms: u64,
    /// Maximum automatic restarts. `0` restarts indefinitely.
    pub max_restarts: u32,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            language: "vi-VN".to_string(),
            restart_delay_ms: 250,
            max_restarts: 0,
        }
    }
}

impl ListenerConfig {
    pub fn restart_delay(&self) -> Duration {
        Duration::from_millis(self.restart_delay_ms)
    }

    /// Restart limit, or `None` when unlimited.
    pub fn restart_limit(&self) -> Option<u32> {
        (self.max_restarts > 0).then_some(self.max_restarts)
    }
}

/// History export settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Directory export files are written to.
    pub dir: String,
    /// File name prefix; the export date and `.csv` are appended.
    pub file_prefix: String,
    /// Header line columns.
    pub header: Vec<String>,
    /// Prepend a UTF-8 byte-order mark so spreadsheet tools pick the right encoding.
    pub bom: bool,
    /// strftime format for the timestamp column.
    pub time_format: String,
    /// Time zone for the timestamp column.
    pub timezone: ExportTimezone,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            dir: ".".to_string(),
            file_prefix: "ChiTiet_SoDo_".to_string(),
            header: [
                "Thoi Gian",
                "Batch ID",
                "So Thu Tu (Barcode)",
                "Ten Nhan (Label)",
                "So Do",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            bom: true,
            time_format: "%H:%M:%S".to_string(),
            timezone: ExportTimezone::Local,
        }
    }
}
