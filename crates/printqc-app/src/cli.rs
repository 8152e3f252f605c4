//! CLI argument definitions for the printqc console.
//!
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::Parser;
use std::path::PathBuf;

use printqc_core::config::PrintQcConfig;

/// printqc: fill four measurement slots by voice or keyboard and print
/// numbered batches.
#[derive(Parser, Debug)]
#[command(name = "printqc", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// First sequence number of the first batch.
    #[arg(short = 's', long = "start-sequence")]
    pub start_sequence: Option<u64>,

    /// Directory that exported CSV files are written to.
    #[arg(short = 'e', long = "export-dir")]
    pub export_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level")]
    pub log_level: Option<String>,

    /// Wait for an explicit print keyword instead of auto-printing.
    #[arg(long = "no-auto-print")]
    pub no_auto_print: bool,

    /// Read console lines from a file instead of stdin.
    #[arg(long = "script")]
    pub script: Option<PathBuf>,
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > PRINTQC_CONFIG env var > platform default (~/.printqc/config.toml).
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("PRINTQC_CONFIG") {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Overlay command-line settings onto the loaded configuration.
    pub fn apply_overrides(&self, config: &mut PrintQcConfig) {
        if let Some(start) = self.start_sequence {
            config.batch.start_sequence = start;
        }
        if let Some(ref dir) = self.export_dir {
            config.export.dir = dir.to_string_lossy().to_string();
        }
        if let Some(ref level) = self.log_level {
            config.general.log_level = level.clone();
        }
        if self.no_auto_print {
            config.batch.auto_print = false;
        }
    }
}

/// Default config file path for the current platform.
fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(home) = std::env::var("USERPROFILE") {
        return PathBuf::from(home).join(".printqc").join("config.toml");
    }
    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".printqc").join("config.toml");
    }
    PathBuf::from("config.toml")
}
