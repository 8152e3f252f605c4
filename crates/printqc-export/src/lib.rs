//! History export for printqc.
//!
//! Encodes the export row set (one row per batch slot) as comma-delimited
//! text and writes it to a dated file. The row contract itself comes from
//! [`printqc_batch::HistoryLedger::export_rows`]; this crate only decides the
//! byte layout.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, NaiveDate, Utc};

use printqc_batch::ExportRow;
use printqc_core::config::ExportConfig;
use printqc_core::error::PrintQcError;
use printqc_core::types::ExportTimezone;

const BOM: char = '\u{FEFF}';

/// Errors from history export.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("No printed batches to export")]
    EmptyHistory,
    #[error("Invalid time format: {0:?}")]
    InvalidTimeFormat(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ExportError> for PrintQcError {
    fn from(err: ExportError) -> Self {
        match err {
            ExportError::Io(e) => PrintQcError::Io(e),
            other => PrintQcError::Export(other.to_string()),
        }
    }
}

/// Writes export rows as CSV.
#[derive(Debug, Clone)]
pub struct CsvExporter {
    config: ExportConfig,
}

impl CsvExporter {
    pub fn new(config: ExportConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ExportConfig {
        &self.config
    }

    /// Render rows as CSV text: optional BOM, header line, one line per row.
    pub fn encode(&self, rows: &[ExportRow]) -> Result<String, ExportError> {
        let mut out = String::new();
        if self.config.bom {
            out.push(BOM);
        }
        push_record(&mut out, self.config.header.iter().map(String::as_str));

        for row in rows {
            let time = self.format_time(row.timestamp)?;
            let batch_id = row.batch_id.to_string();
            let sequence = row.sequence.to_string();
            push_record(
                &mut out,
                [
                    time.as_str(),
                    batch_id.as_str(),
                    sequence.as_str(),
                    row.label.as_str(),
                    row.value.as_str(),
                ],
            );
        }
        Ok(out)
    }

    /// `<prefix><YYYY-MM-DD>.csv`
    pub fn file_name(&self, date: NaiveDate) -> String {
        format!("{}{}.csv", self.config.file_prefix, date.format("%Y-%m-%d"))
    }

    /// Write rows to the configured directory under today's file name.
    ///
    /// Refuses to write anything when `rows` is empty.
    pub fn export(&self, rows: &[ExportRow]) -> Result<PathBuf, ExportError> {
        let today = Local::now().date_naive();
        let path = Path::new(&self.config.dir).join(self.file_name(today));
        self.export_to(rows, &path)?;
        Ok(path)
    }

    /// Write rows to an explicit path, creating parent directories.
    pub fn export_to(&self, rows: &[ExportRow], path: &Path) -> Result<(), ExportError> {
        if rows.is_empty() {
            return Err(ExportError::EmptyHistory);
        }
        let content = self.encode(rows)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        tracing::info!(path = %path.display(), rows = rows.len(), "History exported");
        Ok(())
    }

    fn format_time(&self, at: DateTime<Utc>) -> Result<String, ExportError> {
        let mut out = String::new();
        let written = match self.config.timezone {
            ExportTimezone::Utc => write!(out, "{}", at.format(&self.config.time_format)),
            ExportTimezone::Local => write!(
                out,
                "{}",
                at.with_timezone(&Local).format(&self.config.time_format)
            ),
        };
        written.map_err(|_| ExportError::InvalidTimeFormat(self.config.time_format.clone()))?;
        Ok(out)
    }
}

fn push_record<'a>(out: &mut String, fields: impl IntoIterator<Item = &'a str>) {
    for (i, field) in fields.into_iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        push_field(out, field);
    }
    out.push('\n');
}

/// Quote a field only when it contains a delimiter, quote or line break.
fn push_field(out: &mut String, field: &str) {
    if field.contains([',', '"', '\n', '\r']) {
        out.push('"');
        out.push_str(&field.replace('"', "\"\""));
        out.push('"');
    } else {
        out.push_str(field);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use printqc_batch::{Batch, BatchId, HistoryLedger};
    use printqc_core::types::default_labels;

    fn utc_config() -> ExportConfig {
        ExportConfig {
            timezone: ExportTimezone::Utc,
            ..ExportConfig::default()
        }
    }

    fn ledger_with(batches: &[(i64, u64, [&str; 4])]) -> HistoryLedger {
        let mut ledger = HistoryLedger::new();
        for (id, start, values) in batches {
            let at = Utc.with_ymd_and_hms(2026, 3, 14, 9, 26, 53).unwrap();
            ledger.append(Batch::new(BatchId(*id), *start, values.map(String::from), at));
        }
        ledger
    }

    #[test]
    fn test_encode_layout() {
        let ledger = ledger_with(&[(1_773_480_413_000, 1000, ["12", "25.5", "30", "5.2"])]);
        let rows = ledger.export_rows(&default_labels());
        let csv = CsvExporter::new(utc_config()).encode(&rows).unwrap();

        let mut lines = csv.lines();
        assert_eq!(
            lines.next().unwrap(),
            "\u{FEFF}Thoi Gian,Batch ID,So Thu Tu (Barcode),Ten Nhan (Label),So Do"
        );
        assert_eq!(lines.next().unwrap(), "09:26:53,1773480413000,1000,Label 1,12");
        assert_eq!(lines.next().unwrap(), "09:26:53,1773480413000,1001,Label 2,25.5");
        assert_eq!(lines.next().unwrap(), "09:26:53,1773480413000,1002,Label 3,30");
        assert_eq!(lines.next().unwrap(), "09:26:53,1773480413000,1003,Label 4,5.2");
        assert!(lines.next().is_none());
        assert!(csv.ends_with('\n'));
    }

    #[test]
    fn test_encode_four_rows_per_batch() {
        let ledger = ledger_with(&[
            (1, 1000, ["1", "2", "3", "4"]),
            (2, 1004, ["5", "6", "7", "8"]),
            (3, 1008, ["9", "10", "11", "12"]),
        ]);
        let rows = ledger.export_rows(&default_labels());
        let csv = CsvExporter::new(utc_config()).encode(&rows).unwrap();
        // Header plus 4 rows per batch.
        assert_eq!(csv.lines().count(), 1 + 12);
        let first_data = csv.lines().nth(1).unwrap();
        assert!(first_data.contains(",1008,"));
    }

    #[test]
    fn test_encode_without_bom() {
        let config = ExportConfig {
            bom: false,
            ..utc_config()
        };
        let ledger = ledger_with(&[(1, 1, ["1", "2", "3", "4"])]);
        let csv = CsvExporter::new(config)
            .encode(&ledger.export_rows(&default_labels()))
            .unwrap();
        assert!(csv.starts_with("Thoi Gian,"));
    }

    #[test]
    fn test_fields_with_delimiters_are_quoted() {
        let labels = [
            "Length, cm".to_string(),
            "Width \"W\"".to_string(),
            "Height".to_string(),
            "Weight".to_string(),
        ];
        let ledger = ledger_with(&[(1, 1, ["1", "2", "3", "4"])]);
        let csv = CsvExporter::new(utc_config())
            .encode(&ledger.export_rows(&labels))
            .unwrap();
        assert!(csv.contains(",\"Length, cm\",1\n"));
        assert!(csv.contains(",\"Width \"\"W\"\"\",2\n"));
        assert!(csv.contains(",Height,3\n"));
    }

    #[test]
    fn test_custom_time_format() {
        let config = ExportConfig {
            time_format: "%Y-%m-%d %H:%M".to_string(),
            ..utc_config()
        };
        let ledger = ledger_with(&[(1, 1, ["1", "2", "3", "4"])]);
        let csv = CsvExporter::new(config)
            .encode(&ledger.export_rows(&default_labels()))
            .unwrap();
        assert!(csv.lines().nth(1).unwrap().starts_with("2026-03-14 09:26,1,1,"));
    }

    #[test]
    fn test_invalid_time_format() {
        let config = ExportConfig {
            time_format: "%Q".to_string(),
            ..utc_config()
        };
        let ledger = ledger_with(&[(1, 1, ["1", "2", "3", "4"])]);
        let result = CsvExporter::new(config).encode(&ledger.export_rows(&default_labels()));
        assert!(matches!(result, Err(ExportError::InvalidTimeFormat(_))));
    }

    #[test]
    fn test_file_name() {
        let exporter = CsvExporter::new(ExportConfig::default());
        let date = NaiveDate::from_ymd_opt(2026, 10, 16).unwrap();
        assert_eq!(exporter.file_name(date), "ChiTiet_SoDo_2026-10-16.csv");
    }

    #[test]
    fn test_export_empty_history_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let config = ExportConfig {
            dir: dir.path().to_string_lossy().to_string(),
            ..utc_config()
        };
        let result = CsvExporter::new(config).export(&[]);
        assert!(matches!(result, Err(ExportError::EmptyHistory)));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_export_writes_dated_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = ExportConfig {
            dir: dir.path().join("exports").to_string_lossy().to_string(),
            ..utc_config()
        };
        let exporter = CsvExporter::new(config);
        let ledger = ledger_with(&[(7, 1000, ["1", "2", "3", "4"])]);
        let rows = ledger.export_rows(&default_labels());

        let path = exporter.export(&rows).unwrap();
        assert!(path.exists());
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("ChiTiet_SoDo_"));
        assert!(name.ends_with(".csv"));

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[..3], &[0xEF, 0xBB, 0xBF]);
        let text = String::from_utf8(bytes).unwrap();
        assert_eq!(text.lines().count(), 5);
    }

    #[test]
    fn test_export_error_into_printqc_error() {
        let err: PrintQcError = ExportError::EmptyHistory.into();
        assert!(matches!(err, PrintQcError::Export(_)));

        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: PrintQcError = ExportError::Io(io).into();
        assert!(matches!(err, PrintQcError::Io(_)));
    }
}
