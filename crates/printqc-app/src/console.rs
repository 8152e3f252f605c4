//! Line-driven console over a batch session.
//!
//! Plain lines are tokens (as if recognized by the microphone); lines
//! starting with `/` are commands. New event log entries are echoed after
//! every line.

use std::io::Write;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use printqc_batch::{BatchError, LogEntry, SessionHandle};
use printqc_core::config::ListenerConfig;
use printqc_core::error::PrintQcError;
use printqc_core::types::Severity;
use printqc_export::{CsvExporter, ExportError};
use printqc_listen::{
    ChannelSource, ListenError, ListenReport, ListenerHandle, ListenerSupervisor, SpeechEvent,
    SupervisorExit,
};

const HELP: &str = "\
Type a number to fill the next slot, or a keyword (print / xóa ...).
Commands:
  /print      print the current batch
  /reset      clear the current batch
  /status     show the session state as JSON
  /export     write the history to CSV
  /start <n>  set the first sequence number of the next batch
  /mic        toggle the listener (lines go through it while on)
  /help       show this help
  /quit       exit";

const MIC_BUFFER: usize = 64;

/// Extra wait past the auto-print delay when draining at exit.
const DRAIN_MARGIN: Duration = Duration::from_millis(50);

/// One parsed console line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Token(String),
    Print,
    Reset,
    Status,
    Export,
    Start(u64),
    Mic,
    Help,
    Quit,
    /// Malformed command; carries the message to show.
    Invalid(String),
}

impl ConsoleCommand {
    /// Parse a line. Blank lines yield `None`.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        if !line.starts_with('/') {
            return Some(ConsoleCommand::Token(line.to_string()));
        }

        let mut parts = line.split_whitespace();
        let name = parts.next().unwrap_or_default().to_lowercase();
        let command = match name.as_str() {
            "/print" => ConsoleCommand::Print,
            "/reset" => ConsoleCommand::Reset,
            "/status" => ConsoleCommand::Status,
            "/export" => ConsoleCommand::Export,
            "/mic" => ConsoleCommand::Mic,
            "/help" => ConsoleCommand::Help,
            "/quit" | "/exit" => ConsoleCommand::Quit,
            "/start" => match parts.next().map(str::parse::<u64>) {
                Some(Ok(n)) => ConsoleCommand::Start(n),
                _ => ConsoleCommand::Invalid("Usage: /start <n>".to_string()),
            },
            other => ConsoleCommand::Invalid(format!("Unknown command {}. Type /help.", other)),
        };
        Some(command)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

struct Mic {
    feed: mpsc::Sender<SpeechEvent>,
    handle: ListenerHandle,
    task: JoinHandle<Result<ListenReport, ListenError>>,
}

pub struct Console<W: Write> {
    session: SessionHandle,
    exporter: CsvExporter,
    listener: ListenerConfig,
    auto_print_delay: Option<Duration>,
    mic: Option<Mic>,
    last_seen: Option<LogEntry>,
    out: W,
}

impl<W: Write> Console<W> {
    pub fn new(
        session: SessionHandle,
        exporter: CsvExporter,
        listener: ListenerConfig,
        auto_print_delay: Option<Duration>,
        out: W,
    ) -> Self {
        Self {
            session,
            exporter,
            listener,
            auto_print_delay,
            mic: None,
            last_seen: None,
            out,
        }
    }

    pub fn mic_on(&self) -> bool {
        self.mic.is_some()
    }

    /// Handle one console line.
    pub async fn handle_line(&mut self, line: &str) -> Result<Flow, PrintQcError> {
        self.reap_mic().await?;
        let Some(command) = ConsoleCommand::parse(line) else {
            return Ok(Flow::Continue);
        };

        match command {
            ConsoleCommand::Token(text) => self.submit(text).await?,
            ConsoleCommand::Print => match self.session.request_print().await {
                Ok(_) | Err(BatchError::IncompleteBatch { .. }) => {}
                Err(e) => return Err(e.into()),
            },
            ConsoleCommand::Reset => {
                self.session.request_reset().await?;
            }
            ConsoleCommand::Status => {
                let snapshot = self.session.snapshot().await?;
                writeln!(self.out, "{}", serde_json::to_string_pretty(&snapshot)?)?;
            }
            ConsoleCommand::Export => self.export().await?,
            ConsoleCommand::Start(start) => match self.session.set_start_sequence(start).await {
                Ok(()) => {
                    self.session
                        .record(format!("Next batch starts at #{}.", start), Severity::Info)
                        .await?
                }
                Err(
                    e @ (BatchError::SequenceLocked { .. }
                    | BatchError::SequenceOutOfRange { .. }),
                ) => self.session.record(e.to_string(), Severity::Warning).await?,
                Err(e) => return Err(e.into()),
            },
            ConsoleCommand::Mic => self.toggle_mic().await?,
            ConsoleCommand::Help => writeln!(self.out, "{}", HELP)?,
            ConsoleCommand::Invalid(message) => writeln!(self.out, "{}", message)?,
            ConsoleCommand::Quit => return Ok(Flow::Quit),
        }

        self.flush_log().await?;
        Ok(Flow::Continue)
    }

    /// Stop the listener, let a pending auto-print land and echo the last
    /// log entries.
    pub async fn finish(mut self) -> Result<W, PrintQcError> {
        if let Some(mic) = self.mic.take() {
            mic.handle.stop();
            self.report_mic(mic).await?;
        }
        if let Some(delay) = self.auto_print_delay {
            if self.session.snapshot().await?.auto_print_pending {
                tracing::debug!("Waiting for pending auto-print");
                tokio::time::sleep(delay + DRAIN_MARGIN).await;
            }
        }
        self.flush_log().await?;
        Ok(self.out)
    }

    async fn submit(&mut self, text: String) -> Result<(), PrintQcError> {
        if let Some(ref mic) = self.mic {
            match mic.feed.send(SpeechEvent::Transcript(text)).await {
                Ok(()) => return Ok(()),
                // Listener already gone; apply the line directly.
                Err(mpsc::error::SendError(SpeechEvent::Transcript(text))) => {
                    return self.submit_direct(text).await
                }
                Err(_) => return Ok(()),
            }
        }
        self.submit_direct(text).await
    }

    async fn submit_direct(&mut self, text: String) -> Result<(), PrintQcError> {
        match self.session.submit_token(text).await {
            // Rejections are already in the event log.
            Ok(_)
            | Err(BatchError::IncompleteBatch { .. })
            | Err(BatchError::SequenceExhausted { .. }) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn export(&mut self) -> Result<(), PrintQcError> {
        let rows = self.session.export_rows().await?;
        let (message, severity) = match self.exporter.export(&rows) {
            Ok(path) => (
                format!("Exported {} rows to {}.", rows.len(), path.display()),
                Severity::Success,
            ),
            Err(ExportError::EmptyHistory) => ("No data to export.".to_string(), Severity::Warning),
            Err(e) => {
                tracing::warn!(error = %e, "Export failed");
                (format!("Export failed: {}", e), Severity::Error)
            }
        };
        self.session.record(message, severity).await?;
        Ok(())
    }

    async fn toggle_mic(&mut self) -> Result<(), PrintQcError> {
        if let Some(mic) = self.mic.take() {
            mic.handle.stop();
            return self.report_mic(mic).await;
        }

        let (source, feed) = ChannelSource::new(MIC_BUFFER);
        let supervisor = ListenerSupervisor::new(self.session.clone(), &self.listener);
        let handle = supervisor.handle();
        let task = tokio::spawn(supervisor.run(source));
        tracing::info!(language = %self.listener.language, "Listener switched on");
        self.mic = Some(Mic { feed, handle, task });
        Ok(())
    }

    /// Collect a listener that stopped on its own.
    async fn reap_mic(&mut self) -> Result<(), PrintQcError> {
        if self.mic.as_ref().is_some_and(|mic| mic.task.is_finished()) {
            if let Some(mic) = self.mic.take() {
                self.report_mic(mic).await?;
            }
        }
        Ok(())
    }

    async fn report_mic(&mut self, mic: Mic) -> Result<(), PrintQcError> {
        drop(mic.feed);
        let result = mic
            .task
            .await
            .map_err(|e| PrintQcError::Listener(e.to_string()))?;
        match result {
            Ok(report) => {
                let reason = match report.exit {
                    SupervisorExit::Stopped | SupervisorExit::SourceClosed => "stopped".to_string(),
                    SupervisorExit::Faulted(fault) => format!("fault: {}", fault),
                    SupervisorExit::RestartLimit => "restart limit reached".to_string(),
                };
                writeln!(
                    self.out,
                    "Microphone off ({}; {} transcripts, {} restarts).",
                    reason, report.transcripts, report.restarts
                )?;
            }
            Err(e) => writeln!(self.out, "Microphone failed: {}", e)?,
        }
        Ok(())
    }

    /// Print log entries added since the last flush, oldest first.
    async fn flush_log(&mut self) -> Result<(), PrintQcError> {
        let log = self.session.snapshot().await?.log;
        let fresh = log
            .iter()
            .position(|entry| Some(entry) == self.last_seen.as_ref())
            .unwrap_or(log.len());
        for entry in log[..fresh].iter().rev() {
            writeln!(
                self.out,
                "[{}] {} {}",
                entry.severity,
                entry.timestamp.format("%H:%M:%S"),
                entry.message
            )?;
        }
        if let Some(newest) = log.first() {
            self.last_seen = Some(newest.clone());
        }
        Ok(())
    }
}
