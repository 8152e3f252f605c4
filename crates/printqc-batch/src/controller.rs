//! Batch lifecycle controller.
//!
//! The controller owns the slot buffer, the running sequence counter, the
//! history ledger and the event log. All mutation goes through its public
//! operations, which are processed one at a time by a single owner.
//!
//! The controller never sleeps. Operations that need a deferred follow-up
//! (the auto-print grace window, the expiry of the "last printed"
//! notification) return [`Effect`]s; the driver executes them and calls
//! [`BatchController::fire_auto_print`] or
//! [`BatchController::expire_notification`] back when they are due.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use printqc_core::config::PrintQcConfig;
use printqc_core::types::{ListenerFault, Severity, MAX_START_SEQUENCE, SLOT_COUNT};

use crate::classifier::{Classifier, TokenClass};
use crate::error::BatchError;
use crate::event_log::{EventLog, LogEntry};
use crate::ledger::{Batch, BatchId, ExportRow, HistoryLedger};
use crate::slots::{Slot, SlotBuffer};

/// Identifies one arming of the auto-print timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AutoPrintTicket(u64);

/// Deferred work requested by the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Call `fire_auto_print(ticket)` after `delay`. Supersedes any earlier arming.
    ArmAutoPrint {
        ticket: AutoPrintTicket,
        delay: Duration,
    },
    /// Drop the pending auto-print timer, if any.
    CancelAutoPrint,
    /// Call `expire_notification(batch_id)` after `delay`.
    ExpireNotification { batch_id: BatchId, delay: Duration },
}

/// Why an input produced no state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IgnoreReason {
    /// No keyword and no number in the token.
    Unrecognized,
    /// A number arrived while every slot was filled.
    BufferFull,
    /// An auto-print timer fired after it was superseded or cancelled.
    StaleTimer,
}

/// What an operation did to the batch state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    Filled {
        index: usize,
        sequence: u64,
        value: String,
    },
    Printed(Batch),
    Cleared,
    Ignored(IgnoreReason),
}

/// Result of a controller operation: the transition plus deferred work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub transition: Transition,
    pub effects: Vec<Effect>,
}

impl Step {
    fn new(transition: Transition) -> Self {
        Self {
            transition,
            effects: Vec::new(),
        }
    }

    fn ignored(reason: IgnoreReason) -> Self {
        Self::new(Transition::Ignored(reason))
    }

    fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }
}

/// The transient "last printed" notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub batch: Batch,
    pub shown_at: DateTime<Utc>,
}

impl Notification {
    /// First sequence number of the batch after the printed one.
    pub fn next_sequence(&self) -> u64 {
        self.batch.end_seq + 1
    }
}

/// Read-only copy of everything the presentation layer shows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub slots: Vec<Slot>,
    pub next_sequence: u64,
    pub history: Vec<Batch>,
    pub log: Vec<LogEntry>,
    pub last_printed: Option<Batch>,
    pub listening: bool,
    pub auto_print_pending: bool,
}

/// Timing knobs for the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    /// `None` disables auto-print.
    pub auto_print_delay: Option<Duration>,
    pub notification: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            auto_print_delay: Some(Duration::from_secs(1)),
            notification: Duration::from_secs(3),
        }
    }
}

/// Slot-filling state machine and batch lifecycle owner.
#[derive(Debug)]
pub struct BatchController {
    classifier: Classifier,
    buffer: SlotBuffer,
    labels: [String; SLOT_COUNT],
    next_sequence: u64,
    ledger: HistoryLedger,
    log: EventLog,
    notification: Option<Notification>,
    armed: Option<AutoPrintTicket>,
    tickets_issued: u64,
    last_batch_id: Option<BatchId>,
    listening: bool,
    timing: Timing,
}

impl Default for BatchController {
    fn default() -> Self {
        Self::from_config(&PrintQcConfig::default())
    }
}

impl BatchController {
    pub fn new(
        classifier: Classifier,
        labels: [String; SLOT_COUNT],
        start_sequence: u64,
        log: EventLog,
        timing: Timing,
    ) -> Self {
        Self {
            classifier,
            buffer: SlotBuffer::new(&labels),
            labels,
            next_sequence: start_sequence,
            ledger: HistoryLedger::new(),
            log,
            notification: None,
            armed: None,
            tickets_issued: 0,
            last_batch_id: None,
            listening: false,
            timing,
        }
    }

    pub fn from_config(config: &PrintQcConfig) -> Self {
        let timing = Timing {
            auto_print_delay: config
                .batch
                .auto_print
                .then(|| config.batch.auto_print_delay()),
            notification: config.batch.notification_duration(),
        };
        Self::new(
            Classifier::new(&config.keywords),
            config.batch.labels.clone(),
            config.batch.start_sequence,
            EventLog::with_capacity(config.event_log.capacity),
            timing,
        )
    }

    // =========================================================================
    // Ingress
    // =========================================================================

    /// Classify a raw token and dispatch it.
    ///
    /// This is the only entry point for recognized speech and simulated input,
    /// so both sources behave identically.
    pub fn submit_token(&mut self, text: &str) -> Result<Step, BatchError> {
        match self.classifier.classify(text) {
            TokenClass::Print => self.request_print(),
            TokenClass::Reset => Ok(self.request_reset()),
            TokenClass::Number(value) => self.fill(value),
            TokenClass::Unrecognized => Ok(Step::ignored(IgnoreReason::Unrecognized)),
        }
    }

    /// Print the current batch.
    ///
    /// Fails with [`BatchError::IncompleteBatch`] and an error log entry when
    /// fewer than four slots are filled; nothing else changes in that case.
    pub fn request_print(&mut self) -> Result<Step, BatchError> {
        let filled = self.buffer.filled_count();
        if filled < SLOT_COUNT {
            self.log.push(
                format!("Missing data! Only {}/{} filled.", filled, SLOT_COUNT),
                Severity::Error,
            );
            tracing::debug!(filled, "Print rejected, batch incomplete");
            return Err(BatchError::IncompleteBatch { filled });
        }
        Ok(self.print_batch())
    }

    /// Clear the in-progress batch. Sequence counter and history are untouched.
    pub fn request_reset(&mut self) -> Step {
        self.buffer.reset();
        self.log.push("Data cleared.", Severity::Warning);
        tracing::debug!(next_sequence = self.next_sequence, "Slot buffer reset");

        let step = Step::new(Transition::Cleared);
        match self.armed.take() {
            Some(_) => step.with_effect(Effect::CancelAutoPrint),
            None => step,
        }
    }

    /// Auto-print timer callback. Prints only if `ticket` is still the current
    /// arming and the buffer is still complete.
    pub fn fire_auto_print(&mut self, ticket: AutoPrintTicket) -> Step {
        if self.armed != Some(ticket) || !self.buffer.is_complete() {
            tracing::debug!(?ticket, "Ignoring stale auto-print timer");
            return Step::ignored(IgnoreReason::StaleTimer);
        }
        self.armed = None;
        self.print_batch()
    }

    /// Notification timer callback. Clears the notification only if it still
    /// shows `batch_id`; returns whether it was cleared.
    pub fn expire_notification(&mut self, batch_id: BatchId) -> bool {
        match &self.notification {
            Some(n) if n.batch.id == batch_id => {
                self.notification = None;
                true
            }
            _ => false,
        }
    }

    /// Change the first sequence number of the next batch.
    ///
    /// Only allowed while no slot is filled, and only up to
    /// [`MAX_START_SEQUENCE`].
    pub fn set_start_sequence(&mut self, start: u64) -> Result<(), BatchError> {
        let filled = self.buffer.filled_count();
        if filled > 0 {
            return Err(BatchError::SequenceLocked { filled });
        }
        if start > MAX_START_SEQUENCE {
            return Err(BatchError::SequenceOutOfRange {
                start,
                max: MAX_START_SEQUENCE,
            });
        }
        tracing::info!(from = self.next_sequence, to = start, "Start sequence changed");
        self.next_sequence = start;
        Ok(())
    }

    /// Update the listening indicator. Returns whether it changed.
    pub fn set_listening(&mut self, on: bool) -> bool {
        if self.listening == on {
            return false;
        }
        self.listening = on;
        if on {
            self.log
                .push("Microphone on. Read the numbers...", Severity::Info);
        }
        true
    }

    /// Surface a speech recognizer failure.
    ///
    /// `NoSpeech` is routine and ignored. Anything else is logged and turns
    /// the listening indicator off. Slots and counter are never touched.
    /// Returns whether the fault was reported.
    pub fn report_listener_fault(&mut self, fault: &ListenerFault) -> bool {
        if !fault.is_reportable() {
            return false;
        }
        tracing::warn!(%fault, "Speech recognizer fault");
        self.log
            .push(format!("Microphone error: {}", fault), Severity::Error);
        self.listening = false;
        true
    }

    /// Append a collaborator message to the event log.
    pub fn record(&mut self, message: impl Into<String>, severity: Severity) {
        self.log.push(message, severity);
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub fn slots(&self) -> &[Slot] {
        self.buffer.slots()
    }

    pub fn filled_count(&self) -> usize {
        self.buffer.filled_count()
    }

    pub fn next_sequence(&self) -> u64 {
        self.next_sequence
    }

    pub fn ledger(&self) -> &HistoryLedger {
        &self.ledger
    }

    pub fn event_log(&self) -> &EventLog {
        &self.log
    }

    pub fn notification(&self) -> Option<&Notification> {
        self.notification.as_ref()
    }

    pub fn is_listening(&self) -> bool {
        self.listening
    }

    pub fn auto_print_pending(&self) -> bool {
        self.armed.is_some()
    }

    pub fn labels(&self) -> &[String; SLOT_COUNT] {
        &self.labels
    }

    pub fn export_rows(&self) -> Vec<ExportRow> {
        self.ledger.export_rows(&self.labels)
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            slots: self.buffer.slots().to_vec(),
            next_sequence: self.next_sequence,
            history: self.ledger.to_vec(),
            log: self.log.to_vec(),
            last_printed: self.notification.as_ref().map(|n| n.batch.clone()),
            listening: self.listening,
            auto_print_pending: self.armed.is_some(),
        }
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn fill(&mut self, value: String) -> Result<Step, BatchError> {
        if self.buffer.is_complete() {
            tracing::debug!(%value, "Buffer full, dropping number");
            return Ok(Step::ignored(IgnoreReason::BufferFull));
        }
        if self.next_sequence > MAX_START_SEQUENCE {
            self.log.push(
                format!(
                    "Sequence numbers exhausted at #{}. Set a new start sequence.",
                    self.next_sequence
                ),
                Severity::Error,
            );
            return Err(BatchError::SequenceExhausted {
                next: self.next_sequence,
            });
        }
        let Some(index) = self.buffer.fill_next(value.clone()) else {
            return Ok(Step::ignored(IgnoreReason::BufferFull));
        };
        let sequence = self.next_sequence + index as u64;
        tracing::debug!(index, sequence, %value, "Slot filled");

        let mut step = Step::new(Transition::Filled {
            index,
            sequence,
            value: value.clone(),
        });

        if index == SLOT_COUNT - 1 {
            match self.timing.auto_print_delay {
                Some(delay) => {
                    self.log.push(
                        format!("Final value entered: {}. Auto-printing...", value),
                        Severity::Success,
                    );
                    self.tickets_issued += 1;
                    let ticket = AutoPrintTicket(self.tickets_issued);
                    self.armed = Some(ticket);
                    step = step.with_effect(Effect::ArmAutoPrint { ticket, delay });
                }
                None => {
                    self.log.push(
                        format!("Final value entered: {}. Say print to finish.", value),
                        Severity::Success,
                    );
                }
            }
        } else {
            let label = self.buffer.label(index).unwrap_or_default();
            self.log.push(
                format!("Entered {} (#{}): {}", label, sequence, value),
                Severity::Info,
            );
        }
        Ok(step)
    }

    /// Commit a complete buffer. Callers check completeness first.
    fn print_batch(&mut self) -> Step {
        let values = match self.buffer.values() {
            Some(values) => values,
            None => return Step::ignored(IgnoreReason::StaleTimer),
        };

        let completed_at = Utc::now();
        let id = BatchId::at(completed_at, self.last_batch_id);
        let batch = Batch::new(id, self.next_sequence, values, completed_at);
        self.last_batch_id = Some(id);

        self.ledger.append(batch.clone());
        self.log.push(
            format!("Printing batch: #{} -> #{}", batch.start_seq, batch.end_seq),
            Severity::Success,
        );
        tracing::info!(
            batch_id = %batch.id,
            start_seq = batch.start_seq,
            end_seq = batch.end_seq,
            "Batch printed"
        );

        self.next_sequence += SLOT_COUNT as u64;
        self.buffer.reset();
        self.notification = Some(Notification {
            batch: batch.clone(),
            shown_at: completed_at,
        });

        let mut step = Step::new(Transition::Printed(batch));
        if self.armed.take().is_some() {
            step = step.with_effect(Effect::CancelAutoPrint);
        }
        step.with_effect(Effect::ExpireNotification {
            batch_id: id,
            delay: self.timing.notification,
        })
    }
}
