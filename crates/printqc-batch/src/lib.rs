//! Batch engine for printqc.
//!
//! Turns a stream of text tokens into four-slot batches: classifies tokens,
//! fills slots lowest index first, prints complete batches with contiguous
//! sequence numbers, and keeps the history ledger and event log.

pub mod classifier;
pub mod controller;
pub mod error;
pub mod event_log;
pub mod ledger;
pub mod session;
pub mod slots;

pub use classifier::{Classifier, TokenClass};
pub use controller::{
    AutoPrintTicket, BatchController, Effect, IgnoreReason, Notification, Snapshot, Step,
    Timing, Transition,
};
pub use error::BatchError;
pub use event_log::{EventLog, LogEntry};
pub use ledger::{Batch, BatchId, ExportRow, HistoryLedger};
pub use session::{Session, SessionHandle};
pub use slots::{Slot, SlotBuffer};
