//! Error types for the batch engine.

use printqc_core::error::PrintQcError;

/// Errors from batch lifecycle operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BatchError {
    /// A print was requested before all slots were filled.
    #[error("Batch incomplete: {filled}/4 slots filled")]
    IncompleteBatch { filled: usize },
    /// The start sequence cannot change while a batch is being collected.
    #[error("Start sequence is locked while {filled} slot(s) are filled")]
    SequenceLocked { filled: usize },
    /// The requested start sequence leaves no room for a full batch.
    #[error("Start sequence {start} is out of range (max {max})")]
    SequenceOutOfRange { start: u64, max: u64 },
    /// The counter has no room left for another batch.
    #[error("Sequence numbers exhausted at #{next}")]
    SequenceExhausted { next: u64 },
    /// The session task is gone.
    #[error("Batch session closed")]
    SessionClosed,
}

impl From<BatchError> for PrintQcError {
    fn from(err: BatchError) -> Self {
        PrintQcError::Batch(err.to_string())
    }
}
