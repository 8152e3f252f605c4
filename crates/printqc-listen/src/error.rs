use printqc_batch::BatchError;
use printqc_core::error::PrintQcError;

use crate::state::ListenerState;

/// Errors from the speech listener.
#[derive(Debug, thiserror::Error)]
pub enum ListenError {
    #[error("Speech source unavailable: {0}")]
    SourceUnavailable(String),
    #[error("Speech source closed")]
    SourceClosed,
    #[error("Invalid listener transition: {from} -> {to}")]
    InvalidTransition {
        from: ListenerState,
        to: ListenerState,
    },
    #[error("Session error: {0}")]
    Session(#[from] BatchError),
}

impl From<ListenError> for PrintQcError {
    fn from(err: ListenError) -> Self {
        PrintQcError::Listener(err.to_string())
    }
}
