//! Speech listener for printqc.
//!
//! A [`SpeechSource`] produces recognized transcripts; the
//! [`ListenerSupervisor`] keeps one running for as long as listening is on,
//! forwards transcripts into the batch session as tokens and restarts the
//! source whenever it ends on its own.

pub mod error;
pub mod source;
pub mod state;
pub mod supervisor;

pub use error::ListenError;
pub use source::{ChannelSource, SpeechEvent, SpeechSource};
pub use state::{ListenerState, StateMachine};
pub use supervisor::{ListenReport, ListenerHandle, ListenerSupervisor, RestartPolicy, SupervisorExit};
