//! Speech source abstraction.
//!
//! Real recognizers (a cloud service, a local model) live behind
//! [`SpeechSource`]. [`ChannelSource`] feeds pre-recognized text in through a
//! channel and backs both the console and the tests.

use async_trait::async_trait;
use tokio::sync::mpsc;

use printqc_core::types::ListenerFault;

use crate::error::ListenError;

/// One event from a running speech source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeechEvent {
    /// A finalized recognition result.
    Transcript(String),
    Fault(ListenerFault),
    /// The recognition session ended on its own (silence timeout, service
    /// session limit). The supervisor decides whether to restart.
    Ended,
}

#[async_trait]
pub trait SpeechSource: Send {
    /// Begin (or resume) a recognition session.
    async fn start(&mut self) -> Result<(), ListenError>;

    /// Next event, or `None` once the source is gone for good.
    async fn next_event(&mut self) -> Option<SpeechEvent>;

    /// End the current recognition session.
    async fn stop(&mut self);
}

/// Speech source fed from an mpsc channel.
#[derive(Debug)]
pub struct ChannelSource {
    events: mpsc::Receiver<SpeechEvent>,
    running: bool,
}

impl ChannelSource {
    /// Create a source and the sender that feeds it.
    pub fn new(buffer: usize) -> (Self, mpsc::Sender<SpeechEvent>) {
        let (tx, events) = mpsc::channel(buffer.max(1));
        (
            Self {
                events,
                running: false,
            },
            tx,
        )
    }

    pub fn is_running(&self) -> bool {
        self.running
    }
}

#[async_trait]
impl SpeechSource for ChannelSource {
    async fn start(&mut self) -> Result<(), ListenError> {
        if self.events.is_closed() && self.events.is_empty() {
            return Err(ListenError::SourceClosed);
        }
        self.running = true;
        Ok(())
    }

    async fn next_event(&mut self) -> Option<SpeechEvent> {
        self.events.recv().await
    }

    async fn stop(&mut self) {
        self.running = false;
    }
}
