//! Keeps a speech source running while listening is on.
//!
//! Recognizers end their sessions on their own (silence, service limits).
//! The supervisor restarts them after a short pause until it is stopped, a
//! reportable fault arrives, or the restart limit is reached. Transcripts are
//! forwarded to the batch session as tokens.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Notify;
use uuid::Uuid;

use printqc_batch::{BatchError, SessionHandle};
use printqc_core::config::ListenerConfig;
use printqc_core::types::ListenerFault;

use crate::error::ListenError;
use crate::source::{SpeechEvent, SpeechSource};
use crate::state::{ListenerState, StateMachine};

/// When and how often an ended source is restarted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestartPolicy {
    pub delay: Duration,
    /// `None` restarts indefinitely.
    pub max_restarts: Option<u32>,
}

impl Default for RestartPolicy {
    fn default() -> Self {
        Self::from(&ListenerConfig::default())
    }
}

impl From<&ListenerConfig> for RestartPolicy {
    fn from(config: &ListenerConfig) -> Self {
        Self {
            delay: config.restart_delay(),
            max_restarts: config.restart_limit(),
        }
    }
}

/// Why a supervisor run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SupervisorExit {
    /// [`ListenerHandle::stop`] was called.
    Stopped,
    /// A reportable fault ended listening.
    Faulted(ListenerFault),
    /// The source ended once more than the policy allows.
    RestartLimit,
    /// The source will never produce another event.
    SourceClosed,
}

/// Summary of one supervisor run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenReport {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub restarts: u32,
    pub transcripts: u64,
    pub exit: SupervisorExit,
}

/// Stop switch and state view for a running supervisor.
#[derive(Debug, Clone)]
pub struct ListenerHandle {
    shutdown: Arc<Notify>,
    state: StateMachine,
}

impl ListenerHandle {
    /// Ask the supervisor to stop. Takes effect even if called before the
    /// supervisor reaches its next wait.
    pub fn stop(&self) {
        self.shutdown.notify_one();
    }

    pub fn state(&self) -> ListenerState {
        self.state.current()
    }
}

#[derive(Debug, Default)]
struct Counters {
    restarts: u32,
    transcripts: u64,
}

pub struct ListenerSupervisor {
    session: SessionHandle,
    policy: RestartPolicy,
    state: StateMachine,
    shutdown: Arc<Notify>,
}

impl ListenerSupervisor {
    pub fn new(session: SessionHandle, config: &ListenerConfig) -> Self {
        Self::with_policy(session, RestartPolicy::from(config))
    }

    pub fn with_policy(session: SessionHandle, policy: RestartPolicy) -> Self {
        Self {
            session,
            policy,
            state: StateMachine::new(),
            shutdown: Arc::new(Notify::new()),
        }
    }

    pub fn handle(&self) -> ListenerHandle {
        ListenerHandle {
            shutdown: Arc::clone(&self.shutdown),
            state: self.state.clone(),
        }
    }

    pub fn policy(&self) -> RestartPolicy {
        self.policy
    }

    /// Run `source` until stopped, faulted or exhausted.
    ///
    /// The session is marked listening once the source starts and
    /// not-listening when the run ends, whatever the reason. Failures (a
    /// source that will not start or restart, a rejected state change) are
    /// logged to the session as microphone errors before being returned.
    pub async fn run<S: SpeechSource>(self, mut source: S) -> Result<ListenReport, ListenError> {
        let id = Uuid::new_v4();
        let started_at = Utc::now();

        self.state.transition(ListenerState::Starting)?;
        if let Err(e) = source.start().await {
            tracing::warn!(listen_id = %id, error = %e, "Speech source failed to start");
            self.state.reset();
            self.report_failure(&e).await;
            return Err(e);
        }
        self.state.transition(ListenerState::Listening)?;
        tracing::info!(listen_id = %id, "Listener started");

        let mut counters = Counters::default();
        let outcome = match self.session.set_listening(true).await {
            Ok(()) => self.drive(id, &mut source, &mut counters).await,
            Err(e) => Err(e.into()),
        };

        source.stop().await;
        self.state.reset();
        let exit = match outcome {
            Ok(exit) => exit,
            Err(e) => {
                tracing::warn!(listen_id = %id, error = %e, "Listener aborted");
                self.report_failure(&e).await;
                return Err(e);
            }
        };
        self.session.set_listening(false).await?;

        tracing::info!(
            listen_id = %id,
            restarts = counters.restarts,
            transcripts = counters.transcripts,
            exit = ?exit,
            "Listener stopped"
        );
        Ok(ListenReport {
            id,
            started_at,
            ended_at: Utc::now(),
            restarts: counters.restarts,
            transcripts: counters.transcripts,
            exit,
        })
    }

    /// Surface a failed run in the event log and drop the listening flag.
    async fn report_failure(&self, err: &ListenError) {
        if matches!(err, ListenError::Session(BatchError::SessionClosed)) {
            return;
        }
        let fault = ListenerFault::Other(err.to_string());
        if let Err(e) = self.session.report_listener_fault(fault).await {
            tracing::debug!(error = %e, "Could not report listener failure");
            return;
        }
        if let Err(e) = self.session.set_listening(false).await {
            tracing::debug!(error = %e, "Could not clear listening flag");
        }
    }

    async fn drive<S: SpeechSource>(
        &self,
        id: Uuid,
        source: &mut S,
        counters: &mut Counters,
    ) -> Result<SupervisorExit, ListenError> {
        loop {
            let event = tokio::select! {
                _ = self.shutdown.notified() => return Ok(SupervisorExit::Stopped),
                event = source.next_event() => event,
            };

            match event {
                None => return Ok(SupervisorExit::SourceClosed),
                Some(SpeechEvent::Transcript(text)) => {
                    let token = text.trim().to_lowercase();
                    if token.is_empty() {
                        continue;
                    }
                    counters.transcripts += 1;
                    match self.session.submit_token(token).await {
                        Ok(transition) => {
                            tracing::debug!(listen_id = %id, ?transition, "Transcript applied")
                        }
                        Err(BatchError::SessionClosed) => {
                            return Err(BatchError::SessionClosed.into())
                        }
                        // Already surfaced in the event log.
                        Err(e) => tracing::debug!(listen_id = %id, error = %e, "Transcript rejected"),
                    }
                }
                Some(SpeechEvent::Fault(fault)) => {
                    if !fault.is_reportable() {
                        tracing::debug!(listen_id = %id, "No speech detected");
                        continue;
                    }
                    tracing::warn!(listen_id = %id, %fault, "Speech source fault");
                    self.session.report_listener_fault(fault.clone()).await?;
                    return Ok(SupervisorExit::Faulted(fault));
                }
                Some(SpeechEvent::Ended) => {
                    if self
                        .policy
                        .max_restarts
                        .is_some_and(|limit| counters.restarts >= limit)
                    {
                        tracing::warn!(listen_id = %id, restarts = counters.restarts, "Restart limit reached");
                        return Ok(SupervisorExit::RestartLimit);
                    }
                    self.state.transition(ListenerState::Restarting)?;
                    tokio::select! {
                        _ = self.shutdown.notified() => return Ok(SupervisorExit::Stopped),
                        _ = tokio::time::sleep(self.policy.delay) => {}
                    }
                    self.state.transition(ListenerState::Starting)?;
                    source.start().await?;
                    self.state.transition(ListenerState::Listening)?;
                    counters.restarts += 1;
                    tracing::debug!(listen_id = %id, restarts = counters.restarts, "Speech source restarted");
                }
            }
        }
    }
}
