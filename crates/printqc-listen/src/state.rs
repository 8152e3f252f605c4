//! Listener lifecycle state with validated transitions.
//!
//! - Idle -> Starting (listening switched on)
//! - Starting -> Listening (source started)
//! - Listening -> Restarting (source ended on its own)
//! - Restarting -> Starting (restart delay elapsed)
//! - any -> Idle (stopped, faulted or failed to start)

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::ListenError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListenerState {
    /// Not listening.
    Idle,
    /// Waiting for the source to come up.
    Starting,
    /// Source running; transcripts flow into the session.
    Listening,
    /// Source ended; waiting out the restart delay.
    Restarting,
}

impl fmt::Display for ListenerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListenerState::Idle => write!(f, "Idle"),
            ListenerState::Starting => write!(f, "Starting"),
            ListenerState::Listening => write!(f, "Listening"),
            ListenerState::Restarting => write!(f, "Restarting"),
        }
    }
}

impl ListenerState {
    pub fn can_transition_to(&self, target: &ListenerState) -> bool {
        matches!(
            (self, target),
            (ListenerState::Idle, ListenerState::Starting)
                | (ListenerState::Starting, ListenerState::Listening)
                | (ListenerState::Listening, ListenerState::Restarting)
                | (ListenerState::Restarting, ListenerState::Starting)
                | (ListenerState::Starting, ListenerState::Idle)
                | (ListenerState::Listening, ListenerState::Idle)
                | (ListenerState::Restarting, ListenerState::Idle)
        )
    }

    /// Whether a source is up or about to be.
    pub fn is_active(&self) -> bool {
        !matches!(self, ListenerState::Idle)
    }
}

/// Shared listener state, readable from outside the supervisor task.
#[derive(Debug, Clone)]
pub struct StateMachine {
    state: Arc<Mutex<ListenerState>>,
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl StateMachine {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(ListenerState::Idle)),
        }
    }

    pub fn current(&self) -> ListenerState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Move to `target`, rejecting transitions the lifecycle does not allow.
    pub fn transition(&self, target: ListenerState) -> Result<(), ListenError> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.can_transition_to(&target) {
            tracing::debug!("Listener state: {} -> {}", *state, target);
            *state = target;
            Ok(())
        } else {
            Err(ListenError::InvalidTransition {
                from: *state,
                to: target,
            })
        }
    }

    /// Force back to Idle regardless of the current state.
    pub fn reset(&self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if *state != ListenerState::Idle {
            tracing::debug!("Listener state reset to Idle from {}", *state);
        }
        *state = ListenerState::Idle;
    }
}
