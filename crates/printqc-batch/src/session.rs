//! Async driver that owns a [`BatchController`] and runs its timers.
//!
//! All ingress is serialized through one command channel, so the controller
//! only ever sees one event at a time. Timer completions arrive on a second,
//! internal channel; the session ends once every [`SessionHandle`] is dropped.

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use printqc_core::types::{ListenerFault, Severity};

use crate::controller::{AutoPrintTicket, BatchController, Effect, Snapshot, Step, Transition};
use crate::error::BatchError;
use crate::ledger::{BatchId, ExportRow};

const COMMAND_BUFFER: usize = 64;

enum Command {
    Token {
        text: String,
        reply: oneshot::Sender<Result<Transition, BatchError>>,
    },
    Print {
        reply: oneshot::Sender<Result<Transition, BatchError>>,
    },
    Reset {
        reply: oneshot::Sender<Transition>,
    },
    SetStartSequence {
        start: u64,
        reply: oneshot::Sender<Result<(), BatchError>>,
    },
    SetListening {
        on: bool,
    },
    ListenerFault {
        fault: ListenerFault,
    },
    Record {
        message: String,
        severity: Severity,
    },
    Snapshot {
        reply: oneshot::Sender<Snapshot>,
    },
    ExportRows {
        reply: oneshot::Sender<Vec<ExportRow>>,
    },
}

#[derive(Debug)]
enum TimerEvent {
    AutoPrintDue(AutoPrintTicket),
    NotificationDue(BatchId),
}

/// Cloneable front door to a running session.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<Command>,
}

impl SessionHandle {
    /// Submit a raw text token (recognized speech or simulated input).
    pub async fn submit_token(&self, text: impl Into<String>) -> Result<Transition, BatchError> {
        let text = text.into();
        self.request(|reply| Command::Token { text, reply }).await?
    }

    /// Print the current batch, bypassing the classifier.
    pub async fn request_print(&self) -> Result<Transition, BatchError> {
        self.request(|reply| Command::Print { reply }).await?
    }

    /// Clear the current batch, bypassing the classifier.
    pub async fn request_reset(&self) -> Result<Transition, BatchError> {
        self.request(|reply| Command::Reset { reply }).await
    }

    pub async fn set_start_sequence(&self, start: u64) -> Result<(), BatchError> {
        self.request(|reply| Command::SetStartSequence { start, reply })
            .await?
    }

    pub async fn set_listening(&self, on: bool) -> Result<(), BatchError> {
        self.send(Command::SetListening { on }).await
    }

    pub async fn report_listener_fault(&self, fault: ListenerFault) -> Result<(), BatchError> {
        self.send(Command::ListenerFault { fault }).await
    }

    /// Append a message to the user-facing event log.
    pub async fn record(
        &self,
        message: impl Into<String>,
        severity: Severity,
    ) -> Result<(), BatchError> {
        let message = message.into();
        self.send(Command::Record { message, severity }).await
    }

    pub async fn snapshot(&self) -> Result<Snapshot, BatchError> {
        self.request(|reply| Command::Snapshot { reply }).await
    }

    pub async fn export_rows(&self) -> Result<Vec<ExportRow>, BatchError> {
        self.request(|reply| Command::ExportRows { reply }).await
    }

    async fn send(&self, command: Command) -> Result<(), BatchError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| BatchError::SessionClosed)
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, BatchError> {
        let (reply, response) = oneshot::channel();
        self.send(build(reply)).await?;
        response.await.map_err(|_| BatchError::SessionClosed)
    }
}

/// Single owner of the controller state.
pub struct Session {
    controller: BatchController,
    commands: mpsc::Receiver<Command>,
    timer_tx: mpsc::UnboundedSender<TimerEvent>,
    timer_rx: mpsc::UnboundedReceiver<TimerEvent>,
    auto_print: Option<JoinHandle<()>>,
}

impl Session {
    /// Start the session on the current tokio runtime.
    ///
    /// The join handle yields the controller back once all handles are dropped.
    pub fn spawn(controller: BatchController) -> (SessionHandle, JoinHandle<BatchController>) {
        let (commands_tx, commands) = mpsc::channel(COMMAND_BUFFER);
        let (timer_tx, timer_rx) = mpsc::unbounded_channel();
        let session = Session {
            controller,
            commands,
            timer_tx,
            timer_rx,
            auto_print: None,
        };
        let task = tokio::spawn(session.run());
        (
            SessionHandle {
                commands: commands_tx,
            },
            task,
        )
    }

    async fn run(mut self) -> BatchController {
        tracing::debug!("Batch session started");
        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(command) => self.handle(command),
                    None => break,
                },
                Some(event) = self.timer_rx.recv() => self.on_timer(event),
            }
        }
        if let Some(handle) = self.auto_print.take() {
            handle.abort();
        }
        tracing::debug!("Batch session stopped");
        self.controller
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::Token { text, reply } => {
                let result = self.controller.submit_token(&text);
                let _ = reply.send(self.apply_result(result));
            }
            Command::Print { reply } => {
                let result = self.controller.request_print();
                let _ = reply.send(self.apply_result(result));
            }
            Command::Reset { reply } => {
                let step = self.controller.request_reset();
                let _ = reply.send(self.apply(step));
            }
            Command::SetStartSequence { start, reply } => {
                let _ = reply.send(self.controller.set_start_sequence(start));
            }
            Command::SetListening { on } => {
                self.controller.set_listening(on);
            }
            Command::ListenerFault { fault } => {
                self.controller.report_listener_fault(&fault);
            }
            Command::Record { message, severity } => {
                self.controller.record(message, severity);
            }
            Command::Snapshot { reply } => {
                let _ = reply.send(self.controller.snapshot());
            }
            Command::ExportRows { reply } => {
                let _ = reply.send(self.controller.export_rows());
            }
        }
    }

    fn on_timer(&mut self, event: TimerEvent) {
        tracing::debug!(?event, "Timer fired");
        match event {
            TimerEvent::AutoPrintDue(ticket) => {
                self.auto_print = None;
                let step = self.controller.fire_auto_print(ticket);
                self.apply(step);
            }
            TimerEvent::NotificationDue(batch_id) => {
                self.controller.expire_notification(batch_id);
            }
        }
    }

    fn apply_result(&mut self, result: Result<Step, BatchError>) -> Result<Transition, BatchError> {
        result.map(|step| self.apply(step))
    }

    /// Execute the step's effects and hand back its transition.
    fn apply(&mut self, step: Step) -> Transition {
        for effect in step.effects {
            match effect {
                Effect::ArmAutoPrint { ticket, delay } => {
                    self.cancel_auto_print();
                    let tx = self.timer_tx.clone();
                    self.auto_print = Some(tokio::spawn(async move {
                        tokio::time::sleep(delay).await;
                        let _ = tx.send(TimerEvent::AutoPrintDue(ticket));
                    }));
                }
                Effect::CancelAutoPrint => self.cancel_auto_print(),
                Effect::ExpireNotification { batch_id, delay } => {
                    let tx = self.timer_tx.clone();
                    tokio::spawn(async move {
                        tokio::time::sleep(delay).await;
                        let _ = tx.send(TimerEvent::NotificationDue(batch_id));
                    });
                }
            }
        }
        step.transition
    }

    fn cancel_auto_print(&mut self) {
        if let Some(handle) = self.auto_print.take() {
            handle.abort();
        }
    }
}
