//! Worker liveness state machine.
//!
//! # States
//! ```text
//! Alive ──deadline / gracefullyDie──▶ Stopping ──listener closed──▶ Stopped
//!   └──────────────── violentlyDie (any state) ───────────────────────▲
//! ```
//!
//! # Design Decisions
//! - Transitions are idempotent; repeated triggers are ignored
//! - Heartbeats and the liveness deadline only run when supervised
//! - Events are handled on one task, so the state needs no locking

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time::{self, Instant};

use super::shutdown::ListenerControl;
use super::supervisor::{SupervisorCommand, SupervisorLink, WorkerReport};
use crate::config::LifecycleConfig;
use crate::observability::metrics;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Alive,
    Stopping,
    Stopped,
}

impl WorkerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkerState::Alive => "alive",
            WorkerState::Stopping => "stopping",
            WorkerState::Stopped => "stopped",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// Our own heartbeat timer fired.
    HeartbeatTick,
    /// The supervisor acknowledged us.
    SupervisorHeartbeat,
    LivenessDeadline,
    GracefulShutdown,
    ForcedShutdown,
    ListenerClosed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifecycleTimings {
    pub heartbeat_interval: Duration,
    pub initial_deadline: Duration,
    pub liveness_deadline: Duration,
}

impl From<&LifecycleConfig> for LifecycleTimings {
    fn from(config: &LifecycleConfig) -> Self {
        Self {
            heartbeat_interval: Duration::from_millis(config.heartbeat_interval_ms),
            initial_deadline: Duration::from_millis(config.initial_deadline_ms),
            liveness_deadline: Duration::from_millis(config.liveness_deadline_ms),
        }
    }
}

pub struct WorkerLifecycle {
    state: WorkerState,
    supervised: bool,
    timings: LifecycleTimings,
    link: Arc<dyn SupervisorLink>,
    listener: Option<ListenerControl>,
    last_supervisor_contact: Option<Instant>,
    deadline: Instant,
}

impl WorkerLifecycle {
    pub fn new(
        link: Arc<dyn SupervisorLink>,
        listener: Option<ListenerControl>,
        supervised: bool,
        timings: LifecycleTimings,
    ) -> Self {
        Self {
            state: WorkerState::Alive,
            supervised,
            timings,
            link,
            listener,
            last_supervisor_contact: None,
            deadline: Instant::now() + timings.initial_deadline,
        }
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    pub fn last_supervisor_contact(&self) -> Option<Instant> {
        self.last_supervisor_contact
    }

    pub fn handle(&mut self, event: LifecycleEvent) {
        tracing::debug!(event = ?event, state = self.state.as_str(), "Lifecycle event");
        match event {
            LifecycleEvent::HeartbeatTick => {
                if self.state == WorkerState::Alive && self.supervised {
                    self.link.send(WorkerReport::Heartbeat);
                }
            }
            LifecycleEvent::SupervisorHeartbeat => {
                let now = Instant::now();
                self.last_supervisor_contact = Some(now);
                self.deadline = now + self.timings.liveness_deadline;
            }
            LifecycleEvent::LivenessDeadline => {
                if self.state == WorkerState::Alive {
                    tracing::warn!(
                        deadline_ms = self.timings.liveness_deadline.as_millis() as u64,
                        "No heartbeat from supervisor, stopping"
                    );
                    self.gracefully_die();
                }
            }
            LifecycleEvent::GracefulShutdown => self.gracefully_die(),
            LifecycleEvent::ForcedShutdown | LifecycleEvent::ListenerClosed => self.violently_die(),
        }
    }

    fn gracefully_die(&mut self) {
        if self.state != WorkerState::Alive {
            return;
        }
        self.transition(WorkerState::Stopping);
        self.link.send(WorkerReport::Stopping);
        match &self.listener {
            Some(listener) => listener.close(),
            None => self.violently_die(),
        }
    }

    fn violently_die(&mut self) {
        if self.state == WorkerState::Stopped {
            return;
        }
        self.transition(WorkerState::Stopped);
        self.link.send(WorkerReport::Stopped);
    }

    fn transition(&mut self, to: WorkerState) {
        tracing::info!(from = self.state.as_str(), to = to.as_str(), "Worker state change");
        metrics::record_lifecycle_transition(to.as_str());
        self.state = to;
    }

    /// Report `alive`, then drive the machine from timers, supervisor
    /// commands and the listener until it reaches `Stopped` or runs out of
    /// event sources.
    pub async fn run(mut self, mut commands: mpsc::Receiver<SupervisorCommand>) -> WorkerState {
        self.link.send(WorkerReport::Alive);
        self.deadline = Instant::now() + self.timings.initial_deadline;

        let mut closed = self.listener.as_mut().and_then(ListenerControl::take_closed);
        let mut commands_open = true;
        let period = self.timings.heartbeat_interval;
        let mut ticker = time::interval_at(Instant::now() + period, period);

        while self.state != WorkerState::Stopped {
            let watching = self.supervised && self.state == WorkerState::Alive;
            tokio::select! {
                _ = ticker.tick(), if watching => self.handle(LifecycleEvent::HeartbeatTick),
                _ = time::sleep_until(self.deadline), if watching => {
                    self.handle(LifecycleEvent::LivenessDeadline)
                }
                command = commands.recv(), if commands_open => match command {
                    Some(SupervisorCommand::Heartbeat) => {
                        self.handle(LifecycleEvent::SupervisorHeartbeat)
                    }
                    Some(SupervisorCommand::GracefullyDie) => {
                        self.handle(LifecycleEvent::GracefulShutdown)
                    }
                    Some(SupervisorCommand::ViolentlyDie) => {
                        self.handle(LifecycleEvent::ForcedShutdown)
                    }
                    None => commands_open = false,
                },
                _ = wait_closed(&mut closed), if closed.is_some() => {
                    closed = None;
                    self.handle(LifecycleEvent::ListenerClosed);
                }
                else => break,
            }
        }

        self.state
    }
}

async fn wait_closed(closed: &mut Option<oneshot::Receiver<()>>) {
    match closed {
        Some(rx) => {
            let _ = rx.await;
        }
        None => std::future::pending().await,
    }
}
