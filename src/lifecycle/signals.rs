//! OS signal handling.
//!
//! # Responsibilities
//! - Listen for SIGTERM and SIGINT
//! - Translate them into supervisor commands for the worker lifecycle
//!
//! # Design Decisions
//! - The first signal asks for a graceful stop, any later one forces it
//! - Signals share the command channel with the supervisor link

use tokio::sync::mpsc;

use super::supervisor::SupervisorCommand;

/// Command to issue for the `count`-th termination signal.
pub fn command_for_signal(count: usize) -> SupervisorCommand {
    if count <= 1 {
        SupervisorCommand::GracefullyDie
    } else {
        SupervisorCommand::ViolentlyDie
    }
}

/// Forward termination signals into `commands` until the receiver goes away.
#[cfg(unix)]
pub async fn forward_signals(commands: mpsc::Sender<SupervisorCommand>) {
    use tokio::signal::unix::{signal, SignalKind};

    let (mut terminate, mut interrupt) =
        match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
            (Ok(terminate), Ok(interrupt)) => (terminate, interrupt),
            (Err(e), _) | (_, Err(e)) => {
                tracing::error!(error = %e, "Failed to register signal handlers");
                return;
            }
        };

    let mut count = 0;
    loop {
        let name = tokio::select! {
            _ = terminate.recv() => "SIGTERM",
            _ = interrupt.recv() => "SIGINT",
        };
        count += 1;
        let command = command_for_signal(count);
        tracing::info!(signal = name, count, command = ?command, "Termination signal received");
        if commands.send(command).await.is_err() {
            return;
        }
    }
}

#[cfg(not(unix))]
pub async fn forward_signals(commands: mpsc::Sender<SupervisorCommand>) {
    let mut count = 0;
    while tokio::signal::ctrl_c().await.is_ok() {
        count += 1;
        let command = command_for_signal(count);
        tracing::info!(count, command = ?command, "Termination signal received");
        if commands.send(command).await.is_err() {
            return;
        }
    }
}
