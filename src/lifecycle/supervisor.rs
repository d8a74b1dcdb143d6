//! Supervisor protocol.
//!
//! Messages are JSON objects tagged by `type`, one per line:
//! `{"type":"heartbeat"}`, `{"type":"gracefullyDie"}`, `{"type":"violentlyDie"}`
//! from the supervisor; `alive`, `stopping`, `stopped`, `heartbeat` back.
//!
//! # Design Decisions
//! - The transport is stdin/stdout, logs go to stderr
//! - Malformed inbound lines are ignored
//! - Outbound reports are written by one task, in order

use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Supervisor → worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SupervisorCommand {
    Heartbeat,
    GracefullyDie,
    ViolentlyDie,
}

/// Worker → supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum WorkerReport {
    Alive,
    Stopping,
    Stopped,
    Heartbeat,
}

/// Where worker reports go.
pub trait SupervisorLink: Send + Sync {
    fn send(&self, report: WorkerReport);
}

/// Reports for an unsupervised worker: logged, not transmitted.
#[derive(Debug, Default)]
pub struct LogLink;

impl SupervisorLink for LogLink {
    fn send(&self, report: WorkerReport) {
        tracing::info!(report = ?report, "Worker state report");
    }
}

/// JSON-lines link over a byte stream pair, normally stdin/stdout.
pub struct JsonLinesLink {
    tx: Mutex<Option<mpsc::UnboundedSender<WorkerReport>>>,
    writer: Mutex<Option<JoinHandle<()>>>,
}

impl JsonLinesLink {
    /// Link over the process's stdin and stdout.
    pub fn stdio(commands: mpsc::Sender<SupervisorCommand>) -> Self {
        Self::new(tokio::io::stdin(), tokio::io::stdout(), commands)
    }

    /// Parse commands from `reader` into `commands`, write reports to `writer`.
    pub fn new<R, W>(reader: R, writer: W, commands: mpsc::Sender<SupervisorCommand>) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        tokio::spawn(read_commands(reader, commands));

        let (tx, rx) = mpsc::unbounded_channel();
        let writer = tokio::spawn(write_reports(writer, rx));

        Self {
            tx: Mutex::new(Some(tx)),
            writer: Mutex::new(Some(writer)),
        }
    }

    /// Stop accepting reports and wait until the queued ones are written.
    pub async fn flush(&self) {
        self.tx.lock().expect("supervisor link mutex poisoned").take();
        let writer = self.writer.lock().expect("supervisor link mutex poisoned").take();
        if let Some(writer) = writer {
            let _ = writer.await;
        }
    }
}

impl SupervisorLink for JsonLinesLink {
    fn send(&self, report: WorkerReport) {
        if let Some(tx) = self.tx.lock().expect("supervisor link mutex poisoned").as_ref() {
            let _ = tx.send(report);
        }
    }
}

async fn read_commands<R>(reader: R, commands: mpsc::Sender<SupervisorCommand>)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                match serde_json::from_str::<SupervisorCommand>(line) {
                    Ok(command) => {
                        if commands.send(command).await.is_err() {
                            return;
                        }
                    }
                    Err(e) => tracing::debug!(line, error = %e, "Ignoring malformed supervisor message"),
                }
            }
            Ok(None) => {
                tracing::info!("Supervisor channel closed");
                return;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read supervisor channel");
                return;
            }
        }
    }
}

async fn write_reports<W>(mut writer: W, mut reports: mpsc::UnboundedReceiver<WorkerReport>)
where
    W: AsyncWrite + Unpin,
{
    while let Some(report) = reports.recv().await {
        let mut line = match serde_json::to_vec(&report) {
            Ok(line) => line,
            Err(e) => {
                tracing::error!(error = %e, "Failed to encode worker report");
                continue;
            }
        };
        line.push(b'\n');
        if let Err(e) = writer.write_all(&line).await {
            tracing::warn!(error = %e, "Failed to write worker report");
            return;
        }
        let _ = writer.flush().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_format() {
        assert_eq!(
            serde_json::to_string(&WorkerReport::Stopping).unwrap(),
            r#"{"type":"stopping"}"#
        );
        assert_eq!(
            serde_json::from_str::<SupervisorCommand>(r#"{"type":"gracefullyDie"}"#).unwrap(),
            SupervisorCommand::GracefullyDie
        );
        assert!(serde_json::from_str::<SupervisorCommand>(r#"{"type":"dance"}"#).is_err());
    }

    #[tokio::test]
    async fn relays_commands_and_reports() {
        let (mut supervisor_out, worker_in) = tokio::io::duplex(1024);
        let (worker_out, mut supervisor_in) = tokio::io::duplex(1024);
        let (tx, mut commands) = mpsc::channel(8);

        let link = JsonLinesLink::new(worker_in, worker_out, tx);
        supervisor_out
            .write_all(b"garbage\n{\"type\":\"heartbeat\"}\n{\"type\":\"violentlyDie\"}\n")
            .await
            .unwrap();

        assert_eq!(commands.recv().await, Some(SupervisorCommand::Heartbeat));
        assert_eq!(commands.recv().await, Some(SupervisorCommand::ViolentlyDie));

        link.send(WorkerReport::Alive);
        link.send(WorkerReport::Stopped);
        link.flush().await;
        link.send(WorkerReport::Heartbeat);

        let mut lines = BufReader::new(&mut supervisor_in).lines();
        assert_eq!(lines.next_line().await.unwrap().unwrap(), r#"{"type":"alive"}"#);
        assert_eq!(lines.next_line().await.unwrap().unwrap(), r#"{"type":"stopped"}"#);
    }
}
