//! Shutdown coordination between the lifecycle and the HTTP listener.

use tokio::sync::{broadcast, oneshot};

/// Broadcast trigger that long-running tasks subscribe to.
pub struct Shutdown {
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    pub fn trigger(&self) {
        let _ = self.tx.send(());
    }

    /// Number of tasks still listening.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Lifecycle side of the listener: close it, and learn when it is gone.
pub struct ListenerControl {
    shutdown: Shutdown,
    closed: Option<oneshot::Receiver<()>>,
}

/// Server side of the listener: stop on `shutdown`, report through `closed`.
pub struct ListenerHandle {
    pub shutdown: broadcast::Receiver<()>,
    pub closed: oneshot::Sender<()>,
}

impl ListenerControl {
    pub fn new() -> (Self, ListenerHandle) {
        let shutdown = Shutdown::new();
        let (closed_tx, closed_rx) = oneshot::channel();
        let handle = ListenerHandle {
            shutdown: shutdown.subscribe(),
            closed: closed_tx,
        };
        (
            Self {
                shutdown,
                closed: Some(closed_rx),
            },
            handle,
        )
    }

    /// Ask the listener to stop accepting and drain.
    pub fn close(&self) {
        tracing::info!(listeners = self.shutdown.receiver_count(), "Closing HTTP listener");
        self.shutdown.trigger();
    }

    pub(crate) fn take_closed(&mut self) -> Option<oneshot::Receiver<()>> {
        self.closed.take()
    }
}
