//! HTTP request body → engine input adapter.

use std::sync::{Arc, Mutex, MutexGuard};

use bytes::Bytes;
use tokio::sync::watch;

use super::channel::{InputChannel, InputShared};

#[derive(Debug, Default)]
struct InboundState {
    ended: bool,
    closed: bool,
}

#[derive(Debug)]
struct InboundInner {
    channel: Arc<InputShared>,
    state: Mutex<InboundState>,
    closed_tx: watch::Sender<bool>,
    high_watermark: usize,
}

/// Writable-stream façade over an engine input channel.
///
/// After `end`, writes are rejected and a close notification follows on a
/// later scheduling turn. `destroy` closes without notifying.
#[derive(Debug, Clone)]
pub struct InboundAdapter {
    inner: Arc<InboundInner>,
}

impl InboundAdapter {
    /// Create the adapter and the engine-side channel it feeds.
    pub fn new(high_watermark: usize) -> (Self, InputChannel) {
        let channel = Arc::new(InputShared::default());
        let (closed_tx, _) = watch::channel(false);
        let adapter = Self {
            inner: Arc::new(InboundInner {
                channel: channel.clone(),
                state: Mutex::new(InboundState::default()),
                closed_tx,
                high_watermark: high_watermark.max(1),
            }),
        };
        (adapter, InputChannel::new(channel))
    }

    fn lock(&self) -> MutexGuard<'_, InboundState> {
        self.inner.state.lock().expect("inbound adapter mutex poisoned")
    }

    /// Forward a chunk to the engine. Returns false after `end`/`destroy` or
    /// once the engine stopped reading.
    pub fn write(&self, chunk: Bytes) -> bool {
        if self.lock().ended {
            return false;
        }
        self.inner.channel.push(chunk)
    }

    /// Finish the stream, optionally writing a last chunk first.
    pub fn end(&self, last: Option<Bytes>) {
        if let Some(chunk) = last.filter(|chunk| !chunk.is_empty()) {
            self.write(chunk);
        }
        {
            let mut state = self.lock();
            if state.ended {
                return;
            }
            state.ended = true;
        }
        self.inner.channel.close();

        let adapter = self.clone();
        tokio::spawn(async move { adapter.emit_close() });
    }

    /// Close immediately, discarding queued input. No close notification is sent.
    pub fn destroy(&self) {
        {
            let mut state = self.lock();
            state.ended = true;
            state.closed = true;
        }
        self.inner.channel.abort();
    }

    pub fn is_ended(&self) -> bool {
        self.lock().ended
    }

    /// Wait until the engine has room for more input.
    pub async fn writable(&self) {
        self.inner.channel.wait_below(self.inner.high_watermark).await;
    }

    /// Wait for the close notification that follows `end`.
    pub async fn closed(&self) {
        let mut rx = self.inner.closed_tx.subscribe();
        let _ = rx.wait_for(|closed| *closed).await;
    }

    fn emit_close(&self) {
        {
            let mut state = self.lock();
            if state.closed {
                return;
            }
            state.closed = true;
        }
        self.inner.closed_tx.send_replace(true);
    }
}
