//! Engine output → HTTP response adapter.
//!
//! # Data Flow
//! ```text
//! Engine ──write──▶ OutputChannel ──pump task──▶ OutboundAdapter::push
//!                                                      │
//!                              paused? ─yes─▶ pending queue (replayed on resume)
//!                                                      │ no
//!                                                      ▼
//!                                             Consumer::on_data / on_end
//! ```
//!
//! # Design Decisions
//! - End-of-stream is deferred to a later scheduling turn and never precedes
//!   data still sitting in the channel or the pending queue
//! - End-of-stream is emitted at most once
//! - Lock order is adapter state, then channel; the pump never holds the
//!   channel lock while calling into the adapter

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use bytes::Bytes;

use super::channel::{OutputChannel, Peek};

/// Receiver of outbound data, typically the HTTP response body.
///
/// Implementations must not call back into the adapter synchronously.
pub trait Consumer: Send + Sync + 'static {
    /// Accept a chunk. Returning false asks the adapter to pause.
    fn on_data(&self, chunk: Bytes) -> bool;

    /// The stream is complete.
    fn on_end(&self);
}

#[derive(Debug)]
enum Pending {
    Chunk(Bytes),
    Eof,
}

#[derive(Debug, Default)]
struct OutboundState {
    pending: VecDeque<Pending>,
    paused: bool,
    ended: bool,
    eof_scheduled: bool,
    awaiting_drain: bool,
    drain_scheduled: bool,
}

impl OutboundState {
    fn eof_queued(&self) -> bool {
        matches!(self.pending.back(), Some(Pending::Eof))
    }
}

struct OutboundInner {
    state: Mutex<OutboundState>,
    consumer: Arc<dyn Consumer>,
    channel: OutputChannel,
}

/// Readable-stream façade over an engine output channel.
#[derive(Clone)]
pub struct OutboundAdapter {
    inner: Arc<OutboundInner>,
}

impl OutboundAdapter {
    /// Create the adapter and the engine-side channel feeding it.
    ///
    /// Spawns the pump task, so this must run inside a Tokio runtime.
    pub fn new(consumer: Arc<dyn Consumer>) -> (Self, OutputChannel) {
        let channel = OutputChannel::new();
        let adapter = Self {
            inner: Arc::new(OutboundInner {
                state: Mutex::new(OutboundState::default()),
                consumer,
                channel: channel.clone(),
            }),
        };
        tokio::spawn(pump(channel.clone(), adapter.clone()));
        (adapter, channel)
    }

    fn lock(&self) -> MutexGuard<'_, OutboundState> {
        self.inner.state.lock().expect("outbound adapter mutex poisoned")
    }

    /// Offer a chunk. Returns false once the stream has ended or end-of-stream is queued.
    pub fn push(&self, chunk: Bytes) -> bool {
        let mut state = self.lock();
        if state.ended || state.eof_queued() {
            return false;
        }
        if state.paused || !state.pending.is_empty() {
            state.pending.push_back(Pending::Chunk(chunk));
            return true;
        }
        if !self.inner.consumer.on_data(chunk) {
            state.paused = true;
        }
        true
    }

    pub fn pause(&self) {
        self.lock().paused = true;
    }

    /// Leave paused mode and replay pending items on the next turn.
    pub fn resume(&self) {
        let mut state = self.lock();
        state.paused = false;
        self.schedule_drain(&mut state);
    }

    /// Resume only if paused and `ready` holds, evaluated under the adapter lock.
    pub fn resume_if(&self, ready: impl FnOnce() -> bool) {
        let mut state = self.lock();
        if !state.paused || !ready() {
            return;
        }
        state.paused = false;
        self.schedule_drain(&mut state);
    }

    pub fn is_paused(&self) -> bool {
        self.lock().paused
    }

    pub fn is_ended(&self) -> bool {
        self.lock().ended
    }

    /// Request end-of-stream once all buffered data has been delivered.
    pub fn end_soon(&self) {
        let mut state = self.lock();
        if state.ended || state.eof_scheduled {
            return;
        }
        if !self.inner.channel.is_empty() {
            state.awaiting_drain = true;
            return;
        }
        state.eof_scheduled = true;
        drop(state);

        let adapter = self.clone();
        tokio::spawn(async move { adapter.finish_stream() });
    }

    /// Called by the pump whenever the channel buffer becomes empty.
    pub(crate) fn on_drain(&self) {
        let retry = std::mem::take(&mut self.lock().awaiting_drain);
        if retry {
            self.end_soon();
        }
    }

    /// Tear down: drop pending data and stop the engine from writing more.
    pub fn destroy(&self) {
        {
            let mut state = self.lock();
            state.ended = true;
            state.pending.clear();
        }
        self.inner.channel.detach();
    }

    fn schedule_drain(&self, state: &mut OutboundState) {
        if state.pending.is_empty() || state.drain_scheduled || state.ended {
            return;
        }
        state.drain_scheduled = true;
        let adapter = self.clone();
        tokio::spawn(async move { adapter.drain_pending() });
    }

    fn drain_pending(&self) {
        let mut state = self.lock();
        state.drain_scheduled = false;
        while !state.ended && !state.paused {
            match state.pending.pop_front() {
                Some(Pending::Chunk(chunk)) => {
                    if !self.inner.consumer.on_data(chunk) {
                        state.paused = true;
                    }
                }
                Some(Pending::Eof) => self.emit_end(&mut state),
                None => break,
            }
        }
    }

    fn finish_stream(&self) {
        let mut state = self.lock();
        if state.ended {
            return;
        }
        if state.paused || !state.pending.is_empty() {
            state.pending.push_back(Pending::Eof);
        } else {
            self.emit_end(&mut state);
        }
    }

    fn emit_end(&self, state: &mut OutboundState) {
        if !state.ended {
            state.ended = true;
            self.inner.consumer.on_end();
        }
    }
}

/// Move chunks from the channel into the adapter until the engine finishes
/// and the channel is drained, or the adapter is torn down.
///
/// Ending the stream is left to whoever observes command completion.
async fn pump(channel: OutputChannel, adapter: OutboundAdapter) {
    loop {
        match channel.peek() {
            Peek::Chunk(chunk) => {
                adapter.push(chunk);
                if channel.pop_front() {
                    adapter.on_drain();
                }
            }
            Peek::Finished | Peek::Detached => return,
            Peek::Idle => channel.changed().await,
        }
    }
}
