//! Engine-side channels.
//!
//! `InputChannel` is what the engine reads command input from, `OutputChannel`
//! is what it writes command output to. Both are buffered queues of chunks; the
//! adapters on the HTTP side decide when data moves.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use bytes::Bytes;
use tokio::sync::Notify;

// ---------------------------------------------------------------------------
// Input (HTTP request body → engine)
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct InputState {
    queue: VecDeque<Bytes>,
    buffered: usize,
    closed: bool,
}

#[derive(Debug, Default)]
pub(crate) struct InputShared {
    state: Mutex<InputState>,
    readable: Notify,
    writable: Notify,
}

impl InputShared {
    fn lock(&self) -> MutexGuard<'_, InputState> {
        self.state.lock().expect("input channel mutex poisoned")
    }

    /// Queue a chunk for the engine. Fails once the channel is closed.
    pub(crate) fn push(&self, chunk: Bytes) -> bool {
        {
            let mut state = self.lock();
            if state.closed {
                return false;
            }
            state.buffered += chunk.len();
            state.queue.push_back(chunk);
        }
        self.readable.notify_waiters();
        true
    }

    /// Close for writing. Already queued chunks stay readable.
    pub(crate) fn close(&self) {
        self.lock().closed = true;
        self.readable.notify_waiters();
        self.writable.notify_waiters();
    }

    /// Close and discard everything queued.
    pub(crate) fn abort(&self) {
        {
            let mut state = self.lock();
            state.closed = true;
            state.queue.clear();
            state.buffered = 0;
        }
        self.readable.notify_waiters();
        self.writable.notify_waiters();
    }

    /// Wait until fewer than `limit` bytes are queued, or the channel is closed.
    pub(crate) async fn wait_below(&self, limit: usize) {
        loop {
            let notified = self.writable.notified();
            {
                let state = self.lock();
                if state.closed || state.buffered < limit {
                    return;
                }
            }
            notified.await;
        }
    }
}

/// Command input as seen by the engine.
#[derive(Debug)]
pub struct InputChannel {
    shared: Arc<InputShared>,
}

impl InputChannel {
    pub(crate) fn new(shared: Arc<InputShared>) -> Self {
        Self { shared }
    }

    /// An input with no data, for commands that take none.
    pub fn empty() -> Self {
        let shared = Arc::new(InputShared::default());
        shared.close();
        Self { shared }
    }

    /// Next chunk, or `None` once the writer closed the channel and it is drained.
    pub async fn read(&mut self) -> Option<Bytes> {
        loop {
            let notified = self.shared.readable.notified();
            {
                let mut state = self.shared.lock();
                if let Some(chunk) = state.queue.pop_front() {
                    state.buffered -= chunk.len();
                    drop(state);
                    self.shared.writable.notify_waiters();
                    return Some(chunk);
                }
                if state.closed {
                    return None;
                }
            }
            notified.await;
        }
    }

    /// Read everything until the channel closes.
    pub async fn read_to_end(&mut self) -> Vec<u8> {
        let mut data = Vec::new();
        while let Some(chunk) = self.read().await {
            data.extend_from_slice(&chunk);
        }
        data
    }
}

impl Drop for InputChannel {
    // An engine that drops its input stops the HTTP side from producing more.
    fn drop(&mut self) {
        self.shared.abort();
    }
}

// ---------------------------------------------------------------------------
// Output (engine → HTTP response)
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct OutputState {
    queue: VecDeque<Bytes>,
    finished: bool,
    detached: bool,
}

#[derive(Debug, Default)]
struct OutputShared {
    state: Mutex<OutputState>,
    wake: Notify,
}

/// What the pump should do next with an output channel.
#[derive(Debug)]
pub(crate) enum Peek {
    Chunk(Bytes),
    Finished,
    Detached,
    Idle,
}

/// Command output as seen by the engine.
///
/// Writes never block; chunks are buffered until the gateway moves them
/// into the HTTP response.
#[derive(Debug, Clone, Default)]
pub struct OutputChannel {
    shared: Arc<OutputShared>,
}

impl OutputChannel {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, OutputState> {
        self.shared.state.lock().expect("output channel mutex poisoned")
    }

    /// Buffer a chunk. Returns false if the channel no longer accepts data.
    pub fn write(&self, chunk: impl Into<Bytes>) -> bool {
        {
            let mut state = self.lock();
            if state.finished || state.detached {
                return false;
            }
            state.queue.push_back(chunk.into());
        }
        self.shared.wake.notify_one();
        true
    }

    /// Signal that the engine has produced everything.
    pub fn finish(&self) {
        self.lock().finished = true;
        self.shared.wake.notify_one();
    }

    /// Whether the native buffer holds no undelivered chunks.
    pub fn is_empty(&self) -> bool {
        self.lock().queue.is_empty()
    }

    pub fn is_finished(&self) -> bool {
        self.lock().finished
    }

    pub(crate) fn peek(&self) -> Peek {
        let state = self.lock();
        if state.detached {
            Peek::Detached
        } else if let Some(chunk) = state.queue.front() {
            Peek::Chunk(chunk.clone())
        } else if state.finished {
            Peek::Finished
        } else {
            Peek::Idle
        }
    }

    /// Drop the front chunk after delivery. Returns true if the buffer is now empty.
    pub(crate) fn pop_front(&self) -> bool {
        let mut state = self.lock();
        state.queue.pop_front();
        state.queue.is_empty()
    }

    /// Stop accepting data and discard the buffer.
    pub(crate) fn detach(&self) {
        {
            let mut state = self.lock();
            state.detached = true;
            state.queue.clear();
        }
        self.shared.wake.notify_one();
    }

    pub(crate) async fn changed(&self) {
        self.shared.wake.notified().await;
    }
}
