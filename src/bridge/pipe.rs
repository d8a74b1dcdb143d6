//! Glue between the adapters and axum bodies.
//!
//! # Data Flow
//! ```text
//! request Body ──into_data_stream──▶ pump_request_body ──▶ InboundAdapter
//!
//! OutboundAdapter ──▶ ResponseSink ══mpsc══▶ ResponseBody ──▶ Body::from_stream
//!                          ▲                      │
//!                          └──── resume_if ◀──────┘ (buffer below low watermark)
//! ```

use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{ready, Context, Poll};

use axum::body::Body;
use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use tokio::sync::{mpsc, oneshot};

use super::inbound::InboundAdapter;
use super::outbound::{Consumer, OutboundAdapter};
use super::{BridgeLimits, OutputChannel};
use crate::observability::metrics;

/// Stream a request body into the engine, honoring engine backpressure.
pub async fn pump_request_body(body: Body, adapter: InboundAdapter) {
    let mut stream = body.into_data_stream();
    while let Some(next) = stream.next().await {
        match next {
            Ok(chunk) => {
                adapter.writable().await;
                let len = chunk.len();
                if !adapter.write(chunk) {
                    tracing::debug!("Engine stopped accepting input");
                    adapter.destroy();
                    return;
                }
                metrics::record_bridged_bytes("inbound", len);
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read request body");
                adapter.destroy();
                return;
            }
        }
    }
    adapter.end(None);
}

#[derive(Debug)]
enum Frame {
    Data(Bytes),
    End,
    Abort(String),
}

/// Consumer side of the outbound adapter: hands chunks to the response body.
pub struct ResponseSink {
    tx: mpsc::UnboundedSender<Frame>,
    buffered: Arc<AtomicUsize>,
    high_watermark: usize,
    first_chunk: Mutex<Option<oneshot::Sender<()>>>,
}

impl ResponseSink {
    /// Terminate the response body with an error after headers were sent.
    pub fn abort(&self, message: impl Into<String>) {
        let _ = self.tx.send(Frame::Abort(message.into()));
    }
}

impl Consumer for ResponseSink {
    fn on_data(&self, chunk: Bytes) -> bool {
        let len = chunk.len();
        let buffered = self.buffered.fetch_add(len, Ordering::SeqCst) + len;
        if self.tx.send(Frame::Data(chunk)).is_err() {
            return false;
        }
        metrics::record_bridged_bytes("outbound", len);
        if let Some(tx) = self
            .first_chunk
            .lock()
            .expect("first chunk mutex poisoned")
            .take()
        {
            let _ = tx.send(());
        }
        buffered < self.high_watermark
    }

    fn on_end(&self) {
        let _ = self.tx.send(Frame::End);
    }
}

/// Response body fed by the outbound adapter.
///
/// Dropping it before the end tears the adapter down.
pub struct ResponseBody {
    rx: mpsc::UnboundedReceiver<Frame>,
    buffered: Arc<AtomicUsize>,
    low_watermark: usize,
    adapter: OutboundAdapter,
    done: bool,
}

impl ResponseBody {
    pub fn into_body(self) -> Body {
        Body::from_stream(self)
    }
}

impl Stream for ResponseBody {
    type Item = Result<Bytes, io::Error>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.done {
            return Poll::Ready(None);
        }
        match ready!(self.rx.poll_recv(cx)) {
            Some(Frame::Data(chunk)) => {
                self.buffered.fetch_sub(chunk.len(), Ordering::SeqCst);
                let buffered = self.buffered.clone();
                let low = self.low_watermark;
                self.adapter
                    .resume_if(|| buffered.load(Ordering::SeqCst) <= low);
                Poll::Ready(Some(Ok(chunk)))
            }
            Some(Frame::Abort(message)) => {
                self.done = true;
                Poll::Ready(Some(Err(io::Error::other(message))))
            }
            Some(Frame::End) | None => {
                self.done = true;
                Poll::Ready(None)
            }
        }
    }
}

impl Drop for ResponseBody {
    fn drop(&mut self) {
        if !self.done {
            self.adapter.destroy();
        }
    }
}

/// Everything the dispatcher needs to stream one command's output.
pub struct OutboundPipe {
    pub adapter: OutboundAdapter,
    /// Engine-side channel, handed to the invocation.
    pub channel: OutputChannel,
    pub sink: Arc<ResponseSink>,
    pub body: ResponseBody,
    /// Fires when the first chunk reaches the response.
    pub first_chunk: oneshot::Receiver<()>,
}

impl OutboundPipe {
    pub fn open(limits: BridgeLimits) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let (first_tx, first_chunk) = oneshot::channel();
        let buffered = Arc::new(AtomicUsize::new(0));

        let sink = Arc::new(ResponseSink {
            tx,
            buffered: buffered.clone(),
            high_watermark: limits.output_high_watermark.max(1),
            first_chunk: Mutex::new(Some(first_tx)),
        });
        let (adapter, channel) = OutboundAdapter::new(sink.clone());
        let body = ResponseBody {
            rx,
            buffered,
            low_watermark: limits.output_low_watermark,
            adapter: adapter.clone(),
            done: false,
        };

        Self {
            adapter,
            channel,
            sink,
            body,
            first_chunk,
        }
    }
}

#[cfg(test)]
mod tests {
    use http_body_util::BodyExt;

    use super::*;

    fn limits(high: usize, low: usize) -> BridgeLimits {
        BridgeLimits {
            input_high_watermark: 1024,
            output_high_watermark: high,
            output_low_watermark: low,
        }
    }

    #[tokio::test]
    async fn body_carries_engine_output_in_order() {
        let pipe = OutboundPipe::open(limits(4, 0));
        let OutboundPipe {
            adapter,
            channel,
            body,
            mut first_chunk,
            ..
        } = pipe;

        for part in ["alpha ", "beta ", "gamma"] {
            assert!(channel.write(part));
        }
        channel.finish();
        adapter.end_soon();

        let collected = body.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&collected[..], b"alpha beta gamma");
        assert!(first_chunk.try_recv().is_ok());
    }

    #[tokio::test]
    async fn abort_fails_the_body() {
        let pipe = OutboundPipe::open(limits(1024, 0));
        pipe.channel.write("partial");
        pipe.first_chunk.await.unwrap();
        pipe.sink.abort("engine exploded");

        let result = pipe.body.into_body().collect().await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn dropping_the_body_detaches_the_engine() {
        let pipe = OutboundPipe::open(limits(1024, 0));
        drop(pipe.body);
        assert!(pipe.adapter.is_ended());
        assert!(!pipe.channel.write("ignored"));
    }

    #[tokio::test]
    async fn request_body_reaches_engine_input() {
        let (adapter, mut input) = InboundAdapter::new(2);
        tokio::spawn(pump_request_body(Body::from("streamed input"), adapter));
        assert_eq!(input.read_to_end().await, b"streamed input");
    }
}
