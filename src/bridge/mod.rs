//! Stream bridge between HTTP bodies and engine channels.
//!
//! # Responsibilities
//! - Feed request bodies into engine input with backpressure
//! - Expose engine output as a pausable readable stream
//! - Guarantee end-of-stream is emitted once and only after all data
//!
//! # Data Flow
//! ```text
//! PUT body ──▶ InboundAdapter ──▶ InputChannel ──▶ Engine
//! Engine ──▶ OutputChannel ──▶ OutboundAdapter ──▶ response body
//! ```
//!
//! # Design Decisions
//! - Adapter state sits behind `std::sync::Mutex`, never held across `.await`
//! - Deferred transitions run on spawned tasks, never inline with the caller

pub mod channel;
pub mod inbound;
pub mod outbound;
pub mod pipe;

use serde::{Deserialize, Serialize};

pub use channel::{InputChannel, OutputChannel};
pub use inbound::InboundAdapter;
pub use outbound::{Consumer, OutboundAdapter};
pub use pipe::{pump_request_body, OutboundPipe, ResponseBody, ResponseSink};

/// Byte watermarks for both bridge directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeLimits {
    /// Request body bytes queued for the engine before the pump waits.
    pub input_high_watermark: usize,
    /// Response bytes buffered before engine output is paused.
    pub output_high_watermark: usize,
    /// Buffered response bytes at which paused output resumes.
    pub output_low_watermark: usize,
}

impl Default for BridgeLimits {
    fn default() -> Self {
        Self {
            input_high_watermark: 1024 * 1024,
            output_high_watermark: 1024 * 1024,
            output_low_watermark: 256 * 1024,
        }
    }
}
