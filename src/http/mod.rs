//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware, utility endpoints)
//!     → request.rs (request ID, tracing span)
//!     → command dispatcher (/api/{command})
//!     → response.rs (panic capture, redirects)
//!     → Send to client
//!
//! Outbound:
//!     discovery.rs → client.rs → neighbour gateways
//! ```

pub mod client;
pub mod discovery;
pub mod request;
pub mod response;
pub mod server;

pub use client::{OutboundRequest, TransportError};
pub use request::X_REQUEST_ID;
pub use server::{AppState, HttpServer};
