//! HTTP command gateway in front of an execution engine.

pub mod admission;
pub mod bridge;
pub mod command;
pub mod config;
pub mod engine;
pub mod error;
pub mod format;
pub mod http;
pub mod lifecycle;
pub mod negotiation;
pub mod observability;
pub mod tree;

pub use config::schema::GatewayConfig;
pub use engine::{CommandDescriptor, DataType, Engine, EngineError, Invocation};
pub use error::GatewayError;
pub use http::HttpServer;
pub use lifecycle::{Shutdown, WorkerLifecycle};
