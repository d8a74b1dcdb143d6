//! Execution engine boundary.
//!
//! # Data Flow
//! ```text
//! Dispatcher
//!     → find_command_descriptor (per request)
//!     → execute(Invocation)      (input/output channels, formats, parameters)
//!     ← completion (future resolves when the engine is done)
//! ```
//!
//! # Design Decisions
//! - The engine is a trait object so the gateway can front any implementation
//! - Descriptors are immutable once the engine is constructed
//! - Completion is the resolution of `execute`, there is no separate callback

pub mod echo;

use async_trait::async_trait;
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::bridge::{InputChannel, OutputChannel};
use crate::format::Format;
use crate::tree::Tree;

pub use echo::EchoEngine;

/// Kind of data a command consumes or produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    Structured,
    Tabular,
    Binary,
    None,
}

/// Static description of an engine command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandDescriptor {
    pub name: String,
    pub input_type: DataType,
    pub output_type: DataType,
    /// The command has side effects.
    pub is_volatile: bool,
    /// The command is resource-intensive and subject to admission control.
    pub is_heavy: bool,
}

impl CommandDescriptor {
    pub fn new(name: impl Into<String>, input_type: DataType, output_type: DataType) -> Self {
        Self {
            name: name.into(),
            input_type,
            output_type,
            is_volatile: false,
            is_heavy: false,
        }
    }

    pub fn volatile(mut self) -> Self {
        self.is_volatile = true;
        self
    }

    pub fn heavy(mut self) -> Self {
        self.is_heavy = true;
        self
    }
}

/// Everything the engine needs to run one command.
pub struct Invocation {
    pub command: String,
    pub input: InputChannel,
    pub input_format: Format,
    pub output: OutputChannel,
    pub output_format: Format,
    pub parameters: Tree,
}

/// A failure reported by the engine for an invoked command.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct EngineError {
    /// Engine-specific error code.
    pub code: i32,
    pub message: String,
    /// HTTP status the engine associates with the failure.
    pub status: u16,
}

impl EngineError {
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            code: 1,
            message: message.into(),
            status,
        }
    }

    pub fn with_code(mut self, code: i32) -> Self {
        self.code = code;
        self
    }

    /// The reported status, falling back to 500 when it is not a valid HTTP status.
    pub fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

/// The execution engine the gateway fronts.
#[async_trait]
pub trait Engine: Send + Sync + 'static {
    fn find_command_descriptor(&self, name: &str) -> Option<CommandDescriptor>;

    fn list_command_descriptors(&self) -> Vec<CommandDescriptor>;

    /// Whether a format name is known to the engine.
    fn is_format_registered(&self, name: &str) -> bool;

    /// Run a command to completion.
    async fn execute(&self, invocation: Invocation) -> Result<(), EngineError>;
}
