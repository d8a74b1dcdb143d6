//! Command dispatch.
//!
//! # Data Flow
//! ```text
//! /api/{command}
//!     → name syntax check            (400)
//!     → descriptor lookup            (404)
//!     → HTTP verb check              (400)
//!     → admission                    (503)
//!     → negotiation                  (400)
//!     → bridge + engine execution
//!     → first output chunk or completion decides the response head
//! ```
//!
//! # Design Decisions
//! - The verb is derived from the descriptor, not from a name table
//! - Engine executions run on their own task and are never cancelled

pub mod dispatcher;
pub mod name;

use axum::http::Method;

use crate::engine::{CommandDescriptor, DataType};

pub use dispatcher::{DispatchSettings, Dispatcher};
pub use name::is_valid_command_name;

/// HTTP verb a command must be requested with.
///
/// Commands that consume input are PUT, other volatile commands are POST,
/// everything else is GET.
pub fn expected_method(descriptor: &CommandDescriptor) -> Method {
    if descriptor.input_type != DataType::None {
        Method::PUT
    } else if descriptor.is_volatile {
        Method::POST
    } else {
        Method::GET
    }
}
