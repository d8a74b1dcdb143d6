//! Admission control for heavy commands.
//!
//! # Responsibilities
//! - Decide whether a command may run given the process load signal
//! - Maintain the load signal from in-flight execution counts
//!
//! # Design Decisions
//! - The decision is stateless: reject iff heavy and choking
//! - No queueing or retry, callers see 503 immediately

pub mod watcher;

use crate::engine::CommandDescriptor;

pub use watcher::{InflightCounter, InflightGuard, LoadMonitor, LoadWatcher};

/// Process-wide indication that the engine is overloaded.
pub trait LoadSignal: Send + Sync {
    fn is_choking(&self) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Allow,
    Reject,
}

/// Admit or reject one command request.
pub fn admit(descriptor: &CommandDescriptor, signal: &dyn LoadSignal) -> Admission {
    if descriptor.is_heavy && signal.is_choking() {
        Admission::Reject
    } else {
        Admission::Allow
    }
}
