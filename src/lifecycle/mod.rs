//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Supervisor (supervisor.rs):
//!     stdin JSON lines → SupervisorCommand ─┐
//! Signals (signals.rs):                     ├─→ worker.rs state machine
//!     SIGTERM/SIGINT → SupervisorCommand ───┘        │
//!                                                    ├─→ WorkerReport → stdout
//! Shutdown (shutdown.rs):                            │
//!     ListenerControl ◀── close ────────────────────┘
//!         └── listener drained → ListenerClosed → Stopped
//! ```
//!
//! # Design Decisions
//! - Graceful stop closes the listener and waits for it to drain
//! - Forced stop ends the worker without waiting
//! - The supervisor link is a trait so unsupervised runs only log reports

pub mod shutdown;
pub mod signals;
pub mod supervisor;
pub mod worker;

pub use shutdown::{ListenerControl, ListenerHandle, Shutdown};
pub use signals::forward_signals;
pub use supervisor::{JsonLinesLink, LogLink, SupervisorCommand, SupervisorLink, WorkerReport};
pub use worker::{LifecycleEvent, LifecycleTimings, WorkerLifecycle, WorkerState};
