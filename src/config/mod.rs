//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! --config file (TOML) or GATEWAY_CONFIGURATION (JSON)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated)
//!     → shared via ArcSwap with the HTTP surface
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → server swaps the published config and retunes the load watermarks
//! ```
//!
//! # Design Decisions
//! - Only the load watermarks take effect without a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, resolve_config, ConfigError};
pub use schema::{
    DiscoveryConfig, FailurePolicy, GatewayConfig, LifecycleConfig, ListenerConfig, LoadConfig,
    NeighbourConfig,
};
pub use watcher::ConfigWatcher;
