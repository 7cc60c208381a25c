//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ResilienceConfig (validated, immutable)
//!     → handed to ResilientClient, which keeps it behind an ArcSwap
//!
//! On file change:
//!     watcher.rs detects change (bursts debounced)
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → ResilientClient::apply_config swaps the live policy
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require full reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - Existing breakers keep their state across reloads

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::ResilienceConfig;
pub use schema::BreakerConfig;
pub use schema::RetryConfig;
pub use schema::TimeoutConfig;
pub use schema::LoggingConfig;
pub use schema::OperationConfig;
pub use validation::{validate_config, ValidationError};
pub use watcher::ConfigWatcher;
