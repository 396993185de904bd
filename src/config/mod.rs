//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → loader.rs (environment overrides, binary only)
//!     → validation.rs (normalize out-of-range values)
//!     → ResilienceConfig (validated, immutable)
//!     → passed to breaker / retry constructors at startup
//! ```
//!
//! # Design Decisions
//! - Config is read once at startup; nothing is looked up per request
//! - All fields have defaults to allow minimal configs
//! - Invalid values fall back to defaults instead of failing startup

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{apply_env_overrides, load_config, parse_config, ConfigError};
pub use schema::{
    BreakerConfig, LogFormat, ObservabilityConfig, ResilienceConfig, RetryConfig, TransportConfig,
};
pub use validation::{normalize, normalize_breaker_config, Adjustment};
