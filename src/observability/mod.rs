//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Breaker and retry layers produce:
//!     → tracing events (transitions, rejections, retries)
//!     → metrics.rs (counters through the `metrics` facade)
//!
//! Consumers:
//!     → logging.rs subscriber installed by the binary
//!     → whatever metrics recorder the host application installs
//! ```
//!
//! # Design Decisions
//! - The library never installs a subscriber or recorder itself
//! - Metric updates are cheap no-ops when no recorder is installed
//! - Breaker state is exposed as snapshots, not pushed anywhere

pub mod logging;
pub mod metrics;
