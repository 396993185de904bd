//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Shutdown (shutdown.rs):
//!     Ctrl+C received → token cancelled → every request signal derived
//!     from it fires → retry sleeps and in-flight attempts abort
//! ```
//!
//! # Design Decisions
//! - Requests derive child signals, so cancelling one request never
//!   cancels the others

pub mod shutdown;

pub use shutdown::Shutdown;
