//! motion-core: control-loop primitives for a competitive robot
//!
//! A minimal library of real-time motor-control building blocks. Vendor
//! motor bindings and wire protocols live outside this crate; what lives
//! here is the part that has to be numerically exact.
//!
//! # Modules
//!
//! - [`control`] - The [`ControlLoop`] capability trait, the [`Pid`]
//!   controller, and a fixed-rate loop runner
//! - [`filter`] - Sensor-conditioning filters ([`RollingMedian`])
//!
//! # Architecture
//!
//! ```text
//! sensor ──► RollingMedian ──► Pid::calculate ──► actuator
//!            (optional)            │
//!                                  └── Pid::is_done (settling)
//! ```
//!
//! A periodic task reads a sensor, optionally conditions the value through a
//! filter, feeds it to a control loop's `calculate`, and applies the returned
//! command to hardware. The two components never call each other; the caller
//! composes them. [`LoopRunner`] provides that periodic task when the robot
//! scheduler does not.
//!
//! Each controller or filter instance is exclusively owned by its single
//! driving task. Nothing here blocks, suspends, or performs I/O.

#![warn(unused_must_use)]

pub mod control;
pub mod filter;

// Re-exports for convenience
pub use control::{ControlLoop, LoopConfig, LoopHandle, LoopRunner, LoopStats};
pub use control::{Pid, PidConfig, PidState};
pub use filter::RollingMedian;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Error types for motion-core
///
/// Control-cycle operations (`calculate`, `is_done`) are total and never
/// return errors; these variants surface only from configuration validation
/// and from the loop runner.
#[derive(Debug, thiserror::Error)]
#[must_use = "errors must be handled or explicitly ignored with let _ = ..."]
#[non_exhaustive]
pub enum Error {
    /// Invalid configuration parameter.
    /// Handle by: validating config before use, checking parameter ranges.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Control loop execution error.
    /// Handle by: checking loop rate and callback behavior, joining again.
    #[error("Control loop error: {0}")]
    ControlLoop(String),
}

/// Result type alias for motion-core operations
pub type Result<T> = std::result::Result<T, Error>;
