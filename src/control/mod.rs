//! Closed-loop control for robot mechanisms
//!
//! Provides the [`ControlLoop`] capability trait, the [`Pid`] implementation,
//! and a fixed-rate runner for driving a loop against a sensor and actuator.

mod control_loop;
mod pid;
mod runner;

pub use control_loop::ControlLoop;
pub use pid::{Pid, PidConfig, PidState};
pub use runner::{LoopConfig, LoopHandle, LoopRunner, LoopStats};
