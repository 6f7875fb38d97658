//! Sensor-conditioning filters
//!
//! Filters placed between a noisy sensor and a control loop's measurement
//! input. The loop never calls the filter (or vice versa); the periodic
//! caller composes them.

mod median;

pub use median::RollingMedian;
