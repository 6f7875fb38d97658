//! Capability contract for closed-loop controllers

/// A stateful closed-loop controller driven once per fixed control tick.
///
/// Implementors own all of their history (previous measurement, integral
/// accumulator, settled-cycle counter) and mutate it exactly once per
/// [`calculate`](ControlLoop::calculate) call. Setpoint and measurement are
/// unit-agnostic; the caller picks one unit and uses it consistently for
/// both.
///
/// [`Pid`](crate::control::Pid) is the only implementation shipped here, but
/// the trait is the seam for future variants (bang-bang, feedforward-only).
pub trait ControlLoop {
    /// Replace the target value.
    ///
    /// Only the target changes; integral and derivative history are kept so
    /// a moving setpoint does not kick the output.
    fn set_setpoint(&mut self, setpoint: f64);

    /// Replace the settling tolerance used by [`is_done`](ControlLoop::is_done).
    fn set_done_range(&mut self, range: f64);

    /// Set the minimum number of consecutive settled cycles required before
    /// the loop reports done.
    fn set_min_done_cycles(&mut self, cycles: u32);

    /// Compute one control step from the current measurement.
    ///
    /// Returns the next actuator command and commits the measurement to
    /// internal history. Total function: an unconfigured controller (zero
    /// gains, zero feedforward) returns `0.0` rather than failing.
    fn calculate(&mut self, measurement: f64) -> f64;

    /// Whether the measurement has stayed within the done range for more
    /// than the configured number of consecutive cycles.
    ///
    /// Pure query over history already recorded by `calculate`; call it
    /// after `calculate` in the same cycle to reflect current data.
    fn is_done(&self) -> bool;
}
