//! PID controller implementation
//!
//! A PID (Proportional-Integral-Derivative) controller with feedforward,
//! per-cycle integral anti-windup, derivative-on-measurement, and
//! multi-cycle settling detection.

use serde::{Deserialize, Serialize};

use super::ControlLoop;
use crate::{Error, Result};

/// PID controller configuration
///
/// Gains default to zero, so an unconfigured controller commands `0.0`.
/// `max_output` is a symmetric clamp on the command and is itself kept in
/// `[0, 1]`; values outside that range are normalized, never rejected.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PidConfig {
    /// Proportional gain
    pub kp: f64,
    /// Integral gain
    pub ki: f64,
    /// Derivative gain
    pub kd: f64,
    /// Feedforward gain, applied to the feedforward function's output
    pub kff: f64,
    /// Deadband on the error below which integral accumulation is disabled
    pub epsilon: f64,
    /// Symmetric output clamp, normalized into [0, 1]
    pub max_output: f64,
    /// Tolerance below which a cycle counts as settled
    pub done_range: f64,
    /// Consecutive settled cycles required (exceeded strictly) before done
    pub min_done_cycles: u32,
}

impl Default for PidConfig {
    fn default() -> Self {
        Self {
            kp: 0.0,
            ki: 0.0,
            kd: 0.0,
            kff: 0.0,
            epsilon: 0.0,
            max_output: 1.0,
            done_range: 0.0,
            min_done_cycles: 10,
        }
    }
}

impl PidConfig {
    /// Create a new PID config with the given gains
    pub fn new(kp: f64, ki: f64, kd: f64) -> Self {
        Self {
            kp,
            ki,
            kd,
            ..Default::default()
        }
    }

    /// Create a P-only controller config
    pub fn p(kp: f64) -> Self {
        Self::new(kp, 0.0, 0.0)
    }

    /// Create a PI controller config
    pub fn pi(kp: f64, ki: f64) -> Self {
        Self::new(kp, ki, 0.0)
    }

    /// Create a PD controller config
    pub fn pd(kp: f64, kd: f64) -> Self {
        Self::new(kp, 0.0, kd)
    }

    /// Set the feedforward gain
    pub fn with_feed_forward(mut self, kff: f64) -> Self {
        self.kff = kff;
        self
    }

    /// Set the integral deadband
    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self
    }

    /// Set the output clamp (normalized into [0, 1])
    pub fn with_max_output(mut self, max: f64) -> Self {
        self.max_output = normalize_max_output(max);
        self
    }

    /// Set the settling tolerance
    pub fn with_done_range(mut self, range: f64) -> Self {
        self.done_range = range;
        self
    }

    /// Set the settled-cycle requirement
    pub fn with_min_done_cycles(mut self, cycles: u32) -> Self {
        self.min_done_cycles = cycles;
        self
    }

    /// Check the configuration for values that indicate a mistake
    ///
    /// Negative gains invert the loop's sense and negative tolerances can
    /// never be satisfied; both almost always mean a sign slipped in during
    /// tuning. Runtime operations stay total either way; this is an opt-in
    /// check for configuration load paths.
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("kp", self.kp),
            ("ki", self.ki),
            ("kd", self.kd),
            ("kff", self.kff),
            ("epsilon", self.epsilon),
            ("done_range", self.done_range),
        ];
        for (name, value) in fields {
            if !value.is_finite() {
                return Err(Error::Config(format!("{} must be finite, got {}", name, value)));
            }
            if value < 0.0 {
                return Err(Error::Config(format!("{} must be >= 0, got {}", name, value)));
            }
        }
        if !self.max_output.is_finite() {
            return Err(Error::Config(format!(
                "max_output must be finite, got {}",
                self.max_output
            )));
        }
        Ok(())
    }
}

/// PID controller internal state
///
/// Mutated exactly once per `calculate` call; exposed read-only for
/// diagnostics and logging.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PidState {
    /// Running integral accumulator
    pub error_sum: f64,
    /// Last measurement committed by `calculate`
    pub previous_value: f64,
    /// Set until the first `calculate` after construction or `reset`
    pub first_cycle: bool,
    /// Consecutive settled-cycle counter
    pub cycle_count: u32,
}

impl Default for PidState {
    fn default() -> Self {
        Self {
            error_sum: 0.0,
            previous_value: 0.0,
            first_cycle: true,
            cycle_count: 0,
        }
    }
}

type FeedForwardFn = Box<dyn Fn(f64) -> f64 + Send + Sync>;

/// Normalize the output clamp into [0, 1]; a NaN clamp would poison
/// `f64::clamp` downstream, so it falls back to the full range.
fn normalize_max_output(max: f64) -> f64 {
    if max.is_nan() {
        1.0
    } else {
        max.clamp(0.0, 1.0)
    }
}

/// PID controller
///
/// The integral term uses a per-cycle anti-windup policy: each cycle's
/// contribution is capped at `1.0`, accumulation is disabled entirely while
/// the error is inside the `epsilon` deadband, and a negative accumulator is
/// zeroed before accumulating in the positive direction. The derivative is
/// taken on the measurement, not the error, so setpoint steps do not spike
/// the output.
///
/// One instance is owned and driven by exactly one periodic task; there is
/// no internal synchronization.
///
/// # Example
/// ```
/// use motion_core::control::{ControlLoop, Pid, PidConfig};
///
/// let config = PidConfig::new(0.8, 0.02, 0.1)
///     .with_max_output(0.6)
///     .with_done_range(0.5);
///
/// let mut pid = Pid::new(config);
/// pid.set_setpoint(120.0);
///
/// // In the periodic task
/// let measurement = 40.0;
/// let command = pid.calculate(measurement);
/// assert!(command.abs() <= 0.6);
/// ```
pub struct Pid {
    config: PidConfig,
    feed_forward: FeedForwardFn,
    setpoint: f64,
    state: PidState,
}

impl std::fmt::Debug for Pid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pid")
            .field("config", &self.config)
            .field("setpoint", &self.setpoint)
            .field("state", &self.state)
            .finish()
    }
}

impl Default for Pid {
    fn default() -> Self {
        Self::new(PidConfig::default())
    }
}

impl Pid {
    /// Create a new PID controller with the given configuration
    ///
    /// The feedforward function defaults to identity. `max_output` is
    /// normalized into `[0, 1]`; negative gains are accepted but logged,
    /// since they invert the loop's sense.
    pub fn new(config: PidConfig) -> Self {
        if config.kp < 0.0 || config.ki < 0.0 || config.kd < 0.0 || config.kff < 0.0 {
            tracing::warn!(
                kp = config.kp,
                ki = config.ki,
                kd = config.kd,
                kff = config.kff,
                "negative PID gain, loop sense is inverted"
            );
        }
        Self {
            config: PidConfig {
                max_output: normalize_max_output(config.max_output),
                ..config
            },
            feed_forward: Box::new(|x| x),
            setpoint: 0.0,
            state: PidState::default(),
        }
    }

    /// Create a PID controller with the given gains and default config
    pub fn pid(kp: f64, ki: f64, kd: f64) -> Self {
        Self::new(PidConfig::new(kp, ki, kd))
    }

    /// Create a P-only controller
    pub fn p(kp: f64) -> Self {
        Self::new(PidConfig::p(kp))
    }

    /// Create a PI controller
    pub fn pi(kp: f64, ki: f64) -> Self {
        Self::new(PidConfig::pi(kp, ki))
    }

    /// Create a PD controller
    pub fn pd(kp: f64, kd: f64) -> Self {
        Self::new(PidConfig::pd(kp, kd))
    }

    /// Change the PID gains
    ///
    /// Takes effect on the next `calculate` call; history is untouched.
    pub fn set_pid_gains(&mut self, kp: f64, ki: f64, kd: f64) {
        self.config.kp = kp;
        self.config.ki = ki;
        self.config.kd = kd;
    }

    /// Set the feedforward mapping and gain
    ///
    /// The mapping is applied to the current setpoint each cycle and scaled
    /// by `kff`.
    pub fn set_feed_forward<F>(&mut self, function: F, kff: f64)
    where
        F: Fn(f64) -> f64 + Send + Sync + 'static,
    {
        self.feed_forward = Box::new(function);
        self.config.kff = kff;
    }

    /// Set the feedforward gain with an identity mapping
    pub fn set_feed_forward_gain(&mut self, kff: f64) {
        self.feed_forward = Box::new(|x| x);
        self.config.kff = kff;
    }

    /// Set the integral deadband
    pub fn set_epsilon(&mut self, epsilon: f64) {
        self.config.epsilon = epsilon;
    }

    /// Set the output clamp
    ///
    /// Normalized into `[0, 1]`: negative values become `0.0`, values above
    /// one become `1.0`.
    pub fn set_max_output(&mut self, max: f64) {
        self.config.max_output = normalize_max_output(max);
    }

    /// Clear the integral accumulator and re-arm the first-cycle warm-up
    ///
    /// Called when re-enabling a loop after a pause so stale integral state
    /// does not carry over. Gains and setpoint are untouched.
    pub fn reset(&mut self) {
        self.state.error_sum = 0.0;
        self.state.first_cycle = true;
    }

    /// Get the current target
    pub fn setpoint(&self) -> f64 {
        self.setpoint
    }

    /// Get the last measurement committed by `calculate`
    pub fn previous_value(&self) -> f64 {
        self.state.previous_value
    }

    /// Get the current state
    pub fn state(&self) -> &PidState {
        &self.state
    }

    /// Get the configuration
    pub fn config(&self) -> &PidConfig {
        &self.config
    }
}

impl ControlLoop for Pid {
    fn set_setpoint(&mut self, setpoint: f64) {
        self.setpoint = setpoint;
    }

    fn set_done_range(&mut self, range: f64) {
        self.config.done_range = range;
    }

    fn set_min_done_cycles(&mut self, cycles: u32) {
        self.config.min_done_cycles = cycles;
    }

    fn calculate(&mut self, measurement: f64) -> f64 {
        // Warm-up: the first derivative must not see a phantom jump from an
        // uninitialized previous value.
        if self.state.first_cycle {
            self.state.previous_value = measurement;
            self.state.first_cycle = false;
        }

        let ff = (self.feed_forward)(self.setpoint) * self.config.kff;

        let error = self.setpoint - measurement;
        let p = self.config.kp * error;

        // Anti-windup: contributions are capped at 1.0 per cycle, a negative
        // accumulator is zeroed before positive accumulation, and the
        // accumulator is cleared entirely inside the deadband.
        if error > self.config.epsilon {
            if self.state.error_sum < 0.0 {
                self.state.error_sum = 0.0;
            }
            self.state.error_sum += error.min(1.0);
        } else {
            self.state.error_sum = 0.0;
        }
        let i = self.config.ki * self.state.error_sum;

        // Derivative on measurement, not error
        let deriv = measurement - self.state.previous_value;
        let d = self.config.kd * deriv;

        let mut output =
            (ff + p + i - d).clamp(-self.config.max_output, self.config.max_output);

        if !output.is_finite() {
            tracing::warn!(
                setpoint = self.setpoint,
                measurement,
                "non-finite PID output, commanding 0.0"
            );
            output = 0.0;
        }

        self.state.previous_value = measurement;

        // Settling bookkeeping lives here so is_done stays a pure query
        if (self.setpoint - measurement).abs() <= self.config.done_range {
            self.state.cycle_count = self.state.cycle_count.saturating_add(1);
        } else {
            self.state.cycle_count = 0;
        }

        output
    }

    fn is_done(&self) -> bool {
        self.state.cycle_count > self.config.min_done_cycles
    }
}
