//! Fixed-rate driver for control loops
//!
//! Drives a [`ControlLoop`] implementor against a measurement source and an
//! actuator sink at a fixed tick rate, with timing statistics and graceful
//! shutdown. Robot frameworks that already provide a periodic task can skip
//! this and call [`ControlLoop::calculate`] directly.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use super::ControlLoop;
use crate::{Error, Result};

/// Configuration for a fixed-rate loop
#[derive(Debug, Clone)]
pub struct LoopConfig {
    /// Target tick rate in Hz
    pub rate_hz: f64,
    /// Name for logging/debugging
    pub name: Arc<str>,
    /// Whether to warn on timing overruns
    pub warn_on_overrun: bool,
    /// Maximum acceptable jitter coefficient before warning (e.g., 0.1 = 10%)
    pub max_jitter_ratio: f64,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            rate_hz: 50.0,
            name: "control_loop".into(),
            warn_on_overrun: true,
            max_jitter_ratio: 0.1,
        }
    }
}

impl LoopConfig {
    /// Create a new config with the given tick rate
    pub fn new(rate_hz: f64) -> Self {
        Self {
            rate_hz,
            ..Default::default()
        }
    }

    /// Set the loop name
    pub fn with_name(mut self, name: impl Into<Arc<str>>) -> Self {
        self.name = name.into();
        self
    }

    /// Get the target tick period
    pub fn period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.rate_hz)
    }

    fn validate(&self) -> Result<()> {
        // Guards the division in period(); from_secs_f64 panics on non-finite
        if !self.rate_hz.is_finite() || self.rate_hz <= 0.0 {
            return Err(Error::Config(format!(
                "{}: rate_hz must be finite and > 0, got {}",
                self.name, self.rate_hz
            )));
        }
        Ok(())
    }
}

/// Timing statistics for a running loop
///
/// Jitter is tracked with Welford's online algorithm for numerically stable
/// variance computation.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoopStats {
    /// Number of completed ticks
    pub iterations: u64,
    /// Number of timing overruns
    pub overruns: u64,
    /// Total execution time across ticks
    pub total_execution_time: Duration,
    /// Maximum tick time
    pub max_iteration_time: Duration,
    /// Minimum tick time
    pub min_iteration_time: Duration,
    /// Average tick time
    pub avg_iteration_time: Duration,
    /// Last tick time
    pub last_iteration_time: Duration,
    // Welford's online algorithm state for variance
    welford_mean: f64,
    welford_m2: f64,
}

impl LoopStats {
    fn update(&mut self, execution_time: Duration, target_period: Duration) {
        self.iterations += 1;
        self.total_execution_time += execution_time;
        self.last_iteration_time = execution_time;

        let time_secs = execution_time.as_secs_f64();

        if self.iterations == 1 {
            self.min_iteration_time = execution_time;
            self.max_iteration_time = execution_time;
            self.welford_mean = time_secs;
            self.welford_m2 = 0.0;
        } else {
            self.min_iteration_time = self.min_iteration_time.min(execution_time);
            self.max_iteration_time = self.max_iteration_time.max(execution_time);

            // See: https://en.wikipedia.org/wiki/Algorithms_for_calculating_variance#Welford's_online_algorithm
            let delta = time_secs - self.welford_mean;
            self.welford_mean += delta / self.iterations as f64;
            let delta2 = time_secs - self.welford_mean;
            self.welford_m2 += delta * delta2;
        }

        // Update avg on the first tick and every 64th to avoid per-tick division
        if self.iterations == 1 || self.iterations % 64 == 0 {
            self.avg_iteration_time = self.total_execution_time.div_f64(self.iterations as f64);
        }

        if execution_time > target_period {
            self.overruns += 1;
        }
    }

    /// Get the overrun ratio (0.0 to 1.0)
    pub fn overrun_ratio(&self) -> f64 {
        if self.iterations == 0 {
            0.0
        } else {
            self.overruns as f64 / self.iterations as f64
        }
    }

    /// Get the timing range (max - min tick time)
    ///
    /// The simplest measure of timing variability, but sensitive to
    /// outliers; prefer [`jitter_std_dev`](LoopStats::jitter_std_dev).
    pub fn timing_range(&self) -> Duration {
        self.max_iteration_time
            .saturating_sub(self.min_iteration_time)
    }

    /// Get timing jitter as standard deviation (in seconds)
    ///
    /// Returns 0.0 if fewer than 2 ticks have completed.
    pub fn jitter_std_dev(&self) -> f64 {
        if self.iterations < 2 {
            0.0
        } else {
            let variance = self.welford_m2 / (self.iterations - 1) as f64;
            variance.sqrt()
        }
    }

    /// Get the coefficient of variation for timing jitter
    ///
    /// CV = std_dev / mean, a dimensionless measure comparable across loop
    /// rates. Returns 0.0 if mean is zero or fewer than 2 ticks.
    pub fn jitter_coefficient(&self) -> f64 {
        if self.iterations < 2 || self.welford_mean == 0.0 {
            0.0
        } else {
            self.jitter_std_dev() / self.welford_mean
        }
    }
}

/// Handle to a loop running on a background thread
pub struct LoopHandle {
    running: Arc<AtomicBool>,
    stats: Arc<Mutex<LoopStats>>,
    thread: Option<JoinHandle<()>>,
}

impl LoopHandle {
    /// Check if the loop is still ticking
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Get the current statistics
    pub fn stats(&self) -> LoopStats {
        *self.stats.lock()
    }

    /// Ask the loop to stop after its current tick
    pub fn stop(&self) {
        self.running.store(false, Ordering::Relaxed);
    }

    /// Stop and wait for the loop to finish
    pub fn join(mut self) -> Result<LoopStats> {
        self.stop();
        if let Some(handle) = self.thread.take() {
            handle
                .join()
                .map_err(|_| Error::ControlLoop("loop thread panicked".into()))?;
        }
        Ok(*self.stats.lock())
    }
}

/// Fixed-rate runner for a [`ControlLoop`]
///
/// Each tick reads a measurement, runs one `calculate` step, and applies the
/// command to the sink. The loop ends when the controller reports done or
/// the handle is stopped. Any sensor conditioning (e.g. a
/// [`RollingMedian`](crate::filter::RollingMedian)) belongs inside the
/// `read` closure.
///
/// # Example
/// ```no_run
/// use motion_core::control::{ControlLoop, LoopConfig, LoopRunner, Pid, PidConfig};
///
/// let mut pid = Pid::new(PidConfig::p(0.8).with_done_range(0.5));
/// pid.set_setpoint(90.0);
///
/// let handle = LoopRunner::spawn(
///     LoopConfig::new(50.0).with_name("turret"),
///     pid,
///     || 0.0,          // read the turret encoder
///     |_command| {},   // drive the turret motor
/// ).unwrap();
///
/// let stats = handle.join().unwrap();
/// println!("settled after {} ticks", stats.iterations);
/// ```
pub struct LoopRunner;

impl LoopRunner {
    /// Spawn a loop on a background thread
    pub fn spawn<L, R, W>(
        config: LoopConfig,
        mut controller: L,
        mut read: R,
        mut write: W,
    ) -> Result<LoopHandle>
    where
        L: ControlLoop + Send + 'static,
        R: FnMut() -> f64 + Send + 'static,
        W: FnMut(f64) + Send + 'static,
    {
        config.validate()?;

        let running = Arc::new(AtomicBool::new(true));
        let stats = Arc::new(Mutex::new(LoopStats::default()));

        let running_clone = running.clone();
        let stats_clone = stats.clone();
        let period = config.period();

        let thread = thread::spawn(move || {
            while running_clone.load(Ordering::Relaxed) {
                let tick_start = Instant::now();

                let measurement = read();
                let command = controller.calculate(measurement);
                write(command);

                let execution_time = tick_start.elapsed();
                stats_clone.lock().update(execution_time, period);

                if controller.is_done() {
                    tracing::debug!(name = %config.name, "loop settled");
                    running_clone.store(false, Ordering::Relaxed);
                    break;
                }

                if let Some(sleep_time) = period.checked_sub(execution_time) {
                    thread::sleep(sleep_time);
                } else if config.warn_on_overrun {
                    tracing::warn!(
                        "{}: tick overrun by {:?}",
                        config.name,
                        execution_time - period
                    );
                }
            }
        });

        Ok(LoopHandle {
            running,
            stats,
            thread: Some(thread),
        })
    }

    /// Run a loop on the current thread until the controller settles
    pub fn run<L, R, W>(
        config: LoopConfig,
        mut controller: L,
        mut read: R,
        mut write: W,
    ) -> Result<LoopStats>
    where
        L: ControlLoop,
        R: FnMut() -> f64,
        W: FnMut(f64),
    {
        config.validate()?;

        let period = config.period();
        let mut stats = LoopStats::default();

        loop {
            let tick_start = Instant::now();

            let measurement = read();
            let command = controller.calculate(measurement);
            write(command);

            let execution_time = tick_start.elapsed();
            stats.update(execution_time, period);

            if controller.is_done() {
                break;
            }

            if let Some(sleep_time) = period.checked_sub(execution_time) {
                thread::sleep(sleep_time);
            } else if config.warn_on_overrun {
                tracing::warn!(
                    "{}: tick overrun by {:?}",
                    config.name,
                    execution_time - period
                );
            }
        }

        if stats.jitter_coefficient() > config.max_jitter_ratio {
            tracing::warn!(
                name = %config.name,
                jitter = stats.jitter_coefficient(),
                "loop jitter above configured ratio"
            );
        }

        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::{Pid, PidConfig};
    use std::cell::Cell;
    use std::rc::Rc;

    fn settling_pid() -> Pid {
        let config = PidConfig::p(1.0)
            .with_done_range(0.05)
            .with_min_done_cycles(2);
        let mut pid = Pid::new(config);
        pid.set_setpoint(1.0);
        pid
    }

    #[test]
    fn test_run_settles_on_first_order_plant() {
        let plant = Rc::new(Cell::new(0.0));
        let sensor = plant.clone();
        let actuator = plant.clone();

        let stats = LoopRunner::run(
            LoopConfig::new(1000.0).with_name("test_plant"),
            settling_pid(),
            move || sensor.get(),
            // Plant moves halfway to wherever the command pushes it
            move |command| actuator.set(actuator.get() + command * 0.5),
        )
        .unwrap();

        assert!(stats.iterations >= 3);
        assert!((plant.get() - 1.0).abs() <= 0.05);
    }

    #[test]
    fn test_spawn_settles_and_joins() {
        let plant = Arc::new(Mutex::new(0.0));
        let sensor = plant.clone();
        let actuator = plant.clone();

        let handle = LoopRunner::spawn(
            LoopConfig::new(1000.0),
            settling_pid(),
            move || *sensor.lock(),
            move |command| {
                let mut value = actuator.lock();
                *value += command * 0.5;
            },
        )
        .unwrap();

        let stats = handle.join().unwrap();
        assert!(stats.iterations >= 3);
        assert!((*plant.lock() - 1.0).abs() <= 0.05);
    }

    #[test]
    fn test_spawn_stop_before_settling() {
        // Fixed error of 1.0 with done_range 0: never settles on its own
        let mut pid = Pid::p(1.0);
        pid.set_setpoint(1.0);

        let handle = LoopRunner::spawn(LoopConfig::new(1000.0), pid, || 0.0, |_| {}).unwrap();

        thread::sleep(Duration::from_millis(20));
        assert!(handle.is_running());
        let stats = handle.join().unwrap();
        assert!(stats.iterations > 0);
    }

    #[test]
    fn test_invalid_rate_rejected() {
        assert!(LoopRunner::run(LoopConfig::new(0.0), Pid::p(1.0), || 0.0, |_| {}).is_err());
        assert!(
            LoopRunner::spawn(LoopConfig::new(f64::NAN), Pid::p(1.0), || 0.0, |_| {}).is_err()
        );
    }

    #[test]
    fn test_stats_accumulate() {
        let mut stats = LoopStats::default();
        let period = Duration::from_millis(10);
        stats.update(Duration::from_millis(2), period);
        stats.update(Duration::from_millis(4), period);
        stats.update(Duration::from_millis(12), period);

        assert_eq!(stats.iterations, 3);
        assert_eq!(stats.overruns, 1);
        assert_eq!(stats.min_iteration_time, Duration::from_millis(2));
        assert_eq!(stats.max_iteration_time, Duration::from_millis(12));
        assert_eq!(stats.timing_range(), Duration::from_millis(10));
        assert!(stats.jitter_std_dev() > 0.0);
        assert!((stats.overrun_ratio() - 1.0 / 3.0).abs() < 1e-12);
    }
}
