//! Rolling-window median filter

use std::cmp::Ordering;

/// Order-statistic smoothing filter over a fixed-size FIFO window
///
/// Holds the `window` most recent samples and returns their median on every
/// insert. Spike noise that survives an averaging filter is dropped entirely
/// here, which is why this sits ahead of loops fed by noisy rangefinders or
/// color sensors.
///
/// Generic over the element type; the total order is supplied at
/// construction rather than assumed, so non-numeric orderings work too. The
/// comparator must implement a consistent total order over the inserted
/// values (`f64::total_cmp` rather than `partial_cmp` for floats).
///
/// Each call re-sorts a copy of the window, O(window · log window). The
/// window is a handful of sensor samples; simple and correct beats
/// asymptotically optimal here.
///
/// # Example
/// ```
/// use motion_core::filter::RollingMedian;
///
/// let mut median = RollingMedian::new(3, f64::total_cmp);
/// median.calculate(3.0);
/// median.calculate(1.0);
/// assert_eq!(median.calculate(2.0), 2.0);
///
/// // A 120.0 spike from a misread is absorbed
/// assert_eq!(median.calculate(120.0), 2.0);
/// ```
#[derive(Debug, Clone)]
pub struct RollingMedian<T, C> {
    window: usize,
    samples: Vec<T>,
    comparator: C,
}

impl<T, C> RollingMedian<T, C>
where
    T: Clone,
    C: Fn(&T, &T) -> Ordering,
{
    /// Create a new rolling median with the given window size and total
    /// order
    ///
    /// # Panics
    /// Panics if `window` is 0
    pub fn new(window: usize, comparator: C) -> Self {
        assert!(window > 0, "Window size must be > 0");
        Self {
            window,
            samples: Vec::with_capacity(window),
            comparator,
        }
    }

    /// Insert a sample and return the median of the current window
    ///
    /// Evicts the oldest sample first when the window is full. For an even
    /// sample count the lower median is returned; for odd, the exact middle.
    /// Both indices are taken from the sorted order, not insertion order.
    pub fn calculate(&mut self, value: T) -> T {
        if self.samples.len() == self.window {
            self.samples.remove(0);
        }
        self.samples.push(value);

        let mut sorted = self.samples.clone();
        sorted.sort_by(|a, b| (self.comparator)(a, b));

        let mid = if sorted.len() % 2 == 0 {
            sorted.len() / 2 - 1
        } else {
            sorted.len() / 2
        };
        sorted.swap_remove(mid)
    }

    /// Get the current window contents, oldest first (diagnostics)
    pub fn samples(&self) -> &[T] {
        &self.samples
    }

    /// Get the configured window size
    pub fn window(&self) -> usize {
        self.window
    }

    /// Get the number of samples currently held
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Check whether any samples are held
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Check if the window is fully populated
    pub fn is_full(&self) -> bool {
        self.samples.len() == self.window
    }

    /// Drop all held samples, keeping window size and ordering
    pub fn reset(&mut self) {
        self.samples.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_odd_window_exact_middle() {
        let mut median = RollingMedian::new(3, f64::total_cmp);
        assert_eq!(median.calculate(3.0), 3.0);
        // Two samples: lower median of {1, 3}
        assert_eq!(median.calculate(1.0), 1.0);
        // {3, 1, 2} sorted {1, 2, 3}, odd count, index 1
        assert_eq!(median.calculate(2.0), 2.0);
    }

    #[test]
    fn test_fifo_eviction() {
        let mut median = RollingMedian::new(3, f64::total_cmp);
        median.calculate(3.0);
        median.calculate(1.0);
        median.calculate(2.0);
        // 4th insert evicts the oldest (3), window is {1, 2, 10}
        assert_eq!(median.calculate(10.0), 2.0);
        assert_eq!(median.samples(), &[1.0, 2.0, 10.0]);
    }

    #[test]
    fn test_window_never_exceeds_capacity() {
        let mut median = RollingMedian::new(4, i64::cmp);
        for i in 0..20 {
            median.calculate(i);
            assert!(median.len() <= 4);
        }
        assert!(median.is_full());
        // Most recent 4 inputs, oldest first
        assert_eq!(median.samples(), &[16, 17, 18, 19]);
    }

    #[test]
    fn test_even_count_returns_lower_median() {
        let mut median = RollingMedian::new(4, i64::cmp);
        median.calculate(7);
        median.calculate(1);
        median.calculate(9);
        // {7, 1, 9, 5} sorted {1, 5, 7, 9}: lower median at index 1
        assert_eq!(median.calculate(5), 5);
    }

    #[test]
    fn test_window_of_one_passes_through() {
        let mut median = RollingMedian::new(1, f64::total_cmp);
        assert_eq!(median.calculate(4.0), 4.0);
        assert_eq!(median.calculate(-2.5), -2.5);
        assert_eq!(median.samples(), &[-2.5]);
    }

    #[test]
    fn test_custom_ordering() {
        // Reversed order flips which element the "lower median" picks on
        // even counts
        let mut median = RollingMedian::new(2, |a: &i64, b: &i64| b.cmp(a));
        median.calculate(1);
        // Sorted descending {5, 1}: index 0 is 5
        assert_eq!(median.calculate(5), 5);
    }

    #[test]
    fn test_non_numeric_elements() {
        let mut median = RollingMedian::new(3, |a: &(&str, u32), b: &(&str, u32)| a.1.cmp(&b.1));
        median.calculate(("lift", 40));
        median.calculate(("tilt", 10));
        assert_eq!(median.calculate(("arm", 25)), ("arm", 25));
    }

    #[test]
    fn test_spike_rejection() {
        let mut median = RollingMedian::new(5, f64::total_cmp);
        for v in [10.0, 10.1, 9.9, 10.0, 10.2] {
            median.calculate(v);
        }
        // A single wild sample never becomes the median of a 5-window
        assert_eq!(median.calculate(500.0), 10.1);
    }

    #[test]
    fn test_reset_clears_samples() {
        let mut median = RollingMedian::new(3, f64::total_cmp);
        median.calculate(1.0);
        median.calculate(2.0);
        median.reset();
        assert!(median.is_empty());
        assert_eq!(median.calculate(7.0), 7.0);
    }

    #[test]
    #[should_panic(expected = "Window size must be > 0")]
    fn test_zero_window_rejected() {
        let _ = RollingMedian::new(0, f64::total_cmp);
    }
}
