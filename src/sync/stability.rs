use arrayvec::ArrayVec;

use crate::time::Duration;

/// Largest supported stability window
const MAX_WINDOW: usize = 32;

/// How many consecutive samples must exist before stability can be declared
const MIN_CONSECUTIVE_SAMPLES: u32 = 3;

/// A rolling window over recent offset samples that decides when the offset
/// is stable enough to trust.
///
/// Stability requires BOTH at least three consecutive samples AND a window
/// standard deviation below the threshold; either condition alone is not
/// sufficient.
#[derive(Debug, Clone)]
pub(crate) struct StabilityTracker {
    window: ArrayVec<f64, MAX_WINDOW>,
    window_size: usize,
    threshold_ns: f64,
    consecutive: u32,
}

impl Default for StabilityTracker {
    fn default() -> Self {
        Self::new(10, 1_000.0)
    }
}

impl StabilityTracker {
    pub(crate) fn new(window_size: usize, threshold_ns: f64) -> Self {
        Self {
            window: ArrayVec::new(),
            window_size: window_size.min(MAX_WINDOW).max(1),
            threshold_ns,
            consecutive: 0,
        }
    }

    pub(crate) fn record(&mut self, offset: Duration) {
        if self.window.len() == self.window_size {
            self.window.remove(0);
        }
        self.window.push(offset.as_nanos_f64());
        self.consecutive = self.consecutive.saturating_add(1);
    }

    pub(crate) fn reset(&mut self) {
        self.window.clear();
        self.consecutive = 0;
    }

    pub(crate) fn consecutive_samples(&self) -> u32 {
        self.consecutive
    }

    /// Standard deviation over the window; `None` until two samples exist.
    pub(crate) fn std_dev_ns(&self) -> Option<f64> {
        if self.window.len() < 2 {
            return None;
        }
        let n = self.window.len() as f64;
        let mean = self.window.iter().sum::<f64>() / n;
        let variance = self
            .window
            .iter()
            .map(|sample| {
                let d = sample - mean;
                d * d
            })
            .sum::<f64>()
            / n;
        Some(libm::sqrt(variance))
    }

    pub(crate) fn is_stable(&self) -> bool {
        if self.consecutive_samples() < MIN_CONSECUTIVE_SAMPLES {
            return false;
        }
        match self.std_dev_ns() {
            Some(std_dev) => std_dev <= self.threshold_ns,
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn needs_three_consecutive_samples() {
        let mut tracker = StabilityTracker::default();

        tracker.record(Duration::from_nanos(5));
        tracker.record(Duration::from_nanos(5));
        assert!(!tracker.is_stable());

        tracker.record(Duration::from_nanos(5));
        assert!(tracker.is_stable());
    }

    #[test]
    fn needs_low_variance_too() {
        let mut tracker = StabilityTracker::new(10, 100.0);

        for offset in [0, 50_000, -50_000, 25_000] {
            tracker.record(Duration::from_nanos(offset));
        }
        assert!(tracker.consecutive_samples() >= 3);
        assert!(!tracker.is_stable());
    }

    #[test]
    fn reset_clears_progress() {
        let mut tracker = StabilityTracker::default();
        for _ in 0..5 {
            tracker.record(Duration::from_nanos(1));
        }
        assert!(tracker.is_stable());

        tracker.reset();
        assert!(!tracker.is_stable());
        assert_eq!(tracker.consecutive_samples(), 0);
    }

    #[test]
    fn window_is_bounded() {
        let mut tracker = StabilityTracker::new(4, 1_000.0);
        for offset in 0..20 {
            tracker.record(Duration::from_nanos(offset));
        }
        // only the last four samples influence the deviation
        assert!(tracker.std_dev_ns().unwrap() < 2.0);
    }
}
