use arrayvec::ArrayVec;

use crate::{
    error::PtpError,
    time::{Duration, Time},
};

/// Largest supported variance window
const MAX_WINDOW: usize = 32;

/// Accuracy thresholds and sampling pace of the synchronization monitor
#[derive(Debug, Clone, Copy)]
pub struct SyncCoordinatorConfig {
    /// Health re-classification period, milliseconds
    pub sampling_interval_ms: u32,
    /// Below this offset magnitude the clock counts as synchronized, ns
    pub synchronized_threshold_ns: f64,
    /// Above this offset magnitude health degrades, ns
    pub degraded_threshold_ns: f64,
    /// Above this offset magnitude health is critical, ns
    pub critical_threshold_ns: f64,
    /// Samples in the variance window
    pub variance_window_samples: usize,
}

impl Default for SyncCoordinatorConfig {
    fn default() -> Self {
        Self {
            sampling_interval_ms: 1_000,
            synchronized_threshold_ns: 1_000.0,
            degraded_threshold_ns: 10_000.0,
            critical_threshold_ns: 100_000.0,
            variance_window_samples: 10,
        }
    }
}

impl SyncCoordinatorConfig {
    pub fn validate(&self) -> Result<(), PtpError> {
        let ordered = self.synchronized_threshold_ns > 0.0
            && self.degraded_threshold_ns > self.synchronized_threshold_ns
            && self.critical_threshold_ns > self.degraded_threshold_ns;
        if self.sampling_interval_ms == 0 || !ordered || self.variance_window_samples == 0 {
            return Err(PtpError::InvalidParameter);
        }
        Ok(())
    }
}

/// Synchronization accuracy statistics; time values in nanoseconds
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct SyncStatistics {
    pub total_offset_samples: u64,
    pub current_offset_ns: f64,
    pub min_offset_ns: f64,
    pub max_offset_ns: f64,
    pub avg_offset_ns: f64,

    pub total_delay_samples: u64,
    pub current_delay_ns: f64,
    pub min_delay_ns: f64,
    pub max_delay_ns: f64,
    pub avg_delay_ns: f64,

    pub offset_std_dev_ns: f64,
    pub sub_microsecond_samples: u64,

    pub e2e_measurements: u64,
    pub p2p_measurements: u64,

    pub negative_delay_count: u64,
    pub clock_adjust_failures: u64,
}

/// Health classification of the synchronization quality
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncHealth {
    /// Offset within the synchronized threshold and stable
    Synchronized,
    /// Samples flowing, offset not yet within the synchronized threshold
    Converging,
    /// Offset beyond the degraded threshold or variance high
    Degraded,
    /// Offset beyond the critical threshold, or no samples at all
    Critical,
}

/// Tracks offset and delay quality and classifies synchronization health.
#[derive(Debug)]
pub struct SyncCoordinator {
    config: SyncCoordinatorConfig,
    statistics: SyncStatistics,
    health: SyncHealth,
    running: bool,
    last_classification: Option<Time>,
    window: ArrayVec<f64, MAX_WINDOW>,
    offset_sum_ns: f64,
    delay_sum_ns: f64,
}

impl Default for SyncCoordinator {
    fn default() -> Self {
        Self {
            config: SyncCoordinatorConfig::default(),
            statistics: SyncStatistics::default(),
            health: SyncHealth::Critical,
            running: false,
            last_classification: None,
            window: ArrayVec::new(),
            offset_sum_ns: 0.0,
            delay_sum_ns: 0.0,
        }
    }
}

impl SyncCoordinator {
    pub fn new(config: SyncCoordinatorConfig) -> Result<Self, PtpError> {
        config.validate()?;
        Ok(Self {
            config,
            statistics: SyncStatistics::default(),
            health: SyncHealth::Critical,
            running: false,
            last_classification: None,
            window: ArrayVec::new(),
            offset_sum_ns: 0.0,
            delay_sum_ns: 0.0,
        })
    }

    pub fn configure(&mut self, config: SyncCoordinatorConfig) -> Result<(), PtpError> {
        config.validate()?;
        self.config = config;
        Ok(())
    }

    pub fn start(&mut self) -> Result<(), PtpError> {
        if self.running {
            return Err(PtpError::StateError);
        }
        self.running = true;
        self.reset();
        Ok(())
    }

    pub fn stop(&mut self) -> Result<(), PtpError> {
        if !self.running {
            return Err(PtpError::StateError);
        }
        self.running = false;
        Ok(())
    }

    pub fn reset(&mut self) {
        self.statistics = SyncStatistics::default();
        self.health = SyncHealth::Critical;
        self.last_classification = None;
        self.window.clear();
        self.offset_sum_ns = 0.0;
        self.delay_sum_ns = 0.0;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn get_statistics(&self) -> SyncStatistics {
        self.statistics
    }

    pub fn get_health_status(&self) -> SyncHealth {
        self.health
    }

    /// Record one completed measurement.
    pub(crate) fn record_sample(&mut self, offset: Duration, delay: Duration, peer_to_peer: bool) {
        if !self.running {
            return;
        }

        let offset_ns = offset.as_nanos_f64();
        let delay_ns = delay.as_nanos_f64();
        let stats = &mut self.statistics;

        if stats.total_offset_samples == 0 {
            stats.min_offset_ns = offset_ns;
            stats.max_offset_ns = offset_ns;
        } else {
            stats.min_offset_ns = stats.min_offset_ns.min(offset_ns);
            stats.max_offset_ns = stats.max_offset_ns.max(offset_ns);
        }
        stats.total_offset_samples = stats.total_offset_samples.wrapping_add(1);
        stats.current_offset_ns = offset_ns;
        self.offset_sum_ns += offset_ns;
        stats.avg_offset_ns = self.offset_sum_ns / stats.total_offset_samples as f64;

        if stats.total_delay_samples == 0 {
            stats.min_delay_ns = delay_ns;
            stats.max_delay_ns = delay_ns;
        } else {
            stats.min_delay_ns = stats.min_delay_ns.min(delay_ns);
            stats.max_delay_ns = stats.max_delay_ns.max(delay_ns);
        }
        stats.total_delay_samples = stats.total_delay_samples.wrapping_add(1);
        stats.current_delay_ns = delay_ns;
        self.delay_sum_ns += delay_ns;
        stats.avg_delay_ns = self.delay_sum_ns / stats.total_delay_samples as f64;

        if libm::fabs(offset_ns) < 1_000.0 {
            stats.sub_microsecond_samples = stats.sub_microsecond_samples.wrapping_add(1);
        }
        if peer_to_peer {
            stats.p2p_measurements = stats.p2p_measurements.wrapping_add(1);
        } else {
            stats.e2e_measurements = stats.e2e_measurements.wrapping_add(1);
        }

        let window_size = self.config.variance_window_samples.min(MAX_WINDOW);
        if self.window.len() >= window_size {
            self.window.remove(0);
        }
        self.window.push(offset_ns);
        self.statistics.offset_std_dev_ns = self.window_std_dev();
    }

    pub(crate) fn record_negative_delay(&mut self) {
        self.statistics.negative_delay_count =
            self.statistics.negative_delay_count.wrapping_add(1);
    }

    pub(crate) fn record_clock_adjust_failure(&mut self) {
        self.statistics.clock_adjust_failures =
            self.statistics.clock_adjust_failures.wrapping_add(1);
    }

    /// Re-classify health when the sampling interval elapsed.
    pub fn tick(&mut self, now: Time) {
        if !self.running {
            return;
        }
        let due = match self.last_classification {
            None => true,
            Some(last) => {
                now - last >= Duration::from_millis(self.config.sampling_interval_ms as i64)
            }
        };
        if !due {
            return;
        }
        self.last_classification = Some(now);
        self.health = self.classify();
    }

    fn classify(&self) -> SyncHealth {
        if self.statistics.total_offset_samples == 0 {
            return SyncHealth::Critical;
        }
        let magnitude = libm::fabs(self.statistics.current_offset_ns);
        if magnitude >= self.config.critical_threshold_ns {
            SyncHealth::Critical
        } else if magnitude >= self.config.degraded_threshold_ns
            || self.statistics.offset_std_dev_ns >= self.config.degraded_threshold_ns
        {
            SyncHealth::Degraded
        } else if magnitude < self.config.synchronized_threshold_ns {
            SyncHealth::Synchronized
        } else {
            SyncHealth::Converging
        }
    }

    fn window_std_dev(&self) -> f64 {
        if self.window.len() < 2 {
            return 0.0;
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
        libm::sqrt(variance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn running() -> SyncCoordinator {
        let mut coordinator = SyncCoordinator::new(Default::default()).unwrap();
        coordinator.start().unwrap();
        coordinator
    }

    #[test]
    fn threshold_ordering_is_enforced() {
        let config = SyncCoordinatorConfig {
            degraded_threshold_ns: 500.0, // below synchronized
            ..Default::default()
        };
        assert!(matches!(
            SyncCoordinator::new(config),
            Err(PtpError::InvalidParameter)
        ));
    }

    #[test]
    fn health_starts_critical() {
        let mut coordinator = running();
        coordinator.tick(Time::from_secs(1));
        assert_eq!(coordinator.get_health_status(), SyncHealth::Critical);
    }

    #[test]
    fn classifies_against_thresholds() {
        let mut coordinator = running();

        coordinator.record_sample(
            Duration::from_nanos(500),
            Duration::from_micros(10),
            false,
        );
        coordinator.tick(Time::from_secs(1));
        assert_eq!(coordinator.get_health_status(), SyncHealth::Synchronized);

        coordinator.record_sample(
            Duration::from_nanos(5_000),
            Duration::from_micros(10),
            false,
        );
        coordinator.tick(Time::from_secs(3));
        assert_eq!(coordinator.get_health_status(), SyncHealth::Converging);

        coordinator.record_sample(
            Duration::from_nanos(50_000),
            Duration::from_micros(10),
            false,
        );
        coordinator.tick(Time::from_secs(5));
        assert_eq!(coordinator.get_health_status(), SyncHealth::Degraded);

        coordinator.record_sample(
            Duration::from_millis(1),
            Duration::from_micros(10),
            false,
        );
        coordinator.tick(Time::from_secs(7));
        assert_eq!(coordinator.get_health_status(), SyncHealth::Critical);
    }

    #[test]
    fn tracks_min_max_avg() {
        let mut coordinator = running();
        for offset in [100i64, -300, 200] {
            coordinator.record_sample(
                Duration::from_nanos(offset),
                Duration::from_nanos(1_000),
                false,
            );
        }

        let stats = coordinator.get_statistics();
        assert_eq!(stats.total_offset_samples, 3);
        assert_eq!(stats.min_offset_ns, -300.0);
        assert_eq!(stats.max_offset_ns, 200.0);
        assert_eq!(stats.avg_offset_ns, 0.0);
        assert_eq!(stats.sub_microsecond_samples, 3);
        assert_eq!(stats.e2e_measurements, 3);
    }

    #[test]
    fn samples_ignored_while_stopped() {
        let mut coordinator = SyncCoordinator::new(Default::default()).unwrap();
        coordinator.record_sample(Duration::from_nanos(5), Duration::ZERO, false);
        assert_eq!(coordinator.get_statistics().total_offset_samples, 0);
    }
}
