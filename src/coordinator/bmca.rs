use arrayvec::ArrayVec;

use crate::{
    error::PtpError,
    time::{Duration, Time},
};

/// How many recent role-change timestamps are kept for oscillation detection
const CHANGE_HISTORY: usize = 32;

/// Pacing and health thresholds for the election coordinator
#[derive(Debug, Clone, Copy)]
pub struct BmcaCoordinatorConfig {
    /// Period of the timer-driven election runs, milliseconds
    pub execution_interval_ms: u32,
    /// Role changes within the window that count as excessive oscillation
    pub oscillation_threshold: u32,
    /// The oscillation observation window, seconds
    pub oscillation_window_s: u32,
    /// Also run the election when an announce message arrives
    pub run_on_announce: bool,
}

impl Default for BmcaCoordinatorConfig {
    fn default() -> Self {
        Self {
            execution_interval_ms: 1_000,
            oscillation_threshold: 10,
            oscillation_window_s: 60,
            run_on_announce: true,
        }
    }
}

impl BmcaCoordinatorConfig {
    pub fn validate(&self) -> Result<(), PtpError> {
        if self.execution_interval_ms == 0
            || self.oscillation_threshold == 0
            || self.oscillation_window_s == 0
        {
            return Err(PtpError::InvalidParameter);
        }
        Ok(())
    }
}

/// Counters over the life of the election coordinator, wrapping at 64 bits
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BmcaStatistics {
    pub total_executions: u64,
    pub master_selections: u64,
    pub slave_selections: u64,
    pub passive_selections: u64,
    pub role_changes: u64,
    pub parent_changes: u64,
    pub oscillation_count: u64,
    pub no_foreign_masters: u64,
    pub current_foreign_count: u8,
    pub max_foreign_count: u8,
}

/// Health classification of the election
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BmcaHealth {
    Healthy,
    /// Oscillating or running without candidates for a while
    Degraded,
    /// Role changes exceed the configured threshold within the window
    Critical,
}

/// Paces the best-master election and tracks its decisions.
#[derive(Debug)]
pub struct BmcaCoordinator {
    config: BmcaCoordinatorConfig,
    statistics: BmcaStatistics,
    running: bool,
    last_execution: Option<Time>,
    recent_role_changes: ArrayVec<Time, CHANGE_HISTORY>,
}

impl Default for BmcaCoordinator {
    fn default() -> Self {
        Self {
            config: BmcaCoordinatorConfig::default(),
            statistics: BmcaStatistics::default(),
            running: false,
            last_execution: None,
            recent_role_changes: ArrayVec::new(),
        }
    }
}

impl BmcaCoordinator {
    pub fn new(config: BmcaCoordinatorConfig) -> Result<Self, PtpError> {
        config.validate()?;
        Ok(Self {
            config,
            statistics: BmcaStatistics::default(),
            running: false,
            last_execution: None,
            recent_role_changes: ArrayVec::new(),
        })
    }

    pub fn configure(&mut self, config: BmcaCoordinatorConfig) -> Result<(), PtpError> {
        config.validate()?;
        self.config = config;
        Ok(())
    }

    pub fn start(&mut self) -> Result<(), PtpError> {
        if self.running {
            return Err(PtpError::StateError);
        }
        self.running = true;
        self.statistics = BmcaStatistics::default();
        self.last_execution = None;
        self.recent_role_changes.clear();
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
        self.statistics = BmcaStatistics::default();
        self.last_execution = None;
        self.recent_role_changes.clear();
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn get_statistics(&self) -> BmcaStatistics {
        self.statistics
    }

    /// Whether the periodic interval has elapsed and an election should run.
    pub(crate) fn should_run(&self, now: Time) -> bool {
        if !self.running {
            return false;
        }
        match self.last_execution {
            None => true,
            Some(last) => {
                now - last >= Duration::from_millis(self.config.execution_interval_ms as i64)
            }
        }
    }

    pub(crate) fn run_on_announce(&self) -> bool {
        self.running && self.config.run_on_announce
    }

    pub(crate) fn record_execution(&mut self, now: Time, foreign_count: usize) {
        self.last_execution = Some(now);
        self.statistics.total_executions = self.statistics.total_executions.wrapping_add(1);
        self.statistics.current_foreign_count = foreign_count.min(u8::MAX as usize) as u8;
        self.statistics.max_foreign_count = self
            .statistics
            .max_foreign_count
            .max(self.statistics.current_foreign_count);
        if foreign_count == 0 {
            self.statistics.no_foreign_masters =
                self.statistics.no_foreign_masters.wrapping_add(1);
        }
    }

    pub(crate) fn record_role_change(&mut self, now: Time) {
        self.statistics.role_changes = self.statistics.role_changes.wrapping_add(1);
        if self.recent_role_changes.is_full() {
            self.recent_role_changes.remove(0);
        }
        self.recent_role_changes.push(now);

        if self.changes_in_window(now) > self.config.oscillation_threshold {
            self.statistics.oscillation_count =
                self.statistics.oscillation_count.wrapping_add(1);
            log::warn!("excessive role oscillation detected");
        }
    }

    pub(crate) fn record_parent_change(&mut self) {
        self.statistics.parent_changes = self.statistics.parent_changes.wrapping_add(1);
    }

    pub(crate) fn record_selection(&mut self, master: bool, slave: bool, passive: bool) {
        if master {
            self.statistics.master_selections = self.statistics.master_selections.wrapping_add(1);
        }
        if slave {
            self.statistics.slave_selections = self.statistics.slave_selections.wrapping_add(1);
        }
        if passive {
            self.statistics.passive_selections =
                self.statistics.passive_selections.wrapping_add(1);
        }
    }

    pub fn get_health_status(&self, now: Time) -> BmcaHealth {
        let changes = self.changes_in_window(now);
        if changes > self.config.oscillation_threshold {
            BmcaHealth::Critical
        } else if changes > self.config.oscillation_threshold / 2
            || self.statistics.oscillation_count > 0
        {
            BmcaHealth::Degraded
        } else {
            BmcaHealth::Healthy
        }
    }

    /// Whether oscillation currently exceeds the configured threshold
    pub fn excessive_oscillation(&self, now: Time) -> bool {
        self.changes_in_window(now) > self.config.oscillation_threshold
    }

    fn changes_in_window(&self, now: Time) -> u32 {
        let window = Duration::from_secs(self.config.oscillation_window_s as i64);
        self.recent_role_changes
            .iter()
            .filter(|at| now - **at <= window)
            .count() as u32
    }
}
