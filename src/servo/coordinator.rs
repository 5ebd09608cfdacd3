use super::Servo;
use crate::{
    error::PtpError,
    time::{Duration, Time},
};

/// The discipline states of the clock servo.
///
/// `Recovery` is the start state and the state re-entered after any step
/// correction or reference change; `Holdover` free-runs on the last good
/// frequency while the reference is away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServoState {
    Recovery,
    Locked,
    Holdover,
}

impl core::fmt::Display for ServoState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ServoState::Recovery => write!(f, "Recovery"),
            ServoState::Locked => write!(f, "Locked"),
            ServoState::Holdover => write!(f, "Holdover"),
        }
    }
}

/// What the host clock should do for one processed sample.
///
/// The carried values are ready to hand to the [`Clock`](crate::Clock): the
/// sign flip from "measured offset" to "applied correction" has already
/// happened.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ServoAction {
    /// Nothing to apply
    None,
    /// Step the clock by this amount
    Step(Duration),
    /// Apply this frequency delta, parts-per-billion
    AdjustFrequency(f64),
}

/// Configuration of the servo state machine
#[derive(Debug, Clone, Copy)]
pub struct ServoConfig {
    /// Consecutive valid reference samples needed for `Recovery → Locked`
    pub recovery_samples: u32,
    /// Offsets above this magnitude are corrected by stepping, not slewing
    pub step_threshold_ns: i64,
    /// Phase error in holdover that forces a resynchronization
    pub holdover_phase_limit_ns: i64,
}

impl Default for ServoConfig {
    fn default() -> Self {
        Self {
            recovery_samples: 10,
            step_threshold_ns: 100_000_000,
            holdover_phase_limit_ns: 100_000_000,
        }
    }
}

impl ServoConfig {
    pub fn validate(&self) -> Result<(), PtpError> {
        if self.recovery_samples == 0
            || self.step_threshold_ns <= 0
            || self.holdover_phase_limit_ns <= 0
        {
            return Err(PtpError::InvalidParameter);
        }
        Ok(())
    }
}

/// A diagnostic snapshot of the coordinator
#[derive(Debug, Clone, Copy)]
pub struct ServoDiagnostics {
    pub state: ServoState,
    pub consecutive_valid: u32,
    pub last_phase_error_ns: i64,
    pub last_freq_error_ppb: f64,
    pub reference_valid: bool,
    pub tod_valid: bool,
    pub time_in_state: Duration,
}

/// Drives a [`Servo`] under the Recovery / Locked / Holdover machine and
/// turns its output into clock actions.
#[derive(Debug)]
pub struct ServoCoordinator<S> {
    servo: S,
    config: ServoConfig,
    state: ServoState,
    consecutive_valid: u32,
    last_state_change: Option<Time>,
    last_phase_error_ns: i64,
    last_freq_error_ppb: f64,
    reference_valid: bool,
    tod_valid: bool,
}

impl<S: Servo> ServoCoordinator<S> {
    pub fn new(servo: S, config: ServoConfig) -> Result<Self, PtpError> {
        config.validate()?;
        Ok(Self {
            servo,
            config,
            state: ServoState::Recovery,
            consecutive_valid: 0,
            last_state_change: None,
            last_phase_error_ns: 0,
            last_freq_error_ppb: 0.0,
            reference_valid: false,
            tod_valid: false,
        })
    }

    pub fn state(&self) -> ServoState {
        self.state
    }

    pub fn servo(&self) -> &S {
        &self.servo
    }

    /// Locked state with a stable controller: both must hold.
    pub fn is_locked(&self) -> bool {
        self.state == ServoState::Locked && self.servo.is_locked()
    }

    /// Consume one offset measurement against a valid reference.
    ///
    /// Returns the action the host clock should apply. Offsets beyond the
    /// step threshold are stepped out; the integrator is zeroed and the
    /// machine re-enters `Recovery`.
    pub fn discipline(&mut self, offset: Duration, now: Time) -> ServoAction {
        let phase_error_ns = offset.as_nanos();

        if phase_error_ns.abs() > self.config.step_threshold_ns {
            log::warn!("offset {phase_error_ns}ns beyond slew range, stepping clock");
            self.servo.reset();
            self.consecutive_valid = 0;
            self.transition(ServoState::Recovery, now);
            self.record(true, true, phase_error_ns, 0.0);
            return ServoAction::Step(-offset);
        }

        let correction_ppb = self.servo.sample(phase_error_ns);
        self.update(true, true, phase_error_ns, correction_ppb, now);

        ServoAction::AdjustFrequency(-correction_ppb)
    }

    /// Update the state machine with one reference observation. Used
    /// directly by hosts that separate reference validity from offset
    /// sampling (a GPS-style reference); [`discipline`] calls it for the
    /// measurement path.
    pub fn update(
        &mut self,
        reference_valid: bool,
        tod_valid: bool,
        phase_error_ns: i64,
        freq_error_ppb: f64,
        now: Time,
    ) {
        if self.last_state_change.is_none() {
            self.last_state_change = Some(now);
        }
        self.record(reference_valid, tod_valid, phase_error_ns, freq_error_ppb);

        let valid = reference_valid && tod_valid;
        match self.state {
            ServoState::Locked => {
                if !valid {
                    self.transition(ServoState::Holdover, now);
                }
            }
            ServoState::Holdover => {
                if valid {
                    self.consecutive_valid = 0;
                    self.transition(ServoState::Recovery, now);
                    // the restoring sample already counts towards recovery
                    self.consecutive_valid = 1;
                } else if phase_error_ns.abs() > self.config.holdover_phase_limit_ns {
                    log::warn!("holdover phase error exceeds limit, forcing resynchronization");
                    self.servo.reset();
                    self.consecutive_valid = 0;
                    self.transition(ServoState::Recovery, now);
                }
            }
            ServoState::Recovery => {
                if valid {
                    self.consecutive_valid = self.consecutive_valid.saturating_add(1);
                    if self.consecutive_valid >= self.config.recovery_samples {
                        self.transition(ServoState::Locked, now);
                    }
                } else {
                    self.consecutive_valid = 0;
                }
            }
        }
    }

    /// The synchronization reference went away (parent lost, slave port
    /// moved). A locked servo holds over on its accumulated frequency.
    pub fn reference_lost(&mut self, now: Time) {
        self.reference_valid = false;
        self.tod_valid = false;
        self.consecutive_valid = 0;
        if self.state == ServoState::Locked {
            self.transition(ServoState::Holdover, now);
        }
    }

    /// The reference changed identity; discipline restarts from scratch.
    pub fn reference_changed(&mut self, now: Time) {
        self.servo.reset();
        self.consecutive_valid = 0;
        self.transition(ServoState::Recovery, now);
    }

    /// Back to the initial state, controller zeroed.
    pub fn reset(&mut self) {
        self.servo.reset();
        self.state = ServoState::Recovery;
        self.consecutive_valid = 0;
        self.last_state_change = None;
        self.last_phase_error_ns = 0;
        self.last_freq_error_ppb = 0.0;
        self.reference_valid = false;
        self.tod_valid = false;
    }

    pub fn diagnostics(&self, now: Time) -> ServoDiagnostics {
        ServoDiagnostics {
            state: self.state,
            consecutive_valid: self.consecutive_valid,
            last_phase_error_ns: self.last_phase_error_ns,
            last_freq_error_ppb: self.last_freq_error_ppb,
            reference_valid: self.reference_valid,
            tod_valid: self.tod_valid,
            time_in_state: match self.last_state_change {
                Some(changed) => now - changed,
                None => Duration::ZERO,
            },
        }
    }

    fn record(
        &mut self,
        reference_valid: bool,
        tod_valid: bool,
        phase_error_ns: i64,
        freq_error_ppb: f64,
    ) {
        self.reference_valid = reference_valid;
        self.tod_valid = tod_valid;
        self.last_phase_error_ns = phase_error_ns;
        self.last_freq_error_ppb = freq_error_ppb;
    }

    fn transition(&mut self, new_state: ServoState, now: Time) {
        if new_state == self.state {
            return;
        }
        log::info!("servo state {} -> {}", self.state, new_state);
        self.state = new_state;
        self.last_state_change = Some(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::servo::PiServo;

    fn coordinator() -> ServoCoordinator<PiServo> {
        ServoCoordinator::new(PiServo::default(), ServoConfig::default()).unwrap()
    }

    #[test]
    fn rejects_zero_recovery_samples() {
        let config = ServoConfig {
            recovery_samples: 0,
            ..Default::default()
        };
        assert!(matches!(
            ServoCoordinator::new(PiServo::default(), config),
            Err(PtpError::InvalidParameter)
        ));
    }

    #[test]
    fn locks_after_fifteen_small_samples_and_unlocks_on_spike() {
        let mut coordinator = coordinator();

        for sample in 1..=15u64 {
            let action =
                coordinator.discipline(Duration::from_nanos(5), Time::from_secs(sample));
            assert!(matches!(action, ServoAction::AdjustFrequency(_)));
            if sample >= 11 {
                assert!(coordinator.is_locked(), "not locked at sample {sample}");
            }
        }

        coordinator.discipline(Duration::from_nanos(10_000), Time::from_secs(16));
        assert!(!coordinator.is_locked());
    }

    #[test]
    fn large_offset_steps_and_reenters_recovery() {
        let mut coordinator = coordinator();

        for sample in 1..=12u64 {
            coordinator.discipline(Duration::from_nanos(5), Time::from_secs(sample));
        }
        assert_eq!(coordinator.state(), ServoState::Locked);

        let action =
            coordinator.discipline(Duration::from_millis(200), Time::from_secs(13));
        assert_eq!(
            action,
            ServoAction::Step(-Duration::from_millis(200))
        );
        assert_eq!(coordinator.state(), ServoState::Recovery);
        assert!(!coordinator.is_locked());
    }

    #[test]
    fn reference_loss_enters_holdover_and_recovery_on_return() {
        let mut coordinator = coordinator();

        for sample in 1..=10u64 {
            coordinator.discipline(Duration::from_nanos(5), Time::from_secs(sample));
        }
        assert_eq!(coordinator.state(), ServoState::Locked);

        coordinator.reference_lost(Time::from_secs(11));
        assert_eq!(coordinator.state(), ServoState::Holdover);

        // reference back: recovery, then locked again after ten valid samples
        coordinator.update(true, true, 5, 0.0, Time::from_secs(12));
        assert_eq!(coordinator.state(), ServoState::Recovery);

        for sample in 13..=22u64 {
            coordinator.update(true, true, 5, 0.0, Time::from_secs(sample));
        }
        assert_eq!(coordinator.state(), ServoState::Locked);
    }

    #[test]
    fn correction_sign_opposes_offset() {
        let mut coordinator = coordinator();
        let ServoAction::AdjustFrequency(delta) =
            coordinator.discipline(Duration::from_nanos(1_000), Time::from_secs(1))
        else {
            panic!("expected frequency adjustment");
        };
        // local clock ahead: it must slow down
        assert!(delta < 0.0);
    }

    #[test]
    fn diagnostics_track_state_duration() {
        let mut coordinator = coordinator();
        coordinator.discipline(Duration::from_nanos(5), Time::from_secs(100));

        let diagnostics = coordinator.diagnostics(Time::from_secs(130));
        assert_eq!(diagnostics.state, ServoState::Recovery);
        assert_eq!(diagnostics.time_in_state.secs(), 30);
        assert_eq!(diagnostics.last_phase_error_ns, 5);
    }
}
