use super::Servo;

/// Tuning of the proportional-integral servo
#[derive(Debug, Clone, Copy)]
pub struct PiServoConfig {
    /// Proportional gain
    pub kp: f64,
    /// Integral gain
    pub ki: f64,
    /// Anti-windup clamp on the integral accumulator, nanoseconds
    pub integral_max_ns: f64,
    /// Per-sample clamp on the correction output, ppb
    pub freq_max_ppb: f64,
    /// Phase error bound for lock detection, nanoseconds
    pub phase_lock_threshold_ns: i64,
    /// Frequency correction bound for lock detection, ppb
    pub freq_lock_threshold_ppb: f64,
    /// Consecutive in-bounds samples before the lock is declared
    pub lock_stability_samples: u32,
}

impl Default for PiServoConfig {
    fn default() -> Self {
        Self {
            kp: 0.7,
            ki: 3.0e-5,
            integral_max_ns: 50_000_000.0,
            freq_max_ppb: 100_000.0,
            phase_lock_threshold_ns: 100,
            freq_lock_threshold_ppb: 5.0,
            lock_stability_samples: 10,
        }
    }
}

/// The classical PI controller:
///
/// ```text
/// integral += offset
/// correction = kp * offset + ki * integral
/// ```
///
/// One nanosecond per second of phase error equals one ppb by definition, so
/// the gains act directly on nanosecond offsets. The integral accumulator is
/// clamped so a long outage cannot wind it up into a huge correction.
#[derive(Debug)]
pub struct PiServo {
    config: PiServoConfig,
    integral: f64,
    last_correction_ppb: f64,
    locked: bool,
    consecutive_locked: u32,
    samples: u64,
}

impl PiServo {
    pub fn new(config: PiServoConfig) -> Self {
        Self {
            config,
            integral: 0.0,
            last_correction_ppb: 0.0,
            locked: false,
            consecutive_locked: 0,
            samples: 0,
        }
    }

    /// Total samples processed over the servo lifetime
    pub fn sample_count(&self) -> u64 {
        self.samples
    }

    /// The integral accumulator, nanoseconds
    pub fn integral_ns(&self) -> f64 {
        self.integral
    }

    pub fn consecutive_locked(&self) -> u32 {
        self.consecutive_locked
    }

    fn meets_lock_criteria(&self, offset_ns: i64, correction_ppb: f64) -> bool {
        // both bounds are inclusive: a sample exactly on a threshold counts
        offset_ns.abs() <= self.config.phase_lock_threshold_ns
            && libm::fabs(correction_ppb) <= self.config.freq_lock_threshold_ppb
    }
}

impl Default for PiServo {
    fn default() -> Self {
        Self::new(PiServoConfig::default())
    }
}

impl Servo for PiServo {
    fn sample(&mut self, offset_ns: i64) -> f64 {
        self.samples = self.samples.wrapping_add(1);

        self.integral += offset_ns as f64;
        self.integral = self
            .integral
            .clamp(-self.config.integral_max_ns, self.config.integral_max_ns);

        let correction = self.config.kp * offset_ns as f64 + self.config.ki * self.integral;
        let correction = correction.clamp(-self.config.freq_max_ppb, self.config.freq_max_ppb);
        self.last_correction_ppb = correction;

        if self.meets_lock_criteria(offset_ns, correction) {
            self.consecutive_locked = self.consecutive_locked.saturating_add(1);
            if self.consecutive_locked >= self.config.lock_stability_samples && !self.locked {
                self.locked = true;
                log::info!(
                    "servo locked (phase {offset_ns}ns, correction {correction:.2}ppb)"
                );
            }
        } else {
            self.consecutive_locked = 0;
            if self.locked {
                self.locked = false;
                log::warn!(
                    "servo lost lock (phase {offset_ns}ns, correction {correction:.2}ppb)"
                );
            }
        }

        correction
    }

    fn reset(&mut self) {
        self.integral = 0.0;
        self.last_correction_ppb = 0.0;
        self.locked = false;
        self.consecutive_locked = 0;
        // sample count is a lifetime statistic and survives a reset
    }

    fn is_locked(&self) -> bool {
        self.locked
    }

    fn last_correction_ppb(&self) -> f64 {
        self.last_correction_ppb
    }
}
