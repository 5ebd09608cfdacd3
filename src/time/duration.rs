use core::{
    fmt,
    ops::{Add, AddAssign, Div, Mul, Neg, Sub, SubAssign},
};

use fixed::{traits::LossyInto, types::I96F32};

use super::Interval;
use crate::datastructures::common::TimeInterval;

/// A signed amount of time, stored as 96.32 fixed-point nanoseconds.
///
/// The wide integer part means differences of [`Time`](super::Time) values
/// near the 48-bit seconds rollover cannot overflow, and the 32 fractional
/// bits preserve the sub-nanosecond resolution of correction fields.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Duration {
    inner: I96F32,
}

impl Duration {
    /// The zero-length duration
    pub const ZERO: Duration = Duration {
        inner: I96F32::ZERO,
    };

    /// Create a duration from whole seconds
    pub fn from_secs(secs: i64) -> Self {
        Self {
            inner: I96F32::from_num(secs as i128 * 1_000_000_000),
        }
    }

    /// Create a duration from whole milliseconds
    pub fn from_millis(millis: i64) -> Self {
        Self {
            inner: I96F32::from_num(millis as i128 * 1_000_000),
        }
    }

    /// Create a duration from whole microseconds
    pub fn from_micros(micros: i64) -> Self {
        Self {
            inner: I96F32::from_num(micros as i128 * 1_000),
        }
    }

    /// Create a duration from whole nanoseconds
    pub fn from_nanos(nanos: i64) -> Self {
        Self {
            inner: I96F32::from_num(nanos),
        }
    }

    /// Create a duration from fixed-point nanoseconds
    pub fn from_fixed_nanos(nanos: I96F32) -> Self {
        Self { inner: nanos }
    }

    /// The `2^log_2` seconds length of an [`Interval`]
    pub fn from_interval(interval: Interval) -> Self {
        let log_2 = interval.as_log_2() as i32;
        let nanos: i128 = if log_2 >= 0 {
            1_000_000_000i128 << log_2
        } else {
            1_000_000_000i128 >> (-log_2)
        };
        Self {
            inner: I96F32::from_num(nanos),
        }
    }

    /// The fixed-point nanoseconds of this duration
    pub fn nanos(&self) -> I96F32 {
        self.inner
    }

    /// Whole nanoseconds, truncated towards zero
    pub fn as_nanos(&self) -> i64 {
        self.inner.to_num()
    }

    /// Nanoseconds as a float, for reporting
    pub fn as_nanos_f64(&self) -> f64 {
        self.inner.lossy_into()
    }

    /// Whole seconds, truncated towards zero
    pub fn secs(&self) -> i64 {
        (self.inner / I96F32::from_num(1_000_000_000i64)).to_num()
    }

    /// The magnitude of this duration
    pub fn abs(self) -> Self {
        if self.inner < I96F32::ZERO {
            -self
        } else {
            self
        }
    }

    /// Restrict this duration to `min..=max`
    pub fn clamp(self, min: Self, max: Self) -> Self {
        if self < min {
            min
        } else if self > max {
            max
        } else {
            self
        }
    }
}

impl From<TimeInterval> for Duration {
    fn from(interval: TimeInterval) -> Self {
        // I48F16 scaled nanoseconds widen losslessly into I96F32
        Self {
            inner: I96F32::from_bits((interval.0.to_bits() as i128) << 16),
        }
    }
}

impl Add for Duration {
    type Output = Duration;

    fn add(self, rhs: Self) -> Self::Output {
        Duration {
            inner: self.inner + rhs.inner,
        }
    }
}

impl AddAssign for Duration {
    fn add_assign(&mut self, rhs: Self) {
        self.inner += rhs.inner;
    }
}

impl Sub for Duration {
    type Output = Duration;

    fn sub(self, rhs: Self) -> Self::Output {
        Duration {
            inner: self.inner - rhs.inner,
        }
    }
}

impl SubAssign for Duration {
    fn sub_assign(&mut self, rhs: Self) {
        self.inner -= rhs.inner;
    }
}

impl Neg for Duration {
    type Output = Duration;

    fn neg(self) -> Self::Output {
        Duration { inner: -self.inner }
    }
}

impl Mul<i32> for Duration {
    type Output = Duration;

    fn mul(self, rhs: i32) -> Self::Output {
        Duration {
            inner: self.inner * I96F32::from_num(rhs),
        }
    }
}

impl Div<i32> for Duration {
    type Output = Duration;

    fn div(self, rhs: i32) -> Self::Output {
        Duration {
            inner: self.inner / I96F32::from_num(rhs),
        }
    }
}

impl fmt::Debug for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Duration")
            .field("nanos", &self.inner)
            .finish()
    }
}

impl fmt::Display for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ns", self.inner)
    }
}
