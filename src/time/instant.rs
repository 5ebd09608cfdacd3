use core::{
    fmt,
    ops::{Add, AddAssign, Sub, SubAssign},
};

use fixed::types::{I48F16, U96F32};

use super::Duration;
use crate::datastructures::common::{TimeInterval, WireTimestamp};

/// A point on the local timescale, stored as unsigned 96.32 fixed-point
/// nanoseconds since the epoch.
///
/// The fractional bits carry the sub-nanosecond part of correction fields so
/// that residence times accumulate without rounding.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Time {
    inner: U96F32,
}

impl Time {
    /// Create an instant from whole seconds since the epoch
    pub fn from_secs(secs: u64) -> Self {
        Self {
            inner: U96F32::from_num(secs as u128 * 1_000_000_000),
        }
    }

    /// Create an instant from whole milliseconds since the epoch
    pub fn from_millis(millis: u64) -> Self {
        Self {
            inner: U96F32::from_num(millis as u128 * 1_000_000),
        }
    }

    /// Create an instant from whole microseconds since the epoch
    pub fn from_micros(micros: u64) -> Self {
        Self {
            inner: U96F32::from_num(micros as u128 * 1_000),
        }
    }

    /// Create an instant from whole nanoseconds since the epoch
    pub fn from_nanos(nanos: u64) -> Self {
        Self {
            inner: U96F32::from_num(nanos),
        }
    }

    /// Create an instant from fixed-point nanoseconds since the epoch
    pub fn from_fixed_nanos(nanos: U96F32) -> Self {
        Self { inner: nanos }
    }

    /// Fixed-point nanoseconds since the epoch
    pub fn nanos(&self) -> U96F32 {
        self.inner
    }

    /// Whole seconds since the epoch
    pub fn secs(&self) -> u64 {
        (self.inner / U96F32::from_num(1_000_000_000u64)).to_num()
    }

    /// The nanoseconds within the current second
    pub fn subsec_nanos(&self) -> u32 {
        (self.inner % U96F32::from_num(1_000_000_000u64)).to_num::<u64>() as u32
    }

    /// The sub-nanosecond part, as a correction-field quantity
    pub fn subnano(&self) -> TimeInterval {
        let fraction = self.inner.to_bits() & 0xFFFF_FFFF;
        // Keep the upper 16 of the 32 fractional bits, the wire resolution
        TimeInterval(I48F16::from_bits((fraction >> 16) as i64))
    }

    /// Whether this is the all-zero sentinel meaning "unset"
    pub fn is_zero(&self) -> bool {
        self.inner == U96F32::ZERO
    }
}

impl From<WireTimestamp> for Time {
    fn from(ts: WireTimestamp) -> Self {
        Self {
            inner: U96F32::from_num(ts.seconds as u128 * 1_000_000_000 + ts.nanos as u128),
        }
    }
}

impl From<Time> for WireTimestamp {
    fn from(time: Time) -> Self {
        WireTimestamp {
            seconds: time.secs(),
            nanos: time.subsec_nanos(),
        }
    }
}

impl Add<Duration> for Time {
    type Output = Time;

    fn add(self, rhs: Duration) -> Self::Output {
        let sum = self.inner.to_bits() as i128 + rhs.nanos().to_bits();
        Time {
            inner: U96F32::from_bits(sum.max(0) as u128),
        }
    }
}

impl AddAssign<Duration> for Time {
    fn add_assign(&mut self, rhs: Duration) {
        *self = *self + rhs;
    }
}

impl Sub<Duration> for Time {
    type Output = Time;

    fn sub(self, rhs: Duration) -> Self::Output {
        self + -rhs
    }
}

impl SubAssign<Duration> for Time {
    fn sub_assign(&mut self, rhs: Duration) {
        *self = *self - rhs;
    }
}

impl Sub for Time {
    type Output = Duration;

    fn sub(self, rhs: Self) -> Self::Output {
        let difference = self.inner.to_bits() as i128 - rhs.inner.to_bits() as i128;
        Duration::from_fixed_nanos(fixed::types::I96F32::from_bits(difference))
    }
}

impl fmt::Debug for Time {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Time").field("nanos", &self.inner).finish()
    }
}

impl fmt::Display for Time {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:09}", self.secs(), self.subsec_nanos())
    }
}
