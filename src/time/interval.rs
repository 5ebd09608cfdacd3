/// A log₂-seconds representation of the pacing of periodic events.
///
/// PTP data sets carry message intervals as a signed log₂ of seconds; an
/// interval of 1 means one message every two seconds, -2 one every 250 ms.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Interval(i8);

impl Interval {
    /// One second
    pub const ONE_SECOND: Self = Self(0);

    /// Two seconds
    pub const TWO_SECONDS: Self = Self(1);

    /// Construct an interval from log₂ seconds
    pub const fn from_log_2(log_2: i8) -> Self {
        Self(log_2)
    }

    /// The log₂ seconds value carried on the wire
    pub const fn as_log_2(self) -> i8 {
        self.0
    }

    /// The length of this interval as a [`Duration`](super::Duration)
    pub fn as_duration(self) -> super::Duration {
        super::Duration::from_interval(self)
    }

    /// The length of this interval in seconds
    pub fn seconds(self) -> f64 {
        libm::exp2(self.0 as f64)
    }
}

impl core::fmt::Debug for Interval {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Interval")
            .field("log_base_2", &self.0)
            .field("seconds", &self.seconds())
            .finish()
    }
}

impl From<i8> for Interval {
    fn from(value: i8) -> Self {
        Self::from_log_2(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lengths() {
        assert_eq!(Interval::TWO_SECONDS.seconds(), 2.0);
        assert_eq!(Interval::from_log_2(-1).seconds(), 0.5);
        assert_eq!(
            Interval::from_log_2(3).as_duration().as_nanos(),
            8_000_000_000
        );
    }
}
