use az::Cast;
use fixed::types::I48F16;

use crate::{datastructures::WireFormat, error::PtpError, time::Duration};

/// A time interval in scaled nanoseconds: signed 64-bit with the wire unit
/// being 2⁻¹⁶ ns. Carried as the correction field of every message and as
/// the offset/delay fields of the current data set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct TimeInterval(pub I48F16);

impl TimeInterval {
    /// The zero interval
    pub const ZERO: TimeInterval = TimeInterval(I48F16::ZERO);

    /// Nanoseconds as a float, for reporting
    pub fn to_nanos(self) -> f64 {
        self.0.cast()
    }

    /// Saturating addition; residence times compose this way
    pub fn saturating_add(self, rhs: Self) -> Self {
        TimeInterval(self.0.saturating_add(rhs.0))
    }

    /// Saturating subtraction
    pub fn saturating_sub(self, rhs: Self) -> Self {
        TimeInterval(self.0.saturating_sub(rhs.0))
    }
}

impl From<Duration> for TimeInterval {
    fn from(duration: Duration) -> Self {
        // A duration carries 32 fractional bits per nanosecond, the wire
        // only 16; truncating the excess resolution cannot overflow because
        // the 48-bit integer part is preserved as-is.
        let wide = duration.nanos().to_bits();
        TimeInterval(I48F16::from_bits((wide >> 16) as i64))
    }
}

impl WireFormat for TimeInterval {
    fn wire_size(&self) -> usize {
        8
    }

    fn serialize(&self, buffer: &mut [u8]) -> Result<(), PtpError> {
        if buffer.len() < 8 {
            return Err(PtpError::BufferTooShort);
        }
        buffer[0..8].copy_from_slice(&self.0.to_bits().to_be_bytes());
        Ok(())
    }

    fn deserialize(buffer: &[u8]) -> Result<Self, PtpError> {
        if buffer.len() < 8 {
            return Err(PtpError::BufferTooShort);
        }
        Ok(Self(I48F16::from_bits(i64::from_be_bytes(
            buffer[0..8].try_into().unwrap(),
        ))))
    }
}
