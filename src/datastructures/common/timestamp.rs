use crate::{datastructures::WireFormat, error::PtpError};

/// An on-the-wire timestamp: 48-bit seconds and 32-bit nanoseconds.
///
/// The all-zero value is the "unset" sentinel carried by messages whose
/// origin timestamp is delivered out of band (two-step operation).
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WireTimestamp {
    /// The seconds field of the timestamp, 48 bits on the wire
    pub seconds: u64,
    /// The nanoseconds field of the timestamp, always below 10⁹
    pub nanos: u32,
}

impl WireTimestamp {
    /// Whether this is the "unset" sentinel
    pub fn is_empty(&self) -> bool {
        self.seconds == 0 && self.nanos == 0
    }
}

impl WireFormat for WireTimestamp {
    fn wire_size(&self) -> usize {
        10
    }

    fn serialize(&self, buffer: &mut [u8]) -> Result<(), PtpError> {
        if buffer.len() < 10 {
            return Err(PtpError::BufferTooShort);
        }
        buffer[0..6].copy_from_slice(&self.seconds.to_be_bytes()[2..8]);
        buffer[6..10].copy_from_slice(&self.nanos.to_be_bytes());
        Ok(())
    }

    fn deserialize(buffer: &[u8]) -> Result<Self, PtpError> {
        if buffer.len() < 10 {
            return Err(PtpError::BufferTooShort);
        }
        let mut seconds = [0; 8];
        seconds[2..8].copy_from_slice(&buffer[0..6]);
        let nanos = u32::from_be_bytes(buffer[6..10].try_into().unwrap());
        if nanos >= 1_000_000_000 {
            return Err(PtpError::InvalidTimestamp);
        }
        Ok(Self {
            seconds: u64::from_be_bytes(seconds),
            nanos,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wireformat() {
        let representations = [
            // one hour in, just before the seconds roll over
            (
                [0x00, 0x00, 0x00, 0x00, 0x0E, 0x10, 0x3B, 0x9A, 0xC9, 0xFF],
                WireTimestamp {
                    seconds: 3_600,
                    nanos: 999_999_999,
                },
            ),
            // seconds wider than 32 bits use all six octets
            (
                [0x01, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01],
                WireTimestamp {
                    seconds: (1u64 << 40) + 1,
                    nanos: 1,
                },
            ),
            (
                [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00],
                WireTimestamp::default(),
            ),
        ];

        for (bytes, object) in representations {
            let mut buffer = [0; 10];
            object.serialize(&mut buffer).unwrap();
            assert_eq!(buffer, bytes);
            assert_eq!(WireTimestamp::deserialize(&bytes).unwrap(), object);
        }
    }

    #[test]
    fn nanos_bound() {
        let mut buffer = [0; 10];
        WireTimestamp {
            seconds: 0,
            nanos: 999_999_999,
        }
        .serialize(&mut buffer)
        .unwrap();
        assert!(WireTimestamp::deserialize(&buffer).is_ok());

        buffer[6..10].copy_from_slice(&1_000_000_000u32.to_be_bytes());
        assert_eq!(
            WireTimestamp::deserialize(&buffer),
            Err(PtpError::InvalidTimestamp)
        );
    }
}
