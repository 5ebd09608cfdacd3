use crate::{datastructures::WireFormat, error::PtpError};

/// The globally unique identity of a PTP clock, constant for its lifetime.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClockIdentity(pub [u8; 8]);

impl ClockIdentity {
    /// Derive an identity from a EUI-48 MAC address, per IEEE 1588-2019
    /// 7.5.2.2.2 (the address padded with 0xFF, 0xFE in the middle).
    pub fn from_mac_address(addr: [u8; 6]) -> Self {
        let mut identity = [0; 8];
        identity[0..3].copy_from_slice(&addr[0..3]);
        identity[3] = 0xFF;
        identity[4] = 0xFE;
        identity[5..8].copy_from_slice(&addr[3..6]);
        Self(identity)
    }
}

impl core::fmt::Display for ClockIdentity {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        for (i, octet) in self.0.iter().enumerate() {
            if i != 0 {
                write!(f, ":")?;
            }
            write!(f, "{octet:02x}")?;
        }
        Ok(())
    }
}

impl WireFormat for ClockIdentity {
    fn wire_size(&self) -> usize {
        8
    }

    fn serialize(&self, buffer: &mut [u8]) -> Result<(), PtpError> {
        if buffer.len() < 8 {
            return Err(PtpError::BufferTooShort);
        }
        buffer[0..8].copy_from_slice(&self.0);
        Ok(())
    }

    fn deserialize(buffer: &[u8]) -> Result<Self, PtpError> {
        let octets = buffer
            .get(0..8)
            .ok_or(PtpError::BufferTooShort)?
            .try_into()
            .unwrap();
        Ok(Self(octets))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wireformat() {
        let identity = ClockIdentity([0xA0, 0xB1, 0xC2, 0xFF, 0xFE, 0xD3, 0xE4, 0xF5]);

        let mut buffer = [0; 8];
        identity.serialize(&mut buffer).unwrap();
        assert_eq!(buffer, [0xA0, 0xB1, 0xC2, 0xFF, 0xFE, 0xD3, 0xE4, 0xF5]);
        assert_eq!(ClockIdentity::deserialize(&buffer).unwrap(), identity);
    }

    #[test]
    fn from_mac() {
        assert_eq!(
            ClockIdentity::from_mac_address([1, 2, 3, 4, 5, 6]),
            ClockIdentity([1, 2, 3, 0xFF, 0xFE, 4, 5, 6])
        );
    }
}
