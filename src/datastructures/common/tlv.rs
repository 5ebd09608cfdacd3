use crate::error::PtpError;

/// TLV type codes, IEEE 1588-2019 table 52.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlvType {
    Management,
    ManagementErrorStatus,
    OrganizationExtension,
    RequestUnicastTransmission,
    GrantUnicastTransmission,
    CancelUnicastTransmission,
    AcknowledgeCancelUnicastTransmission,
    PathTrace,
    AlternateTimeOffsetIndicator,
    Legacy,
    Experimental,
    OrganizationExtensionPropagate,
    EnhancedAccuracyMetrics,
    OrganizationExtensionDoNotPropagate,
    L1Sync,
    PortCommunicationAvailability,
    ProtocolAddress,
    SlaveRxSyncTimingData,
    SlaveRxSyncComputedData,
    SlaveTxEventTimestamps,
    CumulativeRateRatio,
    Pad,
    Authentication,
    /// Any code this implementation does not interpret; carried, not parsed
    Reserved(u16),
}

impl TlvType {
    pub fn to_primitive(self) -> u16 {
        match self {
            Self::Management => 0x0001,
            Self::ManagementErrorStatus => 0x0002,
            Self::OrganizationExtension => 0x0003,
            Self::RequestUnicastTransmission => 0x0004,
            Self::GrantUnicastTransmission => 0x0005,
            Self::CancelUnicastTransmission => 0x0006,
            Self::AcknowledgeCancelUnicastTransmission => 0x0007,
            Self::PathTrace => 0x0008,
            Self::AlternateTimeOffsetIndicator => 0x0009,
            Self::Legacy => 0x2000,
            Self::Experimental => 0x2004,
            Self::OrganizationExtensionPropagate => 0x4000,
            Self::EnhancedAccuracyMetrics => 0x4001,
            Self::OrganizationExtensionDoNotPropagate => 0x8000,
            Self::L1Sync => 0x8001,
            Self::PortCommunicationAvailability => 0x8002,
            Self::ProtocolAddress => 0x8003,
            Self::SlaveRxSyncTimingData => 0x8004,
            Self::SlaveRxSyncComputedData => 0x8005,
            Self::SlaveTxEventTimestamps => 0x8006,
            Self::CumulativeRateRatio => 0x8007,
            Self::Pad => 0x8008,
            Self::Authentication => 0x8009,
            Self::Reserved(value) => value,
        }
    }

    pub fn from_primitive(value: u16) -> Self {
        match value {
            0x0001 => Self::Management,
            0x0002 => Self::ManagementErrorStatus,
            0x0003 => Self::OrganizationExtension,
            0x0004 => Self::RequestUnicastTransmission,
            0x0005 => Self::GrantUnicastTransmission,
            0x0006 => Self::CancelUnicastTransmission,
            0x0007 => Self::AcknowledgeCancelUnicastTransmission,
            0x0008 => Self::PathTrace,
            0x0009 => Self::AlternateTimeOffsetIndicator,
            0x2000..=0x2003 => Self::Legacy,
            0x2004..=0x202F | 0x7F00..=0x7FFF => Self::Experimental,
            0x4000 => Self::OrganizationExtensionPropagate,
            0x4001 => Self::EnhancedAccuracyMetrics,
            0x8000 => Self::OrganizationExtensionDoNotPropagate,
            0x8001 => Self::L1Sync,
            0x8002 => Self::PortCommunicationAvailability,
            0x8003 => Self::ProtocolAddress,
            0x8004 => Self::SlaveRxSyncTimingData,
            0x8005 => Self::SlaveRxSyncComputedData,
            0x8006 => Self::SlaveTxEventTimestamps,
            0x8007 => Self::CumulativeRateRatio,
            0x8008 => Self::Pad,
            0x8009 => Self::Authentication,
            other => Self::Reserved(other),
        }
    }
}

/// A single type-length-value extension, borrowing its value bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tlv<'a> {
    pub tlv_type: TlvType,
    pub value: &'a [u8],
}

impl<'a> Tlv<'a> {
    /// The byte size on the wire: 4 header octets plus the value
    pub fn wire_size(&self) -> usize {
        4 + self.value.len()
    }

    fn serialize(&self, buffer: &mut [u8]) -> Result<(), PtpError> {
        if buffer.len() < self.wire_size() {
            return Err(PtpError::BufferTooShort);
        }
        buffer[0..2].copy_from_slice(&self.tlv_type.to_primitive().to_be_bytes());
        buffer[2..4].copy_from_slice(&(self.value.len() as u16).to_be_bytes());
        buffer[4..4 + self.value.len()].copy_from_slice(self.value);
        Ok(())
    }
}

/// The validated TLV suffix of a message.
///
/// Deserialization only checks the length structure; values of unknown types
/// are kept opaque and skipped over by length, as the standard requires.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TlvSet<'a> {
    bytes: &'a [u8],
}

impl<'a> TlvSet<'a> {
    pub fn wire_size(&self) -> usize {
        self.bytes.len()
    }

    pub fn serialize(&self, buffer: &mut [u8]) -> Result<(), PtpError> {
        if buffer.len() < self.bytes.len() {
            return Err(PtpError::BufferTooShort);
        }
        buffer[..self.bytes.len()].copy_from_slice(self.bytes);
        Ok(())
    }

    pub fn deserialize(mut buffer: &'a [u8]) -> Result<Self, PtpError> {
        let original = buffer;
        while !buffer.is_empty() {
            if buffer.len() < 4 {
                return Err(PtpError::BufferTooShort);
            }
            let length = u16::from_be_bytes(buffer[2..4].try_into().unwrap()) as usize;
            buffer = buffer
                .get(4 + length..)
                .ok_or(PtpError::BufferTooShort)?;
        }
        Ok(Self { bytes: original })
    }

    /// Iterate over the contained TLVs
    pub fn tlv(&self) -> TlvSetIterator<'a> {
        TlvSetIterator { bytes: self.bytes }
    }
}

/// Iterator over a [`TlvSet`]; the set was validated at parse time
#[derive(Debug, Clone, Copy)]
pub struct TlvSetIterator<'a> {
    bytes: &'a [u8],
}

impl<'a> TlvSetIterator<'a> {
    pub fn empty() -> Self {
        Self { bytes: &[] }
    }
}

impl<'a> Iterator for TlvSetIterator<'a> {
    type Item = Tlv<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.bytes.is_empty() {
            return None;
        }
        let tlv_type = TlvType::from_primitive(u16::from_be_bytes(
            self.bytes[0..2].try_into().unwrap(),
        ));
        let length = u16::from_be_bytes(self.bytes[2..4].try_into().unwrap()) as usize;
        let value = &self.bytes[4..4 + length];
        self.bytes = &self.bytes[4 + length..];
        Some(Tlv { tlv_type, value })
    }
}

/// Serializes TLVs into a scratch buffer, producing a [`TlvSet`] view.
#[derive(Debug)]
pub struct TlvSetBuilder<'a> {
    buffer: &'a mut [u8],
    used: usize,
}

impl<'a> TlvSetBuilder<'a> {
    pub fn new(buffer: &'a mut [u8]) -> Self {
        Self { buffer, used: 0 }
    }

    pub fn add(&mut self, tlv: Tlv<'_>) -> Result<(), PtpError> {
        tlv.serialize(&mut self.buffer[self.used..])?;
        self.used += tlv.wire_size();
        Ok(())
    }

    pub fn build(self) -> TlvSet<'a> {
        TlvSet {
            bytes: &self.buffer[..self.used],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_iterate() {
        // GRANT_UNICAST_TRANSMISSION with 2 value octets, then an unknown type
        let bytes = [
            0x00, 0x05, 0x00, 0x02, 0xAB, 0xCD, //
            0x13, 0x37, 0x00, 0x01, 0xFF,
        ];
        let set = TlvSet::deserialize(&bytes).unwrap();
        let mut iter = set.tlv();

        let first = iter.next().unwrap();
        assert_eq!(first.tlv_type, TlvType::GrantUnicastTransmission);
        assert_eq!(first.value, &[0xAB, 0xCD]);

        // unknown type is skipped over by length, not rejected
        let second = iter.next().unwrap();
        assert_eq!(second.tlv_type, TlvType::Reserved(0x1337));
        assert_eq!(second.value, &[0xFF]);

        assert!(iter.next().is_none());
    }

    #[test]
    fn truncated_value_rejected() {
        let bytes = [0x00, 0x08, 0x00, 0x04, 0x01];
        assert_eq!(
            TlvSet::deserialize(&bytes),
            Err(PtpError::BufferTooShort)
        );
    }

    #[test]
    fn builder_round_trip() {
        let mut scratch = [0; 64];
        let mut builder = TlvSetBuilder::new(&mut scratch);
        builder
            .add(Tlv {
                tlv_type: TlvType::PathTrace,
                value: &[0xA0, 0xB1, 0xC2, 0xFF, 0xFE, 0xD3, 0xE4, 0xF5],
            })
            .unwrap();
        let set = builder.build();

        let mut out = [0; 64];
        set.serialize(&mut out).unwrap();
        let parsed = TlvSet::deserialize(&out[..set.wire_size()]).unwrap();
        assert_eq!(parsed.tlv().count(), 1);
    }
}
