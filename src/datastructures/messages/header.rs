use super::{control_field::ControlField, MessageType};
use crate::{
    datastructures::{
        common::{PortIdentity, TimeInterval},
        WireFormat,
    },
    error::PtpError,
};

/// The PTP protocol version of a message. Only major version 2 is accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PtpVersion {
    major: u8,
    minor: u8,
}

impl PtpVersion {
    #[allow(clippy::new_ret_no_self)]
    pub fn new(major: u8, minor: u8) -> Option<Self> {
        if major >= 0x10 || minor >= 0x10 {
            None
        } else {
            Some(Self { major, minor })
        }
    }

    pub fn major(&self) -> u8 {
        self.major
    }

    pub fn minor(&self) -> u8 {
        self.minor
    }
}

impl Default for PtpVersion {
    fn default() -> Self {
        Self { major: 2, minor: 1 }
    }
}

/// The 12-bit sdoId of a domain, split over two header fields on the wire.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SdoId(u16);

impl SdoId {
    pub fn new(sdo_id: u16) -> Option<Self> {
        (sdo_id <= 0xFFF).then_some(Self(sdo_id))
    }

    fn high_byte(self) -> u8 {
        (self.0 >> 8) as u8
    }

    fn low_byte(self) -> u8 {
        self.0 as u8
    }
}

impl From<SdoId> for u16 {
    fn from(sdo_id: SdoId) -> Self {
        sdo_id.0
    }
}

/// The 34-octet common header carried by every PTP message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub(crate) sdo_id: SdoId,
    pub(crate) version: PtpVersion,
    pub(crate) domain_number: u8,
    pub(crate) alternate_master_flag: bool,
    pub(crate) two_step_flag: bool,
    pub(crate) unicast_flag: bool,
    pub(crate) ptp_profile_specific_1: bool,
    pub(crate) ptp_profile_specific_2: bool,
    pub(crate) leap61: bool,
    pub(crate) leap59: bool,
    pub(crate) current_utc_offset_valid: bool,
    pub(crate) ptp_timescale: bool,
    pub(crate) time_traceable: bool,
    pub(crate) frequency_traceable: bool,
    pub(crate) synchronization_uncertain: bool,
    pub(crate) correction_field: TimeInterval,
    pub(crate) source_port_identity: PortIdentity,
    pub(crate) sequence_id: u16,
    pub(crate) log_message_interval: i8,
}

impl Default for Header {
    fn default() -> Self {
        Self {
            sdo_id: SdoId::default(),
            version: PtpVersion::default(),
            domain_number: 0,
            alternate_master_flag: false,
            two_step_flag: false,
            unicast_flag: false,
            ptp_profile_specific_1: false,
            ptp_profile_specific_2: false,
            leap61: false,
            leap59: false,
            current_utc_offset_valid: false,
            ptp_timescale: false,
            time_traceable: false,
            frequency_traceable: false,
            synchronization_uncertain: false,
            correction_field: TimeInterval::default(),
            source_port_identity: PortIdentity::default(),
            sequence_id: 0,
            log_message_interval: 0,
        }
    }
}

/// A parsed header along with the framing fields needed to locate the body.
#[derive(Debug, Clone, Copy)]
pub(crate) struct DeserializedHeader {
    pub(crate) header: Header,
    pub(crate) message_type: MessageType,
    pub(crate) message_length: u16,
}

impl Header {
    pub(crate) fn wire_size(&self) -> usize {
        34
    }

    pub fn source_port_identity(&self) -> PortIdentity {
        self.source_port_identity
    }

    pub fn sequence_id(&self) -> u16 {
        self.sequence_id
    }

    pub fn correction_field(&self) -> TimeInterval {
        self.correction_field
    }

    pub fn domain_number(&self) -> u8 {
        self.domain_number
    }

    pub fn two_step_flag(&self) -> bool {
        self.two_step_flag
    }

    pub(crate) fn serialize_header(
        &self,
        content_type: MessageType,
        content_length: usize,
        buffer: &mut [u8],
    ) -> Result<(), PtpError> {
        if buffer.len() < 34 {
            return Err(PtpError::BufferTooShort);
        }

        buffer[0] = ((self.sdo_id.high_byte()) << 4) | ((content_type as u8) & 0x0F);
        buffer[1] = (self.version.minor() << 4) | self.version.major();
        buffer[2..4].copy_from_slice(&((content_length + 34) as u16).to_be_bytes());
        buffer[4] = self.domain_number;
        buffer[5] = self.sdo_id.low_byte();
        buffer[6] = u8::from(self.alternate_master_flag)
            | (u8::from(self.two_step_flag) << 1)
            | (u8::from(self.unicast_flag) << 2)
            | (u8::from(self.ptp_profile_specific_1) << 5)
            | (u8::from(self.ptp_profile_specific_2) << 6);
        buffer[7] = u8::from(self.leap61)
            | (u8::from(self.leap59) << 1)
            | (u8::from(self.current_utc_offset_valid) << 2)
            | (u8::from(self.ptp_timescale) << 3)
            | (u8::from(self.time_traceable) << 4)
            | (u8::from(self.frequency_traceable) << 5)
            | (u8::from(self.synchronization_uncertain) << 6);
        self.correction_field.serialize(&mut buffer[8..16])?;
        buffer[16..20].fill(0);
        self.source_port_identity.serialize(&mut buffer[20..30])?;
        buffer[30..32].copy_from_slice(&self.sequence_id.to_be_bytes());
        buffer[32] = ControlField::from(content_type).to_primitive();
        buffer[33] = self.log_message_interval as u8;

        Ok(())
    }

    pub(crate) fn deserialize_header(buffer: &[u8]) -> Result<DeserializedHeader, PtpError> {
        if buffer.len() < 34 {
            return Err(PtpError::BufferTooShort);
        }

        let version = PtpVersion {
            major: buffer[1] & 0x0F,
            minor: buffer[1] >> 4,
        };
        if version.major != 2 {
            return Err(PtpError::InvalidVersion);
        }

        let message_type =
            MessageType::try_from(buffer[0] & 0x0F).map_err(|_| PtpError::InvalidEnumValue)?;
        let sdo_id = SdoId(((buffer[0] as u16 >> 4) << 8) | buffer[5] as u16);

        // messageTypeSpecific is reserved for the messages this engine handles
        if buffer[16..20] != [0, 0, 0, 0] {
            return Err(PtpError::InvalidReservedField);
        }

        Ok(DeserializedHeader {
            header: Self {
                sdo_id,
                version,
                domain_number: buffer[4],
                alternate_master_flag: buffer[6] & (1 << 0) > 0,
                two_step_flag: buffer[6] & (1 << 1) > 0,
                unicast_flag: buffer[6] & (1 << 2) > 0,
                ptp_profile_specific_1: buffer[6] & (1 << 5) > 0,
                ptp_profile_specific_2: buffer[6] & (1 << 6) > 0,
                leap61: buffer[7] & (1 << 0) > 0,
                leap59: buffer[7] & (1 << 1) > 0,
                current_utc_offset_valid: buffer[7] & (1 << 2) > 0,
                ptp_timescale: buffer[7] & (1 << 3) > 0,
                time_traceable: buffer[7] & (1 << 4) > 0,
                frequency_traceable: buffer[7] & (1 << 5) > 0,
                synchronization_uncertain: buffer[7] & (1 << 6) > 0,
                correction_field: TimeInterval::deserialize(&buffer[8..16])?,
                source_port_identity: PortIdentity::deserialize(&buffer[20..30])?,
                sequence_id: u16::from_be_bytes(buffer[30..32].try_into().unwrap()),
                log_message_interval: buffer[33] as i8,
            },
            message_type,
            message_length: u16::from_be_bytes(buffer[2..4].try_into().unwrap()),
        })
    }
}
