use crate::{
    datastructures::{
        common::{PortIdentity, WireTimestamp},
        WireFormat,
    },
    error::PtpError,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct DelayRespMessage {
    pub(crate) receive_timestamp: WireTimestamp,
    pub(crate) requesting_port_identity: PortIdentity,
}

impl DelayRespMessage {
    pub(crate) fn content_size(&self) -> usize {
        20
    }

    pub(crate) fn serialize_content(&self, buffer: &mut [u8]) -> Result<(), PtpError> {
        if buffer.len() < 20 {
            return Err(PtpError::BufferTooShort);
        }
        self.receive_timestamp.serialize(&mut buffer[0..10])?;
        self.requesting_port_identity.serialize(&mut buffer[10..20])
    }

    pub(crate) fn deserialize_content(buffer: &[u8]) -> Result<Self, PtpError> {
        if buffer.len() < 20 {
            return Err(PtpError::BufferTooShort);
        }
        Ok(Self {
            receive_timestamp: WireTimestamp::deserialize(&buffer[0..10])?,
            requesting_port_identity: PortIdentity::deserialize(&buffer[10..20])?,
        })
    }
}
