use crate::{
    datastructures::{common::PortIdentity, WireFormat},
    error::PtpError,
};

/// A signaling message: a target port and a sequence of TLVs.
///
/// The TLVs themselves travel in the message suffix; this body is only the
/// addressing. Unicast negotiation and path-trace TLVs are recognized by
/// type, everything else is skipped over by length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SignalingMessage {
    pub(crate) target_port_identity: PortIdentity,
}

impl SignalingMessage {
    pub(crate) fn content_size(&self) -> usize {
        10
    }

    pub(crate) fn serialize_content(&self, buffer: &mut [u8]) -> Result<(), PtpError> {
        if buffer.len() < 10 {
            return Err(PtpError::BufferTooShort);
        }
        self.target_port_identity.serialize(&mut buffer[0..10])
    }

    pub(crate) fn deserialize_content(buffer: &[u8]) -> Result<Self, PtpError> {
        if buffer.len() < 10 {
            return Err(PtpError::BufferTooShort);
        }
        Ok(Self {
            target_port_identity: PortIdentity::deserialize(&buffer[0..10])?,
        })
    }
}
