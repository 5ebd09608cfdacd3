use crate::{
    datastructures::{common::WireTimestamp, WireFormat},
    error::PtpError,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct DelayReqMessage {
    pub(crate) origin_timestamp: WireTimestamp,
}

impl DelayReqMessage {
    pub(crate) fn content_size(&self) -> usize {
        10
    }

    pub(crate) fn serialize_content(&self, buffer: &mut [u8]) -> Result<(), PtpError> {
        if buffer.len() < 10 {
            return Err(PtpError::BufferTooShort);
        }
        self.origin_timestamp.serialize(&mut buffer[0..10])
    }

    pub(crate) fn deserialize_content(buffer: &[u8]) -> Result<Self, PtpError> {
        if buffer.len() < 10 {
            return Err(PtpError::BufferTooShort);
        }
        Ok(Self {
            origin_timestamp: WireTimestamp::deserialize(&buffer[0..10])?,
        })
    }
}
