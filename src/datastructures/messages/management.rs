use crate::{
    datastructures::{common::PortIdentity, WireFormat},
    error::PtpError,
};

/// Skeleton of a management message: enough to parse and re-serialize the
/// fixed part. Management processing itself is out of scope; the router
/// counts these and drops them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ManagementMessage {
    pub(crate) target_port_identity: PortIdentity,
    pub(crate) starting_boundary_hops: u8,
    pub(crate) boundary_hops: u8,
    pub(crate) action: u8,
}

impl ManagementMessage {
    pub(crate) fn content_size(&self) -> usize {
        14
    }

    pub(crate) fn serialize_content(&self, buffer: &mut [u8]) -> Result<(), PtpError> {
        if buffer.len() < 14 {
            return Err(PtpError::BufferTooShort);
        }
        self.target_port_identity.serialize(&mut buffer[0..10])?;
        buffer[10] = self.starting_boundary_hops;
        buffer[11] = self.boundary_hops;
        buffer[12] = self.action & 0x1F;
        buffer[13] = 0;
        Ok(())
    }

    pub(crate) fn deserialize_content(buffer: &[u8]) -> Result<Self, PtpError> {
        if buffer.len() < 14 {
            return Err(PtpError::BufferTooShort);
        }
        Ok(Self {
            target_port_identity: PortIdentity::deserialize(&buffer[0..10])?,
            starting_boundary_hops: buffer[10],
            boundary_hops: buffer[11],
            action: buffer[12] & 0x1F,
        })
    }
}
