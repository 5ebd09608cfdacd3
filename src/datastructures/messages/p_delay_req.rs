use crate::{
    datastructures::{common::WireTimestamp, WireFormat},
    error::PtpError,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PDelayReqMessage {
    pub(crate) origin_timestamp: WireTimestamp,
}

impl PDelayReqMessage {
    pub(crate) fn content_size(&self) -> usize {
        20
    }

    pub(crate) fn serialize_content(&self, buffer: &mut [u8]) -> Result<(), PtpError> {
        if buffer.len() < 20 {
            return Err(PtpError::BufferTooShort);
        }
        self.origin_timestamp.serialize(&mut buffer[0..10])?;
        buffer[10..20].fill(0);
        Ok(())
    }

    pub(crate) fn deserialize_content(buffer: &[u8]) -> Result<Self, PtpError> {
        if buffer.len() < 20 {
            return Err(PtpError::BufferTooShort);
        }
        // 13.9.2: the trailing 10 octets are reserved and transmitted as zero
        if buffer[10..20] != [0; 10] {
            return Err(PtpError::InvalidReservedField);
        }
        Ok(Self {
            origin_timestamp: WireTimestamp::deserialize(&buffer[0..10])?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserved_must_be_zero() {
        let message = PDelayReqMessage {
            origin_timestamp: WireTimestamp {
                seconds: 5,
                nanos: 6,
            },
        };
        let mut buffer = [0; 20];
        message.serialize_content(&mut buffer).unwrap();
        assert_eq!(PDelayReqMessage::deserialize_content(&buffer).unwrap(), message);

        buffer[15] = 1;
        assert_eq!(
            PDelayReqMessage::deserialize_content(&buffer),
            Err(PtpError::InvalidReservedField)
        );
    }
}
