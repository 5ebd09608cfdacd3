//! PTP network messages

pub(crate) use announce::*;
pub(crate) use delay_req::*;
pub(crate) use delay_resp::*;
pub(crate) use follow_up::*;
pub use header::*;
pub(crate) use management::*;
pub(crate) use p_delay_req::*;
pub(crate) use p_delay_resp::*;
pub(crate) use p_delay_resp_follow_up::*;
pub(crate) use signaling::*;
pub(crate) use sync::*;

use super::{
    common::{PortIdentity, TimeInterval, TlvSet, WireTimestamp},
    datasets::DefaultDS,
};
use crate::{
    error::PtpError,
    instance::InstanceState,
    time::{Interval, Time},
};

mod announce;
mod control_field;
mod delay_req;
mod delay_resp;
mod follow_up;
mod header;
mod management;
mod p_delay_req;
mod p_delay_resp;
mod p_delay_resp_follow_up;
mod signaling;
mod sync;

/// Maximum length of a packet
///
/// Can be used to preallocate buffers that always fit messages sent by this
/// engine.
pub const MAX_DATA_LEN: usize = 1024;

/// The message type nibble of the common header
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum MessageType {
    Sync = 0x0,
    DelayReq = 0x1,
    PDelayReq = 0x2,
    PDelayResp = 0x3,
    FollowUp = 0x8,
    DelayResp = 0x9,
    PDelayRespFollowUp = 0xA,
    Announce = 0xB,
    Signaling = 0xC,
    Management = 0xD,
}

pub struct EnumConversionError;

impl TryFrom<u8> for MessageType {
    type Error = EnumConversionError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        use MessageType::*;

        match value {
            0x0 => Ok(Sync),
            0x1 => Ok(DelayReq),
            0x2 => Ok(PDelayReq),
            0x3 => Ok(PDelayResp),
            0x8 => Ok(FollowUp),
            0x9 => Ok(DelayResp),
            0xA => Ok(PDelayRespFollowUp),
            0xB => Ok(Announce),
            0xC => Ok(Signaling),
            0xD => Ok(Management),
            _ => Err(EnumConversionError),
        }
    }
}

/// A full message: header, body, and TLV suffix
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Message<'a> {
    pub(crate) header: Header,
    pub(crate) body: MessageBody,
    pub(crate) suffix: TlvSet<'a>,
}

/// The nine message bodies as a tagged union; handlers match on the tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum MessageBody {
    Sync(SyncMessage),
    DelayReq(DelayReqMessage),
    PDelayReq(PDelayReqMessage),
    PDelayResp(PDelayRespMessage),
    FollowUp(FollowUpMessage),
    DelayResp(DelayRespMessage),
    PDelayRespFollowUp(PDelayRespFollowUpMessage),
    Announce(AnnounceMessage),
    Signaling(SignalingMessage),
    Management(ManagementMessage),
}

impl MessageBody {
    pub(crate) fn wire_size(&self) -> usize {
        match self {
            MessageBody::Sync(m) => m.content_size(),
            MessageBody::DelayReq(m) => m.content_size(),
            MessageBody::PDelayReq(m) => m.content_size(),
            MessageBody::PDelayResp(m) => m.content_size(),
            MessageBody::FollowUp(m) => m.content_size(),
            MessageBody::DelayResp(m) => m.content_size(),
            MessageBody::PDelayRespFollowUp(m) => m.content_size(),
            MessageBody::Announce(m) => m.content_size(),
            MessageBody::Signaling(m) => m.content_size(),
            MessageBody::Management(m) => m.content_size(),
        }
    }

    pub(crate) fn content_type(&self) -> MessageType {
        match self {
            MessageBody::Sync(_) => MessageType::Sync,
            MessageBody::DelayReq(_) => MessageType::DelayReq,
            MessageBody::PDelayReq(_) => MessageType::PDelayReq,
            MessageBody::PDelayResp(_) => MessageType::PDelayResp,
            MessageBody::FollowUp(_) => MessageType::FollowUp,
            MessageBody::DelayResp(_) => MessageType::DelayResp,
            MessageBody::PDelayRespFollowUp(_) => MessageType::PDelayRespFollowUp,
            MessageBody::Announce(_) => MessageType::Announce,
            MessageBody::Signaling(_) => MessageType::Signaling,
            MessageBody::Management(_) => MessageType::Management,
        }
    }

    fn serialize(&self, buffer: &mut [u8]) -> Result<usize, PtpError> {
        match self {
            MessageBody::Sync(m) => m.serialize_content(buffer)?,
            MessageBody::DelayReq(m) => m.serialize_content(buffer)?,
            MessageBody::PDelayReq(m) => m.serialize_content(buffer)?,
            MessageBody::PDelayResp(m) => m.serialize_content(buffer)?,
            MessageBody::FollowUp(m) => m.serialize_content(buffer)?,
            MessageBody::DelayResp(m) => m.serialize_content(buffer)?,
            MessageBody::PDelayRespFollowUp(m) => m.serialize_content(buffer)?,
            MessageBody::Announce(m) => m.serialize_content(buffer)?,
            MessageBody::Signaling(m) => m.serialize_content(buffer)?,
            MessageBody::Management(m) => m.serialize_content(buffer)?,
        }

        Ok(self.wire_size())
    }

    fn deserialize(
        message_type: MessageType,
        header: &Header,
        buffer: &[u8],
    ) -> Result<Self, PtpError> {
        let body = match message_type {
            MessageType::Sync => MessageBody::Sync(SyncMessage::deserialize_content(buffer)?),
            MessageType::DelayReq => {
                MessageBody::DelayReq(DelayReqMessage::deserialize_content(buffer)?)
            }
            MessageType::PDelayReq => {
                MessageBody::PDelayReq(PDelayReqMessage::deserialize_content(buffer)?)
            }
            MessageType::PDelayResp => {
                MessageBody::PDelayResp(PDelayRespMessage::deserialize_content(buffer)?)
            }
            MessageType::FollowUp => {
                MessageBody::FollowUp(FollowUpMessage::deserialize_content(buffer)?)
            }
            MessageType::DelayResp => {
                MessageBody::DelayResp(DelayRespMessage::deserialize_content(buffer)?)
            }
            MessageType::PDelayRespFollowUp => MessageBody::PDelayRespFollowUp(
                PDelayRespFollowUpMessage::deserialize_content(buffer)?,
            ),
            MessageType::Announce => {
                MessageBody::Announce(AnnounceMessage::deserialize_content(*header, buffer)?)
            }
            MessageType::Signaling => {
                MessageBody::Signaling(SignalingMessage::deserialize_content(buffer)?)
            }
            MessageType::Management => {
                MessageBody::Management(ManagementMessage::deserialize_content(buffer)?)
            }
        };

        Ok(body)
    }
}

fn base_header(default_ds: &DefaultDS, port_identity: PortIdentity, sequence_id: u16) -> Header {
    Header {
        sdo_id: default_ds.sdo_id,
        domain_number: default_ds.domain_number,
        source_port_identity: port_identity,
        sequence_id,
        ..Default::default()
    }
}

impl Message<'_> {
    pub(crate) fn sync(
        default_ds: &DefaultDS,
        port_identity: PortIdentity,
        sequence_id: u16,
    ) -> Self {
        let header = Header {
            two_step_flag: default_ds.two_step,
            ..base_header(default_ds, port_identity, sequence_id)
        };

        Message {
            header,
            body: MessageBody::Sync(SyncMessage {
                origin_timestamp: WireTimestamp::default(),
            }),
            suffix: TlvSet::default(),
        }
    }

    pub(crate) fn follow_up(
        default_ds: &DefaultDS,
        port_identity: PortIdentity,
        sequence_id: u16,
        timestamp: Time,
    ) -> Self {
        let header = Header {
            correction_field: timestamp.subnano(),
            ..base_header(default_ds, port_identity, sequence_id)
        };

        Message {
            header,
            body: MessageBody::FollowUp(FollowUpMessage {
                precise_origin_timestamp: timestamp.into(),
            }),
            suffix: TlvSet::default(),
        }
    }

    pub(crate) fn announce(
        global: &InstanceState,
        port_identity: PortIdentity,
        log_announce_interval: i8,
        sequence_id: u16,
    ) -> Self {
        let time_properties_ds = &global.time_properties_ds;

        let header = Header {
            leap59: time_properties_ds.is_leap59(),
            leap61: time_properties_ds.is_leap61(),
            current_utc_offset_valid: time_properties_ds.current_utc_offset_valid,
            ptp_timescale: time_properties_ds.ptp_timescale,
            time_traceable: time_properties_ds.time_traceable,
            frequency_traceable: time_properties_ds.frequency_traceable,
            log_message_interval: log_announce_interval,
            ..base_header(&global.default_ds, port_identity, sequence_id)
        };

        let body = MessageBody::Announce(AnnounceMessage {
            header,
            origin_timestamp: WireTimestamp::default(),
            current_utc_offset: time_properties_ds.current_utc_offset,
            grandmaster_priority_1: global.parent_ds.grandmaster_priority_1,
            grandmaster_clock_quality: global.parent_ds.grandmaster_clock_quality,
            grandmaster_priority_2: global.parent_ds.grandmaster_priority_2,
            grandmaster_identity: global.parent_ds.grandmaster_identity,
            steps_removed: global.current_ds.steps_removed,
            time_source: time_properties_ds.time_source,
        });

        Message {
            header,
            body,
            suffix: TlvSet::default(),
        }
    }

    pub(crate) fn delay_req(
        default_ds: &DefaultDS,
        port_identity: PortIdentity,
        sequence_id: u16,
    ) -> Self {
        let header = Header {
            log_message_interval: 0x7F,
            ..base_header(default_ds, port_identity, sequence_id)
        };

        Message {
            header,
            body: MessageBody::DelayReq(DelayReqMessage {
                origin_timestamp: WireTimestamp::default(),
            }),
            suffix: TlvSet::default(),
        }
    }

    pub(crate) fn delay_resp(
        request_header: Header,
        port_identity: PortIdentity,
        min_delay_req_interval: Interval,
        timestamp: Time,
    ) -> Self {
        let header = Header {
            two_step_flag: false,
            source_port_identity: port_identity,
            correction_field: request_header
                .correction_field
                .saturating_add(timestamp.subnano()),
            log_message_interval: min_delay_req_interval.as_log_2(),
            ..request_header
        };

        let body = MessageBody::DelayResp(DelayRespMessage {
            receive_timestamp: timestamp.into(),
            requesting_port_identity: request_header.source_port_identity,
        });

        Message {
            header,
            body,
            suffix: TlvSet::default(),
        }
    }

    pub(crate) fn pdelay_req(
        default_ds: &DefaultDS,
        port_identity: PortIdentity,
        sequence_id: u16,
    ) -> Self {
        let header = Header {
            log_message_interval: 0x7F,
            ..base_header(default_ds, port_identity, sequence_id)
        };

        Message {
            header,
            body: MessageBody::PDelayReq(PDelayReqMessage {
                origin_timestamp: WireTimestamp::default(),
            }),
            suffix: TlvSet::default(),
        }
    }

    pub(crate) fn pdelay_resp(
        default_ds: &DefaultDS,
        port_identity: PortIdentity,
        request_header: Header,
        timestamp: Time,
    ) -> Self {
        let header = Header {
            two_step_flag: true,
            source_port_identity: port_identity,
            correction_field: request_header.correction_field,
            log_message_interval: 0x7F,
            ..base_header(default_ds, port_identity, request_header.sequence_id)
        };

        let body = MessageBody::PDelayResp(PDelayRespMessage {
            request_receive_timestamp: timestamp.into(),
            requesting_port_identity: request_header.source_port_identity,
        });

        Message {
            header,
            body,
            suffix: TlvSet::default(),
        }
    }

    pub(crate) fn pdelay_resp_follow_up(
        default_ds: &DefaultDS,
        port_identity: PortIdentity,
        requestor_identity: PortIdentity,
        sequence_id: u16,
        timestamp: Time,
    ) -> Self {
        let header = Header {
            source_port_identity: port_identity,
            correction_field: timestamp.subnano(),
            log_message_interval: 0x7F,
            ..base_header(default_ds, port_identity, sequence_id)
        };

        let body = MessageBody::PDelayRespFollowUp(PDelayRespFollowUpMessage {
            response_origin_timestamp: timestamp.into(),
            requesting_port_identity: requestor_identity,
        });

        Message {
            header,
            body,
            suffix: TlvSet::default(),
        }
    }
}

impl<'a> Message<'a> {
    pub(crate) fn header(&self) -> &Header {
        &self.header
    }

    /// The byte size on the wire of this message
    pub(crate) fn wire_size(&self) -> usize {
        self.header.wire_size() + self.body.wire_size() + self.suffix.wire_size()
    }

    /// Serializes the message into the PTP wire format.
    ///
    /// Returns the used buffer size or an error.
    pub(crate) fn serialize(&self, buffer: &mut [u8]) -> Result<usize, PtpError> {
        if buffer.len() < self.wire_size() {
            return Err(PtpError::BufferTooShort);
        }

        let (header, rest) = buffer.split_at_mut(34);
        let (body, tlv) = rest.split_at_mut(self.body.wire_size());

        self.header.serialize_header(
            self.body.content_type(),
            self.body.wire_size() + self.suffix.wire_size(),
            header,
        )?;
        self.body.serialize(body)?;
        self.suffix.serialize(tlv)?;

        Ok(self.wire_size())
    }

    /// Deserializes a message from the PTP wire format.
    ///
    /// The message length field must cover at least the header and lie within
    /// the provided buffer; trailing padding beyond it is ignored.
    pub(crate) fn deserialize(buffer: &'a [u8]) -> Result<Self, PtpError> {
        let parsed = Header::deserialize_header(buffer)?;

        if parsed.message_length < 34 {
            return Err(PtpError::InvalidLength);
        }

        let content_buffer = buffer
            .get(34..parsed.message_length as usize)
            .ok_or(PtpError::InvalidLength)?;

        let body = MessageBody::deserialize(parsed.message_type, &parsed.header, content_buffer)?;

        let tlv_buffer = content_buffer
            .get(body.wire_size()..)
            .ok_or(PtpError::InvalidLength)?;
        let suffix = TlvSet::deserialize(tlv_buffer)?;

        Ok(Message {
            header: parsed.header,
            body,
            suffix,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::InstanceConfig,
        datastructures::common::{ClockIdentity, TimeInterval},
    };

    fn test_default_ds() -> DefaultDS {
        DefaultDS::new(InstanceConfig {
            clock_identity: ClockIdentity([0xA0, 0xB1, 0xC2, 0xFF, 0xFE, 0xD3, 0xE4, 0xF5]),
            priority_1: 128,
            priority_2: 128,
            domain_number: 0,
            sdo_id: SdoId::default(),
            slave_only: false,
            two_step: true,
        })
    }

    fn test_port_identity() -> PortIdentity {
        PortIdentity {
            clock_identity: ClockIdentity([0xA0, 0xB1, 0xC2, 0xFF, 0xFE, 0xD3, 0xE4, 0xF5]),
            port_number: 1,
        }
    }

    #[test]
    fn sync_round_trip() {
        let message = Message::sync(&test_default_ds(), test_port_identity(), 42);

        let mut buffer = [0; MAX_DATA_LEN];
        let length = message.serialize(&mut buffer).unwrap();
        assert_eq!(length, 44);

        let parsed = Message::deserialize(&buffer[..length]).unwrap();
        assert_eq!(parsed, message);
        assert!(parsed.header.two_step_flag);
    }

    #[test]
    fn delay_resp_reflects_requestor() {
        let request = Message::delay_req(&test_default_ds(), test_port_identity(), 7);
        let response = Message::delay_resp(
            request.header,
            PortIdentity {
                clock_identity: ClockIdentity([9; 8]),
                port_number: 1,
            },
            Interval::ONE_SECOND,
            Time::from_nanos(1_000_000),
        );

        let MessageBody::DelayResp(body) = &response.body else {
            panic!("wrong body type");
        };
        assert_eq!(body.requesting_port_identity, test_port_identity());
        assert_eq!(response.header.sequence_id, 7);

        let mut buffer = [0; MAX_DATA_LEN];
        let length = response.serialize(&mut buffer).unwrap();
        assert_eq!(Message::deserialize(&buffer[..length]).unwrap(), response);
    }

    #[test]
    fn encode_is_stable_under_reparse() {
        let message = Message::delay_req(&test_default_ds(), test_port_identity(), 3);

        let mut first = [0; MAX_DATA_LEN];
        let length = message.serialize(&mut first).unwrap();

        let reparsed = Message::deserialize(&first[..length]).unwrap();
        let mut second = [0; MAX_DATA_LEN];
        let length2 = reparsed.serialize(&mut second).unwrap();

        assert_eq!(&first[..length], &second[..length2]);
    }

    #[test]
    fn truncated_length_field_rejected() {
        let message = Message::sync(&test_default_ds(), test_port_identity(), 0);
        let mut buffer = [0; MAX_DATA_LEN];
        let length = message.serialize(&mut buffer).unwrap();

        // claim more content than the buffer holds
        buffer[2..4].copy_from_slice(&(length as u16 + 8).to_be_bytes());
        assert_eq!(
            Message::deserialize(&buffer[..length]).map(|_| ()),
            Err(PtpError::InvalidLength)
        );

        // claim less than a header
        buffer[2..4].copy_from_slice(&20u16.to_be_bytes());
        assert_eq!(
            Message::deserialize(&buffer[..length]).map(|_| ()),
            Err(PtpError::InvalidLength)
        );
    }

    #[test]
    fn correction_field_accumulates_in_delay_resp() {
        let mut request = Message::delay_req(&test_default_ds(), test_port_identity(), 1);
        request.header.correction_field =
            TimeInterval(fixed::types::I48F16::from_num(10));

        let response = Message::delay_resp(
            request.header,
            test_port_identity(),
            Interval::ONE_SECOND,
            Time::from_nanos(500),
        );
        assert!(response.header.correction_field.to_nanos() >= 10.0);
    }
}
