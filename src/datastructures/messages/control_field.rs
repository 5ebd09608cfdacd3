use super::MessageType;

/// The legacy controlField octet, IEEE 1588-2019 13.3.2.13. Kept for
/// compatibility with v1-era hardware; receivers ignore it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ControlField {
    Sync,
    DelayReq,
    FollowUp,
    DelayResp,
    Management,
    AllOthers,
}

impl ControlField {
    pub(crate) fn to_primitive(self) -> u8 {
        match self {
            Self::Sync => 0x00,
            Self::DelayReq => 0x01,
            Self::FollowUp => 0x02,
            Self::DelayResp => 0x03,
            Self::Management => 0x04,
            Self::AllOthers => 0x05,
        }
    }
}

impl From<MessageType> for ControlField {
    fn from(message_type: MessageType) -> Self {
        match message_type {
            MessageType::Sync => Self::Sync,
            MessageType::DelayReq => Self::DelayReq,
            MessageType::FollowUp => Self::FollowUp,
            MessageType::DelayResp => Self::DelayResp,
            MessageType::Management => Self::Management,
            MessageType::PDelayReq
            | MessageType::PDelayResp
            | MessageType::PDelayRespFollowUp
            | MessageType::Announce
            | MessageType::Signaling => Self::AllOthers,
        }
    }
}
