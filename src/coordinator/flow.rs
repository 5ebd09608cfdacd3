use crate::datastructures::{
    common::{TlvSetIterator, TlvType},
    messages::MessageBody,
};

/// Per-message-class routing counters, wrapping at 64 bits
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FlowStatistics {
    pub announce: u64,
    pub sync: u64,
    pub follow_up: u64,
    pub delay_req: u64,
    pub delay_resp: u64,
    pub pdelay: u64,
    pub signaling: u64,
    pub management: u64,

    pub dropped_validation: u64,
    pub dropped_domain: u64,

    pub unicast_requests_seen: u64,
    pub unicast_grants_seen: u64,
    pub path_trace_tlvs_seen: u64,
}

/// The single routing entry point for decoded messages: classifies each
/// message for the election, the sync engine, or the signaling skeleton,
/// and keeps the per-domain filter counters.
#[derive(Debug, Default)]
pub struct MessageFlowCoordinator {
    statistics: FlowStatistics,
}

impl MessageFlowCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_statistics(&self) -> FlowStatistics {
        self.statistics
    }

    pub fn reset(&mut self) {
        self.statistics = FlowStatistics::default();
    }

    pub(crate) fn note_routed(&mut self, body: &MessageBody) {
        let counter = match body {
            MessageBody::Announce(_) => &mut self.statistics.announce,
            MessageBody::Sync(_) => &mut self.statistics.sync,
            MessageBody::FollowUp(_) => &mut self.statistics.follow_up,
            MessageBody::DelayReq(_) => &mut self.statistics.delay_req,
            MessageBody::DelayResp(_) => &mut self.statistics.delay_resp,
            MessageBody::PDelayReq(_)
            | MessageBody::PDelayResp(_)
            | MessageBody::PDelayRespFollowUp(_) => &mut self.statistics.pdelay,
            MessageBody::Signaling(_) => &mut self.statistics.signaling,
            MessageBody::Management(_) => &mut self.statistics.management,
        };
        *counter = counter.wrapping_add(1);
    }

    pub(crate) fn note_validation_drop(&mut self) {
        self.statistics.dropped_validation = self.statistics.dropped_validation.wrapping_add(1);
    }

    pub(crate) fn note_domain_drop(&mut self) {
        self.statistics.dropped_domain = self.statistics.dropped_domain.wrapping_add(1);
    }

    /// The signaling skeleton: recognize negotiation and path-trace TLVs,
    /// skip everything else by length.
    pub(crate) fn note_signaling_tlvs(&mut self, tlvs: TlvSetIterator<'_>) {
        for tlv in tlvs {
            match tlv.tlv_type {
                TlvType::RequestUnicastTransmission => {
                    self.statistics.unicast_requests_seen =
                        self.statistics.unicast_requests_seen.wrapping_add(1);
                }
                TlvType::GrantUnicastTransmission => {
                    self.statistics.unicast_grants_seen =
                        self.statistics.unicast_grants_seen.wrapping_add(1);
                }
                TlvType::PathTrace => {
                    self.statistics.path_trace_tlvs_seen =
                        self.statistics.path_trace_tlvs_seen.wrapping_add(1);
                }
                _ => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datastructures::{
        common::TlvSet,
        messages::{DelayReqMessage, SyncMessage},
    };

    #[test]
    fn counts_by_message_class() {
        let mut flow = MessageFlowCoordinator::new();
        flow.note_routed(&MessageBody::Sync(SyncMessage {
            origin_timestamp: Default::default(),
        }));
        flow.note_routed(&MessageBody::DelayReq(DelayReqMessage {
            origin_timestamp: Default::default(),
        }));
        flow.note_validation_drop();

        let stats = flow.get_statistics();
        assert_eq!(stats.sync, 1);
        assert_eq!(stats.delay_req, 1);
        assert_eq!(stats.dropped_validation, 1);
    }

    #[test]
    fn recognizes_negotiation_tlvs() {
        let mut flow = MessageFlowCoordinator::new();
        let bytes = [
            0x00, 0x04, 0x00, 0x02, 0x01, 0x02, // REQUEST_UNICAST_TRANSMISSION
            0x00, 0x05, 0x00, 0x00, // GRANT_UNICAST_TRANSMISSION
            0x13, 0x37, 0x00, 0x01, 0xAA, // unknown, skipped
        ];
        let set = TlvSet::deserialize(&bytes).unwrap();
        flow.note_signaling_tlvs(set.tlv());

        let stats = flow.get_statistics();
        assert_eq!(stats.unicast_requests_seen, 1);
        assert_eq!(stats.unicast_grants_seen, 1);
        assert_eq!(stats.path_trace_tlvs_seen, 0);
    }
}
