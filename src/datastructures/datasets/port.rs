use crate::{
    config::{DelayMechanism, PortConfig},
    datastructures::common::PortIdentity,
    port::PortState,
};

/// A snapshot of the port data set, IEEE 1588-2019 8.2.15.
///
/// The static half of the data set lives in [`PortConfig`]; the dynamic half
/// (state) lives in the port itself. This view assembles both for
/// observation.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct PortDS {
    pub port_identity: PortIdentity,
    pub port_state: PortState,
    pub log_announce_interval: i8,
    pub log_sync_interval: i8,
    pub log_min_delay_req_interval: i8,
    pub announce_receipt_timeout: u8,
    pub sync_receipt_timeout: u8,
    pub delay_mechanism: DelayMechanism,
    /// Whether masters heard on this port may be selected as time source
    pub acceptable_master: bool,
    pub version_number: u8,
    pub minor_version_number: u8,
}

impl PortDS {
    pub(crate) fn from_config(
        config: &PortConfig,
        port_identity: PortIdentity,
        port_state: PortState,
    ) -> Self {
        PortDS {
            port_identity,
            port_state,
            log_announce_interval: config.announce_interval.as_log_2(),
            log_sync_interval: config.sync_interval.as_log_2(),
            log_min_delay_req_interval: config.min_delay_req_interval().as_log_2(),
            announce_receipt_timeout: config.announce_receipt_timeout,
            sync_receipt_timeout: config.sync_receipt_timeout,
            delay_mechanism: config.delay_mechanism,
            acceptable_master: !config.master_only,
            version_number: 2,
            minor_version_number: 1,
        }
    }
}
