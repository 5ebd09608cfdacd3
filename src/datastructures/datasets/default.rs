use crate::{
    config::InstanceConfig,
    datastructures::{
        common::{ClockIdentity, ClockQuality},
        messages::SdoId,
    },
};

/// Static description of the local clock, IEEE 1588-2019 8.2.1.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct DefaultDS {
    pub clock_identity: ClockIdentity,
    pub number_of_ports: u16,
    pub clock_quality: ClockQuality,
    pub priority_1: u8,
    pub priority_2: u8,
    pub domain_number: u8,
    pub slave_only: bool,
    pub two_step: bool,
    pub sdo_id: SdoId,
}

impl DefaultDS {
    pub fn new(config: InstanceConfig) -> Self {
        DefaultDS {
            clock_identity: config.clock_identity,
            number_of_ports: 0,
            clock_quality: ClockQuality::default(),
            priority_1: config.priority_1,
            priority_2: config.priority_2,
            domain_number: config.domain_number,
            slave_only: config.slave_only,
            two_step: config.two_step,
            sdo_id: config.sdo_id,
        }
    }
}
