use crate::config::{ClockIdentity, SdoId};

/// Per-clock configuration: the static inputs of the default data set.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct InstanceConfig {
    pub clock_identity: ClockIdentity,
    pub priority_1: u8,
    pub priority_2: u8,
    pub domain_number: u8,
    pub slave_only: bool,
    /// Deliver origin timestamps in follow-up messages
    pub two_step: bool,
    pub sdo_id: SdoId,
}

impl InstanceConfig {
    /// A configuration with the standard defaults and the given identity.
    pub fn with_identity(clock_identity: ClockIdentity) -> Self {
        Self {
            clock_identity,
            priority_1: 128,
            priority_2: 128,
            domain_number: 0,
            slave_only: false,
            two_step: true,
            sdo_id: SdoId::default(),
        }
    }
}
