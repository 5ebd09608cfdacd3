use crate::{error::PtpError, time::Interval};

/// Which delay mechanism a port uses to measure the network path.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum DelayMechanism {
    /// End to end: delay is measured to the selected master across any
    /// transparent nodes in between. The interval is the PortDS
    /// logMinDelayReqInterval.
    E2E { interval: Interval },
    /// Peer to peer: delay is measured to the link peer with the Pdelay
    /// exchange. The interval paces Pdelay_Req emission.
    P2P { interval: Interval },
    /// No delay measurement on this port.
    Disabled,
}

/// Configuration items of the PTP PortDS data set. Dynamic fields are kept
/// by [`Port`](crate::port::Port) itself.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct PortConfig {
    pub delay_mechanism: DelayMechanism,
    pub announce_interval: Interval,
    /// Multiplier applied to the announce interval before a master is
    /// declared lost
    pub announce_receipt_timeout: u8,
    pub sync_interval: Interval,
    /// Multiplier applied to the sync interval before the sync stream is
    /// declared lost
    pub sync_receipt_timeout: u8,
    /// Masters heard on this port are never acceptable as a time source;
    /// the port can only distribute time
    pub master_only: bool,
    /// A port configured disabled never leaves the `Disabled` state
    pub enabled: bool,
    // Version is always 2.1, so not stored (versionNumber, minorVersionNumber)
}

impl Default for PortConfig {
    fn default() -> Self {
        Self {
            delay_mechanism: DelayMechanism::E2E {
                interval: Interval::ONE_SECOND,
            },
            announce_interval: Interval::TWO_SECONDS,
            announce_receipt_timeout: 3,
            sync_interval: Interval::ONE_SECOND,
            sync_receipt_timeout: 3,
            master_only: false,
            enabled: true,
        }
    }
}

impl PortConfig {
    pub fn min_delay_req_interval(&self) -> Interval {
        match self.delay_mechanism {
            DelayMechanism::E2E { interval } => interval,
            DelayMechanism::P2P { interval } => interval,
            DelayMechanism::Disabled => self.sync_interval,
        }
    }

    /// The announce receipt timeout as a duration
    pub fn announce_duration(&self) -> crate::time::Duration {
        self.announce_interval.as_duration() * self.announce_receipt_timeout as i32
    }

    /// The sync receipt timeout as a duration
    pub fn sync_duration(&self) -> crate::time::Duration {
        self.sync_interval.as_duration() * self.sync_receipt_timeout as i32
    }

    /// Check the configured values against the ranges of IEEE 1588-2019
    /// clause 7.7.2.
    pub fn validate(&self) -> Result<(), PtpError> {
        if !(-7..=4).contains(&self.sync_interval.as_log_2()) {
            return Err(PtpError::InvalidParameter);
        }
        if !(-4..=4).contains(&self.announce_interval.as_log_2()) {
            return Err(PtpError::InvalidParameter);
        }
        if !(-7..=5).contains(&self.min_delay_req_interval().as_log_2()) {
            return Err(PtpError::InvalidParameter);
        }
        if self.announce_receipt_timeout == 0 || self.sync_receipt_timeout == 0 {
            return Err(PtpError::InvalidParameter);
        }
        Ok(())
    }
}
