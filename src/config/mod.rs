//! # Instance
//! * `InstanceConfig`
//!
//! # Port
//! * `PortConfig`
//! * `DelayMechanism`

mod instance;
mod port;

pub use instance::InstanceConfig;
pub use port::{DelayMechanism, PortConfig};

pub use crate::datastructures::{
    common::{
        ClockAccuracy, ClockIdentity, ClockQuality, LeapIndicator, PortIdentity, TimeSource,
    },
    datasets::TimePropertiesDS,
    messages::SdoId,
};
