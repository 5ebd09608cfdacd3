//! `syntony` is a pure-rust implementation of the IEEE 1588-2019 precision
//! time protocol (PTP) engine: best-master election, the per-port state
//! machine, four-timestamp synchronization arithmetic for both delay
//! mechanisms, a boundary-clock router, and a clock servo with holdover.
//!
//! The crate is sans-I/O and single-threaded by contract: the host feeds
//! received octets into [`BoundaryClock::process_message`], drives time with
//! [`BoundaryClock::tick`], and supplies the platform through two capability
//! traits — [`Clock`] for the local clock and [`port::PortIo`] for per-port
//! transmission. Nothing here opens sockets, spawns threads, or blocks, so
//! the engine runs unchanged on an OS or a bare-metal target.
//!
//! A minimal host loop looks like:
//!
//! 1. construct a [`BoundaryClock`] from an
//!    [`InstanceConfig`](config::InstanceConfig) and add one
//!    [`PortConfig`](config::PortConfig)-ured port per network interface,
//! 2. call [`initialize`](BoundaryClock::initialize),
//! 3. on every received packet call
//!    [`process_message`](BoundaryClock::process_message) with its capture
//!    timestamp,
//! 4. call [`tick`](BoundaryClock::tick) at a steady pace (a few times per
//!    second suffices with default intervals).
//!
//! Hosts that deliver packets from several threads wrap the instance in a
//! mutex; the engine itself never shares state between instances.

#![cfg_attr(all(not(test), not(feature = "std")), no_std)]

pub mod config;
pub mod coordinator;
pub mod port;
pub mod servo;
pub mod time;

pub(crate) mod bmc;
pub(crate) mod datastructures;
pub(crate) mod sync;

mod clock;
mod error;
mod instance;

pub use clock::Clock;
pub use datastructures::{
    common::{
        ClockAccuracy, ClockIdentity, ClockQuality, LeapIndicator, PortIdentity, TimeInterval,
        TimeSource, Tlv, TlvSet, TlvSetBuilder, TlvSetIterator, TlvType, WireTimestamp,
    },
    datasets::{CurrentDS, DefaultDS, ParentDS, PortDS, TimePropertiesDS},
    messages::{Header, MessageType, PtpVersion, SdoId, MAX_DATA_LEN},
};
pub use error::{PtpError, Result};
pub use instance::{BoundaryClock, InstanceState, MAX_PORTS};
