//! Wire data structures of the protocol
//!
//! Everything in this module is bit-exact with IEEE 1588-2019: a byte
//! sequence produced here must be parseable by any conforming PTPv2 stack.

use core::fmt::Debug;

pub mod common;
pub mod datasets;
pub mod messages;

use crate::error::PtpError;

/// Fixed-layout encoding and decoding of a wire object.
///
/// Implementations serialize into exactly `wire_size` octets, big-endian, and
/// `deserialize(serialize(x)) == x`.
pub(crate) trait WireFormat: Debug + Clone + Eq {
    /// The byte size on the wire of this object
    fn wire_size(&self) -> usize;

    /// Serialize the object into the PTP wire format
    fn serialize(&self, buffer: &mut [u8]) -> Result<(), PtpError>;

    /// Deserialize the object from the PTP wire format
    fn deserialize(buffer: &[u8]) -> Result<Self, PtpError>;
}
