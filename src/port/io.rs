use crate::{port::PortState, time::Time};

/// The transmit-side capabilities a host provides per port.
///
/// The engine never touches a socket or platform API: every octet it emits
/// goes through one of these methods, serialized and ready for the wire.
/// Event messages (sync, delay request, peer delay) want a transmit
/// timestamp; the host may return it synchronously from the send call or
/// furnish it afterwards through [`get_tx_timestamp`](PortIo::get_tx_timestamp).
///
/// Every method may fail. Failures are counted, and three consecutive
/// failures on the send path put the port in the `Faulty` state.
pub trait PortIo {
    /// Type of the error the methods of this interface may return
    type Error: core::fmt::Debug;

    /// Transmit an announce message
    fn send_announce(&mut self, data: &[u8]) -> Result<(), Self::Error>;

    /// Transmit a sync message, returning its transmit timestamp if it is
    /// already known
    fn send_sync(&mut self, data: &[u8]) -> Result<Option<Time>, Self::Error>;

    /// Transmit a follow-up message
    fn send_follow_up(&mut self, data: &[u8]) -> Result<(), Self::Error>;

    /// Transmit a delay request, returning its transmit timestamp if it is
    /// already known
    fn send_delay_req(&mut self, data: &[u8]) -> Result<Option<Time>, Self::Error>;

    /// Transmit a delay response
    fn send_delay_resp(&mut self, data: &[u8]) -> Result<(), Self::Error>;

    /// Transmit a peer delay request, returning its transmit timestamp if it
    /// is already known
    fn send_pdelay_req(&mut self, data: &[u8]) -> Result<Option<Time>, Self::Error>;

    /// Transmit a peer delay response, returning its transmit timestamp if
    /// it is already known
    fn send_pdelay_resp(&mut self, data: &[u8]) -> Result<Option<Time>, Self::Error>;

    /// Transmit a peer delay response follow-up
    fn send_pdelay_resp_follow_up(&mut self, data: &[u8]) -> Result<(), Self::Error>;

    /// Retrieve the transmit timestamp of an event message sent earlier,
    /// identified by its sequence id
    fn get_tx_timestamp(&mut self, sequence_id: u16) -> Result<Time, Self::Error>;

    /// Notification: the port changed state
    fn on_state_change(&mut self, _old: PortState, _new: PortState) {}

    /// Notification: the port became faulty
    fn on_fault(&mut self, _reason: &str) {}
}
