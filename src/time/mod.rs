//! Time representations used by the protocol engine
//!
//! [`Time`] is a point on the local timescale, [`Duration`] a signed distance
//! between two such points, and [`Interval`] the log₂-seconds pacing unit the
//! PTP data sets use for message intervals. All three are fixed-point so the
//! four-timestamp arithmetic of the synchronization engine stays exact.

mod duration;
mod instant;
mod interval;

pub use duration::Duration;
pub use instant::Time;
pub use interval::Interval;
