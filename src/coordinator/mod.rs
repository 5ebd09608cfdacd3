//! Integration coordinators: the glue that paces the election, samples
//! synchronization quality, and routes decoded messages.
//!
//! Each coordinator exposes `start`, `stop`, `reset`, statistics, and a
//! health classification; configuration mistakes surface as
//! [`InvalidParameter`](crate::PtpError::InvalidParameter).

mod bmca;
mod flow;
mod sync;

pub use bmca::{BmcaCoordinator, BmcaCoordinatorConfig, BmcaHealth, BmcaStatistics};
pub use flow::{FlowStatistics, MessageFlowCoordinator};
pub use sync::{SyncCoordinator, SyncCoordinatorConfig, SyncHealth, SyncStatistics};
