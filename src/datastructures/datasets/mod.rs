//! The data sets a PTP clock maintains, IEEE 1588-2019 chapter 8
//!
//! The clock instance owns one of each; ports borrow what they need. Only
//! the current data set mutates on the synchronization critical path.

pub use current::CurrentDS;
pub use default::DefaultDS;
pub use parent::ParentDS;
pub use port::PortDS;
pub use time_properties::TimePropertiesDS;

mod current;
mod default;
mod parent;
mod port;
mod time_properties;
