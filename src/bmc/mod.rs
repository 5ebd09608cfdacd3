//! Best master clock algorithm: the distributed election that picks one
//! grandmaster per domain.

pub(crate) mod bmca;
pub(crate) mod dataset_comparison;
pub(crate) mod foreign_master;
