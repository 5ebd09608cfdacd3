use crate::time::Duration;

/// Synchronization-derived state, IEEE 1588-2019 8.2.2. Updated by the sync
/// engine after every completed four-timestamp cycle.
#[derive(Default, Copy, Clone, Debug, Eq, PartialEq)]
pub struct CurrentDS {
    pub steps_removed: u16,
    pub offset_from_master: Duration,
    pub mean_path_delay: Duration,
}
