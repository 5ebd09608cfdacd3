/// Monotonic per-port counters, wrapping at 64 bits.
///
/// Validation and correlation failures never propagate as errors; they land
/// here and the offending message is dropped.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PortStatistics {
    // received
    pub announce_rx: u64,
    pub sync_rx: u64,
    pub follow_up_rx: u64,
    pub delay_req_rx: u64,
    pub delay_resp_rx: u64,
    pub pdelay_req_rx: u64,
    pub pdelay_resp_rx: u64,
    pub pdelay_resp_follow_up_rx: u64,
    pub signaling_rx: u64,
    pub management_rx: u64,

    // sent
    pub announce_tx: u64,
    pub sync_tx: u64,
    pub follow_up_tx: u64,
    pub delay_req_tx: u64,
    pub delay_resp_tx: u64,
    pub pdelay_tx: u64,

    // dropped
    pub validation_errors: u64,
    pub domain_mismatches: u64,
    pub sequence_mismatches: u64,
    pub unknown_source_discards: u64,
    pub follow_up_mismatch: u64,
    pub delay_resp_mismatch: u64,
    pub negative_delay_count: u64,

    // external interface
    pub send_failures: u64,
    pub timestamp_unavailable: u64,

    // timers and progress
    pub announce_timeouts: u64,
    pub sync_timeouts: u64,
    pub measurements_completed: u64,
}

/// Wrapping increment helper for the counters above.
pub(crate) fn bump(counter: &mut u64) {
    *counter = counter.wrapping_add(1);
}
