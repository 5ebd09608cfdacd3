//! The synchronization engine: offset-from-master and mean-path-delay from
//! the four-timestamp exchanges, for both delay mechanisms.
//!
//! One engine exists per port. It owns the timestamp cache of the current
//! sync cycle and the stability window that gates the `Uncalibrated → Slave`
//! transition.

use crate::{
    datastructures::common::{PortIdentity, TimeInterval, WireTimestamp},
    error::PtpError,
    time::{Duration, Time},
};

mod stability;

pub(crate) use stability::StabilityTracker;

/// A completed offset/delay computation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Measurement {
    /// Offset of the local clock relative to the master; positive means the
    /// local clock is ahead
    pub(crate) offset: Duration,
    /// One-way network path delay towards the master, never negative
    pub(crate) mean_path_delay: Duration,
    /// Local receive time of the sync that produced this measurement
    pub(crate) event_time: Time,
}

/// Why an otherwise well-formed message or sample was dropped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Discard {
    /// Correlation failed; carries the correlation error kind
    Correlation(PtpError),
    /// The four timestamps produced a negative path delay
    NegativeDelay,
}

#[derive(Debug, Clone, Copy)]
enum SyncState {
    Initial,
    /// Sync received, two-step: waiting for the matching follow-up
    AfterSync {
        sync_id: u16,
        recv_time: Time,
        correction: Duration,
    },
    /// Origin known: t1 (fully corrected) and t2 are cached
    AfterFollowUp {
        recv_time: Time,
        send_time: Time,
    },
}

#[derive(Debug, Clone, Copy)]
enum DelayState {
    Initial,
    /// Delay request sent, t3 cached under its sequence id
    Requested { delay_id: u16, send_time: Time },
    /// Delay response matched; the E2E mean path delay is established
    Measured { mean_delay: Duration },
}

#[derive(Debug, Clone, Copy)]
enum PeerDelayState {
    Initial,
    /// Pdelay request sent, t1 cached under its sequence id
    Requested { pdelay_id: u16, send_time: Time },
    /// Two-step response received, waiting for the follow-up with t3
    AfterResponse {
        pdelay_id: u16,
        send_time: Time,
        request_recv_time: Time,
        response_recv_time: Time,
        correction: Duration,
    },
}

/// Per-port synchronization state
#[derive(Debug)]
pub(crate) struct SyncEngine {
    remote_master: Option<PortIdentity>,
    sync_state: SyncState,
    delay_state: DelayState,
    peer_delay: PeerDelayState,
    peer_mean_delay: Option<Duration>,
    /// A follow-up that arrived before its sync: (sequence id, corrected t1)
    pending_follow_up: Option<(u16, Time)>,
    stability: StabilityTracker,
}

impl SyncEngine {
    pub(crate) fn new() -> Self {
        Self {
            remote_master: None,
            sync_state: SyncState::Initial,
            delay_state: DelayState::Initial,
            peer_delay: PeerDelayState::Initial,
            peer_mean_delay: None,
            pending_follow_up: None,
            stability: StabilityTracker::default(),
        }
    }

    /// Point the engine at a (new) master, clearing the timestamp cache.
    pub(crate) fn set_remote_master(&mut self, master: Option<PortIdentity>) {
        self.remote_master = master;
        self.clear_cycle();
        self.stability.reset();
    }

    pub(crate) fn remote_master(&self) -> Option<PortIdentity> {
        self.remote_master
    }

    /// Drop the in-flight cycle but keep master and link delay.
    pub(crate) fn clear_cycle(&mut self) {
        self.sync_state = SyncState::Initial;
        self.delay_state = DelayState::Initial;
        self.peer_delay = PeerDelayState::Initial;
        self.pending_follow_up = None;
    }

    pub(crate) fn stability(&self) -> &StabilityTracker {
        &self.stability
    }

    pub(crate) fn reset_stability(&mut self) {
        self.stability.reset();
    }

    pub(crate) fn peer_mean_delay(&self) -> Option<Duration> {
        self.peer_mean_delay
    }

    /// A sync message of sequence `s` updates t2 (and t1 for one-step).
    pub(crate) fn handle_sync(
        &mut self,
        source: PortIdentity,
        sync_id: u16,
        two_step: bool,
        correction: TimeInterval,
        origin: WireTimestamp,
        recv_time: Time,
    ) -> Result<(), Discard> {
        self.require_master(source)?;

        if two_step {
            self.sync_state = SyncState::AfterSync {
                sync_id,
                recv_time,
                correction: Duration::from(correction),
            };
            // a follow-up may already be waiting for this sync
            if let Some((pending_id, origin_time)) = self.pending_follow_up {
                if pending_id == sync_id {
                    self.pending_follow_up = None;
                    self.sync_state = SyncState::AfterFollowUp {
                        recv_time,
                        send_time: origin_time + Duration::from(correction),
                    };
                }
            }
        } else {
            self.sync_state = SyncState::AfterFollowUp {
                recv_time,
                send_time: Time::from(origin) + Duration::from(correction),
            };
        }

        Ok(())
    }

    /// A follow-up applies to the sync with the matching sequence id;
    /// otherwise it is buffered in case its sync is still in flight.
    /// Returns whether it applied immediately.
    pub(crate) fn handle_follow_up(
        &mut self,
        source: PortIdentity,
        sync_id: u16,
        correction: TimeInterval,
        precise_origin: WireTimestamp,
    ) -> Result<bool, Discard> {
        self.require_master(source)?;

        let origin_time = Time::from(precise_origin) + Duration::from(correction);

        match self.sync_state {
            SyncState::AfterSync {
                sync_id: cached_id,
                recv_time,
                correction: sync_correction,
            } if cached_id == sync_id => {
                self.pending_follow_up = None;
                self.sync_state = SyncState::AfterFollowUp {
                    recv_time,
                    send_time: origin_time + sync_correction,
                };
                Ok(true)
            }
            _ => {
                self.pending_follow_up = Some((sync_id, origin_time));
                Ok(false)
            }
        }
    }

    /// Record the local transmit time (t3) of a delay request.
    pub(crate) fn delay_req_sent(&mut self, delay_id: u16, send_time: Time) {
        self.delay_state = DelayState::Requested {
            delay_id,
            send_time,
        };
    }

    /// A delay response supplies t4 when it is addressed to us and matches
    /// the in-flight request.
    pub(crate) fn handle_delay_resp(
        &mut self,
        own_identity: PortIdentity,
        requesting_port_identity: PortIdentity,
        delay_id: u16,
        correction: TimeInterval,
        receive_timestamp: WireTimestamp,
    ) -> Result<(), Discard> {
        if requesting_port_identity != own_identity {
            return Err(Discard::Correlation(PtpError::UnknownSource));
        }

        let DelayState::Requested {
            delay_id: cached_id,
            send_time,
        } = self.delay_state
        else {
            return Err(Discard::Correlation(PtpError::SequenceMismatch));
        };
        if cached_id != delay_id {
            return Err(Discard::Correlation(PtpError::SequenceMismatch));
        }

        let SyncState::AfterFollowUp {
            recv_time,
            send_time: sync_send_time,
        } = self.sync_state
        else {
            return Err(Discard::Correlation(PtpError::SequenceMismatch));
        };

        // t4, with the response correction removed from the path
        let delay_recv_time = Time::from(receive_timestamp) - Duration::from(correction);

        // mean = ((t2 - t1) + (t4 - t3)) / 2, corrections already applied
        let mean_delay =
            ((recv_time - sync_send_time) + (delay_recv_time - send_time)) / 2;

        if mean_delay < Duration::ZERO {
            self.delay_state = DelayState::Initial;
            return Err(Discard::NegativeDelay);
        }

        self.delay_state = DelayState::Measured { mean_delay };
        Ok(())
    }

    /// Record the local transmit time (t1) of a peer delay request.
    pub(crate) fn pdelay_req_sent(&mut self, pdelay_id: u16, send_time: Time) {
        self.peer_delay = PeerDelayState::Requested {
            pdelay_id,
            send_time,
        };
    }

    /// A peer delay response supplies t2 and t4. One-step responders carry
    /// the whole turnaround in the correction field and finish the cycle
    /// here; two-step responders defer t3 to the follow-up.
    pub(crate) fn handle_pdelay_resp(
        &mut self,
        own_identity: PortIdentity,
        requesting_port_identity: PortIdentity,
        pdelay_id: u16,
        two_step: bool,
        correction: TimeInterval,
        request_receive_timestamp: WireTimestamp,
        recv_time: Time,
    ) -> Result<(), Discard> {
        if requesting_port_identity != own_identity {
            return Err(Discard::Correlation(PtpError::UnknownSource));
        }

        let PeerDelayState::Requested {
            pdelay_id: cached_id,
            send_time,
        } = self.peer_delay
        else {
            return Err(Discard::Correlation(PtpError::SequenceMismatch));
        };
        if cached_id != pdelay_id {
            return Err(Discard::Correlation(PtpError::SequenceMismatch));
        }

        if two_step {
            self.peer_delay = PeerDelayState::AfterResponse {
                pdelay_id,
                send_time,
                request_recv_time: Time::from(request_receive_timestamp),
                response_recv_time: recv_time,
                correction: Duration::from(correction),
            };
            Ok(())
        } else {
            // one-step: mean = ((t4 - t1) - c_resp) / 2
            let round_trip = recv_time - send_time;
            let mean = (round_trip - Duration::from(correction)) / 2;
            self.peer_delay = PeerDelayState::Initial;
            self.store_peer_delay(mean)
        }
    }

    /// The peer delay follow-up supplies t3 and completes the cycle:
    /// mean = ((t4 - t1) - (t3 - t2 - c_resp - c_followup)) / 2.
    pub(crate) fn handle_pdelay_resp_follow_up(
        &mut self,
        own_identity: PortIdentity,
        requesting_port_identity: PortIdentity,
        pdelay_id: u16,
        correction: TimeInterval,
        response_origin_timestamp: WireTimestamp,
    ) -> Result<(), Discard> {
        if requesting_port_identity != own_identity {
            return Err(Discard::Correlation(PtpError::UnknownSource));
        }

        let PeerDelayState::AfterResponse {
            pdelay_id: cached_id,
            send_time,
            request_recv_time,
            response_recv_time,
            correction: resp_correction,
        } = self.peer_delay
        else {
            return Err(Discard::Correlation(PtpError::SequenceMismatch));
        };
        if cached_id != pdelay_id {
            return Err(Discard::Correlation(PtpError::SequenceMismatch));
        }

        let round_trip = response_recv_time - send_time;
        let turnaround = (Time::from(response_origin_timestamp) - request_recv_time)
            - resp_correction
            - Duration::from(correction);
        let mean = (round_trip - turnaround) / 2;

        self.peer_delay = PeerDelayState::Initial;
        self.store_peer_delay(mean)
    }

    fn store_peer_delay(&mut self, mean: Duration) -> Result<(), Discard> {
        if mean < Duration::ZERO {
            return Err(Discard::NegativeDelay);
        }
        self.peer_mean_delay = Some(mean);
        Ok(())
    }

    /// Take a completed measurement if the cycle has all four timestamps.
    ///
    /// `peer_to_peer` selects which delay source pairs with the cached sync:
    /// the E2E delay request cycle, or the established peer delay.
    pub(crate) fn extract_measurement(&mut self, peer_to_peer: bool) -> Option<Measurement> {
        let SyncState::AfterFollowUp {
            recv_time,
            send_time,
        } = self.sync_state
        else {
            return None;
        };

        let mean_path_delay = if peer_to_peer {
            self.peer_mean_delay?
        } else {
            let DelayState::Measured { mean_delay } = self.delay_state else {
                return None;
            };
            mean_delay
        };

        let measurement = Measurement {
            offset: recv_time - send_time - mean_path_delay,
            mean_path_delay,
            event_time: recv_time,
        };

        self.sync_state = SyncState::Initial;
        self.stability.record(measurement.offset);

        Some(measurement)
    }

    fn require_master(&self, source: PortIdentity) -> Result<(), Discard> {
        match self.remote_master {
            Some(master) if master == source => Ok(()),
            _ => Err(Discard::Correlation(PtpError::UnknownSource)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datastructures::common::ClockIdentity;

    fn master() -> PortIdentity {
        PortIdentity {
            clock_identity: ClockIdentity([1; 8]),
            port_number: 1,
        }
    }

    fn own() -> PortIdentity {
        PortIdentity {
            clock_identity: ClockIdentity([2; 8]),
            port_number: 1,
        }
    }

    fn engine() -> SyncEngine {
        let mut engine = SyncEngine::new();
        engine.set_remote_master(Some(master()));
        engine
    }

    fn wire(seconds: u64, nanos: u32) -> WireTimestamp {
        WireTimestamp { seconds, nanos }
    }

    /// t1 = .100, t2 = .105, t3 = .200, t4 = .206 must give an offset of
    /// −0.5 ms and a path delay of 5.5 ms.
    #[test]
    fn e2e_four_timestamp_cycle() {
        let mut engine = engine();

        engine
            .handle_sync(
                master(),
                1,
                true,
                TimeInterval::ZERO,
                WireTimestamp::default(),
                Time::from(wire(1000, 105_000_000)),
            )
            .unwrap();
        assert!(engine
            .handle_follow_up(master(), 1, TimeInterval::ZERO, wire(1000, 100_000_000))
            .unwrap());

        engine.delay_req_sent(7, Time::from(wire(1000, 200_000_000)));
        engine
            .handle_delay_resp(
                own(),
                own(),
                7,
                TimeInterval::ZERO,
                wire(1000, 206_000_000),
            )
            .unwrap();

        let measurement = engine.extract_measurement(false).unwrap();
        assert_eq!(measurement.offset.as_nanos(), -500_000);
        assert_eq!(measurement.mean_path_delay.as_nanos(), 5_500_000);
    }

    #[test]
    fn one_step_sync_needs_no_follow_up() {
        let mut engine = engine();

        engine
            .handle_sync(
                master(),
                3,
                false,
                TimeInterval::ZERO,
                wire(10, 0),
                Time::from(wire(10, 400)),
            )
            .unwrap();
        engine.delay_req_sent(1, Time::from(wire(10, 1_000)));
        engine
            .handle_delay_resp(own(), own(), 1, TimeInterval::ZERO, wire(10, 1_400))
            .unwrap();

        let measurement = engine.extract_measurement(false).unwrap();
        assert_eq!(measurement.mean_path_delay.as_nanos(), 400);
        assert_eq!(measurement.offset.as_nanos(), 0);
    }

    #[test]
    fn follow_up_before_sync_is_buffered() {
        let mut engine = engine();

        assert!(!engine
            .handle_follow_up(master(), 9, TimeInterval::ZERO, wire(20, 0))
            .unwrap());

        engine
            .handle_sync(
                master(),
                9,
                true,
                TimeInterval::ZERO,
                WireTimestamp::default(),
                Time::from(wire(20, 500)),
            )
            .unwrap();

        engine.delay_req_sent(2, Time::from(wire(20, 1_000)));
        engine
            .handle_delay_resp(own(), own(), 2, TimeInterval::ZERO, wire(20, 1_500))
            .unwrap();

        assert!(engine.extract_measurement(false).is_some());
    }

    #[test]
    fn mismatched_follow_up_does_not_apply() {
        let mut engine = engine();

        engine
            .handle_sync(
                master(),
                1,
                true,
                TimeInterval::ZERO,
                WireTimestamp::default(),
                Time::from(wire(30, 0)),
            )
            .unwrap();
        // different sequence: buffered, not applied
        assert!(!engine
            .handle_follow_up(master(), 2, TimeInterval::ZERO, wire(30, 100))
            .unwrap());
        assert!(engine.extract_measurement(false).is_none());
    }

    #[test]
    fn delay_resp_for_other_port_is_dropped() {
        let mut engine = engine();
        engine.delay_req_sent(5, Time::from(wire(40, 0)));

        let result = engine.handle_delay_resp(
            own(),
            master(), // addressed to someone else
            5,
            TimeInterval::ZERO,
            wire(40, 100),
        );
        assert_eq!(
            result,
            Err(Discard::Correlation(PtpError::UnknownSource))
        );
    }

    #[test]
    fn delay_resp_sequence_mismatch_is_dropped() {
        let mut engine = engine();
        engine
            .handle_sync(
                master(),
                1,
                false,
                TimeInterval::ZERO,
                wire(50, 0),
                Time::from(wire(50, 100)),
            )
            .unwrap();
        engine.delay_req_sent(5, Time::from(wire(50, 200)));

        let result =
            engine.handle_delay_resp(own(), own(), 6, TimeInterval::ZERO, wire(50, 300));
        assert_eq!(
            result,
            Err(Discard::Correlation(PtpError::SequenceMismatch))
        );
    }

    #[test]
    fn negative_delay_is_rejected() {
        let mut engine = engine();

        // master's clock far behind: t4 - t3 hugely negative
        engine
            .handle_sync(
                master(),
                1,
                false,
                TimeInterval::ZERO,
                wire(60, 0),
                Time::from(wire(60, 10)),
            )
            .unwrap();
        engine.delay_req_sent(1, Time::from(wire(61, 0)));
        let result =
            engine.handle_delay_resp(own(), own(), 1, TimeInterval::ZERO, wire(60, 100));
        assert_eq!(result, Err(Discard::NegativeDelay));
        assert!(engine.extract_measurement(false).is_none());
    }

    #[test]
    fn peer_delay_two_step_cycle() {
        let mut engine = engine();

        // t1 = 100ns, t2 = 350ns, t3 = 450ns, t4 = 700ns
        // round trip 600ns, turnaround 100ns => mean 250ns
        engine.pdelay_req_sent(11, Time::from_nanos(100));
        engine
            .handle_pdelay_resp(
                own(),
                own(),
                11,
                true,
                TimeInterval::ZERO,
                wire(0, 350),
                Time::from_nanos(700),
            )
            .unwrap();
        engine
            .handle_pdelay_resp_follow_up(own(), own(), 11, TimeInterval::ZERO, wire(0, 450))
            .unwrap();

        assert_eq!(engine.peer_mean_delay().unwrap().as_nanos(), 250);
    }

    #[test]
    fn peer_delay_feeds_p2p_offset() {
        let mut engine = engine();
        engine.pdelay_req_sent(1, Time::from_nanos(0));
        engine
            .handle_pdelay_resp(
                own(),
                own(),
                1,
                false,
                TimeInterval::ZERO,
                WireTimestamp::default(),
                Time::from_nanos(500),
            )
            .unwrap();
        assert_eq!(engine.peer_mean_delay().unwrap().as_nanos(), 250);

        // sync with origin 1000, arrival 1350: offset = 350 - 250 = 100
        engine
            .handle_sync(
                master(),
                2,
                false,
                TimeInterval::ZERO,
                wire(0, 1_000),
                Time::from_nanos(1_350),
            )
            .unwrap();
        let measurement = engine.extract_measurement(true).unwrap();
        assert_eq!(measurement.offset.as_nanos(), 100);
        assert_eq!(measurement.mean_path_delay.as_nanos(), 250);
    }

    #[test]
    fn correction_fields_shift_the_result() {
        let mut engine = engine();

        let correction = TimeInterval(fixed::types::I48F16::from_num(1_000));
        engine
            .handle_sync(
                master(),
                1,
                false,
                correction,
                wire(0, 10_000),
                Time::from_nanos(14_000),
            )
            .unwrap();
        engine.delay_req_sent(1, Time::from_nanos(20_000));
        engine
            .handle_delay_resp(own(), own(), 1, TimeInterval::ZERO, wire(0, 23_000))
            .unwrap();

        let measurement = engine.extract_measurement(false).unwrap();
        // (t2 - t1 - c) = 3000, (t4 - t3) = 3000 => delay 3000, offset 0
        assert_eq!(measurement.mean_path_delay.as_nanos(), 3_000);
        assert_eq!(measurement.offset.as_nanos(), 0);
    }
}
