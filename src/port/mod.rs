//! A single port of a PTP clock: the per-port state machine, its timers,
//! and the duties each state performs.
//!
//! Ports never talk to the network themselves; every transmission goes
//! through the [`PortIo`] capability the host supplies, and all timing is
//! polled from [`tick`](Port::tick) with the host's notion of "now".

use rand::Rng;

use crate::{
    bmc::bmca::{BestAnnounce, Bmca, RecommendedState},
    config::{DelayMechanism, PortConfig},
    datastructures::{
        common::{PortIdentity, TimeInterval, WireTimestamp},
        datasets::PortDS,
        messages::{
            AnnounceMessage, DelayRespMessage, FollowUpMessage, Header, Message, MessageBody,
            PDelayRespFollowUpMessage, PDelayRespMessage, SyncMessage, MAX_DATA_LEN,
        },
    },
    error::PtpError,
    instance::InstanceState,
    sync::{Discard, Measurement, SyncEngine},
    time::{Duration, Time},
};

mod io;
mod sequence_id;
mod state;
mod statistics;

pub use io::PortIo;
pub use state::PortState;
pub use statistics::PortStatistics;

use sequence_id::SequenceIdGenerator;
use statistics::bump;

/// Send-path failures tolerated before the port faults
const SEND_FAILURE_BUDGET: u8 = 3;

/// What a best-master decision did to the port
#[derive(Debug, Clone)]
pub(crate) enum DecisionOutcome {
    Unchanged,
    BecameMaster,
    BecameSlave(AnnounceMessage),
    BecamePassive,
    BecameListening,
}

/// What happened during a tick that the owning clock must react to
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct TickOutcome {
    /// The announce receipt timeout fired while receiving time: the parent
    /// is gone and the port fell back to `Listening`
    pub(crate) parent_timeout: bool,
}

/// Timed events, exposed for host test suites via `inject_event_for_test`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortEvent {
    AnnounceReceiptTimeout,
    SyncReceiptTimeout,
    QualificationTimeout,
    Fault,
}

/// One port of a PTP clock.
///
/// Generic over the host I/O capability `P` and the random source `R` used
/// to jitter delay-request emission.
#[derive(Debug)]
pub struct Port<P, R> {
    config: PortConfig,
    io: P,
    rng: R,
    port_identity: PortIdentity,
    slave_only: bool,
    state: PortState,
    bmca: Bmca,
    sync: SyncEngine,

    announce_seq_ids: SequenceIdGenerator,
    sync_seq_ids: SequenceIdGenerator,
    delay_req_seq_ids: SequenceIdGenerator,
    pdelay_req_seq_ids: SequenceIdGenerator,

    next_announce: Option<Time>,
    next_sync: Option<Time>,
    next_delay_req: Option<Time>,
    next_pdelay_req: Option<Time>,
    announce_receipt_deadline: Option<Time>,
    sync_receipt_deadline: Option<Time>,
    qualification_deadline: Option<Time>,

    statistics: PortStatistics,
    send_failures: u8,
    packet_buffer: [u8; MAX_DATA_LEN],
}

impl<P: PortIo, R: Rng> Port<P, R> {
    pub(crate) fn new(
        config: PortConfig,
        io: P,
        rng: R,
        port_identity: PortIdentity,
        slave_only: bool,
    ) -> Result<Self, PtpError> {
        config.validate()?;
        Ok(Self {
            config,
            io,
            rng,
            port_identity,
            slave_only,
            state: PortState::Initializing,
            bmca: Bmca::new(port_identity),
            sync: SyncEngine::new(),
            announce_seq_ids: SequenceIdGenerator::new(),
            sync_seq_ids: SequenceIdGenerator::new(),
            delay_req_seq_ids: SequenceIdGenerator::new(),
            pdelay_req_seq_ids: SequenceIdGenerator::new(),
            next_announce: None,
            next_sync: None,
            next_delay_req: None,
            next_pdelay_req: None,
            announce_receipt_deadline: None,
            sync_receipt_deadline: None,
            qualification_deadline: None,
            statistics: PortStatistics::default(),
            send_failures: 0,
            packet_buffer: [0; MAX_DATA_LEN],
        })
    }

    /// (Re-)initialize the port. This is the only way out of `Faulty`.
    pub(crate) fn initialize(&mut self, now: Time) {
        self.bmca.clear();
        self.sync.set_remote_master(None);
        self.send_failures = 0;
        self.state = PortState::Initializing;
        if self.config.enabled {
            self.set_state(PortState::Listening, now);
        } else {
            self.set_state(PortState::Disabled, now);
        }
    }

    pub fn state(&self) -> PortState {
        self.state
    }

    pub fn port_identity(&self) -> PortIdentity {
        self.port_identity
    }

    pub fn statistics(&self) -> &PortStatistics {
        &self.statistics
    }

    pub fn foreign_master_count(&self) -> usize {
        self.bmca.foreign_master_count()
    }

    /// The master this port currently receives time from
    pub fn remote_master(&self) -> Option<PortIdentity> {
        self.sync.remote_master()
    }

    /// A snapshot of the port data set
    pub fn port_ds(&self) -> PortDS {
        PortDS::from_config(&self.config, self.port_identity, self.state)
    }

    /// The established peer link delay, if the peer delay mechanism has
    /// completed a cycle on this port
    pub fn peer_mean_delay(&self) -> Option<Duration> {
        self.sync.peer_mean_delay()
    }

    pub(crate) fn config(&self) -> &PortConfig {
        &self.config
    }

    fn peer_to_peer(&self) -> bool {
        matches!(self.config.delay_mechanism, DelayMechanism::P2P { .. })
    }

    // === receive path ===================================================

    /// Register a received announce. Returns whether it qualified.
    pub(crate) fn handle_announce(&mut self, announce: &AnnounceMessage, now: Time) -> bool {
        bump(&mut self.statistics.announce_rx);
        if self.state.is_inactive() {
            return false;
        }

        let registered = self.bmca.register_announce_message(announce, now);
        if registered {
            self.announce_receipt_deadline = Some(now + self.config.announce_duration());
        }
        registered
    }

    pub(crate) fn handle_sync(
        &mut self,
        header: &Header,
        body: &SyncMessage,
        recv_time: Time,
    ) -> Option<Measurement> {
        bump(&mut self.statistics.sync_rx);
        if !self.state.is_slave_like() {
            return None;
        }

        match self.sync.handle_sync(
            header.source_port_identity,
            header.sequence_id,
            header.two_step_flag,
            header.correction_field,
            body.origin_timestamp,
            recv_time,
        ) {
            Ok(()) => {
                self.sync_receipt_deadline = Some(recv_time + self.config.sync_duration());
                self.take_measurement()
            }
            Err(discard) => {
                self.count_discard(discard);
                None
            }
        }
    }

    pub(crate) fn handle_follow_up(
        &mut self,
        header: &Header,
        body: &FollowUpMessage,
    ) -> Option<Measurement> {
        bump(&mut self.statistics.follow_up_rx);
        if !self.state.is_slave_like() {
            return None;
        }

        match self.sync.handle_follow_up(
            header.source_port_identity,
            header.sequence_id,
            header.correction_field,
            body.precise_origin_timestamp,
        ) {
            Ok(applied) => {
                if !applied {
                    bump(&mut self.statistics.follow_up_mismatch);
                }
                self.take_measurement()
            }
            Err(discard) => {
                self.count_discard(discard);
                None
            }
        }
    }

    pub(crate) fn handle_delay_resp(
        &mut self,
        header: &Header,
        body: &DelayRespMessage,
    ) -> Option<Measurement> {
        bump(&mut self.statistics.delay_resp_rx);
        if !self.state.is_slave_like() {
            return None;
        }

        match self.sync.handle_delay_resp(
            self.port_identity,
            body.requesting_port_identity,
            header.sequence_id,
            header.correction_field,
            body.receive_timestamp,
        ) {
            Ok(()) => self.take_measurement(),
            Err(Discard::Correlation(PtpError::UnknownSource)) => {
                bump(&mut self.statistics.delay_resp_mismatch);
                None
            }
            Err(discard) => {
                self.count_discard(discard);
                None
            }
        }
    }

    /// A master answers delay requests with the receive timestamp reflected
    /// in a delay response.
    pub(crate) fn handle_delay_req(&mut self, header: &Header, recv_time: Time) {
        bump(&mut self.statistics.delay_req_rx);
        if self.state != PortState::Master {
            return;
        }

        let response = Message::delay_resp(
            *header,
            self.port_identity,
            self.config.min_delay_req_interval(),
            recv_time,
        );

        let Ok(length) = response.serialize(&mut self.packet_buffer) else {
            log::error!("could not serialize delay response");
            return;
        };
        match self.io.send_delay_resp(&self.packet_buffer[..length]) {
            Ok(()) => {
                bump(&mut self.statistics.delay_resp_tx);
                self.send_failures = 0;
            }
            Err(error) => self.note_send_failure("delay response", error),
        }
    }

    /// Peer delay responder: reply with a response and its follow-up. Runs
    /// on every active port whose link uses the peer delay mechanism.
    pub(crate) fn handle_pdelay_req(
        &mut self,
        header: &Header,
        recv_time: Time,
        state: &InstanceState,
    ) {
        bump(&mut self.statistics.pdelay_req_rx);
        if self.state.is_inactive() {
            return;
        }

        let response =
            Message::pdelay_resp(&state.default_ds, self.port_identity, *header, recv_time);
        let Ok(length) = response.serialize(&mut self.packet_buffer) else {
            log::error!("could not serialize pdelay response");
            return;
        };

        let sent = self.io.send_pdelay_resp(&self.packet_buffer[..length]);
        let response_tx = match sent {
            Ok(tx) => {
                bump(&mut self.statistics.pdelay_tx);
                self.send_failures = 0;
                self.resolve_tx_timestamp(tx, header.sequence_id)
            }
            Err(error) => {
                self.note_send_failure("pdelay response", error);
                return;
            }
        };

        let Some(response_origin) = response_tx else {
            return;
        };

        let follow_up = Message::pdelay_resp_follow_up(
            &state.default_ds,
            self.port_identity,
            header.source_port_identity,
            header.sequence_id,
            response_origin,
        );
        let Ok(length) = follow_up.serialize(&mut self.packet_buffer) else {
            log::error!("could not serialize pdelay response follow-up");
            return;
        };
        match self
            .io
            .send_pdelay_resp_follow_up(&self.packet_buffer[..length])
        {
            Ok(()) => {
                bump(&mut self.statistics.pdelay_tx);
                self.send_failures = 0;
            }
            Err(error) => self.note_send_failure("pdelay response follow-up", error),
        }
    }

    pub(crate) fn handle_pdelay_resp(
        &mut self,
        header: &Header,
        body: &PDelayRespMessage,
        recv_time: Time,
    ) {
        bump(&mut self.statistics.pdelay_resp_rx);

        if let Err(discard) = self.sync.handle_pdelay_resp(
            self.port_identity,
            body.requesting_port_identity,
            header.sequence_id,
            header.two_step_flag,
            header.correction_field,
            body.request_receive_timestamp,
            recv_time,
        ) {
            self.count_discard(discard);
        }
    }

    pub(crate) fn handle_pdelay_resp_follow_up(
        &mut self,
        header: &Header,
        body: &PDelayRespFollowUpMessage,
    ) {
        bump(&mut self.statistics.pdelay_resp_follow_up_rx);

        if let Err(discard) = self.sync.handle_pdelay_resp_follow_up(
            self.port_identity,
            body.requesting_port_identity,
            header.sequence_id,
            header.correction_field,
            body.response_origin_timestamp,
        ) {
            self.count_discard(discard);
        }
    }

    pub(crate) fn note_signaling(&mut self) {
        bump(&mut self.statistics.signaling_rx);
    }

    pub(crate) fn note_management(&mut self) {
        bump(&mut self.statistics.management_rx);
    }

    pub(crate) fn note_validation_error(&mut self) {
        bump(&mut self.statistics.validation_errors);
    }

    pub(crate) fn note_domain_mismatch(&mut self) {
        bump(&mut self.statistics.domain_mismatches);
    }

    // === timers and duties ==============================================

    /// Run the timeout checks and per-state duties for this port.
    pub(crate) fn tick(&mut self, now: Time, state: &InstanceState) -> TickOutcome {
        let mut outcome = TickOutcome::default();

        if self.state.is_inactive() {
            return outcome;
        }

        if deadline_passed(self.qualification_deadline, now)
            && self.state == PortState::PreMaster
        {
            self.qualification_deadline = None;
            self.set_state(PortState::Master, now);
        }

        if deadline_passed(self.announce_receipt_deadline, now) {
            outcome.parent_timeout |= self.on_announce_receipt_timeout(now);
        }

        if deadline_passed(self.sync_receipt_deadline, now) {
            self.on_sync_receipt_timeout(now);
        }

        if self.state == PortState::Master {
            if deadline_passed(self.next_announce, now) {
                self.next_announce = Some(now + self.config.announce_interval.as_duration());
                self.send_master_announce(state);
            }
            if deadline_passed(self.next_sync, now) {
                self.next_sync = Some(now + self.config.sync_interval.as_duration());
                self.send_master_sync(state, now);
            }
        }

        if self.state.is_slave_like() {
            match self.config.delay_mechanism {
                DelayMechanism::E2E { .. } => {
                    if deadline_passed(self.next_delay_req, now) {
                        self.schedule_next_delay_req(now);
                        self.send_delay_request(state);
                    }
                }
                DelayMechanism::P2P { .. } => {
                    if deadline_passed(self.next_pdelay_req, now) {
                        self.schedule_next_pdelay_req(now);
                        self.send_pdelay_request(state);
                    }
                }
                DelayMechanism::Disabled => {}
            }
        }

        outcome
    }

    /// Drop foreign masters that aged out. Returns whether the current
    /// parent was among them (in which case the port has already fallen
    /// back to `Listening`).
    pub(crate) fn prune_foreign_masters(&mut self, now: Time) -> bool {
        let removed = self.bmca.prune(now, self.config.announce_duration());
        if removed.is_empty() {
            return false;
        }

        let parent_lost = match self.sync.remote_master() {
            Some(parent) => removed.iter().any(|identity| *identity == parent),
            None => false,
        };

        if parent_lost && self.state.is_slave_like() {
            log::warn!("port {}: parent timed out of the foreign master list", self.port_identity);
            self.drop_parent(now);
            return true;
        }
        false
    }

    pub(crate) fn erbest(&self) -> Option<BestAnnounce> {
        // masters heard on a master-only port never become its time source
        if self.config.master_only {
            return None;
        }
        self.bmca.erbest()
    }

    /// Apply a role recommendation from the election.
    pub(crate) fn apply_recommended_state(
        &mut self,
        recommendation: &RecommendedState,
        now: Time,
    ) -> DecisionOutcome {
        if self.state.is_inactive() {
            return DecisionOutcome::Unchanged;
        }

        match recommendation {
            RecommendedState::Master => match self.state {
                PortState::Master | PortState::PreMaster => DecisionOutcome::Unchanged,
                _ => {
                    self.sync.set_remote_master(None);
                    self.set_state(PortState::PreMaster, now);
                    DecisionOutcome::BecameMaster
                }
            },
            RecommendedState::Slave(announce) => {
                let parent = announce.header.source_port_identity;
                if self.state.is_slave_like() && self.sync.remote_master() == Some(parent) {
                    return DecisionOutcome::Unchanged;
                }
                self.sync.set_remote_master(Some(parent));
                // re-enter calibration even when coming from Slave of another parent
                self.state_to_uncalibrated(now);
                DecisionOutcome::BecameSlave(*announce)
            }
            RecommendedState::Passive(_) => match self.state {
                PortState::Passive => DecisionOutcome::Unchanged,
                _ => {
                    self.sync.set_remote_master(None);
                    self.set_state(PortState::Passive, now);
                    DecisionOutcome::BecamePassive
                }
            },
            RecommendedState::Listening => match self.state {
                PortState::Listening => DecisionOutcome::Unchanged,
                _ => {
                    self.drop_parent(now);
                    DecisionOutcome::BecameListening
                }
            },
        }
    }

    /// Promote a calibrating port once its offset is stable. Returns whether
    /// the promotion happened.
    pub(crate) fn maybe_promote_to_slave(&mut self, now: Time) -> bool {
        if self.state == PortState::Uncalibrated && self.sync.stability().is_stable() {
            self.set_state(PortState::Slave, now);
            true
        } else {
            false
        }
    }

    pub(crate) fn fault(&mut self, reason: &str, now: Time) {
        if self.state == PortState::Faulty {
            return;
        }
        log::error!("port {} faulted: {reason}", self.port_identity);
        self.sync.set_remote_master(None);
        self.set_state(PortState::Faulty, now);
        self.io.on_fault(reason);
    }

    // === internals ======================================================

    fn take_measurement(&mut self) -> Option<Measurement> {
        let measurement = self.sync.extract_measurement(self.peer_to_peer())?;
        bump(&mut self.statistics.measurements_completed);
        Some(measurement)
    }

    fn on_announce_receipt_timeout(&mut self, now: Time) -> bool {
        bump(&mut self.statistics.announce_timeouts);
        self.announce_receipt_deadline = Some(now + self.config.announce_duration());

        if self.state.is_slave_like() {
            log::warn!("port {}: announce receipt timeout, dropping parent", self.port_identity);
            self.drop_parent(now);
            return true;
        }

        // no master announces itself on this segment: qualify to take over,
        // unless this clock may never master
        if self.state == PortState::Listening && !self.slave_only {
            self.set_state(PortState::PreMaster, now);
        }
        false
    }

    fn on_sync_receipt_timeout(&mut self, now: Time) {
        bump(&mut self.statistics.sync_timeouts);
        self.sync_receipt_deadline = Some(now + self.config.sync_duration());

        if self.state == PortState::Slave {
            // the parent still announces but its sync stream stopped;
            // restart calibration against the same parent
            self.sync.clear_cycle();
            self.sync.reset_stability();
            self.set_state(PortState::Uncalibrated, now);
        }
    }

    fn drop_parent(&mut self, now: Time) {
        self.sync.set_remote_master(None);
        self.set_state(PortState::Listening, now);
    }

    fn state_to_uncalibrated(&mut self, now: Time) {
        // direct re-entry must still reset the calibration machinery
        if self.state == PortState::Uncalibrated {
            self.sync.reset_stability();
            self.arm_slave_timers(now);
        } else {
            self.set_state(PortState::Uncalibrated, now);
        }
    }

    fn set_state(&mut self, new_state: PortState, now: Time) {
        if new_state == self.state {
            return;
        }
        let old = self.state;
        self.state = new_state;
        log::info!("port {} state {old} -> {new_state}", self.port_identity);

        match new_state {
            PortState::Master => {
                self.next_announce = Some(now);
                self.next_sync = Some(now);
                self.qualification_deadline = None;
            }
            PortState::PreMaster => {
                self.clear_duty_timers();
                self.qualification_deadline =
                    Some(now + self.config.announce_interval.as_duration());
            }
            PortState::Uncalibrated => {
                self.clear_duty_timers();
                self.qualification_deadline = None;
                self.sync.reset_stability();
                self.arm_slave_timers(now);
            }
            PortState::Slave => {
                // calibration timers keep running
            }
            PortState::Listening => {
                self.clear_duty_timers();
                self.announce_receipt_deadline = Some(now + self.config.announce_duration());
                self.sync_receipt_deadline = None;
                self.qualification_deadline = None;
            }
            PortState::Passive
            | PortState::Faulty
            | PortState::Disabled
            | PortState::Initializing => {
                self.clear_duty_timers();
                self.announce_receipt_deadline = None;
                self.sync_receipt_deadline = None;
                self.qualification_deadline = None;
            }
        }

        self.io.on_state_change(old, new_state);
    }

    fn arm_slave_timers(&mut self, now: Time) {
        self.announce_receipt_deadline = Some(now + self.config.announce_duration());
        self.sync_receipt_deadline = Some(now + self.config.sync_duration());
        self.next_delay_req = Some(now);
        self.next_pdelay_req = Some(now);
    }

    fn clear_duty_timers(&mut self) {
        self.next_announce = None;
        self.next_sync = None;
        self.next_delay_req = None;
        self.next_pdelay_req = None;
    }

    fn schedule_next_delay_req(&mut self, now: Time) {
        let base = self.config.min_delay_req_interval().as_duration().as_nanos();
        // uniform in [interval, 2*interval): masters police minimum spacing
        let jitter = self.rng.gen_range(0..base.max(1));
        self.next_delay_req = Some(now + Duration::from_nanos(base + jitter));
    }

    fn schedule_next_pdelay_req(&mut self, now: Time) {
        let base = self.config.min_delay_req_interval().as_duration().as_nanos();
        let jitter = self.rng.gen_range(0..base.max(1));
        self.next_pdelay_req = Some(now + Duration::from_nanos(base + jitter));
    }

    fn send_master_announce(&mut self, state: &InstanceState) {
        let sequence_id = self.announce_seq_ids.generate();
        let message = Message::announce(
            state,
            self.port_identity,
            self.config.announce_interval.as_log_2(),
            sequence_id,
        );
        let Ok(length) = message.serialize(&mut self.packet_buffer) else {
            log::error!("could not serialize announce");
            return;
        };
        match self.io.send_announce(&self.packet_buffer[..length]) {
            Ok(()) => {
                bump(&mut self.statistics.announce_tx);
                self.send_failures = 0;
            }
            Err(error) => self.note_send_failure("announce", error),
        }
    }

    fn send_master_sync(&mut self, state: &InstanceState, now: Time) {
        let sequence_id = self.sync_seq_ids.generate();
        let mut message = Message::sync(&state.default_ds, self.port_identity, sequence_id);
        if !state.default_ds.two_step {
            if let MessageBody::Sync(body) = &mut message.body {
                body.origin_timestamp = now.into();
            }
        }
        let Ok(length) = message.serialize(&mut self.packet_buffer) else {
            log::error!("could not serialize sync");
            return;
        };

        let sent = self.io.send_sync(&self.packet_buffer[..length]);
        match sent {
            Ok(tx) => {
                bump(&mut self.statistics.sync_tx);
                self.send_failures = 0;
                if state.default_ds.two_step {
                    match self.resolve_tx_timestamp(tx, sequence_id) {
                        Some(origin) => self.send_follow_up(state, sequence_id, origin),
                        None => log::warn!("sync follow-up skipped, no transmit timestamp"),
                    }
                }
            }
            Err(error) => self.note_send_failure("sync", error),
        }
    }

    fn send_follow_up(&mut self, state: &InstanceState, sequence_id: u16, origin: Time) {
        let message =
            Message::follow_up(&state.default_ds, self.port_identity, sequence_id, origin);
        let Ok(length) = message.serialize(&mut self.packet_buffer) else {
            log::error!("could not serialize follow-up");
            return;
        };
        match self.io.send_follow_up(&self.packet_buffer[..length]) {
            Ok(()) => {
                bump(&mut self.statistics.follow_up_tx);
                self.send_failures = 0;
            }
            Err(error) => self.note_send_failure("follow-up", error),
        }
    }

    fn send_delay_request(&mut self, state: &InstanceState) {
        let sequence_id = self.delay_req_seq_ids.generate();
        let message = Message::delay_req(&state.default_ds, self.port_identity, sequence_id);
        let Ok(length) = message.serialize(&mut self.packet_buffer) else {
            log::error!("could not serialize delay request");
            return;
        };

        match self.io.send_delay_req(&self.packet_buffer[..length]) {
            Ok(tx) => {
                bump(&mut self.statistics.delay_req_tx);
                self.send_failures = 0;
                if let Some(send_time) = self.resolve_tx_timestamp(tx, sequence_id) {
                    self.sync.delay_req_sent(sequence_id, send_time);
                }
            }
            Err(error) => self.note_send_failure("delay request", error),
        }
    }

    fn send_pdelay_request(&mut self, state: &InstanceState) {
        let sequence_id = self.pdelay_req_seq_ids.generate();
        let message = Message::pdelay_req(&state.default_ds, self.port_identity, sequence_id);
        let Ok(length) = message.serialize(&mut self.packet_buffer) else {
            log::error!("could not serialize pdelay request");
            return;
        };

        match self.io.send_pdelay_req(&self.packet_buffer[..length]) {
            Ok(tx) => {
                bump(&mut self.statistics.pdelay_tx);
                self.send_failures = 0;
                if let Some(send_time) = self.resolve_tx_timestamp(tx, sequence_id) {
                    self.sync.pdelay_req_sent(sequence_id, send_time);
                }
            }
            Err(error) => self.note_send_failure("pdelay request", error),
        }
    }

    /// Re-originate a sync out of this master port on behalf of the
    /// boundary clock. Returns the sequence id used and the transmit time
    /// (falling back to `now` when no capture is available).
    pub(crate) fn forward_sync(
        &mut self,
        state: &InstanceState,
        now: Time,
    ) -> Option<(u16, Time)> {
        if self.state != PortState::Master {
            return None;
        }

        let sequence_id = self.sync_seq_ids.generate();
        let mut message = Message::sync(&state.default_ds, self.port_identity, sequence_id);
        // forwarded origin timestamps always travel in the follow-up
        message.header.two_step_flag = true;
        let Ok(length) = message.serialize(&mut self.packet_buffer) else {
            log::error!("could not serialize forwarded sync");
            return None;
        };

        match self.io.send_sync(&self.packet_buffer[..length]) {
            Ok(tx) => {
                bump(&mut self.statistics.sync_tx);
                self.send_failures = 0;
                let tx_time = self.resolve_tx_timestamp(tx, sequence_id).unwrap_or(now);
                Some((sequence_id, tx_time))
            }
            Err(error) => {
                self.note_send_failure("forwarded sync", error);
                None
            }
        }
    }

    /// The follow-up for a forwarded sync: the upstream precise origin with
    /// the accumulated correction (upstream corrections plus local
    /// residence time).
    pub(crate) fn forward_follow_up(
        &mut self,
        state: &InstanceState,
        sequence_id: u16,
        precise_origin: WireTimestamp,
        correction: TimeInterval,
    ) {
        let mut message = Message::follow_up(
            &state.default_ds,
            self.port_identity,
            sequence_id,
            Time::from(precise_origin),
        );
        message.header.correction_field = correction;

        let Ok(length) = message.serialize(&mut self.packet_buffer) else {
            log::error!("could not serialize forwarded follow-up");
            return;
        };
        match self.io.send_follow_up(&self.packet_buffer[..length]) {
            Ok(()) => {
                bump(&mut self.statistics.follow_up_tx);
                self.send_failures = 0;
            }
            Err(error) => self.note_send_failure("forwarded follow-up", error),
        }
    }

    /// The host either returned the timestamp from the send call or serves
    /// it from its capture queue.
    fn resolve_tx_timestamp(&mut self, immediate: Option<Time>, sequence_id: u16) -> Option<Time> {
        if immediate.is_some() {
            return immediate;
        }
        match self.io.get_tx_timestamp(sequence_id) {
            Ok(timestamp) => Some(timestamp),
            Err(error) => {
                log::warn!("transmit timestamp unavailable: {error:?}");
                bump(&mut self.statistics.timestamp_unavailable);
                None
            }
        }
    }

    fn note_send_failure(&mut self, what: &str, error: P::Error) {
        log::warn!("port {}: failed to send {what}: {error:?}", self.port_identity);
        bump(&mut self.statistics.send_failures);
        self.send_failures = self.send_failures.saturating_add(1);
        if self.send_failures >= SEND_FAILURE_BUDGET {
            // timers carry a valid "now" only inside tick; a fault entered
            // from the send path needs no timer, so zero is fine here
            self.fault("transmit failure budget exhausted", Time::default());
        }
    }

    fn count_discard(&mut self, discard: Discard) {
        match discard {
            Discard::Correlation(PtpError::UnknownSource) => {
                bump(&mut self.statistics.unknown_source_discards)
            }
            Discard::Correlation(_) => bump(&mut self.statistics.sequence_mismatches),
            Discard::NegativeDelay => bump(&mut self.statistics.negative_delay_count),
        }
    }
}

#[cfg(any(test, feature = "test-utils"))]
impl<P: PortIo, R: Rng> Port<P, R> {
    /// Force the port into a state, bypassing the transition rules.
    pub fn set_state_for_test(&mut self, state: PortState) {
        self.state = state;
    }

    /// Deliver a timed event directly, bypassing the deadline bookkeeping.
    pub fn inject_event_for_test(&mut self, event: PortEvent, now: Time) {
        match event {
            PortEvent::AnnounceReceiptTimeout => {
                self.on_announce_receipt_timeout(now);
            }
            PortEvent::SyncReceiptTimeout => self.on_sync_receipt_timeout(now),
            PortEvent::QualificationTimeout => {
                if self.state == PortState::PreMaster {
                    self.qualification_deadline = None;
                    self.set_state(PortState::Master, now);
                }
            }
            PortEvent::Fault => self.fault("injected fault", now),
        }
    }
}

fn deadline_passed(deadline: Option<Time>, now: Time) -> bool {
    matches!(deadline, Some(deadline) if now >= deadline)
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc, vec::Vec};

    use rand::rngs::mock::StepRng;

    use super::*;
    use crate::{
        config::{ClockIdentity, InstanceConfig},
        datastructures::common::WireTimestamp,
        datastructures::datasets::TimePropertiesDS,
        time::Interval,
    };

    #[derive(Debug, Default)]
    struct IoLog {
        frames: Vec<Vec<u8>>,
        faults: Vec<std::string::String>,
        transitions: Vec<(PortState, PortState)>,
    }

    #[derive(Debug, Clone, Default)]
    struct RecordingIo {
        log: Rc<RefCell<IoLog>>,
        fail_sends: bool,
    }

    impl RecordingIo {
        fn push(&mut self, data: &[u8]) -> Result<(), &'static str> {
            if self.fail_sends {
                return Err("link down");
            }
            self.log.borrow_mut().frames.push(data.to_vec());
            Ok(())
        }
    }

    impl PortIo for RecordingIo {
        type Error = &'static str;

        fn send_announce(&mut self, data: &[u8]) -> Result<(), Self::Error> {
            self.push(data)
        }
        fn send_sync(&mut self, data: &[u8]) -> Result<Option<Time>, Self::Error> {
            self.push(data)?;
            Ok(Some(Time::from_nanos(1)))
        }
        fn send_follow_up(&mut self, data: &[u8]) -> Result<(), Self::Error> {
            self.push(data)
        }
        fn send_delay_req(&mut self, data: &[u8]) -> Result<Option<Time>, Self::Error> {
            self.push(data)?;
            Ok(Some(Time::from_nanos(1)))
        }
        fn send_delay_resp(&mut self, data: &[u8]) -> Result<(), Self::Error> {
            self.push(data)
        }
        fn send_pdelay_req(&mut self, data: &[u8]) -> Result<Option<Time>, Self::Error> {
            self.push(data)?;
            Ok(Some(Time::from_nanos(1)))
        }
        fn send_pdelay_resp(&mut self, data: &[u8]) -> Result<Option<Time>, Self::Error> {
            self.push(data)?;
            Ok(Some(Time::from_nanos(1)))
        }
        fn send_pdelay_resp_follow_up(&mut self, data: &[u8]) -> Result<(), Self::Error> {
            self.push(data)
        }
        fn get_tx_timestamp(&mut self, _sequence_id: u16) -> Result<Time, Self::Error> {
            Ok(Time::from_nanos(1))
        }
        fn on_state_change(&mut self, old: PortState, new: PortState) {
            self.log.borrow_mut().transitions.push((old, new));
        }
        fn on_fault(&mut self, reason: &str) {
            self.log.borrow_mut().faults.push(reason.into());
        }
    }

    fn test_state() -> InstanceState {
        InstanceState::new(
            InstanceConfig::with_identity(ClockIdentity([0xAA; 8])),
            TimePropertiesDS::default(),
        )
    }

    fn test_port(config: PortConfig, slave_only: bool) -> (Port<RecordingIo, StepRng>, Rc<RefCell<IoLog>>) {
        let io = RecordingIo::default();
        let log = io.log.clone();
        let port = Port::new(
            config,
            io,
            StepRng::new(0, 1),
            PortIdentity {
                clock_identity: ClockIdentity([0xAA; 8]),
                port_number: 1,
            },
            slave_only,
        )
        .unwrap();
        (port, log)
    }

    #[test]
    fn initializes_to_listening_or_disabled() {
        let (mut port, _) = test_port(PortConfig::default(), false);
        assert_eq!(port.state(), PortState::Initializing);
        port.initialize(Time::from_secs(1));
        assert_eq!(port.state(), PortState::Listening);

        let disabled = PortConfig {
            enabled: false,
            ..Default::default()
        };
        let (mut port, _) = test_port(disabled, false);
        port.initialize(Time::from_secs(1));
        assert_eq!(port.state(), PortState::Disabled);
    }

    #[test]
    fn rejects_out_of_range_configuration() {
        let config = PortConfig {
            sync_interval: Interval::from_log_2(5),
            ..Default::default()
        };
        assert!(matches!(
            Port::<RecordingIo, StepRng>::new(
                config,
                RecordingIo::default(),
                StepRng::new(0, 1),
                PortIdentity::default(),
                false,
            ),
            Err(PtpError::InvalidParameter)
        ));
    }

    #[test]
    fn listening_qualifies_to_master_without_other_masters() {
        let state = test_state();
        let (mut port, log) = test_port(PortConfig::default(), false);
        port.initialize(Time::from_secs(1));

        // default config: 6s announce receipt, 2s qualification
        port.tick(Time::from_secs(7), &state);
        assert_eq!(port.state(), PortState::PreMaster);
        port.tick(Time::from_secs(8), &state);
        assert_eq!(port.state(), PortState::PreMaster);
        port.tick(Time::from_secs(9), &state);
        assert_eq!(port.state(), PortState::Master);

        // master duties ran immediately: announce + sync + follow-up
        assert!(log.borrow().frames.len() >= 3);
        assert_eq!(port.statistics().announce_tx, 1);
        assert_eq!(port.statistics().sync_tx, 1);
        assert_eq!(port.statistics().follow_up_tx, 1);
    }

    #[test]
    fn slave_only_port_keeps_listening() {
        let state = test_state();
        let (mut port, _) = test_port(PortConfig::default(), true);
        port.initialize(Time::from_secs(1));

        for second in 2..30 {
            port.tick(Time::from_secs(second), &state);
        }
        assert_eq!(port.state(), PortState::Listening);
    }

    #[test]
    fn three_send_failures_fault_the_port() {
        let state = test_state();
        let io = RecordingIo {
            fail_sends: true,
            ..Default::default()
        };
        let log = io.log.clone();
        let mut port = Port::new(
            PortConfig::default(),
            io,
            StepRng::new(0, 1),
            PortIdentity::default(),
            false,
        )
        .unwrap();
        port.initialize(Time::from_secs(1));

        // qualify into master with nobody else on the segment
        port.tick(Time::from_secs(7), &state);
        port.tick(Time::from_secs(9), &state);
        assert_eq!(port.state(), PortState::Master);

        // the initial announce and sync both failed; the next duty is the
        // third consecutive failure
        port.tick(Time::from_secs(10), &state);
        assert_eq!(port.state(), PortState::Faulty);
        assert_eq!(
            log.borrow().faults.as_slice(),
            ["transmit failure budget exhausted"]
        );
        assert!(port.statistics().send_failures >= 3);

        // faulty ports run no duties
        let frames_before = log.borrow().frames.len();
        port.tick(Time::from_secs(30), &state);
        assert_eq!(log.borrow().frames.len(), frames_before);

        // initialize() is the only way out
        port.initialize(Time::from_secs(40));
        assert_eq!(port.state(), PortState::Listening);
    }

    #[test]
    fn mismatched_delay_resp_is_counted() {
        let (mut port, _) = test_port(PortConfig::default(), false);
        port.initialize(Time::from_secs(1));
        port.set_state_for_test(PortState::Uncalibrated);

        let header = Header {
            sequence_id: 3,
            ..Default::default()
        };
        let response = DelayRespMessage {
            receive_timestamp: WireTimestamp::default(),
            requesting_port_identity: PortIdentity {
                clock_identity: ClockIdentity([0x55; 8]),
                port_number: 9,
            },
        };
        assert!(port.handle_delay_resp(&header, &response).is_none());
        assert_eq!(port.statistics().delay_resp_mismatch, 1);
    }

    #[test]
    fn master_answers_delay_requests() {
        let (mut port, log) = test_port(PortConfig::default(), false);
        port.initialize(Time::from_secs(1));
        port.set_state_for_test(PortState::Master);

        let request_header = Header {
            source_port_identity: PortIdentity {
                clock_identity: ClockIdentity([0x77; 8]),
                port_number: 2,
            },
            sequence_id: 11,
            ..Default::default()
        };
        port.handle_delay_req(&request_header, Time::from_nanos(5_000));

        let frames = &log.borrow().frames;
        assert_eq!(frames.len(), 1);
        let response = Message::deserialize(&frames[0]).unwrap();
        let MessageBody::DelayResp(body) = response.body else {
            panic!("expected a delay response");
        };
        assert_eq!(
            body.requesting_port_identity,
            request_header.source_port_identity
        );
        assert_eq!(response.header.sequence_id, 11);
        assert_eq!(port.statistics().delay_resp_tx, 1);
    }

    #[test]
    fn p2p_port_paces_pdelay_requests() {
        let state = test_state();
        let config = PortConfig {
            delay_mechanism: DelayMechanism::P2P {
                interval: Interval::ONE_SECOND,
            },
            ..Default::default()
        };
        let (mut port, log) = test_port(config, false);
        port.initialize(Time::from_secs(1));
        port.set_state_for_test(PortState::Uncalibrated);
        port.arm_slave_timers(Time::from_secs(1));

        port.tick(Time::from_secs(2), &state);

        let frames = &log.borrow().frames;
        let request = frames
            .iter()
            .find_map(|frame| {
                let message = Message::deserialize(frame).unwrap();
                matches!(message.body, MessageBody::PDelayReq(_)).then_some(message)
            })
            .expect("expected a pdelay request");
        assert_eq!(request.header.log_message_interval, 0x7F);
        assert_eq!(port.statistics().pdelay_tx, 1);
    }

    #[test]
    fn pdelay_responder_sends_response_and_follow_up() {
        let state = test_state();
        let (mut port, log) = test_port(PortConfig::default(), false);
        port.initialize(Time::from_secs(1));

        let request_header = Header {
            source_port_identity: PortIdentity {
                clock_identity: ClockIdentity([0x66; 8]),
                port_number: 3,
            },
            sequence_id: 21,
            ..Default::default()
        };
        port.handle_pdelay_req(&request_header, Time::from_nanos(9_000), &state);

        let frames = &log.borrow().frames;
        assert_eq!(frames.len(), 2);

        let response = Message::deserialize(&frames[0]).unwrap();
        let MessageBody::PDelayResp(body) = response.body else {
            panic!("expected a pdelay response");
        };
        assert!(response.header.two_step_flag);
        assert_eq!(response.header.sequence_id, 21);
        assert_eq!(
            body.requesting_port_identity,
            request_header.source_port_identity
        );

        let follow_up = Message::deserialize(&frames[1]).unwrap();
        let MessageBody::PDelayRespFollowUp(body) = follow_up.body else {
            panic!("expected a pdelay response follow-up");
        };
        assert_eq!(follow_up.header.sequence_id, 21);
        assert_eq!(
            body.requesting_port_identity,
            request_header.source_port_identity
        );
    }

    #[test]
    fn announce_timeout_drops_parent_for_slave() {
        let (mut port, log) = test_port(PortConfig::default(), false);
        port.initialize(Time::from_secs(1));
        port.set_state_for_test(PortState::Slave);

        port.inject_event_for_test(PortEvent::AnnounceReceiptTimeout, Time::from_secs(10));
        assert_eq!(port.state(), PortState::Listening);
        assert_eq!(port.statistics().announce_timeouts, 1);
        assert!(log
            .borrow()
            .transitions
            .contains(&(PortState::Slave, PortState::Listening)));
    }

    #[test]
    fn sync_timeout_restarts_calibration() {
        let (mut port, _) = test_port(PortConfig::default(), false);
        port.initialize(Time::from_secs(1));
        port.set_state_for_test(PortState::Slave);

        port.inject_event_for_test(PortEvent::SyncReceiptTimeout, Time::from_secs(10));
        assert_eq!(port.state(), PortState::Uncalibrated);
        assert_eq!(port.statistics().sync_timeouts, 1);
    }
}
