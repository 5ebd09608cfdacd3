//! A PTP clock instance: the data sets, the multi-port router, and the
//! glue between election, synchronization, and the clock servo.
//!
//! The host drives the instance with [`process_message`](BoundaryClock::process_message)
//! for every received packet and [`tick`](BoundaryClock::tick) for the
//! passage of time; everything else happens through the capability traits.

use core::cmp::Ordering;

use arrayvec::ArrayVec;
use rand::Rng;

use crate::{
    bmc::bmca::{BestAnnounce, Bmca},
    clock::Clock,
    config::{DelayMechanism, InstanceConfig, PortConfig},
    coordinator::{
        BmcaCoordinator, BmcaStatistics, FlowStatistics, MessageFlowCoordinator, SyncCoordinator,
        SyncStatistics,
    },
    datastructures::{
        common::{PortIdentity, TimeInterval, WireTimestamp},
        datasets::{CurrentDS, DefaultDS, ParentDS, TimePropertiesDS},
        messages::{AnnounceMessage, Header, Message, MessageBody, SyncMessage},
    },
    error::PtpError,
    port::{DecisionOutcome, Port, PortIo, PortState},
    servo::{Servo, ServoAction, ServoCoordinator, ServoState},
    sync::Measurement,
    time::{Duration, Time},
};

/// The maximum number of ports of one boundary clock
pub const MAX_PORTS: usize = 8;

/// The data sets of one clock. Ports borrow this; only the instance
/// mutates it.
#[derive(Debug, Clone)]
pub struct InstanceState {
    pub default_ds: DefaultDS,
    pub current_ds: CurrentDS,
    pub parent_ds: ParentDS,
    pub time_properties_ds: TimePropertiesDS,
    /// The host-configured properties, restored whenever this clock is its
    /// own grandmaster
    local_time_properties: TimePropertiesDS,
}

impl InstanceState {
    pub(crate) fn new(config: InstanceConfig, time_properties_ds: TimePropertiesDS) -> Self {
        let default_ds = DefaultDS::new(config);
        Self {
            default_ds,
            current_ds: CurrentDS::default(),
            parent_ds: ParentDS::new(default_ds),
            time_properties_ds,
            local_time_properties: time_properties_ds,
        }
    }

    /// Decision code S1: adopt the announced grandmaster as parent.
    pub(crate) fn adopt_parent(&mut self, announce: &AnnounceMessage) {
        self.current_ds.steps_removed = announce.steps_removed + 1;

        self.parent_ds.parent_port_identity = announce.header.source_port_identity;
        self.parent_ds.grandmaster_identity = announce.grandmaster_identity;
        self.parent_ds.grandmaster_clock_quality = announce.grandmaster_clock_quality;
        self.parent_ds.grandmaster_priority_1 = announce.grandmaster_priority_1;
        self.parent_ds.grandmaster_priority_2 = announce.grandmaster_priority_2;

        self.time_properties_ds = announce.time_properties();
    }

    /// Decision codes M1/M2: this clock is the grandmaster again.
    pub(crate) fn become_own_grandmaster(&mut self) {
        self.current_ds.steps_removed = 0;
        self.current_ds.offset_from_master = Duration::ZERO;
        self.current_ds.mean_path_delay = Duration::ZERO;
        self.parent_ds = ParentDS::new(self.default_ds);
        self.time_properties_ds = self.local_time_properties;
    }
}

/// A sync awaiting its follow-up that was already forwarded downstream
#[derive(Debug, Clone)]
struct ForwardContext {
    upstream_sequence_id: u16,
    upstream_source: PortIdentity,
    sync_correction: TimeInterval,
    entries: ArrayVec<ForwardEntry, MAX_PORTS>,
}

#[derive(Debug, Clone, Copy)]
struct ForwardEntry {
    port_index: usize,
    sequence_id: u16,
    residence: Duration,
}

/// A multi-port PTP clock sharing one local clock.
///
/// With a single port this is an ordinary clock; with several it is a
/// boundary clock that is slave towards (at most) one port's master and
/// master towards the others, re-announcing and re-originating time
/// downstream.
///
/// Generic over the per-port I/O capability `P`, the local clock `C`, the
/// servo controller `S`, and the random source `R`.
#[derive(Debug)]
pub struct BoundaryClock<P, C, S, R> {
    state: InstanceState,
    ports: ArrayVec<Port<P, R>, MAX_PORTS>,
    clock: C,
    servo: ServoCoordinator<S>,
    bmca_coordinator: BmcaCoordinator,
    sync_coordinator: SyncCoordinator,
    flow: MessageFlowCoordinator,
    slave_port: Option<usize>,
    forward: Option<ForwardContext>,
    last_tick: Option<Time>,
}

impl<P: PortIo, C: Clock, S: Servo, R: Rng> BoundaryClock<P, C, S, R> {
    pub fn new(
        config: InstanceConfig,
        time_properties_ds: TimePropertiesDS,
        clock: C,
        servo: ServoCoordinator<S>,
    ) -> Self {
        Self {
            state: InstanceState::new(config, time_properties_ds),
            ports: ArrayVec::new(),
            clock,
            servo,
            bmca_coordinator: BmcaCoordinator::default(),
            sync_coordinator: SyncCoordinator::default(),
            flow: MessageFlowCoordinator::new(),
            slave_port: None,
            forward: None,
            last_tick: None,
        }
    }

    /// Add a port; returns its port number (1-based). Fails with
    /// [`InvalidParameter`](PtpError::InvalidParameter) when the port
    /// configuration is out of range or all port slots are taken.
    pub fn add_port(&mut self, config: PortConfig, io: P, rng: R) -> Result<u16, PtpError> {
        if self.ports.is_full() {
            return Err(PtpError::InvalidParameter);
        }
        let port_number = self.ports.len() as u16 + 1;
        let port_identity = PortIdentity {
            clock_identity: self.state.default_ds.clock_identity,
            port_number,
        };
        let port = Port::new(
            config,
            io,
            rng,
            port_identity,
            self.state.default_ds.slave_only,
        )?;
        self.ports.push(port);
        self.state.default_ds.number_of_ports = self.ports.len() as u16;
        Ok(port_number)
    }

    /// (Re-)initialize every port and restart the coordinators. The data
    /// sets are rebuilt from configuration; nothing is persisted.
    pub fn initialize(&mut self, now: Time) {
        for port in &mut self.ports {
            port.initialize(now);
        }
        self.state.become_own_grandmaster();
        self.slave_port = None;
        self.forward = None;
        self.last_tick = None;
        self.servo.reset();
        let _ = self.bmca_coordinator.stop();
        let _ = self.bmca_coordinator.start();
        let _ = self.sync_coordinator.stop();
        let _ = self.sync_coordinator.start();
        self.flow.reset();
    }

    /// Re-initialize a single faulted port.
    pub fn initialize_port(&mut self, port_number: u16, now: Time) -> Result<(), PtpError> {
        let index = self
            .port_index(port_number)
            .ok_or(PtpError::InvalidPortNumber)?;
        if Some(index) == self.slave_port {
            self.lose_reference(index, now);
        }
        self.ports[index].initialize(now);
        Ok(())
    }

    // === message path ===================================================

    /// Feed one received packet into the engine.
    ///
    /// `rx_timestamp` is the capture time of the packet on the local
    /// timescale. Malformed or mismatched messages are counted and dropped;
    /// only an unknown `port_number` is an error.
    pub fn process_message(
        &mut self,
        port_number: u16,
        buffer: &[u8],
        rx_timestamp: Time,
    ) -> Result<(), PtpError> {
        let index = self
            .port_index(port_number)
            .ok_or(PtpError::InvalidPortNumber)?;

        if self.ports[index].state() == PortState::Faulty {
            // a faulty port accepts nothing until re-initialized
            return Ok(());
        }

        let message = match Message::deserialize(buffer) {
            Ok(message) => message,
            Err(error) => {
                log::debug!("dropping malformed message: {error:?}");
                self.ports[index].note_validation_error();
                self.flow.note_validation_drop();
                return Ok(());
            }
        };

        let Message {
            header,
            body,
            suffix,
        } = message;

        if header.domain_number != self.state.default_ds.domain_number
            || header.sdo_id != self.state.default_ds.sdo_id
        {
            self.ports[index].note_domain_mismatch();
            self.flow.note_domain_drop();
            return Ok(());
        }

        self.flow.note_routed(&body);

        match body {
            MessageBody::Announce(announce) => {
                let registered = self.ports[index].handle_announce(&announce, rx_timestamp);
                if registered {
                    if Some(index) == self.slave_port
                        && self.ports[index].remote_master()
                            == Some(announce.header.source_port_identity)
                    {
                        self.state.adopt_parent(&announce);
                        if let Err(error) =
                            self.clock.set_properties(&self.state.time_properties_ds)
                        {
                            log::warn!("could not update clock properties: {error:?}");
                        }
                    }
                    if self.bmca_coordinator.run_on_announce() {
                        self.execute_bmca(rx_timestamp);
                    }
                }
            }
            MessageBody::Sync(sync) => {
                let measurement = self.ports[index].handle_sync(&header, &sync, rx_timestamp);
                if let Some(measurement) = measurement {
                    self.apply_measurement(index, measurement, rx_timestamp);
                }
                if Some(index) == self.slave_port {
                    self.forward_sync_downstream(index, &header, &sync, rx_timestamp);
                }
            }
            MessageBody::FollowUp(follow_up) => {
                let measurement = self.ports[index].handle_follow_up(&header, &follow_up);
                if let Some(measurement) = measurement {
                    self.apply_measurement(index, measurement, rx_timestamp);
                }
                if Some(index) == self.slave_port {
                    self.forward_follow_up_downstream(&header, follow_up.precise_origin_timestamp);
                }
            }
            MessageBody::DelayReq(_) => {
                self.ports[index].handle_delay_req(&header, rx_timestamp);
            }
            MessageBody::DelayResp(delay_resp) => {
                let measurement = self.ports[index].handle_delay_resp(&header, &delay_resp);
                if let Some(measurement) = measurement {
                    self.apply_measurement(index, measurement, rx_timestamp);
                }
            }
            MessageBody::PDelayReq(_) => {
                self.ports[index].handle_pdelay_req(&header, rx_timestamp, &self.state);
            }
            MessageBody::PDelayResp(pdelay_resp) => {
                self.ports[index].handle_pdelay_resp(&header, &pdelay_resp, rx_timestamp);
            }
            MessageBody::PDelayRespFollowUp(pdelay_follow_up) => {
                self.ports[index].handle_pdelay_resp_follow_up(&header, &pdelay_follow_up);
            }
            MessageBody::Signaling(_) => {
                self.ports[index].note_signaling();
                self.flow.note_signaling_tlvs(suffix.tlv());
            }
            MessageBody::Management(_) => {
                // management processing is out of scope; counted and dropped
                self.ports[index].note_management();
            }
        }

        Ok(())
    }

    // === time path ======================================================

    /// Advance the engine to `now`: run every port's timers and duties, the
    /// periodic election, and the health classification.
    ///
    /// `now` must be monotonic; a regression faults every port.
    pub fn tick(&mut self, now: Time) -> Result<(), PtpError> {
        if let Some(last) = self.last_tick {
            if now < last {
                log::error!("time regressed from {last} to {now}");
                for port in &mut self.ports {
                    port.fault("monotonic time regression", now);
                }
                return Err(PtpError::Fault);
            }
        }
        self.last_tick = Some(now);

        for index in 0..self.ports.len() {
            let outcome = self.ports[index].tick(now, &self.state);
            if outcome.parent_timeout && Some(index) == self.slave_port {
                self.lose_reference(index, now);
            }
        }

        if self.bmca_coordinator.should_run(now) {
            self.execute_bmca(now);
        }

        self.sync_coordinator.tick(now);

        Ok(())
    }

    /// Run the election across all ports, on demand.
    pub fn execute_bmca(&mut self, now: Time) {
        // age out foreign masters before anything compares them
        for index in 0..self.ports.len() {
            let parent_lost = self.ports[index].prune_foreign_masters(now);
            if parent_lost && Some(index) == self.slave_port {
                self.lose_reference(index, now);
            }
        }

        let mut erbests: ArrayVec<Option<BestAnnounce>, MAX_PORTS> = ArrayVec::new();
        for port in &self.ports {
            erbests.push(port.erbest());
        }

        let mut ebest: Option<BestAnnounce> = None;
        for candidate in erbests.iter().flatten() {
            ebest = match ebest {
                None => Some(*candidate),
                Some(current) => {
                    if candidate.compare(&current) == Ordering::Greater {
                        Some(*candidate)
                    } else {
                        Some(current)
                    }
                }
            };
        }

        let foreign_total: usize = self
            .ports
            .iter()
            .map(|port| port.foreign_master_count())
            .sum();

        for index in 0..self.ports.len() {
            let recommendation = Bmca::recommended_state(
                &self.state.default_ds,
                ebest.as_ref(),
                erbests[index].as_ref(),
                self.ports[index].state(),
            );
            let Some(recommendation) = recommendation else {
                continue;
            };

            match self.ports[index].apply_recommended_state(&recommendation, now) {
                DecisionOutcome::Unchanged => {}
                DecisionOutcome::BecameMaster => {
                    self.bmca_coordinator.record_role_change(now);
                    self.bmca_coordinator.record_selection(true, false, false);
                    if Some(index) == self.slave_port {
                        self.lose_reference(index, now);
                    }
                    if self.slave_port.is_none() {
                        self.state.become_own_grandmaster();
                    }
                }
                DecisionOutcome::BecameSlave(announce) => {
                    self.bmca_coordinator.record_role_change(now);
                    self.bmca_coordinator.record_selection(false, true, false);
                    if self.state.parent_ds.parent_port_identity
                        != announce.header.source_port_identity
                    {
                        self.bmca_coordinator.record_parent_change();
                    }
                    self.slave_port = Some(index);
                    self.state.adopt_parent(&announce);
                    if let Err(error) = self.clock.set_properties(&self.state.time_properties_ds)
                    {
                        log::warn!("could not update clock properties: {error:?}");
                    }
                    self.servo.reference_changed(now);
                }
                DecisionOutcome::BecamePassive => {
                    self.bmca_coordinator.record_role_change(now);
                    self.bmca_coordinator.record_selection(false, false, true);
                    if Some(index) == self.slave_port {
                        self.lose_reference(index, now);
                    }
                }
                DecisionOutcome::BecameListening => {
                    self.bmca_coordinator.record_role_change(now);
                    if Some(index) == self.slave_port {
                        self.lose_reference(index, now);
                    }
                }
            }
        }

        self.bmca_coordinator.record_execution(now, foreign_total);
    }

    // === queries ========================================================

    pub fn has_master_port(&self) -> bool {
        self.ports.iter().any(|port| port.state() == PortState::Master)
    }

    pub fn has_slave_port(&self) -> bool {
        self.ports.iter().any(|port| port.state().is_slave_like())
    }

    /// Whether a port completed calibration and receives time
    pub fn is_synchronized(&self) -> bool {
        self.ports.iter().any(|port| port.state() == PortState::Slave)
    }

    /// Look up a port by its 1-based number
    pub fn get_port(&self, port_number: u16) -> Option<&Port<P, R>> {
        self.port_index(port_number).map(|index| &self.ports[index])
    }

    pub fn default_ds(&self) -> &DefaultDS {
        &self.state.default_ds
    }

    pub fn current_ds(&self) -> &CurrentDS {
        &self.state.current_ds
    }

    pub fn parent_ds(&self) -> &ParentDS {
        &self.state.parent_ds
    }

    pub fn time_properties_ds(&self) -> &TimePropertiesDS {
        &self.state.time_properties_ds
    }

    pub fn servo_state(&self) -> ServoState {
        self.servo.state()
    }

    pub fn servo(&self) -> &ServoCoordinator<S> {
        &self.servo
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn bmca_statistics(&self) -> BmcaStatistics {
        self.bmca_coordinator.get_statistics()
    }

    pub fn sync_statistics(&self) -> SyncStatistics {
        self.sync_coordinator.get_statistics()
    }

    pub fn flow_statistics(&self) -> FlowStatistics {
        self.flow.get_statistics()
    }

    pub fn bmca_coordinator_mut(&mut self) -> &mut BmcaCoordinator {
        &mut self.bmca_coordinator
    }

    pub fn sync_coordinator_mut(&mut self) -> &mut SyncCoordinator {
        &mut self.sync_coordinator
    }

    pub fn sync_coordinator(&self) -> &SyncCoordinator {
        &self.sync_coordinator
    }

    // === internals ======================================================

    fn port_index(&self, port_number: u16) -> Option<usize> {
        if port_number == 0 || port_number as usize > self.ports.len() {
            return None;
        }
        Some(port_number as usize - 1)
    }

    /// The slave reference on `index` went away.
    fn lose_reference(&mut self, index: usize, now: Time) {
        if self.slave_port != Some(index) {
            return;
        }
        self.slave_port = None;
        self.servo.reference_lost(now);
        self.state.become_own_grandmaster();
    }

    fn apply_measurement(&mut self, index: usize, measurement: Measurement, now: Time) {
        self.state.current_ds.offset_from_master = measurement.offset;
        self.state.current_ds.mean_path_delay = measurement.mean_path_delay;

        let peer_to_peer = matches!(
            self.ports[index].config().delay_mechanism,
            DelayMechanism::P2P { .. }
        );
        self.sync_coordinator
            .record_sample(measurement.offset, measurement.mean_path_delay, peer_to_peer);

        if Some(index) != self.slave_port {
            return;
        }

        if self.ports[index].maybe_promote_to_slave(now) {
            log::info!("port {} calibrated", self.ports[index].port_identity());
        }

        match self.servo.discipline(measurement.offset, now) {
            ServoAction::None => {}
            ServoAction::Step(step) => {
                if let Err(error) = self.clock.step_clock(step) {
                    log::error!("clock step failed: {error:?}");
                    self.sync_coordinator.record_clock_adjust_failure();
                }
            }
            ServoAction::AdjustFrequency(delta_ppb) => {
                if let Err(error) = self.clock.adjust_frequency(delta_ppb) {
                    log::error!("frequency adjustment failed: {error:?}");
                    self.sync_coordinator.record_clock_adjust_failure();
                }
            }
        }
    }

    /// Re-originate a sync received on the slave port out of every master
    /// port, remembering the residence per port for the follow-up.
    fn forward_sync_downstream(
        &mut self,
        slave_index: usize,
        header: &Header,
        sync: &SyncMessage,
        rx_timestamp: Time,
    ) {
        let mut entries: ArrayVec<ForwardEntry, MAX_PORTS> = ArrayVec::new();
        for index in 0..self.ports.len() {
            if index == slave_index || self.ports[index].state() != PortState::Master {
                continue;
            }
            if let Some((sequence_id, tx_time)) =
                self.ports[index].forward_sync(&self.state, rx_timestamp)
            {
                entries.push(ForwardEntry {
                    port_index: index,
                    sequence_id,
                    residence: tx_time - rx_timestamp,
                });
            }
        }

        if entries.is_empty() {
            self.forward = None;
            return;
        }

        if header.two_step_flag {
            self.forward = Some(ForwardContext {
                upstream_sequence_id: header.sequence_id,
                upstream_source: header.source_port_identity,
                sync_correction: header.correction_field,
                entries,
            });
        } else {
            // one-step upstream: the origin is already in the sync itself
            for entry in &entries {
                let correction = header
                    .correction_field
                    .saturating_add(TimeInterval::from(entry.residence));
                self.ports[entry.port_index].forward_follow_up(
                    &self.state,
                    entry.sequence_id,
                    sync.origin_timestamp,
                    correction,
                );
            }
            self.forward = None;
        }
    }

    fn forward_follow_up_downstream(&mut self, header: &Header, precise_origin: WireTimestamp) {
        let Some(context) = self.forward.take() else {
            return;
        };
        if context.upstream_sequence_id != header.sequence_id
            || context.upstream_source != header.source_port_identity
        {
            self.forward = Some(context);
            return;
        }

        for entry in &context.entries {
            let correction = header
                .correction_field
                .saturating_add(context.sync_correction)
                .saturating_add(TimeInterval::from(entry.residence));
            self.ports[entry.port_index].forward_follow_up(
                &self.state,
                entry.sequence_id,
                precise_origin,
                correction,
            );
        }
    }
}

#[cfg(any(test, feature = "test-utils"))]
impl<P: PortIo, C: Clock, S: Servo, R: Rng> BoundaryClock<P, C, S, R> {
    /// Mutable port access for host test suites.
    pub fn get_port_mut(&mut self, port_number: u16) -> Option<&mut Port<P, R>> {
        let index = self.port_index(port_number)?;
        Some(&mut self.ports[index])
    }
}

#[cfg(test)]
mod tests {
    use std::{
        cell::{Cell, RefCell},
        rc::Rc,
        vec::Vec,
    };

    use rand::rngs::mock::StepRng;

    use super::*;
    use crate::{
        config::ClockIdentity,
        datastructures::{
            common::{ClockQuality, TlvSet, WireTimestamp},
            messages::{FollowUpMessage, MAX_DATA_LEN},
        },
        servo::{PiServo, ServoConfig},
    };

    type Outbox = Rc<RefCell<Vec<Vec<u8>>>>;

    #[derive(Debug, Clone)]
    struct TestIo {
        outbox: Outbox,
        now: Rc<Cell<Time>>,
    }

    impl PortIo for TestIo {
        type Error = &'static str;

        fn send_announce(&mut self, data: &[u8]) -> Result<(), Self::Error> {
            self.outbox.borrow_mut().push(data.to_vec());
            Ok(())
        }
        fn send_sync(&mut self, data: &[u8]) -> Result<Option<Time>, Self::Error> {
            self.outbox.borrow_mut().push(data.to_vec());
            Ok(Some(self.now.get()))
        }
        fn send_follow_up(&mut self, data: &[u8]) -> Result<(), Self::Error> {
            self.outbox.borrow_mut().push(data.to_vec());
            Ok(())
        }
        fn send_delay_req(&mut self, data: &[u8]) -> Result<Option<Time>, Self::Error> {
            self.outbox.borrow_mut().push(data.to_vec());
            Ok(Some(self.now.get()))
        }
        fn send_delay_resp(&mut self, data: &[u8]) -> Result<(), Self::Error> {
            self.outbox.borrow_mut().push(data.to_vec());
            Ok(())
        }
        fn send_pdelay_req(&mut self, data: &[u8]) -> Result<Option<Time>, Self::Error> {
            self.outbox.borrow_mut().push(data.to_vec());
            Ok(Some(self.now.get()))
        }
        fn send_pdelay_resp(&mut self, data: &[u8]) -> Result<Option<Time>, Self::Error> {
            self.outbox.borrow_mut().push(data.to_vec());
            Ok(Some(self.now.get()))
        }
        fn send_pdelay_resp_follow_up(&mut self, data: &[u8]) -> Result<(), Self::Error> {
            self.outbox.borrow_mut().push(data.to_vec());
            Ok(())
        }
        fn get_tx_timestamp(&mut self, _sequence_id: u16) -> Result<Time, Self::Error> {
            Ok(self.now.get())
        }
    }

    #[derive(Debug, Clone)]
    struct TestClock {
        now: Rc<Cell<Time>>,
        steps: Rc<RefCell<Vec<Duration>>>,
        frequency_deltas: Rc<RefCell<Vec<f64>>>,
    }

    impl Clock for TestClock {
        type Error = &'static str;

        fn now(&self) -> Time {
            self.now.get()
        }
        fn step_clock(&mut self, offset: Duration) -> Result<Time, Self::Error> {
            self.steps.borrow_mut().push(offset);
            Ok(self.now.get())
        }
        fn adjust_frequency(&mut self, delta_ppb: f64) -> Result<Time, Self::Error> {
            self.frequency_deltas.borrow_mut().push(delta_ppb);
            Ok(self.now.get())
        }
        fn set_properties(&mut self, _: &TimePropertiesDS) -> Result<(), Self::Error> {
            Ok(())
        }
    }

    struct Node {
        clock: BoundaryClock<TestIo, TestClock, PiServo, StepRng>,
        outboxes: Vec<Outbox>,
        now: Rc<Cell<Time>>,
        steps: Rc<RefCell<Vec<Duration>>>,
        frequency_deltas: Rc<RefCell<Vec<f64>>>,
    }

    fn make_node(identity: u8, priority_1: u8, port_count: usize) -> Node {
        let now = Rc::new(Cell::new(Time::default()));
        let steps = Rc::new(RefCell::new(Vec::new()));
        let frequency_deltas = Rc::new(RefCell::new(Vec::new()));

        let mut config = InstanceConfig::with_identity(ClockIdentity([identity; 8]));
        config.priority_1 = priority_1;

        let clock = TestClock {
            now: now.clone(),
            steps: steps.clone(),
            frequency_deltas: frequency_deltas.clone(),
        };
        let servo =
            ServoCoordinator::new(PiServo::default(), ServoConfig::default()).unwrap();

        let mut boundary =
            BoundaryClock::new(config, TimePropertiesDS::default(), clock, servo);

        let mut outboxes = Vec::new();
        for _ in 0..port_count {
            let outbox: Outbox = Rc::new(RefCell::new(Vec::new()));
            boundary
                .add_port(
                    PortConfig::default(),
                    TestIo {
                        outbox: outbox.clone(),
                        now: now.clone(),
                    },
                    StepRng::new(0, 1),
                )
                .unwrap();
            outboxes.push(outbox);
        }

        Node {
            clock: boundary,
            outboxes,
            now,
            steps,
            frequency_deltas,
        }
    }

    fn drain(outbox: &Outbox) -> Vec<Vec<u8>> {
        outbox.borrow_mut().drain(..).collect()
    }

    fn announce_bytes(
        source_clock: u8,
        priority_1: u8,
        steps_removed: u16,
        sequence_id: u16,
    ) -> Vec<u8> {
        let header = Header {
            source_port_identity: PortIdentity {
                clock_identity: ClockIdentity([source_clock; 8]),
                port_number: 1,
            },
            sequence_id,
            log_message_interval: 1,
            ..Default::default()
        };
        let message = Message {
            header,
            body: MessageBody::Announce(AnnounceMessage {
                header,
                origin_timestamp: WireTimestamp::default(),
                current_utc_offset: 37,
                grandmaster_priority_1: priority_1,
                grandmaster_clock_quality: ClockQuality::default(),
                grandmaster_priority_2: 128,
                grandmaster_identity: ClockIdentity([source_clock; 8]),
                steps_removed,
                time_source: Default::default(),
            }),
            suffix: TlvSet::default(),
        };
        let mut buffer = [0; MAX_DATA_LEN];
        let length = message.serialize(&mut buffer).unwrap();
        buffer[..length].to_vec()
    }

    fn sync_bytes(source_clock: u8, sequence_id: u16, correction_ns: i64) -> Vec<u8> {
        let header = Header {
            source_port_identity: PortIdentity {
                clock_identity: ClockIdentity([source_clock; 8]),
                port_number: 1,
            },
            sequence_id,
            two_step_flag: true,
            correction_field: TimeInterval(fixed::types::I48F16::from_num(correction_ns)),
            ..Default::default()
        };
        let message = Message {
            header,
            body: MessageBody::Sync(SyncMessage {
                origin_timestamp: WireTimestamp::default(),
            }),
            suffix: TlvSet::default(),
        };
        let mut buffer = [0; MAX_DATA_LEN];
        let length = message.serialize(&mut buffer).unwrap();
        buffer[..length].to_vec()
    }

    fn follow_up_bytes(
        source_clock: u8,
        sequence_id: u16,
        origin: WireTimestamp,
        correction_ns: i64,
    ) -> Vec<u8> {
        let header = Header {
            source_port_identity: PortIdentity {
                clock_identity: ClockIdentity([source_clock; 8]),
                port_number: 1,
            },
            sequence_id,
            correction_field: TimeInterval(fixed::types::I48F16::from_num(correction_ns)),
            ..Default::default()
        };
        let message = Message {
            header,
            body: MessageBody::FollowUp(FollowUpMessage {
                precise_origin_timestamp: origin,
            }),
            suffix: TlvSet::default(),
        };
        let mut buffer = [0; MAX_DATA_LEN];
        let length = message.serialize(&mut buffer).unwrap();
        buffer[..length].to_vec()
    }

    /// S1: two ordinary clocks; the one with the lower priority1 wins and
    /// the other synchronizes to it.
    #[test]
    fn better_clock_wins_election() {
        let mut a = make_node(0xA0, 100, 1);
        let mut b = make_node(0xB0, 200, 1);

        let start = Time::from_secs(1);
        a.now.set(start);
        b.now.set(start);
        a.clock.initialize(start);
        b.clock.initialize(start);

        for second in 2..40u64 {
            let now = Time::from_secs(second);
            a.now.set(now);
            b.now.set(now);

            // a first: its sync reaches b before b emits its delay request,
            // and a's delay response makes it back within the same second
            a.clock.tick(now).unwrap();
            for frame in drain(&a.outboxes[0]) {
                b.clock.process_message(1, &frame, now).unwrap();
            }
            b.clock.tick(now).unwrap();
            for frame in drain(&b.outboxes[0]) {
                a.clock.process_message(1, &frame, now).unwrap();
            }
            for frame in drain(&a.outboxes[0]) {
                b.clock.process_message(1, &frame, now).unwrap();
            }
        }

        assert_eq!(a.clock.get_port(1).unwrap().state(), PortState::Master);
        assert_eq!(b.clock.get_port(1).unwrap().state(), PortState::Slave);
        assert!(b.clock.is_synchronized());
        assert_eq!(
            b.clock.parent_ds().grandmaster_identity,
            ClockIdentity([0xA0; 8])
        );
        // zero simulated path: the servo saw offsets of zero
        assert!(b
            .frequency_deltas
            .borrow()
            .iter()
            .all(|delta| delta.abs() < 1.0));
        assert!(b.steps.borrow().is_empty());
    }

    /// S3: a selected parent that stops announcing is evicted and the port
    /// falls back to listening with no winner.
    #[test]
    fn foreign_master_timeout_drops_parent() {
        let mut node = make_node(0xAA, 128, 1);
        node.clock.initialize(Time::from_secs(1));

        let t10 = Time::from_secs(10);
        node.now.set(t10);
        node.clock
            .process_message(1, &announce_bytes(0x30, 10, 0, 0), t10)
            .unwrap();

        assert!(node.clock.get_port(1).unwrap().state().is_slave_like());
        assert_eq!(
            node.clock.parent_ds().grandmaster_identity,
            ClockIdentity([0x30; 8])
        );

        // inside the 6s window (3 × 2s announce interval) the parent holds
        let t15 = Time::from_secs(15);
        node.now.set(t15);
        node.clock.tick(t15).unwrap();
        assert!(node.clock.get_port(1).unwrap().state().is_slave_like());
        assert_eq!(node.clock.get_port(1).unwrap().foreign_master_count(), 1);

        // 7s after the announce the entry must be gone and the parent dropped
        let t17 = Time::from_secs(17);
        node.now.set(t17);
        node.clock.tick(t17).unwrap();
        assert_eq!(node.clock.get_port(1).unwrap().state(), PortState::Listening);
        assert_eq!(node.clock.get_port(1).unwrap().foreign_master_count(), 0);
        assert!(!node.clock.has_slave_port());
        assert_eq!(
            node.clock.parent_ds().grandmaster_identity,
            ClockIdentity([0xAA; 8])
        );
    }

    /// S6: a three-port boundary clock re-originates sync+follow-up out of
    /// its master ports with accumulated corrections and steps+1.
    #[test]
    fn boundary_clock_forwards_sync_downstream() {
        let mut node = make_node(0xBB, 128, 3);
        node.clock.initialize(Time::from_secs(1));

        // port 1 hears a better master (4 steps from its grandmaster)
        for (second, sequence_id) in [(2u64, 0u16), (4, 1), (6, 2)] {
            let now = Time::from_secs(second);
            node.now.set(now);
            node.clock
                .process_message(1, &announce_bytes(0x30, 10, 4, sequence_id), now)
                .unwrap();
            node.clock.tick(now).unwrap();
        }

        assert!(node.clock.get_port(1).unwrap().state().is_slave_like());
        assert_eq!(node.clock.get_port(2).unwrap().state(), PortState::Master);
        assert_eq!(node.clock.get_port(3).unwrap().state(), PortState::Master);
        assert_eq!(node.clock.current_ds().steps_removed, 5);

        // the re-announce out of the master ports carries steps + 1
        let downstream_announce = drain(&node.outboxes[1])
            .into_iter()
            .rev()
            .find_map(|frame| match Message::deserialize(&frame).unwrap().body {
                MessageBody::Announce(announce) => Some(announce),
                _ => None,
            })
            .expect("master port must announce");
        assert_eq!(downstream_announce.steps_removed, 5);
        drain(&node.outboxes[2]);

        // sync + follow-up on the slave port fan out of both master ports
        let t7 = Time::from_secs(7);
        node.now.set(t7);
        node.clock
            .process_message(1, &sync_bytes(0x30, 42, 1_000), t7)
            .unwrap();
        node.clock
            .process_message(
                1,
                &follow_up_bytes(0x30, 42, WireTimestamp::from(t7), 500),
                t7,
            )
            .unwrap();

        for port in [1usize, 2] {
            let frames = drain(&node.outboxes[port]);
            let mut saw_sync = false;
            let mut saw_follow_up = false;
            for frame in frames {
                let message = Message::deserialize(&frame).unwrap();
                match message.body {
                    MessageBody::Sync(_) => {
                        saw_sync = true;
                        assert!(message.header.two_step_flag);
                        assert_eq!(
                            message.header.source_port_identity.port_number,
                            port as u16 + 1
                        );
                    }
                    MessageBody::FollowUp(follow_up) => {
                        saw_follow_up = true;
                        // upstream sync (1000ns) + follow-up (500ns) corrections,
                        // plus a non-negative residence
                        assert!(message.header.correction_field.to_nanos() >= 1_500.0);
                        assert_eq!(
                            follow_up.precise_origin_timestamp,
                            WireTimestamp::from(t7)
                        );
                    }
                    _ => {}
                }
            }
            assert!(saw_sync, "port {} did not forward a sync", port + 1);
            assert!(saw_follow_up, "port {} did not forward a follow-up", port + 1);
        }
    }

    #[test]
    fn time_regression_faults_the_ports() {
        let mut node = make_node(0xCC, 128, 2);
        node.clock.initialize(Time::from_secs(1));
        node.clock.tick(Time::from_secs(10)).unwrap();

        assert_eq!(
            node.clock.tick(Time::from_secs(5)),
            Err(PtpError::Fault)
        );
        assert_eq!(node.clock.get_port(1).unwrap().state(), PortState::Faulty);
        assert_eq!(node.clock.get_port(2).unwrap().state(), PortState::Faulty);

        // a faulty port accepts nothing until re-initialized
        node.clock
            .process_message(1, &announce_bytes(0x30, 10, 0, 0), Time::from_secs(20))
            .unwrap();
        assert_eq!(node.clock.get_port(1).unwrap().foreign_master_count(), 0);

        node.clock
            .initialize_port(1, Time::from_secs(21))
            .unwrap();
        assert_eq!(
            node.clock.get_port(1).unwrap().state(),
            PortState::Listening
        );
    }

    #[test]
    fn unknown_port_number_is_an_error() {
        let mut node = make_node(0xDD, 128, 1);
        node.clock.initialize(Time::from_secs(1));

        assert!(node.clock.get_port(0).is_none());
        assert!(node.clock.get_port(2).is_none());
        assert_eq!(
            node.clock
                .process_message(9, &announce_bytes(1, 1, 0, 0), Time::from_secs(2)),
            Err(PtpError::InvalidPortNumber)
        );
    }

    #[test]
    fn malformed_messages_are_counted_not_propagated() {
        let mut node = make_node(0xEE, 128, 1);
        node.clock.initialize(Time::from_secs(1));

        // far too short
        node.clock
            .process_message(1, &[0x0B, 0x02, 0x00], Time::from_secs(2))
            .unwrap();
        // wrong domain
        let mut other_domain = announce_bytes(0x30, 10, 0, 0);
        other_domain[4] = 7;
        node.clock
            .process_message(1, &other_domain, Time::from_secs(2))
            .unwrap();

        let stats = node.clock.get_port(1).unwrap().statistics();
        assert_eq!(stats.validation_errors, 1);
        assert_eq!(stats.domain_mismatches, 1);
        assert_eq!(node.clock.flow_statistics().dropped_validation, 1);
        assert_eq!(node.clock.flow_statistics().dropped_domain, 1);
        assert_eq!(node.clock.get_port(1).unwrap().foreign_master_count(), 0);
    }

    /// The slave role and the local clock reference move together: when the
    /// parent disappears the servo drops to holdover/recovery.
    #[test]
    fn reference_switch_resets_servo() {
        let mut node = make_node(0xF0, 128, 1);
        node.clock.initialize(Time::from_secs(1));

        let t2 = Time::from_secs(2);
        node.now.set(t2);
        node.clock
            .process_message(1, &announce_bytes(0x30, 10, 0, 0), t2)
            .unwrap();
        assert!(node.clock.has_slave_port());
        assert_eq!(node.clock.servo_state(), ServoState::Recovery);

        // a better master appears: the reference switches and discipline
        // restarts from scratch
        let t3 = Time::from_secs(3);
        node.now.set(t3);
        node.clock
            .process_message(1, &announce_bytes(0x20, 5, 0, 0), t3)
            .unwrap();
        assert_eq!(
            node.clock.parent_ds().grandmaster_identity,
            ClockIdentity([0x20; 8])
        );
        assert_eq!(node.clock.servo_state(), ServoState::Recovery);
        assert!(node.clock.bmca_statistics().parent_changes >= 1);
    }
}
