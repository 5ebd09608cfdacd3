//! Tracking of the remote masters a port hears from

use arrayvec::ArrayVec;

use crate::{
    datastructures::{common::PortIdentity, messages::AnnounceMessage},
    time::{Duration, Time},
};

/// The maximum number of foreign masters tracked per port. A full list
/// accepts no new distinct sources until aging evicts an entry.
pub(crate) const MAX_FOREIGN_MASTERS: usize = 16;

/// How many announce arrival times are remembered per foreign master
const ARRIVAL_WINDOW: usize = 8;

/// One remote clock observed through its announce messages.
#[derive(Debug, Clone)]
pub(crate) struct ForeignMaster {
    /// The most recent announce payload from this master
    pub(crate) announce: AnnounceMessage,
    /// Arrival times of the last few announces, oldest first
    pub(crate) arrivals: ArrayVec<Time, ARRIVAL_WINDOW>,
    /// When this master was last heard
    pub(crate) last_heard: Time,
}

impl ForeignMaster {
    fn new(announce: AnnounceMessage, now: Time) -> Self {
        let mut arrivals = ArrayVec::new();
        arrivals.push(now);
        Self {
            announce,
            arrivals,
            last_heard: now,
        }
    }

    pub(crate) fn source_identity(&self) -> PortIdentity {
        self.announce.header.source_port_identity
    }

    fn record(&mut self, announce: AnnounceMessage, now: Time) {
        self.announce = announce;
        if self.arrivals.is_full() {
            self.arrivals.remove(0);
        }
        self.arrivals.push(now);
        self.last_heard = now;
    }
}

/// The foreign masters one port currently knows about.
#[derive(Debug, Clone)]
pub(crate) struct ForeignMasterList {
    entries: ArrayVec<ForeignMaster, MAX_FOREIGN_MASTERS>,
    own_identity: PortIdentity,
}

impl ForeignMasterList {
    /// `own_identity`: the identity of the port this list belongs to
    pub(crate) fn new(own_identity: PortIdentity) -> Self {
        Self {
            entries: ArrayVec::new(),
            own_identity,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &ForeignMaster> {
        self.entries.iter()
    }

    pub(crate) fn get(&self, identity: PortIdentity) -> Option<&ForeignMaster> {
        self.entries
            .iter()
            .find(|entry| entry.source_identity() == identity)
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }

    /// Record an announce message. Returns whether the message qualified and
    /// was stored.
    pub(crate) fn register_announce(&mut self, announce: &AnnounceMessage, now: Time) -> bool {
        if !self.is_qualified(announce) {
            return false;
        }

        let source = announce.header.source_port_identity;
        if let Some(entry) = self
            .entries
            .iter_mut()
            .find(|entry| entry.source_identity() == source)
        {
            entry.record(*announce, now);
            true
        } else if self.entries.len() < MAX_FOREIGN_MASTERS {
            self.entries.push(ForeignMaster::new(*announce, now));
            true
        } else {
            // list is full; the source is only admitted once aging makes room
            false
        }
    }

    /// Remove every entry not heard from within `timeout`. Returns the
    /// identities that were evicted.
    pub(crate) fn prune(
        &mut self,
        now: Time,
        timeout: Duration,
    ) -> ArrayVec<PortIdentity, MAX_FOREIGN_MASTERS> {
        let mut removed = ArrayVec::new();
        for index in (0..self.entries.len()).rev() {
            if now - self.entries[index].last_heard > timeout {
                removed.push(self.entries.remove(index).source_identity());
            }
        }
        removed
    }

    fn is_qualified(&self, announce: &AnnounceMessage) -> bool {
        let source = announce.header.source_port_identity;

        // Messages from our own clock never qualify; every instance has one
        // clock, so the clock identity is enough to tell.
        if source.clock_identity == self.own_identity.clock_identity {
            return false;
        }

        // An announce that took 255 or more hops is not a usable master
        if announce.steps_removed >= 255 {
            return false;
        }

        // The announce must be newer than what is already stored, with
        // allowance for u16 sequence rollover
        if let Some(entry) = self.get(source) {
            let last_sequence_id = entry.announce.header.sequence_id;
            if announce
                .header
                .sequence_id
                .wrapping_sub(last_sequence_id)
                >= u16::MAX / 2
            {
                return false;
            }
        }

        true
    }
}
