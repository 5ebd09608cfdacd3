//! Per-port state of the best master clock algorithm

use core::cmp::Ordering;

use arrayvec::ArrayVec;

use super::{
    dataset_comparison::{ComparisonDataset, DatasetOrdering},
    foreign_master::{ForeignMasterList, MAX_FOREIGN_MASTERS},
};
use crate::{
    datastructures::{common::PortIdentity, datasets::DefaultDS, messages::AnnounceMessage},
    port::PortState,
    time::{Duration, Time},
};

/// A candidate for best master: an announce message plus where and when it
/// was received.
#[derive(Clone, Copy, Debug)]
pub(crate) struct BestAnnounce {
    pub(crate) message: AnnounceMessage,
    pub(crate) receiver: PortIdentity,
    pub(crate) arrival: Time,
}

impl BestAnnounce {
    pub(crate) fn compare(&self, other: &Self) -> Ordering {
        // the arrival time breaks exact dataset ties towards newer messages
        let tie_break = self.arrival.cmp(&other.arrival);
        self.compare_dataset(other).as_ordering().then(tie_break)
    }

    fn compare_dataset(&self, other: &Self) -> DatasetOrdering {
        let ours = ComparisonDataset::from_announce_message(&self.message, &self.receiver);
        let theirs = ComparisonDataset::from_announce_message(&other.message, &other.receiver);
        ours.compare(&theirs)
    }
}

/// The role the state decision algorithm recommends for a port.
///
/// A recommendation equal to the port's current role produces no event, so a
/// port can never oscillate on byte-identical inputs.
#[derive(Debug, Clone)]
pub(crate) enum RecommendedState {
    /// The local clock wins on this port
    Master,
    /// The given remote master wins and this port receives time from it
    Slave(AnnounceMessage),
    /// A better clock exists but another port of this clock receives time
    Passive(AnnounceMessage),
    /// Nothing to decide from; keep listening
    Listening,
}

/// Per-port election state: the foreign master list and the fold over it.
#[derive(Debug, Clone)]
pub(crate) struct Bmca {
    foreign_masters: ForeignMasterList,
    own_identity: PortIdentity,
}

impl Bmca {
    pub(crate) fn new(own_identity: PortIdentity) -> Self {
        Self {
            foreign_masters: ForeignMasterList::new(own_identity),
            own_identity,
        }
    }

    /// Feed a received announce message into the election.
    pub(crate) fn register_announce_message(
        &mut self,
        announce: &AnnounceMessage,
        now: Time,
    ) -> bool {
        if announce.header.source_port_identity == self.own_identity {
            return false;
        }
        self.foreign_masters.register_announce(announce, now)
    }

    /// Remove timed-out foreign masters; returns the evicted identities.
    pub(crate) fn prune(
        &mut self,
        now: Time,
        timeout: Duration,
    ) -> ArrayVec<PortIdentity, MAX_FOREIGN_MASTERS> {
        self.foreign_masters.prune(now, timeout)
    }

    pub(crate) fn foreign_master_count(&self) -> usize {
        self.foreign_masters.len()
    }

    pub(crate) fn clear(&mut self) {
        self.foreign_masters.clear();
    }

    /// The best master this port has heard from, called Erbest by the
    /// standard.
    pub(crate) fn erbest(&self) -> Option<BestAnnounce> {
        let mut best: Option<BestAnnounce> = None;
        for entry in self.foreign_masters.iter() {
            let candidate = BestAnnounce {
                message: entry.announce,
                receiver: self.own_identity,
                arrival: entry.last_heard,
            };
            best = match best {
                None => Some(candidate),
                Some(current) => {
                    if candidate.compare(&current) == Ordering::Greater {
                        Some(candidate)
                    } else {
                        Some(current)
                    }
                }
            };
        }
        best
    }

    /// The state decision algorithm (IEEE 1588-2019 9.3.3), reduced to the
    /// roles this engine distinguishes.
    ///
    /// - `own_data`: the local clock advertising itself (D0)
    /// - `ebest`: the best announce across all ports of the clock
    /// - `erbest`: the best announce of the port being decided
    ///
    /// `None` means the port keeps its current state.
    pub(crate) fn recommended_state(
        own_data: &DefaultDS,
        ebest: Option<&BestAnnounce>,
        erbest: Option<&BestAnnounce>,
        port_state: PortState,
    ) -> Option<RecommendedState> {
        if ebest.is_none() && port_state == PortState::Listening {
            // nothing to hold an election over yet
            return None;
        }

        let d0 = ComparisonDataset::from_own_data(own_data);

        let better_than_local = |candidate: &BestAnnounce| {
            let dataset =
                ComparisonDataset::from_announce_message(&candidate.message, &candidate.receiver);
            d0.compare(&dataset).as_ordering() == Ordering::Less
        };

        let recommendation = match ebest {
            Some(global) if better_than_local(global) => {
                match erbest {
                    // this port heard the global best: it becomes the slave port
                    Some(port_best) if Self::is_same_candidate(global, port_best) => {
                        RecommendedState::Slave(port_best.message)
                    }
                    // another port receives time; this one goes passive if its
                    // own best also beats the local clock
                    Some(port_best) if better_than_local(port_best) => {
                        RecommendedState::Passive(port_best.message)
                    }
                    _ => Self::master_or_listening(own_data),
                }
            }
            // local clock wins outright (or no candidates at all)
            _ => Self::master_or_listening(own_data),
        };

        Some(recommendation)
    }

    fn master_or_listening(own_data: &DefaultDS) -> RecommendedState {
        if own_data.slave_only {
            RecommendedState::Listening
        } else {
            RecommendedState::Master
        }
    }

    fn is_same_candidate(a: &BestAnnounce, b: &BestAnnounce) -> bool {
        a.receiver == b.receiver
            && a.arrival == b.arrival
            && a.message.header.source_port_identity == b.message.header.source_port_identity
    }
}
