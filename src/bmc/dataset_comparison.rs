//! The data set comparison algorithm of IEEE 1588-2019 9.3.4

use core::cmp::Ordering;

use crate::datastructures::{
    common::{ClockIdentity, ClockQuality, PortIdentity},
    datasets::DefaultDS,
    messages::AnnounceMessage,
};

/// Everything the election knows about one candidate grandmaster: the
/// vector it advertises plus how its announce reached this clock. Two
/// candidates are ranked with [`ComparisonDataset::compare`].
#[derive(Eq, PartialEq, Default, Debug, Clone, Copy)]
pub(crate) struct ComparisonDataset {
    gm_priority_1: u8,
    gm_identity: ClockIdentity,
    gm_clock_quality: ClockQuality,
    gm_priority_2: u8,
    steps_removed: u16,
    sender_identity: ClockIdentity,
    receiver_identity: PortIdentity,
}

impl ComparisonDataset {
    /// Build the dataset from an announce message and the identity of the
    /// port that received it.
    pub(crate) fn from_announce_message(
        message: &AnnounceMessage,
        receiver_identity: &PortIdentity,
    ) -> Self {
        Self {
            gm_priority_1: message.grandmaster_priority_1,
            gm_identity: message.grandmaster_identity,
            gm_clock_quality: message.grandmaster_clock_quality,
            gm_priority_2: message.grandmaster_priority_2,
            steps_removed: message.steps_removed,
            sender_identity: message.header.source_port_identity.clock_identity,
            receiver_identity: *receiver_identity,
        }
    }

    /// The local clock advertising itself, called D0 by the standard.
    pub(crate) fn from_own_data(data: &DefaultDS) -> Self {
        Self {
            gm_priority_1: data.priority_1,
            gm_identity: data.clock_identity,
            gm_clock_quality: data.clock_quality,
            gm_priority_2: data.priority_2,
            steps_removed: 0,
            sender_identity: data.clock_identity,
            receiver_identity: PortIdentity {
                clock_identity: data.clock_identity,
                port_number: 0,
            },
        }
    }

    /// Rank `self` against `other`.
    pub(crate) fn compare(&self, other: &Self) -> DatasetOrdering {
        if self.gm_identity == other.gm_identity {
            return self.compare_paths(other);
        }

        // Different grandmasters: the advertised vectors decide.
        match self.grandmaster_vector().cmp(&other.grandmaster_vector()) {
            Ordering::Less => DatasetOrdering::Better,
            Ordering::Greater => DatasetOrdering::Worse,
            // the vector ends in the grandmaster identity, which differs here
            Ordering::Equal => unreachable!("grandmaster identities differ"),
        }
    }

    /// The ranking fields of an advertised grandmaster in their comparison
    /// order: priority 1, clock class, accuracy code, variance, priority 2,
    /// and finally the identity itself. Lower is better in every position,
    /// so plain lexicographic order over this tuple is the whole of the
    /// standard's figure 34.
    fn grandmaster_vector(&self) -> (u8, u8, u8, u16, u8, ClockIdentity) {
        (
            self.gm_priority_1,
            self.gm_clock_quality.clock_class,
            self.gm_clock_quality.clock_accuracy.to_primitive(),
            self.gm_clock_quality.offset_scaled_log_variance,
            self.gm_priority_2,
            self.gm_identity,
        )
    }

    /// Two observations of the same grandmaster, ranked by how they reached
    /// this clock (the standard's figure 35).
    fn compare_paths(&self, other: &Self) -> DatasetOrdering {
        use DatasetOrdering::*;

        let hops = i32::from(self.steps_removed) - i32::from(other.steps_removed);

        // two or more hops apart: the shorter path wins outright
        if hops <= -2 {
            return Better;
        }
        if hops >= 2 {
            return Worse;
        }

        // exactly one hop apart: before ranking the longer path behind the
        // shorter one, check it for a loop back through its own receiver
        if hops != 0 {
            let longer = if hops > 0 { self } else { other };
            let verdict = match longer
                .receiver_identity
                .clock_identity
                .cmp(&longer.sender_identity)
            {
                Ordering::Less => Worse,
                Ordering::Equal => Error1,
                Ordering::Greater => WorseByTopology,
            };
            return if hops > 0 { verdict } else { verdict.flipped() };
        }

        // equal distance: the sending clock, then the receiving port number,
        // break the tie
        if self.sender_identity != other.sender_identity {
            if self.sender_identity < other.sender_identity {
                BetterByTopology
            } else {
                WorseByTopology
            }
        } else {
            match self
                .receiver_identity
                .port_number
                .cmp(&other.receiver_identity.port_number)
            {
                Ordering::Less => BetterByTopology,
                Ordering::Equal => Error2,
                Ordering::Greater => WorseByTopology,
            }
        }
    }
}

/// The outcome of ranking one comparison dataset against another
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DatasetOrdering {
    /// Better by the advertised grandmaster vector
    Better,
    /// The same grandmaster, preferred because of the network topology
    BetterByTopology,
    /// The two are messages from the same clock over the same path
    Error1,
    /// The two are probably derived from the same data
    Error2,
    /// The same grandmaster, not preferred because of the network topology
    WorseByTopology,
    /// Worse by the advertised grandmaster vector
    Worse,
}

impl DatasetOrdering {
    /// The same verdict seen from the other candidate's point of view.
    const fn flipped(self) -> Self {
        match self {
            DatasetOrdering::Better => DatasetOrdering::Worse,
            DatasetOrdering::BetterByTopology => DatasetOrdering::WorseByTopology,
            DatasetOrdering::Error1 => DatasetOrdering::Error1,
            DatasetOrdering::Error2 => DatasetOrdering::Error2,
            DatasetOrdering::WorseByTopology => DatasetOrdering::BetterByTopology,
            DatasetOrdering::Worse => DatasetOrdering::Better,
        }
    }

    pub(crate) const fn as_ordering(self) -> Ordering {
        // the error outcomes mean either choice is valid
        match self {
            DatasetOrdering::Better | DatasetOrdering::BetterByTopology => Ordering::Greater,
            DatasetOrdering::Error1 | DatasetOrdering::Error2 => Ordering::Equal,
            DatasetOrdering::WorseByTopology | DatasetOrdering::Worse => Ordering::Less,
        }
    }
}
