//! Collections used in `BeaconState`.
//!
//! All of them are persistent, so consecutive states produced by a transition share most of their
//! memory. See [`crate::persistent`] for the hashing and serialization rules.

use crate::{
    altair::primitives::ParticipationFlags,
    capella::containers::HistoricalSummary,
    persistent::{PersistentList, PersistentVector},
    phase0::{
        containers::{Eth1Data, PendingAttestation, Validator},
        primitives::{Gwei, H256},
    },
    preset::Preset,
};

pub type RecentRoots<P> = PersistentVector<H256, <P as Preset>::SlotsPerHistoricalRoot>;

pub type HistoricalRoots<P> = PersistentList<H256, <P as Preset>::HistoricalRootsLimit>;

pub type Eth1DataVotes<P> = PersistentList<Eth1Data, <P as Preset>::SlotsPerEth1VotingPeriod>;

pub type Validators<P> = PersistentList<Validator, <P as Preset>::ValidatorRegistryLimit>;

pub type Balances<P> = PersistentList<Gwei, <P as Preset>::ValidatorRegistryLimit>;

pub type RandaoMixes<P> = PersistentVector<H256, <P as Preset>::EpochsPerHistoricalVector>;

pub type Slashings<P> = PersistentVector<Gwei, <P as Preset>::EpochsPerSlashingsVector>;

pub type Attestations<P> =
    PersistentList<PendingAttestation<P>, <P as Preset>::MaxAttestationsPerEpoch>;

pub type EpochParticipation<P> =
    PersistentList<ParticipationFlags, <P as Preset>::ValidatorRegistryLimit>;

pub type InactivityScores<P> = PersistentList<u64, <P as Preset>::ValidatorRegistryLimit>;

pub type HistoricalSummaries<P> =
    PersistentList<HistoricalSummary, <P as Preset>::HistoricalRootsLimit>;
