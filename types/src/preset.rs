#![allow(clippy::module_name_repetitions)]

use core::{fmt::Debug, hash::Hash, num::NonZeroU64};

use nonzero_ext::nonzero;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use typenum::{
    NonZero, Prod, Unsigned, U1024, U1048576, U1073741824, U1099511627776, U128, U16, U16777216,
    U2, U2048, U256, U32, U4, U4096, U64, U65536, U8, U8192,
};

use crate::{config::Config, phase0::primitives::Gwei};

/// Bounds shared by every type-level length in a preset.
///
/// `ssz_types` collections derive their impls with bounds on the length parameter,
/// so every length has to satisfy all of them for containers to derive theirs.
pub trait Length:
    Unsigned
    + NonZero
    + Clone
    + Copy
    + PartialEq
    + Eq
    + Hash
    + Default
    + Debug
    + Send
    + Sync
    + 'static
{
}

impl<N> Length for N where
    N: Unsigned
        + NonZero
        + Clone
        + Copy
        + PartialEq
        + Eq
        + Hash
        + Default
        + Debug
        + Send
        + Sync
        + 'static
{
}

/// Compile-time configuration variables.
pub trait Preset: Copy + Eq + Ord + Hash + Default + Debug + Send + Sync + 'static {
    // Phase 0
    type EpochsPerHistoricalVector: Length;
    type EpochsPerSlashingsVector: Length;
    type HistoricalRootsLimit: Length;
    type MaxAttestations: Length;
    type MaxAttesterSlashings: Length;
    type MaxDeposits: Length;
    type MaxProposerSlashings: Length;
    type MaxValidatorsPerCommittee: Length;
    type MaxVoluntaryExits: Length;
    type SlotsPerEpoch: Length;
    type SlotsPerHistoricalRoot: Length;
    type ValidatorRegistryLimit: Length;

    // Altair
    type SyncCommitteeSize: Length;

    // Bellatrix
    type BytesPerLogsBloom: Length;
    type MaxBytesPerTransaction: Length;
    type MaxExtraDataBytes: Length;
    type MaxTransactionsPerPayload: Length;

    // Capella
    type MaxDilithiumToExecutionChanges: Length;
    type MaxWithdrawalsPerPayload: Length;

    // Deneb
    type MaxBlobCommitmentsPerBlock: Length;

    // Derived type-level variables
    type MaxAttestationsPerEpoch: Length;
    type SlotsPerEth1VotingPeriod: Length;

    // Meta
    const NAME: PresetName;

    // Phase 0
    const BASE_REWARD_FACTOR: u64 = 64;
    const EFFECTIVE_BALANCE_INCREMENT: NonZeroU64 = nonzero!(1_000_000_000_u64);
    const EPOCHS_PER_ETH1_VOTING_PERIOD: NonZeroU64 = nonzero!(64_u64);
    const HYSTERESIS_DOWNWARD_MULTIPLIER: u64 = 1;
    const HYSTERESIS_QUOTIENT: NonZeroU64 = nonzero!(4_u64);
    const HYSTERESIS_UPWARD_MULTIPLIER: u64 = 5;
    const INACTIVITY_PENALTY_QUOTIENT: NonZeroU64 = nonzero!(1_u64 << 26);
    const MAX_COMMITTEES_PER_SLOT: NonZeroU64 = nonzero!(64_u64);
    const MAX_EFFECTIVE_BALANCE: Gwei = 40_000_000_000_000;
    const MAX_SEED_LOOKAHEAD: u64 = 4;
    const MIN_ATTESTATION_INCLUSION_DELAY: NonZeroU64 = NonZeroU64::MIN;
    const MIN_DEPOSIT_AMOUNT: Gwei = 1_000_000_000;
    const MIN_EPOCHS_TO_INACTIVITY_PENALTY: u64 = 4;
    const MIN_SEED_LOOKAHEAD: u64 = 1;
    const MIN_SLASHING_PENALTY_QUOTIENT: NonZeroU64 = nonzero!(128_u64);
    const PROPORTIONAL_SLASHING_MULTIPLIER: u64 = 1;
    const PROPOSER_REWARD_QUOTIENT: NonZeroU64 = nonzero!(8_u64);
    const SHUFFLE_ROUND_COUNT: u8 = 90;
    const TARGET_COMMITTEE_SIZE: NonZeroU64 = nonzero!(128_u64);
    const WHISTLEBLOWER_REWARD_QUOTIENT: NonZeroU64 = nonzero!(512_u64);

    // Altair
    const EPOCHS_PER_SYNC_COMMITTEE_PERIOD: NonZeroU64 = nonzero!(256_u64);
    const INACTIVITY_PENALTY_QUOTIENT_ALTAIR: NonZeroU64 = nonzero!(3_u64 << 24);
    const MIN_SLASHING_PENALTY_QUOTIENT_ALTAIR: NonZeroU64 = nonzero!(64_u64);
    const MIN_SYNC_COMMITTEE_PARTICIPANTS: usize = 1;
    const PROPORTIONAL_SLASHING_MULTIPLIER_ALTAIR: u64 = 2;

    // Bellatrix
    const INACTIVITY_PENALTY_QUOTIENT_BELLATRIX: NonZeroU64 = nonzero!(1_u64 << 24);
    const MIN_SLASHING_PENALTY_QUOTIENT_BELLATRIX: NonZeroU64 = nonzero!(32_u64);
    const PROPORTIONAL_SLASHING_MULTIPLIER_BELLATRIX: u64 = 3;

    // Capella
    const MAX_VALIDATORS_PER_WITHDRAWALS_SWEEP: u64 = 1 << 14;

    /// Returns the default configuration associated with a preset.
    ///
    /// This should only be used in tests and benchmarks.
    #[must_use]
    fn default_config() -> Config {
        Self::NAME.default_config()
    }
}

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Debug)]
pub struct Mainnet;

impl Preset for Mainnet {
    // Phase 0
    type EpochsPerHistoricalVector = U65536;
    type EpochsPerSlashingsVector = U8192;
    type HistoricalRootsLimit = U16777216;
    type MaxAttestations = U128;
    type MaxAttesterSlashings = U2;
    type MaxDeposits = U16;
    type MaxProposerSlashings = U16;
    type MaxValidatorsPerCommittee = U2048;
    type MaxVoluntaryExits = U16;
    type SlotsPerEpoch = U128;
    type SlotsPerHistoricalRoot = U8192;
    type ValidatorRegistryLimit = U1099511627776;

    // Altair
    type SyncCommitteeSize = U16;

    // Bellatrix
    type BytesPerLogsBloom = U256;
    type MaxBytesPerTransaction = U1073741824;
    type MaxExtraDataBytes = U32;
    type MaxTransactionsPerPayload = U1048576;

    // Capella
    type MaxDilithiumToExecutionChanges = U16;
    type MaxWithdrawalsPerPayload = U16;

    // Deneb
    type MaxBlobCommitmentsPerBlock = U4096;

    // Derived type-level variables
    type MaxAttestationsPerEpoch = Prod<Self::MaxAttestations, Self::SlotsPerEpoch>;
    type SlotsPerEth1VotingPeriod = Prod<U64, Self::SlotsPerEpoch>;

    // Meta
    const NAME: PresetName = PresetName::Mainnet;
}

macro_rules! delegate_preset_items {
    (
        super $base_preset: ident;
        $(type $associated_type: ident;)*
    ) => {
        $(type $associated_type = <$base_preset as Preset>::$associated_type;)*
    };
}

/// Preset with short epochs and small committees for tests.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Debug)]
pub struct Minimal;

impl Preset for Minimal {
    delegate_preset_items! {
        super Mainnet;

        // Phase 0
        type HistoricalRootsLimit;
        type MaxAttestations;
        type MaxAttesterSlashings;
        type MaxDeposits;
        type MaxProposerSlashings;
        type MaxValidatorsPerCommittee;
        type MaxVoluntaryExits;
        type ValidatorRegistryLimit;

        // Altair
        type SyncCommitteeSize;

        // Bellatrix
        type BytesPerLogsBloom;
        type MaxBytesPerTransaction;
        type MaxExtraDataBytes;
        type MaxTransactionsPerPayload;

        // Capella
        type MaxDilithiumToExecutionChanges;
    }

    // Phase 0
    type EpochsPerHistoricalVector = U64;
    type EpochsPerSlashingsVector = U64;
    type SlotsPerEpoch = U8;
    type SlotsPerHistoricalRoot = U64;

    // Capella
    type MaxWithdrawalsPerPayload = U4;

    // Deneb
    type MaxBlobCommitmentsPerBlock = U16;

    // Derived type-level variables
    type MaxAttestationsPerEpoch = U1024;
    type SlotsPerEth1VotingPeriod = Prod<U4, Self::SlotsPerEpoch>;

    // Meta
    const NAME: PresetName = PresetName::Minimal;

    // Phase 0
    const EPOCHS_PER_ETH1_VOTING_PERIOD: NonZeroU64 = nonzero!(4_u64);
    const MAX_COMMITTEES_PER_SLOT: NonZeroU64 = nonzero!(4_u64);
    const SHUFFLE_ROUND_COUNT: u8 = 10;
    const TARGET_COMMITTEE_SIZE: NonZeroU64 = nonzero!(4_u64);

    // Altair
    const EPOCHS_PER_SYNC_COMMITTEE_PERIOD: NonZeroU64 = nonzero!(8_u64);

    // Capella
    const MAX_VALIDATORS_PER_WITHDRAWALS_SWEEP: u64 = 16;
}

#[derive(
    Clone, Copy, PartialEq, Eq, Debug, Default, Display, EnumString, Deserialize, Serialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PresetName {
    #[default]
    Mainnet,
    Minimal,
}

impl PresetName {
    #[must_use]
    pub fn default_config(self) -> Config {
        match self {
            Self::Mainnet => Config::mainnet(),
            Self::Minimal => Config::minimal(),
        }
    }
}

pub type SlotsPerEpoch<P> = <P as Preset>::SlotsPerEpoch;

#[cfg(test)]
mod tests {
    use typenum::Unsigned as _;

    use super::*;

    #[test]
    fn derived_lengths_match_products() {
        assert_eq!(
            <Mainnet as Preset>::SlotsPerEth1VotingPeriod::U64,
            Mainnet::EPOCHS_PER_ETH1_VOTING_PERIOD.get() * U128::U64,
        );
        assert_eq!(
            <Minimal as Preset>::SlotsPerEth1VotingPeriod::U64,
            Minimal::EPOCHS_PER_ETH1_VOTING_PERIOD.get() * U8::U64,
        );
        assert_eq!(
            <Minimal as Preset>::MaxAttestationsPerEpoch::U64,
            <Minimal as Preset>::MaxAttestations::U64 * U8::U64,
        );
    }

    #[test]
    fn slots_per_historical_root_is_a_multiple_of_slots_per_epoch() {
        assert_eq!(
            <Mainnet as Preset>::SlotsPerHistoricalRoot::U64 % U128::U64,
            0,
        );
        assert_eq!(<Minimal as Preset>::SlotsPerHistoricalRoot::U64 % U8::U64, 0);
    }

    #[test]
    fn preset_names_parse() -> Result<(), strum::ParseError> {
        assert_eq!("minimal".parse::<PresetName>()?, PresetName::Minimal);
        assert_eq!(PresetName::Mainnet.to_string(), "mainnet");
        Ok(())
    }
}
