use core::{cmp::Ordering, num::NonZeroU64};
use std::borrow::Cow;

use anyhow::Result;
use enum_iterator::Sequence as _;
use hex_literal::hex;
use nonzero_ext::nonzero;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use typenum::Unsigned as _;

use crate::{
    nonstandard::{Phase, Toption},
    phase0::{
        consts::{FAR_FUTURE_EPOCH, GENESIS_EPOCH},
        primitives::{Epoch, ExecutionAddress, Gwei, Slot, UnixSeconds, Version},
    },
    preset::{Preset, PresetName},
};

/// Configuration variables customizable at runtime.
///
/// The `*_fork_epoch` fields have type `Epoch` for compatibility with YAML configurations.
/// A fork that is not scheduled has its epoch set to [`FAR_FUTURE_EPOCH`].
#[derive(Clone, PartialEq, Eq, Debug, Deserialize, Serialize)]
#[serde(default, rename_all = "SCREAMING_SNAKE_CASE")]
pub struct Config {
    // Meta
    pub config_name: Cow<'static, str>,
    pub preset_base: PresetName,

    // Genesis
    pub genesis_delay: u64,
    #[serde(with = "crate::serde_utils::prefixed_hex")]
    pub genesis_fork_version: Version,
    pub min_genesis_active_validator_count: NonZeroU64,
    pub min_genesis_time: UnixSeconds,

    // Forking
    pub altair_fork_epoch: Epoch,
    #[serde(with = "crate::serde_utils::prefixed_hex")]
    pub altair_fork_version: Version,
    pub bellatrix_fork_epoch: Epoch,
    #[serde(with = "crate::serde_utils::prefixed_hex")]
    pub bellatrix_fork_version: Version,
    pub capella_fork_epoch: Epoch,
    #[serde(with = "crate::serde_utils::prefixed_hex")]
    pub capella_fork_version: Version,
    pub deneb_fork_epoch: Epoch,
    #[serde(with = "crate::serde_utils::prefixed_hex")]
    pub deneb_fork_version: Version,

    // Time parameters
    pub eth1_follow_distance: u64,
    pub min_validator_withdrawability_delay: u64,
    pub seconds_per_eth1_block: NonZeroU64,
    pub seconds_per_slot: NonZeroU64,
    pub shard_committee_period: u64,

    // Validator cycle
    pub churn_limit_quotient: NonZeroU64,
    pub ejection_balance: Gwei,
    pub inactivity_score_bias: NonZeroU64,
    pub inactivity_score_recovery_rate: u64,
    pub max_per_epoch_activation_churn_limit: u64,
    pub min_per_epoch_churn_limit: u64,

    // Deposit contract
    pub deposit_chain_id: u64,
    pub deposit_contract_address: ExecutionAddress,

    // Deneb
    pub max_blobs_per_block: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self::mainnet()
    }
}

impl Config {
    #[must_use]
    pub fn mainnet() -> Self {
        Self {
            // Meta
            config_name: Cow::Borrowed("mainnet"),
            preset_base: PresetName::Mainnet,

            // Genesis
            genesis_delay: 604_800,
            genesis_fork_version: hex!("00000000"),
            min_genesis_active_validator_count: nonzero!(16384_u64),
            min_genesis_time: 1_606_824_000,

            // Forking
            altair_fork_epoch: 74240,
            altair_fork_version: hex!("01000000"),
            bellatrix_fork_epoch: 144_896,
            bellatrix_fork_version: hex!("02000000"),
            capella_fork_epoch: 194_048,
            capella_fork_version: hex!("03000000"),
            deneb_fork_epoch: 269_568,
            deneb_fork_version: hex!("04000000"),

            // Time parameters
            eth1_follow_distance: 2048,
            min_validator_withdrawability_delay: 256,
            seconds_per_eth1_block: nonzero!(14_u64),
            seconds_per_slot: nonzero!(12_u64),
            shard_committee_period: 256,

            // Validator cycle
            churn_limit_quotient: nonzero!(65536_u64),
            ejection_balance: 20_000_000_000_000,
            inactivity_score_bias: nonzero!(4_u64),
            inactivity_score_recovery_rate: 16,
            max_per_epoch_activation_churn_limit: 8,
            min_per_epoch_churn_limit: 4,

            // Deposit contract
            deposit_chain_id: 1,
            deposit_contract_address: ExecutionAddress::ZERO,

            // Deneb
            max_blobs_per_block: 6,
        }
    }

    #[must_use]
    pub fn minimal() -> Self {
        Self {
            // Meta
            config_name: Cow::Borrowed("minimal"),
            preset_base: PresetName::Minimal,

            // Genesis
            genesis_delay: 300,
            genesis_fork_version: hex!("00000001"),
            min_genesis_active_validator_count: nonzero!(64_u64),
            min_genesis_time: 1_578_009_600,

            // Forking
            altair_fork_epoch: FAR_FUTURE_EPOCH,
            altair_fork_version: hex!("01000001"),
            bellatrix_fork_epoch: FAR_FUTURE_EPOCH,
            bellatrix_fork_version: hex!("02000001"),
            capella_fork_epoch: FAR_FUTURE_EPOCH,
            capella_fork_version: hex!("03000001"),
            deneb_fork_epoch: FAR_FUTURE_EPOCH,
            deneb_fork_version: hex!("04000001"),

            // Time parameters
            eth1_follow_distance: 16,
            seconds_per_slot: nonzero!(6_u64),
            shard_committee_period: 64,

            // Validator cycle
            churn_limit_quotient: nonzero!(32_u64),
            max_per_epoch_activation_churn_limit: 4,
            min_per_epoch_churn_limit: 2,

            // Deposit contract
            deposit_chain_id: 5,

            ..Self::mainnet()
        }
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config = serde_yaml::from_str::<Self>(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Returns a configuration with all forks up to and including `phase` active from genesis.
    #[must_use]
    pub fn start_and_stay_in(mut self, phase: Phase) -> Self {
        self.config_name = Cow::Owned(format!("{phase}-{}", self.config_name));
        self.upgrade_once(phase, GENESIS_EPOCH)
    }

    #[must_use]
    pub fn upgrade_once(mut self, post_phase: Phase, fork_epoch: Epoch) -> Self {
        for (phase, field) in self.fork_epochs_mut() {
            *field = match phase.cmp(&post_phase) {
                Ordering::Less => GENESIS_EPOCH,
                Ordering::Equal => fork_epoch,
                Ordering::Greater => FAR_FUTURE_EPOCH,
            };
        }

        self
    }

    /// Schedules every fork one epoch after the previous one.
    #[must_use]
    pub fn rapid_upgrade(mut self) -> Self {
        self.config_name.to_mut().insert_str(0, "rapid-upgrade-");

        for ((_, field), epoch) in self.fork_epochs_mut().zip(1..) {
            *field = epoch;
        }

        self
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.config_name.is_empty() {
            return Err(Error::NameEmpty);
        }

        for character in self.config_name.chars() {
            if !matches!(character, 'a'..='z' | '0'..='9' | '-') {
                return Err(Error::NameContainsIllegalCharacters);
            }
        }

        let mut previous = (Phase::Phase0, GENESIS_EPOCH);

        for (phase, epoch) in self.fork_epochs() {
            if epoch < previous.1 {
                return Err(Error::ForkEpochsOutOfOrder {
                    earlier: previous.0,
                    later: phase,
                });
            }

            previous = (phase, epoch);
        }

        Ok(())
    }

    #[must_use]
    pub fn genesis_phase(&self) -> Phase {
        self.phase_at_epoch(GENESIS_EPOCH)
    }

    #[inline]
    #[must_use]
    pub const fn version(&self, phase: Phase) -> Version {
        match phase {
            Phase::Phase0 => self.genesis_fork_version,
            Phase::Altair => self.altair_fork_version,
            Phase::Bellatrix => self.bellatrix_fork_version,
            Phase::Capella => self.capella_fork_version,
            Phase::Deneb => self.deneb_fork_version,
        }
    }

    #[must_use]
    pub fn version_at_epoch(&self, epoch: Epoch) -> Version {
        self.version(self.phase_at_epoch(epoch))
    }

    #[inline]
    #[must_use]
    pub const fn fork_epoch(&self, phase: Phase) -> Epoch {
        match phase {
            Phase::Phase0 => GENESIS_EPOCH,
            Phase::Altair => self.altair_fork_epoch,
            Phase::Bellatrix => self.bellatrix_fork_epoch,
            Phase::Capella => self.capella_fork_epoch,
            Phase::Deneb => self.deneb_fork_epoch,
        }
    }

    #[must_use]
    pub fn fork_slot<P: Preset>(&self, phase: Phase) -> Toption<Slot> {
        self.fork_epoch(phase)
            .checked_mul(P::SlotsPerEpoch::U64)
            .map_or(Toption::None, Toption::Some)
    }

    #[must_use]
    pub fn is_phase_enabled<P: Preset>(&self, phase: Phase) -> bool {
        self.fork_slot::<P>(phase).into_option().is_some()
    }

    #[must_use]
    pub fn phase_at_epoch(&self, epoch: Epoch) -> Phase {
        self.fork_epochs()
            .take_while(|(_, fork_epoch)| *fork_epoch <= epoch)
            .map(|(phase, _)| phase)
            .last()
            .unwrap_or(Phase::Phase0)
    }

    #[must_use]
    pub fn phase_at_slot<P: Preset>(&self, slot: Slot) -> Phase {
        enum_iterator::all()
            .map(|phase| (phase, self.fork_slot::<P>(phase)))
            .take_while(|(_, fork_slot)| *fork_slot <= Toption::Some(slot))
            .map(|(phase, _)| phase)
            .last()
            .unwrap_or(Phase::Phase0)
    }

    fn fork_epochs(&self) -> impl Iterator<Item = (Phase, Epoch)> {
        // Do not remove the type annotation.
        // It ensures that this method is up to date when new phases are added.
        let fields: [_; Phase::CARDINALITY - 1] = [
            self.altair_fork_epoch,
            self.bellatrix_fork_epoch,
            self.capella_fork_epoch,
            self.deneb_fork_epoch,
        ];

        enum_iterator::all().skip(1).zip(fields)
    }

    fn fork_epochs_mut(&mut self) -> impl Iterator<Item = (Phase, &mut Epoch)> {
        let fields: [_; Phase::CARDINALITY - 1] = [
            &mut self.altair_fork_epoch,
            &mut self.bellatrix_fork_epoch,
            &mut self.capella_fork_epoch,
            &mut self.deneb_fork_epoch,
        ];

        enum_iterator::all().skip(1).zip(fields)
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration name is empty")]
    NameEmpty,
    #[error("configuration name contains illegal characters")]
    NameContainsIllegalCharacters,
    #[error("{later} is scheduled before {earlier}")]
    ForkEpochsOutOfOrder { earlier: Phase, later: Phase },
}
