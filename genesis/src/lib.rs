use core::num::NonZeroU64;

use anyhow::{ensure, Result};
use arithmetic::U64Ext as _;
use deposit_tree::DepositTree;
use dilithium::SignatureBytes;
use helper_functions::accessors;
use thiserror::Error;
use tracing::debug;
use transition_functions::{combined, unphased::DepositOutcome};
use tree_hash::TreeHash as _;
use types::{
    altair::{
        beacon_state::BeaconState as AltairBeaconState,
        containers::{BeaconBlock as AltairBeaconBlock, BeaconBlockBody as AltairBeaconBlockBody},
    },
    bellatrix::{
        beacon_state::BeaconState as BellatrixBeaconState,
        containers::{
            BeaconBlock as BellatrixBeaconBlock, BeaconBlockBody as BellatrixBeaconBlockBody,
        },
    },
    capella::{
        beacon_state::BeaconState as CapellaBeaconState,
        containers::{
            BeaconBlock as CapellaBeaconBlock, BeaconBlockBody as CapellaBeaconBlockBody,
        },
    },
    collections::RandaoMixes,
    combined::{BeaconBlock, BeaconState, SignedBeaconBlock},
    config::Config,
    deneb::{
        beacon_state::BeaconState as DenebBeaconState,
        containers::{BeaconBlock as DenebBeaconBlock, BeaconBlockBody as DenebBeaconBlockBody},
    },
    nonstandard::{Phase, RelativeEpoch},
    phase0::{
        beacon_state::BeaconState as Phase0BeaconState,
        consts::{GENESIS_EPOCH, GENESIS_SLOT},
        containers::{
            BeaconBlock as Phase0BeaconBlock, BeaconBlockBody as Phase0BeaconBlockBody,
            BeaconBlockHeader, DepositData, Fork,
        },
        primitives::{DepositIndex, ExecutionBlockHash, UnixSeconds, H256},
    },
    preset::Preset,
    traits::BeaconState as _,
};

/// Genesis state built one deposit at a time.
///
/// The state starts in the phase that `config` schedules for the genesis epoch.
pub struct Incremental<'config, P: Preset> {
    config: &'config Config,
    beacon_state: BeaconState<P>,
    deposit_tree: DepositTree,
}

impl<'config, P: Preset> Incremental<'config, P> {
    #[must_use]
    pub fn new(config: &'config Config) -> Self {
        let slot = GENESIS_SLOT;
        let phase = config.genesis_phase();
        let version = config.version(phase);

        let fork = Fork {
            previous_version: version,
            current_version: version,
            epoch: GENESIS_EPOCH,
        };

        let body_root = match phase {
            Phase::Phase0 => Phase0BeaconBlockBody::<P>::default().tree_hash_root(),
            Phase::Altair => AltairBeaconBlockBody::<P>::default().tree_hash_root(),
            Phase::Bellatrix => BellatrixBeaconBlockBody::<P>::default().tree_hash_root(),
            Phase::Capella => CapellaBeaconBlockBody::<P>::default().tree_hash_root(),
            Phase::Deneb => DenebBeaconBlockBody::<P>::default().tree_hash_root(),
        };

        let latest_block_header = BeaconBlockHeader {
            slot,
            body_root,
            ..BeaconBlockHeader::default()
        };

        let beacon_state = match phase {
            Phase::Phase0 => Phase0BeaconState {
                slot,
                fork,
                latest_block_header,
                ..Phase0BeaconState::default()
            }
            .into(),
            Phase::Altair => AltairBeaconState {
                slot,
                fork,
                latest_block_header,
                ..AltairBeaconState::default()
            }
            .into(),
            Phase::Bellatrix => BellatrixBeaconState {
                slot,
                fork,
                latest_block_header,
                ..BellatrixBeaconState::default()
            }
            .into(),
            Phase::Capella => CapellaBeaconState {
                slot,
                fork,
                latest_block_header,
                ..CapellaBeaconState::default()
            }
            .into(),
            Phase::Deneb => DenebBeaconState {
                slot,
                fork,
                latest_block_header,
                ..DenebBeaconState::default()
            }
            .into(),
        };

        Self {
            config,
            beacon_state,
            deposit_tree: DepositTree::default(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        validate_genesis_state(self.config, &self.beacon_state)
    }

    pub fn set_eth1_timestamp(&mut self, eth1_timestamp: UnixSeconds) {
        *self.beacon_state.genesis_time_mut() = eth1_timestamp + self.config.genesis_delay;
    }

    pub fn add_deposit_data(
        &mut self,
        data: DepositData,
        deposit_index: DepositIndex,
    ) -> Result<()> {
        self.deposit_tree.push(deposit_index, data)?;

        let eth1_data = self.beacon_state.eth1_data_mut();
        eth1_data.deposit_root = self.deposit_tree.root();
        eth1_data.deposit_count = self.deposit_tree.deposit_count();

        let validator_index =
            match combined::process_deposit_data(self.config, &mut self.beacon_state, data)? {
                DepositOutcome::AddedValidator(index) | DepositOutcome::ToppedUp(index) => index,
                DepositOutcome::Rejected => {
                    debug!("genesis deposit {deposit_index} has an invalid signature");
                    return Ok(());
                }
            };

        // > Process activations
        let balance = *self.beacon_state.balances().get(validator_index)?;

        let validator = self
            .beacon_state
            .validators_mut()
            .get_mut(validator_index)?;

        validator.effective_balance = balance
            .prev_multiple_of(P::EFFECTIVE_BALANCE_INCREMENT)
            .min(P::MAX_EFFECTIVE_BALANCE);

        if validator.effective_balance == P::MAX_EFFECTIVE_BALANCE {
            validator.activation_eligibility_epoch = GENESIS_EPOCH;
            validator.activation_epoch = GENESIS_EPOCH;
        }

        Ok(())
    }

    pub fn finish(
        self,
        eth1_block_hash: ExecutionBlockHash,
    ) -> Result<(BeaconState<P>, DepositTree)> {
        let Self {
            mut beacon_state,
            deposit_tree,
            ..
        } = self;

        beacon_state.eth1_data_mut().block_hash = eth1_block_hash;

        // > Seed RANDAO with Eth1 entropy
        *beacon_state.randao_mixes_mut() = RandaoMixes::<P>::repeat_element(eth1_block_hash);

        // > Set genesis validators root for domain separation and chain versioning
        *beacon_state.genesis_validators_root_mut() = beacon_state.validators().tree_hash_root();

        // Activations in `add_deposit_data` happen after caches may have been filled.
        *beacon_state.cache_mut() = Default::default();

        // > [New in Altair] Fill in sync committees
        // > Note: A duplicate committee is assigned for the current and next committee at genesis
        if let Some(state) = beacon_state.post_altair_mut() {
            let sync_committee = accessors::get_next_sync_committee(state)?;
            *state.current_sync_committee_mut() = sync_committee.clone();
            *state.next_sync_committee_mut() = sync_committee;
        }

        Ok((beacon_state, deposit_tree))
    }
}

#[derive(Debug, Error)]
pub enum GenesisTriggerError {
    #[error("too early ({actual_genesis_time} < {minimum_genesis_time})")]
    TooEarly {
        minimum_genesis_time: UnixSeconds,
        actual_genesis_time: UnixSeconds,
    },
    #[error("not enough active validators ({actual_validator_count} < {minimum_validator_count})")]
    NotEnoughActiveValidators {
        minimum_validator_count: NonZeroU64,
        actual_validator_count: u64,
    },
}

/// The unsigned block whose header is `genesis_state.latest_block_header` once the state root is
/// filled in.
#[must_use]
pub fn beacon_block<P: Preset>(genesis_state: &BeaconState<P>) -> SignedBeaconBlock<P> {
    // `BeaconBlock.body.eth1_data` is not set to `genesis_state.eth1_data()`.
    match genesis_state.phase() {
        Phase::Phase0 => BeaconBlock::from(Phase0BeaconBlock::default()),
        Phase::Altair => BeaconBlock::from(AltairBeaconBlock::default()),
        Phase::Bellatrix => BeaconBlock::from(BellatrixBeaconBlock::default()),
        Phase::Capella => BeaconBlock::from(CapellaBeaconBlock::default()),
        Phase::Deneb => BeaconBlock::from(DenebBeaconBlock::default()),
    }
    .with_state_root(genesis_state.hash_tree_root())
    .with_signature(SignatureBytes::empty())
}

fn validate_genesis_state<P: Preset>(config: &Config, state: &BeaconState<P>) -> Result<()> {
    let minimum_genesis_time = config.min_genesis_time;
    let actual_genesis_time = state.genesis_time();

    ensure!(
        minimum_genesis_time <= actual_genesis_time,
        GenesisTriggerError::TooEarly {
            minimum_genesis_time,
            actual_genesis_time,
        },
    );

    let minimum_validator_count = config.min_genesis_active_validator_count;

    // The cached accessors cannot be used here. Candidate genesis states keep changing.
    let actual_validator_count =
        accessors::get_active_validator_indices(state, RelativeEpoch::Current)
            .count()
            .try_into()?;

    ensure!(
        minimum_validator_count.get() <= actual_validator_count,
        GenesisTriggerError::NotEnoughActiveValidators {
            minimum_validator_count,
            actual_validator_count,
        },
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use dilithium::SecretKey;
    use helper_functions::{misc, signing::SignForAllForks as _};
    use types::{phase0::containers::DepositMessage, preset::Minimal};

    use super::*;

    fn deposit_data(config: &Config, secret_key: &SecretKey, amount: u64) -> DepositData {
        let pubkey = secret_key.to_public_key().to_bytes();
        let withdrawal_credentials = misc::dilithium_withdrawal_credentials(&pubkey);

        let deposit_message = DepositMessage {
            pubkey,
            withdrawal_credentials,
            amount,
        };

        DepositData {
            pubkey,
            withdrawal_credentials,
            amount,
            signature: deposit_message.sign(config, secret_key).to_bytes(),
        }
    }

    #[test]
    fn top_up_to_maximum_activates_validator() -> Result<()> {
        let config = Config::minimal();
        let secret_key = SecretKey::random();
        let half = deposit_data(&config, &secret_key, Minimal::MAX_EFFECTIVE_BALANCE / 2);

        let mut incremental = Incremental::<Minimal>::new(&config);

        incremental.add_deposit_data(half, 0)?;
        incremental.add_deposit_data(half, 1)?;

        let (state, deposit_tree) = incremental.finish(ExecutionBlockHash::repeat_byte(1))?;

        assert_eq!(state.validators().len_u64(), 1);
        assert_eq!(state.validators().get(0)?.activation_epoch, GENESIS_EPOCH);
        assert_eq!(state.eth1_deposit_index(), 2);
        assert_eq!(state.eth1_data(), deposit_tree.eth1_data(ExecutionBlockHash::repeat_byte(1)));

        Ok(())
    }

    #[test]
    fn deposits_with_invalid_signatures_are_skipped() -> Result<()> {
        let config = Config::minimal();
        let mut deposit =
            deposit_data(&config, &SecretKey::random(), Minimal::MAX_EFFECTIVE_BALANCE);

        deposit.amount -= 1;

        let mut incremental = Incremental::<Minimal>::new(&config);

        incremental.add_deposit_data(deposit, 0)?;

        let (state, _) = incremental.finish(ExecutionBlockHash::ZERO)?;

        assert!(state.validators().is_empty());
        assert_eq!(state.eth1_deposit_index(), 1);

        Ok(())
    }

    #[test]
    fn too_few_validators_do_not_trigger_genesis() {
        let config = Config::minimal();
        let mut incremental = Incremental::<Minimal>::new(&config);

        incremental.set_eth1_timestamp(config.min_genesis_time);

        let error = incremental.validate().expect_err("registry is empty");

        assert!(matches!(
            error.downcast_ref::<GenesisTriggerError>(),
            Some(GenesisTriggerError::NotEnoughActiveValidators { .. }),
        ));
    }

    #[test]
    fn genesis_block_commits_to_genesis_state() {
        let config = Config::minimal();
        let (state, _) = Incremental::<Minimal>::new(&config)
            .finish(ExecutionBlockHash::ZERO)
            .expect("empty genesis state can be finished");

        let block = beacon_block(&state);

        assert_eq!(
            types::traits::SignedBeaconBlock::state_root(&block),
            state.hash_tree_root(),
        );
    }
}
