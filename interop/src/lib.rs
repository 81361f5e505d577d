use core::num::NonZeroU64;
use std::sync::Arc;

use anyhow::Result;
use deposit_tree::DepositTree;
use dilithium::SecretKey;
use genesis::Incremental;
use helper_functions::{misc, signing::SignForAllForks as _};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use types::{
    combined::BeaconState as CombinedBeaconState,
    config::Config,
    phase0::{
        containers::{DepositData, DepositMessage},
        primitives::{UnixSeconds, ValidatorIndex, H256},
    },
    preset::Preset,
    traits::BeaconState as _,
};

const QUICK_START_ETH1_BLOCK_HASH: H256 = H256::repeat_byte(0x42);

// The genesis time derived from this is replaced by the one passed to `quick_start_beacon_state`.
const QUICK_START_ETH1_BLOCK_TIMESTAMP: UnixSeconds = 1 << 40;

// ML-DSA key generation cannot be seeded, so interop keys are random but stay fixed for the
// lifetime of the process.
static SECRET_KEYS: Lazy<Mutex<Vec<Arc<SecretKey>>>> = Lazy::new(Mutex::default);

/// Builds a genesis state with `validator_count` active validators using the keys from
/// [`secret_key`].
pub fn quick_start_beacon_state<P: Preset>(
    config: &Config,
    genesis_time: UnixSeconds,
    validator_count: NonZeroU64,
) -> Result<(CombinedBeaconState<P>, DepositTree)> {
    let mut incremental = Incremental::new(config);

    incremental.set_eth1_timestamp(QUICK_START_ETH1_BLOCK_TIMESTAMP);

    for index in 0..validator_count.get() {
        let deposit_data = quick_start_deposit_data::<P>(config, &secret_key(index));
        incremental.add_deposit_data(deposit_data, index)?;
    }

    // Genesis conditions such as `min_genesis_time` are not checked.
    let (mut genesis_state, deposit_tree) = incremental.finish(QUICK_START_ETH1_BLOCK_HASH)?;

    *genesis_state.genesis_time_mut() = genesis_time;

    Ok((genesis_state, deposit_tree))
}

/// Returns the interop secret key of the validator with index `validator_index`.
///
/// Calling this with the same index always returns the same key within one process.
#[must_use]
pub fn secret_key(validator_index: ValidatorIndex) -> Arc<SecretKey> {
    let index = usize::try_from(validator_index).expect("validator index should fit in usize");
    let mut secret_keys = SECRET_KEYS.lock();

    while secret_keys.len() <= index {
        secret_keys.push(Arc::new(SecretKey::random()));
    }

    Arc::clone(&secret_keys[index])
}

#[must_use]
pub fn quick_start_deposit_data<P: Preset>(
    config: &Config,
    secret_key: &SecretKey,
) -> DepositData {
    let pubkey = secret_key.to_public_key().to_bytes();
    let withdrawal_credentials = misc::dilithium_withdrawal_credentials(&pubkey);
    let amount = P::MAX_EFFECTIVE_BALANCE;

    let deposit_message = DepositMessage {
        pubkey,
        withdrawal_credentials,
        amount,
    };

    let signature = deposit_message.sign(config, secret_key).to_bytes();

    DepositData {
        pubkey,
        withdrawal_credentials,
        amount,
        signature,
    }
}
