use anyhow::{ensure, Result};
use execution_engine::{ExecutionEngine, ExecutionPayloadParams, NullExecutionEngine};
use helper_functions::{
    misc::kzg_commitment_to_versioned_hash, predicates::is_execution_enabled, verifier::Verifier,
};
use tree_hash::TreeHash as _;
use types::{
    config::Config,
    deneb::{
        beacon_state::BeaconState,
        containers::{BeaconBlock, BeaconBlockBody, ExecutionPayloadHeader},
    },
    phase0::primitives::H256,
    preset::Preset,
};

use crate::{
    altair, bellatrix, capella,
    unphased::{self, Error},
};

pub fn process_block<P: Preset>(
    config: &Config,
    state: &mut BeaconState<P>,
    block: &BeaconBlock<P>,
    mut verifier: impl Verifier,
) -> Result<()> {
    verifier.reserve(altair::count_required_signatures(block));

    custom_process_block(config, state, block, NullExecutionEngine, &mut verifier)?;

    verifier.finish()
}

pub fn custom_process_block<P: Preset>(
    config: &Config,
    state: &mut BeaconState<P>,
    block: &BeaconBlock<P>,
    execution_engine: impl ExecutionEngine<P>,
    mut verifier: impl Verifier,
) -> Result<()> {
    debug_assert_eq!(state.slot, block.slot);

    unphased::process_block_header(state, block)?;

    if is_execution_enabled(state, &block.body) {
        capella::process_withdrawals(state, &block.body.execution_payload)?;

        // > [Modified in Deneb:EIP4844]
        process_execution_payload(
            config,
            state,
            block.tree_hash_root(),
            &block.body,
            execution_engine,
        )?;
    }

    unphased::process_randao(config, state, &block.body, &mut verifier)?;
    unphased::process_eth1_data(state, &block.body)?;

    capella::process_operations(config, state, &block.body, &mut verifier)?;

    altair::process_sync_aggregate(config, state, &block.body.sync_aggregate, verifier)
}

fn process_execution_payload<P: Preset>(
    config: &Config,
    state: &mut BeaconState<P>,
    block_root: H256,
    body: &BeaconBlockBody<P>,
    execution_engine: impl ExecutionEngine<P>,
) -> Result<()> {
    let payload = &body.execution_payload;

    bellatrix::validate_execution_payload(config, state, payload)?;

    // > [New in Deneb:EIP4844] Verify commitments are under limit
    let maximum = config.max_blobs_per_block;
    let in_block = body.blob_kzg_commitments.len();

    ensure!(
        u64::try_from(in_block)? <= maximum,
        Error::TooManyBlobKzgCommitments { maximum, in_block },
    );

    // > Verify the execution payload is valid
    let versioned_hashes = body
        .blob_kzg_commitments
        .iter()
        .map(kzg_commitment_to_versioned_hash)
        .collect();

    execution_engine.notify_new_payload(
        block_root,
        payload,
        Some(ExecutionPayloadParams::Deneb {
            versioned_hashes,
            parent_beacon_block_root: state.latest_block_header.parent_root,
        }),
    )?;

    // > Cache execution payload header
    state.latest_execution_payload_header = ExecutionPayloadHeader::from(payload);

    Ok(())
}
