// TODO: `altair::block_processing::apply_attestation` looks up participation flags one validator at
//       a time with `PersistentList::get`. An iterator over selected indices would avoid repeated
//       tree descents for large committees.

pub mod combined;

pub mod unphased {
    pub use block_processing::{
        process_attester_slashing, process_block_header, process_deposit, process_deposit_data,
        process_eth1_data, process_proposer_slashing, process_randao, process_voluntary_exit,
        validate_attestation, validate_attestation_with_verifier, validate_attestations,
        validate_attester_slashing, validate_attester_slashing_with_verifier,
        validate_deposit_count, validate_proposer_slashing,
        validate_proposer_slashing_with_verifier, validate_voluntary_exit,
        validate_voluntary_exit_with_verifier, verify_deposit_merkle_branch, DepositOutcome,
    };
    pub use epoch_intermediates::{CombinedDeltas, EpochDeltas};
    pub use epoch_processing::{
        is_historical_accumulator_boundary, process_effective_balance_updates,
        process_eth1_data_reset, process_historical_roots_update, process_randao_mixes_reset,
        process_registry_updates, process_rewards_and_penalties, process_slashings,
        process_slashings_reset, should_process_justification_and_finalization,
        should_process_rewards_and_penalties, weigh_justification_and_finalization,
    };
    pub use error::Error;
    pub use slot_processing::{process_slot, process_slots, ProcessSlots};
    pub use state_transition::{count_base_signatures, verify_base_signatures, StateRootPolicy};

    mod block_processing;
    mod epoch_intermediates;
    mod epoch_processing;
    mod error;
    mod slot_processing;
    mod state_transition;
}

pub mod phase0 {
    pub use block_processing::{apply_attestation, custom_process_block, process_block};
    pub use epoch_intermediates::{
        epoch_deltas, statistics, Inclusion, Performance, Phase0EpochDeltas, Statistics,
        ValidatorSummary,
    };
    pub use epoch_processing::{process_epoch, process_justification_and_finalization};
    pub use state_transition::{process_slots, state_transition, verify_signatures};

    mod block_processing;
    mod epoch_intermediates;
    mod epoch_processing;
    mod state_transition;
}

pub mod altair {
    pub use block_processing::{
        apply_attestation, count_required_signatures, current_sync_committee_indices,
        custom_process_block, process_block, process_deposit, process_deposit_data,
        process_operations, process_sync_aggregate, verify_sync_aggregate_signature,
    };
    pub use epoch_intermediates::{
        epoch_deltas, statistics, AltairEpochDeltas, AltairValidatorSummary, Statistics,
    };
    pub use epoch_processing::{
        process_epoch, process_epoch_with, process_inactivity_updates,
        process_justification_and_finalization, process_participation_flag_updates,
        process_sync_committee_updates,
    };
    pub use state_transition::{process_slots, state_transition, verify_signatures};

    mod block_processing;
    mod epoch_intermediates;
    mod epoch_processing;
    mod state_transition;
}

pub mod bellatrix {
    pub use block_processing::{custom_process_block, process_block, validate_execution_payload};
    pub use state_transition::{process_slots, state_transition};

    mod block_processing;
    mod state_transition;
}

pub mod capella {
    pub use block_processing::{
        custom_process_block, get_expected_withdrawals, process_block,
        process_dilithium_to_execution_change, process_operations, process_withdrawals,
        validate_dilithium_to_execution_change, validate_header_withdrawals_root,
    };
    pub use epoch_processing::{process_epoch, process_historical_summaries_update};
    pub use state_transition::{process_slots, state_transition};

    mod block_processing;
    mod epoch_processing;
    mod state_transition;
}

pub mod deneb {
    pub use block_processing::{custom_process_block, process_block};
    pub use state_transition::{process_slots, state_transition};

    mod block_processing;
    mod state_transition;
}
