use anyhow::{bail, ensure, Result};
use enum_iterator::Sequence as _;
use execution_engine::{ExecutionEngine, NullExecutionEngine};
use helper_functions::{
    fork,
    verifier::{MultiVerifier, NullVerifier, SignatureBatch, Verifier},
};
use logging::TRANSITION_LOG_METRICS;
use static_assertions::const_assert_eq;
use types::{
    combined::{BeaconBlock, BeaconState, SignedBeaconBlock},
    config::Config,
    nonstandard::{Phase, Toption},
    phase0::{
        containers::{Attestation, DepositData},
        primitives::Slot,
    },
    preset::Preset,
    traits::{BeaconBlock as _, BeaconState as _, SignedBeaconBlock as _},
};

use crate::{
    altair, bellatrix, capella, deneb, phase0,
    unphased::{self, DepositOutcome, Error, ProcessSlots, StateRootPolicy},
};

/// Applies `signed_block` to `state`, verifying every signature and the state root.
///
/// `state` is left in an unspecified condition if this fails and must be discarded.
pub fn state_transition<P: Preset>(
    config: &Config,
    state: &mut BeaconState<P>,
    signed_block: &SignedBeaconBlock<P>,
) -> Result<()> {
    custom_state_transition(
        config,
        state,
        signed_block,
        ProcessSlots::Always,
        StateRootPolicy::Verify,
        NullExecutionEngine,
        MultiVerifier::default(),
    )
}

/// Like [`state_transition`], but returns the signatures of the block instead of verifying them.
///
/// The block is only valid if [`SignatureBatch::verify`] returns `Ok(true)`.
pub fn state_transition_no_verify_any_signature<P: Preset>(
    config: &Config,
    state: &mut BeaconState<P>,
    signed_block: &SignedBeaconBlock<P>,
) -> Result<SignatureBatch> {
    process_slots(config, state, signed_block.slot())?;

    let mut verifier = MultiVerifier::default();

    verify_signatures(config, state, signed_block, &mut verifier)?;

    custom_state_transition(
        config,
        state,
        signed_block,
        ProcessSlots::Never,
        StateRootPolicy::Verify,
        NullExecutionEngine,
        NullVerifier,
    )?;

    Ok(verifier.into())
}

pub fn custom_state_transition<P: Preset>(
    config: &Config,
    state: &mut BeaconState<P>,
    block: &SignedBeaconBlock<P>,
    process_slots: ProcessSlots,
    state_root_policy: StateRootPolicy,
    execution_engine: impl ExecutionEngine<P> + Send,
    verifier: impl Verifier + Send,
) -> Result<()> {
    // > Process slots (including those with no blocks) since block
    if process_slots.should_process(state, block.message()) {
        self::process_slots(config, state, block.slot())?;
    }

    let process_slots = ProcessSlots::Never;

    match (state, block) {
        (BeaconState::Phase0(state), SignedBeaconBlock::Phase0(block)) => phase0::state_transition(
            config,
            state,
            block,
            process_slots,
            state_root_policy,
            verifier,
        ),
        (BeaconState::Altair(state), SignedBeaconBlock::Altair(block)) => altair::state_transition(
            config,
            state,
            block,
            process_slots,
            state_root_policy,
            verifier,
        ),
        (BeaconState::Bellatrix(state), SignedBeaconBlock::Bellatrix(block)) => {
            bellatrix::state_transition(
                config,
                state,
                block,
                process_slots,
                state_root_policy,
                execution_engine,
                verifier,
            )
        }
        (BeaconState::Capella(state), SignedBeaconBlock::Capella(block)) => {
            capella::state_transition(
                config,
                state,
                block,
                process_slots,
                state_root_policy,
                execution_engine,
                verifier,
            )
        }
        (BeaconState::Deneb(state), SignedBeaconBlock::Deneb(block)) => deneb::state_transition(
            config,
            state,
            block,
            process_slots,
            state_root_policy,
            execution_engine,
            verifier,
        ),
        (state, _) => {
            // This match arm will silently match any new phases.
            // Cause a compilation error if a new phase is added.
            const_assert_eq!(Phase::CARDINALITY, 5);

            bail!(Error::PhaseMismatch {
                state_phase: state.phase(),
                block_phase: block.phase(),
            });
        }
    }?;

    TRANSITION_LOG_METRICS.record_block();

    Ok(())
}

/// Passes every signature in `block` to `verifier` without calling [`Verifier::finish`].
pub fn verify_signatures<P: Preset>(
    config: &Config,
    state: &BeaconState<P>,
    block: &SignedBeaconBlock<P>,
    verifier: impl Verifier,
) -> Result<()> {
    match (state, block) {
        (BeaconState::Phase0(state), SignedBeaconBlock::Phase0(block)) => {
            phase0::verify_signatures(config, state, block, verifier)
        }
        (BeaconState::Altair(state), SignedBeaconBlock::Altair(block)) => {
            altair::verify_signatures(config, state, block, verifier)
        }
        (BeaconState::Bellatrix(state), SignedBeaconBlock::Bellatrix(block)) => {
            altair::verify_signatures(config, state, block, verifier)
        }
        (BeaconState::Capella(state), SignedBeaconBlock::Capella(block)) => {
            altair::verify_signatures(config, state, block, verifier)
        }
        (BeaconState::Deneb(state), SignedBeaconBlock::Deneb(block)) => {
            altair::verify_signatures(config, state, block, verifier)
        }
        _ => {
            // This match arm will silently match any new phases.
            // Cause a compilation error if a new phase is added.
            const_assert_eq!(Phase::CARDINALITY, 5);

            bail!(Error::PhaseMismatch {
                state_phase: state.phase(),
                block_phase: block.phase(),
            });
        }
    }
}

/// Advances `state` to `slot`, upgrading it at every fork scheduled along the way.
pub fn process_slots<P: Preset>(
    config: &Config,
    state: &mut BeaconState<P>,
    slot: Slot,
) -> Result<()> {
    // `process_block_header` would also reject a second block in the same slot, but checking here
    // keeps transitions from succeeding on states that were already advanced.
    ensure!(
        state.slot() < slot,
        Error::SlotNotLater {
            current: state.slot(),
            target: slot,
        },
    );

    // If multiple phases have the same fork slots,
    // the state may need to be upgraded multiple times in the same slot.
    let final_phase = config.phase_at_slot::<P>(slot);

    while state.slot() < slot || state.phase() < final_phase {
        let mut made_progress = false;

        // Persistent collections make the clones below cheap.
        match state {
            BeaconState::Phase0(phase0_state) => {
                let altair_fork_slot = config.fork_slot::<P>(Phase::Altair);

                let last_slot_in_phase = Toption::Some(slot)
                    .min(altair_fork_slot)
                    .into_option()
                    .expect("result of min should always be Some because slot is always Some");

                if phase0_state.slot < last_slot_in_phase {
                    phase0::process_slots(config, phase0_state, last_slot_in_phase)?;

                    made_progress = true;
                }

                if Toption::Some(last_slot_in_phase) == altair_fork_slot {
                    *state = fork::upgrade_to_altair(config, phase0_state.clone())?.into();

                    made_progress = true;
                }
            }
            BeaconState::Altair(altair_state) => {
                let bellatrix_fork_slot = config.fork_slot::<P>(Phase::Bellatrix);

                let last_slot_in_phase = Toption::Some(slot)
                    .min(bellatrix_fork_slot)
                    .into_option()
                    .expect("result of min should always be Some because slot is always Some");

                if altair_state.slot < last_slot_in_phase {
                    altair::process_slots(config, altair_state, last_slot_in_phase)?;

                    made_progress = true;
                }

                if Toption::Some(last_slot_in_phase) == bellatrix_fork_slot {
                    *state = fork::upgrade_to_bellatrix(config, altair_state.clone()).into();

                    made_progress = true;
                }
            }
            BeaconState::Bellatrix(bellatrix_state) => {
                let capella_fork_slot = config.fork_slot::<P>(Phase::Capella);

                let last_slot_in_phase = Toption::Some(slot)
                    .min(capella_fork_slot)
                    .into_option()
                    .expect("result of min should always be Some because slot is always Some");

                if bellatrix_state.slot < last_slot_in_phase {
                    bellatrix::process_slots(config, bellatrix_state, last_slot_in_phase)?;

                    made_progress = true;
                }

                if Toption::Some(last_slot_in_phase) == capella_fork_slot {
                    *state = fork::upgrade_to_capella(config, bellatrix_state.clone()).into();

                    made_progress = true;
                }
            }
            BeaconState::Capella(capella_state) => {
                let deneb_fork_slot = config.fork_slot::<P>(Phase::Deneb);

                let last_slot_in_phase = Toption::Some(slot)
                    .min(deneb_fork_slot)
                    .into_option()
                    .expect("result of min should always be Some because slot is always Some");

                if capella_state.slot < last_slot_in_phase {
                    capella::process_slots(config, capella_state, last_slot_in_phase)?;

                    made_progress = true;
                }

                if Toption::Some(last_slot_in_phase) == deneb_fork_slot {
                    *state = fork::upgrade_to_deneb(config, capella_state.clone()).into();

                    made_progress = true;
                }
            }
            BeaconState::Deneb(deneb_state) => {
                deneb::process_slots(config, deneb_state, slot)?;

                made_progress = true;
            }
        }

        ensure!(
            made_progress,
            Error::SlotProcessingStalled {
                current: state.slot(),
                target: slot,
            },
        );
    }

    Ok(())
}

/// Processes `block` without advancing slots or checking the state root.
pub fn process_block<P: Preset>(
    config: &Config,
    state: &mut BeaconState<P>,
    block: &BeaconBlock<P>,
    verifier: impl Verifier,
) -> Result<()> {
    match (state, block) {
        (BeaconState::Phase0(state), BeaconBlock::Phase0(block)) => {
            phase0::process_block(config, state, block, verifier)
        }
        (BeaconState::Altair(state), BeaconBlock::Altair(block)) => {
            altair::process_block(config, state, block, verifier)
        }
        (BeaconState::Bellatrix(state), BeaconBlock::Bellatrix(block)) => {
            bellatrix::process_block(config, state, block, verifier)
        }
        (BeaconState::Capella(state), BeaconBlock::Capella(block)) => {
            capella::process_block(config, state, block, verifier)
        }
        (BeaconState::Deneb(state), BeaconBlock::Deneb(block)) => {
            deneb::process_block(config, state, block, verifier)
        }
        (state, _) => {
            // This match arm will silently match any new phases.
            // Cause a compilation error if a new phase is added.
            const_assert_eq!(Phase::CARDINALITY, 5);

            bail!(Error::PhaseMismatch {
                state_phase: state.phase(),
                block_phase: block.phase(),
            });
        }
    }
}

pub fn process_deposit_data<P: Preset>(
    config: &Config,
    state: &mut BeaconState<P>,
    deposit_data: DepositData,
) -> Result<DepositOutcome> {
    match state {
        BeaconState::Phase0(state) => unphased::process_deposit_data(config, state, deposit_data),
        BeaconState::Altair(state) => altair::process_deposit_data(config, state, deposit_data),
        // Later phases do not modify `process_deposit_data`.
        BeaconState::Bellatrix(state) => altair::process_deposit_data(config, state, deposit_data),
        BeaconState::Capella(state) => altair::process_deposit_data(config, state, deposit_data),
        BeaconState::Deneb(state) => altair::process_deposit_data(config, state, deposit_data),
    }
}

/// Validates and applies `attestations` as if they were included in a block at the current slot.
///
/// Signatures are not checked.
pub fn process_attestations_no_verify_signature<P: Preset>(
    config: &Config,
    state: &mut BeaconState<P>,
    attestations: &[Attestation<P>],
) -> Result<()> {
    unphased::validate_attestations(config, state, attestations, NullVerifier)?;

    for attestation in attestations {
        match state {
            BeaconState::Phase0(state) => phase0::apply_attestation(state, attestation)?,
            BeaconState::Altair(state) => altair::apply_attestation(state, attestation)?,
            BeaconState::Bellatrix(state) => altair::apply_attestation(state, attestation)?,
            BeaconState::Capella(state) => altair::apply_attestation(state, attestation)?,
            BeaconState::Deneb(state) => altair::apply_attestation(state, attestation)?,
        }
    }

    Ok(())
}
