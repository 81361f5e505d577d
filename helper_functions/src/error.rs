use parse_display::Display;
use thiserror::Error;
use types::phase0::{
    containers::Checkpoint,
    primitives::{CommitteeIndex, Epoch, Slot, ValidatorIndex},
};

#[derive(Debug, Error)]
pub enum Error {
    #[error("attestation has no attesting indices")]
    AttestationHasNoAttestingIndices,
    #[error(
        "attestation source does not match justified checkpoint \
         (in state: {in_state:?}, in block: {in_block:?})"
    )]
    AttestationSourceMismatch {
        in_state: Checkpoint,
        in_block: Checkpoint,
    },
    #[error("attesting indices are not sorted and unique")]
    AttestingIndicesNotSortedAndUnique,
    #[error("addition overflows")]
    BalanceOverflow,
    #[error("committee index {index} is out of bounds ({committee_count} committees)")]
    CommitteeIndexOutOfBounds {
        index: CommitteeIndex,
        committee_count: u64,
    },
    #[error(
        "aggregation bitlist length {aggregation_bitlist_length} \
         does not match committee length {committee_length}"
    )]
    CommitteeLengthMismatch {
        aggregation_bitlist_length: usize,
        committee_length: usize,
    },
    #[error("epoch {epoch} is after next one relative to state")]
    EpochAfterNext { epoch: Epoch },
    #[error("epoch {epoch} is before previous one relative to state")]
    EpochBeforePrevious { epoch: Epoch },
    #[error("epoch {epoch} is in the future relative to state")]
    EpochInTheFuture { epoch: Epoch },
    #[error("epoch number overflowed")]
    EpochOverflow,
    #[error("failed to select proposer")]
    FailedToSelectProposer,
    #[error("no validators are active")]
    NoActiveValidators,
    #[error("{signature_count} signatures do not match {attesting_index_count} attesting indices")]
    SignatureCountMismatch {
        signature_count: usize,
        attesting_index_count: usize,
    },
    #[error("{0} is invalid")]
    SignatureInvalid(SignatureKind),
    #[error("{kind} is invalid ({description})")]
    SignatureInvalidInBatch {
        kind: SignatureKind,
        description: String,
    },
    #[error("slot {slot} is out of range for state at slot {state_slot}")]
    SlotOutOfRange { slot: Slot, state_slot: Slot },
    #[error("validator {validator_index} has already initiated exit at epoch {exit_epoch}")]
    ValidatorAlreadyExited {
        validator_index: ValidatorIndex,
        exit_epoch: Epoch,
    },
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Display)]
pub enum SignatureKind {
    #[display("attestation signature")]
    Attestation,
    #[display("block signature")]
    Block,
    #[display("deposit signature")]
    Deposit,
    #[display("Dilithium to execution change signature")]
    DilithiumToExecutionChange,
    #[display("collection of multiple signatures")]
    Multi,
    #[display("RANDAO reveal")]
    Randao,
    #[display("sync aggregate signature")]
    SyncAggregate,
    #[display("voluntary exit signature")]
    VoluntaryExit,
}
