use dilithium::PublicKeyBytes;
use thiserror::Error;
use types::{
    nonstandard::Phase,
    phase0::{
        containers::{AttestationData, BeaconBlockHeader, Checkpoint, Deposit, Validator},
        primitives::{Epoch, Slot, UnixSeconds, ValidatorIndex, H256},
    },
};

#[derive(Debug, Error)]
pub enum Error {
    #[error("attestation data is not slashable (data_1: {data_1:?}, data_2: {data_2:?})")]
    AttestationDataNotSlashable {
        data_1: AttestationData,
        data_2: AttestationData,
    },
    #[error(
        "attestation in slot {attestation_slot} is included too early for state at slot \
         {state_slot} (minimum inclusion delay: {min_delay})"
    )]
    AttestationIncludedTooEarly {
        attestation_slot: Slot,
        state_slot: Slot,
        min_delay: u64,
    },
    #[error(
        "attestation in slot {attestation_slot} is included too late \
         for state at slot {state_slot}"
    )]
    AttestationIncludedTooLate {
        attestation_slot: Slot,
        state_slot: Slot,
    },
    #[error(
        "attestation source does not match justified checkpoint \
         (in_state: {in_state:?}, in_block: {in_block:?})"
    )]
    AttestationSourceMismatch {
        in_state: Checkpoint,
        in_block: Checkpoint,
    },
    #[error(
        "attestation target epoch ({target_epoch}) does not match \
         epoch of attestation slot ({slot_epoch})"
    )]
    AttestationTargetEpochMismatch {
        target_epoch: Epoch,
        slot_epoch: Epoch,
    },
    #[error(
        "attestation votes for a checkpoint in the wrong epoch \
         (attestation_epoch: {attestation_epoch}, previous_epoch: {previous_epoch}, \
         current_epoch: {current_epoch})"
    )]
    AttestationTargetsWrongEpoch {
        attestation_epoch: Epoch,
        previous_epoch: Epoch,
        current_epoch: Epoch,
    },
    #[error("block is not newer than latest block header ({block_slot} <= {block_header_slot})")]
    BlockNotNewerThanLatestBlockHeader {
        block_slot: Slot,
        block_header_slot: Slot,
    },
    #[error("committee index {index} is out of bounds ({committee_count} committees)")]
    CommitteeIndexOutOfBounds { index: u64, committee_count: u64 },
    #[error("deposit count is incorrect (computed: {computed}, in_block: {in_block})")]
    DepositCountMismatch { computed: u64, in_block: u64 },
    #[error("deposit proof is invalid: {deposit:?}")]
    DepositProofInvalid {
        // Boxed to pass `clippy::large_enum_variant`.
        deposit: Box<Deposit>,
    },
    #[error(
        "parent hash in execution payload ({in_block:?}) \
         does not match latest execution payload header ({in_state:?})"
    )]
    ExecutionPayloadParentHashMismatch { in_state: H256, in_block: H256 },
    #[error(
        "previous RANDAO mix in execution payload is incorrect \
         (in_state: {in_state:?}, in_block: {in_block:?})"
    )]
    ExecutionPayloadPrevRandaoMismatch { in_state: H256, in_block: H256 },
    #[error(
        "timestamp in execution payload is incorrect \
         (computed: {computed}, in_block: {in_block})"
    )]
    ExecutionPayloadTimestampMismatch {
        computed: UnixSeconds,
        in_block: UnixSeconds,
    },
    #[error("sync committee member is not in the validator registry: {public_key:?}")]
    ImpossibleScenarioPubkeyNotInRegistry {
        // Boxed to pass `clippy::large_enum_variant`.
        public_key: Box<PublicKeyBytes>,
    },
    #[error("no attesters slashed")]
    NoSlashableIndices,
    #[error("block parent root ({in_block:?}) does not match latest block header ({computed:?})")]
    ParentRootMismatch { computed: H256, in_block: H256 },
    #[error("{block_phase} block cannot be applied to {state_phase} state")]
    PhaseMismatch {
        state_phase: Phase,
        block_phase: Phase,
    },
    #[error("proposer (validator {index}) is slashed")]
    ProposerSlashed { index: ValidatorIndex },
    #[error("proposer index is incorrect (in_block: {in_block}, computed: {computed})")]
    ProposerIndexMismatch {
        computed: ValidatorIndex,
        in_block: ValidatorIndex,
    },
    #[error("proposer (validator {index}) is not slashable: {proposer:?}")]
    ProposerNotSlashable {
        index: ValidatorIndex,
        // Boxed to pass `clippy::large_enum_variant`.
        proposer: Box<Validator>,
    },
    #[error("block headers in proposer slashing are identical: {header:?}")]
    ProposerSlashingHeadersIdentical { header: BeaconBlockHeader },
    #[error(
        "proposer indices in proposer slashing do not match \
         ({proposer_index_1} != {proposer_index_2})"
    )]
    ProposerSlashingProposerMismatch {
        proposer_index_1: ValidatorIndex,
        proposer_index_2: ValidatorIndex,
    },
    #[error("slots in proposer slashing do not match ({slot_1} != {slot_2})")]
    ProposerSlashingSlotMismatch { slot_1: Slot, slot_2: Slot },
    #[error("block slot ({block_slot}) does not match state slot ({state_slot})")]
    SlotMismatch { state_slot: Slot, block_slot: Slot },
    #[error("target slot ({target}) is not later than current slot ({current})")]
    SlotNotLater { current: Slot, target: Slot },
    #[error("slot processing stalled at slot {current} before reaching slot {target}")]
    SlotProcessingStalled { current: Slot, target: Slot },
    #[error("could not validate state root (computed: {computed:?}, in_block: {in_block:?})")]
    StateRootMismatch { computed: H256, in_block: H256 },
    #[error(
        "sync aggregate has {signature_count} signatures \
         for {participant_count} participants"
    )]
    SyncAggregateSignatureCountMismatch {
        signature_count: usize,
        participant_count: usize,
    },
    #[error("too many blob KZG commitments (maximum: {maximum}, in_block: {in_block})")]
    TooManyBlobKzgCommitments { maximum: u64, in_block: usize },
    #[error("validator {index} exited in epoch {exit_epoch}")]
    ValidatorAlreadyExited {
        index: ValidatorIndex,
        exit_epoch: Epoch,
    },
    #[error(
        "validator {index} has not been active long enough \
         (activation_epoch: {activation_epoch}, current_epoch: {current_epoch})"
    )]
    ValidatorHasNotBeenActiveLongEnough {
        index: ValidatorIndex,
        activation_epoch: Epoch,
        current_epoch: Epoch,
    },
    #[error("validator {index} is not active in epoch {current_epoch}")]
    ValidatorNotActive {
        index: ValidatorIndex,
        current_epoch: Epoch,
    },
    #[error("voluntary exit is expired (epoch: {epoch}, current_epoch: {current_epoch})")]
    VoluntaryExitIsExpired { epoch: Epoch, current_epoch: Epoch },
    #[error("withdrawal root is incorrect (computed: {computed:?}, in_block: {in_block:?})")]
    WithdrawalRootMismatch { computed: H256, in_block: H256 },
    #[error(
        "withdrawal credentials computed from block do not match state \
         (in_state: {in_state:?}, in_block: {in_block:?})"
    )]
    WithdrawalCredentialsMismatch { in_state: H256, in_block: H256 },
    #[error("validator {index} does not have Dilithium withdrawal credentials")]
    WithdrawalCredentialsNotDilithium { index: ValidatorIndex },
}
