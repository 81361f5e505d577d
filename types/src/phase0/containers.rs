use dilithium::{PublicKeyBytes, SignatureBytes};
use serde::{Deserialize, Serialize};
use ssz_derive::{Decode, Encode};
use ssz_types::{BitList, FixedVector, VariableList};
use tree_hash_derive::TreeHash;

use crate::{
    collections::RecentRoots,
    phase0::{
        consts::DepositProofLength,
        primitives::{
            CommitteeIndex, DepositIndex, Epoch, ExecutionBlockHash, Gwei, Slot, ValidatorIndex,
            Version, H256,
        },
    },
    preset::Preset,
};

// Containers store `PublicKeyBytes` and `SignatureBytes` and only decode them when verifying.
// Blocks may carry malformed keys and signatures, and rejecting them is part of the transition.
//
// Dilithium signatures cannot be aggregated. Wherever an aggregate signature would appear there is
// a list with one signature per participant, ordered the same way as the participants.

#[derive(Clone, PartialEq, Eq, Debug, Deserialize, Serialize, Encode, Decode, TreeHash)]
#[serde(bound = "", deny_unknown_fields)]
pub struct Attestation<P: Preset> {
    pub aggregation_bits: BitList<P::MaxValidatorsPerCommittee>,
    pub data: AttestationData,
    pub signatures: VariableList<SignatureBytes, P::MaxValidatorsPerCommittee>,
}

#[derive(
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Debug,
    Deserialize,
    Serialize,
    Encode,
    Decode,
    TreeHash,
)]
#[serde(deny_unknown_fields)]
pub struct AttestationData {
    pub slot: Slot,
    pub index: CommitteeIndex,
    pub beacon_block_root: H256,
    pub source: Checkpoint,
    pub target: Checkpoint,
}

#[derive(Clone, PartialEq, Eq, Default, Debug, Deserialize, Serialize, Encode, Decode, TreeHash)]
#[serde(bound = "", deny_unknown_fields)]
pub struct AttesterSlashing<P: Preset> {
    pub attestation_1: IndexedAttestation<P>,
    pub attestation_2: IndexedAttestation<P>,
}

#[derive(Clone, PartialEq, Eq, Default, Debug, Deserialize, Serialize, Encode, Decode, TreeHash)]
#[serde(bound = "", deny_unknown_fields)]
pub struct BeaconBlock<P: Preset> {
    pub slot: Slot,
    pub proposer_index: ValidatorIndex,
    pub parent_root: H256,
    pub state_root: H256,
    pub body: BeaconBlockBody<P>,
}

#[derive(Clone, PartialEq, Eq, Default, Debug, Deserialize, Serialize, Encode, Decode, TreeHash)]
#[serde(bound = "", deny_unknown_fields)]
pub struct BeaconBlockBody<P: Preset> {
    pub randao_reveal: SignatureBytes,
    pub eth1_data: Eth1Data,
    pub graffiti: H256,
    pub proposer_slashings: VariableList<ProposerSlashing, P::MaxProposerSlashings>,
    pub attester_slashings: VariableList<AttesterSlashing<P>, P::MaxAttesterSlashings>,
    pub attestations: VariableList<Attestation<P>, P::MaxAttestations>,
    pub deposits: VariableList<Deposit, P::MaxDeposits>,
    pub voluntary_exits: VariableList<SignedVoluntaryExit, P::MaxVoluntaryExits>,
}

#[derive(
    Clone, Copy, PartialEq, Eq, Default, Debug, Deserialize, Serialize, Encode, Decode, TreeHash,
)]
#[serde(deny_unknown_fields)]
pub struct BeaconBlockHeader {
    pub slot: Slot,
    pub proposer_index: ValidatorIndex,
    pub parent_root: H256,
    pub state_root: H256,
    pub body_root: H256,
}

#[derive(
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Default,
    Debug,
    Deserialize,
    Serialize,
    Encode,
    Decode,
    TreeHash,
)]
#[serde(deny_unknown_fields)]
pub struct Checkpoint {
    pub epoch: Epoch,
    pub root: H256,
}

#[derive(Clone, PartialEq, Eq, Default, Debug, Deserialize, Serialize, Encode, Decode, TreeHash)]
#[serde(deny_unknown_fields)]
pub struct Deposit {
    pub proof: FixedVector<H256, DepositProofLength>,
    pub data: DepositData,
}

#[derive(
    Clone, Copy, PartialEq, Eq, Default, Debug, Deserialize, Serialize, Encode, Decode, TreeHash,
)]
#[serde(deny_unknown_fields)]
pub struct DepositData {
    pub pubkey: PublicKeyBytes,
    pub withdrawal_credentials: H256,
    pub amount: Gwei,
    pub signature: SignatureBytes,
}

#[derive(
    Clone, Copy, PartialEq, Eq, Default, Debug, Deserialize, Serialize, Encode, Decode, TreeHash,
)]
#[serde(deny_unknown_fields)]
pub struct DepositMessage {
    pub pubkey: PublicKeyBytes,
    pub withdrawal_credentials: H256,
    pub amount: Gwei,
}

#[derive(
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Debug,
    Deserialize,
    Serialize,
    Encode,
    Decode,
    TreeHash,
)]
#[serde(deny_unknown_fields)]
pub struct Eth1Data {
    pub deposit_root: H256,
    pub deposit_count: DepositIndex,
    pub block_hash: ExecutionBlockHash,
}

#[derive(
    Clone, Copy, PartialEq, Eq, Default, Debug, Deserialize, Serialize, Encode, Decode, TreeHash,
)]
#[serde(deny_unknown_fields)]
pub struct Fork {
    #[serde(with = "crate::serde_utils::prefixed_hex")]
    pub previous_version: Version,
    #[serde(with = "crate::serde_utils::prefixed_hex")]
    pub current_version: Version,
    pub epoch: Epoch,
}

#[derive(
    Clone, Copy, PartialEq, Eq, Default, Debug, Deserialize, Serialize, Encode, Decode, TreeHash,
)]
#[serde(deny_unknown_fields)]
pub struct ForkData {
    #[serde(with = "crate::serde_utils::prefixed_hex")]
    pub current_version: Version,
    pub genesis_validators_root: H256,
}

#[derive(Clone, PartialEq, Eq, Default, Debug, Deserialize, Serialize, Encode, Decode, TreeHash)]
#[serde(bound = "", deny_unknown_fields)]
pub struct HistoricalBatch<P: Preset> {
    pub block_roots: RecentRoots<P>,
    pub state_roots: RecentRoots<P>,
}

#[derive(Clone, PartialEq, Eq, Default, Debug, Deserialize, Serialize, Encode, Decode, TreeHash)]
#[serde(bound = "", deny_unknown_fields)]
pub struct IndexedAttestation<P: Preset> {
    pub attesting_indices: VariableList<ValidatorIndex, P::MaxValidatorsPerCommittee>,
    pub data: AttestationData,
    pub signatures: VariableList<SignatureBytes, P::MaxValidatorsPerCommittee>,
}

#[derive(Clone, PartialEq, Eq, Debug, Deserialize, Serialize, Encode, Decode, TreeHash)]
#[serde(bound = "", deny_unknown_fields)]
pub struct PendingAttestation<P: Preset> {
    pub aggregation_bits: BitList<P::MaxValidatorsPerCommittee>,
    pub data: AttestationData,
    pub inclusion_delay: u64,
    pub proposer_index: ValidatorIndex,
}

#[derive(
    Clone, Copy, PartialEq, Eq, Default, Debug, Deserialize, Serialize, Encode, Decode, TreeHash,
)]
#[serde(deny_unknown_fields)]
pub struct ProposerSlashing {
    pub signed_header_1: SignedBeaconBlockHeader,
    pub signed_header_2: SignedBeaconBlockHeader,
}

#[derive(Clone, PartialEq, Eq, Default, Debug, Deserialize, Serialize, Encode, Decode, TreeHash)]
#[serde(bound = "", deny_unknown_fields)]
pub struct SignedBeaconBlock<P: Preset> {
    pub message: BeaconBlock<P>,
    pub signature: SignatureBytes,
}

#[derive(
    Clone, Copy, PartialEq, Eq, Default, Debug, Deserialize, Serialize, Encode, Decode, TreeHash,
)]
#[serde(deny_unknown_fields)]
pub struct SignedBeaconBlockHeader {
    pub message: BeaconBlockHeader,
    pub signature: SignatureBytes,
}

#[derive(
    Clone, Copy, PartialEq, Eq, Default, Debug, Deserialize, Serialize, Encode, Decode, TreeHash,
)]
#[serde(deny_unknown_fields)]
pub struct SignedVoluntaryExit {
    pub message: VoluntaryExit,
    pub signature: SignatureBytes,
}

#[derive(
    Clone, Copy, PartialEq, Eq, Default, Debug, Deserialize, Serialize, Encode, Decode, TreeHash,
)]
#[serde(deny_unknown_fields)]
pub struct SigningData {
    pub object_root: H256,
    pub domain: H256,
}

#[derive(
    Clone, Copy, PartialEq, Eq, Default, Debug, Deserialize, Serialize, Encode, Decode, TreeHash,
)]
#[serde(deny_unknown_fields)]
pub struct Validator {
    pub pubkey: PublicKeyBytes,
    pub withdrawal_credentials: H256,
    pub effective_balance: Gwei,
    pub slashed: bool,
    pub activation_eligibility_epoch: Epoch,
    pub activation_epoch: Epoch,
    pub exit_epoch: Epoch,
    pub withdrawable_epoch: Epoch,
}

#[derive(
    Clone, Copy, PartialEq, Eq, Default, Debug, Deserialize, Serialize, Encode, Decode, TreeHash,
)]
#[serde(deny_unknown_fields)]
pub struct VoluntaryExit {
    pub epoch: Epoch,
    pub validator_index: ValidatorIndex,
}
