use dilithium::{PublicKeyBytes, SignatureBytes};
use serde::{Deserialize, Serialize};
use ssz_derive::{Decode, Encode};
use ssz_types::{FixedVector, VariableList};
use tree_hash::TreeHash as _;
use tree_hash_derive::TreeHash;

use crate::{
    altair::containers::SyncAggregate,
    bellatrix::primitives::{Gas, Transaction, Wei},
    capella::primitives::WithdrawalIndex,
    phase0::{
        containers::{
            Attestation, AttesterSlashing, Deposit, Eth1Data, ProposerSlashing,
            SignedVoluntaryExit,
        },
        primitives::{
            ExecutionAddress, ExecutionBlockHash, ExecutionBlockNumber, Gwei, Slot, UnixSeconds,
            ValidatorIndex, H256,
        },
    },
    preset::Preset,
};

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
    pub sync_aggregate: SyncAggregate<P>,
    pub execution_payload: ExecutionPayload<P>,
    pub dilithium_to_execution_changes:
        VariableList<SignedDilithiumToExecutionChange, P::MaxDilithiumToExecutionChanges>,
}

#[derive(
    Clone, Copy, PartialEq, Eq, Default, Debug, Deserialize, Serialize, Encode, Decode, TreeHash,
)]
#[serde(deny_unknown_fields)]
pub struct DilithiumToExecutionChange {
    pub validator_index: ValidatorIndex,
    pub from_dilithium_pubkey: PublicKeyBytes,
    pub to_execution_address: ExecutionAddress,
}

#[derive(Clone, PartialEq, Eq, Default, Debug, Deserialize, Serialize, Encode, Decode, TreeHash)]
#[serde(bound = "", deny_unknown_fields)]
pub struct ExecutionPayload<P: Preset> {
    pub parent_hash: ExecutionBlockHash,
    pub fee_recipient: ExecutionAddress,
    pub state_root: H256,
    pub receipts_root: H256,
    pub logs_bloom: FixedVector<u8, P::BytesPerLogsBloom>,
    pub prev_randao: H256,
    pub block_number: ExecutionBlockNumber,
    pub gas_limit: Gas,
    pub gas_used: Gas,
    pub timestamp: UnixSeconds,
    pub extra_data: VariableList<u8, P::MaxExtraDataBytes>,
    pub base_fee_per_gas: Wei,
    pub block_hash: ExecutionBlockHash,
    pub transactions: VariableList<Transaction<P>, P::MaxTransactionsPerPayload>,
    pub withdrawals: VariableList<Withdrawal, P::MaxWithdrawalsPerPayload>,
}

#[derive(Clone, PartialEq, Eq, Default, Debug, Deserialize, Serialize, Encode, Decode, TreeHash)]
#[serde(bound = "", deny_unknown_fields)]
pub struct ExecutionPayloadHeader<P: Preset> {
    pub parent_hash: ExecutionBlockHash,
    pub fee_recipient: ExecutionAddress,
    pub state_root: H256,
    pub receipts_root: H256,
    pub logs_bloom: FixedVector<u8, P::BytesPerLogsBloom>,
    pub prev_randao: H256,
    pub block_number: ExecutionBlockNumber,
    pub gas_limit: Gas,
    pub gas_used: Gas,
    pub timestamp: UnixSeconds,
    pub extra_data: VariableList<u8, P::MaxExtraDataBytes>,
    pub base_fee_per_gas: Wei,
    pub block_hash: ExecutionBlockHash,
    pub transactions_root: H256,
    pub withdrawals_root: H256,
}

#[derive(
    Clone, Copy, PartialEq, Eq, Default, Debug, Deserialize, Serialize, Encode, Decode, TreeHash,
)]
#[serde(deny_unknown_fields)]
pub struct HistoricalSummary {
    pub block_summary_root: H256,
    pub state_summary_root: H256,
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
pub struct SignedDilithiumToExecutionChange {
    pub message: DilithiumToExecutionChange,
    pub signature: SignatureBytes,
}

#[derive(
    Clone, Copy, PartialEq, Eq, Default, Debug, Deserialize, Serialize, Encode, Decode, TreeHash,
)]
#[serde(deny_unknown_fields)]
pub struct Withdrawal {
    pub index: WithdrawalIndex,
    pub validator_index: ValidatorIndex,
    pub address: ExecutionAddress,
    pub amount: Gwei,
}

impl<P: Preset> From<&ExecutionPayload<P>> for ExecutionPayloadHeader<P> {
    fn from(payload: &ExecutionPayload<P>) -> Self {
        let ExecutionPayload {
            parent_hash,
            fee_recipient,
            state_root,
            receipts_root,
            ref logs_bloom,
            prev_randao,
            block_number,
            gas_limit,
            gas_used,
            timestamp,
            ref extra_data,
            base_fee_per_gas,
            block_hash,
            ref transactions,
            ref withdrawals,
        } = *payload;

        let transactions_root = transactions.tree_hash_root();
        let withdrawals_root = withdrawals.tree_hash_root();

        Self {
            parent_hash,
            fee_recipient,
            state_root,
            receipts_root,
            logs_bloom: logs_bloom.clone(),
            prev_randao,
            block_number,
            gas_limit,
            gas_used,
            timestamp,
            extra_data: extra_data.clone(),
            base_fee_per_gas,
            block_hash,
            transactions_root,
            withdrawals_root,
        }
    }
}
