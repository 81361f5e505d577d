// `tree_hash::TreeHash` is not object safe, so none of the traits below use it as a supertrait.
// They expose `hash_tree_root` instead, which lets them be used as trait objects.

use core::fmt::Debug;
use std::sync::Arc;

use dilithium::SignatureBytes;
use duplicate::duplicate_item;
use ssz_types::{BitVector, VariableList};
use tree_hash::TreeHash as _;

use crate::{
    altair::{
        beacon_state::BeaconState as AltairBeaconState,
        containers::{
            BeaconBlock as AltairBeaconBlock, BeaconBlockBody as AltairBeaconBlockBody,
            SignedBeaconBlock as AltairSignedBeaconBlock, SyncAggregate, SyncCommittee,
        },
    },
    bellatrix::{
        beacon_state::BeaconState as BellatrixBeaconState,
        containers::{
            BeaconBlock as BellatrixBeaconBlock, BeaconBlockBody as BellatrixBeaconBlockBody,
            ExecutionPayload as BellatrixExecutionPayload,
            ExecutionPayloadHeader as BellatrixExecutionPayloadHeader,
            SignedBeaconBlock as BellatrixSignedBeaconBlock,
        },
    },
    cache::Cache,
    capella::{
        beacon_state::BeaconState as CapellaBeaconState,
        containers::{
            BeaconBlock as CapellaBeaconBlock, BeaconBlockBody as CapellaBeaconBlockBody,
            ExecutionPayload as CapellaExecutionPayload,
            ExecutionPayloadHeader as CapellaExecutionPayloadHeader,
            SignedBeaconBlock as CapellaSignedBeaconBlock, SignedDilithiumToExecutionChange,
            Withdrawal,
        },
        primitives::WithdrawalIndex,
    },
    collections::{
        Balances, EpochParticipation, Eth1DataVotes, HistoricalRoots, HistoricalSummaries,
        InactivityScores, RandaoMixes, RecentRoots, Slashings, Validators,
    },
    combined::{
        BeaconBlock as CombinedBeaconBlock, BeaconState as CombinedBeaconState,
        SignedBeaconBlock as CombinedSignedBeaconBlock,
    },
    deneb::{
        beacon_state::BeaconState as DenebBeaconState,
        containers::{
            BeaconBlock as DenebBeaconBlock, BeaconBlockBody as DenebBeaconBlockBody,
            ExecutionPayload as DenebExecutionPayload,
            ExecutionPayloadHeader as DenebExecutionPayloadHeader,
            SignedBeaconBlock as DenebSignedBeaconBlock,
        },
        primitives::KzgCommitment,
    },
    nonstandard::Phase,
    phase0::{
        beacon_state::BeaconState as Phase0BeaconState,
        consts::JustificationBitsLength,
        containers::{
            Attestation, AttesterSlashing, BeaconBlock as Phase0BeaconBlock,
            BeaconBlockBody as Phase0BeaconBlockBody, BeaconBlockHeader, Checkpoint, Deposit,
            Eth1Data, Fork, ProposerSlashing, SignedBeaconBlock as Phase0SignedBeaconBlock,
            SignedVoluntaryExit,
        },
        primitives::{
            DepositIndex, ExecutionBlockHash, ExecutionBlockNumber, Slot, UnixSeconds,
            ValidatorIndex, H256,
        },
    },
    preset::Preset,
};

pub trait BeaconState<P: Preset>: Send + Sync {
    fn genesis_time(&self) -> UnixSeconds;
    fn genesis_validators_root(&self) -> H256;
    fn slot(&self) -> Slot;
    fn fork(&self) -> Fork;
    fn latest_block_header(&self) -> BeaconBlockHeader;
    fn block_roots(&self) -> &RecentRoots<P>;
    fn state_roots(&self) -> &RecentRoots<P>;
    fn historical_roots(&self) -> &HistoricalRoots<P>;
    fn eth1_data(&self) -> Eth1Data;
    fn eth1_data_votes(&self) -> &Eth1DataVotes<P>;
    fn eth1_deposit_index(&self) -> DepositIndex;
    fn validators(&self) -> &Validators<P>;
    fn balances(&self) -> &Balances<P>;
    fn randao_mixes(&self) -> &RandaoMixes<P>;
    fn slashings(&self) -> &Slashings<P>;
    fn justification_bits(&self) -> &BitVector<JustificationBitsLength>;
    fn previous_justified_checkpoint(&self) -> Checkpoint;
    fn current_justified_checkpoint(&self) -> Checkpoint;
    fn finalized_checkpoint(&self) -> Checkpoint;
    fn cache(&self) -> &Cache;

    fn genesis_time_mut(&mut self) -> &mut UnixSeconds;
    fn genesis_validators_root_mut(&mut self) -> &mut H256;
    fn slot_mut(&mut self) -> &mut Slot;
    fn fork_mut(&mut self) -> &mut Fork;
    fn latest_block_header_mut(&mut self) -> &mut BeaconBlockHeader;
    fn block_roots_mut(&mut self) -> &mut RecentRoots<P>;
    fn state_roots_mut(&mut self) -> &mut RecentRoots<P>;
    fn historical_roots_mut(&mut self) -> &mut HistoricalRoots<P>;
    fn eth1_data_mut(&mut self) -> &mut Eth1Data;
    fn eth1_data_votes_mut(&mut self) -> &mut Eth1DataVotes<P>;
    fn eth1_deposit_index_mut(&mut self) -> &mut DepositIndex;
    fn validators_mut(&mut self) -> &mut Validators<P>;
    fn balances_mut(&mut self) -> &mut Balances<P>;
    fn randao_mixes_mut(&mut self) -> &mut RandaoMixes<P>;
    fn slashings_mut(&mut self) -> &mut Slashings<P>;
    fn justification_bits_mut(&mut self) -> &mut BitVector<JustificationBitsLength>;
    fn previous_justified_checkpoint_mut(&mut self) -> &mut Checkpoint;
    fn current_justified_checkpoint_mut(&mut self) -> &mut Checkpoint;
    fn finalized_checkpoint_mut(&mut self) -> &mut Checkpoint;
    fn cache_mut(&mut self) -> &mut Cache;

    // Borrowing two fields through separate trait methods would borrow the whole state twice.
    fn validators_mut_with_balances(&mut self) -> (&mut Validators<P>, &Balances<P>);
    fn balances_mut_with_slashings(&mut self) -> (&mut Balances<P>, &Slashings<P>);

    fn phase(&self) -> Phase;
    fn hash_tree_root(&self) -> H256;

    fn is_post_deneb(&self) -> bool {
        self.phase() >= Phase::Deneb
    }
}

#[duplicate_item(
    implementor
    get_copy(field)
    get_ref(field)
    get_ref_mut(field)
    validators_mut_with_balances_body
    balances_mut_with_slashings_body
    phase_body
    hash_tree_root_body;

    [Phase0BeaconState<P>]
    [self.field]
    [&self.field]
    [&mut self.field]
    [(&mut self.validators, &self.balances)]
    [(&mut self.balances, &self.slashings)]
    [Phase::Phase0]
    [self.tree_hash_root()];

    [AltairBeaconState<P>]
    [self.field]
    [&self.field]
    [&mut self.field]
    [(&mut self.validators, &self.balances)]
    [(&mut self.balances, &self.slashings)]
    [Phase::Altair]
    [self.tree_hash_root()];

    [BellatrixBeaconState<P>]
    [self.field]
    [&self.field]
    [&mut self.field]
    [(&mut self.validators, &self.balances)]
    [(&mut self.balances, &self.slashings)]
    [Phase::Bellatrix]
    [self.tree_hash_root()];

    [CapellaBeaconState<P>]
    [self.field]
    [&self.field]
    [&mut self.field]
    [(&mut self.validators, &self.balances)]
    [(&mut self.balances, &self.slashings)]
    [Phase::Capella]
    [self.tree_hash_root()];

    [DenebBeaconState<P>]
    [self.field]
    [&self.field]
    [&mut self.field]
    [(&mut self.validators, &self.balances)]
    [(&mut self.balances, &self.slashings)]
    [Phase::Deneb]
    [self.tree_hash_root()];

    [CombinedBeaconState<P>]
    [
        match self {
            Self::Phase0(state) => state.field,
            Self::Altair(state) => state.field,
            Self::Bellatrix(state) => state.field,
            Self::Capella(state) => state.field,
            Self::Deneb(state) => state.field,
        }
    ]
    [
        match self {
            Self::Phase0(state) => &state.field,
            Self::Altair(state) => &state.field,
            Self::Bellatrix(state) => &state.field,
            Self::Capella(state) => &state.field,
            Self::Deneb(state) => &state.field,
        }
    ]
    [
        match self {
            Self::Phase0(state) => &mut state.field,
            Self::Altair(state) => &mut state.field,
            Self::Bellatrix(state) => &mut state.field,
            Self::Capella(state) => &mut state.field,
            Self::Deneb(state) => &mut state.field,
        }
    ]
    [
        match self {
            Self::Phase0(state) => state.validators_mut_with_balances(),
            Self::Altair(state) => state.validators_mut_with_balances(),
            Self::Bellatrix(state) => state.validators_mut_with_balances(),
            Self::Capella(state) => state.validators_mut_with_balances(),
            Self::Deneb(state) => state.validators_mut_with_balances(),
        }
    ]
    [
        match self {
            Self::Phase0(state) => state.balances_mut_with_slashings(),
            Self::Altair(state) => state.balances_mut_with_slashings(),
            Self::Bellatrix(state) => state.balances_mut_with_slashings(),
            Self::Capella(state) => state.balances_mut_with_slashings(),
            Self::Deneb(state) => state.balances_mut_with_slashings(),
        }
    ]
    [
        match self {
            Self::Phase0(_) => Phase::Phase0,
            Self::Altair(_) => Phase::Altair,
            Self::Bellatrix(_) => Phase::Bellatrix,
            Self::Capella(_) => Phase::Capella,
            Self::Deneb(_) => Phase::Deneb,
        }
    ]
    [
        match self {
            Self::Phase0(state) => state.tree_hash_root(),
            Self::Altair(state) => state.tree_hash_root(),
            Self::Bellatrix(state) => state.tree_hash_root(),
            Self::Capella(state) => state.tree_hash_root(),
            Self::Deneb(state) => state.tree_hash_root(),
        }
    ];
)]
impl<P: Preset> BeaconState<P> for implementor {
    #[duplicate_item(
        field                           return_type;
        [genesis_time]                  [UnixSeconds];
        [genesis_validators_root]       [H256];
        [slot]                          [Slot];
        [fork]                          [Fork];
        [latest_block_header]           [BeaconBlockHeader];
        [eth1_data]                     [Eth1Data];
        [eth1_deposit_index]            [DepositIndex];
        [previous_justified_checkpoint] [Checkpoint];
        [current_justified_checkpoint]  [Checkpoint];
        [finalized_checkpoint]          [Checkpoint];
    )]
    fn field(&self) -> return_type {
        get_copy([field])
    }

    #[duplicate_item(
        field                return_type;
        [block_roots]        [RecentRoots<P>];
        [state_roots]        [RecentRoots<P>];
        [historical_roots]   [HistoricalRoots<P>];
        [eth1_data_votes]    [Eth1DataVotes<P>];
        [validators]         [Validators<P>];
        [balances]           [Balances<P>];
        [randao_mixes]       [RandaoMixes<P>];
        [slashings]          [Slashings<P>];
        [justification_bits] [BitVector<JustificationBitsLength>];
        [cache]              [Cache];
    )]
    fn field(&self) -> &return_type {
        get_ref([field])
    }

    #[duplicate_item(
        field                           method                              return_type;
        [genesis_time]                  [genesis_time_mut]                  [UnixSeconds];
        [genesis_validators_root]       [genesis_validators_root_mut]       [H256];
        [slot]                          [slot_mut]                          [Slot];
        [fork]                          [fork_mut]                          [Fork];
        [latest_block_header]           [latest_block_header_mut]           [BeaconBlockHeader];
        [block_roots]                   [block_roots_mut]                   [RecentRoots<P>];
        [state_roots]                   [state_roots_mut]                   [RecentRoots<P>];
        [historical_roots]              [historical_roots_mut]              [HistoricalRoots<P>];
        [eth1_data]                     [eth1_data_mut]                     [Eth1Data];
        [eth1_data_votes]               [eth1_data_votes_mut]               [Eth1DataVotes<P>];
        [eth1_deposit_index]            [eth1_deposit_index_mut]            [DepositIndex];
        [validators]                    [validators_mut]                    [Validators<P>];
        [balances]                      [balances_mut]                      [Balances<P>];
        [randao_mixes]                  [randao_mixes_mut]                  [RandaoMixes<P>];
        [slashings]                     [slashings_mut]                     [Slashings<P>];
        [justification_bits]            [justification_bits_mut]            [BitVector<JustificationBitsLength>];
        [previous_justified_checkpoint] [previous_justified_checkpoint_mut] [Checkpoint];
        [current_justified_checkpoint]  [current_justified_checkpoint_mut]  [Checkpoint];
        [finalized_checkpoint]          [finalized_checkpoint_mut]          [Checkpoint];
        [cache]                         [cache_mut]                         [Cache];
    )]
    fn method(&mut self) -> &mut return_type {
        get_ref_mut([field])
    }

    fn validators_mut_with_balances(&mut self) -> (&mut Validators<P>, &Balances<P>) {
        validators_mut_with_balances_body
    }

    fn balances_mut_with_slashings(&mut self) -> (&mut Balances<P>, &Slashings<P>) {
        balances_mut_with_slashings_body
    }

    fn phase(&self) -> Phase {
        phase_body
    }

    fn hash_tree_root(&self) -> H256 {
        hash_tree_root_body
    }
}

pub trait PostAltairBeaconState<P: Preset>: BeaconState<P> {
    fn previous_epoch_participation(&self) -> &EpochParticipation<P>;
    fn current_epoch_participation(&self) -> &EpochParticipation<P>;
    fn inactivity_scores(&self) -> &InactivityScores<P>;
    fn current_sync_committee(&self) -> &Arc<SyncCommittee<P>>;
    fn next_sync_committee(&self) -> &Arc<SyncCommittee<P>>;

    fn previous_epoch_participation_mut(&mut self) -> &mut EpochParticipation<P>;
    fn current_epoch_participation_mut(&mut self) -> &mut EpochParticipation<P>;
    fn inactivity_scores_mut(&mut self) -> &mut InactivityScores<P>;
    fn current_sync_committee_mut(&mut self) -> &mut Arc<SyncCommittee<P>>;
    fn next_sync_committee_mut(&mut self) -> &mut Arc<SyncCommittee<P>>;
}

#[duplicate_item(
    implementor;
    [AltairBeaconState<P>];
    [BellatrixBeaconState<P>];
    [CapellaBeaconState<P>];
    [DenebBeaconState<P>];
)]
impl<P: Preset> PostAltairBeaconState<P> for implementor {
    #[duplicate_item(
        field                          return_type;
        [previous_epoch_participation] [EpochParticipation<P>];
        [current_epoch_participation]  [EpochParticipation<P>];
        [inactivity_scores]            [InactivityScores<P>];
        [current_sync_committee]       [Arc<SyncCommittee<P>>];
        [next_sync_committee]          [Arc<SyncCommittee<P>>];
    )]
    fn field(&self) -> &return_type {
        &self.field
    }

    #[duplicate_item(
        field                          method                             return_type;
        [previous_epoch_participation] [previous_epoch_participation_mut] [EpochParticipation<P>];
        [current_epoch_participation]  [current_epoch_participation_mut]  [EpochParticipation<P>];
        [inactivity_scores]            [inactivity_scores_mut]            [InactivityScores<P>];
        [current_sync_committee]       [current_sync_committee_mut]       [Arc<SyncCommittee<P>>];
        [next_sync_committee]          [next_sync_committee_mut]          [Arc<SyncCommittee<P>>];
    )]
    fn method(&mut self) -> &mut return_type {
        &mut self.field
    }
}

pub trait PostBellatrixBeaconState<P: Preset>: PostAltairBeaconState<P> {
    fn latest_execution_payload_header(&self) -> &dyn ExecutionPayload<P>;
}

#[duplicate_item(
    implementor;
    [BellatrixBeaconState<P>];
    [CapellaBeaconState<P>];
    [DenebBeaconState<P>];
)]
impl<P: Preset> PostBellatrixBeaconState<P> for implementor {
    fn latest_execution_payload_header(&self) -> &dyn ExecutionPayload<P> {
        &self.latest_execution_payload_header
    }
}

pub trait PostCapellaBeaconState<P: Preset>: PostBellatrixBeaconState<P> {
    fn next_withdrawal_index(&self) -> WithdrawalIndex;
    fn next_withdrawal_validator_index(&self) -> ValidatorIndex;
    fn historical_summaries(&self) -> &HistoricalSummaries<P>;

    fn next_withdrawal_index_mut(&mut self) -> &mut WithdrawalIndex;
    fn next_withdrawal_validator_index_mut(&mut self) -> &mut ValidatorIndex;
    fn historical_summaries_mut(&mut self) -> &mut HistoricalSummaries<P>;
}

#[duplicate_item(
    implementor;
    [CapellaBeaconState<P>];
    [DenebBeaconState<P>];
)]
impl<P: Preset> PostCapellaBeaconState<P> for implementor {
    fn next_withdrawal_index(&self) -> WithdrawalIndex {
        self.next_withdrawal_index
    }

    fn next_withdrawal_validator_index(&self) -> ValidatorIndex {
        self.next_withdrawal_validator_index
    }

    fn historical_summaries(&self) -> &HistoricalSummaries<P> {
        &self.historical_summaries
    }

    fn next_withdrawal_index_mut(&mut self) -> &mut WithdrawalIndex {
        &mut self.next_withdrawal_index
    }

    fn next_withdrawal_validator_index_mut(&mut self) -> &mut ValidatorIndex {
        &mut self.next_withdrawal_validator_index
    }

    fn historical_summaries_mut(&mut self) -> &mut HistoricalSummaries<P> {
        &mut self.historical_summaries
    }
}

/// Read-only view of a signed block of any phase.
pub trait SignedBeaconBlock<P: Preset>: Debug + Send + Sync {
    type Message: BeaconBlock<P> + ?Sized;

    fn message(&self) -> &Self::Message;
    fn signature(&self) -> SignatureBytes;

    fn slot(&self) -> Slot {
        self.message().slot()
    }

    fn proposer_index(&self) -> ValidatorIndex {
        self.message().proposer_index()
    }

    fn parent_root(&self) -> H256 {
        self.message().parent_root()
    }

    fn state_root(&self) -> H256 {
        self.message().state_root()
    }

    fn phase(&self) -> Phase {
        self.message().phase()
    }
}

#[duplicate_item(
    implementor                     message_type;
    [Phase0SignedBeaconBlock<P>]    [Phase0BeaconBlock<P>];
    [AltairSignedBeaconBlock<P>]    [AltairBeaconBlock<P>];
    [BellatrixSignedBeaconBlock<P>] [BellatrixBeaconBlock<P>];
    [CapellaSignedBeaconBlock<P>]   [CapellaBeaconBlock<P>];
    [DenebSignedBeaconBlock<P>]     [DenebBeaconBlock<P>];
)]
impl<P: Preset> SignedBeaconBlock<P> for implementor {
    type Message = message_type;

    fn message(&self) -> &Self::Message {
        &self.message
    }

    fn signature(&self) -> SignatureBytes {
        self.signature
    }
}

impl<P: Preset> SignedBeaconBlock<P> for CombinedSignedBeaconBlock<P> {
    type Message = dyn BeaconBlock<P>;

    fn message(&self) -> &Self::Message {
        match self {
            Self::Phase0(block) => &block.message,
            Self::Altair(block) => &block.message,
            Self::Bellatrix(block) => &block.message,
            Self::Capella(block) => &block.message,
            Self::Deneb(block) => &block.message,
        }
    }

    fn signature(&self) -> SignatureBytes {
        match self {
            Self::Phase0(block) => block.signature,
            Self::Altair(block) => block.signature,
            Self::Bellatrix(block) => block.signature,
            Self::Capella(block) => block.signature,
            Self::Deneb(block) => block.signature,
        }
    }
}

pub trait BeaconBlock<P: Preset>: Send + Sync {
    fn slot(&self) -> Slot;
    fn proposer_index(&self) -> ValidatorIndex;
    fn parent_root(&self) -> H256;
    fn state_root(&self) -> H256;
    fn body(&self) -> &dyn BeaconBlockBody<P>;
    fn phase(&self) -> Phase;
    fn hash_tree_root(&self) -> H256;

    fn to_header(&self) -> BeaconBlockHeader {
        BeaconBlockHeader {
            slot: self.slot(),
            proposer_index: self.proposer_index(),
            parent_root: self.parent_root(),
            state_root: self.state_root(),
            body_root: self.body().hash_tree_root(),
        }
    }
}

#[duplicate_item(
    implementor               get_copy(field) get_ref(field) phase_body         hash_tree_root_body;
    [Phase0BeaconBlock<P>]    [self.field]    [&self.field]  [Phase::Phase0]    [self.tree_hash_root()];
    [AltairBeaconBlock<P>]    [self.field]    [&self.field]  [Phase::Altair]    [self.tree_hash_root()];
    [BellatrixBeaconBlock<P>] [self.field]    [&self.field]  [Phase::Bellatrix] [self.tree_hash_root()];
    [CapellaBeaconBlock<P>]   [self.field]    [&self.field]  [Phase::Capella]   [self.tree_hash_root()];
    [DenebBeaconBlock<P>]     [self.field]    [&self.field]  [Phase::Deneb]     [self.tree_hash_root()];

    [CombinedBeaconBlock<P>]
    [
        match self {
            Self::Phase0(block) => block.field,
            Self::Altair(block) => block.field,
            Self::Bellatrix(block) => block.field,
            Self::Capella(block) => block.field,
            Self::Deneb(block) => block.field,
        }
    ]
    [
        match self {
            Self::Phase0(block) => &block.field,
            Self::Altair(block) => &block.field,
            Self::Bellatrix(block) => &block.field,
            Self::Capella(block) => &block.field,
            Self::Deneb(block) => &block.field,
        }
    ]
    [
        match self {
            Self::Phase0(_) => Phase::Phase0,
            Self::Altair(_) => Phase::Altair,
            Self::Bellatrix(_) => Phase::Bellatrix,
            Self::Capella(_) => Phase::Capella,
            Self::Deneb(_) => Phase::Deneb,
        }
    ]
    [
        match self {
            Self::Phase0(block) => block.tree_hash_root(),
            Self::Altair(block) => block.tree_hash_root(),
            Self::Bellatrix(block) => block.tree_hash_root(),
            Self::Capella(block) => block.tree_hash_root(),
            Self::Deneb(block) => block.tree_hash_root(),
        }
    ];
)]
impl<P: Preset> BeaconBlock<P> for implementor {
    fn slot(&self) -> Slot {
        get_copy([slot])
    }

    fn proposer_index(&self) -> ValidatorIndex {
        get_copy([proposer_index])
    }

    fn parent_root(&self) -> H256 {
        get_copy([parent_root])
    }

    fn state_root(&self) -> H256 {
        get_copy([state_root])
    }

    fn body(&self) -> &dyn BeaconBlockBody<P> {
        get_ref([body])
    }

    fn phase(&self) -> Phase {
        phase_body
    }

    fn hash_tree_root(&self) -> H256 {
        hash_tree_root_body
    }
}

pub trait BeaconBlockBody<P: Preset>: Send + Sync {
    fn randao_reveal(&self) -> SignatureBytes;
    fn eth1_data(&self) -> Eth1Data;
    fn graffiti(&self) -> H256;
    fn proposer_slashings(&self) -> &VariableList<ProposerSlashing, P::MaxProposerSlashings>;
    fn attester_slashings(&self) -> &VariableList<AttesterSlashing<P>, P::MaxAttesterSlashings>;
    fn attestations(&self) -> &VariableList<Attestation<P>, P::MaxAttestations>;
    fn deposits(&self) -> &VariableList<Deposit, P::MaxDeposits>;
    fn voluntary_exits(&self) -> &VariableList<SignedVoluntaryExit, P::MaxVoluntaryExits>;
    fn hash_tree_root(&self) -> H256;

    fn post_altair(&self) -> Option<&dyn PostAltairBeaconBlockBody<P>>;
    fn post_bellatrix(&self) -> Option<&dyn PostBellatrixBeaconBlockBody<P>>;
    fn post_capella(&self) -> Option<&dyn PostCapellaBeaconBlockBody<P>>;
    fn post_deneb(&self) -> Option<&dyn PostDenebBeaconBlockBody<P>>;
}

#[duplicate_item(
    implementor                   post_altair_body post_bellatrix_body post_capella_body post_deneb_body;
    [Phase0BeaconBlockBody<P>]    [None]           [None]              [None]            [None];
    [AltairBeaconBlockBody<P>]    [Some(self)]     [None]              [None]            [None];
    [BellatrixBeaconBlockBody<P>] [Some(self)]     [Some(self)]        [None]            [None];
    [CapellaBeaconBlockBody<P>]   [Some(self)]     [Some(self)]        [Some(self)]      [None];
    [DenebBeaconBlockBody<P>]     [Some(self)]     [Some(self)]        [Some(self)]      [Some(self)];
)]
impl<P: Preset> BeaconBlockBody<P> for implementor {
    fn randao_reveal(&self) -> SignatureBytes {
        self.randao_reveal
    }

    fn eth1_data(&self) -> Eth1Data {
        self.eth1_data
    }

    fn graffiti(&self) -> H256 {
        self.graffiti
    }

    fn proposer_slashings(&self) -> &VariableList<ProposerSlashing, P::MaxProposerSlashings> {
        &self.proposer_slashings
    }

    fn attester_slashings(&self) -> &VariableList<AttesterSlashing<P>, P::MaxAttesterSlashings> {
        &self.attester_slashings
    }

    fn attestations(&self) -> &VariableList<Attestation<P>, P::MaxAttestations> {
        &self.attestations
    }

    fn deposits(&self) -> &VariableList<Deposit, P::MaxDeposits> {
        &self.deposits
    }

    fn voluntary_exits(&self) -> &VariableList<SignedVoluntaryExit, P::MaxVoluntaryExits> {
        &self.voluntary_exits
    }

    fn hash_tree_root(&self) -> H256 {
        self.tree_hash_root()
    }

    fn post_altair(&self) -> Option<&dyn PostAltairBeaconBlockBody<P>> {
        post_altair_body
    }

    fn post_bellatrix(&self) -> Option<&dyn PostBellatrixBeaconBlockBody<P>> {
        post_bellatrix_body
    }

    fn post_capella(&self) -> Option<&dyn PostCapellaBeaconBlockBody<P>> {
        post_capella_body
    }

    fn post_deneb(&self) -> Option<&dyn PostDenebBeaconBlockBody<P>> {
        post_deneb_body
    }
}

pub trait PostAltairBeaconBlockBody<P: Preset>: BeaconBlockBody<P> {
    fn sync_aggregate(&self) -> &SyncAggregate<P>;
}

#[duplicate_item(
    implementor;
    [AltairBeaconBlockBody<P>];
    [BellatrixBeaconBlockBody<P>];
    [CapellaBeaconBlockBody<P>];
    [DenebBeaconBlockBody<P>];
)]
impl<P: Preset> PostAltairBeaconBlockBody<P> for implementor {
    fn sync_aggregate(&self) -> &SyncAggregate<P> {
        &self.sync_aggregate
    }
}

pub trait PostBellatrixBeaconBlockBody<P: Preset>: PostAltairBeaconBlockBody<P> {
    fn execution_payload(&self) -> &dyn ExecutionPayload<P>;
}

#[duplicate_item(
    implementor;
    [BellatrixBeaconBlockBody<P>];
    [CapellaBeaconBlockBody<P>];
    [DenebBeaconBlockBody<P>];
)]
impl<P: Preset> PostBellatrixBeaconBlockBody<P> for implementor {
    fn execution_payload(&self) -> &dyn ExecutionPayload<P> {
        &self.execution_payload
    }
}

pub trait PostCapellaBeaconBlockBody<P: Preset>: PostBellatrixBeaconBlockBody<P> {
    fn dilithium_to_execution_changes(
        &self,
    ) -> &VariableList<SignedDilithiumToExecutionChange, P::MaxDilithiumToExecutionChanges>;
}

#[duplicate_item(
    implementor;
    [CapellaBeaconBlockBody<P>];
    [DenebBeaconBlockBody<P>];
)]
impl<P: Preset> PostCapellaBeaconBlockBody<P> for implementor {
    fn dilithium_to_execution_changes(
        &self,
    ) -> &VariableList<SignedDilithiumToExecutionChange, P::MaxDilithiumToExecutionChanges> {
        &self.dilithium_to_execution_changes
    }
}

pub trait PostDenebBeaconBlockBody<P: Preset>: PostCapellaBeaconBlockBody<P> {
    fn blob_kzg_commitments(&self) -> &VariableList<KzgCommitment, P::MaxBlobCommitmentsPerBlock>;
}

impl<P: Preset> PostDenebBeaconBlockBody<P> for DenebBeaconBlockBody<P> {
    fn blob_kzg_commitments(&self) -> &VariableList<KzgCommitment, P::MaxBlobCommitmentsPerBlock> {
        &self.blob_kzg_commitments
    }
}

/// Fields shared by execution payloads and their headers.
pub trait ExecutionPayload<P: Preset>: Send + Sync {
    fn parent_hash(&self) -> ExecutionBlockHash;
    fn prev_randao(&self) -> H256;
    fn block_number(&self) -> ExecutionBlockNumber;
    fn timestamp(&self) -> UnixSeconds;
    fn block_hash(&self) -> ExecutionBlockHash;
    fn is_default_payload(&self) -> bool;
    fn hash_tree_root(&self) -> H256;
}

#[duplicate_item(
    implementor;
    [BellatrixExecutionPayload<P>];
    [BellatrixExecutionPayloadHeader<P>];
    [CapellaExecutionPayload<P>];
    [CapellaExecutionPayloadHeader<P>];
    [DenebExecutionPayload<P>];
    [DenebExecutionPayloadHeader<P>];
)]
impl<P: Preset> ExecutionPayload<P> for implementor {
    fn parent_hash(&self) -> ExecutionBlockHash {
        self.parent_hash
    }

    fn prev_randao(&self) -> H256 {
        self.prev_randao
    }

    fn block_number(&self) -> ExecutionBlockNumber {
        self.block_number
    }

    fn timestamp(&self) -> UnixSeconds {
        self.timestamp
    }

    fn block_hash(&self) -> ExecutionBlockHash {
        self.block_hash
    }

    fn is_default_payload(&self) -> bool {
        *self == Self::default()
    }

    fn hash_tree_root(&self) -> H256 {
        self.tree_hash_root()
    }
}

pub trait PostCapellaExecutionPayload<P: Preset>: ExecutionPayload<P> {
    fn withdrawals(&self) -> &VariableList<Withdrawal, P::MaxWithdrawalsPerPayload>;
}

#[duplicate_item(
    implementor;
    [CapellaExecutionPayload<P>];
    [DenebExecutionPayload<P>];
)]
impl<P: Preset> PostCapellaExecutionPayload<P> for implementor {
    fn withdrawals(&self) -> &VariableList<Withdrawal, P::MaxWithdrawalsPerPayload> {
        &self.withdrawals
    }
}

pub trait PostCapellaExecutionPayloadHeader<P: Preset>: ExecutionPayload<P> {
    fn withdrawals_root(&self) -> H256;
}

#[duplicate_item(
    implementor;
    [CapellaExecutionPayloadHeader<P>];
    [DenebExecutionPayloadHeader<P>];
)]
impl<P: Preset> PostCapellaExecutionPayloadHeader<P> for implementor {
    fn withdrawals_root(&self) -> H256 {
        self.withdrawals_root
    }
}
