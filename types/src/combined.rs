use std::sync::Arc;

use derive_more::From;
use dilithium::SignatureBytes;
use enum_iterator::Sequence as _;
use serde::{Deserialize, Serialize};
use ssz::{Decode as _, DecodeError, Encode as _};
use static_assertions::const_assert_eq;

use crate::{
    altair::{
        beacon_state::BeaconState as AltairBeaconState,
        containers::{
            BeaconBlock as AltairBeaconBlock, SignedBeaconBlock as AltairSignedBeaconBlock,
            SyncCommittee,
        },
    },
    bellatrix::{
        beacon_state::BeaconState as BellatrixBeaconState,
        containers::{
            BeaconBlock as BellatrixBeaconBlock, SignedBeaconBlock as BellatrixSignedBeaconBlock,
        },
    },
    cache::CommitteeCache,
    capella::{
        beacon_state::BeaconState as CapellaBeaconState,
        containers::{
            BeaconBlock as CapellaBeaconBlock, SignedBeaconBlock as CapellaSignedBeaconBlock,
        },
        primitives::WithdrawalIndex,
    },
    collections::{EpochParticipation, HistoricalSummaries, InactivityScores},
    config::Config,
    deneb::{
        beacon_state::BeaconState as DenebBeaconState,
        containers::{BeaconBlock as DenebBeaconBlock, SignedBeaconBlock as DenebSignedBeaconBlock},
    },
    error::Error,
    nonstandard::Phase,
    phase0::{
        beacon_state::BeaconState as Phase0BeaconState,
        containers::{
            BeaconBlock as Phase0BeaconBlock, SignedBeaconBlock as Phase0SignedBeaconBlock,
            SignedBeaconBlockHeader,
        },
        primitives::{Slot, ValidatorIndex, H256},
    },
    preset::Preset,
    traits::{
        BeaconBlock as _, BeaconState as _, ExecutionPayload, PostAltairBeaconState,
        PostBellatrixBeaconState, PostCapellaBeaconState, SignedBeaconBlock as _,
    },
};

// `state.slot` follows `state.genesis_time` and `state.genesis_validators_root`.
const STATE_SLOT_OFFSET: usize = core::mem::size_of::<u64>() + core::mem::size_of::<H256>();

#[derive(Clone, PartialEq, Eq, Debug, From, Serialize)]
#[serde(bound = "", untagged)]
pub enum BeaconState<P: Preset> {
    Phase0(Phase0BeaconState<P>),
    Altair(AltairBeaconState<P>),
    Bellatrix(BellatrixBeaconState<P>),
    Capella(CapellaBeaconState<P>),
    Deneb(DenebBeaconState<P>),
}

impl<P: Preset> BeaconState<P> {
    /// Decodes a state of the phase that `config` schedules at the encoded slot.
    pub fn from_ssz_bytes(config: &Config, bytes: &[u8]) -> Result<Self, DecodeError> {
        let slot = read_slot(bytes, STATE_SLOT_OFFSET)?;

        let state = match config.phase_at_slot::<P>(slot) {
            Phase::Phase0 => Self::Phase0(Phase0BeaconState::from_ssz_bytes(bytes)?),
            Phase::Altair => Self::Altair(AltairBeaconState::from_ssz_bytes(bytes)?),
            Phase::Bellatrix => Self::Bellatrix(BellatrixBeaconState::from_ssz_bytes(bytes)?),
            Phase::Capella => Self::Capella(CapellaBeaconState::from_ssz_bytes(bytes)?),
            Phase::Deneb => Self::Deneb(DenebBeaconState::from_ssz_bytes(bytes)?),
        };

        Ok(state)
    }

    #[must_use]
    pub fn as_ssz_bytes(&self) -> Vec<u8> {
        match self {
            Self::Phase0(state) => state.as_ssz_bytes(),
            Self::Altair(state) => state.as_ssz_bytes(),
            Self::Bellatrix(state) => state.as_ssz_bytes(),
            Self::Capella(state) => state.as_ssz_bytes(),
            Self::Deneb(state) => state.as_ssz_bytes(),
        }
    }

    pub fn set_committee_cache(&mut self, committee_cache: Arc<CommitteeCache>) {
        self.cache_mut().set_committee_cache(committee_cache);
    }

    #[must_use]
    pub fn post_altair(&self) -> Option<&dyn PostAltairBeaconState<P>> {
        match self {
            Self::Phase0(_) => None,
            Self::Altair(state) => Some(state),
            Self::Bellatrix(state) => Some(state),
            Self::Capella(state) => Some(state),
            Self::Deneb(state) => Some(state),
        }
    }

    pub fn post_altair_mut(&mut self) -> Option<&mut dyn PostAltairBeaconState<P>> {
        match self {
            Self::Phase0(_) => None,
            Self::Altair(state) => Some(state),
            Self::Bellatrix(state) => Some(state),
            Self::Capella(state) => Some(state),
            Self::Deneb(state) => Some(state),
        }
    }

    #[must_use]
    pub fn post_bellatrix(&self) -> Option<&dyn PostBellatrixBeaconState<P>> {
        match self {
            Self::Phase0(_) | Self::Altair(_) => None,
            Self::Bellatrix(state) => Some(state),
            Self::Capella(state) => Some(state),
            Self::Deneb(state) => Some(state),
        }
    }

    #[must_use]
    pub fn post_capella(&self) -> Option<&dyn PostCapellaBeaconState<P>> {
        match self {
            Self::Phase0(_) | Self::Altair(_) | Self::Bellatrix(_) => None,
            Self::Capella(state) => Some(state),
            Self::Deneb(state) => Some(state),
        }
    }

    pub fn post_capella_mut(&mut self) -> Option<&mut dyn PostCapellaBeaconState<P>> {
        match self {
            Self::Phase0(_) | Self::Altair(_) | Self::Bellatrix(_) => None,
            Self::Capella(state) => Some(state),
            Self::Deneb(state) => Some(state),
        }
    }

    pub fn previous_epoch_participation(&self) -> Result<&EpochParticipation<P>, Error> {
        self.require_post_altair("previous_epoch_participation")
            .map(PostAltairBeaconState::previous_epoch_participation)
    }

    pub fn current_epoch_participation(&self) -> Result<&EpochParticipation<P>, Error> {
        self.require_post_altair("current_epoch_participation")
            .map(PostAltairBeaconState::current_epoch_participation)
    }

    pub fn inactivity_scores(&self) -> Result<&InactivityScores<P>, Error> {
        self.require_post_altair("inactivity_scores")
            .map(PostAltairBeaconState::inactivity_scores)
    }

    pub fn current_sync_committee(&self) -> Result<&Arc<SyncCommittee<P>>, Error> {
        self.require_post_altair("current_sync_committee")
            .map(PostAltairBeaconState::current_sync_committee)
    }

    pub fn next_sync_committee(&self) -> Result<&Arc<SyncCommittee<P>>, Error> {
        self.require_post_altair("next_sync_committee")
            .map(PostAltairBeaconState::next_sync_committee)
    }

    pub fn latest_execution_payload_header(&self) -> Result<&dyn ExecutionPayload<P>, Error> {
        self.post_bellatrix()
            .map(PostBellatrixBeaconState::latest_execution_payload_header)
            .ok_or_else(|| self.field_not_supported("latest_execution_payload_header"))
    }

    pub fn next_withdrawal_index(&self) -> Result<WithdrawalIndex, Error> {
        self.require_post_capella("next_withdrawal_index")
            .map(PostCapellaBeaconState::next_withdrawal_index)
    }

    pub fn next_withdrawal_validator_index(&self) -> Result<ValidatorIndex, Error> {
        self.require_post_capella("next_withdrawal_validator_index")
            .map(PostCapellaBeaconState::next_withdrawal_validator_index)
    }

    pub fn historical_summaries(&self) -> Result<&HistoricalSummaries<P>, Error> {
        self.require_post_capella("historical_summaries")
            .map(PostCapellaBeaconState::historical_summaries)
    }

    fn require_post_altair(
        &self,
        field: &'static str,
    ) -> Result<&dyn PostAltairBeaconState<P>, Error> {
        self.post_altair()
            .ok_or_else(|| self.field_not_supported(field))
    }

    fn require_post_capella(
        &self,
        field: &'static str,
    ) -> Result<&dyn PostCapellaBeaconState<P>, Error> {
        self.post_capella()
            .ok_or_else(|| self.field_not_supported(field))
    }

    fn field_not_supported(&self, field: &'static str) -> Error {
        Error::FieldNotSupported {
            field,
            phase: self.phase(),
        }
    }
}

#[derive(Clone, PartialEq, Eq, Debug, From, Deserialize, Serialize)]
#[serde(bound = "", untagged)]
pub enum SignedBeaconBlock<P: Preset> {
    Phase0(Phase0SignedBeaconBlock<P>),
    Altair(AltairSignedBeaconBlock<P>),
    Bellatrix(BellatrixSignedBeaconBlock<P>),
    Capella(CapellaSignedBeaconBlock<P>),
    Deneb(DenebSignedBeaconBlock<P>),
}

impl<P: Preset> SignedBeaconBlock<P> {
    /// Decodes a block of the phase that `config` schedules at the encoded slot.
    pub fn from_ssz_bytes(config: &Config, bytes: &[u8]) -> Result<Self, DecodeError> {
        // `message` is variable-size, so the first fixed part is an offset pointing at it.
        // The first field of `message` is `slot`.
        let message_offset = read_offset(bytes)?;
        let slot = read_slot(bytes, message_offset)?;

        let block = match config.phase_at_slot::<P>(slot) {
            Phase::Phase0 => Self::Phase0(Phase0SignedBeaconBlock::from_ssz_bytes(bytes)?),
            Phase::Altair => Self::Altair(AltairSignedBeaconBlock::from_ssz_bytes(bytes)?),
            Phase::Bellatrix => {
                Self::Bellatrix(BellatrixSignedBeaconBlock::from_ssz_bytes(bytes)?)
            }
            Phase::Capella => Self::Capella(CapellaSignedBeaconBlock::from_ssz_bytes(bytes)?),
            Phase::Deneb => Self::Deneb(DenebSignedBeaconBlock::from_ssz_bytes(bytes)?),
        };

        Ok(block)
    }

    #[must_use]
    pub fn as_ssz_bytes(&self) -> Vec<u8> {
        match self {
            Self::Phase0(block) => block.as_ssz_bytes(),
            Self::Altair(block) => block.as_ssz_bytes(),
            Self::Bellatrix(block) => block.as_ssz_bytes(),
            Self::Capella(block) => block.as_ssz_bytes(),
            Self::Deneb(block) => block.as_ssz_bytes(),
        }
    }

    #[must_use]
    pub fn split(self) -> (BeaconBlock<P>, SignatureBytes) {
        match self {
            Self::Phase0(block) => {
                let Phase0SignedBeaconBlock { message, signature } = block;
                (message.into(), signature)
            }
            Self::Altair(block) => {
                let AltairSignedBeaconBlock { message, signature } = block;
                (message.into(), signature)
            }
            Self::Bellatrix(block) => {
                let BellatrixSignedBeaconBlock { message, signature } = block;
                (message.into(), signature)
            }
            Self::Capella(block) => {
                let CapellaSignedBeaconBlock { message, signature } = block;
                (message.into(), signature)
            }
            Self::Deneb(block) => {
                let DenebSignedBeaconBlock { message, signature } = block;
                (message.into(), signature)
            }
        }
    }

    #[must_use]
    pub fn to_header(&self) -> SignedBeaconBlockHeader {
        SignedBeaconBlockHeader {
            message: self.message().to_header(),
            signature: self.signature(),
        }
    }
}

#[derive(Clone, PartialEq, Eq, Debug, From, Serialize)]
#[serde(bound = "", untagged)]
pub enum BeaconBlock<P: Preset> {
    Phase0(Phase0BeaconBlock<P>),
    Altair(AltairBeaconBlock<P>),
    Bellatrix(BellatrixBeaconBlock<P>),
    Capella(CapellaBeaconBlock<P>),
    Deneb(DenebBeaconBlock<P>),
}

impl<P: Preset> From<SignedBeaconBlock<P>> for BeaconBlock<P> {
    fn from(block: SignedBeaconBlock<P>) -> Self {
        let (message, _) = block.split();
        message
    }
}

impl<P: Preset> BeaconBlock<P> {
    #[must_use]
    pub fn with_signature(self, signature: SignatureBytes) -> SignedBeaconBlock<P> {
        match self {
            Self::Phase0(message) => Phase0SignedBeaconBlock { message, signature }.into(),
            Self::Altair(message) => AltairSignedBeaconBlock { message, signature }.into(),
            Self::Bellatrix(message) => BellatrixSignedBeaconBlock { message, signature }.into(),
            Self::Capella(message) => CapellaSignedBeaconBlock { message, signature }.into(),
            Self::Deneb(message) => DenebSignedBeaconBlock { message, signature }.into(),
        }
    }

    #[must_use]
    pub fn with_state_root(mut self, state_root: H256) -> Self {
        match &mut self {
            Self::Phase0(block) => block.state_root = state_root,
            Self::Altair(block) => block.state_root = state_root,
            Self::Bellatrix(block) => block.state_root = state_root,
            Self::Capella(block) => block.state_root = state_root,
            Self::Deneb(block) => block.state_root = state_root,
        }

        self
    }
}

const_assert_eq!(Phase::CARDINALITY, 5);

fn read_offset(bytes: &[u8]) -> Result<usize, DecodeError> {
    let offset_bytes = bytes.get(..ssz::BYTES_PER_LENGTH_OFFSET).ok_or_else(|| {
        DecodeError::BytesInvalid("SSZ bytes too short to contain an offset".to_owned())
    })?;

    ssz::read_offset(offset_bytes)
}

fn read_slot(bytes: &[u8], slot_start: usize) -> Result<Slot, DecodeError> {
    let slot_end = slot_start + <Slot as ssz::Decode>::ssz_fixed_len();

    let slot_bytes = bytes
        .get(slot_start..slot_end)
        .ok_or_else(|| {
            DecodeError::BytesInvalid("SSZ bytes too short to contain slot".to_owned())
        })?;

    Slot::from_ssz_bytes(slot_bytes)
}

#[cfg(test)]
mod tests {
    use crate::{
        preset::Minimal,
        traits::{BeaconState as _, SignedBeaconBlock as _},
    };

    use super::*;

    #[test]
    fn fork_specific_fields_are_errors_on_earlier_phases() {
        let state = BeaconState::from(Phase0BeaconState::<Minimal>::default());

        assert!(matches!(
            state.current_epoch_participation(),
            Err(Error::FieldNotSupported {
                field: "current_epoch_participation",
                phase: Phase::Phase0,
            }),
        ));

        assert!(state.inactivity_scores().is_err());
        assert!(state.current_sync_committee().is_err());
        assert!(state.latest_execution_payload_header().is_err());
        assert!(state.next_withdrawal_index().is_err());
    }

    #[test]
    fn fork_specific_fields_are_present_on_later_phases() -> Result<(), Error> {
        let state = BeaconState::from(CapellaBeaconState::<Minimal> {
            next_withdrawal_index: 7,
            ..CapellaBeaconState::default()
        });

        assert_eq!(state.next_withdrawal_index()?, 7);
        assert!(state.current_epoch_participation()?.is_empty());
        assert!(state.latest_execution_payload_header()?.is_default_payload());

        Ok(())
    }

    #[test]
    fn state_decoding_selects_phase_by_slot() -> Result<(), DecodeError> {
        let config = Config::minimal().rapid_upgrade();

        let state = BeaconState::from(AltairBeaconState::<Minimal> {
            slot: 9,
            ..AltairBeaconState::default()
        });

        let decoded = BeaconState::<Minimal>::from_ssz_bytes(&config, &state.as_ssz_bytes())?;

        assert_eq!(decoded.phase(), Phase::Altair);
        assert_eq!(decoded, state);

        Ok(())
    }

    #[test]
    fn block_decoding_selects_phase_by_slot() -> Result<(), DecodeError> {
        let config = Config::minimal().rapid_upgrade();

        let block = BeaconBlock::from(BellatrixBeaconBlock::<Minimal> {
            slot: 17,
            ..BellatrixBeaconBlock::default()
        })
        .with_signature(SignatureBytes::empty());

        let decoded = SignedBeaconBlock::<Minimal>::from_ssz_bytes(&config, &block.as_ssz_bytes())?;

        assert_eq!(decoded.phase(), Phase::Bellatrix);
        assert_eq!(decoded.slot(), 17);
        assert_eq!(decoded, block);

        Ok(())
    }

    #[test]
    fn truncated_bytes_are_rejected() {
        let config = Config::minimal();

        assert!(BeaconState::<Minimal>::from_ssz_bytes(&config, &[0; 16]).is_err());
        assert!(SignedBeaconBlock::<Minimal>::from_ssz_bytes(&config, &[0; 2]).is_err());
    }
}
