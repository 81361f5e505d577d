use anyhow::Result;
use derive_more::From;
use dilithium::{PublicKeyBytes, SecretKey, Signature, SignatureBytes};
use tree_hash::{PackedEncoding, TreeHash, TreeHashType};
use types::{
    altair::consts::DOMAIN_SYNC_COMMITTEE,
    capella::{consts::DOMAIN_DILITHIUM_TO_EXECUTION_CHANGE, containers::DilithiumToExecutionChange},
    config::Config,
    phase0::{
        consts::{
            DOMAIN_BEACON_ATTESTER, DOMAIN_BEACON_PROPOSER, DOMAIN_DEPOSIT, DOMAIN_RANDAO,
            DOMAIN_VOLUNTARY_EXIT,
        },
        containers::{AttestationData, BeaconBlockHeader, DepositMessage, VoluntaryExit},
        primitives::{DomainType, Epoch, Slot, H256},
    },
    preset::Preset,
    traits::BeaconState,
};

use crate::{
    accessors,
    error::SignatureKind,
    misc,
    verifier::{SingleVerifier, Verifier as _},
};

// `Epoch` and `Slot` are the same type, so the epoch signed in RANDAO reveals needs a wrapper to
// get its own impl.
#[derive(Clone, Copy, From)]
pub struct RandaoEpoch(Epoch);

impl TreeHash for RandaoEpoch {
    fn tree_hash_type() -> TreeHashType {
        Epoch::tree_hash_type()
    }

    fn tree_hash_packed_encoding(&self) -> PackedEncoding {
        self.0.tree_hash_packed_encoding()
    }

    fn tree_hash_packing_factor() -> usize {
        Epoch::tree_hash_packing_factor()
    }

    fn tree_hash_root(&self) -> tree_hash::Hash256 {
        self.0.tree_hash_root()
    }
}

pub trait SignForAllForks: TreeHash + Sized {
    const DOMAIN_TYPE: DomainType;
    const SIGNATURE_KIND: SignatureKind;

    fn signing_root(&self, config: &Config) -> H256 {
        let domain = misc::compute_domain(config, Self::DOMAIN_TYPE, None, None);
        misc::compute_signing_root(self, domain)
    }

    fn sign(&self, config: &Config, secret_key: &SecretKey) -> Signature {
        secret_key.sign(self.signing_root(config))
    }

    fn verify(
        &self,
        config: &Config,
        signature_bytes: SignatureBytes,
        public_key_bytes: &PublicKeyBytes,
    ) -> Result<()> {
        SingleVerifier.verify_singular(
            self.signing_root(config),
            signature_bytes,
            public_key_bytes,
            Self::SIGNATURE_KIND,
        )
    }
}

pub trait SignForAllForksWithGenesis<P: Preset>: TreeHash + Sized {
    const DOMAIN_TYPE: DomainType;
    const SIGNATURE_KIND: SignatureKind;

    fn signing_root(&self, config: &Config, beacon_state: &(impl BeaconState<P> + ?Sized)) -> H256 {
        let genesis_validators_root = Some(beacon_state.genesis_validators_root());
        let domain = misc::compute_domain(config, Self::DOMAIN_TYPE, None, genesis_validators_root);
        misc::compute_signing_root(self, domain)
    }

    fn sign(
        &self,
        config: &Config,
        beacon_state: &(impl BeaconState<P> + ?Sized),
        secret_key: &SecretKey,
    ) -> Signature {
        secret_key.sign(self.signing_root(config, beacon_state))
    }
}

pub trait SignForSingleFork<P: Preset>: TreeHash + Sized {
    const DOMAIN_TYPE: DomainType;
    const SIGNATURE_KIND: SignatureKind;

    fn epoch(&self) -> Epoch;

    fn signing_root(&self, config: &Config, beacon_state: &(impl BeaconState<P> + ?Sized)) -> H256 {
        let epoch = Some(self.epoch());
        let domain = accessors::get_domain(config, beacon_state, Self::DOMAIN_TYPE, epoch);
        misc::compute_signing_root(self, domain)
    }

    fn sign(
        &self,
        config: &Config,
        beacon_state: &(impl BeaconState<P> + ?Sized),
        secret_key: &SecretKey,
    ) -> Signature {
        secret_key.sign(self.signing_root(config, beacon_state))
    }
}

pub trait SignForSingleForkAtSlot<P: Preset>: TreeHash + Sized {
    const DOMAIN_TYPE: DomainType;
    const SIGNATURE_KIND: SignatureKind;

    fn signing_root(
        &self,
        config: &Config,
        beacon_state: &(impl BeaconState<P> + ?Sized),
        slot: Slot,
    ) -> H256 {
        let epoch = misc::compute_epoch_at_slot::<P>(slot);
        let domain = accessors::get_domain(config, beacon_state, Self::DOMAIN_TYPE, Some(epoch));
        misc::compute_signing_root(self, domain)
    }

    fn sign(
        &self,
        config: &Config,
        beacon_state: &(impl BeaconState<P> + ?Sized),
        slot: Slot,
        secret_key: &SecretKey,
    ) -> Signature {
        secret_key.sign(self.signing_root(config, beacon_state, slot))
    }
}

impl SignForAllForks for DepositMessage {
    const DOMAIN_TYPE: DomainType = DOMAIN_DEPOSIT;
    const SIGNATURE_KIND: SignatureKind = SignatureKind::Deposit;
}

impl<P: Preset> SignForAllForksWithGenesis<P> for DilithiumToExecutionChange {
    const DOMAIN_TYPE: DomainType = DOMAIN_DILITHIUM_TO_EXECUTION_CHANGE;
    const SIGNATURE_KIND: SignatureKind = SignatureKind::DilithiumToExecutionChange;
}

impl<P: Preset> SignForSingleFork<P> for AttestationData {
    const DOMAIN_TYPE: DomainType = DOMAIN_BEACON_ATTESTER;
    const SIGNATURE_KIND: SignatureKind = SignatureKind::Attestation;

    fn epoch(&self) -> Epoch {
        self.target.epoch
    }
}

// Blocks are signed through their headers. Both have the same hash tree root.
impl<P: Preset> SignForSingleFork<P> for BeaconBlockHeader {
    const DOMAIN_TYPE: DomainType = DOMAIN_BEACON_PROPOSER;
    const SIGNATURE_KIND: SignatureKind = SignatureKind::Block;

    fn epoch(&self) -> Epoch {
        misc::compute_epoch_at_slot::<P>(self.slot)
    }
}

impl<P: Preset> SignForSingleFork<P> for RandaoEpoch {
    const DOMAIN_TYPE: DomainType = DOMAIN_RANDAO;
    const SIGNATURE_KIND: SignatureKind = SignatureKind::Randao;

    fn epoch(&self) -> Epoch {
        self.0
    }
}

impl<P: Preset> SignForSingleFork<P> for VoluntaryExit {
    const DOMAIN_TYPE: DomainType = DOMAIN_VOLUNTARY_EXIT;
    const SIGNATURE_KIND: SignatureKind = SignatureKind::VoluntaryExit;

    fn epoch(&self) -> Epoch {
        self.epoch
    }

    // Starting with Deneb, exits are signed with the Capella fork version.
    fn signing_root(&self, config: &Config, beacon_state: &(impl BeaconState<P> + ?Sized)) -> H256 {
        let domain_type = <Self as SignForSingleFork<P>>::DOMAIN_TYPE;

        let domain = if beacon_state.is_post_deneb() {
            let fork_version = Some(config.capella_fork_version);
            let genesis_validators_root = Some(beacon_state.genesis_validators_root());
            misc::compute_domain(config, domain_type, fork_version, genesis_validators_root)
        } else {
            accessors::get_domain(config, beacon_state, domain_type, Some(self.epoch))
        };

        misc::compute_signing_root(self, domain)
    }
}

// Sync committee members sign the block root of the previous slot.
impl<P: Preset> SignForSingleForkAtSlot<P> for H256 {
    const DOMAIN_TYPE: DomainType = DOMAIN_SYNC_COMMITTEE;
    const SIGNATURE_KIND: SignatureKind = SignatureKind::SyncAggregate;
}

#[cfg(test)]
mod tests {
    use types::{
        deneb::beacon_state::BeaconState as DenebBeaconState,
        phase0::{beacon_state::BeaconState as Phase0BeaconState, containers::Fork},
        preset::Minimal,
    };

    use super::*;

    #[test]
    fn randao_epoch_hashes_like_epoch() {
        assert_eq!(RandaoEpoch(5).tree_hash_root(), 5_u64.tree_hash_root());
    }

    #[test]
    fn deposit_signatures_are_fork_agnostic() -> Result<()> {
        let secret_key = SecretKey::random();
        let public_key_bytes = secret_key.to_public_key().to_bytes();

        let message = DepositMessage {
            pubkey: public_key_bytes,
            amount: 32,
            ..DepositMessage::default()
        };

        let signature = message.sign(&Config::minimal(), &secret_key).to_bytes();
        let other_config = Config::minimal().rapid_upgrade();

        message.verify(&other_config, signature, &public_key_bytes)
    }

    #[test]
    fn deneb_exits_use_capella_fork_version() {
        let config = Config::minimal();
        let exit = VoluntaryExit {
            epoch: 3,
            validator_index: 1,
        };

        let deneb_state = DenebBeaconState::<Minimal> {
            fork: Fork {
                previous_version: config.capella_fork_version,
                current_version: config.deneb_fork_version,
                epoch: 2,
            },
            ..DenebBeaconState::default()
        };

        let capella_domain = misc::compute_domain(
            &config,
            DOMAIN_VOLUNTARY_EXIT,
            Some(config.capella_fork_version),
            Some(deneb_state.genesis_validators_root),
        );

        assert_eq!(
            SignForSingleFork::<Minimal>::signing_root(&exit, &config, &deneb_state),
            misc::compute_signing_root(&exit, capella_domain),
        );

        let phase0_state = Phase0BeaconState::<Minimal>::default();

        assert_ne!(
            SignForSingleFork::<Minimal>::signing_root(&exit, &config, &phase0_state),
            SignForSingleFork::<Minimal>::signing_root(&exit, &config, &deneb_state),
        );
    }
}
