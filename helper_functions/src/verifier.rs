#![expect(clippy::module_name_repetitions)]

use anyhow::{ensure, Result};
use dilithium::{PublicKey, PublicKeyBytes, Signature, SignatureBytes};
use enum_map::{Enum, EnumMap};
use logging::warn_with_progress;
use static_assertions::assert_not_impl_any;
use types::phase0::primitives::{ValidatorIndex, H256};

use crate::{
    error::{Error, SignatureKind},
    par_utils::VerificationPool,
};

pub trait Verifier {
    const IS_NULL: bool;

    fn reserve(&mut self, additional: usize);

    fn verify_singular(
        &mut self,
        message: H256,
        signature_bytes: SignatureBytes,
        public_key_bytes: &PublicKeyBytes,
        signature_kind: SignatureKind,
    ) -> Result<()>;

    /// Verifies one signature per signer over the same `message`.
    ///
    /// `signatures` and `signers` are parallel. Dilithium has no aggregation, so this is the
    /// counterpart of aggregate verification in BLS-based chains.
    fn verify_multiple<'keys>(
        &mut self,
        message: H256,
        signatures: &[SignatureBytes],
        signers: impl IntoIterator<Item = (ValidatorIndex, &'keys PublicKeyBytes)>,
        signature_kind: SignatureKind,
    ) -> Result<()>;

    fn extend(
        &mut self,
        triples: impl IntoIterator<Item = Triple>,
        signature_kind: SignatureKind,
    ) -> Result<()>;

    fn finish(&self) -> Result<()>;

    fn has_option(&self, option: VerifierOption) -> bool;
}

impl<V: Verifier> Verifier for &mut V {
    const IS_NULL: bool = V::IS_NULL;

    #[inline]
    fn reserve(&mut self, additional: usize) {
        (*self).reserve(additional);
    }

    #[inline]
    fn verify_singular(
        &mut self,
        message: H256,
        signature_bytes: SignatureBytes,
        public_key_bytes: &PublicKeyBytes,
        signature_kind: SignatureKind,
    ) -> Result<()> {
        (*self).verify_singular(message, signature_bytes, public_key_bytes, signature_kind)
    }

    #[inline]
    fn verify_multiple<'keys>(
        &mut self,
        message: H256,
        signatures: &[SignatureBytes],
        signers: impl IntoIterator<Item = (ValidatorIndex, &'keys PublicKeyBytes)>,
        signature_kind: SignatureKind,
    ) -> Result<()> {
        (*self).verify_multiple(message, signatures, signers, signature_kind)
    }

    #[inline]
    fn extend(
        &mut self,
        triples: impl IntoIterator<Item = Triple>,
        signature_kind: SignatureKind,
    ) -> Result<()> {
        (*self).extend(triples, signature_kind)
    }

    #[inline]
    fn finish(&self) -> Result<()> {
        (**self).finish()
    }

    #[inline]
    fn has_option(&self, option: VerifierOption) -> bool {
        (**self).has_option(option)
    }
}

#[derive(Clone, Copy, Default, Debug)]
pub struct NullVerifier;

impl Verifier for NullVerifier {
    const IS_NULL: bool = true;

    #[inline]
    fn reserve(&mut self, _additional: usize) {}

    #[inline]
    fn verify_singular(
        &mut self,
        _message: H256,
        _signature_bytes: SignatureBytes,
        _public_key_bytes: &PublicKeyBytes,
        _signature_kind: SignatureKind,
    ) -> Result<()> {
        Ok(())
    }

    #[inline]
    fn verify_multiple<'keys>(
        &mut self,
        _message: H256,
        _signatures: &[SignatureBytes],
        _signers: impl IntoIterator<Item = (ValidatorIndex, &'keys PublicKeyBytes)>,
        _signature_kind: SignatureKind,
    ) -> Result<()> {
        Ok(())
    }

    #[inline]
    fn extend(
        &mut self,
        _triples: impl IntoIterator<Item = Triple>,
        _signature_kind: SignatureKind,
    ) -> Result<()> {
        Ok(())
    }

    #[inline]
    fn finish(&self) -> Result<()> {
        Ok(())
    }

    #[inline]
    fn has_option(&self, _option: VerifierOption) -> bool {
        false
    }
}

#[derive(Clone, Copy, Default, Debug)]
pub struct SingleVerifier;

impl Verifier for SingleVerifier {
    const IS_NULL: bool = false;

    #[inline]
    fn reserve(&mut self, _additional: usize) {}

    #[inline]
    fn verify_singular(
        &mut self,
        message: H256,
        signature_bytes: SignatureBytes,
        public_key_bytes: &PublicKeyBytes,
        signature_kind: SignatureKind,
    ) -> Result<()> {
        let triple = Triple::new(
            message,
            signature_bytes,
            *public_key_bytes,
            signature_kind,
            signature_kind.to_string(),
        );

        ensure!(triple.verify()?, Error::SignatureInvalid(signature_kind));

        Ok(())
    }

    fn verify_multiple<'keys>(
        &mut self,
        message: H256,
        signatures: &[SignatureBytes],
        signers: impl IntoIterator<Item = (ValidatorIndex, &'keys PublicKeyBytes)>,
        signature_kind: SignatureKind,
    ) -> Result<()> {
        let triples = triples_for_signers(message, signatures, signers, signature_kind)?;
        self.extend(triples, signature_kind)
    }

    fn extend(
        &mut self,
        triples: impl IntoIterator<Item = Triple>,
        signature_kind: SignatureKind,
    ) -> Result<()> {
        let triples = triples.into_iter().collect::<Vec<_>>();

        VerificationPool::global().try_for_each(&triples, |triple| {
            ensure!(triple.verify()?, Error::SignatureInvalid(signature_kind));
            Ok(())
        })
    }

    #[inline]
    fn finish(&self) -> Result<()> {
        Ok(())
    }

    #[inline]
    fn has_option(&self, _option: VerifierOption) -> bool {
        false
    }
}

/// Collects signatures and verifies all of them in [`Verifier::finish`].
#[derive(Default, Debug)]
pub struct MultiVerifier {
    triples: Vec<Triple>,
    options: EnumMap<VerifierOption, bool>,
}

impl Verifier for MultiVerifier {
    const IS_NULL: bool = false;

    #[inline]
    fn reserve(&mut self, additional: usize) {
        self.triples.reserve_exact(additional);
    }

    #[inline]
    fn verify_singular(
        &mut self,
        message: H256,
        signature_bytes: SignatureBytes,
        public_key_bytes: &PublicKeyBytes,
        signature_kind: SignatureKind,
    ) -> Result<()> {
        self.triples.push(Triple::new(
            message,
            signature_bytes,
            *public_key_bytes,
            signature_kind,
            signature_kind.to_string(),
        ));

        Ok(())
    }

    fn verify_multiple<'keys>(
        &mut self,
        message: H256,
        signatures: &[SignatureBytes],
        signers: impl IntoIterator<Item = (ValidatorIndex, &'keys PublicKeyBytes)>,
        signature_kind: SignatureKind,
    ) -> Result<()> {
        let triples = triples_for_signers(message, signatures, signers, signature_kind)?;
        self.triples.extend(triples);
        Ok(())
    }

    #[inline]
    fn extend(
        &mut self,
        triples: impl IntoIterator<Item = Triple>,
        _signature_kind: SignatureKind,
    ) -> Result<()> {
        self.triples.extend(triples);
        Ok(())
    }

    fn finish(&self) -> Result<()> {
        verify_triples(&self.triples)
    }

    #[inline]
    fn has_option(&self, option: VerifierOption) -> bool {
        self.options[option]
    }
}

impl From<Vec<Triple>> for MultiVerifier {
    fn from(triples: Vec<Triple>) -> Self {
        Self {
            triples,
            ..Self::default()
        }
    }
}

impl MultiVerifier {
    pub fn new(options: impl IntoIterator<Item = VerifierOption>) -> Self {
        let mut verifier = Self::default();

        for option in options {
            verifier.options[option] = true;
        }

        verifier
    }

    #[must_use]
    pub fn into_triples(self) -> Vec<Triple> {
        self.triples
    }
}

/// One signature to verify along with what it signs and who signed it.
#[derive(Clone, Debug)]
pub struct Triple {
    message: H256,
    signature_bytes: SignatureBytes,
    public_key_bytes: PublicKeyBytes,
    signature_kind: SignatureKind,
    description: String,
}

assert_not_impl_any!(Triple: Copy);

impl Triple {
    #[must_use]
    pub fn new(
        message: H256,
        signature_bytes: SignatureBytes,
        public_key_bytes: PublicKeyBytes,
        signature_kind: SignatureKind,
        description: String,
    ) -> Self {
        Self {
            message,
            signature_bytes,
            public_key_bytes,
            signature_kind,
            description,
        }
    }

    #[must_use]
    pub const fn signature_kind(&self) -> SignatureKind {
        self.signature_kind
    }

    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    #[must_use]
    pub fn with_description_prefix(mut self, prefix: impl core::fmt::Display) -> Self {
        self.description = format!("{prefix} {}", self.description);
        self
    }

    /// Returns `Ok(false)` if the signature does not match and `Err` if the signature or public
    /// key cannot be decoded.
    pub fn verify(&self) -> Result<bool> {
        let public_key = PublicKey::try_from(&self.public_key_bytes)?;
        let signature = Signature::try_from(&self.signature_bytes)?;
        Ok(signature.verify(self.message, &public_key))
    }
}

/// Signatures collected by a transition that did not verify them.
#[derive(Default, Debug)]
pub struct SignatureBatch {
    triples: Vec<Triple>,
}

impl From<MultiVerifier> for SignatureBatch {
    fn from(verifier: MultiVerifier) -> Self {
        Self {
            triples: verifier.triples,
        }
    }
}

impl SignatureBatch {
    #[must_use]
    pub fn len(&self) -> usize {
        self.triples.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.triples.is_empty()
    }

    pub fn triples(&self) -> impl Iterator<Item = &Triple> {
        self.triples.iter()
    }

    /// Returns `Ok(false)` if any signature is invalid.
    ///
    /// Malformed public keys or signatures are reported as errors.
    pub fn verify(&self) -> Result<bool> {
        match verify_triples(&self.triples) {
            Ok(()) => Ok(true),
            Err(error)
                if matches!(
                    error.downcast_ref::<Error>(),
                    Some(Error::SignatureInvalidInBatch { .. }),
                ) =>
            {
                Ok(false)
            }
            Err(error) => Err(error),
        }
    }

    /// Like [`SignatureBatch::verify`], but an invalid signature is an error naming its entry.
    pub fn verify_with_details(&self) -> Result<()> {
        verify_triples(&self.triples)
    }
}

#[expect(clippy::enum_variant_names)]
#[derive(Clone, Copy, PartialEq, Eq, Debug, Enum)]
pub enum VerifierOption {
    SkipBlockBaseSignatures,
    SkipBlockSyncAggregateSignature,
    SkipRandaoVerification,
}

fn triples_for_signers<'keys>(
    message: H256,
    signatures: &[SignatureBytes],
    signers: impl IntoIterator<Item = (ValidatorIndex, &'keys PublicKeyBytes)>,
    signature_kind: SignatureKind,
) -> Result<Vec<Triple>> {
    let signers = signers.into_iter().collect::<Vec<_>>();

    ensure!(
        signers.len() == signatures.len(),
        Error::SignatureCountMismatch {
            signature_count: signatures.len(),
            attesting_index_count: signers.len(),
        },
    );

    let triples = signatures
        .iter()
        .zip(signers)
        .map(|(signature_bytes, (validator_index, public_key_bytes))| {
            Triple::new(
                message,
                *signature_bytes,
                *public_key_bytes,
                signature_kind,
                format!("signer {validator_index}"),
            )
        })
        .collect();

    Ok(triples)
}

fn verify_triples(triples: &[Triple]) -> Result<()> {
    VerificationPool::global().try_for_each(triples, |triple| {
        if triple.verify()? {
            return Ok(());
        }

        warn_with_progress!(
            "{} failed verification ({})",
            triple.signature_kind,
            triple.description,
        );

        Err(Error::SignatureInvalidInBatch {
            kind: triple.signature_kind,
            description: triple.description.clone(),
        }
        .into())
    })
}

#[cfg(test)]
mod tests {
    use dilithium::SecretKey;

    use super::*;

    fn signed_triple(message: H256, description: &str) -> (Triple, SecretKey) {
        let secret_key = SecretKey::random();
        let public_key_bytes = secret_key.to_public_key().to_bytes();
        let signature_bytes = secret_key.sign(message).to_bytes();

        let triple = Triple::new(
            message,
            signature_bytes,
            public_key_bytes,
            SignatureKind::Block,
            description.to_owned(),
        );

        (triple, secret_key)
    }

    #[test]
    fn multi_verifier_finish_succeeds_with_0_signatures() -> Result<()> {
        MultiVerifier::default().finish()
    }

    #[test]
    fn multi_verifier_finish_succeeds_with_1_signature() -> Result<()> {
        let message = H256::repeat_byte(1);
        let (triple, _) = signed_triple(message, "block");

        let mut verifier = MultiVerifier::default();
        verifier.extend([triple], SignatureKind::Block)?;
        verifier.finish()
    }

    #[test]
    fn single_verifier_rejects_signature_over_other_message() {
        let secret_key = SecretKey::random();
        let public_key_bytes = secret_key.to_public_key().to_bytes();
        let signature_bytes = secret_key.sign(H256::repeat_byte(1)).to_bytes();

        let error = SingleVerifier
            .verify_singular(
                H256::repeat_byte(2),
                signature_bytes,
                &public_key_bytes,
                SignatureKind::Randao,
            )
            .expect_err("signature is over a different message");

        assert!(matches!(
            error.downcast_ref::<Error>(),
            Some(Error::SignatureInvalid(SignatureKind::Randao)),
        ));
    }

    #[test]
    fn verify_multiple_requires_one_signature_per_signer() {
        let public_key_bytes = PublicKeyBytes::default();

        let result = MultiVerifier::default().verify_multiple(
            H256::ZERO,
            &[SignatureBytes::empty(), SignatureBytes::empty()],
            [(3, &public_key_bytes)],
            SignatureKind::Attestation,
        );

        assert!(result.is_err());
    }

    #[test]
    fn batch_names_the_failing_entry() -> Result<()> {
        let (good, _) = signed_triple(H256::repeat_byte(1), "first");
        let (bad, other_key) = signed_triple(H256::repeat_byte(2), "second");

        let forged = Triple {
            signature_bytes: other_key.sign(H256::repeat_byte(3)).to_bytes(),
            ..bad
        }
        .with_description_prefix("attestation 7");

        let batch = SignatureBatch::from(MultiVerifier::from(vec![good, forged]));

        assert_eq!(batch.len(), 2);
        assert!(!batch.verify()?);

        let error = batch
            .verify_with_details()
            .expect_err("second signature is over another message");

        assert!(matches!(
            error.downcast_ref::<Error>(),
            Some(Error::SignatureInvalidInBatch { kind: SignatureKind::Block, description })
                if description == "attestation 7 second",
        ));

        Ok(())
    }

    #[test]
    fn zeroed_public_key_never_verifies() {
        let triple = Triple::new(
            H256::ZERO,
            SignatureBytes::empty(),
            PublicKeyBytes::default(),
            SignatureKind::Deposit,
            "deposit 0".to_owned(),
        );

        let batch = SignatureBatch::from(MultiVerifier::from(vec![triple]));

        assert!(!matches!(batch.verify(), Ok(true)));
    }

    #[test]
    fn options_are_reported() {
        let verifier = MultiVerifier::new([VerifierOption::SkipRandaoVerification]);

        assert!(verifier.has_option(VerifierOption::SkipRandaoVerification));
        assert!(!verifier.has_option(VerifierOption::SkipBlockBaseSignatures));
        assert!(!NullVerifier.has_option(VerifierOption::SkipRandaoVerification));
    }
}
