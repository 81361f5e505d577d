use pqcrypto_mldsa::mldsa87;
use pqcrypto_traits::sign::DetachedSignature as _;

use crate::{error::Error, public_key::PublicKey, signature_bytes::SignatureBytes};

#[derive(Clone)]
pub struct Signature(mldsa87::DetachedSignature);

impl TryFrom<SignatureBytes> for Signature {
    type Error = Error;

    #[inline]
    fn try_from(bytes: SignatureBytes) -> Result<Self, Self::Error> {
        Self::try_from(&bytes)
    }
}

impl TryFrom<&SignatureBytes> for Signature {
    type Error = Error;

    fn try_from(bytes: &SignatureBytes) -> Result<Self, Self::Error> {
        mldsa87::DetachedSignature::from_bytes(bytes.as_bytes())
            .map(Self)
            .map_err(|_| Error::InvalidSignature)
    }
}

impl core::fmt::Debug for Signature {
    fn fmt(&self, formatter: &mut core::fmt::Formatter) -> core::fmt::Result {
        formatter
            .debug_tuple("Signature")
            .field(&self.to_bytes())
            .finish()
    }
}

impl Signature {
    #[must_use]
    pub fn verify(&self, message: impl AsRef<[u8]>, public_key: &PublicKey) -> bool {
        mldsa87::verify_detached_signature(&self.0, message.as_ref(), public_key.as_raw()).is_ok()
    }

    /// Verifies `signatures[i]` over `messages[i]` with `public_keys[i]` for every `i`.
    ///
    /// There is no compact aggregate for Dilithium. The name is kept so that callers written
    /// against aggregate schemes read the same.
    pub fn aggregate_verify<'all>(
        signatures: impl IntoIterator<Item = &'all Self>,
        messages: impl IntoIterator<Item = &'all [u8]>,
        public_keys: impl IntoIterator<Item = &'all PublicKey>,
    ) -> Result<bool, Error> {
        let signatures = signatures.into_iter().collect::<Vec<_>>();
        let messages = messages.into_iter().collect::<Vec<_>>();
        let public_keys = public_keys.into_iter().collect::<Vec<_>>();

        if messages.len() != public_keys.len() || signatures.len() != public_keys.len() {
            return Err(Error::AggregateLengthMismatch {
                messages: messages.len(),
                public_keys: public_keys.len(),
            });
        }

        Ok(signatures
            .into_iter()
            .zip(messages)
            .zip(public_keys)
            .all(|((signature, message), public_key)| signature.verify(message, public_key)))
    }

    #[must_use]
    pub fn to_bytes(&self) -> SignatureBytes {
        SignatureBytes::from_slice(self.0.as_bytes())
            .expect("ML-DSA-87 signatures always have the same length")
    }

    pub(crate) const fn from_raw(raw: mldsa87::DetachedSignature) -> Self {
        Self(raw)
    }
}
