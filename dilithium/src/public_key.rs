use pqcrypto_mldsa::mldsa87;
use pqcrypto_traits::sign::PublicKey as _;

use crate::{error::Error, public_key_bytes::PublicKeyBytes};

#[derive(Clone)]
pub struct PublicKey(mldsa87::PublicKey);

impl TryFrom<PublicKeyBytes> for PublicKey {
    type Error = Error;

    #[inline]
    fn try_from(bytes: PublicKeyBytes) -> Result<Self, Self::Error> {
        Self::try_from(&bytes)
    }
}

impl TryFrom<&PublicKeyBytes> for PublicKey {
    type Error = Error;

    fn try_from(bytes: &PublicKeyBytes) -> Result<Self, Self::Error> {
        mldsa87::PublicKey::from_bytes(bytes.as_bytes())
            .map(Self)
            .map_err(|_| Error::InvalidPublicKey)
    }
}

impl core::fmt::Debug for PublicKey {
    fn fmt(&self, formatter: &mut core::fmt::Formatter) -> core::fmt::Result {
        formatter
            .debug_tuple("PublicKey")
            .field(&self.to_bytes())
            .finish()
    }
}

impl PartialEq for PublicKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.as_bytes() == other.0.as_bytes()
    }
}

impl Eq for PublicKey {}

impl PublicKey {
    #[must_use]
    pub fn to_bytes(&self) -> PublicKeyBytes {
        PublicKeyBytes::from_slice(self.0.as_bytes())
            .expect("ML-DSA-87 public keys always have the same length")
    }

    pub(crate) const fn as_raw(&self) -> &mldsa87::PublicKey {
        &self.0
    }

    pub(crate) const fn from_raw(raw: mldsa87::PublicKey) -> Self {
        Self(raw)
    }
}
