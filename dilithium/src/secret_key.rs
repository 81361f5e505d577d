use derive_more::Debug;
use pqcrypto_mldsa::mldsa87;
use static_assertions::assert_not_impl_any;

use crate::{public_key::PublicKey, signature::Signature};

#[derive(Debug)]
#[debug("[REDACTED]")]
pub struct SecretKey {
    public_key: mldsa87::PublicKey,
    secret_key: mldsa87::SecretKey,
}

// Prevent `SecretKey` from implementing some traits to avoid leaking secret keys.
assert_not_impl_any! {
    SecretKey:
    Clone, Copy, core::ops::Deref, core::fmt::Display, serde::Serialize, ssz::Encode,
}

impl SecretKey {
    #[must_use]
    pub fn random() -> Self {
        let (public_key, secret_key) = mldsa87::keypair();

        Self {
            public_key,
            secret_key,
        }
    }

    #[must_use]
    pub fn to_public_key(&self) -> PublicKey {
        PublicKey::from_raw(self.public_key)
    }

    #[must_use]
    pub fn sign(&self, message: impl AsRef<[u8]>) -> Signature {
        Signature::from_raw(mldsa87::detached_sign(message.as_ref(), &self.secret_key))
    }
}
