//! ML-DSA-87 (Dilithium) signatures in the shape the state transition expects.
//!
//! Container types store [`PublicKeyBytes`] and [`SignatureBytes`] and only decode them when
//! verifying. Dilithium signatures cannot be aggregated, so [`Signature::aggregate_verify`]
//! verifies every (message, signature, key) triple separately.

pub use crate::{
    consts::{PUBLIC_KEY_SIZE, SIGNATURE_SIZE},
    error::Error,
    public_key::PublicKey,
    public_key_bytes::PublicKeyBytes,
    secret_key::SecretKey,
    signature::Signature,
    signature_bytes::SignatureBytes,
};

mod consts;
mod error;
mod macros;
mod public_key;
mod public_key_bytes;
mod secret_key;
mod signature;
mod signature_bytes;
