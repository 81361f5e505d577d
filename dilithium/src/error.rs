use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid public key")]
    InvalidPublicKey,
    #[error("invalid signature")]
    InvalidSignature,
    #[error("expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
    #[error("number of messages ({messages}) does not match number of public keys ({public_keys})")]
    AggregateLengthMismatch { messages: usize, public_keys: usize },
}
