use crate::{consts::SIGNATURE_SIZE, macros::fixed_bytes, signature::Signature};

fixed_bytes! {
    /// Detached signature as it appears in blocks and operations.
    ///
    /// The all-zero value is used for unsigned placeholders and never verifies.
    SignatureBytes, SIGNATURE_SIZE
}

impl SignatureBytes {
    #[inline]
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }
}

impl From<&Signature> for SignatureBytes {
    #[inline]
    fn from(signature: &Signature) -> Self {
        signature.to_bytes()
    }
}
