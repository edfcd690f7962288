use thiserror::Error;
use types::AccessError;

#[derive(Clone, Copy, PartialEq, Eq, Debug, Error)]
pub enum Error {
    #[error("index out of range")]
    IndexOutOfRange,
    #[error("slot out of range")]
    SlotOutOfRange,
    #[error("aggregation bits do not match committee length")]
    AttestationBitsInvalid,
    #[error("attesting indices list is empty")]
    NoAttestingIndices,
    #[error("attesting indices exceed the committee bound")]
    MaxIndicesExceeded,
    #[error("attesting indices are not sorted and unique")]
    BadValidatorIndicesOrdering,
    #[error("no active validators at the requested epoch")]
    NoActiveValidators,
    #[error("public key bytes do not encode a valid point")]
    InvalidPublicKey,
    #[error("signature bytes do not encode a valid point")]
    InvalidSignature,
    #[error("aggregate signature does not cover the message")]
    SignatureVerificationFailed,
}

impl From<AccessError> for Error {
    fn from(error: AccessError) -> Self {
        match error {
            AccessError::SlotOutOfRange => Self::SlotOutOfRange,
            AccessError::IndexOutOfRange => Self::IndexOutOfRange,
        }
    }
}
