use thiserror::Error;
use types::primitives::H256;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{what} not found for root {root}")]
    NotFound { what: &'static str, root: H256 },
    #[error("stored value is corrupt: {context}")]
    CorruptEncoding { context: &'static str },
    #[error("secondary index out of sync: {context}")]
    IndexInconsistency { context: &'static str },
    #[error("database failure: {0}")]
    IOFailed(#[from] sled::Error),
    #[error("transaction aborted")]
    TransactionAborted,
    #[error("operation cancelled")]
    Cancelled,
}

impl StoreError {
    pub(crate) fn block_not_found(root: H256) -> Self {
        Self::NotFound {
            what: "block",
            root,
        }
    }

    pub(crate) fn state_not_found(root: H256) -> Self {
        Self::NotFound {
            what: "state",
            root,
        }
    }
}

impl<E: Into<StoreError>> From<sled::transaction::TransactionError<E>> for StoreError {
    fn from(error: sled::transaction::TransactionError<E>) -> Self {
        match error {
            sled::transaction::TransactionError::Abort(inner) => inner.into(),
            sled::transaction::TransactionError::Storage(inner) => Self::IOFailed(inner),
        }
    }
}
