use thiserror::Error;
use types::primitives::{Epoch, Slot, ValidatorIndex, H256};
use types::types::Checkpoint;

/// Everything the state-transition function can reject. Input errors only;
/// the caller's state is untouched whenever one of these is returned.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Error)]
pub enum Error {
    #[error("target slot {target_slot} is not after state slot {state_slot}")]
    SlotInPast { state_slot: Slot, target_slot: Slot },
    #[error("block slot {block_slot} does not match state slot {state_slot}")]
    SlotMismatch { state_slot: Slot, block_slot: Slot },
    #[error("block parent root {actual} does not match expected {expected}")]
    ParentRootMismatch { expected: H256, actual: H256 },
    #[error("block names proposer {actual} but slot belongs to {expected}")]
    WrongProposer {
        expected: ValidatorIndex,
        actual: ValidatorIndex,
    },
    #[error("proposer {index} is slashed")]
    ProposerSlashed { index: ValidatorIndex },
    #[error("randao reveal is not the proposer's signature over the epoch")]
    BadRandao,
    #[error("signature verification failed")]
    InvalidSignature,
    #[error("operation list exceeds its protocol bound")]
    OperationLimitExceeded,
    #[error("post-state root {computed} does not match block commitment {expected}")]
    StateRootMismatch { expected: H256, computed: H256 },
    #[error("epoch {epoch} is outside the accepted window")]
    EpochOutOfRange { epoch: Epoch },

    #[error("attestation targets committee {index} but the slot has {count} committees")]
    AttestationBadCommitteeIndex { index: u64, count: u64 },
    #[error(
        "attestation from slot {attestation_slot} is outside the inclusion window at state slot \
         {state_slot}"
    )]
    AttestationOutsideInclusionWindow {
        attestation_slot: Slot,
        state_slot: Slot,
    },
    #[error("attestation source {actual:?} does not match the justified checkpoint {expected:?}")]
    AttestationSourceMismatch {
        expected: Checkpoint,
        actual: Checkpoint,
    },
    #[error("aggregation bits do not cover the committee")]
    AttestationBitsMismatch,

    #[error("proposer slashing headers do not describe the same proposal slot")]
    ProposerSlashingHeaderMismatch,
    #[error("proposer slashing presents a single header twice")]
    ProposerSlashingSameHeader,
    #[error("attester slashing attestations are not slashable against each other")]
    AttesterSlashingNotSlashable,
    #[error("attester slashing did not slash any validator")]
    AttesterSlashingNoEffect,
    #[error("validator {index} is not slashable")]
    NotSlashable { index: ValidatorIndex },

    #[error("block carries {actual} deposits but {expected} are due")]
    DepositCountMismatch { expected: u64, actual: u64 },
    #[error("deposit {index} fails its Merkle inclusion proof")]
    InvalidDepositProof { index: u64 },

    #[error("validator {index} is not active")]
    ValidatorNotActive { index: ValidatorIndex },
    #[error("validator {index} already initiated an exit")]
    ExitAlreadyInitiated { index: ValidatorIndex },
    #[error("validator {index} has not been active long enough to exit")]
    ExitTooEarly { index: ValidatorIndex },

    #[error("helper failure: {0}")]
    Helper(#[from] helper_functions::Error),
}

impl From<types::AccessError> for Error {
    fn from(error: types::AccessError) -> Self {
        Self::Helper(error.into())
    }
}
