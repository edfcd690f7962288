use core::convert::TryFrom;

use types::config::Config;
use types::primitives::{Epoch, H256};
use types::types::{AttestationData, IndexedAttestation, Validator};
use types::BeaconState;

use crate::beacon_state_accessors::get_domain;
use crate::crypto::{bls_fast_aggregate_verify, hash};
use crate::error::Error;
use crate::misc::compute_signing_root;

pub fn is_active_validator(validator: &Validator, epoch: Epoch) -> bool {
    validator.activation_epoch <= epoch && epoch < validator.exit_epoch
}

pub fn is_slashable_validator(validator: &Validator, epoch: Epoch) -> bool {
    !validator.slashed
        && validator.activation_epoch <= epoch
        && epoch < validator.withdrawable_epoch
}

pub fn is_slashable_attestation_data(data_1: &AttestationData, data_2: &AttestationData) -> bool {
    // Double vote
    (data_1 != data_2 && data_1.target.epoch == data_2.target.epoch) ||
    // Surround vote
    (data_1.source.epoch < data_2.source.epoch && data_2.target.epoch < data_1.target.epoch)
}

/// Structural and (optionally) cryptographic validity of an aggregated
/// attestation. Gossip hands over pre-verified aggregates, so the signature
/// check can be skipped without weakening the state machine.
pub fn validate_indexed_attestation<C: Config>(
    state: &BeaconState<C>,
    indexed_attestation: &IndexedAttestation<C>,
    verify_signature: bool,
) -> Result<(), Error> {
    let indices = &indexed_attestation.attesting_indices;

    if indices.is_empty() {
        return Err(Error::NoAttestingIndices);
    }

    let sorted_and_unique = indices.windows(2).all(|pair| pair[0] < pair[1]);
    if !sorted_and_unique {
        return Err(Error::BadValidatorIndicesOrdering);
    }

    let mut pubkeys = Vec::with_capacity(indices.len());
    for index in indices.iter().copied() {
        let index = usize::try_from(index).map_err(|_| Error::IndexOutOfRange)?;
        let validator = state.validators.get(index).ok_or(Error::IndexOutOfRange)?;
        pubkeys.push(&validator.pubkey);
    }

    if !verify_signature {
        return Ok(());
    }

    let domain = get_domain(
        state,
        C::domain_beacon_attester(),
        Some(indexed_attestation.data.target.epoch),
    );
    let signing_root = compute_signing_root(&indexed_attestation.data, domain);

    if bls_fast_aggregate_verify(
        pubkeys,
        signing_root.as_slice(),
        &indexed_attestation.signature,
    )? {
        Ok(())
    } else {
        Err(Error::SignatureVerificationFailed)
    }
}

pub fn is_valid_merkle_branch(
    leaf: H256,
    branch: &[H256],
    depth: u64,
    index: u64,
    root: H256,
) -> bool {
    let mut value = leaf;

    for height in 0..depth {
        let sibling = match branch.get(height as usize) {
            Some(node) => *node,
            None => return false,
        };
        let concatenated = if (index >> height) % 2 == 0 {
            [value.as_slice(), sibling.as_slice()].concat()
        } else {
            [sibling.as_slice(), value.as_slice()].concat()
        };
        value = H256::from_slice(&hash(&concatenated));
    }

    value == root
}

#[cfg(test)]
mod tests {
    use ssz_types::VariableList;
    use types::config::MinimalConfig;
    use types::types::Checkpoint;

    use super::*;

    fn validator(activation_epoch: Epoch, exit_epoch: Epoch) -> Validator {
        Validator {
            activation_epoch,
            exit_epoch,
            ..Validator::default()
        }
    }

    #[test]
    fn active_validator_window() {
        let v = validator(1, 3);
        assert!(!is_active_validator(&v, 0));
        assert!(is_active_validator(&v, 1));
        assert!(is_active_validator(&v, 2));
        assert!(!is_active_validator(&v, 3));
    }

    #[test]
    fn slashed_validator_is_not_slashable() {
        let v = Validator {
            slashed: true,
            activation_epoch: 0,
            withdrawable_epoch: 10,
            ..Validator::default()
        };
        assert!(!is_slashable_validator(&v, 5));
    }

    #[test]
    fn withdrawable_validator_is_not_slashable() {
        let v = Validator {
            activation_epoch: 0,
            withdrawable_epoch: 5,
            ..Validator::default()
        };
        assert!(!is_slashable_validator(&v, 5));
    }

    #[test]
    fn double_vote_is_slashable() {
        let data_1 = AttestationData {
            target: Checkpoint {
                epoch: 1,
                root: H256::repeat_byte(0),
            },
            ..AttestationData::default()
        };
        let data_2 = AttestationData {
            target: Checkpoint {
                epoch: 1,
                root: H256::repeat_byte(1),
            },
            ..AttestationData::default()
        };
        assert!(is_slashable_attestation_data(&data_1, &data_2));
        assert!(!is_slashable_attestation_data(&data_1, &data_1));
    }

    #[test]
    fn surround_vote_is_slashable() {
        let surrounding = AttestationData {
            source: Checkpoint {
                epoch: 0,
                ..Checkpoint::default()
            },
            target: Checkpoint {
                epoch: 3,
                ..Checkpoint::default()
            },
            ..AttestationData::default()
        };
        let surrounded = AttestationData {
            source: Checkpoint {
                epoch: 1,
                ..Checkpoint::default()
            },
            target: Checkpoint {
                epoch: 2,
                ..Checkpoint::default()
            },
            ..AttestationData::default()
        };
        assert!(is_slashable_attestation_data(&surrounding, &surrounded));
        assert!(!is_slashable_attestation_data(&surrounded, &surrounding));
    }

    #[test]
    fn indexed_attestation_requires_sorted_unique_indices() {
        let state = BeaconState::<MinimalConfig> {
            validators: VariableList::from(vec![Validator::default(); 4]),
            ..BeaconState::default()
        };
        let attestation = IndexedAttestation::<MinimalConfig> {
            attesting_indices: VariableList::from(vec![2, 1]),
            ..IndexedAttestation::default()
        };
        assert_eq!(
            validate_indexed_attestation(&state, &attestation, false),
            Err(Error::BadValidatorIndicesOrdering),
        );

        let attestation = IndexedAttestation::<MinimalConfig> {
            attesting_indices: VariableList::from(vec![1, 1]),
            ..IndexedAttestation::default()
        };
        assert_eq!(
            validate_indexed_attestation(&state, &attestation, false),
            Err(Error::BadValidatorIndicesOrdering),
        );

        let attestation = IndexedAttestation::<MinimalConfig> {
            attesting_indices: VariableList::from(vec![1, 2]),
            ..IndexedAttestation::default()
        };
        assert_eq!(
            validate_indexed_attestation(&state, &attestation, false),
            Ok(()),
        );
    }

    #[test]
    fn indexed_attestation_rejects_unknown_validators() {
        let state = BeaconState::<MinimalConfig> {
            validators: VariableList::from(vec![Validator::default(); 2]),
            ..BeaconState::default()
        };
        let attestation = IndexedAttestation::<MinimalConfig> {
            attesting_indices: VariableList::from(vec![5]),
            ..IndexedAttestation::default()
        };
        assert_eq!(
            validate_indexed_attestation(&state, &attestation, false),
            Err(Error::IndexOutOfRange),
        );
    }

    #[test]
    fn merkle_branch_of_depth_one() {
        let leaf = H256::repeat_byte(1);
        let sibling = H256::repeat_byte(2);
        let root = H256::from_slice(&hash(
            &[leaf.as_slice(), sibling.as_slice()].concat(),
        ));
        assert!(is_valid_merkle_branch(leaf, &[sibling], 1, 0, root));
        assert!(!is_valid_merkle_branch(leaf, &[sibling], 1, 1, root));
    }
}
