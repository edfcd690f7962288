use core::convert::TryFrom;
use std::cmp::max;

use tree_hash::TreeHash;
use types::config::Config;
use types::primitives::{Domain, DomainType, Epoch, Slot, ValidatorIndex, Version, H256};
use types::types::SigningRoot;

use crate::crypto::hash;
use crate::error::Error;
use crate::math::{bytes_to_int, int_to_bytes};

pub fn compute_epoch_at_slot<C: Config>(slot: Slot) -> Epoch {
    slot / C::slots_per_epoch()
}

pub fn compute_start_slot_at_epoch<C: Config>(epoch: Epoch) -> Slot {
    epoch * C::slots_per_epoch()
}

pub fn compute_activation_exit_epoch<C: Config>(epoch: Epoch) -> Epoch {
    epoch + 1 + C::activation_exit_delay()
}

pub fn compute_domain<C: Config>(domain_type: DomainType, fork_version: Option<Version>) -> Domain {
    let version = fork_version.unwrap_or_else(C::genesis_fork_version);
    let mut bytes = [0; 8];
    bytes[..4].copy_from_slice(&domain_type.to_le_bytes());
    bytes[4..].copy_from_slice(version.as_array());
    Domain::from(u64::from_le_bytes(bytes))
}

pub fn compute_signing_root<T: TreeHash>(object: &T, domain: Domain) -> H256 {
    SigningRoot {
        object_root: object.tree_hash_root(),
        domain,
    }
    .tree_hash_root()
}

/// The swap-or-not shuffle, one index at a time. Committee assignment only
/// ever needs a slice of the permutation, so the full-list variant is not
/// materialized.
pub fn compute_shuffled_index<C: Config>(
    mut index: ValidatorIndex,
    index_count: u64,
    seed: H256,
) -> Result<ValidatorIndex, Error> {
    if index >= index_count {
        return Err(Error::IndexOutOfRange);
    }

    for current_round in 0..u64::from(C::shuffle_round_count()) {
        let pivot = bytes_to_int(hash_seed_round(seed, current_round)) % index_count;
        let flip = (pivot + index_count - index) % index_count;
        let position = max(index, flip);
        let source = hash_seed_round_position(seed, current_round, position);
        let byte = source[usize::try_from((position % 256) / 8).map_err(|_| Error::IndexOutOfRange)?];
        let bit = (byte >> (position % 8)) % 2;
        index = if bit == 0 { index } else { flip };
    }

    Ok(index)
}

fn hash_seed_round(seed: H256, current_round: u64) -> [u8; 8] {
    let mut preimage = seed.as_slice().to_vec();
    preimage.append(&mut int_to_bytes(current_round, 1));
    let mut bytes = [0; 8];
    bytes.copy_from_slice(&hash(&preimage)[..8]);
    bytes
}

fn hash_seed_round_position(seed: H256, current_round: u64, position: u64) -> Vec<u8> {
    let mut preimage = seed.as_slice().to_vec();
    preimage.append(&mut int_to_bytes(current_round, 1));
    preimage.append(&mut int_to_bytes(position / 256, 4));
    hash(&preimage)
}

pub fn compute_committee<C: Config>(
    indices: &[ValidatorIndex],
    seed: H256,
    index: u64,
    count: u64,
) -> Result<Vec<ValidatorIndex>, Error> {
    let length = indices.len() as u64;
    let start = length * index / count;
    let end = length * (index + 1) / count;

    let mut committee = Vec::with_capacity(usize::try_from(end - start).unwrap_or_default());
    for position in start..end {
        let shuffled = compute_shuffled_index::<C>(position, length, seed)?;
        let shuffled = usize::try_from(shuffled).map_err(|_| Error::IndexOutOfRange)?;
        committee.push(indices[shuffled]);
    }

    Ok(committee)
}

/// Effective-balance-weighted proposer sampling over the shuffled active set.
pub fn compute_proposer_index<C: Config>(
    state: &types::BeaconState<C>,
    indices: &[ValidatorIndex],
    seed: H256,
) -> Result<ValidatorIndex, Error> {
    if indices.is_empty() {
        return Err(Error::NoActiveValidators);
    }

    const MAX_RANDOM_BYTE: u64 = u8::max_value() as u64;
    let total = indices.len() as u64;
    let mut i = 0_u64;

    loop {
        let shuffled = compute_shuffled_index::<C>(i % total, total, seed)?;
        let shuffled = usize::try_from(shuffled).map_err(|_| Error::IndexOutOfRange)?;
        let candidate = indices[shuffled];

        let mut preimage = seed.as_slice().to_vec();
        preimage.append(&mut int_to_bytes(i / 32, 8));
        let random_byte = u64::from(hash(&preimage)[usize::try_from(i % 32).map_err(|_| Error::IndexOutOfRange)?]);

        let candidate_usize = usize::try_from(candidate).map_err(|_| Error::IndexOutOfRange)?;
        let effective_balance = state.validators[candidate_usize].effective_balance;
        if effective_balance * MAX_RANDOM_BYTE >= C::max_effective_balance() * random_byte {
            break Ok(candidate);
        }

        i += 1;
    }
}
