use core::convert::TryFrom;
use std::cmp;
use std::collections::BTreeSet;

use ssz_types::{BitList, VariableList};
use types::config::Config;
use types::primitives::*;
use types::types::{Attestation, AttestationData, IndexedAttestation};
use types::BeaconState;

use crate::error::Error;
use crate::math::int_to_bytes;
use crate::misc::{
    compute_committee, compute_epoch_at_slot, compute_domain, compute_proposer_index,
    compute_start_slot_at_epoch,
};
use crate::predicates::is_active_validator;
use crate::crypto::hash;

pub fn get_current_epoch<C: Config>(state: &BeaconState<C>) -> Epoch {
    compute_epoch_at_slot::<C>(state.slot)
}

pub fn get_previous_epoch<C: Config>(state: &BeaconState<C>) -> Epoch {
    let current_epoch = get_current_epoch(state);
    if current_epoch > C::genesis_epoch() {
        current_epoch - 1
    } else {
        C::genesis_epoch()
    }
}

/// Root of the first block of `epoch`, from the historical ring.
pub fn get_block_root<C: Config>(state: &BeaconState<C>, epoch: Epoch) -> Result<H256, Error> {
    get_block_root_at_slot(state, compute_start_slot_at_epoch::<C>(epoch))
}

pub fn get_block_root_at_slot<C: Config>(
    state: &BeaconState<C>,
    slot: Slot,
) -> Result<H256, Error> {
    state.block_root_at_slot(slot).map_err(Into::into)
}

pub fn get_randao_mix<C: Config>(state: &BeaconState<C>, epoch: Epoch) -> Result<H256, Error> {
    state.randao_mix(epoch).map_err(Into::into)
}

pub fn get_active_validator_indices<C: Config>(
    state: &BeaconState<C>,
    epoch: Epoch,
) -> Vec<ValidatorIndex> {
    let mut active_validator_indices = Vec::new();
    for (index, validator) in state.validators.iter().enumerate() {
        if is_active_validator(validator, epoch) {
            active_validator_indices.push(index as u64);
        }
    }
    active_validator_indices
}

pub fn get_validator_churn_limit<C: Config>(state: &BeaconState<C>) -> u64 {
    let active = get_active_validator_indices(state, get_current_epoch(state));
    cmp::max(
        C::min_per_epoch_churn_limit(),
        active.len() as u64 / C::churn_limit_quotient(),
    )
}

pub fn get_seed<C: Config>(
    state: &BeaconState<C>,
    epoch: Epoch,
    domain_type: DomainType,
) -> Result<H256, Error> {
    // The mix one lookahead short of the full vector, so shuffling for an
    // epoch is fixed before the epoch begins.
    let mix = get_randao_mix(
        state,
        epoch + C::epochs_per_historical_vector() - C::min_seed_lookahead() - 1,
    )?;

    let mut preimage = int_to_bytes(u64::from(domain_type), 4);
    preimage.append(&mut int_to_bytes(epoch, 8));
    preimage.extend_from_slice(mix.as_slice());

    Ok(H256::from_slice(&hash(&preimage)))
}

pub fn get_committee_count_at_slot<C: Config>(
    state: &BeaconState<C>,
    slot: Slot,
) -> Result<u64, Error> {
    let epoch = compute_epoch_at_slot::<C>(slot);
    let active = get_active_validator_indices(state, epoch).len() as u64;

    Ok(cmp::max(
        1,
        cmp::min(
            C::max_committees_per_slot(),
            active / C::slots_per_epoch() / C::target_committee_size(),
        ),
    ))
}

pub fn get_beacon_committee<C: Config>(
    state: &BeaconState<C>,
    slot: Slot,
    index: CommitteeIndex,
) -> Result<Vec<ValidatorIndex>, Error> {
    let epoch = compute_epoch_at_slot::<C>(slot);
    let committees_per_slot = get_committee_count_at_slot(state, slot)?;
    let indices = get_active_validator_indices(state, epoch);
    let seed = get_seed(state, epoch, C::domain_beacon_attester())?;

    compute_committee::<C>(
        &indices,
        seed,
        (slot % C::slots_per_epoch()) * committees_per_slot + index,
        committees_per_slot * C::slots_per_epoch(),
    )
}

pub fn get_beacon_proposer_index<C: Config>(
    state: &BeaconState<C>,
) -> Result<ValidatorIndex, Error> {
    let epoch = get_current_epoch(state);
    let base_seed = get_seed(state, epoch, C::domain_beacon_proposer())?;

    let mut preimage = base_seed.as_slice().to_vec();
    preimage.append(&mut int_to_bytes(state.slot, 8));
    let seed = H256::from_slice(&hash(&preimage));

    let indices = get_active_validator_indices(state, epoch);
    compute_proposer_index(state, &indices, seed)
}

/// Sum of effective balances, floored at one so callers can divide by it.
pub fn get_total_balance<C: Config>(
    state: &BeaconState<C>,
    indices: &[ValidatorIndex],
) -> Result<Gwei, Error> {
    let mut sum = 0;
    for index in indices.iter().copied() {
        let index = usize::try_from(index).map_err(|_| Error::IndexOutOfRange)?;
        sum += state
            .validators
            .get(index)
            .ok_or(Error::IndexOutOfRange)?
            .effective_balance;
    }
    Ok(cmp::max(1, sum))
}

pub fn get_total_active_balance<C: Config>(state: &BeaconState<C>) -> Result<Gwei, Error> {
    get_total_balance(
        state,
        &get_active_validator_indices(state, get_current_epoch(state)),
    )
}

pub fn get_domain<C: Config>(
    state: &BeaconState<C>,
    domain_type: DomainType,
    message_epoch: Option<Epoch>,
) -> Domain {
    let epoch = message_epoch.unwrap_or_else(|| get_current_epoch(state));
    let fork_version = if epoch < state.fork.epoch {
        state.fork.previous_version
    } else {
        state.fork.current_version
    };
    compute_domain::<C>(domain_type, Some(fork_version))
}

/// Committee members that actually voted, in ascending index order.
pub fn get_attesting_indices<C: Config>(
    state: &BeaconState<C>,
    data: &AttestationData,
    bits: &BitList<C::MaxValidatorsPerCommittee>,
) -> Result<BTreeSet<ValidatorIndex>, Error> {
    let committee = get_beacon_committee(state, data.slot, data.index)?;
    if bits.len() != committee.len() {
        return Err(Error::AttestationBitsInvalid);
    }

    Ok(committee
        .iter()
        .enumerate()
        .filter_map(|(position, index)| match bits.get(position) {
            Ok(true) => Some(*index),
            _ => None,
        })
        .collect())
}

pub fn get_indexed_attestation<C: Config>(
    state: &BeaconState<C>,
    attestation: &Attestation<C>,
) -> Result<IndexedAttestation<C>, Error> {
    let attesting_indices =
        get_attesting_indices(state, &attestation.data, &attestation.aggregation_bits)?;

    Ok(IndexedAttestation {
        attesting_indices: VariableList::new(attesting_indices.into_iter().collect())
            .map_err(|_| Error::MaxIndicesExceeded)?,
        data: attestation.data,
        signature: attestation.signature,
    })
}
