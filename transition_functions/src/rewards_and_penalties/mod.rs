use core::convert::TryFrom;

use helper_functions::beacon_state_accessors::{
    get_attesting_indices, get_current_epoch, get_previous_epoch, get_total_active_balance,
};
use helper_functions::beacon_state_mutators::{decrease_balance, increase_balance};
use helper_functions::math::integer_squareroot;
use helper_functions::predicates::is_active_validator;
use types::config::Config;
use types::consts::BASE_REWARDS_PER_EPOCH;
use types::primitives::{Gwei, ValidatorIndex};
use types::BeaconState;

use crate::attestations::AttestableState;
use crate::error::Error;

pub fn get_base_reward<C: Config>(
    state: &BeaconState<C>,
    index: ValidatorIndex,
    total_balance: Gwei,
) -> Result<Gwei, Error> {
    let index = usize::try_from(index).map_err(|_| helper_functions::Error::IndexOutOfRange)?;
    let effective_balance = state
        .validators
        .get(index)
        .ok_or(helper_functions::Error::IndexOutOfRange)?
        .effective_balance;

    Ok(effective_balance * C::base_reward_factor()
        / integer_squareroot(total_balance)
        / BASE_REWARDS_PER_EPOCH)
}

/// Per-validator reward and penalty totals for the previous epoch.
/// Index order everywhere; the result is independent of map iteration.
pub fn get_attestation_deltas<C: Config>(
    state: &BeaconState<C>,
) -> Result<(Vec<Gwei>, Vec<Gwei>), Error> {
    let previous_epoch = get_previous_epoch(state);
    let total_balance = get_total_active_balance(state)?;

    let validator_count = state.validators.len();
    let mut rewards = vec![0; validator_count];
    let mut penalties = vec![0; validator_count];

    let mut eligible_validator_indices = Vec::new();
    for (index, validator) in state.validators.iter().enumerate() {
        let eligible = is_active_validator(validator, previous_epoch)
            || (validator.slashed && previous_epoch + 1 < validator.withdrawable_epoch);
        if eligible {
            eligible_validator_indices.push(index as ValidatorIndex);
        }
    }

    // Micro-incentives for matching FFG source, FFG target, and head.
    let matching_source_attestations = state.matching_source_attestations(previous_epoch)?;
    let matching_target_attestations = state.matching_target_attestations(previous_epoch)?;
    let matching_head_attestations = state.matching_head_attestations(previous_epoch)?;

    for attestations in &[
        &matching_source_attestations,
        &matching_target_attestations,
        &matching_head_attestations,
    ] {
        let unslashed_attesting_indices = state.unslashed_attesting_indices(attestations)?;
        let attesting_balance = state.attesting_balance(attestations)?;

        for index in eligible_validator_indices.iter().copied() {
            let base_reward = get_base_reward(state, index, total_balance)?;
            let position = usize::try_from(index)
                .map_err(|_| helper_functions::Error::IndexOutOfRange)?;
            if unslashed_attesting_indices.contains(&index) {
                rewards[position] += base_reward * attesting_balance / total_balance;
            } else {
                penalties[position] += base_reward;
            }
        }
    }

    // Proposer and inclusion-delay micro-rewards. Each attester pays out of
    // the earliest inclusion that covers them.
    for index in state
        .unslashed_attesting_indices(&matching_source_attestations)?
        .iter()
        .copied()
    {
        let mut earliest: Option<&types::types::PendingAttestation<C>> = None;
        for attestation in &matching_source_attestations {
            let covers = get_attesting_indices(
                state,
                &attestation.data,
                &attestation.aggregation_bits,
            )?
            .contains(&index);
            if covers {
                let earlier = earliest
                    .map(|best| attestation.inclusion_delay < best.inclusion_delay)
                    .unwrap_or(true);
                if earlier {
                    earliest = Some(attestation);
                }
            }
        }
        let attestation =
            earliest.ok_or(helper_functions::Error::IndexOutOfRange)?;

        let base_reward = get_base_reward(state, index, total_balance)?;
        let proposer_reward = base_reward / C::proposer_reward_quotient();
        let proposer_position = usize::try_from(attestation.proposer_index)
            .map_err(|_| helper_functions::Error::IndexOutOfRange)?;
        rewards[proposer_position] += proposer_reward;

        let max_attester_reward = base_reward - proposer_reward;
        let position =
            usize::try_from(index).map_err(|_| helper_functions::Error::IndexOutOfRange)?;
        rewards[position] += max_attester_reward / attestation.inclusion_delay;
    }

    // Inactivity leak: when finality stalls, everyone bleeds, and those not
    // voting for the right target bleed proportionally to the delay.
    let finality_delay = previous_epoch - state.finalized_checkpoint.epoch;
    if finality_delay > C::min_epochs_to_inactivity_penalty() {
        let matching_target_attesting_indices =
            state.unslashed_attesting_indices(&matching_target_attestations)?;
        for index in eligible_validator_indices.iter().copied() {
            let base_reward = get_base_reward(state, index, total_balance)?;
            let position =
                usize::try_from(index).map_err(|_| helper_functions::Error::IndexOutOfRange)?;
            penalties[position] += BASE_REWARDS_PER_EPOCH * base_reward;
            if !matching_target_attesting_indices.contains(&index) {
                let effective_balance = state.validators[position].effective_balance;
                penalties[position] +=
                    effective_balance * finality_delay / C::inactivity_penalty_quotient();
            }
        }
    }

    Ok((rewards, penalties))
}

pub fn process_rewards_and_penalties<C: Config>(state: &mut BeaconState<C>) -> Result<(), Error> {
    if get_current_epoch(state) == C::genesis_epoch() {
        return Ok(());
    }

    let (rewards, penalties) = get_attestation_deltas(state)?;
    for index in 0..state.validators.len() as u64 {
        increase_balance(state, index, rewards[index as usize])?;
        decrease_balance(state, index, penalties[index as usize])?;
    }

    Ok(())
}
