use core::convert::TryFrom;
use core::mem;
use std::cmp;

use itertools::Itertools as _;
use ssz_types::{BitVector, VariableList};
use typenum::Unsigned as _;
use helper_functions::beacon_state_accessors::{
    get_active_validator_indices, get_block_root, get_current_epoch, get_previous_epoch,
    get_randao_mix, get_total_active_balance, get_validator_churn_limit,
};
use helper_functions::beacon_state_mutators::{decrease_balance, initiate_validator_exit};
use helper_functions::crypto::hash_tree_root;
use helper_functions::misc::compute_activation_exit_epoch;
use helper_functions::predicates::is_active_validator;
use types::config::Config;
use types::consts::{FAR_FUTURE_EPOCH, GENESIS_EPOCH, JUSTIFICATION_BITS_LENGTH};
use types::primitives::{Gwei, ValidatorIndex};
use types::types::{Checkpoint, HistoricalBatch};
use types::BeaconState;

use crate::attestations::AttestableState;
use crate::error::Error;
use crate::rewards_and_penalties::process_rewards_and_penalties;

pub fn process_epoch<C: Config>(state: &mut BeaconState<C>) -> Result<(), Error> {
    process_justification_and_finalization(state)?;
    process_rewards_and_penalties(state)?;
    process_registry_updates(state)?;
    process_slashings(state)?;
    process_final_updates(state)?;
    Ok(())
}

pub fn process_justification_and_finalization<C: Config>(
    state: &mut BeaconState<C>,
) -> Result<(), Error> {
    let current_epoch = get_current_epoch(state);
    if current_epoch <= GENESIS_EPOCH + 1 {
        return Ok(());
    }
    let previous_epoch = get_previous_epoch(state);

    let old_previous_justified = state.previous_justified_checkpoint;
    let old_current_justified = state.current_justified_checkpoint;

    state.previous_justified_checkpoint = state.current_justified_checkpoint;
    shift_justification_bits(&mut state.justification_bits);

    let total_active_balance = get_total_active_balance(state)?;

    let previous_target_attestations = state.matching_target_attestations(previous_epoch)?;
    if state.attesting_balance(&previous_target_attestations)? * 3 >= total_active_balance * 2 {
        state.current_justified_checkpoint = Checkpoint {
            epoch: previous_epoch,
            root: get_block_root(state, previous_epoch)?,
        };
        set_justification_bit(&mut state.justification_bits, 1);
    }

    let current_target_attestations = state.matching_target_attestations(current_epoch)?;
    if state.attesting_balance(&current_target_attestations)? * 3 >= total_active_balance * 2 {
        state.current_justified_checkpoint = Checkpoint {
            epoch: current_epoch,
            root: get_block_root(state, current_epoch)?,
        };
        set_justification_bit(&mut state.justification_bits, 0);
    }

    // The four finality rules, oldest first so the newest applicable
    // checkpoint wins.
    let bits = justification_bits(&state.justification_bits);

    if bits[1] && bits[2] && bits[3] && old_previous_justified.epoch + 3 == current_epoch {
        state.finalized_checkpoint = old_previous_justified;
    }
    if bits[1] && bits[2] && old_previous_justified.epoch + 2 == current_epoch {
        state.finalized_checkpoint = old_previous_justified;
    }
    if bits[0] && bits[1] && bits[2] && old_current_justified.epoch + 2 == current_epoch {
        state.finalized_checkpoint = old_current_justified;
    }
    if bits[0] && bits[1] && old_current_justified.epoch + 1 == current_epoch {
        state.finalized_checkpoint = old_current_justified;
    }

    Ok(())
}

fn justification_bits(
    bits: &BitVector<types::consts::JustificationBitsLength>,
) -> [bool; JUSTIFICATION_BITS_LENGTH] {
    let mut array = [false; JUSTIFICATION_BITS_LENGTH];
    for (index, bit) in array.iter_mut().enumerate() {
        *bit = bits.get(index).expect("justification bit index is in range");
    }
    array
}

fn shift_justification_bits(bits: &mut BitVector<types::consts::JustificationBitsLength>) {
    let old = justification_bits(bits);
    for index in (1..JUSTIFICATION_BITS_LENGTH).rev() {
        bits.set(index, old[index - 1])
            .expect("justification bit index is in range");
    }
    bits.set(0, false)
        .expect("justification bit index is in range");
}

fn set_justification_bit(
    bits: &mut BitVector<types::consts::JustificationBitsLength>,
    index: usize,
) {
    bits.set(index, true)
        .expect("justification bit index is in range");
}

pub fn process_registry_updates<C: Config>(state: &mut BeaconState<C>) -> Result<(), Error> {
    let current_epoch = get_current_epoch(state);

    let mut newly_eligible = Vec::new();
    let mut ejected = Vec::new();
    for (index, validator) in state.validators.iter().enumerate() {
        if validator.activation_eligibility_epoch == FAR_FUTURE_EPOCH
            && validator.effective_balance == C::max_effective_balance()
        {
            newly_eligible.push(index);
        }
        if is_active_validator(validator, current_epoch)
            && validator.effective_balance <= C::ejection_balance()
        {
            ejected.push(index as ValidatorIndex);
        }
    }

    for index in newly_eligible {
        state.validators[index].activation_eligibility_epoch = current_epoch;
    }
    for index in ejected {
        initiate_validator_exit(state, index)?;
    }

    // Validators eligible for activation and not already dequeued before the
    // last finalized epoch, oldest eligibility first, index as tie-break.
    let activation_cutoff = compute_activation_exit_epoch::<C>(state.finalized_checkpoint.epoch);
    let activation_queue = state
        .validators
        .iter()
        .enumerate()
        .filter(|(_, validator)| {
            validator.activation_eligibility_epoch != FAR_FUTURE_EPOCH
                && validator.activation_epoch >= activation_cutoff
        })
        .sorted_by_key(|(index, validator)| (validator.activation_eligibility_epoch, *index))
        .map(|(index, _)| index)
        .collect_vec();

    let churn_limit = get_validator_churn_limit(state);
    let delayed_activation_epoch = compute_activation_exit_epoch::<C>(current_epoch);
    for index in activation_queue.into_iter().take(churn_limit as usize) {
        let validator = &mut state.validators[index];
        if validator.activation_epoch == FAR_FUTURE_EPOCH {
            validator.activation_epoch = delayed_activation_epoch;
        }
    }

    Ok(())
}

pub fn process_slashings<C: Config>(state: &mut BeaconState<C>) -> Result<(), Error> {
    let epoch = get_current_epoch(state);
    let total_balance = get_total_active_balance(state)?;
    let slashings_sum = state.slashings.iter().sum::<Gwei>();

    let mut penalties = Vec::new();
    for (index, validator) in state.validators.iter().enumerate() {
        let halfway = epoch + C::epochs_per_slashings_vector() / 2 == validator.withdrawable_epoch;
        if validator.slashed && halfway {
            let increment = C::effective_balance_increment();
            let penalty_numerator = validator.effective_balance / increment
                * cmp::min(slashings_sum * 3, total_balance);
            let penalty = penalty_numerator / total_balance * increment;
            let floor = validator.effective_balance / C::min_slashing_penalty_quotient();
            penalties.push((index as ValidatorIndex, cmp::max(penalty, floor)));
        }
    }

    for (index, penalty) in penalties {
        decrease_balance(state, index, penalty)?;
    }

    Ok(())
}

pub fn process_final_updates<C: Config>(state: &mut BeaconState<C>) -> Result<(), Error> {
    let current_epoch = get_current_epoch(state);
    let next_epoch = current_epoch + 1;

    // Reset eth1 data votes at the end of a voting period.
    if (state.slot + 1) % C::SlotsPerEth1VotingPeriod::U64 == 0 {
        state.eth1_data_votes = VariableList::from(vec![]);
    }

    // Update effective balances with hysteresis. The effective balance only
    // moves when the actual balance leaves the band
    // [effective - 0.25 increments, effective + 1.25 increments].
    let hysteresis_increment = C::effective_balance_increment() / C::hysteresis_quotient();
    let downward_threshold = hysteresis_increment * C::hysteresis_downward_multiplier();
    let upward_threshold = hysteresis_increment * C::hysteresis_upward_multiplier();
    for (index, validator) in state.validators.iter_mut().enumerate() {
        let balance = state.balances[index];
        if balance + downward_threshold < validator.effective_balance
            || validator.effective_balance + upward_threshold < balance
        {
            validator.effective_balance = cmp::min(
                balance - balance % C::effective_balance_increment(),
                C::max_effective_balance(),
            );
        }
    }

    // Rotate the slashings ring.
    let slashings_index = usize::try_from(next_epoch % C::epochs_per_slashings_vector())
        .map_err(|_| helper_functions::Error::IndexOutOfRange)?;
    state.slashings[slashings_index] = 0;

    // Carry the randao mix forward into the next epoch.
    let mix = get_randao_mix(state, current_epoch)?;
    state.set_randao_mix(next_epoch, mix)?;

    // Commit to the active set visible at the activation lookahead.
    let lookahead_epoch = next_epoch + C::activation_exit_delay();
    let active_indices = get_active_validator_indices(state, lookahead_epoch);
    let active_root = hash_tree_root(
        &VariableList::<u64, C::ValidatorRegistryLimit>::new(active_indices)
            .map_err(|_| Error::OperationLimitExceeded)?,
    );
    let active_index = usize::try_from(lookahead_epoch % C::epochs_per_historical_vector())
        .map_err(|_| helper_functions::Error::IndexOutOfRange)?;
    state.active_index_roots[active_index] = active_root;

    // Accumulate a historical batch once the root rings wrap.
    if next_epoch % (C::slots_per_historical_root() / C::slots_per_epoch()) == 0 {
        let historical_batch = HistoricalBatch::<C> {
            block_roots: state.block_roots.clone(),
            state_roots: state.state_roots.clone(),
        };
        state
            .historical_roots
            .push(hash_tree_root(&historical_batch))
            .map_err(|_| Error::OperationLimitExceeded)?;
    }

    // Rotate pending attestations.
    state.previous_epoch_attestations = mem::replace(
        &mut state.current_epoch_attestations,
        VariableList::from(vec![]),
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use ssz_types::{BitList, FixedVector};
    use types::config::MinimalConfig;
    use types::primitives::{Epoch, Slot, H256};
    use types::types::{AttestationData, PendingAttestation, Validator};

    use crate::test_builders::genesis_state;

    use super::*;

    type C = MinimalConfig;

    const ROOT: H256 = H256::repeat_byte(7);

    /// A state in `epoch` whose block-root ring uniformly holds `ROOT`, so
    /// every target and head comparison matches.
    fn state_in_epoch(epoch: Epoch) -> BeaconState<C> {
        let mut state = genesis_state::<C>(8, 0);
        state.slot = C::slots_per_epoch() * (epoch + 1) - 1;
        state.block_roots =
            FixedVector::from(vec![ROOT; C::slots_per_historical_root() as usize]);
        state
    }

    /// One all-bits-set attestation per slot of `epoch`, enough for the full
    /// active balance to count as attesting.
    fn full_attestations(state: &BeaconState<C>, epoch: Epoch) -> Vec<PendingAttestation<C>> {
        let start = epoch * C::slots_per_epoch();
        (start..start + C::slots_per_epoch())
            .map(|slot: Slot| {
                let committee =
                    helper_functions::beacon_state_accessors::get_beacon_committee(state, slot, 0)
                        .expect("the committee exists");
                let mut bits = BitList::with_capacity(committee.len())
                    .expect("committee fits the bit list");
                for position in 0..committee.len() {
                    bits.set(position, true).expect("position is in range");
                }
                PendingAttestation {
                    aggregation_bits: bits,
                    data: AttestationData {
                        slot,
                        index: 0,
                        beacon_block_root: ROOT,
                        source: Checkpoint::default(),
                        target: Checkpoint { epoch, root: ROOT },
                    },
                    inclusion_delay: 1,
                    proposer_index: 0,
                }
            })
            .collect()
    }

    #[test]
    fn supermajority_justifies_the_previous_epoch() {
        let mut state = state_in_epoch(2);
        state.justification_bits.set(0, true).expect("bit 0 exists");
        state.justification_bits.set(1, true).expect("bit 1 exists");

        state.previous_epoch_attestations =
            VariableList::from(full_attestations(&state, 1));

        process_justification_and_finalization(&mut state)
            .expect("justification is computable");

        assert_eq!(state.current_justified_checkpoint.epoch, 1);
        assert_eq!(state.current_justified_checkpoint.root, ROOT);
        assert_eq!(state.finalized_checkpoint.epoch, 0);
    }

    #[test]
    fn continued_supermajority_finalizes() {
        let mut state = state_in_epoch(2);
        state.justification_bits.set(0, true).expect("bit 0 exists");
        state.justification_bits.set(1, true).expect("bit 1 exists");
        state.previous_epoch_attestations =
            VariableList::from(full_attestations(&state, 1));

        process_justification_and_finalization(&mut state)
            .expect("justification is computable");
        assert_eq!(state.finalized_checkpoint.epoch, 0);

        // One more epoch of full participation, both lists populated.
        state.slot = C::slots_per_epoch() * 4 - 1;
        state.previous_epoch_attestations =
            VariableList::from(full_attestations(&state, 2));
        state.current_epoch_attestations = VariableList::from(full_attestations(&state, 3));

        process_justification_and_finalization(&mut state)
            .expect("justification is computable");

        assert_eq!(state.current_justified_checkpoint.epoch, 3);
        assert_eq!(state.finalized_checkpoint.epoch, 1);
    }

    #[test]
    fn no_attestations_no_justification() {
        let mut state = state_in_epoch(2);
        process_justification_and_finalization(&mut state)
            .expect("justification is computable");
        assert_eq!(state.current_justified_checkpoint.epoch, 0);
        assert_eq!(state.finalized_checkpoint.epoch, 0);
    }

    #[test]
    fn finalized_epoch_never_decreases() {
        let mut state = state_in_epoch(2);
        state.finalized_checkpoint = Checkpoint {
            epoch: 1,
            root: ROOT,
        };
        process_justification_and_finalization(&mut state)
            .expect("justification is computable");
        assert!(state.finalized_checkpoint.epoch >= 1);
    }

    #[test]
    fn max_balance_marks_eligibility() {
        let mut state = genesis_state::<C>(4, 0);
        state
            .validators
            .push(Validator {
                effective_balance: C::max_effective_balance(),
                activation_eligibility_epoch: FAR_FUTURE_EPOCH,
                activation_epoch: FAR_FUTURE_EPOCH,
                exit_epoch: FAR_FUTURE_EPOCH,
                withdrawable_epoch: FAR_FUTURE_EPOCH,
                ..Validator::default()
            })
            .expect("the registry has room");
        state.balances.push(C::max_effective_balance()).expect("the registry has room");

        process_registry_updates(&mut state).expect("registry update succeeds");
        assert_eq!(state.validators[4].activation_eligibility_epoch, 0);
    }

    #[test]
    fn activations_are_dequeued_by_eligibility_then_index() {
        let mut state = genesis_state::<C>(4, 0);
        for eligibility in &[3, 1, 1] {
            state
                .validators
                .push(Validator {
                    effective_balance: C::max_effective_balance(),
                    activation_eligibility_epoch: *eligibility,
                    activation_epoch: FAR_FUTURE_EPOCH,
                    exit_epoch: FAR_FUTURE_EPOCH,
                    withdrawable_epoch: FAR_FUTURE_EPOCH,
                    ..Validator::default()
                })
                .expect("the registry has room");
            state
                .balances
                .push(C::max_effective_balance())
                .expect("the registry has room");
        }

        // A churn limit of 4 admits everything queued here; order is what
        // matters and it is deterministic, so just check the epochs land.
        process_registry_updates(&mut state).expect("registry update succeeds");

        let expected = compute_activation_exit_epoch::<C>(0);
        assert_eq!(state.validators[4].activation_epoch, expected);
        assert_eq!(state.validators[5].activation_epoch, expected);
        assert_eq!(state.validators[6].activation_epoch, expected);
    }

    #[test]
    fn low_balance_validators_are_ejected() {
        let mut state = genesis_state::<C>(4, 0);
        state.validators[2].effective_balance = C::ejection_balance();

        process_registry_updates(&mut state).expect("registry update succeeds");
        assert_ne!(state.validators[2].exit_epoch, FAR_FUTURE_EPOCH);
    }

    #[test]
    fn slashing_penalty_applies_at_the_halfway_point() {
        let mut state = genesis_state::<C>(8, 0);
        let effective = C::max_effective_balance();

        state.validators[3].slashed = true;
        state.validators[3].withdrawable_epoch = C::epochs_per_slashings_vector() / 2;
        state.slashings[0] = effective;

        process_slashings(&mut state).expect("slashings are computable");

        let total = 8 * effective;
        let increment = C::effective_balance_increment();
        let expected = effective / increment * cmp::min(3 * effective, total) / total * increment;
        let floor = effective / C::min_slashing_penalty_quotient();
        assert_eq!(state.balances[3], effective - cmp::max(expected, floor));
    }

    #[test]
    fn hysteresis_holds_within_the_band() {
        let mut state = genesis_state::<C>(4, 0);
        let increment = C::effective_balance_increment();
        let effective = state.validators[0].effective_balance;

        // A small dip stays inside the band.
        state.balances[0] = effective - increment / 4;
        process_final_updates(&mut state).expect("final updates succeed");
        assert_eq!(state.validators[0].effective_balance, effective);

        // A dip past a quarter increment drops the effective balance.
        state.balances[0] = effective - increment / 4 - 1;
        process_final_updates(&mut state).expect("final updates succeed");
        assert!(state.validators[0].effective_balance < effective);
    }

    #[test]
    fn hysteresis_requires_a_full_upward_increment_and_a_quarter() {
        let mut state = genesis_state::<C>(4, 0);
        let increment = C::effective_balance_increment();
        // Dropping the effective balance below max lets upward moves act.
        state.validators[0].effective_balance = increment * 10;

        state.balances[0] = increment * 10 + increment * 5 / 4;
        process_final_updates(&mut state).expect("final updates succeed");
        assert_eq!(state.validators[0].effective_balance, increment * 10);

        state.balances[0] = increment * 10 + increment * 5 / 4 + 1;
        process_final_updates(&mut state).expect("final updates succeed");
        assert_eq!(state.validators[0].effective_balance, increment * 11);
    }

    #[test]
    fn final_updates_rotate_attestations_and_slashings() {
        let mut state = state_in_epoch(1);
        state.current_epoch_attestations = VariableList::from(full_attestations(&state, 1));
        let count = state.current_epoch_attestations.len();
        state.slashings[2] = 11;

        process_final_updates(&mut state).expect("final updates succeed");

        assert_eq!(state.previous_epoch_attestations.len(), count);
        assert!(state.current_epoch_attestations.is_empty());
        // next_epoch == 2, so that ring slot was reset
        assert_eq!(state.slashings[2], 0);
    }
}
