use core::convert::TryFrom;
use std::cmp;

use types::config::Config;
use types::consts::FAR_FUTURE_EPOCH;
use types::primitives::{Gwei, ValidatorIndex};
use types::BeaconState;

use crate::beacon_state_accessors::{
    get_beacon_proposer_index, get_current_epoch, get_validator_churn_limit,
};
use crate::error::Error;
use crate::misc::compute_activation_exit_epoch;

pub fn increase_balance<C: Config>(
    state: &mut BeaconState<C>,
    index: ValidatorIndex,
    delta: Gwei,
) -> Result<(), Error> {
    usize::try_from(index).map_err(|_| Error::IndexOutOfRange)?;
    state.increase_balance(index, delta);
    Ok(())
}

pub fn decrease_balance<C: Config>(
    state: &mut BeaconState<C>,
    index: ValidatorIndex,
    delta: Gwei,
) -> Result<(), Error> {
    usize::try_from(index).map_err(|_| Error::IndexOutOfRange)?;
    state.decrease_balance(index, delta);
    Ok(())
}

/// Queues a validator for exit behind the per-epoch churn limit.
/// A second call for the same validator is a no-op.
pub fn initiate_validator_exit<C: Config>(
    state: &mut BeaconState<C>,
    index: ValidatorIndex,
) -> Result<(), Error> {
    let index = usize::try_from(index).map_err(|_| Error::IndexOutOfRange)?;
    if state.validators.get(index).ok_or(Error::IndexOutOfRange)?.exit_epoch != FAR_FUTURE_EPOCH {
        return Ok(());
    }

    let mut exit_queue_epoch = state
        .validators
        .iter()
        .map(|validator| validator.exit_epoch)
        .filter(|exit_epoch| *exit_epoch != FAR_FUTURE_EPOCH)
        .max()
        .unwrap_or(0);
    exit_queue_epoch = cmp::max(
        exit_queue_epoch,
        compute_activation_exit_epoch::<C>(get_current_epoch(state)),
    );

    let exit_queue_churn = state
        .validators
        .iter()
        .filter(|validator| validator.exit_epoch == exit_queue_epoch)
        .count() as u64;
    if exit_queue_churn >= get_validator_churn_limit(state) {
        exit_queue_epoch += 1;
    }

    let validator = &mut state.validators[index];
    validator.exit_epoch = exit_queue_epoch;
    validator.withdrawable_epoch = exit_queue_epoch + C::min_validator_withdrawability_delay();

    Ok(())
}

/// Slashes a validator: forced exit, slashings-ring accounting, the
/// immediate penalty, and the whistleblower/proposer reward split.
pub fn slash_validator<C: Config>(
    state: &mut BeaconState<C>,
    slashed_index: ValidatorIndex,
    whistleblower_index: Option<ValidatorIndex>,
) -> Result<(), Error> {
    let epoch = get_current_epoch(state);
    initiate_validator_exit(state, slashed_index)?;

    let index = usize::try_from(slashed_index).map_err(|_| Error::IndexOutOfRange)?;
    let effective_balance = {
        let validator = state
            .validators
            .get_mut(index)
            .ok_or(Error::IndexOutOfRange)?;
        validator.slashed = true;
        validator.withdrawable_epoch = cmp::max(
            validator.withdrawable_epoch,
            epoch + C::epochs_per_slashings_vector(),
        );
        validator.effective_balance
    };

    let slashings_index =
        usize::try_from(epoch % C::epochs_per_slashings_vector()).map_err(|_| Error::IndexOutOfRange)?;
    state.slashings[slashings_index] += effective_balance;
    decrease_balance(
        state,
        slashed_index,
        effective_balance / C::min_slashing_penalty_quotient(),
    )?;

    let proposer_index = get_beacon_proposer_index(state)?;
    let whistleblower_index = whistleblower_index.unwrap_or(proposer_index);
    let whistleblower_reward = effective_balance / C::whistleblower_reward_quotient();
    let proposer_reward = whistleblower_reward / C::proposer_reward_quotient();
    increase_balance(state, proposer_index, proposer_reward)?;
    increase_balance(
        state,
        whistleblower_index,
        whistleblower_reward - proposer_reward,
    )?;

    Ok(())
}
