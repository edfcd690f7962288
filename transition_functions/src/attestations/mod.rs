use std::collections::BTreeSet;

use helper_functions::beacon_state_accessors::{
    get_attesting_indices, get_block_root, get_block_root_at_slot, get_current_epoch,
    get_previous_epoch, get_total_balance,
};
use types::config::Config;
use types::primitives::{Epoch, Gwei, ValidatorIndex};
use types::types::PendingAttestation;
use types::BeaconState;

use crate::error::Error;

/// Queries over the pending attestations accumulated in the state, used by
/// justification and by the reward computation.
pub trait AttestableState<C: Config> {
    fn matching_source_attestations(
        &self,
        epoch: Epoch,
    ) -> Result<Vec<PendingAttestation<C>>, Error>;
    fn matching_target_attestations(
        &self,
        epoch: Epoch,
    ) -> Result<Vec<PendingAttestation<C>>, Error>;
    fn matching_head_attestations(&self, epoch: Epoch)
        -> Result<Vec<PendingAttestation<C>>, Error>;
    fn unslashed_attesting_indices(
        &self,
        attestations: &[PendingAttestation<C>],
    ) -> Result<BTreeSet<ValidatorIndex>, Error>;
    fn attesting_balance(&self, attestations: &[PendingAttestation<C>]) -> Result<Gwei, Error>;
}

impl<C: Config> AttestableState<C> for BeaconState<C> {
    fn matching_source_attestations(
        &self,
        epoch: Epoch,
    ) -> Result<Vec<PendingAttestation<C>>, Error> {
        if epoch == get_current_epoch(self) {
            Ok(self.current_epoch_attestations.iter().cloned().collect())
        } else if epoch == get_previous_epoch(self) {
            Ok(self.previous_epoch_attestations.iter().cloned().collect())
        } else {
            Err(Error::EpochOutOfRange { epoch })
        }
    }

    fn matching_target_attestations(
        &self,
        epoch: Epoch,
    ) -> Result<Vec<PendingAttestation<C>>, Error> {
        let target_root = get_block_root(self, epoch)?;
        Ok(self
            .matching_source_attestations(epoch)?
            .into_iter()
            .filter(|attestation| attestation.data.target.root == target_root)
            .collect())
    }

    fn matching_head_attestations(
        &self,
        epoch: Epoch,
    ) -> Result<Vec<PendingAttestation<C>>, Error> {
        let mut matching = Vec::new();
        for attestation in self.matching_source_attestations(epoch)? {
            if attestation.data.beacon_block_root
                == get_block_root_at_slot(self, attestation.data.slot)?
            {
                matching.push(attestation);
            }
        }
        Ok(matching)
    }

    fn unslashed_attesting_indices(
        &self,
        attestations: &[PendingAttestation<C>],
    ) -> Result<BTreeSet<ValidatorIndex>, Error> {
        let mut output = BTreeSet::new();
        for attestation in attestations {
            let indices =
                get_attesting_indices(self, &attestation.data, &attestation.aggregation_bits)?;
            for index in indices {
                let slashed = self
                    .validators
                    .get(index as usize)
                    .ok_or(helper_functions::Error::IndexOutOfRange)?
                    .slashed;
                if !slashed {
                    output.insert(index);
                }
            }
        }
        Ok(output)
    }

    fn attesting_balance(&self, attestations: &[PendingAttestation<C>]) -> Result<Gwei, Error> {
        let indices = self
            .unslashed_attesting_indices(attestations)?
            .into_iter()
            .collect::<Vec<_>>();
        Ok(get_total_balance(self, &indices)?)
    }
}

#[cfg(test)]
mod tests {
    use types::config::MinimalConfig;

    use crate::test_builders::genesis_state;

    use super::*;

    #[test]
    fn source_attestations_pick_the_matching_list() {
        let mut state = genesis_state::<MinimalConfig>(8, 0);
        state.slot = MinimalConfig::slots_per_epoch() * 2;
        state
            .current_epoch_attestations
            .push(PendingAttestation {
                aggregation_bits: ssz_types::BitList::with_capacity(1)
                    .expect("capacity is within bounds"),
                data: types::types::AttestationData::default(),
                inclusion_delay: 1,
                proposer_index: 0,
            })
            .expect("the list has room");

        let current = state
            .matching_source_attestations(2)
            .expect("current epoch is valid");
        assert_eq!(current.len(), 1);

        let previous = state
            .matching_source_attestations(1)
            .expect("previous epoch is valid");
        assert!(previous.is_empty());
    }

    #[test]
    fn source_attestations_reject_older_epochs() {
        let mut state = genesis_state::<MinimalConfig>(8, 0);
        state.slot = MinimalConfig::slots_per_epoch() * 4;
        assert_eq!(
            state.matching_source_attestations(1),
            Err(Error::EpochOutOfRange { epoch: 1 }),
        );
    }
}
