use core::convert::TryFrom;

use serde::{Deserialize, Serialize};
use ssz_derive::{Decode, Encode};
use ssz_types::{BitVector, FixedVector, VariableList};
use tree_hash_derive::TreeHash;
use typenum::Unsigned;

use crate::config::Config;
use crate::consts;
use crate::primitives::*;
use crate::types::*;

/// The replicated state machine value. Field layout determines the SSZ
/// serialization and the hash tree root, so order is load-bearing.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize, Encode, Decode, TreeHash, Default)]
#[serde(bound = "C: Config")]
pub struct BeaconState<C: Config> {
    pub genesis_time: UnixSeconds,
    pub slot: Slot,
    pub fork: Fork,

    // History
    pub latest_block_header: BeaconBlockHeader,
    pub block_roots: FixedVector<H256, C::SlotsPerHistoricalRoot>,
    pub state_roots: FixedVector<H256, C::SlotsPerHistoricalRoot>,
    pub historical_roots: VariableList<H256, C::HistoricalRootsLimit>,

    // Eth1
    pub eth1_data: Eth1Data,
    pub eth1_data_votes: VariableList<Eth1Data, C::SlotsPerEth1VotingPeriod>,
    pub eth1_deposit_index: u64,

    // Registry
    pub validators: VariableList<Validator, C::ValidatorRegistryLimit>,
    pub balances: VariableList<Gwei, C::ValidatorRegistryLimit>,

    // Randomness
    pub randao_mixes: FixedVector<H256, C::EpochsPerHistoricalVector>,
    pub active_index_roots: FixedVector<H256, C::EpochsPerHistoricalVector>,

    // Slashings
    pub slashings: FixedVector<Gwei, C::EpochsPerSlashingsVector>,

    // Attestations
    pub previous_epoch_attestations:
        VariableList<PendingAttestation<C>, C::MaxAttestationsPerEpoch>,
    pub current_epoch_attestations: VariableList<PendingAttestation<C>, C::MaxAttestationsPerEpoch>,

    // Finality
    pub justification_bits: BitVector<consts::JustificationBitsLength>,
    pub previous_justified_checkpoint: Checkpoint,
    pub current_justified_checkpoint: Checkpoint,
    pub finalized_checkpoint: Checkpoint,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum AccessError {
    SlotOutOfRange,
    IndexOutOfRange,
}

impl<C: Config> BeaconState<C> {
    /// Root of the block at `slot` from the historical ring. Only the last
    /// `SlotsPerHistoricalRoot` slots strictly before `self.slot` are held.
    pub fn block_root_at_slot(&self, slot: Slot) -> Result<H256, AccessError> {
        if !(slot < self.slot && self.slot <= slot + C::SlotsPerHistoricalRoot::to_u64()) {
            return Err(AccessError::SlotOutOfRange);
        }

        let index = usize::try_from(slot % C::SlotsPerHistoricalRoot::to_u64())
            .map_err(|_| AccessError::IndexOutOfRange)?;
        Ok(self.block_roots[index])
    }

    pub fn set_block_root(&mut self, slot: Slot, root: H256) -> Result<(), AccessError> {
        let index = usize::try_from(slot % C::SlotsPerHistoricalRoot::to_u64())
            .map_err(|_| AccessError::IndexOutOfRange)?;
        self.block_roots[index] = root;
        Ok(())
    }

    pub fn set_state_root(&mut self, slot: Slot, root: H256) -> Result<(), AccessError> {
        let index = usize::try_from(slot % C::SlotsPerHistoricalRoot::to_u64())
            .map_err(|_| AccessError::IndexOutOfRange)?;
        self.state_roots[index] = root;
        Ok(())
    }

    pub fn randao_mix(&self, epoch: Epoch) -> Result<H256, AccessError> {
        let index = usize::try_from(epoch % C::EpochsPerHistoricalVector::to_u64())
            .map_err(|_| AccessError::IndexOutOfRange)?;
        Ok(self.randao_mixes[index])
    }

    pub fn set_randao_mix(&mut self, epoch: Epoch, mix: H256) -> Result<(), AccessError> {
        let index = usize::try_from(epoch % C::EpochsPerHistoricalVector::to_u64())
            .map_err(|_| AccessError::IndexOutOfRange)?;
        self.randao_mixes[index] = mix;
        Ok(())
    }

    pub fn increase_balance(&mut self, index: ValidatorIndex, delta: Gwei) {
        if let Ok(index) = usize::try_from(index) {
            self.balances[index] += delta;
        }
    }

    pub fn decrease_balance(&mut self, index: ValidatorIndex, delta: Gwei) {
        if let Ok(index) = usize::try_from(index) {
            self.balances[index] = self.balances[index].saturating_sub(delta);
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::config::MinimalConfig;

    use super::*;

    #[test]
    fn block_root_at_slot_reads_the_ring() {
        let state: BeaconState<MinimalConfig> = BeaconState {
            slot: 2,
            block_roots: FixedVector::from(vec![H256::repeat_byte(0), H256::repeat_byte(1)]),
            ..BeaconState::default()
        };
        assert_eq!(state.block_root_at_slot(1), Ok(H256::repeat_byte(1)));
    }

    #[test]
    fn block_root_at_current_slot_is_out_of_range() {
        let state: BeaconState<MinimalConfig> = BeaconState::default();
        assert_eq!(
            state.block_root_at_slot(0),
            Err(AccessError::SlotOutOfRange),
        );
    }

    #[test]
    fn decrease_balance_saturates() {
        let mut state: BeaconState<MinimalConfig> = BeaconState {
            balances: VariableList::from(vec![5]),
            ..BeaconState::default()
        };
        state.decrease_balance(0, 7);
        assert_eq!(state.balances[0], 0);
    }

    #[test]
    fn increase_balance_adds() {
        let mut state: BeaconState<MinimalConfig> = BeaconState {
            balances: VariableList::from(vec![5]),
            ..BeaconState::default()
        };
        state.increase_balance(0, 2);
        assert_eq!(state.balances[0], 7);
    }
}
