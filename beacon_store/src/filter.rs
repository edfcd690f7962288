use types::config::Config;
use types::primitives::{Epoch, Slot, H256};

/// A conjunction of block predicates. Slot and epoch bounds intersect; the
/// step applies relative to the effective start slot.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct BlockFilter {
    pub parent_root: Option<H256>,
    pub start_slot: Option<Slot>,
    pub end_slot: Option<Slot>,
    pub start_epoch: Option<Epoch>,
    pub end_epoch: Option<Epoch>,
    pub slot_step: Option<u64>,
}

impl BlockFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_parent_root(mut self, parent_root: H256) -> Self {
        self.parent_root = Some(parent_root);
        self
    }

    pub fn with_start_slot(mut self, slot: Slot) -> Self {
        self.start_slot = Some(slot);
        self
    }

    pub fn with_end_slot(mut self, slot: Slot) -> Self {
        self.end_slot = Some(slot);
        self
    }

    pub fn with_start_epoch(mut self, epoch: Epoch) -> Self {
        self.start_epoch = Some(epoch);
        self
    }

    pub fn with_end_epoch(mut self, epoch: Epoch) -> Self {
        self.end_epoch = Some(epoch);
        self
    }

    pub fn with_slot_step(mut self, step: u64) -> Self {
        self.slot_step = Some(step);
        self
    }

    /// Inclusive slot bounds implied by the slot and epoch predicates.
    pub fn slot_bounds<C: Config>(&self) -> (Slot, Option<Slot>) {
        let mut start = self.start_slot.unwrap_or(0);
        let mut end = self.end_slot;

        if let Some(epoch) = self.start_epoch {
            start = start.max(epoch * C::slots_per_epoch());
        }
        if let Some(epoch) = self.end_epoch {
            let epoch_end = (epoch + 1) * C::slots_per_epoch() - 1;
            end = Some(end.map_or(epoch_end, |slot| slot.min(epoch_end)));
        }

        (start, end)
    }

    pub fn has_slot_bounds(&self) -> bool {
        self.start_slot.is_some()
            || self.end_slot.is_some()
            || self.start_epoch.is_some()
            || self.end_epoch.is_some()
    }

    /// The residual predicates checked per candidate after the index scan.
    pub fn matches<C: Config>(&self, slot: Slot, parent_root: H256) -> bool {
        let (start, end) = self.slot_bounds::<C>();
        if slot < start {
            return false;
        }
        if let Some(end) = end {
            if end < slot {
                return false;
            }
        }
        if let Some(step) = self.slot_step {
            if step > 1 && (slot - start) % step != 0 {
                return false;
            }
        }
        if let Some(expected) = self.parent_root {
            if parent_root != expected {
                return false;
            }
        }
        true
    }
}
