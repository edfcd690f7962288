use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use types::primitives::{Slot, UnixSeconds};

/// Wall-clock slot derived from the genesis time. Tests pin the slot
/// instead of the system clock.
#[derive(Clone, Debug)]
pub enum SlotClock {
    System {
        genesis_time: UnixSeconds,
        seconds_per_slot: u64,
    },
    Fixed(Arc<AtomicU64>),
}

impl SlotClock {
    pub fn system(genesis_time: UnixSeconds, seconds_per_slot: u64) -> Self {
        Self::System {
            genesis_time,
            seconds_per_slot,
        }
    }

    pub fn fixed(slot: Slot) -> Self {
        Self::Fixed(Arc::new(AtomicU64::new(slot)))
    }

    pub fn current_slot(&self) -> Slot {
        match self {
            Self::System {
                genesis_time,
                seconds_per_slot,
            } => {
                let now = SystemTime::now()
                    .duration_since(UNIX_EPOCH)
                    .map(|duration| duration.as_secs())
                    .unwrap_or(0);
                slot_at(*genesis_time, *seconds_per_slot, now)
            }
            Self::Fixed(slot) => slot.load(Ordering::Relaxed),
        }
    }

    /// Advances a fixed clock; a no-op on the system clock.
    pub fn set_slot(&self, slot: Slot) {
        if let Self::Fixed(current) = self {
            current.store(slot, Ordering::Relaxed);
        }
    }
}

fn slot_at(genesis_time: UnixSeconds, seconds_per_slot: u64, now: UnixSeconds) -> Slot {
    if now < genesis_time {
        return 0;
    }
    (now - genesis_time) / seconds_per_slot
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test_case(100, 6, 40 => 0; "before genesis")]
    #[test_case(100, 6, 100 => 0; "at genesis")]
    #[test_case(100, 6, 105 => 0; "just before the second slot")]
    #[test_case(100, 6, 106 => 1; "at the second slot")]
    #[test_case(100, 6, 160 => 10; "ten slots in")]
    fn slot_at_wall_clock(genesis_time: UnixSeconds, seconds_per_slot: u64, now: UnixSeconds) -> Slot {
        slot_at(genesis_time, seconds_per_slot, now)
    }

    #[test]
    fn fixed_clocks_are_settable() {
        let clock = SlotClock::fixed(3);
        assert_eq!(clock.current_slot(), 3);
        clock.set_slot(9);
        assert_eq!(clock.current_slot(), 9);
    }
}
