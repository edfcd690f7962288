pub mod chain;
pub mod config;
pub mod events;
pub mod queue;
pub mod slot_clock;

pub use crate::chain::{BeaconChain, BlockReceipt, ChainError};
pub use crate::config::{ChainPreset, NodeConfig};
pub use crate::events::HeadEvent;
pub use crate::queue::{AttestationQueue, QueueError};
pub use crate::slot_clock::SlotClock;
