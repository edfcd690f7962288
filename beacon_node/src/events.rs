use std::sync::mpsc::{sync_channel, Receiver, SyncSender, TrySendError};

use parking_lot::Mutex;
use types::primitives::{Slot, H256};
use types::types::Checkpoint;

/// Published on every head change.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct HeadEvent {
    pub slot: Slot,
    pub block_root: H256,
    pub state_root: H256,
    pub finalized_checkpoint: Checkpoint,
}

const SUBSCRIBER_BUFFER: usize = 64;

/// Head-event fan-out. Subscribers that stop draining are dropped rather
/// than ever blocking the chain.
#[derive(Default)]
pub struct HeadEventPublisher {
    subscribers: Mutex<Vec<SyncSender<HeadEvent>>>,
}

impl HeadEventPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> Receiver<HeadEvent> {
        let (sender, receiver) = sync_channel(SUBSCRIBER_BUFFER);
        self.subscribers.lock().push(sender);
        receiver
    }

    pub fn publish(&self, event: HeadEvent) {
        self.subscribers
            .lock()
            .retain(|subscriber| match subscriber.try_send(event) {
                Ok(()) => true,
                Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => false,
            });
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(slot: Slot) -> HeadEvent {
        HeadEvent {
            slot,
            block_root: H256::repeat_byte(1),
            state_root: H256::repeat_byte(2),
            finalized_checkpoint: Checkpoint::default(),
        }
    }

    #[test]
    fn subscribers_receive_published_events() {
        let publisher = HeadEventPublisher::new();
        let receiver = publisher.subscribe();

        publisher.publish(event(5));
        assert_eq!(receiver.recv().expect("event arrives").slot, 5);
    }

    #[test]
    fn dropped_subscribers_are_detached() {
        let publisher = HeadEventPublisher::new();
        let receiver = publisher.subscribe();
        drop(receiver);

        publisher.publish(event(1));
        assert_eq!(publisher.subscriber_count(), 0);
    }

    #[test]
    fn lagging_subscribers_are_detached() {
        let publisher = HeadEventPublisher::new();
        let _receiver = publisher.subscribe();

        for slot in 0..=SUBSCRIBER_BUFFER as u64 {
            publisher.publish(event(slot));
        }
        assert_eq!(publisher.subscriber_count(), 0);
    }
}
