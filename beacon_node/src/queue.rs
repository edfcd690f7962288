use std::sync::mpsc::{sync_channel, Receiver, SyncSender, TrySendError};
use std::sync::Arc;
use std::thread::{Builder, JoinHandle};

use parking_lot::Mutex;
use thiserror::Error;
use types::config::Config;
use types::types::IndexedAttestation;

#[derive(Clone, Copy, PartialEq, Eq, Debug, Error)]
pub enum QueueError {
    #[error("the attestation queue is full")]
    Busy,
    #[error("the attestation queue is shut down")]
    Closed,
}

/// Bounded work queue with a fixed worker pool. Back-pressure is explicit:
/// a full queue rejects the enqueue instead of growing.
pub struct AttestationQueue<C: Config> {
    sender: Option<SyncSender<IndexedAttestation<C>>>,
    workers: Vec<JoinHandle<()>>,
}

impl<C: Config> AttestationQueue<C> {
    pub fn new<F>(worker_count: usize, capacity: usize, handler: F) -> Self
    where
        F: Fn(IndexedAttestation<C>) + Send + Sync + 'static,
    {
        let (sender, receiver) = sync_channel(capacity);
        let receiver: Arc<Mutex<Receiver<IndexedAttestation<C>>>> =
            Arc::new(Mutex::new(receiver));
        let handler = Arc::new(handler);

        let workers = (0..worker_count.max(1))
            .map(|index| {
                let receiver = Arc::clone(&receiver);
                let handler = Arc::clone(&handler);
                Builder::new()
                    .name(format!("attestation-worker-{}", index))
                    .spawn(move || loop {
                        let message = receiver.lock().recv();
                        match message {
                            Ok(attestation) => handler(attestation),
                            Err(_) => break,
                        }
                    })
                    .expect("worker threads are spawnable at startup")
            })
            .collect();

        Self {
            sender: Some(sender),
            workers,
        }
    }

    pub fn try_enqueue(&self, attestation: IndexedAttestation<C>) -> Result<(), QueueError> {
        let sender = self.sender.as_ref().ok_or(QueueError::Closed)?;
        sender.try_send(attestation).map_err(|error| match error {
            TrySendError::Full(_) => QueueError::Busy,
            TrySendError::Disconnected(_) => QueueError::Closed,
        })
    }
}

impl<C: Config> Drop for AttestationQueue<C> {
    fn drop(&mut self) {
        // Closing the channel lets every worker drain and exit.
        self.sender.take();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use types::config::MinimalConfig;

    use super::*;

    type C = MinimalConfig;

    #[test]
    fn workers_drain_the_queue() {
        let processed = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&processed);
        let queue = AttestationQueue::<C>::new(2, 16, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        for _ in 0..10 {
            queue
                .try_enqueue(IndexedAttestation::default())
                .expect("the queue has room");
        }
        drop(queue);

        assert_eq!(processed.load(Ordering::SeqCst), 10);
    }

    #[test]
    fn a_full_queue_reports_busy() {
        // A single worker blocked on the first item leaves the bounded
        // channel to fill up.
        let queue = AttestationQueue::<C>::new(1, 1, move |_| {
            std::thread::sleep(Duration::from_secs(60));
        });

        let mut saw_busy = false;
        for _ in 0..4 {
            if queue.try_enqueue(IndexedAttestation::default()) == Err(QueueError::Busy) {
                saw_busy = true;
                break;
            }
        }
        assert!(saw_busy);
        std::mem::forget(queue);
    }
}
