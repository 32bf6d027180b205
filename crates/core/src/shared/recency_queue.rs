//! Bounded hand-off queue that favours recency.
//!
//! A full queue evicts its oldest entry instead of blocking the producer, so a
//! live pipeline always works on the freshest data. Built on a
//! `crossbeam_channel` bounded channel: each sender keeps a receiver clone it
//! uses only to evict.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TrySendError};

/// What happened to an item handed to [`RecencySender::push`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PushOutcome {
    Queued,
    /// The item was queued after evicting the oldest entry.
    EvictedOldest,
}

/// Result of a timed [`RecencyReceiver::pop`].
#[derive(Debug, PartialEq, Eq)]
pub enum Pop<T> {
    Item(T),
    /// Nothing arrived within the timeout.
    Empty,
    /// Every sender is gone and the queue is drained.
    Closed,
}

pub struct RecencySender<T> {
    tx: Sender<T>,
    evict_rx: Receiver<T>,
    evicted: Arc<AtomicU64>,
}

impl<T> Clone for RecencySender<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            evict_rx: self.evict_rx.clone(),
            evicted: self.evicted.clone(),
        }
    }
}

pub struct RecencyReceiver<T> {
    rx: Receiver<T>,
    evicted: Arc<AtomicU64>,
}

impl<T> Clone for RecencyReceiver<T> {
    fn clone(&self) -> Self {
        Self {
            rx: self.rx.clone(),
            evicted: self.evicted.clone(),
        }
    }
}

/// Creates a recency queue holding at most `capacity` items (minimum 1).
pub fn recency_queue<T>(capacity: usize) -> (RecencySender<T>, RecencyReceiver<T>) {
    let (tx, rx) = crossbeam_channel::bounded(capacity.max(1));
    let evicted = Arc::new(AtomicU64::new(0));
    (
        RecencySender {
            tx,
            evict_rx: rx.clone(),
            evicted: evicted.clone(),
        },
        RecencyReceiver { rx, evicted },
    )
}

impl<T> RecencySender<T> {
    /// Queues `item`, evicting the oldest entries until it fits. Never blocks.
    pub fn push(&self, item: T) -> PushOutcome {
        let mut pending = item;
        let mut outcome = PushOutcome::Queued;
        loop {
            match self.tx.try_send(pending) {
                Ok(()) => return outcome,
                Err(TrySendError::Full(back)) | Err(TrySendError::Disconnected(back)) => {
                    pending = back;
                    if self.evict_rx.try_recv().is_ok() {
                        self.evicted.fetch_add(1, Ordering::Relaxed);
                        outcome = PushOutcome::EvictedOldest;
                    }
                }
            }
        }
    }

    pub fn evicted(&self) -> u64 {
        self.evicted.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.tx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tx.is_empty()
    }
}

impl<T> RecencyReceiver<T> {
    /// Waits up to `timeout` for the next item.
    pub fn pop(&self, timeout: Duration) -> Pop<T> {
        match self.rx.recv_timeout(timeout) {
            Ok(item) => Pop::Item(item),
            Err(RecvTimeoutError::Timeout) => Pop::Empty,
            Err(RecvTimeoutError::Disconnected) => Pop::Closed,
        }
    }

    pub fn evicted(&self) -> u64 {
        self.evicted.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}
