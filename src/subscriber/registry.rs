//! Per-topic subscriber registry
//!
//! Tracks the delivery channel of every attached subscriber. Delivery uses
//! `try_send` only: a full channel drops the event for that subscriber, a
//! closed channel detaches it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::hub::event::{Event, SubscriberId};
use crate::hub::HubError;

/// One attached subscriber
#[derive(Debug)]
struct Slot {
    tx: mpsc::Sender<Event>,
    attached: Arc<AtomicBool>,
    dropped: u64,
}

/// Receiving half handed out by [`SubscriberRegistry::attach`]
#[derive(Debug)]
pub struct Attachment {
    /// Subscriber id
    pub id: SubscriberId,
    /// Delivery channel receiver
    pub rx: mpsc::Receiver<Event>,
    /// Cleared when the subscriber is detached
    pub attached: Arc<AtomicBool>,
}

/// Outcome of delivering one event to every subscriber
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Subscribers that accepted the event
    pub delivered: usize,
    /// Subscribers whose channel was full
    pub dropped: usize,
    /// Subscribers detached because their receiver was gone
    pub pruned: usize,
}

/// Set of attached subscribers for one topic
#[derive(Debug)]
pub struct SubscriberRegistry {
    /// Capacity of each new delivery channel
    channel_capacity: usize,
    slots: HashMap<SubscriberId, Slot>,
}

impl SubscriberRegistry {
    /// Create an empty registry
    ///
    /// Fails with `InvalidConfig` if `channel_capacity` is zero.
    pub fn new(channel_capacity: usize) -> Result<Self, HubError> {
        if channel_capacity == 0 {
            return Err(HubError::InvalidConfig(
                "channel capacity must be at least 1".into(),
            ));
        }

        Ok(Self {
            channel_capacity,
            slots: HashMap::new(),
        })
    }

    /// Register a new subscriber with its own bounded channel
    pub fn attach(&mut self, id: SubscriberId) -> Attachment {
        let (tx, rx) = mpsc::channel(self.channel_capacity);
        let attached = Arc::new(AtomicBool::new(true));

        // Ids are hub-unique; a reused id replaces and closes the old slot
        if let Some(old) = self.slots.insert(
            id,
            Slot {
                tx,
                attached: Arc::clone(&attached),
                dropped: 0,
            },
        ) {
            old.attached.store(false, Ordering::Release);
        }

        Attachment { id, rx, attached }
    }

    /// Remove a subscriber and close its channel
    ///
    /// Returns false if it was not attached. Events already queued stay
    /// readable until the receiver drains them.
    pub fn detach(&mut self, id: SubscriberId) -> bool {
        match self.slots.remove(&id) {
            Some(slot) => {
                slot.attached.store(false, Ordering::Release);
                true
            }
            None => false,
        }
    }

    /// Detach every subscriber, returning how many were attached
    pub fn detach_all(&mut self) -> usize {
        let count = self.slots.len();
        for (_, slot) in self.slots.drain() {
            slot.attached.store(false, Ordering::Release);
        }
        count
    }

    /// Visit every attached subscriber's channel
    pub fn for_each<F>(&self, mut f: F)
    where
        F: FnMut(SubscriberId, &mpsc::Sender<Event>),
    {
        for (id, slot) in &self.slots {
            f(*id, &slot.tx);
        }
    }

    /// Best-effort send of `event` to every subscriber
    pub fn deliver(&mut self, event: &Event) -> DeliveryReport {
        let mut report = DeliveryReport::default();
        let mut closed = Vec::new();

        for (id, slot) in self.slots.iter_mut() {
            match slot.tx.try_send(event.clone()) {
                Ok(()) => report.delivered += 1,
                Err(TrySendError::Full(_)) => {
                    slot.dropped += 1;
                    report.dropped += 1;
                    tracing::trace!(
                        subscriber = %id,
                        seq = event.seq,
                        "Subscriber channel full, event dropped"
                    );
                }
                Err(TrySendError::Closed(_)) => closed.push(*id),
            }
        }

        for id in closed {
            self.detach(id);
            report.pruned += 1;
            tracing::debug!(subscriber = %id, "Subscriber channel closed, detached");
        }

        report
    }

    /// Check if a subscriber is attached
    pub fn contains(&self, id: SubscriberId) -> bool {
        self.slots.contains_key(&id)
    }

    /// Events dropped for one subscriber because its channel was full
    pub fn dropped_for(&self, id: SubscriberId) -> Option<u64> {
        self.slots.get(&id).map(|slot| slot.dropped)
    }

    /// Number of attached subscribers
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Check if no subscriber is attached
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
