//! Consumer side of a subscription
//!
//! A [`Subscription`] yields the replayed history first and then live events,
//! in the topic's publish order. Its [`SubscriptionHandle`] is the opaque
//! identity used to unsubscribe, and may be cloned and moved to other tasks.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;

use crate::hub::error::HubError;
use crate::hub::event::{Event, SubscriberId};

/// Opaque identity of a subscription
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle {
    topic: Arc<str>,
    id: SubscriberId,
}

impl SubscriptionHandle {
    pub(crate) fn new(topic: Arc<str>, id: SubscriberId) -> Self {
        Self { topic, id }
    }

    /// Name of the subscribed topic
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Hub-assigned subscriber id
    pub fn id(&self) -> SubscriberId {
        self.id
    }
}

impl std::fmt::Display for SubscriptionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.id, self.topic)
    }
}

/// Lifecycle of a subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    /// Receiving live events
    Attached,
    /// Removed from the topic; queued events can still be drained
    Detached,
}

/// A live subscription to one topic
#[derive(Debug)]
pub struct Subscription {
    handle: SubscriptionHandle,
    replay: VecDeque<Event>,
    rx: mpsc::Receiver<Event>,
    attached: Arc<AtomicBool>,
}

impl Subscription {
    pub(crate) fn new(
        handle: SubscriptionHandle,
        replay: Vec<Event>,
        rx: mpsc::Receiver<Event>,
        attached: Arc<AtomicBool>,
    ) -> Self {
        Self {
            handle,
            replay: replay.into(),
            rx,
            attached,
        }
    }

    /// Get the handle used to unsubscribe
    pub fn handle(&self) -> &SubscriptionHandle {
        &self.handle
    }

    /// Hub-assigned subscriber id
    pub fn id(&self) -> SubscriberId {
        self.handle.id
    }

    /// Name of the subscribed topic
    pub fn topic(&self) -> &str {
        self.handle.topic()
    }

    /// Current lifecycle state
    pub fn state(&self) -> SubscriptionState {
        if self.attached.load(Ordering::Acquire) {
            SubscriptionState::Attached
        } else {
            SubscriptionState::Detached
        }
    }

    /// Number of replayed events not yet consumed
    pub fn pending_replay(&self) -> usize {
        self.replay.len()
    }

    /// Receive the next event
    ///
    /// Returns `None` once the subscription is detached and everything queued
    /// before detachment has been drained.
    pub async fn recv(&mut self) -> Option<Event> {
        if let Some(event) = self.replay.pop_front() {
            return Some(event);
        }
        self.rx.recv().await
    }

    /// Receive without waiting
    ///
    /// `Ok(None)` means nothing is queued right now.
    pub fn try_recv(&mut self) -> Result<Option<Event>, HubError> {
        if let Some(event) = self.replay.pop_front() {
            return Ok(Some(event));
        }

        match self.rx.try_recv() {
            Ok(event) => Ok(Some(event)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(HubError::ChannelClosed(self.handle.id)),
        }
    }
}
