//! Topic state
//!
//! A topic binds one history buffer and one subscriber registry under a
//! name. Publishing and subscribing both run under the topic's lock, so a
//! new subscriber sees every event either in its replay or live, never both
//! and never neither.

use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use tokio::sync::Mutex;

use crate::buffer::RingHistoryBuffer;
use crate::stats::TopicStats;
use crate::subscriber::{Subscription, SubscriptionHandle, SubscriberRegistry};

use super::config::{DeliveryPolicy, TopicConfig};
use super::error::HubError;
use super::event::{Event, SubscriberId};

/// Mutable state guarded by the topic lock
struct TopicState {
    history: RingHistoryBuffer,
    subscribers: SubscriberRegistry,
    /// Sequence number of the last accepted event
    last_seq: u64,
    published: u64,
    dropped: u64,
    last_activity: Instant,
    /// Set once the topic is removed from the hub
    closed: bool,
}

/// A named event stream
pub struct Topic {
    name: Arc<str>,
    config: TopicConfig,
    /// Pre-declared topics are never removed by idle cleanup
    pinned: bool,
    created_at: Instant,
    state: Mutex<TopicState>,
}

impl Topic {
    /// Create a topic; fails if `config` is invalid
    pub(super) fn new(name: &str, config: TopicConfig, pinned: bool) -> Result<Self, HubError> {
        config.validate()?;

        let now = Instant::now();
        let state = TopicState {
            history: RingHistoryBuffer::new(config.history_size, config.max_age),
            subscribers: SubscriberRegistry::new(config.channel_capacity)?,
            last_seq: 0,
            published: 0,
            dropped: 0,
            last_activity: now,
            closed: false,
        };

        Ok(Self {
            name: Arc::from(name),
            config,
            pinned,
            created_at: now,
            state: Mutex::new(state),
        })
    }

    /// Topic name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Topic configuration
    pub fn config(&self) -> &TopicConfig {
        &self.config
    }

    /// Check if the topic is exempt from idle cleanup
    pub fn is_pinned(&self) -> bool {
        self.pinned
    }

    /// Publish an event to history and every attached subscriber
    ///
    /// Never waits on subscribers. Returns the assigned sequence number, or
    /// `TopicNotFound` if the topic was removed from the hub.
    pub async fn publish(&self, payload: impl Into<Bytes>) -> Result<u64, HubError> {
        let mut state = self.state.lock().await;
        if state.closed {
            return Err(HubError::TopicNotFound(self.name.to_string()));
        }

        state.last_seq += 1;
        let event = Event::new(state.last_seq, payload);
        let now = Instant::now();

        state.history.append_at(event.clone(), now);
        let report = state.subscribers.deliver(&event);

        state.published += 1;
        state.dropped += report.dropped as u64;
        state.last_activity = now;

        tracing::trace!(
            topic = %self.name,
            seq = event.seq,
            size = event.size(),
            delivered = report.delivered,
            dropped = report.dropped,
            "Event published"
        );

        Ok(event.seq)
    }

    /// Attach a subscriber and hand it the replay snapshot
    pub(crate) async fn subscribe(&self, id: SubscriberId) -> Result<Subscription, HubError> {
        let mut state = self.state.lock().await;
        if state.closed {
            return Err(HubError::TopicNotFound(self.name.to_string()));
        }

        let now = Instant::now();
        let replay = match self.config.delivery {
            DeliveryPolicy::ReplayThenLive => {
                state.history.evict_expired(now);
                state.history.snapshot_at(now)
            }
            DeliveryPolicy::LiveOnly => Vec::new(),
        };

        let attachment = state.subscribers.attach(id);
        state.last_activity = now;

        tracing::debug!(
            topic = %self.name,
            subscriber = %id,
            subscribers = state.subscribers.len(),
            replay = replay.len(),
            "Subscriber added"
        );

        let handle = SubscriptionHandle::new(Arc::clone(&self.name), id);
        Ok(Subscription::new(
            handle,
            replay,
            attachment.rx,
            attachment.attached,
        ))
    }

    /// Detach a subscriber; returns false if it was not attached
    pub async fn unsubscribe(&self, id: SubscriberId) -> bool {
        let mut state = self.state.lock().await;
        let removed = state.subscribers.detach(id);

        if removed {
            state.last_activity = Instant::now();
            tracing::debug!(
                topic = %self.name,
                subscriber = %id,
                subscribers = state.subscribers.len(),
                "Subscriber removed"
            );
        }

        removed
    }

    /// Close all subscribers and discard history
    ///
    /// Returns the number of subscribers that were detached.
    pub(super) async fn close(&self) -> usize {
        let mut state = self.state.lock().await;
        state.closed = true;
        state.history.clear();
        state.subscribers.detach_all()
    }

    /// Check if the topic has been removed from the hub
    pub async fn is_closed(&self) -> bool {
        self.state.lock().await.closed
    }

    /// Get the current history snapshot, oldest first
    pub async fn history(&self) -> Vec<Event> {
        self.state.lock().await.history.snapshot()
    }

    /// Number of attached subscribers
    pub async fn subscriber_count(&self) -> usize {
        self.state.lock().await.subscribers.len()
    }

    /// Close the topic if cleanup may remove it
    ///
    /// Idle means not pinned, no subscribers, no live history and no activity
    /// for longer than `timeout`. The check and the close happen under one
    /// lock, so a publish or subscribe either lands before it (and the topic
    /// stays) or sees the topic closed. Busy topics are skipped.
    pub(super) fn close_if_idle(&self, now: Instant, timeout: Duration) -> bool {
        if self.pinned {
            return false;
        }

        let Ok(mut state) = self.state.try_lock() else {
            return false;
        };
        if state.closed {
            return false;
        }
        state.history.evict_expired(now);

        let idle = state.subscribers.is_empty()
            && state.history.is_empty()
            && now.saturating_duration_since(state.last_activity) > timeout;

        if idle {
            state.closed = true;
        }
        idle
    }

    /// Get topic statistics
    pub async fn stats(&self) -> TopicStats {
        let state = self.state.lock().await;
        let now = Instant::now();

        TopicStats {
            name: self.name.to_string(),
            subscriber_count: state.subscribers.len(),
            history_len: state.history.snapshot_at(now).len(),
            history_capacity: state.history.capacity(),
            published: state.published,
            dropped: state.dropped,
            last_seq: state.last_seq,
            delivery: self.config.delivery,
            age: now.saturating_duration_since(self.created_at),
            idle_for: now.saturating_duration_since(state.last_activity),
        }
    }
}

impl std::fmt::Debug for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Topic")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("pinned", &self.pinned)
            .finish_non_exhaustive()
    }
}
