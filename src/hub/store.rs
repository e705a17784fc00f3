//! Broadcast hub implementation
//!
//! The central hub that owns every topic and routes events from publishers
//! to subscribers.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use tokio::sync::RwLock;

use crate::stats::{HubStats, TopicStats};
use crate::subscriber::{Subscription, SubscriptionHandle};

use super::config::{HubConfig, TopicConfig};
use super::error::HubError;
use super::event::SubscriberId;
use super::topic::Topic;

/// Central hub for all topics
///
/// The topic map lock is only held for writing when a topic is created or
/// removed; publishing takes a read lock just long enough to find the topic.
pub struct BroadcastHub {
    /// Map of topic name to topic
    topics: RwLock<HashMap<String, Arc<Topic>>>,

    /// Source of hub-unique subscriber ids
    next_subscriber_id: AtomicU64,

    /// Set by `shutdown`
    shut_down: AtomicBool,

    /// Configuration
    config: HubConfig,
}

impl BroadcastHub {
    /// Create a new hub with default configuration
    pub fn new() -> Self {
        Self::with_config(HubConfig::default())
    }

    /// Create a new hub with custom configuration
    pub fn with_config(config: HubConfig) -> Self {
        Self {
            topics: RwLock::new(HashMap::new()),
            next_subscriber_id: AtomicU64::new(1),
            shut_down: AtomicBool::new(false),
            config,
        }
    }

    /// Get the hub configuration
    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    /// Check if `shutdown` has been called
    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }

    fn ensure_running(&self) -> Result<(), HubError> {
        if self.is_shut_down() {
            Err(HubError::ShutDown)
        } else {
            Ok(())
        }
    }

    /// Get a topic, creating it if it doesn't exist
    ///
    /// `config` overrides the hub defaults and only applies when the topic is
    /// created here. Topics created with an explicit config are pre-declared
    /// and are never removed by idle cleanup.
    pub async fn get_or_create_topic(
        &self,
        name: &str,
        config: Option<TopicConfig>,
    ) -> Result<Arc<Topic>, HubError> {
        self.ensure_running()?;

        if name.is_empty() {
            return Err(HubError::InvalidConfig("topic name must not be empty".into()));
        }

        if let Some(topic) = self.topics.read().await.get(name) {
            return Ok(Arc::clone(topic));
        }

        let pinned = config.is_some();
        let config = config.unwrap_or_else(|| self.config.topic_defaults.clone());

        let mut topics = self.topics.write().await;

        // Shutdown may have drained the map while we waited for the lock
        self.ensure_running()?;

        if let Some(topic) = topics.get(name) {
            return Ok(Arc::clone(topic));
        }

        let topic = Arc::new(Topic::new(name, config, pinned)?);
        let config = topic.config();
        tracing::info!(
            topic = %name,
            history_size = config.history_size,
            max_age = ?config.max_age,
            channel_capacity = config.channel_capacity,
            delivery = ?config.delivery,
            "Topic created"
        );
        topics.insert(name.to_string(), Arc::clone(&topic));

        Ok(topic)
    }

    /// Look up an existing topic
    pub async fn topic(&self, name: &str) -> Result<Arc<Topic>, HubError> {
        self.topics
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| HubError::TopicNotFound(name.to_string()))
    }

    /// Publish a payload to a topic, creating the topic if needed
    ///
    /// Returns the event's sequence number. Slow or departed subscribers never
    /// cause an error here.
    pub async fn publish(&self, name: &str, payload: impl Into<Bytes>) -> Result<u64, HubError> {
        let payload = payload.into();

        loop {
            let topic = self.get_or_create_topic(name, None).await?;
            match topic.publish(payload.clone()).await {
                // Lost a race with removal or cleanup; look the name up again
                Err(HubError::TopicNotFound(_)) => continue,
                result => return result,
            }
        }
    }

    /// Subscribe to a topic, creating the topic if needed
    ///
    /// The returned subscription first yields the topic's retained history,
    /// oldest first, and then every event published afterwards.
    pub async fn subscribe(&self, name: &str) -> Result<Subscription, HubError> {
        let id = SubscriberId(self.next_subscriber_id.fetch_add(1, Ordering::Relaxed));

        loop {
            let topic = self.get_or_create_topic(name, None).await?;
            match topic.subscribe(id).await {
                Err(HubError::TopicNotFound(_)) => continue,
                result => return result,
            }
        }
    }

    /// Unsubscribe; calling it again for the same handle is a no-op
    pub async fn unsubscribe(&self, handle: &SubscriptionHandle) {
        let topic = self.topics.read().await.get(handle.topic()).cloned();

        if let Some(topic) = topic {
            topic.unsubscribe(handle.id()).await;
        }
    }

    /// Remove a topic, closing all of its subscribers and discarding history
    pub async fn remove_topic(&self, name: &str) -> Result<(), HubError> {
        let topic = self
            .topics
            .write()
            .await
            .remove(name)
            .ok_or_else(|| HubError::TopicNotFound(name.to_string()))?;

        let closed = topic.close().await;
        tracing::info!(topic = %name, subscribers_closed = closed, "Topic removed");

        Ok(())
    }

    /// Shut the hub down
    ///
    /// Every subscriber channel is closed; later publishes and subscribes
    /// fail with `ShutDown`. Calling it twice is harmless.
    pub async fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return;
        }

        let topics: Vec<Arc<Topic>> = {
            let mut topics = self.topics.write().await;
            topics.drain().map(|(_, topic)| topic).collect()
        };

        let mut closed = 0;
        for topic in &topics {
            closed += topic.close().await;
        }

        tracing::info!(
            topics = topics.len(),
            subscribers_closed = closed,
            "Hub shut down"
        );
    }

    /// Check if a topic exists
    pub async fn topic_exists(&self, name: &str) -> bool {
        self.topics.read().await.contains_key(name)
    }

    /// Names of all topics, sorted
    pub async fn topic_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.topics.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    /// Get total number of topics
    pub async fn topic_count(&self) -> usize {
        self.topics.read().await.len()
    }

    /// Get statistics for one topic
    pub async fn topic_stats(&self, name: &str) -> Option<TopicStats> {
        let topic = self.topics.read().await.get(name).cloned()?;
        Some(topic.stats().await)
    }

    /// Get hub-wide statistics
    pub async fn stats(&self) -> HubStats {
        let topics: Vec<Arc<Topic>> = self.topics.read().await.values().cloned().collect();

        let mut stats = HubStats::new();
        for topic in topics {
            stats.add_topic(&topic.stats().await);
        }
        stats
    }

    /// Run cleanup task once
    ///
    /// Removes topics that have no subscribers, no unexpired history and no
    /// activity for longer than `idle_topic_timeout`. Topics that are busy
    /// at the time are skipped until the next run.
    pub async fn cleanup(&self) {
        let mut topics = self.topics.write().await;
        let now = Instant::now();
        let timeout = self.config.idle_topic_timeout;

        topics.retain(|name, topic| {
            if topic.close_if_idle(now, timeout) {
                tracing::info!(topic = %name, "Topic removed by cleanup");
                false
            } else {
                true
            }
        });
    }

    /// Spawn background cleanup task
    ///
    /// Returns a handle that can be used to abort the task.
    pub fn spawn_cleanup_task(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let hub = Arc::clone(self);
        let interval = hub.config.cleanup_interval;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                if hub.is_shut_down() {
                    break;
                }
                hub.cleanup().await;
            }
        })
    }
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio_test::{assert_pending, assert_ready, task};

    use super::*;
    use crate::subscriber::SubscriptionState;

    fn payloads(events: &[crate::hub::Event]) -> Vec<String> {
        events
            .iter()
            .map(|e| e.payload_str().unwrap_or_default().to_string())
            .collect()
    }

    #[tokio::test]
    async fn test_publish_then_subscribe_replays_suffix() {
        let config = HubConfig::default()
            .history_size(2)
            .max_age(Duration::from_millis(60_000));
        let hub = BroadcastHub::with_config(config);

        hub.publish("t", "A").await.unwrap();
        hub.publish("t", "B").await.unwrap();
        hub.publish("t", "C").await.unwrap();

        let mut sub = hub.subscribe("t").await.unwrap();
        let first = sub.recv().await.unwrap();
        let second = sub.recv().await.unwrap();
        assert_eq!(payloads(&[first, second]), vec!["B", "C"]);

        // Nothing further until the next publish
        let mut next = task::spawn(sub.recv());
        assert_pending!(next.poll());

        hub.publish("t", "D").await.unwrap();
        assert!(next.is_woken());
        let event = assert_ready!(next.poll()).unwrap();
        assert_eq!(event.payload_str(), Some("D"));
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_retained() {
        let hub = BroadcastHub::new();

        let seq = hub.publish("t", "X").await.unwrap();
        assert_eq!(seq, 1);

        let mut sub = hub.subscribe("t").await.unwrap();
        assert_eq!(sub.recv().await.unwrap().payload_str(), Some("X"));
    }

    #[tokio::test]
    async fn test_late_joiner_gets_all_within_history() {
        let hub = BroadcastHub::new();
        for i in 0..10 {
            hub.publish("readings", format!("r{}", i)).await.unwrap();
        }

        let mut sub = hub.subscribe("readings").await.unwrap();
        hub.publish("readings", "live").await.unwrap();

        let mut seen = Vec::new();
        for _ in 0..11 {
            seen.push(sub.recv().await.unwrap());
        }

        let seqs: Vec<u64> = seen.iter().map(|e| e.seq).collect();
        assert_eq!(seqs, (1..=11).collect::<Vec<_>>());
        assert_eq!(seen[10].payload_str(), Some("live"));
    }

    #[tokio::test]
    async fn test_drop_on_full_never_blocks_publisher() {
        let hub = BroadcastHub::new();
        hub.get_or_create_topic("t", Some(TopicConfig::default().channel_capacity(1)))
            .await
            .unwrap();
        let mut sub = hub.subscribe("t").await.unwrap();

        for i in 0..5 {
            assert!(hub.publish("t", format!("e{}", i)).await.is_ok());
        }

        assert_eq!(sub.try_recv().unwrap().map(|e| e.seq), Some(1));
        assert_eq!(sub.try_recv(), Ok(None));

        let stats = hub.topic_stats("t").await.unwrap();
        assert_eq!(stats.dropped, 4);
    }

    #[tokio::test]
    async fn test_unsubscribe_is_idempotent() {
        let hub = BroadcastHub::new();
        let mut sub = hub.subscribe("t").await.unwrap();
        let handle = sub.handle().clone();

        hub.publish("t", "queued").await.unwrap();
        hub.unsubscribe(&handle).await;
        hub.unsubscribe(&handle).await;

        assert_eq!(sub.state(), SubscriptionState::Detached);
        hub.publish("t", "after").await.unwrap();

        // Already queued event is still delivered, then the stream ends
        assert_eq!(sub.recv().await.unwrap().payload_str(), Some("queued"));
        assert!(sub.recv().await.is_none());
        assert_eq!(hub.topic_stats("t").await.unwrap().subscriber_count, 0);
    }

    #[tokio::test]
    async fn test_unsubscribe_after_topic_removed() {
        let hub = BroadcastHub::new();
        let sub = hub.subscribe("t").await.unwrap();
        hub.remove_topic("t").await.unwrap();

        // Handle outlives its topic without error
        hub.unsubscribe(sub.handle()).await;
    }

    #[tokio::test]
    async fn test_remove_topic_closes_subscribers() {
        let hub = BroadcastHub::new();
        let mut sub = hub.subscribe("t").await.unwrap();
        hub.publish("t", "x").await.unwrap();

        hub.remove_topic("t").await.unwrap();
        assert!(!hub.topic_exists("t").await);

        assert_eq!(sub.recv().await.unwrap().payload_str(), Some("x"));
        assert!(sub.recv().await.is_none());

        let result = hub.remove_topic("t").await;
        assert_eq!(result, Err(HubError::TopicNotFound("t".to_string())));
    }

    #[tokio::test]
    async fn test_removed_topic_starts_fresh() {
        let hub = BroadcastHub::new();
        hub.publish("t", "old").await.unwrap();
        hub.remove_topic("t").await.unwrap();

        assert_eq!(hub.publish("t", "new").await.unwrap(), 1);
        let mut sub = hub.subscribe("t").await.unwrap();
        assert_eq!(sub.recv().await.unwrap().payload_str(), Some("new"));
    }

    #[tokio::test]
    async fn test_topic_lookup() {
        let hub = BroadcastHub::new();
        assert!(matches!(
            hub.topic("missing").await,
            Err(HubError::TopicNotFound(_))
        ));

        hub.get_or_create_topic("present", None).await.unwrap();
        assert_eq!(hub.topic("present").await.unwrap().name(), "present");
    }

    #[tokio::test]
    async fn test_override_config_applies_on_creation_only() {
        let hub = BroadcastHub::new();
        let topic = hub
            .get_or_create_topic("cmd", Some(TopicConfig::live_only()))
            .await
            .unwrap();
        assert_eq!(topic.config().history_size, 0);

        let again = hub
            .get_or_create_topic("cmd", Some(TopicConfig::default()))
            .await
            .unwrap();
        assert_eq!(again.config().history_size, 0);
    }

    #[tokio::test]
    async fn test_invalid_config_rejected() {
        let hub = BroadcastHub::new();

        let result = hub
            .get_or_create_topic("t", Some(TopicConfig::default().channel_capacity(0)))
            .await;
        assert!(matches!(result, Err(HubError::InvalidConfig(_))));
        assert!(!hub.topic_exists("t").await);

        assert!(matches!(
            hub.publish("", "x").await,
            Err(HubError::InvalidConfig(_))
        ));

        let bad_defaults = BroadcastHub::with_config(HubConfig::default().channel_capacity(0));
        assert!(matches!(
            bad_defaults.publish("t", "x").await,
            Err(HubError::InvalidConfig(_))
        ));
        assert_eq!(bad_defaults.topic_count().await, 0);
    }

    #[tokio::test]
    async fn test_topics_are_independent() {
        let hub = BroadcastHub::new();
        let mut a = hub.subscribe("a").await.unwrap();
        let mut b = hub.subscribe("b").await.unwrap();

        hub.publish("a", "for-a").await.unwrap();

        assert_eq!(a.recv().await.unwrap().payload_str(), Some("for-a"));
        assert_eq!(b.try_recv(), Ok(None));
        assert_eq!(hub.topic_names().await, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_subscriber_ids_are_unique() {
        let hub = BroadcastHub::new();
        let a = hub.subscribe("a").await.unwrap();
        let b = hub.subscribe("b").await.unwrap();
        let c = hub.subscribe("a").await.unwrap();

        assert_ne!(a.id(), b.id());
        assert_ne!(a.id(), c.id());
        assert_ne!(b.id(), c.id());
    }

    #[tokio::test]
    async fn test_shutdown_closes_everything() {
        let hub = BroadcastHub::new();
        let mut sub = hub.subscribe("t").await.unwrap();

        hub.shutdown().await;
        hub.shutdown().await;

        assert!(hub.is_shut_down());
        assert!(sub.recv().await.is_none());
        assert_eq!(hub.topic_count().await, 0);
        assert_eq!(hub.publish("t", "x").await, Err(HubError::ShutDown));
        assert!(matches!(hub.subscribe("t").await, Err(HubError::ShutDown)));
    }

    #[tokio::test]
    async fn test_cleanup_removes_idle_topics_only() {
        let config = HubConfig::default()
            .history_size(0)
            .idle_topic_timeout(Duration::from_millis(20));
        let hub = BroadcastHub::with_config(config);

        hub.publish("idle", "x").await.unwrap();
        let _sub = hub.subscribe("watched").await.unwrap();
        hub.get_or_create_topic("declared", Some(TopicConfig::live_only()))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        hub.cleanup().await;

        assert_eq!(hub.topic_names().await, vec!["declared", "watched"]);
    }

    #[tokio::test]
    async fn test_cleanup_keeps_topics_with_history() {
        let config = HubConfig::default().idle_topic_timeout(Duration::from_millis(20));
        let hub = BroadcastHub::with_config(config);

        hub.publish("t", "still replayable").await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        hub.cleanup().await;

        assert!(hub.topic_exists("t").await);
    }

    #[tokio::test]
    async fn test_cleanup_does_not_lose_acknowledged_publish() {
        let config = HubConfig::default().idle_topic_timeout(Duration::from_millis(20));
        let hub = BroadcastHub::with_config(config);

        // A publisher that looked the topic up before cleanup ran
        let topic = hub.get_or_create_topic("t", None).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(topic.publish("acked").await.unwrap(), 1);

        hub.cleanup().await;

        assert!(hub.topic_exists("t").await);
        let mut sub = hub.subscribe("t").await.unwrap();
        assert_eq!(sub.try_recv().unwrap().unwrap().payload_str(), Some("acked"));
    }

    #[tokio::test]
    async fn test_stale_topic_after_cleanup_rejects_then_hub_retries() {
        let config = HubConfig::default().idle_topic_timeout(Duration::from_millis(20));
        let hub = BroadcastHub::with_config(config);

        let stale = hub.get_or_create_topic("t", None).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        hub.cleanup().await;
        assert!(!hub.topic_exists("t").await);

        assert_eq!(
            stale.publish("stale").await,
            Err(HubError::TopicNotFound("t".into()))
        );

        assert_eq!(hub.publish("t", "kept").await.unwrap(), 1);
        let mut sub = hub.subscribe("t").await.unwrap();
        assert_eq!(sub.try_recv().unwrap().unwrap().payload_str(), Some("kept"));
    }

    #[tokio::test]
    async fn test_shutdown_drains_stats() {
        let hub = BroadcastHub::new();
        let _sub = hub.subscribe("t").await.unwrap();
        hub.publish("t", "a").await.unwrap();
        hub.publish("t", "b").await.unwrap();

        let before = hub.stats().await;
        hub.shutdown().await;
        let after = hub.stats().await;

        assert_eq!(before.published, 2);
        assert_eq!(before.topic_count, 1);
        assert_eq!(after.published, 0);
        assert_eq!(after.topic_count, 0);
    }

    #[tokio::test]
    async fn test_hub_stats() {
        let hub = BroadcastHub::new();
        let _a = hub.subscribe("a").await.unwrap();
        let _b = hub.subscribe("b").await.unwrap();
        hub.publish("a", "1").await.unwrap();
        hub.publish("b", "2").await.unwrap();
        hub.publish("b", "3").await.unwrap();

        let stats = hub.stats().await;
        assert_eq!(stats.topic_count, 2);
        assert_eq!(stats.subscriber_count, 2);
        assert_eq!(stats.published, 3);
        assert_eq!(stats.dropped, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_publishers_share_one_order() {
        let hub = Arc::new(BroadcastHub::new());
        hub.get_or_create_topic(
            "t",
            Some(TopicConfig::default().history_size(0).channel_capacity(1024)),
        )
        .await
        .unwrap();

        let mut first = hub.subscribe("t").await.unwrap();
        let mut second = hub.subscribe("t").await.unwrap();

        let mut publishers = Vec::new();
        for p in 0..4 {
            let hub = Arc::clone(&hub);
            publishers.push(tokio::spawn(async move {
                for i in 0..50 {
                    hub.publish("t", format!("{}-{}", p, i)).await.unwrap();
                }
            }));
        }
        for publisher in publishers {
            publisher.await.unwrap();
        }

        let mut order_a = Vec::new();
        let mut order_b = Vec::new();
        for _ in 0..200 {
            order_a.push(first.recv().await.unwrap());
            order_b.push(second.recv().await.unwrap());
        }

        let seqs: Vec<u64> = order_a.iter().map(|e| e.seq).collect();
        assert_eq!(seqs, (1..=200).collect::<Vec<_>>());
        assert_eq!(order_a, order_b);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_subscribe_during_publish_is_gap_free() {
        let hub = Arc::new(BroadcastHub::new());
        hub.get_or_create_topic(
            "t",
            Some(TopicConfig::default().history_size(1000).channel_capacity(1024)),
        )
        .await
        .unwrap();

        let publisher = {
            let hub = Arc::clone(&hub);
            tokio::spawn(async move {
                for i in 0..300 {
                    hub.publish("t", format!("{}", i)).await.unwrap();
                }
            })
        };

        tokio::task::yield_now().await;
        let mut sub = hub.subscribe("t").await.unwrap();
        publisher.await.unwrap();

        let mut seqs = Vec::new();
        while let Ok(Some(event)) = sub.try_recv() {
            seqs.push(event.seq);
        }
        assert_eq!(seqs, (1..=300).collect::<Vec<_>>());
    }
}
