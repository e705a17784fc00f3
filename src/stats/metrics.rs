//! Statistics for topics and the hub

use std::time::Duration;

use crate::hub::config::DeliveryPolicy;

/// Point-in-time statistics for one topic
#[derive(Debug, Clone)]
pub struct TopicStats {
    /// Topic name
    pub name: String,
    /// Number of attached subscribers
    pub subscriber_count: usize,
    /// Events currently held in history
    pub history_len: usize,
    /// History size limit
    pub history_capacity: usize,
    /// Total events accepted by the topic
    pub published: u64,
    /// Total per-subscriber drops caused by full channels
    pub dropped: u64,
    /// Sequence number of the last published event (0 = none yet)
    pub last_seq: u64,
    /// Replay policy
    pub delivery: DeliveryPolicy,
    /// Time since the topic was created
    pub age: Duration,
    /// Time since the last publish, subscribe or unsubscribe
    pub idle_for: Duration,
}

impl TopicStats {
    /// Fraction of attempted deliveries that were dropped, as a percentage
    pub fn drop_rate(&self) -> f32 {
        let attempts = self.published * self.subscriber_count.max(1) as u64;
        if attempts > 0 {
            (self.dropped as f32 / attempts as f32) * 100.0
        } else {
            0.0
        }
    }

    /// History utilization as a percentage
    pub fn history_utilization(&self) -> f32 {
        if self.history_capacity > 0 {
            (self.history_len as f32 / self.history_capacity as f32) * 100.0
        } else {
            0.0
        }
    }
}

/// Hub-wide statistics
#[derive(Debug, Clone, Default)]
pub struct HubStats {
    /// Number of live topics
    pub topic_count: usize,
    /// Attached subscribers across all topics
    pub subscriber_count: usize,
    /// Events accepted across all topics
    pub published: u64,
    /// Per-subscriber drops across all topics
    pub dropped: u64,
}

impl HubStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one topic's numbers into the totals
    pub fn add_topic(&mut self, topic: &TopicStats) {
        self.topic_count += 1;
        self.subscriber_count += topic.subscriber_count;
        self.published += topic.published;
        self.dropped += topic.dropped;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_stats(published: u64, dropped: u64, subscribers: usize) -> TopicStats {
        TopicStats {
            name: "t".to_string(),
            subscriber_count: subscribers,
            history_len: 5,
            history_capacity: 10,
            published,
            dropped,
            last_seq: published,
            delivery: DeliveryPolicy::ReplayThenLive,
            age: Duration::ZERO,
            idle_for: Duration::ZERO,
        }
    }

    #[test]
    fn test_hub_stats_new() {
        let stats = HubStats::new();
        assert_eq!(stats.topic_count, 0);
        assert_eq!(stats.subscriber_count, 0);
        assert_eq!(stats.published, 0);
        assert_eq!(stats.dropped, 0);
    }

    #[test]
    fn test_hub_stats_add_topic() {
        let mut stats = HubStats::new();
        stats.add_topic(&make_stats(10, 2, 3));
        stats.add_topic(&make_stats(5, 0, 1));

        assert_eq!(stats.topic_count, 2);
        assert_eq!(stats.subscriber_count, 4);
        assert_eq!(stats.published, 15);
        assert_eq!(stats.dropped, 2);
    }

    #[test]
    fn test_topic_stats_rates() {
        let stats = make_stats(10, 5, 1);
        assert!((stats.drop_rate() - 50.0).abs() < 0.01);
        assert!((stats.history_utilization() - 50.0).abs() < 0.01);
    }

    #[test]
    fn test_topic_stats_zero_published() {
        let stats = make_stats(0, 0, 0);
        assert_eq!(stats.drop_rate(), 0.0);
    }
}
