//! Hub and topic configuration

use std::time::Duration;

use super::error::HubError;

/// Default number of events retained per topic for replay
pub const DEFAULT_REPLAY_HISTORY_SIZE: usize = 500;

/// Default maximum age of a retained event, in milliseconds
pub const DEFAULT_REPLAY_MAX_AGE_MILLIS: u64 = 60_000;

/// Default capacity of each subscriber's delivery channel
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// How a topic treats subscribers that join after events were published
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeliveryPolicy {
    /// Replay retained history, then deliver live events
    #[default]
    ReplayThenLive,
    /// Deliver live events only
    LiveOnly,
}

/// Per-topic configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicConfig {
    /// Maximum number of retained events (0 = no history)
    pub history_size: usize,

    /// Maximum age of a retained event (None = no age limit)
    pub max_age: Option<Duration>,

    /// Capacity of each subscriber's delivery channel
    pub channel_capacity: usize,

    /// Replay policy for new subscribers
    pub delivery: DeliveryPolicy,
}

impl Default for TopicConfig {
    fn default() -> Self {
        Self {
            history_size: DEFAULT_REPLAY_HISTORY_SIZE,
            max_age: Some(Duration::from_millis(DEFAULT_REPLAY_MAX_AGE_MILLIS)),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            delivery: DeliveryPolicy::ReplayThenLive,
        }
    }
}

impl TopicConfig {
    /// Build a config from raw integers as they arrive from external configuration
    ///
    /// A negative `history_size` is rejected. A `max_age_millis` of zero or less
    /// disables the age limit, leaving the size limit alone in charge.
    pub fn from_millis(history_size: i64, max_age_millis: i64) -> Result<Self, HubError> {
        if history_size < 0 {
            return Err(HubError::InvalidConfig(format!(
                "history size must not be negative (got {})",
                history_size
            )));
        }

        let max_age = if max_age_millis > 0 {
            Some(Duration::from_millis(max_age_millis as u64))
        } else {
            None
        };

        Ok(Self {
            history_size: history_size as usize,
            max_age,
            ..Default::default()
        })
    }

    /// Best-effort, live-only configuration with no history
    pub fn live_only() -> Self {
        Self {
            history_size: 0,
            max_age: None,
            delivery: DeliveryPolicy::LiveOnly,
            ..Default::default()
        }
    }

    /// Set the history size
    pub fn history_size(mut self, size: usize) -> Self {
        self.history_size = size;
        self
    }

    /// Set the maximum event age
    pub fn max_age(mut self, max_age: Duration) -> Self {
        self.max_age = Some(max_age);
        self
    }

    /// Remove the age limit
    pub fn no_max_age(mut self) -> Self {
        self.max_age = None;
        self
    }

    /// Set the per-subscriber channel capacity
    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity;
        self
    }

    /// Set the delivery policy
    pub fn delivery(mut self, delivery: DeliveryPolicy) -> Self {
        self.delivery = delivery;
        self
    }

    /// Check the config before a topic is built from it
    pub fn validate(&self) -> Result<(), HubError> {
        if self.channel_capacity == 0 {
            return Err(HubError::InvalidConfig(
                "channel capacity must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Hub configuration options
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Defaults applied to every lazily created topic
    pub topic_defaults: TopicConfig,

    /// How long an unused topic survives before cleanup removes it
    pub idle_topic_timeout: Duration,

    /// How often the cleanup task runs
    pub cleanup_interval: Duration,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            topic_defaults: TopicConfig::default(),
            idle_topic_timeout: Duration::from_secs(300),
            cleanup_interval: Duration::from_secs(30),
        }
    }
}

impl HubConfig {
    /// Create a hub config from the two replay parameters
    ///
    /// See [`TopicConfig::from_millis`] for how the values are interpreted.
    pub fn from_millis(history_size: i64, max_age_millis: i64) -> Result<Self, HubError> {
        Ok(Self {
            topic_defaults: TopicConfig::from_millis(history_size, max_age_millis)?,
            ..Default::default()
        })
    }

    /// Set the default history size
    pub fn history_size(mut self, size: usize) -> Self {
        self.topic_defaults.history_size = size;
        self
    }

    /// Set the default maximum event age
    pub fn max_age(mut self, max_age: Duration) -> Self {
        self.topic_defaults.max_age = Some(max_age);
        self
    }

    /// Set the default per-subscriber channel capacity
    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.topic_defaults.channel_capacity = capacity;
        self
    }

    /// Set the idle topic timeout
    pub fn idle_topic_timeout(mut self, timeout: Duration) -> Self {
        self.idle_topic_timeout = timeout;
        self
    }

    /// Set the cleanup interval
    pub fn cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval = interval;
        self
    }
}
