//! Broadcast hub for topic pub/sub routing
//!
//! The hub owns every topic and routes events from publishers to
//! subscribers. Each subscriber has its own bounded `tokio::sync::mpsc`
//! channel; delivery never waits on a consumer.
//!
//! # Architecture
//!
//! ```text
//!                         Arc<BroadcastHub>
//!                    ┌──────────────────────────┐
//!                    │ topics: HashMap<Name,    │
//!                    │   Topic {                │
//!                    │     history,             │
//!                    │     subscribers: {       │
//!                    │       id -> mpsc::Tx     │
//!                    │     }                    │
//!                    │   }                      │
//!                    │ >                        │
//!                    └────────────┬─────────────┘
//!                                 │
//!         ┌───────────────────────┼───────────────────────┐
//!         │                       │                       │
//!         ▼                       ▼                       ▼
//!    [Publisher]            [Subscriber]            [Subscriber]
//!    hub.publish()          sub.recv()              sub.recv()
//!         │                       ▲                       ▲
//!         └──► append history ──► try_send ───────────────┘
//! ```
//!
//! # Late joiners
//!
//! A new subscriber receives the topic's retained history (bounded by size
//! and age) before any live event. The snapshot and the attach happen under
//! the same per-topic lock as publishing, so the hand-over has no gap and no
//! duplicate.
//!
//! # Slow consumers
//!
//! When a subscriber's channel is full the event is dropped for that
//! subscriber only. The publisher is never blocked and never sees an error.

pub mod config;
pub mod error;
pub mod event;
pub mod store;
pub mod topic;

pub use config::{
    DeliveryPolicy, HubConfig, TopicConfig, DEFAULT_CHANNEL_CAPACITY, DEFAULT_REPLAY_HISTORY_SIZE,
    DEFAULT_REPLAY_MAX_AGE_MILLIS,
};
pub use error::HubError;
pub use event::{Event, SubscriberId};
pub use store::BroadcastHub;
pub use topic::Topic;
