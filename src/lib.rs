//! In-memory topic broadcast hub
//!
//! `replay-hub` routes opaque events from publishers to any number of
//! subscribers, per named topic:
//!
//! - **Bounded replay**: each topic keeps its most recent events, limited by
//!   count and by age, and hands them to subscribers that join late
//! - **Best-effort fan-out**: every subscriber has its own bounded channel;
//!   a full channel drops the event for that subscriber only, so publishers
//!   never wait
//! - **Ordered, gap-free hand-over**: all subscribers of a topic see events
//!   in the same order, and replay flows into live delivery without gaps or
//!   duplicates
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use replay_hub::{BroadcastHub, HubConfig};
//!
//! # async fn example() -> Result<(), replay_hub::HubError> {
//! let hub = Arc::new(BroadcastHub::with_config(HubConfig::default().history_size(100)));
//!
//! hub.publish("sensor-readings", r#"{"moists":[41]}"#).await?;
//!
//! let mut sub = hub.subscribe("sensor-readings").await?;
//! while let Some(event) = sub.recv().await {
//!     println!("#{} {:?}", event.seq, event.payload_str());
//! }
//! # Ok(())
//! # }
//! ```

pub mod buffer;
pub mod error;
pub mod hub;
pub mod irrigation;
pub mod server;
pub mod stats;
pub mod subscriber;

pub use error::{Error, Result};
pub use hub::{BroadcastHub, DeliveryPolicy, Event, HubConfig, HubError, SubscriberId, TopicConfig};
pub use irrigation::IrrigationChannels;
pub use server::{HubServer, ServerConfig};
pub use subscriber::{Subscription, SubscriptionHandle, SubscriptionState};
