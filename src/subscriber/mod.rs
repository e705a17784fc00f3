//! Subscriber bookkeeping
//!
//! - [`SubscriberRegistry`] holds the producer side of every subscriber channel
//! - [`Subscription`] is what a consumer reads from

pub mod handle;
pub mod registry;

pub use handle::{Subscription, SubscriptionHandle, SubscriptionState};
pub use registry::{Attachment, DeliveryReport, SubscriberRegistry};
