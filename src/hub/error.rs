//! Hub error types
//!
//! Error types for broadcast hub operations.

use super::event::SubscriberId;

/// Error type for hub operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HubError {
    /// Topic not found (explicit lookup or removal)
    TopicNotFound(String),
    /// Subscription is detached and has no queued events left
    ChannelClosed(SubscriberId),
    /// Rejected topic or hub configuration
    InvalidConfig(String),
    /// Hub has been shut down
    ShutDown,
}

impl std::fmt::Display for HubError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HubError::TopicNotFound(name) => write!(f, "Topic not found: {}", name),
            HubError::ChannelClosed(id) => write!(f, "Channel closed: {}", id),
            HubError::InvalidConfig(reason) => write!(f, "Invalid config: {}", reason),
            HubError::ShutDown => write!(f, "Hub is shut down"),
        }
    }
}

impl std::error::Error for HubError {}
