//! Topic and hub statistics

pub mod metrics;

pub use metrics::{HubStats, TopicStats};
