//! Event retention for late joiners
//!
//! This module provides the bounded, time-windowed history kept per topic.

pub mod history;

pub use history::RingHistoryBuffer;
