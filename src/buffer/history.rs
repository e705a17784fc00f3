//! Ring history buffer for late-joiner replay
//!
//! Each topic keeps a bounded suffix of its recent events so that a
//! subscriber joining later can catch up before live delivery starts.
//! Entries leave the buffer when either limit is hit:
//! 1. more than `capacity` entries are retained
//! 2. an entry is older than `max_age`

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::hub::event::Event;

/// A retained event
#[derive(Debug, Clone)]
struct BufferedEvent {
    /// The event
    event: Event,
    /// When the event entered the buffer
    received_at: Instant,
}

/// Fixed-capacity, time-windowed event history
#[derive(Debug)]
pub struct RingHistoryBuffer {
    /// Maximum number of retained events
    capacity: usize,
    /// Maximum event age (None = unlimited)
    max_age: Option<Duration>,
    /// Retained events, oldest first
    events: VecDeque<BufferedEvent>,
}

impl RingHistoryBuffer {
    /// Create a buffer with the given size and age limits
    pub fn new(capacity: usize, max_age: Option<Duration>) -> Self {
        Self {
            capacity,
            max_age,
            // Capacity hint is capped so a large limit doesn't allocate up front
            events: VecDeque::with_capacity(capacity.min(64)),
        }
    }

    /// Append an event at the tail
    pub fn append(&mut self, event: Event) {
        self.append_at(event, Instant::now());
    }

    /// Append an event received at `now`
    ///
    /// Evicts from the head anything that exceeds the size or age limit.
    pub fn append_at(&mut self, event: Event, now: Instant) {
        if self.capacity == 0 {
            return;
        }

        self.events.push_back(BufferedEvent {
            event,
            received_at: now,
        });

        while self.events.len() > self.capacity {
            self.events.pop_front();
        }

        self.evict_expired(now);
    }

    /// Drop every entry older than `max_age` as of `now`
    pub fn evict_expired(&mut self, now: Instant) {
        let Some(max_age) = self.max_age else {
            return;
        };

        // Entries are in arrival order, so expired ones form a prefix
        while let Some(front) = self.events.front() {
            if now.saturating_duration_since(front.received_at) > max_age {
                self.events.pop_front();
            } else {
                break;
            }
        }
    }

    /// Copy of the currently retained events, oldest first
    pub fn snapshot(&self) -> Vec<Event> {
        self.snapshot_at(Instant::now())
    }

    /// Copy of the events retained as of `now`, oldest first
    pub fn snapshot_at(&self, now: Instant) -> Vec<Event> {
        self.events
            .iter()
            .filter(|e| !self.is_expired(e, now))
            .map(|e| e.event.clone())
            .collect()
    }

    fn is_expired(&self, entry: &BufferedEvent, now: Instant) -> bool {
        match self.max_age {
            Some(max_age) => now.saturating_duration_since(entry.received_at) > max_age,
            None => false,
        }
    }

    /// Remove all retained events
    pub fn clear(&mut self) {
        self.events.clear();
    }

    /// Number of entries currently held (expired entries count until evicted)
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Check if the buffer holds no entries
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Get the size limit
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Get the age limit
    pub fn max_age(&self) -> Option<Duration> {
        self.max_age
    }

    /// Sequence numbers of the oldest and newest retained events
    pub fn seq_range(&self) -> Option<(u64, u64)> {
        self.seq_range_at(Instant::now())
    }

    /// Same as [`seq_range`](Self::seq_range), as of `now`
    ///
    /// Covers exactly the events [`snapshot_at`](Self::snapshot_at) would return.
    pub fn seq_range_at(&self, now: Instant) -> Option<(u64, u64)> {
        let mut live = self.events.iter().filter(|e| !self.is_expired(e, now));
        let first = live.next()?.event.seq;
        let last = live.last().map_or(first, |e| e.event.seq);
        Some((first, last))
    }
}
