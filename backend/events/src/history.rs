//! Bounded record of published events.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// One published event as it was at publish time.
#[derive(Debug, Clone, Serialize)]
pub struct EventRecord {
    pub event: String,
    pub payload: Value,
    pub timestamp: DateTime<Utc>,
    pub subscriber_count: usize,
    #[serde(skip)]
    recorded_at: Instant,
}

/// Capped by entry count and by age. Age eviction happens lazily on every
/// read and write.
#[derive(Debug)]
pub(crate) struct History {
    records: VecDeque<EventRecord>,
    max_size: usize,
    retention: Duration,
}

impl History {
    pub(crate) fn new(max_size: usize, retention: Duration) -> Self {
        Self { records: VecDeque::new(), max_size, retention }
    }

    pub(crate) fn push(&mut self, event: &str, payload: &Value, subscriber_count: usize) {
        self.evict_expired();
        self.records.push_back(EventRecord {
            event: event.to_string(),
            payload: payload.clone(),
            timestamp: Utc::now(),
            subscriber_count,
            recorded_at: Instant::now(),
        });
        while self.records.len() > self.max_size {
            self.records.pop_front();
        }
    }

    pub(crate) fn query(&mut self, event: Option<&str>, limit: Option<usize>) -> Vec<EventRecord> {
        self.evict_expired();
        let matching: Vec<&EventRecord> = self
            .records
            .iter()
            .filter(|r| event.map_or(true, |e| r.event == e))
            .collect();
        let skip = limit.map_or(0, |n| matching.len().saturating_sub(n));
        matching.into_iter().skip(skip).cloned().collect()
    }

    pub(crate) fn len(&mut self) -> usize {
        self.evict_expired();
        self.records.len()
    }

    pub(crate) fn clear(&mut self) {
        self.records.clear();
    }

    fn evict_expired(&mut self) {
        while self
            .records
            .front()
            .is_some_and(|r| r.recorded_at.elapsed() > self.retention)
        {
            self.records.pop_front();
        }
    }
}
