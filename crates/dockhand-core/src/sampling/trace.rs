//! Sampling trace events.
//!
//! Every phase transition of a sampling run emits one [`SamplingEvent`]:
//! `start`, `generation/start`, `candidate/created` (per candidate),
//! `generation/end`, `scoring/start`, `candidate/scored` (per candidate),
//! `scoring/end`, `winner/selected` or `early_stop/triggered`, and `end`.
//! The sequence is the audit surface of a run; sinks decide where it goes.

use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

pub const EVENT_START: &str = "start";
pub const EVENT_GENERATION_START: &str = "generation/start";
pub const EVENT_CANDIDATE_CREATED: &str = "candidate/created";
pub const EVENT_GENERATION_END: &str = "generation/end";
pub const EVENT_SCORING_START: &str = "scoring/start";
pub const EVENT_CANDIDATE_SCORED: &str = "candidate/scored";
pub const EVENT_SCORING_END: &str = "scoring/end";
pub const EVENT_WINNER_SELECTED: &str = "winner/selected";
pub const EVENT_EARLY_STOP: &str = "early_stop/triggered";
pub const EVENT_END: &str = "end";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SamplingEvent {
    pub name: String,
    pub session_id: String,
    pub timestamp: DateTime<Utc>,
    pub data: Value,
}

impl SamplingEvent {
    pub fn new(name: &str, session_id: &str, data: Value) -> Self {
        Self {
            name: name.to_string(),
            session_id: session_id.to_string(),
            timestamp: Utc::now(),
            data,
        }
    }
}

/// Destination for sampling trace events.
pub trait TraceSink: Send + Sync {
    fn record(&self, event: SamplingEvent);
}

/// Forwards events to `tracing` as `event = "sampling.<name>"`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingTraceSink;

impl TraceSink for TracingTraceSink {
    fn record(&self, event: SamplingEvent) {
        info!(
            event = %format!("sampling.{}", event.name),
            session_id = %event.session_id,
            data = %event.data,
        );
    }
}

/// Keeps events in memory, in emission order.
#[derive(Debug, Default)]
pub struct MemoryTraceSink {
    events: Mutex<Vec<SamplingEvent>>,
}

impl MemoryTraceSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<SamplingEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn names(&self) -> Vec<String> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|e| e.name.clone())
            .collect()
    }

    pub fn clear(&self) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl TraceSink for MemoryTraceSink {
    fn record(&self, event: SamplingEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_memory_sink_keeps_order() {
        let sink = MemoryTraceSink::new();
        sink.record(SamplingEvent::new(EVENT_START, "s1", json!({})));
        sink.record(SamplingEvent::new(EVENT_END, "s1", json!({"success": true})));
        assert_eq!(sink.names(), vec!["start", "end"]);
        assert_eq!(sink.events()[1].data["success"], true);

        sink.clear();
        assert!(sink.events().is_empty());
    }

    #[test]
    fn test_tracing_sink_does_not_panic() {
        TracingTraceSink.record(SamplingEvent::new(EVENT_START, "s1", json!({"n": 1})));
    }
}
