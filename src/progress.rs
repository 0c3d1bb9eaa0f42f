use std::collections::HashMap;
use std::sync::Mutex;

use serde::Serialize;

use crate::matching::MatchingStage;

/// Snapshot consumed by `GetMatchingStatus`.
#[derive(Debug, Clone, Serialize)]
pub struct ProgressEvent {
    pub status: String,
    pub stage: MatchingStage,
    pub progress: u8,
    pub matches_found: u32,
    pub jobs_analyzed: u32,
    pub chunks_completed: u32,
    pub total_chunks: u32,
    pub message: String,
    pub news_snippets: Option<Vec<String>>,
}

impl ProgressEvent {
    pub fn idle() -> Self {
        ProgressEvent {
            status: "idle".to_string(),
            stage: MatchingStage::Idle,
            progress: 0,
            matches_found: 0,
            jobs_analyzed: 0,
            chunks_completed: 0,
            total_chunks: 0,
            message: String::new(),
            news_snippets: None,
        }
    }
}

/// Per-user in-memory progress holder. Plain `Mutex<HashMap<..>>` rather
/// than `dashmap` — the run registry already carries that
/// dependency's justification, and the Broker's access pattern (one writer
/// per user, occasional poller reads) needs no concurrent-map sharding.
/// No history; only the latest event per user. Resets to empty (and callers
/// observe `idle()`) on process restart — state is never persisted.
#[derive(Default)]
pub struct ProgressBroker {
    events: Mutex<HashMap<i32, ProgressEvent>>,
}

impl ProgressBroker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, user_id: i32, event: ProgressEvent) {
        self.events.lock().unwrap().insert(user_id, event);
    }

    pub fn get(&self, user_id: i32) -> Option<ProgressEvent> {
        self.events.lock().unwrap().get(&user_id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unseen_user_has_no_event() {
        let broker = ProgressBroker::new();
        assert!(broker.get(42).is_none());
    }

    #[test]
    fn set_then_get_round_trips() {
        let broker = ProgressBroker::new();
        broker.set(1, ProgressEvent::idle());
        let event = broker.get(1).expect("event present");
        assert_eq!(event.stage, MatchingStage::Idle);
    }
}
