//! Per-request generation state machine.

use crate::types::RecordId;
use serde::Serialize;
use std::fmt;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationState {
    Idle,
    RequestIssued,
    PrimaryAttempt,
    PrimarySucceeded,
    /// The converter reported itself unavailable
    PrimaryFailedRecoverable,
    /// Any other primary failure; the fallback is still tried once
    PrimaryFailed,
    FallbackAttempt,
    FallbackSucceeded,
    FallbackFailed,
    AttachmentCollection,
    Merge,
    Cached,
    Reported,
    Cancelled,
}

impl GenerationState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            GenerationState::Cached | GenerationState::Reported | GenerationState::Cancelled
        )
    }

    pub fn can_transition_to(self, next: GenerationState) -> bool {
        use GenerationState::*;

        if self.is_terminal() {
            return false;
        }
        if next == Cancelled {
            return true;
        }
        matches!(
            (self, next),
            (Idle, RequestIssued)
                | (RequestIssued, PrimaryAttempt)
                | (RequestIssued, AttachmentCollection)
                | (RequestIssued, Cached)
                | (PrimaryAttempt, PrimarySucceeded)
                | (PrimaryAttempt, PrimaryFailedRecoverable)
                | (PrimaryAttempt, PrimaryFailed)
                | (PrimarySucceeded, AttachmentCollection)
                | (PrimaryFailedRecoverable, FallbackAttempt)
                | (PrimaryFailed, FallbackAttempt)
                | (FallbackAttempt, FallbackSucceeded)
                | (FallbackAttempt, FallbackFailed)
                | (FallbackSucceeded, AttachmentCollection)
                | (FallbackFailed, Reported)
                | (AttachmentCollection, Merge)
                | (AttachmentCollection, Cached)
                | (Merge, Cached)
        )
    }
}

impl fmt::Display for GenerationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// State of one generation request plus the path it took.
#[derive(Debug, Clone)]
pub struct RequestState {
    record_id: RecordId,
    generation: u64,
    history: Vec<GenerationState>,
}

impl RequestState {
    pub fn new(record_id: RecordId, generation: u64) -> Self {
        Self {
            record_id,
            generation,
            history: vec![GenerationState::Idle],
        }
    }

    pub fn current(&self) -> GenerationState {
        self.history
            .last()
            .copied()
            .unwrap_or(GenerationState::Idle)
    }

    pub fn history(&self) -> &[GenerationState] {
        &self.history
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Move to `next`. Transitions outside the state table are a bug: they trip a
    /// debug assertion and are otherwise ignored.
    pub fn advance(&mut self, next: GenerationState) {
        let current = self.current();
        if !current.can_transition_to(next) {
            warn!(
                record_id = %self.record_id,
                generation = self.generation,
                from = %current,
                to = %next,
                "Ignoring invalid state transition"
            );
            debug_assert!(false, "invalid transition {current} -> {next}");
            return;
        }
        debug!(
            record_id = %self.record_id,
            generation = self.generation,
            from = %current,
            to = %next,
            "State transition"
        );
        self.history.push(next);
    }
}
