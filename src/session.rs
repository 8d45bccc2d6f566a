//! Preview session: the surface one consuming view uses.
//!
//! A session holds at most one running request. Asking for a new preview cancels the
//! previous request; closing the session releases every handle generated on its
//! behalf that the shared cache does not retain.

use crate::cancellation::CancellationToken;
use crate::error::PreviewError;
use crate::orchestrator::{GenerationOrchestrator, PreviewOutcome};
use crate::record::Record;
use crate::types::{RecordId, ViewId};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

#[derive(Debug)]
struct ActiveRequest {
    seq: u64,
    record_id: RecordId,
    token: CancellationToken,
}

pub struct PreviewSession {
    orchestrator: Arc<GenerationOrchestrator>,
    view: ViewId,
    next_seq: AtomicU64,
    active: Mutex<Option<ActiveRequest>>,
    held: Mutex<Option<PreviewOutcome>>,
}

impl PreviewSession {
    pub fn new(orchestrator: Arc<GenerationOrchestrator>) -> Self {
        let view = orchestrator.open_view();
        Self {
            orchestrator,
            view,
            next_seq: AtomicU64::new(0),
            active: Mutex::new(None),
            held: Mutex::new(None),
        }
    }

    pub fn view(&self) -> ViewId {
        self.view
    }

    /// The preview most recently delivered to this session
    pub fn held(&self) -> Option<PreviewOutcome> {
        self.held.lock().clone()
    }

    /// Request the preview for `record`, cancelling this session's running request.
    pub async fn request_preview(&self, record: &Record) -> Result<PreviewOutcome, PreviewError> {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed) + 1;
        let token = CancellationToken::new();
        let previous = self.active.lock().replace(ActiveRequest {
            seq,
            record_id: record.id.clone(),
            token: token.clone(),
        });
        if let Some(previous) = previous {
            debug!(
                view = %self.view,
                previous = %previous.record_id,
                next = %record.id,
                "Cancelling previous preview request"
            );
            previous.token.cancel();
        }

        let result = self
            .orchestrator
            .request(record, Some(self.view), token)
            .await;

        {
            let mut active = self.active.lock();
            if active.as_ref().is_some_and(|a| a.seq == seq) {
                *active = None;
            }
        }
        if let Ok(outcome) = &result {
            *self.held.lock() = Some(outcome.clone());
        }
        result
    }

    /// Cancel the running request, if any.
    pub fn cancel_preview(&self) {
        if let Some(active) = self.active.lock().take() {
            debug!(view = %self.view, record_id = %active.record_id, "Preview cancelled");
            active.token.cancel();
        }
    }

    /// Cancel the running request and release every handle of this view that the
    /// cache does not retain. Returns how many handles were released.
    pub fn close_preview(&self) -> usize {
        self.cancel_preview();
        self.held.lock().take();
        let released = self.orchestrator.lifecycle().release_scope(self.view);
        debug!(view = %self.view, released, "Preview closed");
        released
    }
}

impl Drop for PreviewSession {
    fn drop(&mut self) {
        self.close_preview();
    }
}
