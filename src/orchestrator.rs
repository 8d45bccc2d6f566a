//! Generation Orchestrator
//!
//! Top-level entry point of the preview pipeline. For each request it consults the
//! signature-gated cache, then runs the primary strategy (falling back to the local
//! renderer on failure), collects approved attachments, merges the composite and
//! commits the result in stages. A cancellation token is checked at every state
//! transition; a cancelled request never writes to the cache and releases
//! everything it produced.

pub mod state;

use crate::cache::{CacheEntryPatch, CommitRejected, PreviewCache};
use crate::cancellation::CancellationToken;
use crate::config::PreviewConfig;
use crate::document::{count_pages, PagedDocument, SourceDocument};
use crate::error::{PreviewError, RenderError};
use crate::lifecycle::{HandleLease, HandleRole, ResourceLifecycleManager};
use crate::merge::CompositeMerger;
use crate::normalize::AttachmentNormalizer;
use crate::record::Record;
use crate::render::{Strategies, StrategyFactory};
use crate::signature::{signature, Signature};
use crate::types::{HandleId, RecordId, ViewId};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

pub use state::{GenerationState, RequestState};

/// Where the delivered primary document came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PreviewSource {
    /// Complete cache hit; nothing was generated
    Cached,
    /// Primary stage was cached; attachments were collected and merged again
    Resumed,
    Primary,
    Fallback,
}

/// Informational notice for the caller. Not a failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Advisory {
    /// The high-fidelity converter is unavailable; a degraded preview was produced.
    ConverterUnavailable { detail: String },
}

impl Advisory {
    pub fn message(&self) -> String {
        match self {
            Advisory::ConverterUnavailable { detail } => format!(
                "The document converter is unavailable ({}); showing the blank form template instead",
                detail
            ),
        }
    }
}

/// A delivered preview
#[derive(Debug, Clone, PartialEq)]
pub struct PreviewOutcome {
    pub record_id: RecordId,
    pub signature: Signature,
    pub primary: HandleId,
    /// Present only when at least one attachment was merged
    pub composite: Option<HandleId>,
    pub source: PreviewSource,
    pub advisory: Option<Advisory>,
    /// States visited by the request that produced this outcome
    pub path: Vec<GenerationState>,
}

impl PreviewOutcome {
    /// The artifact to show: the composite if there is one, otherwise the primary.
    pub fn deliverable(&self) -> HandleId {
        self.composite.unwrap_or(self.primary)
    }
}

#[derive(Debug)]
struct InFlight {
    generation: u64,
    token: CancellationToken,
}

/// Unregisters an in-flight request when the request ends, however it ends.
struct InFlightGuard<'a> {
    inflight: &'a Mutex<HashMap<RecordId, InFlight>>,
    record_id: RecordId,
    generation: u64,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        let mut inflight = self.inflight.lock();
        if inflight
            .get(&self.record_id)
            .is_some_and(|current| current.generation == self.generation)
        {
            inflight.remove(&self.record_id);
        }
    }
}

/// Output of the primary or fallback stage
struct BaseDocument {
    handle: HandleId,
    document: Arc<PagedDocument>,
    source: PreviewSource,
    advisory: Option<Advisory>,
}

enum Interrupt {
    Cancelled,
    Failed(PreviewError),
}

impl From<CommitRejected> for Interrupt {
    fn from(rejected: CommitRejected) -> Self {
        debug!(reason = %rejected, "Commit rejected");
        Interrupt::Cancelled
    }
}

pub struct GenerationOrchestrator {
    lifecycle: Arc<ResourceLifecycleManager>,
    cache: PreviewCache,
    strategies: Strategies,
    normalizer: AttachmentNormalizer,
    merger: CompositeMerger,
    accepted_statuses: Vec<String>,
    next_generation: AtomicU64,
    next_view: AtomicU64,
    inflight: Mutex<HashMap<RecordId, InFlight>>,
    advisory_shown: AtomicBool,
}

impl GenerationOrchestrator {
    pub fn new(config: &PreviewConfig, strategies: Strategies) -> Self {
        let lifecycle = Arc::new(ResourceLifecycleManager::new());
        let normalizer = AttachmentNormalizer::new(
            Arc::clone(&strategies.fetcher),
            Arc::clone(&strategies.inspector),
            config.page,
            Duration::from_secs(config.attachments.fetch_timeout_secs),
        );
        Self {
            cache: PreviewCache::new(Arc::clone(&lifecycle)),
            lifecycle,
            strategies,
            normalizer,
            merger: CompositeMerger::new(),
            accepted_statuses: config.attachments.accepted_statuses.clone(),
            next_generation: AtomicU64::new(0),
            next_view: AtomicU64::new(0),
            inflight: Mutex::new(HashMap::new()),
            advisory_shown: AtomicBool::new(false),
        }
    }

    /// Orchestrator wired with the built-in adapters for `config`.
    pub fn from_config(config: &PreviewConfig) -> Result<Self, PreviewError> {
        let strategies = StrategyFactory::create(config)?;
        Ok(Self::new(config, strategies))
    }

    pub fn cache(&self) -> &PreviewCache {
        &self.cache
    }

    pub fn lifecycle(&self) -> &Arc<ResourceLifecycleManager> {
        &self.lifecycle
    }

    /// Document behind a delivered handle
    pub fn resolve(&self, handle: HandleId) -> Option<Arc<PagedDocument>> {
        self.lifecycle.resolve(handle)
    }

    /// Allocate a scope for handles generated on behalf of one consuming view.
    pub fn open_view(&self) -> ViewId {
        ViewId::from_raw(self.next_view.fetch_add(1, Ordering::Relaxed) + 1)
    }

    /// Whether a request for `record_id` is currently running
    pub fn is_in_flight(&self, record_id: &RecordId) -> bool {
        self.inflight.lock().contains_key(record_id)
    }

    /// Produce the preview for `record`.
    ///
    /// A running request for the same record is superseded. Returns
    /// [`PreviewError::Cancelled`] if `token` is cancelled (or the request is
    /// superseded) before the result is committed.
    pub async fn request(
        &self,
        record: &Record,
        view: Option<ViewId>,
        token: CancellationToken,
    ) -> Result<PreviewOutcome, PreviewError> {
        let generation = self.next_generation.fetch_add(1, Ordering::SeqCst) + 1;
        let _registration = self.register(&record.id, generation, &token);
        let mut state = RequestState::new(record.id.clone(), generation);
        let mut lease = HandleLease::new(Arc::clone(&self.lifecycle));

        state.advance(GenerationState::RequestIssued);
        let result = self.run(record, view, &token, &mut state, &mut lease).await;

        match result {
            Ok(outcome) => {
                info!(
                    record_id = %record.id,
                    generation,
                    source = ?outcome.source,
                    primary = %outcome.primary,
                    composite = ?outcome.composite,
                    "Preview delivered"
                );
                Ok(outcome)
            }
            Err(Interrupt::Cancelled) => {
                state.advance(GenerationState::Cancelled);
                self.cache.discard(&record.id, generation);
                let released = lease.release_owned();
                debug!(
                    record_id = %record.id,
                    generation,
                    released,
                    "Preview request cancelled"
                );
                Err(PreviewError::Cancelled)
            }
            Err(Interrupt::Failed(err)) => {
                lease.release_owned();
                warn!(
                    record_id = %record.id,
                    generation,
                    error = %err,
                    "Preview generation failed"
                );
                Err(err)
            }
        }
    }

    async fn run(
        &self,
        record: &Record,
        view: Option<ViewId>,
        token: &CancellationToken,
        state: &mut RequestState,
        lease: &mut HandleLease,
    ) -> Result<PreviewOutcome, Interrupt> {
        checkpoint(token)?;
        let signature =
            signature(Some(record)).unwrap_or_else(|| Signature::from_record_id(&record.id));

        let base = match self.cache.get(&record.id, &signature) {
            Some(entry) if entry.complete => {
                if let Some(primary) = entry.primary {
                    state.advance(GenerationState::Cached);
                    debug!(record_id = %record.id, signature = %signature, "Cache hit");
                    return Ok(PreviewOutcome {
                        record_id: record.id.clone(),
                        signature,
                        primary,
                        composite: entry.composite,
                        source: PreviewSource::Cached,
                        advisory: None,
                        path: state.history().to_vec(),
                    });
                }
                None
            }
            // claimed under the cache lock; the staging request's rollback must not
            // release the primary resumed here
            Some(_) => self
                .cache
                .claim(&record.id, &signature, state.generation(), token)?
                .and_then(|entry| entry.primary)
                .and_then(|handle| {
                    self.lifecycle.resolve(handle).map(|document| BaseDocument {
                        handle,
                        document,
                        source: PreviewSource::Resumed,
                        advisory: None,
                    })
                }),
            None => None,
        };

        let base = match base {
            Some(base) => {
                debug!(record_id = %record.id, "Partial cache hit, resuming at attachments");
                base
            }
            None => {
                let base = self.render_base(record, view, token, state, lease).await?;
                self.cache.commit(
                    &record.id,
                    &signature,
                    CacheEntryPatch {
                        primary: Some(base.handle),
                        generation: state.generation(),
                        ..Default::default()
                    },
                    token,
                )?;
                lease.transfer([base.handle]);
                base
            }
        };

        checkpoint(token)?;
        state.advance(GenerationState::AttachmentCollection);
        let files: Vec<_> = record.accepted_files(&self.accepted_statuses).collect();
        let attachments = if files.is_empty() {
            Vec::new()
        } else {
            self.normalizer.normalize(&files, token).await
        };
        checkpoint(token)?;

        let temporaries: Vec<HandleId> = attachments
            .iter()
            .map(|attachment| {
                lease.adopt(self.lifecycle.track(
                    attachment.document.clone(),
                    HandleRole::Attachment,
                    &record.id,
                    view,
                ))
            })
            .collect();

        let composite = if attachments.is_empty() {
            None
        } else {
            state.advance(GenerationState::Merge);
            self.merger
                .merge(&base.document, &attachments)
                .map(|document| {
                    lease.adopt(self.lifecycle.track(
                        document,
                        HandleRole::Composite,
                        &record.id,
                        view,
                    ))
                })
        };

        let entry = self.cache.commit(
            &record.id,
            &signature,
            CacheEntryPatch {
                primary: Some(base.handle),
                composite,
                temporaries,
                generation: state.generation(),
                complete: true,
            },
            token,
        )?;
        lease.transfer(entry.handles());
        state.advance(GenerationState::Cached);

        Ok(PreviewOutcome {
            record_id: record.id.clone(),
            signature,
            primary: base.handle,
            composite: entry.composite,
            source: base.source,
            advisory: base.advisory,
            path: state.history().to_vec(),
        })
    }

    /// Primary strategy, then the fallback once on any primary failure.
    async fn render_base(
        &self,
        record: &Record,
        view: Option<ViewId>,
        token: &CancellationToken,
        state: &mut RequestState,
        lease: &mut HandleLease,
    ) -> Result<BaseDocument, Interrupt> {
        state.advance(GenerationState::PrimaryAttempt);
        let primary = token
            .run_until_cancelled(self.render_primary(&record.id))
            .await
            .ok_or(Interrupt::Cancelled)?;

        let primary_err = match primary {
            Ok(document) => {
                state.advance(GenerationState::PrimarySucceeded);
                return Ok(self.track_base(
                    document,
                    record,
                    view,
                    lease,
                    PreviewSource::Primary,
                    None,
                ));
            }
            Err(err) => err,
        };

        let advisory = if primary_err.is_recoverable() {
            state.advance(GenerationState::PrimaryFailedRecoverable);
            info!(
                record_id = %record.id,
                error = %primary_err,
                "Converter unavailable, using fallback"
            );
            self.advisory_once(&primary_err)
        } else {
            state.advance(GenerationState::PrimaryFailed);
            warn!(
                record_id = %record.id,
                error = %primary_err,
                "Primary render failed, trying fallback"
            );
            None
        };

        checkpoint(token)?;
        state.advance(GenerationState::FallbackAttempt);
        let fallback = token
            .run_until_cancelled(self.strategies.fallback.render_fallback(record))
            .await
            .ok_or(Interrupt::Cancelled)?;

        match fallback {
            Ok(document) => {
                state.advance(GenerationState::FallbackSucceeded);
                Ok(self.track_base(
                    document,
                    record,
                    view,
                    lease,
                    PreviewSource::Fallback,
                    advisory,
                ))
            }
            Err(fallback_err) => {
                state.advance(GenerationState::FallbackFailed);
                state.advance(GenerationState::Reported);
                Err(Interrupt::Failed(PreviewError::GenerationFailed {
                    record_id: record.id.clone(),
                    primary: primary_err,
                    fallback: fallback_err,
                }))
            }
        }
    }

    async fn render_primary(&self, record_id: &RecordId) -> Result<PagedDocument, RenderError> {
        let bytes = self.strategies.primary.render_primary(record_id).await?;
        let pages = count_pages(&self.strategies.inspector, bytes.clone())
            .await
            .map_err(|e| RenderError::InvalidDocument(e.to_string()))?;
        let source = SourceDocument::new(bytes, self.strategies.primary.content_type(), pages)
            .map_err(|e| RenderError::InvalidDocument(e.to_string()))?;
        Ok(PagedDocument::from_source(source))
    }

    fn track_base(
        &self,
        document: PagedDocument,
        record: &Record,
        view: Option<ViewId>,
        lease: &mut HandleLease,
        source: PreviewSource,
        advisory: Option<Advisory>,
    ) -> BaseDocument {
        let document = Arc::new(document);
        let handle = lease.adopt(self.lifecycle.track(
            Arc::clone(&document),
            HandleRole::Primary,
            &record.id,
            view,
        ));
        BaseDocument {
            handle,
            document,
            source,
            advisory,
        }
    }

    fn advisory_once(&self, err: &RenderError) -> Option<Advisory> {
        if self.advisory_shown.swap(true, Ordering::AcqRel) {
            return None;
        }
        let detail = match err {
            RenderError::ConverterUnavailable(detail) => detail.clone(),
            other => other.to_string(),
        };
        Some(Advisory::ConverterUnavailable { detail })
    }

    fn register(
        &self,
        record_id: &RecordId,
        generation: u64,
        token: &CancellationToken,
    ) -> InFlightGuard<'_> {
        let previous = self.inflight.lock().insert(
            record_id.clone(),
            InFlight {
                generation,
                token: token.clone(),
            },
        );
        if let Some(previous) = previous {
            debug!(
                record_id = %record_id,
                superseded = previous.generation,
                generation,
                "Superseding in-flight request"
            );
            previous.token.cancel();
        }
        InFlightGuard {
            inflight: &self.inflight,
            record_id: record_id.clone(),
            generation,
        }
    }

    /// Cancel every in-flight request, drop the cache and release every handle.
    pub fn shutdown(&self) -> usize {
        for (_, running) in self.inflight.lock().drain() {
            running.token.cancel();
        }
        let before = self.lifecycle.released_total();
        self.cache.clear();
        self.lifecycle.release_everything();
        let released = (self.lifecycle.released_total() - before) as usize;
        info!(released, "Preview pipeline shut down");
        released
    }
}

fn checkpoint(token: &CancellationToken) -> Result<(), Interrupt> {
    if token.is_cancelled() {
        Err(Interrupt::Cancelled)
    } else {
        Ok(())
    }
}
