//! Resource Lifecycle Manager
//!
//! Single authority on which generated outputs are alive and which are retained by
//! the current cache entries. Every release in the pipeline goes through here.
//!
//! Invariant: a retained handle is never released. Handles become retained when a
//! cache entry referencing them is committed and stop being retained only when that
//! entry is superseded, evicted as stale, or the pipeline shuts down.

use crate::cache::CacheEntry;
use crate::document::PagedDocument;
use crate::types::{HandleId, RecordId, ViewId};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// What a handle holds within a preview
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandleRole {
    Primary,
    Composite,
    /// A normalized attachment kept as a temporary of a cache entry
    Attachment,
}

#[derive(Debug)]
struct TrackedHandle {
    document: Arc<PagedDocument>,
    role: HandleRole,
    record_id: RecordId,
    scope: Option<ViewId>,
}

#[derive(Debug, Default)]
struct LifecycleState {
    live: HashMap<HandleId, TrackedHandle>,
    retained: HashSet<HandleId>,
    released_total: u64,
}

/// Tracks ephemeral output handles and releases them
#[derive(Debug, Default)]
pub struct ResourceLifecycleManager {
    next_id: AtomicU64,
    state: Mutex<LifecycleState>,
}

impl ResourceLifecycleManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking a generated document and return its handle.
    ///
    /// `scope` is the view that requested the generation; closing that view releases
    /// the handle unless a current cache entry retains it.
    pub fn track(
        &self,
        document: impl Into<Arc<PagedDocument>>,
        role: HandleRole,
        record_id: &RecordId,
        scope: Option<ViewId>,
    ) -> HandleId {
        let document = document.into();
        let id = HandleId::from_raw(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        debug!(
            handle = %id,
            role = ?role,
            record_id = %record_id,
            pages = document.page_count(),
            "Tracking handle"
        );
        self.state.lock().live.insert(
            id,
            TrackedHandle {
                document,
                role,
                record_id: record_id.clone(),
                scope,
            },
        );
        id
    }

    /// Document behind a live handle
    pub fn resolve(&self, id: HandleId) -> Option<Arc<PagedDocument>> {
        self.state
            .lock()
            .live
            .get(&id)
            .map(|tracked| Arc::clone(&tracked.document))
    }

    pub fn role(&self, id: HandleId) -> Option<HandleRole> {
        self.state.lock().live.get(&id).map(|tracked| tracked.role)
    }

    /// Release a handle. Returns `false` if it was not live or is retained.
    pub fn release(&self, id: HandleId) -> bool {
        let mut state = self.state.lock();
        Self::release_locked(&mut state, id)
    }

    /// Release every handle in `ids` that is not retained; returns how many were released.
    pub fn release_all<I: IntoIterator<Item = HandleId>>(&self, ids: I) -> usize {
        let mut state = self.state.lock();
        ids.into_iter()
            .filter(|id| Self::release_locked(&mut state, *id))
            .count()
    }

    /// Mark the handles of a committed cache entry as retained.
    pub fn retain(&self, entry: &CacheEntry) {
        let mut state = self.state.lock();
        for id in entry.handles() {
            state.retained.insert(id);
        }
    }

    /// Handles referenced by `old` but not by `new`.
    ///
    /// Handles reused across an incremental put appear in both and are not returned,
    /// so they are never released twice.
    pub fn diff(old: &CacheEntry, new: Option<&CacheEntry>) -> Vec<HandleId> {
        let keep: HashSet<HandleId> = new.map(|n| n.handles().collect()).unwrap_or_default();
        let mut seen = HashSet::new();
        old.handles()
            .filter(|id| !keep.contains(id) && seen.insert(*id))
            .collect()
    }

    /// Retire a superseded (or evicted) entry in favor of `new`.
    ///
    /// The handles of `new` become retained; handles only `old` referenced stop being
    /// retained and are released. Returns the released handles.
    pub fn release_superseded(&self, old: &CacheEntry, new: Option<&CacheEntry>) -> Vec<HandleId> {
        let stale = Self::diff(old, new);
        let mut state = self.state.lock();
        if let Some(new) = new {
            for id in new.handles() {
                state.retained.insert(id);
            }
        }
        let mut released = Vec::with_capacity(stale.len());
        for id in stale {
            state.retained.remove(&id);
            if Self::release_locked(&mut state, id) {
                released.push(id);
            }
        }
        released
    }

    /// Release everything tracked for `view` that no current cache entry retains.
    pub fn release_scope(&self, view: ViewId) -> usize {
        let mut state = self.state.lock();
        let candidates: Vec<HandleId> = state
            .live
            .iter()
            .filter(|(id, tracked)| tracked.scope == Some(view) && !state.retained.contains(id))
            .map(|(id, _)| *id)
            .collect();
        let released = candidates
            .into_iter()
            .filter(|id| Self::release_locked(&mut state, *id))
            .count();
        debug!(view = %view, released, "Released view-scoped handles");
        released
    }

    /// Drop every handle, retained or not. Used on pipeline shutdown.
    pub fn release_everything(&self) -> usize {
        let mut state = self.state.lock();
        state.retained.clear();
        let released = state.live.len();
        state.live.clear();
        state.released_total += released as u64;
        debug!(released, "Released all handles");
        released
    }

    pub fn is_live(&self, id: HandleId) -> bool {
        self.state.lock().live.contains_key(&id)
    }

    pub fn is_retained(&self, id: HandleId) -> bool {
        self.state.lock().retained.contains(&id)
    }

    pub fn live_count(&self) -> usize {
        self.state.lock().live.len()
    }

    pub fn released_total(&self) -> u64 {
        self.state.lock().released_total
    }

    /// Live handles generated for a record
    pub fn handles_for_record(&self, record_id: &RecordId) -> Vec<HandleId> {
        let mut ids: Vec<HandleId> = self
            .state
            .lock()
            .live
            .iter()
            .filter(|(_, tracked)| &tracked.record_id == record_id)
            .map(|(id, _)| *id)
            .collect();
        ids.sort();
        ids
    }

    fn release_locked(state: &mut LifecycleState, id: HandleId) -> bool {
        if state.retained.contains(&id) {
            debug!(handle = %id, "Refusing to release retained handle");
            return false;
        }
        match state.live.remove(&id) {
            Some(tracked) => {
                state.released_total += 1;
                debug!(
                    handle = %id,
                    role = ?tracked.role,
                    record_id = %tracked.record_id,
                    "Released handle"
                );
                true
            }
            None => false,
        }
    }
}

/// Handles owned by an in-flight generation request.
///
/// Ownership moves to the cache on commit; anything still owned when the lease is
/// dropped (cancellation, failure, or the request future being dropped) is released.
#[derive(Debug)]
pub struct HandleLease {
    lifecycle: Arc<ResourceLifecycleManager>,
    owned: Vec<HandleId>,
}

impl HandleLease {
    pub fn new(lifecycle: Arc<ResourceLifecycleManager>) -> Self {
        Self {
            lifecycle,
            owned: Vec::new(),
        }
    }

    pub fn adopt(&mut self, id: HandleId) -> HandleId {
        self.owned.push(id);
        id
    }

    /// Give up ownership of handles that were committed to the cache.
    pub fn transfer<I: IntoIterator<Item = HandleId>>(&mut self, committed: I) {
        let committed: HashSet<HandleId> = committed.into_iter().collect();
        self.owned.retain(|id| !committed.contains(id));
    }

    pub fn owned(&self) -> &[HandleId] {
        &self.owned
    }

    /// Release every handle still owned; returns how many were released.
    pub fn release_owned(&mut self) -> usize {
        let owned = std::mem::take(&mut self.owned);
        self.lifecycle.release_all(owned)
    }
}

impl Drop for HandleLease {
    fn drop(&mut self) {
        if !self.owned.is_empty() {
            self.release_owned();
        }
    }
}
