//! Preview Cache
//!
//! Signature-gated cache of generated previews, keyed by record identifier. An entry
//! is only ever returned for the exact signature it was stored under; anything else
//! is a miss that evicts the stale entry and releases its handles.
//!
//! Writes are staged: the primary output is committed as soon as it exists and the
//! composite is merged into the same entry later. Every write runs a lifecycle diff
//! against the previous entry for the key.

use crate::cancellation::CancellationToken;
use crate::lifecycle::ResourceLifecycleManager;
use crate::signature::Signature;
use crate::types::{HandleId, RecordId};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Cached preview for one record state
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub signature: Signature,
    pub primary: Option<HandleId>,
    pub composite: Option<HandleId>,
    /// Handles created while building this entry (normalized attachments)
    pub temporaries: Vec<HandleId>,
    /// Generation number of the request that last wrote this entry
    pub generation: u64,
    /// Set once the composite stage has finished (with or without a composite)
    pub complete: bool,
}

impl CacheEntry {
    /// Every handle referenced by this entry, in role order
    pub fn handles(&self) -> impl Iterator<Item = HandleId> + '_ {
        self.primary
            .into_iter()
            .chain(self.composite)
            .chain(self.temporaries.iter().copied())
    }

    fn from_patch(signature: Signature, patch: CacheEntryPatch) -> Self {
        CacheEntry {
            signature,
            primary: patch.primary,
            composite: patch.composite,
            temporaries: patch.temporaries,
            generation: patch.generation,
            complete: patch.complete,
        }
    }

    fn merged(&self, patch: CacheEntryPatch) -> Self {
        let primary_replaced = matches!(
            (self.primary, patch.primary),
            (Some(old), Some(new)) if old != new
        );

        // A replaced primary invalidates everything derived from the old one.
        let (base_composite, base_temporaries, base_complete) = if primary_replaced {
            (None, Vec::new(), false)
        } else {
            (self.composite, self.temporaries.clone(), self.complete)
        };

        let temporaries = if patch.composite.is_some() || patch.complete {
            patch.temporaries
        } else {
            let mut temps = base_temporaries;
            temps.extend(patch.temporaries);
            temps
        };

        CacheEntry {
            signature: self.signature.clone(),
            primary: patch.primary.or(self.primary),
            composite: patch.composite.or(base_composite),
            temporaries,
            generation: self.generation.max(patch.generation),
            complete: patch.complete || base_complete,
        }
    }
}

/// Fields to merge into a cache entry
#[derive(Debug, Clone, Default)]
pub struct CacheEntryPatch {
    pub primary: Option<HandleId>,
    pub composite: Option<HandleId>,
    pub temporaries: Vec<HandleId>,
    pub generation: u64,
    pub complete: bool,
}

/// Why a cache write was refused
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommitRejected {
    #[error("Request was cancelled before commit")]
    Cancelled,

    #[error("Stale write from generation {attempted}; entry already at generation {stored}")]
    Superseded { stored: u64, attempted: u64 },
}

/// Process-wide preview cache
#[derive(Debug)]
pub struct PreviewCache {
    entries: Mutex<HashMap<RecordId, CacheEntry>>,
    lifecycle: Arc<ResourceLifecycleManager>,
}

impl PreviewCache {
    pub fn new(lifecycle: Arc<ResourceLifecycleManager>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            lifecycle,
        }
    }

    pub fn lifecycle(&self) -> &Arc<ResourceLifecycleManager> {
        &self.lifecycle
    }

    /// Entry for `record_id` if it was stored under exactly `signature`.
    ///
    /// A stale entry is evicted and its handles are released.
    pub fn get(&self, record_id: &RecordId, signature: &Signature) -> Option<CacheEntry> {
        let mut entries = self.entries.lock();
        let current = entries
            .get(record_id)
            .map(|entry| &entry.signature == signature)?;
        if current {
            return entries.get(record_id).cloned();
        }

        let stale = entries.remove(record_id)?;
        let released = self.lifecycle.release_superseded(&stale, None);
        debug!(
            record_id = %record_id,
            stale_signature = %stale.signature,
            released = released.len(),
            "Evicted stale cache entry"
        );
        None
    }

    /// Merge `patch` into the entry for `record_id`.
    ///
    /// Same signature: fields are merged. Different signature: the entry is replaced.
    /// Writes from a generation older than the stored one are rejected.
    pub fn put(
        &self,
        record_id: &RecordId,
        signature: &Signature,
        patch: CacheEntryPatch,
    ) -> Result<CacheEntry, CommitRejected> {
        let mut entries = self.entries.lock();
        self.put_locked(&mut entries, record_id, signature, patch)
    }

    /// Request-aware [`put`](Self::put): refuses writes once `token` is cancelled.
    ///
    /// The cancellation check happens under the cache lock.
    pub fn commit(
        &self,
        record_id: &RecordId,
        signature: &Signature,
        patch: CacheEntryPatch,
        token: &CancellationToken,
    ) -> Result<CacheEntry, CommitRejected> {
        let mut entries = self.entries.lock();
        if token.is_cancelled() {
            return Err(CommitRejected::Cancelled);
        }
        self.put_locked(&mut entries, record_id, signature, patch)
    }

    fn put_locked(
        &self,
        entries: &mut HashMap<RecordId, CacheEntry>,
        record_id: &RecordId,
        signature: &Signature,
        patch: CacheEntryPatch,
    ) -> Result<CacheEntry, CommitRejected> {
        let previous = entries.get(record_id).cloned();

        if let Some(prev) = &previous {
            if prev.generation > patch.generation {
                return Err(CommitRejected::Superseded {
                    stored: prev.generation,
                    attempted: patch.generation,
                });
            }
        }

        let next = match &previous {
            Some(prev) if &prev.signature == signature => prev.merged(patch),
            _ => CacheEntry::from_patch(signature.clone(), patch),
        };

        match &previous {
            Some(prev) => {
                let released = self.lifecycle.release_superseded(prev, Some(&next));
                if !released.is_empty() {
                    debug!(
                        record_id = %record_id,
                        released = released.len(),
                        "Released superseded handles"
                    );
                }
            }
            None => self.lifecycle.retain(&next),
        }

        entries.insert(record_id.clone(), next.clone());
        Ok(next)
    }

    /// Take over a staged entry so a newer request can resume from it.
    ///
    /// The entry's generation is raised to `generation`, so rollbacks of the request
    /// that staged it no longer match. Returns `None` when there is no entry under
    /// `signature`.
    pub fn claim(
        &self,
        record_id: &RecordId,
        signature: &Signature,
        generation: u64,
        token: &CancellationToken,
    ) -> Result<Option<CacheEntry>, CommitRejected> {
        let mut entries = self.entries.lock();
        if token.is_cancelled() {
            return Err(CommitRejected::Cancelled);
        }
        let Some(entry) = entries.get_mut(record_id) else {
            return Ok(None);
        };
        if &entry.signature != signature {
            return Ok(None);
        }
        if entry.generation > generation {
            return Err(CommitRejected::Superseded {
                stored: entry.generation,
                attempted: generation,
            });
        }
        entry.generation = generation;
        Ok(Some(entry.clone()))
    }

    /// Entry for `record_id` regardless of signature. Does not evict.
    pub fn peek(&self, record_id: &RecordId) -> Option<CacheEntry> {
        self.entries.lock().get(record_id).cloned()
    }

    /// Remove the entry for `record_id` and release its handles.
    pub fn remove(&self, record_id: &RecordId) -> Option<CacheEntry> {
        let removed = self.entries.lock().remove(record_id)?;
        self.lifecycle.release_superseded(&removed, None);
        Some(removed)
    }

    /// Remove the entry for `record_id` only if generation `generation` was the last
    /// to write it, releasing its handles.
    ///
    /// Used to roll back staged writes of a request that was cancelled later.
    pub fn discard(&self, record_id: &RecordId, generation: u64) -> Option<CacheEntry> {
        let mut entries = self.entries.lock();
        if entries.get(record_id)?.generation != generation {
            return None;
        }
        let removed = entries.remove(record_id)?;
        let released = self.lifecycle.release_superseded(&removed, None);
        debug!(
            record_id = %record_id,
            generation,
            released = released.len(),
            "Discarded staged cache entry"
        );
        Some(removed)
    }

    /// Remove every entry and release its handles.
    pub fn clear(&self) -> usize {
        let drained: Vec<CacheEntry> = self.entries.lock().drain().map(|(_, e)| e).collect();
        for entry in &drained {
            self.lifecycle.release_superseded(entry, None);
        }
        drained.len()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}
