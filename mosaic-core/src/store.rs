//! Segment reassembly store.
//!
//! Holds received segments per `(source URI, source index)` until the
//! consumption loop collects them. The store always collapses backlog to
//! the newest segment per index ("latest wins"), so a slow consumer bounds
//! memory by the number of active tile indices, not by elapsed time.
//!
//! Locking is two-level: an outer map guarded by an `RwLock` resolves a
//! URI to its entry, and each entry carries its own `Mutex`, so traffic
//! for one source never serializes against another. Locks are held only
//! for the queue mutation itself, never across I/O, which keeps both
//! connection workers and the render-thread consumer unblocked.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use crate::protocol::segment::Segment;

// ── SegmentStore ─────────────────────────────────────────────────

/// Concurrent map from source URI to per-index segment queues.
#[derive(Debug, Default)]
pub struct SegmentStore {
    sources: RwLock<HashMap<String, Arc<SourceEntry>>>,
}

#[derive(Debug, Default)]
struct SourceEntry {
    state: Mutex<SourceState>,
}

#[derive(Debug, Default)]
struct SourceState {
    /// Received segments per tile index, oldest-first.
    queues: HashMap<i32, Vec<Segment>>,
    /// Last-writer-wins total image dimensions.
    total_width: i32,
    total_height: i32,
}

impl SegmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a segment to the queue for `(uri, segment.source_index)` and
    /// refresh the source's total dimensions. O(1) amortized; safe for
    /// concurrent callers across connection workers.
    pub fn insert(&self, uri: &str, segment: Segment) {
        let entry = self.entry(uri);
        let mut state = lock(&entry.state);

        // All segments of one conceptual frame carry the same totals, so
        // last-writer-wins is bounded; sentinels with no geometry are
        // ignored here so they cannot wipe valid dimensions.
        if segment.parameters.total_width > 0 && segment.parameters.total_height > 0 {
            state.total_width = segment.parameters.total_width;
            state.total_height = segment.parameters.total_height;
        }

        state
            .queues
            .entry(segment.parameters.source_index)
            .or_default()
            .push(segment);
    }

    /// Update a source's total dimensions without queueing pixel content.
    pub fn update_dimensions(&self, uri: &str, total_width: i32, total_height: i32) {
        let entry = self.entry(uri);
        let mut state = lock(&entry.state);
        state.total_width = total_width;
        state.total_height = total_height;
    }

    /// Atomically take the newest segment for **every** index under `uri`,
    /// discarding all older segments as superseded. A segment inserted
    /// concurrently lands either fully in this pop or fully in the next,
    /// never split. A second immediate call returns nothing.
    ///
    /// The result is ordered by `source_index`.
    pub fn pop_latest(&self, uri: &str) -> Vec<Segment> {
        let Some(entry) = self.lookup(uri) else {
            return Vec::new();
        };
        let mut state = lock(&entry.state);

        let mut latest: Vec<Segment> = state
            .queues
            .drain()
            .filter_map(|(_, mut queue)| queue.pop())
            .collect();
        latest.sort_by_key(|s| s.parameters.source_index);
        latest
    }

    /// Drop a source's entire entry (QUIT handling).
    pub fn remove(&self, uri: &str) {
        let mut sources = lock_write(&self.sources);
        sources.remove(uri);
    }

    /// Current total dimensions for `uri`, if the source is known.
    pub fn dimensions(&self, uri: &str) -> Option<(i32, i32)> {
        let entry = self.lookup(uri)?;
        let state = lock(&entry.state);
        Some((state.total_width, state.total_height))
    }

    /// All currently known source URIs (for the render loop's iteration).
    pub fn uris(&self) -> Vec<String> {
        let sources = lock_read(&self.sources);
        sources.keys().cloned().collect()
    }

    // ── Internal ─────────────────────────────────────────────────

    fn lookup(&self, uri: &str) -> Option<Arc<SourceEntry>> {
        let sources = lock_read(&self.sources);
        sources.get(uri).cloned()
    }

    fn entry(&self, uri: &str) -> Arc<SourceEntry> {
        if let Some(entry) = self.lookup(uri) {
            return entry;
        }
        let mut sources = lock_write(&self.sources);
        Arc::clone(sources.entry(uri.to_string()).or_default())
    }
}

// ── StreamStores ─────────────────────────────────────────────────

/// The pair of reassembly stores a consumer maintains: pixel segments and
/// vector-graphics segments are structurally identical but never mix.
#[derive(Debug, Default)]
pub struct StreamStores {
    pub pixels: SegmentStore,
    pub vectors: SegmentStore,
}

impl StreamStores {
    pub fn new() -> Self {
        Self::default()
    }

    /// Evict `uri` from both stores.
    pub fn remove(&self, uri: &str) {
        self.pixels.remove(uri);
        self.vectors.remove(uri);
    }
}

// Lock helpers: a poisoned lock only means another thread panicked while
// holding it; the queue data itself is still structurally sound.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn lock_read<T>(rw: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    rw.read().unwrap_or_else(PoisonError::into_inner)
}

fn lock_write<T>(rw: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    rw.write().unwrap_or_else(PoisonError::into_inner)
}

// ── Tests ────────────────────────────────────────────────────────
