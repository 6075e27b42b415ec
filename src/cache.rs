//! # LRU Cache
//!
//! Size-bounded, per-kind cache of canonical entity instances with
//! flush-before-discard eviction of dirty entities.
//!
//! ## Architecture
//!
//! ```text
//!   ┌──────────────────────────────────────────────────────────────────────┐
//!   │                           LruCache<E>                                │
//!   │                                                                      │
//!   │   by_id:     FxHashMap<EntityId, SlotId> ────────┐                   │
//!   │   by_unique: FxHashMap<str, SlotId> (optional) ──┤                   │
//!   │                                                  ▼                   │
//!   │   recency: IntrusiveList<EntityRef<E>>                               │
//!   │                                                                      │
//!   │     front ──► [id 9] ◄──► [id 10] ◄──► ... ◄──► [id 40] ◄── back     │
//!   │     (oldest, evicted first)                     (newest)             │
//!   │                                                                      │
//!   │   write_back: Option<Arc<dyn WriteBack<E>>>                          │
//!   └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Recency links live in the arena-backed list, so the entity type carries
//! no cache bookkeeping.
//!
//! ## Operations Flow
//!
//! ```text
//!   add(D), cache full
//!     1. push D at back, index it
//!     2. while len > capacity:
//!          a. peek front (oldest)
//!          b. if dirty: write_back(entity), clear flag on success
//!          c. unlink from list and both indices
//!
//!   hit(B)
//!     front ──► [A] ◄──► [B] ◄──► [C]      becomes      [A] ◄──► [C] ◄──► [B]
//!
//!   deleted(B)
//!     unlink from list and indices, never written back
//! ```
//!
//! ## Dirty Entities
//!
//! | Situation                    | Outcome                                     |
//! |------------------------------|---------------------------------------------|
//! | hook returns `Ok`            | flag cleared, entity discarded              |
//! | hook returns `Err`           | error logged, flag kept, entity discarded   |
//! | no hook installed            | warning logged, flag kept, entity discarded |
//!
//! Eviction always proceeds so the size bound holds. A discarded entity stays
//! alive for any view that still holds it.
//!
//! ## Example Usage
//!
//! ```
//! use viewkit::cache::{LruCache, MIN_CACHE_CAPACITY};
//! use viewkit::entity::{EntityId, EntityRef};
//! use viewkit::traits::Entity;
//!
//! struct Row {
//!     id: u64,
//! }
//!
//! impl Entity for Row {
//!     const KIND: &'static str = "row";
//!     fn id(&self) -> EntityId {
//!         EntityId::new(self.id)
//!     }
//! }
//!
//! let mut cache = LruCache::new(4);
//! assert_eq!(cache.capacity(), MIN_CACHE_CAPACITY);
//!
//! cache.add((1..=40).map(|id| EntityRef::new(Row { id })));
//! assert_eq!(cache.len(), 32);
//! assert_eq!(cache.oldest().map(|e| e.id().get()), Some(9));
//! assert!(cache.hit(EntityId::new(9)).is_some());
//! assert_eq!(cache.newest().map(|e| e.id().get()), Some(9));
//! ```

use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use tracing::{debug, error, warn};

use crate::ds::{IntrusiveList, SlotId};
use crate::entity::{EntityId, EntityRef};
use crate::error::InvariantError;
#[cfg(feature = "metrics")]
use crate::metrics::metrics_impl::CacheMetrics;
#[cfg(feature = "metrics")]
use crate::metrics::snapshot::CacheMetricsSnapshot;
#[cfg(feature = "metrics")]
use crate::metrics::traits::{
    CacheMetricsReadRecorder, CacheMetricsRecorder, MetricsSnapshotProvider,
};
use crate::traits::{Entity, WriteBack};

/// Smallest capacity a cache will run with unless the builder lowers the floor.
pub const MIN_CACHE_CAPACITY: usize = 32;

/// Outcome of flushing a batch of dirty entities.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CommitReport {
    /// Entities written back and marked clean.
    pub flushed: usize,
    /// Dirty entities left dirty (hook error or no hook).
    pub failed: usize,
}

impl CommitReport {
    pub fn is_clean(&self) -> bool {
        self.failed == 0
    }
}

impl std::ops::AddAssign for CommitReport {
    fn add_assign(&mut self, rhs: Self) {
        self.flushed += rhs.flushed;
        self.failed += rhs.failed;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flush {
    Clean,
    Written,
    Failed,
}

/// Size-bounded cache of canonical instances for one entity kind.
pub struct LruCache<E: Entity> {
    recency: IntrusiveList<EntityRef<E>>,
    by_id: FxHashMap<EntityId, SlotId>,
    by_unique: Option<FxHashMap<Box<str>, SlotId>>,
    capacity: usize,
    write_back: Option<Arc<dyn WriteBack<E>>>,
    #[cfg(feature = "metrics")]
    metrics: CacheMetrics,
}

impl<E: Entity> LruCache<E> {
    /// Cache holding at most `max(capacity, MIN_CACHE_CAPACITY)` entities.
    pub fn new(capacity: usize) -> Self {
        Self::with_floor(capacity, MIN_CACHE_CAPACITY)
    }

    /// Like [`new`](Self::new) with a custom floor (itself at least 1).
    pub fn with_floor(capacity: usize, floor: usize) -> Self {
        let capacity = capacity.max(floor.max(1));
        Self {
            recency: IntrusiveList::new(),
            by_id: FxHashMap::default(),
            by_unique: E::USES_UNIQUE_VALUE.then(FxHashMap::default),
            capacity,
            write_back: None,
            #[cfg(feature = "metrics")]
            metrics: CacheMetrics::default(),
        }
    }

    /// Installs the store hook used for dirty entities, builder style.
    pub fn with_write_back(mut self, hook: impl WriteBack<E> + 'static) -> Self {
        self.write_back = Some(Arc::new(hook));
        self
    }

    pub fn set_write_back(&mut self, hook: Arc<dyn WriteBack<E>>) {
        self.write_back = Some(hook);
    }

    pub fn has_write_back(&self) -> bool {
        self.write_back.is_some()
    }

    /// Appends new entities at the newest end, skipping ids already resident,
    /// and evicts from the oldest end while over capacity. Returns how many
    /// entities were inserted.
    pub fn add(&mut self, items: impl IntoIterator<Item = EntityRef<E>>) -> usize {
        let mut inserted = 0;
        for entity in items {
            #[cfg(feature = "metrics")]
            self.metrics.record_add_call();

            let id = entity.id();
            if self.by_id.contains_key(&id) {
                #[cfg(feature = "metrics")]
                self.metrics.record_add_duplicate();
                warn!(kind = E::KIND, %id, "duplicate id added to cache; keeping resident instance");
                continue;
            }

            let unique = entity.unique_value().map(Box::<str>::from);
            let slot = self.recency.push_back(entity);
            self.by_id.insert(id, slot);
            if let (Some(index), Some(value)) = (self.by_unique.as_mut(), unique) {
                index.insert(value, slot);
            }
            inserted += 1;
            #[cfg(feature = "metrics")]
            self.metrics.record_add_new();

            while self.recency.len() > self.capacity {
                self.evict_oldest();
            }
        }
        inserted
    }

    /// Marks `id` as most recently used and returns it.
    pub fn hit(&mut self, id: EntityId) -> Option<EntityRef<E>> {
        let Some(&slot) = self.by_id.get(&id) else {
            #[cfg(feature = "metrics")]
            self.metrics.record_hit_miss();
            return None;
        };
        self.recency.move_to_back(slot);
        #[cfg(feature = "metrics")]
        self.metrics.record_hit_found();
        self.recency.get(slot).cloned()
    }

    /// Returns the resident instance without touching recency.
    pub fn get(&self, id: EntityId) -> Option<EntityRef<E>> {
        #[cfg(feature = "metrics")]
        self.metrics.record_peek_call();
        let entity = self
            .by_id
            .get(&id)
            .and_then(|&slot| self.recency.get(slot))
            .cloned();
        #[cfg(feature = "metrics")]
        if entity.is_some() {
            self.metrics.record_peek_found();
        }
        entity
    }

    /// Peek by unique value; always `None` for kinds without one.
    pub fn get_by_unique_value(&self, value: &str) -> Option<EntityRef<E>> {
        #[cfg(feature = "metrics")]
        self.metrics.record_peek_call();
        let entity = self
            .by_unique
            .as_ref()?
            .get(value)
            .and_then(|&slot| self.recency.get(slot))
            .cloned();
        #[cfg(feature = "metrics")]
        if entity.is_some() {
            self.metrics.record_peek_found();
        }
        entity
    }

    #[inline]
    pub fn contains(&self, id: EntityId) -> bool {
        self.by_id.contains_key(&id)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.recency.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.recency.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Resident ids from oldest to newest.
    pub fn recency_order(&self) -> Vec<EntityId> {
        self.recency.iter().map(EntityRef::id).collect()
    }

    pub fn oldest(&self) -> Option<&EntityRef<E>> {
        self.recency.front()
    }

    pub fn newest(&self) -> Option<&EntityRef<E>> {
        self.recency.back()
    }

    /// Resident entities from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &EntityRef<E>> {
        self.recency.iter()
    }

    /// Drops an entity the store reports as permanently gone. Never written
    /// back, dirty or not.
    pub fn deleted(&mut self, id: EntityId) -> Option<EntityRef<E>> {
        let slot = self.by_id.remove(&id)?;
        let entity = self.recency.remove(slot)?;
        if let (Some(index), Some(value)) = (self.by_unique.as_mut(), entity.unique_value()) {
            index.remove(value);
        }
        #[cfg(feature = "metrics")]
        self.metrics.record_deleted();
        debug!(kind = E::KIND, %id, "dropped deleted entity from cache");
        Some(entity)
    }

    /// Drops every resident entity matching `filter`, without write-back.
    pub fn deleted_where(&mut self, filter: &dyn Fn(&E) -> bool) -> Vec<EntityRef<E>> {
        let doomed: Vec<EntityId> = self
            .recency
            .iter()
            .filter(|entity| filter(&entity.read()))
            .map(EntityRef::id)
            .collect();
        doomed.into_iter().filter_map(|id| self.deleted(id)).collect()
    }

    /// Writes back every dirty resident entity. Residency is unchanged.
    pub fn commit_dirty(&mut self) -> CommitReport {
        #[cfg(feature = "metrics")]
        self.metrics.record_commit_call();
        let dirty: Vec<EntityRef<E>> = self
            .recency
            .iter()
            .filter(|entity| entity.is_dirty())
            .cloned()
            .collect();

        let mut report = CommitReport::default();
        for entity in &dirty {
            match self.flush(entity) {
                Flush::Written => report.flushed += 1,
                Flush::Failed => report.failed += 1,
                Flush::Clean => {}
            }
        }
        if !dirty.is_empty() {
            debug!(
                kind = E::KIND,
                flushed = report.flushed,
                failed = report.failed,
                "committed dirty cache entries"
            );
        }
        report
    }

    /// Verifies that the recency list and both indices agree.
    pub fn check_invariants(&self) -> Result<(), InvariantError> {
        self.recency.validate_links().map_err(InvariantError::new)?;
        if self.recency.len() > self.capacity {
            return Err(InvariantError::new(format!(
                "cache holds {} entities over capacity {}",
                self.recency.len(),
                self.capacity
            )));
        }
        if self.by_id.len() != self.recency.len() {
            return Err(InvariantError::new(format!(
                "id index holds {} entries, recency list holds {}",
                self.by_id.len(),
                self.recency.len()
            )));
        }
        for (&id, &slot) in &self.by_id {
            match self.recency.get(slot) {
                Some(entity) if entity.id() == id => {}
                _ => {
                    return Err(InvariantError::new(format!(
                        "id index entry {id} points at the wrong slot"
                    )));
                }
            }
        }
        if let Some(index) = &self.by_unique {
            for (value, &slot) in index {
                match self.recency.get(slot) {
                    Some(entity) if entity.unique_value() == Some(&**value) => {}
                    _ => {
                        return Err(InvariantError::new(format!(
                            "unique value index entry {value:?} points at the wrong slot"
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    fn evict_oldest(&mut self) {
        let Some(entity) = self.recency.front().cloned() else {
            return;
        };
        // flush while still indexed; unlink only afterwards
        self.flush(&entity);
        let id = entity.id();
        self.recency.pop_front();
        self.by_id.remove(&id);
        if let (Some(index), Some(value)) = (self.by_unique.as_mut(), entity.unique_value()) {
            index.remove(value);
        }
        #[cfg(feature = "metrics")]
        self.metrics.record_evicted_entry();
        debug!(kind = E::KIND, %id, "evicted oldest cache entry");
    }

    fn flush(&mut self, entity: &EntityRef<E>) -> Flush {
        if !entity.is_dirty() {
            return Flush::Clean;
        }
        let id = entity.id();
        let outcome = match self.write_back.as_deref() {
            None => {
                warn!(kind = E::KIND, %id, "dirty entity has no write-back hook; change not persisted");
                Flush::Failed
            }
            Some(hook) => match hook.write_back(&entity.read()) {
                Ok(()) => {
                    entity.clear_dirty();
                    debug!(kind = E::KIND, %id, "flushed dirty entity");
                    Flush::Written
                }
                Err(err) => {
                    error!(kind = E::KIND, %id, error = %err, "write-back failed; entity stays dirty");
                    Flush::Failed
                }
            },
        };
        #[cfg(feature = "metrics")]
        match outcome {
            Flush::Written => self.metrics.record_dirty_flush(),
            Flush::Failed => self.metrics.record_flush_failure(),
            Flush::Clean => {}
        }
        outcome
    }
}

#[cfg(feature = "metrics")]
impl<E: Entity> LruCache<E> {
    pub fn metrics_snapshot(&self) -> CacheMetricsSnapshot {
        CacheMetricsSnapshot {
            add_calls: self.metrics.add_calls,
            add_new: self.metrics.add_new,
            add_duplicates: self.metrics.add_duplicates,
            hit_calls: self.metrics.hit_calls,
            hit_found: self.metrics.hit_found,
            peek_calls: self.metrics.peek_calls.get(),
            peek_found: self.metrics.peek_found.get(),
            evicted_entries: self.metrics.evicted_entries,
            dirty_flushes: self.metrics.dirty_flushes,
            flush_failures: self.metrics.flush_failures,
            deletions: self.metrics.deletions,
            commit_calls: self.metrics.commit_calls,
            cache_len: self.len(),
            capacity: self.capacity,
        }
    }
}

#[cfg(feature = "metrics")]
impl<E: Entity> MetricsSnapshotProvider<CacheMetricsSnapshot> for LruCache<E> {
    fn snapshot(&self) -> CacheMetricsSnapshot {
        self.metrics_snapshot()
    }
}

impl<E: Entity> fmt::Debug for LruCache<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LruCache")
            .field("kind", &E::KIND)
            .field("len", &self.len())
            .field("capacity", &self.capacity)
            .field("write_back", &self.write_back.is_some())
            .finish_non_exhaustive()
    }
}
