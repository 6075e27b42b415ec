//! # Metrics Trait Hierarchy
//!
//! Recording, snapshotting, and export are split into small traits so the
//! cache and manager code only ever sees the recorder side.
//!
//! ## Architecture
//!
//! ```text
//!   ┌─────────────────────────┐        ┌─────────────────────────┐
//!   │  CacheMetricsRecorder   │        │ ManagerMetricsRecorder  │
//!   │  add/hit/evict/flush    │        │ lookup/unify/fan-out    │
//!   └───────────┬─────────────┘        └───────────┬─────────────┘
//!               │                                  │
//!   ┌───────────▼─────────────┐                    │
//!   │ CacheMetricsReadRecorder│                    │
//!   │ peek (&self paths)      │                    │
//!   └─────────────────────────┘                    │
//!                                                  │
//!   Consumption (decoupled from recording):        ▼
//!   ┌──────────────────────────────┐    ┌──────────────────────────────┐
//!   │ MetricsSnapshotProvider<S>   │    │ MetricsExporter<S>           │
//!   │ (bench/test)                 │    │ (production monitoring)      │
//!   └──────────────────────────────┘    └──────────────────────────────┘
//! ```

/// Counters written by [`LruCache`](crate::cache::LruCache) on `&mut self` paths.
pub trait CacheMetricsRecorder {
    fn record_add_call(&mut self);
    fn record_add_new(&mut self);
    fn record_add_duplicate(&mut self);
    fn record_hit_found(&mut self);
    fn record_hit_miss(&mut self);
    fn record_evicted_entry(&mut self);
    fn record_dirty_flush(&mut self);
    fn record_flush_failure(&mut self);
    fn record_deleted(&mut self);
    fn record_commit_call(&mut self);
}

/// Read-only cache counters for `&self` methods (uses interior mutability).
pub trait CacheMetricsReadRecorder {
    fn record_peek_call(&self);
    fn record_peek_found(&self);
}

/// Counters written by [`CollectionManager`](crate::manager::CollectionManager).
pub trait ManagerMetricsRecorder {
    fn record_lookup_call(&mut self);
    fn record_cache_hit(&mut self);
    fn record_view_hit(&mut self);
    fn record_promotion(&mut self);
    fn record_lookup_miss(&mut self);
    // batch forms
    fn record_cache_hits(&mut self, count: usize);
    fn record_view_hits(&mut self, count: usize);
    fn record_promotions(&mut self, count: usize);
    fn record_lookup_misses(&mut self, count: usize);
    fn record_unified_instances(&mut self, count: usize);
    fn record_added_callback(&mut self);
    fn record_modified_callback(&mut self);
    fn record_removed_callback(&mut self);
    fn record_stale_views_pruned(&mut self, count: usize);
}

/// Snapshot provider for bench/testing.
pub trait MetricsSnapshotProvider<S> {
    fn snapshot(&self) -> S;
}

/// Export/publish metrics to production monitoring backends.
pub trait MetricsExporter<S> {
    fn export(&self, snapshot: &S);
}
