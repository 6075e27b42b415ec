use crate::metrics::cell::MetricsCell;
use crate::metrics::traits::{
    CacheMetricsReadRecorder, CacheMetricsRecorder, ManagerMetricsRecorder,
};

#[derive(Debug, Default)]
pub struct CacheMetrics {
    pub add_calls: u64,
    pub add_new: u64,
    pub add_duplicates: u64,
    pub hit_calls: u64,
    pub hit_found: u64,
    pub peek_calls: MetricsCell,
    pub peek_found: MetricsCell,
    pub evicted_entries: u64,
    pub dirty_flushes: u64,
    pub flush_failures: u64,
    pub deletions: u64,
    pub commit_calls: u64,
}

#[derive(Debug, Default)]
pub struct ManagerMetrics {
    pub lookup_calls: u64,
    pub cache_hits: u64,
    pub view_hits: u64,
    pub promotions: u64,
    pub lookup_misses: u64,
    pub unified_instances: u64,
    pub added_callbacks: u64,
    pub modified_callbacks: u64,
    pub removed_callbacks: u64,
    pub stale_views_pruned: u64,
}

impl CacheMetricsRecorder for CacheMetrics {
    fn record_add_call(&mut self) {
        self.add_calls += 1;
    }

    fn record_add_new(&mut self) {
        self.add_new += 1;
    }

    fn record_add_duplicate(&mut self) {
        self.add_duplicates += 1;
    }

    fn record_hit_found(&mut self) {
        self.hit_calls += 1;
        self.hit_found += 1;
    }

    fn record_hit_miss(&mut self) {
        self.hit_calls += 1;
    }

    fn record_evicted_entry(&mut self) {
        self.evicted_entries += 1;
    }

    fn record_dirty_flush(&mut self) {
        self.dirty_flushes += 1;
    }

    fn record_flush_failure(&mut self) {
        self.flush_failures += 1;
    }

    fn record_deleted(&mut self) {
        self.deletions += 1;
    }

    fn record_commit_call(&mut self) {
        self.commit_calls += 1;
    }
}

impl CacheMetricsReadRecorder for CacheMetrics {
    fn record_peek_call(&self) {
        self.peek_calls.incr();
    }

    fn record_peek_found(&self) {
        self.peek_found.incr();
    }
}

impl ManagerMetricsRecorder for ManagerMetrics {
    fn record_lookup_call(&mut self) {
        self.lookup_calls += 1;
    }

    fn record_cache_hit(&mut self) {
        self.cache_hits += 1;
    }

    fn record_view_hit(&mut self) {
        self.view_hits += 1;
    }

    fn record_promotion(&mut self) {
        self.promotions += 1;
    }

    fn record_lookup_miss(&mut self) {
        self.lookup_misses += 1;
    }

    fn record_cache_hits(&mut self, count: usize) {
        self.cache_hits += count as u64;
    }

    fn record_view_hits(&mut self, count: usize) {
        self.view_hits += count as u64;
    }

    fn record_promotions(&mut self, count: usize) {
        self.promotions += count as u64;
    }

    fn record_lookup_misses(&mut self, count: usize) {
        self.lookup_misses += count as u64;
    }

    fn record_unified_instances(&mut self, count: usize) {
        self.unified_instances += count as u64;
    }

    fn record_added_callback(&mut self) {
        self.added_callbacks += 1;
    }

    fn record_modified_callback(&mut self) {
        self.modified_callbacks += 1;
    }

    fn record_removed_callback(&mut self) {
        self.removed_callbacks += 1;
    }

    fn record_stale_views_pruned(&mut self, count: usize) {
        self.stale_views_pruned += count as u64;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hit_and_miss_share_call_counter() {
        let mut m = CacheMetrics::default();
        m.record_hit_found();
        m.record_hit_miss();
        m.record_hit_miss();
        assert_eq!(m.hit_calls, 3);
        assert_eq!(m.hit_found, 1);
    }

    #[test]
    fn read_recorder_counts_through_shared_ref() {
        let m = CacheMetrics::default();
        m.record_peek_call();
        m.record_peek_found();
        m.record_peek_call();
        assert_eq!(m.peek_calls.get(), 2);
        assert_eq!(m.peek_found.get(), 1);
    }

    #[test]
    fn manager_prune_counter_accumulates() {
        let mut m = ManagerMetrics::default();
        m.record_stale_views_pruned(2);
        m.record_stale_views_pruned(0);
        m.record_stale_views_pruned(3);
        assert_eq!(m.stale_views_pruned, 5);
    }

    #[test]
    fn manager_batch_counts_add_to_single_counts() {
        let mut m = ManagerMetrics::default();
        m.record_cache_hit();
        m.record_cache_hits(3);
        m.record_view_hits(2);
        m.record_promotions(2);
        m.record_lookup_miss();
        m.record_lookup_misses(0);
        m.record_unified_instances(4);
        assert_eq!(m.cache_hits, 4);
        assert_eq!(m.view_hits, 2);
        assert_eq!(m.promotions, 2);
        assert_eq!(m.lookup_misses, 1);
        assert_eq!(m.unified_instances, 4);
    }
}
