#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheMetricsSnapshot {
    pub add_calls: u64,
    pub add_new: u64,
    pub add_duplicates: u64,

    pub hit_calls: u64,
    pub hit_found: u64,
    pub peek_calls: u64,
    pub peek_found: u64,

    pub evicted_entries: u64,
    pub dirty_flushes: u64,
    pub flush_failures: u64, // includes dirty entities dropped with no write-back hook
    pub deletions: u64,
    pub commit_calls: u64,

    // gauges captured at snapshot time
    pub cache_len: usize,
    pub capacity: usize,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ManagerMetricsSnapshot {
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

    pub kinds: usize,
    pub live_views: usize,
}
