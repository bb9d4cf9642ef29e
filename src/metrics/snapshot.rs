#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PinCacheMetricsSnapshot {
    pub get_calls: u64,
    pub get_hits: u64,
    pub get_misses: u64,
    pub pins: u64,

    pub insert_calls: u64,
    pub insert_new: u64,
    pub insert_duplicates: u64,

    pub evict_calls: u64,
    pub evicted_entries: u64,
    pub evict_scan_steps: u64, // recency nodes inspected from the tail
    pub full_rejections: u64,

    pub delete_calls: u64,
    pub deleted_entries: u64,
    pub delete_locked: u64,

    pub unlock_calls: u64,
    pub unpaired_unlocks: u64,

    pub clear_calls: u64,

    pub contains_calls: u64,
    pub contains_hits: u64,

    // gauges captured at snapshot time
    pub cache_len: usize,
    pub capacity: usize,
    pub pinned_entries: usize,
}
