use crate::metrics::cell::MetricsCell;
use crate::metrics::snapshot::PinCacheMetricsSnapshot;
use crate::metrics::traits::{
    CoreMetricsRecorder, MetricsSnapshotProvider, PinCacheMetricsReadRecorder,
    PinCacheMetricsRecorder,
};

#[derive(Debug, Default)]
pub struct PinCacheMetrics {
    pub get_calls: u64,
    pub get_hits: u64,
    pub get_misses: u64,
    pub pins: u64,
    pub insert_calls: u64,
    pub insert_new: u64,
    pub insert_duplicates: u64,
    pub evict_calls: u64,
    pub evicted_entries: u64,
    pub evict_scan_steps: u64,
    pub full_rejections: u64,
    pub delete_calls: u64,
    pub deleted_entries: u64,
    pub delete_locked: u64,
    pub unlock_calls: u64,
    pub unpaired_unlocks: u64,
    pub clear_calls: u64,
    pub contains_calls: MetricsCell,
    pub contains_hits: MetricsCell,
}

impl CoreMetricsRecorder for PinCacheMetrics {
    fn record_get_hit(&mut self) {
        self.get_calls += 1;
        self.get_hits += 1;
    }

    fn record_get_miss(&mut self) {
        self.get_calls += 1;
        self.get_misses += 1;
    }

    fn record_insert_call(&mut self) {
        self.insert_calls += 1;
    }

    fn record_insert_new(&mut self) {
        self.insert_new += 1;
    }

    fn record_evict_call(&mut self) {
        self.evict_calls += 1;
    }

    fn record_evicted_entry(&mut self) {
        self.evicted_entries += 1;
    }

    fn record_clear(&mut self) {
        self.clear_calls += 1;
    }
}

impl PinCacheMetricsRecorder for PinCacheMetrics {
    fn record_pin(&mut self) {
        self.pins += 1;
    }

    fn record_insert_duplicate(&mut self) {
        self.insert_duplicates += 1;
    }

    fn record_full_rejection(&mut self) {
        self.full_rejections += 1;
    }

    fn record_evict_scan_step(&mut self) {
        self.evict_scan_steps += 1;
    }

    fn record_delete_call(&mut self) {
        self.delete_calls += 1;
    }

    fn record_deleted_entry(&mut self) {
        self.deleted_entries += 1;
    }

    fn record_delete_locked(&mut self) {
        self.delete_locked += 1;
    }

    fn record_unlock_call(&mut self) {
        self.unlock_calls += 1;
    }

    fn record_unpaired_unlock(&mut self) {
        self.unpaired_unlocks += 1;
    }
}

impl PinCacheMetricsReadRecorder for PinCacheMetrics {
    fn record_contains_call(&self) {
        self.contains_calls.incr();
    }

    fn record_contains_hit(&self) {
        self.contains_hits.incr();
    }
}

impl MetricsSnapshotProvider<PinCacheMetricsSnapshot> for PinCacheMetrics {
    /// Counters only; the cache fills in the gauges.
    fn snapshot(&self) -> PinCacheMetricsSnapshot {
        PinCacheMetricsSnapshot {
            get_calls: self.get_calls,
            get_hits: self.get_hits,
            get_misses: self.get_misses,
            pins: self.pins,
            insert_calls: self.insert_calls,
            insert_new: self.insert_new,
            insert_duplicates: self.insert_duplicates,
            evict_calls: self.evict_calls,
            evicted_entries: self.evicted_entries,
            evict_scan_steps: self.evict_scan_steps,
            full_rejections: self.full_rejections,
            delete_calls: self.delete_calls,
            deleted_entries: self.deleted_entries,
            delete_locked: self.delete_locked,
            unlock_calls: self.unlock_calls,
            unpaired_unlocks: self.unpaired_unlocks,
            clear_calls: self.clear_calls,
            contains_calls: self.contains_calls.get(),
            contains_hits: self.contains_hits.get(),
            cache_len: 0,
            capacity: 0,
            pinned_entries: 0,
        }
    }
}
