//! # Metrics Trait Hierarchy
//!
//! Separates *recording*, *snapshotting*, and *export* into small traits so
//! the cache engine only ever writes counters.
//!
//! ## Architecture
//!
//! ```text
//!                ┌─────────────────────────────┐
//!                │     CoreMetricsRecorder     │
//!                │  get_hit/get_miss/insert    │
//!                │  evict/clear                │
//!                └──────────────┬──────────────┘
//!                               │
//!                               ▼
//!                ┌─────────────────────────────┐     ┌──────────────────────────────┐
//!                │   PinCacheMetricsRecorder   │     │ PinCacheMetricsReadRecorder  │
//!                │ pin/unlock/full/delete      │     │ contains (&self paths)       │
//!                └─────────────────────────────┘     └──────────────────────────────┘
//!
//!   Consumption (decoupled from recording):
//!   ┌──────────────────────────────┐    ┌──────────────────────────────┐
//!   │ MetricsSnapshotProvider<S>   │    │ MetricsExporter<S>           │
//!   │ (bench/test)                 │    │ (production monitoring)      │
//!   └──────────────────────────────┘    └──────────────────────────────┘
//! ```
//!
//! ## Design Goals
//! - Recorders only write counters; providers only read/snapshot; exporters
//!   only publish to monitoring systems.
//! - Counters are plain integers; gauges are captured at snapshot time.

/// Common counters for any cache.
pub trait CoreMetricsRecorder {
    fn record_get_hit(&mut self);
    fn record_get_miss(&mut self);
    fn record_insert_call(&mut self);
    fn record_insert_new(&mut self);
    fn record_evict_call(&mut self);
    fn record_evicted_entry(&mut self);
    fn record_clear(&mut self);
}

/// Pinning, deletion and capacity signals of the pin cache.
pub trait PinCacheMetricsRecorder: CoreMetricsRecorder {
    fn record_pin(&mut self);
    fn record_insert_duplicate(&mut self);
    fn record_full_rejection(&mut self);
    fn record_evict_scan_step(&mut self);
    fn record_delete_call(&mut self);
    fn record_deleted_entry(&mut self);
    fn record_delete_locked(&mut self);
    fn record_unlock_call(&mut self);
    fn record_unpaired_unlock(&mut self);
}

/// Read-only pin cache metrics for &self methods (uses interior mutability).
pub trait PinCacheMetricsReadRecorder {
    fn record_contains_call(&self);
    fn record_contains_hit(&self);
}

/// Snapshot provider for bench/testing.
pub trait MetricsSnapshotProvider<S> {
    fn snapshot(&self) -> S;
}

/// Export/publish metrics to production monitoring backends.
pub trait MetricsExporter<S> {
    fn export(&self, snapshot: &S);
}
