use std::io::Write;
use std::sync::Mutex;

use crate::metrics::snapshot::PinCacheMetricsSnapshot;
use crate::metrics::traits::MetricsExporter;

/// Prometheus text exporter for pin cache metrics snapshots.
///
/// Writes the text exposition format so the output can be scraped directly
/// or forwarded to a collector.
#[derive(Debug)]
pub struct PrometheusTextExporter<W: Write + Send + Sync> {
    prefix: String,
    writer: Mutex<W>,
}

impl<W: Write + Send + Sync> PrometheusTextExporter<W> {
    pub fn new(prefix: impl Into<String>, writer: W) -> Self {
        Self {
            prefix: prefix.into(),
            writer: Mutex::new(writer),
        }
    }

    /// Returns the writer, recovering it if a writer panicked mid-export.
    pub fn into_inner(self) -> W {
        match self.writer.into_inner() {
            Ok(writer) => writer,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write_metric(&self, kind: &str, name: &str, value: u64) {
        let mut writer = match self.writer.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let _ = writeln!(writer, "# TYPE {} {}", name, kind);
        let _ = writeln!(writer, "{} {}", name, value);
    }

    fn write_counter(&self, suffix: &str, value: u64) {
        self.write_metric("counter", &self.metric_name(suffix), value);
    }

    fn write_gauge(&self, suffix: &str, value: usize) {
        self.write_metric("gauge", &self.metric_name(suffix), value as u64);
    }

    fn metric_name(&self, suffix: &str) -> String {
        if self.prefix.is_empty() {
            suffix.to_string()
        } else {
            format!("{}_{}", self.prefix, suffix)
        }
    }
}

impl<W: Write + Send + Sync> MetricsExporter<PinCacheMetricsSnapshot>
    for PrometheusTextExporter<W>
{
    fn export(&self, snapshot: &PinCacheMetricsSnapshot) {
        self.write_counter("get_calls_total", snapshot.get_calls);
        self.write_counter("get_hits_total", snapshot.get_hits);
        self.write_counter("get_misses_total", snapshot.get_misses);
        self.write_counter("pins_total", snapshot.pins);
        self.write_counter("insert_calls_total", snapshot.insert_calls);
        self.write_counter("insert_new_total", snapshot.insert_new);
        self.write_counter("insert_duplicates_total", snapshot.insert_duplicates);
        self.write_counter("evict_calls_total", snapshot.evict_calls);
        self.write_counter("evicted_entries_total", snapshot.evicted_entries);
        self.write_counter("evict_scan_steps_total", snapshot.evict_scan_steps);
        self.write_counter("full_rejections_total", snapshot.full_rejections);
        self.write_counter("delete_calls_total", snapshot.delete_calls);
        self.write_counter("deleted_entries_total", snapshot.deleted_entries);
        self.write_counter("delete_locked_total", snapshot.delete_locked);
        self.write_counter("unlock_calls_total", snapshot.unlock_calls);
        self.write_counter("unpaired_unlocks_total", snapshot.unpaired_unlocks);
        self.write_counter("clear_calls_total", snapshot.clear_calls);
        self.write_counter("contains_calls_total", snapshot.contains_calls);
        self.write_counter("contains_hits_total", snapshot.contains_hits);
        self.write_gauge("cache_len", snapshot.cache_len);
        self.write_gauge("capacity", snapshot.capacity);
        self.write_gauge("pinned_entries", snapshot.pinned_entries);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(prefix: &str, snapshot: &PinCacheMetricsSnapshot) -> String {
        let exporter = PrometheusTextExporter::new(prefix, Vec::new());
        exporter.export(snapshot);
        String::from_utf8(exporter.into_inner()).unwrap()
    }

    #[test]
    fn counters_and_gauges_are_typed() {
        let snapshot = PinCacheMetricsSnapshot {
            get_hits: 3,
            pinned_entries: 2,
            ..PinCacheMetricsSnapshot::default()
        };
        let text = render("pincache", &snapshot);
        assert!(text.contains("# TYPE pincache_get_hits_total counter\npincache_get_hits_total 3\n"));
        assert!(text.contains("# TYPE pincache_pinned_entries gauge\npincache_pinned_entries 2\n"));
    }

    #[test]
    fn empty_prefix_leaves_names_bare() {
        let text = render("", &PinCacheMetricsSnapshot::default());
        assert!(text.contains("\nfull_rejections_total 0\n"));
        assert!(!text.contains("_full_rejections_total"));
    }
}
