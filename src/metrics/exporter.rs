use std::io::Write;

use parking_lot::Mutex;

use crate::metrics::snapshot::{CacheMetricsSnapshot, ManagerMetricsSnapshot};
use crate::metrics::traits::MetricsExporter;

/// Prometheus text exporter for cache and manager snapshots.
///
/// This exporter writes in the Prometheus text exposition format so it can be
/// scraped by Prometheus or forwarded to an OpenTelemetry collector. Write
/// errors are ignored; metrics are best effort.
#[derive(Debug)]
pub struct PrometheusTextExporter<W: Write + Send> {
    prefix: String,
    writer: Mutex<W>,
}

impl<W: Write + Send> PrometheusTextExporter<W> {
    pub fn new(prefix: impl Into<String>, writer: W) -> Self {
        Self {
            prefix: prefix.into(),
            writer: Mutex::new(writer),
        }
    }

    /// Returns the underlying writer.
    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }

    fn write_counter(&self, name: &str, value: u64) {
        let mut writer = self.writer.lock();
        let _ = writeln!(writer, "# TYPE {} counter", name);
        let _ = writeln!(writer, "{} {}", name, value);
    }

    fn write_gauge(&self, name: &str, value: u64) {
        let mut writer = self.writer.lock();
        let _ = writeln!(writer, "# TYPE {} gauge", name);
        let _ = writeln!(writer, "{} {}", name, value);
    }

    fn metric_name(&self, suffix: &str) -> String {
        if self.prefix.is_empty() {
            suffix.to_string()
        } else {
            format!("{}_{}", self.prefix, suffix)
        }
    }
}

impl<W: Write + Send> MetricsExporter<CacheMetricsSnapshot> for PrometheusTextExporter<W> {
    fn export(&self, snapshot: &CacheMetricsSnapshot) {
        self.write_counter(&self.metric_name("add_calls_total"), snapshot.add_calls);
        self.write_counter(&self.metric_name("add_new_total"), snapshot.add_new);
        self.write_counter(
            &self.metric_name("add_duplicates_total"),
            snapshot.add_duplicates,
        );
        self.write_counter(&self.metric_name("hit_calls_total"), snapshot.hit_calls);
        self.write_counter(&self.metric_name("hit_found_total"), snapshot.hit_found);
        self.write_counter(&self.metric_name("peek_calls_total"), snapshot.peek_calls);
        self.write_counter(&self.metric_name("peek_found_total"), snapshot.peek_found);
        self.write_counter(
            &self.metric_name("evicted_entries_total"),
            snapshot.evicted_entries,
        );
        self.write_counter(
            &self.metric_name("dirty_flushes_total"),
            snapshot.dirty_flushes,
        );
        self.write_counter(
            &self.metric_name("flush_failures_total"),
            snapshot.flush_failures,
        );
        self.write_counter(&self.metric_name("deletions_total"), snapshot.deletions);
        self.write_counter(&self.metric_name("commit_calls_total"), snapshot.commit_calls);
        self.write_gauge(&self.metric_name("cache_len"), snapshot.cache_len as u64);
        self.write_gauge(&self.metric_name("capacity"), snapshot.capacity as u64);
    }
}

impl<W: Write + Send> MetricsExporter<ManagerMetricsSnapshot> for PrometheusTextExporter<W> {
    fn export(&self, snapshot: &ManagerMetricsSnapshot) {
        self.write_counter(&self.metric_name("lookup_calls_total"), snapshot.lookup_calls);
        self.write_counter(&self.metric_name("cache_hits_total"), snapshot.cache_hits);
        self.write_counter(&self.metric_name("view_hits_total"), snapshot.view_hits);
        self.write_counter(&self.metric_name("promotions_total"), snapshot.promotions);
        self.write_counter(
            &self.metric_name("lookup_misses_total"),
            snapshot.lookup_misses,
        );
        self.write_counter(
            &self.metric_name("unified_instances_total"),
            snapshot.unified_instances,
        );
        self.write_counter(
            &self.metric_name("added_callbacks_total"),
            snapshot.added_callbacks,
        );
        self.write_counter(
            &self.metric_name("modified_callbacks_total"),
            snapshot.modified_callbacks,
        );
        self.write_counter(
            &self.metric_name("removed_callbacks_total"),
            snapshot.removed_callbacks,
        );
        self.write_counter(
            &self.metric_name("stale_views_pruned_total"),
            snapshot.stale_views_pruned,
        );
        self.write_gauge(&self.metric_name("kinds"), snapshot.kinds as u64);
        self.write_gauge(&self.metric_name("live_views"), snapshot.live_views as u64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_snapshot_is_prefixed() {
        let exporter = PrometheusTextExporter::new("viewkit_message_cache", Vec::new());
        exporter.export(&CacheMetricsSnapshot {
            evicted_entries: 8,
            capacity: 32,
            ..Default::default()
        });
        let text = String::from_utf8(exporter.into_inner()).unwrap();
        assert!(text.contains("# TYPE viewkit_message_cache_evicted_entries_total counter"));
        assert!(text.contains("viewkit_message_cache_evicted_entries_total 8"));
        assert!(text.contains("# TYPE viewkit_message_cache_capacity gauge"));
        assert!(text.contains("viewkit_message_cache_capacity 32"));
    }

    #[test]
    fn empty_prefix_uses_bare_names() {
        let exporter = PrometheusTextExporter::new("", Vec::new());
        exporter.export(&ManagerMetricsSnapshot {
            promotions: 3,
            live_views: 2,
            ..Default::default()
        });
        let text = String::from_utf8(exporter.into_inner()).unwrap();
        assert!(text.contains("\npromotions_total 3\n"));
        assert!(text.contains("live_views 2"));
    }
}
