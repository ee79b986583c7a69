//! Request and file-operation counters

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use std::collections::HashMap;
use parking_lot::RwLock;
use serde::Serialize;
use chrono::{DateTime, Utc};

#[derive(Clone)]
pub struct MetricsCollector {
    total_requests: Arc<AtomicU64>,
    failed_requests: Arc<AtomicU64>,
    requests_by_method: Arc<RwLock<HashMap<String, u64>>>,
    uploads: Arc<AtomicU64>,
    bytes_uploaded: Arc<AtomicU64>,
    rejected_uploads: Arc<AtomicU64>,
    downloads: Arc<AtomicU64>,
    deletes: Arc<AtomicU64>,
    start_time: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub total_requests: u64,
    pub failed_requests: u64,
    pub requests_by_method: HashMap<String, u64>,
    pub uploads: u64,
    pub bytes_uploaded: u64,
    pub rejected_uploads: u64,
    pub downloads: u64,
    pub deletes: u64,
    pub uptime_seconds: i64,
    pub error_rate: f64,
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            total_requests: Arc::new(AtomicU64::new(0)),
            failed_requests: Arc::new(AtomicU64::new(0)),
            requests_by_method: Arc::new(RwLock::new(HashMap::new())),
            uploads: Arc::new(AtomicU64::new(0)),
            bytes_uploaded: Arc::new(AtomicU64::new(0)),
            rejected_uploads: Arc::new(AtomicU64::new(0)),
            downloads: Arc::new(AtomicU64::new(0)),
            deletes: Arc::new(AtomicU64::new(0)),
            start_time: Utc::now(),
        }
    }

    pub fn record_request(&self, method: &str) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        *self
            .requests_by_method
            .write()
            .entry(method.to_string())
            .or_insert(0) += 1;
    }

    pub fn record_response(&self, status: u16) {
        if status >= 400 {
            self.failed_requests.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_upload(&self, size: u64) {
        self.uploads.fetch_add(1, Ordering::Relaxed);
        self.bytes_uploaded.fetch_add(size, Ordering::Relaxed);
    }

    pub fn record_rejected_upload(&self) {
        self.rejected_uploads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_download(&self) {
        self.downloads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_delete(&self) {
        self.deletes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let total = self.total_requests.load(Ordering::Relaxed);
        let failed = self.failed_requests.load(Ordering::Relaxed);

        let error_rate = if total > 0 {
            failed as f64 / total as f64 * 100.0
        } else {
            0.0
        };

        MetricsSnapshot {
            total_requests: total,
            failed_requests: failed,
            requests_by_method: self.requests_by_method.read().clone(),
            uploads: self.uploads.load(Ordering::Relaxed),
            bytes_uploaded: self.bytes_uploaded.load(Ordering::Relaxed),
            rejected_uploads: self.rejected_uploads.load(Ordering::Relaxed),
            downloads: self.downloads.load(Ordering::Relaxed),
            deletes: self.deletes.load(Ordering::Relaxed),
            uptime_seconds: (Utc::now() - self.start_time).num_seconds(),
            error_rate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let metrics = MetricsCollector::new();

        metrics.record_request("GET");
        metrics.record_request("POST");
        metrics.record_request("POST");
        metrics.record_response(200);
        metrics.record_response(409);
        metrics.record_upload(5);
        metrics.record_upload(7);
        metrics.record_rejected_upload();
        metrics.record_download();
        metrics.record_delete();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.total_requests, 3);
        assert_eq!(snapshot.failed_requests, 1);
        assert_eq!(snapshot.requests_by_method.get("POST"), Some(&2));
        assert_eq!(snapshot.uploads, 2);
        assert_eq!(snapshot.bytes_uploaded, 12);
        assert_eq!(snapshot.rejected_uploads, 1);
        assert_eq!(snapshot.downloads, 1);
        assert_eq!(snapshot.deletes, 1);
    }
}
