use chrono::Utc;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Coarse classification of one batch attempt, as counted by the collector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptKind {
    Success,
    Reverted,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub timestamp: String,
    pub uptime_secs: u64,
    pub batches: BatchMetrics,
    pub single_transactions: SingleTxMetrics,
    pub gas: GasMetrics,
    pub performance: PerformanceMetrics,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchMetrics {
    pub attempted: u64,
    pub success: u64,
    pub reverted: u64,
    pub failed: u64,
    pub recipients_paid: u64,
    pub largest_successful_batch: u64,
}

/// Funding transfers, claims and other one-recipient legs that pay nobody.
#[derive(Debug, Clone, Serialize)]
pub struct SingleTxMetrics {
    pub attempted: u64,
    pub success: u64,
    pub reverted: u64,
    pub failed: u64,
    pub gas_used: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct GasMetrics {
    pub total_gas_used: u64,
    pub avg_gas_per_recipient: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PerformanceMetrics {
    pub avg_confirmation_ms: f64,
    pub min_confirmation_ms: u64,
    pub max_confirmation_ms: u64,
}

/// Lock-free counters shared by every workload of a run.
#[derive(Debug)]
pub struct MetricsCollector {
    attempted: AtomicU64,
    success: AtomicU64,
    reverted: AtomicU64,
    failed: AtomicU64,
    recipients_paid: AtomicU64,
    largest_batch: AtomicU64,
    gas_used: AtomicU64,
    single_attempted: AtomicU64,
    single_success: AtomicU64,
    single_reverted: AtomicU64,
    single_failed: AtomicU64,
    single_gas_used: AtomicU64,
    duration_sum_ms: AtomicU64,
    min_duration_ms: AtomicU64,
    max_duration_ms: AtomicU64,
    start_time: Instant,
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self {
            attempted: AtomicU64::new(0),
            success: AtomicU64::new(0),
            reverted: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            recipients_paid: AtomicU64::new(0),
            largest_batch: AtomicU64::new(0),
            gas_used: AtomicU64::new(0),
            single_attempted: AtomicU64::new(0),
            single_success: AtomicU64::new(0),
            single_reverted: AtomicU64::new(0),
            single_failed: AtomicU64::new(0),
            single_gas_used: AtomicU64::new(0),
            duration_sum_ms: AtomicU64::new(0),
            min_duration_ms: AtomicU64::new(u64::MAX),
            max_duration_ms: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one attempt. `gas_used` is only meaningful for successes.
    pub fn record_batch(&self, size: usize, kind: AttemptKind, gas_used: u64, duration: Duration) {
        self.attempted.fetch_add(1, Ordering::SeqCst);

        let duration_ms = duration.as_millis() as u64;
        self.duration_sum_ms.fetch_add(duration_ms, Ordering::SeqCst);
        self.min_duration_ms.fetch_min(duration_ms, Ordering::SeqCst);
        self.max_duration_ms.fetch_max(duration_ms, Ordering::SeqCst);

        match kind {
            AttemptKind::Success => {
                self.success.fetch_add(1, Ordering::SeqCst);
                self.recipients_paid.fetch_add(size as u64, Ordering::SeqCst);
                self.largest_batch.fetch_max(size as u64, Ordering::SeqCst);
                self.gas_used.fetch_add(gas_used, Ordering::SeqCst);
            }
            AttemptKind::Reverted => {
                self.reverted.fetch_add(1, Ordering::SeqCst);
            }
            AttemptKind::Failed => {
                self.failed.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    /// Records a supporting transaction. It never touches the batch,
    /// recipient or per-recipient gas aggregates.
    pub fn record_single(&self, kind: AttemptKind, gas_used: u64) {
        self.single_attempted.fetch_add(1, Ordering::SeqCst);
        match kind {
            AttemptKind::Success => {
                self.single_success.fetch_add(1, Ordering::SeqCst);
                self.single_gas_used.fetch_add(gas_used, Ordering::SeqCst);
            }
            AttemptKind::Reverted => {
                self.single_reverted.fetch_add(1, Ordering::SeqCst);
            }
            AttemptKind::Failed => {
                self.single_failed.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let attempted = self.attempted.load(Ordering::SeqCst);
        let recipients = self.recipients_paid.load(Ordering::SeqCst);
        let gas_used = self.gas_used.load(Ordering::SeqCst);
        let duration_sum = self.duration_sum_ms.load(Ordering::SeqCst);
        let min_duration = self.min_duration_ms.load(Ordering::SeqCst);

        MetricsSnapshot {
            timestamp: Utc::now().to_rfc3339(),
            uptime_secs: self.start_time.elapsed().as_secs(),
            batches: BatchMetrics {
                attempted,
                success: self.success.load(Ordering::SeqCst),
                reverted: self.reverted.load(Ordering::SeqCst),
                failed: self.failed.load(Ordering::SeqCst),
                recipients_paid: recipients,
                largest_successful_batch: self.largest_batch.load(Ordering::SeqCst),
            },
            single_transactions: SingleTxMetrics {
                attempted: self.single_attempted.load(Ordering::SeqCst),
                success: self.single_success.load(Ordering::SeqCst),
                reverted: self.single_reverted.load(Ordering::SeqCst),
                failed: self.single_failed.load(Ordering::SeqCst),
                gas_used: self.single_gas_used.load(Ordering::SeqCst),
            },
            gas: GasMetrics {
                total_gas_used: gas_used,
                avg_gas_per_recipient: if recipients > 0 {
                    gas_used as f64 / recipients as f64
                } else {
                    0.0
                },
            },
            performance: PerformanceMetrics {
                avg_confirmation_ms: if attempted > 0 {
                    duration_sum as f64 / attempted as f64
                } else {
                    0.0
                },
                min_confirmation_ms: if min_duration == u64::MAX {
                    0
                } else {
                    min_duration
                },
                max_confirmation_ms: self.max_duration_ms.load(Ordering::SeqCst),
            },
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(&self.snapshot()).unwrap_or_else(|_| "{}".to_string())
    }

    pub async fn export_to_file(&self, path: &str) -> std::io::Result<()> {
        tokio::fs::write(path, self.to_json()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_successes_count_gas_and_recipients() {
        let metrics = MetricsCollector::default();

        metrics.record_batch(100, AttemptKind::Success, 2_000_000, Duration::from_millis(100));
        metrics.record_batch(200, AttemptKind::Success, 4_000_000, Duration::from_millis(300));
        metrics.record_batch(300, AttemptKind::Reverted, 0, Duration::from_millis(200));

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.batches.attempted, 3);
        assert_eq!(snapshot.batches.success, 2);
        assert_eq!(snapshot.batches.reverted, 1);
        assert_eq!(snapshot.batches.recipients_paid, 300);
        assert_eq!(snapshot.batches.largest_successful_batch, 200);
        assert_eq!(snapshot.gas.total_gas_used, 6_000_000);
        assert!((snapshot.gas.avg_gas_per_recipient - 20_000.0).abs() < f64::EPSILON);
        assert_eq!(snapshot.performance.min_confirmation_ms, 100);
        assert_eq!(snapshot.performance.max_confirmation_ms, 300);
    }

    #[test]
    fn test_single_transactions_stay_out_of_batch_totals() {
        let metrics = MetricsCollector::default();

        metrics.record_batch(10, AttemptKind::Success, 300_000, Duration::from_millis(50));
        metrics.record_single(AttemptKind::Success, 21_000);
        metrics.record_single(AttemptKind::Success, 55_000);
        metrics.record_single(AttemptKind::Reverted, 0);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.batches.attempted, 1);
        assert_eq!(snapshot.batches.recipients_paid, 10);
        assert_eq!(snapshot.batches.largest_successful_batch, 10);
        assert_eq!(snapshot.gas.total_gas_used, 300_000);
        assert!((snapshot.gas.avg_gas_per_recipient - 30_000.0).abs() < f64::EPSILON);
        assert_eq!(snapshot.single_transactions.attempted, 3);
        assert_eq!(snapshot.single_transactions.success, 2);
        assert_eq!(snapshot.single_transactions.reverted, 1);
        assert_eq!(snapshot.single_transactions.gas_used, 76_000);
    }

    #[tokio::test]
    async fn test_json_export() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metrics.json");
        let metrics = MetricsCollector::default();
        metrics.record_batch(1, AttemptKind::Failed, 0, Duration::from_millis(5));

        metrics.export_to_file(path.to_str().unwrap()).await.unwrap();
        let json = std::fs::read_to_string(&path).unwrap();
        assert!(json.contains("batches"));
        assert!(json.contains("\"failed\": 1"));
    }
}
