// Analysis metrics
//
// Lightweight counters for monitoring how the engines are used

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// Counters owned by the orchestrator
///
/// Uses atomic operations for thread-safe metric tracking without locks.
#[derive(Debug)]
pub struct AnalysisMetrics {
    /// Comprehensive analyses that produced a report
    pub analyses_completed: AtomicUsize,

    /// Comprehensive analyses that returned an error
    pub analyses_failed: AtomicUsize,

    /// Pairwise conflict predictions served
    pub predictions_served: AtomicU64,

    /// Training runs across all trainable engines
    pub training_runs: AtomicU64,

    /// Compatibility matrix builds and incremental updates
    pub matrix_updates: AtomicU64,

    /// Plugin records skipped for missing fields
    pub records_skipped: AtomicU64,

    /// Total wall-clock analysis time in milliseconds
    pub total_analysis_time_ms: AtomicU64,

    start_time: Instant,
}

impl AnalysisMetrics {
    pub fn new() -> Self {
        Self {
            analyses_completed: AtomicUsize::new(0),
            analyses_failed: AtomicUsize::new(0),
            predictions_served: AtomicU64::new(0),
            training_runs: AtomicU64::new(0),
            matrix_updates: AtomicU64::new(0),
            records_skipped: AtomicU64::new(0),
            total_analysis_time_ms: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Record a finished analysis and how long it took
    pub fn record_analysis(&self, duration: Duration) {
        self.analyses_completed.fetch_add(1, Ordering::Relaxed);
        self.total_analysis_time_ms
            .fetch_add(duration.as_millis() as u64, Ordering::Relaxed);
    }

    pub fn record_analysis_failed(&self) {
        self.analyses_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_predictions(&self, count: u64) {
        self.predictions_served.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_training_run(&self) {
        self.training_runs.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_matrix_update(&self) {
        self.matrix_updates.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_skipped_records(&self, count: usize) {
        self.records_skipped
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    /// Get total uptime
    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Average analysis time in milliseconds
    pub fn avg_analysis_time_ms(&self) -> f64 {
        let total = self.total_analysis_time_ms.load(Ordering::Relaxed);
        let count = self.analyses_completed.load(Ordering::Relaxed);
        if count > 0 {
            total as f64 / count as f64
        } else {
            0.0
        }
    }

    /// Log metrics summary
    pub fn log_summary(&self) {
        tracing::info!("=== Analysis Metrics Summary ===");
        tracing::info!("Uptime: {:.2}s", self.uptime().as_secs_f64());
        tracing::info!(
            "Analyses: {} completed, {} failed (avg: {:.2}ms)",
            self.analyses_completed.load(Ordering::Relaxed),
            self.analyses_failed.load(Ordering::Relaxed),
            self.avg_analysis_time_ms()
        );
        tracing::info!(
            "Predictions: {}, training runs: {}, matrix updates: {}",
            self.predictions_served.load(Ordering::Relaxed),
            self.training_runs.load(Ordering::Relaxed),
            self.matrix_updates.load(Ordering::Relaxed)
        );
        tracing::info!(
            "Plugin records skipped: {}",
            self.records_skipped.load(Ordering::Relaxed)
        );
    }
}

impl Default for AnalysisMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_metrics_creation() {
        let metrics = AnalysisMetrics::new();
        assert_eq!(metrics.analyses_completed.load(Ordering::Relaxed), 0);
        assert_eq!(metrics.predictions_served.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_record_analysis_time() {
        let metrics = AnalysisMetrics::new();

        metrics.record_analysis(Duration::from_millis(100));
        metrics.record_analysis(Duration::from_millis(200));
        metrics.record_analysis_failed();

        assert_eq!(metrics.analyses_completed.load(Ordering::Relaxed), 2);
        assert_eq!(metrics.analyses_failed.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.avg_analysis_time_ms(), 150.0);
    }

    #[test]
    fn test_avg_analysis_time_no_runs() {
        let metrics = AnalysisMetrics::new();
        assert_eq!(metrics.avg_analysis_time_ms(), 0.0);
    }

    #[test]
    fn test_engine_counters() {
        let metrics = AnalysisMetrics::new();

        metrics.record_predictions(3);
        metrics.record_training_run();
        metrics.record_matrix_update();
        metrics.record_skipped_records(2);

        assert_eq!(metrics.predictions_served.load(Ordering::Relaxed), 3);
        assert_eq!(metrics.training_runs.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.matrix_updates.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.records_skipped.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn test_uptime() {
        let metrics = AnalysisMetrics::new();
        thread::sleep(Duration::from_millis(10));
        assert!(metrics.uptime().as_millis() >= 10);
    }
}
