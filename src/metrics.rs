//! Classification statistics: counts per class, degenerate and NaN predictions, latency.

use crate::models::inference::Prediction;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};
use std::time::{Duration, Instant};
use tracing::info;

/// Latency samples kept before the oldest half is dropped
const LATENCY_WINDOW: usize = 10_000;

/// Metrics collector for the classification loop
pub struct ClassificationMetrics {
    /// Samples classified
    pub samples_processed: AtomicU64,
    /// Samples rejected before classification (unreadable input)
    pub samples_rejected: AtomicU64,
    /// Predictions where no rule fired
    pub degenerate_predictions: AtomicU64,
    /// Predictions poisoned by NaN features
    pub nan_predictions: AtomicU64,
    /// Predictions per class label
    predictions_by_class: RwLock<BTreeMap<String, u64>>,
    /// Processing times (in microseconds)
    processing_times: RwLock<Vec<u64>>,
    start_time: Instant,
}

impl ClassificationMetrics {
    pub fn new() -> Self {
        Self {
            samples_processed: AtomicU64::new(0),
            samples_rejected: AtomicU64::new(0),
            degenerate_predictions: AtomicU64::new(0),
            nan_predictions: AtomicU64::new(0),
            predictions_by_class: RwLock::new(BTreeMap::new()),
            processing_times: RwLock::new(Vec::with_capacity(1000)),
            start_time: Instant::now(),
        }
    }

    /// Record a classified sample
    pub fn record_prediction(&self, prediction: &Prediction, label: &str, processing_time: Duration) {
        self.samples_processed.fetch_add(1, Ordering::Relaxed);

        if prediction.is_nan_poisoned() {
            // The label of a NaN prediction is meaningless; don't count it per class
            self.nan_predictions.fetch_add(1, Ordering::Relaxed);
        } else {
            if prediction.degenerate {
                self.degenerate_predictions.fetch_add(1, Ordering::Relaxed);
            }
            let mut by_class = self
                .predictions_by_class
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            *by_class.entry(label.to_string()).or_insert(0) += 1;
        }

        let mut times = self
            .processing_times
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        times.push(processing_time.as_micros() as u64);
        if times.len() > LATENCY_WINDOW {
            times.drain(0..LATENCY_WINDOW / 2);
        }
    }

    /// Record an input that could not be classified
    pub fn record_rejected(&self) {
        self.samples_rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Get processing time statistics
    pub fn get_processing_stats(&self) -> ProcessingStats {
        let times = self
            .processing_times
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        if times.is_empty() {
            return ProcessingStats::default();
        }

        let mut sorted: Vec<u64> = times.clone();
        sorted.sort_unstable();

        let sum: u64 = sorted.iter().sum();
        let count = sorted.len();

        ProcessingStats {
            count: count as u64,
            mean_us: sum / count as u64,
            p50_us: sorted[count / 2],
            p95_us: sorted[(count as f64 * 0.95) as usize],
            p99_us: sorted[(count as f64 * 0.99) as usize],
            max_us: sorted[count - 1],
        }
    }

    /// Predictions per class label
    pub fn get_predictions_by_class(&self) -> BTreeMap<String, u64> {
        self.predictions_by_class
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Samples per second since start
    pub fn get_throughput(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.samples_processed.load(Ordering::Relaxed) as f64 / elapsed
        } else {
            0.0
        }
    }

    /// Print summary statistics
    pub fn print_summary(&self) {
        let processed = self.samples_processed.load(Ordering::Relaxed);
        let rejected = self.samples_rejected.load(Ordering::Relaxed);
        let degenerate = self.degenerate_predictions.load(Ordering::Relaxed);
        let nan = self.nan_predictions.load(Ordering::Relaxed);
        let processing = self.get_processing_stats();
        let by_class = self.get_predictions_by_class();

        info!("╔══════════════════════════════════════════════════════════════╗");
        info!("║            POSTURE CLASSIFIER - METRICS SUMMARY              ║");
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!(
            "║ Samples Classified: {:>8}  │  Throughput: {:>8.1} /s      ║",
            processed,
            self.get_throughput()
        );
        info!(
            "║ Rejected: {:>6}  │  Degenerate: {:>6}  │  NaN: {:>6}       ║",
            rejected, degenerate, nan
        );
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!(
            "║ Processing Time (μs): mean={:>5} p50={:>5} p95={:>5} p99={:>5} ║",
            processing.mean_us, processing.p50_us, processing.p95_us, processing.p99_us
        );
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!("║ Predictions by Class:                                        ║");
        let total: u64 = by_class.values().sum();
        for (label, count) in &by_class {
            let pct = if total > 0 {
                (*count as f64 / total as f64) * 100.0
            } else {
                0.0
            };
            let bar = "█".repeat(((pct / 5.0) as usize).min(20));
            info!("║   {:12}: {:>6} ({:>5.1}%) {}", label, count, pct, bar);
        }
        info!("╚══════════════════════════════════════════════════════════════╝");
    }
}

impl Default for ClassificationMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Processing time statistics
#[derive(Debug, Default)]
pub struct ProcessingStats {
    pub count: u64,
    pub mean_us: u64,
    pub p50_us: u64,
    pub p95_us: u64,
    pub p99_us: u64,
    pub max_us: u64,
}
