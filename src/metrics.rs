//! Session statistics for the risk calculator.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::{Duration, Instant};
use tracing::info;

/// Counters and latency samples collected over one session
pub struct CalculatorMetrics {
    /// Submissions that produced a probability
    pub predictions_scored: AtomicU64,
    /// Submissions rejected for missing variables
    pub submissions_rejected: AtomicU64,
    /// How often each display name was missing
    missing_by_field: RwLock<HashMap<String, u64>>,
    /// Scoring times (in microseconds)
    scoring_times: RwLock<Vec<u64>>,
    /// Probability distribution buckets
    probability_buckets: RwLock<[u64; 10]>,
    /// Start of the session
    start_time: Instant,
}

impl CalculatorMetrics {
    pub fn new() -> Self {
        Self {
            predictions_scored: AtomicU64::new(0),
            submissions_rejected: AtomicU64::new(0),
            missing_by_field: RwLock::new(HashMap::new()),
            scoring_times: RwLock::new(Vec::with_capacity(256)),
            probability_buckets: RwLock::new([0; 10]),
            start_time: Instant::now(),
        }
    }

    /// Record a scored submission
    pub fn record_prediction(&self, scoring_time: Duration, probability: f64) {
        self.predictions_scored.fetch_add(1, Ordering::Relaxed);

        if let Ok(mut times) = self.scoring_times.write() {
            times.push(scoring_time.as_micros() as u64);
            // Keep only the most recent samples
            if times.len() > 10000 {
                times.drain(0..5000);
            }
        }

        let bucket = (probability * 10.0).clamp(0.0, 9.0) as usize;
        if let Ok(mut buckets) = self.probability_buckets.write() {
            buckets[bucket] += 1;
        }
    }

    /// Record a submission rejected for missing variables
    pub fn record_rejection(&self, missing: &[String]) {
        self.submissions_rejected.fetch_add(1, Ordering::Relaxed);

        if let Ok(mut by_field) = self.missing_by_field.write() {
            for field in missing {
                *by_field.entry(field.clone()).or_insert(0) += 1;
            }
        }
    }

    /// Get scoring time statistics
    pub fn get_scoring_stats(&self) -> ScoringStats {
        let times = match self.scoring_times.read() {
            Ok(times) => times,
            Err(_) => return ScoringStats::default(),
        };
        if times.is_empty() {
            return ScoringStats::default();
        }

        let mut sorted: Vec<u64> = times.clone();
        sorted.sort_unstable();

        let sum: u64 = sorted.iter().sum();
        let count = sorted.len();

        ScoringStats {
            count: count as u64,
            mean_us: sum / count as u64,
            p50_us: sorted[count / 2],
            p95_us: sorted[(count as f64 * 0.95) as usize],
            p99_us: sorted[(count as f64 * 0.99) as usize],
            max_us: sorted[count - 1],
        }
    }

    /// Get probability distribution
    pub fn get_probability_distribution(&self) -> [u64; 10] {
        self.probability_buckets
            .read()
            .map(|b| *b)
            .unwrap_or_default()
    }

    /// Get missing-field counts
    pub fn get_missing_by_field(&self) -> HashMap<String, u64> {
        self.missing_by_field
            .read()
            .map(|m| m.clone())
            .unwrap_or_default()
    }

    /// Print summary statistics
    pub fn print_summary(&self) {
        let scored = self.predictions_scored.load(Ordering::Relaxed);
        let rejected = self.submissions_rejected.load(Ordering::Relaxed);
        let scoring = self.get_scoring_stats();
        let distribution = self.get_probability_distribution();

        info!(
            session_secs = self.start_time.elapsed().as_secs(),
            scored,
            rejected,
            "Session summary"
        );
        if scoring.count > 0 {
            info!(
                mean_us = scoring.mean_us,
                p50_us = scoring.p50_us,
                p95_us = scoring.p95_us,
                p99_us = scoring.p99_us,
                max_us = scoring.max_us,
                "Scoring time"
            );
        }

        let mut missing: Vec<(String, u64)> = self.get_missing_by_field().into_iter().collect();
        missing.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        for (field, count) in &missing {
            info!(field = %field, count, "Missing variable");
        }

        let total: u64 = distribution.iter().sum();
        for (i, &count) in distribution.iter().enumerate().filter(|(_, &c)| c > 0) {
            let pct = (count as f64 / total as f64) * 100.0;
            info!(
                "  {:.1}-{:.1}: {:>6} ({:>5.1}%) {}",
                i as f64 / 10.0,
                (i + 1) as f64 / 10.0,
                count,
                pct,
                "█".repeat(((pct / 5.0) as usize).min(20))
            );
        }
    }
}

impl Default for CalculatorMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Scoring time statistics
#[derive(Debug, Default)]
pub struct ScoringStats {
    pub count: u64,
    pub mean_us: u64,
    pub p50_us: u64,
    pub p95_us: u64,
    pub p99_us: u64,
    pub max_us: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_recording() {
        let metrics = CalculatorMetrics::new();

        metrics.record_prediction(Duration::from_micros(100), 0.05);
        metrics.record_prediction(Duration::from_micros(300), 1.0);
        metrics.record_rejection(&["Calcium".to_string(), "Hemoglobin".to_string()]);
        metrics.record_rejection(&["Calcium".to_string()]);

        assert_eq!(metrics.predictions_scored.load(Ordering::Relaxed), 2);
        assert_eq!(metrics.submissions_rejected.load(Ordering::Relaxed), 2);

        let missing = metrics.get_missing_by_field();
        assert_eq!(missing.get("Calcium"), Some(&2));
        assert_eq!(missing.get("Hemoglobin"), Some(&1));

        let distribution = metrics.get_probability_distribution();
        assert_eq!(distribution[0], 1);
        assert_eq!(distribution[9], 1);
    }

    #[test]
    fn test_scoring_stats() {
        let metrics = CalculatorMetrics::new();
        assert_eq!(metrics.get_scoring_stats().count, 0);

        for us in [100, 200, 300, 400] {
            metrics.record_prediction(Duration::from_micros(us), 0.5);
        }

        let stats = metrics.get_scoring_stats();
        assert_eq!(stats.count, 4);
        assert_eq!(stats.mean_us, 250);
        assert_eq!(stats.p50_us, 300);
        assert_eq!(stats.max_us, 400);
    }
}
