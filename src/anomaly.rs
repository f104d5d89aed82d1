//! Anomaly scoring over the sliding window.

use crate::config::ScoringConfig;
use crate::reading::Reading;
use crate::window::SlidingWindow;

/// Scores a full window of readings.
pub trait AnomalyScorer {
    /// Score the window, or `None` while it is still filling.
    fn score(&self, window: &SlidingWindow) -> Option<f64>;

    /// Short identifier for logs.
    fn name(&self) -> &'static str;
}

/// Normalized population variance of every value in the window.
///
/// All zone values of all readings are flattened into one sequence; the
/// score is a single global dispersion measure, not a per-zone one.
#[derive(Debug, Clone, PartialEq)]
pub struct VarianceScorer {
    normalization: f64,
}

impl VarianceScorer {
    pub fn new(config: &ScoringConfig) -> Self {
        Self {
            normalization: config.normalization,
        }
    }

    pub fn normalization(&self) -> f64 {
        self.normalization
    }

    /// Score an arbitrary snapshot, full or not.
    ///
    /// Returns 0.0 for an empty snapshot.
    pub fn score_readings<'a, I>(&self, readings: I) -> f64
    where
        I: IntoIterator<Item = &'a Reading>,
        I::IntoIter: Clone,
    {
        let readings = readings.into_iter();

        // Integer sum keeps the mean exact for uniform windows.
        let mut count: u64 = 0;
        let mut sum: i128 = 0;
        for reading in readings.clone() {
            for value in reading.iter() {
                sum += value as i128;
                count += 1;
            }
        }

        if count == 0 {
            return 0.0;
        }

        let n = count as f64;
        let mean = sum as f64 / n;
        let sum_sq: f64 = readings
            .flat_map(|r| r.iter())
            .map(|v| {
                let d = v as f64 - mean;
                d * d
            })
            .sum();

        (sum_sq / n) / self.normalization
    }
}

impl Default for VarianceScorer {
    fn default() -> Self {
        Self::new(&ScoringConfig::default())
    }
}

impl AnomalyScorer for VarianceScorer {
    fn score(&self, window: &SlidingWindow) -> Option<f64> {
        if !window.is_full() {
            return None;
        }
        Some(self.score_readings(window.iter()))
    }

    fn name(&self) -> &'static str {
        "variance"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn full_window(capacity: usize, reading: Reading) -> SlidingWindow {
        let mut window = SlidingWindow::new(capacity);
        for _ in 0..capacity {
            window.push(reading.clone());
        }
        window
    }

    #[test]
    fn test_no_score_while_filling() {
        let scorer = VarianceScorer::default();
        let mut window = SlidingWindow::new(5);
        for _ in 0..4 {
            window.push(Reading::uniform(1200, 4));
            assert!(scorer.score(&window).is_none());
        }
        window.push(Reading::uniform(1200, 4));
        assert!(scorer.score(&window).is_some());
    }

    #[test]
    fn test_zero_variance_is_exactly_zero() {
        let scorer = VarianceScorer::default();
        for value in [0, 1, 1200, 987_654_321] {
            let window = full_window(100, Reading::uniform(value, 4));
            assert_eq!(scorer.score(&window), Some(0.0));
        }
    }

    #[test]
    fn test_known_variance() {
        // Values 1..=4 have population variance 1.25.
        let scorer = VarianceScorer::new(&ScoringConfig { normalization: 1.0 });
        let window = full_window(3, Reading::new(vec![1, 2, 3, 4]));
        assert_relative_eq!(scorer.score(&window).unwrap(), 1.25);
    }

    #[test]
    fn test_normalization_applied() {
        let scorer = VarianceScorer::default();
        // Two values 0 and 2000: variance 1_000_000, normalized 1000.
        let window = full_window(1, Reading::new(vec![0, 2000]));
        assert_relative_eq!(scorer.score(&window).unwrap(), 1000.0);
    }

    #[test]
    fn test_single_outlier_reading() {
        let scorer = VarianceScorer::default();
        let mut window = full_window(100, Reading::uniform(1200, 4));
        window.push(Reading::new(vec![2000, 100, 1200, 1200]));

        // mean 1199.25, sum of squared deviations 1_849_775 over 400 values
        assert_relative_eq!(scorer.score(&window).unwrap(), 4.6244375, epsilon = 1e-9);
    }

    #[test]
    fn test_score_is_deterministic() {
        let scorer = VarianceScorer::default();
        let mut window = SlidingWindow::new(50);
        for i in 0..50 {
            window.push(Reading::new(vec![1000 + i * 7, 1300 - i * 3, 900 + (i % 5), 1200]));
        }
        let a = scorer.score(&window).unwrap();
        let b = scorer.score(&window).unwrap();
        assert_eq!(a.to_bits(), b.to_bits());
    }

    #[test]
    fn test_score_readings_empty() {
        let scorer = VarianceScorer::default();
        let empty: Vec<Reading> = Vec::new();
        assert_eq!(scorer.score_readings(&empty), 0.0);
    }
}
