//! # Watermark Impact Analysis
//!
//! Records pairs of recognition similarities (before watermarking, after
//! watermarking) and summarizes how far watermarking moved them. A change
//! below [`IMPERCEPTIBLE_THRESHOLD`] is considered invisible to matching.

use serde::{Deserialize, Serialize};

/// Absolute similarity change below which watermarking is imperceptible.
pub const IMPERCEPTIBLE_THRESHOLD: f64 = 0.01;

/// Share of comparisons that must stay within the threshold (percent).
const IMPERCEPTIBLE_SHARE_PERCENT: f64 = 95.0;

/// Summary of similarity deviations introduced by watermarking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpactStatistics {
    /// Number of recorded comparisons.
    pub comparisons: usize,
    /// Mean absolute deviation.
    pub mean_deviation: f64,
    /// Population standard deviation of the absolute deviations.
    pub std_deviation: f64,
    /// Largest absolute deviation.
    pub max_deviation: f64,
    /// Smallest absolute deviation.
    pub min_deviation: f64,
    /// Percentage of comparisons whose deviation exceeds the threshold.
    pub percentage_changed: f64,
    /// The threshold used.
    pub imperceptible_threshold: f64,
    /// More than 95 % of comparisons stayed within the threshold.
    pub imperceptible: bool,
}

/// Accumulates (original, watermarked) similarity pairs.
#[derive(Debug, Clone, Default)]
pub struct WatermarkImpactAnalysis {
    original: Vec<f64>,
    watermarked: Vec<f64>,
}

impl WatermarkImpactAnalysis {
    /// Create an empty analysis.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one comparison's similarity without and with the watermark.
    pub fn add_comparison(&mut self, original_score: f64, watermarked_score: f64) {
        self.original.push(original_score);
        self.watermarked.push(watermarked_score);
    }

    /// Number of recorded comparisons.
    pub fn len(&self) -> usize {
        self.original.len()
    }

    /// Whether nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.original.is_empty()
    }

    /// Deviation statistics, or `None` when nothing was recorded.
    pub fn analyze(&self) -> Option<ImpactStatistics> {
        if self.original.is_empty() {
            return None;
        }
        let deviations: Vec<f64> = self
            .original
            .iter()
            .zip(&self.watermarked)
            .map(|(o, w)| (o - w).abs())
            .collect();
        let n = deviations.len() as f64;
        let mean = deviations.iter().sum::<f64>() / n;
        let variance = deviations.iter().map(|d| (d - mean).powi(2)).sum::<f64>() / n;
        let max = deviations.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let min = deviations.iter().copied().fold(f64::INFINITY, f64::min);
        let changed = deviations
            .iter()
            .filter(|d| **d > IMPERCEPTIBLE_THRESHOLD)
            .count() as f64;
        let percentage_changed = changed / n * 100.0;

        Some(ImpactStatistics {
            comparisons: deviations.len(),
            mean_deviation: mean,
            std_deviation: variance.sqrt(),
            max_deviation: max,
            min_deviation: min,
            percentage_changed,
            imperceptible_threshold: IMPERCEPTIBLE_THRESHOLD,
            imperceptible: 100.0 - percentage_changed > IMPERCEPTIBLE_SHARE_PERCENT,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_analysis_is_none() {
        assert!(WatermarkImpactAnalysis::new().analyze().is_none());
    }

    #[test]
    fn statistics_over_deviations() {
        let mut a = WatermarkImpactAnalysis::new();
        a.add_comparison(1.0, 0.999);
        a.add_comparison(1.0, 0.997);
        let s = a.analyze().unwrap();
        assert_eq!(s.comparisons, 2);
        assert!((s.mean_deviation - 0.002).abs() < 1e-12);
        assert!((s.std_deviation - 0.001).abs() < 1e-12);
        assert!((s.max_deviation - 0.003).abs() < 1e-12);
        assert!((s.min_deviation - 0.001).abs() < 1e-12);
        assert_eq!(s.percentage_changed, 0.0);
        assert!(s.imperceptible);
    }

    #[test]
    fn large_changes_flagged() {
        let mut a = WatermarkImpactAnalysis::new();
        a.add_comparison(1.0, 0.9);
        a.add_comparison(1.0, 1.0);
        let s = a.analyze().unwrap();
        assert_eq!(s.percentage_changed, 50.0);
        assert!(!s.imperceptible);
    }

    #[test]
    fn exactly_ninety_five_percent_is_not_imperceptible() {
        let mut a = WatermarkImpactAnalysis::new();
        a.add_comparison(1.0, 0.5);
        for _ in 0..19 {
            a.add_comparison(1.0, 1.0);
        }
        let s = a.analyze().unwrap();
        assert_eq!(s.percentage_changed, 5.0);
        assert!(!s.imperceptible);

        a.add_comparison(1.0, 1.0);
        assert!(a.analyze().unwrap().imperceptible);
    }
}
