//! # Metrics Evaluator
//!
//! Two insertion-ordered score sequences and the error rates derived from
//! them.
//!
//! ## EER grid
//!
//! The EER scan visits `resolution` evenly spaced thresholds
//! `t_i = i / (resolution - 1)` for `i = 0..resolution`, in ascending order,
//! and keeps the first threshold with the smallest `|FAR - FRR|`. The true
//! crossing may fall between grid points; the result feeds summary reports,
//! not live accept/reject decisions.

use deepaudit_core::{DeepAuditConfig, DeepAuditError, Result};
use serde::{Deserialize, Serialize};

/// Result of the EER grid search.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EerEstimate {
    /// Smallest `|FAR - FRR|` found on the grid.
    pub value: f64,
    /// First grid threshold achieving it.
    pub threshold: f64,
    /// FAR at that threshold.
    pub far: f64,
    /// FRR at that threshold.
    pub frr: f64,
}

/// Count and spread of one score class. All zero when the class is empty.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassStatistics {
    /// Number of scores.
    pub count: usize,
    /// Smallest score.
    pub min: f64,
    /// Largest score.
    pub max: f64,
    /// Arithmetic mean.
    pub mean: f64,
}

impl ClassStatistics {
    fn from_scores(scores: &[f64]) -> Self {
        if scores.is_empty() {
            return Self {
                count: 0,
                min: 0.0,
                max: 0.0,
                mean: 0.0,
            };
        }
        Self {
            count: scores.len(),
            min: scores.iter().copied().fold(f64::INFINITY, f64::min),
            max: scores.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            mean: scores.iter().sum::<f64>() / scores.len() as f64,
        }
    }
}

/// Snapshot of every metric at one operating threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSummary {
    /// Threshold FAR/FRR/HTER were computed at.
    pub threshold: f64,
    /// False acceptance rate.
    pub far: f64,
    /// False rejection rate.
    pub frr: f64,
    /// Half total error rate.
    pub hter: f64,
    /// Equal error rate (minimal grid gap).
    pub eer: f64,
    /// Threshold at which the EER was found.
    pub eer_threshold: f64,
    /// Genuine score statistics.
    pub genuine: ClassStatistics,
    /// Impostor score statistics.
    pub impostor: ClassStatistics,
}

/// Accumulates genuine/impostor similarity scores.
#[derive(Debug, Clone)]
pub struct MetricsEvaluator {
    genuine: Vec<f64>,
    impostor: Vec<f64>,
    operating_threshold: f64,
    grid_resolution: usize,
}

impl MetricsEvaluator {
    /// Create an evaluator.
    ///
    /// `operating_threshold` must lie in `[0, 1]` and `grid_resolution` must
    /// be at least 2.
    pub fn new(operating_threshold: f64, grid_resolution: usize) -> Result<Self> {
        if !(0.0..=1.0).contains(&operating_threshold) {
            return Err(DeepAuditError::invalid_parameter(
                "operating_threshold",
                format!("must lie in [0, 1], got {operating_threshold}"),
            ));
        }
        if grid_resolution < 2 {
            return Err(DeepAuditError::invalid_parameter(
                "grid_resolution",
                format!("must be at least 2, got {grid_resolution}"),
            ));
        }
        Ok(Self {
            genuine: Vec::new(),
            impostor: Vec::new(),
            operating_threshold,
            grid_resolution,
        })
    }

    /// Create an evaluator from the metrics section of a run configuration.
    pub fn from_config(config: &DeepAuditConfig) -> Result<Self> {
        Self::new(
            config.metrics.operating_threshold,
            config.metrics.eer_grid_resolution,
        )
    }

    fn admit(score: f64) -> Result<f64> {
        if !score.is_finite() {
            return Err(DeepAuditError::InvalidScore(score));
        }
        if !(-1.0..=1.0).contains(&score) {
            tracing::warn!(score, "similarity score outside [-1, 1]; clamping");
        }
        Ok(score.clamp(-1.0, 1.0))
    }

    /// Record a same-identity comparison score.
    ///
    /// Non-finite scores are rejected; finite scores outside `[-1, 1]` are
    /// clamped.
    pub fn add_genuine(&mut self, score: f64) -> Result<()> {
        self.genuine.push(Self::admit(score)?);
        Ok(())
    }

    /// Record a different-identity comparison score.
    pub fn add_impostor(&mut self, score: f64) -> Result<()> {
        self.impostor.push(Self::admit(score)?);
        Ok(())
    }

    /// Genuine scores in insertion order.
    pub fn genuine_scores(&self) -> &[f64] {
        &self.genuine
    }

    /// Impostor scores in insertion order.
    pub fn impostor_scores(&self) -> &[f64] {
        &self.impostor
    }

    /// Threshold used by [`summary`](Self::summary).
    pub fn operating_threshold(&self) -> f64 {
        self.operating_threshold
    }

    /// Number of EER grid points.
    pub fn grid_resolution(&self) -> usize {
        self.grid_resolution
    }

    /// Share of impostor scores at or above `threshold`. `0.0` when empty.
    pub fn far(&self, threshold: f64) -> f64 {
        if self.impostor.is_empty() {
            return 0.0;
        }
        let accepted = self.impostor.iter().filter(|s| **s >= threshold).count();
        accepted as f64 / self.impostor.len() as f64
    }

    /// Share of genuine scores below `threshold`. `0.0` when empty.
    pub fn frr(&self, threshold: f64) -> f64 {
        if self.genuine.is_empty() {
            return 0.0;
        }
        let rejected = self.genuine.iter().filter(|s| **s < threshold).count();
        rejected as f64 / self.genuine.len() as f64
    }

    /// Mean of FAR and FRR.
    pub fn hter(&self, threshold: f64) -> f64 {
        (self.far(threshold) + self.frr(threshold)) / 2.0
    }

    fn grid(&self) -> impl Iterator<Item = f64> {
        let last = (self.grid_resolution - 1) as f64;
        (0..self.grid_resolution).map(move |i| i as f64 / last)
    }

    /// Scan the threshold grid for the smallest `|FAR - FRR|`.
    ///
    /// Ties keep the lowest threshold.
    pub fn eer(&self) -> EerEstimate {
        let mut best = EerEstimate {
            value: f64::INFINITY,
            threshold: 0.0,
            far: 0.0,
            frr: 0.0,
        };
        for threshold in self.grid() {
            let far = self.far(threshold);
            let frr = self.frr(threshold);
            let gap = (far - frr).abs();
            if gap < best.value {
                best = EerEstimate {
                    value: gap,
                    threshold,
                    far,
                    frr,
                };
            }
        }
        best
    }

    /// Every metric at the current operating threshold.
    pub fn summary(&self) -> MetricsSummary {
        let threshold = self.operating_threshold;
        let eer = self.eer();
        MetricsSummary {
            threshold,
            far: self.far(threshold),
            frr: self.frr(threshold),
            hter: self.hter(threshold),
            eer: eer.value,
            eer_threshold: eer.threshold,
            genuine: ClassStatistics::from_scores(&self.genuine),
            impostor: ClassStatistics::from_scores(&self.impostor),
        }
    }

    /// Adopt `threshold` as the operating threshold and summarize at it.
    pub fn summary_at(&mut self, threshold: f64) -> Result<MetricsSummary> {
        if !(0.0..=1.0).contains(&threshold) {
            return Err(DeepAuditError::invalid_parameter(
                "threshold",
                format!("must lie in [0, 1], got {threshold}"),
            ));
        }
        self.operating_threshold = threshold;
        Ok(self.summary())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn evaluator() -> MetricsEvaluator {
        MetricsEvaluator::new(0.4, 100).unwrap()
    }

    fn loaded(genuine: &[f64], impostor: &[f64]) -> MetricsEvaluator {
        let mut m = evaluator();
        for s in genuine {
            m.add_genuine(*s).unwrap();
        }
        for s in impostor {
            m.add_impostor(*s).unwrap();
        }
        m
    }

    #[test]
    fn constructor_validates() {
        assert!(MetricsEvaluator::new(1.2, 100).is_err());
        assert!(MetricsEvaluator::new(0.4, 1).is_err());
    }

    #[test]
    fn empty_lists_give_zero_rates() {
        let m = evaluator();
        assert_eq!(m.far(0.5), 0.0);
        assert_eq!(m.frr(0.5), 0.0);
        assert_eq!(m.hter(0.5), 0.0);
        let eer = m.eer();
        assert_eq!(eer.value, 0.0);
        assert_eq!(eer.threshold, 0.0);
    }

    #[test]
    fn hter_with_one_empty_list_is_half_the_other_rate() {
        let m = loaded(&[], &[0.5, 0.1]);
        assert_eq!(m.far(0.4), 0.5);
        assert_eq!(m.frr(0.4), 0.0);
        assert_eq!(m.hter(0.4), 0.25);

        let m = loaded(&[0.3, 0.9], &[]);
        assert_eq!(m.frr(0.4), 0.5);
        assert_eq!(m.hter(0.4), 0.25);
    }

    #[test]
    fn far_counts_at_or_above_threshold() {
        let m = loaded(&[], &[0.2, 0.4, 0.6]);
        assert!((m.far(0.4) - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn frr_counts_strictly_below_threshold() {
        let m = loaded(&[0.4, 0.5, 0.3], &[]);
        assert!((m.frr(0.4) - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn eer_scenario_finds_separating_threshold() {
        let m = loaded(&[0.9, 0.8, 0.7], &[0.2, 0.3, 0.6]);
        let eer = m.eer();
        let gap_at_half = (m.far(0.5) - m.frr(0.5)).abs();

        assert!(eer.value <= gap_at_half);
        assert_eq!(eer.value, 0.0);
        // First grid point above the largest impostor score (0.6).
        assert_eq!(eer.threshold, 60.0 / 99.0);
        assert!(eer.threshold > 0.6 && eer.threshold <= 0.7);
        assert_eq!(eer.far, 0.0);
        assert_eq!(eer.frr, 0.0);
    }

    #[test]
    fn eer_ties_keep_lowest_threshold() {
        // Every genuine score is 1.0 and no impostors: gap is 0 at t = 0.
        let m = loaded(&[1.0, 1.0], &[]);
        assert_eq!(m.eer().threshold, 0.0);
    }

    #[test]
    fn eer_grid_respects_resolution() {
        let mut m = MetricsEvaluator::new(0.4, 3).unwrap();
        m.add_genuine(0.9).unwrap();
        m.add_impostor(0.7).unwrap();
        // Grid is {0.0, 0.5, 1.0}. The gap is 1 everywhere:
        // t = 0.0 and 0.5 → FAR 1, FRR 0; t = 1.0 → FAR 0, FRR 1.
        let eer = m.eer();
        assert_eq!(eer.value, 1.0);
        assert_eq!(eer.threshold, 0.0);
    }

    #[test]
    fn non_finite_scores_rejected() {
        let mut m = evaluator();
        assert!(matches!(
            m.add_genuine(f64::NAN),
            Err(DeepAuditError::InvalidScore(_))
        ));
        assert!(m.add_impostor(f64::INFINITY).is_err());
        assert!(m.genuine_scores().is_empty());
    }

    #[test]
    fn out_of_range_scores_clamped() {
        let mut m = evaluator();
        m.add_genuine(1.0000001).unwrap();
        m.add_impostor(-1.5).unwrap();
        assert_eq!(m.genuine_scores(), &[1.0]);
        assert_eq!(m.impostor_scores(), &[-1.0]);
    }

    #[test]
    fn summary_collects_statistics() {
        let m = loaded(&[0.9, 0.7], &[0.1, 0.5]);
        let s = m.summary();
        assert_eq!(s.threshold, 0.4);
        assert_eq!(s.far, 0.5);
        assert_eq!(s.frr, 0.0);
        assert_eq!(s.hter, 0.25);
        assert_eq!(s.genuine.count, 2);
        assert_eq!(s.genuine.min, 0.7);
        assert_eq!(s.genuine.max, 0.9);
        assert!((s.genuine.mean - 0.8).abs() < 1e-12);
        assert_eq!(s.impostor.count, 2);
        assert!((s.impostor.mean - 0.3).abs() < 1e-12);
    }

    #[test]
    fn summary_of_empty_evaluator_is_all_zero() {
        let s = evaluator().summary();
        assert_eq!(s.genuine.count, 0);
        assert_eq!(s.genuine.mean, 0.0);
        assert_eq!(s.impostor.max, 0.0);
        assert_eq!(s.hter, 0.0);
    }

    #[test]
    fn summary_at_updates_operating_threshold() {
        let mut m = loaded(&[0.9, 0.7], &[0.1, 0.5]);
        let s = m.summary_at(0.8).unwrap();
        assert_eq!(s.threshold, 0.8);
        assert_eq!(s.frr, 0.5);
        assert_eq!(m.operating_threshold(), 0.8);
        assert_eq!(m.summary().threshold, 0.8);
        assert!(m.summary_at(2.0).is_err());
    }

    mod proptests {
        use crate::evaluator::*;
        use proptest::prelude::*;

        proptest! {
            /// Rates stay within [0, 1] and FAR/FRR move monotonically in t.
            #[test]
            fn rates_bounded_and_monotone(
                genuine in prop::collection::vec(-1.0f64..=1.0, 0..32),
                impostor in prop::collection::vec(-1.0f64..=1.0, 0..32),
                a in 0.0f64..=1.0,
                b in 0.0f64..=1.0,
            ) {
                let mut m = MetricsEvaluator::new(0.5, 50).unwrap();
                for s in &genuine { m.add_genuine(*s).unwrap(); }
                for s in &impostor { m.add_impostor(*s).unwrap(); }
                let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
                prop_assert!((0.0..=1.0).contains(&m.far(lo)));
                prop_assert!((0.0..=1.0).contains(&m.frr(lo)));
                prop_assert!(m.far(hi) <= m.far(lo));
                prop_assert!(m.frr(hi) >= m.frr(lo));
                let eer = m.eer();
                prop_assert!(eer.value <= (m.far(0.0) - m.frr(0.0)).abs());
            }
        }
    }
}
