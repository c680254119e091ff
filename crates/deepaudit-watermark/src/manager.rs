//! # Watermark Manager
//!
//! Stateless embed / extract / verify over fixed-dimension embeddings. A
//! manager is an explicit value built by the caller and passed to whatever
//! needs it; it owns only its configuration.
//!
//! ## Detection
//!
//! `confidence = |⟨candidate / ‖candidate‖, signal⟩|`. For an embedding `v`
//! uncorrelated with the signal, embedding at strength `s` yields a
//! confidence of roughly `s` plus noise of order `1/√dim`; an unrelated
//! identity's signal yields roughly `1/√dim`. Thresholds must be tuned
//! against both.

use deepaudit_core::{
    dot, l2_norm, normalize, DeepAuditConfig, DeepAuditError, EmbeddingVector, Identity, Result,
    NORM_EPSILON,
};
use rand::Rng;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};

use crate::signal::WatermarkSignal;

/// Result of correlating a candidate against an identity's expected signal.
#[derive(Debug, Clone)]
pub struct Extraction {
    /// The regenerated expected signal.
    pub signal: WatermarkSignal,
    /// Absolute correlation in `[0, 1]`.
    pub confidence: f64,
}

/// Outcome of a watermark verification.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Verification {
    /// `confidence >= threshold`.
    pub is_valid: bool,
    /// Absolute correlation in `[0, 1]`.
    pub confidence: f64,
    /// Threshold the decision was made against.
    pub threshold: f64,
}

/// Watermark survival under repeated random perturbation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RobustnessReport {
    /// Confidence of the un-perturbed watermarked embedding.
    pub original_confidence: f64,
    /// Noise scale applied in each trial.
    pub perturbation_magnitude: f64,
    /// Fraction of trials that still verified.
    pub survival_rate: f64,
    /// Confidence after each trial, in trial order.
    pub per_trial_confidence: Vec<f64>,
}

/// Deterministic watermark operations for one embedding dimension.
#[derive(Debug, Clone, PartialEq)]
pub struct WatermarkManager {
    dimension: usize,
    strength: f64,
    confidence_threshold: f64,
}

impl WatermarkManager {
    /// Build a manager.
    ///
    /// `strength` must be in `(0, 1]`, `confidence_threshold` in `[0, 1]`.
    pub fn new(dimension: usize, strength: f64, confidence_threshold: f64) -> Result<Self> {
        if dimension == 0 {
            return Err(DeepAuditError::invalid_parameter(
                "dimension",
                "must be at least 1",
            ));
        }
        if !(strength.is_finite() && strength > 0.0 && strength <= 1.0) {
            return Err(DeepAuditError::invalid_parameter(
                "strength",
                format!("must lie in (0, 1], got {strength}"),
            ));
        }
        if !(0.0..=1.0).contains(&confidence_threshold) {
            return Err(DeepAuditError::invalid_parameter(
                "confidence_threshold",
                format!("must lie in [0, 1], got {confidence_threshold}"),
            ));
        }
        Ok(Self {
            dimension,
            strength,
            confidence_threshold,
        })
    }

    /// Build a manager from the watermark section of a run configuration.
    pub fn from_config(config: &DeepAuditConfig) -> Result<Self> {
        Self::new(
            config.embedding_dim,
            config.watermark.strength,
            config.watermark.confidence_threshold,
        )
    }

    /// Expected embedding dimension.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Embedding strength.
    pub fn strength(&self) -> f64 {
        self.strength
    }

    /// Default verification threshold.
    pub fn confidence_threshold(&self) -> f64 {
        self.confidence_threshold
    }

    /// Regenerate the signal for `identity` at this manager's dimension.
    pub fn generate_signal(&self, identity: &Identity) -> Result<WatermarkSignal> {
        WatermarkSignal::generate(identity, self.dimension)
    }

    fn check_input(&self, values: &[f64]) -> Result<()> {
        if values.len() != self.dimension {
            return Err(DeepAuditError::DimensionMismatch {
                expected: self.dimension,
                actual: values.len(),
            });
        }
        let norm = l2_norm(values);
        if !norm.is_finite() || norm < NORM_EPSILON {
            return Err(DeepAuditError::DegenerateInput { norm });
        }
        Ok(())
    }

    /// `normalize(embedding + strength · signal(identity))`.
    pub fn embed(&self, embedding: &[f64], identity: &Identity) -> Result<EmbeddingVector> {
        self.check_input(embedding)?;
        let signal = self.generate_signal(identity)?;
        let marked: Vec<f64> = embedding
            .iter()
            .zip(signal.as_slice())
            .map(|(e, w)| e + self.strength * w)
            .collect();
        tracing::trace!(identity = %identity, strength = self.strength, "embedded watermark");
        EmbeddingVector::new(marked)
    }

    /// Correlate `candidate` against the signal expected for `identity`.
    pub fn extract(&self, candidate: &[f64], identity: &Identity) -> Result<Extraction> {
        self.check_input(candidate)?;
        let signal = self.generate_signal(identity)?;
        let unit = normalize(candidate)?;
        let confidence = dot(&unit, signal.as_slice())?.abs().min(1.0);
        Ok(Extraction { signal, confidence })
    }

    /// Check whether `candidate` carries `identity`'s watermark.
    ///
    /// `threshold` overrides the configured default when given.
    pub fn verify(
        &self,
        candidate: &[f64],
        identity: &Identity,
        threshold: Option<f64>,
    ) -> Result<Verification> {
        let threshold = threshold.unwrap_or(self.confidence_threshold);
        let Extraction { confidence, .. } = self.extract(candidate, identity)?;
        Ok(Verification {
            is_valid: confidence >= threshold,
            confidence,
            threshold,
        })
    }

    /// Confidence produced by verifying a freshly watermarked `embedding`.
    ///
    /// Any threshold at or below this value verifies the watermarked vector.
    pub fn nominal_confidence(&self, embedding: &[f64], identity: &Identity) -> Result<f64> {
        let marked = self.embed(embedding, identity)?;
        Ok(self.extract(marked.as_slice(), identity)?.confidence)
    }

    /// Embed once, then re-verify under `trials` independent noise draws.
    ///
    /// Each trial adds `N(0, 1) · perturbation_magnitude` per component to the
    /// watermarked vector, renormalizes, and verifies at the default threshold.
    pub fn robustness<R: Rng + ?Sized>(
        &self,
        embedding: &[f64],
        identity: &Identity,
        perturbation_magnitude: f64,
        trials: usize,
        rng: &mut R,
    ) -> Result<RobustnessReport> {
        if !(perturbation_magnitude.is_finite() && perturbation_magnitude >= 0.0) {
            return Err(DeepAuditError::invalid_parameter(
                "perturbation_magnitude",
                format!("must be non-negative, got {perturbation_magnitude}"),
            ));
        }
        if trials == 0 {
            return Err(DeepAuditError::invalid_parameter(
                "trials",
                "must be at least 1",
            ));
        }

        let marked = self.embed(embedding, identity)?;
        let original_confidence = self.verify(marked.as_slice(), identity, None)?.confidence;

        let mut survived = 0usize;
        let mut per_trial_confidence = Vec::with_capacity(trials);
        for _ in 0..trials {
            let perturbed: Vec<f64> = marked
                .as_slice()
                .iter()
                .map(|x| {
                    let noise: f64 = rng.sample(StandardNormal);
                    x + noise * perturbation_magnitude
                })
                .collect();
            let check = self.verify(&perturbed, identity, None)?;
            if check.is_valid {
                survived += 1;
            }
            per_trial_confidence.push(check.confidence);
        }

        let survival_rate = survived as f64 / trials as f64;
        tracing::debug!(
            identity = %identity,
            perturbation_magnitude,
            survival_rate,
            "watermark robustness measured"
        );
        Ok(RobustnessReport {
            original_confidence,
            perturbation_magnitude,
            survival_rate,
            per_trial_confidence,
        })
    }
}
