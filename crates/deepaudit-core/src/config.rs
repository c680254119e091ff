//! # Run Configuration
//!
//! [`DeepAuditConfig`] gathers every tunable of a DeepAudit run: watermark
//! strength and detection threshold, the EER grid resolution, attack
//! parameters, and pipeline sampling bounds. Every field has a default, so a
//! YAML file only needs to name the values it overrides.
//!
//! ```yaml
//! embedding_dim: 128
//! seed: 42
//! watermark:
//!   strength: 0.02
//! attacks:
//!   gradient_steps: 20
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{DeepAuditError, Result};

/// Watermark embedding and detection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatermarkConfig {
    /// Scale of the identity signal added before renormalization.
    pub strength: f64,
    /// Minimum correlation for a watermark to verify.
    pub confidence_threshold: f64,
    /// Noise trials per robustness measurement.
    pub robustness_trials: usize,
    /// Noise scale used by the pipeline's robustness phase.
    pub robustness_magnitude: f64,
}

impl Default for WatermarkConfig {
    fn default() -> Self {
        Self {
            strength: 0.01,
            confidence_threshold: 0.4,
            robustness_trials: 10,
            robustness_magnitude: 0.05,
        }
    }
}

/// Biometric metric settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Accept threshold used for FAR/FRR/HTER in summaries.
    pub operating_threshold: f64,
    /// Number of grid points over [0, 1] scanned for the EER.
    pub eer_grid_resolution: usize,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            operating_threshold: 0.4,
            eer_grid_resolution: 100,
        }
    }
}

/// Default parameters for the attack taxonomy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttackConfig {
    /// Noise scale for subtle perturbation.
    pub perturbation_magnitude: f64,
    /// Fraction of dimensions overwritten by partial modification.
    pub modification_ratio: f64,
    /// Per-step move length for gradient morphing.
    pub gradient_step_size: f64,
    /// Number of gradient morphing steps.
    pub gradient_steps: usize,
    /// Scale of the backdoor trigger pattern.
    pub trigger_strength: f64,
}

impl Default for AttackConfig {
    fn default() -> Self {
        Self {
            perturbation_magnitude: 0.05,
            modification_ratio: 0.3,
            gradient_step_size: 0.01,
            gradient_steps: 10,
            trigger_strength: 0.05,
        }
    }
}

/// Evaluation pipeline bounds and integrity thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Impostor comparisons per identity (against the following identities).
    pub max_impostor_pairs: usize,
    /// Identities sampled for the watermark impact phase.
    pub watermark_sample_size: usize,
    /// Clean-vs-Protected cosine below which an identity counts as tampered.
    pub tamper_threshold: f64,
    /// Probe similarity required to accept an identification.
    pub match_threshold: f64,
    /// Clean-vs-Clean cosine above which two enrollments are likely one person.
    pub duplicate_threshold: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_impostor_pairs: 4,
            watermark_sample_size: 5,
            tamper_threshold: 0.99,
            match_threshold: 0.55,
            duplicate_threshold: 0.95,
        }
    }
}

/// Complete configuration for a DeepAudit run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeepAuditConfig {
    /// Fixed embedding dimension.
    pub embedding_dim: usize,
    /// Seed for every run-level PRNG. `None` draws from OS entropy.
    pub seed: Option<u64>,
    /// Watermark settings.
    pub watermark: WatermarkConfig,
    /// Metric settings.
    pub metrics: MetricsConfig,
    /// Attack defaults.
    pub attacks: AttackConfig,
    /// Pipeline settings.
    pub pipeline: PipelineConfig,
}

impl Default for DeepAuditConfig {
    fn default() -> Self {
        Self {
            embedding_dim: 512,
            seed: None,
            watermark: WatermarkConfig::default(),
            metrics: MetricsConfig::default(),
            attacks: AttackConfig::default(),
            pipeline: PipelineConfig::default(),
        }
    }
}

fn unit_interval(name: &str, value: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&value) {
        return Err(DeepAuditError::Config(format!(
            "{name} must lie in [0, 1], got {value}"
        )));
    }
    Ok(())
}

fn positive(name: &str, value: f64) -> Result<()> {
    if !(value.is_finite() && value > 0.0) {
        return Err(DeepAuditError::Config(format!(
            "{name} must be positive, got {value}"
        )));
    }
    Ok(())
}

impl DeepAuditConfig {
    /// Parse a YAML document and validate it.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self =
            serde_yaml::from_str(yaml).map_err(|e| DeepAuditError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse, and validate a YAML config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        tracing::debug!(path = %path.display(), "loaded configuration file");
        Self::from_yaml_str(&text)
    }

    /// Reject out-of-range values.
    pub fn validate(&self) -> Result<()> {
        if self.embedding_dim == 0 {
            return Err(DeepAuditError::Config(
                "embedding_dim must be at least 1".into(),
            ));
        }

        let wm = &self.watermark;
        positive("watermark.strength", wm.strength)?;
        if wm.strength > 1.0 {
            return Err(DeepAuditError::Config(format!(
                "watermark.strength must not exceed 1, got {}",
                wm.strength
            )));
        }
        unit_interval("watermark.confidence_threshold", wm.confidence_threshold)?;
        if wm.robustness_trials == 0 {
            return Err(DeepAuditError::Config(
                "watermark.robustness_trials must be at least 1".into(),
            ));
        }
        positive("watermark.robustness_magnitude", wm.robustness_magnitude)?;

        unit_interval("metrics.operating_threshold", self.metrics.operating_threshold)?;
        if self.metrics.eer_grid_resolution < 2 {
            return Err(DeepAuditError::Config(
                "metrics.eer_grid_resolution must be at least 2".into(),
            ));
        }

        let at = &self.attacks;
        positive("attacks.perturbation_magnitude", at.perturbation_magnitude)?;
        unit_interval("attacks.modification_ratio", at.modification_ratio)?;
        positive("attacks.gradient_step_size", at.gradient_step_size)?;
        positive("attacks.trigger_strength", at.trigger_strength)?;

        let pl = &self.pipeline;
        unit_interval("pipeline.tamper_threshold", pl.tamper_threshold)?;
        unit_interval("pipeline.match_threshold", pl.match_threshold)?;
        unit_interval("pipeline.duplicate_threshold", pl.duplicate_threshold)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let config = DeepAuditConfig::default();
        config.validate().unwrap();
        assert_eq!(config.embedding_dim, 512);
        assert_eq!(config.metrics.eer_grid_resolution, 100);
        assert_eq!(config.attacks.gradient_steps, 10);
    }

    #[test]
    fn partial_yaml_fills_defaults() {
        let config = DeepAuditConfig::from_yaml_str(
            "embedding_dim: 128\nseed: 9\nwatermark:\n  strength: 0.03\n",
        )
        .unwrap();
        assert_eq!(config.embedding_dim, 128);
        assert_eq!(config.seed, Some(9));
        assert_eq!(config.watermark.strength, 0.03);
        assert_eq!(config.watermark.robustness_trials, 10);
        assert_eq!(config.pipeline, PipelineConfig::default());
    }

    #[test]
    fn out_of_range_values_rejected() {
        assert!(DeepAuditConfig::from_yaml_str("embedding_dim: 0").is_err());
        assert!(DeepAuditConfig::from_yaml_str("watermark:\n  strength: 0").is_err());
        assert!(DeepAuditConfig::from_yaml_str("watermark:\n  confidence_threshold: 1.5").is_err());
        assert!(DeepAuditConfig::from_yaml_str("metrics:\n  eer_grid_resolution: 1").is_err());
        assert!(DeepAuditConfig::from_yaml_str("attacks:\n  modification_ratio: -0.1").is_err());
    }

    #[test]
    fn malformed_yaml_is_config_error() {
        let err = DeepAuditConfig::from_yaml_str("embedding_dim: [").unwrap_err();
        assert!(matches!(err, DeepAuditError::Config(_)));
    }

    #[test]
    fn load_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "embedding_dim: 64").unwrap();
        let config = DeepAuditConfig::load(file.path()).unwrap();
        assert_eq!(config.embedding_dim, 64);
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let err = DeepAuditConfig::load("/nonexistent/deepaudit.yaml").unwrap_err();
        assert!(matches!(err, DeepAuditError::Io(_)));
    }
}
