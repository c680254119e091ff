//! # Robustness Subcommand
//!
//! Watermarks a synthetic embedding for one identity and measures survival
//! under each requested noise magnitude.

use anyhow::{Context, Result};
use clap::Args;
use deepaudit_core::{DeepAuditConfig, EmbeddingVector, Identity};
use deepaudit_watermark::{RobustnessReport, WatermarkManager};
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use serde::Serialize;

use crate::write_json;

/// Arguments for the `deepaudit robustness` subcommand.
#[derive(Args, Debug)]
pub struct RobustnessArgs {
    /// Identity whose watermark is tested.
    #[arg(long)]
    pub identity: String,

    /// Comma-separated perturbation magnitudes.
    #[arg(long, value_delimiter = ',', default_values_t = [0.01, 0.05, 0.1])]
    pub magnitudes: Vec<f64>,

    /// Embedding dimension. Defaults to the config.
    #[arg(long)]
    pub dim: Option<usize>,

    /// Seed for the embedding and noise draws.
    #[arg(long)]
    pub seed: Option<u64>,
}

/// Sweep output.
#[derive(Debug, Serialize)]
pub struct RobustnessSweep {
    /// Tested identity.
    pub identity: Identity,
    /// Embedding dimension.
    pub dimension: usize,
    /// Confidence threshold the trials were judged against.
    pub threshold: f64,
    /// Confidence of the unperturbed watermarked vector.
    pub nominal_confidence: f64,
    /// One report per magnitude, in request order.
    pub reports: Vec<RobustnessReport>,
}

/// Execute the robustness subcommand. Always returns exit code 0.
pub fn run_robustness(args: &RobustnessArgs, config: DeepAuditConfig) -> Result<u8> {
    let sweep = sweep(args, config)?;
    for report in &sweep.reports {
        tracing::info!(
            magnitude = report.perturbation_magnitude,
            survival_rate = report.survival_rate,
            "robustness measured"
        );
    }
    write_json(&sweep, None)?;
    Ok(0)
}

/// Run the sweep.
pub fn sweep(args: &RobustnessArgs, mut config: DeepAuditConfig) -> Result<RobustnessSweep> {
    if let Some(dim) = args.dim {
        config.embedding_dim = dim;
    }
    if args.seed.is_some() {
        config.seed = args.seed;
    }
    config.validate().context("invalid configuration")?;

    let identity = Identity::new(&args.identity)?;
    let manager = WatermarkManager::from_config(&config)?;
    let mut rng = match config.seed {
        Some(seed) => ChaCha20Rng::seed_from_u64(seed),
        None => ChaCha20Rng::from_entropy(),
    };
    let embedding = EmbeddingVector::random(config.embedding_dim, &mut rng)?;
    let nominal_confidence = manager.nominal_confidence(embedding.as_slice(), &identity)?;

    let reports = args
        .magnitudes
        .iter()
        .map(|&magnitude| {
            manager
                .robustness(
                    embedding.as_slice(),
                    &identity,
                    magnitude,
                    config.watermark.robustness_trials,
                    &mut rng,
                )
                .with_context(|| format!("robustness at magnitude {magnitude} failed"))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(RobustnessSweep {
        identity,
        dimension: config.embedding_dim,
        threshold: manager.confidence_threshold(),
        nominal_confidence,
        reports,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(magnitudes: Vec<f64>) -> RobustnessArgs {
        RobustnessArgs {
            identity: "alice".to_string(),
            magnitudes,
            dim: Some(128),
            seed: Some(3),
        }
    }

    #[test]
    fn one_report_per_magnitude() {
        let sweep = sweep(&args(vec![0.0, 0.05, 0.1]), DeepAuditConfig::default()).unwrap();
        assert_eq!(sweep.reports.len(), 3);
        assert_eq!(sweep.dimension, 128);
        for report in &sweep.reports {
            assert_eq!(report.per_trial_confidence.len(), 10);
        }
        assert!((sweep.reports[0].original_confidence - sweep.nominal_confidence).abs() < 1e-12);
    }

    #[test]
    fn strong_watermark_survives_light_noise() {
        let mut config = DeepAuditConfig::default();
        config.watermark.strength = 1.0;
        let sweep = sweep(&args(vec![0.01]), config).unwrap();
        assert_eq!(sweep.reports[0].survival_rate, 1.0);
    }

    #[test]
    fn negative_magnitude_rejected() {
        assert!(sweep(&args(vec![-0.1]), DeepAuditConfig::default()).is_err());
    }

    #[test]
    fn blank_identity_rejected() {
        let mut bad = args(vec![0.01]);
        bad.identity = "   ".to_string();
        assert!(sweep(&bad, DeepAuditConfig::default()).is_err());
    }
}
