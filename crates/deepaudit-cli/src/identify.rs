//! # Identify Subcommand
//!
//! Loads an embedding database dump and a probe embedding, then reports the
//! best-matching enrolled identity together with that template's integrity.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use deepaudit_core::{DeepAuditConfig, EmbeddingVector};
use deepaudit_pipeline::{identify, Identification};
use deepaudit_watermark::WatermarkManager;

use crate::{build_store, infer_dimension, load_enrollments, write_json};

/// Arguments for the `deepaudit identify` subcommand.
#[derive(Args, Debug)]
pub struct IdentifyArgs {
    /// JSON enrollment file, optionally carrying stored Protected vectors.
    #[arg(long)]
    pub input: PathBuf,

    /// JSON file holding the probe embedding as a bare array of numbers.
    #[arg(long)]
    pub probe: PathBuf,

    /// Write the identification here instead of stdout.
    #[arg(long)]
    pub output: Option<PathBuf>,
}

/// Execute the identify subcommand.
///
/// Returns exit code: 0 when the probe matched an intact template, 1 when
/// nothing matched or the matched template was tampered with.
pub fn run_identify(args: &IdentifyArgs, config: DeepAuditConfig) -> Result<u8> {
    let identification = identify_probe(args, config)?;
    write_json(&identification, args.output.as_deref())?;

    match (&identification.candidate, identification.matched) {
        (Some(candidate), true) if identification.tampered != Some(true) => {
            tracing::info!(
                identity = %candidate,
                score = identification.score,
                "probe identified"
            );
            Ok(0)
        }
        _ => {
            tracing::warn!(
                score = identification.score,
                matched = identification.matched,
                tampered = ?identification.tampered,
                "probe not accepted"
            );
            Ok(1)
        }
    }
}

/// Load the dump and the probe, then identify.
pub fn identify_probe(args: &IdentifyArgs, mut config: DeepAuditConfig) -> Result<Identification> {
    let records = load_enrollments(&args.input)?;
    config.embedding_dim = infer_dimension(&records)?;
    let manager = WatermarkManager::from_config(&config)?;
    let store = build_store(&records, &config, &manager)?;
    let probe = load_probe(&args.probe)?;

    let pipeline = &config.pipeline;
    identify(&store, &probe, pipeline.match_threshold, pipeline.tamper_threshold)
        .context("identification failed")
}

fn load_probe(path: &Path) -> Result<EmbeddingVector> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let values: Vec<f64> = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse probe embedding in {}", path.display()))?;
    EmbeddingVector::new(values).with_context(|| format!("invalid probe in {}", path.display()))
}
