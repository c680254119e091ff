//! # deepaudit-cli — DeepAudit Command-Line Interface
//!
//! Provides the `deepaudit` binary.
//!
//! ## Subcommands
//!
//! - `deepaudit evaluate`: enroll identities (from a file or synthetic)
//!   and run the four-phase evaluation, printing the report as JSON.
//! - `deepaudit audit`: duplicate-enrollment scan and tamper audit over an
//!   embedding database dump.
//! - `deepaudit robustness`: watermark survival across noise magnitudes.
//! - `deepaudit identify`: best-matching enrolled identity for a probe
//!   embedding, with the matched template's tamper verdict.
//!
//! ```bash
//! deepaudit evaluate --synthetic 10 --dim 128 --seed 7 --output report.json
//! deepaudit audit --input db.json
//! deepaudit identify --input db.json --probe probe.json
//! deepaudit -v robustness --identity alice --magnitudes 0.01,0.05,0.1
//! ```
//!
//! ## Exit codes
//!
//! `0` success, `1` the run found problems (partial report, tampering,
//! duplicates, unmatched probe), `2` operational error.
//!
//! ## Input format
//!
//! A JSON array of records. Several records with the same identity are
//! averaged into one template (at least three samples). `protected`, when
//! present, replaces the stored Protected vector after enrollment so a dump
//! of a live database can be audited.
//!
//! ```json
//! [{"identity": "alice", "embedding": [0.1, 0.2], "protected": [0.1, 0.2]}]
//! ```

pub mod audit;
pub mod evaluate;
pub mod identify;
pub mod robustness;

use std::collections::HashMap;
use std::path::Path;

use anyhow::{bail, Context, Result};
use deepaudit_core::{
    DeepAuditConfig, EmbeddingStore, EmbeddingVector, Identity, InMemoryEmbeddingStore, Variant,
};
use deepaudit_pipeline::{enroll, template_from_samples};
use deepaudit_watermark::WatermarkManager;
use serde::{Deserialize, Serialize};

/// One record of an enrollment file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrollmentRecord {
    /// Identity the sample belongs to.
    pub identity: Identity,
    /// Raw embedding; normalized on load.
    pub embedding: Vec<f64>,
    /// Stored Protected vector to audit instead of a fresh watermark.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protected: Option<Vec<f64>>,
}

/// Load the configuration file, or defaults when none is given.
pub fn load_config(path: Option<&Path>) -> Result<DeepAuditConfig> {
    match path {
        Some(path) => DeepAuditConfig::load(path)
            .with_context(|| format!("failed to load config from {}", path.display())),
        None => Ok(DeepAuditConfig::default()),
    }
}

/// Read an enrollment file.
pub fn load_enrollments(path: &Path) -> Result<Vec<EnrollmentRecord>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let records: Vec<EnrollmentRecord> = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse enrollment records in {}", path.display()))?;
    if records.is_empty() {
        bail!("{} contains no enrollment records", path.display());
    }
    Ok(records)
}

/// Common dimension of the records' embeddings.
pub fn infer_dimension(records: &[EnrollmentRecord]) -> Result<usize> {
    let Some(first) = records.first() else {
        bail!("no enrollment records");
    };
    let dim = first.embedding.len();
    if let Some(bad) = records.iter().find(|r| r.embedding.len() != dim) {
        bail!(
            "embedding for {} has {} components, expected {dim}",
            bad.identity,
            bad.embedding.len()
        );
    }
    Ok(dim)
}

/// Enroll `records` into a fresh store of `config.embedding_dim`.
///
/// Identities keep the order of their first record.
pub fn build_store(
    records: &[EnrollmentRecord],
    config: &DeepAuditConfig,
    manager: &WatermarkManager,
) -> Result<InMemoryEmbeddingStore> {
    let store = InMemoryEmbeddingStore::new(config.embedding_dim);

    let mut order: Vec<&Identity> = Vec::new();
    let mut grouped: HashMap<&Identity, Vec<&EnrollmentRecord>> = HashMap::new();
    for record in records {
        let samples = grouped.entry(&record.identity).or_default();
        if samples.is_empty() {
            order.push(&record.identity);
        }
        samples.push(record);
    }

    for identity in order {
        let samples = &grouped[identity];
        let vectors = samples
            .iter()
            .map(|r| EmbeddingVector::new(r.embedding.clone()))
            .collect::<deepaudit_core::Result<Vec<_>>>()
            .with_context(|| format!("invalid embedding for {identity}"))?;
        let clean = match vectors.as_slice() {
            [single] => single.clone(),
            _ => template_from_samples(&vectors)
                .with_context(|| format!("cannot build template for {identity}"))?,
        };
        enroll(&store, manager, identity, clean, false)
            .with_context(|| format!("failed to enroll {identity}"))?;

        if let Some(protected) = samples.iter().rev().find_map(|r| r.protected.clone()) {
            let protected = EmbeddingVector::with_dim(protected, config.embedding_dim)
                .with_context(|| format!("invalid protected vector for {identity}"))?;
            store
                .set(identity, Variant::Protected, protected)
                .with_context(|| format!("failed to store protected vector for {identity}"))?;
        }
        tracing::debug!(identity = %identity, samples = samples.len(), "enrolled from file");
    }

    tracing::info!(identities = store.len(), "enrollment complete");
    Ok(store)
}

/// Serialize `value` as pretty JSON to `output`, or stdout when `None`.
pub fn write_json<T: Serialize>(value: &T, output: Option<&Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("failed to serialize output")?;
    match output {
        Some(path) => {
            std::fs::write(path, json + "\n")
                .with_context(|| format!("failed to write {}", path.display()))?;
            tracing::info!(path = %path.display(), "output written");
        }
        None => println!("{json}"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &tempfile::TempDir, name: &str, body: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, body).unwrap();
        path
    }

    fn config(dim: usize) -> DeepAuditConfig {
        DeepAuditConfig {
            embedding_dim: dim,
            ..DeepAuditConfig::default()
        }
    }

    #[test]
    fn missing_config_path_uses_defaults() {
        assert_eq!(load_config(None).unwrap(), DeepAuditConfig::default());
    }

    #[test]
    fn config_file_errors_carry_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.yaml");
        let err = load_config(Some(path.as_path())).unwrap_err();
        assert!(format!("{err:#}").contains("absent.yaml"));
    }

    #[test]
    fn empty_enrollment_file_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "empty.json", "[]");
        assert!(load_enrollments(&path).is_err());
    }

    #[test]
    fn inconsistent_dimensions_rejected() {
        let records: Vec<EnrollmentRecord> = serde_json::from_str(
            r#"[{"identity": "a", "embedding": [1, 0]},
                {"identity": "b", "embedding": [1, 0, 0]}]"#,
        )
        .unwrap();
        assert!(infer_dimension(&records).is_err());
    }

    #[test]
    fn repeated_identity_is_averaged_into_template() {
        let records: Vec<EnrollmentRecord> = serde_json::from_str(
            r#"[{"identity": "alice", "embedding": [1, 0, 0]},
                {"identity": "bob", "embedding": [0, 0, 1]},
                {"identity": "alice", "embedding": [0, 1, 0]},
                {"identity": "alice", "embedding": [1, 1, 0]}]"#,
        )
        .unwrap();
        let cfg = config(3);
        let manager = WatermarkManager::from_config(&cfg).unwrap();
        let store = build_store(&records, &cfg, &manager).unwrap();

        let alice = Identity::new("alice").unwrap();
        assert_eq!(store.list(), vec![alice.clone(), Identity::new("bob").unwrap()]);
        let clean = store.get(&alice, Variant::Clean).unwrap();
        let expected = 1.0 / 2f64.sqrt();
        assert!((clean.as_slice()[0] - expected).abs() < 1e-12);
        assert!(clean.as_slice()[2].abs() < 1e-12);
    }

    #[test]
    fn two_samples_are_not_enough_for_a_template() {
        let records: Vec<EnrollmentRecord> = serde_json::from_str(
            r#"[{"identity": "alice", "embedding": [1, 0]},
                {"identity": "alice", "embedding": [0, 1]}]"#,
        )
        .unwrap();
        let cfg = config(2);
        let manager = WatermarkManager::from_config(&cfg).unwrap();
        assert!(build_store(&records, &cfg, &manager).is_err());
    }

    #[test]
    fn supplied_protected_vector_replaces_watermarked_copy() {
        let records: Vec<EnrollmentRecord> = serde_json::from_str(
            r#"[{"identity": "alice", "embedding": [1, 0, 0], "protected": [0, 3, 0]}]"#,
        )
        .unwrap();
        let cfg = config(3);
        let manager = WatermarkManager::from_config(&cfg).unwrap();
        let store = build_store(&records, &cfg, &manager).unwrap();
        let protected = store
            .get(&Identity::new("alice").unwrap(), Variant::Protected)
            .unwrap();
        assert_eq!(protected.as_slice(), &[0.0, 1.0, 0.0]);
    }

    #[test]
    fn write_json_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");
        write_json(&vec![1, 2, 3], Some(path.as_path())).unwrap();
        let back: Vec<i32> = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(back, vec![1, 2, 3]);
    }
}
