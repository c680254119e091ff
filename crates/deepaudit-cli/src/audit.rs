//! # Audit Subcommand
//!
//! Loads an embedding database dump, then runs the duplicate-enrollment scan
//! over Clean references and the tamper audit over Protected vectors.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use deepaudit_core::DeepAuditConfig;
use deepaudit_pipeline::{
    audit_integrity, scan_duplicates, DuplicatePair, IntegrityAudit, SimilarityClass,
};
use deepaudit_watermark::WatermarkManager;
use serde::Serialize;

use crate::{build_store, infer_dimension, load_enrollments, write_json};

/// Arguments for the `deepaudit audit` subcommand.
#[derive(Args, Debug)]
pub struct AuditArgs {
    /// JSON enrollment file, optionally carrying stored Protected vectors.
    #[arg(long)]
    pub input: PathBuf,

    /// Write the findings here instead of stdout.
    #[arg(long)]
    pub output: Option<PathBuf>,
}

/// Findings of one audit.
#[derive(Debug, Serialize)]
pub struct AuditFindings {
    /// Every compared pair of Clean references.
    pub duplicates: Vec<DuplicatePair>,
    /// Tamper verdicts.
    pub integrity: IntegrityAudit,
}

impl AuditFindings {
    /// Whether nothing suspicious was found.
    pub fn is_clean(&self) -> bool {
        self.integrity.is_clean()
            && !self
                .duplicates
                .iter()
                .any(|p| p.class == SimilarityClass::ProbablySamePerson)
    }
}

/// Execute the audit subcommand.
///
/// Returns exit code: 0 when clean, 1 when tampering, unknown identities,
/// or probable duplicates were found.
pub fn run_audit(args: &AuditArgs, config: DeepAuditConfig) -> Result<u8> {
    let findings = audit(args, config)?;
    write_json(&findings, args.output.as_deref())?;

    let tampered = findings.integrity.tampered().count();
    if findings.is_clean() {
        tracing::info!(identities = findings.integrity.entries.len(), "audit clean");
        Ok(0)
    } else {
        tracing::warn!(
            tampered,
            unknown = findings.integrity.unknown.len(),
            "audit found problems"
        );
        Ok(1)
    }
}

/// Load the dump and compute the findings.
pub fn audit(args: &AuditArgs, mut config: DeepAuditConfig) -> Result<AuditFindings> {
    let records = load_enrollments(&args.input)?;
    config.embedding_dim = infer_dimension(&records)?;
    let manager = WatermarkManager::from_config(&config)?;
    let store = build_store(&records, &config, &manager)?;

    let pipeline = &config.pipeline;
    Ok(AuditFindings {
        duplicates: scan_duplicates(&store, pipeline.duplicate_threshold),
        integrity: audit_integrity(&store, &manager, pipeline.tamper_threshold),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dump(body: &str) -> (tempfile::TempDir, AuditArgs) {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("db.json");
        std::fs::write(&input, body).unwrap();
        (dir, AuditArgs { input, output: None })
    }

    #[test]
    fn fresh_database_is_clean() {
        let (_dir, args) = dump(
            r#"[{"identity": "alice", "embedding": [1, 0, 0, 0]},
                {"identity": "bob", "embedding": [0, 1, 0, 0]}]"#,
        );
        let findings = audit(&args, DeepAuditConfig::default()).unwrap();
        assert!(findings.is_clean());
        assert_eq!(findings.duplicates.len(), 1);
        assert_eq!(findings.duplicates[0].class, SimilarityClass::Distinct);
    }

    #[test]
    fn replaced_template_is_reported() {
        let (_dir, args) = dump(
            r#"[{"identity": "alice", "embedding": [1, 0, 0, 0], "protected": [0, 1, 0, 0]},
                {"identity": "bob", "embedding": [0, 1, 0, 0]}]"#,
        );
        let code = run_audit(&args, DeepAuditConfig::default()).unwrap();
        assert_eq!(code, 1);

        let findings = audit(&args, DeepAuditConfig::default()).unwrap();
        let tampered: Vec<String> = findings
            .integrity
            .tampered()
            .map(|id| id.to_string())
            .collect();
        assert_eq!(tampered, vec!["alice".to_string()]);
    }

    #[test]
    fn duplicate_enrollment_is_reported() {
        let (_dir, args) = dump(
            r#"[{"identity": "alice", "embedding": [1, 0, 0, 0]},
                {"identity": "alias", "embedding": [1, 0.01, 0, 0]}]"#,
        );
        let findings = audit(&args, DeepAuditConfig::default()).unwrap();
        assert_eq!(
            findings.duplicates[0].class,
            SimilarityClass::ProbablySamePerson
        );
        assert!(!findings.is_clean());
    }
}
