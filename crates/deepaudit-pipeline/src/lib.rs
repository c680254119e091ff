//! # deepaudit-pipeline — Evaluation Orchestration
//!
//! Composes the watermark, metrics, and attack crates against an injected
//! [`EmbeddingStore`] and produces one [`EvaluationReport`] per run.
//!
//! ## Phases
//!
//! 1. **Recognition performance**: genuine and bounded impostor scores feed
//!    a [`MetricsEvaluator`](deepaudit_metrics::MetricsEvaluator).
//! 2. **Watermark impact**: imperceptibility and robustness on a sample of
//!    identities.
//! 3. **Attack resilience**: all six attacks against the first two
//!    identities in store order.
//! 4. **Aggregation**: metrics summary, impact statistics, attack records,
//!    and a post-attack integrity audit.
//!
//! A failing phase is logged and recorded; later phases still run and the
//! report is marked [`ReportStatus::Partial`].
//!
//! ## Supporting operations
//!
//! - [`enrollment`]: template averaging and Clean/Protected enrollment.
//! - [`integrity`]: tamper audit and duplicate-enrollment scan.
//! - [`matching`]: probe identification against Protected vectors.
//!
//! [`EmbeddingStore`]: deepaudit_core::EmbeddingStore

pub mod enrollment;
pub mod integrity;
pub mod matching;
pub mod pipeline;
pub mod report;

pub use enrollment::{enroll, enroll_synthetic, template_from_samples, MIN_TEMPLATE_SAMPLES};
pub use integrity::{
    audit_integrity, scan_duplicates, DuplicatePair, IntegrityAudit, IntegrityEntry,
    SimilarityClass,
};
pub use matching::{identify, Identification};
pub use pipeline::EvaluationPipeline;
pub use report::{
    EvaluationReport, Phase, PhaseIssue, PhaseOutcome, ReportStatus, RunId, WatermarkImpactEntry,
    WatermarkImpactReport,
};
