//! # Evaluation Report
//!
//! Pure data produced once per pipeline run and handed to whatever renders
//! it. Every section is optional or possibly empty: a failed phase leaves
//! its section blank and the report is marked [`ReportStatus::Partial`].

use chrono::{DateTime, Utc};
use deepaudit_attack::AttackRecord;
use deepaudit_core::{DeepAuditConfig, Identity};
use deepaudit_metrics::MetricsSummary;
use deepaudit_watermark::{ImpactStatistics, RobustnessReport};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::integrity::IntegrityAudit;

/// Unique identifier for one evaluation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(pub Uuid);

impl RunId {
    /// Generate a new random run identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Access the inner UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The four pipeline phases, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Genuine/impostor scoring.
    RecognitionPerformance,
    /// Imperceptibility and robustness of watermarks.
    WatermarkImpact,
    /// The six attacks.
    AttackResilience,
    /// Report assembly and post-attack audit.
    Aggregation,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::RecognitionPerformance => "recognition_performance",
            Self::WatermarkImpact => "watermark_impact",
            Self::AttackResilience => "attack_resilience",
            Self::Aggregation => "aggregation",
        };
        f.write_str(name)
    }
}

/// A non-fatal problem inside a phase: one identity or attack skipped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseIssue {
    /// What was skipped (an identity, a pair, or an attack kind).
    pub subject: String,
    /// Error message.
    pub reason: String,
}

/// How one phase went.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseOutcome {
    /// Which phase.
    pub phase: Phase,
    /// Whether the phase ran to completion.
    pub completed: bool,
    /// Phase-level failure, if it did not complete.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Items skipped while the phase kept going.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<PhaseIssue>,
}

impl PhaseOutcome {
    pub(crate) fn new(phase: Phase) -> Self {
        Self {
            phase,
            completed: false,
            error: None,
            issues: Vec::new(),
        }
    }

    pub(crate) fn skip(&mut self, subject: impl std::fmt::Display, reason: impl std::fmt::Display) {
        tracing::warn!(phase = %self.phase, subject = %subject, reason = %reason, "skipped");
        self.issues.push(PhaseIssue {
            subject: subject.to_string(),
            reason: reason.to_string(),
        });
    }

    /// Completed with nothing skipped.
    pub fn is_clean(&self) -> bool {
        self.completed && self.issues.is_empty()
    }
}

/// Overall run status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    /// Every phase completed and nothing was skipped.
    Complete,
    /// Something failed or was skipped; sections may be missing.
    Partial,
}

/// Watermark measurements for one sampled identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatermarkImpactEntry {
    /// Sampled identity.
    pub identity: Identity,
    /// Cosine between the Clean vector and its freshly watermarked copy.
    pub clean_similarity: f64,
    /// Survival under noise.
    pub robustness: RobustnessReport,
}

/// Phase 2 output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WatermarkImpactReport {
    /// Per-identity measurements.
    pub entries: Vec<WatermarkImpactEntry>,
    /// Aggregate deviation statistics; `None` when nothing was measured.
    pub statistics: Option<ImpactStatistics>,
}

impl WatermarkImpactReport {
    /// Mean survival rate over the sampled identities.
    pub fn mean_survival_rate(&self) -> Option<f64> {
        if self.entries.is_empty() {
            return None;
        }
        let total: f64 = self.entries.iter().map(|e| e.robustness.survival_rate).sum();
        Some(total / self.entries.len() as f64)
    }
}

/// Everything one pipeline run produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    /// Run identifier.
    pub run_id: RunId,
    /// When the report was assembled.
    pub generated_at: DateTime<Utc>,
    /// Configuration the run used.
    pub config: DeepAuditConfig,
    /// `Complete` iff every phase outcome is clean.
    pub status: ReportStatus,
    /// One outcome per phase, in execution order.
    pub phases: Vec<PhaseOutcome>,
    /// Metrics at the operating threshold; `None` if phase 1 failed.
    pub performance: Option<MetricsSummary>,
    /// Genuine scores in insertion order.
    pub genuine_scores: Vec<f64>,
    /// Impostor scores in insertion order.
    pub impostor_scores: Vec<f64>,
    /// Phase 2 output.
    pub watermark: WatermarkImpactReport,
    /// Attack records in execution order.
    pub attacks: Vec<AttackRecord>,
    /// Post-attack integrity audit.
    pub integrity: Option<IntegrityAudit>,
}

impl EvaluationReport {
    /// Outcome of one phase.
    pub fn phase(&self, phase: Phase) -> Option<&PhaseOutcome> {
        self.phases.iter().find(|p| p.phase == phase)
    }

    /// Whether every phase completed cleanly.
    pub fn is_complete(&self) -> bool {
        self.status == ReportStatus::Complete
    }

    /// Number of attacks flagged detectable.
    pub fn detectable_attacks(&self) -> usize {
        self.attacks.iter().filter(|r| r.detectable).count()
    }
}

pub(crate) fn status_of(phases: &[PhaseOutcome]) -> ReportStatus {
    if phases.iter().all(PhaseOutcome::is_clean) {
        ReportStatus::Complete
    } else {
        ReportStatus::Partial
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_ids_are_unique() {
        assert_ne!(RunId::new(), RunId::new());
    }

    #[test]
    fn status_is_partial_when_anything_skipped() {
        let mut done = PhaseOutcome::new(Phase::RecognitionPerformance);
        done.completed = true;
        assert_eq!(status_of(&[done.clone()]), ReportStatus::Complete);

        let mut skipped = PhaseOutcome::new(Phase::WatermarkImpact);
        skipped.completed = true;
        skipped.skip("alice", "dimension mismatch");
        assert_eq!(status_of(&[done.clone(), skipped]), ReportStatus::Partial);

        let failed = PhaseOutcome::new(Phase::AttackResilience);
        assert_eq!(status_of(&[done, failed]), ReportStatus::Partial);
    }

    #[test]
    fn phase_outcome_serializes_compactly() {
        let mut outcome = PhaseOutcome::new(Phase::Aggregation);
        outcome.completed = true;
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["phase"], "aggregation");
        assert!(json.get("error").is_none());
        assert!(json.get("issues").is_none());
    }

    #[test]
    fn mean_survival_rate_of_empty_impact_is_none() {
        assert_eq!(WatermarkImpactReport::default().mean_survival_rate(), None);
    }
}
