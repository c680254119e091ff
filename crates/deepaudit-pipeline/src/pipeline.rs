//! # Evaluation Pipeline
//!
//! Runs the four phases in order against a borrowed store. Each phase
//! function returns `Err` only for phase-level failures; per-identity and
//! per-attack errors are recorded on the phase outcome and the loop
//! continues. [`EvaluationPipeline::run`] never fails.
//!
//! Attacks mutate the store and nothing restores it afterward: the
//! post-attack integrity audit inspects exactly what the attacks left.

use chrono::Utc;
use deepaudit_attack::{Attack, AttackKind, AttackRecord, AttackSimulator};
use deepaudit_core::{
    DeepAuditConfig, DeepAuditError, EmbeddingStore, Identity, Result, Variant,
};
use deepaudit_metrics::{MetricsEvaluator, MetricsSummary};
use deepaudit_watermark::{WatermarkImpactAnalysis, WatermarkManager};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use rand_distr::StandardNormal;

use crate::integrity::audit_integrity;
use crate::report::{
    status_of, EvaluationReport, Phase, PhaseOutcome, RunId, WatermarkImpactEntry,
    WatermarkImpactReport,
};

/// Four-phase evaluation over an injected embedding store.
#[derive(Debug, Clone)]
pub struct EvaluationPipeline {
    config: DeepAuditConfig,
    manager: WatermarkManager,
}

impl EvaluationPipeline {
    /// Build a pipeline around an explicit watermark manager.
    pub fn new(config: DeepAuditConfig, manager: WatermarkManager) -> Result<Self> {
        config.validate()?;
        if manager.dimension() != config.embedding_dim {
            return Err(DeepAuditError::DimensionMismatch {
                expected: config.embedding_dim,
                actual: manager.dimension(),
            });
        }
        Ok(Self { config, manager })
    }

    /// Build a pipeline whose manager comes from `config.watermark`.
    pub fn from_config(config: DeepAuditConfig) -> Result<Self> {
        let manager = WatermarkManager::from_config(&config)?;
        Self::new(config, manager)
    }

    /// The configuration this pipeline runs with.
    pub fn config(&self) -> &DeepAuditConfig {
        &self.config
    }

    /// The watermark manager shared by every phase.
    pub fn manager(&self) -> &WatermarkManager {
        &self.manager
    }

    /// Run all phases, seeding randomness from `config.seed` when set.
    pub fn run<S: EmbeddingStore + ?Sized>(&self, store: &S) -> EvaluationReport {
        let rng = match self.config.seed {
            Some(seed) => ChaCha20Rng::seed_from_u64(seed),
            None => ChaCha20Rng::from_entropy(),
        };
        self.run_with_rng(store, rng)
    }

    /// Run all phases drawing randomness from `rng`.
    pub fn run_with_rng<S, R>(&self, store: &S, mut rng: R) -> EvaluationReport
    where
        S: EmbeddingStore + ?Sized,
        R: Rng,
    {
        let run_id = RunId::new();
        tracing::info!(run_id = %run_id, identities = store.list().len(), "evaluation started");

        let mut phases = Vec::with_capacity(4);

        // Phase 1
        let mut outcome = PhaseOutcome::new(Phase::RecognitionPerformance);
        let mut evaluator = None;
        match self.recognition_phase(store, &mut outcome) {
            Ok(e) => {
                outcome.completed = true;
                evaluator = Some(e);
            }
            Err(e) => fail(&mut outcome, e),
        }
        phases.push(outcome);

        // Phase 2
        let mut outcome = PhaseOutcome::new(Phase::WatermarkImpact);
        let watermark = match self.watermark_phase(store, &mut rng, &mut outcome) {
            Ok(w) => {
                outcome.completed = true;
                w
            }
            Err(e) => {
                fail(&mut outcome, e);
                WatermarkImpactReport::default()
            }
        };
        phases.push(outcome);

        // Phase 3
        let mut outcome = PhaseOutcome::new(Phase::AttackResilience);
        let attacks = match self.attack_phase(store, &mut rng, &mut outcome) {
            Ok(records) => {
                outcome.completed = true;
                records
            }
            Err(e) => {
                fail(&mut outcome, e);
                Vec::new()
            }
        };
        phases.push(outcome);

        // Phase 4
        tracing::info!(phase = %Phase::Aggregation, "phase started");
        let mut outcome = PhaseOutcome::new(Phase::Aggregation);
        let performance: Option<MetricsSummary> = evaluator.as_ref().map(MetricsEvaluator::summary);
        let (genuine_scores, impostor_scores) = evaluator
            .map(|e| (e.genuine_scores().to_vec(), e.impostor_scores().to_vec()))
            .unwrap_or_default();
        let integrity = audit_integrity(store, &self.manager, self.config.pipeline.tamper_threshold);
        outcome.completed = true;
        phases.push(outcome);

        let status = status_of(&phases);
        tracing::info!(run_id = %run_id, ?status, attacks = attacks.len(), "evaluation finished");

        EvaluationReport {
            run_id,
            generated_at: Utc::now(),
            config: self.config.clone(),
            status,
            phases,
            performance,
            genuine_scores,
            impostor_scores,
            watermark,
            attacks,
            integrity: Some(integrity),
        }
    }

    /// Genuine: Clean vs Protected per identity. Impostor: each identity's
    /// Protected vector against the next `max_impostor_pairs` identities.
    fn recognition_phase<S: EmbeddingStore + ?Sized>(
        &self,
        store: &S,
        outcome: &mut PhaseOutcome,
    ) -> Result<MetricsEvaluator> {
        tracing::info!(phase = %Phase::RecognitionPerformance, "phase started");
        let identities = store.list();
        let mut evaluator = MetricsEvaluator::from_config(&self.config)?;
        if identities.is_empty() {
            // Rates over empty score lists are defined as zero.
            outcome.skip(
                "store",
                DeepAuditError::InsufficientData("no enrolled identities".to_string()),
            );
            return Ok(evaluator);
        }

        for identity in &identities {
            let score = store.get(identity, Variant::Clean).and_then(|clean| {
                let protected = store.get(identity, Variant::Protected)?;
                clean.similarity(&protected)
            });
            match score.and_then(|s| evaluator.add_genuine(s)) {
                Ok(()) => {}
                Err(e) => outcome.skip(identity, e),
            }
        }

        let max_pairs = self.config.pipeline.max_impostor_pairs;
        for (i, first) in identities.iter().enumerate() {
            let end = identities.len().min(i + 1 + max_pairs);
            for second in &identities[i + 1..end] {
                let score = store.get(first, Variant::Protected).and_then(|a| {
                    let b = store.get(second, Variant::Protected)?;
                    a.similarity(&b)
                });
                match score.and_then(|s| evaluator.add_impostor(s)) {
                    Ok(()) => {}
                    Err(e) => outcome.skip(format!("{first}/{second}"), e),
                }
            }
        }

        tracing::info!(
            genuine = evaluator.genuine_scores().len(),
            impostor = evaluator.impostor_scores().len(),
            "recognition scores collected"
        );
        Ok(evaluator)
    }

    fn watermark_phase<S, R>(
        &self,
        store: &S,
        rng: &mut R,
        outcome: &mut PhaseOutcome,
    ) -> Result<WatermarkImpactReport>
    where
        S: EmbeddingStore + ?Sized,
        R: Rng,
    {
        tracing::info!(phase = %Phase::WatermarkImpact, "phase started");
        let sample: Vec<Identity> = store
            .list()
            .into_iter()
            .take(self.config.pipeline.watermark_sample_size)
            .collect();
        if sample.is_empty() {
            return Err(DeepAuditError::InsufficientData(
                "no identities to watermark".to_string(),
            ));
        }

        let wm = &self.config.watermark;
        let mut analysis = WatermarkImpactAnalysis::new();
        let mut entries = Vec::with_capacity(sample.len());
        for identity in sample {
            let measured = store.get(&identity, Variant::Clean).and_then(|clean| {
                let marked = self.manager.embed(clean.as_slice(), &identity)?;
                let clean_similarity = clean.similarity(&marked)?;
                let robustness = self.manager.robustness(
                    clean.as_slice(),
                    &identity,
                    wm.robustness_magnitude,
                    wm.robustness_trials,
                    &mut *rng,
                )?;
                Ok((clean_similarity, robustness))
            });
            match measured {
                Ok((clean_similarity, robustness)) => {
                    tracing::debug!(
                        identity = %identity,
                        clean_similarity,
                        survival_rate = robustness.survival_rate,
                        "watermark measured"
                    );
                    analysis.add_comparison(1.0, clean_similarity);
                    entries.push(WatermarkImpactEntry {
                        identity,
                        clean_similarity,
                        robustness,
                    });
                }
                Err(e) => outcome.skip(&identity, e),
            }
        }

        Ok(WatermarkImpactReport {
            entries,
            statistics: analysis.analyze(),
        })
    }

    /// First identity in store order is the victim, second the attacker.
    fn attack_phase<S, R>(
        &self,
        store: &S,
        rng: &mut R,
        outcome: &mut PhaseOutcome,
    ) -> Result<Vec<AttackRecord>>
    where
        S: EmbeddingStore + ?Sized,
        R: Rng,
    {
        tracing::info!(phase = %Phase::AttackResilience, "phase started");
        let identities = store.list();
        let [victim, attacker, ..] = identities.as_slice() else {
            return Err(DeepAuditError::InsufficientData(format!(
                "attack phase needs two identities, store has {}",
                identities.len()
            )));
        };

        let mut simulator = AttackSimulator::new(rng);
        for kind in AttackKind::ALL {
            let executed = self
                .build_attack(store, kind, victim, attacker, &mut simulator)
                .and_then(|attack| simulator.execute(store, &attack));
            if let Err(e) = executed {
                outcome.skip(kind, e);
            }
        }
        Ok(simulator.into_log().into_records())
    }

    /// Attacks are built just before they run so a morph targets the
    /// attacker's vector as earlier attacks left it.
    fn build_attack<S, R>(
        &self,
        store: &S,
        kind: AttackKind,
        victim: &Identity,
        attacker: &Identity,
        simulator: &mut AttackSimulator<R>,
    ) -> Result<Attack>
    where
        S: EmbeddingStore + ?Sized,
        R: Rng,
    {
        let params = &self.config.attacks;
        let victim = victim.clone();
        Ok(match kind {
            AttackKind::SubtlePerturbation => Attack::SubtlePerturbation {
                victim,
                magnitude: params.perturbation_magnitude,
            },
            AttackKind::Replacement => Attack::Replacement {
                attacker: attacker.clone(),
                victim,
            },
            AttackKind::PartialModification => Attack::PartialModification {
                victim,
                ratio: params.modification_ratio,
            },
            AttackKind::LabelFlip => Attack::LabelFlip {
                first: victim,
                second: attacker.clone(),
            },
            AttackKind::GradientMorph => Attack::GradientMorph {
                victim,
                target: store.get(attacker, Variant::Protected)?,
                step_size: params.gradient_step_size,
                steps: params.gradient_steps,
            },
            AttackKind::BackdoorTrigger => {
                let rng = simulator.rng_mut();
                let trigger = (0..store.dimension())
                    .map(|_| rng.sample::<f64, _>(StandardNormal))
                    .collect();
                Attack::BackdoorTrigger {
                    victim,
                    trigger,
                    strength: params.trigger_strength,
                }
            }
        })
    }
}

fn fail(outcome: &mut PhaseOutcome, error: DeepAuditError) {
    tracing::warn!(phase = %outcome.phase, error = %error, "phase failed");
    outcome.completed = false;
    outcome.error = Some(error.to_string());
}
