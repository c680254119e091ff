//! # Attack Simulator
//!
//! Executes [`Attack`]s against an injected [`EmbeddingStore`]. Each
//! execution:
//!
//! 1. validates parameters and resolves every target's Protected vector,
//!    failing with `NotFound` before anything is written;
//! 2. computes and writes the new Protected vector(s);
//! 3. appends an [`AttackRecord`] to the simulator's log and returns a copy.
//!
//! The PRNG is injected so runs are reproducible under a fixed seed.

use deepaudit_core::{
    l2_norm, DeepAuditConfig, DeepAuditError, EmbeddingStore, EmbeddingVector, Identity, Result,
    Variant, NORM_EPSILON,
};
use rand::seq::index;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use rand_distr::StandardNormal;

use crate::attack::{
    Attack, AttackKind, MORPH_DETECTION_THRESHOLD, SELF_SIMILARITY_DETECTION_THRESHOLD,
};
use crate::record::{AttackLog, AttackRecord};

/// Standard deviation of the values written by partial modification.
const PARTIAL_MODIFICATION_SIGMA: f64 = 0.5;

/// What a transform produced, before it is turned into a record.
struct Outcome {
    writes: Vec<(Identity, EmbeddingVector)>,
    similarity_to_target: Option<f64>,
}

/// Runs attacks and keeps their records.
#[derive(Debug)]
pub struct AttackSimulator<R = ChaCha20Rng> {
    rng: R,
    log: AttackLog,
}

impl AttackSimulator<ChaCha20Rng> {
    /// Seeded from `config.seed`, or from OS entropy when unset.
    pub fn from_config(config: &DeepAuditConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => ChaCha20Rng::seed_from_u64(seed),
            None => ChaCha20Rng::from_entropy(),
        };
        Self::new(rng)
    }
}

impl<R: Rng> AttackSimulator<R> {
    /// Create a simulator drawing randomness from `rng`.
    pub fn new(rng: R) -> Self {
        Self {
            rng,
            log: AttackLog::new(),
        }
    }

    /// Records of every attack executed so far.
    pub fn log(&self) -> &AttackLog {
        &self.log
    }

    /// Consume the simulator into its log.
    pub fn into_log(self) -> AttackLog {
        self.log
    }

    /// Mutable access to the PRNG, e.g. to draw a trigger pattern.
    pub fn rng_mut(&mut self) -> &mut R {
        &mut self.rng
    }

    /// Execute one attack against `store`.
    pub fn execute<S: EmbeddingStore + ?Sized>(
        &mut self,
        store: &S,
        attack: &Attack,
    ) -> Result<AttackRecord> {
        attack.validate()?;
        let kind = attack.kind();
        let targets = attack.targets();
        let victim = &targets[0];

        // Resolve every target up front so a missing identity aborts cleanly.
        let mut originals = Vec::with_capacity(targets.len());
        for target in &targets {
            originals.push(store.get(target, Variant::Protected)?);
        }
        let original = &originals[0];
        let clean = store.get(victim, Variant::Clean).ok();
        let similarity_before = clean
            .as_ref()
            .map(|c| c.similarity(original))
            .transpose()?;

        let outcome = self.transform(store.dimension(), attack, &originals)?;
        apply_writes(store, &targets, &originals, &outcome.writes)?;

        let updated = outcome
            .writes
            .iter()
            .find(|(identity, _)| identity == victim)
            .map(|(_, v)| v)
            .unwrap_or(original);
        let similarity_to_original = original.similarity(updated)?;
        let similarity_after = clean
            .as_ref()
            .map(|c| c.similarity(updated))
            .transpose()?;

        let detectable = match kind {
            AttackKind::SubtlePerturbation | AttackKind::PartialModification => {
                similarity_to_original < SELF_SIMILARITY_DETECTION_THRESHOLD
            }
            AttackKind::Replacement => true,
            AttackKind::LabelFlip | AttackKind::BackdoorTrigger => false,
            AttackKind::GradientMorph => similarity_to_original < MORPH_DETECTION_THRESHOLD,
        };

        tracing::info!(
            attack = %kind,
            victim = %victim,
            similarity_to_original,
            detectable,
            "attack executed"
        );

        let record = AttackRecord {
            sequence: 0,
            kind,
            targets,
            parameters: attack.parameters(),
            similarity_to_original,
            similarity_before,
            similarity_after,
            similarity_to_target: outcome.similarity_to_target,
            detectable,
        };
        Ok(self.log.append(record).clone())
    }

    fn gaussian(&mut self) -> f64 {
        self.rng.sample(StandardNormal)
    }

    fn transform(
        &mut self,
        dimension: usize,
        attack: &Attack,
        originals: &[EmbeddingVector],
    ) -> Result<Outcome> {
        let old = &originals[0];
        match attack {
            Attack::SubtlePerturbation {
                victim, magnitude, ..
            } => {
                let noisy: Vec<f64> = old
                    .as_slice()
                    .iter()
                    .map(|x| x + self.gaussian() * magnitude)
                    .collect();
                Ok(Outcome {
                    writes: vec![(victim.clone(), EmbeddingVector::new(noisy)?)],
                    similarity_to_target: None,
                })
            }
            Attack::Replacement { victim, .. } => Ok(Outcome {
                writes: vec![(victim.clone(), originals[1].clone())],
                similarity_to_target: None,
            }),
            Attack::PartialModification { victim, ratio } => {
                let dim = old.dim();
                let count = ((dim as f64) * ratio).floor() as usize;
                let mut modified = old.as_slice().to_vec();
                for idx in index::sample(&mut self.rng, dim, count.min(dim)) {
                    modified[idx] = self.gaussian() * PARTIAL_MODIFICATION_SIGMA;
                }
                tracing::debug!(victim = %victim, dims_modified = count, "partial modification");
                Ok(Outcome {
                    writes: vec![(victim.clone(), EmbeddingVector::new(modified)?)],
                    similarity_to_target: None,
                })
            }
            Attack::LabelFlip { first, second } => Ok(Outcome {
                writes: vec![
                    (first.clone(), originals[1].clone()),
                    (second.clone(), originals[0].clone()),
                ],
                similarity_to_target: None,
            }),
            Attack::GradientMorph {
                victim,
                target,
                step_size,
                steps,
            } => {
                target.ensure_dim(dimension)?;
                let mut current = old.as_slice().to_vec();
                for step in 0..*steps {
                    let direction: Vec<f64> = target
                        .as_slice()
                        .iter()
                        .zip(&current)
                        .map(|(t, c)| t - c)
                        .collect();
                    let distance = l2_norm(&direction);
                    if distance < NORM_EPSILON {
                        tracing::debug!(victim = %victim, step, "morph converged on target");
                        break;
                    }
                    let moved: Vec<f64> = current
                        .iter()
                        .zip(&direction)
                        .map(|(c, d)| c + d / distance * step_size)
                        .collect();
                    current = EmbeddingVector::new(moved)?.into_inner();
                }
                let morphed = EmbeddingVector::new(current)?;
                Ok(Outcome {
                    similarity_to_target: Some(morphed.similarity(target)?),
                    writes: vec![(victim.clone(), morphed)],
                })
            }
            Attack::BackdoorTrigger {
                victim,
                trigger,
                strength,
            } => {
                if trigger.len() != dimension {
                    return Err(DeepAuditError::DimensionMismatch {
                        expected: dimension,
                        actual: trigger.len(),
                    });
                }
                let mixed: Vec<f64> = old
                    .as_slice()
                    .iter()
                    .zip(trigger)
                    .map(|(x, t)| x + t * strength)
                    .collect();
                Ok(Outcome {
                    writes: vec![(victim.clone(), EmbeddingVector::new(mixed)?)],
                    similarity_to_target: None,
                })
            }
        }
    }
}

/// Write `writes` in order. If one write fails, targets already written are
/// reset to their pre-attack vectors before the error is returned.
fn apply_writes<S: EmbeddingStore + ?Sized>(
    store: &S,
    targets: &[Identity],
    originals: &[EmbeddingVector],
    writes: &[(Identity, EmbeddingVector)],
) -> Result<()> {
    for (done, (identity, vector)) in writes.iter().enumerate() {
        let Err(error) = store.set(identity, Variant::Protected, vector.clone()) else {
            continue;
        };
        for (written, _) in &writes[..done] {
            let Some(pos) = targets.iter().position(|t| t == written) else {
                continue;
            };
            if let Err(restore) = store.set(written, Variant::Protected, originals[pos].clone()) {
                tracing::error!(identity = %written, error = %restore, "rollback failed");
            }
        }
        tracing::warn!(identity = %identity, error = %error, "attack write failed, rolled back");
        return Err(error);
    }
    Ok(())
}
