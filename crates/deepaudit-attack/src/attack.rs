//! # Attack Taxonomy
//!
//! [`Attack`] is a closed enumeration: one variant per attack kind, each
//! carrying its own parameters. Dispatch happens through a single
//! exhaustive `match` in the simulator, so adding a kind is a compile error
//! until every consumer handles it.

use std::collections::BTreeMap;
use std::fmt;

use deepaudit_core::{DeepAuditError, EmbeddingVector, Identity, Result};
use serde::{Deserialize, Serialize};

/// Self-similarity below which perturbation-style attacks are detectable.
pub const SELF_SIMILARITY_DETECTION_THRESHOLD: f64 = 0.95;

/// Similarity-to-original below which a morph is detectable.
pub const MORPH_DETECTION_THRESHOLD: f64 = 0.9;

/// Fieldless tag naming an attack kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttackKind {
    /// Small isotropic noise.
    SubtlePerturbation,
    /// Victim's vector overwritten with the attacker's.
    Replacement,
    /// A fraction of dimensions overwritten.
    PartialModification,
    /// Two identities' vectors swapped.
    LabelFlip,
    /// Victim iteratively pulled toward a target.
    GradientMorph,
    /// Hidden trigger pattern mixed in.
    BackdoorTrigger,
}

impl AttackKind {
    /// All kinds in canonical execution order.
    pub const ALL: [AttackKind; 6] = [
        AttackKind::SubtlePerturbation,
        AttackKind::Replacement,
        AttackKind::PartialModification,
        AttackKind::LabelFlip,
        AttackKind::GradientMorph,
        AttackKind::BackdoorTrigger,
    ];

    /// Stable snake_case name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SubtlePerturbation => "subtle_perturbation",
            Self::Replacement => "replacement",
            Self::PartialModification => "partial_modification",
            Self::LabelFlip => "label_flip",
            Self::GradientMorph => "gradient_morph",
            Self::BackdoorTrigger => "backdoor_trigger",
        }
    }
}

impl fmt::Display for AttackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One fully parameterized attack.
#[derive(Debug, Clone, PartialEq)]
pub enum Attack {
    /// `new = normalize(old + N(0, 1) · magnitude)`.
    SubtlePerturbation {
        /// Identity whose Protected vector is perturbed.
        victim: Identity,
        /// Noise scale.
        magnitude: f64,
    },
    /// `new[victim] = old[attacker]`.
    Replacement {
        /// Identity whose vector is copied.
        attacker: Identity,
        /// Identity whose vector is overwritten.
        victim: Identity,
    },
    /// Overwrite `⌊dim · ratio⌋` distinct random dimensions with `N(0, 0.5)`.
    PartialModification {
        /// Identity whose Protected vector is modified.
        victim: Identity,
        /// Fraction of dimensions to overwrite.
        ratio: f64,
    },
    /// Swap two identities' Protected vectors.
    LabelFlip {
        /// First identity.
        first: Identity,
        /// Second identity.
        second: Identity,
    },
    /// Repeat `current = normalize(current + unit(target - current) · step_size)`.
    GradientMorph {
        /// Identity whose Protected vector is morphed.
        victim: Identity,
        /// Embedding the victim is pulled toward.
        target: EmbeddingVector,
        /// Move length per step.
        step_size: f64,
        /// Number of steps.
        steps: usize,
    },
    /// `new = normalize(old + strength · trigger)`.
    BackdoorTrigger {
        /// Identity whose Protected vector receives the trigger.
        victim: Identity,
        /// Raw trigger pattern (not necessarily unit-norm).
        trigger: Vec<f64>,
        /// Trigger scale.
        strength: f64,
    },
}

fn non_negative(name: &'static str, value: f64) -> Result<()> {
    if !(value.is_finite() && value >= 0.0) {
        return Err(DeepAuditError::invalid_parameter(
            name,
            format!("must be a non-negative finite number, got {value}"),
        ));
    }
    Ok(())
}

fn distinct(first: &Identity, second: &Identity) -> Result<()> {
    if first == second {
        return Err(DeepAuditError::invalid_parameter(
            "targets",
            format!("attack needs two distinct identities, got {first} twice"),
        ));
    }
    Ok(())
}

impl Attack {
    /// The kind tag of this attack.
    pub fn kind(&self) -> AttackKind {
        match self {
            Self::SubtlePerturbation { .. } => AttackKind::SubtlePerturbation,
            Self::Replacement { .. } => AttackKind::Replacement,
            Self::PartialModification { .. } => AttackKind::PartialModification,
            Self::LabelFlip { .. } => AttackKind::LabelFlip,
            Self::GradientMorph { .. } => AttackKind::GradientMorph,
            Self::BackdoorTrigger { .. } => AttackKind::BackdoorTrigger,
        }
    }

    /// Identities whose Protected vectors this attack writes or reads.
    ///
    /// The first entry is the primary victim.
    pub fn targets(&self) -> Vec<Identity> {
        match self {
            Self::SubtlePerturbation { victim, .. }
            | Self::PartialModification { victim, .. }
            | Self::GradientMorph { victim, .. }
            | Self::BackdoorTrigger { victim, .. } => vec![victim.clone()],
            Self::Replacement { attacker, victim } => vec![victim.clone(), attacker.clone()],
            Self::LabelFlip { first, second } => vec![first.clone(), second.clone()],
        }
    }

    /// Scalar parameters, for the attack record.
    pub fn parameters(&self) -> BTreeMap<String, f64> {
        let mut params = BTreeMap::new();
        match self {
            Self::SubtlePerturbation { magnitude, .. } => {
                params.insert("magnitude".to_string(), *magnitude);
            }
            Self::PartialModification { ratio, .. } => {
                params.insert("ratio".to_string(), *ratio);
            }
            Self::GradientMorph {
                step_size, steps, ..
            } => {
                params.insert("step_size".to_string(), *step_size);
                params.insert("steps".to_string(), *steps as f64);
            }
            Self::BackdoorTrigger { strength, .. } => {
                params.insert("strength".to_string(), *strength);
            }
            Self::Replacement { .. } | Self::LabelFlip { .. } => {}
        }
        params
    }

    /// Reject parameters outside their valid range.
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::SubtlePerturbation { magnitude, .. } => non_negative("magnitude", *magnitude),
            Self::Replacement { attacker, victim } => distinct(victim, attacker),
            Self::PartialModification { ratio, .. } => {
                if !(0.0..=1.0).contains(ratio) {
                    return Err(DeepAuditError::invalid_parameter(
                        "ratio",
                        format!("must lie in [0, 1], got {ratio}"),
                    ));
                }
                Ok(())
            }
            Self::LabelFlip { first, second } => distinct(first, second),
            Self::GradientMorph { step_size, .. } => non_negative("step_size", *step_size),
            Self::BackdoorTrigger {
                trigger, strength, ..
            } => {
                non_negative("strength", *strength)?;
                if trigger.iter().any(|x| !x.is_finite()) {
                    return Err(DeepAuditError::invalid_parameter(
                        "trigger",
                        "contains non-finite components",
                    ));
                }
                Ok(())
            }
        }
    }
}
