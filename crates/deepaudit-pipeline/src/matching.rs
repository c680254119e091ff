//! # Probe Identification
//!
//! Finds the enrolled identity whose Protected vector best matches a probe,
//! then reports whether that identity's stored vector still agrees with its
//! Clean reference. A match against a tampered template is flagged rather
//! than trusted.

use deepaudit_core::{EmbeddingStore, EmbeddingVector, Identity, Result, Variant};
use serde::{Deserialize, Serialize};

/// Outcome of identifying one probe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identification {
    /// Best-scoring identity, if the store held any comparable vector.
    pub candidate: Option<Identity>,
    /// Cosine between the probe and the candidate's Protected vector.
    pub score: f64,
    /// `score > match_threshold`.
    pub matched: bool,
    /// Whether the candidate's Protected vector drifted from its Clean
    /// reference. `None` when unmatched or no Clean reference exists.
    pub tampered: Option<bool>,
}

/// Identify `probe` against every Protected vector in `store`.
///
/// Fails only if the probe's dimension does not match the store.
pub fn identify<S: EmbeddingStore + ?Sized>(
    store: &S,
    probe: &EmbeddingVector,
    match_threshold: f64,
    tamper_threshold: f64,
) -> Result<Identification> {
    probe.ensure_dim(store.dimension())?;

    let mut best: Option<(Identity, EmbeddingVector, f64)> = None;
    for identity in store.list() {
        let Ok(stored) = store.get(&identity, Variant::Protected) else {
            continue;
        };
        let score = probe.similarity(&stored)?;
        tracing::trace!(identity = %identity, score, "probe compared");
        if best.as_ref().map_or(true, |(_, _, s)| score > *s) {
            best = Some((identity, stored, score));
        }
    }

    let Some((identity, stored, score)) = best else {
        return Ok(Identification {
            candidate: None,
            score: 0.0,
            matched: false,
            tampered: None,
        });
    };

    let matched = score > match_threshold;
    let tampered = if matched {
        store
            .get(&identity, Variant::Clean)
            .ok()
            .map(|clean| clean.similarity(&stored))
            .transpose()?
            .map(|s| s < tamper_threshold)
    } else {
        None
    };
    if tampered == Some(true) {
        tracing::warn!(identity = %identity, "probe matched a tampered template");
    }

    Ok(Identification {
        candidate: Some(identity),
        score,
        matched,
        tampered,
    })
}
