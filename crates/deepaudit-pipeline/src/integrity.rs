//! # Integrity Audit and Duplicate Scan
//!
//! Post-hoc checks over the whole store:
//!
//! - [`audit_integrity`] compares each identity's Protected vector with its
//!   Clean reference. Watermarking alone moves a vector by well under 1 %,
//!   so a similarity below the tamper threshold (default 0.99) means
//!   something else changed it. Protected vectors with no Clean reference
//!   are reported as unknown identities.
//! - [`scan_duplicates`] looks for pairs of Clean references similar enough
//!   to be the same person enrolled twice.

use deepaudit_core::{
    DeepAuditError, EmbeddingStore, EmbeddingVector, Identity, Result, Variant,
};
use deepaudit_watermark::WatermarkManager;
use serde::{Deserialize, Serialize};

/// Similarity above which two Clean references get [`SimilarityClass::HighSimilarity`].
pub const HIGH_SIMILARITY_THRESHOLD: f64 = 0.7;

/// Similarity above which two Clean references get [`SimilarityClass::MaybeSimilar`].
pub const MAYBE_SIMILAR_THRESHOLD: f64 = 0.5;

/// Audit verdict for one identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegrityEntry {
    /// Audited identity.
    pub identity: Identity,
    /// Cosine between the Clean and Protected vectors.
    pub clean_similarity: f64,
    /// Watermark confidence of the Protected vector.
    pub watermark_confidence: f64,
    /// `clean_similarity < tamper_threshold`.
    pub tampered: bool,
}

/// Result of auditing a whole store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegrityAudit {
    /// Threshold the entries were judged against.
    pub tamper_threshold: f64,
    /// One entry per identity holding both variants, in store order.
    pub entries: Vec<IntegrityEntry>,
    /// Identities with a Protected vector but no Clean reference.
    pub unknown: Vec<Identity>,
    /// Identities that could not be audited, with the reason.
    pub skipped: Vec<(Identity, String)>,
}

impl IntegrityAudit {
    /// Identities judged tampered.
    pub fn tampered(&self) -> impl Iterator<Item = &Identity> {
        self.entries
            .iter()
            .filter(|e| e.tampered)
            .map(|e| &e.identity)
    }

    /// No tampering, no unknown identities, nothing skipped.
    pub fn is_clean(&self) -> bool {
        self.unknown.is_empty() && self.skipped.is_empty() && self.tampered().next().is_none()
    }

    /// Verdict for one identity, if it was audited.
    pub fn entry(&self, identity: &Identity) -> Option<&IntegrityEntry> {
        self.entries.iter().find(|e| &e.identity == identity)
    }
}

/// Audit every identity in `store`.
///
/// Per-identity failures are logged and listed in `skipped`; the scan
/// continues.
pub fn audit_integrity<S: EmbeddingStore + ?Sized>(
    store: &S,
    manager: &WatermarkManager,
    tamper_threshold: f64,
) -> IntegrityAudit {
    let mut audit = IntegrityAudit {
        tamper_threshold,
        entries: Vec::new(),
        unknown: Vec::new(),
        skipped: Vec::new(),
    };

    for identity in store.list() {
        let clean = match store.get(&identity, Variant::Clean) {
            Ok(v) => v,
            Err(DeepAuditError::NotFound { .. }) => {
                tracing::warn!(identity = %identity, "protected vector without clean reference");
                audit.unknown.push(identity);
                continue;
            }
            Err(e) => {
                tracing::warn!(identity = %identity, error = %e, "integrity audit skipped identity");
                audit.skipped.push((identity, e.to_string()));
                continue;
            }
        };
        match audit_one(store, manager, &identity, &clean, tamper_threshold) {
            Ok(entry) => {
                if entry.tampered {
                    tracing::warn!(
                        identity = %identity,
                        clean_similarity = entry.clean_similarity,
                        "identity tampered"
                    );
                }
                audit.entries.push(entry);
            }
            Err(e) => {
                tracing::warn!(identity = %identity, error = %e, "integrity audit skipped identity");
                audit.skipped.push((identity, e.to_string()));
            }
        }
    }
    audit
}

fn audit_one<S: EmbeddingStore + ?Sized>(
    store: &S,
    manager: &WatermarkManager,
    identity: &Identity,
    clean: &EmbeddingVector,
    tamper_threshold: f64,
) -> Result<IntegrityEntry> {
    let protected = store.get(identity, Variant::Protected)?;
    let clean_similarity = clean.similarity(&protected)?;
    let watermark_confidence = manager.extract(protected.as_slice(), identity)?.confidence;
    Ok(IntegrityEntry {
        identity: identity.clone(),
        clean_similarity,
        watermark_confidence,
        tampered: clean_similarity < tamper_threshold,
    })
}

/// How alike two enrolled references are.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimilarityClass {
    /// Above the duplicate threshold.
    ProbablySamePerson,
    /// Above 0.7.
    HighSimilarity,
    /// Above 0.5.
    MaybeSimilar,
    /// Everything else.
    Distinct,
}

impl SimilarityClass {
    /// Classify `similarity` given the duplicate threshold.
    pub fn classify(similarity: f64, duplicate_threshold: f64) -> Self {
        if similarity > duplicate_threshold {
            Self::ProbablySamePerson
        } else if similarity > HIGH_SIMILARITY_THRESHOLD {
            Self::HighSimilarity
        } else if similarity > MAYBE_SIMILAR_THRESHOLD {
            Self::MaybeSimilar
        } else {
            Self::Distinct
        }
    }
}

/// One compared pair of Clean references.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicatePair {
    /// Earlier identity in store order.
    pub first: Identity,
    /// Later identity in store order.
    pub second: Identity,
    /// Cosine between their Clean vectors.
    pub similarity: f64,
    /// Classification of `similarity`.
    pub class: SimilarityClass,
}

/// Compare every pair of Clean references, in store order.
///
/// Identities without a Clean vector are left out.
pub fn scan_duplicates<S: EmbeddingStore + ?Sized>(
    store: &S,
    duplicate_threshold: f64,
) -> Vec<DuplicatePair> {
    let references: Vec<(Identity, EmbeddingVector)> = store
        .list()
        .into_iter()
        .filter_map(|id| {
            let clean = store.get(&id, Variant::Clean).ok()?;
            Some((id, clean))
        })
        .collect();

    let mut pairs = Vec::new();
    for (i, (first, a)) in references.iter().enumerate() {
        for (second, b) in &references[i + 1..] {
            let similarity = match a.similarity(b) {
                Ok(s) => s,
                Err(e) => {
                    tracing::warn!(first = %first, second = %second, error = %e, "pair skipped");
                    continue;
                }
            };
            let class = SimilarityClass::classify(similarity, duplicate_threshold);
            if class == SimilarityClass::ProbablySamePerson {
                tracing::warn!(first = %first, second = %second, similarity, "probable duplicate enrollment");
            }
            pairs.push(DuplicatePair {
                first: first.clone(),
                second: second.clone(),
                similarity,
                class,
            });
        }
    }
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrollment::enroll;
    use deepaudit_core::InMemoryEmbeddingStore;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    const DIM: usize = 128;

    fn id(s: &str) -> Identity {
        Identity::new(s).unwrap()
    }

    fn setup(names: &[&str]) -> (InMemoryEmbeddingStore, WatermarkManager) {
        let store = InMemoryEmbeddingStore::new(DIM);
        let mgr = WatermarkManager::new(DIM, 0.01, 0.4).unwrap();
        let mut rng = ChaCha20Rng::seed_from_u64(11);
        for name in names {
            let clean = EmbeddingVector::random(DIM, &mut rng).unwrap();
            enroll(&store, &mgr, &id(name), clean, false).unwrap();
        }
        (store, mgr)
    }

    #[test]
    fn freshly_enrolled_store_is_clean() {
        let (store, mgr) = setup(&["alice", "bob"]);
        let audit = audit_integrity(&store, &mgr, 0.99);
        assert_eq!(audit.entries.len(), 2);
        assert!(audit.is_clean());
        for entry in &audit.entries {
            assert!(entry.clean_similarity > 0.999);
        }
    }

    #[test]
    fn overwritten_protected_vector_is_tampered() {
        let (store, mgr) = setup(&["alice", "bob"]);
        let bob = store.get(&id("bob"), Variant::Protected).unwrap();
        store.set(&id("alice"), Variant::Protected, bob).unwrap();

        let audit = audit_integrity(&store, &mgr, 0.99);
        let tampered: Vec<_> = audit.tampered().cloned().collect();
        assert_eq!(tampered, vec![id("alice")]);
        assert!(!audit.is_clean());
        assert!(!audit.entry(&id("bob")).unwrap().tampered);
    }

    #[test]
    fn orphan_protected_vector_is_unknown() {
        let (store, mgr) = setup(&["alice"]);
        let mut rng = ChaCha20Rng::seed_from_u64(12);
        store
            .set(
                &id("intruder"),
                Variant::Protected,
                EmbeddingVector::random(DIM, &mut rng).unwrap(),
            )
            .unwrap();

        let audit = audit_integrity(&store, &mgr, 0.99);
        assert_eq!(audit.unknown, vec![id("intruder")]);
        assert_eq!(audit.entries.len(), 1);
    }

    #[test]
    fn classification_boundaries() {
        assert_eq!(SimilarityClass::classify(0.96, 0.95), SimilarityClass::ProbablySamePerson);
        assert_eq!(SimilarityClass::classify(0.95, 0.95), SimilarityClass::HighSimilarity);
        assert_eq!(SimilarityClass::classify(0.71, 0.95), SimilarityClass::HighSimilarity);
        assert_eq!(SimilarityClass::classify(0.6, 0.95), SimilarityClass::MaybeSimilar);
        assert_eq!(SimilarityClass::classify(0.5, 0.95), SimilarityClass::Distinct);
        assert_eq!(SimilarityClass::classify(-0.3, 0.95), SimilarityClass::Distinct);
    }

    #[test]
    fn duplicate_scan_flags_same_face_twice() {
        let (store, mgr) = setup(&["alice", "bob"]);
        let alice = store.get(&id("alice"), Variant::Clean).unwrap();
        enroll(&store, &mgr, &id("alice_again"), alice, false).unwrap();

        let pairs = scan_duplicates(&store, 0.95);
        assert_eq!(pairs.len(), 3);
        let dup = pairs
            .iter()
            .find(|p| p.class == SimilarityClass::ProbablySamePerson)
            .unwrap();
        assert_eq!((dup.first.clone(), dup.second.clone()), (id("alice"), id("alice_again")));
        // Independent random vectors at dim 128 are far below 0.5.
        let distinct = pairs
            .iter()
            .filter(|p| p.class == SimilarityClass::Distinct)
            .count();
        assert_eq!(distinct, 2);
    }
}
