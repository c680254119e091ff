//! # Enrollment
//!
//! Writes an identity's Clean reference and its watermarked Protected copy.
//! A Clean vector is written exactly once; replacing an enrolled identity
//! requires an explicit overwrite, which deletes the old entry first.

use deepaudit_core::{
    DeepAuditError, EmbeddingStore, EmbeddingVector, Identity, Result, Variant,
};
use deepaudit_watermark::WatermarkManager;
use rand::Rng;

/// Fewest samples a template may be averaged from.
pub const MIN_TEMPLATE_SAMPLES: usize = 3;

/// Average several captures of one face into a single unit template.
pub fn template_from_samples(samples: &[EmbeddingVector]) -> Result<EmbeddingVector> {
    if samples.len() < MIN_TEMPLATE_SAMPLES {
        return Err(DeepAuditError::InsufficientData(format!(
            "template needs at least {MIN_TEMPLATE_SAMPLES} samples, got {}",
            samples.len()
        )));
    }
    let dim = samples[0].dim();
    let mut sum = vec![0.0; dim];
    for sample in samples {
        sample.ensure_dim(dim)?;
        for (acc, x) in sum.iter_mut().zip(sample.as_slice()) {
            *acc += x;
        }
    }
    let n = samples.len() as f64;
    EmbeddingVector::new(sum.into_iter().map(|x| x / n).collect())
}

/// Enroll `identity` with its Clean reference, returning the Protected copy.
///
/// Fails with [`DeepAuditError::AlreadyEnrolled`] if the identity exists and
/// `overwrite` is false.
pub fn enroll<S: EmbeddingStore + ?Sized>(
    store: &S,
    manager: &WatermarkManager,
    identity: &Identity,
    clean: EmbeddingVector,
    overwrite: bool,
) -> Result<EmbeddingVector> {
    clean.ensure_dim(store.dimension())?;
    let protected = manager.embed(clean.as_slice(), identity)?;

    if store.contains(identity) {
        if !overwrite {
            return Err(DeepAuditError::AlreadyEnrolled {
                identity: identity.to_string(),
            });
        }
        tracing::info!(identity = %identity, "re-enrolling identity");
        store.delete(identity)?;
    }

    store.set(identity, Variant::Clean, clean)?;
    store.set(identity, Variant::Protected, protected.clone())?;
    tracing::debug!(identity = %identity, "identity enrolled");
    Ok(protected)
}

/// Enroll `count` random unit vectors as `subject_000`, `subject_001`, ...
pub fn enroll_synthetic<S, R>(
    store: &S,
    manager: &WatermarkManager,
    count: usize,
    rng: &mut R,
) -> Result<Vec<Identity>>
where
    S: EmbeddingStore + ?Sized,
    R: Rng + ?Sized,
{
    let mut enrolled = Vec::with_capacity(count);
    for i in 0..count {
        let identity = Identity::new(format!("subject_{i:03}"))?;
        let clean = EmbeddingVector::random(store.dimension(), rng)?;
        enroll(store, manager, &identity, clean, false)?;
        enrolled.push(identity);
    }
    Ok(enrolled)
}
