//! # Watermark Signal Generation
//!
//! `generate(identity, dim)`:
//!
//! 1. `digest = SHA-256(identity UTF-8 bytes)`
//! 2. `seed = u32::from_be_bytes(digest[0..4])`
//! 3. `rng = ChaCha20Rng::seed_from_u64(seed)`
//! 4. draw `dim` samples from `StandardNormal`, L2-normalize.
//!
//! ## Cross-platform portability
//!
//! ChaCha20 output is specified bit-for-bit, and `seed_from_u64` expands the
//! seed with a fixed PCG32 schedule, so the same identity and dimension
//! produce an identical signal on every platform and in every process.

use deepaudit_core::{normalize, DeepAuditError, Identity, Result};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use rand_distr::StandardNormal;
use sha2::{Digest, Sha256};

/// The PRNG seed derived from an identity: the first four digest bytes, big-endian.
pub fn signal_seed(identity: &Identity) -> u32 {
    let digest = Sha256::digest(identity.as_bytes());
    u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]])
}

/// A deterministic unit vector bound to one identity.
#[derive(Debug, Clone, PartialEq)]
pub struct WatermarkSignal {
    identity: Identity,
    values: Vec<f64>,
}

impl WatermarkSignal {
    /// Regenerate the signal for `identity` at dimension `dim`.
    pub fn generate(identity: &Identity, dim: usize) -> Result<Self> {
        if dim == 0 {
            return Err(DeepAuditError::invalid_parameter(
                "dim",
                "watermark dimension must be at least 1",
            ));
        }
        let mut rng = ChaCha20Rng::seed_from_u64(u64::from(signal_seed(identity)));
        let raw: Vec<f64> = (0..dim).map(|_| rng.sample(StandardNormal)).collect();
        Ok(Self {
            identity: identity.clone(),
            values: normalize(&raw)?,
        })
    }

    /// The identity this signal was derived from.
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Signal dimension.
    pub fn dim(&self) -> usize {
        self.values.len()
    }

    /// Borrow the unit-norm components.
    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }
}
