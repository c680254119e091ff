//! # Embedding Store
//!
//! The repository abstraction every component reads and writes through.
//! Each identity owns two logical variants:
//!
//! - [`Variant::Clean`]: ground truth written once at enrollment and never
//!   rewritten afterward.
//! - [`Variant::Protected`]: the watermark-embedded copy. This is the only
//!   variant attacks or re-watermarking may mutate.
//!
//! ## Concurrency
//!
//! Methods take `&self`; implementations provide interior mutability. The
//! in-memory store serializes writers behind a single `parking_lot::RwLock`,
//! which satisfies the one-writer-per-identity requirement for multi-client
//! use while letting readers take shared snapshots.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::embedding::EmbeddingVector;
use crate::error::{DeepAuditError, Result};
use crate::identity::Identity;

/// Which of an identity's two embeddings to address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Variant {
    /// Enrollment ground truth. Write-once.
    Clean,
    /// Watermarked copy used for matching. Mutable.
    Protected,
}

impl std::fmt::Display for Variant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Clean => write!(f, "clean"),
            Self::Protected => write!(f, "protected"),
        }
    }
}

/// Keyed storage of Clean/Protected embedding pairs.
pub trait EmbeddingStore {
    /// Fixed dimension every stored vector must have.
    fn dimension(&self) -> usize;

    /// Fetch one variant of an identity.
    ///
    /// Fails with [`DeepAuditError::NotFound`] if the identity or the
    /// requested variant is absent.
    fn get(&self, identity: &Identity, variant: Variant) -> Result<EmbeddingVector>;

    /// Write one variant of an identity.
    ///
    /// Writing [`Variant::Clean`] for an identity that already has a Clean
    /// vector fails with [`DeepAuditError::ImmutableVariant`]. A vector of the
    /// wrong length fails with [`DeepAuditError::DimensionMismatch`].
    fn set(&self, identity: &Identity, variant: Variant, vector: EmbeddingVector) -> Result<()>;

    /// Remove both variants of an identity.
    fn delete(&self, identity: &Identity) -> Result<()>;

    /// All identities in insertion order.
    fn list(&self) -> Vec<Identity>;

    /// Whether the identity has any stored variant.
    fn contains(&self, identity: &Identity) -> bool {
        self.list().iter().any(|id| id == identity)
    }
}

#[derive(Debug, Clone, Default)]
struct Entry {
    clean: Option<EmbeddingVector>,
    protected: Option<EmbeddingVector>,
}

impl Entry {
    fn slot(&self, variant: Variant) -> Option<&EmbeddingVector> {
        match variant {
            Variant::Clean => self.clean.as_ref(),
            Variant::Protected => self.protected.as_ref(),
        }
    }
}

#[derive(Debug, Default)]
struct Inner {
    order: Vec<Identity>,
    entries: HashMap<Identity, Entry>,
}

/// Thread-safe, cloneable in-memory [`EmbeddingStore`].
///
/// Clones share the same underlying map.
#[derive(Debug)]
pub struct InMemoryEmbeddingStore {
    dimension: usize,
    data: Arc<RwLock<Inner>>,
}

impl Clone for InMemoryEmbeddingStore {
    fn clone(&self) -> Self {
        Self {
            dimension: self.dimension,
            data: Arc::clone(&self.data),
        }
    }
}

impl InMemoryEmbeddingStore {
    /// Create an empty store for vectors of `dimension` components.
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            data: Arc::new(RwLock::new(Inner::default())),
        }
    }

    /// Number of identities.
    pub fn len(&self) -> usize {
        self.data.read().order.len()
    }

    /// Whether the store holds no identities.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Deep copy of the Protected variants, in insertion order.
    ///
    /// Used to compare store states before and after a mutation.
    pub fn protected_snapshot(&self) -> Vec<(Identity, Option<EmbeddingVector>)> {
        let guard = self.data.read();
        guard
            .order
            .iter()
            .map(|id| {
                let protected = guard.entries.get(id).and_then(|e| e.protected.clone());
                (id.clone(), protected)
            })
            .collect()
    }
}

impl EmbeddingStore for InMemoryEmbeddingStore {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn get(&self, identity: &Identity, variant: Variant) -> Result<EmbeddingVector> {
        self.data
            .read()
            .entries
            .get(identity)
            .and_then(|entry| entry.slot(variant))
            .cloned()
            .ok_or_else(|| DeepAuditError::not_found(identity))
    }

    fn set(&self, identity: &Identity, variant: Variant, vector: EmbeddingVector) -> Result<()> {
        vector.ensure_dim(self.dimension)?;
        let mut guard = self.data.write();
        let inner = &mut *guard;
        if !inner.entries.contains_key(identity) {
            inner.order.push(identity.clone());
        }
        let entry = inner.entries.entry(identity.clone()).or_default();
        match variant {
            Variant::Clean => {
                if entry.clean.is_some() {
                    return Err(DeepAuditError::ImmutableVariant {
                        identity: identity.to_string(),
                    });
                }
                entry.clean = Some(vector);
            }
            Variant::Protected => entry.protected = Some(vector),
        }
        Ok(())
    }

    fn delete(&self, identity: &Identity) -> Result<()> {
        let mut guard = self.data.write();
        if guard.entries.remove(identity).is_none() {
            return Err(DeepAuditError::not_found(identity));
        }
        guard.order.retain(|id| id != identity);
        Ok(())
    }

    fn list(&self) -> Vec<Identity> {
        self.data.read().order.clone()
    }

    fn contains(&self, identity: &Identity) -> bool {
        self.data.read().entries.contains_key(identity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> Identity {
        Identity::new(s).unwrap()
    }

    fn unit(dim: usize, hot: usize) -> EmbeddingVector {
        let mut v = vec![0.0; dim];
        v[hot] = 1.0;
        EmbeddingVector::new(v).unwrap()
    }

    #[test]
    fn set_and_get_variants() {
        let store = InMemoryEmbeddingStore::new(4);
        store.set(&id("alice"), Variant::Clean, unit(4, 0)).unwrap();
        store.set(&id("alice"), Variant::Protected, unit(4, 1)).unwrap();

        assert_eq!(store.get(&id("alice"), Variant::Clean).unwrap(), unit(4, 0));
        assert_eq!(store.get(&id("alice"), Variant::Protected).unwrap(), unit(4, 1));
    }

    #[test]
    fn clean_is_write_once() {
        let store = InMemoryEmbeddingStore::new(4);
        store.set(&id("alice"), Variant::Clean, unit(4, 0)).unwrap();
        let err = store.set(&id("alice"), Variant::Clean, unit(4, 2)).unwrap_err();
        assert!(matches!(err, DeepAuditError::ImmutableVariant { .. }));
        assert_eq!(store.get(&id("alice"), Variant::Clean).unwrap(), unit(4, 0));
    }

    #[test]
    fn protected_is_mutable() {
        let store = InMemoryEmbeddingStore::new(4);
        store.set(&id("alice"), Variant::Protected, unit(4, 0)).unwrap();
        store.set(&id("alice"), Variant::Protected, unit(4, 3)).unwrap();
        assert_eq!(store.get(&id("alice"), Variant::Protected).unwrap(), unit(4, 3));
    }

    #[test]
    fn missing_identity_or_variant_is_not_found() {
        let store = InMemoryEmbeddingStore::new(4);
        assert!(matches!(
            store.get(&id("ghost"), Variant::Clean),
            Err(DeepAuditError::NotFound { .. })
        ));
        store.set(&id("alice"), Variant::Protected, unit(4, 0)).unwrap();
        assert!(matches!(
            store.get(&id("alice"), Variant::Clean),
            Err(DeepAuditError::NotFound { .. })
        ));
    }

    #[test]
    fn wrong_dimension_rejected() {
        let store = InMemoryEmbeddingStore::new(4);
        let err = store.set(&id("alice"), Variant::Clean, unit(3, 0)).unwrap_err();
        assert!(matches!(err, DeepAuditError::DimensionMismatch { .. }));
        assert!(store.is_empty());
    }

    #[test]
    fn list_preserves_insertion_order_and_delete() {
        let store = InMemoryEmbeddingStore::new(2);
        for name in ["carol", "alice", "bob"] {
            store.set(&id(name), Variant::Clean, unit(2, 0)).unwrap();
        }
        assert_eq!(store.list(), vec![id("carol"), id("alice"), id("bob")]);

        store.delete(&id("alice")).unwrap();
        assert_eq!(store.list(), vec![id("carol"), id("bob")]);
        assert!(!store.contains(&id("alice")));
        assert!(store.delete(&id("alice")).is_err());
    }

    #[test]
    fn clones_share_state() {
        let store = InMemoryEmbeddingStore::new(2);
        let other = store.clone();
        other.set(&id("alice"), Variant::Clean, unit(2, 1)).unwrap();
        assert_eq!(store.len(), 1);
    }
}
