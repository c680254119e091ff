//! # deepaudit-core — Foundational Types for DeepAudit
//!
//! This crate is the leaf of the DeepAudit workspace. It defines the data
//! model every other crate builds on: identities, unit-normalized embedding
//! vectors, the two-variant embedding store, run configuration, and the
//! shared error taxonomy.
//!
//! ## Key Design Principles
//!
//! 1. **Unit-norm by construction.** [`EmbeddingVector`] can only be built
//!    through a normalizing constructor. A zero or near-zero vector is
//!    rejected with [`DeepAuditError::DegenerateInput`] instead of producing
//!    NaNs downstream.
//!
//! 2. **Clean is write-once.** Every identity owns a [`Variant::Clean`]
//!    ground-truth vector and a [`Variant::Protected`] watermarked vector.
//!    Stores refuse to overwrite Clean; only Protected is subject to
//!    mutation (legitimate re-watermarking or simulated attacks).
//!
//! 3. **Injected persistence.** Components consume the [`EmbeddingStore`]
//!    trait, never a concrete map. [`InMemoryEmbeddingStore`] is the
//!    reference implementation.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `deepaudit-*` crates.
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod config;
pub mod embedding;
pub mod error;
pub mod identity;
pub mod store;

pub use config::{
    AttackConfig, DeepAuditConfig, MetricsConfig, PipelineConfig, WatermarkConfig,
};
pub use embedding::{cosine, dot, l2_norm, normalize, EmbeddingVector, NORM_EPSILON};
pub use error::{DeepAuditError, Result};
pub use identity::Identity;
pub use store::{EmbeddingStore, InMemoryEmbeddingStore, Variant};
