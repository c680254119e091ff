//! # deepaudit-watermark — Embedding-Level Watermarks
//!
//! Marks a stored biometric embedding with a signal derived from the
//! identity it belongs to, and later checks whether that signal is still
//! present.
//!
//! - **Signal** (`signal.rs`): `SHA-256(identity)` seeds a ChaCha20 PRNG that
//!   draws `dim` standard-normal samples, normalized to a unit vector. The
//!   signal is never stored; it is regenerated on demand.
//! - **Manager** (`manager.rs`): `embed` adds `strength · signal` and
//!   renormalizes; `verify` measures `|⟨candidate, signal⟩|`; `robustness`
//!   re-verifies under isotropic noise.
//! - **Impact** (`impact.rs`): similarity deviation statistics quantifying
//!   how much watermarking disturbs recognition.
//!
//! ## Scope
//!
//! The watermark deters silent tampering. It is not a signature scheme:
//! anyone who knows an identity string can regenerate its signal.

pub mod impact;
pub mod manager;
pub mod signal;

pub use impact::{ImpactStatistics, WatermarkImpactAnalysis, IMPERCEPTIBLE_THRESHOLD};
pub use manager::{Extraction, RobustnessReport, Verification, WatermarkManager};
pub use signal::{signal_seed, WatermarkSignal};
