//! # deepaudit-metrics — Biometric Performance Metrics
//!
//! Accumulates similarity scores labelled genuine (same identity) or
//! impostor (different identities) and derives the standard error rates:
//!
//! | Metric | Definition |
//! |---|---|
//! | FAR(t)  | share of impostor scores `>= t` |
//! | FRR(t)  | share of genuine scores `< t` |
//! | HTER(t) | `(FAR(t) + FRR(t)) / 2` |
//! | EER     | grid point over `[0, 1]` minimizing `|FAR - FRR|` |
//!
//! Empty score classes resolve to an explicit `0.0` rate rather than an
//! error.

pub mod evaluator;

pub use evaluator::{ClassStatistics, EerEstimate, MetricsEvaluator, MetricsSummary};
