//! # deepaudit-attack — Data-Poisoning Attack Simulation
//!
//! Mutates the Protected embeddings of an [`EmbeddingStore`] the way an
//! attacker with write access to the template database could, and records
//! what each attack did.
//!
//! | Kind | Transform | Detectable when |
//! |---|---|---|
//! | subtle perturbation | `normalize(old + N(0,1)·m)` | self-similarity < 0.95 |
//! | replacement | `old[victim] = old[attacker]` | always |
//! | partial modification | overwrite `⌊dim·r⌋` dims with `N(0, 0.5)` | self-similarity < 0.95 |
//! | label flip | swap two identities' vectors | never |
//! | gradient morph | step toward a target `steps` times | similarity to original < 0.9 |
//! | backdoor trigger | `normalize(old + s·trigger)` | never |
//!
//! The Clean reference of every identity is never written.
//!
//! [`EmbeddingStore`]: deepaudit_core::EmbeddingStore

pub mod attack;
pub mod record;
pub mod simulator;

pub use attack::{Attack, AttackKind, MORPH_DETECTION_THRESHOLD, SELF_SIMILARITY_DETECTION_THRESHOLD};
pub use record::{AttackLog, AttackRecord};
pub use simulator::AttackSimulator;
