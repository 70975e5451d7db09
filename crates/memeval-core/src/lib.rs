//! Canary memorization scoring engine.
//!
//! Quantifies how much a language model memorized injected canary
//! strings by comparing per-epoch loss logs from two training runs: a
//! reference model never exposed to the canaries and a target model
//! trained with them. Three signals are derived per (epoch, canary):
//! a membership-inference score, a counterfactual memorization score,
//! and a contextual memorization score; per epoch, a detection
//! threshold is calibrated on held-out validation canaries and
//! aggregate statistics are computed over the injected train canaries.

pub mod epoch;
pub mod error;
pub mod loader;
pub mod optimum;
pub mod record;
pub mod score;
pub mod writer;

pub use epoch::{analyze_epochs, calibrate_threshold, DEFAULT_FPR_TARGET};
pub use error::{MemEvalError, MemEvalResult};
pub use loader::{load_loss_log, LossTable};
pub use optimum::{build_optimal_loss_table, OptimalLossTable};
pub use record::{EpochSummary, JoinStats, LossRecord, OnsetRecord, ScoreRecord, Split};
pub use score::{compute_scores, memorization_onsets, ScoreTable};
