use std::fmt;

use serde::{Deserialize, Serialize};

/// Which canary pool a loss row belongs to.
///
/// `Train` canaries were injected into the target model's training
/// data; `Validation` canaries were held out and calibrate the MIA
/// detection threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Split {
    Train,
    Validation,
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Train => write!(f, "train"),
            Self::Validation => write!(f, "validation"),
        }
    }
}

impl std::str::FromStr for Split {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "train" => Ok(Self::Train),
            "validation" => Ok(Self::Validation),
            _ => Err(format!("invalid split: {s}")),
        }
    }
}

/// One row of a per-epoch loss log, for one canary and one model.
///
/// Immutable once loaded; `(epoch, canary_id)` is unique within a log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LossRecord {
    pub epoch: u32,
    pub canary_id: String,
    pub suffix_loss: f64,
    pub global_loss: Option<f64>,
    pub split: Split,
    pub exact_match: Option<bool>,
}

/// One joined `(epoch, canary_id)` row with all three memorization
/// signals and the losses they were derived from.
///
/// Field order matches the detail output columns.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreRecord {
    pub epoch: u32,
    pub canary_id: String,
    pub split: Split,
    pub suffix_loss_tgt: f64,
    pub suffix_loss_ref: f64,
    pub global_loss_tgt: Option<f64>,
    pub global_loss_ref: Option<f64>,
    /// Minimum reference suffix loss ever observed for this canary.
    /// `None` when the canary never appears in the reference log.
    pub loss_optimum: Option<f64>,
    pub mia_score: f64,
    pub counterfactual_score: f64,
    pub contextual_score: f64,
    pub exact_match: Option<bool>,
}

/// Aggregate statistics for one epoch's train partition, with the
/// detection threshold calibrated on that epoch's validation partition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EpochSummary {
    pub epoch: u32,
    #[serde(rename = "mia_threshold_tau")]
    pub threshold_tau: f64,
    pub mia_recall: f64,
    #[serde(rename = "exact_match")]
    pub exact_match_rate: f64,
    pub avg_counterfactual_score: f64,
    pub avg_contextual_score: f64,
    pub avg_perplexity: f64,
    pub n_train_samples: usize,
}

/// First epoch at which each memorization signal turns positive for a
/// canary. `None` means the signal never rose above zero.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OnsetRecord {
    pub canary_id: String,
    pub first_cf_epoch: Option<u32>,
    pub first_ctx_epoch: Option<u32>,
}

/// Coverage accounting for the target/reference join.
///
/// Rows dropped here are silently excluded from scoring; the counts
/// exist so the caller can audit how much coverage was lost.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JoinStats {
    /// Target rows with no reference row at the same (epoch, canary_id).
    pub target_dropped: usize,
    /// Reference rows with no target row at the same (epoch, canary_id).
    pub reference_dropped: usize,
    /// Scored rows whose canary has no entry in the optimal-loss table.
    pub unknown_optimum: usize,
}
