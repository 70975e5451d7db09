//! Score computation: joins the target and reference logs per
//! (epoch, canary_id) and derives the three memorization signals.
//!
//! With `Lt` the target suffix loss, `Lr` the reference suffix loss at
//! the same epoch, and `Lopt` the canary's historical minimum
//! reference loss:
//!
//! - `mia_score = Lr - Lt` (unbounded, can be negative)
//! - `counterfactual_score = clamp((Lr - Lt) / Lr, 0, 1)`
//! - `contextual_score = clamp((Lopt - Lt) / Lopt, 0, 1)`
//!
//! A non-positive or unknown denominator defines the ratio as 0: a
//! target doing worse than its baseline is zero memorization, not
//! negative memorization. Pairs present in only one log are dropped
//! from scoring and counted in [`JoinStats`].

use std::collections::BTreeMap;

use crate::optimum::OptimalLossTable;
use crate::record::{JoinStats, LossRecord, OnsetRecord, ScoreRecord};

/// Lower clamp for the counterfactual and contextual signals.
pub const SCORE_FLOOR: f64 = 0.0;
/// Upper clamp for the counterfactual and contextual signals.
pub const SCORE_CEIL: f64 = 1.0;

/// All scored rows, ordered by (epoch, canary_id), plus the join
/// coverage accounting.
#[derive(Debug, Clone)]
pub struct ScoreTable {
    pub records: Vec<ScoreRecord>,
    pub stats: JoinStats,
}

/// Inner-join target and reference on (epoch, canary_id), left-join
/// the optimal-loss table, and score every surviving row.
///
/// Split and exact-match flags are taken from the target log; the
/// reference log's own split labels play no role in scoring.
pub fn compute_scores(
    target: &[LossRecord],
    reference: &[LossRecord],
    optimum: &OptimalLossTable,
) -> ScoreTable {
    let reference_index: BTreeMap<(u32, &str), &LossRecord> = reference
        .iter()
        .map(|r| ((r.epoch, r.canary_id.as_str()), r))
        .collect();
    // BTreeMap keys give the deterministic (epoch, canary_id) output order.
    let target_index: BTreeMap<(u32, &str), &LossRecord> = target
        .iter()
        .map(|r| ((r.epoch, r.canary_id.as_str()), r))
        .collect();

    let mut records = Vec::new();
    let mut stats = JoinStats::default();

    for (key, tgt) in &target_index {
        let Some(rf) = reference_index.get(key) else {
            stats.target_dropped += 1;
            continue;
        };
        let loss_optimum = optimum.get(&tgt.canary_id).copied();
        if loss_optimum.is_none() {
            stats.unknown_optimum += 1;
        }

        records.push(ScoreRecord {
            epoch: tgt.epoch,
            canary_id: tgt.canary_id.clone(),
            split: tgt.split,
            suffix_loss_tgt: tgt.suffix_loss,
            suffix_loss_ref: rf.suffix_loss,
            global_loss_tgt: tgt.global_loss,
            global_loss_ref: rf.global_loss,
            loss_optimum,
            mia_score: rf.suffix_loss - tgt.suffix_loss,
            counterfactual_score: counterfactual_score(rf.suffix_loss, tgt.suffix_loss),
            contextual_score: contextual_score(loss_optimum, tgt.suffix_loss),
            exact_match: tgt.exact_match,
        });
    }

    stats.reference_dropped = reference_index
        .keys()
        .filter(|key| !target_index.contains_key(*key))
        .count();

    if stats.target_dropped > 0 || stats.reference_dropped > 0 {
        tracing::warn!(
            target_dropped = stats.target_dropped,
            reference_dropped = stats.reference_dropped,
            "unmatched (epoch, canary) rows excluded from scoring"
        );
    }
    if stats.unknown_optimum > 0 {
        tracing::warn!(
            rows = stats.unknown_optimum,
            "rows scored with unknown loss optimum (contextual score forced to 0)"
        );
    }

    ScoreTable { records, stats }
}

/// Loss drop relative to the reference model at the same epoch,
/// normalized by the reference loss.
pub fn counterfactual_score(loss_ref: f64, loss_tgt: f64) -> f64 {
    if loss_ref <= 0.0 {
        return SCORE_FLOOR;
    }
    clamp_unit((loss_ref - loss_tgt) / loss_ref)
}

/// Loss drop relative to the best loss the reference model ever
/// achieved for this canary. Unknown or non-positive optimum scores 0.
pub fn contextual_score(loss_optimum: Option<f64>, loss_tgt: f64) -> f64 {
    match loss_optimum {
        Some(opt) if opt > 0.0 => clamp_unit((opt - loss_tgt) / opt),
        _ => SCORE_FLOOR,
    }
}

fn clamp_unit(raw: f64) -> f64 {
    raw.clamp(SCORE_FLOOR, SCORE_CEIL)
}

/// Per canary, the first epoch at which each signal turns positive.
///
/// `records` must already be in (epoch, canary_id) order, as produced
/// by [`compute_scores`]; the first positive hit per canary is then
/// the earliest epoch.
pub fn memorization_onsets(records: &[ScoreRecord]) -> Vec<OnsetRecord> {
    let mut onsets: BTreeMap<&str, OnsetRecord> = BTreeMap::new();
    for record in records {
        let entry = onsets
            .entry(record.canary_id.as_str())
            .or_insert_with(|| OnsetRecord {
                canary_id: record.canary_id.clone(),
                first_cf_epoch: None,
                first_ctx_epoch: None,
            });
        if entry.first_cf_epoch.is_none() && record.counterfactual_score > 0.0 {
            entry.first_cf_epoch = Some(record.epoch);
        }
        if entry.first_ctx_epoch.is_none() && record.contextual_score > 0.0 {
            entry.first_ctx_epoch = Some(record.epoch);
        }
    }
    onsets.into_values().collect()
}
