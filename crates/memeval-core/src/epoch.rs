//! Per-epoch analysis: threshold calibration on held-out validation
//! canaries, then aggregate statistics over the injected train
//! canaries.
//!
//! Epochs are independent; the threshold is recalibrated from scratch
//! at every epoch. An epoch missing either partition carries no usable
//! signal and is skipped.

use std::collections::BTreeMap;

use crate::record::{EpochSummary, ScoreRecord, Split};

/// Default false-positive-rate target for threshold calibration: the
/// threshold is placed so ~10% of non-memorized (validation) canaries
/// would exceed it.
pub const DEFAULT_FPR_TARGET: f64 = 0.10;

/// Compute one [`EpochSummary`] per epoch that has both a train and a
/// validation partition, in ascending epoch order.
pub fn analyze_epochs(records: &[ScoreRecord], fpr_target: f64) -> Vec<EpochSummary> {
    let mut by_epoch: BTreeMap<u32, Vec<&ScoreRecord>> = BTreeMap::new();
    for record in records {
        by_epoch.entry(record.epoch).or_default().push(record);
    }

    let mut summaries = Vec::new();
    for (epoch, rows) in by_epoch {
        let (train, validation): (Vec<_>, Vec<_>) =
            rows.into_iter().partition(|r| r.split == Split::Train);

        if train.is_empty() || validation.is_empty() {
            tracing::info!(
                epoch,
                n_train = train.len(),
                n_validation = validation.len(),
                "insufficient data, epoch skipped"
            );
            continue;
        }

        let validation_mia: Vec<f64> = validation.iter().map(|r| r.mia_score).collect();
        let threshold_tau = calibrate_threshold(&validation_mia, fpr_target);

        let n = train.len();
        let detected = train
            .iter()
            .filter(|r| r.mia_score > threshold_tau)
            .count();
        let exact_matches: Vec<bool> = train.iter().filter_map(|r| r.exact_match).collect();
        let exact_match_rate = if exact_matches.is_empty() {
            0.0
        } else {
            exact_matches.iter().filter(|m| **m).count() as f64 / exact_matches.len() as f64
        };

        summaries.push(EpochSummary {
            epoch,
            threshold_tau,
            mia_recall: detected as f64 / n as f64,
            exact_match_rate,
            avg_counterfactual_score: mean(train.iter().map(|r| r.counterfactual_score)),
            avg_contextual_score: mean(train.iter().map(|r| r.contextual_score)),
            avg_perplexity: mean(train.iter().map(|r| r.suffix_loss_tgt)).exp(),
            n_train_samples: n,
        });
    }
    summaries
}

/// Place the detection threshold at the `(1 - fpr_target)` quantile of
/// the validation MIA scores. An empty sample admits no detections:
/// the threshold is `+inf`.
pub fn calibrate_threshold(validation_mia: &[f64], fpr_target: f64) -> f64 {
    if validation_mia.is_empty() {
        return f64::INFINITY;
    }
    let mut sorted = validation_mia.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    percentile(&sorted, (1.0 - fpr_target).clamp(0.0, 1.0))
}

/// Quantile of a non-empty ascending-sorted sample at `q` in [0, 1],
/// with linear interpolation between order statistics.
fn percentile(sorted: &[f64], q: f64) -> f64 {
    let rank = q * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    if lo == hi {
        return sorted[lo];
    }
    let frac = rank - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let mut sum = 0.0;
    let mut n = 0usize;
    for v in values {
        sum += v;
        n += 1;
    }
    if n == 0 {
        0.0
    } else {
        sum / n as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn score(epoch: u32, canary_id: &str, split: Split, mia: f64) -> ScoreRecord {
        ScoreRecord {
            epoch,
            canary_id: canary_id.into(),
            split,
            suffix_loss_tgt: 2.0,
            suffix_loss_ref: 2.0 + mia,
            global_loss_tgt: None,
            global_loss_ref: None,
            loss_optimum: Some(3.0),
            mia_score: mia,
            counterfactual_score: 0.5,
            contextual_score: 0.25,
            exact_match: None,
        }
    }

    fn approx(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-9, "{a} != {b}");
    }

    #[test]
    fn test_percentile_interpolates() {
        let sorted = [1.0, 2.0, 3.0, 4.0];
        approx(percentile(&sorted, 0.0), 1.0);
        approx(percentile(&sorted, 1.0), 4.0);
        approx(percentile(&sorted, 0.5), 2.5);
        approx(percentile(&sorted, 0.9), 3.7);
    }

    #[test]
    fn test_empty_validation_yields_infinite_tau() {
        let tau = calibrate_threshold(&[], DEFAULT_FPR_TARGET);
        assert!(tau.is_infinite() && tau > 0.0);
        // No finite MIA score exceeds it, so recall over any train
        // partition is 0.
        assert!(5.0e8 < tau);
    }

    #[test]
    fn test_threshold_monotone_in_fpr_target() {
        let sample = [0.1, -0.5, 0.9, 0.3, 0.0, 1.4, -0.2, 0.6];
        let mut last = f64::NEG_INFINITY;
        for fpr in [0.5, 0.25, 0.10, 0.05, 0.01] {
            let tau = calibrate_threshold(&sample, fpr);
            assert!(tau >= last, "tau decreased at fpr {fpr}");
            last = tau;
        }
    }

    #[test]
    fn test_recall_counts_strict_exceedance() {
        // Validation scores 0..=10: at fpr 0.10 tau lands at 9.0 by
        // linear interpolation, so only the train score above 9 counts.
        let mut records: Vec<ScoreRecord> = (0..=10)
            .map(|i| score(0, &format!("v{i}"), Split::Validation, i as f64))
            .collect();
        records.push(score(0, "t0", Split::Train, 9.0)); // equal, not detected
        records.push(score(0, "t1", Split::Train, 9.5));
        records.push(score(0, "t2", Split::Train, 2.0));

        let summaries = analyze_epochs(&records, DEFAULT_FPR_TARGET);
        assert_eq!(summaries.len(), 1);
        approx(summaries[0].threshold_tau, 9.0);
        approx(summaries[0].mia_recall, 1.0 / 3.0);
        assert_eq!(summaries[0].n_train_samples, 3);
    }

    #[test]
    fn test_epoch_without_either_partition_skipped() {
        let records = vec![
            // epoch 0: train only
            score(0, "t0", Split::Train, 1.0),
            // epoch 1: both
            score(1, "t0", Split::Train, 1.0),
            score(1, "v0", Split::Validation, 0.5),
            // epoch 2: validation only
            score(2, "v0", Split::Validation, 0.5),
        ];
        let summaries = analyze_epochs(&records, DEFAULT_FPR_TARGET);
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].epoch, 1);
    }

    #[test]
    fn test_empty_table_yields_empty_summaries() {
        assert!(analyze_epochs(&[], DEFAULT_FPR_TARGET).is_empty());
    }

    #[test]
    fn test_average_scores_and_perplexity() {
        let mut a = score(0, "t0", Split::Train, 1.0);
        a.counterfactual_score = 0.2;
        a.contextual_score = 0.1;
        a.suffix_loss_tgt = 1.0;
        let mut b = score(0, "t1", Split::Train, 1.0);
        b.counterfactual_score = 0.6;
        b.contextual_score = 0.3;
        b.suffix_loss_tgt = 3.0;
        let v = score(0, "v0", Split::Validation, 0.0);

        let summaries = analyze_epochs(&[a, b, v], DEFAULT_FPR_TARGET);
        approx(summaries[0].avg_counterfactual_score, 0.4);
        approx(summaries[0].avg_contextual_score, 0.2);
        approx(summaries[0].avg_perplexity, 2.0f64.exp());
    }

    #[test]
    fn test_exact_match_rate() {
        let mut a = score(0, "t0", Split::Train, 1.0);
        a.exact_match = Some(true);
        let mut b = score(0, "t1", Split::Train, 1.0);
        b.exact_match = Some(false);
        let v = score(0, "v0", Split::Validation, 0.0);

        let summaries = analyze_epochs(&[a, b, v], DEFAULT_FPR_TARGET);
        approx(summaries[0].exact_match_rate, 0.5);
    }

    #[test]
    fn test_exact_match_rate_zero_when_unavailable() {
        let records = vec![
            score(0, "t0", Split::Train, 1.0),
            score(0, "v0", Split::Validation, 0.0),
        ];
        let summaries = analyze_epochs(&records, DEFAULT_FPR_TARGET);
        approx(summaries[0].exact_match_rate, 0.0);
    }

    #[test]
    fn test_threshold_recalibrated_per_epoch() {
        let records = vec![
            score(0, "v0", Split::Validation, 1.0),
            score(0, "t0", Split::Train, 5.0),
            score(1, "v0", Split::Validation, 10.0),
            score(1, "t0", Split::Train, 5.0),
        ];
        let summaries = analyze_epochs(&records, DEFAULT_FPR_TARGET);
        approx(summaries[0].threshold_tau, 1.0);
        approx(summaries[0].mia_recall, 1.0);
        approx(summaries[1].threshold_tau, 10.0);
        approx(summaries[1].mia_recall, 0.0);
    }
}
