//! Optimal-loss table: per canary, the best (minimum) suffix loss the
//! reference model ever achieved, across all epochs and splits.
//!
//! Built only from the reference log. The optimum is the plausible
//! floor for a canary's loss in a comparably-capable model that never
//! memorized it; the contextual score measures how far below that
//! floor the target model drops.

use std::collections::BTreeMap;

use crate::record::LossRecord;

/// Canary id to minimum reference suffix loss.
pub type OptimalLossTable = BTreeMap<String, f64>;

/// Group the reference records by canary and take the per-canary
/// minimum. Canaries absent from the reference log get no entry;
/// downstream they score a contextual 0 ("unknown optimum").
pub fn build_optimal_loss_table(reference: &[LossRecord]) -> OptimalLossTable {
    let mut table = OptimalLossTable::new();
    for record in reference {
        table
            .entry(record.canary_id.clone())
            .and_modify(|best| *best = best.min(record.suffix_loss))
            .or_insert(record.suffix_loss);
    }
    table
}
