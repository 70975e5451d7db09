mod config;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;

use memeval_core::{
    analyze_epochs, build_optimal_loss_table, compute_scores, load_loss_log, memorization_onsets,
    writer, EpochSummary, JoinStats,
};

use crate::config::Config;

#[derive(Parser)]
#[command(
    name = "memeval",
    version,
    about = "Evaluate canary memorization from per-epoch loss logs"
)]
struct Cli {
    /// Loss log of the reference model (trained without canaries)
    #[arg(long, value_name = "CSV")]
    reference_log: PathBuf,

    /// Loss log of the target model (trained with canaries injected)
    #[arg(long, value_name = "CSV")]
    target_log: PathBuf,

    /// Directory for the result tables (created if absent)
    #[arg(long, value_name = "DIR")]
    output_dir: PathBuf,

    /// False-positive-rate target for MIA threshold calibration
    #[arg(long)]
    fpr_target: Option<f64>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing_subscriber::filter::LevelFilter::WARN.into()),
        )
        .init();

    let cli = Cli::parse();
    let config = config::load_config()?;
    let fpr_target = cli.fpr_target.unwrap_or(config.scoring.fpr_target);
    anyhow::ensure!(
        (0.0..1.0).contains(&fpr_target),
        "fpr-target must be in [0, 1), got {fpr_target}"
    );

    let report = run(
        &cli.reference_log,
        &cli.target_log,
        &cli.output_dir,
        fpr_target,
        &config,
    )?;
    report.print();
    Ok(())
}

struct RunReport {
    n_scored: usize,
    stats: JoinStats,
    summaries: Vec<EpochSummary>,
    summary_path: PathBuf,
    detail_path: PathBuf,
    onset_path: PathBuf,
}

fn run(
    reference_log: &Path,
    target_log: &Path,
    output_dir: &Path,
    fpr_target: f64,
    config: &Config,
) -> Result<RunReport> {
    let reference = load_loss_log(reference_log)
        .with_context(|| format!("loading reference log {}", reference_log.display()))?;
    let target = load_loss_log(target_log)
        .with_context(|| format!("loading target log {}", target_log.display()))?;
    tracing::info!(
        reference_rows = reference.records.len(),
        target_rows = target.records.len(),
        "loss logs loaded"
    );
    if !target.has_exact_match {
        tracing::info!("target log has no exact_match column; rates reported as 0");
    }

    let optimum = build_optimal_loss_table(&reference.records);
    let scores = compute_scores(&target.records, &reference.records, &optimum);
    let onsets = memorization_onsets(&scores.records);
    let summaries = analyze_epochs(&scores.records, fpr_target);

    let summary_path = output_dir.join(&config.output.summary_file);
    let detail_path = output_dir.join(&config.output.detail_file);
    let onset_path = output_dir.join(&config.output.onset_file);
    writer::write_summary(&summary_path, &summaries)?;
    writer::write_detail(&detail_path, &scores.records)?;
    writer::write_onsets(&onset_path, &onsets)?;

    Ok(RunReport {
        n_scored: scores.records.len(),
        stats: scores.stats,
        summaries,
        summary_path,
        detail_path,
        onset_path,
    })
}

impl RunReport {
    fn print(&self) {
        println!(
            "Scored {} (epoch, canary) rows across {} epochs",
            self.n_scored,
            self.summaries.len()
        );
        if self.stats.target_dropped > 0 || self.stats.reference_dropped > 0 {
            println!(
                "  coverage: {} target rows and {} reference rows had no partner and were dropped",
                self.stats.target_dropped, self.stats.reference_dropped
            );
        }
        if self.stats.unknown_optimum > 0 {
            println!(
                "  {} rows had no reference optimum (contextual score 0)",
                self.stats.unknown_optimum
            );
        }

        for s in &self.summaries {
            println!(
                "  epoch {:>3}: tau={:.4} recall={:.3} exact={:.3} cf={:.4} ctx={:.4} ppl={:.2} n={}",
                s.epoch,
                s.threshold_tau,
                s.mia_recall,
                s.exact_match_rate,
                s.avg_counterfactual_score,
                s.avg_contextual_score,
                s.avg_perplexity,
                s.n_train_samples
            );
        }

        println!("Summary: {}", self.summary_path.display());
        println!("Detail:  {}", self.detail_path.display());
        println!("Onsets:  {}", self.onset_path.display());
    }
}
