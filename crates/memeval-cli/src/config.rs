//! Configuration loading from TOML files.
//!
//! Lookup order:
//! 1. `$MEMEVAL_CONFIG` environment variable
//! 2. `~/.config/memeval/config.toml`
//! 3. Built-in defaults (everything is optional)
//!
//! Command-line flags override whatever the config file sets.

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub scoring: ScoringConfig,
    pub output: OutputConfig,
}

/// Threshold calibration settings.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// False-positive-rate target for MIA threshold calibration.
    pub fpr_target: f64,
}

/// Output file names, relative to the output directory.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub summary_file: String,
    pub detail_file: String,
    pub onset_file: String,
}

// --- Defaults ---

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            fpr_target: memeval_core::DEFAULT_FPR_TARGET,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            summary_file: "epoch_summary.csv".into(),
            detail_file: "score_detail.csv".into(),
            onset_file: "memorization_onset.csv".into(),
        }
    }
}

/// Load config from disk. Returns defaults if no config file exists.
pub fn load_config() -> Result<Config> {
    let path = config_path();

    if let Some(p) = &path {
        if p.exists() {
            let content =
                std::fs::read_to_string(p).with_context(|| format!("reading {}", p.display()))?;
            let config: Config =
                toml::from_str(&content).with_context(|| format!("parsing {}", p.display()))?;
            return Ok(config);
        }
    }

    Ok(Config::default())
}

/// Resolve the config file path.
fn config_path() -> Option<PathBuf> {
    // 1. Environment variable
    if let Ok(p) = std::env::var("MEMEVAL_CONFIG") {
        return Some(PathBuf::from(p));
    }

    // 2. ~/.config/memeval/config.toml
    if let Some(home) = dirs_home() {
        let p = home.join(".config").join("memeval").join("config.toml");
        return Some(p);
    }

    None
}

fn dirs_home() -> Option<PathBuf> {
    std::env::var("HOME").ok().map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.scoring.fpr_target, 0.10);
        assert_eq!(config.output.summary_file, "epoch_summary.csv");
        assert_eq!(config.output.detail_file, "score_detail.csv");
    }

    #[test]
    fn test_parse_minimal_toml() {
        let toml_str = r#"
[scoring]
fpr_target = 0.05
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.scoring.fpr_target, 0.05);
        // Other fields should be defaults
        assert_eq!(config.output.onset_file, "memorization_onset.csv");
    }

    #[test]
    fn test_parse_full_toml() {
        let toml_str = r#"
[scoring]
fpr_target = 0.01

[output]
summary_file = "summary.csv"
detail_file = "detail.csv"
onset_file = "onset.csv"
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.scoring.fpr_target, 0.01);
        assert_eq!(config.output.summary_file, "summary.csv");
        assert_eq!(config.output.onset_file, "onset.csv");
    }
}
