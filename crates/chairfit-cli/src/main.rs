//! chairfit CLI: evaluate the chair/door fit decision on a dataset split.

use anyhow::Result;
use chairfit::app::{load_config, run, Mode, RunConfig};
use chairfit::CancelToken;
use clap::{ArgGroup, Parser};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "chairfit")]
#[command(about = "Estimate whether a photographed chair fits through a photographed door")]
#[command(version)]
#[command(group(ArgGroup::new("mode").args(["train", "test"])))]
struct Cli {
    /// Evaluate the `train` split.
    #[arg(long)]
    train: bool,

    /// Evaluate the `test` split.
    #[arg(long)]
    test: bool,

    /// Dataset root holding `train/` and `test/` (default: ./DATA_PHOTOS).
    #[arg(long)]
    dataset_dir: Option<PathBuf>,

    /// Directory of chair template images (default: ./TEMPLATES).
    #[arg(long)]
    templates_dir: Option<PathBuf>,

    /// Directory receiving diagnostic images in verbose mode.
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Save match and Hough visualizations for every image.
    #[arg(long)]
    verbose: bool,

    /// JSON run config; flags given on the command line take precedence.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write the per-image report as JSON.
    #[arg(long)]
    report_json: Option<PathBuf>,

    #[arg(long)]
    num_orb_features: Option<u32>,

    /// Largest Hamming distance of a good match.
    #[arg(long)]
    orb_match_distance: Option<u32>,

    /// Angular tolerance in radians for near-vertical lines.
    #[arg(long)]
    vertical_line_hough_coeff: Option<f32>,

    /// Fraction of the image height, from the bottom, searched for seat keypoints.
    #[arg(long)]
    chair_height_coeff: Option<f32>,
}

impl Cli {
    fn overrides(&self) -> RunConfig {
        let mode = if self.train {
            Some(Mode::Train)
        } else if self.test {
            Some(Mode::Test)
        } else {
            None
        };
        RunConfig {
            mode,
            dataset_dir: self.dataset_dir.clone(),
            templates_dir: self.templates_dir.clone(),
            output_dir: self.output_dir.clone(),
            verbose: self.verbose.then_some(true),
            report_json: self.report_json.clone(),
            num_orb_features: self.num_orb_features,
            orb_match_distance: self.orb_match_distance,
            vertical_line_hough_coeff: self.vertical_line_hough_coeff,
            chair_height_coeff: self.chair_height_coeff,
            log_level: None,
        }
    }
}

fn init_tracing(level: Option<&str>) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level.unwrap_or("info")));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn resolve_config(cli: &Cli) -> Result<RunConfig> {
    let base = match &cli.config {
        Some(path) => load_config(path)?,
        None => RunConfig::default(),
    };
    Ok(base.merge(cli.overrides()))
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let cfg = match resolve_config(&cli) {
        Ok(cfg) => cfg,
        Err(e) => {
            init_tracing(None);
            tracing::error!("{e:#}");
            return ExitCode::FAILURE;
        }
    };
    init_tracing(cfg.log_level.as_deref());

    match run(&cfg, &CancelToken::new()) {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn train_and_test_are_exclusive() {
        assert!(Cli::try_parse_from(["chairfit", "--train", "--test"]).is_err());
    }

    #[test]
    fn flags_become_overrides() {
        let cli = Cli::try_parse_from([
            "chairfit",
            "--test",
            "--orb-match-distance",
            "50",
            "--chair-height-coeff",
            "0.4",
        ])
        .unwrap();
        let cfg = cli.overrides();
        assert_eq!(cfg.mode, Some(Mode::Test));
        assert_eq!(cfg.orb_match_distance, Some(50));
        assert_eq!(cfg.chair_height_coeff, Some(0.4));
        assert_eq!(cfg.verbose, None);
    }
}
