//! Shared application-level helpers for the CLI.
//!
//! These functions wire up I/O (config, dataset and template loading,
//! artifact directory, JSON report) around the estimator APIs.

use crate::chair::TemplateCatalog;
use crate::dataset::{load_split, load_templates, Split};
use crate::decision::{evaluate_dataset, CancelToken, DatasetReport};
use crate::diagnostics::{EstimationContext, TracingSink};
use crate::params::Hyperparameters;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs::File, io::Write, path::Path, path::PathBuf};
use tracing::info;

pub const DEFAULT_DATASET_DIR: &str = "./DATA_PHOTOS";
pub const DEFAULT_TEMPLATES_DIR: &str = "./TEMPLATES";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Train,
    Test,
}

impl Mode {
    pub fn split(self) -> Split {
        match self {
            Mode::Train => Split::Train,
            Mode::Test => Split::Test,
        }
    }

    /// Artifact directory used when verbose and none is configured.
    pub fn default_output_dir(self) -> &'static str {
        match self {
            Mode::Train => "./TRAIN_VERBOSE_OUTPUT",
            Mode::Test => "./TEST_VERBOSE_OUTPUT",
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RunConfig {
    pub mode: Option<Mode>,
    pub dataset_dir: Option<PathBuf>,
    pub templates_dir: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub verbose: Option<bool>,
    pub report_json: Option<PathBuf>,
    pub num_orb_features: Option<u32>,
    pub orb_match_distance: Option<u32>,
    pub vertical_line_hough_coeff: Option<f32>,
    pub chair_height_coeff: Option<f32>,
    pub log_level: Option<String>,
}

impl RunConfig {
    /// Overlay every value set in `other` on top of `self`.
    pub fn merge(mut self, other: RunConfig) -> Self {
        macro_rules! take {
            ($($field:ident),*) => {
                $(if other.$field.is_some() {
                    self.$field = other.$field;
                })*
            };
        }
        take!(
            mode,
            dataset_dir,
            templates_dir,
            output_dir,
            verbose,
            report_json,
            num_orb_features,
            orb_match_distance,
            vertical_line_hough_coeff,
            chair_height_coeff,
            log_level
        );
        self
    }

    /// Defaults with every override applied and validated.
    pub fn hyperparameters(&self) -> Result<Hyperparameters> {
        let d = Hyperparameters::default();
        let params = Hyperparameters::new(
            self.num_orb_features.unwrap_or(d.num_orb_features()),
            self.orb_match_distance.unwrap_or(d.orb_match_distance()),
            self.vertical_line_hough_coeff
                .unwrap_or(d.vertical_line_hough_coeff()),
            self.chair_height_coeff.unwrap_or(d.chair_height_coeff()),
        )?;
        Ok(params)
    }
}

#[derive(Serialize)]
pub struct RunDump<'a> {
    pub mode: Mode,
    pub dataset_dir: String,
    pub templates: usize,
    pub hyperparameters: Hyperparameters,
    #[serde(flatten)]
    pub report: &'a DatasetReport,
}

/// Evaluate one split of the dataset as described by `cfg`.
pub fn run(cfg: &RunConfig, cancel: &CancelToken) -> Result<DatasetReport> {
    let Some(mode) = cfg.mode else {
        bail!("no mode given, expected train|test");
    };
    let dataset_dir = cfg
        .dataset_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATASET_DIR));
    let templates_dir = cfg
        .templates_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_TEMPLATES_DIR));
    if !dataset_dir.is_dir() {
        bail!("the directory '{}' doesn't exist", dataset_dir.display());
    }
    if !templates_dir.is_dir() {
        bail!("the directory '{}' doesn't exist", templates_dir.display());
    }

    let params = cfg.hyperparameters()?;
    let verbose = cfg.verbose.unwrap_or(false);

    info!(dir = %dataset_dir.display(), split = mode.split().dir_name(), "loading dataset");
    let images = load_split(&dataset_dir, mode.split())?;
    info!(dir = %templates_dir.display(), "loading templates");
    let catalog = TemplateCatalog::new(load_templates(&templates_dir)?)
        .with_context(|| format!("loading templates from {}", templates_dir.display()))?;

    let output_dir = if verbose {
        let dir = cfg
            .output_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(mode.default_output_dir()));
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("creating output directory {}", dir.display()))?;
        Some(dir)
    } else {
        None
    };

    info!(
        num_orb_features = params.num_orb_features(),
        orb_match_distance = params.orb_match_distance(),
        chair_height_coeff = params.chair_height_coeff(),
        vertical_line_hough_coeff = params.vertical_line_hough_coeff(),
        "hyperparameters"
    );
    info!(images = images.len(), templates = catalog.len(), "evaluation started");

    let sink = TracingSink;
    let report = evaluate_dataset(
        &images,
        &catalog,
        &params,
        |name| {
            let ctx = EstimationContext::new(name, &sink);
            match output_dir.as_deref() {
                Some(dir) => ctx.with_artifacts(dir),
                None => ctx,
            }
        },
        cancel,
    );

    match report.accuracy {
        Some(acc) => info!(
            accuracy = acc,
            correct = report.correct,
            decided = report.decided,
            undetermined = report.undetermined,
            "evaluation finished"
        ),
        None => info!(
            undetermined = report.undetermined,
            "evaluation finished without any decided image"
        ),
    }

    if let Some(path) = &cfg.report_json {
        let dump = RunDump {
            mode,
            dataset_dir: dataset_dir.to_string_lossy().into_owned(),
            templates: catalog.len(),
            hyperparameters: params,
            report: &report,
        };
        write_json(path, &dump)?;
        info!(path = %path.display(), "report written");
    }

    Ok(report)
}

pub fn write_json(path: &Path, value: &impl Serialize) -> Result<()> {
    let mut json_file =
        File::create(path).with_context(|| format!("creating {}", path.display()))?;
    serde_json::to_writer_pretty(&mut json_file, value)?;
    json_file.write_all(b"\n")?;
    Ok(())
}

pub fn load_config(path: &Path) -> Result<RunConfig> {
    let file = File::open(path).with_context(|| format!("opening config {}", path.display()))?;
    let cfg: RunConfig = serde_json::from_reader(file)
        .with_context(|| format!("parsing config {}", path.display()))?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_prefers_set_values() {
        let file = RunConfig {
            mode: Some(Mode::Train),
            orb_match_distance: Some(50),
            verbose: Some(true),
            ..RunConfig::default()
        };
        let flags = RunConfig {
            mode: Some(Mode::Test),
            num_orb_features: Some(1000),
            ..RunConfig::default()
        };
        let cfg = file.merge(flags);
        assert_eq!(cfg.mode, Some(Mode::Test));
        assert_eq!(cfg.orb_match_distance, Some(50));
        assert_eq!(cfg.num_orb_features, Some(1000));
        assert_eq!(cfg.verbose, Some(true));
    }

    #[test]
    fn hyperparameters_apply_overrides() {
        let cfg = RunConfig {
            chair_height_coeff: Some(0.4),
            ..RunConfig::default()
        };
        let p = cfg.hyperparameters().unwrap();
        assert_eq!(p.chair_height_coeff(), 0.4);
        assert_eq!(p.num_orb_features(), Hyperparameters::DEFAULT_NUM_ORB_FEATURES);

        let bad = RunConfig {
            chair_height_coeff: Some(2.0),
            ..RunConfig::default()
        };
        assert!(bad.hyperparameters().is_err());
    }

    #[test]
    fn config_parses_from_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.json");
        std::fs::write(
            &path,
            r#"{"mode":"test","dataset_dir":"data","orb_match_distance":64}"#,
        )
        .unwrap();
        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.mode, Some(Mode::Test));
        assert_eq!(cfg.dataset_dir, Some(PathBuf::from("data")));
        assert_eq!(cfg.orb_match_distance, Some(64));
        assert_eq!(cfg.verbose, None);
    }

    #[test]
    fn missing_mode_is_an_error() {
        let err = run(&RunConfig::default(), &CancelToken::new()).unwrap_err();
        assert!(err.to_string().contains("mode"));
    }
}
