//! Per-call diagnostics: structured events and optional image artifacts.
//!
//! Estimators never reach for global state to report what they did. Each
//! call receives an [`EstimationContext`] naming the image, whether
//! artifacts are wanted, where they go, and a [`DiagnosticSink`] that
//! receives every event.

use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Something an estimator observed while processing one image.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DiagnosticEvent {
    /// Good-match count of one template against the query.
    TemplateScored {
        template: usize,
        good_matches: usize,
    },
    /// Template selected for localization.
    BestTemplate {
        template: usize,
        good_matches: usize,
    },
    ChairWidth {
        width: f32,
        seat_keypoints: usize,
    },
    /// Lines returned by the Hough peak search, before the vertical filter.
    LinesDetected { total: usize, vertical: usize },
    DoorWidth { width: f32 },
    ArtifactSaved { path: PathBuf },
}

/// Receiver of diagnostic events.
pub trait DiagnosticSink: Send + Sync {
    fn record(&self, image_name: &str, event: DiagnosticEvent);
}

/// Forwards events to `tracing` at debug level.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn record(&self, image_name: &str, event: DiagnosticEvent) {
        match &event {
            DiagnosticEvent::TemplateScored {
                template,
                good_matches,
            } => tracing::debug!(image = image_name, template, good_matches, "template scored"),
            DiagnosticEvent::BestTemplate {
                template,
                good_matches,
            } => tracing::debug!(image = image_name, template, good_matches, "best template"),
            DiagnosticEvent::ChairWidth {
                width,
                seat_keypoints,
            } => tracing::debug!(image = image_name, width, seat_keypoints, "chair width"),
            DiagnosticEvent::LinesDetected { total, vertical } => {
                tracing::debug!(image = image_name, total, vertical, "lines detected")
            }
            DiagnosticEvent::DoorWidth { width } => {
                tracing::debug!(image = image_name, width, "door width")
            }
            DiagnosticEvent::ArtifactSaved { path } => {
                tracing::debug!(image = image_name, path = %path.display(), "artifact saved")
            }
        }
    }
}

/// Drops every event.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullSink;

impl DiagnosticSink for NullSink {
    fn record(&self, _image_name: &str, _event: DiagnosticEvent) {}
}

/// Keeps every event in memory, in arrival order.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<(String, DiagnosticEvent)>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the recorded `(image_name, event)` pairs.
    pub fn events(&self) -> Vec<(String, DiagnosticEvent)> {
        match self.events.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl DiagnosticSink for MemorySink {
    fn record(&self, image_name: &str, event: DiagnosticEvent) {
        let mut guard = match self.events.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.push((image_name.to_owned(), event));
    }
}

static NULL_SINK: NullSink = NullSink;

/// Everything an estimator needs to report on one image.
#[derive(Clone, Copy)]
pub struct EstimationContext<'a> {
    /// Used in artifact file names and event records.
    pub image_name: &'a str,
    /// Artifacts are rendered only when set.
    pub verbose: bool,
    /// Existing directory receiving artifacts; never created here.
    pub artifact_dir: Option<&'a Path>,
    pub sink: &'a dyn DiagnosticSink,
}

impl<'a> EstimationContext<'a> {
    /// Non-verbose context that discards events.
    pub fn silent(image_name: &'a str) -> Self {
        Self {
            image_name,
            verbose: false,
            artifact_dir: None,
            sink: &NULL_SINK,
        }
    }

    pub fn new(image_name: &'a str, sink: &'a dyn DiagnosticSink) -> Self {
        Self {
            image_name,
            verbose: false,
            artifact_dir: None,
            sink,
        }
    }

    /// Enable artifact rendering into `dir`.
    pub fn with_artifacts(mut self, dir: &'a Path) -> Self {
        self.verbose = true;
        self.artifact_dir = Some(dir);
        self
    }

    pub fn emit(&self, event: DiagnosticEvent) {
        self.sink.record(self.image_name, event);
    }

    /// Target path of an artifact, or `None` when artifacts are off.
    ///
    /// The file is `<dir>/<prefix>_<image stem>.png`; path separators in the
    /// image name are flattened to `_`.
    pub fn artifact_path(&self, prefix: &str) -> Option<PathBuf> {
        if !self.verbose {
            return None;
        }
        let dir = self.artifact_dir?;
        let stem = Path::new(self.image_name)
            .with_extension("")
            .to_string_lossy()
            .replace(['/', '\\'], "_");
        Some(dir.join(format!("{prefix}_{stem}.png")))
    }
}

impl std::fmt::Debug for EstimationContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EstimationContext")
            .field("image_name", &self.image_name)
            .field("verbose", &self.verbose)
            .field("artifact_dir", &self.artifact_dir)
            .finish_non_exhaustive()
    }
}
