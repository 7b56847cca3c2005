//! Loading labelled photos and chair templates from disk.
//!
//! Expected layout:
//!
//! ```text
//! <dataset_dir>/
//!   train/  *.jpg | *.png, labels.json
//!   test/   *.jpg | *.png, labels.json
//! ```
//!
//! `labels.json` lists file names under `"yes"` and `"no"`; any image not
//! listed under `"yes"` is labelled `No`.

use crate::decision::{DatasetImage, Label};
use anyhow::{Context, Result};
use image::RgbImage;
use serde::Deserialize;
use std::collections::HashSet;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const LABELS_FILE: &str = "labels.json";

const IMAGE_EXTENSIONS: [&str; 2] = ["jpg", "png"];

/// Which half of the dataset to load.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Split {
    Train,
    Test,
}

impl Split {
    pub fn dir_name(self) -> &'static str {
        match self {
            Split::Train => "train",
            Split::Test => "test",
        }
    }
}

/// Contents of `labels.json`.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct Labels {
    #[serde(default)]
    pub yes: Vec<String>,
    #[serde(default)]
    pub no: Vec<String>,
}

pub fn load_labels(path: &Path) -> Result<Labels> {
    let file = File::open(path).with_context(|| format!("opening labels {}", path.display()))?;
    let labels: Labels = serde_json::from_reader(file)
        .with_context(|| format!("parsing labels {}", path.display()))?;
    Ok(labels)
}

/// Regular files in `dir`, sorted by file name.
fn sorted_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries =
        std::fs::read_dir(dir).with_context(|| format!("reading directory {}", dir.display()))?;
    let mut files = Vec::new();
    for entry in entries {
        let path = entry
            .with_context(|| format!("reading directory {}", dir.display()))?
            .path();
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| IMAGE_EXTENSIONS.contains(&e))
}

fn load_rgb(path: &Path) -> Result<RgbImage> {
    let img = image::open(path).with_context(|| format!("decoding image {}", path.display()))?;
    Ok(img.to_rgb8())
}

/// Load every `.jpg`/`.png` image of one split with its label.
///
/// File names are recorded as `<split>/<file>`.
pub fn load_split(dataset_dir: &Path, split: Split) -> Result<Vec<DatasetImage>> {
    let dir = dataset_dir.join(split.dir_name());
    let labels = load_labels(&dir.join(LABELS_FILE))?;
    let yes: HashSet<&str> = labels.yes.iter().map(String::as_str).collect();

    let mut images = Vec::new();
    for path in sorted_files(&dir)? {
        if !has_image_extension(&path) {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            warn!(path = %path.display(), "skipping non UTF-8 file name");
            continue;
        };
        let label = if yes.contains(name) {
            Label::Yes
        } else {
            Label::No
        };
        images.push(DatasetImage {
            file_name: format!("{}/{name}", split.dir_name()),
            image: load_rgb(&path)?,
            label,
        });
    }
    debug!(split = split.dir_name(), count = images.len(), "split loaded");
    Ok(images)
}

/// Every decodable image in `templates_dir`, sorted by file name.
pub fn load_templates(templates_dir: &Path) -> Result<Vec<RgbImage>> {
    let mut templates = Vec::new();
    for path in sorted_files(templates_dir)? {
        match load_rgb(&path) {
            Ok(img) => templates.push(img),
            Err(e) => warn!(path = %path.display(), "skipping template: {e:#}"),
        }
    }
    debug!(count = templates.len(), "templates loaded");
    Ok(templates)
}
