//! Chair width from ORB matches against a template catalog.

use crate::diagnostics::{DiagnosticEvent, EstimationContext};
use crate::error::EstimateError;
use crate::features::{detect_and_compute, OrbFeatures};
use crate::overlay::{render_matches, save_artifact};
use crate::params::Hyperparameters;
use chairfit_core::matcher::{good_matches, match_cross_check};
use chairfit_core::{Match, OrbParams};
use image::{imageops, GrayImage, RgbImage};
#[cfg(feature = "rayon")]
use rayon::prelude::*;
use tracing::{debug, warn};

/// Ordered, non-empty set of reference chair photos.
#[derive(Clone, Debug)]
pub struct TemplateCatalog {
    images: Vec<RgbImage>,
}

impl TemplateCatalog {
    pub fn new(images: Vec<RgbImage>) -> Result<Self, EstimateError> {
        if images.is_empty() {
            return Err(EstimateError::EmptyTemplateCatalog);
        }
        Ok(Self { images })
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn get(&self, idx: usize) -> Option<&RgbImage> {
        self.images.get(idx)
    }

    pub fn iter(&self) -> impl Iterator<Item = &RgbImage> {
        self.images.iter()
    }
}

/// Outcome of scoring one template against the query.
#[derive(Clone, Debug)]
pub struct TemplateScore {
    pub template_idx: usize,
    pub features: OrbFeatures,
    /// Cross-checked matches within `orb_match_distance`.
    pub good: Vec<Match>,
}

/// Index of the largest count; ties keep the lowest index.
pub fn select_best_template(counts: &[usize]) -> Option<usize> {
    let mut best: Option<(usize, usize)> = None;
    for (i, &c) in counts.iter().enumerate() {
        match best {
            Some((_, b)) if c <= b => {}
            _ => best = Some((i, c)),
        }
    }
    best.map(|(i, _)| i)
}

/// Horizontal extent of the points lying in the seat region, as a fraction
/// of the image width.
///
/// The seat region is every `y > (1 − chair_height_coeff) · height`.
pub fn seat_region_width(
    points: &[[f32; 2]],
    width: u32,
    height: u32,
    chair_height_coeff: f32,
) -> Result<f32, EstimateError> {
    let top_edge_y = (1.0 - chair_height_coeff) * height as f32;
    let (min_x, max_x) = points
        .iter()
        .filter(|p| p[1] > top_edge_y)
        .fold(None, |acc: Option<(f32, f32)>, p| match acc {
            None => Some((p[0], p[0])),
            Some((lo, hi)) => Some((lo.min(p[0]), hi.max(p[0]))),
        })
        .ok_or(EstimateError::NoKeypointsInRegion)?;

    if width == 0 {
        return Ok(0.0);
    }
    Ok(((max_x - min_x) / width as f32).clamp(0.0, 1.0))
}

/// Features of every template and their good matches against `query`.
pub fn score_templates(
    query: &OrbFeatures,
    templates: &[GrayImage],
    orb: &OrbParams,
    max_distance: u32,
) -> Vec<TemplateScore> {
    let score = |(template_idx, gray): (usize, &GrayImage)| {
        let features = detect_and_compute(gray, orb);
        let all = match_cross_check(&features.descriptors, &query.descriptors);
        let good = good_matches(&all, max_distance);
        TemplateScore {
            template_idx,
            features,
            good,
        }
    };

    #[cfg(feature = "rayon")]
    let scores = templates.par_iter().enumerate().map(score).collect();

    #[cfg(not(feature = "rayon"))]
    let scores = templates.iter().enumerate().map(score).collect();

    scores
}

/// Estimate the chair width in `query` as a fraction of its width.
pub fn estimate_chair_width(
    query: &RgbImage,
    templates: &TemplateCatalog,
    params: &Hyperparameters,
    ctx: &EstimationContext,
) -> Result<f32, EstimateError> {
    let orb = OrbParams::with_features(params.num_orb_features() as usize);
    let query_gray = imageops::grayscale(query);
    let query_features = detect_and_compute(&query_gray, &orb);

    let grays: Vec<GrayImage> = templates.iter().map(|t| imageops::grayscale(t)).collect();
    let scores = score_templates(
        &query_features,
        &grays,
        &orb,
        params.orb_match_distance(),
    );

    let counts: Vec<usize> = scores.iter().map(|s| s.good.len()).collect();
    for s in &scores {
        ctx.emit(DiagnosticEvent::TemplateScored {
            template: s.template_idx,
            good_matches: s.good.len(),
        });
    }

    let best = match select_best_template(&counts) {
        Some(i) if counts[i] > 0 => &scores[i],
        _ => return Err(EstimateError::NoMatchFound),
    };
    debug!(
        image = ctx.image_name,
        template = best.template_idx,
        good = best.good.len(),
        "best template"
    );
    ctx.emit(DiagnosticEvent::BestTemplate {
        template: best.template_idx,
        good_matches: best.good.len(),
    });

    if let Some(path) = ctx.artifact_path("matches") {
        if let Some(template) = templates.get(best.template_idx) {
            let vis = render_matches(
                template,
                &best.features.keypoints,
                query,
                &query_features.keypoints,
                &best.good,
            );
            match save_artifact(&vis, &path) {
                Ok(()) => ctx.emit(DiagnosticEvent::ArtifactSaved { path }),
                Err(e) => warn!(image = ctx.image_name, "{e}"),
            }
        }
    }

    let points: Vec<[f32; 2]> = best
        .good
        .iter()
        .filter_map(|m| query_features.keypoints.get(m.query_idx))
        .map(|kp| kp.xy)
        .collect();
    let top_edge_y = (1.0 - params.chair_height_coeff()) * query.height() as f32;
    let seat_keypoints = points.iter().filter(|p| p[1] > top_edge_y).count();

    let width = seat_region_width(
        &points,
        query.width(),
        query.height(),
        params.chair_height_coeff(),
    )?;
    ctx.emit(DiagnosticEvent::ChairWidth {
        width,
        seat_keypoints,
    });
    Ok(width)
}
