//! Core primitives for the chair/door width estimators.
//!
//! # Overview
//!
//! Everything in this crate works on row-major 8-bit (`&[u8]`) or float
//! (`&[f32]`) buffers together with their width and height, so it can be
//! reused without pulling in an image library:
//!
//! - [`orb`] – Harris ranking, intensity-centroid orientation and rotated
//!   BRIEF descriptors for the corner candidates of one pyramid level.
//! - [`matcher`] – brute-force Hamming matching with cross-check.
//! - [`threshold`] – integral images and Sauvola local thresholding.
//! - [`hough`] – straight-line Hough accumulator and peak extraction.
//!
//! # Features
//!
//! - `rayon` – parallelizes descriptor matching and the Hough
//!   accumulation over angles. Results are identical to the sequential path.
//! - `tracing` – adds `tracing` spans to the hot entry points.

pub mod hough;
pub mod matcher;
pub mod orb;
pub mod threshold;

pub use crate::hough::{HoughAccumulator, HoughLine, HoughParams};
pub use crate::matcher::Match;
pub use crate::orb::{Descriptor, Feature, Keypoint};

/// Tunable parameters of the ORB extractor.
///
/// Defaults mirror the classic ORB configuration (8 levels, scale 1.2,
/// 31‑pixel patch, FAST threshold 20).
#[derive(Clone, Debug)]
pub struct OrbParams {
    /// Total keypoint budget across all pyramid levels.
    pub n_features: usize,
    /// Ratio between consecutive pyramid levels (> 1).
    pub scale_factor: f32,
    /// Number of pyramid levels, including the base image.
    pub n_levels: u8,
    /// Border (in level pixels) where no keypoints are detected.
    pub edge_threshold: u32,
    /// FAST intensity threshold.
    pub fast_threshold: u8,
    /// Side of the square patch used by orientation and descriptors.
    pub patch_size: u32,
    /// Harris detector free parameter.
    pub harris_k: f32,
    /// Side of the Harris structure-tensor window.
    pub harris_block: u32,
    /// Gaussian sigma applied to a level before descriptor sampling.
    pub descriptor_sigma: f32,
}

impl Default for OrbParams {
    fn default() -> Self {
        Self {
            n_features: 500,
            scale_factor: 1.2,
            n_levels: 8,
            edge_threshold: 31,
            fast_threshold: 20,
            patch_size: 31,
            harris_k: 0.04,
            harris_block: 7,
            descriptor_sigma: 2.0,
        }
    }
}

impl OrbParams {
    /// Default configuration with a custom keypoint budget.
    pub fn with_features(n_features: usize) -> Self {
        Self {
            n_features,
            ..Self::default()
        }
    }

    /// Split the keypoint budget across pyramid levels.
    ///
    /// Each level gets a share proportional to its area scale
    /// (`(1/s)^level`); the last level receives whatever is left so the
    /// shares always sum to `n_features`.
    pub fn features_per_level(&self) -> Vec<usize> {
        let levels = self.n_levels.max(1) as usize;
        let factor = 1.0 / self.scale_factor as f64;
        let total = self.n_features;

        let mut per_level = Vec::with_capacity(levels);
        let first = if (factor - 1.0).abs() < f64::EPSILON {
            total as f64 / levels as f64
        } else {
            total as f64 * (1.0 - factor) / (1.0 - factor.powi(levels as i32))
        };

        let mut assigned = 0usize;
        let mut desired = first;
        for _ in 0..levels - 1 {
            let n = (desired.round() as usize).min(total - assigned);
            per_level.push(n);
            assigned += n;
            desired *= factor;
        }
        per_level.push(total - assigned);
        per_level
    }

    #[inline]
    pub(crate) fn half_patch(&self) -> i32 {
        (self.patch_size / 2) as i32
    }
}

/// Binary mask in row-major layout.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BinaryMask {
    pub w: usize,
    pub h: usize,
    pub data: Vec<bool>,
}

impl BinaryMask {
    #[inline]
    /// Mask value at an integer coordinate.
    pub fn at(&self, x: usize, y: usize) -> bool {
        self.data[y * self.w + x]
    }

    /// Number of set pixels.
    pub fn count(&self) -> usize {
        self.data.iter().filter(|&&v| v).count()
    }
}
