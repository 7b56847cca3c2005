//! ORB feature extraction on `image::GrayImage`.
//!
//! Builds the scale pyramid, finds FAST-9 corners on every level with
//! `imageproc`, and hands them to the `chairfit-core` describer together with
//! the level's share of the keypoint budget. Keypoints are reported in
//! base-image coordinates.

use crate::pyramid::{build_pyramid, PyramidParams};
use chairfit_core::orb::describe_level;
use chairfit_core::{Descriptor, Feature, Keypoint, OrbParams};
use image::GrayImage;
use imageproc::corners::{corners_fast9, Corner};
use imageproc::suppress::local_maxima;
#[cfg(feature = "rayon")]
use rayon::prelude::*;

/// Keypoints and descriptors of one image, index-aligned.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct OrbFeatures {
    pub keypoints: Vec<Keypoint>,
    pub descriptors: Vec<Descriptor>,
}

impl OrbFeatures {
    pub fn len(&self) -> usize {
        self.keypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keypoints.is_empty()
    }

    fn push(&mut self, f: Feature) {
        self.keypoints.push(f.keypoint);
        self.descriptors.push(f.descriptor);
    }
}

/// FAST-9 corners of one level after 3×3 non-maximum suppression, in raster
/// order.
pub fn level_corners(img: &GrayImage, threshold: u8) -> Vec<[usize; 2]> {
    let corners = corners_fast9(img, threshold);
    let mut pts: Vec<[usize; 2]> = local_maxima(&corners, 1)
        .into_iter()
        .map(|Corner { x, y, .. }| [x as usize, y as usize])
        .collect();
    pts.sort_unstable_by_key(|&[x, y]| (y, x));
    pts
}

/// Detect oriented keypoints and compute their descriptors.
///
/// Output is ordered by pyramid level, then by descending Harris response,
/// and is fully deterministic for a given image and parameter set.
pub fn detect_and_compute(img: &GrayImage, params: &OrbParams) -> OrbFeatures {
    let pp = PyramidParams {
        num_levels: params.n_levels,
        scale_factor: params.scale_factor,
        min_size: 2 * params.edge_threshold + 1,
    };
    let pyramid = build_pyramid(img, &pp);
    let budgets = params.features_per_level();

    let extract = |(level, lvl): (usize, &crate::pyramid::PyramidLevel)| -> Vec<Feature> {
        let budget = budgets.get(level).copied().unwrap_or(0);
        let smoothed = imageproc::filter::gaussian_blur_f32(&lvl.img, params.descriptor_sigma);
        let (w, h) = (lvl.img.width() as usize, lvl.img.height() as usize);
        let inv_scale = 1.0 / lvl.scale;

        let candidates = level_corners(&lvl.img, params.fast_threshold);
        let mut features = describe_level(
            lvl.img.as_raw(),
            smoothed.as_raw(),
            w,
            h,
            params,
            &candidates,
            budget,
        );
        for f in &mut features {
            f.keypoint.xy[0] *= inv_scale;
            f.keypoint.xy[1] *= inv_scale;
            f.keypoint.octave = level as u8;
        }
        features
    };

    #[cfg(feature = "rayon")]
    let per_level: Vec<Vec<Feature>> = pyramid.levels.par_iter().enumerate().map(extract).collect();

    #[cfg(not(feature = "rayon"))]
    let per_level: Vec<Vec<Feature>> = pyramid.levels.iter().enumerate().map(extract).collect();

    let mut out = OrbFeatures::default();
    for f in per_level.into_iter().flatten() {
        out.push(f);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn squares(w: u32, h: u32) -> GrayImage {
        GrayImage::from_fn(w, h, |x, y| {
            if (x / 6) % 3 == 0 && (y / 6) % 3 == 0 {
                Luma([220u8])
            } else {
                Luma([25u8])
            }
        })
    }

    #[test]
    fn blank_image_has_no_features() {
        let img = GrayImage::from_pixel(160, 120, Luma([0u8]));
        let f = detect_and_compute(&img, &OrbParams::with_features(500));
        assert!(f.is_empty());
    }

    #[test]
    fn square_corners_are_found() {
        let mut img = GrayImage::from_pixel(64, 64, Luma([30u8]));
        for y in 20..44 {
            for x in 20..44 {
                img.put_pixel(x, y, Luma([220u8]));
            }
        }
        let pts = level_corners(&img, 20);
        for (cx, cy) in [(20usize, 20usize), (43, 20), (20, 43), (43, 43)] {
            assert!(
                pts.iter().any(|&[x, y]| x.abs_diff(cx) <= 2 && y.abs_diff(cy) <= 2),
                "missing corner near ({cx},{cy}): {pts:?}"
            );
        }
        assert!(pts.windows(2).all(|p| (p[0][1], p[0][0]) < (p[1][1], p[1][0])));
    }

    #[test]
    fn base_level_keypoints_respect_edge_threshold() {
        let img = squares(200, 160);
        let params = OrbParams::with_features(300);
        let f = detect_and_compute(&img, &params);
        let edge = params.edge_threshold as f32;
        let base: Vec<_> = f.keypoints.iter().filter(|k| k.octave == 0).collect();
        assert!(!base.is_empty());
        for kp in base {
            assert!(kp.xy[0] >= edge && kp.xy[0] < 200.0 - edge, "{kp:?}");
            assert!(kp.xy[1] >= edge && kp.xy[1] < 160.0 - edge, "{kp:?}");
        }
    }

    #[test]
    fn keypoints_stay_inside_base_image() {
        let img = squares(200, 160);
        let f = detect_and_compute(&img, &OrbParams::with_features(300));
        assert!(!f.is_empty());
        assert!(f.len() <= 300);
        assert_eq!(f.keypoints.len(), f.descriptors.len());
        for kp in &f.keypoints {
            assert!(kp.xy[0] >= 0.0 && kp.xy[0] < 200.0);
            assert!(kp.xy[1] >= 0.0 && kp.xy[1] < 160.0);
        }
    }
}
