//! Scale pyramid used by the ORB extractor.

use image::imageops::{resize, FilterType};
use image::GrayImage;

/// A single pyramid level. The `scale` is relative to the base image.
pub struct PyramidLevel {
    pub img: GrayImage,
    pub scale: f32, // relative to base (e.g. 1.0, 1/1.2, 1/1.44, ...)
}

/// A top-down pyramid where `levels[0]` is the base (full resolution).
pub struct Pyramid {
    pub levels: Vec<PyramidLevel>, // levels[0] is base
}

/// Parameters controlling pyramid generation.
pub struct PyramidParams {
    /// Maximum number of levels (including the base).
    pub num_levels: u8,
    /// Size ratio between consecutive levels (> 1).
    pub scale_factor: f32,
    /// Stop building when either dimension falls below this value.
    pub min_size: u32,
}

impl Default for PyramidParams {
    fn default() -> Self {
        Self {
            num_levels: 8,
            scale_factor: 1.2,
            min_size: 63,
        }
    }
}

/// Build a top-down image pyramid.
///
/// The base image is level 0. Level `l` is the base resized (triangle
/// filter) by `scale_factor^-l`, rounded to whole pixels. Construction stops
/// when:
/// - either dimension would fall below `min_size`, or
/// - `num_levels` is reached.
pub fn build_pyramid(base: &GrayImage, pp: &PyramidParams) -> Pyramid {
    let mut levels = Vec::new();
    let factor = pp.scale_factor.max(1.0 + f32::EPSILON);

    for level in 0..pp.num_levels {
        let scale = factor.powi(-(level as i32));
        let w = (base.width() as f32 * scale).round() as u32;
        let h = (base.height() as f32 * scale).round() as u32;
        if w < pp.min_size || h < pp.min_size {
            break;
        }

        let img = if level == 0 {
            base.clone()
        } else {
            resize(base, w, h, FilterType::Triangle)
        };
        levels.push(PyramidLevel { img, scale });
    }

    Pyramid { levels }
}
