//! Door width from near-vertical Hough lines.

use crate::diagnostics::{DiagnosticEvent, EstimationContext};
use crate::error::EstimateError;
use crate::overlay::{render_hough, save_artifact};
use crate::params::Hyperparameters;
use chairfit_core::hough::{self, HoughLine, HoughParams};
use chairfit_core::threshold::{sauvola_mask, SauvolaParams};
use chairfit_core::BinaryMask;
use image::{ImageBuffer, Luma, RgbImage};
use tracing::{debug, warn};

/// Gaussian sigma applied before thresholding.
pub const DOOR_BLUR_SIGMA: f32 = 3.5;

/// Grayscale in `[0, 1]` with ITU-R 709 luma weights.
pub fn to_gray_f32(img: &RgbImage) -> ImageBuffer<Luma<f32>, Vec<f32>> {
    ImageBuffer::from_fn(img.width(), img.height(), |x, y| {
        let [r, g, b] = img.get_pixel(x, y).0;
        let v = 0.2125 * r as f32 + 0.7154 * g as f32 + 0.0721 * b as f32;
        Luma([v / 255.0])
    })
}

/// Blur and Sauvola-threshold `img`; dark structures become foreground.
pub fn binarize(img: &RgbImage) -> BinaryMask {
    let gray = to_gray_f32(img);
    let blurred = imageproc::filter::gaussian_blur_f32(&gray, DOOR_BLUR_SIGMA);
    sauvola_mask(
        blurred.as_raw(),
        blurred.width() as usize,
        blurred.height() as usize,
        &SauvolaParams::default(),
    )
}

/// Hough peaks of `mask` with the default accumulator settings.
pub fn detect_lines(mask: &BinaryMask) -> Vec<HoughLine> {
    hough::detect_lines(mask, &HoughParams::default())
}

/// Spread between the outermost near-vertical lines, as a fraction of
/// `width`.
///
/// A line is near-vertical when `|angle| <= vertical_coeff`.
pub fn door_width_from_lines(
    lines: &[HoughLine],
    width: u32,
    vertical_coeff: f32,
) -> Result<f32, EstimateError> {
    let (lo, hi) = lines
        .iter()
        .filter(|l| l.angle.abs() <= vertical_coeff)
        .fold(None, |acc: Option<(f32, f32)>, l| match acc {
            None => Some((l.distance, l.distance)),
            Some((lo, hi)) => Some((lo.min(l.distance), hi.max(l.distance))),
        })
        .ok_or(EstimateError::NoVerticalLineFound)?;

    if width == 0 {
        return Ok(0.0);
    }
    Ok(((hi - lo) / width as f32).clamp(0.0, 1.0))
}

/// Estimate the door width in `query` as a fraction of its width.
pub fn estimate_door_width(
    query: &RgbImage,
    params: &Hyperparameters,
    ctx: &EstimationContext,
) -> Result<f32, EstimateError> {
    let mask = binarize(query);
    let lines = detect_lines(&mask);
    let coeff = params.vertical_line_hough_coeff();
    let vertical = lines.iter().filter(|l| l.angle.abs() <= coeff).count();
    debug!(
        image = ctx.image_name,
        foreground = mask.count(),
        lines = lines.len(),
        vertical,
        "door lines"
    );
    ctx.emit(DiagnosticEvent::LinesDetected {
        total: lines.len(),
        vertical,
    });

    if let Some(path) = ctx.artifact_path("door_hough") {
        match save_artifact(&render_hough(&mask, &lines), &path) {
            Ok(()) => ctx.emit(DiagnosticEvent::ArtifactSaved { path }),
            Err(e) => warn!(image = ctx.image_name, "{e}"),
        }
    }

    let width = door_width_from_lines(&lines, query.width(), coeff)?;
    ctx.emit(DiagnosticEvent::DoorWidth { width });
    Ok(width)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(angle: f32, distance: f32) -> HoughLine {
        HoughLine {
            angle,
            distance,
            votes: 10,
        }
    }

    #[test]
    fn width_spans_outermost_vertical_lines() {
        let lines = [line(0.0, 50.0), line(0.1, 200.0), line(-0.05, 350.0)];
        let w = door_width_from_lines(&lines, 400, 0.3).unwrap();
        assert!((w - 0.75).abs() < 1e-6);
    }

    #[test]
    fn slanted_lines_are_ignored() {
        let lines = [line(0.0, 50.0), line(1.2, 390.0), line(-1.5, -10.0)];
        let w = door_width_from_lines(&lines, 400, 0.3).unwrap();
        assert_eq!(w, 0.0);
    }

    #[test]
    fn no_vertical_line_is_an_error() {
        assert_eq!(
            door_width_from_lines(&[], 400, 0.3),
            Err(EstimateError::NoVerticalLineFound)
        );
        assert_eq!(
            door_width_from_lines(&[line(0.5, 10.0)], 400, 0.3),
            Err(EstimateError::NoVerticalLineFound)
        );
    }

    #[test]
    fn width_is_clamped() {
        let lines = [line(0.0, -300.0), line(0.0, 300.0)];
        assert_eq!(door_width_from_lines(&lines, 400, 0.3), Ok(1.0));
    }

    #[test]
    fn uniform_image_has_empty_mask() {
        let img = RgbImage::from_pixel(40, 30, image::Rgb([120, 120, 120]));
        assert_eq!(binarize(&img).count(), 0);
    }
}
