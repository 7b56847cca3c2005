//! Diagnostic renderings saved next to verbose runs.

use crate::error::EstimateError;
use chairfit_core::{BinaryMask, HoughLine, Keypoint, Match};
use image::{imageops, Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_circle_mut, draw_line_segment_mut};
use std::path::Path;

const KEYPOINT_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const MATCH_COLOR: Rgb<u8> = Rgb([255, 0, 255]);
const LINE_COLOR: Rgb<u8> = Rgb([255, 0, 0]);

/// Write a rendering to `path`; the format follows the file extension.
pub fn save_artifact(img: &RgbImage, path: &Path) -> Result<(), EstimateError> {
    img.save(path)
        .map_err(|e| EstimateError::Artifact(format!("{}: {e}", path.display())))
}

/// Template on the left, query on the right, matched keypoints circled and
/// joined.
pub fn render_matches(
    template: &RgbImage,
    template_kps: &[Keypoint],
    query: &RgbImage,
    query_kps: &[Keypoint],
    matches: &[Match],
) -> RgbImage {
    let offset = template.width();
    let mut canvas = RgbImage::new(
        template.width() + query.width(),
        template.height().max(query.height()),
    );
    imageops::overlay(&mut canvas, template, 0, 0);
    imageops::overlay(&mut canvas, query, offset as i64, 0);

    for m in matches {
        let (Some(t), Some(q)) = (template_kps.get(m.template_idx), query_kps.get(m.query_idx))
        else {
            continue;
        };
        let a = (t.xy[0], t.xy[1]);
        let b = (q.xy[0] + offset as f32, q.xy[1]);
        draw_hollow_circle_mut(&mut canvas, (a.0 as i32, a.1 as i32), 4, KEYPOINT_COLOR);
        draw_hollow_circle_mut(&mut canvas, (b.0 as i32, b.1 as i32), 4, KEYPOINT_COLOR);
        draw_line_segment_mut(&mut canvas, a, b, MATCH_COLOR);
    }
    canvas
}

/// Binary mask (foreground white) on the left, the same mask with every
/// detected line drawn in red on the right.
pub fn render_hough(mask: &BinaryMask, lines: &[HoughLine]) -> RgbImage {
    let (w, h) = (mask.w as u32, mask.h as u32);
    let plain = RgbImage::from_fn(w, h, |x, y| {
        if mask.at(x as usize, y as usize) {
            Rgb([255, 255, 255])
        } else {
            Rgb([0, 0, 0])
        }
    });

    let mut lined = plain.clone();
    for line in lines {
        if let Some((a, b)) = clip_line(line, w as f32, h as f32) {
            draw_line_segment_mut(&mut lined, a, b, LINE_COLOR);
        }
    }

    let mut canvas = RgbImage::new(2 * w, h);
    imageops::overlay(&mut canvas, &plain, 0, 0);
    imageops::overlay(&mut canvas, &lined, w as i64, 0);
    canvas
}

/// End points of `ρ = x·cos θ + y·sin θ` across the image rectangle.
fn clip_line(line: &HoughLine, w: f32, h: f32) -> Option<((f32, f32), (f32, f32))> {
    let (s, c) = line.angle.sin_cos();
    let rho = line.distance;
    if c.abs() >= s.abs() {
        // steep: solve for x at the top and bottom rows
        let x0 = rho / c;
        let x1 = (rho - (h - 1.0) * s) / c;
        Some(((x0, 0.0), (x1, h - 1.0)))
    } else if s.abs() > f32::EPSILON {
        let y0 = rho / s;
        let y1 = (rho - (w - 1.0) * c) / s;
        Some(((0.0, y0), (w - 1.0, y1)))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hough_rendering_is_side_by_side() {
        let mut data = vec![false; 40 * 20];
        for y in 0..20 {
            data[y * 40 + 10] = true;
        }
        let mask = BinaryMask { w: 40, h: 20, data };
        let line = HoughLine {
            angle: 0.0,
            distance: 30.0,
            votes: 20,
        };
        let img = render_hough(&mask, &[line]);
        assert_eq!(img.dimensions(), (80, 20));
        assert_eq!(*img.get_pixel(10, 5), Rgb([255, 255, 255]));
        assert_eq!(*img.get_pixel(30, 5), Rgb([0, 0, 0]));
        assert_eq!(*img.get_pixel(40 + 30, 5), LINE_COLOR);
    }

    #[test]
    fn clip_vertical_line_spans_rows() {
        let line = HoughLine {
            angle: 0.0,
            distance: 7.0,
            votes: 1,
        };
        let (a, b) = clip_line(&line, 20.0, 10.0).unwrap();
        assert_eq!(a, (7.0, 0.0));
        assert_eq!(b, (7.0, 9.0));
    }

    #[test]
    fn match_rendering_is_side_by_side() {
        let t = RgbImage::from_pixel(30, 20, Rgb([10, 10, 10]));
        let q = RgbImage::from_pixel(50, 40, Rgb([200, 200, 200]));
        let img = render_matches(&t, &[], &q, &[], &[]);
        assert_eq!(img.dimensions(), (80, 40));
        assert_eq!(*img.get_pixel(5, 5), Rgb([10, 10, 10]));
        assert_eq!(*img.get_pixel(35, 35), Rgb([200, 200, 200]));
        assert_eq!(*img.get_pixel(5, 35), Rgb([0, 0, 0]));
    }

    #[test]
    fn unwritable_artifact_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("matches_x.png");
        let img = RgbImage::new(4, 4);
        match save_artifact(&img, &path) {
            Err(EstimateError::Artifact(msg)) => assert!(msg.contains("matches_x.png"), "{msg}"),
            other => panic!("expected an artifact error, got {other:?}"),
        }
        assert!(!path.exists());

        let ok = dir.path().join("ok.png");
        assert_eq!(save_artifact(&img, &ok), Ok(()));
        assert!(ok.is_file());
    }
}
