//! Oriented FAST + rotated BRIEF features for a single pyramid level.
//!
//! Corner detection happens upstream; [`describe_level`] takes the candidate
//! positions of one level and does the rest: Harris ranking and budget
//! truncation, intensity-centroid orientation and a 256-bit steered BRIEF
//! descriptor sampled on a pre-smoothed copy of the level.
use crate::OrbParams;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::OnceLock;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Number of point-pair tests in a descriptor.
pub const DESCRIPTOR_BITS: usize = 256;

/// Seed of the sampling pattern. Changing it changes every descriptor.
const PATTERN_SEED: u64 = 0x0b_2011;

/// Pattern coordinates are drawn from `[-PATTERN_EXTENT, PATTERN_EXTENT]`,
/// which keeps rotated samples inside a 31×31 patch.
const PATTERN_EXTENT: i32 = 13;

/// An oriented keypoint.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Keypoint {
    /// Position in image coordinates (x, y). Level-local until rescaled by
    /// the caller.
    pub xy: [f32; 2],
    /// Harris response at the FAST peak.
    pub response: f32,
    /// Intensity-centroid orientation in radians, in (-π, π].
    pub angle: f32,
    /// Pyramid level the keypoint was found on.
    pub octave: u8,
}

/// 256-bit binary descriptor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct Descriptor(pub [u64; 4]);

impl Descriptor {
    /// Hamming distance to another descriptor.
    #[inline]
    pub fn hamming(&self, other: &Descriptor) -> u32 {
        self.0
            .iter()
            .zip(other.0.iter())
            .map(|(a, b)| (a ^ b).count_ones())
            .sum()
    }

    #[inline]
    fn set_bit(&mut self, bit: usize) {
        self.0[bit / 64] |= 1u64 << (bit % 64);
    }
}

/// Keypoint paired with its descriptor.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Feature {
    pub keypoint: Keypoint,
    pub descriptor: Descriptor,
}

/// Sampling pattern: `DESCRIPTOR_BITS` pairs of patch offsets.
pub type BriefPattern = [[(i8, i8); 2]; DESCRIPTOR_BITS];

/// Shared test pattern, generated once from a fixed seed.
pub fn brief_pattern() -> &'static BriefPattern {
    static PATTERN: OnceLock<BriefPattern> = OnceLock::new();
    PATTERN.get_or_init(|| {
        let mut rng = StdRng::seed_from_u64(PATTERN_SEED);
        let mut pattern = [[(0i8, 0i8); 2]; DESCRIPTOR_BITS];
        for pair in pattern.iter_mut() {
            loop {
                let a = sample_offset(&mut rng);
                let b = sample_offset(&mut rng);
                if a != b {
                    *pair = [a, b];
                    break;
                }
            }
        }
        pattern
    })
}

fn sample_offset(rng: &mut StdRng) -> (i8, i8) {
    let x = rng.gen_range(-PATTERN_EXTENT..=PATTERN_EXTENT) as i8;
    let y = rng.gen_range(-PATTERN_EXTENT..=PATTERN_EXTENT) as i8;
    (x, y)
}

/// Describe corner candidates found on one pyramid level.
///
/// `raw` is the level image used for Harris scoring and orientation;
/// `smoothed` is the same level after Gaussian smoothing and is only used for
/// descriptor sampling. Candidates closer than the edge threshold (or half a
/// patch) to the image border are dropped. At most `budget` keypoints with the
/// strongest Harris response are kept; equal responses keep raster order.
#[cfg_attr(
    feature = "tracing",
    instrument(
        level = "debug",
        skip(raw, smoothed, params, candidates),
        fields(w = w, h = h, candidates = candidates.len(), budget = budget)
    )
)]
pub fn describe_level(
    raw: &[u8],
    smoothed: &[u8],
    w: usize,
    h: usize,
    params: &OrbParams,
    candidates: &[[usize; 2]],
    budget: usize,
) -> Vec<Feature> {
    if budget == 0 || w == 0 || h == 0 {
        return Vec::new();
    }

    let border = params.edge_threshold.max(params.patch_size / 2 + 1) as usize;
    if w <= 2 * border || h <= 2 * border {
        return Vec::new();
    }

    let block = params.harris_block.max(3) as i32;
    let mut scored: Vec<([usize; 2], f32)> = candidates
        .iter()
        .filter(|&&[x, y]| x >= border && y >= border && x < w - border && y < h - border)
        .map(|&[x, y]| ([x, y], harris_response(raw, w, h, x, y, block, params.harris_k)))
        .collect();

    // strongest first; raster order breaks ties
    scored.sort_by(|a, b| {
        b.1.total_cmp(&a.1)
            .then(a.0[1].cmp(&b.0[1]))
            .then(a.0[0].cmp(&b.0[0]))
    });
    scored.dedup_by(|a, b| a.0 == b.0);
    scored.truncate(budget);

    let half = params.half_patch();
    let pattern = brief_pattern();
    scored
        .into_iter()
        .map(|([x, y], response)| {
            let angle = intensity_centroid_angle(raw, w, h, x, y, half);
            let descriptor = steered_brief(smoothed, w, h, x as f32, y as f32, angle, pattern);
            Feature {
                keypoint: Keypoint {
                    xy: [x as f32, y as f32],
                    response,
                    angle,
                    octave: 0,
                },
                descriptor,
            }
        })
        .collect()
}

/// Harris corner measure `det(M) − k·trace(M)²` of the structure tensor
/// accumulated over a `block`×`block` window around (x, y).
pub fn harris_response(
    img: &[u8],
    w: usize,
    h: usize,
    x: usize,
    y: usize,
    block: i32,
    k: f32,
) -> f32 {
    if w == 0 || h == 0 {
        return 0.0;
    }

    let cx = x as i32;
    let cy = y as i32;
    let max_x = w.saturating_sub(1) as i32;
    let max_y = h.saturating_sub(1) as i32;
    let r = block / 2;

    let mut s_xx = 0.0f32;
    let mut s_xy = 0.0f32;
    let mut s_yy = 0.0f32;

    for dy in -r..=r {
        let yy = (cy + dy).clamp(0, max_y);
        let y_idx = yy as usize;
        for dx in -r..=r {
            let xx = (cx + dx).clamp(0, max_x);
            let x_idx = xx as usize;

            let x_plus = (xx + 1).clamp(0, max_x) as usize;
            let x_minus = (xx - 1).clamp(0, max_x) as usize;
            let y_plus = (yy + 1).clamp(0, max_y) as usize;
            let y_minus = (yy - 1).clamp(0, max_y) as usize;

            let ix = img[y_idx * w + x_plus] as f32 - img[y_idx * w + x_minus] as f32;
            let iy = img[y_plus * w + x_idx] as f32 - img[y_minus * w + x_idx] as f32;

            s_xx += ix * ix;
            s_xy += ix * iy;
            s_yy += iy * iy;
        }
    }

    // scale to keep the magnitude comparable across block sizes
    let norm = 1.0 / (255.0 * (block * block) as f32);
    let (s_xx, s_xy, s_yy) = (s_xx * norm, s_xy * norm, s_yy * norm);
    let trace = s_xx + s_yy;
    let det = s_xx * s_yy - s_xy * s_xy;
    det - k * trace * trace
}

/// Orientation of the intensity centroid inside a disc of `radius` pixels.
pub fn intensity_centroid_angle(
    img: &[u8],
    w: usize,
    h: usize,
    x: usize,
    y: usize,
    radius: i32,
) -> f32 {
    let cx = x as i32;
    let cy = y as i32;
    let max_x = w.saturating_sub(1) as i32;
    let max_y = h.saturating_sub(1) as i32;
    let r2 = radius * radius;

    let mut m01 = 0.0f32;
    let mut m10 = 0.0f32;
    for dy in -radius..=radius {
        let yy = (cy + dy).clamp(0, max_y) as usize;
        for dx in -radius..=radius {
            if dx * dx + dy * dy > r2 {
                continue;
            }
            let xx = (cx + dx).clamp(0, max_x) as usize;
            let v = img[yy * w + xx] as f32;
            m10 += dx as f32 * v;
            m01 += dy as f32 * v;
        }
    }

    let angle = m01.atan2(m10);
    if angle.is_finite() {
        angle
    } else {
        0.0
    }
}

/// BRIEF descriptor with the sampling pattern rotated by `angle`.
pub fn steered_brief(
    img: &[u8],
    w: usize,
    h: usize,
    x: f32,
    y: f32,
    angle: f32,
    pattern: &BriefPattern,
) -> Descriptor {
    let (s, c) = angle.sin_cos();
    let rotate = |(px, py): (i8, i8)| -> (f32, f32) {
        let px = px as f32;
        let py = py as f32;
        (x + c * px - s * py, y + s * px + c * py)
    };

    let mut desc = Descriptor::default();
    for (bit, pair) in pattern.iter().enumerate() {
        let (ax, ay) = rotate(pair[0]);
        let (bx, by) = rotate(pair[1]);
        let a = sample_bilinear(img, w, h, ax, ay);
        let b = sample_bilinear(img, w, h, bx, by);
        if a < b {
            desc.set_bit(bit);
        }
    }
    desc
}

fn sample_bilinear(img: &[u8], w: usize, h: usize, x: f32, y: f32) -> f32 {
    if w == 0 || h == 0 {
        return 0.0;
    }

    let max_x = (w - 1) as f32;
    let max_y = (h - 1) as f32;
    let xf = x.clamp(0.0, max_x);
    let yf = y.clamp(0.0, max_y);

    let x0 = xf.floor() as usize;
    let y0 = yf.floor() as usize;
    let x1 = (x0 + 1).min(w - 1);
    let y1 = (y0 + 1).min(h - 1);

    let wx = xf - x0 as f32;
    let wy = yf - y0 as f32;

    let i00 = img[y0 * w + x0] as f32;
    let i10 = img[y0 * w + x1] as f32;
    let i01 = img[y1 * w + x0] as f32;
    let i11 = img[y1 * w + x1] as f32;

    let i0 = i00 * (1.0 - wx) + i10 * wx;
    let i1 = i01 * (1.0 - wx) + i11 * wx;
    i0 * (1.0 - wy) + i1 * wy
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checker(w: usize, h: usize, cell: usize) -> Vec<u8> {
        let mut img = vec![0u8; w * h];
        for y in 0..h {
            for x in 0..w {
                let v = ((x / cell) + (y / cell)) % 2;
                img[y * w + x] = if v == 0 { 40 } else { 210 };
            }
        }
        img
    }

    fn squares(w: usize, h: usize, spacing: usize, side: usize) -> Vec<u8> {
        let mut img = vec![30u8; w * h];
        for y in 0..h {
            for x in 0..w {
                if x % spacing < side && y % spacing < side {
                    img[y * w + x] = 220;
                }
            }
        }
        img
    }

    #[test]
    fn hamming_counts_differing_bits() {
        let a = Descriptor([0, 0, 0, 0]);
        let b = Descriptor([0b1011, 0, u64::MAX, 1]);
        assert_eq!(a.hamming(&b), 3 + 64 + 1);
        assert_eq!(b.hamming(&b), 0);
    }

    #[test]
    fn pattern_is_stable_and_within_patch() {
        let p1 = brief_pattern();
        let p2 = brief_pattern();
        assert!(std::ptr::eq(p1, p2));
        for pair in p1.iter() {
            assert_ne!(pair[0], pair[1]);
            for &(x, y) in pair.iter() {
                assert!(x.unsigned_abs() as i32 <= PATTERN_EXTENT);
                assert!(y.unsigned_abs() as i32 <= PATTERN_EXTENT);
            }
        }
    }

    #[test]
    fn centroid_points_towards_bright_side() {
        let (w, h) = (41, 41);
        let mut img = vec![0u8; w * h];
        for y in 0..h {
            for x in 21..w {
                img[y * w + x] = 255;
            }
        }
        let angle = intensity_centroid_angle(&img, w, h, 20, 20, 15);
        assert!(angle.abs() < 1e-3, "angle={angle}");
    }

    #[test]
    fn harris_prefers_corners_over_edges() {
        let (w, h) = (64, 64);
        let img = checker(w, h, 16);
        let corner = harris_response(&img, w, h, 32, 32, 7, 0.04);
        let edge = harris_response(&img, w, h, 32, 24, 7, 0.04);
        assert!(corner > edge, "corner={corner} edge={edge}");
    }

    /// Corners of every square in `squares(w, h, spacing, side)`.
    fn square_corners(w: usize, h: usize, spacing: usize, side: usize) -> Vec<[usize; 2]> {
        let mut pts = Vec::new();
        for y0 in (0..h).step_by(spacing) {
            for x0 in (0..w).step_by(spacing) {
                for [x, y] in [[x0, y0], [x0 + side - 1, y0], [x0, y0 + side - 1], [x0 + side - 1, y0 + side - 1]] {
                    if x < w && y < h {
                        pts.push([x, y]);
                    }
                }
            }
        }
        pts
    }

    #[test]
    fn description_respects_budget_and_is_deterministic() {
        let (w, h) = (128, 128);
        let img = squares(w, h, 16, 7);
        let params = OrbParams::default();
        let pts = square_corners(w, h, 16, 7);
        let a = describe_level(&img, &img, w, h, &params, &pts, 10);
        let b = describe_level(&img, &img, w, h, &params, &pts, 10);
        assert_eq!(a.len(), 10);
        assert_eq!(a, b);
        for pair in a.windows(2) {
            assert!(pair[0].keypoint.response >= pair[1].keypoint.response);
        }
    }

    #[test]
    fn candidates_near_the_border_are_dropped() {
        let (w, h) = (128, 128);
        let img = squares(w, h, 16, 7);
        let params = OrbParams::default();
        let pts = square_corners(w, h, 16, 7);
        let all = describe_level(&img, &img, w, h, &params, &pts, usize::MAX);
        assert!(!all.is_empty());
        assert!(all.len() < pts.len());
        for f in &all {
            let [x, y] = f.keypoint.xy;
            assert!(x >= 31.0 && x < (w - 31) as f32, "x={x}");
            assert!(y >= 31.0 && y < (h - 31) as f32, "y={y}");
        }
    }

    #[test]
    fn duplicate_candidates_are_described_once() {
        let (w, h) = (128, 128);
        let img = squares(w, h, 16, 7);
        let params = OrbParams::default();
        let feats = describe_level(&img, &img, w, h, &params, &[[48, 48], [48, 48]], 5);
        assert_eq!(feats.len(), 1);
    }

    #[test]
    fn tiny_levels_yield_nothing() {
        let img = vec![0u8; 40 * 40];
        let feats = describe_level(&img, &img, 40, 40, &OrbParams::default(), &[[20, 20]], 5);
        assert!(feats.is_empty());
    }
}
