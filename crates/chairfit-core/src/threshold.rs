//! Sauvola local thresholding on float images.
//!
//! Local mean and standard deviation come from two summed-area tables, so the
//! cost is independent of the window size. Windows are clipped at the image
//! border; statistics use only the pixels inside the image.
use crate::BinaryMask;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Parameters of the Sauvola threshold `T = m · (1 + k · (s / R − 1))`.
#[derive(Clone, Debug)]
pub struct SauvolaParams {
    /// Odd side length of the square window.
    pub window: usize,
    /// Sensitivity in (0, 1).
    pub k: f32,
    /// Dynamic range of the standard deviation; `None` uses
    /// `0.5 · (max − min)` of the input.
    pub r: Option<f32>,
}

impl Default for SauvolaParams {
    fn default() -> Self {
        Self {
            window: 15,
            k: 0.2,
            r: None,
        }
    }
}

/// Summed-area table with one row and column of zero padding.
#[derive(Clone, Debug)]
pub struct IntegralImage {
    pub w: usize,
    pub h: usize,
    data: Vec<f64>,
}

impl IntegralImage {
    /// Build the table of `f(v)` over a row-major float image.
    pub fn from_fn(img: &[f32], w: usize, h: usize, f: impl Fn(f32) -> f64) -> Self {
        let stride = w + 1;
        let mut data = vec![0.0f64; stride * (h + 1)];
        for y in 0..h {
            let mut row_sum = 0.0f64;
            for x in 0..w {
                row_sum += f(img[y * w + x]);
                data[(y + 1) * stride + x + 1] = data[y * stride + x + 1] + row_sum;
            }
        }
        Self { w, h, data }
    }

    /// Sum over the half-open rectangle `[x0, x1) × [y0, y1)`.
    #[inline]
    pub fn sum(&self, x0: usize, y0: usize, x1: usize, y1: usize) -> f64 {
        let stride = self.w + 1;
        self.data[y1 * stride + x1] - self.data[y0 * stride + x1] - self.data[y1 * stride + x0]
            + self.data[y0 * stride + x0]
    }
}

/// Per-pixel Sauvola threshold.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "debug", skip(img, params), fields(w = w, h = h, window = params.window))
)]
pub fn sauvola_threshold(img: &[f32], w: usize, h: usize, params: &SauvolaParams) -> Vec<f32> {
    if w == 0 || h == 0 {
        return Vec::new();
    }

    let r = params.r.unwrap_or_else(|| {
        let (lo, hi) = min_max(img);
        0.5 * (hi - lo)
    });

    let sum = IntegralImage::from_fn(img, w, h, |v| v as f64);
    let sum_sq = IntegralImage::from_fn(img, w, h, |v| (v as f64) * (v as f64));
    let half = params.window.max(1) / 2;

    let mut out = vec![0.0f32; w * h];
    for y in 0..h {
        let y0 = y.saturating_sub(half);
        let y1 = (y + half + 1).min(h);
        for x in 0..w {
            let x0 = x.saturating_sub(half);
            let x1 = (x + half + 1).min(w);
            let n = ((x1 - x0) * (y1 - y0)) as f64;
            let mean = sum.sum(x0, y0, x1, y1) / n;
            let var = (sum_sq.sum(x0, y0, x1, y1) / n - mean * mean).max(0.0);
            let std = var.sqrt() as f32;
            let m = mean as f32;
            out[y * w + x] = if r > 0.0 {
                m * (1.0 + params.k * (std / r - 1.0))
            } else {
                m * (1.0 - params.k)
            };
        }
    }
    out
}

/// Foreground mask of pixels at or below their Sauvola threshold.
///
/// A constant image (zero dynamic range) produces an empty mask. Inside a
/// flat black region both the pixel and its threshold are zero, so such
/// regions are foreground.
pub fn sauvola_mask(img: &[f32], w: usize, h: usize, params: &SauvolaParams) -> BinaryMask {
    let (lo, hi) = min_max(img);
    if w == 0 || h == 0 || hi <= lo {
        return BinaryMask {
            w,
            h,
            data: vec![false; w * h],
        };
    }

    let thr = sauvola_threshold(img, w, h, params);
    let data = img.iter().zip(thr.iter()).map(|(&v, &t)| v <= t).collect();
    BinaryMask { w, h, data }
}

fn min_max(img: &[f32]) -> (f32, f32) {
    let mut lo = f32::INFINITY;
    let mut hi = f32::NEG_INFINITY;
    for &v in img {
        lo = lo.min(v);
        hi = hi.max(v);
    }
    if lo > hi {
        (0.0, 0.0)
    } else {
        (lo, hi)
    }
}
