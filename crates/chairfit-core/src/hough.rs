//! Straight-line Hough transform over a binary mask.
//!
//! Lines are parametrized as `ρ = x·cos θ + y·sin θ` with `θ` sampled on
//! `[-π/2, π/2)` and `ρ` on integer bins `-D..=D`, where `D` is the image
//! diagonal rounded up. A vertical line `x = c` therefore has `θ = 0` and
//! `ρ = c`.
use crate::BinaryMask;
use std::f32::consts::FRAC_PI_2;

#[cfg(feature = "rayon")]
use rayon::prelude::*;
#[cfg(feature = "tracing")]
use tracing::instrument;

/// Accumulator resolution and peak extraction settings.
#[derive(Clone, Debug)]
pub struct HoughParams {
    /// Number of angle bins over `[-π/2, π/2)`.
    pub n_angles: usize,
    /// Minimum separation between peaks, in distance bins. Also the
    /// half-height of the local-maximum window.
    pub min_distance: usize,
    /// Minimum separation between peaks, in angle bins. Also the half-width
    /// of the local-maximum window.
    pub min_angle: usize,
    /// Peaks need more than `threshold_rel · max_votes` votes.
    pub threshold_rel: f32,
    /// Optional cap on the number of returned peaks.
    pub max_peaks: Option<usize>,
}

impl Default for HoughParams {
    fn default() -> Self {
        Self {
            n_angles: 180,
            min_distance: 9,
            min_angle: 10,
            threshold_rel: 0.5,
            max_peaks: None,
        }
    }
}

/// Vote accumulator, angle-major: `votes[angle * n_dists + dist]`.
#[derive(Clone, Debug)]
pub struct HoughAccumulator {
    pub thetas: Vec<f32>,
    pub n_dists: usize,
    /// Distance of bin 0 is `-offset`.
    pub offset: i32,
    pub votes: Vec<u32>,
}

impl HoughAccumulator {
    #[inline]
    pub fn at(&self, angle_idx: usize, dist_idx: usize) -> u32 {
        self.votes[angle_idx * self.n_dists + dist_idx]
    }

    #[inline]
    pub fn distance(&self, dist_idx: usize) -> f32 {
        dist_idx as f32 - self.offset as f32
    }

    pub fn max_votes(&self) -> u32 {
        self.votes.iter().copied().max().unwrap_or(0)
    }
}

/// A detected line.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HoughLine {
    /// Normal angle in radians, in `[-π/2, π/2)`.
    pub angle: f32,
    /// Signed perpendicular distance from the origin, in pixels.
    pub distance: f32,
    pub votes: u32,
}

/// Accumulate votes of every set pixel of `mask`.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "debug", skip(mask, params), fields(w = mask.w, h = mask.h))
)]
pub fn hough_accumulate(mask: &BinaryMask, params: &HoughParams) -> HoughAccumulator {
    let n_angles = params.n_angles.max(1);
    let step = std::f32::consts::PI / n_angles as f32;
    let thetas: Vec<f32> = (0..n_angles).map(|i| -FRAC_PI_2 + i as f32 * step).collect();

    let diag = ((mask.w * mask.w + mask.h * mask.h) as f64).sqrt().ceil() as i32;
    let offset = diag;
    let n_dists = (2 * diag + 1) as usize;

    let points: Vec<(f32, f32)> = (0..mask.h)
        .flat_map(|y| (0..mask.w).map(move |x| (x, y)))
        .filter(|&(x, y)| mask.at(x, y))
        .map(|(x, y)| (x as f32, y as f32))
        .collect();

    let mut votes = vec![0u32; n_angles * n_dists];
    let fill = |(a, column): (usize, &mut [u32])| {
        let (s, c) = thetas[a].sin_cos();
        for &(x, y) in &points {
            let rho = (x * c + y * s).round() as i32 + offset;
            if rho >= 0 && (rho as usize) < n_dists {
                column[rho as usize] += 1;
            }
        }
    };

    #[cfg(feature = "rayon")]
    votes.par_chunks_mut(n_dists).enumerate().for_each(fill);

    #[cfg(not(feature = "rayon"))]
    votes.chunks_mut(n_dists).enumerate().for_each(fill);

    HoughAccumulator {
        thetas,
        n_dists,
        offset,
        votes,
    }
}

/// Extract prominent peaks from an accumulator.
///
/// A cell is a peak candidate when it holds more than
/// `threshold_rel · max_votes` votes and equals the maximum of its
/// `(2·min_angle + 1) × (2·min_distance + 1)` neighbourhood. Connected runs of
/// such cells collapse to their rounded centroid. Candidates are visited
/// strongest first (ties in accumulator order); each accepted peak clears its
/// neighbourhood so weaker candidates inside it are dropped. The angle axis
/// wraps: bins past `±π/2` continue on the other side with `ρ` negated.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "debug", skip(acc, params), fields(n_dists = acc.n_dists))
)]
pub fn hough_peaks(acc: &HoughAccumulator, params: &HoughParams) -> Vec<HoughLine> {
    let max_votes = acc.max_votes();
    if max_votes == 0 {
        return Vec::new();
    }
    let thr = params.threshold_rel * max_votes as f32;
    let n_angles = acc.thetas.len();
    let n_dists = acc.n_dists;

    let mut local_max = neighbourhood_max(acc, params.min_angle, params.min_distance);
    let is_peak: Vec<bool> = acc
        .votes
        .iter()
        .zip(&local_max)
        .map(|(&v, &m)| v == m && v as f32 > thr)
        .collect();

    let mut runs = plateaus(&is_peak, &acc.votes, n_angles, n_dists);
    runs.sort_by(|a, b| b.votes.cmp(&a.votes).then(a.first.cmp(&b.first)));

    let limit = params.max_peaks.unwrap_or(usize::MAX);
    let mut accepted: Vec<HoughLine> = Vec::new();
    for p in runs {
        if accepted.len() >= limit {
            break;
        }
        let (a, d) = p.centre;
        let votes = local_max[a * n_dists + d];
        if votes as f32 <= thr {
            continue;
        }
        clear_neighbourhood(&mut local_max, n_angles, n_dists, a, d, params);
        accepted.push(HoughLine {
            angle: acc.thetas[a],
            distance: acc.distance(d),
            votes,
        });
    }
    accepted
}

/// Maximum filter over `±half_a` angle bins and `±half_d` distance bins;
/// cells outside the accumulator count as zero.
fn neighbourhood_max(acc: &HoughAccumulator, half_a: usize, half_d: usize) -> Vec<u32> {
    let n_angles = acc.thetas.len();
    let n_dists = acc.n_dists;

    let mut along_d = vec![0u32; acc.votes.len()];
    for a in 0..n_angles {
        let row = &acc.votes[a * n_dists..(a + 1) * n_dists];
        for d in 0..n_dists {
            let lo = d.saturating_sub(half_d);
            let hi = (d + half_d).min(n_dists - 1);
            along_d[a * n_dists + d] = row[lo..=hi].iter().copied().max().unwrap_or(0);
        }
    }

    let mut out = vec![0u32; acc.votes.len()];
    for a in 0..n_angles {
        let lo = a.saturating_sub(half_a);
        let hi = (a + half_a).min(n_angles - 1);
        for d in 0..n_dists {
            out[a * n_dists + d] = (lo..=hi).map(|aa| along_d[aa * n_dists + d]).max().unwrap_or(0);
        }
    }
    out
}

/// 8-connected run of peak cells.
struct Plateau {
    centre: (usize, usize),
    votes: u32,
    /// Smallest accumulator index in the run.
    first: usize,
}

fn plateaus(is_peak: &[bool], votes: &[u32], n_angles: usize, n_dists: usize) -> Vec<Plateau> {
    let mut seen = vec![false; is_peak.len()];
    let mut out = Vec::new();
    let mut stack = Vec::new();

    for start in 0..is_peak.len() {
        if !is_peak[start] || seen[start] {
            continue;
        }
        seen[start] = true;
        stack.push(start);

        let (mut sum_a, mut sum_d, mut count) = (0usize, 0usize, 0usize);
        let mut best = 0u32;
        while let Some(idx) = stack.pop() {
            let (a, d) = (idx / n_dists, idx % n_dists);
            sum_a += a;
            sum_d += d;
            count += 1;
            best = best.max(votes[idx]);

            for na in a.saturating_sub(1)..=(a + 1).min(n_angles - 1) {
                for nd in d.saturating_sub(1)..=(d + 1).min(n_dists - 1) {
                    let n = na * n_dists + nd;
                    if is_peak[n] && !seen[n] {
                        seen[n] = true;
                        stack.push(n);
                    }
                }
            }
        }

        let centre = (
            (sum_a as f64 / count as f64).round() as usize,
            (sum_d as f64 / count as f64).round() as usize,
        );
        out.push(Plateau {
            centre,
            votes: best,
            first: start,
        });
    }
    out
}

fn clear_neighbourhood(
    cells: &mut [u32],
    n_angles: usize,
    n_dists: usize,
    a: usize,
    d: usize,
    params: &HoughParams,
) {
    let (ra, rd) = (params.min_angle as isize, params.min_distance as isize);
    let (n_a, n_d) = (n_angles as isize, n_dists as isize);
    for da in -ra..=ra {
        for dd in -rd..=rd {
            let mut ai = a as isize + da;
            let mut di = d as isize + dd;
            if di < 0 || di >= n_d {
                continue;
            }
            if ai < 0 {
                ai += n_a;
                di = n_d - 1 - di;
            } else if ai >= n_a {
                ai -= n_a;
                di = n_d - 1 - di;
            }
            if (0..n_a).contains(&ai) {
                cells[ai as usize * n_dists + di as usize] = 0;
            }
        }
    }
}

/// Convenience: accumulate and extract peaks in one call.
pub fn detect_lines(mask: &BinaryMask, params: &HoughParams) -> Vec<HoughLine> {
    let acc = hough_accumulate(mask, params);
    hough_peaks(&acc, params)
}
