#![allow(dead_code)]

use image::{Rgb, RgbImage};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Random 8×8 blocks of gray, fully determined by `seed`.
pub fn block_texture(w: u32, h: u32, seed: u64) -> RgbImage {
    let mut rng = StdRng::seed_from_u64(seed);
    let bw = w.div_ceil(8);
    let bh = h.div_ceil(8);
    let blocks: Vec<u8> = (0..bw * bh).map(|_| rng.gen()).collect();
    RgbImage::from_fn(w, h, |x, y| {
        let v = blocks[((y / 8) * bw + x / 8) as usize];
        Rgb([v, v, v])
    })
}

/// White canvas with two dark full-height bars of width 4 starting at the
/// given columns.
pub fn door_scene(w: u32, h: u32, left: u32, right: u32) -> RgbImage {
    RgbImage::from_fn(w, h, |x, _| {
        if (left..left + 4).contains(&x) || (right..right + 4).contains(&x) {
            Rgb([20, 20, 20])
        } else {
            Rgb([255, 255, 255])
        }
    })
}

/// Paste `patch` into `canvas` with its top-left corner at (x, y).
pub fn paste(canvas: &mut RgbImage, patch: &RgbImage, x: u32, y: u32) {
    image::imageops::replace(canvas, patch, x as i64, y as i64);
}
