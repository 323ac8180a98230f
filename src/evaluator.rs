//! Single-line evaluator: converts a candidate line and an anchor pixel
//! into a correlation score against the line or half-space detector bank.

use std::f32::consts::FRAC_PI_2;

use crate::detector::DetectorBank;
use crate::image::Image;
use crate::offset_cache::OffsetCache;
use crate::types::LineParams;

/// Round the line's continuous position to the nearest pixel anchor and
/// return the residual offset along the normal. Pure: does not mutate
/// `line`. The centering error introduced is bounded below one pixel.
pub fn round_anchor_and_offset(line: &LineParams, p: usize, stride: usize) -> (f32, usize) {
    let ex = (line.angle + FRAC_PI_2).cos();
    let ey = (line.angle + FRAC_PI_2).sin();
    let px = (p % stride) as f32;
    let py = (p / stride) as f32;
    let rx = px + ex * line.offset;
    let ry = py + ey * line.offset;
    let ppx = rx.round();
    let ppy = ry.round();
    let drx = rx - ppx;
    let dry = ry - ppy;
    let t = drx * ex + dry * ey;
    (t, ppx as usize + stride * ppy as usize)
}

/// Dot product of the line-detector filter against the image at `p`.
/// Returns the negated sum (smaller is better: whiskers are dark against
/// a bright face, and the filter positive-weights the ridge).
pub fn eval_line(
    bank: &DetectorBank,
    cache: &mut OffsetCache,
    image: &Image<u8>,
    line: &LineParams,
    p: usize,
) -> f32 {
    let support = bank.support;
    let (coff, pp) = round_anchor_and_offset(line, p, image.width());
    let (prefix, _suffix) = cache.get(image, support, line.angle, pp);
    let base = bank.get_nearest(coff, line.width, line.angle);

    let mut sum = 0.0f32;
    for pair in prefix {
        sum += image[pair.image_index] as f32 * bank.weight(base, pair.filter_index);
    }
    -sum
}

/// Evaluate both orientations of the half-space detector at `p`, used by
/// the trust predicates. Returns `(q, r, l)` where `q = (r - l) / (r + l)`
/// computed from the raw sums, and `r`/`l` are then normalized by
/// `bank.norm`.
pub fn eval_half_space(
    bank: &DetectorBank,
    cache: &mut OffsetCache,
    image: &Image<u8>,
    line: &LineParams,
    p: usize,
) -> (f32, f32, f32) {
    let support = bank.support;
    let (coff, pp) = round_anchor_and_offset(line, p, image.width());
    let (prefix, _suffix) = cache.get(image, support, line.angle, pp);
    let left_base = bank.get_nearest(coff, line.width, line.angle);
    let right_base = bank.get_nearest(-coff, line.width, line.angle);

    let mut l = 0.0f32;
    let mut r = 0.0f32;
    for pair in prefix {
        let v = image[pair.image_index] as f32;
        l += v * bank.weight(left_base, pair.filter_index);
        r += v * bank.weight(right_base, pair.filter_index);
    }
    let q = (r - l) / (r + l);
    (q, r / bank.norm, l / bank.norm)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn round_anchor_centers_within_point_six_px() {
        let line = LineParams { offset: 0.9, angle: 0.2, width: 2.0, score: 0.0 };
        let stride = 64;
        let p = 32 + stride * 32;
        let (t, pp) = round_anchor_and_offset(&line, p, stride);
        let ex = (line.angle + FRAC_PI_2).cos();
        let ey = (line.angle + FRAC_PI_2).sin();
        let orig_x = (p % stride) as f32 + ex * line.offset;
        let orig_y = (p / stride) as f32 + ey * line.offset;
        let new_x = (pp % stride) as f32 + ex * t;
        let new_y = (pp / stride) as f32 + ey * t;
        let err = ((new_x - orig_x).powi(2) + (new_y - orig_y).powi(2)).sqrt();
        assert!(err < 0.6, "round trip error {} too large", err);
    }

    #[test]
    fn eval_line_on_uniform_image_is_near_zero() {
        use crate::config::Config;
        use crate::detector::{DetectorBank, Kind};

        let config = Config::default();
        let bank = DetectorBank::build(&config, Kind::Line);
        let mut cache = OffsetCache::new();
        let image = Image::<u8>::from_vec(64, 64, vec![128u8; 64 * 64]);
        let line = LineParams { offset: 0.0, angle: 0.0, width: 2.0, score: 0.0 };
        let p = image.index_of(32, 32);
        let score = eval_line(&bank, &mut cache, &image, &line, p);
        assert_approx_eq!(score, 0.0, 5.0);
    }
}
