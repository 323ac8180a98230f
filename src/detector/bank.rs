//! Detector banks: precomputed filter tensors keyed by quantized
//! (offset, width, angle).

use std::f32::consts::{FRAC_PI_2, FRAC_PI_4, PI};

use crate::config::Config;
use crate::detector::geometry::{accumulate_mask, accumulate_sum, disc_polygon, stripe_polygon};

/// The free length factor on the line detector's two outer flank stripes.
/// Kept as a named constant rather than re-derived per bank build.
const OUTER_STRIPE_LENGTH_FACTOR: f32 = 1.0;
const STRIPE_THICKNESS: f32 = 0.7;
const HALF_SPACE_DISC_SIDES: usize = 12;

/// An inclusive `[min, max]` range sampled every `step`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Range {
    pub min: f32,
    pub max: f32,
    pub step: f32,
}

impl Range {
    pub fn new(min: f32, max: f32, step: f32) -> Self {
        Range { min, max, step }
    }

    /// Number of bins this range is sampled into, inclusive of both ends.
    pub fn steps(&self) -> usize {
        (((self.max - self.min) / self.step).round() as i64 + 1).max(1) as usize
    }

    fn bin_of(&self, value: f32) -> usize {
        let idx = ((value - self.min) / self.step).round();
        idx.clamp(0.0, (self.steps() - 1) as f32) as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Line,
    HalfSpace,
}

/// A 3D grid of precomputed `support x support` filter weights, indexed by
/// (angle bin, width bin, offset bin). `get_nearest` returns the flat base
/// index of a bin's slab; callers add a pixel's `filter_index` to it.
#[derive(Debug, Clone)]
pub struct DetectorBank {
    data: Vec<f32>,
    pub offset_range: Range,
    pub width_range: Range,
    pub angle_range: Range,
    pub support: usize,
    pub norm: f32,
}

impl DetectorBank {
    fn slab_size(&self) -> usize {
        self.support * self.support
    }

    fn index(&self, angle_bin: usize, width_bin: usize, offset_bin: usize) -> usize {
        let slab = self.slab_size();
        let width_stride = self.offset_range.steps() * slab;
        let angle_stride = self.width_range.steps() * width_stride;
        angle_bin * angle_stride + width_bin * width_stride + offset_bin * slab
    }

    /// Map a continuous (offset, width, angle) to the base index of its
    /// nearest bin, applying the transpose/leftward-wrap canonicalization.
    pub fn get_nearest(&self, offset: f32, width: f32, angle: f32) -> usize {
        let (offset, angle) = canonicalize(offset, angle);
        let width = width.clamp(self.width_range.min, self.width_range.max);
        let offset = offset.clamp(self.offset_range.min, self.offset_range.max);
        let angle = angle.clamp(self.angle_range.min, self.angle_range.max);

        let ob = self.offset_range.bin_of(offset);
        let wb = self.width_range.bin_of(width);
        let ab = self.angle_range.bin_of(angle);
        self.index(ab, wb, ob)
    }

    pub fn weight(&self, base: usize, filter_index: usize) -> f32 {
        self.data[base + filter_index]
    }

    pub fn build(config: &Config, kind: Kind) -> Self {
        let support = config.support_size();
        let offset_range = Range::new(-1.0, 1.0, config.offset_step);
        let width_range = Range::new(config.width_min, config.width_max, config.width_step);
        let angle_step = FRAC_PI_4 / config.angle_step;
        let angle_range = Range::new(-FRAC_PI_4, FRAC_PI_4, angle_step);

        let slab = support * support;
        let total = angle_range.steps() * width_range.steps() * offset_range.steps() * slab;
        let mut bank = DetectorBank {
            data: vec![0.0; total],
            offset_range,
            width_range,
            angle_range,
            support,
            norm: 0.0,
        };

        for ab in 0..angle_range.steps() {
            let angle = angle_range.min + ab as f32 * angle_range.step;
            for wb in 0..width_range.steps() {
                let width = width_range.min + wb as f32 * width_range.step;
                for ob in 0..offset_range.steps() {
                    let offset = offset_range.min + ob as f32 * offset_range.step;
                    let base = bank.index(ab, wb, ob);
                    let slab_mut = &mut bank.data[base..base + slab];
                    match kind {
                        Kind::Line => render_line_detector(config.tlen as f32, offset, width, angle, slab_mut, support),
                        Kind::HalfSpace => {
                            render_half_space_detector(config.tlen as f32, offset, angle, slab_mut, support)
                        }
                    }
                }
            }
        }

        if kind == Kind::HalfSpace {
            let base = bank.index(0, 0, 0);
            bank.norm = bank.data[base..base + slab].iter().sum();
        }

        bank
    }
}

fn width_mid(config: &Config) -> f32 {
    (config.width_min + config.width_max) / 2.0
}

fn render_line_detector(tlen: f32, offset: f32, width: f32, angle: f32, grid: &mut [f32], support: usize) {
    let length = 2.0 * tlen;
    for &delta in &[-width / 2.0, 0.0, width / 2.0] {
        let poly = stripe_polygon(length, STRIPE_THICKNESS, angle, offset + delta);
        accumulate_sum(&poly, 1.0, grid, support);
    }
    let outer_length = length * OUTER_STRIPE_LENGTH_FACTOR;
    for &delta in &[-width, width] {
        let poly = stripe_polygon(outer_length, STRIPE_THICKNESS, angle, offset + delta);
        accumulate_sum(&poly, -1.0, grid, support);
    }
    // Rasterization of five discrete stripes doesn't balance to exactly
    // zero mean; force it so the filter has no DC response.
    let mean: f32 = grid.iter().sum::<f32>() / grid.len() as f32;
    for v in grid.iter_mut() {
        *v -= mean;
    }
}

fn render_half_space_detector(tlen: f32, offset: f32, angle: f32, grid: &mut [f32], support: usize) {
    let length = 2.0 * tlen;
    let thickness = tlen;
    let poly = stripe_polygon(length, thickness, angle, offset + thickness / 2.0);
    accumulate_sum(&poly, 1.0, grid, support);
    let disc = disc_polygon(tlen, HALF_SPACE_DISC_SIDES, angle, offset);
    accumulate_mask(&disc, grid, support);
}

/// True iff `angle` is in the left half-plane. Floor/parity test (matching
/// `is_small_angle` below) rather than a `cos`-sign shortcut, since the two
/// disagree exactly at `angle == pi/2`.
fn is_angle_leftward(angle: f32) -> bool {
    let n = ((angle - FRAC_PI_2) / PI).floor() as i64;
    n % 2 == 0
}

fn wrap_to_pi(angle: f32) -> f32 {
    let mut a = (angle + PI).rem_euclid(2.0 * PI) - PI;
    if a >= PI {
        a -= 2.0 * PI;
    }
    a
}

fn wrap_half_plane(angle: f32) -> f32 {
    (angle + FRAC_PI_2).rem_euclid(PI) - FRAC_PI_2
}

/// Canonicalizes a (offset, angle) lookup: large-angle transpose, 2pi wrap,
/// leftward-half-plane wrap with offset negation.
pub fn canonicalize(offset: f32, angle: f32) -> (f32, f32) {
    let mut offset = offset;
    let mut angle = angle;
    if angle.abs() > FRAC_PI_4 {
        angle = 3.0 * FRAC_PI_2 - angle;
    }
    angle = wrap_to_pi(angle);
    if is_angle_leftward(angle) {
        angle = wrap_half_plane(angle);
        offset = -offset;
    }
    (offset, angle)
}

/// `is_small_angle(theta)`: true iff theta modulo pi falls in [-pi/4, pi/4).
/// Implemented as a floor/parity test rather than a signed-modulo
/// reimplementation, since truncating `%` is all that's needed here.
pub fn is_small_angle(angle: f32) -> bool {
    let n = ((angle - FRAC_PI_4) / FRAC_PI_2).floor() as i64;
    n % 2 != 0
}
