//! Seed field: a coarse grid sweep that polishes candidate seed points by
//! PCA over minima collected on concentric square rings, then a ranking
//! step that turns the resulting mask into a sorted list of candidates to
//! trace.

use std::f32::consts::FRAC_PI_4;

use log::debug;
use ordered_float::OrderedFloat;

use crate::config::Config;
use crate::detector::DetectorBank;
use crate::evaluator::eval_line;
use crate::image::Image;
use crate::offset_cache::OffsetCache;
use crate::types::{LineParams, Seed, SeedRecord};

/// Per-engine scratch accumulators for the grid sweep: vote count, slope
/// sum, stat sum and the derived seed mask, one value per pixel. Owned by
/// the engine and reused across frames when dimensions match.
#[derive(Debug, Clone, Default)]
pub struct SeedField {
    width: usize,
    height: usize,
    count: Vec<u32>,
    slope_sum: Vec<f32>,
    stat_sum: Vec<f32>,
    mask: Vec<bool>,
}

impl SeedField {
    pub fn new() -> Self {
        SeedField::default()
    }

    fn ensure_size(&mut self, width: usize, height: usize) {
        if self.width != width || self.height != height {
            let area = width * height;
            self.width = width;
            self.height = height;
            self.count = vec![0; area];
            self.slope_sum = vec![0.0; area];
            self.stat_sum = vec![0.0; area];
            self.mask = vec![false; area];
        } else {
            self.count.iter_mut().for_each(|v| *v = 0);
            self.slope_sum.iter_mut().for_each(|v| *v = 0.0);
            self.stat_sum.iter_mut().for_each(|v| *v = 0.0);
            self.mask.iter_mut().for_each(|v| *v = false);
        }
    }

    pub fn mask(&self) -> &[bool] {
        &self.mask
    }

    pub fn slope_at(&self, index: usize) -> f32 {
        self.slope_sum[index]
    }

    /// Horizontal-then-vertical lattice sweep, accumulating votes at the
    /// converged center of each iterated polish.
    pub fn sweep(&mut self, image: &Image<u8>, config: &Config) {
        self.ensure_size(image.width(), image.height());
        let stride = image.width();
        let lattice = config.lattice_spacing as usize;

        // Horizontal pass: one column at a time, stepping down rows by
        // `lattice_spacing`.
        for x in 0..stride {
            let mut y = 0usize;
            while y < image.height() {
                self.iterate_and_accumulate(image, config, x + y * stride, config.maxiter);
                y += lattice;
            }
        }

        // Vertical pass: one row at a time, stepping across columns by
        // `lattice_spacing`. The iteration cap here is `maxr`, not
        // `maxiter` like the horizontal pass above -- kept asymmetric on
        // purpose rather than unified, since the two passes converge at
        // different rates and we don't have evidence either cap was a
        // mistake.
        let mut x = 0usize;
        while x < stride {
            for y in 0..image.height() {
                self.iterate_and_accumulate(image, config, x + y * stride, config.maxr);
            }
            x += lattice;
        }

        let area = self.width * self.height;
        for i in 0..area {
            if self.count[i] > 0 {
                self.slope_sum[i] /= self.count[i] as f32;
            }
            self.mask[i] = self.stat_sum[i] > config.seed_thres;
        }
        debug!("seed sweep masked {} of {} pixels", self.mask.iter().filter(|&&m| m).count(), area);
    }

    fn iterate_and_accumulate(&mut self, image: &Image<u8>, config: &Config, start: usize, iter_cap: u32) {
        let mut p = start;
        let mut newp = start;
        let mut last: Option<(Seed, f32, f32)> = None;
        for _ in 0..iter_cap {
            p = newp;
            match compute_seed_from_point_ex(image, p, config.maxr as i64) {
                None => {
                    last = None;
                    break;
                }
                Some((seed, slope, stat)) => {
                    newp = seed.xpnt as usize + image.width() * seed.ypnt as usize;
                    let converged = newp == p || stat < config.iteration_thres;
                    last = Some((seed, slope, stat));
                    if converged {
                        break;
                    }
                }
            }
        }
        if let Some((_, slope, stat)) = last {
            if stat > config.accum_thres {
                self.count[p] += 1;
                self.slope_sum[p] += slope;
                self.stat_sum[p] += stat;
            }
        }
    }
}

/// Square-spiral PCA seed polish. Returns `None` within `maxr` of the
/// image border, since there isn't enough room to collect a ring.
pub fn compute_seed_from_point_ex(image: &Image<u8>, p: usize, maxr: i64) -> Option<(Seed, f32, f32)> {
    let stride = image.width() as i64;
    let x = (p % image.width()) as i64;
    let y = (p / image.width()) as i64;

    if x < maxr || x >= image.width() as i64 - maxr || y < maxr || y >= image.height() as i64 - maxr {
        return None;
    }

    let mut cx = 0i64;
    let mut cy = 0i64;

    let (mut lsx, mut lsy, mut lsxy, mut lsxx, mut lsyy) = (0.0f64, 0.0f64, 0.0f64, 0.0f64, 0.0f64);
    let (mut rsx, mut rsy, mut rsxy, mut rsxx, mut rsyy) = (0.0f64, 0.0f64, 0.0f64, 0.0f64, 0.0f64);
    let mut lnpoints = 0usize;
    let mut rnpoints = 0usize;

    // Walk `steps` pixels in direction (dcx, dcy), advancing the shared
    // spiral cursor (cx, cy) and tracking the minimum-intensity pixel
    // seen along that edge. Called once per ring edge (top/left/bottom/
    // right) with the cursor threaded through by reference.
    fn walk_edge(image: &Image<u8>, x: i64, y: i64, cx: &mut i64, cy: &mut i64, stride: i64, steps: i64, dcx: i64, dcy: i64) -> (u8, i64) {
        let mut best = 255u8;
        let mut bp: i64 = -1;
        for _ in 0..steps {
            *cx += dcx;
            *cy += dcy;
            let tx = x + *cx;
            let ty = y + *cy;
            let tp = tx + stride * ty;
            let val = image[tp as usize];
            if val <= best {
                bp = tp;
                best = val;
            }
        }
        (best, bp)
    }

    for i in 0..=maxr {
        let max_j = 2 * i;
        if max_j == 0 {
            cx += 1;
            cy += 1;
            continue;
        }
        let (abest, abp) = walk_edge(image, x, y, &mut cx, &mut cy, stride, max_j, 0, -1);
        let (bbest, bbp) = walk_edge(image, x, y, &mut cx, &mut cy, stride, max_j, -1, 0);
        let (cbest, cbp) = walk_edge(image, x, y, &mut cx, &mut cy, stride, max_j, 0, 1);
        let (dbest, dbp) = walk_edge(image, x, y, &mut cx, &mut cy, stride, max_j, 1, 0);
        cx += 1;
        cy += 1;

        let mut accumulate = |bp: i64, sx: &mut f64, sy: &mut f64, sxy: &mut f64, sxx: &mut f64, syy: &mut f64, n: &mut usize| {
            if bp >= 0 {
                let tx = (bp % stride) as f64;
                let ty = (bp / stride) as f64;
                *sx += tx;
                *sy += ty;
                *sxy += tx * ty;
                *sxx += tx * tx;
                *syy += ty * ty;
                *n += 1;
            }
        };

        let ab = if abest < bbest { abp } else { bbp };
        accumulate(ab, &mut lsx, &mut lsy, &mut lsxy, &mut lsxx, &mut lsyy, &mut lnpoints);
        let cd = if cbest < dbest { cbp } else { dbp };
        if cd > 0 {
            accumulate(cd, &mut lsx, &mut lsy, &mut lsxy, &mut lsxx, &mut lsyy, &mut lnpoints);
        }
        let ad = if abest < dbest { abp } else { dbp };
        accumulate(ad, &mut rsx, &mut rsy, &mut rsxy, &mut rsxx, &mut rsyy, &mut rnpoints);
        let cb = if cbest < bbest { cbp } else { bbp };
        if cb > 0 {
            accumulate(cb, &mut rsx, &mut rsy, &mut rsxy, &mut rsxx, &mut rsyy, &mut rnpoints);
        }
    }

    let (lstat, lm) = pca_stat(lsx, lsy, lsxx, lsyy, lsxy, lnpoints);
    let (rstat, rm) = pca_stat(rsx, rsy, rsxx, rsyy, rsxy, rnpoints);

    let (sx, sy, n, stat, m) = if lstat > rstat {
        (lsx, lsy, lnpoints, lstat, lm)
    } else {
        (rsx, rsy, rnpoints, rstat, rm)
    };
    if n == 0 {
        return None;
    }

    let seed = Seed {
        xpnt: (sx / n as f64) as i32,
        ypnt: (sy / n as f64) as i32,
        xdir: (100.0 * m.cos()) as i32,
        ydir: (100.0 * m.sin()) as i32,
    };
    Some((seed, m, stat))
}

fn pca_stat(sx: f64, sy: f64, sxx: f64, syy: f64, sxy: f64, n: usize) -> (f32, f32) {
    if n <= 3 {
        return (0.0, 0.0);
    }
    let n = n as f64;
    let cxx = sxx / n - sx * sx / (n * n);
    let cxy = sxy / n - sx * sy / (n * n);
    let cyy = syy / n - sy * sy / (n * n);
    let trace = cxx + cyy;
    let det = cxx * cyy - cxy * cxy;
    let desc = (trace * trace - 4.0 * det).max(0.0).sqrt();
    let eig0 = 0.5 * (trace + desc);
    let eig1 = 0.5 * (trace - desc);
    let stat = 1.0 - eig1 / eig0;
    let m = (cxx - eig0).atan2(-cxy);
    (stat as f32, m as f32)
}

/// Convert a seed into initial line parameters: angle snapped to the
/// nearest `angle_step` grid, offset 0.5, width 2.0. Flips the direction
/// so the line points along positive x.
pub fn line_param_from_seed(seed: &Seed, angle_step: f32) -> LineParams {
    let ain = FRAC_PI_4 / angle_step;
    let angle = if seed.xdir < 0 {
        ((-seed.ydir as f32).atan2(-seed.xdir as f32) / ain).round() * ain
    } else {
        ((seed.ydir as f32).atan2(seed.xdir as f32) / ain).round() * ain
    };
    LineParams {
        offset: 0.5,
        angle,
        width: 2.0,
        score: 0.0,
    }
}

/// Build and sort (ascending) the seed candidate list from the mask: one
/// record per masked pixel.
pub fn rank_seeds(
    field: &SeedField,
    image: &Image<u8>,
    bank: &DetectorBank,
    cache: &mut OffsetCache,
    config: &Config,
) -> Vec<SeedRecord> {
    let stride = image.width();
    let mut records = Vec::new();
    for (i, &masked) in field.mask().iter().enumerate() {
        if !masked {
            continue;
        }
        let seed = Seed {
            xpnt: (i % stride) as i32,
            ypnt: (i / stride) as i32,
            xdir: (100.0 * field.slope_at(i).cos()).round() as i32,
            ydir: (100.0 * field.slope_at(i).sin()).round() as i32,
        };
        let line = line_param_from_seed(&seed, config.angle_step);
        let score = eval_line(bank, cache, image, &line, i);
        records.push(SeedRecord { index: i, score });
    }
    records.sort_by_key(|r| OrderedFloat(r.score));
    records
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dark_line_image() -> Image<u8> {
        let mut data = vec![200u8; 64 * 64];
        for x in 20..44 {
            data[32 * 64 + x] = 30;
        }
        Image::from_vec(64, 64, data)
    }

    #[test]
    fn compute_seed_near_border_returns_none() {
        let image = dark_line_image();
        let p = image.index_of(1, 1);
        assert!(compute_seed_from_point_ex(&image, p, 4).is_none());
    }

    #[test]
    fn compute_seed_on_horizontal_line_has_small_angle() {
        let image = dark_line_image();
        let p = image.index_of(32, 32);
        let (_, slope, stat) = compute_seed_from_point_ex(&image, p, 4).expect("seed expected");
        assert!(slope.abs() < 0.3, "slope {slope} should be near horizontal");
        assert!(stat > 0.3);
    }

    #[test]
    fn sweep_masks_pixels_along_the_line() {
        let image = dark_line_image();
        let mut config = Config::default();
        config.lattice_spacing = 4;
        let mut field = SeedField::new();
        field.sweep(&image, &config);
        assert!(field.mask().iter().any(|&m| m));
    }

    #[test]
    fn sweep_on_uniform_image_masks_nothing() {
        let image = Image::<u8>::from_vec(64, 64, vec![128u8; 64 * 64]);
        let config = Config::default();
        let mut field = SeedField::new();
        field.sweep(&image, &config);
        assert!(field.mask().iter().all(|&m| !m));
    }
}
