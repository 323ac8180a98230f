//! Line walker: given a trusted seed, greedily traces a whisker centerline
//! in both directions, recovering from short untrusted stretches via
//! bounded tunneling.

use std::f32::consts::{FRAC_PI_2, PI};

use log::trace;

use crate::config::Config;
use crate::detector::DetectorBank;
use crate::evaluator::{eval_line, round_anchor_and_offset};
use crate::image::Image;
use crate::offset_cache::OffsetCache;
use crate::seed_field::{compute_seed_from_point_ex, line_param_from_seed};
use crate::trust::ThresholdCache;
use crate::types::{LineParams, Record, Seed, WhiskerSegment};

#[derive(Debug, Clone, Copy)]
struct Interval {
    min: f32,
    max: f32,
}

/// Move the line one unit along its tangent, re-anchoring to the nearest
/// pixel and updating the offset.
pub fn move_line(line: &mut LineParams, p: usize, stride: usize, direction: i32) -> usize {
    let th = line.angle;
    let (lx, ly) = (th.cos(), th.sin());
    let (ex, ey) = ((th + FRAC_PI_2).cos(), (th + FRAC_PI_2).sin());
    let r0x = (p % stride) as f32 + ex * line.offset;
    let r0y = (p / stride) as f32 + ey * line.offset;
    let r1x = r0x + direction as f32 * lx;
    let r1y = r0y + direction as f32 * ly;
    let ppx = r1x.round();
    let ppy = r1y.round();
    let drx = r1x - ppx;
    let dry = r1y - ppy;
    line.offset = drx * ex + dry * ey;
    ppx as usize + stride * ppy as usize
}

fn compute_dxdy(line: &LineParams) -> (f32, f32) {
    let ex = (line.angle + FRAC_PI_2).cos();
    let ey = (line.angle + FRAC_PI_2).sin();
    (ex * line.offset, ey * line.offset)
}

fn outofbounds(p: usize, cwidth: usize, cheight: usize) -> bool {
    let x = p % cwidth;
    let y = p / cwidth;
    x < 1 || x >= cwidth - 1 || y < 1 || y >= cheight - 1
}

fn is_change_too_big(new_line: &LineParams, old: &LineParams, alim: f32, wlim: f32, olim: f32) -> bool {
    let dth = old.angle - new_line.angle;
    let dw = old.width - new_line.width;
    let doff = old.offset - new_line.offset;
    (dth * 180.0 / PI).abs() > alim || dw.abs() > wlim || doff.abs() > olim
}

/// Coordinate-descent local optimizer over (angle, offset, width), in that
/// order, stepping each coordinate while the score keeps improving and the
/// coordinate stays within its interval; rejects the whole update if it
/// drifts more than `max_delta_*` from the pre-adjust line.
#[allow(clippy::too_many_arguments)]
pub fn adjust_line_start(
    line: &mut LineParams,
    image: &Image<u8>,
    p: &mut usize,
    bank: &DetectorBank,
    cache: &mut OffsetCache,
    config: &Config,
    roff: &Interval,
    rang: &Interval,
    rwid: &Interval,
) -> bool {
    let ain = std::f32::consts::FRAC_PI_4 / config.angle_step;
    let backup = *line;

    loop {
        let mut better = false;
        let mut best = line.score;

        // angle
        let x = line.angle;
        let mut last = best;
        let mut v;
        loop {
            line.angle -= ain;
            v = eval_line(bank, cache, image, line, *p);
            if !((v - last).abs() < 1e-5 && line.angle >= rang.min) {
                break;
            }
        }
        if (v - best) > 1e-5 && line.angle >= rang.min {
            best = v;
            better = true;
        } else {
            line.angle = x;
            loop {
                line.angle += ain;
                v = eval_line(bank, cache, image, line, *p);
                if !((v - last).abs() < 1e-5 && line.angle <= rang.max) {
                    break;
                }
            }
            if (v - best) > 1e-5 && line.angle <= rang.max {
                best = v;
                better = true;
            } else {
                line.angle = x;
            }
        }

        // offset
        last = best;
        let x = line.offset;
        loop {
            line.offset -= config.offset_step;
            v = eval_line(bank, cache, image, line, *p);
            if !((v - last).abs() < 1e-5 && line.offset >= roff.min) {
                break;
            }
        }
        if (v - best) > 1e-5 && line.offset >= roff.min {
            best = v;
            better = true;
        } else {
            line.offset = x;
            loop {
                line.offset += config.offset_step;
                v = eval_line(bank, cache, image, line, *p);
                if !((v - last).abs() < 1e-5 && line.offset <= roff.max) {
                    break;
                }
            }
            if (v - best) > 1e-5 && line.offset <= roff.max {
                best = v;
                better = true;
            } else {
                line.offset = x;
            }
        }

        // width
        last = best;
        let x = line.width;
        loop {
            line.width -= config.width_step;
            v = eval_line(bank, cache, image, line, *p);
            if !((v - last).abs() < 1e-5 && line.width >= rwid.min) {
                break;
            }
        }
        if (v - best) > 1e-5 && line.width >= rwid.min {
            best = v;
            better = true;
        } else {
            line.width = x;
            loop {
                line.width += config.width_step;
                v = eval_line(bank, cache, image, line, *p);
                if !((v - last).abs() < 1e-5 && line.width <= rwid.max) {
                    break;
                }
            }
            if (v - best) > 1e-5 && line.width <= rwid.max {
                best = v;
                better = true;
            } else {
                line.width = x;
            }
        }

        line.score = best;
        if !better {
            break;
        }
    }

    if is_change_too_big(&backup, line, config.max_delta_angle, config.max_delta_width, config.max_delta_offset) {
        *line = backup;
        return false;
    }
    true
}

/// Try to reacquire a trusted line at `p` during tunneling: polish a seed
/// with a tight `maxr = 3` and flip its angle to keep pointing the same
/// way as `reference`.
fn reacquire(image: &Image<u8>, p: usize, reference: &LineParams, config: &Config) -> Option<LineParams> {
    let (seed, _, _) = compute_seed_from_point_ex(image, p, 3)?;
    let mut line = line_param_from_seed(&seed, config.angle_step);
    if line.angle * reference.angle < 0.0 {
        line.angle = -line.angle;
    }
    Some(line)
}

#[allow(clippy::too_many_arguments)]
fn walk(
    mut line: LineParams,
    mut p: usize,
    direction: i32,
    image: &Image<u8>,
    line_bank: &DetectorBank,
    half_space_bank: &DetectorBank,
    cache: &mut OffsetCache,
    thresholds: &mut ThresholdCache,
    config: &Config,
    frame_id: i32,
    roff: &Interval,
    rang: &Interval,
    rwid: &Interval,
    sigmin: f32,
    records: &mut Vec<Record>,
    include_start: bool,
) {
    let cwidth = image.width();
    let cheight = image.height();

    if include_start {
        let (dx, dy) = compute_dxdy(&line);
        records.push(Record {
            x: (p % cwidth) as f32 + dx,
            y: (p / cwidth) as f32 + dy,
            thick: line.width,
            score: line.score,
        });
    }

    while line.score > sigmin {
        p = move_line(&mut line, p, cwidth, direction);
        if outofbounds(p, cwidth, cheight) {
            break;
        }
        line.score = eval_line(line_bank, cache, image, &line, p);
        let mut oldline = line;
        let mut oldp = p;
        let mut trusted = adjust_line_start(&mut line, image, &mut p, line_bank, cache, config, roff, rang, rwid);
        trusted = trusted
            && thresholds.is_trusted_relaxed(frame_id, half_space_bank, cache, image, config, &line, p);

        let mut nmoves = 0u32;
        while !trusted && nmoves < config.half_space_tunneling_max_moves {
            oldline = line;
            oldp = p;
            p = move_line(&mut line, p, cwidth, direction);
            nmoves += 1;
            if outofbounds(p, cwidth, cheight) {
                break;
            }
            trusted = thresholds.is_trusted_relaxed(frame_id, half_space_bank, cache, image, config, &line, p);
            trusted = trusted
                && adjust_line_start(&mut line, image, &mut p, line_bank, cache, config, roff, rang, rwid);
            if trusted && line.score < sigmin {
                if let Some(reacquired) = reacquire(image, p, &oldline, config) {
                    line = reacquired;
                }
                line.score = eval_line(line_bank, cache, image, &line, p);
                trusted = adjust_line_start(&mut line, image, &mut p, line_bank, cache, config, roff, rang, rwid);
                if !trusted
                    || line.score < sigmin
                    || !thresholds.is_trusted_relaxed(frame_id, half_space_bank, cache, image, config, &line, p)
                    || is_change_too_big(&line, &oldline, 2.0 * config.max_delta_angle, 10.0, 10.0)
                {
                    trusted = false;
                    break;
                }
            }
        }

        if !trusted {
            trace!("walker direction={direction} lost trust at p={p} after {nmoves} tunneling moves");
            p = oldp;
            line = oldline;
            break;
        }

        let (dx, dy) = compute_dxdy(&line);
        records.push(Record {
            x: (p % cwidth) as f32 + dx,
            y: (p / cwidth) as f32 + dy,
            thick: line.width,
            score: line.score,
        });
    }
}

/// Trace a whisker from `seed`. Returns an empty segment (`len() == 0`)
/// when the conservative trust check fails at the seed, or when the
/// combined walk doesn't reach `2*tlen` points.
#[allow(clippy::too_many_arguments)]
pub fn trace_whisker(
    seed: &Seed,
    image: &Image<u8>,
    line_bank: &DetectorBank,
    half_space_bank: &DetectorBank,
    cache: &mut OffsetCache,
    thresholds: &mut ThresholdCache,
    config: &Config,
    frame_id: i32,
) -> WhiskerSegment {
    let cwidth = image.width();
    let sigmin = (2.0 * config.tlen as f32 + 1.0) * config.min_signal;

    let mut line = line_param_from_seed(seed, config.angle_step);
    let roff = Interval { min: -2.5, max: 2.5 };
    let rwid = Interval { min: 0.5, max: 3.0 };
    let rang = Interval {
        min: line.angle - PI,
        max: line.angle + PI,
    };

    let mut p = seed.xpnt as usize + cwidth * seed.ypnt as usize;

    if !thresholds.is_trusted_conservative(frame_id, half_space_bank, cache, image, config, &line, p) {
        return WhiskerSegment::new(0, 0, &[], &[]);
    }

    line.score = eval_line(line_bank, cache, image, &line, p);
    adjust_line_start(&mut line, image, &mut p, line_bank, cache, config, &roff, &rang, &rwid);

    let snapshot_line = line;
    let snapshot_p = p;

    let mut forward = Vec::new();
    walk(
        line,
        p,
        1,
        image,
        line_bank,
        half_space_bank,
        cache,
        thresholds,
        config,
        frame_id,
        &roff,
        &rang,
        &rwid,
        sigmin,
        &mut forward,
        true,
    );

    let mut backward = Vec::new();
    walk(
        snapshot_line,
        snapshot_p,
        -1,
        image,
        line_bank,
        half_space_bank,
        cache,
        thresholds,
        config,
        frame_id,
        &roff,
        &rang,
        &rwid,
        sigmin,
        &mut backward,
        false,
    );

    if backward.len() + forward.len() > 2 * config.tlen as usize {
        WhiskerSegment::new(0, 0, &backward, &forward)
    } else {
        WhiskerSegment::new(0, 0, &[], &[])
    }
}

/// Re-exposes the anchor rounding used at the base of `eval_line`/
/// `eval_half_space` so callers outside the evaluator (e.g. tests) can
/// exercise it directly.
pub fn round_anchor(line: &LineParams, p: usize, stride: usize) -> (f32, usize) {
    round_anchor_and_offset(line, p, stride)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn move_line_steps_one_pixel_along_tangent() {
        let mut line = LineParams { offset: 0.0, angle: 0.0, width: 2.0, score: 0.0 };
        let stride = 64;
        let p = 32 + stride * 32;
        let newp = move_line(&mut line, p, stride, 1);
        assert_eq!(newp, 33 + stride * 32);
    }

    #[test]
    fn outofbounds_true_at_border_false_in_interior() {
        assert!(outofbounds(0, 64, 64));
        assert!(!outofbounds(32 + 64 * 32, 64, 64));
    }

    #[test]
    fn is_change_too_big_flags_large_angle_drift() {
        let a = LineParams { offset: 0.0, angle: 0.0, width: 2.0, score: 0.0 };
        let b = LineParams { offset: 0.0, angle: 1.0, width: 2.0, score: 0.0 };
        assert!(is_change_too_big(&b, &a, 10.0, 6.0, 6.0));
    }
}
