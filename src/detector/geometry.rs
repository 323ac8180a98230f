//! Polygon-vs-pixel overlap rasterization used to render detector filters.
//!
//! Gets an exact area-fraction-per-pixel contract (see `accumulate_sum`/
//! `accumulate_mask` below) from Sutherland-Hodgman clipping of the
//! filter's rectangle/disc primitives against each unit pixel square,
//! which is exact for convex polygons against axis-aligned boxes and
//! needs no lattice perturbation since clipping happens in floating point.

use nalgebra::Point2;
use std::f32::consts::FRAC_PI_2;

pub type Poly = Vec<Point2<f32>>;

/// Signed area of a simple polygon via the shoelace formula.
pub fn polygon_area(poly: &[Point2<f32>]) -> f32 {
    if poly.len() < 3 {
        return 0.0;
    }
    let mut sum = 0.0;
    for i in 0..poly.len() {
        let a = poly[i];
        let b = poly[(i + 1) % poly.len()];
        sum += a.x * b.y - b.x * a.y;
    }
    (sum * 0.5).abs()
}

/// Clip a convex polygon against the half-plane `inside(p)`, where `edge`
/// gives the boundary used to interpolate the cut point. Standard
/// Sutherland-Hodgman single-edge pass.
fn clip_edge(
    poly: &[Point2<f32>],
    inside: impl Fn(Point2<f32>) -> bool,
    intersect: impl Fn(Point2<f32>, Point2<f32>) -> Point2<f32>,
) -> Poly {
    if poly.is_empty() {
        return Vec::new();
    }
    let mut out = Vec::with_capacity(poly.len() + 1);
    for i in 0..poly.len() {
        let cur = poly[i];
        let prev = poly[(i + poly.len() - 1) % poly.len()];
        let cur_in = inside(cur);
        let prev_in = inside(prev);
        if cur_in {
            if !prev_in {
                out.push(intersect(prev, cur));
            }
            out.push(cur);
        } else if prev_in {
            out.push(intersect(prev, cur));
        }
    }
    out
}

/// Clip a convex polygon to the axis-aligned box `[min, max]`.
pub fn clip_to_box(poly: &[Point2<f32>], min: Point2<f32>, max: Point2<f32>) -> Poly {
    let lerp = |a: Point2<f32>, b: Point2<f32>, t: f32| Point2::new(a.x + t * (b.x - a.x), a.y + t * (b.y - a.y));

    let mut cur = poly.to_vec();
    cur = clip_edge(
        &cur,
        |p| p.x >= min.x,
        |a, b| {
            let t = (min.x - a.x) / (b.x - a.x);
            lerp(a, b, t)
        },
    );
    cur = clip_edge(
        &cur,
        |p| p.x <= max.x,
        |a, b| {
            let t = (max.x - a.x) / (b.x - a.x);
            lerp(a, b, t)
        },
    );
    cur = clip_edge(
        &cur,
        |p| p.y >= min.y,
        |a, b| {
            let t = (min.y - a.y) / (b.y - a.y);
            lerp(a, b, t)
        },
    );
    cur = clip_edge(
        &cur,
        |p| p.y <= max.y,
        |a, b| {
            let t = (max.y - a.y) / (b.y - a.y);
            lerp(a, b, t)
        },
    );
    cur
}

pub fn rotate(points: &mut [Point2<f32>], angle: f32) {
    let (s, c) = angle.sin_cos();
    for p in points.iter_mut() {
        let (x, y) = (p.x, p.y);
        p.x = x * c - y * s;
        p.y = x * s + y * c;
    }
}

pub fn translate(points: &mut [Point2<f32>], dx: f32, dy: f32) {
    for p in points.iter_mut() {
        p.x += dx;
        p.y += dy;
    }
}

/// A thin rectangle of the given `length` (along its local x axis) and
/// `thickness`, rotated by `angle` and recentered `normal_offset` pixels
/// along the perpendicular of `angle` from the support origin.
pub fn stripe_polygon(length: f32, thickness: f32, angle: f32, normal_offset: f32) -> Poly {
    let half_l = length / 2.0;
    let half_t = thickness / 2.0;
    let mut pts = vec![
        Point2::new(-half_l, -half_t),
        Point2::new(half_l, -half_t),
        Point2::new(half_l, half_t),
        Point2::new(-half_l, half_t),
    ];
    rotate(&mut pts, angle);
    let nx = (angle + FRAC_PI_2).cos();
    let ny = (angle + FRAC_PI_2).sin();
    translate(&mut pts, nx * normal_offset, ny * normal_offset);
    pts
}

/// A regular polygon with `sides` vertices approximating a disc of the
/// given `radius`, centered `normal_offset` pixels along the perpendicular
/// of `angle` from the support origin.
pub fn disc_polygon(radius: f32, sides: usize, angle: f32, normal_offset: f32) -> Poly {
    let mut pts = Vec::with_capacity(sides);
    for k in 0..sides {
        let theta = (k as f32) * std::f32::consts::TAU / (sides as f32);
        pts.push(Point2::new(radius * theta.cos(), radius * theta.sin()));
    }
    let nx = (angle + FRAC_PI_2).cos();
    let ny = (angle + FRAC_PI_2).sin();
    translate(&mut pts, nx * normal_offset, ny * normal_offset);
    pts
}

/// Accumulate `weight * overlap_fraction` for every cell of a
/// `support x support` grid that the polygon overlaps. Grid coordinates
/// are centered on the support's middle cell (`support / 2`).
pub fn accumulate_sum(poly: &[Point2<f32>], weight: f32, grid: &mut [f32], support: usize) {
    let half = (support / 2) as f32;
    let (min, max) = bbox(poly);
    let lo_row = ((min.y + half).floor().max(0.0)) as usize;
    let hi_row = ((max.y + half).ceil().min(support as f32 - 1.0)) as usize;
    let lo_col = ((min.x + half).floor().max(0.0)) as usize;
    let hi_col = ((max.x + half).ceil().min(support as f32 - 1.0)) as usize;
    if min.x.is_nan() || max.x < min.x {
        return;
    }
    for row in lo_row..=hi_row.min(support.saturating_sub(1)) {
        for col in lo_col..=hi_col.min(support.saturating_sub(1)) {
            let cell_min = Point2::new(col as f32 - half - 0.5, row as f32 - half - 0.5);
            let cell_max = Point2::new(col as f32 - half + 0.5, row as f32 - half + 0.5);
            let clipped = clip_to_box(poly, cell_min, cell_max);
            let area = polygon_area(&clipped);
            if area > 0.0 {
                grid[row * support + col] += weight * area;
            }
        }
    }
}

/// Multiply every cell of the grid by the polygon's overlap fraction,
/// zeroing cells the polygon doesn't touch at all (used for the
/// half-space detector's disc mask).
pub fn accumulate_mask(poly: &[Point2<f32>], grid: &mut [f32], support: usize) {
    let half = (support / 2) as f32;
    for row in 0..support {
        for col in 0..support {
            let cell_min = Point2::new(col as f32 - half - 0.5, row as f32 - half - 0.5);
            let cell_max = Point2::new(col as f32 - half + 0.5, row as f32 - half + 0.5);
            let clipped = clip_to_box(poly, cell_min, cell_max);
            let frac = polygon_area(&clipped);
            grid[row * support + col] *= frac;
        }
    }
}

fn bbox(poly: &[Point2<f32>]) -> (Point2<f32>, Point2<f32>) {
    let mut min = Point2::new(f32::INFINITY, f32::INFINITY);
    let mut max = Point2::new(f32::NEG_INFINITY, f32::NEG_INFINITY);
    for p in poly {
        min.x = min.x.min(p.x);
        min.y = min.y.min(p.y);
        max.x = max.x.max(p.x);
        max.y = max.y.max(p.y);
    }
    (min, max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn unit_square_fully_inside_box_keeps_full_area() {
        let square = vec![
            Point2::new(-0.5, -0.5),
            Point2::new(0.5, -0.5),
            Point2::new(0.5, 0.5),
            Point2::new(-0.5, 0.5),
        ];
        let clipped = clip_to_box(&square, Point2::new(-1.0, -1.0), Point2::new(1.0, 1.0));
        assert_approx_eq!(polygon_area(&clipped), 1.0, 1e-5);
    }

    #[test]
    fn half_overlap_gives_half_area() {
        let square = vec![
            Point2::new(0.0, -0.5),
            Point2::new(1.0, -0.5),
            Point2::new(1.0, 0.5),
            Point2::new(0.0, 0.5),
        ];
        let clipped = clip_to_box(&square, Point2::new(-0.5, -0.5), Point2::new(0.5, 0.5));
        assert_approx_eq!(polygon_area(&clipped), 0.5, 1e-5);
    }

    #[test]
    fn stripe_polygon_is_axis_aligned_at_zero_angle() {
        let poly = stripe_polygon(4.0, 1.0, 0.0, 0.0);
        let (min, max) = bbox(&poly);
        assert_approx_eq!(min.x, -2.0, 1e-5);
        assert_approx_eq!(max.x, 2.0, 1e-5);
        assert_approx_eq!(min.y, -0.5, 1e-5);
        assert_approx_eq!(max.y, 0.5, 1e-5);
    }
}
