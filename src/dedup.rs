//! De-duplication: collapses whisker segments whose tail ends sit close
//! together into one, keeping whichever has the higher raw score total.

use crate::types::WhiskerSegment;

const TAIL_POINTS: usize = 20;

fn tail_distance(a: &WhiskerSegment, b: &WhiskerSegment) -> f64 {
    let mut acc = 0.0f64;
    let na = a.len();
    let nb = b.len();
    for k in 1..=TAIL_POINTS {
        if k > na || k > nb {
            break;
        }
        let (ax, ay) = (a.x[na - k] as f64, a.y[na - k] as f64);
        let (bx, by) = (b.x[nb - k] as f64, b.y[nb - k] as f64);
        acc += ((ax - bx).powi(2) + (ay - by).powi(2)).sqrt();
    }
    acc
}

/// Remove redundant segments in place. For each segment `i`, walks every
/// other segment `j` accumulating a running tail-distance minimum; as soon
/// as that running minimum drops under `redundancy_thres` it removes the
/// lower-scored of the pair and restarts the outer scan from index 1,
/// without necessarily having compared `i` against every other segment
/// first. Kept deliberately short-circuiting rather than rewritten as a
/// from-scratch nearest-neighbor pass (see DESIGN.md).
pub fn eliminate_redundant(segments: &mut Vec<WhiskerSegment>, redundancy_thres: f32) {
    let thres = redundancy_thres as f64;
    let mut i = 0usize;
    while i < segments.len() {
        let mut min_cor = f64::MAX;
        let mut removed = false;
        let mut j = 0usize;
        while j < segments.len() {
            if j == i {
                j += 1;
                continue;
            }
            let d = tail_distance(&segments[i], &segments[j]);
            if d < min_cor {
                min_cor = d;
            }
            if min_cor < thres {
                let w1_score = segments[j].score_sum();
                let w2_score = segments[i].score_sum();
                if w1_score > w2_score {
                    segments.remove(i);
                } else {
                    segments.remove(j);
                }
                removed = true;
                break;
            }
            j += 1;
        }
        if removed {
            i = 1;
        } else {
            i += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Record;

    fn segment(id: i32, xs: &[f32], score: f32) -> WhiskerSegment {
        let records: Vec<Record> = xs
            .iter()
            .map(|&x| Record { x, y: 0.0, thick: 1.0, score })
            .collect();
        WhiskerSegment::new(id, 0, &[], &records)
    }

    #[test]
    fn keeps_distinct_segments() {
        let mut segs = vec![
            segment(0, &[0.0, 1.0, 2.0, 3.0], 1.0),
            segment(1, &[100.0, 101.0, 102.0, 103.0], 1.0),
        ];
        eliminate_redundant(&mut segs, 20.0);
        assert_eq!(segs.len(), 2);
    }

    #[test]
    fn collapses_near_duplicate_segments_keeping_higher_score() {
        let mut segs = vec![
            segment(0, &[0.0, 1.0, 2.0, 3.0], 1.0),
            segment(1, &[0.01, 1.01, 2.01, 3.01], 5.0),
        ];
        eliminate_redundant(&mut segs, 20.0);
        assert_eq!(segs.len(), 1);
        assert_eq!(segs[0].id, 1);
    }

    #[test]
    fn exact_score_tie_keeps_the_earlier_index() {
        // Both segments score 2.0 per vertex over 4 vertices: score_sum ties
        // at 8.0. On a tie, `w1_score > w2_score` is false, so `j` (the
        // later index) is removed and `i` survives.
        let mut segs = vec![
            segment(0, &[0.0, 1.0, 2.0, 3.0], 2.0),
            segment(1, &[0.01, 1.01, 2.01, 3.01], 2.0),
        ];
        eliminate_redundant(&mut segs, 20.0);
        assert_eq!(segs.len(), 1);
        assert_eq!(segs[0].id, 0);
    }
}
