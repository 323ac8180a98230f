use whisker_tracer::dedup::eliminate_redundant;
use whisker_tracer::types::{Record, WhiskerSegment};

fn segment(id: i32, xs: &[f32], y: f32, score: f32) -> WhiskerSegment {
    let records: Vec<Record> = xs.iter().map(|&x| Record { x, y, thick: 1.5, score }).collect();
    WhiskerSegment::new(id, 0, &[], &records)
}

#[test]
fn three_overlapping_traces_collapse_to_the_best_scored_one() {
    let mut segs = vec![
        segment(0, &[10.0, 11.0, 12.0, 13.0, 14.0], 20.0, 1.0),
        segment(1, &[10.05, 11.05, 12.05, 13.05, 14.05], 20.05, 9.0),
        segment(2, &[10.1, 11.1, 12.1, 13.1, 14.1], 19.95, 3.0),
    ];
    eliminate_redundant(&mut segs, 20.0);
    assert_eq!(segs.len(), 1);
    assert_eq!(segs[0].id, 1);
}

#[test]
fn far_apart_traces_all_survive() {
    let mut segs = vec![
        segment(0, &[0.0, 1.0, 2.0], 0.0, 1.0),
        segment(1, &[0.0, 1.0, 2.0], 200.0, 1.0),
        segment(2, &[200.0, 201.0, 202.0], 0.0, 1.0),
    ];
    eliminate_redundant(&mut segs, 20.0);
    assert_eq!(segs.len(), 3);
}

#[test]
fn tied_overlapping_pair_keeps_the_earlier_index() {
    let mut segs = vec![
        segment(0, &[10.0, 11.0, 12.0, 13.0], 20.0, 2.0),
        segment(1, &[10.01, 11.01, 12.01, 13.01], 20.01, 2.0),
        segment(2, &[100.0, 101.0, 102.0, 103.0], 0.0, 1.0),
    ];
    eliminate_redundant(&mut segs, 20.0);
    assert_eq!(segs.len(), 2);
    let ids: Vec<i32> = segs.iter().map(|s| s.id).collect();
    assert!(ids.contains(&0));
    assert!(ids.contains(&2));
}
