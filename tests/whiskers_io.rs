use whisker_tracer::types::WhiskerSegment;
use whisker_tracer::whiskers_io::{read_whiskers, write_whiskers};

#[test]
fn round_trips_a_traced_segment_bit_exact() {
    let seg = WhiskerSegment {
        id: 1,
        time: 0,
        x: vec![10.0, 10.9, 12.1, 13.0],
        y: vec![48.0, 48.1, 47.9, 48.0],
        thick: vec![2.0, 2.1, 2.0, 1.9],
        scores: vec![-4.0, -4.2, -4.1, -3.9],
    };
    let mut buf = Vec::new();
    write_whiskers(&mut buf, &[seg.clone()]).unwrap();
    let back = read_whiskers(&mut buf.as_slice()).unwrap();
    assert_eq!(back, vec![seg]);
}
