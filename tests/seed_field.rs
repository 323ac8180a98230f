use whisker_tracer::config::Config;
use whisker_tracer::image::Image;
use whisker_tracer::seed_field::{rank_seeds, SeedField};
use whisker_tracer::detector::{DetectorBank, Kind};
use whisker_tracer::offset_cache::OffsetCache;

fn dark_line_image(width: usize, height: usize, y0: usize) -> Image<u8> {
    let mut data = vec![200u8; width * height];
    for x in 20..width - 20 {
        data[y0 * width + x] = 30;
    }
    Image::from_vec(width, height, data)
}

#[test]
fn sweep_then_rank_orders_candidates_ascending_by_score() {
    let mut config = Config::default();
    config.lattice_spacing = 4;
    let image = dark_line_image(96, 96, 48);

    let mut field = SeedField::new();
    field.sweep(&image, &config);
    assert!(field.mask().iter().any(|&m| m), "expected some seed candidates on a dark line");

    let bank = DetectorBank::build(&config, Kind::Line);
    let mut cache = OffsetCache::new();
    let ranked = rank_seeds(&field, &image, &bank, &mut cache, &config);
    assert!(!ranked.is_empty());
    for pair in ranked.windows(2) {
        assert!(pair[0].score <= pair[1].score);
    }
}

#[test]
fn sweep_is_repeatable_on_the_same_frame() {
    let mut config = Config::default();
    config.lattice_spacing = 4;
    let image = dark_line_image(96, 96, 48);

    let mut field = SeedField::new();
    field.sweep(&image, &config);
    let first: Vec<bool> = field.mask().to_vec();
    field.sweep(&image, &config);
    let second: Vec<bool> = field.mask().to_vec();
    assert_eq!(first, second);
}
