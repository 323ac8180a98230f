//! Top-level engine: owns the detector banks and per-run scratch state,
//! and drives the full per-frame pipeline described in the overview
//! (seed sweep -> rank -> trace -> de-duplicate).

use log::{info, warn};

use crate::config::Config;
use crate::dedup::eliminate_redundant;
use crate::detector::{DetectorBank, Kind};
use crate::image::Image;
use crate::offset_cache::OffsetCache;
use crate::seed_field::{rank_seeds, SeedField};
use crate::tracer::trace_whisker;
use crate::trust::ThresholdCache;
use crate::types::{Seed, WhiskerSegment};

/// Owns both detector banks, the seed field's scratch buffers, the
/// pixel-offset cache and the per-frame trust-threshold cache. Banks are
/// built once, eagerly, when the engine is constructed -- not lazily on
/// the first frame.
pub struct Tracer {
    config: Config,
    line_bank: DetectorBank,
    half_space_bank: DetectorBank,
    seed_field: SeedField,
    offset_cache: OffsetCache,
    thresholds: ThresholdCache,
    next_id: i32,
}

impl Tracer {
    pub fn new(config: Config) -> Self {
        let line_bank = DetectorBank::build(&config, Kind::Line);
        let half_space_bank = DetectorBank::build(&config, Kind::HalfSpace);
        Tracer {
            config,
            line_bank,
            half_space_bank,
            seed_field: SeedField::new(),
            offset_cache: OffsetCache::new(),
            thresholds: ThresholdCache::new(),
            next_id: 0,
        }
    }

    /// Rebuild both detector banks for a new configuration. Call this
    /// instead of constructing a fresh `Tracer` when only the numeric
    /// knobs changed between runs.
    pub fn rebuild_banks(&mut self, config: Config) {
        self.line_bank = DetectorBank::build(&config, Kind::Line);
        self.half_space_bank = DetectorBank::build(&config, Kind::HalfSpace);
        self.config = config;
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run the full pipeline over one frame: sweep the seed field, rank
    /// candidates worst-to-best, trace each still-masked seed (retrying
    /// once with the direction flipped on an empty trace), filter by
    /// `min_length`, then de-duplicate. Never errors: a uniform or
    /// undersized frame simply yields no segments.
    pub fn find_segments(&mut self, frame_id: i32, image: &Image<u8>) -> Vec<WhiskerSegment> {
        self.seed_field.sweep(image, &self.config);
        let mut mask: Vec<bool> = self.seed_field.mask().to_vec();

        let ranked = rank_seeds(&self.seed_field, image, &self.line_bank, &mut self.offset_cache, &self.config);
        info!("frame {}: {} seed candidates", frame_id, ranked.len());

        let mut segments = Vec::new();
        let stride = image.width();

        // Walk worst-to-best: the ranked list is sorted ascending by
        // score, so the worst (largest) score is at the end.
        let mut j = ranked.len();
        while j > 0 {
            j -= 1;
            let idx = ranked[j].index;
            if !mask[idx] {
                continue;
            }

            let seed = Seed {
                xpnt: (idx % stride) as i32,
                ypnt: (idx / stride) as i32,
                xdir: (100.0 * self.seed_field.slope_at(idx).cos()).round() as i32,
                ydir: (100.0 * self.seed_field.slope_at(idx).sin()).round() as i32,
            };

            let mut seg = trace_whisker(
                &seed,
                image,
                &self.line_bank,
                &self.half_space_bank,
                &mut self.offset_cache,
                &mut self.thresholds,
                &self.config,
                frame_id,
            );

            if seg.is_empty() {
                // Retry once with xdir/ydir swapped.
                let swapped = Seed {
                    xdir: seed.ydir,
                    ydir: seed.xdir,
                    ..seed
                };
                seg = trace_whisker(
                    &swapped,
                    image,
                    &self.line_bank,
                    &self.half_space_bank,
                    &mut self.offset_cache,
                    &mut self.thresholds,
                    &self.config,
                    frame_id,
                );
            }

            mask[idx] = false;

            if seg.len() > self.config.min_length as usize {
                seg.id = self.next_id;
                seg.time = frame_id;
                self.next_id += 1;
                segments.push(seg);
            }
        }

        if segments.is_empty() {
            warn!("frame {}: no segments above min_length", frame_id);
        }

        eliminate_redundant(&mut segments, self.config.redundancy_thres);
        info!("frame {}: {} segments after de-duplication", frame_id, segments.len());
        segments
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_image_yields_no_segments() {
        let config = Config::default();
        let mut tracer = Tracer::new(config);
        let image = Image::<u8>::from_vec(64, 64, vec![128u8; 64 * 64]);
        let segs = tracer.find_segments(0, &image);
        assert!(segs.is_empty());
    }

    #[test]
    fn horizontal_dark_line_yields_a_segment() {
        let mut config = Config::default();
        config.lattice_spacing = 4;
        config.min_length = 5;
        let mut tracer = Tracer::new(config);
        let mut data = vec![220u8; 96 * 96];
        for x in 10..86 {
            for dy in -1..=1 {
                let y = (48 + dy) as usize;
                data[y * 96 + x] = 20;
            }
        }
        let image = Image::from_vec(96, 96, data);
        let segs = tracer.find_segments(0, &image);
        assert!(!segs.is_empty(), "expected at least one traced segment");
        for seg in &segs {
            assert!(seg.len() as u32 > tracer.config().min_length);
        }
    }
}
