//! Trust predicates: half-space asymmetry checks that decide whether the
//! local area around a line anchor looks like "whisker on a darker
//! background".

use crate::config::Config;
use crate::detector::DetectorBank;
use crate::evaluator::eval_half_space;
use crate::image::Image;
use crate::offset_cache::OffsetCache;
use crate::types::LineParams;

/// Per-frame memoized trust thresholds, keyed off an explicit frame id
/// owned by the engine rather than the image buffer's identity, so a
/// repeated frame recomputes exactly once.
#[derive(Debug, Clone, Default)]
pub struct ThresholdCache {
    frame_id: Option<i32>,
    conservative: f32,
    relaxed: f32,
}

impl ThresholdCache {
    pub fn new() -> Self {
        ThresholdCache::default()
    }

    fn ensure(&mut self, frame_id: i32, image: &Image<u8>) {
        if self.frame_id != Some(frame_id) {
            self.conservative = threshold_two_means(image);
            self.relaxed = threshold_bottom_fraction(image);
            self.frame_id = Some(frame_id);
        }
    }

    /// Conservative predicate used only at trace start.
    #[allow(clippy::too_many_arguments)]
    pub fn is_trusted_conservative(
        &mut self,
        frame_id: i32,
        bank: &DetectorBank,
        cache: &mut OffsetCache,
        image: &Image<u8>,
        config: &Config,
        line: &LineParams,
        p: usize,
    ) -> bool {
        self.ensure(frame_id, image);
        let (q, r, l) = eval_half_space(bank, cache, image, line, p);
        trust_rule(q, r, l, self.conservative, config.half_space_asymmetry)
    }

    /// Relaxed predicate used while the walker is moving.
    #[allow(clippy::too_many_arguments)]
    pub fn is_trusted_relaxed(
        &mut self,
        frame_id: i32,
        bank: &DetectorBank,
        cache: &mut OffsetCache,
        image: &Image<u8>,
        config: &Config,
        line: &LineParams,
        p: usize,
    ) -> bool {
        self.ensure(frame_id, image);
        let (q, r, l) = eval_half_space(bank, cache, image, line, p);
        trust_rule(q, r, l, self.relaxed, config.half_space_asymmetry)
    }
}

fn trust_rule(q: f32, r: f32, l: f32, threshold: f32, asymmetry: f32) -> bool {
    if (r < threshold && l < threshold) || q.abs() > asymmetry {
        false
    } else {
        true
    }
}

/// Two-means iterative threshold over the 256-bin intensity histogram:
/// start at the mean, repeatedly split by the current threshold and
/// recompute it as the average of the two parts' means, until the
/// threshold moves by less than 0.5.
pub fn threshold_two_means(image: &Image<u8>) -> f32 {
    let mut hist = [0u32; 256];
    for &v in image.as_slice() {
        hist[v as usize] += 1;
    }

    let mean_over = |lo: usize, hi: usize| -> f32 {
        let mut num = 0.0f64;
        let mut dom = 0.0f64;
        for i in lo..hi {
            num += i as f64 * hist[i] as f64;
            dom += hist[i] as f64;
        }
        if dom == 0.0 {
            0.0
        } else {
            (num / dom) as f32
        }
    };

    let mut thresh = mean_over(0, 256);
    loop {
        let last = thresh;
        let split = (thresh.ceil() as i64).clamp(0, 256) as usize;
        let c0 = mean_over(0, split);
        let c1 = mean_over(split, 256);
        thresh = (c0 + c1) / 2.0;
        if (last - thresh).abs() <= 0.5 {
            break;
        }
    }
    thresh
}

/// Bottom-fraction-mean threshold: the mean of all pixels strictly below
/// the image's overall mean.
pub fn threshold_bottom_fraction(image: &Image<u8>) -> f32 {
    let data = image.as_slice();
    let total: u64 = data.iter().map(|&v| v as u64).sum();
    let mean = total as f64 / data.len() as f64;

    let mut acc = 0u64;
    let mut count = 0u64;
    for &v in data {
        if (v as f64) < mean {
            acc += v as u64;
            count += 1;
        }
    }
    if count == 0 {
        0.0
    } else {
        (acc / count) as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_means_on_bimodal_image_separates_classes() {
        let mut data = vec![20u8; 32];
        data.extend(vec![220u8; 32]);
        let image = Image::from_vec(8, 8, data);
        let t = threshold_two_means(&image);
        assert!(t > 20.0 && t < 220.0);
    }

    #[test]
    fn bottom_fraction_on_uniform_image_is_zero() {
        // No pixel is strictly below a uniform image's own mean.
        let image = Image::from_vec(8, 8, vec![100u8; 64]);
        assert_eq!(threshold_bottom_fraction(&image), 0.0);
    }

    #[test]
    fn bottom_fraction_excludes_pixels_exactly_at_the_mean() {
        let mut data = vec![50u8; 32];
        data.extend(vec![150u8; 32]);
        let image = Image::from_vec(8, 8, data);
        // mean is exactly 100.0; only the 50s are strictly below it.
        assert_eq!(threshold_bottom_fraction(&image), 50.0);
    }

    #[test]
    fn trust_rule_rejects_large_asymmetry() {
        assert!(!trust_rule(0.9, 10.0, 10.0, 1.0, 0.25));
    }

    #[test]
    fn trust_rule_rejects_when_both_sides_below_threshold() {
        assert!(!trust_rule(0.0, 1.0, 1.0, 5.0, 0.25));
    }

    #[test]
    fn trust_rule_accepts_strong_symmetric_signal() {
        assert!(trust_rule(0.0, 10.0, 10.0, 5.0, 0.25));
    }
}
