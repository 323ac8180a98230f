//! Pixel-offset list cache: for an anchor pixel and an orientation class,
//! the (image-index, filter-index) pairs every correlation loop consumes.
//!
//! Kept as explicit engine-owned state, keyed on (anchor, small-angle
//! flag, support), rather than hidden behind function-local statics.

use crate::detector::bank::is_small_angle;
use crate::image::Image;
use crate::types::OffsetPair;

#[derive(Debug, Clone, Default)]
pub struct OffsetCache {
    pairs: Vec<OffsetPair>,
    n_inbounds: usize,
    key: Option<(usize, bool, usize)>, // (anchor, is_small_angle, support)
}

impl OffsetCache {
    pub fn new() -> Self {
        OffsetCache::default()
    }

    /// Recompute (if the key changed) and return the (in-bounds prefix,
    /// out-of-bounds suffix) pair lists for anchor `p` at the given
    /// `angle` and `support`.
    pub fn get(&mut self, image: &Image<u8>, support: usize, angle: f32, p: usize) -> (&[OffsetPair], &[OffsetPair]) {
        let issa = is_small_angle(angle);
        let key = (p, issa, support);
        if self.key != Some(key) {
            self.recompute(image, support, issa, p);
            self.key = Some(key);
        }
        self.pairs.split_at(self.n_inbounds)
    }

    fn recompute(&mut self, image: &Image<u8>, support: usize, is_small: bool, p: usize) {
        let width = image.width();
        let height = image.height();
        let px = (p % width) as i64;
        let py = (p / width) as i64;
        let half = (support / 2) as i64;
        let ox = px - half;
        let oy = py - half;

        let total = support * support;
        let mut inbounds = Vec::with_capacity(total);
        let mut oob = Vec::with_capacity(total / 4);

        // `is_small`: sweep rows over y, cols over x (natural layout).
        // large angle: transpose -- sweep "rows" over x, "cols" over y.
        for i in 0..support {
            for j in 0..support {
                let (tx, ty) = if is_small {
                    (ox + j as i64, oy + i as i64)
                } else {
                    (ox + i as i64, oy + j as i64)
                };
                let filter_index = support * i + j;
                if tx >= 0 && (tx as usize) < width && ty >= 0 && (ty as usize) < height {
                    inbounds.push(OffsetPair {
                        image_index: image.index_of(tx as usize, ty as usize),
                        filter_index,
                    });
                } else {
                    let (cx, cy) = image.clamp_coords(tx, ty);
                    oob.push(OffsetPair {
                        image_index: image.index_of(cx, cy),
                        filter_index,
                    });
                }
            }
        }

        self.n_inbounds = inbounds.len();
        inbounds.extend(oob);
        self.pairs = inbounds;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interior_anchor_has_no_out_of_bounds_pairs() {
        let image = Image::<u8>::new(64, 64);
        let mut cache = OffsetCache::new();
        let p = image.index_of(32, 32);
        let (prefix, suffix) = cache.get(&image, 19, 0.0, p);
        assert_eq!(prefix.len(), 19 * 19);
        assert_eq!(suffix.len(), 0);
    }

    #[test]
    fn border_anchor_has_out_of_bounds_pairs() {
        let image = Image::<u8>::new(64, 64);
        let mut cache = OffsetCache::new();
        let p = image.index_of(0, 0);
        let (prefix, suffix) = cache.get(&image, 19, 0.0, p);
        assert_eq!(prefix.len() + suffix.len(), 19 * 19);
        assert!(!suffix.is_empty());
    }

    #[test]
    fn recompute_only_happens_on_key_change() {
        let image = Image::<u8>::new(64, 64);
        let mut cache = OffsetCache::new();
        let p = image.index_of(32, 32);
        let _ = cache.get(&image, 19, 0.0, p);
        let key_after_first = cache.key;
        let _ = cache.get(&image, 19, 0.0, p);
        assert_eq!(cache.key, key_after_first);
    }
}
