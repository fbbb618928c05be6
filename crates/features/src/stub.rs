use fxhash::hash64;

use crate::{ExtractionError, FeatureExtractor};

/// Deterministic stub extractor for tests and offline runs.
///
/// Seeds a splitmix64 stream from a hash of the input bytes and fills the
/// vector with values in `[-1, 1)`. Identical bytes give identical vectors;
/// unrelated bytes give effectively independent vectors, whose cosine
/// similarity concentrates near zero at the default dimension, so accept
/// and reject paths are both exercisable without a real model.
#[derive(Debug, Clone)]
pub struct StubExtractor {
    dimension: usize,
}

impl StubExtractor {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }
}

impl Default for StubExtractor {
    fn default() -> Self {
        Self::new(128)
    }
}

impl FeatureExtractor for StubExtractor {
    fn extract(&self, image_bytes: &[u8]) -> Result<Vec<f32>, ExtractionError> {
        if image_bytes.is_empty() {
            return Err(ExtractionError::Undecodable("empty input".into()));
        }

        let mut state = hash64(image_bytes);
        let vector = (0..self.dimension)
            .map(|_| {
                state = splitmix64(state);
                // Top 53 bits to [0, 1), shifted to [-1, 1).
                ((state >> 11) as f64 / (1u64 << 53) as f64 * 2.0 - 1.0) as f32
            })
            .collect();
        Ok(vector)
    }
}

fn splitmix64(state: u64) -> u64 {
    let mut z = state.wrapping_add(0x9e37_79b9_7f4a_7c15);
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_bytes_same_vector() {
        let extractor = StubExtractor::default();
        let a = extractor.extract(b"tile pixels").expect("extract");
        let b = extractor.extract(b"tile pixels").expect("extract");
        assert_eq!(a, b);
        assert_eq!(a.len(), 128);
    }

    #[test]
    fn different_bytes_different_vector() {
        let extractor = StubExtractor::default();
        let a = extractor.extract(b"tile one").expect("extract");
        let b = extractor.extract(b"tile two").expect("extract");
        assert_ne!(a, b);
    }

    #[test]
    fn unrelated_inputs_are_nearly_orthogonal() {
        let extractor = StubExtractor::new(256);
        let a = extractor.extract(b"first input").expect("extract");
        let b = extractor.extract(b"second input").expect("extract");

        let dot: f32 = a.iter().zip(&b).map(|(x, y)| x * y).sum();
        let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
        let cosine = dot / (norm_a * norm_b);
        assert!(cosine.abs() < 0.4, "cosine {cosine} unexpectedly large");
    }

    #[test]
    fn values_stay_in_range() {
        let extractor = StubExtractor::new(64);
        let vector = extractor.extract(b"range check").expect("extract");
        for (i, &v) in vector.iter().enumerate() {
            assert!((-1.0..1.0).contains(&v), "value {v} at index {i}");
        }
    }

    #[test]
    fn empty_input_is_undecodable() {
        let extractor = StubExtractor::default();
        assert!(matches!(
            extractor.extract(b""),
            Err(ExtractionError::Undecodable(_))
        ));
    }

    #[test]
    fn dimension_is_clamped_to_one() {
        let extractor = StubExtractor::new(0);
        assert_eq!(extractor.dimension(), 1);
        assert_eq!(extractor.extract(b"x").expect("extract").len(), 1);
    }
}
