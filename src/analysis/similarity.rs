use crate::frame::Frame;

/// Bins per channel for the histogram embedding.
const HISTOGRAM_BINS: usize = 4;

/// Cosine similarity over flattened vectors.
///
/// Returns 0.0 when either vector has zero norm, when lengths differ, or when the
/// result is not finite.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (*x as f64, *y as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    let similarity = dot / (norm_a.sqrt() * norm_b.sqrt());
    if similarity.is_finite() {
        similarity as f32
    } else {
        0.0
    }
}

/// Coarse joint RGB histogram (4×4×4 bins), normalised to sum to 1.
///
/// Good enough to tell "same corner of the same room" from "somewhere else" when no
/// embedding model is available.
pub fn color_histogram_embedding(frame: &Frame) -> Vec<f32> {
    let mut bins = vec![0.0f32; HISTOGRAM_BINS * HISTOGRAM_BINS * HISTOGRAM_BINS];
    if frame.is_empty() {
        return bins;
    }
    let shift = 8 - HISTOGRAM_BINS.trailing_zeros();
    let bpp = frame.bytes_per_pixel();
    let mut count = 0usize;
    for px in frame.pixels().chunks_exact(bpp) {
        let r = (px[0] >> shift) as usize;
        let g = (px[1] >> shift) as usize;
        let b = (px[2] >> shift) as usize;
        bins[(r * HISTOGRAM_BINS + g) * HISTOGRAM_BINS + b] += 1.0;
        count += 1;
    }
    let total = count as f32;
    for bin in &mut bins {
        *bin /= total;
    }
    bins
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_vectors_are_similar() {
        let v = [0.2, 0.4, 0.1];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn orthogonal_vectors_score_zero() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
    }

    #[test]
    fn zero_norm_and_length_mismatch_are_guarded() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 1.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
    }

    #[test]
    fn histogram_separates_colors() {
        let red = color_histogram_embedding(&Frame::uniform(8, 8, [250, 10, 10]));
        let red_again = color_histogram_embedding(&Frame::uniform(4, 4, [240, 20, 5]));
        let blue = color_histogram_embedding(&Frame::uniform(8, 8, [10, 10, 250]));
        assert!((red.iter().sum::<f32>() - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&red, &red_again) > 0.99);
        assert_eq!(cosine_similarity(&red, &blue), 0.0);
    }
}
