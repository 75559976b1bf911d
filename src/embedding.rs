//! Bag-of-words embedding primitives.
//!
//! A [`Vocabulary`] is the sorted set of distinct lower-cased whitespace
//! tokens across all task descriptions. A text embeds as a vector of token
//! counts over that vocabulary, L1-normalized so its entries sum to 1.
//! Texts without tokens embed as the zero vector.
//!
//! Also provides vector utilities shared with the cache:
//! - [`cosine_similarity`]: similarity with an epsilon-guarded denominator
//! - [`l1_normalize`]: in-place normalization to unit sum
//! - [`vec_to_blob`] / [`blob_to_vec`]: little-endian `f32` byte encoding

use std::collections::{BTreeSet, HashMap};

/// Added to the cosine denominator so zero vectors compare as `0.0`.
pub const COSINE_EPSILON: f64 = 1e-8;

/// Lower-case and split on whitespace.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// Sorted distinct tokens with a reverse lookup table.
#[derive(Debug, Clone, Default)]
pub struct Vocabulary {
    tokens: Vec<String>,
    positions: HashMap<String, usize>,
}

impl Vocabulary {
    pub fn build<'a, I>(texts: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let distinct: BTreeSet<String> = texts.into_iter().flat_map(tokenize).collect();
        let tokens: Vec<String> = distinct.into_iter().collect();
        let positions = tokens
            .iter()
            .enumerate()
            .map(|(i, t)| (t.clone(), i))
            .collect();
        Self { tokens, positions }
    }

    /// Vector dimensionality.
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    /// Count vector of `text` over this vocabulary, L1-normalized.
    pub fn embed(&self, text: &str) -> Vec<f32> {
        let mut counts = vec![0.0f64; self.tokens.len()];
        for token in tokenize(text) {
            if let Some(&i) = self.positions.get(&token) {
                counts[i] += 1.0;
            }
        }
        l1_normalize(&mut counts);
        counts.into_iter().map(|v| v as f32).collect()
    }
}

/// Divide by the sum so entries add up to 1. Leaves all-zero input untouched.
pub fn l1_normalize(values: &mut [f64]) {
    let sum: f64 = values.iter().sum();
    if sum > 0.0 {
        for v in values.iter_mut() {
            *v /= sum;
        }
    }
}

/// Cosine similarity between a query vector and a stored vector.
///
/// ```text
///               q · v
/// cos = ─────────────────────
///        ‖q‖ × ‖v‖ + 1e-8
/// ```
///
/// Returns `0.0` for vectors of different lengths.
pub fn cosine_similarity(query: &[f64], stored: &[f32]) -> f64 {
    if query.len() != stored.len() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_q = 0.0f64;
    let mut norm_v = 0.0f64;

    for (&q, &v) in query.iter().zip(stored.iter()) {
        let v = f64::from(v);
        dot += q * v;
        norm_q += q * q;
        norm_v += v * v;
    }

    dot / (norm_q.sqrt() * norm_v.sqrt() + COSINE_EPSILON)
}

/// Encode a float vector as little-endian `f32` bytes.
///
/// ```rust
/// use budget_harness::embedding::{vec_to_blob, blob_to_vec};
///
/// let v = vec![0.25f32, 0.75];
/// let blob = vec_to_blob(&v);
/// assert_eq!(blob.len(), 8);
/// assert_eq!(blob_to_vec(&blob), v);
/// ```
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode bytes written by [`vec_to_blob`]. Trailing partial words are dropped.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_lowercases_and_splits() {
        assert_eq!(
            tokenize("  Demolition of\tWALL tiles\n"),
            vec!["demolition", "of", "wall", "tiles"]
        );
        assert!(tokenize("   ").is_empty());
    }

    #[test]
    fn test_vocabulary_sorted_and_distinct() {
        let vocab = Vocabulary::build(["wall tiles", "Floor tiles", ""]);
        assert_eq!(vocab.tokens(), &["floor", "tiles", "wall"]);
        assert_eq!(vocab.len(), 3);
    }

    #[test]
    fn test_embed_sums_to_one() {
        let vocab = Vocabulary::build(["remove wall wall tiles"]);
        let v = vocab.embed("remove wall wall tiles");
        let sum: f32 = v.iter().sum();
        assert!((sum - 1.0).abs() < 1e-6);
        // vocabulary: remove, tiles, wall
        assert!((v[2] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_embed_empty_is_zero_vector() {
        let vocab = Vocabulary::build(["a b c"]);
        let v = vocab.embed("");
        assert_eq!(v, vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_cosine_identical() {
        let v = vec![0.5f32, 0.5];
        let q = vec![0.5f64, 0.5];
        assert!((cosine_similarity(&q, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_zero_vector_is_zero() {
        let v = vec![0.0f32, 0.0];
        let q = vec![1.0f64, 0.0];
        assert_eq!(cosine_similarity(&q, &v), 0.0);
    }

    #[test]
    fn test_cosine_different_lengths() {
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn test_blob_roundtrip() {
        let v = vec![1.0f32, -2.5, 0.125];
        assert_eq!(blob_to_vec(&vec_to_blob(&v)), v);
    }
}
