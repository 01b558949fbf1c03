//! Feature-hashing embedder.
//!
//! Each token is hashed with SHA-256 into one of `dims` buckets with a
//! signed weight, and the result is L2-normalised. Identifiers are split on
//! non-alphanumerics and camelCase boundaries so `compute_total`,
//! `computeTotal` and "compute total" land on the same buckets.

use anyhow::Result;
use async_trait::async_trait;
use sha2::{Digest, Sha256};

use super::EmbeddingProvider;

pub const DEFAULT_DIMS: usize = 384;

pub struct HashProvider {
    dims: usize,
}

impl HashProvider {
    pub fn new(dims: usize) -> Self {
        Self { dims: dims.max(1) }
    }

    pub fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vec = vec![0.0f32; self.dims];

        for token in tokenize(text) {
            let digest = Sha256::digest(token.as_bytes());
            let mut bucket = [0u8; 8];
            bucket.copy_from_slice(&digest[..8]);
            let idx = (u64::from_le_bytes(bucket) % self.dims as u64) as usize;
            let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
            vec[idx] += sign;
        }

        let norm = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > f32::EPSILON {
            for x in &mut vec {
                *x /= norm;
            }
        }
        vec
    }
}

#[async_trait]
impl EmbeddingProvider for HashProvider {
    fn model_name(&self) -> &str {
        "feature-hash"
    }
    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}

/// Lowercased word tokens, with camelCase runs split apart.
fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();

    for word in text.split(|c: char| !c.is_alphanumeric()) {
        if word.is_empty() {
            continue;
        }
        let mut current = String::new();
        let mut prev_lower = false;
        for c in word.chars() {
            if c.is_uppercase() && prev_lower && !current.is_empty() {
                tokens.push(std::mem::take(&mut current).to_lowercase());
            }
            prev_lower = c.is_lowercase() || c.is_ascii_digit();
            current.push(c);
        }
        if !current.is_empty() {
            tokens.push(current.to_lowercase());
        }
    }

    tokens
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::cosine_similarity;

    #[test]
    fn tokenize_splits_identifiers() {
        assert_eq!(tokenize("compute_total"), vec!["compute", "total"]);
        assert_eq!(tokenize("computeTotal(x)"), vec!["compute", "total", "x"]);
        assert_eq!(tokenize("HTTPServer"), vec!["httpserver"]);
        assert!(tokenize("  ::  ").is_empty());
    }

    #[test]
    fn embedding_is_deterministic_and_normalised() {
        let p = HashProvider::new(DEFAULT_DIMS);
        let a = p.embed_one("def compute_total(items): return sum(items)");
        let b = p.embed_one("def compute_total(items): return sum(items)");
        assert_eq!(a, b);
        let norm: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn related_text_scores_higher() {
        let p = HashProvider::new(DEFAULT_DIMS);
        let query = p.embed_one("compute total");
        let hit = p.embed_one("def compute_total(items):\n    return sum(items)");
        let miss = p.embed_one("class HttpRouter:\n    def dispatch(self, request): pass");
        assert!(cosine_similarity(&query, &hit) > cosine_similarity(&query, &miss));
    }

    #[test]
    fn empty_text_is_zero_vector() {
        let p = HashProvider::new(16);
        assert!(p.embed_one("").iter().all(|x| *x == 0.0));
    }
}
