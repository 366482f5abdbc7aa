use strsim::jaro_winkler;

use crate::config::ResolutionConfig;
use crate::models::mention::normalize_text;

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

pub fn label_similarity(a: &str, b: &str) -> f32 {
    let a = normalize_text(a);
    let b = normalize_text(b);
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    jaro_winkler(&a, &b) as f32
}

/// Weighted blend of embedding and label similarity. Falls back to label
/// similarity alone when either side has no embedding.
pub fn blended_score(
    embedding_sim: Option<f32>,
    label_sim: f32,
    config: &ResolutionConfig,
) -> f32 {
    match embedding_sim {
        Some(sim) => {
            let total = config.embedding_weight + config.label_weight;
            if total <= 0.0 {
                return 0.0;
            }
            (sim * config.embedding_weight + label_sim * config.label_weight) / total
        }
        None => label_sim,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_of_identical_vectors_is_one() {
        let v = vec![0.5, -1.0, 2.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_of_orthogonal_vectors_is_zero() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
    }

    #[test]
    fn mismatched_dimensions_score_zero() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0]), 0.0);
    }

    #[test]
    fn label_similarity_ignores_case_and_spacing() {
        assert!((label_similarity("Ada  Lovelace", "ada lovelace") - 1.0).abs() < 1e-6);
        assert!(label_similarity("Ada Lovelace", "Alan Turing") < 0.8);
    }

    #[test]
    fn blend_falls_back_to_label_without_embedding() {
        let config = ResolutionConfig::default();
        assert_eq!(blended_score(None, 0.9, &config), 0.9);
        let blended = blended_score(Some(1.0), 0.0, &config);
        assert!((blended - 0.7).abs() < 1e-6);
    }
}
