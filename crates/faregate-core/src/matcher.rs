//! Probe-against-gallery matching: linear cosine scan, ranked candidates.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::types::{Embedding, EmbeddingRecord};

/// Default maximum cosine distance (`1 - similarity`) for a candidate to
/// count as a match.
pub const DEFAULT_DISTANCE_THRESHOLD: f32 = 0.6;

/// One gallery identity that passed the distance threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchCandidate {
    pub identity: String,
    /// `(1 - distance) * 100`, rounded to two decimal places.
    pub confidence: f32,
}

/// Strategy for ranking a probe embedding against the registered gallery.
pub trait Matcher {
    /// Return all candidates under `threshold`, best first.
    ///
    /// Ordering is confidence descending with ties broken by ascending
    /// identity, so results are deterministic regardless of gallery order.
    fn rank(
        &self,
        probe: &Embedding,
        gallery: &[EmbeddingRecord],
        threshold: f32,
    ) -> Vec<MatchCandidate>;
}

/// Cosine-distance matcher over the full gallery.
///
/// Always a linear scan: the roster stays small enough that an index
/// structure would be wasted machinery.
pub struct CosineMatcher;

impl Matcher for CosineMatcher {
    fn rank(
        &self,
        probe: &Embedding,
        gallery: &[EmbeddingRecord],
        threshold: f32,
    ) -> Vec<MatchCandidate> {
        let mut candidates = Vec::new();

        for record in gallery {
            let similarity = probe.similarity(&record.embedding);
            let distance = 1.0 - similarity;
            tracing::trace!(
                identity = %record.identity,
                distance,
                threshold,
                "gallery comparison"
            );
            if distance < threshold {
                candidates.push(MatchCandidate {
                    identity: record.identity.clone(),
                    confidence: round_confidence((1.0 - distance) * 100.0),
                });
            }
        }

        candidates.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.identity.cmp(&b.identity))
        });

        tracing::debug!(
            gallery = gallery.len(),
            accepted = candidates.len(),
            "probe ranked"
        );
        candidates
    }
}

fn round_confidence(value: f32) -> f32 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(identity: &str, values: Vec<f32>) -> EmbeddingRecord {
        EmbeddingRecord {
            identity: identity.to_string(),
            display_name: identity.to_uppercase(),
            embedding: Embedding::new(values),
            metadata: serde_json::Value::Null,
            image_path: None,
            registered_at: "2026-01-01T00:00:00Z".into(),
        }
    }

    #[test]
    fn test_self_match_scores_hundred() {
        let probe = Embedding::new(vec![0.3, 0.4, 0.5]);
        let gallery = vec![record("r1", vec![0.3, 0.4, 0.5])];

        let ranked = CosineMatcher.rank(&probe, &gallery, DEFAULT_DISTANCE_THRESHOLD);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].identity, "r1");
        assert_eq!(ranked[0].confidence, 100.0);
    }

    #[test]
    fn test_best_candidate_is_first() {
        let probe = Embedding::new(vec![1.0, 0.0, 0.0]);
        let gallery = vec![
            record("far", vec![0.2, 0.9, 0.0]),
            record("near", vec![0.9, 0.1, 0.0]),
            record("mid", vec![0.7, 0.5, 0.0]),
        ];

        let ranked = CosineMatcher.rank(&probe, &gallery, 1.0);
        assert_eq!(ranked[0].identity, "near");
        for pair in ranked.windows(2) {
            assert!(pair[0].confidence >= pair[1].confidence);
        }
    }

    #[test]
    fn test_tie_breaks_by_identity() {
        let probe = Embedding::new(vec![1.0, 0.0]);
        let gallery = vec![
            record("zeta", vec![1.0, 0.0]),
            record("alpha", vec![2.0, 0.0]),
        ];

        let ranked = CosineMatcher.rank(&probe, &gallery, 0.5);
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].confidence, ranked[1].confidence);
        assert_eq!(ranked[0].identity, "alpha");
        assert_eq!(ranked[1].identity, "zeta");
    }

    #[test]
    fn test_distance_equal_to_threshold_is_rejected() {
        // Orthogonal vectors sit at distance exactly 1.0.
        let probe = Embedding::new(vec![1.0, 0.0]);
        let gallery = vec![record("edge", vec![0.0, 1.0])];

        assert!(CosineMatcher.rank(&probe, &gallery, 1.0).is_empty());
        assert_eq!(CosineMatcher.rank(&probe, &gallery, 1.01).len(), 1);
    }

    #[test]
    fn test_empty_gallery_yields_no_candidates() {
        let probe = Embedding::new(vec![1.0, 0.0]);
        assert!(CosineMatcher.rank(&probe, &[], DEFAULT_DISTANCE_THRESHOLD).is_empty());
    }

    #[test]
    fn test_confidence_rounds_to_two_decimals() {
        let probe = Embedding::new(vec![1.0, 0.0]);
        let gallery = vec![record("r1", vec![0.823265, 0.567_657_7])];

        let ranked = CosineMatcher.rank(&probe, &gallery, 1.0);
        assert!((ranked[0].confidence - 82.33).abs() < 1e-4);
        // Two-decimal grid: scaling by 100 gives a whole number.
        let scaled = ranked[0].confidence * 100.0;
        assert!((scaled - scaled.round()).abs() < 1e-3);
    }

    #[test]
    fn test_threshold_filters_far_candidates() {
        let probe = Embedding::new(vec![1.0, 0.0]);
        let gallery = vec![
            record("close", vec![0.95, 0.05]),
            record("far", vec![0.1, 0.99]),
        ];

        let ranked = CosineMatcher.rank(&probe, &gallery, 0.3);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].identity, "close");
    }
}
