use crate::types::{Embedding, KnownIdentity, MatchResult};

/// Default maximum cosine distance (`1 - similarity`) for a registry identity
/// to match. 0.5 accepts similarity above 0.5.
pub const DEFAULT_TOLERANCE: f32 = 0.5;

/// Strategy for labelling a probe embedding against the known identities.
///
/// Implementations are pure: no caching between calls and no mutation of the
/// identities.
pub trait Matcher {
    fn compare(
        &self,
        probe: &Embedding,
        identities: &[KnownIdentity],
        tolerance: f32,
    ) -> MatchResult;
}

/// First-match-wins cosine-distance matcher.
///
/// Every identity whose distance is strictly below the tolerance is a
/// candidate; the candidate with the lowest registry index wins even when a
/// later candidate is closer.
#[derive(Debug, Clone, Copy, Default)]
pub struct FirstMatchMatcher;

impl Matcher for FirstMatchMatcher {
    fn compare(
        &self,
        probe: &Embedding,
        identities: &[KnownIdentity],
        tolerance: f32,
    ) -> MatchResult {
        identities
            .iter()
            .enumerate()
            .map(|(index, identity)| (index, identity, probe.cosine_distance(&identity.embedding)))
            .find(|&(_, _, distance)| distance < tolerance)
            .map(|(index, identity, distance)| MatchResult {
                label: identity.name.clone(),
                index: Some(index),
                distance: Some(distance),
            })
            .unwrap_or_else(MatchResult::unknown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::UNKNOWN_LABEL;

    fn identity(name: &str, values: &[f32]) -> KnownIdentity {
        KnownIdentity {
            name: name.to_string(),
            embedding: Embedding::new(values.to_vec()),
        }
    }

    /// Unit vector at cosine similarity `cos` to `[1, 0]`.
    fn at_similarity(cos: f32) -> Embedding {
        Embedding::new(vec![cos, (1.0 - cos * cos).sqrt()])
    }

    #[test]
    fn test_single_candidate_matches() {
        let identities = vec![identity("alice", &[1.0, 0.0]), identity("bob", &[-1.0, 0.0])];
        let probe = at_similarity(0.8);

        let result = FirstMatchMatcher.compare(&probe, &identities, DEFAULT_TOLERANCE);
        assert_eq!(result.label, "alice");
        assert_eq!(result.index, Some(0));
        assert!((result.distance.unwrap() - 0.2).abs() < 1e-5);
    }

    #[test]
    fn test_no_candidate_is_unknown() {
        let identities = vec![identity("alice", &[1.0, 0.0])];
        let probe = at_similarity(0.1);

        let result = FirstMatchMatcher.compare(&probe, &identities, DEFAULT_TOLERANCE);
        assert_eq!(result.label, UNKNOWN_LABEL);
        assert!(!result.matched());
        assert_eq!(result.distance, None);
    }

    #[test]
    fn test_typical_arcface_similarities() {
        // Same-person ArcFace pairs commonly land at similarity 0.6-0.8.
        let identities = vec![identity("alice", &[1.0, 0.0])];
        let label_at = |cos: f32| {
            FirstMatchMatcher.compare(&at_similarity(cos), &identities, DEFAULT_TOLERANCE).label
        };
        for cos in [0.6, 0.7, 0.8, 0.87] {
            assert_eq!(label_at(cos), "alice", "similarity {cos}");
        }
        for cos in [0.4, 0.2, 0.0] {
            assert_eq!(label_at(cos), UNKNOWN_LABEL, "similarity {cos}");
        }
    }

    #[test]
    fn test_earliest_candidate_beats_closest() {
        // "far" is at distance 0.4, "near" at 0.05: both within tolerance, "far" comes first.
        let identities = vec![
            identity("stranger", &[-1.0, 0.0]),
            identity("far", &at_similarity(0.6).values),
            identity("near", &at_similarity(0.95).values),
        ];
        let probe = Embedding::new(vec![1.0, 0.0]);

        let result = FirstMatchMatcher.compare(&probe, &identities, DEFAULT_TOLERANCE);
        assert_eq!(result.label, "far");
        assert_eq!(result.index, Some(1));
    }

    #[test]
    fn test_tolerance_is_strict() {
        let identities = vec![identity("edge", &[0.0, 1.0])];
        let probe = Embedding::new(vec![1.0, 0.0]);
        assert_eq!(FirstMatchMatcher.compare(&probe, &identities, 1.0).label, UNKNOWN_LABEL);
        assert_eq!(FirstMatchMatcher.compare(&probe, &identities, 1.01).label, "edge");
    }

    #[test]
    fn test_duplicate_names_resolve_by_order() {
        let identities = vec![identity("twin", &[1.0, 0.1]), identity("twin", &[1.0, 0.0])];
        let probe = Embedding::new(vec![1.0, 0.0]);
        let result = FirstMatchMatcher.compare(&probe, &identities, DEFAULT_TOLERANCE);
        assert_eq!(result.index, Some(0));
    }

    #[test]
    fn test_empty_registry() {
        let probe = Embedding::new(vec![1.0, 0.0]);
        let result = FirstMatchMatcher.compare(&probe, &[], DEFAULT_TOLERANCE);
        assert_eq!(result, MatchResult::unknown());
    }
}
