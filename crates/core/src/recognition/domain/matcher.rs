use serde::Serialize;

use crate::shared::constants::DEFAULT_SIMILARITY_THRESHOLD;

use super::embedding::Embedding;
use super::gallery::{GallerySnapshot, PersonId};

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum MatchOutcome {
    Known { person_id: PersonId, similarity: f64 },
    Unknown,
}

/// Nearest-neighbour identity lookup against a gallery snapshot.
#[derive(Clone, Debug)]
pub struct Matcher {
    threshold: f64,
}

impl Matcher {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Best similarity across every embedding of every entry. `Known` when
    /// it reaches the threshold. Earlier entries win exact ties.
    pub fn identify(&self, embedding: &Embedding, gallery: &GallerySnapshot) -> MatchOutcome {
        let mut best: Option<(PersonId, f64)> = None;
        for entry in gallery.entries() {
            for candidate in &entry.embeddings {
                let similarity = embedding.similarity(candidate);
                let better = match best {
                    Some((_, s)) => similarity > s,
                    None => true,
                };
                if better {
                    best = Some((entry.person_id, similarity));
                }
            }
        }

        match best {
            Some((person_id, similarity)) if similarity >= self.threshold => MatchOutcome::Known {
                person_id,
                similarity,
            },
            _ => MatchOutcome::Unknown,
        }
    }
}

impl Default for Matcher {
    fn default() -> Self {
        Self::new(DEFAULT_SIMILARITY_THRESHOLD)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recognition::domain::gallery::Gallery;
    use approx::assert_relative_eq;
    use rstest::rstest;

    fn emb(values: &[f32]) -> Embedding {
        Embedding::from_raw(values.to_vec()).unwrap()
    }

    /// Unit vector at `cos_theta` similarity to `[1, 0]`.
    fn at_similarity(cos_theta: f32) -> Embedding {
        emb(&[cos_theta, (1.0 - cos_theta * cos_theta).sqrt()])
    }

    #[test]
    fn test_empty_gallery_is_unknown() {
        let gallery = Gallery::default();
        let outcome = Matcher::default().identify(&emb(&[1.0, 0.0]), &gallery.snapshot());
        assert_eq!(outcome, MatchOutcome::Unknown);
    }

    #[test]
    fn test_similarity_above_threshold_is_known() {
        let gallery = Gallery::default();
        let id = gallery.append("alice", emb(&[1.0, 0.0])).person_id;

        let outcome = Matcher::default().identify(&at_similarity(0.8), &gallery.snapshot());
        match outcome {
            MatchOutcome::Known {
                person_id,
                similarity,
            } => {
                assert_eq!(person_id, id);
                assert_relative_eq!(similarity, 0.8, epsilon = 1e-5);
            }
            MatchOutcome::Unknown => panic!("expected a match"),
        }
    }

    #[rstest]
    #[case(0.59, false)]
    #[case(0.61, true)]
    #[case(0.2, false)]
    #[case(0.99, true)]
    fn test_threshold_boundary(#[case] cos: f32, #[case] known: bool) {
        let gallery = Gallery::default();
        gallery.append("alice", emb(&[1.0, 0.0]));
        let outcome = Matcher::new(0.6).identify(&at_similarity(cos), &gallery.snapshot());
        assert_eq!(matches!(outcome, MatchOutcome::Known { .. }), known);
    }

    #[test]
    fn test_best_match_across_all_embeddings() {
        let gallery = Gallery::default();
        let alice = gallery.append("alice", emb(&[1.0, 0.0, 0.0])).person_id;
        let bob = gallery.append("bob", emb(&[0.0, 1.0, 0.0])).person_id;
        gallery.add_embedding(bob, emb(&[0.0, 0.0, 1.0])).unwrap();

        let query = emb(&[0.1, 0.0, 1.0]);
        let outcome = Matcher::default().identify(&query, &gallery.snapshot());
        assert!(matches!(outcome, MatchOutcome::Known { person_id, .. } if person_id == bob));

        let query = emb(&[1.0, 0.05, 0.0]);
        let outcome = Matcher::default().identify(&query, &gallery.snapshot());
        assert!(matches!(outcome, MatchOutcome::Known { person_id, .. } if person_id == alice));
    }

    #[test]
    fn test_identify_does_not_mutate_gallery() {
        let gallery = Gallery::default();
        gallery.append("alice", emb(&[1.0, 0.0]));
        let snap = gallery.snapshot();
        let version = snap.version();
        Matcher::default().identify(&emb(&[1.0, 0.0]), &snap);
        assert_eq!(gallery.snapshot().version(), version);
    }
}
