use petgraph::algo::has_path_connecting;
use uuid::Uuid;

use crate::models::SupportLevel;

use super::traversal::Expansion;

/// Classifies how each surfaced entity is backed by graph evidence.
///
/// - `Direct`: a relation with evidence touches the entity within one hop
///   of a seed.
/// - `Inferred`: the entity is reachable from a seed only via a longer
///   path; confidence decays by `hop_penalty` per hop.
/// - `Unsupported`: no relation evidence and no traceable path. Flagged,
///   never dropped from the bundle.
pub struct CitationValidator {
    hop_penalty: f32,
}

impl CitationValidator {
    pub fn new(hop_penalty: f32) -> Self {
        Self {
            hop_penalty: hop_penalty.clamp(0.0, 1.0),
        }
    }

    pub fn classify(
        &self,
        entity_id: Uuid,
        seeds: &[Uuid],
        expansion: &Expansion,
    ) -> (SupportLevel, f32) {
        let depth = match expansion.hop_depth.get(&entity_id) {
            Some(depth) => *depth,
            None => return (SupportLevel::Unsupported, 0.0),
        };

        let cited = expansion
            .relations_for(entity_id)
            .iter()
            .filter(|r| !r.evidence.is_empty())
            .map(|r| r.confidence)
            .fold(None::<f32>, |acc, c| Some(acc.map_or(c, |a| a.max(c))));

        if depth <= 1 {
            return match cited {
                Some(confidence) => (SupportLevel::Direct, confidence),
                None => (SupportLevel::Unsupported, 0.0),
            };
        }

        let reachable = seeds
            .iter()
            .any(|seed| has_path_connecting(&expansion.graph, *seed, entity_id, None));
        if !reachable && cited.is_none() {
            return (SupportLevel::Unsupported, 0.0);
        }

        let base = cited.unwrap_or(1.0);
        let penalty = self.hop_penalty.powi(depth as i32);
        (SupportLevel::Inferred, base * penalty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use petgraph::graphmap::DiGraphMap;

    use crate::models::{Relation, RelationObject};

    fn expansion(
        depths: &[(Uuid, usize)],
        edges: &[(Uuid, Uuid)],
        relations: Vec<Relation>,
    ) -> Expansion {
        let mut graph: DiGraphMap<Uuid, f32> = DiGraphMap::new();
        for (id, _) in depths {
            graph.add_node(*id);
        }
        for (a, b) in edges {
            graph.add_edge(*a, *b, 1.0);
        }
        Expansion {
            hop_depth: depths.iter().copied().collect::<HashMap<_, _>>(),
            relations,
            graph,
        }
    }

    fn relation(subject: Uuid, object: Uuid, evidence: Vec<Uuid>) -> Relation {
        Relation::new(
            subject,
            "related_to",
            RelationObject::Entity { id: object },
            0.9,
            evidence,
        )
    }

    #[test]
    fn one_hop_relation_with_evidence_is_direct() {
        let (seed, other) = (Uuid::new_v4(), Uuid::new_v4());
        let exp = expansion(
            &[(seed, 0), (other, 1)],
            &[(seed, other)],
            vec![relation(seed, other, vec![Uuid::new_v4()])],
        );
        let validator = CitationValidator::new(0.7);
        let (level, confidence) = validator.classify(other, &[seed], &exp);
        assert_eq!(level, SupportLevel::Direct);
        assert!((confidence - 0.9).abs() < 1e-6);
    }

    #[test]
    fn deeper_entities_are_inferred_with_hop_penalty() {
        let ids: Vec<Uuid> = (0..3).map(|_| Uuid::new_v4()).collect();
        let exp = expansion(
            &[(ids[0], 0), (ids[1], 1), (ids[2], 2)],
            &[(ids[0], ids[1]), (ids[1], ids[2])],
            vec![
                relation(ids[0], ids[1], vec![Uuid::new_v4()]),
                relation(ids[1], ids[2], vec![Uuid::new_v4()]),
            ],
        );
        let validator = CitationValidator::new(0.7);
        let (level, confidence) = validator.classify(ids[2], &[ids[0]], &exp);
        assert_eq!(level, SupportLevel::Inferred);
        // Max relation confidence 0.9 decayed over two hops.
        assert!((confidence - 0.9 * 0.49).abs() < 1e-6);
    }

    #[test]
    fn entity_without_evidence_is_flagged_unsupported() {
        let (seed, stray) = (Uuid::new_v4(), Uuid::new_v4());
        let exp = expansion(&[(seed, 0), (stray, 1)], &[], vec![]);
        let validator = CitationValidator::new(0.7);
        let (level, confidence) = validator.classify(stray, &[seed], &exp);
        assert_eq!(level, SupportLevel::Unsupported);
        assert_eq!(confidence, 0.0);
    }

    #[test]
    fn unknown_entity_is_unsupported() {
        let seed = Uuid::new_v4();
        let exp = expansion(&[(seed, 0)], &[], vec![]);
        let validator = CitationValidator::new(0.7);
        let (level, _) = validator.classify(Uuid::new_v4(), &[seed], &exp);
        assert_eq!(level, SupportLevel::Unsupported);
    }
}
