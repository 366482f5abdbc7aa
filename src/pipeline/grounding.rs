use std::sync::Arc;

use tracing::debug;

use crate::capabilities::OntologyIndex;
use crate::models::Entity;

/// Validates provisional entity types against the controlled vocabulary.
/// Types the ontology does not know are removed; an entity left with no
/// valid type fails grounding and is skipped by the caller.
pub struct Grounder {
    ontology: Arc<dyn OntologyIndex>,
}

impl Grounder {
    pub fn new(ontology: Arc<dyn OntologyIndex>) -> Self {
        Self { ontology }
    }

    /// Returns false when no type survives validation. The grounding
    /// confidence is scaled by the fraction of types that held up.
    pub fn ground(&self, entity: &mut Entity) -> bool {
        let before = entity.types.len();
        if before == 0 {
            return false;
        }
        entity
            .types
            .retain(|t| self.ontology.is_valid_type(t));
        let kept = entity.types.len();
        if kept == 0 {
            return false;
        }
        if kept < before {
            debug!(
                "entity '{}': {} of {} types grounded",
                entity.label, kept, before
            );
            entity.grounding_confidence *= kept as f32 / before as f32;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::StaticOntology;

    fn grounder(types: &[&str]) -> Grounder {
        Grounder::new(Arc::new(StaticOntology::from_types(types.iter().copied())))
    }

    fn entity(types: &[&str]) -> Entity {
        let mut e = Entity::new(
            "org-1",
            "Ada Lovelace",
            types.iter().map(|t| t.to_string()).collect(),
        );
        e.grounding_confidence = 0.8;
        e
    }

    #[test]
    fn valid_types_pass_untouched() {
        let mut e = entity(&["person"]);
        assert!(grounder(&["person", "place"]).ground(&mut e));
        assert_eq!(e.types, vec!["person"]);
        assert_eq!(e.grounding_confidence, 0.8);
    }

    #[test]
    fn unknown_types_are_removed_and_confidence_scaled() {
        let mut e = entity(&["person", "starship"]);
        assert!(grounder(&["person"]).ground(&mut e));
        assert_eq!(e.types, vec!["person"]);
        assert!((e.grounding_confidence - 0.4).abs() < 1e-6);
    }

    #[test]
    fn entity_with_no_valid_type_fails_grounding() {
        let mut e = entity(&["starship"]);
        assert!(!grounder(&["person"]).ground(&mut e));
    }

    #[test]
    fn untyped_entity_fails_grounding() {
        let mut e = entity(&[]);
        assert!(!grounder(&["person"]).ground(&mut e));
    }
}
