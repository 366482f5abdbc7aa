use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::OntologyIndex;

/// One node of the class hierarchy exposed by an ontology.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeNode {
    pub iri: String,
    pub children: Vec<TypeNode>,
}

impl TypeNode {
    pub fn leaf(iri: impl Into<String>) -> Self {
        Self {
            iri: iri.into(),
            children: Vec::new(),
        }
    }

    fn collect(&self, into: &mut HashSet<String>) {
        into.insert(self.iri.clone());
        for child in &self.children {
            child.collect(into);
        }
    }
}

/// Ontology built from a fixed hierarchy, used at composition time and in
/// tests. Vocabulary file parsing lives outside this crate.
#[derive(Debug, Clone)]
pub struct StaticOntology {
    root: TypeNode,
    valid: HashSet<String>,
}

impl StaticOntology {
    pub fn new(root: TypeNode) -> Self {
        let mut valid = HashSet::new();
        root.collect(&mut valid);
        Self { root, valid }
    }

    /// Flat vocabulary under a synthetic root, for callers without a
    /// hierarchy.
    pub fn from_types<I, S>(types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let root = TypeNode {
            iri: "thing".to_string(),
            children: types.into_iter().map(|t| TypeNode::leaf(t)).collect(),
        };
        Self::new(root)
    }
}

impl OntologyIndex for StaticOntology {
    fn class_hierarchy(&self) -> TypeNode {
        self.root.clone()
    }

    fn is_valid_type(&self, iri: &str) -> bool {
        self.valid.contains(iri)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_hierarchy_is_flattened_for_validation() {
        let root = TypeNode {
            iri: "agent".to_string(),
            children: vec![
                TypeNode::leaf("person"),
                TypeNode {
                    iri: "organization".to_string(),
                    children: vec![TypeNode::leaf("company")],
                },
            ],
        };
        let ontology = StaticOntology::new(root);
        assert!(ontology.is_valid_type("agent"));
        assert!(ontology.is_valid_type("company"));
        assert!(!ontology.is_valid_type("ship"));
    }
}
