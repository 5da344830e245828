//! Property graph results, deduplicated by server-assigned identity.

use crate::value::Value;
use serde::Serialize;
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

/// Server-assigned node identity, scoped to one result
pub type NodeId = i64;

/// Server-assigned relationship identity, scoped to one result
pub type RelationshipId = i64;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Node {
    pub id: NodeId,
    pub labels: Vec<String>,
    pub properties: BTreeMap<String, Value>,
}

impl Node {
    pub fn new(id: NodeId) -> Self {
        Self {
            id,
            labels: Vec::new(),
            properties: BTreeMap::new(),
        }
    }

    pub fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }

    pub fn property(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Relationship {
    pub id: RelationshipId,
    #[serde(rename = "type")]
    pub rel_type: String,
    pub start_node: NodeId,
    pub end_node: NodeId,
    pub properties: BTreeMap<String, Value>,
}

impl Relationship {
    pub fn property(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }

    /// Whether `node` is either endpoint
    pub fn touches(&self, node: NodeId) -> bool {
        self.start_node == node || self.end_node == node
    }
}

/// Nodes and relationships collected from every sub-graph of one result.
///
/// Identity equality is authoritative: the first occurrence of an id is kept
/// and later occurrences are ignored, property maps are never merged.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Graph {
    nodes: BTreeMap<NodeId, Node>,
    relationships: BTreeMap<RelationshipId, Relationship>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `node` unless its id is already present. Returns `true` if inserted.
    pub fn insert_node(&mut self, node: Node) -> bool {
        match self.nodes.entry(node.id) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(node);
                true
            }
        }
    }

    /// Insert `relationship` unless its id is already present. Returns `true` if inserted.
    pub fn insert_relationship(&mut self, relationship: Relationship) -> bool {
        match self.relationships.entry(relationship.id) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(relationship);
                true
            }
        }
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn relationship(&self, id: RelationshipId) -> Option<&Relationship> {
        self.relationships.get(&id)
    }

    /// Nodes in ascending id order
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Relationships in ascending id order
    pub fn relationships(&self) -> impl Iterator<Item = &Relationship> {
        self.relationships.values()
    }

    /// Relationships starting or ending at `node`
    pub fn relationships_of(&self, node: NodeId) -> impl Iterator<Item = &Relationship> {
        self.relationships.values().filter(move |r| r.touches(node))
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn relationship_count(&self) -> usize {
        self.relationships.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.relationships.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn person(id: NodeId, name: &str) -> Node {
        let mut node = Node::new(id);
        node.labels.push("Person".into());
        node.properties.insert("name".into(), Value::from(name));
        node
    }

    #[test]
    fn first_occurrence_wins() {
        let mut graph = Graph::new();
        assert!(graph.insert_node(person(1, "Ada")));
        assert!(!graph.insert_node(person(1, "Impostor")));

        assert_eq!(graph.node_count(), 1);
        assert_eq!(
            graph.node(1).unwrap().property("name"),
            Some(&Value::from("Ada"))
        );
    }

    #[test]
    fn relationships_are_indexed_by_endpoint() {
        let mut graph = Graph::new();
        graph.insert_node(person(1, "Ada"));
        graph.insert_node(person(2, "Charles"));
        graph.insert_relationship(Relationship {
            id: 10,
            rel_type: "KNOWS".into(),
            start_node: 1,
            end_node: 2,
            properties: BTreeMap::new(),
        });

        assert_eq!(graph.relationships_of(2).count(), 1);
        assert_eq!(graph.relationships_of(3).count(), 0);
        assert!(graph.node(1).unwrap().has_label("Person"));
        assert!(!graph.is_empty());
    }
}
