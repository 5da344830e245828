//! Turns decoded result fragments into row sets and graphs.

use crate::codec::{ResultFragment, WireNode, WireRelationship};
use crate::graph::{Graph, Node, Relationship};
use crate::rowset::RowSet;
use crate::value::Value;
use std::collections::BTreeMap;

/// Build a row set aligned to the fragment's declared columns.
///
/// Cells the server left out become [`Value::Null`]; nested objects become
/// plain maps.
pub fn build_row_set(fragment: &ResultFragment) -> RowSet {
    let rows = fragment
        .data
        .iter()
        .map(|item| {
            item.row
                .as_deref()
                .map(|cells| cells.iter().map(Value::from).collect())
                .unwrap_or_default()
        })
        .collect();

    RowSet::new(fragment.columns.clone(), rows)
}

/// Build a graph from every data item's sub-graph, keeping the first
/// occurrence of each node and relationship id.
pub fn build_graph(fragment: &ResultFragment) -> Graph {
    let mut graph = Graph::new();
    merge_into(&mut graph, fragment);
    graph
}

/// Accumulate `fragment` into an existing graph with the same dedup rule.
pub fn merge_into(graph: &mut Graph, fragment: &ResultFragment) {
    for sub in fragment.data.iter().filter_map(|item| item.graph.as_ref()) {
        for node in &sub.nodes {
            if graph.node(node.id).is_none() {
                graph.insert_node(convert_node(node));
            }
        }
        for relationship in &sub.relationships {
            if graph.relationship(relationship.id).is_none() {
                graph.insert_relationship(convert_relationship(relationship));
            }
        }
    }
}

fn convert_node(node: &WireNode) -> Node {
    Node {
        id: node.id,
        labels: node.labels.clone(),
        properties: convert_properties(node.properties.as_ref()),
    }
}

fn convert_relationship(relationship: &WireRelationship) -> Relationship {
    Relationship {
        id: relationship.id,
        rel_type: relationship.rel_type.clone(),
        start_node: relationship.start_node,
        end_node: relationship.end_node,
        properties: convert_properties(relationship.properties.as_ref()),
    }
}

fn convert_properties(
    properties: Option<&serde_json::Map<String, serde_json::Value>>,
) -> BTreeMap<String, Value> {
    properties
        .map(|map| {
            map.iter()
                .map(|(key, value)| (key.clone(), Value::from(value)))
                .collect()
        })
        .unwrap_or_default()
}
