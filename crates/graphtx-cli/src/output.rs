//! Rendering of query results for the terminal

use anyhow::{Context, Result};
use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, Cell, Color, Table};
use graphtx_protocol::{Graph, QueryStats, RowSet, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table
    Table,
    /// Machine-readable JSON
    Json,
}

fn header(names: &[&str]) -> Vec<Cell> {
    names
        .iter()
        .map(|name| Cell::new(name).fg(Color::Cyan))
        .collect()
}

/// Render a cell; strings are shown without quotes
fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

pub fn rows_table(rows: &RowSet) -> String {
    if rows.column_count() == 0 {
        return "No columns returned".to_string();
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(
        rows.columns()
            .iter()
            .map(|name| Cell::new(name).fg(Color::Cyan)),
    );
    for row in rows.rows() {
        table.add_row(row.values().iter().map(cell_text));
    }

    let noun = if rows.len() == 1 { "row" } else { "rows" };
    format!("{}\n{} {}", table, rows.len(), noun)
}

pub fn graph_table(graph: &Graph) -> String {
    let mut nodes = Table::new();
    nodes.load_preset(UTF8_FULL);
    nodes.set_header(header(&["id", "labels", "properties"]));
    for node in graph.nodes() {
        nodes.add_row(vec![
            node.id.to_string(),
            node.labels.join(":"),
            Value::Map(node.properties.clone()).to_string(),
        ]);
    }

    let mut relationships = Table::new();
    relationships.load_preset(UTF8_FULL);
    relationships.set_header(header(&["id", "type", "start", "end", "properties"]));
    for rel in graph.relationships() {
        relationships.add_row(vec![
            rel.id.to_string(),
            rel.rel_type.clone(),
            rel.start_node.to_string(),
            rel.end_node.to_string(),
            Value::Map(rel.properties.clone()).to_string(),
        ]);
    }

    format!(
        "{}\n{}\n{} nodes, {} relationships",
        nodes,
        relationships,
        graph.node_count(),
        graph.relationship_count()
    )
}

pub fn stats_table(stats: &QueryStats) -> String {
    let counters = [
        ("nodes created", stats.nodes_created),
        ("nodes deleted", stats.nodes_deleted),
        ("relationships created", stats.relationships_created),
        ("relationships deleted", stats.relationships_deleted),
        ("properties set", stats.properties_set),
        ("labels added", stats.labels_added),
        ("labels removed", stats.labels_removed),
        ("indexes added", stats.indexes_added),
        ("indexes removed", stats.indexes_removed),
        ("constraints added", stats.constraints_added),
        ("constraints removed", stats.constraints_removed),
    ];

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(header(&["statistic", "count"]));
    for (name, count) in counters.iter().filter(|(_, count)| *count > 0) {
        table.add_row(vec![name.to_string(), count.to_string()]);
    }
    table.add_row(vec![
        "contains updates".to_string(),
        stats.contains_updates.to_string(),
    ]);
    table.to_string()
}

pub fn to_json<T: serde::Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).context("Failed to serialize result as JSON")
}

#[cfg(test)]
mod tests {
    use super::*;
    use graphtx_protocol::{Node, Relationship};
    use std::collections::BTreeMap;

    fn people() -> RowSet {
        RowSet::new(
            vec!["name".into(), "age".into()],
            vec![
                vec![Value::from("Ada"), Value::from(36)],
                vec![Value::from("Grace"), Value::Null],
            ],
        )
    }

    #[test]
    fn rows_table_lists_every_cell() {
        let rendered = rows_table(&people());
        assert!(rendered.contains("name"));
        assert!(rendered.contains("Ada"));
        assert!(rendered.contains("36"));
        assert!(rendered.ends_with("2 rows"));
        assert!(!rendered.contains("null"));
    }

    #[test]
    fn graph_table_summarizes_counts() {
        let mut graph = Graph::new();
        let mut ada = Node::new(1);
        ada.labels.push("Person".into());
        graph.insert_node(ada);
        graph.insert_node(Node::new(2));
        graph.insert_relationship(Relationship {
            id: 3,
            rel_type: "KNOWS".into(),
            start_node: 1,
            end_node: 2,
            properties: BTreeMap::new(),
        });

        let rendered = graph_table(&graph);
        assert!(rendered.contains("KNOWS"));
        assert!(rendered.ends_with("2 nodes, 1 relationships"));
    }

    #[test]
    fn stats_table_hides_zero_counters() {
        let stats = QueryStats {
            nodes_created: 2,
            contains_updates: true,
            ..QueryStats::default()
        };
        let rendered = stats_table(&stats);
        assert!(rendered.contains("nodes created"));
        assert!(!rendered.contains("labels added"));
    }

    #[test]
    fn json_output_is_untagged() {
        let rendered = to_json(&people()).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&rendered).unwrap();
        assert_eq!(parsed["rows"][0][0], "Ada");
        assert!(parsed["rows"][1][1].is_null());
    }
}
