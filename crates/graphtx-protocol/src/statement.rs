//! Statements and their write-once result slots.

use crate::codec::ResultFragment;
use crate::error::{ProtocolError, Result};
use crate::graph::Graph;
use crate::materialize::{build_graph, build_row_set};
use crate::rowset::RowSet;
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::OnceLock;

/// Shape of the result a statement asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResultKind {
    Row,
    Graph,
}

impl ResultKind {
    /// Tag sent in `resultDataContents`
    pub fn as_str(&self) -> &'static str {
        match self {
            ResultKind::Row => "row",
            ResultKind::Graph => "graph",
        }
    }
}

impl fmt::Display for ResultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
enum ResultSlot {
    Row(OnceLock<RowSet>),
    Graph(OnceLock<Graph>),
}

/// Borrowed view of a resolved result
#[derive(Debug, Clone, Copy)]
pub enum StatementResult<'a> {
    Rows(&'a RowSet),
    Graph(&'a Graph),
}

/// Execution statistics returned when a statement asks for them
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryStats {
    pub contains_updates: bool,
    pub nodes_created: u64,
    pub nodes_deleted: u64,
    pub properties_set: u64,
    pub relationships_created: u64,
    #[serde(alias = "relationship_deleted")]
    pub relationships_deleted: u64,
    pub labels_added: u64,
    pub labels_removed: u64,
    pub indexes_added: u64,
    pub indexes_removed: u64,
    pub constraints_added: u64,
    pub constraints_removed: u64,
}

/// A query with named parameters and a slot for its result.
///
/// The slot is empty until a round trip carrying this statement succeeds, and
/// is never overwritten afterwards. Statements are shared with the transaction
/// through an `Arc`, so the caller reads results from its own handle.
#[derive(Debug, Clone)]
pub struct Statement {
    query: String,
    parameters: HashMap<String, Value>,
    include_stats: bool,
    slot: ResultSlot,
    stats: OnceLock<QueryStats>,
}

impl Statement {
    fn with_slot(query: impl Into<String>, slot: ResultSlot) -> Self {
        Self {
            query: query.into(),
            parameters: HashMap::new(),
            include_stats: false,
            slot,
            stats: OnceLock::new(),
        }
    }

    /// A statement whose result is a [`RowSet`]
    pub fn row(query: impl Into<String>) -> Self {
        Self::with_slot(query, ResultSlot::Row(OnceLock::new()))
    }

    /// A statement whose result is a deduplicated [`Graph`]
    pub fn graph(query: impl Into<String>) -> Self {
        Self::with_slot(query, ResultSlot::Graph(OnceLock::new()))
    }

    pub fn new(query: impl Into<String>, kind: ResultKind) -> Self {
        match kind {
            ResultKind::Row => Self::row(query),
            ResultKind::Graph => Self::graph(query),
        }
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set_param(name, value);
        self
    }

    pub fn set_param(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.parameters.insert(name.into(), value.into());
    }

    /// Ask the server for execution statistics
    pub fn with_stats(mut self) -> Self {
        self.include_stats = true;
        self
    }

    pub fn set_include_stats(&mut self, include: bool) {
        self.include_stats = include;
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn parameters(&self) -> &HashMap<String, Value> {
        &self.parameters
    }

    pub fn includes_stats(&self) -> bool {
        self.include_stats
    }

    pub fn kind(&self) -> ResultKind {
        match self.slot {
            ResultSlot::Row(_) => ResultKind::Row,
            ResultSlot::Graph(_) => ResultKind::Graph,
        }
    }

    /// Row result, once resolved. Always `None` for graph statements.
    pub fn row_set(&self) -> Option<&RowSet> {
        match &self.slot {
            ResultSlot::Row(cell) => cell.get(),
            ResultSlot::Graph(_) => None,
        }
    }

    /// Graph result, once resolved. Always `None` for row statements.
    pub fn graph_result(&self) -> Option<&Graph> {
        match &self.slot {
            ResultSlot::Graph(cell) => cell.get(),
            ResultSlot::Row(_) => None,
        }
    }

    pub fn result(&self) -> Option<StatementResult<'_>> {
        match &self.slot {
            ResultSlot::Row(cell) => cell.get().map(StatementResult::Rows),
            ResultSlot::Graph(cell) => cell.get().map(StatementResult::Graph),
        }
    }

    /// Statistics, if requested and returned
    pub fn stats(&self) -> Option<&QueryStats> {
        self.stats.get()
    }

    pub fn is_resolved(&self) -> bool {
        match &self.slot {
            ResultSlot::Row(cell) => cell.get().is_some(),
            ResultSlot::Graph(cell) => cell.get().is_some(),
        }
    }

    /// Materialize `fragment` into the result slot.
    ///
    /// Fails with [`ProtocolError::ResultAlreadySet`] if the slot is filled.
    pub fn resolve(&self, fragment: &ResultFragment) -> Result<()> {
        if self.is_resolved() {
            return Err(ProtocolError::ResultAlreadySet);
        }

        match &self.slot {
            ResultSlot::Row(cell) => cell
                .set(build_row_set(fragment))
                .map_err(|_| ProtocolError::ResultAlreadySet)?,
            ResultSlot::Graph(cell) => cell
                .set(build_graph(fragment))
                .map_err(|_| ProtocolError::ResultAlreadySet)?,
        }

        if self.include_stats {
            if let Some(stats) = &fragment.stats {
                // slot above was empty, so stats are too
                let _ = self.stats.set(stats.clone());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::decode;

    fn fragment(body: &str) -> ResultFragment {
        decode(body).unwrap().results.remove(0)
    }

    #[test]
    fn kind_follows_constructor() {
        assert_eq!(Statement::row("RETURN 1").kind(), ResultKind::Row);
        assert_eq!(Statement::graph("RETURN 1").kind(), ResultKind::Graph);
        assert_eq!(
            Statement::new("RETURN 1", ResultKind::Graph).kind().as_str(),
            "graph"
        );
    }

    #[test]
    fn parameters_can_be_built_or_set() {
        let mut statement = Statement::row("RETURN $a, $b").with_param("a", 1);
        statement.set_param("b", "two");
        statement.set_param("a", 3);

        assert_eq!(statement.parameters().len(), 2);
        assert_eq!(statement.parameters()["a"], Value::from(3));
    }

    #[test]
    fn result_slot_is_write_once() {
        let statement = Statement::row("RETURN 1");
        assert!(statement.result().is_none());

        let first = fragment(r#"{"results": [{"columns": ["1"], "data": [{"row": [1]}]}]}"#);
        statement.resolve(&first).unwrap();

        let second = fragment(r#"{"results": [{"columns": ["1"], "data": [{"row": [2]}]}]}"#);
        assert!(matches!(
            statement.resolve(&second),
            Err(ProtocolError::ResultAlreadySet)
        ));
        assert_eq!(statement.row_set().unwrap().value(0, 0), Some(&Value::from(1)));
        assert!(statement.graph_result().is_none());
    }

    #[test]
    fn stats_are_kept_only_when_requested() {
        let body = r#"{"results": [{"columns": [], "data": [],
            "stats": {"contains_updates": true, "nodes_created": 2, "relationship_deleted": 1}}]}"#;

        let with = Statement::row("CREATE (a), (b)").with_stats();
        with.resolve(&fragment(body)).unwrap();
        let stats = with.stats().unwrap();
        assert!(stats.contains_updates);
        assert_eq!(stats.nodes_created, 2);
        assert_eq!(stats.relationships_deleted, 1);

        let without = Statement::row("CREATE (a), (b)");
        without.resolve(&fragment(body)).unwrap();
        assert!(without.stats().is_none());
    }
}
