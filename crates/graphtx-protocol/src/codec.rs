//! Request payload encoding and response envelope decoding.
//!
//! Request:
//! `{"statements": [{"statement", "parameters", "resultDataContents": ["row"|"graph"], "includeStats"}]}`
//!
//! Response:
//! `{"commit", "transaction": {"expires"}, "results": [{"columns", "data"}], "errors": [{"code", "message"}]}`

use crate::continuation::Continuation;
use crate::error::{ProtocolError, Result, ServerError};
use crate::statement::{QueryStats, Statement};
use crate::value::Value;
use serde::{de, Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// Body of a POST to a transaction endpoint
#[derive(Debug, Serialize)]
pub struct RequestPayload<'a> {
    pub statements: Vec<StatementPayload<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatementPayload<'a> {
    pub statement: &'a str,
    pub parameters: &'a HashMap<String, Value>,
    pub result_data_contents: [&'static str; 1],
    pub include_stats: bool,
}

impl<'a> RequestPayload<'a> {
    /// A payload with no statements, used to keep a transaction alive
    pub fn empty() -> Self {
        Self {
            statements: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    pub fn to_json(&self) -> Result<serde_json::Value> {
        serde_json::to_value(self).map_err(ProtocolError::Encode)
    }
}

/// Encode a batch, one entry per statement in the given order.
pub fn encode<'a, I>(statements: I) -> RequestPayload<'a>
where
    I: IntoIterator<Item = &'a Statement>,
{
    RequestPayload {
        statements: statements
            .into_iter()
            .map(|statement| StatementPayload {
                statement: statement.query(),
                parameters: statement.parameters(),
                result_data_contents: [statement.kind().as_str()],
                include_stats: statement.includes_stats(),
            })
            .collect(),
    }
}

/// Decode a raw response body.
///
/// An empty body decodes to an empty envelope. Anything that is not a JSON
/// object fails with [`ProtocolError::MalformedEnvelope`].
pub fn decode(body: &str) -> Result<ResponseEnvelope> {
    if body.trim().is_empty() {
        return Ok(ResponseEnvelope::default());
    }

    let json: serde_json::Value =
        serde_json::from_str(body).map_err(ProtocolError::MalformedEnvelope)?;
    if !json.is_object() {
        return Err(ProtocolError::MalformedEnvelope(de::Error::custom(format!(
            "expected a JSON object, found {}",
            json_kind(&json)
        ))));
    }
    let envelope: ResponseEnvelope =
        serde_json::from_value(json).map_err(ProtocolError::MalformedEnvelope)?;
    debug!(
        results = envelope.results.len(),
        errors = envelope.errors.len(),
        has_commit = envelope.commit.is_some(),
        "Decoded response envelope"
    );
    Ok(envelope)
}

fn json_kind(json: &serde_json::Value) -> &'static str {
    match json {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ResponseEnvelope {
    pub commit: Option<String>,
    pub transaction: Option<TransactionInfo>,
    pub results: Vec<ResultFragment>,
    pub errors: Vec<ServerError>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TransactionInfo {
    pub expires: Option<String>,
}

impl ResponseEnvelope {
    /// The continuation the server handed back, if the transaction stays open.
    pub fn continuation(&self) -> Result<Option<Continuation>> {
        let Some(commit) = self.commit.as_deref() else {
            return Ok(None);
        };
        let expires = self
            .transaction
            .as_ref()
            .and_then(|t| t.expires.as_deref())
            .ok_or(ProtocolError::MissingExpiry)?;
        Continuation::from_commit_url(commit, expires).map(Some)
    }

    /// Fragment for the statement sent at `index`
    pub fn fragment(&self, index: usize) -> Result<&ResultFragment> {
        self.results
            .get(index)
            .ok_or(ProtocolError::MissingFragment {
                index,
                available: self.results.len(),
            })
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn take_errors(&mut self) -> Vec<ServerError> {
        std::mem::take(&mut self.errors)
    }
}

/// Result of one statement, positionally matched to the request.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ResultFragment {
    pub columns: Vec<String>,
    pub data: Vec<DataItem>,
    pub stats: Option<QueryStats>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DataItem {
    pub row: Option<Vec<serde_json::Value>>,
    pub graph: Option<SubGraph>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SubGraph {
    pub nodes: Vec<WireNode>,
    pub relationships: Vec<WireRelationship>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireNode {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: i64,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub properties: Option<serde_json::Map<String, serde_json::Value>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireRelationship {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: i64,
    #[serde(rename = "type", default)]
    pub rel_type: String,
    #[serde(deserialize_with = "deserialize_id")]
    pub start_node: i64,
    #[serde(deserialize_with = "deserialize_id")]
    pub end_node: i64,
    #[serde(default)]
    pub properties: Option<serde_json::Map<String, serde_json::Value>>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Number(i64),
    Text(String),
}

/// Identities arrive as numbers or numeric strings depending on server version.
fn deserialize_id<'de, D>(deserializer: D) -> std::result::Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    match RawId::deserialize(deserializer)? {
        RawId::Number(id) => Ok(id),
        RawId::Text(text) => text
            .trim()
            .parse()
            .map_err(|_| de::Error::custom(format!("invalid identity '{}'", text))),
    }
}
