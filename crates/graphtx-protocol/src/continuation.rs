//! The endpoint/expiry pair returned by every round trip of an open transaction.

use crate::error::{ProtocolError, Result};
use chrono::{DateTime, FixedOffset};

/// Suffix the server appends to the continuation endpoint in the `commit` field
pub const COMMIT_SUFFIX: &str = "/commit";

/// Where the next round trip goes, and until when the server keeps the
/// transaction alive.
///
/// Always replaced as a whole so the endpoint and expiry never disagree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Continuation {
    endpoint: String,
    expires: DateTime<FixedOffset>,
}

impl Continuation {
    pub fn new(endpoint: impl Into<String>, expires: DateTime<FixedOffset>) -> Self {
        Self {
            endpoint: endpoint.into(),
            expires,
        }
    }

    /// Build from the envelope's `commit` URL and raw `expires` string.
    pub fn from_commit_url(commit: &str, expires: &str) -> Result<Self> {
        Ok(Self {
            endpoint: strip_commit_suffix(commit).to_string(),
            expires: parse_expiry(expires)?,
        })
    }

    /// Endpoint for further statements, flushes, keep-alives and rollback
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn expires(&self) -> DateTime<FixedOffset> {
        self.expires
    }

    /// Endpoint that finally commits the transaction
    pub fn commit_url(&self) -> String {
        format!("{}{}", self.endpoint, COMMIT_SUFFIX)
    }
}

pub fn strip_commit_suffix(url: &str) -> &str {
    url.strip_suffix(COMMIT_SUFFIX).unwrap_or(url)
}

/// Parse an RFC 2822 timestamp such as `Fri, 14 Oct 2016 15:20:38 +0000`.
pub fn parse_expiry(raw: &str) -> Result<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc2822(raw.trim()).map_err(|source| ProtocolError::InvalidExpiry {
        raw: raw.to_string(),
        source,
    })
}
