//! Entry endpoints derived from the REST base URL.

use graphtx_protocol::continuation::COMMIT_SUFFIX;

/// `base/transaction` opens a long-running transaction;
/// `base/transaction/commit` runs a batch in a single atomic round trip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    base: String,
    transaction: String,
    autocommit: String,
}

impl Endpoints {
    pub fn new(base_url: &str) -> Self {
        let base = base_url.trim().trim_end_matches('/').to_string();
        let transaction = format!("{}/transaction", base);
        let autocommit = format!("{}{}", transaction, COMMIT_SUFFIX);
        Self {
            base,
            transaction,
            autocommit,
        }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn transaction(&self) -> &str {
        &self.transaction
    }

    pub fn autocommit(&self) -> &str {
        &self.autocommit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_slash_is_normalized() {
        let with = Endpoints::new("http://localhost:7474/db/data/");
        let without = Endpoints::new("http://localhost:7474/db/data");
        assert_eq!(with, without);
        assert_eq!(with.transaction(), "http://localhost:7474/db/data/transaction");
        assert_eq!(
            with.autocommit(),
            "http://localhost:7474/db/data/transaction/commit"
        );
    }
}
