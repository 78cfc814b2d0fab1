use std::fmt;

use serde::{Deserialize, Serialize};

use super::NormalizedQuery;

/// Length of the display prefix used by [`QueryId::short`].
const SHORT_LEN: usize = 12;

/// Content-addressed identity of a normalized query.
///
/// The BLAKE3 digest of the canonical URL, hex encoded. It depends on nothing but the
/// query bytes, so it is stable across calls and process restarts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QueryId(String);

impl QueryId {
    /// Derives the identity of `query`.
    pub fn of(query: &NormalizedQuery) -> Self {
        QueryId(blake3::hash(query.as_str().as_bytes()).to_hex().to_string())
    }

    /// Wraps an identity read back from a caller (e.g. a UI selection).
    pub fn from_hex(hex: &str) -> Self {
        QueryId(hex.trim().to_ascii_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short display form.
    pub fn short(&self) -> &str {
        &self.0[..SHORT_LEN.min(self.0.len())]
    }
}

impl fmt::Display for QueryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
