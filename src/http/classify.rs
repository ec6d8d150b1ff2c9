//! Inbound request classification.
//!
//! The payload is a self-describing envelope the proxy deliberately does not
//! fully parse here: classification is a substring scan for method markers.
//! That shallow contract is what the upstream protocol allows us to rely on;
//! the full grammar is out of scope.

/// Method marker for query execution calls.
pub const QUERY_MARKER: &[u8] = b"sql_execute";

/// Method marker for table metadata lookups.
pub const METADATA_MARKER: &[u8] = b"get_table_details";

/// The proxy's shallow classification of an inbound request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    /// Runs a query; cached and rewritten with session + nonce.
    QueryExecution,
    /// Looks up table metadata; rewritten with session only.
    MetadataLookup,
    /// Everything else; forwarded untouched.
    PassThrough,
}

impl CallKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallKind::QueryExecution => "query",
            CallKind::MetadataLookup => "metadata",
            CallKind::PassThrough => "passthrough",
        }
    }
}

/// Classify a raw payload by marker substring.
pub fn classify(payload: &[u8]) -> CallKind {
    if contains(payload, QUERY_MARKER) {
        CallKind::QueryExecution
    } else if contains(payload, METADATA_MARKER) {
        CallKind::MetadataLookup
    } else {
        CallKind::PassThrough
    }
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}
