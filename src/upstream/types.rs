//! Upstream-facing types and error definitions.

use thiserror::Error;

/// Errors that can occur while talking to the upstream database server.
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// Socket-level or HTTP-level failure reaching the server.
    #[error("transport error: {0}")]
    Transport(String),

    /// Login was rejected by the server.
    #[error("authentication rejected: {0}")]
    Auth(String),

    /// Upstream answered with a non-2xx HTTP status.
    #[error("upstream returned HTTP {0}")]
    Status(u16),

    /// Reply bytes did not form a valid Thrift-JSON envelope.
    #[error("malformed envelope: {0}")]
    Protocol(String),

    /// The server answered with a Thrift exception envelope.
    #[error("upstream exception: {0}")]
    Exception(String),
}

/// Result type for upstream operations.
pub type UpstreamResult<T> = Result<T, UpstreamError>;

/// Server status as reported by `get_server_status`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerStatus {
    pub version: String,
    pub start_time: i64,
    pub read_only: bool,
}

/// One column of a query result: parallel null bitmap and integer data.
///
/// The proxy only ever issues `SELECT COUNT(*)` queries itself, so integer
/// columns are the only column kind it decodes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Column {
    pub nulls: Vec<bool>,
    pub int_data: Vec<i64>,
}

/// Columnar query result, enough to read scalar aggregates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultSet {
    pub columns: Vec<Column>,
}

impl ResultSet {
    /// First value of the first column, `None` if the result is empty or NULL.
    pub fn scalar(&self) -> Option<i64> {
        let col = self.columns.first()?;
        match col.nulls.first() {
            Some(false) => col.int_data.first().copied(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_reads_first_non_null() {
        let rs = ResultSet {
            columns: vec![Column {
                nulls: vec![false],
                int_data: vec![42],
            }],
        };
        assert_eq!(rs.scalar(), Some(42));
    }

    #[test]
    fn test_scalar_null_and_empty() {
        let rs = ResultSet {
            columns: vec![Column {
                nulls: vec![true],
                int_data: vec![0],
            }],
        };
        assert_eq!(rs.scalar(), None);
        assert_eq!(ResultSet::default().scalar(), None);
    }

    #[test]
    fn test_error_display() {
        let err = UpstreamError::Status(503);
        assert_eq!(err.to_string(), "upstream returned HTTP 503");

        let err = UpstreamError::Exception("Session not valid".into());
        assert!(err.to_string().contains("Session not valid"));
    }
}
