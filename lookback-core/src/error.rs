//! Error types for query parsing.

use thiserror::Error;

/// Errors that can occur while turning script input into queries.
///
/// Store operations themselves never fail; these only cover malformed input.
#[derive(Error, Debug)]
pub enum QueryError {
    /// The command name is not one the store understands
    #[error("unknown command `{0}`")]
    UnknownCommand(String),

    /// A query was empty
    #[error("empty query")]
    Empty,

    /// Wrong number of arguments for a command
    #[error("{command} takes {expected} arguments, got {found}")]
    Arity {
        /// Canonical command name
        command: &'static str,
        /// Arguments required after the command name
        expected: usize,
        /// Arguments supplied after the command name
        found: usize,
    },

    /// A timestamp that is not a non-negative integer
    #[error("invalid timestamp `{raw}`: expected a non-negative integer")]
    InvalidTimestamp {
        /// The offending input
        raw: String,
    },

    /// A JSON element that is neither a string nor an integer
    #[error("unsupported value `{0}`: expected a string or an integer")]
    InvalidToken(String),

    /// Unknown script format name
    #[error("unknown script format `{0}`: expected text, json or auto")]
    UnknownFormat(String),

    /// JSON script could not be parsed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Wraps an error with the script position it occurred at
    #[error("query {position}: {source}")]
    At {
        /// 1-based line (text scripts) or entry (JSON scripts) number
        position: usize,
        /// The underlying error
        #[source]
        source: Box<QueryError>,
    },
}

impl QueryError {
    pub(crate) fn at(self, position: usize) -> Self {
        QueryError::At {
            position,
            source: Box::new(self),
        }
    }

    /// Returns `true` if this error (or the error it wraps) is a malformed
    /// timestamp.
    pub fn is_invalid_timestamp(&self) -> bool {
        match self {
            QueryError::InvalidTimestamp { .. } => true,
            QueryError::At { source, .. } => source.is_invalid_timestamp(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let err = QueryError::Arity {
            command: "GET",
            expected: 3,
            found: 2,
        };
        assert_eq!(err.to_string(), "GET takes 3 arguments, got 2");

        let err = QueryError::InvalidTimestamp { raw: "1.5".into() }.at(4);
        assert_eq!(
            err.to_string(),
            "query 4: invalid timestamp `1.5`: expected a non-negative integer"
        );
    }

    #[test]
    fn test_is_invalid_timestamp_sees_through_position() {
        let err = QueryError::InvalidTimestamp { raw: "x".into() }.at(1);
        assert!(err.is_invalid_timestamp());
        assert!(!QueryError::UnknownCommand("PUT".into()).is_invalid_timestamp());
    }
}
