//! Query scripts: parsing, execution and reply rendering.
//!
//! A query is a command name followed by a timestamp, a key and the
//! command's remaining arguments:
//!
//! ```text
//! SET 1000 user1 age 30
//! LOOK_BACK 1100 user1 age
//! COMPARE_AND_SET 1700 user1 age 31 32
//! ```
//!
//! Scripts come either as text (one query per line) or as a JSON array of
//! arrays, e.g. `[["SET", 1000, "user1", "age", "30"]]`.

use std::fmt;
use std::str::FromStr;

use serde_json::Value;

use crate::error::QueryError;
use crate::store::Store;
use crate::version::Timestamp;

/// Parses an integer-coercible timestamp.
///
/// Accepts surrounding whitespace and an optional leading `+`. Negative,
/// fractional and non-numeric input is rejected.
pub fn parse_timestamp(raw: &str) -> Result<Timestamp, QueryError> {
    let trimmed = raw.trim();
    let digits = trimmed.strip_prefix('+').unwrap_or(trimmed);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(QueryError::InvalidTimestamp { raw: raw.to_string() });
    }
    digits
        .parse()
        .map_err(|_| QueryError::InvalidTimestamp { raw: raw.to_string() })
}

/// One store operation with owned arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    /// `SET ts key field value`: append a version
    Set {
        timestamp: Timestamp,
        key: String,
        field: String,
        value: String,
    },
    /// `GET ts key field`: latest value
    Get {
        timestamp: Timestamp,
        key: String,
        field: String,
    },
    /// `COMPARE_AND_SET ts key field expected new`
    CompareAndSet {
        timestamp: Timestamp,
        key: String,
        field: String,
        expected: String,
        new: String,
    },
    /// `COMPARE_AND_DELETE ts key field expected`
    CompareAndDelete {
        timestamp: Timestamp,
        key: String,
        field: String,
        expected: String,
    },
    /// `LOOK_BACK past key field`: value at or before `past`, never evicts
    LookBack {
        past: Timestamp,
        key: String,
        field: String,
    },
    /// `EXPIRE ts key ttl`: expire a live key `ttl` after `ts` (0 keeps the current expiry)
    Expire {
        timestamp: Timestamp,
        key: String,
        ttl: Timestamp,
    },
    /// `DELETE ts key`: drop a key and its expiry outright
    Delete {
        timestamp: Timestamp,
        key: String,
    },
}

impl Query {
    /// Builds a query from its tokens, command name first.
    pub fn from_tokens<S: AsRef<str>>(tokens: &[S]) -> Result<Self, QueryError> {
        let (command, args) = tokens.split_first().ok_or(QueryError::Empty)?;
        let command = command.as_ref();
        let args: Vec<&str> = args.iter().map(AsRef::as_ref).collect();

        let (name, arity) = match command.to_ascii_uppercase().as_str() {
            "SET" => ("SET", 4),
            "GET" => ("GET", 3),
            "COMPARE_AND_SET" => ("COMPARE_AND_SET", 5),
            "COMPARE_AND_DELETE" => ("COMPARE_AND_DELETE", 4),
            "LOOK_BACK" => ("LOOK_BACK", 3),
            "EXPIRE" => ("EXPIRE", 3),
            "DELETE" => ("DELETE", 2),
            _ => return Err(QueryError::UnknownCommand(command.to_string())),
        };
        if args.len() != arity {
            return Err(QueryError::Arity {
                command: name,
                expected: arity,
                found: args.len(),
            });
        }

        let timestamp = parse_timestamp(args[0])?;
        let arg = |i: usize| args[i].to_string();

        let query = match name {
            "SET" => Query::Set {
                timestamp,
                key: arg(1),
                field: arg(2),
                value: arg(3),
            },
            "GET" => Query::Get {
                timestamp,
                key: arg(1),
                field: arg(2),
            },
            "COMPARE_AND_SET" => Query::CompareAndSet {
                timestamp,
                key: arg(1),
                field: arg(2),
                expected: arg(3),
                new: arg(4),
            },
            "COMPARE_AND_DELETE" => Query::CompareAndDelete {
                timestamp,
                key: arg(1),
                field: arg(2),
                expected: arg(3),
            },
            "LOOK_BACK" => Query::LookBack {
                past: timestamp,
                key: arg(1),
                field: arg(2),
            },
            "EXPIRE" => Query::Expire {
                timestamp,
                key: arg(1),
                ttl: parse_timestamp(args[2])?,
            },
            _ => Query::Delete {
                timestamp,
                key: arg(1),
            },
        };
        Ok(query)
    }

    /// Canonical command name
    pub fn command(&self) -> &'static str {
        match self {
            Query::Set { .. } => "SET",
            Query::Get { .. } => "GET",
            Query::CompareAndSet { .. } => "COMPARE_AND_SET",
            Query::CompareAndDelete { .. } => "COMPARE_AND_DELETE",
            Query::LookBack { .. } => "LOOK_BACK",
            Query::Expire { .. } => "EXPIRE",
            Query::Delete { .. } => "DELETE",
        }
    }

    /// Runs the query against `store`.
    pub fn execute(&self, store: &Store) -> Reply {
        tracing::trace!(command = self.command(), "executing query");
        match self {
            Query::Set {
                timestamp,
                key,
                field,
                value,
            } => {
                store.set(key, field, value, *timestamp);
                Reply::Done
            }
            Query::Get {
                timestamp,
                key,
                field,
            } => Reply::Value(store.get(key, field, *timestamp)),
            Query::CompareAndSet {
                timestamp,
                key,
                field,
                expected,
                new,
            } => Reply::Flag(store.compare_and_set(key, field, expected, new, *timestamp)),
            Query::CompareAndDelete {
                timestamp,
                key,
                field,
                expected,
            } => Reply::Flag(store.compare_and_delete(key, field, expected, *timestamp)),
            Query::LookBack { past, key, field } => {
                Reply::Value(store.look_back(key, field, *past))
            }
            Query::Expire {
                timestamp,
                key,
                ttl,
            } => Reply::Flag(store.expire(key, *ttl, *timestamp)),
            Query::Delete { key, .. } => Reply::Flag(store.delete(key)),
        }
    }
}

impl FromStr for Query {
    type Err = QueryError;

    /// Parses one whitespace-separated text line.
    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        Query::from_tokens(&tokens[..])
    }
}

/// Result of one query
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// A write with no result
    Done,
    /// A read; `None` when nothing was found
    Value(Option<String>),
    /// Outcome of a conditional operation
    Flag(bool),
}

impl fmt::Display for Reply {
    /// Renders `""` for writes and misses, the value for hits, and
    /// `true`/`false` for flags.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Done | Reply::Value(None) => Ok(()),
            Reply::Value(Some(value)) => f.write_str(value),
            Reply::Flag(flag) => write!(f, "{}", flag),
        }
    }
}

/// How a script is encoded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScriptFormat {
    /// One whitespace-separated query per line
    Text,
    /// A JSON array of query arrays
    Json,
    /// JSON if the first non-whitespace character is `[`, text otherwise
    #[default]
    Auto,
}

impl FromStr for ScriptFormat {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(ScriptFormat::Text),
            "json" => Ok(ScriptFormat::Json),
            "auto" | "" => Ok(ScriptFormat::Auto),
            _ => Err(QueryError::UnknownFormat(s.to_string())),
        }
    }
}

/// Parses a whole script in the given format.
pub fn parse_script(input: &str, format: ScriptFormat) -> Result<Vec<Query>, QueryError> {
    let format = match format {
        ScriptFormat::Auto if input.trim_start().starts_with('[') => ScriptFormat::Json,
        ScriptFormat::Auto => ScriptFormat::Text,
        other => other,
    };
    match format {
        ScriptFormat::Json => parse_json_script(input),
        _ => parse_text_script(input),
    }
}

/// Parses a text script. Blank lines and lines starting with `#` are skipped.
pub fn parse_text_script(input: &str) -> Result<Vec<Query>, QueryError> {
    input
        .lines()
        .enumerate()
        .filter(|(_, line)| {
            let line = line.trim();
            !line.is_empty() && !line.starts_with('#')
        })
        .map(|(idx, line)| line.parse::<Query>().map_err(|e| e.at(idx + 1)))
        .collect()
}

/// Parses a JSON script: an array of arrays of strings and integers.
pub fn parse_json_script(input: &str) -> Result<Vec<Query>, QueryError> {
    let entries: Vec<Vec<Value>> = serde_json::from_str(input)?;
    entries
        .iter()
        .enumerate()
        .map(|(idx, entry)| {
            entry
                .iter()
                .map(json_token)
                .collect::<Result<Vec<_>, _>>()
                .and_then(|tokens| Query::from_tokens(&tokens[..]))
                .map_err(|e| e.at(idx + 1))
        })
        .collect()
}

fn json_token(value: &Value) -> Result<String, QueryError> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) if n.is_u64() || n.is_i64() => Ok(n.to_string()),
        other => Err(QueryError::InvalidToken(other.to_string())),
    }
}

/// Executes `queries` in order and collects their replies.
pub fn run_script(store: &Store, queries: &[Query]) -> Vec<Reply> {
    queries.iter().map(|query| query.execute(store)).collect()
}
