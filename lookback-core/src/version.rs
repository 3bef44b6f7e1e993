use serde::Serialize;
use std::sync::Arc;

/// Logical timestamp supplied by the caller with every operation
pub type Timestamp = u64;

/// A single timestamped value recorded for a field
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Version {
    timestamp: Timestamp,
    value: Arc<str>,
}

impl Version {
    /// Creates a new version with the given timestamp and value
    pub fn new(timestamp: Timestamp, value: Arc<str>) -> Self {
        Self { timestamp, value }
    }

    /// Returns the timestamp this version was recorded at
    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    /// Returns the stored value as a string slice
    pub fn value(&self) -> &str {
        &self.value
    }
}

/// Append-only version list of one field.
///
/// "Latest" always means last appended, never highest timestamp.
#[derive(Debug, Clone, Default)]
pub(crate) struct History {
    versions: Vec<Version>,
}

impl History {
    pub(crate) fn push(&mut self, timestamp: Timestamp, value: Arc<str>) {
        self.versions.push(Version::new(timestamp, value));
    }

    pub(crate) fn latest(&self) -> Option<&Version> {
        self.versions.last()
    }

    /// Walks backwards from the newest append and returns the first version
    /// recorded at or before `past`.
    pub(crate) fn at(&self, past: Timestamp) -> Option<&Version> {
        self.versions.iter().rev().find(|v| v.timestamp <= past)
    }

    pub(crate) fn len(&self) -> usize {
        self.versions.len()
    }

    pub(crate) fn versions(&self) -> &[Version] {
        &self.versions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn history(entries: &[(Timestamp, &str)]) -> History {
        let mut history = History::default();
        for (ts, value) in entries {
            history.push(*ts, Arc::from(*value));
        }
        history
    }

    #[test]
    fn test_version_accessors() {
        let version = Version::new(1000, Arc::from("30"));

        assert_eq!(version.timestamp(), 1000);
        assert_eq!(version.value(), "30");
    }

    #[test]
    fn test_latest_is_last_appended() {
        let h = history(&[(10, "a"), (10, "b"), (5, "c")]);

        // Append order wins, even over a larger timestamp
        assert_eq!(h.latest().map(Version::value), Some("c"));
    }

    #[test]
    fn test_latest_of_empty_history() {
        assert!(History::default().latest().is_none());
    }

    #[test]
    fn test_at_returns_greatest_timestamp_not_after_bound() {
        let h = history(&[(1000, "30"), (1500, "31"), (2000, "32")]);

        assert_eq!(h.at(999).map(Version::value), None);
        assert_eq!(h.at(1000).map(Version::value), Some("30"));
        assert_eq!(h.at(1499).map(Version::value), Some("30"));
        assert_eq!(h.at(1500).map(Version::value), Some("31"));
        assert_eq!(h.at(u64::MAX).map(Version::value), Some("32"));
    }

    #[test]
    fn test_at_breaks_ties_by_append_order() {
        let h = history(&[(100, "first"), (100, "second")]);

        assert_eq!(h.at(100).map(Version::value), Some("second"));
    }

    #[test]
    fn test_len_and_versions() {
        let h = history(&[(1, "x"), (2, "y")]);

        assert_eq!(h.len(), 2);
        let timestamps: Vec<_> = h.versions().iter().map(Version::timestamp).collect();
        assert_eq!(timestamps, vec![1, 2]);
    }

    #[test]
    fn test_version_serializes_as_object() {
        let version = Version::new(42, Arc::from("v"));
        let json = serde_json::to_string(&version).unwrap();

        assert_eq!(json, r#"{"timestamp":42,"value":"v"}"#);
    }
}
