use std::collections::HashMap;
use std::sync::Arc;

use crate::version::{History, Timestamp, Version};

/// All fields stored under one key, each with its own version history.
///
/// A record never holds an empty history; removing the last version of a
/// field removes the field itself.
#[derive(Debug, Clone, Default)]
pub(crate) struct Record {
    fields: HashMap<String, History>,
}

impl Record {
    pub(crate) fn append(&mut self, field: &str, timestamp: Timestamp, value: Arc<str>) {
        match self.fields.get_mut(field) {
            Some(history) => history.push(timestamp, value),
            None => {
                let mut history = History::default();
                history.push(timestamp, value);
                self.fields.insert(field.to_owned(), history);
            }
        }
    }

    pub(crate) fn latest(&self, field: &str) -> Option<&Version> {
        self.fields.get(field).and_then(History::latest)
    }

    pub(crate) fn history(&self, field: &str) -> Option<&History> {
        self.fields.get(field)
    }

    /// Drops the whole history of `field`. Returns `true` if it existed.
    pub(crate) fn remove_field(&mut self, field: &str) -> bool {
        self.fields.remove(field).is_some()
    }

    pub(crate) fn field_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.fields.keys().cloned().collect();
        names.sort();
        names
    }

    pub(crate) fn version_count(&self) -> usize {
        self.fields.values().map(History::len).sum()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_creates_field() {
        let mut record = Record::default();
        assert!(record.is_empty());

        record.append("age", 1000, Arc::from("30"));

        assert!(!record.is_empty());
        assert_eq!(record.latest("age").map(Version::value), Some("30"));
        assert_eq!(record.history("age").map(History::len), Some(1));
    }

    #[test]
    fn test_fields_are_independent() {
        let mut record = Record::default();
        record.append("age", 1, Arc::from("30"));
        record.append("name", 2, Arc::from("ann"));
        record.append("age", 3, Arc::from("31"));

        assert_eq!(record.latest("age").map(Version::value), Some("31"));
        assert_eq!(record.latest("name").map(Version::value), Some("ann"));
        assert_eq!(record.version_count(), 3);
        assert_eq!(record.field_names(), vec!["age".to_string(), "name".to_string()]);
    }

    #[test]
    fn test_remove_field_drops_whole_history() {
        let mut record = Record::default();
        record.append("age", 1, Arc::from("30"));
        record.append("age", 2, Arc::from("31"));

        assert!(record.remove_field("age"));
        assert!(record.latest("age").is_none());
        assert!(record.is_empty());
        assert!(!record.remove_field("age"));
    }

    #[test]
    fn test_latest_missing_field() {
        let record = Record::default();
        assert!(record.latest("nope").is_none());
        assert!(record.history("nope").is_none());
    }
}
