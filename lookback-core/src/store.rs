use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;

use crate::config::StoreConfig;
use crate::record::Record;
use crate::version::{Timestamp, Version};

/// Default limit for search_keys operations
pub const DEFAULT_SEARCH_LIMIT: usize = 50;

/// Maximum limit for search_keys operations (hard cap)
pub const MAX_SEARCH_LIMIT: usize = 250;

/// Maximum number of keys to scan during search operations.
/// Prevents unbounded memory allocation from a single search request.
pub const MAX_SEARCH_SCAN: usize = 10_000;

/// Truncates a key for safe logging (prevents leaking sensitive key data)
fn truncate_key_for_log(key: &str) -> String {
    const MAX_LOG_LEN: usize = 16;
    match key.char_indices().nth(MAX_LOG_LEN) {
        Some((idx, _)) => format!("{}...", &key[..idx]),
        None => key.to_string(),
    }
}

/// Internal shared state for the store
#[derive(Default)]
struct StoreInner {
    data: DashMap<String, Record>,
    /// Expiry timestamp per key, kept apart from the version histories
    expiry: DashMap<String, Timestamp>,
}

/// Thread-safe in-memory versioned key-value store
///
/// Every key holds a record of fields, and every field holds an append-only
/// history of timestamped values. Reads return the most recently appended
/// value; [`Store::look_back`] answers point-in-time queries.
///
/// Expiry is lazy: a key whose expiry timestamp is reached is evicted by the
/// first operation that touches it with a timestamp at or past the expiry.
/// There is no background reaper; [`Store::cleanup`] sweeps on demand.
///
/// # Locking
///
/// Keyed operations hold the `DashMap` entry lock of their key for the whole
/// call, so the expiry check, the comparison and the append of
/// compare-and-set cannot interleave with another write to the same key.
/// Keys in different shards never contend. The data map is always locked
/// before the expiry map.
///
/// # Example
///
/// ```rust
/// use lookback_core::Store;
///
/// let store = Store::new();
/// store.set("user1", "age", "30", 1000);
/// store.set("user1", "age", "31", 1500);
///
/// assert_eq!(store.look_back("user1", "age", 1100), Some("30".to_string()));
/// assert_eq!(store.get("user1", "age", 1600), Some("31".to_string()));
/// assert!(store.compare_and_set("user1", "age", "31", "32", 1700));
/// assert!(store.compare_and_delete("user1", "age", "32", 1900));
/// assert_eq!(store.get("user1", "age", 2000), None);
/// ```
#[derive(Clone, Default)]
pub struct Store {
    inner: Arc<StoreInner>,
}

impl Store {
    /// Creates a new store with default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new store with custom configuration
    ///
    /// # Example
    ///
    /// ```rust
    /// use lookback_core::{Store, StoreConfig};
    ///
    /// let config = StoreConfig::default().with_shard_amount(8);
    /// let store = Store::with_config(config);
    /// assert!(store.is_empty());
    /// ```
    pub fn with_config(config: StoreConfig) -> Self {
        let inner = match config.effective_shard_amount() {
            Some(shards) => StoreInner {
                data: DashMap::with_capacity_and_shard_amount(config.initial_capacity, shards),
                expiry: DashMap::with_shard_amount(shards),
            },
            None => StoreInner {
                data: DashMap::with_capacity(config.initial_capacity),
                expiry: DashMap::new(),
            },
        };

        Self {
            inner: Arc::new(inner),
        }
    }

    /// Locks the entry for `key` and runs the expiry check at `now`.
    ///
    /// Returns `None` if the key was judged expired; its record and expiry
    /// entry are gone by then. Otherwise runs `op` with the entry still held.
    fn live_entry<R>(
        &self,
        key: &str,
        now: Timestamp,
        op: impl FnOnce(Entry<'_, String, Record>) -> R,
    ) -> Option<R> {
        let entry = self.inner.data.entry(key.to_owned());

        if let Some((_, expires_at)) = self.inner.expiry.remove_if(key, |_, at| now >= *at) {
            if let Entry::Occupied(occupied) = entry {
                occupied.remove();
            }
            tracing::debug!(
                "evicted {} (expired at {}, touched at {})",
                truncate_key_for_log(key),
                expires_at,
                now
            );
            return None;
        }

        Some(op(entry))
    }

    fn append(
        &self,
        key: &str,
        field: &str,
        value: &str,
        timestamp: Timestamp,
        expires_at: Option<Timestamp>,
    ) {
        let applied = self.live_entry(key, timestamp, |entry| {
            entry.or_default().append(field, timestamp, Arc::from(value));
            if let Some(at) = expires_at {
                self.inner.expiry.insert(key.to_owned(), at);
            }
        });

        if applied.is_none() {
            tracing::trace!("SET {} ignored: key expired", truncate_key_for_log(key));
        }
    }

    /// Appends `value` to the history of `field` under `key`
    ///
    /// Keys and fields are created on first use. Identical calls append
    /// identical versions; history is never deduplicated.
    ///
    /// If `key` is expired at `timestamp` the key is evicted and nothing is
    /// written.
    pub fn set(&self, key: &str, field: &str, value: &str, timestamp: Timestamp) {
        self.append(key, field, value, timestamp, None);
    }

    /// Appends like [`Store::set`] and registers an expiry `ttl` after
    /// `timestamp`
    ///
    /// # TTL Semantics
    ///
    /// A TTL of 0 leaves the key's expiry untouched. Expiry timestamps
    /// saturate at `u64::MAX`. Nothing is written or registered when the
    /// key is already expired at `timestamp`.
    pub fn set_with_ttl(
        &self,
        key: &str,
        field: &str,
        value: &str,
        timestamp: Timestamp,
        ttl: Timestamp,
    ) {
        let expires_at = (ttl > 0).then(|| timestamp.saturating_add(ttl));
        self.append(key, field, value, timestamp, expires_at);
    }

    /// Retrieves the most recently appended value of `field`
    ///
    /// Returns `None` if the key doesn't exist, has expired, or has no such
    /// field. The timestamp is only used for the expiry check; it does not
    /// filter versions.
    pub fn get(&self, key: &str, field: &str, timestamp: Timestamp) -> Option<String> {
        self.live_entry(key, timestamp, |entry| match entry {
            Entry::Occupied(occupied) => occupied
                .get()
                .latest(field)
                .map(|version| version.value().to_string()),
            Entry::Vacant(_) => None,
        })
        .flatten()
    }

    /// Appends `new` if the latest value of `field` equals `expected`
    ///
    /// Comparison is exact string equality. Returns `false` without writing
    /// if the key is missing or expired, the field is missing, or the latest
    /// value differs.
    #[must_use = "returns whether the value was swapped"]
    pub fn compare_and_set(
        &self,
        key: &str,
        field: &str,
        expected: &str,
        new: &str,
        timestamp: Timestamp,
    ) -> bool {
        self.live_entry(key, timestamp, |entry| match entry {
            Entry::Occupied(mut occupied) => {
                let record = occupied.get_mut();
                match record.latest(field) {
                    Some(version) if version.value() == expected => {}
                    _ => return false,
                }
                record.append(field, timestamp, Arc::from(new));
                true
            }
            Entry::Vacant(_) => false,
        })
        .unwrap_or(false)
    }

    /// Removes the whole history of `field` if its latest value equals
    /// `expected`
    ///
    /// When the last field of a key is removed the key is removed too. Its
    /// expiry entry stays, so a record re-created under the key inherits the
    /// deadline. Returns `false` without mutating if the key is missing or
    /// expired, the field is missing, or the latest value differs.
    #[must_use = "returns whether the field was deleted"]
    pub fn compare_and_delete(
        &self,
        key: &str,
        field: &str,
        expected: &str,
        timestamp: Timestamp,
    ) -> bool {
        self.live_entry(key, timestamp, |entry| match entry {
            Entry::Occupied(mut occupied) => {
                let record = occupied.get_mut();
                match record.latest(field) {
                    Some(version) if version.value() == expected => {}
                    _ => return false,
                }
                record.remove_field(field);
                if record.is_empty() {
                    occupied.remove();
                    tracing::debug!("removed {}: last field deleted", truncate_key_for_log(key));
                }
                true
            }
            Entry::Vacant(_) => false,
        })
        .unwrap_or(false)
    }

    /// Returns the value `field` held at `past`
    ///
    /// Scans from the newest append backwards and returns the first version
    /// whose timestamp is at or before `past`.
    ///
    /// Unlike every other keyed read this does not run the expiry check: a
    /// key that is past its expiry but has not been touched since is still
    /// visible here, and is never evicted by this call.
    pub fn look_back(&self, key: &str, field: &str, past: Timestamp) -> Option<String> {
        let record = self.inner.data.get(key)?;
        record
            .history(field)?
            .at(past)
            .map(|version| version.value().to_string())
    }

    /// Returns a copy of the full history of `field`, oldest append first
    ///
    /// Like [`Store::look_back`], this never evicts.
    pub fn history(&self, key: &str, field: &str) -> Vec<Version> {
        self.inner
            .data
            .get(key)
            .and_then(|record| record.history(field).map(|h| h.versions().to_vec()))
            .unwrap_or_default()
    }

    /// Returns the sorted field names of a live key
    pub fn fields(&self, key: &str, timestamp: Timestamp) -> Vec<String> {
        self.live_entry(key, timestamp, |entry| match entry {
            Entry::Occupied(occupied) => occupied.get().field_names(),
            Entry::Vacant(_) => Vec::new(),
        })
        .unwrap_or_default()
    }

    /// Registers (or replaces) the expiry timestamp of `key`
    ///
    /// The key does not need to exist yet; a record created later inherits
    /// the expiry. Nothing is evicted by this call.
    pub fn set_expiry(&self, key: &str, expires_at: Timestamp) {
        let _entry = self.inner.data.entry(key.to_owned());
        self.inner.expiry.insert(key.to_owned(), expires_at);
    }

    /// Makes a live key expire `ttl` after `timestamp`
    ///
    /// Runs the expiry check at `timestamp` first. Returns `true` if the key
    /// exists. As in [`Store::set_with_ttl`], a TTL of 0 leaves the key's
    /// expiry untouched.
    #[must_use = "returns whether the key exists"]
    pub fn expire(&self, key: &str, ttl: Timestamp, timestamp: Timestamp) -> bool {
        self.live_entry(key, timestamp, |entry| match entry {
            Entry::Occupied(_) => {
                if ttl > 0 {
                    self.inner
                        .expiry
                        .insert(key.to_owned(), timestamp.saturating_add(ttl));
                }
                true
            }
            Entry::Vacant(_) => false,
        })
        .unwrap_or(false)
    }

    /// Removes the expiry of `key`
    ///
    /// Returns `true` if an expiry was registered.
    pub fn persist(&self, key: &str) -> bool {
        let _entry = self.inner.data.entry(key.to_owned());
        self.inner.expiry.remove(key).is_some()
    }

    /// Returns the registered expiry timestamp of `key`, without evicting
    pub fn expiry_of(&self, key: &str) -> Option<Timestamp> {
        self.inner.expiry.get(key).map(|at| *at)
    }

    /// Checks whether `key` holds a record at `timestamp`
    ///
    /// Expired keys are evicted.
    #[must_use]
    pub fn contains_key(&self, key: &str, timestamp: Timestamp) -> bool {
        self.live_entry(key, timestamp, |entry| matches!(entry, Entry::Occupied(_)))
            .unwrap_or(false)
    }

    /// Deletes a key and its expiry from the store
    ///
    /// Returns `true` if the key held a record (regardless of expiration),
    /// `false` otherwise.
    #[must_use = "returns whether the key existed"]
    pub fn delete(&self, key: &str) -> bool {
        let entry = self.inner.data.entry(key.to_owned());
        self.inner.expiry.remove(key);
        match entry {
            Entry::Occupied(occupied) => {
                occupied.remove();
                tracing::debug!("deleted {}", truncate_key_for_log(key));
                true
            }
            Entry::Vacant(_) => false,
        }
    }

    /// Deletes all records and expiry entries from the store.
    ///
    /// Returns the approximate number of keys that were removed.
    ///
    /// # Note
    ///
    /// The returned count may be slightly inaccurate when other threads add
    /// or remove keys between the count and clear operations.
    pub fn delete_all(&self) -> usize {
        let count = self.inner.data.len();
        self.inner.data.clear();
        self.inner.expiry.clear();
        tracing::debug!("deleted all {} keys", count);
        count
    }

    /// Evicts every key whose expiry is at or before `timestamp`
    ///
    /// Returns the number of keys removed. Each candidate is re-checked
    /// under its entry lock, so keys whose expiry was moved or removed in
    /// the meantime survive.
    pub fn cleanup(&self, timestamp: Timestamp) -> usize {
        let candidates: Vec<String> = self
            .inner
            .expiry
            .iter()
            .filter(|entry| timestamp >= *entry.value())
            .map(|entry| entry.key().clone())
            .collect();

        let mut removed = 0;
        for key in candidates {
            let entry = self.inner.data.entry(key.clone());
            if self
                .inner
                .expiry
                .remove_if(&key, |_, at| timestamp >= *at)
                .is_some()
            {
                if let Entry::Occupied(occupied) = entry {
                    occupied.remove();
                    removed += 1;
                }
            }
        }

        if removed > 0 {
            tracing::debug!("cleanup at {} evicted {} keys", timestamp, removed);
        }
        removed
    }

    fn is_live(&self, key: &str, timestamp: Timestamp) -> bool {
        self.inner
            .expiry
            .get(key)
            .map_or(true, |at| timestamp < *at)
    }

    /// Returns all keys that are not expired at `timestamp`
    ///
    /// Filters without evicting.
    pub fn keys(&self, timestamp: Timestamp) -> Vec<String> {
        self.inner
            .data
            .iter()
            .filter(|entry| self.is_live(entry.key(), timestamp))
            .map(|entry| entry.key().clone())
            .collect()
    }

    /// Searches for live keys matching a prefix with pagination support.
    ///
    /// Returns matching keys sorted alphabetically, along with the total
    /// count of all matching keys (before pagination).
    ///
    /// # Arguments
    /// * `prefix` - The prefix to match keys against (empty string matches all keys)
    /// * `limit` - Maximum number of keys to return (default: 50, max: 250)
    /// * `skip` - Number of matching keys to skip for pagination (default: 0)
    /// * `timestamp` - Keys expired at this time are left out (not evicted)
    ///
    /// # Performance Warning
    ///
    /// **This operation iterates through ALL keys in the store.** At most
    /// `MAX_SEARCH_SCAN` matches are collected and sorted.
    pub fn search_keys(
        &self,
        prefix: &str,
        limit: Option<usize>,
        skip: Option<usize>,
        timestamp: Timestamp,
    ) -> (Vec<String>, usize) {
        let limit = limit.unwrap_or(DEFAULT_SEARCH_LIMIT).min(MAX_SEARCH_LIMIT);
        let skip = skip.unwrap_or(0);

        let mut matching_keys: Vec<String> = self
            .inner
            .data
            .iter()
            .filter(|entry| entry.key().starts_with(prefix))
            .filter(|entry| self.is_live(entry.key(), timestamp))
            .take(MAX_SEARCH_SCAN)
            .map(|entry| entry.key().clone())
            .collect();

        matching_keys.sort();

        let total_count = matching_keys.len();
        let keys = matching_keys.into_iter().skip(skip).take(limit).collect();

        (keys, total_count)
    }

    /// Returns the number of keys in the store (including expired ones
    /// not yet evicted)
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.data.len()
    }

    /// Returns `true` if the store holds no keys
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.data.is_empty()
    }

    /// Returns the total number of versions across all keys and fields
    pub fn version_count(&self) -> usize {
        self.inner
            .data
            .iter()
            .map(|entry| entry.value().version_count())
            .sum()
    }
}
