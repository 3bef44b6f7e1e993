//! # Lookback Core
//!
//! An in-memory versioned key-value store with point-in-time reads.
//!
//! ## Features
//!
//! - Every key holds named fields; every field keeps an append-only history
//!   of `(timestamp, value)` versions
//! - `get` returns the latest append, `look_back` answers "what was the
//!   value at time T"
//! - Compare-and-set and compare-and-delete gated on exact string equality
//! - Per-key expiry, checked lazily when a key is touched (no background task)
//! - Thread-safe storage using `DashMap`; operations on one key are
//!   linearizable, different keys proceed in parallel
//! - A small query language ([`query`]) for running scripts of operations
//!
//! ## Example
//!
//! ```rust
//! use lookback_core::Store;
//!
//! let store = Store::new();
//! store.set("user1", "age", "30", 1000);
//! store.set("user1", "age", "31", 1500);
//!
//! assert_eq!(store.look_back("user1", "age", 1100), Some("30".to_string()));
//! assert_eq!(store.get("user1", "age", 1600), Some("31".to_string()));
//!
//! // Expire the key 100 ticks after 1600
//! assert!(store.expire("user1", 100, 1600));
//! assert_eq!(store.get("user1", "age", 1700), None);
//! ```

mod config;
mod error;
pub mod query;
mod record;
mod store;
mod version;

pub use config::StoreConfig;
pub use error::QueryError;
pub use query::{Query, Reply, ScriptFormat};
pub use store::Store;
pub use version::{Timestamp, Version};

pub use store::DEFAULT_SEARCH_LIMIT;
pub use store::MAX_SEARCH_LIMIT;
pub use store::MAX_SEARCH_SCAN;
