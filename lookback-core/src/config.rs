/// Configuration for the store's internal maps
///
/// # Example
///
/// ```rust
/// use lookback_core::StoreConfig;
///
/// let config = StoreConfig::default()
///     .with_initial_capacity(1024)
///     .with_shard_amount(16);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreConfig {
    /// Number of keys to pre-allocate room for (default: 0)
    pub initial_capacity: usize,
    /// Number of lock shards (default: chosen by `DashMap` from the CPU count)
    pub shard_amount: Option<usize>,
}

impl StoreConfig {
    /// Creates a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the number of keys to pre-allocate room for
    pub fn with_initial_capacity(mut self, capacity: usize) -> Self {
        self.initial_capacity = capacity;
        self
    }

    /// Sets the number of lock shards
    ///
    /// Keys in different shards never contend. The value is rounded up to
    /// the next power of two, with a minimum of 2.
    ///
    /// # Arguments
    ///
    /// * `shards` - Requested shard count
    pub fn with_shard_amount(mut self, shards: usize) -> Self {
        self.shard_amount = Some(shards);
        self
    }

    /// Shard count actually handed to `DashMap`, if one was requested
    pub(crate) fn effective_shard_amount(&self) -> Option<usize> {
        self.shard_amount.map(|n| n.max(2).next_power_of_two())
    }

    /// Create a configuration from environment variables.
    ///
    /// Reads:
    /// - `LOOKBACK_CAPACITY` - Initial key capacity (defaults to 0)
    /// - `LOOKBACK_SHARDS` - Shard count (defaults to `DashMap`'s choice)
    ///
    /// Unparseable values fall back to the default.
    pub fn from_env() -> Self {
        let initial_capacity = std::env::var("LOOKBACK_CAPACITY")
            .ok()
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(0);
        let shard_amount = std::env::var("LOOKBACK_SHARDS")
            .ok()
            .and_then(|v| v.trim().parse().ok());

        Self {
            initial_capacity,
            shard_amount,
        }
    }
}
