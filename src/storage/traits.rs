//! Storage abstraction trait.

use std::fmt::Debug;

use crate::error::Result;

/// A key-value store for durable index records.
///
/// Keys are arbitrary UTF-8 strings, values are opaque bytes. Every call is
/// atomic for its key: a concurrent or crashed `put` leaves either the old or
/// the new value, never a mix.
pub trait Storage: Send + Sync + Debug {
    /// Read the value stored under `key`.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Store `value` under `key`, replacing any previous value.
    fn put(&self, key: &str, value: &[u8]) -> Result<()>;

    /// Delete a key. Returns whether it existed.
    fn delete(&self, key: &str) -> Result<bool>;

    /// All keys starting with `prefix`, in ascending order.
    fn list(&self, prefix: &str) -> Result<Vec<String>>;

    /// Delete every key.
    fn clear(&self) -> Result<()>;

    /// Check whether a key exists.
    fn contains(&self, key: &str) -> Result<bool> {
        Ok(self.get(key)?.is_some())
    }
}
