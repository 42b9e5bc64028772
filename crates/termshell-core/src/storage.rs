//! Key/value storage abstraction.

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::ShellError;

/// Persistent string-keyed store of JSON values.
pub trait KeyValueStore: Send + Sync {
    /// Stores `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// `ShellError::Storage` if the value cannot be persisted.
    fn save(&self, key: &str, value: &serde_json::Value) -> Result<(), ShellError>;

    /// Returns the value under `key`, if any.
    ///
    /// # Errors
    ///
    /// `ShellError::Storage` if the backing store cannot be read.
    fn load(&self, key: &str) -> Result<Option<serde_json::Value>, ShellError>;

    /// Deletes `key`. Removing a missing key is not an error.
    ///
    /// # Errors
    ///
    /// `ShellError::Storage` if the change cannot be persisted.
    fn remove(&self, key: &str) -> Result<(), ShellError>;

    /// Returns whether `key` holds a value.
    fn has(&self, key: &str) -> bool;

    /// Deletes every key.
    ///
    /// # Errors
    ///
    /// `ShellError::Storage` if the change cannot be persisted.
    fn clear(&self) -> Result<(), ShellError>;
}

/// Serializes `value` and saves it under `key`.
///
/// # Errors
///
/// `ShellError::Storage` if `value` cannot be encoded or saved.
pub fn save_as<T: Serialize + ?Sized>(
    store: &dyn KeyValueStore,
    key: &str,
    value: &T,
) -> Result<(), ShellError> {
    let value = serde_json::to_value(value)
        .map_err(|e| ShellError::Storage(format!("cannot encode `{key}`: {e}")))?;
    store.save(key, &value)
}

/// Loads `key` and decodes it as `T`.
///
/// # Errors
///
/// `ShellError::Storage` if the stored value cannot be read or does not
/// decode as `T`.
pub fn load_as<T: DeserializeOwned>(
    store: &dyn KeyValueStore,
    key: &str,
) -> Result<Option<T>, ShellError> {
    store
        .load(key)?
        .map(|value| {
            serde_json::from_value(value)
                .map_err(|e| ShellError::Storage(format!("cannot decode `{key}`: {e}")))
        })
        .transpose()
}
