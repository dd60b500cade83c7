pub mod memory;
pub mod sqlite;

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

/// Narrow synchronous key-value contract. Backends swallow their own
/// failures; callers of the typed [`Storage`] handle never observe a
/// storage error, only best-effort defaults.
pub trait KeyValueStore: Send + Sync {
    fn get_raw(&self, key: &str) -> Option<String>;
    fn set_raw(&self, key: &str, value: &str);
    fn remove(&self, key: &str);
}

#[derive(Clone)]
pub struct Storage {
    backend: Arc<dyn KeyValueStore>,
}

impl Storage {
    pub fn new(backend: Arc<dyn KeyValueStore>) -> Self {
        Self { backend }
    }

    pub fn get_item<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        let Some(raw) = self.backend.get_raw(key) else {
            return default;
        };
        match serde_json::from_str::<T>(&raw) {
            Ok(value) => value,
            Err(error) => {
                tracing::warn!(key, error = %error, "discarding unreadable stored value");
                default
            }
        }
    }

    /// Like [`Storage::get_item`] but preserves the absent/present
    /// distinction. Unreadable payloads read as absent.
    pub fn get_optional<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.backend.get_raw(key)?;
        match serde_json::from_str::<T>(&raw) {
            Ok(value) => Some(value),
            Err(error) => {
                tracing::warn!(key, error = %error, "discarding unreadable stored value");
                None
            }
        }
    }

    pub fn set_item<T: Serialize>(&self, key: &str, value: &T) {
        match serde_json::to_string(value) {
            Ok(raw) => self.backend.set_raw(key, &raw),
            Err(error) => {
                tracing::warn!(key, error = %error, "failed to serialize value for storage");
            }
        }
    }

    pub fn remove_item(&self, key: &str) {
        self.backend.remove(key);
    }
}
