//! Key/value storage backends

use std::collections::HashMap;

use serde::Serialize;
use serde::de::DeserializeOwned;

use super::PersistenceError;

/// String key/value store (LocalStorage shaped)
pub trait Storage {
    fn get(&self, key: &str) -> Result<Option<String>, PersistenceError>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), PersistenceError>;
    fn remove(&mut self, key: &str) -> Result<(), PersistenceError>;
}

/// Read and decode a JSON value; `Ok(None)` when the key is absent
pub fn load_json<T: DeserializeOwned>(
    storage: &dyn Storage,
    key: &str,
) -> Result<Option<T>, PersistenceError> {
    let Some(json) = storage.get(key)? else {
        return Ok(None);
    };
    serde_json::from_str(&json)
        .map(Some)
        .map_err(|source| PersistenceError::Corrupt {
            key: key.to_string(),
            source,
        })
}

pub fn save_json<T: Serialize + ?Sized>(
    storage: &mut dyn Storage,
    key: &str,
    value: &T,
) -> Result<(), PersistenceError> {
    let json = serde_json::to_string(value).map_err(|source| PersistenceError::Encode {
        key: key.to_string(),
        source,
    })?;
    storage.set(key, &json)
}

/// Process-local store (native builds and tests)
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    entries: HashMap<String, String>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), PersistenceError> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), PersistenceError> {
        self.entries.remove(key);
        Ok(())
    }
}

#[cfg(target_arch = "wasm32")]
pub use web::LocalStorage;

#[cfg(target_arch = "wasm32")]
mod web {
    use super::{PersistenceError, Storage};

    /// Browser LocalStorage
    pub struct LocalStorage {
        inner: web_sys::Storage,
    }

    impl LocalStorage {
        pub fn open() -> Result<Self, PersistenceError> {
            let inner = web_sys::window()
                .and_then(|w| w.local_storage().ok())
                .flatten()
                .ok_or(PersistenceError::Unavailable)?;
            Ok(Self { inner })
        }
    }

    impl Storage for LocalStorage {
        fn get(&self, key: &str) -> Result<Option<String>, PersistenceError> {
            self.inner
                .get_item(key)
                .map_err(|_| PersistenceError::Unavailable)
        }

        fn set(&mut self, key: &str, value: &str) -> Result<(), PersistenceError> {
            self.inner
                .set_item(key, value)
                .map_err(|_| PersistenceError::Write(key.to_string()))
        }

        fn remove(&mut self, key: &str) -> Result<(), PersistenceError> {
            self.inner
                .remove_item(key)
                .map_err(|_| PersistenceError::Write(key.to_string()))
        }
    }
}
