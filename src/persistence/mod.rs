//! Persistence behind an injected key/value store
//!
//! - `storage`: the [`Storage`] trait, an in-memory store and LocalStorage (wasm)
//! - `progress`: high score, best combo, session history and leaderboard

pub mod progress;
pub mod storage;

pub use progress::{
    NullSessionSink, PersonalBest, ProgressStore, RecordOutcome, SessionLog, SessionSink,
};
pub use storage::{MemoryStorage, Storage, load_json, save_json};

#[cfg(target_arch = "wasm32")]
pub use storage::LocalStorage;

/// Failures reading or writing persisted records
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("storage backend unavailable")]
    Unavailable,
    #[error("storage rejected write to `{0}`")]
    Write(String),
    #[error("stored value for `{key}` is corrupt")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to encode value for `{key}`")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}
