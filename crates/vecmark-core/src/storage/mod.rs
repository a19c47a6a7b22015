//! Project persistence backends.

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("project `{0}` not found")]
    NotFound(String),
    #[error("invalid project name `{0}`")]
    InvalidName(String),
    #[error("i/o failure: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization failure: {0}")]
    Json(#[from] serde_json::Error),
}

/// Storage for serialized project files, keyed by project name.
pub trait ProjectStore {
    fn save(&mut self, name: &str, project: &Value) -> Result<(), StoreError>;
    fn load(&self, name: &str) -> Result<Value, StoreError>;
    fn delete(&mut self, name: &str) -> Result<(), StoreError>;
    fn exists(&self, name: &str) -> bool;
    fn list(&self) -> Result<Vec<String>, StoreError>;
}
