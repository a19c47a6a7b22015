//! In-memory store, for tests and embedding hosts without a filesystem.

use super::{ProjectStore, StoreError};
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct MemoryStore {
    projects: HashMap<String, Value>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProjectStore for MemoryStore {
    fn save(&mut self, name: &str, project: &Value) -> Result<(), StoreError> {
        if name.is_empty() {
            return Err(StoreError::InvalidName(name.to_string()));
        }
        self.projects.insert(name.to_string(), project.clone());
        Ok(())
    }

    fn load(&self, name: &str) -> Result<Value, StoreError> {
        self.projects
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(name.to_string()))
    }

    fn delete(&mut self, name: &str) -> Result<(), StoreError> {
        self.projects
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(name.to_string()))
    }

    fn exists(&self, name: &str) -> bool {
        self.projects.contains_key(name)
    }

    fn list(&self) -> Result<Vec<String>, StoreError> {
        let mut names: Vec<String> = self.projects.keys().cloned().collect();
        names.sort();
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_save_load_delete() {
        let mut store = MemoryStore::new();
        store.save("sketch", &json!({"version": 2})).unwrap();
        assert!(store.exists("sketch"));
        assert_eq!(store.load("sketch").unwrap(), json!({"version": 2}));
        store.delete("sketch").unwrap();
        assert!(!store.exists("sketch"));
        assert!(matches!(
            store.load("sketch"),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn test_list_is_sorted() {
        let mut store = MemoryStore::new();
        store.save("b", &json!({})).unwrap();
        store.save("a", &json!({})).unwrap();
        assert_eq!(store.list().unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn test_empty_name_rejected() {
        let mut store = MemoryStore::new();
        assert!(matches!(
            store.save("", &json!({})),
            Err(StoreError::InvalidName(_))
        ));
    }
}
