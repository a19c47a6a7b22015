//! Filesystem store: one pretty-printed JSON file per project.

use super::{ProjectStore, StoreError};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Store under the platform's local data directory.
    pub fn default_location() -> Self {
        let base = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
        Self::new(base.join("vecmark").join("projects"))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, name: &str) -> Result<PathBuf, StoreError> {
        if name.is_empty()
            || !name
                .chars()
                .all(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | ' ' | '.'))
            || name.starts_with('.')
        {
            return Err(StoreError::InvalidName(name.to_string()));
        }
        Ok(self.dir.join(format!("{name}.json")))
    }
}

impl ProjectStore for FileStore {
    fn save(&mut self, name: &str, project: &Value) -> Result<(), StoreError> {
        let path = self.path_for(name)?;
        fs::create_dir_all(&self.dir)?;
        let bytes = serde_json::to_vec_pretty(project)?;
        fs::write(&path, bytes)?;
        log::debug!("saved project `{name}` to {}", path.display());
        Ok(())
    }

    fn load(&self, name: &str) -> Result<Value, StoreError> {
        let path = self.path_for(name)?;
        if !path.is_file() {
            return Err(StoreError::NotFound(name.to_string()));
        }
        let bytes = fs::read(&path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    fn delete(&mut self, name: &str) -> Result<(), StoreError> {
        let path = self.path_for(name)?;
        if !path.is_file() {
            return Err(StoreError::NotFound(name.to_string()));
        }
        fs::remove_file(path)?;
        Ok(())
    }

    fn exists(&self, name: &str) -> bool {
        match self.path_for(name) {
            Ok(path) => path.is_file(),
            Err(_) => false,
        }
    }

    fn list(&self) -> Result<Vec<String>, StoreError> {
        if !self.dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) == Some("json") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    names.push(stem.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileStore::new(dir.path());
        let project = json!({"version": 2, "elements": []});
        store.save("notes", &project).unwrap();
        assert!(store.exists("notes"));
        assert_eq!(store.load("notes").unwrap(), project);
    }

    #[test]
    fn test_list_and_delete() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileStore::new(dir.path());
        store.save("beta", &json!({})).unwrap();
        store.save("alpha", &json!({})).unwrap();
        assert_eq!(store.list().unwrap(), vec!["alpha", "beta"]);
        store.delete("beta").unwrap();
        assert_eq!(store.list().unwrap(), vec!["alpha"]);
        assert!(matches!(
            store.delete("beta"),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn test_path_traversal_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileStore::new(dir.path());
        assert!(matches!(
            store.save("../escape", &json!({})),
            Err(StoreError::InvalidName(_))
        ));
        assert!(matches!(
            store.save("a/b", &json!({})),
            Err(StoreError::InvalidName(_))
        ));
    }

    #[test]
    fn test_list_on_missing_dir_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("nested"));
        assert!(store.list().unwrap().is_empty());
    }
}
