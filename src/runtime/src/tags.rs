//! Persistent tag index.
//!
//! Maps `repository → tag → image ID`. The index lives in a single JSON file
//! (`<root>/repositories.json`) and is rewritten atomically (write to tmp
//! file, then rename) after every mutation.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use imgstore_core::error::{Result, StoreError};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Tags of one repository.
pub type Repository = BTreeMap<String, String>;

/// Serializable wrapper for the index file.
#[derive(Debug, Default, Serialize, Deserialize)]
struct RepositoriesFile {
    #[serde(rename = "Repositories", default)]
    repositories: BTreeMap<String, Repository>,
}

/// Tag index backed by a JSON file.
#[derive(Debug)]
pub struct TagStore {
    /// Path to the JSON file.
    path: PathBuf,
    /// In-memory copy of the index; every mutation holds this lock across
    /// the file write.
    repositories: Mutex<BTreeMap<String, Repository>>,
}

impl TagStore {
    /// Open the index at `path`. A missing file is an empty index.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let repositories = if path.exists() {
            let data = std::fs::read_to_string(&path).map_err(|e| StoreError::file(&path, e))?;
            let file: RepositoriesFile = serde_json::from_str(&data).map_err(|e| {
                StoreError::SerializationError(format!(
                    "Failed to parse tag index {}: {}",
                    path.display(),
                    e
                ))
            })?;
            file.repositories
        } else {
            BTreeMap::new()
        };

        Ok(Self {
            path,
            repositories: Mutex::new(repositories),
        })
    }

    /// Path to the JSON file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Image ID bound to `repo:tag`, if any.
    pub fn get(&self, repo: &str, tag: &str) -> Option<String> {
        self.repositories
            .lock()
            .get(repo)
            .and_then(|tags| tags.get(tag))
            .cloned()
    }

    /// Bind `repo:tag` to `id`.
    ///
    /// Returns the ID previously bound to the tag when it differed. Rebinding
    /// a tag to another image without `force` fails with `TagConflict`.
    pub fn set(&self, repo: &str, tag: &str, id: &str, force: bool) -> Result<Option<String>> {
        let mut repositories = self.repositories.lock();

        let previous = repositories.get(repo).and_then(|tags| tags.get(tag)).cloned();
        match previous {
            Some(ref old) if old == id => return Ok(None),
            Some(ref old) if !force => {
                return Err(StoreError::TagConflict {
                    reference: format!("{}:{}", repo, tag),
                    id: old.clone(),
                })
            }
            _ => {}
        }

        repositories
            .entry(repo.to_string())
            .or_default()
            .insert(tag.to_string(), id.to_string());

        if let Err(e) = self.save(&repositories) {
            // Keep memory in step with disk.
            match previous {
                Some(ref old) => {
                    repositories
                        .entry(repo.to_string())
                        .or_default()
                        .insert(tag.to_string(), old.clone());
                }
                None => {
                    if let Some(tags) = repositories.get_mut(repo) {
                        tags.remove(tag);
                        if tags.is_empty() {
                            repositories.remove(repo);
                        }
                    }
                }
            }
            return Err(e);
        }

        tracing::debug!(repo, tag, id, replaced = ?previous, "Bound tag");
        Ok(previous)
    }

    /// All `repo:tag` references bound to `id`, sorted.
    pub fn references(&self, id: &str) -> Vec<String> {
        let repositories = self.repositories.lock();
        let mut refs = Vec::new();
        for (repo, tags) in repositories.iter() {
            for (tag, bound) in tags {
                if bound == id {
                    refs.push(format!("{}:{}", repo, tag));
                }
            }
        }
        refs
    }

    /// Snapshot of the whole index.
    pub fn repositories(&self) -> BTreeMap<String, Repository> {
        self.repositories.lock().clone()
    }

    fn save(&self, repositories: &BTreeMap<String, Repository>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::file(parent, e))?;
        }

        let file = RepositoriesFile {
            repositories: repositories.clone(),
        };
        let json = serde_json::to_string_pretty(&file)?;

        let tmp_path = self.path.with_extension("json.tmp");
        std::fs::write(&tmp_path, &json).map_err(|e| StoreError::file(&tmp_path, e))?;
        std::fs::rename(&tmp_path, &self.path).map_err(|e| StoreError::file(&self.path, e))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store() -> (tempfile::TempDir, TagStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = TagStore::open(dir.path().join("repositories.json")).unwrap();
        (dir, store)
    }

    #[test]
    fn test_open_empty() {
        let (_dir, store) = temp_store();
        assert!(store.repositories().is_empty());
        assert_eq!(store.get("lib", "v1"), None);
    }

    #[test]
    fn test_set_and_get() {
        let (_dir, store) = temp_store();
        assert_eq!(store.set("lib", "v1", "aaa", false).unwrap(), None);
        assert_eq!(store.get("lib", "v1"), Some("aaa".to_string()));
    }

    #[test]
    fn test_set_persists() {
        let (dir, store) = temp_store();
        store.set("lib", "v1", "aaa", false).unwrap();
        store.set("app", "latest", "bbb", false).unwrap();
        drop(store);

        let reopened = TagStore::open(dir.path().join("repositories.json")).unwrap();
        assert_eq!(reopened.get("lib", "v1"), Some("aaa".to_string()));
        assert_eq!(reopened.get("app", "latest"), Some("bbb".to_string()));
    }

    #[test]
    fn test_file_format() {
        let (_dir, store) = temp_store();
        store.set("lib", "v1", "aaa", false).unwrap();

        let data = std::fs::read_to_string(store.path()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&data).unwrap();
        assert_eq!(value["Repositories"]["lib"]["v1"], "aaa");
    }

    #[test]
    fn test_conflict_without_force() {
        let (_dir, store) = temp_store();
        store.set("lib", "v1", "aaa", false).unwrap();

        let err = store.set("lib", "v1", "bbb", false).unwrap_err();
        assert!(matches!(err, StoreError::TagConflict { ref id, .. } if id == "aaa"));
        assert_eq!(store.get("lib", "v1"), Some("aaa".to_string()));
    }

    #[test]
    fn test_force_replaces_and_reports_old() {
        let (_dir, store) = temp_store();
        store.set("lib", "v1", "aaa", false).unwrap();

        let replaced = store.set("lib", "v1", "bbb", true).unwrap();
        assert_eq!(replaced, Some("aaa".to_string()));
        assert_eq!(store.get("lib", "v1"), Some("bbb".to_string()));
    }

    #[test]
    fn test_rebind_same_id_is_noop() {
        let (_dir, store) = temp_store();
        store.set("lib", "v1", "aaa", false).unwrap();
        assert_eq!(store.set("lib", "v1", "aaa", false).unwrap(), None);
    }

    #[test]
    fn test_references() {
        let (_dir, store) = temp_store();
        store.set("lib", "v1", "aaa", false).unwrap();
        store.set("lib", "latest", "aaa", false).unwrap();
        store.set("app", "v1", "bbb", false).unwrap();

        assert_eq!(store.references("aaa"), vec!["lib:latest", "lib:v1"]);
        assert!(store.references("ccc").is_empty());
    }

    #[test]
    fn test_atomic_write() {
        let (_dir, store) = temp_store();
        store.set("lib", "v1", "aaa", false).unwrap();

        assert!(store.path().exists());
        assert!(!store.path().with_extension("json.tmp").exists());
    }

    #[test]
    fn test_open_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("repositories.json");
        std::fs::write(&path, "not json").unwrap();

        assert!(matches!(
            TagStore::open(&path).unwrap_err(),
            StoreError::SerializationError(_)
        ));
    }
}
