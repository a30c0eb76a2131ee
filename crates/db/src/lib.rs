//! Flat-file JSON collections.
//!
//! A collection is one JSON document shaped `{ "<key>": [ ... ] }`. Every read
//! parses the whole file; there is no cache. Appends hold the collection's
//! lock across read, modify and write, and swap the file in with a rename so
//! concurrent readers only ever see a complete document.

use std::io;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tokio::sync::Mutex;

/// Errors raised while reading or writing a collection file.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read {}: {source}", .path.display())]
    Read { path: PathBuf, source: io::Error },

    #[error("failed to write {}: {source}", .path.display())]
    Write { path: PathBuf, source: io::Error },

    #[error("failed to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("failed to serialize '{key}' collection: {source}")]
    Serialize {
        key: &'static str,
        source: serde_json::Error,
    },

    #[error("{} has no '{key}' array", .path.display())]
    MissingCollection { path: PathBuf, key: &'static str },
}

/// A typed view over one collection file.
pub struct JsonCollection<T> {
    path: PathBuf,
    key: &'static str,
    write_lock: Mutex<()>,
    _record: PhantomData<fn() -> T>,
}

impl<T> JsonCollection<T>
where
    T: Serialize + DeserializeOwned,
{
    pub fn new(path: impl Into<PathBuf>, key: &'static str) -> Self {
        Self {
            path: path.into(),
            key,
            write_lock: Mutex::new(()),
            _record: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn key(&self) -> &'static str {
        self.key
    }

    /// Create the file holding an empty collection if it does not exist yet.
    /// Returns `true` when a file was created.
    pub async fn ensure_exists(&self) -> Result<bool, StoreError> {
        let _guard = self.write_lock.lock().await;

        let exists = tokio::fs::try_exists(&self.path)
            .await
            .map_err(|source| StoreError::Read {
                path: self.path.clone(),
                source,
            })?;
        if exists {
            return Ok(false);
        }

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| StoreError::Write {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }

        let mut document = Map::new();
        document.insert(self.key.to_string(), Value::Array(Vec::new()));
        self.write_document(&document).await?;

        tracing::info!(path = %self.path.display(), key = self.key, "created empty collection file");
        Ok(true)
    }

    /// Read every record in the collection.
    pub async fn load(&self) -> Result<Vec<T>, StoreError> {
        let mut document = self.read_document().await?;
        self.take_records(&mut document)
    }

    /// Append the record produced by `build` and persist the collection.
    ///
    /// `build` sees the records currently on disk; no other append on this
    /// collection can interleave between that read and the write.
    pub async fn append_with<F>(&self, build: F) -> Result<T, StoreError>
    where
        F: FnOnce(&[T]) -> T,
        T: Clone,
    {
        let _guard = self.write_lock.lock().await;

        let mut document = self.read_document().await?;
        let mut records = self.take_records(&mut document)?;

        let record = build(&records);
        records.push(record.clone());

        let array = serde_json::to_value(&records).map_err(|source| StoreError::Serialize {
            key: self.key,
            source,
        })?;
        document.insert(self.key.to_string(), array);
        self.write_document(&document).await?;

        tracing::debug!(
            path = %self.path.display(),
            key = self.key,
            total = records.len(),
            "collection persisted"
        );
        Ok(record)
    }

    async fn read_document(&self) -> Result<Map<String, Value>, StoreError> {
        let bytes = tokio::fs::read(&self.path)
            .await
            .map_err(|source| StoreError::Read {
                path: self.path.clone(),
                source,
            })?;

        serde_json::from_slice(&bytes).map_err(|source| StoreError::Parse {
            path: self.path.clone(),
            source,
        })
    }

    fn take_records(&self, document: &mut Map<String, Value>) -> Result<Vec<T>, StoreError> {
        let value = match document.remove(self.key) {
            Some(value @ Value::Array(_)) => value,
            _ => {
                return Err(StoreError::MissingCollection {
                    path: self.path.clone(),
                    key: self.key,
                })
            }
        };

        serde_json::from_value(value).map_err(|source| StoreError::Parse {
            path: self.path.clone(),
            source,
        })
    }

    async fn write_document(&self, document: &Map<String, Value>) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(document).map_err(|source| StoreError::Serialize {
            key: self.key,
            source,
        })?;

        let staging = self.path.with_extension("json.tmp");
        tokio::fs::write(&staging, &bytes)
            .await
            .map_err(|source| StoreError::Write {
                path: staging.clone(),
                source,
            })?;
        if let Err(source) = tokio::fs::rename(&staging, &self.path).await {
            // best effort
            let _ = tokio::fs::remove_file(&staging).await;
            return Err(StoreError::Write {
                path: self.path.clone(),
                source,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::sync::Arc;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Note {
        id: u32,
        text: String,
    }

    fn collection(dir: &tempfile::TempDir) -> JsonCollection<Note> {
        JsonCollection::new(dir.path().join("notes.json"), "notes")
    }

    #[tokio::test]
    async fn ensure_exists_creates_empty_collection_once() {
        let dir = tempfile::tempdir().unwrap();
        let notes = JsonCollection::<Note>::new(dir.path().join("nested/notes.json"), "notes");

        assert!(notes.ensure_exists().await.unwrap());
        assert!(!notes.ensure_exists().await.unwrap());
        assert!(notes.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn load_reads_existing_records() {
        let dir = tempfile::tempdir().unwrap();
        let notes = collection(&dir);
        std::fs::write(
            notes.path(),
            r#"{"notes":[{"id":1,"text":"first"},{"id":2,"text":"second"}]}"#,
        )
        .unwrap();

        let records = notes.load().await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].text, "second");
    }

    #[tokio::test]
    async fn missing_file_is_a_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = collection(&dir).load().await.unwrap_err();
        assert!(matches!(err, StoreError::Read { .. }));
        assert!(err.to_string().contains("notes.json"));
    }

    #[tokio::test]
    async fn missing_key_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let notes = collection(&dir);
        std::fs::write(notes.path(), r#"{"other":[]}"#).unwrap();

        let err = notes.load().await.unwrap_err();
        assert!(matches!(err, StoreError::MissingCollection { key: "notes", .. }));
    }

    #[tokio::test]
    async fn malformed_json_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let notes = collection(&dir);
        std::fs::write(notes.path(), "{ not json").unwrap();

        let err = notes.load().await.unwrap_err();
        assert!(matches!(err, StoreError::Parse { .. }));
    }

    #[tokio::test]
    async fn append_persists_and_keeps_other_keys() {
        let dir = tempfile::tempdir().unwrap();
        let notes = collection(&dir);
        std::fs::write(
            notes.path(),
            r#"{"meta":{"owner":"ops"},"notes":[{"id":1,"text":"first"}]}"#,
        )
        .unwrap();

        let created = notes
            .append_with(|existing| Note {
                id: existing.len() as u32 + 1,
                text: "second".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(created.id, 2);

        let raw: Value = serde_json::from_slice(&std::fs::read(notes.path()).unwrap()).unwrap();
        assert_eq!(raw["meta"]["owner"], "ops");
        assert_eq!(raw["notes"].as_array().unwrap().len(), 2);
        assert!(!dir.path().join("notes.json.tmp").exists());
    }

    #[tokio::test]
    async fn failed_rename_removes_staging_file() {
        let dir = tempfile::tempdir().unwrap();
        let notes = collection(&dir);
        // a non-empty directory in place of the document cannot be renamed over
        std::fs::create_dir(notes.path()).unwrap();
        std::fs::write(notes.path().join("keep"), "x").unwrap();

        let err = notes.write_document(&Map::new()).await.unwrap_err();
        assert!(matches!(err, StoreError::Write { .. }));
        assert!(!dir.path().join("notes.json.tmp").exists());
    }

    #[tokio::test]
    async fn concurrent_appends_are_not_lost() {
        let dir = tempfile::tempdir().unwrap();
        let notes = Arc::new(collection(&dir));
        notes.ensure_exists().await.unwrap();

        let mut handles = Vec::new();
        for n in 0..25 {
            let notes = notes.clone();
            handles.push(tokio::spawn(async move {
                notes
                    .append_with(|existing| Note {
                        id: existing.iter().map(|note| note.id).max().unwrap_or(0) + 1,
                        text: format!("note {n}"),
                    })
                    .await
                    .unwrap()
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let mut ids: Vec<u32> = notes.load().await.unwrap().iter().map(|n| n.id).collect();
        ids.sort_unstable();
        assert_eq!(ids, (1..=25).collect::<Vec<_>>());
    }
}
