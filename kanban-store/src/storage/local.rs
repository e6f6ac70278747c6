/// Local filesystem storage backend.
///
/// All slots live in one JSON document on disk:
/// - Atomic writes (write to .tmp, fsync, rename, fsync directory)
/// - SHA-256 hash of the last written document for out-of-band edit detection
/// - Mutex-guarded writes so a read-modify-write of the document never interleaves
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use super::{KvStore, StorageError};

pub struct FileKv {
    path: PathBuf,
    /// Guards the document during writes; holds the hash of our last write.
    last_written: Mutex<Option<String>>,
}

impl FileKv {
    /// Open (or lazily create) the document at `path`. The parent directory
    /// is created if missing; the file itself is written on first `set_many`.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let last_written = match fs::read_to_string(&path) {
            Ok(content) => Some(Self::content_hash(&content)),
            Err(_) => None,
        };
        Ok(Self {
            path,
            last_written: Mutex::new(last_written),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Compute SHA-256 hash of content (for change detection).
    fn content_hash(content: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(content.replace("\r\n", "\n").as_bytes());
        hex::encode(hasher.finalize())
    }

    /// True when the file on disk no longer matches what this instance last
    /// read or wrote, i.e. something else edited it.
    pub fn is_externally_modified(&self) -> bool {
        let last = self.last_written.lock().unwrap_or_else(|e| e.into_inner());
        let current = fs::read_to_string(&self.path)
            .ok()
            .map(|c| Self::content_hash(&c));
        *last != current
    }

    fn read_document(&self) -> Result<Map<String, Value>, StorageError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => return Err(e.into()),
        };
        if content.trim().is_empty() {
            return Ok(Map::new());
        }
        match serde_json::from_str(&content)? {
            Value::Object(map) => Ok(map),
            other => Err(StorageError::Corrupt(format!(
                "{} holds a JSON {} instead of an object",
                self.path.display(),
                json_kind(&other)
            ))),
        }
    }

    /// Atomic write with fsync: write to .tmp, fsync, rename, fsync directory.
    fn atomic_write(path: &Path, content: &str) -> Result<(), std::io::Error> {
        let tmp_path = path.with_extension("kanban-store.tmp");
        let mut file = fs::File::create(&tmp_path)?;
        file.write_all(content.as_bytes())?;
        file.sync_all()?;
        fs::rename(&tmp_path, path)?;

        // fsync directory for rename durability
        if let Some(dir) = path.parent() {
            if let Ok(d) = fs::File::open(dir) {
                let _ = d.sync_all();
            }
        }
        Ok(())
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

impl KvStore for FileKv {
    fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        let mut document = self.read_document()?;
        Ok(document.remove(key))
    }

    fn set_many(&self, entries: &[(&str, Value)]) -> Result<(), StorageError> {
        let mut last = self.last_written.lock().unwrap_or_else(|e| e.into_inner());

        let mut document = self.read_document()?;
        for (key, value) in entries {
            document.insert((*key).to_string(), value.clone());
        }
        let content = serde_json::to_string_pretty(&Value::Object(document))?;

        Self::atomic_write(&self.path, &content)?;
        *last = Some(Self::content_hash(&content));
        log::debug!(
            "[kanban.storage.local] Wrote {} slot(s) to {:?}",
            entries.len(),
            self.path
        );
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        Ok(self.read_document()?.keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_reads_empty() {
        let dir = TempDir::new().unwrap();
        let kv = FileKv::open(dir.path().join("store.json")).unwrap();
        assert!(kv.get("boards").unwrap().is_none());
        assert!(kv.keys().unwrap().is_empty());
    }

    #[test]
    fn test_set_many_persists_across_instances() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("store.json");
        let kv = FileKv::open(&path).unwrap();
        kv.set_many(&[("boards", json!([])), ("version", json!("2.0.0"))])
            .unwrap();

        let reopened = FileKv::open(&path).unwrap();
        assert_eq!(reopened.get("version").unwrap(), Some(json!("2.0.0")));
        assert_eq!(reopened.get("boards").unwrap(), Some(json!([])));
        assert!(!path.with_extension("kanban-store.tmp").exists());
    }

    #[test]
    fn test_set_keeps_other_slots() {
        let dir = TempDir::new().unwrap();
        let kv = FileKv::open(dir.path().join("store.json")).unwrap();
        kv.set("cards", json!([1])).unwrap();
        kv.set("version", json!("2.0.0")).unwrap();
        assert_eq!(kv.get("cards").unwrap(), Some(json!([1])));
    }

    #[test]
    fn test_non_object_document_is_corrupt() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.json");
        fs::write(&path, "[1, 2]").unwrap();
        let kv = FileKv::open(&path).unwrap();
        assert!(matches!(kv.get("boards"), Err(StorageError::Corrupt(_))));
    }

    #[test]
    fn test_external_modification_detected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.json");
        let kv = FileKv::open(&path).unwrap();
        kv.set("version", json!("2.0.0")).unwrap();
        assert!(!kv.is_externally_modified());

        fs::write(&path, r#"{"version": "1.0.0"}"#).unwrap();
        assert!(kv.is_externally_modified());
    }
}
