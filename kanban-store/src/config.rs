/// Store configuration.
/// Read from ~/.config/kanban-store/config.json (or platform equivalent).
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::validate::Limits;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default = "default_file_name")]
    pub file_name: String,
    #[serde(default = "default_max_tags")]
    pub max_tags: usize,
    #[serde(default = "default_max_tag_length")]
    pub max_tag_length: usize,
    /// Bound of the save-queue channel; callers wait once it is full.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("kanban-store")
}

fn default_file_name() -> String {
    "store.json".to_string()
}

fn default_max_tags() -> usize {
    Limits::default().max_tags
}

fn default_max_tag_length() -> usize {
    Limits::default().max_tag_length
}

fn default_queue_capacity() -> usize {
    64
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            file_name: default_file_name(),
            max_tags: default_max_tags(),
            max_tag_length: default_max_tag_length(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

impl StoreConfig {
    /// Full path of the JSON document backing the file store.
    pub fn store_path(&self) -> PathBuf {
        self.data_dir.join(&self.file_name)
    }

    pub fn limits(&self) -> Limits {
        Limits {
            max_tags: self.max_tags,
            max_tag_length: self.max_tag_length,
        }
    }
}

/// Default config path: ~/.config/kanban-store/config.json
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("kanban-store")
        .join("config.json")
}

/// Load config from path. Returns default if file doesn't exist.
pub fn load_config(path: &Path) -> StoreConfig {
    match fs::read_to_string(path) {
        Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
            log::warn!(
                "[kanban.config] Failed to parse config {}: {}",
                path.display(),
                e
            );
            StoreConfig::default()
        }),
        Err(_) => {
            log::info!(
                "[kanban.config] No config at {}, using defaults",
                path.display()
            );
            StoreConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_config_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let config = load_config(&dir.path().join("absent.json"));
        assert_eq!(config, StoreConfig::default());
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"dataDir": "/tmp/boards", "maxTags": 4}"#).unwrap();

        let config = load_config(&path);
        assert_eq!(config.store_path(), PathBuf::from("/tmp/boards/store.json"));
        assert_eq!(config.limits().max_tags, 4);
        assert_eq!(config.queue_capacity, 64);
    }

    #[test]
    fn test_malformed_config_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{not json").unwrap();
        assert_eq!(load_config(&path), StoreConfig::default());
    }
}
