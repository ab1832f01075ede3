//! Persistence (C10): append-only JSONL stores under `${VOLUME_MOUNT}`, plus
//! a rewrite-in-place weights file. No SQLite here — the contract calls for
//! plain append-only line files the nightly jobs and request handlers both
//! read, not a query engine (see DESIGN.md for the rationale).
//!
//! Per-path write serialization uses one `tokio::sync::Mutex` per resolved
//! path, held in a `DashMap` the same way `cache::TtlCache` holds its
//! entries — a lighter single-writer-per-file model than an OS advisory
//! lock, sufficient because every writer lives in this one process.

pub mod audit;
pub mod line_history;
pub mod predictions;
pub mod traps;
pub mod weights_store;

use crate::config::Config;
use crate::errors::EngineResult;
use dashmap::DashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

pub struct Store {
    config: Config,
    file_locks: DashMap<PathBuf, Arc<Mutex<()>>>,
}

impl Store {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            file_locks: DashMap::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn lock_for(&self, path: &Path) -> Arc<Mutex<()>> {
        self.file_locks
            .entry(path.to_path_buf())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Append one JSON-serialized line to `relative`, creating parent
    /// directories as needed. Concurrent appends to the same path are
    /// serialized; appends to different paths proceed independently.
    pub async fn append_line(&self, relative: &str, line: &str) -> EngineResult<()> {
        let path = self.config.resolve_under_mount(relative)?;
        let lock = self.lock_for(&path);
        let _guard = lock.lock().await;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| crate::errors::EngineError::Storage(e.to_string()))?;
        }

        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| crate::errors::EngineError::Storage(e.to_string()))?;

        file.write_all(line.as_bytes())
            .await
            .map_err(|e| crate::errors::EngineError::Storage(e.to_string()))?;
        file.write_all(b"\n")
            .await
            .map_err(|e| crate::errors::EngineError::Storage(e.to_string()))?;
        Ok(())
    }

    /// Read every line of `relative`, returning an empty vec if the file
    /// does not exist yet (a brand-new volume mount is not an error).
    pub async fn read_lines(&self, relative: &str) -> EngineResult<Vec<String>> {
        let path = self.config.resolve_under_mount(relative)?;
        match fs::read_to_string(&path).await {
            Ok(content) => Ok(content.lines().map(str::to_string).collect()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(crate::errors::EngineError::Storage(e.to_string())),
        }
    }

    /// Atomically overwrite `relative` with `content` (write to a temp file
    /// in the same directory, then rename) — used by the daily
    /// weights/audit rewrite jobs, never by request handlers.
    pub async fn write_whole(&self, relative: &str, content: &str) -> EngineResult<()> {
        let path = self.config.resolve_under_mount(relative)?;
        let lock = self.lock_for(&path);
        let _guard = lock.lock().await;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| crate::errors::EngineError::Storage(e.to_string()))?;
        }

        let tmp_path = path.with_extension("tmp");
        fs::write(&tmp_path, content)
            .await
            .map_err(|e| crate::errors::EngineError::Storage(e.to_string()))?;
        fs::rename(&tmp_path, &path)
            .await
            .map_err(|e| crate::errors::EngineError::Storage(e.to_string()))?;
        Ok(())
    }

    pub async fn read_whole(&self, relative: &str) -> EngineResult<Option<String>> {
        let path = self.config.resolve_under_mount(relative)?;
        match fs::read_to_string(&path).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(crate::errors::EngineError::Storage(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn test_store() -> (Store, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            port: 8080,
            volume_mount: dir.path().to_path_buf(),
            request_budget: Duration::from_secs(45),
            provider_timeout: Duration::from_secs(2),
            prefetch_pool_size: 16,
            demo_mode: false,
        };
        (Store::new(config), dir)
    }

    #[tokio::test]
    async fn append_and_read_round_trips() {
        let (store, _dir) = test_store();
        store.append_line("predictions/predictions.jsonl", "{\"a\":1}").await.unwrap();
        store.append_line("predictions/predictions.jsonl", "{\"a\":2}").await.unwrap();
        let lines = store.read_lines("predictions/predictions.jsonl").await.unwrap();
        assert_eq!(lines.len(), 2);
    }

    #[tokio::test]
    async fn read_missing_file_is_empty_not_error() {
        let (store, _dir) = test_store();
        let lines = store.read_lines("nope/missing.jsonl").await.unwrap();
        assert!(lines.is_empty());
    }

    #[tokio::test]
    async fn write_whole_is_atomic_overwrite() {
        let (store, _dir) = test_store();
        store.write_whole("grader_data/weights.json", "{\"v\":1}").await.unwrap();
        store.write_whole("grader_data/weights.json", "{\"v\":2}").await.unwrap();
        let content = store.read_whole("grader_data/weights.json").await.unwrap().unwrap();
        assert_eq!(content, "{\"v\":2}");
    }
}
