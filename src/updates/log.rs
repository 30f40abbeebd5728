//! Recent-updates log
//!
//! Keeps the last few updates posted to the wall so that a viewer joining late
//! sees them immediately. Entries live in memory; when a path is configured
//! the list is loaded from and persisted to a JSON array file.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::Deserialize;
use tokio::sync::Mutex as AsyncMutex;
use serde_json::Value;

use crate::error::Result;

/// Update log configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UpdatesConfig {
    /// JSON file backing the log (None = memory only)
    pub path: Option<PathBuf>,

    /// Maximum entries kept for replay
    pub max_entries: usize,
}

impl Default for UpdatesConfig {
    fn default() -> Self {
        Self {
            path: None,
            max_entries: 50,
        }
    }
}

/// Bounded log of recent updates
#[derive(Debug)]
pub struct UpdateLog {
    entries: Mutex<VecDeque<Value>>,
    max_entries: usize,
    path: Option<PathBuf>,
    /// Held from snapshot to rename so appends persist one at a time
    writer: AsyncMutex<()>,
}

impl UpdateLog {
    /// Create an empty, memory-only log
    pub fn in_memory(max_entries: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::new()),
            max_entries: max_entries.max(1),
            path: None,
            writer: AsyncMutex::new(()),
        }
    }

    /// Open the log described by `config`
    ///
    /// A missing file starts an empty log. A file that is not a JSON array is
    /// logged and ignored rather than failing startup.
    pub fn open(config: &UpdatesConfig) -> Result<Self> {
        let mut log = Self::in_memory(config.max_entries);

        if let Some(ref path) = config.path {
            log.path = Some(path.clone());
            for entry in load_entries(path)? {
                log.push(entry);
            }

            tracing::info!(
                path = %path.display(),
                entries = log.len(),
                "Update log loaded"
            );
        }

        Ok(log)
    }

    fn push(&self, update: Value) {
        let mut entries = self.entries.lock();
        while entries.len() >= self.max_entries {
            entries.pop_front();
        }
        entries.push_back(update);
    }

    /// Snapshot of the recent updates, oldest first
    pub fn recent(&self) -> Vec<Value> {
        self.entries.lock().iter().cloned().collect()
    }

    /// Append an update, persisting the log if it is file-backed
    pub async fn append(&self, update: Value) -> Result<()> {
        self.append_with(update, |record| record()).await
    }

    /// Append an update and make it visible from inside `commit`
    ///
    /// The file is written first. Only if that succeeds is `commit` called,
    /// with a callback that adds the entry to memory; whatever `commit`
    /// locks around that call decides who sees the entry in [`recent`].
    /// On a write error memory is left untouched.
    ///
    /// [`recent`]: UpdateLog::recent
    pub async fn append_with<R, F>(&self, update: Value, commit: F) -> Result<R>
    where
        F: FnOnce(&mut dyn FnMut()) -> R,
    {
        let _writer = self.writer.lock().await;

        if let Some(ref path) = self.path {
            let mut entries = self.recent();
            entries.push(update.clone());
            let skip = entries.len().saturating_sub(self.max_entries);

            let json = serde_json::to_vec_pretty(&entries[skip..])?;
            let tmp = path.with_extension("json.tmp");
            tokio::fs::write(&tmp, json).await?;
            tokio::fs::rename(&tmp, path).await?;
        }

        let mut pending = Some(update);
        let mut record = || {
            if let Some(update) = pending.take() {
                self.push(update);
            }
        };

        Ok(commit(&mut record))
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether the log is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Backing file, if any
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

fn load_entries(path: &Path) -> Result<Vec<Value>> {
    let data = match std::fs::read_to_string(path) {
        Ok(data) => data,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    match serde_json::from_str::<Vec<Value>>(&data) {
        Ok(entries) => Ok(entries),
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "Update log is not a JSON array, starting empty"
            );
            Ok(Vec::new())
        }
    }
}
