//! Persistent prompt → descriptor cache.
//!
//! The cache is one JSON object on disk, keyed by the raw prompt text. It is
//! loaded once at startup, mutated in memory, and written back in full by
//! [`PromptCache::flush`].

use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;
use tokio::fs;
use tracing::{debug, error, info};

use crate::descriptor::Descriptor;
use crate::error::CacheError;

/// What to do when the persisted cache cannot be parsed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CorruptCachePolicy {
    /// Refuse to start.
    Fail,
    /// Move the corrupt file aside and start with an empty cache.
    #[default]
    Reset,
}

/// In-memory prompt cache with a dirty flag.
#[derive(Debug, Clone)]
pub struct PromptCache {
    path: PathBuf,
    entries: IndexMap<String, Descriptor>,
    dirty: bool,
}

impl PromptCache {
    /// An empty cache that will persist to `path`.
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            entries: IndexMap::new(),
            dirty: false,
        }
    }

    /// Load the cache document at `path`. A missing file is an empty cache.
    pub async fn load(path: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let path = path.into();
        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!(
                    name: "cache.missing",
                    path = %path.display(),
                    "No cache file found, it will be created on first generation"
                );
                return Ok(Self::empty(path));
            }
            Err(source) => return Err(CacheError::Read { path, source }),
        };

        // Entries go through the same normalization as generated output, so
        // documents written by older plugins (numeric style values, the
        // `component` key) still load.
        let raw: IndexMap<String, Value> = match serde_json::from_str(&content) {
            Ok(raw) => raw,
            Err(source) => return Err(CacheError::PersistedStateCorrupt { path, source }),
        };
        let mut entries = IndexMap::with_capacity(raw.len());
        for (prompt, value) in raw {
            match Descriptor::from_value(value) {
                Ok(descriptor) => {
                    entries.insert(prompt, descriptor);
                }
                Err(source) => return Err(CacheError::InvalidEntry { path, prompt, source }),
            }
        }

        info!(
            name: "cache.loaded",
            path = %path.display(),
            entries = entries.len(),
            "Prompt cache loaded"
        );

        Ok(Self {
            path,
            entries,
            dirty: false,
        })
    }

    /// Load the cache, applying `policy` if the document is corrupt.
    pub async fn load_or_recover(
        path: impl Into<PathBuf>,
        policy: CorruptCachePolicy,
    ) -> Result<Self, CacheError> {
        let path = path.into();
        match Self::load(&path).await {
            Err(err) if err.is_corrupt() => match policy {
                CorruptCachePolicy::Fail => Err(err),
                CorruptCachePolicy::Reset => {
                    let backup = sibling(&path, ".corrupt");
                    error!(
                        name: "cache.corrupt",
                        error = %err,
                        backup = %backup.display(),
                        "Cache file is corrupt, moving it aside and starting empty"
                    );
                    fs::rename(&path, &backup)
                        .await
                        .map_err(|source| CacheError::PersistenceWrite {
                            path: backup,
                            source,
                        })?;
                    Ok(Self::empty(path))
                }
            },
            other => other,
        }
    }

    /// Exact lookup by raw prompt.
    pub fn get(&self, prompt: &str) -> Option<&Descriptor> {
        self.entries.get(prompt)
    }

    pub fn contains(&self, prompt: &str) -> bool {
        self.entries.contains_key(prompt)
    }

    /// Insert or overwrite an entry. Overwrites keep the original position.
    pub fn put(&mut self, prompt: impl Into<String>, descriptor: Descriptor) {
        self.entries.insert(prompt.into(), descriptor);
        self.dirty = true;
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Descriptor)> {
        self.entries.iter()
    }

    /// Owned copy of all entries, e.g. for a response body.
    pub fn snapshot(&self) -> IndexMap<String, Descriptor> {
        self.entries.clone()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the whole cache to disk if it changed.
    ///
    /// Writes a sibling `.tmp` file and renames it over the target. Returns
    /// whether anything was written. On failure the cache stays dirty.
    pub async fn flush(&mut self) -> Result<bool, CacheError> {
        if !self.dirty {
            return Ok(false);
        }

        let body = serde_json::to_vec_pretty(&self.entries)?;
        let write_err = |source| CacheError::PersistenceWrite {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await.map_err(write_err)?;
        }
        let tmp = sibling(&self.path, ".tmp");
        fs::write(&tmp, &body).await.map_err(write_err)?;
        fs::rename(&tmp, &self.path).await.map_err(write_err)?;

        self.dirty = false;
        debug!(
            name: "cache.flushed",
            path = %self.path.display(),
            entries = self.entries.len(),
            bytes = body.len(),
            "Prompt cache written"
        );
        Ok(true)
    }
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}
