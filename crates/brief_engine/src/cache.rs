use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use brief_core::{BriefMeta, ItemId};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::CacheError;

const CACHE_FILENAME: &str = "briefs_cache.json";

/// Fire-and-forget persistence of terminal success state.
pub trait CacheStore: Send + Sync {
    fn persist_generated(&self, item_id: &ItemId, brief: &BriefMeta) -> Result<(), CacheError>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedBrief {
    pub status: String,
    pub brief: BriefMeta,
    pub updated_at: String,
}

/// Ensure cache directory exists; create if missing.
pub fn ensure_cache_dir(dir: &Path) -> Result<(), CacheError> {
    if dir.exists() {
        let meta = fs::metadata(dir).map_err(|e| CacheError::CacheDir(e.to_string()))?;
        if !meta.is_dir() {
            return Err(CacheError::CacheDir("path is not a directory".into()));
        }
    } else {
        fs::create_dir_all(dir).map_err(|e| CacheError::CacheDir(e.to_string()))?;
    }
    Ok(())
}

/// Atomically write content to `{dir}/{filename}` by writing a temp file then renaming.
#[derive(Debug, Clone)]
pub struct AtomicFileWriter {
    dir: PathBuf,
}

impl AtomicFileWriter {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn write(&self, filename: &str, content: &str) -> Result<PathBuf, CacheError> {
        ensure_cache_dir(&self.dir)?;

        let target = self.dir.join(filename);
        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(content.as_bytes())?;
        tmp.flush()?;
        tmp.as_file_mut().sync_all()?;
        tmp.persist(&target).map_err(|e| CacheError::Io(e.error))?;
        Ok(target)
    }
}

/// JSON file of generated briefs keyed by item id.
#[derive(Debug)]
pub struct FileCacheStore {
    writer: AtomicFileWriter,
    entries: Mutex<BTreeMap<ItemId, CachedBrief>>,
}

impl FileCacheStore {
    /// Opens the cache in `dir`, loading any previous content.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let dir = dir.into();
        ensure_cache_dir(&dir)?;
        let path = dir.join(CACHE_FILENAME);
        let entries = match fs::read_to_string(&path) {
            Ok(text) => serde_json::from_str(&text)?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(err) => return Err(err.into()),
        };
        Ok(Self {
            writer: AtomicFileWriter::new(dir),
            entries: Mutex::new(entries),
        })
    }

    pub fn path(&self) -> PathBuf {
        self.writer.dir().join(CACHE_FILENAME)
    }

    pub fn get(&self, item_id: impl Into<ItemId>) -> Option<CachedBrief> {
        let item_id = item_id.into();
        self.lock_entries().get(&item_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock_entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock_entries(&self) -> std::sync::MutexGuard<'_, BTreeMap<ItemId, CachedBrief>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl CacheStore for FileCacheStore {
    fn persist_generated(&self, item_id: &ItemId, brief: &BriefMeta) -> Result<(), CacheError> {
        let mut entries = self.lock_entries();
        entries.insert(
            item_id.clone(),
            CachedBrief {
                status: "generated".to_string(),
                brief: brief.clone(),
                updated_at: chrono::Utc::now().to_rfc3339(),
            },
        );
        let content = serde_json::to_string_pretty(&*entries)?;
        self.writer.write(CACHE_FILENAME, &content)?;
        Ok(())
    }
}
