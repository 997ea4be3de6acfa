//! vidshelf-db - Catalog storage for vidshelf
//!
//! The catalog is a flat JSON list of media records kept in a single file.
//! Every read-modify-write cycle runs under one mutex and every write
//! replaces the file through a sibling temp file.

mod error;
mod queries;
mod schema;

pub use error::{CatalogError, Result};
pub use queries::*;
pub use schema::*;

use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info};

/// Repository interface consumed by the thumbnail pipeline
pub trait CatalogStore: Send + Sync {
    /// Load every record
    fn load_all(&self) -> Result<Vec<MediaItem>>;

    /// Replace the whole catalog
    fn save_all(&self, items: &[MediaItem]) -> Result<()>;

    /// Fetch one record by position
    fn get_by_index(&self, index: usize) -> Result<Option<MediaItem>>;

    /// Mutate one record in place and persist. Returns false when `index`
    /// is out of range.
    fn update_by_index(
        &self,
        index: usize,
        update: &mut dyn FnMut(&mut MediaItem),
    ) -> Result<bool>;
}

/// JSON-file backed catalog
pub struct Catalog {
    path: PathBuf,
    lock: Mutex<()>,
}

impl Catalog {
    /// Open the catalog at `path`. The file is created lazily on first write.
    pub fn open(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        info!("using catalog at {:?}", path);
        Self {
            path,
            lock: Mutex::new(()),
        }
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run one read-modify-write cycle under the catalog lock.
    ///
    /// The catalog is written back only when `f` returns `Ok`.
    pub fn modify<T, E>(
        &self,
        f: impl FnOnce(&mut Vec<MediaItem>) -> std::result::Result<T, E>,
    ) -> std::result::Result<T, E>
    where
        E: From<CatalogError>,
    {
        let _guard = self.lock.lock().map_err(|_| CatalogError::LockPoisoned)?;
        let mut items = read_items(&self.path)?;
        let value = f(&mut items)?;
        write_items(&self.path, &items)?;
        Ok(value)
    }

    fn read_locked(&self) -> Result<Vec<MediaItem>> {
        let _guard = self.lock.lock().map_err(|_| CatalogError::LockPoisoned)?;
        read_items(&self.path)
    }
}

impl CatalogStore for Catalog {
    fn load_all(&self) -> Result<Vec<MediaItem>> {
        self.read_locked()
    }

    fn save_all(&self, items: &[MediaItem]) -> Result<()> {
        let _guard = self.lock.lock().map_err(|_| CatalogError::LockPoisoned)?;
        write_items(&self.path, items)
    }

    fn get_by_index(&self, index: usize) -> Result<Option<MediaItem>> {
        Ok(self.read_locked()?.into_iter().nth(index))
    }

    fn update_by_index(
        &self,
        index: usize,
        update: &mut dyn FnMut(&mut MediaItem),
    ) -> Result<bool> {
        self.modify(|items| match items.get_mut(index) {
            Some(item) => {
                update(item);
                Ok(true)
            }
            None => Ok(false),
        })
    }
}

fn read_items(path: &Path) -> Result<Vec<MediaItem>> {
    if !path.exists() {
        debug!("catalog {:?} does not exist yet, starting empty", path);
        return Ok(Vec::new());
    }
    let content = fs::read_to_string(path)?;
    if content.trim().is_empty() {
        return Ok(Vec::new());
    }
    Ok(serde_json::from_str(&content)?)
}

fn write_items(path: &Path, items: &[MediaItem]) -> Result<()> {
    write_json_atomic(path, &items)?;
    debug!("wrote {} catalog records to {:?}", items.len(), path);
    Ok(())
}

/// Pretty-print `value` with a four-space indent into a sibling temp file,
/// then rename it over `path`.
fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut ser)?;

    let tmp_path = path.with_extension("json.tmp");
    {
        let mut file = fs::File::create(&tmp_path)?;
        file.write_all(&buf)?;
        file.sync_all()?;
    }
    fs::rename(&tmp_path, path)?;
    Ok(())
}

/// The folder most recently submitted for scanning
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LastPath {
    #[serde(default)]
    pub path: String,
}

/// Small JSON file remembering the last scanned folder
pub struct LastPathStore {
    path: PathBuf,
}

impl LastPathStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Read the stored folder; a missing file reads as an empty path
    pub fn load(&self) -> Result<LastPath> {
        if !self.path.exists() {
            return Ok(LastPath::default());
        }
        let content = fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn save(&self, last: &LastPath) -> Result<()> {
        write_json_atomic(&self.path, last)
    }
}
