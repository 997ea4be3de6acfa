//! HTTP route handlers

pub mod api;
pub mod subtitles;
pub mod thumbnails;
pub mod video;

pub use api::*;
pub use subtitles::*;
pub use thumbnails::*;
pub use video::*;

use crate::{ApiError, AppState};
use serde::Deserialize;
use std::path::PathBuf;
use vidshelf_db::{CatalogStore, MediaItem};

/// `?path=` query used by the file-serving routes
#[derive(Debug, Deserialize)]
pub struct PathQuery {
    #[serde(default)]
    pub path: Option<String>,
}

impl PathQuery {
    /// The requested path if it is non-empty and exists
    pub(crate) fn existing(&self) -> Option<PathBuf> {
        self.path
            .as_deref()
            .filter(|p| !p.is_empty())
            .map(PathBuf::from)
            .filter(|p| p.exists())
    }
}

/// Catalog record at `index`, or 404
pub(crate) fn load_item(state: &AppState, index: usize) -> Result<MediaItem, ApiError> {
    state
        .catalog
        .get_by_index(index)?
        .ok_or_else(|| ApiError::NotFound(format!("video index {} not found", index)))
}

/// Catalog record at `index` together with its video file, or 404 if either is missing
pub(crate) fn load_item_with_file(
    state: &AppState,
    index: usize,
) -> Result<(MediaItem, PathBuf), ApiError> {
    let item = load_item(state, index)?;
    let path = PathBuf::from(&item.path);
    if !path.exists() {
        return Err(ApiError::NotFound(format!("video file not found: {}", item.path)));
    }
    Ok((item, path))
}
