//! Catalog handlers: listing, editing, tags, scanning

use crate::{ApiError, AppState};
use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::path::PathBuf;
use tracing::info;
use vidshelf_db::{self as db, CatalogError, CatalogStore, LastPath, MediaItem};
use vidshelf_processing::scanner;

/// Body for `PUT /api/videos/:index`
#[derive(Debug, Deserialize)]
pub struct UpdateVideoRequest {
    #[serde(default)]
    pub filename: Option<String>,
    /// Comma separated string or list of strings
    #[serde(default)]
    pub tag: Option<Value>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ScanRequest {
    #[serde(default)]
    pub path: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ScanResponse {
    /// Paths of the records added by this scan
    pub added: Vec<String>,
    /// Catalog size after the scan
    pub total: usize,
}

/// GET /api/videos
pub async fn get_videos(State(state): State<AppState>) -> Result<Json<Vec<MediaItem>>, ApiError> {
    Ok(Json(state.catalog.load_all()?))
}

/// PUT /api/videos/:index
pub async fn update_video(
    State(state): State<AppState>,
    Path(index): Path<usize>,
    Json(request): Json<UpdateVideoRequest>,
) -> Result<Json<Value>, ApiError> {
    let mut update = |item: &mut MediaItem| {
        if let Some(filename) = &request.filename {
            item.filename = filename.clone();
        }
        if let Some(tag) = &request.tag {
            item.tags = db::normalize_tags(tag);
        }
        if let Some(description) = &request.description {
            item.description = description.clone();
        }
    };

    if !state.catalog.update_by_index(index, &mut update)? {
        return Err(ApiError::NotFound(format!("video index {} not found", index)));
    }

    info!("updated video {}", index);
    Ok(Json(json!({ "status": "success" })))
}

/// GET /api/tags
pub async fn get_tags(State(state): State<AppState>) -> Result<Json<Vec<String>>, ApiError> {
    let items = state.catalog.load_all()?;
    Ok(Json(db::all_tags(&items)))
}

/// GET /api/tags/stats
pub async fn get_tag_stats(
    State(state): State<AppState>,
) -> Result<Json<Vec<(String, usize)>>, ApiError> {
    let items = state.catalog.load_all()?;
    Ok(Json(db::tag_stats(&items)))
}

/// POST /api/scan
///
/// Drops records whose file is gone, then appends every new video found
/// under the requested folder.
pub async fn scan_videos(
    State(state): State<AppState>,
    Json(request): Json<ScanRequest>,
) -> Result<Json<ScanResponse>, ApiError> {
    let root = request
        .path
        .filter(|p| !p.trim().is_empty())
        .map(PathBuf::from)
        .filter(|p| p.is_dir())
        .ok_or_else(|| ApiError::BadRequest("please provide a valid folder path".to_string()))?;

    let known: HashSet<String> = state
        .catalog
        .load_all()?
        .into_iter()
        .map(|item| item.path)
        .collect();

    let extractor = state.extractor.clone();
    let result = tokio::task::spawn_blocking(move || {
        scanner::scan_new_videos(&root, &known, extractor.as_ref())
    })
    .await?;

    let (added, total) = state.catalog.modify(|items| {
        let added = scanner::reconcile(items, result.items);
        Ok::<_, CatalogError>((added, items.len()))
    })?;

    info!(
        "scan finished in {:.2}s: {} added, {} total",
        result.elapsed_secs,
        added.len(),
        total
    );

    Ok(Json(ScanResponse { added, total }))
}

/// GET /api/last_path
pub async fn get_last_path(State(state): State<AppState>) -> Result<Json<LastPath>, ApiError> {
    Ok(Json(state.last_path.load()?))
}

/// POST /api/last_path
pub async fn save_last_path(
    State(state): State<AppState>,
    Json(last): Json<LastPath>,
) -> Result<Json<Value>, ApiError> {
    state.last_path.save(&last)?;
    Ok(Json(json!({ "status": "saved" })))
}

