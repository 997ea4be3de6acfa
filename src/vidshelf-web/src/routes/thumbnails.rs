//! Cover and multi-thumbnail handlers

use super::{load_item, load_item_with_file, PathQuery};
use crate::{ApiError, AppState};
use axum::{
    body::Bytes,
    extract::{Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::Path as FsPath;
use tracing::{info, warn};
use vidshelf_db::{
    find_by_path, CatalogError, CatalogStore, MediaItem, MultiThumbnail, VideoDetails,
};
use vidshelf_processing::thumbnails::existing_thumbnails;
use vidshelf_processing::{planner, JobLease, ProgressSnapshot, ThumbnailJob};

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

/// Optional body for `POST /api/videos/:index/generate_thumbnails`
#[derive(Debug, Default, Deserialize)]
pub struct GenerateRequest {
    #[serde(default)]
    pub timestamps: Option<Vec<f64>>,
}

#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    pub status: &'static str,
    pub thumbnails: Vec<MultiThumbnail>,
    pub completed: usize,
    pub total: usize,
    pub message: String,
}

async fn image_response(path: &FsPath) -> Result<Response, ApiError> {
    let bytes = tokio::fs::read(path).await?;
    Ok((StatusCode::OK, [(header::CONTENT_TYPE, "image/png")], bytes).into_response())
}

/// GET /api/thumbnail?path= - cover image, falling back to the default cover
pub async fn serve_thumbnail(
    State(state): State<AppState>,
    Query(query): Query<PathQuery>,
) -> Result<Response, ApiError> {
    match query.existing() {
        Some(path) => image_response(&path).await,
        None if state.default_thumbnail.exists() => image_response(&state.default_thumbnail).await,
        None => Err(ApiError::NotFound("thumbnail not found".to_string())),
    }
}

/// GET /api/multi_thumbnail?path=
pub async fn serve_multi_thumbnail(Query(query): Query<PathQuery>) -> Result<Response, ApiError> {
    let path = query
        .existing()
        .ok_or_else(|| ApiError::NotFound("thumbnail not found".to_string()))?;
    image_response(&path).await
}

/// POST /api/upload_thumbnail/:index - replace the cover with an uploaded image
pub async fn upload_thumbnail(
    State(state): State<AppState>,
    Path(index): Path<usize>,
    mut multipart: Multipart,
) -> Result<Json<Value>, ApiError> {
    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.to_string()))?
    {
        if field.name() == Some("file") {
            let name = field.file_name().unwrap_or_default().to_string();
            let data = field
                .bytes()
                .await
                .map_err(|e| ApiError::BadRequest(e.to_string()))?;
            upload = Some((name, data));
        }
    }

    let (name, data) =
        upload.ok_or_else(|| ApiError::BadRequest("no file uploaded".to_string()))?;
    if name.is_empty() {
        return Err(ApiError::BadRequest("empty file name".to_string()));
    }
    let extension = FsPath::new(&name)
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    if !IMAGE_EXTENSIONS.contains(&extension.as_str()) {
        return Err(ApiError::BadRequest("only jpg/jpeg/png images are supported".to_string()));
    }

    let item = load_item(&state, index)?;
    let video = FsPath::new(&item.path);
    let stem = video
        .file_stem()
        .ok_or_else(|| ApiError::BadRequest(format!("invalid video path: {}", item.path)))?
        .to_string_lossy();
    let target = video.with_file_name(format!("{}.jpg", stem));
    tokio::fs::write(&target, &data).await?;

    let thumbnail = target.to_string_lossy().into_owned();
    state
        .catalog
        .update_by_index(index, &mut |item: &mut MediaItem| {
            item.thumbnail = thumbnail.clone()
        })?;

    info!("uploaded thumbnail for video {}: {:?}", index, target);
    Ok(Json(json!({ "status": "thumbnail updated" })))
}

/// GET /api/videos/:index/multi_thumbnails - stored thumbnails that still exist
pub async fn get_multi_thumbnails(
    State(state): State<AppState>,
    Path(index): Path<usize>,
) -> Result<Json<Vec<MultiThumbnail>>, ApiError> {
    let (item, _) = load_item_with_file(&state, index)?;
    let stored = item.multi_thumbnails.unwrap_or_default();
    Ok(Json(existing_thumbnails(&stored)))
}

/// POST /api/videos/:index/generate_thumbnails
pub async fn generate_thumbnails(
    State(state): State<AppState>,
    Path(index): Path<usize>,
    body: Bytes,
) -> Result<Json<GenerateResponse>, ApiError> {
    let lease = JobLease::acquire(index, state.guard.clone(), state.progress.clone())
        .ok_or_else(|| {
            ApiError::Conflict(format!(
                "thumbnails are already being generated for video {}",
                index
            ))
        })?;

    let request: GenerateRequest = if body.iter().all(u8::is_ascii_whitespace) {
        GenerateRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| ApiError::BadRequest(e.to_string()))?
    };

    let (item, video) = load_item_with_file(&state, index)?;
    let timestamps = request.timestamps.filter(|t| !t.is_empty());
    let planned = timestamps
        .as_ref()
        .map_or(planner::FALLBACK_OFFSETS.len(), Vec::len);
    lease.report(0, planned, "preparing thumbnails");

    let catalog = state.catalog.clone();
    let extractor = state.extractor.clone();
    let size = state.thumbnail_size;
    let outcome = tokio::task::spawn_blocking(move || -> Result<_, ApiError> {
        let job = ThumbnailJob::new(extractor.as_ref(), size);
        let outcome = job.run(&video, timestamps.as_deref(), |completed, total, message| {
            lease.report(completed, total, message)
        });
        let details = extractor.probe(&video).details();

        catalog.modify(|items| {
            persist_outcome(items, index, &item.path, &outcome.thumbnails, &details);
            Ok::<_, CatalogError>(())
        })?;
        Ok(outcome)
    })
    .await??;

    let completed = outcome.thumbnails.len();
    Ok(Json(GenerateResponse {
        status: "success",
        thumbnails: outcome.thumbnails,
        completed,
        total: outcome.total,
        message: format!("generated {} thumbnails", completed),
    }))
}

/// Store job results on the record for `path`.
///
/// The index is only trusted while it still points at the same file; a scan
/// running alongside may have shifted the catalog.
fn persist_outcome(
    items: &mut [MediaItem],
    index: usize,
    path: &str,
    thumbnails: &[MultiThumbnail],
    details: &VideoDetails,
) {
    let position = match items.get(index) {
        Some(item) if item.path == path => Some(index),
        _ => find_by_path(items, path),
    };
    match position.and_then(|p| items.get_mut(p)) {
        Some(item) => {
            item.multi_thumbnails = Some(thumbnails.to_vec());
            item.apply_details(details);
        }
        None => warn!("video {:?} left the catalog before its thumbnails were saved", path),
    }
}

/// GET /api/videos/:index/thumbnail_progress
pub async fn get_thumbnail_progress(
    State(state): State<AppState>,
    Path(index): Path<usize>,
) -> Json<ProgressSnapshot> {
    Json(state.progress.snapshot(index))
}

/// GET /api/videos/:index/video_info - stored record with freshly probed details
pub async fn get_video_info(
    State(state): State<AppState>,
    Path(index): Path<usize>,
) -> Result<Json<MediaItem>, ApiError> {
    let (mut item, video) = load_item_with_file(&state, index)?;
    let extractor = state.extractor.clone();
    let details = tokio::task::spawn_blocking(move || extractor.probe(&video).details()).await?;
    item.apply_details(&details);
    Ok(Json(item))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(path: &str) -> MediaItem {
        MediaItem {
            path: path.to_string(),
            ..Default::default()
        }
    }

    fn details() -> VideoDetails {
        VideoDetails {
            duration_seconds: 90.0,
            width: 1280,
            height: 720,
            resolution: "1280x720".to_string(),
        }
    }

    fn thumbs() -> Vec<MultiThumbnail> {
        vec![MultiThumbnail {
            path: "/v/a_thumb_1.png".to_string(),
            timestamp: 9.0,
            index: 1,
        }]
    }

    #[test]
    fn test_persist_at_same_index() {
        let mut items = vec![item("/v/a.mp4"), item("/v/b.mp4")];
        persist_outcome(&mut items, 0, "/v/a.mp4", &thumbs(), &details());
        assert_eq!(items[0].multi_thumbnails, Some(thumbs()));
        assert_eq!(items[0].resolution.as_deref(), Some("1280x720"));
        assert!(items[1].multi_thumbnails.is_none());
    }

    #[test]
    fn test_persist_follows_shifted_record() {
        // a scan dropped the first record while the job ran
        let mut items = vec![item("/v/b.mp4"), item("/v/a.mp4")];
        persist_outcome(&mut items, 0, "/v/a.mp4", &thumbs(), &details());
        assert!(items[0].multi_thumbnails.is_none());
        assert_eq!(items[1].multi_thumbnails, Some(thumbs()));
    }

    #[test]
    fn test_persist_skips_vanished_record() {
        let mut items = vec![item("/v/b.mp4")];
        persist_outcome(&mut items, 0, "/v/a.mp4", &thumbs(), &details());
        assert!(items[0].multi_thumbnails.is_none());
    }
}
