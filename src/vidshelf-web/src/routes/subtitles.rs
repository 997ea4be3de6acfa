//! Subtitle handlers

use super::{load_item, load_item_with_file, PathQuery};
use crate::{ApiError, AppState};
use axum::{
    extract::{Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::path::{Path as FsPath, PathBuf};
use tracing::{info, warn};
use vidshelf_db::{CatalogStore, MediaItem, SubtitleInfo};
use vidshelf_processing::subtitles::{self, SubtitleFormat};

#[derive(Debug, Deserialize)]
pub struct DeleteSubtitleRequest {
    #[serde(default)]
    pub subtitle_path: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ConvertSubtitleRequest {
    #[serde(default)]
    pub source_path: Option<String>,
    #[serde(default = "default_target_format")]
    pub target_format: String,
}

fn default_target_format() -> String {
    "vtt".to_string()
}

#[derive(Debug, Serialize)]
pub struct SubtitleChangeResponse {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtitle_path: Option<String>,
    pub subtitles: Vec<SubtitleInfo>,
}

#[derive(Debug, Serialize)]
pub struct ConvertResponse {
    pub status: &'static str,
    pub target_path: String,
}

/// Rescan the subtitles next to `video` and store them on the record
fn refresh_subtitles(
    state: &AppState,
    index: usize,
    video: &FsPath,
    validate: bool,
) -> Result<Vec<SubtitleInfo>, ApiError> {
    let mut found = subtitles::find_subtitles(video)?;
    if validate {
        found.retain(|s| subtitles::validate_subtitle(FsPath::new(&s.path)));
    }

    let stored = found.clone();
    state.catalog.update_by_index(index, &mut |item: &mut MediaItem| {
        item.subtitles = Some(stored.clone())
    })?;
    Ok(found)
}

/// GET /api/videos/:index/subtitles - discover and validate sibling subtitle files
pub async fn get_subtitles(
    State(state): State<AppState>,
    Path(index): Path<usize>,
) -> Result<Json<Vec<SubtitleInfo>>, ApiError> {
    let (_, video) = load_item_with_file(&state, index)?;
    Ok(Json(refresh_subtitles(&state, index, &video, true)?))
}

/// GET /api/subtitle?path=
pub async fn serve_subtitle(Query(query): Query<PathQuery>) -> Result<Response, ApiError> {
    let path = query
        .existing()
        .ok_or_else(|| ApiError::NotFound("subtitle not found".to_string()))?;

    let content_type = match SubtitleFormat::of_path(&path) {
        Some(SubtitleFormat::Vtt) => "text/vtt; charset=utf-8",
        _ => "text/plain; charset=utf-8",
    };
    let bytes = tokio::fs::read(&path).await?;
    Ok((StatusCode::OK, [(header::CONTENT_TYPE, content_type)], bytes).into_response())
}

/// POST /api/videos/:index/upload_subtitle
///
/// The file is stored as `<video stem>[.<language>]<ext>` next to the video
/// and removed again when its content does not look like a subtitle.
pub async fn upload_subtitle(
    State(state): State<AppState>,
    Path(index): Path<usize>,
    mut multipart: Multipart,
) -> Result<Json<SubtitleChangeResponse>, ApiError> {
    let item = load_item(&state, index)?;

    let mut upload = None;
    let mut language = String::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.to_string()))?
    {
        match field.name() {
            Some("file") => {
                let name = field.file_name().unwrap_or_default().to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::BadRequest(e.to_string()))?;
                upload = Some((name, data));
            }
            Some("language") => {
                language = field
                    .text()
                    .await
                    .map_err(|e| ApiError::BadRequest(e.to_string()))?
                    .trim()
                    .to_string();
            }
            _ => {}
        }
    }

    let (name, data) =
        upload.ok_or_else(|| ApiError::BadRequest("no file uploaded".to_string()))?;
    if name.is_empty() {
        return Err(ApiError::BadRequest("empty file name".to_string()));
    }
    if !subtitles::is_subtitle_file(&name) {
        return Err(ApiError::BadRequest(
            "only subtitle files are supported (.srt, .vtt, .ass, .ssa, .sub, .idx)".to_string(),
        ));
    }

    let video = PathBuf::from(&item.path);
    let stem = video
        .file_stem()
        .ok_or_else(|| ApiError::BadRequest(format!("invalid video path: {}", item.path)))?
        .to_string_lossy()
        .into_owned();
    let extension = FsPath::new(&name)
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_default();
    let file_name = if language.is_empty() {
        format!("{}.{}", stem, extension)
    } else {
        format!("{}.{}.{}", stem, language, extension)
    };
    let target = video.with_file_name(file_name);

    tokio::fs::write(&target, &data).await?;
    if !subtitles::validate_subtitle(&target) {
        if let Err(e) = tokio::fs::remove_file(&target).await {
            warn!("failed to remove invalid subtitle {:?}: {}", target, e);
        }
        return Err(ApiError::BadRequest("invalid subtitle content".to_string()));
    }

    let found = refresh_subtitles(&state, index, &video, false)?;
    info!("uploaded subtitle {:?} for video {}", target, index);

    Ok(Json(SubtitleChangeResponse {
        status: "subtitle uploaded",
        subtitle_path: Some(target.to_string_lossy().into_owned()),
        subtitles: found,
    }))
}

/// DELETE /api/videos/:index/delete_subtitle
pub async fn delete_subtitle(
    State(state): State<AppState>,
    Path(index): Path<usize>,
    Json(request): Json<DeleteSubtitleRequest>,
) -> Result<Json<SubtitleChangeResponse>, ApiError> {
    let item = load_item(&state, index)?;

    let target = request
        .subtitle_path
        .filter(|p| !p.is_empty())
        .map(PathBuf::from)
        .filter(|p| p.exists())
        .ok_or_else(|| ApiError::NotFound("subtitle not found".to_string()))?;
    if !subtitles::is_subtitle_file(&target.to_string_lossy()) {
        return Err(ApiError::BadRequest(format!("not a subtitle file: {:?}", target)));
    }

    // Only files that belong to this video may be removed
    let video = FsPath::new(&item.path);
    let target = std::fs::canonicalize(&target)?;
    let owned = subtitles::find_subtitles(video)?
        .iter()
        .filter_map(|s| std::fs::canonicalize(&s.path).ok())
        .any(|p| p == target);
    if !owned {
        return Err(ApiError::NotFound(format!(
            "{:?} is not a subtitle of video {}",
            target, index
        )));
    }

    tokio::fs::remove_file(&target).await?;
    let found = refresh_subtitles(&state, index, video, false)?;
    info!("deleted subtitle {:?} of video {}", target, index);

    Ok(Json(SubtitleChangeResponse {
        status: "subtitle deleted",
        subtitle_path: None,
        subtitles: found,
    }))
}

/// POST /api/convert_subtitle - SRT to VTT or VTT to SRT, written next to the source
pub async fn convert_subtitle(
    Json(request): Json<ConvertSubtitleRequest>,
) -> Result<Json<ConvertResponse>, ApiError> {
    let source = request
        .source_path
        .filter(|p| !p.is_empty())
        .map(PathBuf::from)
        .filter(|p| p.exists())
        .ok_or_else(|| ApiError::NotFound("source subtitle not found".to_string()))?;

    let target = SubtitleFormat::parse(&request.target_format)
        .filter(|format| subtitles::can_convert(&source, *format))
        .ok_or_else(|| ApiError::BadRequest("unsupported conversion".to_string()))?;

    let target_path =
        tokio::task::spawn_blocking(move || subtitles::convert_file(&source, target)).await??;
    info!("converted subtitle to {:?}", target_path);

    Ok(Json(ConvertResponse {
        status: "converted",
        target_path: target_path.to_string_lossy().into_owned(),
    }))
}
