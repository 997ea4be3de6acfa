//! Video streaming with HTTP Range requests

use super::PathQuery;
use crate::ApiError;
use axum::{
    body::Body,
    extract::Query,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use std::io::SeekFrom;
use std::path::Path;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::io::ReaderStream;

/// Parse a single `bytes=start-end` range; suffix ranges (`bytes=-N`) included
fn parse_range_header(range: &str, file_size: u64) -> Option<(u64, u64)> {
    let range = range.trim().strip_prefix("bytes=")?;
    if file_size == 0 || range.contains(',') {
        return None;
    }

    let (start, end) = range.split_once('-')?;
    let (start, end) = if start.is_empty() {
        let suffix: u64 = end.parse().ok()?;
        if suffix == 0 {
            return None;
        }
        (file_size.saturating_sub(suffix), file_size - 1)
    } else {
        let start: u64 = start.parse().ok()?;
        let end = if end.is_empty() {
            file_size - 1
        } else {
            end.parse::<u64>().ok()?.min(file_size - 1)
        };
        (start, end)
    };

    if start <= end && end < file_size {
        Some((start, end))
    } else {
        None
    }
}

fn guess_mime(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "mkv" => "video/x-matroska",
        "avi" => "video/x-msvideo",
        "mov" => "video/quicktime",
        "webm" => "video/webm",
        _ => "video/mp4",
    }
}

/// GET /api/stream_video?path= - stream a video file with range request support
pub async fn stream_video(
    Query(query): Query<PathQuery>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let file_path = query
        .existing()
        .filter(|p| p.is_file())
        .ok_or_else(|| ApiError::NotFound("video file not found".to_string()))?;

    let file_size = tokio::fs::metadata(&file_path).await?.len();
    let mime = guess_mime(&file_path);
    let mut file = tokio::fs::File::open(&file_path).await?;

    if let Some(range_header) = headers.get(header::RANGE) {
        let range_str = range_header.to_str().unwrap_or("");
        let (start, end) =
            parse_range_header(range_str, file_size).ok_or(ApiError::RangeNotSatisfiable)?;
        let length = end - start + 1;

        file.seek(SeekFrom::Start(start)).await?;
        let body = Body::from_stream(ReaderStream::new(file.take(length)));
        let content_range = format!("bytes {}-{}/{}", start, end, file_size);

        return Ok((
            StatusCode::PARTIAL_CONTENT,
            [
                (header::CONTENT_TYPE, mime.to_string()),
                (header::CONTENT_LENGTH, length.to_string()),
                (header::CONTENT_RANGE, content_range),
                (header::ACCEPT_RANGES, "bytes".to_string()),
            ],
            body,
        )
            .into_response());
    }

    let body = Body::from_stream(ReaderStream::new(file));
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, mime.to_string()),
            (header::CONTENT_LENGTH, file_size.to_string()),
            (header::ACCEPT_RANGES, "bytes".to_string()),
        ],
        body,
    )
        .into_response())
}
