//! Catalog record types
//!
//! Field names follow the on-disk `data.json` layout so catalogs written by
//! earlier versions of the library manager load unchanged.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Timestamp format used for `add_time`
pub const ADD_TIME_FORMAT: &str = "%Y/%m/%d %H:%M:%S";

/// Current local time formatted for `add_time`
pub fn add_time_now() -> String {
    chrono::Local::now().format(ADD_TIME_FORMAT).to_string()
}

/// One video in the catalog, addressed by its position in the list
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaItem {
    pub filename: String,

    #[serde(rename = "tag", default)]
    pub tags: Vec<String>,

    pub path: String,

    #[serde(default)]
    pub description: String,

    /// Display duration (`m:ss`), or "unknown"
    #[serde(default)]
    pub duration: String,

    /// Legacy single cover image; empty when none was produced
    #[serde(default)]
    pub thumbnail: String,

    /// Human readable file size
    #[serde(default)]
    pub size: String,

    #[serde(default)]
    pub add_time: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multi_thumbnails: Option<Vec<MultiThumbnail>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitles: Option<Vec<SubtitleInfo>>,

    /// Keys this version does not know about, kept across rewrites
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A frame captured by a thumbnail job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiThumbnail {
    pub path: String,
    /// Source offset in seconds
    pub timestamp: f64,
    /// 1-based position within the job
    pub index: u32,
}

/// A subtitle file found next to a video
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubtitleInfo {
    pub path: String,
    pub filename: String,
    pub language: String,
    pub format: String,
    pub size: String,
}

/// Freshly probed technical metadata merged onto an item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoDetails {
    pub duration_seconds: f64,
    pub width: u32,
    pub height: u32,
    pub resolution: String,
}

impl MediaItem {
    /// Copy probed metadata onto the record
    pub fn apply_details(&mut self, details: &VideoDetails) {
        self.duration_seconds = Some(details.duration_seconds);
        self.width = Some(details.width);
        self.height = Some(details.height);
        self.resolution = Some(details.resolution.clone());
    }
}
