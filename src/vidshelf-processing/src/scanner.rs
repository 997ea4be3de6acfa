//! Library folder scanning
//!
//! Walks a folder tree for video files that are not yet catalogued and
//! builds their records (cover, duration, size, add time).

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use vidshelf_db::{add_time_now, MediaItem};

use crate::format::{duration_label, readable_size};
use crate::probe::FrameExtractor;

const VIDEO_EXTENSIONS: [&str; 4] = ["mp4", "mkv", "avi", "mov"];

/// Whether `path` has one of the indexed video extensions
pub fn is_video_file(path: &Path) -> bool {
    path.extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .is_some_and(|ext| VIDEO_EXTENSIONS.contains(&ext.as_str()))
}

/// Outcome of scanning one folder
#[derive(Debug, Default)]
pub struct ScanResult {
    /// Records for files not in `known`, in walk order
    pub items: Vec<MediaItem>,
    pub elapsed_secs: f64,
}

/// Scan `root` for video files whose path is not in `known`.
///
/// Unreadable entries are logged and skipped. Each new file gets a cover
/// frame and a probed duration; probe failures leave "unknown".
pub fn scan_new_videos(
    root: &Path,
    known: &HashSet<String>,
    extractor: &dyn FrameExtractor,
) -> ScanResult {
    let start = Instant::now();
    let mut seen = HashSet::new();
    let mut items = Vec::new();

    for entry in WalkDir::new(root).follow_links(true).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("cannot access entry: {}", e);
                continue;
            }
        };
        if !entry.file_type().is_file() || !is_video_file(entry.path()) {
            continue;
        }

        let path_str = entry.path().to_string_lossy().into_owned();
        if known.contains(&path_str) || !seen.insert(path_str.clone()) {
            continue;
        }

        match build_item(entry.path(), extractor) {
            Some(item) => {
                debug!("indexed {}", item.path);
                items.push(item);
            }
            None => warn!("cannot stat {:?}, skipping", entry.path()),
        }
    }

    let elapsed_secs = start.elapsed().as_secs_f64();
    info!(
        "scanned {:?}: {} new videos in {:.1}s",
        root,
        items.len(),
        elapsed_secs
    );

    ScanResult {
        items,
        elapsed_secs,
    }
}

fn build_item(path: &Path, extractor: &dyn FrameExtractor) -> Option<MediaItem> {
    let size = std::fs::metadata(path).ok()?.len();
    let filename = path.file_name()?.to_string_lossy().into_owned();
    let thumbnail = extractor
        .generate_cover(path)
        .map(|p: PathBuf| p.to_string_lossy().into_owned())
        .unwrap_or_default();
    let duration = duration_label(extractor.probe(path).duration());

    Some(MediaItem {
        filename,
        path: path.to_string_lossy().into_owned(),
        duration,
        thumbnail,
        size: readable_size(size),
        add_time: add_time_now(),
        ..Default::default()
    })
}

/// Merge scan results into the catalog.
///
/// Records whose file no longer exists are dropped first; new records are
/// appended unless their path is already present. Returns the paths that
/// were appended.
pub fn reconcile(items: &mut Vec<MediaItem>, new_items: Vec<MediaItem>) -> Vec<String> {
    let before = items.len();
    items.retain(|item| Path::new(&item.path).exists());
    if items.len() != before {
        info!("dropped {} records for missing files", before - items.len());
    }

    let mut present: HashSet<String> = items.iter().map(|i| i.path.clone()).collect();
    let mut added = Vec::new();
    for item in new_items {
        if present.insert(item.path.clone()) {
            added.push(item.path.clone());
            items.push(item);
        }
    }
    added
}
