//! Multi-timestamp thumbnail generation
//!
//! A job plans capture points for one video, extracts a frame per point and
//! reports progress after every step. Output names are derived from the
//! source stem and the 1-based index, so re-running the same plan reuses the
//! frames already on disk. A failed extraction is skipped, never fatal.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use vidshelf_db::MultiThumbnail;

use crate::guard::GenerationGuard;
use crate::planner;
use crate::probe::FrameExtractor;
use crate::progress::{ProgressSnapshot, ProgressTracker};

/// Default thumbnail size (width, height)
pub const DEFAULT_THUMBNAIL_SIZE: (u32, u32) = (320, 180);

/// Result of one job run
#[derive(Debug, Clone, PartialEq)]
pub struct JobOutcome {
    /// Successful captures, in plan order
    pub thumbnails: Vec<MultiThumbnail>,
    /// Number of planned timestamps
    pub total: usize,
}

/// Thumbnail job driven through a [`FrameExtractor`]
pub struct ThumbnailJob<'a> {
    extractor: &'a dyn FrameExtractor,
    size: (u32, u32),
}

impl<'a> ThumbnailJob<'a> {
    pub fn new(extractor: &'a dyn FrameExtractor, size: (u32, u32)) -> Self {
        Self { extractor, size }
    }

    /// Run the job for `media_path`.
    ///
    /// The source is probed only when `explicit` does not supply timestamps.
    /// `on_progress(completed, total, message)` is called at start, after
    /// every timestamp and once at the end.
    pub fn run(
        &self,
        media_path: &Path,
        explicit: Option<&[f64]>,
        mut on_progress: impl FnMut(usize, usize, &str),
    ) -> JobOutcome {
        let has_explicit = explicit.is_some_and(|t| !t.is_empty());
        let duration = if has_explicit {
            None
        } else {
            self.extractor.probe(media_path).duration()
        };
        let timestamps = planner::plan(duration, explicit);
        let total = timestamps.len();

        info!("generating {} thumbnails for {:?}", total, media_path);
        on_progress(0, total, &format!("starting {} thumbnails", total));

        let mut thumbnails = Vec::with_capacity(total);
        for (i, &timestamp) in timestamps.iter().enumerate() {
            let index = i + 1;
            let Some(output) = thumbnail_path(media_path, index) else {
                warn!("cannot derive thumbnail name for {:?}", media_path);
                on_progress(index, total, &format!("thumbnail {} skipped", index));
                continue;
            };

            let message = if output.exists() {
                debug!("thumbnail {} already exists at {:?}", index, output);
                thumbnails.push(record(&output, timestamp, index));
                format!("thumbnail {} already exists, skipped", index)
            } else if self
                .extractor
                .extract_frame(media_path, timestamp, &output, Some(self.size))
            {
                debug!("generated thumbnail {:?}", output);
                thumbnails.push(record(&output, timestamp, index));
                format!("generated thumbnail {}", index)
            } else {
                warn!(
                    "failed to generate thumbnail {} at {:.2}s for {:?}",
                    index, timestamp, media_path
                );
                format!("thumbnail {} failed", index)
            };

            on_progress(index, total, &message);
        }

        on_progress(
            total,
            total,
            &format!("done, {} thumbnails generated", thumbnails.len()),
        );

        JobOutcome { thumbnails, total }
    }
}

fn record(path: &Path, timestamp: f64, index: usize) -> MultiThumbnail {
    MultiThumbnail {
        path: path.to_string_lossy().into_owned(),
        timestamp,
        index: index as u32,
    }
}

/// `<dir>/<stem>_thumb_<index>.png` next to the source
pub fn thumbnail_path(media_path: &Path, index: usize) -> Option<PathBuf> {
    let stem = media_path.file_stem()?.to_string_lossy();
    Some(media_path.with_file_name(format!("{}_thumb_{}.png", stem, index)))
}

/// Stored thumbnails whose image files still exist
pub fn existing_thumbnails(stored: &[MultiThumbnail]) -> Vec<MultiThumbnail> {
    stored
        .iter()
        .filter(|t| Path::new(&t.path).exists())
        .cloned()
        .collect()
}

/// Holds the guard entry for one item while a job runs.
///
/// Dropping the lease, on success, error or panic unwind, releases the
/// guard and clears the item's progress entry.
pub struct JobLease {
    key: usize,
    guard: Arc<GenerationGuard>,
    progress: Arc<ProgressTracker>,
}

impl JobLease {
    /// Acquire the guard for `key`; `None` when a job is already in flight
    pub fn acquire(
        key: usize,
        guard: Arc<GenerationGuard>,
        progress: Arc<ProgressTracker>,
    ) -> Option<Self> {
        if !guard.try_acquire(key) {
            return None;
        }
        info!("thumbnail job started for item {}, in flight: {:?}", key, guard.held());
        Some(Self {
            key,
            guard,
            progress,
        })
    }

    pub fn key(&self) -> usize {
        self.key
    }

    /// Publish a snapshot for this item
    pub fn report(&self, completed: usize, total: usize, message: &str) {
        let snapshot = ProgressSnapshot::new(completed, total, message);
        debug!(
            "thumbnail progress [{}]: {}/{} ({}%) - {}",
            self.key, snapshot.completed, snapshot.total, snapshot.percentage, snapshot.message
        );
        self.progress.set(self.key, snapshot);
    }
}

impl Drop for JobLease {
    fn drop(&mut self) {
        self.progress.clear(self.key);
        self.guard.release(self.key);
        info!("thumbnail job finished for item {}", self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::VideoProbe;
    use std::collections::HashSet;
    use std::fs;
    use std::sync::Mutex;

    /// Writes a placeholder file for every extraction except the listed offsets
    struct FakeExtractor {
        duration: f64,
        failing: Vec<f64>,
        probes: Mutex<usize>,
        extractions: Mutex<Vec<f64>>,
    }

    impl FakeExtractor {
        fn new(duration: f64) -> Self {
            Self {
                duration,
                failing: Vec::new(),
                probes: Mutex::new(0),
                extractions: Mutex::new(Vec::new()),
            }
        }
    }

    impl FrameExtractor for FakeExtractor {
        fn probe(&self, _path: &Path) -> VideoProbe {
            *self.probes.lock().unwrap() += 1;
            VideoProbe {
                duration_seconds: self.duration,
                width: 1920,
                height: 1080,
            }
        }

        fn extract_frame(
            &self,
            _path: &Path,
            at: f64,
            output: &Path,
            scale: Option<(u32, u32)>,
        ) -> bool {
            assert_eq!(scale, Some(DEFAULT_THUMBNAIL_SIZE));
            self.extractions.lock().unwrap().push(at);
            if self.failing.contains(&at) {
                return false;
            }
            fs::write(output, b"png").unwrap();
            true
        }
    }

    fn source(dir: &Path) -> PathBuf {
        let path = dir.join("holiday.mp4");
        fs::write(&path, b"video").unwrap();
        path
    }

    #[test]
    fn test_full_run_from_duration() {
        let dir = tempfile::tempdir().unwrap();
        let video = source(dir.path());
        let fake = FakeExtractor::new(100.0);
        let job = ThumbnailJob::new(&fake, DEFAULT_THUMBNAIL_SIZE);

        let mut calls = Vec::new();
        let outcome = job.run(&video, None, |c, t, m| calls.push((c, t, m.to_string())));

        assert_eq!(outcome.total, 5);
        let stamps: Vec<f64> = outcome.thumbnails.iter().map(|t| t.timestamp).collect();
        assert_eq!(stamps, vec![10.0, 30.0, 50.0, 70.0, 90.0]);
        let indexes: Vec<u32> = outcome.thumbnails.iter().map(|t| t.index).collect();
        assert_eq!(indexes, vec![1, 2, 3, 4, 5]);
        assert!(outcome.thumbnails[0].path.ends_with("holiday_thumb_1.png"));

        let last = calls.last().unwrap();
        assert_eq!((last.0, last.1), (5, 5));
        assert_eq!(ProgressSnapshot::new(last.0, last.1, "").percentage, 100);
        assert!(calls.windows(2).all(|w| w[0].0 <= w[1].0));
        assert!(calls.iter().all(|c| c.0 <= c.1));
    }

    #[test]
    fn test_second_run_reuses_existing_files() {
        let dir = tempfile::tempdir().unwrap();
        let video = source(dir.path());
        let fake = FakeExtractor::new(60.0);
        let job = ThumbnailJob::new(&fake, DEFAULT_THUMBNAIL_SIZE);

        let first = job.run(&video, None, |_, _, _| {});
        assert_eq!(fake.extractions.lock().unwrap().len(), 5);

        let second = job.run(&video, None, |_, _, _| {});
        assert_eq!(fake.extractions.lock().unwrap().len(), 5);
        assert_eq!(first, second);
    }

    #[test]
    fn test_partial_failure_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let video = source(dir.path());
        let mut fake = FakeExtractor::new(100.0);
        fake.failing = vec![50.0];
        let job = ThumbnailJob::new(&fake, DEFAULT_THUMBNAIL_SIZE);

        let mut calls = Vec::new();
        let outcome = job.run(&video, None, |c, t, _| calls.push((c, t)));

        let indexes: Vec<u32> = outcome.thumbnails.iter().map(|t| t.index).collect();
        assert_eq!(indexes, vec![1, 2, 4, 5]);
        assert_eq!(outcome.total, 5);
        assert_eq!(*calls.last().unwrap(), (5, 5));
        assert!(!dir.path().join("holiday_thumb_3.png").exists());
    }

    #[test]
    fn test_explicit_timestamps_skip_probe() {
        let dir = tempfile::tempdir().unwrap();
        let video = source(dir.path());
        let fake = FakeExtractor::new(100.0);
        let job = ThumbnailJob::new(&fake, DEFAULT_THUMBNAIL_SIZE);

        let outcome = job.run(&video, Some(&[42.0, 7.0]), |_, _, _| {});

        assert_eq!(*fake.probes.lock().unwrap(), 0);
        assert_eq!(*fake.extractions.lock().unwrap(), vec![42.0, 7.0]);
        assert_eq!(outcome.total, 2);
        assert_eq!(outcome.thumbnails[1].timestamp, 7.0);
    }

    #[test]
    fn test_unknown_duration_uses_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let video = source(dir.path());
        let mut fake = FakeExtractor::new(0.0);
        // a 45 second clip: offsets past the end fail
        fake.failing = vec![60.0, 90.0, 120.0];
        let job = ThumbnailJob::new(&fake, DEFAULT_THUMBNAIL_SIZE);

        let outcome = job.run(&video, None, |_, _, _| {});
        let stamps: Vec<f64> = outcome.thumbnails.iter().map(|t| t.timestamp).collect();
        assert_eq!(stamps, vec![10.0, 30.0]);
        assert_eq!(outcome.total, 5);
    }

    #[test]
    fn test_existing_thumbnails_filters_missing() {
        let dir = tempfile::tempdir().unwrap();
        let present = dir.path().join("a_thumb_1.png");
        fs::write(&present, b"png").unwrap();
        let stored = vec![
            record(&present, 1.0, 1),
            record(&dir.path().join("a_thumb_2.png"), 2.0, 2),
        ];
        let kept = existing_thumbnails(&stored);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].index, 1);
    }

    #[test]
    fn test_lease_cleans_up_on_drop_and_panic() {
        let guard = Arc::new(GenerationGuard::new());
        let progress = Arc::new(ProgressTracker::new());

        let lease = JobLease::acquire(2, guard.clone(), progress.clone()).unwrap();
        assert!(JobLease::acquire(2, guard.clone(), progress.clone()).is_none());
        lease.report(1, 4, "working");
        assert_eq!(progress.snapshot(2).percentage, 25);
        drop(lease);
        assert!(!guard.is_held(2));
        assert_eq!(progress.get(2), None);

        let (g, p) = (guard.clone(), progress.clone());
        let result = std::thread::spawn(move || {
            let lease = JobLease::acquire(2, g, p).unwrap();
            lease.report(0, 5, "starting");
            panic!("job blew up");
        })
        .join();
        assert!(result.is_err());
        assert!(!guard.is_held(2));
        assert_eq!(progress.get(2), None);

        let keys: HashSet<usize> = guard.held().into_iter().collect();
        assert!(keys.is_empty());
    }
}
