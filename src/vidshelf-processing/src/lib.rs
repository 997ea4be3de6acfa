//! vidshelf-processing - media processing for vidshelf
//!
//! Wraps ffmpeg/ffprobe and builds the thumbnail pipeline on top of it:
//! timestamp planning, the job runner, the per-item generation guard and
//! progress tracking. Also hosts folder scanning and subtitle helpers.

pub mod format;
pub mod guard;
pub mod planner;
pub mod probe;
pub mod progress;
pub mod scanner;
pub mod subtitles;
pub mod thumbnails;

pub use guard::GenerationGuard;
pub use probe::{FfmpegTools, FrameExtractor, ToolStatus, VideoProbe};
pub use progress::{ProgressSnapshot, ProgressTracker};
pub use thumbnails::{JobLease, JobOutcome, ThumbnailJob};
