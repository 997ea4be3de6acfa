//! Shared application state

use std::path::PathBuf;
use std::sync::Arc;

use vidshelf_db::{Catalog, LastPathStore};
use vidshelf_processing::thumbnails::DEFAULT_THUMBNAIL_SIZE;
use vidshelf_processing::{FrameExtractor, GenerationGuard, ProgressTracker};

/// Server settings resolved by the binary
#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// Catalog JSON file
    pub data_file: PathBuf,
    /// File remembering the last scanned folder
    pub last_path_file: PathBuf,
    /// Directory holding `thumbnails/default.png`
    pub static_dir: PathBuf,
    /// Multi-thumbnail size (width, height)
    pub thumbnail_size: (u32, u32),
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            data_file: PathBuf::from("data.json"),
            last_path_file: PathBuf::from("last_path.json"),
            static_dir: PathBuf::from("static"),
            thumbnail_size: DEFAULT_THUMBNAIL_SIZE,
        }
    }
}

/// Shared state across all handlers
#[derive(Clone)]
pub struct AppState {
    /// Media catalog (serializes its own read-modify-write cycles)
    pub catalog: Arc<Catalog>,

    pub last_path: Arc<LastPathStore>,

    /// Probing and frame extraction
    pub extractor: Arc<dyn FrameExtractor>,

    /// Items with a thumbnail job in flight
    pub guard: Arc<GenerationGuard>,

    /// Progress of running thumbnail jobs
    pub progress: Arc<ProgressTracker>,

    /// Directory served under `/static`
    pub static_dir: PathBuf,

    /// Fallback cover served when a thumbnail is missing
    pub default_thumbnail: PathBuf,

    pub thumbnail_size: (u32, u32),
}

impl AppState {
    /// Create new application state
    pub fn new(options: ServerOptions, extractor: Arc<dyn FrameExtractor>) -> Self {
        Self {
            catalog: Arc::new(Catalog::open(&options.data_file)),
            last_path: Arc::new(LastPathStore::new(&options.last_path_file)),
            extractor,
            guard: Arc::new(GenerationGuard::new()),
            progress: Arc::new(ProgressTracker::new()),
            default_thumbnail: options.static_dir.join("thumbnails").join("default.png"),
            static_dir: options.static_dir,
            thumbnail_size: options.thumbnail_size,
        }
    }
}
