//! FFmpeg/FFprobe adapter
//!
//! Reads duration and resolution with `ffprobe` and grabs single frames with
//! `ffmpeg`. Every call fails soft: a missing tool, a corrupt file or a hung
//! process degrades to a zero probe or a `false` extraction instead of an
//! error. Tools are looked up next to the running executable first and then
//! on `PATH`, each binary independently.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use vidshelf_db::VideoDetails;

/// Default upper bound for a single tool invocation
pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(60);

/// Offset (seconds) used for the legacy single cover image
const COVER_OFFSET_SECS: f64 = 50.0;

const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Result of probing a media file. All zero when probing failed.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct VideoProbe {
    pub duration_seconds: f64,
    pub width: u32,
    pub height: u32,
}

impl VideoProbe {
    /// Duration when known; zero, negative or non-finite means unknown
    pub fn duration(&self) -> Option<f64> {
        (self.duration_seconds.is_finite() && self.duration_seconds > 0.0)
            .then_some(self.duration_seconds)
    }

    pub fn resolution(&self) -> String {
        if self.width > 0 && self.height > 0 {
            format!("{}x{}", self.width, self.height)
        } else {
            "unknown".to_string()
        }
    }

    /// Catalog representation of the probe
    pub fn details(&self) -> VideoDetails {
        VideoDetails {
            duration_seconds: self.duration().unwrap_or(0.0),
            width: self.width,
            height: self.height,
            resolution: self.resolution(),
        }
    }
}

/// Probing and frame extraction, the seam the thumbnail job is driven through
pub trait FrameExtractor: Send + Sync {
    /// Read duration and resolution. Never fails; see [`VideoProbe`].
    fn probe(&self, path: &Path) -> VideoProbe;

    /// Decode one frame at `at_seconds` into `output`, overwriting it.
    /// Returns true only when the frame was written; a failed run leaves no
    /// file behind.
    fn extract_frame(
        &self,
        path: &Path,
        at_seconds: f64,
        output: &Path,
        scale: Option<(u32, u32)>,
    ) -> bool;

    /// Produce the legacy full-size cover `<dir>/<stem>.png` if it is missing
    fn generate_cover(&self, video: &Path) -> Option<PathBuf> {
        let cover = cover_path(video)?;
        if cover.exists() || self.extract_frame(video, COVER_OFFSET_SECS, &cover, None) {
            Some(cover)
        } else {
            None
        }
    }
}

/// Production extractor backed by the ffmpeg command line tools
#[derive(Debug, Clone)]
pub struct FfmpegTools {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
    timeout: Duration,
}

impl FfmpegTools {
    /// Resolve both tools, preferring copies in `tool_dir` (default: the
    /// directory of the running executable) over `PATH`.
    pub fn new(tool_dir: Option<&Path>, timeout: Duration) -> Self {
        let dir = tool_dir.map(Path::to_path_buf).or_else(executable_dir);
        let ffmpeg = resolve_tool("ffmpeg", dir.as_deref());
        let ffprobe = resolve_tool("ffprobe", dir.as_deref());
        info!("using ffmpeg at {:?}, ffprobe at {:?}", ffmpeg, ffprobe);
        Self {
            ffmpeg,
            ffprobe,
            timeout,
        }
    }

    pub fn ffmpeg_path(&self) -> &Path {
        &self.ffmpeg
    }

    pub fn ffprobe_path(&self) -> &Path {
        &self.ffprobe
    }

    /// Probe only the container duration
    pub fn probe_duration(&self, path: &Path) -> Option<f64> {
        let mut cmd = Command::new(&self.ffprobe);
        cmd.args(["-v", "error", "-show_entries", "format=duration"])
            .args(["-of", "default=noprint_wrappers=1:nokey=1"])
            .arg(path);

        let output = run_with_timeout(cmd, self.timeout)?;
        let text = String::from_utf8_lossy(&output.stdout);
        match text.trim().parse::<f64>() {
            Ok(d) if d.is_finite() && d > 0.0 => Some(d),
            _ => {
                debug!("no usable duration for {:?}: {:?}", path, text.trim());
                None
            }
        }
    }

    fn probe_dimensions(&self, path: &Path) -> Option<(u32, u32)> {
        let mut cmd = Command::new(&self.ffprobe);
        cmd.args(["-v", "error", "-select_streams", "v:0"])
            .args(["-show_entries", "stream=width,height"])
            .args(["-of", "default=noprint_wrappers=1:nokey=1"])
            .arg(path);

        let output = run_with_timeout(cmd, self.timeout)?;
        parse_dimensions(&String::from_utf8_lossy(&output.stdout))
    }

    /// Whether both tools can be started
    pub fn check(&self) -> ToolStatus {
        ToolStatus {
            ffmpeg: tool_runs(&self.ffmpeg, self.timeout),
            ffprobe: tool_runs(&self.ffprobe, self.timeout),
        }
    }
}

impl FrameExtractor for FfmpegTools {
    fn probe(&self, path: &Path) -> VideoProbe {
        let Some(duration_seconds) = self.probe_duration(path) else {
            warn!("failed to probe {:?}, treating metadata as unknown", path);
            return VideoProbe::default();
        };
        let (width, height) = self.probe_dimensions(path).unwrap_or((0, 0));
        VideoProbe {
            duration_seconds,
            width,
            height,
        }
    }

    fn extract_frame(
        &self,
        path: &Path,
        at_seconds: f64,
        output: &Path,
        scale: Option<(u32, u32)>,
    ) -> bool {
        let mut cmd = Command::new(&self.ffmpeg);
        cmd.arg("-y") // Overwrite output
            .args(["-v", "error"])
            .arg("-i")
            .arg(path)
            .arg("-ss")
            .arg(format_offset(at_seconds))
            .args(["-vframes", "1"]);

        if let Some((w, h)) = scale {
            cmd.arg("-vf").arg(format!("scale={}:{}", w, h));
        }
        cmd.arg(output);

        debug!("running ffmpeg: {:?}", cmd);

        let succeeded = match run_with_timeout(cmd, self.timeout) {
            Some(result) if result.success => true,
            Some(result) => {
                log_stderr("frame extraction", path, &result.stderr);
                false
            }
            None => {
                warn!("ffmpeg did not complete for {:?} at {:.1}s", path, at_seconds);
                false
            }
        };

        if succeeded && output.exists() {
            return true;
        }
        // A killed or failed run may leave a truncated image
        if output.exists() {
            if let Err(e) = std::fs::remove_file(output) {
                warn!("failed to remove partial frame {:?}: {}", output, e);
            }
        }
        false
    }
}

/// Availability of the external tools
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToolStatus {
    pub ffmpeg: bool,
    pub ffprobe: bool,
}

impl ToolStatus {
    pub fn all_ok(&self) -> bool {
        self.ffmpeg && self.ffprobe
    }
}

/// Captured output of a finished tool run
struct ToolOutput {
    success: bool,
    stdout: Vec<u8>,
    stderr: Vec<u8>,
}

/// Run `cmd`, killing it once `timeout` elapses.
///
/// Returns `None` when the process could not be spawned or was killed.
fn run_with_timeout(mut cmd: Command, timeout: Duration) -> Option<ToolOutput> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let program = cmd.get_program().to_owned();
    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) => {
            warn!("failed to start {:?}: {}", program, e);
            return None;
        }
    };

    // Drain both pipes so a chatty tool cannot block on a full buffer
    let stdout = child.stdout.take().map(drain);
    let stderr = child.stderr.take().map(drain);

    let deadline = Instant::now() + timeout;
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break Some(status),
            Ok(None) if Instant::now() >= deadline => {
                warn!("{:?} timed out after {:?}, killing it", program, timeout);
                let _ = child.kill();
                let _ = child.wait();
                break None;
            }
            Ok(None) => thread::sleep(POLL_INTERVAL),
            Err(e) => {
                warn!("failed to wait for {:?}: {}", program, e);
                let _ = child.kill();
                let _ = child.wait();
                break None;
            }
        }
    };

    let stdout = stdout.and_then(|h| h.join().ok()).unwrap_or_default();
    let stderr = stderr.and_then(|h| h.join().ok()).unwrap_or_default();

    status.map(|status| ToolOutput {
        success: status.success(),
        stdout,
        stderr,
    })
}

fn drain<R: Read + Send + 'static>(mut pipe: R) -> thread::JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        buf
    })
}

fn log_stderr(what: &str, path: &Path, stderr: &[u8]) {
    let stderr = String::from_utf8_lossy(stderr);
    warn!(
        "{} failed for {:?}: {}",
        what,
        path,
        stderr.trim().chars().take(500).collect::<String>()
    );
}

fn tool_runs(tool: &Path, timeout: Duration) -> bool {
    let mut cmd = Command::new(tool);
    cmd.arg("-version");
    run_with_timeout(cmd, timeout)
        .map(|o| o.success)
        .unwrap_or(false)
}

fn executable_dir() -> Option<PathBuf> {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
}

/// Pick `<dir>/<name><EXE_SUFFIX>` when present, otherwise the bare name for `PATH` lookup
pub fn resolve_tool(name: &str, dir: Option<&Path>) -> PathBuf {
    if let Some(dir) = dir {
        let local = dir.join(format!("{}{}", name, std::env::consts::EXE_SUFFIX));
        if local.is_file() {
            return local;
        }
    }
    PathBuf::from(name)
}

/// `HH:MM:SS` for a seek offset, truncated to whole seconds
pub fn format_offset(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds as u64
    } else {
        0
    };
    format!("{:02}:{:02}:{:02}", total / 3600, (total % 3600) / 60, total % 60)
}

/// Legacy cover path: `<dir>/<stem>.png`
pub fn cover_path(video: &Path) -> Option<PathBuf> {
    let stem = video.file_stem()?;
    let mut name = stem.to_os_string();
    name.push(".png");
    Some(video.with_file_name(name))
}

fn parse_dimensions(text: &str) -> Option<(u32, u32)> {
    let mut values = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(|l| l.parse::<u32>());
    let width = values.next()?.ok()?;
    let height = values.next()?.ok()?;
    Some((width, height))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_offset() {
        assert_eq!(format_offset(0.0), "00:00:00");
        assert_eq!(format_offset(59.9), "00:00:59");
        assert_eq!(format_offset(3725.5), "01:02:05");
        assert_eq!(format_offset(-3.0), "00:00:00");
        assert_eq!(format_offset(f64::NAN), "00:00:00");
    }

    #[test]
    fn test_parse_dimensions() {
        assert_eq!(parse_dimensions("1920\n1080\n"), Some((1920, 1080)));
        assert_eq!(parse_dimensions("640\r\n360"), Some((640, 360)));
        assert_eq!(parse_dimensions("1920\n"), None);
        assert_eq!(parse_dimensions("N/A\nN/A"), None);
    }

    #[test]
    fn test_probe_sentinel() {
        let probe = VideoProbe::default();
        assert_eq!(probe.duration(), None);
        assert_eq!(probe.resolution(), "unknown");
        assert_eq!(probe.details().duration_seconds, 0.0);

        let probe = VideoProbe {
            duration_seconds: 12.5,
            width: 1280,
            height: 720,
        };
        assert_eq!(probe.duration(), Some(12.5));
        assert_eq!(probe.details().resolution, "1280x720");
    }

    #[test]
    fn test_resolve_tool_prefers_local_copy() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(resolve_tool("ffprobe", Some(dir.path())), PathBuf::from("ffprobe"));

        let local = dir
            .path()
            .join(format!("ffprobe{}", std::env::consts::EXE_SUFFIX));
        std::fs::write(&local, b"").unwrap();
        assert_eq!(resolve_tool("ffprobe", Some(dir.path())), local);
        // ffmpeg is resolved on its own and still falls back
        assert_eq!(resolve_tool("ffmpeg", Some(dir.path())), PathBuf::from("ffmpeg"));
    }

    #[test]
    fn test_cover_path() {
        assert_eq!(
            cover_path(Path::new("/videos/trip.mkv")),
            Some(PathBuf::from("/videos/trip.png"))
        );
    }

    #[test]
    fn test_missing_tool_fails_soft() {
        let dir = tempfile::tempdir().unwrap();
        let tools = FfmpegTools {
            ffmpeg: dir.path().join("no-such-ffmpeg"),
            ffprobe: dir.path().join("no-such-ffprobe"),
            timeout: Duration::from_secs(5),
        };
        let video = dir.path().join("clip.mp4");
        let out = dir.path().join("clip_thumb_1.png");

        assert_eq!(tools.probe(&video), VideoProbe::default());
        assert!(!tools.extract_frame(&video, 10.0, &out, Some((320, 180))));
        assert!(tools.generate_cover(&video).is_none());
        assert!(!tools.check().all_ok());
    }

    /// Write an executable shell script standing in for a tool
    #[cfg(unix)]
    fn script_tool(dir: &Path, name: &str, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    #[test]
    fn test_hung_tools_are_killed() {
        let dir = tempfile::tempdir().unwrap();
        // the output path is the last argument
        let ffmpeg = script_tool(
            dir.path(),
            "ffmpeg",
            r#"for last; do :; done; printf partial > "$last"; exec sleep 30"#,
        );
        let ffprobe = script_tool(dir.path(), "ffprobe", "exec sleep 30");
        let tools = FfmpegTools {
            ffmpeg,
            ffprobe,
            timeout: Duration::from_millis(300),
        };
        let video = dir.path().join("clip.mp4");
        let out = dir.path().join("clip_thumb_1.png");

        let start = Instant::now();
        assert_eq!(tools.probe(&video), VideoProbe::default());
        assert!(start.elapsed() < Duration::from_secs(10));

        let start = Instant::now();
        assert!(!tools.extract_frame(&video, 10.0, &out, Some((320, 180))));
        assert!(start.elapsed() < Duration::from_secs(10));
        assert!(!out.exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_failed_extraction_leaves_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let ffmpeg = script_tool(
            dir.path(),
            "ffmpeg",
            r#"for last; do :; done; : > "$last"; exit 1"#,
        );
        let tools = FfmpegTools {
            ffmpeg,
            ffprobe: dir.path().join("no-such-ffprobe"),
            timeout: Duration::from_secs(5),
        };
        let video = dir.path().join("clip.mp4");
        let out = dir.path().join("clip_thumb_1.png");

        assert!(!tools.extract_frame(&video, 10.0, &out, None));
        assert!(!out.exists());
        assert!(tools.generate_cover(&video).is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_successful_extraction() {
        let dir = tempfile::tempdir().unwrap();
        let ffmpeg = script_tool(
            dir.path(),
            "ffmpeg",
            r#"for last; do :; done; printf png > "$last""#,
        );
        let tools = FfmpegTools {
            ffmpeg,
            ffprobe: dir.path().join("no-such-ffprobe"),
            timeout: Duration::from_secs(5),
        };
        let out = dir.path().join("clip_thumb_1.png");

        assert!(tools.extract_frame(&dir.path().join("clip.mp4"), 10.0, &out, None));
        assert_eq!(std::fs::read(&out).unwrap(), b"png");
    }
}
