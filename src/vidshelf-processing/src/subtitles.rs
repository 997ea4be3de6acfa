//! Subtitle discovery, validation and SRT/VTT conversion

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use vidshelf_db::SubtitleInfo;

use crate::format::readable_size;

const SUBTITLE_EXTENSIONS: [&str; 6] = ["srt", "vtt", "ass", "ssa", "sub", "idx"];

/// How much of a file is inspected by [`validate_subtitle`]
const VALIDATION_PREFIX_CHARS: usize = 1000;

// Checked in order against the lowercase file name; the first hit wins.
const LANGUAGE_HINTS: [(&str, &str); 22] = [
    ("zh", "Chinese"),
    ("cht", "Traditional Chinese"),
    ("chs", "Simplified Chinese"),
    ("tc", "Traditional Chinese"),
    ("sc", "Simplified Chinese"),
    ("cn", "Simplified Chinese"),
    ("tw", "Traditional Chinese"),
    ("en", "English"),
    ("eng", "English"),
    ("english", "English"),
    ("ja", "Japanese"),
    ("jp", "Japanese"),
    ("japanese", "Japanese"),
    ("ko", "Korean"),
    ("kr", "Korean"),
    ("korean", "Korean"),
    ("fr", "French"),
    ("french", "French"),
    ("de", "German"),
    ("german", "German"),
    ("es", "Spanish"),
    ("spanish", "Spanish"),
];

fn extension_lower(name: &str) -> Option<String> {
    Path::new(name)
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
}

pub fn is_subtitle_file(name: &str) -> bool {
    extension_lower(name).is_some_and(|ext| SUBTITLE_EXTENSIONS.contains(&ext.as_str()))
}

/// Guess the language from hints embedded in the file name
pub fn detect_language(filename: &str) -> &'static str {
    let lower = filename.to_lowercase();
    LANGUAGE_HINTS
        .iter()
        .find(|(hint, _)| lower.contains(hint))
        .map(|(_, language)| *language)
        .unwrap_or("unknown")
}

/// Subtitle files next to `video` whose stem equals or contains the video stem
pub fn find_subtitles(video: &Path) -> Result<Vec<SubtitleInfo>> {
    let dir = video.parent().unwrap_or_else(|| Path::new("."));
    let video_stem = video
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    let mut found = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("failed to list {:?}", dir))? {
        let entry = entry?;
        let filename = entry.file_name().to_string_lossy().into_owned();
        if !is_subtitle_file(&filename) {
            continue;
        }

        let path = entry.path();
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        if !stem.contains(&video_stem) {
            continue;
        }

        let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
        found.push(SubtitleInfo {
            path: path.to_string_lossy().into_owned(),
            language: detect_language(&filename).to_string(),
            format: extension_lower(&filename).unwrap_or_default().to_uppercase(),
            size: readable_size(size),
            filename,
        });
    }

    found.sort_by(|a, b| a.filename.cmp(&b.filename));
    debug!("found {} subtitle files for {:?}", found.len(), video);
    Ok(found)
}

/// Cheap sanity check of the first characters of a subtitle file.
///
/// SRT needs a `-->` cue and a digit, VTT must start with `WEBVTT`, other
/// formats just need non-blank content. Unreadable or non-UTF-8 files fail.
pub fn validate_subtitle(path: &Path) -> bool {
    let Ok(bytes) = fs::read(path) else {
        return false;
    };
    let Ok(text) = String::from_utf8(bytes) else {
        return false;
    };
    let head: String = text.chars().take(VALIDATION_PREFIX_CHARS).collect();

    match extension_lower(&path.to_string_lossy()).as_deref() {
        Some("srt") => head.contains("-->") && head.chars().any(|c| c.is_ascii_digit()),
        Some("vtt") => head.trim_start_matches('\u{feff}').starts_with("WEBVTT"),
        _ => !head.trim().is_empty(),
    }
}

/// Subtitle formats that can be converted into each other
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubtitleFormat {
    Srt,
    Vtt,
}

impl SubtitleFormat {
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim_start_matches('.').to_lowercase().as_str() {
            "srt" => Some(Self::Srt),
            "vtt" => Some(Self::Vtt),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Srt => "srt",
            Self::Vtt => "vtt",
        }
    }

    pub fn of_path(path: &Path) -> Option<Self> {
        Self::parse(&path.extension()?.to_string_lossy())
    }
}

/// Whether `source` can be converted to `target`
pub fn can_convert(source: &Path, target: SubtitleFormat) -> bool {
    matches!(
        (SubtitleFormat::of_path(source), target),
        (Some(SubtitleFormat::Srt), SubtitleFormat::Vtt)
            | (Some(SubtitleFormat::Vtt), SubtitleFormat::Srt)
    )
}

/// Convert `source` and write `<dir>/<stem>.<target>` next to it
pub fn convert_file(source: &Path, target: SubtitleFormat) -> Result<PathBuf> {
    let content =
        fs::read_to_string(source).with_context(|| format!("failed to read {:?}", source))?;
    let converted = match (SubtitleFormat::of_path(source), target) {
        (Some(SubtitleFormat::Srt), SubtitleFormat::Vtt) => srt_to_vtt(&content),
        (Some(SubtitleFormat::Vtt), SubtitleFormat::Srt) => vtt_to_srt(&content),
        _ => anyhow::bail!("unsupported subtitle conversion for {:?}", source),
    };

    let target_path = source.with_extension(target.extension());
    fs::write(&target_path, converted)
        .with_context(|| format!("failed to write {:?}", target_path))?;
    Ok(target_path)
}

/// SRT to WebVTT: add the header and switch cue times to `.` millis
pub fn srt_to_vtt(srt: &str) -> String {
    let mut lines = vec!["WEBVTT".to_string(), String::new()];
    for line in srt.trim().lines() {
        if line.contains("-->") {
            lines.push(line.replace(',', "."));
        } else {
            lines.push(line.to_string());
        }
    }
    lines.join("\n")
}

/// WebVTT to SRT: drop the header, number the cues and switch to `,` millis
pub fn vtt_to_srt(vtt: &str) -> String {
    let mut lines = Vec::new();
    let mut cue = 1;
    for line in vtt.trim().lines() {
        if line.starts_with("WEBVTT") {
            continue;
        }
        if line.contains("-->") {
            lines.push(cue.to_string());
            cue += 1;
            lines.push(line.replace('.', ","));
        } else {
            lines.push(line.to_string());
        }
    }
    lines.join("\n").trim_start().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SRT: &str =
        "1\n00:00:01,000 --> 00:00:02,500\nHello\n\n2\n00:00:03,000 --> 00:00:04,000\nWorld\n";

    #[test]
    fn test_is_subtitle_file() {
        assert!(is_subtitle_file("movie.SRT"));
        assert!(is_subtitle_file("movie.en.vtt"));
        assert!(!is_subtitle_file("movie.mp4"));
        assert!(!is_subtitle_file("srt"));
    }

    #[test]
    fn test_detect_language() {
        assert_eq!(detect_language("movie.cht.srt"), "Traditional Chinese");
        assert_eq!(detect_language("movie.zh-tw.srt"), "Chinese");
        assert_eq!(detect_language("movie.jp.srt"), "Japanese");
        assert_eq!(detect_language("movie.srt"), "unknown");
    }

    #[test]
    fn test_srt_to_vtt() {
        let vtt = srt_to_vtt(SRT);
        assert!(vtt.starts_with("WEBVTT\n\n1\n00:00:01.000 --> 00:00:02.500"));
        assert!(vtt.contains("\nHello\n"));
    }

    #[test]
    fn test_vtt_to_srt() {
        let srt = vtt_to_srt(&srt_to_vtt(SRT));
        assert!(srt.starts_with("1\n1\n00:00:01,000 --> 00:00:02,500"));

        let plain = "WEBVTT\n\n00:00:01.000 --> 00:00:02.000\nHi\n";
        assert_eq!(vtt_to_srt(plain), "1\n00:00:01,000 --> 00:00:02,000\nHi");
    }

    #[test]
    fn test_find_and_validate() {
        let dir = tempfile::tempdir().unwrap();
        let video = dir.path().join("trip.mp4");
        fs::write(&video, b"video").unwrap();
        fs::write(dir.path().join("trip.en.srt"), SRT).unwrap();
        fs::write(dir.path().join("trip.vtt"), "not a vtt").unwrap();
        fs::write(dir.path().join("other.srt"), SRT).unwrap();

        let found = find_subtitles(&video).unwrap();
        let names: Vec<&str> = found.iter().map(|s| s.filename.as_str()).collect();
        assert_eq!(names, vec!["trip.en.srt", "trip.vtt"]);
        assert_eq!(found[0].format, "SRT");
        assert_eq!(found[0].language, "English");

        assert!(validate_subtitle(Path::new(&found[0].path)));
        assert!(!validate_subtitle(Path::new(&found[1].path)));
        assert!(!validate_subtitle(&dir.path().join("missing.srt")));
    }

    #[test]
    fn test_convert_file() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("trip.srt");
        fs::write(&source, SRT).unwrap();

        assert!(can_convert(&source, SubtitleFormat::Vtt));
        assert!(!can_convert(&source, SubtitleFormat::Srt));

        let target = convert_file(&source, SubtitleFormat::Vtt).unwrap();
        assert_eq!(target, dir.path().join("trip.vtt"));
        assert!(validate_subtitle(&target));
        assert!(convert_file(&source, SubtitleFormat::Srt).is_err());
    }
}
