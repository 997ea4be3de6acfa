//! Display formatting for catalog fields

const SIZE_UNITS: [&str; 5] = ["Bytes", "KB", "MB", "GB", "TB"];

/// Human readable size with two decimals, e.g. "1.50 MB"
pub fn readable_size(bytes: u64) -> String {
    let mut size = bytes as f64;
    for unit in SIZE_UNITS {
        if size < 1024.0 {
            return format!("{:.2} {}", size, unit);
        }
        size /= 1024.0;
    }
    format!("{:.2} PB", size)
}

/// `m:ss` display duration, or "unknown"
pub fn duration_label(seconds: Option<f64>) -> String {
    match seconds.filter(|s| s.is_finite() && *s >= 0.0) {
        Some(s) => {
            let total = s as u64;
            format!("{}:{:02}", total / 60, total % 60)
        }
        None => "unknown".to_string(),
    }
}
