//! Capture timestamp planning

/// Fractions of the duration used when the length is known
const DURATION_FRACTIONS: [f64; 5] = [0.1, 0.3, 0.5, 0.7, 0.9];

/// Absolute offsets (seconds) used when the length is unknown
pub const FALLBACK_OFFSETS: [f64; 5] = [10.0, 30.0, 60.0, 90.0, 120.0];

/// Build the ordered list of capture points.
///
/// Explicit timestamps win verbatim. Otherwise a known positive duration is
/// sampled at 10/30/50/70/90%, and an unknown one falls back to fixed
/// offsets. Offsets past the end of a short video simply fail to extract.
pub fn plan(duration: Option<f64>, explicit: Option<&[f64]>) -> Vec<f64> {
    if let Some(timestamps) = explicit.filter(|t| !t.is_empty()) {
        return timestamps.to_vec();
    }

    match duration.filter(|d| d.is_finite() && *d > 0.0) {
        Some(d) => DURATION_FRACTIONS.iter().map(|f| d * f).collect(),
        None => FALLBACK_OFFSETS.to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_from_duration() {
        assert_eq!(plan(Some(100.0), None), vec![10.0, 30.0, 50.0, 70.0, 90.0]);

        for d in [0.5, 7.0, 123.4, 7200.0] {
            let points = plan(Some(d), None);
            assert_eq!(points.len(), 5);
            assert!(points.windows(2).all(|w| w[0] < w[1]));
            for (p, f) in points.iter().zip(DURATION_FRACTIONS) {
                assert!((p - d * f).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn test_plan_unknown_duration() {
        assert_eq!(plan(None, None), FALLBACK_OFFSETS.to_vec());
        assert_eq!(plan(Some(0.0), None), FALLBACK_OFFSETS.to_vec());
        assert_eq!(plan(Some(f64::NAN), None), FALLBACK_OFFSETS.to_vec());
    }

    #[test]
    fn test_plan_explicit_verbatim() {
        let explicit = [42.0, 5.0, 5.0];
        assert_eq!(plan(Some(100.0), Some(&explicit)), vec![42.0, 5.0, 5.0]);
        assert_eq!(plan(None, Some(&[])), FALLBACK_OFFSETS.to_vec());
    }
}
