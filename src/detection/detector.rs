/// Detector trait and common types
///
/// Defines the interface the watch loop uses to ask "is the form on screen".
use crate::capture::Frame;
use crate::error::DetectionError;

/// A shape that passed every filter
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    /// Filled pixel area (not the bounding-box area)
    pub area: u64,
    /// width / height
    pub aspect_ratio: f64,
    /// Number of thick bars found
    pub bar_count: usize,
    /// Rows between the inner edges of the first and last thick bar
    pub bar_distance: u32,
}

/// Counts from one detection pass, for tuning and logs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DetectionDiagnostics {
    /// External components found in the mask
    pub raw_components: usize,
    /// Pixels inside the color range
    pub on_pixels: u64,
    pub after_area: usize,
    pub after_aspect: usize,
    pub after_bar_count: usize,
    pub after_bar_gap: usize,
}

/// Result of one detection pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Detection {
    pub matched: bool,
    pub regions: Vec<CandidateRegion>,
    pub diagnostics: DetectionDiagnostics,
}

impl Detection {
    pub fn none() -> Self {
        Self::default()
    }
}

/// Detector trait
///
/// Implement this trait to plug a different perception function into the watch loop.
pub trait Detector {
    /// Inspect one frame
    fn detect(&self, frame: &Frame) -> Result<Detection, DetectionError>;

    /// Get detector name (for logging)
    fn name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detection_none() {
        let detection = Detection::none();
        assert!(!detection.matched);
        assert!(detection.regions.is_empty());
        assert_eq!(detection.diagnostics, DetectionDiagnostics::default());
    }
}
