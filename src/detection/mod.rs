/// Detection module
///
/// Turns one screen frame into "is the target form visible".
///
/// ## Architecture
///
/// ```text
/// RegionDetector
///   ├── ColorMask        (RGB → HSV, in-range mask)
///   ├── ComponentMap     (external shapes, holes filled)
///   ├── area / aspect    (size filters)
///   └── bar signature    (two thick horizontal bars framing the content)
/// ```
///
/// ## Usage
///
/// ```rust,ignore
/// use detection::{Detector, RegionDetector};
///
/// let detector = RegionDetector::new(config.detection.clone());
/// let detection = detector.detect(&frame)?;
/// if detection.matched {
///     println!("Form at {:?}", detection.regions[0]);
/// }
/// ```

pub mod color;
pub mod components;
pub mod detector;
pub mod region_detector;

// Re-export commonly used types
pub use color::{rgb_to_hsv, ColorMask};
pub use components::{external_components, Component, ComponentMap};
pub use detector::{CandidateRegion, Detection, DetectionDiagnostics, Detector};
pub use region_detector::{
    bar_signature, BarAnalysis, BarGroup, ComponentVerdict, Inspection, RegionDetector, Rejection,
};
