/// Color + bar-signature detector
///
/// Finds shapes in the configured color range whose size and proportions match
/// the target form, then confirms the two solid horizontal bars framing it.
/// Area and aspect alone let through too many same-colored elements; the bar
/// check rejects them without depending on the form's changing content.
use super::color::ColorMask;
use super::components::{external_components, Component, ComponentMap};
use super::detector::{CandidateRegion, Detection, DetectionDiagnostics, Detector};
use crate::capture::Frame;
use crate::config::{BarSignature, DetectionConfig};
use crate::error::DetectionError;

/// Run of consecutive bar rows, relative to the top of the bounding box
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BarGroup {
    pub first_row: u32,
    pub last_row: u32,
}

impl BarGroup {
    pub fn thickness(&self) -> u32 {
        self.last_row - self.first_row + 1
    }
}

/// Bar rows found inside one bounding box
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BarAnalysis {
    pub groups: Vec<BarGroup>,
    pub thick: Vec<BarGroup>,
}

impl BarAnalysis {
    /// Gap between the inner edges of the first and last thick bar
    pub fn distance(&self) -> Option<u32> {
        match (self.thick.first(), self.thick.last()) {
            (Some(top), Some(bottom)) if self.thick.len() >= 2 => {
                Some(bottom.first_row - top.last_row)
            }
            _ => None,
        }
    }
}

/// Why a component was dropped
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Rejection {
    AreaTooSmall,
    AreaTooLarge,
    AspectRatio,
    TooFewBars { found: usize },
    BarGapTooSmall { distance: u32 },
}

impl Rejection {
    pub fn describe(&self) -> String {
        match self {
            Rejection::AreaTooSmall => "area below minimum".to_string(),
            Rejection::AreaTooLarge => "area above maximum".to_string(),
            Rejection::AspectRatio => "aspect ratio out of range".to_string(),
            Rejection::TooFewBars { found } => format!("{} thick bar(s), need 2", found),
            Rejection::BarGapTooSmall { distance } => {
                format!("bar gap {}px too small", distance)
            }
        }
    }
}

/// Outcome for one external component
#[derive(Debug, Clone)]
pub struct ComponentVerdict {
    pub component: Component,
    pub aspect_ratio: f64,
    /// Only computed for components that reach the bar stage
    pub bars: Option<BarAnalysis>,
    pub rejection: Option<Rejection>,
}

impl ComponentVerdict {
    pub fn accepted(&self) -> bool {
        self.rejection.is_none()
    }

    fn to_region(&self) -> Option<CandidateRegion> {
        if !self.accepted() {
            return None;
        }
        let bars = self.bars.as_ref()?;
        Some(CandidateRegion {
            x: self.component.x,
            y: self.component.y,
            width: self.component.width,
            height: self.component.height,
            area: self.component.filled_area,
            aspect_ratio: self.aspect_ratio,
            bar_count: bars.thick.len(),
            bar_distance: bars.distance().unwrap_or(0),
        })
    }
}

/// Full intermediate state of one pass, kept for offline analysis
pub struct Inspection {
    pub mask: ColorMask,
    pub components: ComponentMap,
    pub verdicts: Vec<ComponentVerdict>,
}

impl Inspection {
    pub fn diagnostics(&self) -> DetectionDiagnostics {
        let passed = |pred: fn(&Option<Rejection>) -> bool| {
            self.verdicts.iter().filter(|v| pred(&v.rejection)).count()
        };

        DetectionDiagnostics {
            raw_components: self.verdicts.len(),
            on_pixels: self.mask.on_count(),
            after_area: passed(|r| {
                !matches!(r, Some(Rejection::AreaTooSmall | Rejection::AreaTooLarge))
            }),
            after_aspect: passed(|r| {
                !matches!(
                    r,
                    Some(Rejection::AreaTooSmall | Rejection::AreaTooLarge | Rejection::AspectRatio)
                )
            }),
            after_bar_count: passed(|r| {
                matches!(r, None | Some(Rejection::BarGapTooSmall { .. }))
            }),
            after_bar_gap: passed(|r| r.is_none()),
        }
    }

    pub fn regions(&self) -> Vec<CandidateRegion> {
        self.verdicts.iter().filter_map(ComponentVerdict::to_region).collect()
    }

    pub fn into_detection(self) -> Detection {
        let regions = self.regions();
        Detection {
            matched: !regions.is_empty(),
            diagnostics: self.diagnostics(),
            regions,
        }
    }
}

/// Scan the mask rows inside a component's bounding box for solid bars
pub fn bar_signature(mask: &ColorMask, component: &Component, bars: &BarSignature) -> BarAnalysis {
    let threshold = bars.row_coverage as f64 * component.width as f64;

    let mut groups: Vec<BarGroup> = Vec::new();
    for row in 0..component.height {
        let count = mask.row_on_count(component.y + row, component.x, component.width);
        if (count as f64) < threshold {
            continue;
        }
        match groups.last_mut() {
            Some(group) if group.last_row + 1 == row => group.last_row = row,
            _ => groups.push(BarGroup {
                first_row: row,
                last_row: row,
            }),
        }
    }

    let thick = groups
        .iter()
        .copied()
        .filter(|g| g.thickness() >= bars.min_thickness)
        .collect();

    BarAnalysis { groups, thick }
}

pub struct RegionDetector {
    config: DetectionConfig,
}

impl RegionDetector {
    pub fn new(config: DetectionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DetectionConfig {
        &self.config
    }

    /// Run every stage and keep the per-component verdicts
    pub fn inspect(&self, frame: &Frame) -> Result<Inspection, DetectionError> {
        if frame.width() == 0 || frame.height() == 0 {
            return Err(DetectionError::EmptyFrame {
                width: frame.width(),
                height: frame.height(),
            });
        }

        let mask = ColorMask::from_image(frame.image(), &self.config.color_range);
        let components = external_components(&mask);
        let verdicts = components
            .components()
            .iter()
            .map(|component| self.judge(&mask, component))
            .collect();

        Ok(Inspection {
            mask,
            components,
            verdicts,
        })
    }

    fn judge(&self, mask: &ColorMask, component: &Component) -> ComponentVerdict {
        let cfg = &self.config;
        let aspect_ratio = if component.height > 0 {
            component.width as f64 / component.height as f64
        } else {
            0.0
        };
        let mut verdict = ComponentVerdict {
            component: *component,
            aspect_ratio,
            bars: None,
            rejection: None,
        };

        if component.filled_area < cfg.min_area {
            verdict.rejection = Some(Rejection::AreaTooSmall);
            return verdict;
        }
        if matches!(cfg.max_area, Some(max) if component.filled_area > max) {
            verdict.rejection = Some(Rejection::AreaTooLarge);
            return verdict;
        }
        if !(cfg.aspect_min..=cfg.aspect_max).contains(&aspect_ratio) {
            verdict.rejection = Some(Rejection::AspectRatio);
            return verdict;
        }

        let bars = bar_signature(mask, component, &cfg.bars);
        verdict.rejection = match bars.distance() {
            None => Some(Rejection::TooFewBars {
                found: bars.thick.len(),
            }),
            Some(distance) if distance < cfg.bars.min_gap => {
                Some(Rejection::BarGapTooSmall { distance })
            }
            Some(_) => None,
        };
        verdict.bars = Some(bars);
        verdict
    }
}

impl Detector for RegionDetector {
    fn detect(&self, frame: &Frame) -> Result<Detection, DetectionError> {
        let detection = self.inspect(frame)?.into_detection();

        tracing::trace!(
            raw = detection.diagnostics.raw_components,
            on_pixels = detection.diagnostics.on_pixels,
            after_area = detection.diagnostics.after_area,
            after_aspect = detection.diagnostics.after_aspect,
            after_bars = detection.diagnostics.after_bar_gap,
            "Detection pass"
        );

        Ok(detection)
    }

    fn name(&self) -> &'static str {
        "RegionDetector"
    }
}
