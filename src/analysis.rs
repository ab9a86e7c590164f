/// Offline analysis of saved screenshots
///
/// Tools for picking detection settings: per-component reports with the stage
/// that rejected each shape, annotated images, settings recommendations from a
/// set of screenshots, and single-pixel color readout.
use image::{Rgba, RgbaImage};
use std::fmt::Write as _;

use crate::capture::Frame;
use crate::config::{ColorRange, DetectionConfig};
use crate::detection::{
    rgb_to_hsv, BarAnalysis, Component, DetectionDiagnostics, Inspection,
    RegionDetector, Rejection,
};
use crate::error::DetectionError;

const ACCEPTED: Rgba<u8> = Rgba([0, 200, 0, 255]);
const REJECTED: Rgba<u8> = Rgba([220, 0, 0, 255]);
const BOX_THICKNESS: u32 = 3;

/// One external component and what the detector made of it
#[derive(Debug, Clone)]
pub struct ComponentReport {
    pub component: Component,
    pub aspect_ratio: f64,
    /// Mean HSV of the in-range pixels
    pub mean_hsv: [f64; 3],
    pub bars: Option<BarAnalysis>,
    pub rejection: Option<Rejection>,
}

impl ComponentReport {
    pub fn accepted(&self) -> bool {
        self.rejection.is_none()
    }
}

#[derive(Debug, Clone)]
pub struct AnalysisReport {
    pub width: u32,
    pub height: u32,
    pub diagnostics: DetectionDiagnostics,
    /// Components with a filled area of at least the requested minimum
    pub components: Vec<ComponentReport>,
}

impl AnalysisReport {
    pub fn matched(&self) -> bool {
        self.diagnostics.after_bar_gap > 0
    }

    /// Human-readable report
    pub fn render(&self) -> String {
        let mut out = String::new();
        let d = &self.diagnostics;

        let _ = writeln!(out, "Frame: {}x{}", self.width, self.height);
        let _ = writeln!(out, "In-range pixels: {}", d.on_pixels);
        let _ = writeln!(
            out,
            "Components: {} raw, {} after area, {} after aspect, {} after bar count, {} after bar gap",
            d.raw_components, d.after_area, d.after_aspect, d.after_bar_count, d.after_bar_gap
        );
        let _ = writeln!(out, "Match: {}", if self.matched() { "yes" } else { "no" });

        for (i, report) in self.components.iter().enumerate() {
            let c = &report.component;
            let _ = writeln!(out);
            let _ = writeln!(
                out,
                "[{}] {} at ({}, {}) size {}x{}",
                i + 1,
                if report.accepted() { "ACCEPTED" } else { "rejected" },
                c.x,
                c.y,
                c.width,
                c.height
            );
            let _ = writeln!(
                out,
                "    area {} (on-pixels {}), aspect {:.2}",
                c.filled_area, c.on_pixels, report.aspect_ratio
            );
            let _ = writeln!(
                out,
                "    mean HSV ({:.1}, {:.1}, {:.1})",
                report.mean_hsv[0], report.mean_hsv[1], report.mean_hsv[2]
            );
            if let Some(bars) = &report.bars {
                let _ = writeln!(
                    out,
                    "    bar groups {}, thick bars {}, distance {}",
                    bars.groups.len(),
                    bars.thick.len(),
                    bars.distance()
                        .map(|d| format!("{d}px"))
                        .unwrap_or_else(|| "-".to_string())
                );
            }
            if let Some(rejection) = &report.rejection {
                let _ = writeln!(out, "    rejected: {}", rejection.describe());
            }
        }
        out
    }
}

/// Run the detector on `frame` and report every component of at least `min_area`
pub fn analyze(
    frame: &Frame,
    detector: &RegionDetector,
    min_area: u64,
) -> Result<AnalysisReport, DetectionError> {
    let inspection = detector.inspect(frame)?;
    let means = mean_hsv_by_component(frame, &inspection);

    let components = inspection
        .verdicts
        .iter()
        .zip(means)
        .filter(|(verdict, _)| verdict.component.filled_area >= min_area)
        .map(|(verdict, mean_hsv)| ComponentReport {
            component: verdict.component,
            aspect_ratio: verdict.aspect_ratio,
            mean_hsv,
            bars: verdict.bars.clone(),
            rejection: verdict.rejection,
        })
        .collect();

    Ok(AnalysisReport {
        width: frame.width(),
        height: frame.height(),
        diagnostics: inspection.diagnostics(),
        components,
    })
}

fn mean_hsv_by_component(frame: &Frame, inspection: &Inspection) -> Vec<[f64; 3]> {
    let map = &inspection.components;
    let mut sums = vec![([0f64; 3], 0u64); map.components().len()];

    for (index, component) in map.components().iter().enumerate() {
        for y in component.y..component.y + component.height {
            for x in component.x..component.x + component.width {
                if map.label_at(x, y) != Some(index) || !inspection.mask.is_on(x, y) {
                    continue;
                }
                let [r, g, b, _] = frame.image().get_pixel(x, y).0;
                let hsv = rgb_to_hsv(r, g, b);
                let (sum, count) = &mut sums[index];
                for channel in 0..3 {
                    sum[channel] += hsv[channel] as f64;
                }
                *count += 1;
            }
        }
    }

    sums.into_iter()
        .map(|(sum, count)| {
            if count == 0 {
                [0.0; 3]
            } else {
                sum.map(|s| s / count as f64)
            }
        })
        .collect()
}

/// Copy of the frame with a box around every reported component
pub fn annotate(frame: &Frame, report: &AnalysisReport) -> RgbaImage {
    let mut image = frame.image().clone();
    for component in &report.components {
        let color = if component.accepted() { ACCEPTED } else { REJECTED };
        draw_box(&mut image, &component.component, color);
    }
    image
}

fn draw_box(image: &mut RgbaImage, c: &Component, color: Rgba<u8>) {
    let (width, height) = image.dimensions();
    let x1 = (c.x + c.width).min(width);
    let y1 = (c.y + c.height).min(height);

    for y in c.y..y1 {
        for x in c.x..x1 {
            let on_edge = x < c.x + BOX_THICKNESS
                || x + BOX_THICKNESS >= x1
                || y < c.y + BOX_THICKNESS
                || y + BOX_THICKNESS >= y1;
            if on_edge {
                image.put_pixel(x, y, color);
            }
        }
    }
}

/// Color reading for one pixel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelColor {
    pub x: u32,
    pub y: u32,
    pub rgb: [u8; 3],
    pub hsv: [u8; 3],
}

pub fn pick_color(frame: &Frame, x: u32, y: u32) -> Result<PixelColor, DetectionError> {
    if x >= frame.width() || y >= frame.height() {
        return Err(DetectionError::OutOfBounds {
            x,
            y,
            width: frame.width(),
            height: frame.height(),
        });
    }
    let [r, g, b, _] = frame.image().get_pixel(x, y).0;
    Ok(PixelColor {
        x,
        y,
        rgb: [r, g, b],
        hsv: rgb_to_hsv(r, g, b),
    })
}

/// A form-sized shape found in one screenshot
#[derive(Debug, Clone, PartialEq)]
pub struct FormSample {
    pub source: String,
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub area: u64,
    pub aspect_ratio: f64,
    pub mean_hsv: [f64; 3],
}

/// Shapes within `range` of at least `min_area`, ignoring the shape filters
pub fn collect_samples(
    frame: &Frame,
    source: &str,
    range: &ColorRange,
    min_area: u64,
) -> Result<Vec<FormSample>, DetectionError> {
    let config = DetectionConfig {
        color_range: *range,
        min_area: min_area.max(1),
        max_area: None,
        aspect_min: f64::MIN_POSITIVE,
        aspect_max: f64::MAX,
        ..DetectionConfig::default()
    };
    let report = analyze(frame, &RegionDetector::new(config), min_area)?;

    Ok(report
        .components
        .into_iter()
        .map(|c| FormSample {
            source: source.to_string(),
            x: c.component.x,
            y: c.component.y,
            width: c.component.width,
            height: c.component.height,
            area: c.component.filled_area,
            aspect_ratio: c.aspect_ratio,
            mean_hsv: c.mean_hsv,
        })
        .collect())
}

/// Summary statistics of one measured quantity
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleStats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub median: f64,
    pub std_dev: f64,
}

impl SampleStats {
    pub fn of(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let mut sorted = values.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));

        let n = sorted.len();
        let mean = sorted.iter().sum::<f64>() / n as f64;
        let median = if n % 2 == 1 {
            sorted[n / 2]
        } else {
            (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
        };
        // Population standard deviation
        let variance = sorted.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n as f64;

        Some(Self {
            min: sorted[0],
            max: sorted[n - 1],
            mean,
            median,
            std_dev: variance.sqrt(),
        })
    }
}

/// Suggested settings derived from measured forms
#[derive(Debug, Clone, PartialEq)]
pub struct Recommendation {
    pub samples: usize,
    pub area: SampleStats,
    pub aspect: SampleStats,
    pub hue: SampleStats,
    pub saturation: SampleStats,
    pub value: SampleStats,

    pub color_range: ColorRange,
    pub min_area: u64,
    pub aspect_min: f64,
    pub aspect_max: f64,

    /// Tighter variant built around the medians
    pub strict_min_area: u64,
    pub strict_aspect_min: f64,
    pub strict_aspect_max: f64,
}

pub fn recommend(samples: &[FormSample]) -> Option<Recommendation> {
    let stats = |f: fn(&FormSample) -> f64| {
        SampleStats::of(&samples.iter().map(f).collect::<Vec<_>>())
    };
    let area = stats(|s| s.area as f64)?;
    let aspect = stats(|s| s.aspect_ratio)?;
    let hue = stats(|s| s.mean_hsv[0])?;
    let saturation = stats(|s| s.mean_hsv[1])?;
    let value = stats(|s| s.mean_hsv[2])?;

    let clamp = |v: f64, max: f64| v.clamp(0.0, max) as u8;
    let color_range = ColorRange::new(
        [
            clamp(hue.min - 5.0, 179.0),
            clamp(saturation.min - 10.0, 255.0),
            clamp(value.min - 20.0, 255.0),
        ],
        [
            clamp(hue.max + 5.0, 179.0),
            clamp(saturation.max + 10.0, 255.0),
            255,
        ],
    );

    Some(Recommendation {
        samples: samples.len(),
        area,
        aspect,
        hue,
        saturation,
        value,
        color_range,
        min_area: (area.min * 0.9) as u64,
        aspect_min: aspect.min * 0.85,
        aspect_max: aspect.max * 1.15,
        strict_min_area: (area.median * 0.8) as u64,
        strict_aspect_min: aspect.median * 0.9,
        strict_aspect_max: aspect.median * 1.1,
    })
}

impl Recommendation {
    /// Write the recommended (non-strict) values into `config`
    pub fn apply_to(&self, config: &mut DetectionConfig) {
        config.color_range = self.color_range;
        config.min_area = self.min_area.max(1);
        config.aspect_min = self.aspect_min;
        config.aspect_max = self.aspect_max;
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        let row = |out: &mut String, name: &str, s: &SampleStats| {
            let _ = writeln!(
                out,
                "  {:<12} min {:>10.2}  max {:>10.2}  mean {:>10.2}  median {:>10.2}  std {:>9.2}",
                name, s.min, s.max, s.mean, s.median, s.std_dev
            );
        };

        let _ = writeln!(out, "Forms measured: {}", self.samples);
        row(&mut out, "area", &self.area);
        row(&mut out, "aspect", &self.aspect);
        row(&mut out, "hue", &self.hue);
        row(&mut out, "saturation", &self.saturation);
        row(&mut out, "value", &self.value);

        let _ = writeln!(out);
        let _ = writeln!(out, "Recommended:");
        let _ = writeln!(
            out,
            "  color_range  {:?} .. {:?}",
            self.color_range.low, self.color_range.high
        );
        let _ = writeln!(out, "  min_area     {}", self.min_area);
        let _ = writeln!(
            out,
            "  aspect       {:.2} .. {:.2}",
            self.aspect_min, self.aspect_max
        );
        let _ = writeln!(out);
        let _ = writeln!(out, "Strict (fewer false positives):");
        let _ = writeln!(out, "  min_area     {}", self.strict_min_area);
        let _ = writeln!(
            out,
            "  aspect       {:.2} .. {:.2}",
            self.strict_aspect_min, self.strict_aspect_max
        );
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FORM: Rgba<u8> = Rgba([91, 104, 220, 255]);
    const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);

    fn fill(image: &mut RgbaImage, x: u32, y: u32, w: u32, h: u32) {
        for yy in y..y + h {
            for xx in x..x + w {
                image.put_pixel(xx, yy, FORM);
            }
        }
    }

    /// One framed form plus one solid block of the same color
    fn screenshot() -> Frame {
        let mut image = RgbaImage::from_pixel(500, 200, WHITE);
        // Framed form 200x100 at (20, 20) with 12px bars
        fill(&mut image, 20, 20, 200, 12);
        fill(&mut image, 20, 108, 200, 12);
        fill(&mut image, 20, 20, 4, 100);
        fill(&mut image, 216, 20, 4, 100);
        // Solid block 150x100 at (300, 40)
        fill(&mut image, 300, 40, 150, 100);
        Frame::new(image)
    }

    fn detector() -> RegionDetector {
        RegionDetector::new(DetectionConfig {
            min_area: 5_000,
            max_area: Some(50_000),
            aspect_min: 1.0,
            aspect_max: 3.0,
            ..DetectionConfig::default()
        })
    }

    #[test]
    fn test_analyze_reports_rejection_stage() {
        let report = analyze(&screenshot(), &detector(), 100).unwrap();

        assert_eq!(report.components.len(), 2);
        assert!(report.matched());

        let form = &report.components[0];
        assert!(form.accepted());
        assert_eq!(form.component.filled_area, 20_000);

        let block = &report.components[1];
        assert_eq!(block.rejection, Some(Rejection::TooFewBars { found: 1 }));

        let text = report.render();
        assert!(text.contains("ACCEPTED"));
        assert!(text.contains("1 thick bar(s), need 2"));
    }

    #[test]
    fn test_mean_hsv_uses_in_range_pixels() {
        let report = analyze(&screenshot(), &detector(), 100).unwrap();
        let expected = rgb_to_hsv(91, 104, 220);
        for component in &report.components {
            for channel in 0..3 {
                assert!((component.mean_hsv[channel] - expected[channel] as f64).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn test_min_area_hides_small_components() {
        let report = analyze(&screenshot(), &detector(), 16_000).unwrap();
        assert_eq!(report.components.len(), 1);
        // Diagnostics still count everything
        assert_eq!(report.diagnostics.raw_components, 2);
    }

    #[test]
    fn test_annotate_draws_colored_boxes() {
        let frame = screenshot();
        let report = analyze(&frame, &detector(), 100).unwrap();
        let annotated = annotate(&frame, &report);

        assert_eq!(*annotated.get_pixel(20, 20), ACCEPTED);
        assert_eq!(*annotated.get_pixel(219, 119), ACCEPTED);
        assert_eq!(*annotated.get_pixel(300, 40), REJECTED);
        // Inside of the box is untouched
        assert_eq!(*annotated.get_pixel(100, 60), WHITE);
    }

    #[test]
    fn test_pick_color() {
        let frame = screenshot();
        let color = pick_color(&frame, 25, 25).unwrap();
        assert_eq!(color.rgb, [91, 104, 220]);
        assert_eq!(color.hsv, rgb_to_hsv(91, 104, 220));

        assert!(matches!(
            pick_color(&frame, 500, 0),
            Err(DetectionError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn test_collect_samples_ignores_shape_filters() {
        let range = DetectionConfig::default().color_range;
        let samples = collect_samples(&screenshot(), "shot.png", &range, 10_000).unwrap();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[1].area, 15_000);
        assert_eq!(samples[0].source, "shot.png");
    }

    #[test]
    fn test_sample_stats() {
        let stats = SampleStats::of(&[4.0, 1.0, 3.0, 2.0]).unwrap();
        assert_eq!(stats.min, 1.0);
        assert_eq!(stats.max, 4.0);
        assert_eq!(stats.mean, 2.5);
        assert_eq!(stats.median, 2.5);
        assert!((stats.std_dev - 1.25f64.sqrt()).abs() < 1e-12);
        assert!(SampleStats::of(&[]).is_none());
    }

    fn sample(area: u64, aspect: f64, hsv: [f64; 3]) -> FormSample {
        FormSample {
            source: "s".to_string(),
            x: 0,
            y: 0,
            width: 0,
            height: 0,
            area,
            aspect_ratio: aspect,
            mean_hsv: hsv,
        }
    }

    #[test]
    fn test_recommendation_formulas() {
        let samples = vec![
            sample(40_000, 1.4, [115.0, 50.0, 230.0]),
            sample(50_000, 1.6, [118.0, 60.0, 240.0]),
            sample(60_000, 1.5, [120.0, 55.0, 250.0]),
        ];
        let rec = recommend(&samples).unwrap();

        assert_eq!(rec.samples, 3);
        assert_eq!(rec.min_area, 36_000);
        assert!((rec.aspect_min - 1.4 * 0.85).abs() < 1e-9);
        assert!((rec.aspect_max - 1.6 * 1.15).abs() < 1e-9);
        assert_eq!(rec.color_range.low, [110, 40, 210]);
        assert_eq!(rec.color_range.high, [125, 70, 255]);
        assert_eq!(rec.strict_min_area, 40_000);
        assert!((rec.strict_aspect_min - 1.35).abs() < 1e-9);
        assert!((rec.strict_aspect_max - 1.65).abs() < 1e-9);

        let mut config = DetectionConfig::default();
        rec.apply_to(&mut config);
        assert_eq!(config.min_area, 36_000);
        assert!(config.validate().is_ok());
        assert!(rec.render().contains("Strict"));
    }

    #[test]
    fn test_recommendation_clamps_hsv() {
        let rec = recommend(&[sample(1_000, 1.0, [177.0, 250.0, 10.0])]).unwrap();
        assert_eq!(rec.color_range.low, [172, 240, 0]);
        assert_eq!(rec.color_range.high, [179, 255, 255]);
    }

    #[test]
    fn test_recommend_without_samples() {
        assert!(recommend(&[]).is_none());
    }
}
