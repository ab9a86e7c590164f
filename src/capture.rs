use image::{imageops, RgbaImage};
use std::path::Path;
use xcap::Monitor;

use crate::error::CaptureError;

/// One screen image, read-only once produced
#[derive(Debug, Clone)]
pub struct Frame {
    image: RgbaImage,
}

impl Frame {
    pub fn new(image: RgbaImage) -> Self {
        Self { image }
    }

    /// Load a saved screenshot (used by the offline analysis commands)
    pub fn open(path: &Path) -> Result<Self, image::ImageError> {
        Ok(Self::new(image::open(path)?.to_rgba8()))
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }
}

/// Represents a screen region to capture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl CaptureRegion {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    pub fn from_array(arr: [u32; 4]) -> Self {
        Self::new(arr[0], arr[1], arr[2], arr[3])
    }

    pub fn to_array(self) -> [u32; 4] {
        [self.x, self.y, self.width, self.height]
    }

    /// Intersect with a `width` x `height` screen. None if nothing is left.
    pub fn clamp_to(self, width: u32, height: u32) -> Option<Self> {
        if self.x >= width || self.y >= height {
            return None;
        }
        let w = self.width.min(width - self.x);
        let h = self.height.min(height - self.y);
        if w == 0 || h == 0 {
            return None;
        }
        Some(Self::new(self.x, self.y, w, h))
    }
}

/// Anything that can hand out the current screen image
pub trait FrameSource {
    fn capture(&mut self) -> Result<Frame, CaptureError>;
}

/// Display summary for the `monitors` command and startup logging
#[derive(Clone, Debug)]
pub struct MonitorSummary {
    pub index: usize,
    pub label: String,
}

pub fn monitor_summaries() -> Result<Vec<MonitorSummary>, CaptureError> {
    let monitors = Monitor::all().map_err(|e| CaptureError::Unavailable(e.to_string().into()))?;
    Ok(monitors
        .into_iter()
        .enumerate()
        .map(|(idx, monitor)| {
            let width = monitor.width().unwrap_or(0);
            let height = monitor.height().unwrap_or(0);
            let name = monitor.name().unwrap_or_else(|_| "Unknown".to_string());
            MonitorSummary {
                index: idx,
                label: format!("Display {} · {}x{} ({})", idx + 1, width, height, name),
            }
        })
        .collect())
}

/// Screen grabber backed by `xcap`
///
/// # Platform Notes
/// - macOS requires the Screen Recording permission
///   (System Settings > Privacy & Security > Screen Recording)
/// - The monitor handle is resolved once and reused for every tick
/// - The optional region is cropped after capture, clamped to the physical image size
pub struct ScreenCapture {
    monitor: Monitor,
    region: Option<CaptureRegion>,
}

impl ScreenCapture {
    pub fn new(monitor_index: usize, region: Option<CaptureRegion>) -> Result<Self, CaptureError> {
        let monitors = Monitor::all().map_err(|e| CaptureError::Unavailable(e.to_string().into()))?;
        if monitors.is_empty() {
            return Err(CaptureError::NoDisplays);
        }

        let available = monitors.len();
        let monitor = monitors
            .into_iter()
            .nth(monitor_index)
            .ok_or(CaptureError::InvalidDisplayIndex {
                index: monitor_index,
                available,
            })?;

        if let Some(region) = region {
            let width = monitor.width().unwrap_or(0);
            let height = monitor.height().unwrap_or(0);
            if width > 0 && height > 0 && region.clamp_to(width, height).is_none() {
                return Err(CaptureError::RegionOutOfBounds {
                    region: region.to_array(),
                    width,
                    height,
                });
            }
        }

        tracing::info!(
            "Screen capture ready on display {} (region: {:?})",
            monitor_index + 1,
            region.map(CaptureRegion::to_array)
        );

        Ok(Self { monitor, region })
    }
}

impl FrameSource for ScreenCapture {
    fn capture(&mut self) -> Result<Frame, CaptureError> {
        let image = self.monitor.capture_image().map_err(|e| {
            let message = e.to_string();

            #[cfg(target_os = "macos")]
            if message.contains("permission") || message.contains("denied") {
                return CaptureError::Unavailable(
                    format!(
                        "Screen Recording permission required. Enable it under \
                         System Settings > Privacy & Security > Screen Recording \
                         and restart. Cause: {}",
                        message
                    )
                    .into(),
                );
            }

            CaptureError::Unavailable(message.into())
        })?;

        let Some(region) = self.region else {
            return Ok(Frame::new(image));
        };

        let region = region
            .clamp_to(image.width(), image.height())
            .ok_or(CaptureError::RegionOutOfBounds {
                region: region.to_array(),
                width: image.width(),
                height: image.height(),
            })?;

        let cropped =
            imageops::crop_imm(&image, region.x, region.y, region.width, region.height).to_image();
        Ok(Frame::new(cropped))
    }
}
