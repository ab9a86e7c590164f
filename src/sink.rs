/// Capture persistence
///
/// Each confirmed appearance is written once as
/// `screenshot_{seq:04}_{YYYYMMDD_HHMMSS}.{ext}`. The sequence number only
/// advances on a successful write, and files are opened create-new so an
/// existing artifact is never overwritten.
use chrono::{DateTime, Local};
use image::{DynamicImage, ImageFormat};
use std::fs::{self, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::capture::Frame;
use crate::error::PersistenceError;

/// One persisted capture
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureRecord {
    pub sequence: u32,
    pub timestamp: DateTime<Local>,
    pub path: PathBuf,
}

impl CaptureRecord {
    /// File name of the artifact
    pub fn artifact_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Anything that can persist a captured frame
pub trait CaptureSink {
    fn save(&mut self, frame: &Frame) -> Result<CaptureRecord, PersistenceError>;
}

pub fn artifact_file_name(sequence: u32, timestamp: &DateTime<Local>, extension: &str) -> String {
    format!(
        "screenshot_{:04}_{}.{}",
        sequence,
        timestamp.format("%Y%m%d_%H%M%S"),
        extension
    )
}

/// Writes captures into one directory
pub struct DirectorySink {
    directory: PathBuf,
    format: ImageFormat,
    extension: String,
    last_sequence: u32,
}

impl DirectorySink {
    /// `format` is a file extension ("png", "jpg", "jpeg")
    pub fn new(directory: impl Into<PathBuf>, format: &str) -> Result<Self, PersistenceError> {
        let extension = format.to_ascii_lowercase();
        let format = match extension.as_str() {
            "png" => ImageFormat::Png,
            "jpg" | "jpeg" => ImageFormat::Jpeg,
            _ => return Err(PersistenceError::UnsupportedFormat(extension)),
        };

        let directory = directory.into();
        fs::create_dir_all(&directory).map_err(|source| PersistenceError::Io {
            path: directory.display().to_string(),
            source,
        })?;

        Ok(Self {
            directory,
            format,
            extension,
            last_sequence: 0,
        })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Number of captures written so far
    pub fn saved_count(&self) -> u32 {
        self.last_sequence
    }

    fn write_image(&self, frame: &Frame, path: &Path) -> Result<(), PersistenceError> {
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .map_err(|source| PersistenceError::Io {
                path: path.display().to_string(),
                source,
            })?;
        let mut writer = BufWriter::new(file);

        let encoded = match self.format {
            // JPEG has no alpha channel
            ImageFormat::Jpeg => DynamicImage::ImageRgba8(frame.image().clone())
                .to_rgb8()
                .write_to(&mut writer, self.format),
            _ => frame.image().write_to(&mut writer, self.format),
        };

        let result = encoded
            .map_err(|source| PersistenceError::Encode {
                path: path.display().to_string(),
                source,
            })
            .and_then(|_| {
                writer.flush().map_err(|source| PersistenceError::Io {
                    path: path.display().to_string(),
                    source,
                })
            });

        if result.is_err() {
            // Leave no half-written artifact behind
            let _ = fs::remove_file(path);
        }
        result
    }
}

impl DirectorySink {
    /// Write `frame` stamped with `timestamp`
    pub fn save_at(
        &mut self,
        frame: &Frame,
        timestamp: DateTime<Local>,
    ) -> Result<CaptureRecord, PersistenceError> {
        let sequence = self.last_sequence + 1;
        let path = self
            .directory
            .join(artifact_file_name(sequence, &timestamp, &self.extension));

        self.write_image(frame, &path)?;
        self.last_sequence = sequence;

        tracing::info!("Screenshot saved: {}", path.display());

        Ok(CaptureRecord {
            sequence,
            timestamp,
            path,
        })
    }
}

impl CaptureSink for DirectorySink {
    fn save(&mut self, frame: &Frame) -> Result<CaptureRecord, PersistenceError> {
        self.save_at(frame, Local::now())
    }
}
