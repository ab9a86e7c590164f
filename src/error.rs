use thiserror::Error;

/// Domain errors using thiserror for structured error handling.
///
/// None of these stop the watch loop on their own: capture and detection
/// failures count as "not detected" for the tick, persistence failures lose
/// that one capture. Only startup failures (config, no usable display) abort.

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("Screen capture unavailable: {0}")]
    Unavailable(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("No displays found")]
    NoDisplays,

    #[error("Invalid display index: {index} ({available} available)")]
    InvalidDisplayIndex { index: usize, available: usize },

    #[error("Capture region {region:?} lies outside the {width}x{height} screen")]
    RegionOutOfBounds {
        region: [u32; 4],
        width: u32,
        height: u32,
    },
}

#[derive(Error, Debug)]
pub enum DetectionError {
    #[error("Frame has no pixels ({width}x{height})")]
    EmptyFrame { width: u32, height: u32 },

    #[error("Pixel ({x}, {y}) is outside the {width}x{height} frame")]
    OutOfBounds {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    },
}

#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("Failed to write capture to {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to encode capture {path}: {source}")]
    Encode {
        path: String,
        #[source]
        source: image::ImageError,
    },

    #[error("Unsupported capture format: {0}")]
    UnsupportedFormat(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration from {path}")]
    LoadFailed {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Failed to save configuration to {path}")]
    SaveFailed {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Failed to create config directory: {path}")]
    DirectoryCreationFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Type alias for application Results using anyhow for context chaining
pub type AppResult<T> = anyhow::Result<T>;
