//! Watch the screen for a specific on-screen form and save a screenshot once
//! it has been stably visible.
//!
//! The pipeline per tick is `FrameSource` → `RegionDetector` →
//! `DetectionStateMachine` → `CaptureSink`, driven by `Watcher`.

pub mod analysis;
pub mod capture;
pub mod config;
pub mod detection;
pub mod error;
pub mod hotkeys;
pub mod messaging;
pub mod sink;
pub mod state;
pub mod utils;
pub mod watcher;

pub use capture::{CaptureRegion, Frame, FrameSource, ScreenCapture};
pub use config::{BarSignature, CaptureConfig, ColorRange, Config, DetectionConfig, OutputConfig};
pub use detection::{Detection, Detector, RegionDetector};
pub use error::{AppResult, CaptureError, ConfigError, DetectionError, PersistenceError};
pub use messaging::{Command, ControlSignals, ControlSurface, Event, EventBus};
pub use sink::{CaptureRecord, CaptureSink, DirectorySink};
pub use state::{DetectionStateMachine, MachineState, StateKind, Tick, Transition};
pub use watcher::{StopReason, WatchSummary, Watcher};
