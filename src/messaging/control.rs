/// Control surface between the watch loop and the outside world
///
/// Inbound: three atomic flags (`paused`, `stop`, `cancel`) that any thread may
/// set and the watch loop reads once per tick. Outbound: `ControlSurface`
/// callbacks invoked by the watch loop only.
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::commands::Command;
use crate::sink::CaptureRecord;

/// Outbound notifications from the watch loop
pub trait ControlSurface {
    /// New state name plus progress text (may be empty)
    fn on_state_changed(&self, state: &str, info: &str);

    /// A capture was persisted; `count` is the running total
    fn on_capture_completed(&self, count: u64, record: &CaptureRecord);

    /// Non-fatal problem worth showing to the operator
    fn on_warning(&self, message: &str);
}

/// Surface that drops every notification
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSurface;

impl ControlSurface for NullSurface {
    fn on_state_changed(&self, _state: &str, _info: &str) {}
    fn on_capture_completed(&self, _count: u64, _record: &CaptureRecord) {}
    fn on_warning(&self, _message: &str) {}
}

/// Shared control flags
///
/// Cloning shares the same flags.
#[derive(Debug, Clone, Default)]
pub struct ControlSignals {
    paused: Arc<AtomicBool>,
    stop: Arc<AtomicBool>,
    cancel: Arc<AtomicBool>,
}

impl ControlSignals {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starting_paused(paused: bool) -> Self {
        let signals = Self::new();
        signals.pause_toggled(paused);
        signals
    }

    /// Set the paused flag
    pub fn pause_toggled(&self, paused: bool) {
        self.paused.store(paused, Ordering::SeqCst);
    }

    /// Flip the paused flag, returns the new value
    pub fn toggle_pause(&self) -> bool {
        !self.paused.fetch_xor(true, Ordering::SeqCst)
    }

    pub fn stop_requested(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    pub fn cancel_requested(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    pub fn should_stop(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    /// Read and clear the cancel flag
    pub fn take_cancel(&self) -> bool {
        self.cancel.swap(false, Ordering::SeqCst)
    }

    /// Execute an operator command
    pub fn apply(&self, command: Command) {
        tracing::debug!("Command: {}", command.description());
        match command {
            Command::TogglePause => {
                let paused = self.toggle_pause();
                tracing::info!("{}", if paused { "Paused" } else { "Resumed" });
            }
            Command::SetPaused(paused) => self.pause_toggled(paused),
            Command::Cancel => self.cancel_requested(),
            Command::Stop => self.stop_requested(),
        }
    }
}
