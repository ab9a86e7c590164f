/// Messaging module for Event/Command architecture
///
/// - **Commands**: operator requests (pause, cancel, stop), applied to `ControlSignals`
/// - **Events**: what the watch loop did (state changes, captures, warnings), broadcast
///
/// ## Architecture
///
/// ```text
/// ┌──────────┐  Command   ┌────────────────┐  flags   ┌────────────┐
/// │ Hotkeys  │ ─────────> │ ControlSignals │ ───────> │ Watch loop │
/// │ Ctrl+C   │            └────────────────┘          └────────────┘
/// └──────────┘                                              │
///                                                           │ ControlSurface
///                                                           ▼
///                                                    ┌─────────────┐
///                                                    │  Event Bus  │ ──> status reporter
///                                                    └─────────────┘
/// ```
///
/// ## Usage
///
/// ```rust,ignore
/// let bus = EventBus::new();
/// let rx = bus.subscribe();
///
/// let signals = ControlSignals::new();
/// signals.apply(Command::TogglePause);
///
/// while let Ok(event) = rx.recv() {
///     println!("{}", event.summary());
/// }
/// ```

pub mod bus;
pub mod commands;
pub mod control;
pub mod events;

// Re-export commonly used types
pub use bus::EventBus;
pub use commands::Command;
pub use control::{ControlSignals, ControlSurface, NullSurface};
pub use events::Event;
