/// Global hotkeys
///
/// F8 toggles pause, F9 cancels the running confirmation, F10 stops watching.
/// Works while another window has focus. On macOS the terminal needs the
/// Accessibility permission.
use rdev::{listen, Event, EventType, Key};
use std::collections::HashSet;
use std::thread;

use crate::messaging::{Command, ControlSignals};

/// Command bound to `key`, if any
pub fn command_for(key: Key) -> Option<Command> {
    match key {
        Key::F8 => Some(Command::TogglePause),
        Key::F9 => Some(Command::Cancel),
        Key::F10 => Some(Command::Stop),
        _ => None,
    }
}

/// Turns raw key events into commands, once per physical press
#[derive(Debug, Default)]
pub struct HotkeyState {
    held: HashSet<Key>,
}

impl HotkeyState {
    /// Held keys auto-repeat; only the first press counts
    pub fn handle(&mut self, event_type: &EventType) -> Option<Command> {
        match *event_type {
            EventType::KeyPress(key) => {
                let command = command_for(key)?;
                self.held.insert(key).then_some(command)
            }
            EventType::KeyRelease(key) => {
                self.held.remove(&key);
                None
            }
            _ => None,
        }
    }
}

/// Start listening on a background thread
///
/// The listener blocks for the life of the process; failures are logged and
/// the watcher keeps running without hotkeys.
pub fn spawn_listener(signals: ControlSignals) -> std::io::Result<thread::JoinHandle<()>> {
    thread::Builder::new()
        .name("hotkeys".to_string())
        .spawn(move || {
            let mut state = HotkeyState::default();
            if let Err(e) = listen(move |event: Event| {
                if let Some(command) = state.handle(&event.event_type) {
                    tracing::info!("Hotkey: {}", command.description());
                    signals.apply(command);
                }
            }) {
                tracing::warn!("Hotkeys unavailable: {:?}", e);
            }
        })
}
