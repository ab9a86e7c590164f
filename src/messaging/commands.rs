/// Command types for the watcher
///
/// Commands represent requests from the operator (imperative). Hotkeys and the
/// Ctrl+C handler turn input into commands; `ControlSignals::apply` executes them.

/// Operator commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Flip between paused and running
    TogglePause,

    /// Force the paused flag
    SetPaused(bool),

    /// Abort the current confirmation, back to waiting
    Cancel,

    /// End the watch loop
    Stop,
}

impl Command {
    /// Get a human-readable description of the command
    pub fn description(&self) -> &'static str {
        match self {
            Command::TogglePause => "Toggle pause",
            Command::SetPaused(true) => "Pause",
            Command::SetPaused(false) => "Resume",
            Command::Cancel => "Cancel confirmation",
            Command::Stop => "Stop",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_description() {
        assert_eq!(Command::TogglePause.description(), "Toggle pause");
        assert_eq!(Command::SetPaused(false).description(), "Resume");
        assert_eq!(Command::Stop.description(), "Stop");
    }
}
