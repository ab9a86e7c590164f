/// Detection states
///
/// Every state carries the active (unpaused) time it was entered, measured from
/// the start of the watch run.
use std::time::Duration;

/// State of the detection cycle
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum MachineState {
    /// No form seen, watching
    Waiting { since: Duration },

    /// Form visible, accumulating presence time
    Confirming { detection_start: Duration },

    /// Capture taken, waiting for the form to go away
    Captured {
        since: Duration,
        disappear_start: Option<Duration>,
        /// Consecutive matched ticks seen while disappearing
        reappear_streak: u32,
    },

    /// Quiet period after the form disappeared
    Cooldown { since: Duration },
}

/// State without its payload
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum StateKind {
    Waiting,
    Confirming,
    Captured,
    Cooldown,
}

impl StateKind {
    /// Name reported to the control surface
    pub fn name(&self) -> &'static str {
        match self {
            StateKind::Waiting => "waiting",
            StateKind::Confirming => "confirming",
            StateKind::Captured => "captured",
            StateKind::Cooldown => "cooldown",
        }
    }
}

impl std::fmt::Display for StateKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl MachineState {
    pub fn kind(&self) -> StateKind {
        match self {
            MachineState::Waiting { .. } => StateKind::Waiting,
            MachineState::Confirming { .. } => StateKind::Confirming,
            MachineState::Captured { .. } => StateKind::Captured,
            MachineState::Cooldown { .. } => StateKind::Cooldown,
        }
    }

    pub fn name(&self) -> &'static str {
        self.kind().name()
    }

    pub fn is_waiting(&self) -> bool {
        matches!(self, MachineState::Waiting { .. })
    }

    /// Time this state was entered
    pub fn entered_at(&self) -> Duration {
        match *self {
            MachineState::Waiting { since }
            | MachineState::Captured { since, .. }
            | MachineState::Cooldown { since } => since,
            MachineState::Confirming { detection_start } => detection_start,
        }
    }

    /// Whether this state shows a countdown that changes every tick
    pub fn is_timed(&self) -> bool {
        match self {
            MachineState::Confirming { .. } | MachineState::Cooldown { .. } => true,
            MachineState::Captured {
                disappear_start, ..
            } => disappear_start.is_some(),
            MachineState::Waiting { .. } => false,
        }
    }
}

impl Default for MachineState {
    fn default() -> Self {
        MachineState::Waiting {
            since: Duration::ZERO,
        }
    }
}
