/// State management module
///
/// The detection state machine that turns per-tick "form visible" signals into
/// capture events.

pub mod machine;
pub mod machine_state;

// Re-export commonly used types
pub use machine::{DetectionStateMachine, Tick, Transition};
pub use machine_state::{MachineState, StateKind};
