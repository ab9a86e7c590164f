/// Event types for the watcher
///
/// Events represent things that have happened (past tense).
/// They are broadcast to all subscribers.
use crate::sink::CaptureRecord;

/// Watcher events
#[derive(Debug, Clone)]
pub enum Event {
    /// The displayed state changed, or its progress info was refreshed
    StateChanged { state: String, info: String },

    /// A capture was written to disk
    CaptureCompleted { count: u64, record: CaptureRecord },

    /// Something went wrong but the watcher keeps running
    Warning { message: String },

    /// The watch loop has exited
    Stopped { captures: u64 },
}

impl Event {
    /// One-line summary for logs and the console
    pub fn summary(&self) -> String {
        match self {
            Event::StateChanged { state, info } if info.is_empty() => state.clone(),
            Event::StateChanged { state, info } => format!("{state}: {info}"),
            Event::CaptureCompleted { count, record } => {
                format!("capture #{count} -> {}", record.artifact_name())
            }
            Event::Warning { message } => format!("warning: {message}"),
            Event::Stopped { captures } => format!("stopped after {captures} capture(s)"),
        }
    }
}
