/// Detection state machine
///
/// ```text
///            matched                 presence confirmed (capture)
/// Waiting ───────────> Confirming ─────────────────────────────> Captured
///    ▲                     │ !matched / cancel                      │ absence confirmed
///    │<────────────────────┘                                        ▼
///    └──────────────────────── cooldown elapsed ─────────────── Cooldown
/// ```
///
/// Time is supplied by the caller as active (unpaused) time, so pausing the
/// watch loop freezes every timer.
use std::time::Duration;

use super::machine_state::{MachineState, StateKind};
use crate::capture::Frame;
use crate::config::DetectionConfig;
use crate::messaging::ControlSurface;
use crate::sink::{CaptureRecord, CaptureSink};

/// Input for one tick
#[derive(Debug, Clone, Copy)]
pub struct Tick<'a> {
    /// Active time since the watch run started
    pub now: Duration,
    /// Frame sampled this tick, if capture succeeded
    pub frame: Option<&'a Frame>,
    /// Detector verdict for `frame`
    pub matched: bool,
    /// Cancel flag, already consumed from the control signals
    pub cancel: bool,
}

impl<'a> Tick<'a> {
    pub fn new(now: Duration, frame: Option<&'a Frame>, matched: bool) -> Self {
        Self {
            now,
            frame,
            matched,
            cancel: false,
        }
    }

    pub fn with_cancel(mut self, cancel: bool) -> Self {
        self.cancel = cancel;
        self
    }
}

/// A state change produced by `advance`
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub from: StateKind,
    pub to: StateKind,
    /// Set when this transition persisted a capture
    pub capture: Option<CaptureRecord>,
}

pub struct DetectionStateMachine {
    state: MachineState,
    presence_confirm: Duration,
    absence_confirm: Duration,
    cooldown: Duration,
    reappear_ticks: u32,
    capture_count: u64,
    failed_captures: u64,
}

impl DetectionStateMachine {
    pub fn new(config: &DetectionConfig) -> Self {
        Self::with_timings(
            config.presence_confirm(),
            config.absence_confirm(),
            config.cooldown(),
        )
        .with_reappear_ticks(config.reappear_ticks)
    }

    pub fn with_timings(presence_confirm: Duration, absence_confirm: Duration, cooldown: Duration) -> Self {
        Self {
            state: MachineState::default(),
            presence_confirm,
            absence_confirm,
            cooldown,
            reappear_ticks: 1,
            capture_count: 0,
            failed_captures: 0,
        }
    }

    /// Matched ticks needed in a row to cancel a running disappearance timer
    pub fn with_reappear_ticks(mut self, ticks: u32) -> Self {
        self.reappear_ticks = ticks.max(1);
        self
    }

    pub fn state(&self) -> &MachineState {
        &self.state
    }

    /// Successful captures so far
    pub fn capture_count(&self) -> u64 {
        self.capture_count
    }

    /// Confirmed appearances whose capture could not be saved
    pub fn failed_captures(&self) -> u64 {
        self.failed_captures
    }

    /// Progress text for the current state
    pub fn info(&self, now: Duration) -> String {
        match self.state {
            MachineState::Waiting { .. } => "watching for the form".to_string(),
            MachineState::Confirming { detection_start } => format!(
                "{:.1}s until capture",
                remaining(self.presence_confirm, now, detection_start)
            ),
            MachineState::Captured {
                disappear_start: None,
                ..
            } => "waiting for the form to disappear".to_string(),
            MachineState::Captured {
                disappear_start: Some(start),
                ..
            } => format!(
                "{:.1}s until cooldown",
                remaining(self.absence_confirm, now, start)
            ),
            MachineState::Cooldown { since } => format!(
                "{:.1}s until watching resumes",
                remaining(self.cooldown, now, since)
            ),
        }
    }

    /// Push the current state to the surface without changing anything
    pub fn announce(&self, now: Duration, surface: &dyn ControlSurface) {
        surface.on_state_changed(self.state.name(), &self.info(now));
    }

    /// Feed one tick
    ///
    /// A tick without a frame never counts as matched. The cancel flag only
    /// matters while confirming.
    pub fn advance(
        &mut self,
        tick: Tick<'_>,
        sink: &mut dyn CaptureSink,
        surface: &dyn ControlSurface,
    ) -> Option<Transition> {
        let now = tick.now;
        let matched = tick.matched && tick.frame.is_some();
        let previous = self.state;
        let mut capture = None;

        let next = match previous {
            MachineState::Waiting { .. } => {
                matched.then_some(MachineState::Confirming { detection_start: now })
            }

            MachineState::Confirming { detection_start } => {
                if tick.cancel {
                    tracing::info!("Confirmation cancelled by operator");
                    Some(MachineState::Waiting { since: now })
                } else if !matched {
                    tracing::debug!(
                        "Form lost after {:.1}s of confirmation",
                        now.saturating_sub(detection_start).as_secs_f64()
                    );
                    Some(MachineState::Waiting { since: now })
                } else if now.saturating_sub(detection_start) >= self.presence_confirm {
                    if let Some(frame) = tick.frame {
                        capture = self.persist(frame, sink, surface);
                    }
                    Some(MachineState::Captured {
                        since: now,
                        disappear_start: None,
                        reappear_streak: 0,
                    })
                } else {
                    None
                }
            }

            MachineState::Captured {
                since,
                disappear_start,
                reappear_streak,
            } => {
                if matched {
                    if disappear_start.is_some() {
                        let streak = reappear_streak + 1;
                        self.state = if streak >= self.reappear_ticks {
                            MachineState::Captured {
                                since,
                                disappear_start: None,
                                reappear_streak: 0,
                            }
                        } else {
                            MachineState::Captured {
                                since,
                                disappear_start,
                                reappear_streak: streak,
                            }
                        };
                    }
                    None
                } else {
                    let start = disappear_start.unwrap_or(now);
                    if now.saturating_sub(start) >= self.absence_confirm {
                        Some(MachineState::Cooldown { since: now })
                    } else {
                        self.state = MachineState::Captured {
                            since,
                            disappear_start: Some(start),
                            reappear_streak: 0,
                        };
                        None
                    }
                }
            }

            MachineState::Cooldown { since } => (now.saturating_sub(since) >= self.cooldown)
                .then_some(MachineState::Waiting { since: now }),
        };

        match next {
            Some(state) => {
                self.state = state;
                let transition = Transition {
                    from: previous.kind(),
                    to: state.kind(),
                    capture,
                };
                tracing::debug!(
                    "State {} -> {} at {:.2}s",
                    transition.from,
                    transition.to,
                    now.as_secs_f64()
                );
                self.announce(now, surface);
                Some(transition)
            }
            None => {
                if self.state.is_timed() || self.state != previous {
                    self.announce(now, surface);
                }
                None
            }
        }
    }

    fn persist(
        &mut self,
        frame: &Frame,
        sink: &mut dyn CaptureSink,
        surface: &dyn ControlSurface,
    ) -> Option<CaptureRecord> {
        match sink.save(frame) {
            Ok(record) => {
                self.capture_count += 1;
                tracing::info!(
                    "Capture #{} saved as {}",
                    self.capture_count,
                    record.artifact_name()
                );
                surface.on_capture_completed(self.capture_count, &record);
                Some(record)
            }
            Err(err) => {
                self.failed_captures += 1;
                let message = format!("Capture could not be saved: {err}");
                tracing::warn!("{}", message);
                surface.on_warning(&message);
                None
            }
        }
    }
}

fn remaining(limit: Duration, now: Duration, start: Duration) -> f64 {
    limit.saturating_sub(now.saturating_sub(start)).as_secs_f64()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PersistenceError;
    use chrono::Local;
    use image::RgbaImage;
    use std::cell::RefCell;
    use std::path::PathBuf;

    #[derive(Default)]
    struct RecordingSink {
        saves: u32,
        fail: bool,
    }

    impl CaptureSink for RecordingSink {
        fn save(&mut self, _frame: &Frame) -> Result<CaptureRecord, PersistenceError> {
            if self.fail {
                return Err(PersistenceError::Io {
                    path: "screenshots".to_string(),
                    source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
                });
            }
            self.saves += 1;
            Ok(CaptureRecord {
                sequence: self.saves,
                timestamp: Local::now(),
                path: PathBuf::from(format!("screenshot_{:04}.png", self.saves)),
            })
        }
    }

    #[derive(Default)]
    struct RecordingSurface {
        states: RefCell<Vec<(String, String)>>,
        captures: RefCell<Vec<u64>>,
        warnings: RefCell<Vec<String>>,
    }

    impl ControlSurface for RecordingSurface {
        fn on_state_changed(&self, state: &str, info: &str) {
            self.states
                .borrow_mut()
                .push((state.to_string(), info.to_string()));
        }

        fn on_capture_completed(&self, count: u64, _record: &CaptureRecord) {
            self.captures.borrow_mut().push(count);
        }

        fn on_warning(&self, message: &str) {
            self.warnings.borrow_mut().push(message.to_string());
        }
    }

    fn secs(s: f64) -> Duration {
        Duration::from_secs_f64(s)
    }

    fn frame() -> Frame {
        Frame::new(RgbaImage::new(4, 4))
    }

    fn machine() -> DetectionStateMachine {
        DetectionStateMachine::with_timings(secs(2.0), secs(1.0), secs(3.0))
    }

    /// Feed `pattern` at 0.5s ticks starting at `start`, returns the next tick time
    fn feed(
        machine: &mut DetectionStateMachine,
        sink: &mut RecordingSink,
        surface: &RecordingSurface,
        start: f64,
        pattern: &[bool],
    ) -> f64 {
        let frame = frame();
        let mut t = start;
        for &matched in pattern {
            machine.advance(Tick::new(secs(t), Some(&frame), matched), sink, surface);
            t += 0.5;
        }
        t
    }

    #[test]
    fn test_waiting_is_idempotent() {
        let mut machine = machine();
        let mut sink = RecordingSink::default();
        let surface = RecordingSurface::default();

        feed(&mut machine, &mut sink, &surface, 0.0, &[false; 20]);

        assert!(machine.state().is_waiting());
        assert_eq!(sink.saves, 0);
        assert!(surface.states.borrow().is_empty());
    }

    #[test]
    fn test_five_matched_ticks_capture_once_at_two_seconds() {
        let mut machine = machine();
        let mut sink = RecordingSink::default();
        let surface = RecordingSurface::default();
        let frame = frame();

        let mut saved_at = Vec::new();
        for i in 0..5 {
            let t = i as f64 * 0.5;
            let transition =
                machine.advance(Tick::new(secs(t), Some(&frame), true), &mut sink, &surface);
            if transition.and_then(|tr| tr.capture).is_some() {
                saved_at.push(t);
            }
        }

        assert_eq!(sink.saves, 1);
        assert_eq!(saved_at, vec![2.0]);
        assert_eq!(machine.capture_count(), 1);
        assert_eq!(machine.state().kind(), StateKind::Captured);
        assert_eq!(*surface.captures.borrow(), vec![1]);
    }

    #[test]
    fn test_single_miss_resets_confirmation() {
        let mut machine = machine();
        let mut sink = RecordingSink::default();
        let surface = RecordingSurface::default();

        // 1.5s of presence, then one miss
        let t = feed(&mut machine, &mut sink, &surface, 0.0, &[true, true, true, true, false]);
        assert!(machine.state().is_waiting());

        // Confirmation starts over: 4 more matched ticks reach only 1.5s
        let t = feed(&mut machine, &mut sink, &surface, t, &[true, true, true, true]);
        assert_eq!(sink.saves, 0);
        assert_eq!(machine.state().kind(), StateKind::Confirming);

        feed(&mut machine, &mut sink, &surface, t, &[true]);
        assert_eq!(sink.saves, 1);
    }

    #[test]
    fn test_one_capture_per_appearance() {
        let mut machine = machine();
        let mut sink = RecordingSink::default();
        let surface = RecordingSurface::default();

        feed(&mut machine, &mut sink, &surface, 0.0, &[true; 200]);

        assert_eq!(sink.saves, 1);
        assert_eq!(machine.state().kind(), StateKind::Captured);
    }

    #[test]
    fn test_full_cycle_and_cooldown_delay() {
        let mut machine = machine();
        let mut sink = RecordingSink::default();
        let surface = RecordingSurface::default();
        let frame = frame();

        // Capture at t=2.0
        let t = feed(&mut machine, &mut sink, &surface, 0.0, &[true; 5]);
        assert_eq!(t, 2.5);

        // Disappearance starts at 2.5, confirmed at 3.5
        let t = feed(&mut machine, &mut sink, &surface, t, &[false, false, false]);
        assert_eq!(machine.state().kind(), StateKind::Cooldown);
        assert_eq!(machine.state().entered_at(), secs(3.5));

        // Matched values are ignored until 3.0s after entering cooldown
        let mut t = t;
        while t < 6.5 {
            machine.advance(Tick::new(secs(t), Some(&frame), true), &mut sink, &surface);
            assert_eq!(machine.state().kind(), StateKind::Cooldown, "at {t}");
            t += 0.5;
        }
        let transition = machine
            .advance(Tick::new(secs(6.5), Some(&frame), true), &mut sink, &surface)
            .unwrap();
        assert_eq!(transition.to, StateKind::Waiting);

        // Second appearance gets its own capture
        feed(&mut machine, &mut sink, &surface, 7.0, &[true; 5]);
        assert_eq!(sink.saves, 2);
        assert_eq!(machine.capture_count(), 2);
    }

    #[test]
    fn test_reappearance_resets_disappear_timer() {
        let mut machine = machine();
        let mut sink = RecordingSink::default();
        let surface = RecordingSurface::default();

        let t = feed(&mut machine, &mut sink, &surface, 0.0, &[true; 5]);
        // Absent 0.5s, visible again, then absent 0.5s: timer restarted, no cooldown yet
        let t = feed(&mut machine, &mut sink, &surface, t, &[false, false, true, false, false]);
        assert_eq!(machine.state().kind(), StateKind::Captured);

        feed(&mut machine, &mut sink, &surface, t, &[false]);
        assert_eq!(machine.state().kind(), StateKind::Cooldown);
    }

    #[test]
    fn test_reappear_debounce_ignores_single_flicker() {
        let mut machine = machine().with_reappear_ticks(2);
        let mut sink = RecordingSink::default();
        let surface = RecordingSurface::default();

        let t = feed(&mut machine, &mut sink, &surface, 0.0, &[true; 5]);
        // Disappear at 2.5, flicker at 3.0, still counts from 2.5
        feed(&mut machine, &mut sink, &surface, t, &[false, true, false]);
        assert_eq!(machine.state().kind(), StateKind::Cooldown);
    }

    #[test]
    fn test_cancel_during_confirmation() {
        let mut machine = machine();
        let mut sink = RecordingSink::default();
        let surface = RecordingSurface::default();
        let frame = frame();

        feed(&mut machine, &mut sink, &surface, 0.0, &[true, true, true]);
        let transition = machine
            .advance(
                Tick::new(secs(2.0), Some(&frame), true).with_cancel(true),
                &mut sink,
                &surface,
            )
            .unwrap();

        assert_eq!(transition.from, StateKind::Confirming);
        assert_eq!(transition.to, StateKind::Waiting);
        assert!(transition.capture.is_none());
        assert_eq!(sink.saves, 0);
    }

    #[test]
    fn test_cancel_outside_confirmation_is_ignored() {
        let mut machine = machine();
        let mut sink = RecordingSink::default();
        let surface = RecordingSurface::default();
        let frame = frame();

        let transition = machine.advance(
            Tick::new(secs(0.0), Some(&frame), true).with_cancel(true),
            &mut sink,
            &surface,
        );
        assert_eq!(transition.map(|t| t.to), Some(StateKind::Confirming));
    }

    #[test]
    fn test_missing_frame_counts_as_not_matched() {
        let mut machine = machine();
        let mut sink = RecordingSink::default();
        let surface = RecordingSurface::default();

        feed(&mut machine, &mut sink, &surface, 0.0, &[true, true]);
        machine.advance(Tick::new(secs(1.0), None, true), &mut sink, &surface);
        assert!(machine.state().is_waiting());
    }

    #[test]
    fn test_save_failure_still_reaches_captured() {
        let mut machine = machine();
        let mut sink = RecordingSink {
            fail: true,
            ..Default::default()
        };
        let surface = RecordingSurface::default();

        feed(&mut machine, &mut sink, &surface, 0.0, &[true; 5]);

        assert_eq!(machine.state().kind(), StateKind::Captured);
        assert_eq!(machine.capture_count(), 0);
        assert_eq!(machine.failed_captures(), 1);
        assert!(surface.captures.borrow().is_empty());
        assert_eq!(surface.warnings.borrow().len(), 1);
        assert!(surface.warnings.borrow()[0].contains("read-only"));
    }

    #[test]
    fn test_progress_is_pushed_while_confirming() {
        let mut machine = machine();
        let mut sink = RecordingSink::default();
        let surface = RecordingSurface::default();

        feed(&mut machine, &mut sink, &surface, 0.0, &[true, true, true]);

        let states = surface.states.borrow();
        assert_eq!(states.len(), 3);
        assert_eq!(states[0], ("confirming".to_string(), "2.0s until capture".to_string()));
        assert_eq!(states[1].1, "1.5s until capture");
        assert_eq!(states[2].1, "1.0s until capture");
    }

    #[test]
    fn test_new_from_config() {
        let config = DetectionConfig::default();
        let machine = DetectionStateMachine::new(&config);
        assert!(machine.state().is_waiting());
        assert_eq!(machine.info(Duration::ZERO), "watching for the form");
    }
}
