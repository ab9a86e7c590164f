/// Watch loop
///
/// Owns the frame source, detector, sink and state machine, and is the only
/// thread that touches them. Other threads talk to it through `ControlSignals`
/// (read once per tick) and hear back through a `ControlSurface`.
use std::thread;
use std::time::{Duration, Instant};

use crate::capture::{Frame, FrameSource};
use crate::config::DetectionConfig;
use crate::detection::Detector;
use crate::messaging::{ControlSignals, ControlSurface};
use crate::sink::CaptureSink;
use crate::state::{DetectionStateMachine, Tick, Transition};
use crate::utils::{ActiveClock, LatencyStats, TickTiming};

/// State name pushed while paused
pub const PAUSED_STATE: &str = "paused";

/// Why `run` returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Requested,
    RunLimit,
}

/// Totals for one watch run
#[derive(Debug, Clone, PartialEq)]
pub struct WatchSummary {
    pub reason: StopReason,
    pub ticks: u64,
    pub captures: u64,
    pub failed_captures: u64,
    pub capture_errors: u64,
    pub detection_errors: u64,
    pub active_time: Duration,
}

pub struct Watcher<S, D, K> {
    source: S,
    detector: D,
    sink: K,
    machine: DetectionStateMachine,
    signals: ControlSignals,
    poll_interval: Duration,
    run_limit: Option<Duration>,
    latency: LatencyStats,
    ticks: u64,
    capture_errors: u64,
    detection_errors: u64,
}

impl<S, D, K> Watcher<S, D, K>
where
    S: FrameSource,
    D: Detector,
    K: CaptureSink,
{
    pub fn new(source: S, detector: D, sink: K, config: &DetectionConfig, signals: ControlSignals) -> Self {
        Self {
            source,
            detector,
            sink,
            machine: DetectionStateMachine::new(config),
            signals,
            poll_interval: config.poll_interval(),
            run_limit: None,
            latency: LatencyStats::new(),
            ticks: 0,
            capture_errors: 0,
            detection_errors: 0,
        }
    }

    /// Stop on its own after this much active time
    pub fn with_run_limit(mut self, limit: Option<Duration>) -> Self {
        self.run_limit = limit;
        self
    }

    /// Keep latency samples for only the last `ticks` ticks
    pub fn with_latency_window(mut self, ticks: usize) -> Self {
        self.latency = LatencyStats::with_window(ticks);
        self
    }

    pub fn machine(&self) -> &DetectionStateMachine {
        &self.machine
    }

    pub fn sink(&self) -> &K {
        &self.sink
    }

    pub fn latency(&self) -> &LatencyStats {
        &self.latency
    }

    /// One unpaused tick at active time `now`
    ///
    /// Consumes the cancel flag. Capture and detection failures are reported
    /// and count as "not matched".
    pub fn tick(&mut self, now: Duration, surface: &dyn ControlSurface) -> Option<Transition> {
        let started = Instant::now();
        let mut timing = TickTiming::new();
        self.ticks += 1;

        let cancel = self.signals.take_cancel();

        let frame = match self.source.capture() {
            Ok(frame) => Some(frame),
            Err(err) => {
                self.capture_errors += 1;
                self.report(now, surface, &format!("Frame capture failed: {err}"));
                None
            }
        };
        timing.capture_us = started.elapsed().as_micros() as f64;

        let detect_started = Instant::now();
        let matched = frame.as_ref().is_some_and(|frame| self.detect(now, frame, surface));
        timing.detect_us = detect_started.elapsed().as_micros() as f64;

        let advance_started = Instant::now();
        let tick = Tick::new(now, frame.as_ref(), matched).with_cancel(cancel);
        let transition = self.machine.advance(tick, &mut self.sink, surface);
        timing.advance_us = advance_started.elapsed().as_micros() as f64;

        timing.total_us = started.elapsed().as_micros() as f64;
        self.latency.add(timing);

        transition
    }

    fn detect(&mut self, now: Duration, frame: &Frame, surface: &dyn ControlSurface) -> bool {
        match self.detector.detect(frame) {
            Ok(detection) => {
                if detection.matched {
                    tracing::trace!(
                        "{} matched {} region(s)",
                        self.detector.name(),
                        detection.regions.len()
                    );
                }
                detection.matched
            }
            Err(err) => {
                self.detection_errors += 1;
                self.report(now, surface, &format!("Detection failed: {err}"));
                false
            }
        }
    }

    fn report(&self, now: Duration, surface: &dyn ControlSurface, message: &str) {
        tracing::warn!(
            "{} (t={:.2}s, state={})",
            message,
            now.as_secs_f64(),
            self.machine.state().name()
        );
        surface.on_warning(message);
    }

    /// Tick at the poll interval until stopped or the run limit is reached
    pub fn run(&mut self, surface: &dyn ControlSurface) -> WatchSummary {
        let mut clock = ActiveClock::start();
        let mut paused = false;

        tracing::info!(
            "Watching with {} every {:.2}s",
            self.detector.name(),
            self.poll_interval.as_secs_f64()
        );
        self.machine.announce(Duration::ZERO, surface);

        let reason = loop {
            if self.signals.should_stop() {
                tracing::info!("Stop requested");
                break StopReason::Requested;
            }
            if self.run_limit.is_some_and(|limit| clock.elapsed() >= limit) {
                tracing::info!("Run limit reached");
                break StopReason::RunLimit;
            }

            if self.signals.is_paused() {
                if !paused {
                    paused = true;
                    clock.pause();
                    tracing::info!("Watching paused at {:.2}s", clock.elapsed().as_secs_f64());
                    surface.on_state_changed(PAUSED_STATE, "detection suspended");
                }
                thread::sleep(self.poll_interval);
                continue;
            }

            if paused {
                paused = false;
                clock.resume();
                tracing::info!("Watching resumed");
                self.machine.announce(clock.elapsed(), surface);
            }

            let work_started = Instant::now();
            self.tick(clock.elapsed(), surface);
            thread::sleep(self.poll_interval.saturating_sub(work_started.elapsed()));
        };

        WatchSummary {
            reason,
            ticks: self.ticks,
            captures: self.machine.capture_count(),
            failed_captures: self.machine.failed_captures(),
            capture_errors: self.capture_errors,
            detection_errors: self.detection_errors,
            active_time: clock.elapsed(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::Detection;
    use crate::error::{CaptureError, DetectionError, PersistenceError};
    use crate::state::StateKind;
    use crate::messaging::NullSurface;
    use crate::sink::CaptureRecord;
    use chrono::Local;
    use image::RgbaImage;
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::path::PathBuf;

    /// Yields frames whose top-left red channel says whether the form is there
    struct ScriptedSource {
        script: VecDeque<Option<bool>>,
    }

    impl ScriptedSource {
        fn new(script: &[Option<bool>]) -> Self {
            Self {
                script: script.iter().copied().collect(),
            }
        }
    }

    impl FrameSource for ScriptedSource {
        fn capture(&mut self) -> Result<Frame, CaptureError> {
            match self.script.pop_front().unwrap_or(Some(false)) {
                Some(visible) => {
                    let mut image = RgbaImage::new(2, 2);
                    image.get_pixel_mut(0, 0).0[0] = if visible { 255 } else { 0 };
                    Ok(Frame::new(image))
                }
                None => Err(CaptureError::Unavailable("display asleep".into())),
            }
        }
    }

    struct RedDetector;

    impl Detector for RedDetector {
        fn detect(&self, frame: &Frame) -> Result<Detection, DetectionError> {
            Ok(Detection {
                matched: frame.image().get_pixel(0, 0).0[0] == 255,
                ..Detection::none()
            })
        }

        fn name(&self) -> &'static str {
            "red"
        }
    }

    #[derive(Default)]
    struct CountingSink {
        saved: u32,
    }

    impl CaptureSink for CountingSink {
        fn save(&mut self, _frame: &Frame) -> Result<CaptureRecord, PersistenceError> {
            self.saved += 1;
            Ok(CaptureRecord {
                sequence: self.saved,
                timestamp: Local::now(),
                path: PathBuf::from("memory"),
            })
        }
    }

    #[derive(Default)]
    struct WarningSurface {
        warnings: RefCell<Vec<String>>,
    }

    impl ControlSurface for WarningSurface {
        fn on_state_changed(&self, _state: &str, _info: &str) {}
        fn on_capture_completed(&self, _count: u64, _record: &CaptureRecord) {}
        fn on_warning(&self, message: &str) {
            self.warnings.borrow_mut().push(message.to_string());
        }
    }

    fn config() -> DetectionConfig {
        DetectionConfig {
            presence_confirm_secs: 2.0,
            absence_confirm_secs: 1.0,
            cooldown_secs: 3.0,
            poll_interval_secs: 0.5,
            ..DetectionConfig::default()
        }
    }

    fn secs(s: f64) -> Duration {
        Duration::from_secs_f64(s)
    }

    #[test]
    fn test_capture_failure_breaks_confirmation() {
        let source = ScriptedSource::new(&[Some(true), Some(true), None, Some(true), Some(true)]);
        let mut watcher = Watcher::new(
            source,
            RedDetector,
            CountingSink::default(),
            &config(),
            ControlSignals::new(),
        );
        let surface = WarningSurface::default();

        for i in 0..5 {
            watcher.tick(secs(i as f64 * 0.5), &surface);
        }

        assert_eq!(watcher.sink().saved, 0);
        assert_eq!(surface.warnings.borrow().len(), 1);
        assert!(surface.warnings.borrow()[0].contains("display asleep"));
    }

    #[test]
    fn test_tick_consumes_cancel() {
        let signals = ControlSignals::new();
        let source = ScriptedSource::new(&[Some(true); 10]);
        let mut watcher = Watcher::new(
            source,
            RedDetector,
            CountingSink::default(),
            &config(),
            signals.clone(),
        );

        watcher.tick(secs(0.0), &NullSurface);
        watcher.tick(secs(0.5), &NullSurface);
        signals.cancel_requested();
        let transition = watcher.tick(secs(1.0), &NullSurface).unwrap();
        assert_eq!(transition.to, StateKind::Waiting);
        assert!(!signals.take_cancel());

        // Restarted at 1.5s, so 3.0s is not enough yet
        for t in [1.5, 2.0, 2.5, 3.0] {
            watcher.tick(secs(t), &NullSurface);
        }
        assert_eq!(watcher.sink().saved, 0);
        watcher.tick(secs(3.5), &NullSurface);
        assert_eq!(watcher.sink().saved, 1);
    }

    #[test]
    fn test_run_stops_when_requested() {
        let signals = ControlSignals::new();
        signals.stop_requested();
        let mut watcher = Watcher::new(
            ScriptedSource::new(&[]),
            RedDetector,
            CountingSink::default(),
            &config(),
            signals,
        );

        let summary = watcher.run(&NullSurface);
        assert_eq!(summary.reason, StopReason::Requested);
        assert_eq!(summary.ticks, 0);
    }

    #[test]
    fn test_run_limit() {
        let config = DetectionConfig {
            poll_interval_secs: 0.01,
            ..config()
        };
        let mut watcher = Watcher::new(
            ScriptedSource::new(&[]),
            RedDetector,
            CountingSink::default(),
            &config,
            ControlSignals::new(),
        )
        .with_run_limit(Some(Duration::from_millis(60)));

        let summary = watcher.run(&NullSurface);
        assert_eq!(summary.reason, StopReason::RunLimit);
        assert!(summary.ticks >= 1);
        assert_eq!(summary.captures, 0);
        assert_eq!(watcher.latency().len() as u64, summary.ticks);
    }

    #[test]
    fn test_latency_history_stays_bounded() {
        let mut watcher = Watcher::new(
            ScriptedSource::new(&[]),
            RedDetector,
            CountingSink::default(),
            &config(),
            ControlSignals::new(),
        )
        .with_latency_window(8);

        for i in 0..50 {
            watcher.tick(secs(i as f64 * 0.5), &NullSurface);
        }

        assert_eq!(watcher.ticks, 50);
        assert_eq!(watcher.latency().len(), 8);
    }
}
