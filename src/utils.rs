use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Wall clock that stops while paused
///
/// `elapsed()` is the active time since creation, the time base for every
/// detection timer.
#[derive(Debug, Clone)]
pub struct ActiveClock {
    started: Instant,
    paused_at: Option<Instant>,
    paused_total: Duration,
}

impl ActiveClock {
    pub fn start() -> Self {
        Self::started_at(Instant::now())
    }

    pub fn started_at(started: Instant) -> Self {
        Self {
            started,
            paused_at: None,
            paused_total: Duration::ZERO,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed_at(Instant::now())
    }

    pub fn elapsed_at(&self, now: Instant) -> Duration {
        let end = self.paused_at.unwrap_or(now);
        end.saturating_duration_since(self.started)
            .saturating_sub(self.paused_total)
    }

    pub fn is_paused(&self) -> bool {
        self.paused_at.is_some()
    }

    pub fn pause(&mut self) {
        self.pause_at(Instant::now());
    }

    pub fn pause_at(&mut self, now: Instant) {
        if self.paused_at.is_none() {
            self.paused_at = Some(now);
        }
    }

    pub fn resume(&mut self) {
        self.resume_at(Instant::now());
    }

    pub fn resume_at(&mut self, now: Instant) {
        if let Some(paused_at) = self.paused_at.take() {
            self.paused_total += now.saturating_duration_since(paused_at);
        }
    }
}

/// Timing measurements for a single tick
#[derive(Debug, Clone, Copy, Default)]
pub struct TickTiming {
    pub capture_us: f64,
    pub detect_us: f64,
    pub advance_us: f64,
    pub total_us: f64,
}

impl TickTiming {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn total_ms(&self) -> f64 {
        self.total_us / 1000.0
    }
}

/// Mean and percentiles of one stage, in microseconds
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StageStats {
    pub mean: f64,
    pub p50: f64,
    pub p95: f64,
    pub p99: f64,
}

/// Ticks kept by `LatencyStats::new`
pub const DEFAULT_LATENCY_WINDOW: usize = 4096;

/// Statistics collector for latency measurements
///
/// Keeps only the most recent `window` ticks; older ones are dropped.
pub struct LatencyStats {
    timings: VecDeque<TickTiming>,
    window: usize,
}

impl Default for LatencyStats {
    fn default() -> Self {
        Self::with_window(DEFAULT_LATENCY_WINDOW)
    }
}

impl LatencyStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_window(window: usize) -> Self {
        let window = window.max(1);
        Self {
            timings: VecDeque::with_capacity(window),
            window,
        }
    }

    pub fn add(&mut self, timing: TickTiming) {
        if self.timings.len() == self.window {
            self.timings.pop_front();
        }
        self.timings.push_back(timing);
    }

    pub fn len(&self) -> usize {
        self.timings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timings.is_empty()
    }

    pub fn window(&self) -> usize {
        self.window
    }

    /// Calculate percentile from sorted data
    fn percentile(sorted: &[f64], p: f64) -> f64 {
        if sorted.is_empty() {
            return 0.0;
        }

        let idx = (p / 100.0 * (sorted.len() - 1) as f64).round() as usize;
        sorted[idx]
    }

    /// Calculate statistics for a specific stage
    pub fn stage_stats(&self, extract: impl Fn(&TickTiming) -> f64) -> StageStats {
        if self.timings.is_empty() {
            return StageStats::default();
        }

        let mut values: Vec<f64> = self.timings.iter().map(&extract).collect();
        values.sort_by(|a, b| a.total_cmp(b));

        StageStats {
            mean: values.iter().sum::<f64>() / values.len() as f64,
            p50: Self::percentile(&values, 50.0),
            p95: Self::percentile(&values, 95.0),
            p99: Self::percentile(&values, 99.0),
        }
    }

    /// Log the per-stage latency table
    pub fn print_report(&self) {
        if self.timings.is_empty() {
            tracing::info!("No timing data collected");
            return;
        }

        let capture = self.stage_stats(|t| t.capture_us);
        let detect = self.stage_stats(|t| t.detect_us);
        let advance = self.stage_stats(|t| t.advance_us);
        let total = self.stage_stats(|t| t.total_us);

        tracing::info!("Tick latency over the last {} ticks", self.timings.len());
        tracing::info!("┌─────────────────┬──────────┬──────────┬──────────┬──────────┐");
        tracing::info!("│ Stage           │   Mean   │   p50    │   p95    │   p99    │");
        tracing::info!("├─────────────────┼──────────┼──────────┼──────────┼──────────┤");
        Self::print_row("Capture", capture);
        Self::print_row("Detect", detect);
        Self::print_row("Advance", advance);
        tracing::info!("├─────────────────┼──────────┼──────────┼──────────┼──────────┤");
        Self::print_row("TOTAL", total);
        tracing::info!("└─────────────────┴──────────┴──────────┴──────────┴──────────┘");

        let stages = [("Capture", capture.p95), ("Detect", detect.p95), ("Advance", advance.p95)];
        if let Some(bottleneck) = stages.iter().max_by(|a, b| a.1.total_cmp(&b.1)) {
            tracing::info!("Bottleneck: {} ({:.0} µs p95)", bottleneck.0, bottleneck.1);
        }
    }

    fn print_row(name: &str, stats: StageStats) {
        tracing::info!(
            "│ {:<15} │ {:>6.0} µs │ {:>6.0} µs │ {:>6.0} µs │ {:>6.0} µs │",
            name,
            stats.mean,
            stats.p50,
            stats.p95,
            stats.p99
        );
    }
}
