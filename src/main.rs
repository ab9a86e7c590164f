use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use crossbeam_channel::Receiver;
use display_info::DisplayInfo;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;
use sysinfo::System;

use auto_screenshot::analysis;
use auto_screenshot::capture::{monitor_summaries, CaptureRegion, Frame, ScreenCapture};
use auto_screenshot::config::Config;
use auto_screenshot::detection::RegionDetector;
use auto_screenshot::hotkeys;
use auto_screenshot::messaging::{Command, ControlSignals, Event, EventBus};
use auto_screenshot::sink::DirectorySink;
use auto_screenshot::watcher::Watcher;

const LOG_TARGET_STARTUP: &str = "auto_screenshot::startup";

#[derive(Parser)]
#[command(name = "auto-screenshot", version, about = "Capture a screenshot whenever the target form appears")]
struct Cli {
    /// Config file (default: config/config.json next to the executable)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch the screen and capture (default)
    Watch(WatchArgs),

    /// Report every shape the detector sees in a saved screenshot
    Analyze {
        image: PathBuf,
        /// Write a copy with accepted (green) and rejected (red) boxes
        #[arg(long)]
        annotate: Option<PathBuf>,
        /// Hide components smaller than this filled area
        #[arg(long, default_value_t = 1_000)]
        min_area: u64,
    },

    /// Recommend detection settings from screenshots that show the form
    Tune {
        #[arg(required = true)]
        images: Vec<PathBuf>,
        /// Ignore shapes smaller than this filled area
        #[arg(long, default_value_t = 10_000)]
        min_area: u64,
        /// Save the recommended values into the config file
        #[arg(long)]
        write: bool,
    },

    /// Print the RGB and HSV value of one pixel
    PickColor { image: PathBuf, x: u32, y: u32 },

    /// List displays
    Monitors,
}

#[derive(Args, Default)]
struct WatchArgs {
    /// Directory for captures
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Display index (see `monitors`)
    #[arg(long)]
    monitor: Option<usize>,

    /// Capture only this region: x,y,width,height
    #[arg(long, value_parser = parse_region)]
    region: Option<[u32; 4]>,

    /// Seconds between ticks
    #[arg(long)]
    interval: Option<f64>,

    /// Stop after this many seconds of active watching
    #[arg(long)]
    duration: Option<f64>,

    /// Start paused (F8 resumes)
    #[arg(long)]
    paused: bool,

    /// Disable the F8/F9/F10 hotkeys
    #[arg(long)]
    no_hotkeys: bool,
}

fn parse_region(value: &str) -> std::result::Result<[u32; 4], String> {
    let parts = value
        .split(',')
        .map(|part| part.trim().parse::<u32>())
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| format!("invalid region '{value}': {e}"))?;

    <[u32; 4]>::try_from(parts).map_err(|_| format!("region '{value}' needs four numbers: x,y,width,height"))
}

/// Initialize tracing with file rotation
///
/// Logs go to `<config dir>/AutoScreenshot/logs/auto-screenshot.log`, rotated
/// daily. Debug builds also log to the console. `RUST_LOG` overrides the level.
fn initialize_tracing() {
    use tracing_appender::rolling;
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let log_dir = dirs::config_dir()
        .map(|dir| dir.join("AutoScreenshot").join("logs"))
        .unwrap_or_else(|| PathBuf::from("logs"));

    if let Err(e) = std::fs::create_dir_all(&log_dir) {
        eprintln!("Warning: Failed to create log directory: {}", e);
    }

    let file_appender = rolling::daily(&log_dir, "auto-screenshot.log");

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let file_layer = fmt::layer()
        .with_writer(file_appender)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .with_line_number(true);

    #[cfg(debug_assertions)]
    {
        let console_layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(true)
            .with_target(false);

        tracing_subscriber::registry()
            .with(filter)
            .with(file_layer)
            .with(console_layer)
            .init();
    }

    #[cfg(not(debug_assertions))]
    {
        tracing_subscriber::registry()
            .with(filter)
            .with(file_layer)
            .init();
    }

    tracing::info!("Log directory: {}", log_dir.display());
}

fn log_runtime_environment() {
    let version = env!("CARGO_PKG_VERSION");
    let os_name = System::long_os_version()
        .or_else(System::name)
        .unwrap_or_else(|| "Unknown OS".to_string());
    let kernel = System::kernel_version().unwrap_or_else(|| "Unknown Kernel".to_string());
    let architecture = std::env::consts::ARCH;

    tracing::info!(target: LOG_TARGET_STARTUP, "Starting auto-screenshot v{} on ({})", version, architecture);
    tracing::info!(target: LOG_TARGET_STARTUP, "Operating System: {} (kernel {})", os_name, kernel);

    if let Ok(displays) = DisplayInfo::all() {
        tracing::info!(target: LOG_TARGET_STARTUP, "Displays: {} detected", displays.len());
        for (index, disp) in displays.iter().enumerate() {
            tracing::debug!(
                target: LOG_TARGET_STARTUP,
                "  Display {}: {}x{}{}",
                index,
                disp.width,
                disp.height,
                if disp.is_primary { " (primary)" } else { "" }
            );
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<(Config, PathBuf)> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => Config::config_path()?,
    };
    let config = Config::load_from(&path)
        .with_context(|| format!("Failed to load configuration from {}", path.display()))?;
    Ok((config, path))
}

fn open_frame(path: &Path) -> Result<Frame> {
    Frame::open(path).with_context(|| format!("Failed to open image {}", path.display()))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    initialize_tracing();
    log_runtime_environment();

    match cli.command.unwrap_or(Commands::Watch(WatchArgs::default())) {
        Commands::Watch(args) => watch(cli.config.as_deref(), args),
        Commands::Analyze {
            image,
            annotate,
            min_area,
        } => analyze(cli.config.as_deref(), &image, annotate.as_deref(), min_area),
        Commands::Tune {
            images,
            min_area,
            write,
        } => tune(cli.config.as_deref(), &images, min_area, write),
        Commands::PickColor { image, x, y } => {
            let color = analysis::pick_color(&open_frame(&image)?, x, y)?;
            println!(
                "({}, {}): RGB {:?}  HSV {:?}",
                color.x, color.y, color.rgb, color.hsv
            );
            Ok(())
        }
        Commands::Monitors => {
            let monitors = monitor_summaries().context("Failed to enumerate displays")?;
            if monitors.is_empty() {
                println!("No displays found");
            }
            for monitor in monitors {
                println!("[{}] {}", monitor.index, monitor.label);
            }
            Ok(())
        }
    }
}

fn watch(config_path: Option<&Path>, args: WatchArgs) -> Result<()> {
    let (mut config, _) = load_config(config_path)?;

    if let Some(dir) = args.output_dir {
        config.output.directory = dir;
    }
    if let Some(monitor) = args.monitor {
        config.capture.monitor_index = monitor;
    }
    if let Some(region) = args.region {
        config.capture.region = Some(region);
    }
    if let Some(interval) = args.interval {
        config.detection.poll_interval_secs = interval;
    }
    if args.paused {
        config.start_paused = true;
    }
    config.validate().context("Invalid settings")?;

    let run_limit = match args.duration {
        Some(secs) if secs.is_finite() && secs > 0.0 => Some(Duration::from_secs_f64(secs)),
        Some(secs) => bail!("--duration must be a positive number of seconds, got {secs}"),
        None => None,
    };

    let source = ScreenCapture::new(
        config.capture.monitor_index,
        config.capture.region.map(CaptureRegion::from_array),
    )
    .context("No usable screen to capture")?;
    let sink = DirectorySink::new(&config.output.directory, &config.output.format)
        .context("Cannot use the output directory")?;
    let detector = RegionDetector::new(config.detection.clone());

    let signals = ControlSignals::starting_paused(config.start_paused);
    {
        let signals = signals.clone();
        ctrlc::set_handler(move || signals.apply(Command::Stop))
            .context("Failed to install Ctrl+C handler")?;
    }
    if !args.no_hotkeys {
        if let Err(e) = hotkeys::spawn_listener(signals.clone()) {
            tracing::warn!("Hotkey thread failed to start: {}", e);
        }
    }

    let bus = EventBus::new();
    let rx = bus.subscribe();
    let reporter = thread::Builder::new()
        .name("status".to_string())
        .spawn(move || report_status(rx))
        .context("Failed to start status reporter")?;

    println!("Saving captures to {}", sink.directory().display());
    println!("F8 pause/resume · F9 cancel confirmation · F10 or Ctrl+C stop");

    let mut watcher = Watcher::new(source, detector, sink, &config.detection, signals)
        .with_run_limit(run_limit);
    let summary = watcher.run(&bus);
    watcher.latency().print_report();

    bus.publish(Event::Stopped {
        captures: summary.captures,
    });
    if reporter.join().is_err() {
        tracing::warn!("Status reporter panicked");
    }

    tracing::info!("Watch summary: {:?}", summary);
    println!(
        "{} capture(s) in {:.1}s of watching ({} failed to save, {} frame errors, {} detection errors)",
        summary.captures,
        summary.active_time.as_secs_f64(),
        summary.failed_captures,
        summary.capture_errors,
        summary.detection_errors
    );
    Ok(())
}

/// Print state changes, captures and warnings until the watcher stops
fn report_status(rx: Receiver<Event>) {
    let mut last_state = String::new();

    for event in rx.iter() {
        match &event {
            Event::StateChanged { state, info } => {
                tracing::debug!("{}", event.summary());
                if *state == last_state {
                    continue;
                }
                last_state = state.clone();
                println!("[{}] {}", state, info);
            }
            Event::CaptureCompleted { .. } | Event::Warning { .. } => println!("{}", event.summary()),
            Event::Stopped { .. } => {
                println!("{}", event.summary());
                break;
            }
        }
    }
}

fn analyze(config_path: Option<&Path>, image: &Path, annotate: Option<&Path>, min_area: u64) -> Result<()> {
    let (config, _) = load_config(config_path)?;
    let frame = open_frame(image)?;
    let detector = RegionDetector::new(config.detection);

    let report = analysis::analyze(&frame, &detector, min_area)?;
    print!("{}", report.render());

    if let Some(out) = annotate {
        analysis::annotate(&frame, &report)
            .save(out)
            .with_context(|| format!("Failed to write {}", out.display()))?;
        println!("\nAnnotated image written to {}", out.display());
    }
    Ok(())
}

fn tune(config_path: Option<&Path>, images: &[PathBuf], min_area: u64, write: bool) -> Result<()> {
    let (mut config, path) = load_config(config_path)?;

    let mut samples = Vec::new();
    for image in images {
        let frame = match open_frame(image) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!("Skipping {}: {:#}", image.display(), e);
                println!("Skipping {}: {:#}", image.display(), e);
                continue;
            }
        };
        let name = image
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let found = analysis::collect_samples(&frame, &name, &config.detection.color_range, min_area)?;
        for sample in &found {
            println!(
                "{}: {}x{} at ({}, {}), area {}, aspect {:.2}, HSV ({:.1}, {:.1}, {:.1})",
                sample.source,
                sample.width,
                sample.height,
                sample.x,
                sample.y,
                sample.area,
                sample.aspect_ratio,
                sample.mean_hsv[0],
                sample.mean_hsv[1],
                sample.mean_hsv[2]
            );
        }
        samples.extend(found);
    }

    let Some(recommendation) = analysis::recommend(&samples) else {
        bail!("No shapes of at least {min_area} px found in the configured color range");
    };
    println!();
    print!("{}", recommendation.render());

    if write {
        recommendation.apply_to(&mut config.detection);
        config.validate().context("Recommended settings are invalid")?;
        config
            .save_to(&path)
            .with_context(|| format!("Failed to save {}", path.display()))?;
        println!("\nSaved to {}", path.display());
    }
    Ok(())
}
