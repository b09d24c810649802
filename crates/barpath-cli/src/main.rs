//! barpath CLI: barbell path tracking, manual annotation and evaluation.

use clap::{Args, Parser, Subcommand};
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::mpsc;

use barpath::pipeline::{RegionSelectError, RegionSelector};
use barpath::{
    AnnotationConfig, AnnotationEvent, Control, EvalConfig, FixedRegion, Region, TrackConfig,
};

type CliError = Box<dyn std::error::Error>;
type CliResult<T> = Result<T, CliError>;

#[derive(Parser)]
#[command(name = "barpath")]
#[command(about = "Track a circular barbell marker through a lifting clip and evaluate the path")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Track the marker and write `<stem>_auto_track.txt`.
    Track(CliTrackArgs),

    /// Annotate the marker by hand and append to `<stem>_auto_anno.txt`.
    Annotate(CliAnnotateArgs),

    /// Compare a manual reference path against an automatic track.
    Metrics(CliMetricsArgs),
}

#[derive(Debug, Clone, Args)]
struct CliTrackArgs {
    /// Clip to track: a directory of frames, an animated GIF, or an image.
    video: PathBuf,

    /// Search region `x,y,w,h`; prompted on stdin when omitted.
    #[arg(long)]
    roi: Option<Region>,

    /// JSON file with a `TrackConfig`; flags below override it.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory for the point file.
    #[arg(long, default_value = ".")]
    out_dir: PathBuf,

    /// Path to write a JSON run report.
    #[arg(long)]
    report: Option<PathBuf>,

    /// Smallest marker radius searched (px).
    #[arg(long)]
    min_radius: Option<u32>,

    /// Largest marker radius searched (px).
    #[arg(long)]
    max_radius: Option<u32>,

    /// Circle accumulator threshold (votes).
    #[arg(long)]
    hough_threshold: Option<u32>,

    /// Motion-estimation window side (px).
    #[arg(long)]
    window_size: Option<u32>,

    /// Pyramid levels above full resolution.
    #[arg(long)]
    max_level: Option<u32>,
}

#[derive(Debug, Clone, Args)]
struct CliAnnotateArgs {
    /// Clip to annotate.
    video: PathBuf,

    /// Search region `x,y,w,h` for point suggestions; prompted when omitted.
    #[arg(long)]
    roi: Option<Region>,

    /// Directory for the point file.
    #[arg(long, default_value = ".")]
    out_dir: PathBuf,
}

#[derive(Debug, Clone, Args)]
struct CliMetricsArgs {
    /// Manual reference point file.
    manual: PathBuf,

    /// Automatic track point file.
    auto: PathBuf,

    /// Failure distance threshold (px).
    #[arg(long, default_value = "10")]
    threshold: f64,

    /// Path to write metrics as JSON.
    #[arg(long)]
    json: Option<PathBuf>,
}

impl CliTrackArgs {
    fn to_config(&self) -> CliResult<TrackConfig> {
        let mut config = match &self.config {
            Some(path) => {
                tracing::info!("Loading config: {}", path.display());
                TrackConfig::from_json_file(path)?
            }
            None => TrackConfig::default(),
        };
        if let Some(v) = self.min_radius {
            config.detector.min_radius = v;
        }
        if let Some(v) = self.max_radius {
            config.detector.max_radius = v;
        }
        if let Some(v) = self.hough_threshold {
            config.detector.accumulator_threshold = v;
        }
        if let Some(v) = self.window_size {
            config.flow.window_size = v;
        }
        if let Some(v) = self.max_level {
            config.flow.max_level = v;
        }
        if config.detector.min_radius > config.detector.max_radius {
            return Err(format!(
                "min radius {} exceeds max radius {}",
                config.detector.min_radius, config.detector.max_radius
            )
            .into());
        }
        Ok(config)
    }
}

fn main() -> CliResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Track(args) => run_track(&args),
        Commands::Annotate(args) => run_annotate(&args),
        Commands::Metrics(args) => run_metrics(&args),
    }
}

// ── stdin input ───────────────────────────────────────────────────────

/// Asks for the region on stdin, then hands stdin to a follow-up reader.
struct PromptRegion {
    then: Option<Box<dyn FnOnce()>>,
}

impl PromptRegion {
    fn new(then: impl FnOnce() + 'static) -> Self {
        Self {
            then: Some(Box::new(then)),
        }
    }
}

impl RegionSelector for PromptRegion {
    fn select_region(&mut self, first_frame: &image::GrayImage) -> Result<Region, RegionSelectError> {
        let (w, h) = first_frame.dimensions();
        let stdin = std::io::stdin();
        let mut lines = stdin.lock().lines();
        let region = loop {
            print!("Search region for the {}x{} first frame (x,y,w,h): ", w, h);
            std::io::stdout().flush()?;
            let Some(line) = lines.next().transpose()? else {
                return Err(RegionSelectError::Cancelled);
            };
            let line = line.trim();
            if line.is_empty() || line == "q" {
                return Err(RegionSelectError::Cancelled);
            }
            match line.parse::<Region>() {
                Ok(r) if !r.is_empty() => break r,
                Ok(_) => eprintln!("region must have a non-zero size"),
                Err(e) => eprintln!("{e}"),
            }
        };
        drop(lines);
        if let Some(then) = self.then.take() {
            then();
        }
        Ok(region)
    }
}

/// Region from `--roi`, or the stdin prompt; `then` runs once the region is
/// known and stdin is free.
fn region_selector(roi: Option<Region>, then: impl FnOnce() + 'static) -> Box<dyn RegionSelector> {
    match roi {
        Some(r) => {
            then();
            Box::new(FixedRegion(r))
        }
        None => Box::new(PromptRegion::new(then)),
    }
}

/// Sends `Control::Stop` when `q` is entered.
fn spawn_stop_watcher(tx: mpsc::Sender<Control>) {
    std::thread::spawn(move || {
        for line in std::io::stdin().lines() {
            let Ok(line) = line else { break };
            if line.trim() == "q" {
                let _ = tx.send(Control::Stop);
                break;
            }
        }
    });
}

/// Forwards parsed annotation events; the channel closes at end of input.
fn spawn_event_reader(tx: mpsc::Sender<AnnotationEvent>) {
    std::thread::spawn(move || {
        for line in std::io::stdin().lines() {
            let Ok(line) = line else { break };
            if line.trim().is_empty() {
                continue;
            }
            match line.parse::<AnnotationEvent>() {
                Ok(event) => {
                    if tx.send(event).is_err() {
                        break;
                    }
                }
                Err(e) => eprintln!("{e}"),
            }
        }
    });
}

// ── track ─────────────────────────────────────────────────────────────

fn run_track(args: &CliTrackArgs) -> CliResult<()> {
    let config = args.to_config()?;
    std::fs::create_dir_all(&args.out_dir)?;

    let (tx, rx) = mpsc::channel();
    let mut selector = region_selector(args.roi, move || {
        eprintln!("Tracking; enter q to stop early.");
        spawn_stop_watcher(tx);
    });

    let run = barpath::track_video(&args.video, &args.out_dir, selector.as_mut(), Some(&rx), &config)?;

    println!("Frames:      {}", run.frames());
    println!("Lost frames: {}", run.lost_frames);
    println!("Stopped:     {:?}", run.termination);
    if let Some(out) = &run.output {
        println!("Track:       {}", out.display());
    }

    if let Some(report) = &args.report {
        write_json(report, &run)?;
        tracing::info!("Report written to {}", report.display());
    }
    Ok(())
}

// ── annotate ──────────────────────────────────────────────────────────

fn run_annotate(args: &CliAnnotateArgs) -> CliResult<()> {
    std::fs::create_dir_all(&args.out_dir)?;

    let (tx, rx) = mpsc::channel();
    let mut selector = region_selector(args.roi, move || {
        eprintln!("Commands: click X Y | n (next) | c (clear) | s (save and quit) | q (quit)");
        spawn_event_reader(tx);
    });

    let outcome = barpath::annotate_video(
        &args.video,
        &args.out_dir,
        selector.as_mut(),
        &rx,
        &AnnotationConfig::default(),
    )?;

    println!("Frames viewed: {}", outcome.frames_viewed);
    println!("Points:        {}", outcome.path.present_count());
    match &outcome.output {
        Some(out) => println!("Appended to:   {}", out.display()),
        None => println!("Discarded."),
    }
    Ok(())
}

// ── metrics ───────────────────────────────────────────────────────────

fn run_metrics(args: &CliMetricsArgs) -> CliResult<()> {
    tracing::info!("Loading manual path: {}", args.manual.display());
    let manual = barpath::load_points(&args.manual)?;
    tracing::info!("Loading automatic path: {}", args.auto.display());
    let auto = barpath::load_points(&args.auto)?;
    let skipped = manual.diagnostics.len() + auto.diagnostics.len();
    if skipped > 0 {
        eprintln!("{skipped} malformed lines skipped");
    }

    let config = EvalConfig {
        failure_threshold_px: args.threshold,
    };
    let metrics = barpath::evaluate(&manual.sequence, &auto.sequence, &config)?;
    println!("{metrics}");

    if let Some(path) = &args.json {
        write_json(path, &metrics)?;
        tracing::info!("Metrics written to {}", path.display());
    }
    Ok(())
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> CliResult<()> {
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path, json)?;
    Ok(())
}
