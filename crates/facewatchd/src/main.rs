use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tokio::sync::oneshot;
use tracing_subscriber::EnvFilter;

mod annotate;
mod config;
mod pipeline;
mod sink;
mod snapshot;
mod stop;
mod store;

use annotate::{FrameView, Headless, PreviewFile};
use config::Config;
use facewatch_core::{DetectorSettings, FaceDetector, FaceRecognizer, Registry};
use facewatch_hw::{Camera, ImageSequence};
use pipeline::{Pipeline, PipelineContext, PipelineError, RunSummary};
use sink::EventRecorder;
use snapshot::SnapshotWriter;
use stop::StopFlag;
use store::EventStore;

#[derive(Parser)]
#[command(
    name = "facewatch",
    version,
    about = "Watch a camera, recognize known faces and log every sighting"
)]
struct Cli {
    /// TOML configuration file (overrides FACEWATCH_CONFIG)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Monitor the camera until end of stream or quit (default)
    Run(RunArgs),
    /// Print the most recent detection events
    Events {
        #[arg(short = 'n', long, default_value_t = 20)]
        limit: usize,
        /// Emit JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Build the known-faces registry and list its identities
    Registry,
    /// List V4L2 capture devices
    Devices,
}

#[derive(Args, Default)]
struct RunArgs {
    /// Camera device path
    #[arg(long, value_name = "PATH", conflicts_with = "replay")]
    camera: Option<String>,
    /// Replay a directory of images instead of the camera
    #[arg(long, value_name = "DIR")]
    replay: Option<PathBuf>,
    /// Directory of known-face photos
    #[arg(long, value_name = "DIR")]
    known_faces: Option<PathBuf>,
    /// Directory for unknown-face snapshots
    #[arg(long, value_name = "DIR")]
    snapshots: Option<PathBuf>,
    /// SQLite detection log
    #[arg(long, value_name = "PATH")]
    db: Option<PathBuf>,
    /// Directory containing the ONNX models
    #[arg(long, value_name = "DIR")]
    models: Option<PathBuf>,
    /// Maximum cosine distance for a match
    #[arg(long)]
    tolerance: Option<f32>,
    /// Rewrite an annotated JPEG of each frame at this path
    #[arg(long, value_name = "PATH")]
    preview: Option<PathBuf>,
    /// TrueType font for preview labels
    #[arg(long, value_name = "FILE")]
    label_font: Option<PathBuf>,
}

impl RunArgs {
    fn apply(self, config: &mut Config) {
        if let Some(camera) = self.camera {
            config.camera_device = camera;
            config.replay_dir = None;
        }
        if self.replay.is_some() {
            config.replay_dir = self.replay;
        }
        if let Some(dir) = self.known_faces {
            config.known_faces_dir = dir;
        }
        if let Some(dir) = self.snapshots {
            config.snapshot_dir = dir;
        }
        if let Some(path) = self.db {
            config.db_path = path;
        }
        if let Some(dir) = self.models {
            config.model_dir = dir;
        }
        if let Some(tolerance) = self.tolerance {
            config.tolerance = tolerance;
        }
        if self.preview.is_some() {
            config.preview_path = self.preview;
        }
        if self.label_font.is_some() {
            config.label_font = self.label_font;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    let mut config = Config::load(cli.config.as_deref())?;

    match cli.command.unwrap_or_else(|| Commands::Run(RunArgs::default())) {
        Commands::Run(args) => {
            args.apply(&mut config);
            config.validate()?;
            run(config).await
        }
        Commands::Events { limit, json } => print_events(&config, limit, json),
        Commands::Registry => print_registry(&config),
        Commands::Devices => {
            print_devices();
            Ok(())
        }
    }
}

/// Run the pipeline on its own thread and stop it on Ctrl-C or `q`.
///
/// A second Ctrl-C while the in-flight frame finishes abandons the run.
async fn run(config: Config) -> Result<()> {
    let stop = StopFlag::new();
    let (tx, rx) = oneshot::channel();

    let worker_stop = stop.clone();
    std::thread::Builder::new()
        .name("facewatch-pipeline".into())
        .spawn(move || {
            let _ = tx.send(monitor(&config, &worker_stop));
        })
        .context("failed to spawn pipeline thread")?;

    if let Err(e) = stop::spawn_quit_listener(stop.clone()) {
        tracing::warn!(error = %e, "stdin quit listener unavailable; use Ctrl-C");
    } else {
        println!("Press 'q' then Enter to quit");
    }

    let summary = stop::wait_for_worker(rx, &stop, tokio::signal::ctrl_c).await??;
    println!(
        "Processed {} frames: {} faces, {} detections logged, {} unknown-face snapshots",
        summary.frames, summary.faces, summary.events, summary.snapshots
    );
    Ok(())
}

/// Initialize every stage, then drive the run loop to completion.
///
/// Models and the registry come first, then the log and snapshot directory,
/// then the capture source. A source that fails to open is fatal.
fn monitor(config: &Config, stop: &StopFlag) -> Result<RunSummary> {
    let (mut detector, mut encoder) = load_models(config)?;

    let registry = Registry::build(&config.known_faces_dir, &mut detector, &mut encoder);

    let store = EventStore::open(&config.db_path).context("opening detection log")?;
    let snapshots = SnapshotWriter::new(&config.snapshot_dir)?;
    tracing::info!(dir = %snapshots.dir().display(), "unknown-face snapshots");
    let sink = EventRecorder::new(store, snapshots);

    let view: Box<dyn FrameView> = match &config.preview_path {
        Some(path) => {
            let font = annotate::load_font(config.label_font.as_deref());
            let preview = PreviewFile::new(path, font);
            tracing::info!(path = %preview.path().display(), "writing annotated preview");
            Box::new(preview)
        }
        None => Box::new(Headless),
    };

    let context = PipelineContext::new(registry, config.tolerance);
    let pipeline = Pipeline::new(context, detector, encoder, sink, view);

    let summary = match &config.replay_dir {
        Some(dir) => {
            let source = ImageSequence::open(dir)
                .map_err(|e| PipelineError::CaptureUnavailable(e.to_string()))?;
            pipeline.run(source, stop)?
        }
        None => {
            let device = &config.camera_device;
            let camera = Camera::open(device, config.frame_width, config.frame_height)
                .map_err(|e| PipelineError::CaptureUnavailable(format!("{device}: {e}")))?;
            pipeline.run(camera, stop)?
        }
    };
    Ok(summary)
}

fn load_models(config: &Config) -> Result<(FaceDetector, FaceRecognizer)> {
    let settings = DetectorSettings {
        confidence_threshold: config.detector_confidence,
        ..DetectorSettings::default()
    };
    let detector_path = config.detector_model_path();
    let detector = FaceDetector::load(&detector_path, settings)?;
    tracing::info!(path = %detector_path.display(), "SCRFD detector loaded");

    let recognizer_path = config.recognizer_model_path();
    let recognizer = FaceRecognizer::load(&recognizer_path)?;
    tracing::info!(path = %recognizer_path.display(), "ArcFace recognizer loaded");

    Ok((detector, recognizer))
}

fn print_events(config: &Config, limit: usize, json: bool) -> Result<()> {
    let store = EventStore::open(&config.db_path).context("opening detection log")?;
    let events = store.recent(limit)?;
    let total = store.count()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&events)?);
        return Ok(());
    }
    if events.is_empty() {
        println!("No detections logged");
        return Ok(());
    }
    println!("{:>8}  {:<19}  NAME", "ID", "TIMESTAMP");
    for event in &events {
        println!("{:>8}  {:<19}  {}", event.id, event.timestamp, event.name);
    }
    println!("{} of {} detections shown", events.len(), total);
    Ok(())
}

fn print_registry(config: &Config) -> Result<()> {
    let (mut detector, mut encoder) = load_models(config)?;
    let registry = Registry::build(&config.known_faces_dir, &mut detector, &mut encoder);

    println!("{} known faces in {}", registry.len(), config.known_faces_dir.display());
    for (index, identity) in registry.identities().iter().enumerate() {
        println!("{:>4}  {}", index, identity.name);
    }
    Ok(())
}

fn print_devices() {
    let devices = Camera::list_devices();
    if devices.is_empty() {
        println!("No V4L2 capture devices found");
        return;
    }
    for device in devices {
        println!("{}  {} ({}, {})", device.path, device.name, device.driver, device.bus);
    }
}
