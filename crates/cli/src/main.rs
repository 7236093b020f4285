use std::path::PathBuf;
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use spotter_core::capture::domain::frame_source::FrameSource;
use spotter_core::capture::infrastructure::camera_source::CameraSource;
use spotter_core::capture::infrastructure::monitor_source::MonitorSource;
use spotter_core::detection::domain::detector::Detector;
use spotter_core::detection::domain::player_assembler::{
    PlayerAssembler, DEFAULT_PAIR_DISTANCE_SCALE,
};
use spotter_core::detection::infrastructure::onnx_detector::{
    ClassMap, OnnxDetector, DEFAULT_CONFIDENCE, DEFAULT_NMS_IOU,
};
use spotter_core::detection::infrastructure::skip_frame_detector::SkipFrameDetector;
use spotter_core::pipeline::detect_players_use_case::DetectPlayersUseCase;
use spotter_core::pipeline::frame_sink::FrameSink;
use spotter_core::pipeline::pipeline_logger::StdoutPipelineLogger;
use spotter_core::pipeline::pipeline_run::PipelineConfig;

mod console_sink;

use console_sink::ConsoleSink;

/// Live player detection from a screen region or camera.
#[derive(Parser)]
#[command(name = "spotter")]
struct Cli {
    /// Path to the ONNX detection model.
    #[arg(long)]
    model: PathBuf,

    /// Capture from this camera device index instead of a monitor.
    #[arg(long, conflicts_with = "monitor")]
    device: Option<u32>,

    /// Monitor index to capture (0 = first).
    #[arg(long, default_value = "0")]
    monitor: usize,

    /// Side length of the centered square capture region, in pixels.
    #[arg(long, default_value = "416")]
    box_size: u32,

    /// Detection confidence threshold (0.0-1.0).
    #[arg(long, default_value_t = DEFAULT_CONFIDENCE)]
    confidence: f64,

    /// IoU threshold for non-maximum suppression (0.0-1.0).
    #[arg(long, default_value_t = DEFAULT_NMS_IOU)]
    iou: f64,

    /// Model class index for heads.
    #[arg(long, default_value = "1")]
    head_class: usize,

    /// Model class index for bodies.
    #[arg(long, default_value = "0")]
    body_class: usize,

    /// Head/body pairing radius as a multiple of the body diagonal.
    #[arg(long, default_value_t = DEFAULT_PAIR_DISTANCE_SCALE)]
    pair_scale: f64,

    /// Run detection every Nth tick (1 = every tick).
    #[arg(long, default_value = "1")]
    skip_frames: usize,

    /// Stop after this many ticks (default: run until Ctrl-C).
    #[arg(long)]
    frames: Option<u64>,

    /// Minimum milliseconds per tick, capping the capture rate.
    #[arg(long)]
    interval_ms: Option<u64>,

    /// Save annotated snapshots to this directory.
    #[arg(long)]
    snapshots: Option<PathBuf>,

    /// Save every Nth frame when --snapshots is set.
    #[arg(long, default_value = "30")]
    snapshot_every: usize,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    validate(&cli)?;

    let cancelled = Arc::new(AtomicBool::new(false));
    let ctrlc_flag = cancelled.clone();
    ctrlc::set_handler(move || {
        ctrlc_flag.store(true, Ordering::Relaxed);
    })?;

    let source = build_source(&cli);
    let detector = build_detector(&cli)?;
    let sink: Box<dyn FrameSink> = Box::new(ConsoleSink::new(cli.snapshots, cli.snapshot_every));
    let assembler = PlayerAssembler::with_pair_distance_scale(cli.pair_scale);

    let config = PipelineConfig {
        cancelled,
        max_ticks: cli.frames,
        min_tick_interval: cli.interval_ms.map(Duration::from_millis),
    };

    let mut use_case = DetectPlayersUseCase::new(
        source,
        detector,
        sink,
        Box::new(StdoutPipelineLogger::default()),
        assembler,
        config,
    );

    let summary = use_case.execute()?;
    eprintln!();
    log::info!(
        "Run finished: {} ticks, {} players, {} warnings",
        summary.ticks,
        summary.players,
        summary.warnings
    );
    Ok(())
}

fn build_source(cli: &Cli) -> Box<dyn FrameSource> {
    match cli.device {
        Some(index) => Box::new(CameraSource::new(index, cli.box_size)),
        None => Box::new(MonitorSource::new(cli.monitor, cli.box_size)),
    }
}

fn build_detector(cli: &Cli) -> Result<Box<dyn Detector>, Box<dyn std::error::Error>> {
    let classes = ClassMap {
        body: cli.body_class,
        head: cli.head_class,
    };
    let base: Box<dyn Detector> = Box::new(OnnxDetector::new(
        &cli.model,
        classes,
        cli.confidence,
        cli.iou,
    )?);

    if cli.skip_frames > 1 {
        Ok(Box::new(SkipFrameDetector::new(base, cli.skip_frames)?))
    } else {
        Ok(base)
    }
}

fn validate(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    if !cli.model.exists() {
        return Err(format!("Model file not found: {}", cli.model.display()).into());
    }
    if !(0.0..=1.0).contains(&cli.confidence) {
        return Err(format!(
            "Confidence must be between 0.0 and 1.0, got {}",
            cli.confidence
        )
        .into());
    }
    if !(0.0..=1.0).contains(&cli.iou) {
        return Err(format!("IoU must be between 0.0 and 1.0, got {}", cli.iou).into());
    }
    if cli.box_size == 0 {
        return Err("Box size must be at least 1".into());
    }
    if cli.skip_frames == 0 {
        return Err("Skip frames must be at least 1".into());
    }
    if !cli.pair_scale.is_finite() || cli.pair_scale <= 0.0 {
        return Err(format!("Pair scale must be positive, got {}", cli.pair_scale).into());
    }
    if cli.head_class == cli.body_class {
        return Err(format!(
            "Head class and body class must differ, both are {}",
            cli.head_class
        )
        .into());
    }
    Ok(())
}
