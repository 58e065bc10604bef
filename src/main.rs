use std::{path::PathBuf, time::Instant};

use anyhow::Context;
use clap::Parser;
use drawing_ocr::{
    MaskRegion, PipelineConfig, ReconcileOptions, ReconcilerBuilder, ReplayDetector,
};
use tracing_subscriber::{fmt::format::FmtSpan, EnvFilter};

/// Reconciles a recorded OCR detection dump into ranked drawing annotations.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// JSON array of detections (`polygon`, `text`, `confidence`, optional `method`)
    detections: PathBuf,
    /// JSON array of mask rectangles (`x`, `y`, `width`, `height`)
    #[arg(long)]
    masks: Option<PathBuf>,
    /// TOML file overriding pipeline thresholds
    #[arg(long)]
    config: Option<PathBuf>,
    /// Minimum candidate confidence to print
    #[arg(long, default_value_t = 0.0)]
    threshold: f32,
    /// Print annotation drafts with parsed fields instead of raw candidates
    #[arg(long)]
    parsed: bool,
    /// Print the whole reconciliation, including dropped detections
    #[arg(long, conflicts_with = "parsed")]
    all: bool,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_span_events(FmtSpan::CLOSE)
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::default(),
    };
    let masks: Vec<MaskRegion> = match &args.masks {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read masks from {}", path.display()))?;
            serde_json::from_str(&content).context("Invalid mask list")?
        }
        None => Vec::new(),
    };
    let detector = ReplayDetector::load(&args.detections)?;

    let reconciler = ReconcilerBuilder::new().config(config).build();
    let start = Instant::now();
    let result = reconciler.reconcile(
        detector.detections(),
        ReconcileOptions {
            masks: &masks,
            display_threshold: args.threshold,
        },
    );
    log::debug!("{:?}", start.elapsed());

    let output = if args.all {
        serde_json::to_string_pretty(&result)?
    } else if args.parsed {
        serde_json::to_string_pretty(&result.drafts())?
    } else {
        serde_json::to_string_pretty(&result.candidates)?
    };
    println!("{output}");
    Ok(())
}
