//! frame_score - score still images with the heuristic scorer
//!
//! Prints one JSON object per image with the score, the reasons, detected objects and
//! the per-component breakdown.

use anyhow::{anyhow, Result};
use clap::Parser;
use serde_json::json;
use std::io::IsTerminal;
use std::path::PathBuf;

use roomreel_kernel::clock::{Clock, SystemClock};
use roomreel_kernel::config::ReelConfig;
use roomreel_kernel::ingest::{FrameSampler, StillImageSource};
use roomreel_kernel::session::{CaptureConstraints, CaptureGuard};
use roomreel_kernel::ui::Ui;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Image files to score.
    #[arg(required = true)]
    images: Vec<PathBuf>,
    /// Pattern category (room-tour, study-space, social-life, ...).
    #[arg(long, default_value = "room-tour")]
    category: String,
    /// Deterministic seed for the score jitter.
    #[arg(long)]
    seed: Option<u64>,
    /// Disable the score jitter.
    #[arg(long)]
    no_jitter: bool,
    /// UI mode for stderr progress (auto|plain|pretty)
    #[arg(long, default_value = "auto", value_name = "MODE")]
    ui: String,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let is_tty = std::io::stderr().is_terminal();
    let stdout_is_tty = std::io::stdout().is_terminal();
    let ui = Ui::from_args(Some(&args.ui), is_tty, !stdout_is_tty);

    let mut cfg = ReelConfig::load()?;
    if args.no_jitter {
        cfg.scoring.jitter = false;
    }
    let mut scorer = cfg.heuristic_scorer(args.seed)?;
    if scorer.patterns().patterns(&args.category).is_empty() {
        log::warn!("no patterns for category {}; scoring without object detection", args.category);
    }

    let clock = SystemClock;
    let mut sampler = FrameSampler::new();
    for path in &args.images {
        let report = {
            let _stage = ui.stage(&format!("Score {}", path.display()));
            let mut source = CaptureGuard::acquire(
                StillImageSource::open(path)?,
                &CaptureConstraints::default(),
            )?;
            let frame = sampler
                .sample(&mut source, clock.now_ms())?
                .ok_or_else(|| anyhow!("{} decoded to an empty image", path.display()))?;
            scorer.evaluate(&frame, Some(&args.category))
        };

        let breakdown = &report.breakdown;
        let out = json!({
            "file": path.display().to_string(),
            "confidence": report.result.confidence,
            "isGoodShot": report.result.is_good_shot,
            "reasons": report.result.reasons,
            "detectedObjects": report.result.detected_objects,
            "breakdown": {
                "lighting": breakdown.lighting,
                "detail": breakdown.detail,
                "color": breakdown.color,
                "composition": breakdown.composition,
                "stability": breakdown.stability,
                "objects": breakdown.object_bonus,
                "labels": breakdown.labels,
            },
        });
        println!("{}", serde_json::to_string(&out)?);
    }
    Ok(())
}
