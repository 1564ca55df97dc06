//! reel_session - record one challenge take from a synthetic camera
//!
//! This tool:
//! 1. Loads configuration (`ROOMREEL_CONFIG` + env overrides)
//! 2. Registers the analyzers and falls back to heuristics when models are unavailable
//! 3. Runs countdown, recording and live scoring against a `stub://` scene
//! 4. Prints the finished clip as a validated submission payload on stdout

use anyhow::{anyhow, Result};
use clap::Parser;
use std::io::IsTerminal;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use roomreel_kernel::analysis::{
    AnalysisCapability, AnalyzerRegistry, HeuristicAnalyzer, ReferenceLoader, SceneAnalyzer,
};
use roomreel_kernel::challenge::{AnalysisPath, Challenge, ChallengeCatalog};
use roomreel_kernel::clock::{Clock, ManualClock, SystemClock};
use roomreel_kernel::config::ReelConfig;
use roomreel_kernel::ingest::SyntheticSource;
use roomreel_kernel::session::{
    AnalysisLoop, CaptureConstraints, ClipRecord, MemoryRecorder, RecordingSession, SessionEvent,
    SessionState,
};
use roomreel_kernel::submission::SubmissionPayload;
use roomreel_kernel::ui::{RecordingProgress, Ui};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Challenge id from the built-in catalog.
    #[arg(long, default_value = "room-tour")]
    challenge: String,
    /// Prompt ids to record (repeatable). Defaults to the first prompts of the challenge.
    #[arg(long = "prompt", value_name = "ID")]
    prompts: Vec<String>,
    /// Synthetic scene (stub://gray|gradient|checker|noise).
    #[arg(long, default_value = "stub://gradient")]
    source: String,
    #[arg(long, default_value_t = 320)]
    width: u32,
    #[arg(long, default_value_t = 240)]
    height: u32,
    /// Control-loop tick in milliseconds.
    #[arg(long, default_value_t = 50)]
    tick_ms: u64,
    /// Drive a simulated clock instead of waiting in real time.
    #[arg(long)]
    fast: bool,
    /// Deterministic seed for the heuristic score jitter.
    #[arg(long)]
    seed: Option<u64>,
    /// User id attached to the submission payload.
    #[arg(long, env = "ROOMREEL_USER_ID")]
    user_id: Option<String>,
    /// List the built-in challenges and exit.
    #[arg(long)]
    list: bool,
    /// UI mode for stderr progress (auto|plain|pretty)
    #[arg(long, default_value = "auto", value_name = "MODE")]
    ui: String,
}

enum SessionClock {
    Real(Arc<SystemClock>),
    Simulated(ManualClock),
}

impl SessionClock {
    fn shared(&self) -> Arc<dyn Clock> {
        match self {
            SessionClock::Real(clock) => clock.clone() as Arc<dyn Clock>,
            SessionClock::Simulated(clock) => Arc::new(clock.clone()) as Arc<dyn Clock>,
        }
    }

    fn now_ms(&self) -> u64 {
        match self {
            SessionClock::Real(clock) => clock.now_ms(),
            SessionClock::Simulated(clock) => clock.now_ms(),
        }
    }

    fn wait(&self, ms: u64) {
        match self {
            SessionClock::Real(_) => std::thread::sleep(Duration::from_millis(ms)),
            SessionClock::Simulated(clock) => {
                clock.advance(ms);
            }
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    if args.tick_ms == 0 {
        return Err(anyhow!("tick_ms must be >= 1"));
    }

    let catalog = ChallengeCatalog::builtin();
    if args.list {
        for challenge in catalog.all() {
            println!("{:<20} {}", challenge.id, challenge.name);
        }
        return Ok(());
    }

    let is_tty = std::io::stderr().is_terminal();
    let stdout_is_tty = std::io::stdout().is_terminal();
    let ui = Ui::from_args(Some(&args.ui), is_tty, !stdout_is_tty);

    let cfg = {
        let _stage = ui.stage("Load configuration");
        ReelConfig::load()?
    };
    let challenge = catalog
        .get(&args.challenge)
        .ok_or_else(|| anyhow!("unknown challenge '{}'", args.challenge))?;
    let prompt_ids: Vec<&str> = args.prompts.iter().map(String::as_str).collect();
    let prompts = challenge.prompt_slots(&prompt_ids)?;

    let registry = {
        let _stage = ui.stage("Load analyzers");
        build_registry(&cfg, challenge)?
    };
    let analysis = build_analysis(&cfg, &registry, challenge, args.seed)?;

    let clock = if args.fast {
        SessionClock::Simulated(ManualClock::new(SystemClock.now_ms()))
    } else {
        SessionClock::Real(Arc::new(SystemClock))
    };

    let device = SyntheticSource::open(&args.source, args.width, args.height)?;
    let recorder = MemoryRecorder::new().discarding();
    let mut session = RecordingSession::open(
        device,
        &CaptureConstraints::default(),
        recorder,
        analysis,
        clock.shared(),
        cfg.session_settings(),
        challenge.clip_step(),
    )?
    .with_prompts(prompts);

    let stop_requested = Arc::new(AtomicBool::new(false));
    {
        let stop_requested = stop_requested.clone();
        ctrlc::set_handler(move || {
            stop_requested.store(true, Ordering::SeqCst);
        })
        .map_err(|e| anyhow!("error setting Ctrl-C handler: {}", e))?;
    }

    log::info!(
        "challenge {} ({}), {} analysis",
        challenge.id,
        challenge.name,
        if session.analysis().is_ml() { "ml" } else { "heuristic" }
    );
    session.start();
    let clip = run_take(&mut session, &clock, &ui, args.tick_ms, &stop_requested)?;
    registry.dispose_all();

    let Some(clip) = clip else {
        return Err(anyhow!("no clip was recorded"));
    };
    let payload = SubmissionPayload {
        challenge_id: challenge.id.to_string(),
        total_points: clip.ai_score.unwrap_or(0),
        video_clips: vec![clip],
        user_id: args.user_id,
    };
    let payload = SubmissionPayload::from_value(serde_json::to_value(&payload)?)
        .map_err(|e| anyhow!("submission rejected: {}", e))?;
    println!("{}", serde_json::to_string_pretty(&payload)?);
    Ok(())
}

fn build_registry(cfg: &ReelConfig, challenge: &Challenge) -> Result<AnalyzerRegistry> {
    let references = reference_loader(cfg);
    let mut registry = AnalyzerRegistry::new();
    register_ml(&mut registry, cfg, references.clone());
    registry.register(Arc::new(
        HeuristicAnalyzer::new(cfg.pattern_table()?, references)
            .with_category(challenge.pattern_category()),
    ));
    for (name, err) in registry.initialize_all() {
        log::warn!("analyzer {} unavailable: {}", name, err);
    }
    Ok(registry)
}

#[cfg(feature = "ingest-image")]
fn reference_loader(cfg: &ReelConfig) -> Arc<dyn ReferenceLoader> {
    Arc::new(roomreel_kernel::analysis::ImageReferenceLoader::new(
        cfg.reference_root.clone(),
    ))
}

#[cfg(not(feature = "ingest-image"))]
fn reference_loader(_cfg: &ReelConfig) -> Arc<dyn ReferenceLoader> {
    Arc::new(roomreel_kernel::analysis::MemoryReferenceLoader::new())
}

#[cfg(feature = "backend-tract")]
fn register_ml(registry: &mut AnalyzerRegistry, cfg: &ReelConfig, references: Arc<dyn ReferenceLoader>) {
    use roomreel_kernel::analysis::backends::TractModelLoader;
    use roomreel_kernel::analysis::MlAnalyzer;

    let (Some(detector), Some(embedder)) = (&cfg.models.detector_path, &cfg.models.embedding_path)
    else {
        log::info!("no model paths configured; ml analyzer disabled");
        return;
    };
    let loader = TractModelLoader::new(
        detector.clone(),
        embedder.clone(),
        cfg.models.input_size,
        cfg.models.class_offset,
    )
    .with_min_score(cfg.scoring.detection_threshold);
    registry.register(Arc::new(MlAnalyzer::new(Arc::new(loader), references)));
}

#[cfg(not(feature = "backend-tract"))]
fn register_ml(_registry: &mut AnalyzerRegistry, _cfg: &ReelConfig, _references: Arc<dyn ReferenceLoader>) {
    log::info!("built without backend-tract; ml analyzer disabled");
}

fn build_analysis(
    cfg: &ReelConfig,
    registry: &AnalyzerRegistry,
    challenge: &Challenge,
    seed: Option<u64>,
) -> Result<AnalysisLoop> {
    match challenge.analysis_path() {
        AnalysisPath::Ml { reference } => {
            let analyzer: Arc<dyn SceneAnalyzer> =
                registry.preferred("ml", AnalysisCapability::ObjectDetection)?;
            log::info!("using {} analyzer", analyzer.name());
            AnalysisLoop::ml(
                analyzer,
                reference,
                cfg.scoring.match_threshold,
                cfg.sampling.ml_interval_ms,
                cfg.scoring_settings(),
            )
        }
        AnalysisPath::Heuristic { category } => Ok(AnalysisLoop::heuristic(
            cfg.heuristic_scorer(seed)?,
            category,
            cfg.sampling.heuristic_interval_ms,
            cfg.scoring_settings(),
        )),
    }
}

fn run_take(
    session: &mut RecordingSession<SyntheticSource, MemoryRecorder>,
    clock: &SessionClock,
    ui: &Ui,
    tick_ms: u64,
    stop_requested: &AtomicBool,
) -> Result<Option<ClipRecord>> {
    let mut progress: Option<RecordingProgress> = None;
    loop {
        if stop_requested.swap(false, Ordering::SeqCst) {
            log::info!("stop requested");
            let clip = session.stop()?;
            if let Some(progress) = progress.take() {
                progress.finish(clip.as_ref().and_then(|c| c.ai_score).unwrap_or(0));
            }
            return Ok(clip);
        }

        let mut events = session.tick()?;
        if matches!(clock, SessionClock::Simulated(_)) && session.analysis().is_in_flight() {
            let now = clock.now_ms();
            let scored = session
                .analysis_mut()
                .wait_for_inference(Duration::from_secs(5), now);
            events.extend(scored.into_iter().map(SessionEvent::Score));
        }

        for event in events {
            match event {
                SessionEvent::CountdownTick { remaining } if remaining > 0 => {
                    eprintln!("    {}…", remaining)
                }
                SessionEvent::CountdownTick { .. } => {}
                SessionEvent::RecordingStarted { mime_type } => {
                    log::info!("recording as {}", mime_type);
                    progress = Some(ui.recording(session.limit_ms()));
                }
                SessionEvent::PromptAdvanced { index, prompt_id } => {
                    if let Some(progress) = &progress {
                        progress.note(&format!("prompt {}: {}", index + 1, prompt_id));
                    }
                }
                SessionEvent::Score(score) => {
                    if let Some(progress) = &progress {
                        progress.note(&format!("{} +{} {}", score.emoji, score.points, score.label));
                    }
                }
                SessionEvent::AutoStopped(clip) => {
                    if let Some(progress) = progress.take() {
                        progress.finish(clip.ai_score.unwrap_or(0));
                    }
                    return Ok(Some(clip));
                }
            }
        }

        if let Some(progress) = progress.as_mut() {
            progress.update(session.elapsed_ms(), session.total_score());
        }
        if session.state() == SessionState::Idle {
            return Ok(None);
        }
        clock.wait(tick_ms);
    }
}
