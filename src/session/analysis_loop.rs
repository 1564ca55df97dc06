//! Periodic frame analysis during a recording.
//!
//! The heuristic path scores frames inline on the control loop. The ML path hands frames
//! to an inference worker thread through a depth-1 queue: while a job is in flight further
//! ticks are dropped. Every job carries the take's generation number, so results that
//! arrive after a reset or stop are discarded instead of scored.

use anyhow::{Context, Result};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender, TryRecvError, TrySendError};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crate::analysis::{AnalysisResult, DetectionResult, HeuristicScorer, MatchResult, SceneAnalyzer};
use crate::error::AnalyzerError;
use crate::frame::Frame;
use crate::ingest::{FrameSampler, VideoSource};
use crate::schedule::ScheduledTask;
use crate::scoring::{ScoreAggregator, ScoreEvent, ScoringSettings};

// ----------------------------------------------------------------------------
// Inference worker
// ----------------------------------------------------------------------------

struct InferenceJob {
    generation: u64,
    frame: Frame,
    /// Reference address and threshold when a match check is due.
    reference: Option<(String, f32)>,
}

struct InferenceOutcome {
    generation: u64,
    detections: Result<Vec<DetectionResult>, AnalyzerError>,
    matched: Option<Result<MatchResult, AnalyzerError>>,
}

/// Runs analyzer calls off the control loop.
pub struct InferenceWorker {
    jobs: Option<SyncSender<InferenceJob>>,
    outcomes: Receiver<InferenceOutcome>,
    handle: Option<JoinHandle<()>>,
    in_flight: bool,
}

impl InferenceWorker {
    pub fn spawn(analyzer: Arc<dyn SceneAnalyzer>) -> Result<Self> {
        let (job_tx, job_rx) = mpsc::sync_channel::<InferenceJob>(1);
        let (outcome_tx, outcome_rx) = mpsc::channel::<InferenceOutcome>();
        let handle = std::thread::Builder::new()
            .name(format!("inference-{}", analyzer.name()))
            .spawn(move || {
                for job in job_rx {
                    let detections = analyzer.detect_objects(&job.frame);
                    let matched = job
                        .reference
                        .map(|(reference, threshold)| {
                            analyzer.compare_with_reference(&job.frame, &reference, threshold)
                        });
                    let outcome = InferenceOutcome {
                        generation: job.generation,
                        detections,
                        matched,
                    };
                    if outcome_tx.send(outcome).is_err() {
                        break;
                    }
                }
            })
            .context("spawn inference worker")?;
        Ok(Self {
            jobs: Some(job_tx),
            outcomes: outcome_rx,
            handle: Some(handle),
            in_flight: false,
        })
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    fn submit(&mut self, job: InferenceJob) -> bool {
        if self.in_flight {
            return false;
        }
        let Some(jobs) = &self.jobs else {
            return false;
        };
        match jobs.try_send(job) {
            Ok(()) => {
                self.in_flight = true;
                true
            }
            Err(TrySendError::Full(_)) => false,
            Err(TrySendError::Disconnected(_)) => {
                log::warn!("inference worker exited; dropping frame");
                false
            }
        }
    }

    fn try_recv(&mut self) -> Option<InferenceOutcome> {
        match self.outcomes.try_recv() {
            Ok(outcome) => {
                self.in_flight = false;
                Some(outcome)
            }
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                self.in_flight = false;
                None
            }
        }
    }

    fn recv_timeout(&mut self, timeout: Duration) -> Option<InferenceOutcome> {
        match self.outcomes.recv_timeout(timeout) {
            Ok(outcome) => {
                self.in_flight = false;
                Some(outcome)
            }
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => {
                self.in_flight = false;
                None
            }
        }
    }

    /// Close the queue and wait for the worker to finish its current job.
    pub fn shutdown(mut self) {
        self.jobs.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("inference worker panicked");
            }
        }
    }
}

impl Drop for InferenceWorker {
    fn drop(&mut self) {
        // Closing the queue ends the worker after its current job; it is not joined here.
        self.jobs.take();
    }
}

// ----------------------------------------------------------------------------
// Analysis loop
// ----------------------------------------------------------------------------

enum Mode {
    Heuristic {
        scorer: HeuristicScorer,
        category: Option<String>,
    },
    Ml {
        worker: InferenceWorker,
        reference: Option<String>,
        threshold: f32,
    },
}

/// What one poll produced.
#[derive(Debug, Default)]
pub struct TickOutput {
    /// The sampled frame, when the analysis task fired.
    pub frame: Option<Frame>,
    pub events: Vec<ScoreEvent>,
}

pub struct AnalysisLoop {
    mode: Mode,
    period_ms: u64,
    task: Option<ScheduledTask>,
    sampler: FrameSampler,
    aggregator: ScoreAggregator,
    generation: u64,
    last_result: Option<AnalysisResult>,
    dropped_ticks: u64,
}

impl AnalysisLoop {
    /// Inline heuristic scoring; pattern matches feed the aggregator.
    pub fn heuristic(
        scorer: HeuristicScorer,
        category: Option<String>,
        period_ms: u64,
        settings: ScoringSettings,
    ) -> Self {
        Self::with_mode(Mode::Heuristic { scorer, category }, period_ms, settings)
    }

    /// Analyzer calls on a worker thread, with an optional reference photo for match checks.
    pub fn ml(
        analyzer: Arc<dyn SceneAnalyzer>,
        reference: Option<String>,
        threshold: f32,
        period_ms: u64,
        settings: ScoringSettings,
    ) -> Result<Self> {
        let worker = InferenceWorker::spawn(analyzer)?;
        Ok(Self::with_mode(
            Mode::Ml {
                worker,
                reference,
                threshold,
            },
            period_ms,
            settings,
        ))
    }

    fn with_mode(mode: Mode, period_ms: u64, settings: ScoringSettings) -> Self {
        Self {
            mode,
            period_ms,
            task: None,
            sampler: FrameSampler::new(),
            aggregator: ScoreAggregator::new(settings),
            generation: 0,
            last_result: None,
            dropped_ticks: 0,
        }
    }

    pub fn is_ml(&self) -> bool {
        matches!(self.mode, Mode::Ml { .. })
    }

    pub fn period_ms(&self) -> u64 {
        self.period_ms
    }

    pub fn is_running(&self) -> bool {
        self.task.is_some()
    }

    pub fn start(&mut self, now_ms: u64) {
        if let Some(task) = self.task.take() {
            task.cancel();
        }
        self.task = Some(ScheduledTask::start("analysis", self.period_ms, now_ms));
        log::info!(
            "analysis started ({} path, every {} ms)",
            if self.is_ml() { "ml" } else { "heuristic" },
            self.period_ms
        );
    }

    /// Cancel the timer. A job still in flight finishes and its result is discarded.
    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.cancel();
            self.generation += 1;
            log::info!("analysis stopped");
        }
    }

    pub fn pause(&mut self, now_ms: u64) {
        if let Some(task) = &mut self.task {
            task.pause(now_ms);
        }
    }

    pub fn resume(&mut self, now_ms: u64) {
        if let Some(task) = &mut self.task {
            task.resume(now_ms);
        }
    }

    /// Clear the score state for a new take.
    pub fn reset(&mut self) {
        self.aggregator.reset();
        self.last_result = None;
        self.generation += 1;
    }

    /// Collect finished inference and, when the timer is due, sample and analyze a frame.
    pub fn poll<S: VideoSource + ?Sized>(&mut self, source: &mut S, now_ms: u64) -> TickOutput {
        let mut output = TickOutput {
            frame: None,
            events: self.collect_outcomes(now_ms),
        };

        let due = match &mut self.task {
            Some(task) => task.poll(now_ms),
            None => false,
        };
        if !due {
            return output;
        }

        let frame = match self.sampler.sample(source, now_ms) {
            Ok(Some(frame)) => frame,
            Ok(None) => return output,
            Err(e) => {
                log::warn!("frame sampling failed: {:#}", e);
                return output;
            }
        };

        match &mut self.mode {
            Mode::Heuristic { scorer, category } => {
                let report = scorer.evaluate(&frame, category.as_deref());
                let detections: Vec<DetectionResult> =
                    report.matches.iter().map(|m| m.to_detection()).collect();
                output
                    .events
                    .extend(self.aggregator.ingest_detections(&detections, now_ms));
                self.last_result = Some(report.result);
            }
            Mode::Ml {
                worker,
                reference,
                threshold,
            } => {
                if worker.is_in_flight() {
                    self.dropped_ticks += 1;
                    log::debug!("inference in flight; dropping tick");
                } else {
                    let reference = match reference {
                        Some(r) if self.aggregator.begin_match_check(now_ms) => {
                            Some((r.clone(), *threshold))
                        }
                        _ => None,
                    };
                    let job = InferenceJob {
                        generation: self.generation,
                        frame: frame.clone(),
                        reference,
                    };
                    if !worker.submit(job) {
                        self.dropped_ticks += 1;
                    }
                }
            }
        }

        output.frame = Some(frame);
        output
    }

    /// Block up to `timeout` for the in-flight job, if any, and score it.
    pub fn wait_for_inference(&mut self, timeout: Duration, now_ms: u64) -> Vec<ScoreEvent> {
        let Mode::Ml { worker, .. } = &mut self.mode else {
            return Vec::new();
        };
        if !worker.is_in_flight() {
            return Vec::new();
        }
        match worker.recv_timeout(timeout) {
            Some(outcome) => apply_outcome(&mut self.aggregator, self.generation, outcome, now_ms),
            None => Vec::new(),
        }
    }

    fn collect_outcomes(&mut self, now_ms: u64) -> Vec<ScoreEvent> {
        let Mode::Ml { worker, .. } = &mut self.mode else {
            return Vec::new();
        };
        let mut events = Vec::new();
        while let Some(outcome) = worker.try_recv() {
            events.extend(apply_outcome(&mut self.aggregator, self.generation, outcome, now_ms));
        }
        events
    }

    pub fn aggregator(&self) -> &ScoreAggregator {
        &self.aggregator
    }

    pub fn total(&self) -> u64 {
        self.aggregator.total()
    }

    /// Latest heuristic verdict; replaced every tick.
    pub fn last_result(&self) -> Option<&AnalysisResult> {
        self.last_result.as_ref()
    }

    pub fn dropped_ticks(&self) -> u64 {
        self.dropped_ticks
    }

    pub fn is_in_flight(&self) -> bool {
        match &self.mode {
            Mode::Ml { worker, .. } => worker.is_in_flight(),
            Mode::Heuristic { .. } => false,
        }
    }
}

fn apply_outcome(
    aggregator: &mut ScoreAggregator,
    generation: u64,
    outcome: InferenceOutcome,
    now_ms: u64,
) -> Vec<ScoreEvent> {
    if outcome.generation != generation {
        log::debug!(
            "discarding inference result from generation {} (now {})",
            outcome.generation,
            generation
        );
        return Vec::new();
    }
    let mut events = Vec::new();
    match outcome.detections {
        Ok(detections) => events.extend(aggregator.ingest_detections(&detections, now_ms)),
        Err(e) => log::warn!("object detection skipped: {}", e),
    }
    match outcome.matched {
        Some(Ok(result)) => events.extend(aggregator.apply_match(&result, now_ms)),
        Some(Err(e)) => log::warn!("reference match skipped: {}", e),
        None => {}
    }
    events
}
