//! Recording session state machine.
//!
//! `idle → countdown → recording ⇄ paused → idle`. The session is driven cooperatively:
//! the owner calls [`RecordingSession::tick`] from its control loop and the session reads
//! time from the injected [`Clock`]. Nothing here is reentrant.

use anyhow::Result;
use std::sync::Arc;

use crate::clock::Clock;
use crate::error::SessionError;
use crate::ingest::VideoSource;
use crate::schedule::ScheduledTask;
use crate::scoring::ScoreEvent;
use crate::session::analysis_loop::AnalysisLoop;
use crate::session::capture::{CaptureConstraints, CaptureDevice, CaptureGuard};
use crate::session::clip::{ClipRecord, StepRef};
use crate::session::recorder::{start_with_fallback, ClipRecorder};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionSettings {
    pub countdown_ticks: u32,
    pub countdown_tick_ms: u64,
    /// Cap used when no prompts are selected.
    pub max_recording_ms: u64,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            countdown_ticks: 3,
            countdown_tick_ms: 1000,
            max_recording_ms: 60_000,
        }
    }
}

/// One prompt of the take and how long it should run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PromptSlot {
    pub id: String,
    pub duration_ms: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Countdown { remaining: u32 },
    Recording,
    Paused,
}

#[derive(Clone, Debug, PartialEq)]
pub enum SessionEvent {
    CountdownTick { remaining: u32 },
    RecordingStarted { mime_type: &'static str },
    PromptAdvanced { index: usize, prompt_id: String },
    Score(ScoreEvent),
    /// The recording limit was reached and the clip finalized.
    AutoStopped(ClipRecord),
}

pub struct RecordingSession<D, R>
where
    D: CaptureDevice + VideoSource,
    R: ClipRecorder,
{
    clock: Arc<dyn Clock>,
    settings: SessionSettings,
    capture: CaptureGuard<D>,
    recorder: R,
    analysis: AnalysisLoop,
    step: StepRef,
    prompts: Vec<PromptSlot>,
    state: SessionState,
    countdown: Option<ScheduledTask>,
    recorded_ms: u64,
    segment_started_ms: Option<u64>,
    prompt_index: Option<usize>,
}

impl<D, R> RecordingSession<D, R>
where
    D: CaptureDevice + VideoSource,
    R: ClipRecorder,
{
    /// Acquire the capture device and build an idle session.
    pub fn open(
        device: D,
        constraints: &CaptureConstraints,
        recorder: R,
        analysis: AnalysisLoop,
        clock: Arc<dyn Clock>,
        settings: SessionSettings,
        step: StepRef,
    ) -> Result<Self, SessionError> {
        let capture = CaptureGuard::acquire(device, constraints)?;
        Ok(Self {
            clock,
            settings,
            capture,
            recorder,
            analysis,
            step,
            prompts: Vec::new(),
            state: SessionState::Idle,
            countdown: None,
            recorded_ms: 0,
            segment_started_ms: None,
            prompt_index: None,
        })
    }

    /// Prompts tracked during recording; their total duration becomes the recording limit.
    pub fn with_prompts(mut self, prompts: Vec<PromptSlot>) -> Self {
        self.prompts = prompts;
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn analysis(&self) -> &AnalysisLoop {
        &self.analysis
    }

    pub fn analysis_mut(&mut self) -> &mut AnalysisLoop {
        &mut self.analysis
    }

    pub fn recorder(&self) -> &R {
        &self.recorder
    }

    pub fn capture(&self) -> &CaptureGuard<D> {
        &self.capture
    }

    pub fn total_score(&self) -> u64 {
        self.analysis.total()
    }

    /// Events still inside the display window.
    pub fn visible_events(&self) -> Vec<&ScoreEvent> {
        self.analysis.aggregator().visible_events(self.clock.now_ms())
    }

    pub fn prompt_index(&self) -> Option<usize> {
        self.prompt_index
    }

    /// Auto-stop limit for this take.
    pub fn limit_ms(&self) -> u64 {
        if self.prompts.is_empty() {
            self.settings.max_recording_ms
        } else {
            self.prompts.iter().map(|p| p.duration_ms).sum()
        }
    }

    /// Recorded time so far; frozen while paused.
    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed_at(self.clock.now_ms())
    }

    fn elapsed_at(&self, now_ms: u64) -> u64 {
        match (self.state, self.segment_started_ms) {
            (SessionState::Recording, Some(start)) => {
                self.recorded_ms + now_ms.saturating_sub(start)
            }
            _ => self.recorded_ms,
        }
    }

    /// Begin the countdown. No-op unless idle.
    pub fn start(&mut self) -> bool {
        if self.state != SessionState::Idle {
            log::debug!("start ignored in state {:?}", self.state);
            return false;
        }
        let now = self.clock.now_ms();
        self.analysis.reset();
        self.recorded_ms = 0;
        self.segment_started_ms = None;
        self.prompt_index = None;
        self.state = SessionState::Countdown {
            remaining: self.settings.countdown_ticks,
        };
        self.countdown = Some(ScheduledTask::start(
            "countdown",
            self.settings.countdown_tick_ms,
            now,
        ));
        log::info!("countdown started ({} ticks)", self.settings.countdown_ticks);
        true
    }

    pub fn pause(&mut self) -> bool {
        if self.state != SessionState::Recording {
            return false;
        }
        let now = self.clock.now_ms();
        self.recorded_ms = self.elapsed_at(now);
        self.segment_started_ms = None;
        self.state = SessionState::Paused;
        self.recorder.pause();
        self.analysis.pause(now);
        log::info!("recording paused at {} ms", self.recorded_ms);
        true
    }

    pub fn resume(&mut self) -> bool {
        if self.state != SessionState::Paused {
            return false;
        }
        let now = self.clock.now_ms();
        self.segment_started_ms = Some(now);
        self.state = SessionState::Recording;
        self.recorder.resume();
        self.analysis.resume(now);
        log::info!("recording resumed");
        true
    }

    /// Stop the take. Yields a clip only when something was recorded.
    pub fn stop(&mut self) -> Result<Option<ClipRecord>> {
        match self.state {
            SessionState::Idle => Ok(None),
            SessionState::Countdown { .. } => {
                self.cancel_countdown();
                self.state = SessionState::Idle;
                log::info!("countdown cancelled");
                Ok(None)
            }
            SessionState::Recording | SessionState::Paused => self.finalize(self.clock.now_ms()),
        }
    }

    /// Advance timers. Call from the control loop.
    pub fn tick(&mut self) -> Result<Vec<SessionEvent>> {
        let now = self.clock.now_ms();
        let mut events = Vec::new();
        match self.state {
            SessionState::Idle | SessionState::Paused => {}
            SessionState::Countdown { remaining } => {
                let fired = self
                    .countdown
                    .as_mut()
                    .map(|task| task.poll(now))
                    .unwrap_or(false);
                if fired {
                    let remaining = remaining.saturating_sub(1);
                    events.push(SessionEvent::CountdownTick { remaining });
                    if remaining == 0 {
                        self.cancel_countdown();
                        events.extend(self.begin_recording(now)?);
                    } else {
                        self.state = SessionState::Countdown { remaining };
                    }
                }
            }
            SessionState::Recording => {
                let output = self.analysis.poll(&mut self.capture, now);
                if let Some(frame) = &output.frame {
                    self.recorder.push_chunk(frame.pixels());
                }
                events.extend(output.events.into_iter().map(SessionEvent::Score));

                let elapsed = self.elapsed_at(now);
                if let Some(event) = self.track_prompt(elapsed) {
                    events.push(event);
                }
                if elapsed >= self.limit_ms() {
                    log::info!("recording limit reached ({} ms)", self.limit_ms());
                    if let Some(clip) = self.finalize(now)? {
                        events.push(SessionEvent::AutoStopped(clip));
                    }
                }
            }
        }
        Ok(events)
    }

    fn begin_recording(&mut self, now_ms: u64) -> Result<Vec<SessionEvent>> {
        let mime_type = match start_with_fallback(&mut self.recorder) {
            Ok(mime) => mime,
            Err(e) => {
                self.state = SessionState::Idle;
                return Err(e.into());
            }
        };
        self.state = SessionState::Recording;
        self.segment_started_ms = Some(now_ms);
        self.analysis.start(now_ms);
        log::info!("recording started ({})", mime_type);

        let mut events = vec![SessionEvent::RecordingStarted { mime_type }];
        if let Some(event) = self.track_prompt(0) {
            events.push(event);
        }
        Ok(events)
    }

    /// The active prompt is the first whose cumulative end is not yet passed.
    fn track_prompt(&mut self, elapsed_ms: u64) -> Option<SessionEvent> {
        let mut cumulative = 0u64;
        let mut active = None;
        for (index, prompt) in self.prompts.iter().enumerate() {
            cumulative += prompt.duration_ms;
            if elapsed_ms <= cumulative {
                active = Some(index);
                break;
            }
        }
        let index = active?;
        if self.prompt_index == Some(index) {
            return None;
        }
        self.prompt_index = Some(index);
        let prompt_id = self.prompts[index].id.clone();
        log::debug!("prompt {} active ({})", index, prompt_id);
        Some(SessionEvent::PromptAdvanced { index, prompt_id })
    }

    fn finalize(&mut self, now_ms: u64) -> Result<Option<ClipRecord>> {
        self.recorded_ms = self.elapsed_at(now_ms);
        self.segment_started_ms = None;
        self.state = SessionState::Idle;
        self.analysis.stop();
        let total = self.analysis.total();
        let recorded = self.recorder.stop();
        self.analysis.reset();

        let Some(recorded) = recorded else {
            log::warn!("recorder produced no data; no clip");
            return Ok(None);
        };
        let clip = ClipRecord::new(self.step.clone(), self.recorded_ms, recorded.size, now_ms)?
            .with_ai_score(total);
        log::info!(
            "clip finalized: {:.1}s, {} bytes, {} points",
            clip.duration,
            clip.size,
            total
        );
        Ok(Some(clip))
    }

    fn cancel_countdown(&mut self) {
        if let Some(task) = self.countdown.take() {
            task.cancel();
        }
    }

    /// Release the capture device now instead of on drop.
    pub fn close(mut self) -> Result<Option<ClipRecord>> {
        let clip = self.stop()?;
        self.capture.release();
        Ok(clip)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{HeuristicScorer, NoJitter, PatternTable};
    use crate::clock::ManualClock;
    use crate::ingest::SyntheticSource;
    use crate::scoring::ScoringSettings;
    use crate::session::recorder::MemoryRecorder;

    fn session(clock: &ManualClock) -> RecordingSession<SyntheticSource, MemoryRecorder> {
        let source = SyntheticSource::open("stub://gray", 8, 8).unwrap();
        let scorer = HeuristicScorer::new(PatternTable::builtin(), Box::new(NoJitter));
        let analysis = AnalysisLoop::heuristic(scorer, None, 200, ScoringSettings::default());
        RecordingSession::open(
            source,
            &CaptureConstraints::default(),
            MemoryRecorder::new(),
            analysis,
            Arc::new(clock.clone()),
            SessionSettings::default(),
            StepRef::Index(0),
        )
        .unwrap()
    }

    fn run_countdown(session: &mut RecordingSession<SyntheticSource, MemoryRecorder>, clock: &ManualClock) {
        for _ in 0..3 {
            clock.advance(1000);
            session.tick().unwrap();
        }
    }

    #[test]
    fn countdown_then_recording() {
        let clock = ManualClock::new(0);
        let mut session = session(&clock);
        assert!(session.start());
        assert_eq!(session.state(), SessionState::Countdown { remaining: 3 });
        clock.advance(1000);
        assert_eq!(
            session.tick().unwrap(),
            vec![SessionEvent::CountdownTick { remaining: 2 }]
        );
        clock.advance(2000);
        let events = session.tick().unwrap();
        assert_eq!(events[0], SessionEvent::CountdownTick { remaining: 1 });
        assert_eq!(session.state(), SessionState::Countdown { remaining: 1 });
        clock.advance(1000);
        let events = session.tick().unwrap();
        assert!(events.contains(&SessionEvent::RecordingStarted {
            mime_type: crate::session::recorder::PREFERRED_MIME
        }));
        assert_eq!(session.state(), SessionState::Recording);
    }

    #[test]
    fn stop_while_idle_and_start_while_recording() {
        let clock = ManualClock::new(0);
        let mut session = session(&clock);
        assert!(session.stop().unwrap().is_none());
        session.start();
        run_countdown(&mut session, &clock);
        assert!(!session.start());
        assert_eq!(session.state(), SessionState::Recording);
    }

    #[test]
    fn paused_time_not_counted() {
        let clock = ManualClock::new(0);
        let mut session = session(&clock);
        session.start();
        run_countdown(&mut session, &clock);
        clock.advance(2000);
        session.tick().unwrap();
        assert!(session.pause());
        clock.advance(10_000);
        session.tick().unwrap();
        assert_eq!(session.elapsed_ms(), 2000);
        assert!(session.resume());
        clock.advance(1500);
        let clip = session.stop().unwrap().unwrap();
        assert_eq!(clip.duration, 3.5);
        assert!(clip.size > 0);
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[test]
    fn auto_stops_at_prompt_total() {
        let clock = ManualClock::new(0);
        let mut session = session(&clock).with_prompts(vec![
            PromptSlot {
                id: "a".into(),
                duration_ms: 2000,
            },
            PromptSlot {
                id: "b".into(),
                duration_ms: 1000,
            },
        ]);
        session.start();
        run_countdown(&mut session, &clock);
        assert_eq!(session.prompt_index(), Some(0));

        clock.advance(2500);
        let events = session.tick().unwrap();
        assert!(events.contains(&SessionEvent::PromptAdvanced {
            index: 1,
            prompt_id: "b".into()
        }));

        clock.advance(500);
        let events = session.tick().unwrap();
        let clip = events.iter().find_map(|e| match e {
            SessionEvent::AutoStopped(clip) => Some(clip.clone()),
            _ => None,
        });
        assert_eq!(clip.unwrap().duration, 3.0);
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[test]
    fn stop_during_countdown_yields_no_clip() {
        let clock = ManualClock::new(0);
        let mut session = session(&clock);
        session.start();
        clock.advance(1000);
        session.tick().unwrap();
        assert!(session.stop().unwrap().is_none());
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[test]
    fn close_releases_capture() {
        let clock = ManualClock::new(0);
        let session = session(&clock);
        let stats = session.capture().device().capture_stats();
        assert_eq!(stats.active(), 1);
        session.close().unwrap();
        assert_eq!(stats.active(), 0);
    }
}
