//! Recording sessions.
//!
//! - `capture`: camera handle lifecycle and constraints
//! - `recorder`: media recorder with container fallback
//! - `analysis_loop`: periodic frame analysis feeding the score aggregator
//! - `controller`: countdown/record/pause/stop state machine
//! - `clip`: metadata of a finished recording

mod analysis_loop;
mod capture;
mod clip;
mod controller;
mod recorder;

pub use analysis_loop::{AnalysisLoop, InferenceWorker, TickOutput};
pub use capture::{CaptureConstraints, CaptureDevice, CaptureGuard, FacingMode};
pub use clip::{ClipRecord, StepRef};
pub use controller::{PromptSlot, RecordingSession, SessionEvent, SessionSettings, SessionState};
pub use recorder::{
    start_with_fallback, ClipRecorder, MemoryRecorder, RecordedClip, FALLBACK_MIME, PREFERRED_MIME,
};
