//! RoomReel frame analysis kernel
//!
//! This crate implements the scoring core behind short "room tour" challenge videos:
//! frames are sampled from a live capture while a clip records, analyzed for room
//! objects and photographic quality, and turned into point events that accumulate
//! into the clip's score.
//!
//! # Architecture
//!
//! Two analysis paths share one aggregator:
//!
//! 1. **Heuristic**: per-frame statistics (lighting, contrast, color spread, edges)
//!    plus color/edge pattern matching against a per-category pattern table.
//! 2. **ML**: object detection and reference-photo similarity on pluggable models,
//!    run off the control loop on an inference worker.
//!
//! Sessions are single-threaded state machines driven by `tick()`; time flows only
//! through [`clock::Clock`] so every timer is deterministic under test.
//!
//! # Module Structure
//!
//! - `frame`: immutable RGB(A) frame container
//! - `ingest`: video sources and the frame sampler
//! - `analysis`: scorers, pattern detection, analyzer backends and registry
//! - `scoring`: room-object catalog and the score aggregator
//! - `session`: capture, recorder, analysis loop and the recording state machine
//! - `challenge`: built-in challenge catalog and prompt selection
//! - `submission`: payload validation for finished challenges
//! - `config`: file + environment configuration

pub mod analysis;
pub mod challenge;
pub mod clock;
pub mod config;
pub mod error;
pub mod frame;
pub mod ingest;
pub mod schedule;
pub mod scoring;
pub mod session;
pub mod submission;
pub mod ui;

pub use analysis::{
    AnalysisCapability, AnalysisResult, AnalyzerRegistry, DetectionResult, HeuristicScorer,
    MatchResult, PatternTable, SceneAnalyzer,
};
pub use challenge::{AnalysisPath, Challenge, ChallengeCatalog};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::ReelConfig;
pub use error::{AnalyzerError, SessionError, ValidationErrors};
pub use frame::{Frame, PixelLayout};
pub use ingest::{FrameSampler, SyntheticSource, VideoSource};
pub use scoring::{ScoreAggregator, ScoreEvent, ScoringSettings};
pub use session::{AnalysisLoop, ClipRecord, RecordingSession, SessionEvent, SessionState};
pub use submission::SubmissionPayload;
