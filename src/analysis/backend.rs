use crate::analysis::result::{DetectionResult, MatchResult};
use crate::error::AnalyzerError;
use crate::frame::Frame;

/// Capabilities an analyzer may offer.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AnalysisCapability {
    /// Labelled objects with confidence.
    ObjectDetection,
    /// Similarity against a reference photo.
    ReferenceMatch,
    /// Heuristic "good shot" scoring.
    SceneScore,
}

/// Scene analyzer strategy.
///
/// The heuristic and ML analyzers are interchangeable behind this trait. Methods take
/// `&self` so an analyzer can be shared between the control loop and an inference
/// worker; implementations use interior mutability for their lifecycle state.
///
/// Lifecycle: `initialize` is idempotent and must collapse concurrent calls into one
/// load. Until it succeeds (and after `dispose`), `detect_objects` and
/// `compare_with_reference` return [`AnalyzerError::NotInitialized`]. Once initialized,
/// per-frame failures are absorbed: detection yields an empty list and comparison yields
/// [`MatchResult::no_match`].
pub trait SceneAnalyzer: Send + Sync {
    /// Analyzer identifier.
    fn name(&self) -> &'static str;

    /// Returns true when the analyzer supports a capability.
    fn supports(&self, capability: AnalysisCapability) -> bool;

    fn initialize(&self) -> Result<(), AnalyzerError>;

    fn is_initialized(&self) -> bool;

    fn detect_objects(&self, frame: &Frame) -> Result<Vec<DetectionResult>, AnalyzerError>;

    fn compare_with_reference(
        &self,
        frame: &Frame,
        reference: &str,
        threshold: f32,
    ) -> Result<MatchResult, AnalyzerError>;

    /// Release loaded resources. Safe to call repeatedly.
    fn dispose(&self);
}
