use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::analysis::backend::{AnalysisCapability, SceneAnalyzer};
use crate::analysis::patterns::PatternTable;
use crate::analysis::reference::ReferenceLoader;
use crate::analysis::result::{DetectionResult, MatchResult};
use crate::analysis::similarity::{color_histogram_embedding, cosine_similarity};
use crate::error::AnalyzerError;
use crate::frame::Frame;

/// Pattern category used when `with_category` is not called.
pub const DEFAULT_CATEGORY: &str = "room-tour";

/// Model-free analyzer: pattern detection plus color-histogram similarity.
///
/// Serves as the fallback when the ML analyzer fails to load. `detect_objects` runs the
/// patterns of a single category, [`DEFAULT_CATEGORY`] unless `with_category` sets another.
pub struct HeuristicAnalyzer {
    patterns: PatternTable,
    category: String,
    references: Arc<dyn ReferenceLoader>,
    initialized: AtomicBool,
}

impl HeuristicAnalyzer {
    pub fn new(patterns: PatternTable, references: Arc<dyn ReferenceLoader>) -> Self {
        Self {
            patterns,
            category: DEFAULT_CATEGORY.to_string(),
            references,
            initialized: AtomicBool::new(false),
        }
    }

    /// Pattern category used by `detect_objects`.
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    fn ensure_initialized(&self) -> Result<(), AnalyzerError> {
        if self.is_initialized() {
            Ok(())
        } else {
            Err(AnalyzerError::NotInitialized)
        }
    }
}

impl SceneAnalyzer for HeuristicAnalyzer {
    fn name(&self) -> &'static str {
        "heuristic"
    }

    fn supports(&self, capability: AnalysisCapability) -> bool {
        matches!(
            capability,
            AnalysisCapability::ObjectDetection
                | AnalysisCapability::ReferenceMatch
                | AnalysisCapability::SceneScore
        )
    }

    fn initialize(&self) -> Result<(), AnalyzerError> {
        if !self.initialized.swap(true, Ordering::SeqCst) {
            log::info!("heuristic analyzer ready (category {})", self.category);
        }
        Ok(())
    }

    fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    fn detect_objects(&self, frame: &Frame) -> Result<Vec<DetectionResult>, AnalyzerError> {
        self.ensure_initialized()?;
        Ok(self
            .patterns
            .detect(frame, Some(&self.category))
            .iter()
            .map(|m| m.to_detection())
            .collect())
    }

    fn compare_with_reference(
        &self,
        frame: &Frame,
        reference: &str,
        threshold: f32,
    ) -> Result<MatchResult, AnalyzerError> {
        self.ensure_initialized()?;
        let reference_frame = match self.references.load(reference) {
            Ok(frame) => frame,
            Err(e) => {
                log::warn!("reference {} unavailable: {:#}", reference, e);
                return Ok(MatchResult::no_match(threshold));
            }
        };
        let similarity = cosine_similarity(
            &color_histogram_embedding(frame),
            &color_histogram_embedding(&reference_frame),
        );
        Ok(MatchResult::from_similarity(similarity, threshold))
    }

    fn dispose(&self) {
        self.initialized.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::reference::MemoryReferenceLoader;

    fn analyzer() -> HeuristicAnalyzer {
        let references = MemoryReferenceLoader::new()
            .with("/corner.jpg", Frame::uniform(16, 16, [200, 40, 40]));
        HeuristicAnalyzer::new(PatternTable::builtin(), Arc::new(references))
    }

    #[test]
    fn requires_initialize() {
        let analyzer = analyzer();
        let frame = Frame::uniform(16, 16, [0, 0, 0]);
        assert_eq!(
            analyzer.detect_objects(&frame),
            Err(AnalyzerError::NotInitialized)
        );
        analyzer.initialize().unwrap();
        assert!(analyzer.detect_objects(&frame).unwrap().is_empty());
        analyzer.dispose();
        assert!(!analyzer.is_initialized());
    }

    fn striped(size: u32) -> Frame {
        let mut data = Vec::new();
        for y in 0..size {
            for x in 0..size {
                let v = if (x + y) % 4 < 2 { 200 } else { 20 };
                data.extend_from_slice(&[v, v, v, 255]);
            }
        }
        Frame::rgba(data, size, size).unwrap()
    }

    #[test]
    fn detection_uses_configured_category() {
        let frame = striped(64);
        let room = analyzer();
        room.initialize().unwrap();
        let found = room.detect_objects(&frame).unwrap();
        assert!(found.iter().any(|d| d.class == "bed"));

        let study = analyzer().with_category("study-space");
        study.initialize().unwrap();
        assert!(study.detect_objects(&frame).unwrap().is_empty());
    }

    #[test]
    fn matches_similar_reference() {
        let analyzer = analyzer();
        analyzer.initialize().unwrap();
        let live = Frame::uniform(32, 32, [210, 50, 30]);
        let result = analyzer
            .compare_with_reference(&live, "/corner.jpg", 0.85)
            .unwrap();
        assert!(result.is_match);
        assert_eq!(result.threshold, 0.85);
    }

    #[test]
    fn missing_reference_is_a_non_match() {
        let analyzer = analyzer();
        analyzer.initialize().unwrap();
        let live = Frame::uniform(32, 32, [210, 50, 30]);
        let result = analyzer
            .compare_with_reference(&live, "/nope.jpg", 0.5)
            .unwrap();
        assert_eq!(result, MatchResult::no_match(0.5));
    }
}
