//! Model-backed analyzer.
//!
//! Wraps a general object detector and an image-embedding model. Both models load once per
//! analyzer (in parallel) and are then shared read-only; concurrent `initialize` calls
//! collapse into a single load sequence.

use anyhow::Result;
use std::sync::{Arc, Mutex, RwLock};

use crate::analysis::backend::{AnalysisCapability, SceneAnalyzer};
use crate::analysis::reference::ReferenceLoader;
use crate::analysis::result::{DetectionResult, MatchResult};
use crate::analysis::similarity::cosine_similarity;
use crate::error::AnalyzerError;
use crate::frame::Frame;

/// Labels objects in a frame.
pub trait ObjectDetectionModel: Send + Sync {
    fn detect(&self, frame: &Frame) -> Result<Vec<DetectionResult>>;
}

/// Maps a frame to a feature vector.
pub trait EmbeddingModel: Send + Sync {
    fn embed(&self, frame: &Frame) -> Result<Vec<f32>>;
}

/// Produces fresh model instances.
pub trait ModelLoader: Send + Sync {
    fn load_detector(&self) -> Result<Box<dyn ObjectDetectionModel>>;
    fn load_embedder(&self) -> Result<Box<dyn EmbeddingModel>>;
}

struct LoadedModels {
    detector: Box<dyn ObjectDetectionModel>,
    embedder: Box<dyn EmbeddingModel>,
}

pub struct MlAnalyzer {
    loader: Arc<dyn ModelLoader>,
    references: Arc<dyn ReferenceLoader>,
    /// Serializes load sequences.
    init_lock: Mutex<()>,
    models: RwLock<Option<Arc<LoadedModels>>>,
}

impl MlAnalyzer {
    pub fn new(loader: Arc<dyn ModelLoader>, references: Arc<dyn ReferenceLoader>) -> Self {
        Self {
            loader,
            references,
            init_lock: Mutex::new(()),
            models: RwLock::new(None),
        }
    }

    fn loaded(&self) -> Result<Arc<LoadedModels>, AnalyzerError> {
        let guard = self
            .models
            .read()
            .map_err(|_| AnalyzerError::ModelLoad("model lock poisoned".to_string()))?;
        guard.clone().ok_or(AnalyzerError::NotInitialized)
    }

    fn load_models(&self) -> Result<LoadedModels, AnalyzerError> {
        let loader = self.loader.as_ref();
        let (detector, embedder) = std::thread::scope(|scope| {
            let detector = scope.spawn(|| loader.load_detector());
            let embedder = scope.spawn(|| loader.load_embedder());
            (detector.join(), embedder.join())
        });

        let detector = detector
            .map_err(|_| AnalyzerError::ModelLoad("detector loader panicked".to_string()))?
            .map_err(|e| AnalyzerError::ModelLoad(format!("detector: {:#}", e)))?;
        let embedder = embedder
            .map_err(|_| AnalyzerError::ModelLoad("embedding loader panicked".to_string()))?
            .map_err(|e| AnalyzerError::ModelLoad(format!("embedder: {:#}", e)))?;
        Ok(LoadedModels { detector, embedder })
    }

    fn similarity(&self, models: &LoadedModels, frame: &Frame, reference: &str) -> Result<f32> {
        let reference_frame = self.references.load(reference)?;
        let live = models.embedder.embed(frame)?;
        let target = models.embedder.embed(&reference_frame)?;
        Ok(cosine_similarity(&live, &target))
    }
}

impl SceneAnalyzer for MlAnalyzer {
    fn name(&self) -> &'static str {
        "ml"
    }

    fn supports(&self, capability: AnalysisCapability) -> bool {
        matches!(
            capability,
            AnalysisCapability::ObjectDetection | AnalysisCapability::ReferenceMatch
        )
    }

    fn initialize(&self) -> Result<(), AnalyzerError> {
        if self.is_initialized() {
            return Ok(());
        }
        let _guard = self
            .init_lock
            .lock()
            .map_err(|_| AnalyzerError::ModelLoad("init lock poisoned".to_string()))?;
        // Another caller may have finished while we waited.
        if self.is_initialized() {
            return Ok(());
        }

        log::info!("loading detection and embedding models");
        let models = match self.load_models() {
            Ok(models) => models,
            Err(e) => {
                log::error!("{}", e);
                return Err(e);
            }
        };
        let mut slot = self
            .models
            .write()
            .map_err(|_| AnalyzerError::ModelLoad("model lock poisoned".to_string()))?;
        *slot = Some(Arc::new(models));
        log::info!("models loaded");
        Ok(())
    }

    fn is_initialized(&self) -> bool {
        self.models.read().map(|m| m.is_some()).unwrap_or(false)
    }

    fn detect_objects(&self, frame: &Frame) -> Result<Vec<DetectionResult>, AnalyzerError> {
        let models = self.loaded()?;
        match models.detector.detect(frame) {
            Ok(detections) => Ok(detections),
            Err(e) => {
                log::warn!("object detection failed: {:#}", e);
                Ok(Vec::new())
            }
        }
    }

    fn compare_with_reference(
        &self,
        frame: &Frame,
        reference: &str,
        threshold: f32,
    ) -> Result<MatchResult, AnalyzerError> {
        let models = self.loaded()?;
        match self.similarity(&models, frame, reference) {
            Ok(similarity) => Ok(MatchResult::from_similarity(similarity, threshold)),
            Err(e) => {
                log::warn!("reference comparison against {} failed: {:#}", reference, e);
                Ok(MatchResult::no_match(threshold))
            }
        }
    }

    fn dispose(&self) {
        if let Ok(mut slot) = self.models.write() {
            if slot.take().is_some() {
                log::info!("models released");
            }
        }
    }
}
