pub mod heuristic;
pub mod ml;

#[cfg(feature = "backend-tract")]
pub mod tract;

pub use heuristic::HeuristicAnalyzer;
pub use ml::{EmbeddingModel, MlAnalyzer, ModelLoader, ObjectDetectionModel};

#[cfg(feature = "backend-tract")]
pub use tract::TractModelLoader;
