mod backend;
pub mod backends;
pub mod heuristic;
pub mod patterns;
pub mod reference;
mod registry;
mod result;
pub mod similarity;

pub use backend::{AnalysisCapability, SceneAnalyzer};
pub use backends::{HeuristicAnalyzer, MlAnalyzer, ModelLoader};
pub use heuristic::{HeuristicReport, HeuristicScorer, Jitter, NoJitter, RandomJitter, ScoreBreakdown};
pub use patterns::{ObjectPattern, PatternMatch, PatternTable};
pub use reference::{MemoryReferenceLoader, ReferenceLoader};
pub use registry::AnalyzerRegistry;
pub use result::{AnalysisResult, BoundingBox, DetectionResult, MatchResult, DEFAULT_MATCH_THRESHOLD};
pub use similarity::cosine_similarity;

#[cfg(feature = "ingest-image")]
pub use reference::ImageReferenceLoader;
