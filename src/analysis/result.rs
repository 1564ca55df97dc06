use serde::{Deserialize, Serialize};

/// Default similarity threshold for reference matching.
pub const DEFAULT_MATCH_THRESHOLD: f32 = 0.85;

/// Bounding box `[x, y, width, height]` in source pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl BoundingBox {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn as_array(&self) -> [f32; 4] {
        [self.x, self.y, self.width, self.height]
    }
}

/// One labelled object found in a frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DetectionResult {
    pub class: String,
    /// Confidence in 0..=1.
    pub score: f32,
    pub bbox: BoundingBox,
}

impl DetectionResult {
    pub fn new(class: impl Into<String>, score: f32, bbox: BoundingBox) -> Self {
        Self {
            class: class.into(),
            score,
            bbox,
        }
    }
}

/// Outcome of comparing a live frame against a reference photo.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchResult {
    pub similarity: f32,
    pub is_match: bool,
    pub threshold: f32,
}

impl MatchResult {
    pub fn from_similarity(similarity: f32, threshold: f32) -> Self {
        Self {
            similarity,
            is_match: similarity > threshold,
            threshold,
        }
    }

    /// The result reported whenever a comparison cannot be carried out.
    pub fn no_match(threshold: f32) -> Self {
        Self {
            similarity: 0.0,
            is_match: false,
            threshold,
        }
    }
}

/// Heuristic "good shot" verdict for one frame.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub is_good_shot: bool,
    /// Clamped to 0..=100.
    pub confidence: f32,
    /// At most three labels, in scoring order.
    pub reasons: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detected_objects: Option<Vec<String>>,
}
