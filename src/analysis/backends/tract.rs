#![cfg(feature = "backend-tract")]

//! ONNX models via tract.
//!
//! The detector is expected to follow the SSD post-processed output convention:
//! `boxes [1, N, 4]` as normalized `(ymin, xmin, ymax, xmax)`, `classes [1, N]` and
//! `scores [1, N]`. The embedding model takes an ImageNet-normalized NCHW tensor and its
//! first output is flattened into the feature vector.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use tract_onnx::prelude::*;

use crate::analysis::backends::ml::{EmbeddingModel, ModelLoader, ObjectDetectionModel};
use crate::analysis::result::{BoundingBox, DetectionResult};
use crate::frame::Frame;

type Plan = TypedRunnableModel<TypedModel>;

const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// COCO class names in contiguous id order.
const COCO_LABELS: [&str; 80] = [
    "person", "bicycle", "car", "motorcycle", "airplane", "bus", "train", "truck", "boat",
    "traffic light", "fire hydrant", "stop sign", "parking meter", "bench", "bird", "cat", "dog",
    "horse", "sheep", "cow", "elephant", "bear", "zebra", "giraffe", "backpack", "umbrella",
    "handbag", "tie", "suitcase", "frisbee", "skis", "snowboard", "sports ball", "kite",
    "baseball bat", "baseball glove", "skateboard", "surfboard", "tennis racket", "bottle",
    "wine glass", "cup", "fork", "knife", "spoon", "bowl", "banana", "apple", "sandwich",
    "orange", "broccoli", "carrot", "hot dog", "pizza", "donut", "cake", "chair", "couch",
    "potted plant", "bed", "dining table", "toilet", "tv", "laptop", "mouse", "remote",
    "keyboard", "cell phone", "microwave", "oven", "toaster", "sink", "refrigerator", "book",
    "clock", "vase", "scissors", "teddy bear", "hair drier", "toothbrush",
];

#[derive(Clone, Debug)]
pub struct TractModelLoader {
    detector_path: PathBuf,
    embedding_path: PathBuf,
    input_size: u32,
    class_offset: i64,
    min_score: f32,
}

impl TractModelLoader {
    pub fn new(
        detector_path: impl Into<PathBuf>,
        embedding_path: impl Into<PathBuf>,
        input_size: u32,
        class_offset: i64,
    ) -> Self {
        Self {
            detector_path: detector_path.into(),
            embedding_path: embedding_path.into(),
            input_size,
            class_offset,
            min_score: 0.1,
        }
    }

    /// Drop raw detections below this score before they reach the aggregator.
    pub fn with_min_score(mut self, min_score: f32) -> Self {
        self.min_score = min_score;
        self
    }
}

impl ModelLoader for TractModelLoader {
    fn load_detector(&self) -> Result<Box<dyn ObjectDetectionModel>> {
        let plan = load_plan(&self.detector_path, self.input_size)?;
        Ok(Box::new(TractDetector {
            plan,
            input_size: self.input_size,
            class_offset: self.class_offset,
            min_score: self.min_score,
        }))
    }

    fn load_embedder(&self) -> Result<Box<dyn EmbeddingModel>> {
        let plan = load_plan(&self.embedding_path, self.input_size)?;
        Ok(Box::new(TractEmbedder {
            plan,
            input_size: self.input_size,
        }))
    }
}

fn load_plan(path: &Path, size: u32) -> Result<Plan> {
    tract_onnx::onnx()
        .model_for_path(path)
        .with_context(|| format!("failed to load ONNX model from {}", path.display()))?
        .with_input_fact(
            0,
            InferenceFact::dt_shape(f32::datum_type(), tvec!(1, 3, size as usize, size as usize)),
        )
        .context("failed to set input fact")?
        .into_optimized()
        .context("failed to optimize ONNX model")?
        .into_runnable()
        .context("failed to build runnable ONNX model")
}

fn build_input(frame: &Frame, size: u32, normalize: bool) -> Result<Tensor> {
    let rgb = frame.resample_rgb(size, size)?;
    let side = size as usize;
    let input = tract_ndarray::Array4::from_shape_fn((1, 3, side, side), |(_, c, y, x)| {
        let value = rgb[(y * side + x) * 3 + c] as f32 / 255.0;
        if normalize {
            (value - IMAGENET_MEAN[c]) / IMAGENET_STD[c]
        } else {
            value
        }
    });
    Ok(input.into_tensor())
}

struct TractDetector {
    plan: Plan,
    input_size: u32,
    class_offset: i64,
    min_score: f32,
}

impl TractDetector {
    fn label(&self, class_id: f32) -> Option<&'static str> {
        let index = class_id.round() as i64 - self.class_offset;
        usize::try_from(index)
            .ok()
            .and_then(|i| COCO_LABELS.get(i).copied())
    }
}

impl ObjectDetectionModel for TractDetector {
    fn detect(&self, frame: &Frame) -> Result<Vec<DetectionResult>> {
        let input = build_input(frame, self.input_size, false)?;
        let outputs = self
            .plan
            .run(tvec!(input.into()))
            .context("ONNX inference failed")?;
        if outputs.len() < 3 {
            return Err(anyhow!("detector produced {} outputs, expected 3", outputs.len()));
        }
        let boxes = outputs[0]
            .to_array_view::<f32>()
            .context("box tensor was not f32")?;
        let classes = outputs[1]
            .to_array_view::<f32>()
            .context("class tensor was not f32")?;
        let scores = outputs[2]
            .to_array_view::<f32>()
            .context("score tensor was not f32")?;

        let boxes: Vec<f32> = boxes.iter().copied().collect();
        let width = frame.width() as f32;
        let height = frame.height() as f32;

        let mut detections = Vec::new();
        for (i, (class_id, score)) in classes.iter().zip(scores.iter()).enumerate() {
            if *score < self.min_score {
                continue;
            }
            let Some(label) = self.label(*class_id) else {
                continue;
            };
            let Some(b) = boxes.get(i * 4..i * 4 + 4) else {
                break;
            };
            let (ymin, xmin, ymax, xmax) = (b[0], b[1], b[2], b[3]);
            detections.push(DetectionResult::new(
                label,
                score.clamp(0.0, 1.0),
                BoundingBox::new(
                    xmin * width,
                    ymin * height,
                    (xmax - xmin).max(0.0) * width,
                    (ymax - ymin).max(0.0) * height,
                ),
            ));
        }
        Ok(detections)
    }
}

struct TractEmbedder {
    plan: Plan,
    input_size: u32,
}

impl EmbeddingModel for TractEmbedder {
    fn embed(&self, frame: &Frame) -> Result<Vec<f32>> {
        let input = build_input(frame, self.input_size, true)?;
        let outputs = self
            .plan
            .run(tvec!(input.into()))
            .context("ONNX inference failed")?;
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("embedding model produced no outputs"))?;
        let features = output
            .to_array_view::<f32>()
            .context("embedding tensor was not f32")?;
        Ok(features.iter().copied().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_model_file_is_an_error() {
        let loader = TractModelLoader::new("/nonexistent/det.onnx", "/nonexistent/emb.onnx", 64, 1);
        assert!(loader.load_detector().is_err());
        assert!(loader.load_embedder().is_err());
    }

    #[test]
    fn input_tensor_is_nchw() -> Result<()> {
        let frame = Frame::uniform(10, 10, [255, 0, 0]);
        let tensor = build_input(&frame, 4, false)?;
        assert_eq!(tensor.shape(), &[1, 3, 4, 4]);
        let view = tensor.to_array_view::<f32>()?;
        assert_eq!(view[[0, 0, 0, 0]], 1.0);
        assert_eq!(view[[0, 1, 0, 0]], 0.0);
        Ok(())
    }
}
