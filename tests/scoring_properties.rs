use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};

use anyhow::Result;

use roomreel_kernel::analysis::backends::{
    EmbeddingModel, MlAnalyzer, ModelLoader, ObjectDetectionModel,
};
use roomreel_kernel::analysis::heuristic::FrameStats;
use roomreel_kernel::analysis::{
    BoundingBox, DetectionResult, HeuristicScorer, MatchResult, MemoryReferenceLoader, NoJitter,
    PatternTable, RandomJitter, SceneAnalyzer, ScoreBreakdown,
};
use roomreel_kernel::frame::{Frame, PixelLayout};
use roomreel_kernel::ingest::{FrameSampler, SyntheticSource};
use roomreel_kernel::scoring::{room_object, ScoreAggregator, ScoreKind};

fn gray(width: u32, height: u32) -> Frame {
    Frame::uniform(width, height, [128, 128, 128])
}

#[test]
fn mid_luminance_earns_full_lighting_points() {
    for value in [90u8, 128, 170] {
        let stats = FrameStats::collect(&Frame::uniform(40, 30, [value, value, value])).unwrap();
        let breakdown = ScoreBreakdown::from_stats(&stats, &[]);
        assert_eq!(breakdown.lighting, 30.0, "luminance {}", value);
    }
    let dark = FrameStats::collect(&Frame::uniform(40, 30, [20, 20, 20])).unwrap();
    assert!(ScoreBreakdown::from_stats(&dark, &[]).lighting < 30.0);
}

#[test]
fn gray_frame_without_category() {
    let mut scorer = HeuristicScorer::new(PatternTable::builtin(), Box::new(RandomJitter::seeded(9)));
    let report = scorer.evaluate(&gray(50, 50), None);
    assert_eq!(report.result.detected_objects, Some(Vec::new()));
    assert!(report.breakdown.labels.iter().any(|l| l == "Even composition"));
    assert!(report.breakdown.labels.iter().any(|l| l == "Minimal colors"));
    assert!(report.result.reasons.len() <= 3);
    assert!((55.0..=85.0).contains(&report.result.confidence));
}

#[test]
fn heuristic_score_is_clamped_to_hundred() {
    let mut sampler = FrameSampler::new();
    for scene in ["gray", "gradient", "checker", "noise"] {
        let mut source = SyntheticSource::open(&format!("stub://{}", scene), 96, 64).unwrap();
        let frame = sampler.sample(&mut source, 0).unwrap().unwrap();
        for seed in 0..20 {
            let mut scorer =
                HeuristicScorer::new(PatternTable::builtin(), Box::new(RandomJitter::seeded(seed)));
            for category in [None, Some("room-tour"), Some("study-space"), Some("social-life")] {
                let result = scorer.score(&frame, category);
                assert!(
                    (0.0..=100.0).contains(&result.confidence),
                    "{} scored {}",
                    scene,
                    result.confidence
                );
            }
        }
    }

    // Busy, well-lit frame whose components alone exceed 100 points.
    let center = 32.0f32;
    let pixels: Vec<u8> = (0..64u32 * 64)
        .flat_map(|i| {
            let (x, y) = (i % 64, i / 64);
            let (dx, dy) = (x as f32 - center, y as f32 - center);
            if (dx * dx + dy * dy).sqrt() <= 16.0 {
                [250, 250, 250]
            } else if (x / 4) % 2 == 0 {
                [200, 40, 40]
            } else {
                [40, 200, 40]
            }
        })
        .collect();
    let frame = Frame::new(pixels.as_slice(), 64, 64, PixelLayout::Rgb8, 0).unwrap();
    let mut scorer = HeuristicScorer::new(PatternTable::builtin(), Box::new(NoJitter));
    for category in [None, Some("room-tour"), Some("study-space"), Some("social-life")] {
        let report = scorer.evaluate(&frame, category);
        assert!(report.breakdown.raw_score() > 100.0);
        assert_eq!(report.result.confidence, 100.0);
    }
    for seed in 0..20 {
        let mut scorer =
            HeuristicScorer::new(PatternTable::builtin(), Box::new(RandomJitter::seeded(seed)));
        assert_eq!(scorer.score(&frame, None).confidence, 100.0);
    }
}

#[test]
fn object_credited_once_until_reset() {
    let mut aggregator = ScoreAggregator::default();
    let bed = [DetectionResult::new("bed", 0.5, BoundingBox::default())];

    let first = aggregator.ingest_detections(&bed, 1_000);
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].points, room_object("bed").unwrap().points);
    assert_eq!(first[0].kind, ScoreKind::Object);
    assert!(aggregator.ingest_detections(&bed, 2_000).is_empty());
    assert_eq!(aggregator.total(), 15);

    aggregator.reset();
    assert_eq!(aggregator.total(), 0);
    assert!(aggregator.events().is_empty());
    assert_eq!(aggregator.ingest_detections(&bed, 3_000).len(), 1);
}

#[test]
fn match_checks_are_rate_limited() {
    let mut aggregator = ScoreAggregator::default();
    let evaluations = AtomicUsize::new(0);
    let evaluate = || {
        evaluations.fetch_add(1, Ordering::SeqCst);
        MatchResult::from_similarity(0.95, 0.85)
    };

    assert!(aggregator.try_match_check(10_000, evaluate).is_some());
    assert!(aggregator.try_match_check(11_000, evaluate).is_none());
    assert!(aggregator.try_match_check(13_000, evaluate).is_none());
    assert!(aggregator.try_match_check(13_001, evaluate).is_some());
    assert_eq!(evaluations.load(Ordering::SeqCst), 2);
    assert_eq!(aggregator.total(), 50);
}

#[test]
fn score_events_fade_after_display_window() {
    let mut aggregator = ScoreAggregator::default();
    aggregator.ingest_detections(&[DetectionResult::new("tv", 0.8, BoundingBox::default())], 5_000);
    assert_eq!(aggregator.visible_events(6_999).len(), 1);
    assert!(aggregator.visible_events(7_000).is_empty());
}

struct CountingLoader {
    loads: AtomicUsize,
}

struct NoObjects;

impl ObjectDetectionModel for NoObjects {
    fn detect(&self, _frame: &Frame) -> Result<Vec<DetectionResult>> {
        Ok(Vec::new())
    }
}

struct Flat;

impl EmbeddingModel for Flat {
    fn embed(&self, _frame: &Frame) -> Result<Vec<f32>> {
        Ok(vec![1.0, 0.0])
    }
}

impl ModelLoader for CountingLoader {
    fn load_detector(&self) -> Result<Box<dyn ObjectDetectionModel>> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(std::time::Duration::from_millis(20));
        Ok(Box::new(NoObjects))
    }

    fn load_embedder(&self) -> Result<Box<dyn EmbeddingModel>> {
        Ok(Box::new(Flat))
    }
}

#[test]
fn concurrent_initialize_loads_models_once() {
    let loader = Arc::new(CountingLoader {
        loads: AtomicUsize::new(0),
    });
    let analyzer = Arc::new(MlAnalyzer::new(
        loader.clone(),
        Arc::new(MemoryReferenceLoader::new()),
    ));
    let barrier = Arc::new(Barrier::new(4));
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let analyzer = analyzer.clone();
            let barrier = barrier.clone();
            std::thread::spawn(move || {
                barrier.wait();
                analyzer.initialize()
            })
        })
        .collect();
    for handle in handles {
        assert!(handle.join().unwrap().is_ok());
    }
    assert_eq!(loader.loads.load(Ordering::SeqCst), 1);
    assert!(analyzer.is_initialized());
    assert!(analyzer.detect_objects(&gray(8, 8)).unwrap().is_empty());
}
