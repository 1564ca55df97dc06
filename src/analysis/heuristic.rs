//! Heuristic scene scorer.
//!
//! Pixel statistics only: brightness, edge density, color variance and center
//! composition are folded into an additive 0..=100 "good shot" confidence. The scorer is a
//! pure function of the frame apart from the jitter term, which comes from an injectable
//! [`Jitter`] source.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::analysis::patterns::{PatternMatch, PatternTable};
use crate::analysis::result::AnalysisResult;
use crate::frame::{luminance, Frame};

/// Every Nth pixel is sampled.
const SAMPLE_STRIDE_PIXELS: usize = 4;
/// Luminance delta between consecutive samples counted as an edge.
const EDGE_DELTA: f32 = 30.0;
/// Radius of the center circle as a fraction of the short side.
const CENTER_RADIUS_DIVISOR: f32 = 6.0;
/// Mean/center luminance gap that counts as a focused composition.
const CENTER_FOCUS_DELTA: f32 = 10.0;
const STABILITY_POINTS: f32 = 15.0;
const OBJECT_POINTS: f32 = 15.0;
const MAX_REASONS: usize = 3;
const JITTER_SPAN: i32 = 5;

/// Default good-shot cutoff on the clamped score.
pub const DEFAULT_GOOD_SHOT_THRESHOLD: f32 = 65.0;

// ----------------------------------------------------------------------------
// Jitter
// ----------------------------------------------------------------------------

/// Source of the per-frame score jitter.
pub trait Jitter: Send {
    /// Integer in `-5..=5`.
    fn next(&mut self) -> i32;
}

/// Uniform jitter from a `StdRng`.
pub struct RandomJitter {
    rng: StdRng,
}

impl RandomJitter {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for RandomJitter {
    fn default() -> Self {
        Self::new()
    }
}

impl Jitter for RandomJitter {
    fn next(&mut self) -> i32 {
        self.rng.gen_range(-JITTER_SPAN..=JITTER_SPAN)
    }
}

/// Always zero.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoJitter;

impl Jitter for NoJitter {
    fn next(&mut self) -> i32 {
        0
    }
}

// ----------------------------------------------------------------------------
// Frame statistics
// ----------------------------------------------------------------------------

/// Raw signals gathered from the sampled pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FrameStats {
    pub sample_count: usize,
    pub mean_luminance: f32,
    pub center_luminance: f32,
    pub edge_ratio: f32,
    pub color_variance: f32,
}

impl FrameStats {
    /// Returns `None` for frames with no pixels.
    pub fn collect(frame: &Frame) -> Option<Self> {
        if frame.is_empty() {
            return None;
        }
        let width = frame.width() as usize;
        let height = frame.height() as usize;
        let pixel_count = width * height;
        let center_x = width as f32 / 2.0;
        let center_y = height as f32 / 2.0;
        let radius = width.min(height) as f32 / CENTER_RADIUS_DIVISOR;

        let mut samples = 0usize;
        let mut total = 0.0f32;
        let mut center_total = 0.0f32;
        let mut center_samples = 0usize;
        let mut edges = 0usize;
        let mut variance = 0.0f32;

        for index in (0..pixel_count).step_by(SAMPLE_STRIDE_PIXELS) {
            let x = (index % width) as u32;
            let y = (index / width) as u32;
            let [r, g, b] = frame.rgb_at(x, y);
            let luma = luminance(r, g, b);
            samples += 1;
            total += luma;

            let dx = x as f32 - center_x;
            let dy = y as f32 - center_y;
            if (dx * dx + dy * dy).sqrt() <= radius {
                center_total += luma;
                center_samples += 1;
            }

            // Compared against the next sample in scan order.
            let next = index + SAMPLE_STRIDE_PIXELS;
            if next < pixel_count {
                let [nr, ng, nb] = frame.rgb_at((next % width) as u32, (next / width) as u32);
                if (luma - luminance(nr, ng, nb)).abs() > EDGE_DELTA {
                    edges += 1;
                }
            }

            variance += (r as f32 - luma).abs() + (g as f32 - luma).abs() + (b as f32 - luma).abs();
        }

        let n = samples as f32;
        let mean_luminance = total / n;
        Some(Self {
            sample_count: samples,
            mean_luminance,
            center_luminance: if center_samples > 0 {
                center_total / center_samples as f32
            } else {
                mean_luminance
            },
            edge_ratio: edges as f32 / n,
            color_variance: variance / n,
        })
    }
}

// ----------------------------------------------------------------------------
// Scoring
// ----------------------------------------------------------------------------

/// Per-component points and every assigned label, before jitter and clamping.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ScoreBreakdown {
    pub lighting: f32,
    pub detail: f32,
    pub color: f32,
    pub composition: f32,
    pub stability: f32,
    pub object_bonus: f32,
    /// All labels in scoring order; the result keeps the first three.
    pub labels: Vec<String>,
}

impl ScoreBreakdown {
    pub fn from_stats(stats: &FrameStats, objects: &[String]) -> Self {
        let mut labels = Vec::with_capacity(6);

        let mean = stats.mean_luminance;
        let lighting = if mean > 40.0 && mean < 220.0 {
            labels.push("Good lighting".to_string());
            if mean > 80.0 && mean < 180.0 {
                30.0
            } else {
                20.0
            }
        } else if mean <= 40.0 {
            labels.push("Low light".to_string());
            10.0
        } else {
            labels.push("Bright scene".to_string());
            5.0
        };

        let detail = if stats.edge_ratio > 0.05 {
            labels.push("Good detail".to_string());
            (stats.edge_ratio * 500.0).min(25.0)
        } else {
            labels.push("Simple scene".to_string());
            5.0
        };

        let color = if stats.color_variance > 8.0 {
            labels.push("Color variety".to_string());
            (stats.color_variance / 2.0).min(25.0)
        } else {
            labels.push("Minimal colors".to_string());
            10.0
        };

        let composition = if (stats.center_luminance - mean).abs() > CENTER_FOCUS_DELTA {
            labels.push("Center focus".to_string());
            15.0
        } else {
            labels.push("Even composition".to_string());
            5.0
        };

        labels.push("Stable frame".to_string());

        let object_bonus = if objects.is_empty() {
            0.0
        } else {
            labels.push(format!("Found {}", objects.join(", ")));
            OBJECT_POINTS * objects.len() as f32
        };

        Self {
            lighting,
            detail,
            color,
            composition,
            stability: STABILITY_POINTS,
            object_bonus,
            labels,
        }
    }

    /// Unclamped sum of all components.
    pub fn raw_score(&self) -> f32 {
        self.lighting + self.detail + self.color + self.composition + self.stability + self.object_bonus
    }
}

/// Everything the scorer learned about one frame.
#[derive(Clone, Debug, PartialEq)]
pub struct HeuristicReport {
    pub result: AnalysisResult,
    pub matches: Vec<PatternMatch>,
    pub breakdown: ScoreBreakdown,
}

pub struct HeuristicScorer {
    patterns: PatternTable,
    jitter: Box<dyn Jitter>,
    good_shot_threshold: f32,
}

impl HeuristicScorer {
    pub fn new(patterns: PatternTable, jitter: Box<dyn Jitter>) -> Self {
        Self {
            patterns,
            jitter,
            good_shot_threshold: DEFAULT_GOOD_SHOT_THRESHOLD,
        }
    }

    /// Built-in patterns with random jitter.
    pub fn with_defaults() -> Self {
        Self::new(PatternTable::builtin(), Box::new(RandomJitter::new()))
    }

    pub fn with_good_shot_threshold(mut self, threshold: f32) -> Self {
        self.good_shot_threshold = threshold;
        self
    }

    pub fn patterns(&self) -> &PatternTable {
        &self.patterns
    }

    /// Score one frame. An empty frame yields the default (not good, zero confidence) result.
    pub fn evaluate(&mut self, frame: &Frame, category: Option<&str>) -> HeuristicReport {
        let Some(stats) = FrameStats::collect(frame) else {
            return HeuristicReport {
                result: AnalysisResult::default(),
                matches: Vec::new(),
                breakdown: ScoreBreakdown::default(),
            };
        };

        let matches = self.patterns.detect(frame, category);
        let objects: Vec<String> = matches.iter().map(|m| m.name.clone()).collect();
        let breakdown = ScoreBreakdown::from_stats(&stats, &objects);

        let jittered = breakdown.raw_score() + self.jitter.next() as f32;
        let confidence = jittered.clamp(0.0, 100.0);
        let result = AnalysisResult {
            is_good_shot: confidence >= self.good_shot_threshold,
            confidence,
            reasons: breakdown.labels.iter().take(MAX_REASONS).cloned().collect(),
            detected_objects: Some(objects),
        };

        HeuristicReport {
            result,
            matches,
            breakdown,
        }
    }

    pub fn score(&mut self, frame: &Frame, category: Option<&str>) -> AnalysisResult {
        self.evaluate(frame, category).result
    }
}

impl Default for HeuristicScorer {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scorer() -> HeuristicScorer {
        HeuristicScorer::new(PatternTable::builtin(), Box::new(NoJitter))
    }

    #[test]
    fn gray_frame_scores_baseline() {
        let frame = Frame::uniform(50, 50, [128, 128, 128]);
        let report = scorer().evaluate(&frame, None);

        assert_eq!(report.breakdown.lighting, 30.0);
        assert_eq!(report.result.confidence, 65.0);
        assert!(report.result.is_good_shot);
        assert_eq!(
            report.result.reasons,
            vec!["Good lighting", "Simple scene", "Minimal colors"]
        );
        assert!(report.breakdown.labels.iter().any(|l| l == "Even composition"));
        assert_eq!(report.result.detected_objects, Some(Vec::new()));
    }

    #[test]
    fn jitter_stays_within_five_points() {
        let frame = Frame::uniform(50, 50, [128, 128, 128]);
        let mut scorer = HeuristicScorer::new(PatternTable::builtin(), Box::new(RandomJitter::seeded(7)));
        for _ in 0..50 {
            let confidence = scorer.score(&frame, None).confidence;
            assert!((60.0..=70.0).contains(&confidence));
        }
    }

    #[test]
    fn lighting_bands() {
        let dark = FrameStats {
            sample_count: 1,
            mean_luminance: 30.0,
            center_luminance: 30.0,
            ..FrameStats::default()
        };
        assert_eq!(ScoreBreakdown::from_stats(&dark, &[]).lighting, 10.0);
        let dim = FrameStats {
            mean_luminance: 60.0,
            center_luminance: 60.0,
            ..dark
        };
        assert_eq!(ScoreBreakdown::from_stats(&dim, &[]).lighting, 20.0);
        let glare = FrameStats {
            mean_luminance: 240.0,
            center_luminance: 240.0,
            ..dark
        };
        let breakdown = ScoreBreakdown::from_stats(&glare, &[]);
        assert_eq!(breakdown.lighting, 5.0);
        assert_eq!(breakdown.labels[0], "Bright scene");
    }

    /// Red/green column bands four pixels wide around a white center disc wider than the center circle.
    fn busy_frame(size: u32) -> Frame {
        let center = size as f32 / 2.0;
        let mut data = Vec::new();
        for y in 0..size {
            for x in 0..size {
                let dx = x as f32 - center;
                let dy = y as f32 - center;
                let rgb = if (dx * dx + dy * dy).sqrt() <= size as f32 / 4.0 {
                    [250, 250, 250]
                } else if (x / 4) % 2 == 0 {
                    [200, 40, 40]
                } else {
                    [40, 200, 40]
                };
                data.extend_from_slice(&[rgb[0], rgb[1], rgb[2], 255]);
            }
        }
        Frame::rgba(data, size, size).unwrap()
    }

    #[test]
    fn object_bonus_lists_every_object() {
        let stats = FrameStats {
            sample_count: 10,
            mean_luminance: 120.0,
            center_luminance: 200.0,
            edge_ratio: 0.5,
            color_variance: 200.0,
        };
        let objects: Vec<String> = ["bed", "desk", "pillow"].iter().map(|s| s.to_string()).collect();
        let breakdown = ScoreBreakdown::from_stats(&stats, &objects);
        assert_eq!(breakdown.object_bonus, 45.0);
        assert_eq!(breakdown.labels.last().unwrap(), "Found bed, desk, pillow");
    }

    #[test]
    fn stacked_bonuses_clamp_to_100() {
        let report = scorer().evaluate(&busy_frame(64), None);
        assert_eq!(report.breakdown.lighting, 30.0);
        assert_eq!(report.breakdown.detail, 25.0);
        assert_eq!(report.breakdown.color, 25.0);
        assert_eq!(report.breakdown.composition, 15.0);
        assert!(report.breakdown.raw_score() > 100.0);
        assert_eq!(report.result.confidence, 100.0);
        assert!(report.result.is_good_shot);
        assert_eq!(
            report.result.reasons,
            vec!["Good lighting", "Good detail", "Color variety"]
        );
    }

    #[test]
    fn empty_frame_returns_default() {
        let frame = Frame::uniform(0, 0, [0, 0, 0]);
        let result = scorer().score(&frame, Some("room-tour"));
        assert!(!result.is_good_shot);
        assert_eq!(result.confidence, 0.0);
        assert!(result.reasons.is_empty());
    }

    #[test]
    fn center_focus_detected() {
        let (w, h) = (60u32, 60u32);
        let mut data = Vec::new();
        for y in 0..h {
            for x in 0..w {
                let dx = x as f32 - 30.0;
                let dy = y as f32 - 30.0;
                let v = if (dx * dx + dy * dy).sqrt() <= 10.0 { 250 } else { 100 };
                data.extend_from_slice(&[v, v, v, 255]);
            }
        }
        let frame = Frame::rgba(data, w, h).unwrap();
        let report = scorer().evaluate(&frame, None);
        assert_eq!(report.breakdown.composition, 15.0);
        assert!(report.breakdown.labels.iter().any(|l| l == "Center focus"));
    }
}
