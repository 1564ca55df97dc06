//! Pattern-based object detection.
//!
//! A coarse classifier: the frame is cut into square regions and each region is checked
//! against per-category color/brightness/edge signatures. The pattern table is explicit
//! configuration (built in, or loaded from TOML) and detection is a pure function of it.

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

use crate::analysis::result::{BoundingBox, DetectionResult};
use crate::frame::{luminance, Frame};

/// Regions per short side of the frame.
const REGION_DIVISOR: u32 = 8;
/// Pixel stride inside a region.
const SCAN_STRIDE: usize = 2;
/// Diagonal luminance delta counted as an edge.
const EDGE_DELTA: f32 = 40.0;
/// Share of region pixels that must fall inside the pattern's ranges.
const MIN_COLOR_MATCH_RATIO: f32 = 0.3;
/// Fraction of the pattern's expected edge density a region must reach.
const EDGE_EXPECTATION_FACTOR: f32 = 0.5;

/// Signature of one named object.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct ObjectPattern {
    pub name: String,
    /// Inclusive channel ranges.
    pub red: [u8; 2],
    pub green: [u8; 2],
    pub blue: [u8; 2],
    /// Expected edge density (0..1).
    pub edge_pattern: f32,
    /// Inclusive luminance range.
    pub brightness: [f32; 2],
}

impl ObjectPattern {
    fn new(
        name: &str,
        red: [u8; 2],
        green: [u8; 2],
        blue: [u8; 2],
        edge_pattern: f32,
        brightness: [f32; 2],
    ) -> Self {
        Self {
            name: name.to_string(),
            red,
            green,
            blue,
            edge_pattern,
            brightness,
        }
    }

    fn matches(&self, rgb: [u8; 3], luma: f32) -> bool {
        in_range(rgb[0], self.red)
            && in_range(rgb[1], self.green)
            && in_range(rgb[2], self.blue)
            && luma >= self.brightness[0]
            && luma <= self.brightness[1]
    }
}

fn in_range(value: u8, range: [u8; 2]) -> bool {
    value >= range[0] && value <= range[1]
}

/// A pattern declared present in a frame.
#[derive(Clone, Debug, PartialEq)]
pub struct PatternMatch {
    pub name: String,
    pub color_match_ratio: f32,
    pub edge_ratio: f32,
    /// The first region that satisfied the pattern.
    pub region: BoundingBox,
}

impl PatternMatch {
    /// Detection record for the score aggregator; the color match ratio is the confidence.
    pub fn to_detection(&self) -> DetectionResult {
        DetectionResult::new(
            self.name.clone(),
            self.color_match_ratio.clamp(0.0, 1.0),
            self.region,
        )
    }
}

/// Category key → patterns.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct PatternTable {
    categories: HashMap<String, Vec<ObjectPattern>>,
}

impl PatternTable {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Room, study and social categories used by the heuristic challenges.
    pub fn builtin() -> Self {
        let mut categories = HashMap::new();
        categories.insert(
            "room-tour".to_string(),
            vec![
                ObjectPattern::new("bed", [200, 255], [200, 255], [200, 255], 0.3, [80.0, 200.0]),
                ObjectPattern::new("pillow", [180, 255], [180, 255], [180, 255], 0.2, [100.0, 220.0]),
                ObjectPattern::new("desk", [80, 160], [60, 140], [40, 120], 0.4, [60.0, 180.0]),
                ObjectPattern::new("wardrobe", [40, 120], [40, 120], [40, 120], 0.5, [50.0, 150.0]),
            ],
        );
        categories.insert(
            "study-space".to_string(),
            vec![
                ObjectPattern::new("books", [40, 200], [40, 200], [40, 200], 0.6, [70.0, 190.0]),
                ObjectPattern::new("laptop", [30, 80], [30, 80], [30, 80], 0.4, [40.0, 120.0]),
                ObjectPattern::new("desk", [80, 160], [60, 140], [40, 120], 0.4, [60.0, 180.0]),
                ObjectPattern::new("papers", [220, 255], [220, 255], [220, 255], 0.3, [180.0, 250.0]),
            ],
        );
        categories.insert(
            "social-life".to_string(),
            vec![
                ObjectPattern::new("people", [120, 220], [100, 200], [80, 180], 0.4, [80.0, 200.0]),
                ObjectPattern::new("food", [150, 255], [100, 220], [50, 180], 0.3, [100.0, 220.0]),
            ],
        );
        Self { categories }
    }

    /// Parse a table from TOML, one array of tables per category:
    ///
    /// ```toml
    /// [[room-tour]]
    /// name = "bed"
    /// red = [200, 255]
    /// green = [200, 255]
    /// blue = [200, 255]
    /// edge_pattern = 0.3
    /// brightness = [80.0, 200.0]
    /// ```
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let table: PatternTable = toml::from_str(raw).context("invalid pattern table")?;
        table.validate()?;
        Ok(table)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow!("failed to read pattern table {}: {}", path.display(), e))?;
        Self::from_toml_str(&raw)
    }

    fn validate(&self) -> Result<()> {
        for (category, patterns) in &self.categories {
            for pattern in patterns {
                if pattern.name.trim().is_empty() {
                    return Err(anyhow!("pattern in category '{}' has no name", category));
                }
                let ranges = [pattern.red, pattern.green, pattern.blue];
                if ranges.iter().any(|r| r[0] > r[1])
                    || pattern.brightness[0] > pattern.brightness[1]
                {
                    return Err(anyhow!(
                        "pattern '{}' in category '{}' has an inverted range",
                        pattern.name,
                        category
                    ));
                }
            }
        }
        Ok(())
    }

    pub fn patterns(&self, category: &str) -> &[ObjectPattern] {
        self.categories
            .get(category)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.categories.keys().map(String::as_str)
    }

    /// Run detection for a category. Unknown or missing categories detect nothing.
    pub fn detect(&self, frame: &Frame, category: Option<&str>) -> Vec<PatternMatch> {
        match category {
            Some(category) => detect_patterns(frame, self.patterns(category)),
            None => Vec::new(),
        }
    }
}

/// Scan the frame region by region; each pattern is reported at most once (first region wins).
pub fn detect_patterns(frame: &Frame, patterns: &[ObjectPattern]) -> Vec<PatternMatch> {
    let mut found: Vec<PatternMatch> = Vec::new();
    if patterns.is_empty() || frame.is_empty() {
        return found;
    }

    let width = frame.width();
    let height = frame.height();
    let region_size = width.min(height) / REGION_DIVISOR;
    if region_size == 0 {
        return found;
    }

    for region_y in (0..height).step_by(region_size as usize) {
        for region_x in (0..width).step_by(region_size as usize) {
            let end_x = (region_x + region_size).min(width);
            let end_y = (region_y + region_size).min(height);

            for pattern in patterns {
                if found.iter().any(|m| m.name == pattern.name) {
                    continue;
                }
                let stats = scan_region(frame, pattern, region_x, region_y, end_x, end_y);
                if stats.pixel_count == 0 {
                    continue;
                }
                let color_match_ratio = stats.color_matches as f32 / stats.pixel_count as f32;
                let edge_ratio = stats.edges as f32 / stats.pixel_count as f32;
                if color_match_ratio > MIN_COLOR_MATCH_RATIO
                    && edge_ratio > pattern.edge_pattern * EDGE_EXPECTATION_FACTOR
                {
                    found.push(PatternMatch {
                        name: pattern.name.clone(),
                        color_match_ratio,
                        edge_ratio,
                        region: BoundingBox::new(
                            region_x as f32,
                            region_y as f32,
                            (end_x - region_x) as f32,
                            (end_y - region_y) as f32,
                        ),
                    });
                }
            }
        }
    }

    found
}

struct RegionStats {
    pixel_count: u32,
    color_matches: u32,
    edges: u32,
}

fn scan_region(
    frame: &Frame,
    pattern: &ObjectPattern,
    start_x: u32,
    start_y: u32,
    end_x: u32,
    end_y: u32,
) -> RegionStats {
    let mut stats = RegionStats {
        pixel_count: 0,
        color_matches: 0,
        edges: 0,
    };
    for y in (start_y..end_y).step_by(SCAN_STRIDE) {
        for x in (start_x..end_x).step_by(SCAN_STRIDE) {
            let rgb = frame.rgb_at(x, y);
            let luma = luminance(rgb[0], rgb[1], rgb[2]);
            stats.pixel_count += 1;

            if pattern.matches(rgb, luma) {
                stats.color_matches += 1;
            }

            // Diagonal neighbour, kept inside the region.
            if x + 2 < end_x && y + 2 < end_y {
                let next = frame.rgb_at(x + 1, y + 1);
                if (luma - luminance(next[0], next[1], next[2])).abs() > EDGE_DELTA {
                    stats.edges += 1;
                }
            }
        }
    }
    stats
}
