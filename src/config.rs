use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::analysis::{HeuristicScorer, Jitter, NoJitter, PatternTable, RandomJitter};
use crate::scoring::ScoringSettings;
use crate::session::SessionSettings;

const DEFAULT_HEURISTIC_INTERVAL_MS: u64 = 200;
const DEFAULT_ML_INTERVAL_MS: u64 = 1000;
const DEFAULT_DETECTION_THRESHOLD: f32 = 0.4;
const DEFAULT_MATCH_THRESHOLD: f32 = 0.85;
const DEFAULT_MATCH_INTERVAL_MS: u64 = 3000;
const DEFAULT_MATCH_POINTS: u32 = 25;
const DEFAULT_DISPLAY_WINDOW_MS: u64 = 2000;
const DEFAULT_GOOD_SHOT_THRESHOLD: f32 = 65.0;
const DEFAULT_COUNTDOWN_TICKS: u32 = 3;
const DEFAULT_COUNTDOWN_TICK_MS: u64 = 1000;
const DEFAULT_MAX_RECORDING_SECS: u64 = 60;
const DEFAULT_MODEL_INPUT_SIZE: u32 = 224;
const DEFAULT_CLASS_OFFSET: i64 = 1;
const DEFAULT_REFERENCE_ROOT: &str = ".";

#[derive(Debug, Deserialize, Default)]
struct ReelConfigFile {
    sampling: Option<SamplingConfigFile>,
    scoring: Option<ScoringConfigFile>,
    session: Option<SessionConfigFile>,
    models: Option<ModelConfigFile>,
    patterns_path: Option<PathBuf>,
    reference_root: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
struct SamplingConfigFile {
    heuristic_interval_ms: Option<u64>,
    ml_interval_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct ScoringConfigFile {
    detection_threshold: Option<f32>,
    match_threshold: Option<f32>,
    match_interval_ms: Option<u64>,
    match_points: Option<u32>,
    display_window_ms: Option<u64>,
    good_shot_threshold: Option<f32>,
    jitter: Option<bool>,
}

#[derive(Debug, Deserialize, Default)]
struct SessionConfigFile {
    countdown_ticks: Option<u32>,
    countdown_tick_ms: Option<u64>,
    max_recording_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct ModelConfigFile {
    detector_path: Option<PathBuf>,
    embedding_path: Option<PathBuf>,
    input_size: Option<u32>,
    class_offset: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReelConfig {
    pub sampling: SamplingSettings,
    pub scoring: ScoringConfig,
    pub session: SessionConfig,
    pub models: ModelSettings,
    /// TOML pattern table; the built-in table is used when unset.
    pub patterns_path: Option<PathBuf>,
    /// Directory that site-absolute reference photo paths resolve under.
    pub reference_root: PathBuf,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SamplingSettings {
    pub heuristic_interval_ms: u64,
    pub ml_interval_ms: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoringConfig {
    pub detection_threshold: f32,
    pub match_threshold: f32,
    pub match_interval_ms: u64,
    pub match_points: u32,
    pub display_window_ms: u64,
    pub good_shot_threshold: f32,
    pub jitter: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub countdown_ticks: u32,
    pub countdown_tick_ms: u64,
    pub max_recording_secs: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelSettings {
    pub detector_path: Option<PathBuf>,
    pub embedding_path: Option<PathBuf>,
    pub input_size: u32,
    pub class_offset: i64,
}

impl ReelConfig {
    /// Load from `$ROOMREEL_CONFIG` (if set), apply env overrides, validate.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("ROOMREEL_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) if !path.trim().is_empty() => Some(read_config_file(Path::new(path))?),
            _ => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load a specific file, then apply env overrides and validate.
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut cfg = Self::from_file(read_config_file(path)?);
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: ReelConfigFile) -> Self {
        let sampling = file.sampling.unwrap_or_default();
        let scoring = file.scoring.unwrap_or_default();
        let session = file.session.unwrap_or_default();
        let models = file.models.unwrap_or_default();
        Self {
            sampling: SamplingSettings {
                heuristic_interval_ms: sampling
                    .heuristic_interval_ms
                    .unwrap_or(DEFAULT_HEURISTIC_INTERVAL_MS),
                ml_interval_ms: sampling.ml_interval_ms.unwrap_or(DEFAULT_ML_INTERVAL_MS),
            },
            scoring: ScoringConfig {
                detection_threshold: scoring
                    .detection_threshold
                    .unwrap_or(DEFAULT_DETECTION_THRESHOLD),
                match_threshold: scoring.match_threshold.unwrap_or(DEFAULT_MATCH_THRESHOLD),
                match_interval_ms: scoring
                    .match_interval_ms
                    .unwrap_or(DEFAULT_MATCH_INTERVAL_MS),
                match_points: scoring.match_points.unwrap_or(DEFAULT_MATCH_POINTS),
                display_window_ms: scoring
                    .display_window_ms
                    .unwrap_or(DEFAULT_DISPLAY_WINDOW_MS),
                good_shot_threshold: scoring
                    .good_shot_threshold
                    .unwrap_or(DEFAULT_GOOD_SHOT_THRESHOLD),
                jitter: scoring.jitter.unwrap_or(true),
            },
            session: SessionConfig {
                countdown_ticks: session.countdown_ticks.unwrap_or(DEFAULT_COUNTDOWN_TICKS),
                countdown_tick_ms: session
                    .countdown_tick_ms
                    .unwrap_or(DEFAULT_COUNTDOWN_TICK_MS),
                max_recording_secs: session
                    .max_recording_secs
                    .unwrap_or(DEFAULT_MAX_RECORDING_SECS),
            },
            models: ModelSettings {
                detector_path: models.detector_path,
                embedding_path: models.embedding_path,
                input_size: models.input_size.unwrap_or(DEFAULT_MODEL_INPUT_SIZE),
                class_offset: models.class_offset.unwrap_or(DEFAULT_CLASS_OFFSET),
            },
            patterns_path: file.patterns_path,
            reference_root: file
                .reference_root
                .unwrap_or_else(|| PathBuf::from(DEFAULT_REFERENCE_ROOT)),
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(ms) = env_parse::<u64>("ROOMREEL_HEURISTIC_INTERVAL_MS", "an integer number of milliseconds")? {
            self.sampling.heuristic_interval_ms = ms;
        }
        if let Some(ms) = env_parse::<u64>("ROOMREEL_ML_INTERVAL_MS", "an integer number of milliseconds")? {
            self.sampling.ml_interval_ms = ms;
        }
        if let Some(threshold) = env_parse::<f32>("ROOMREEL_MATCH_THRESHOLD", "a number")? {
            self.scoring.match_threshold = threshold;
        }
        if let Some(secs) = env_parse::<u64>("ROOMREEL_MAX_RECORDING_SECS", "an integer number of seconds")? {
            self.session.max_recording_secs = secs;
        }
        if let Ok(path) = std::env::var("ROOMREEL_DETECTOR_MODEL") {
            if !path.trim().is_empty() {
                self.models.detector_path = Some(PathBuf::from(path));
            }
        }
        if let Ok(path) = std::env::var("ROOMREEL_EMBEDDING_MODEL") {
            if !path.trim().is_empty() {
                self.models.embedding_path = Some(PathBuf::from(path));
            }
        }
        if let Ok(path) = std::env::var("ROOMREEL_PATTERNS") {
            if !path.trim().is_empty() {
                self.patterns_path = Some(PathBuf::from(path));
            }
        }
        if let Ok(jitter) = std::env::var("ROOMREEL_JITTER") {
            self.scoring.jitter = match jitter.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "on" | "yes" => true,
                "0" | "false" | "off" | "no" => false,
                _ => return Err(anyhow!("ROOMREEL_JITTER must be on or off")),
            };
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.sampling.heuristic_interval_ms == 0 || self.sampling.ml_interval_ms == 0 {
            return Err(anyhow!("sampling intervals must be greater than zero"));
        }
        if self.scoring.match_interval_ms == 0 || self.scoring.display_window_ms == 0 {
            return Err(anyhow!("scoring intervals must be greater than zero"));
        }
        for (name, value) in [
            ("detection_threshold", self.scoring.detection_threshold),
            ("match_threshold", self.scoring.match_threshold),
        ] {
            if !(value > 0.0 && value <= 1.0) {
                return Err(anyhow!("{} must be in (0, 1], got {}", name, value));
            }
        }
        if !(0.0..=100.0).contains(&self.scoring.good_shot_threshold) {
            return Err(anyhow!("good_shot_threshold must be in [0, 100]"));
        }
        if self.session.max_recording_secs == 0 {
            return Err(anyhow!("max_recording_secs must be greater than zero"));
        }
        if self.session.countdown_ticks == 0 || self.session.countdown_tick_ms == 0 {
            return Err(anyhow!("countdown needs at least one tick of non-zero length"));
        }
        if self.models.input_size == 0 {
            return Err(anyhow!("model input_size must be greater than zero"));
        }
        Ok(())
    }

    pub fn scoring_settings(&self) -> ScoringSettings {
        ScoringSettings {
            detection_threshold: self.scoring.detection_threshold,
            match_interval_ms: self.scoring.match_interval_ms,
            match_points: self.scoring.match_points,
            display_window_ms: self.scoring.display_window_ms,
        }
    }

    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            countdown_ticks: self.session.countdown_ticks,
            countdown_tick_ms: self.session.countdown_tick_ms,
            max_recording_ms: self.session.max_recording_secs * 1000,
        }
    }

    /// The configured pattern table, or the built-in one.
    pub fn pattern_table(&self) -> Result<PatternTable> {
        match &self.patterns_path {
            Some(path) => PatternTable::load(path),
            None => Ok(PatternTable::builtin()),
        }
    }

    /// Heuristic scorer with the configured table and threshold. `seed` fixes the jitter.
    pub fn heuristic_scorer(&self, seed: Option<u64>) -> Result<HeuristicScorer> {
        let jitter: Box<dyn Jitter> = match (self.scoring.jitter, seed) {
            (false, _) => Box::new(NoJitter),
            (true, Some(seed)) => Box::new(RandomJitter::seeded(seed)),
            (true, None) => Box::new(RandomJitter::new()),
        };
        Ok(HeuristicScorer::new(self.pattern_table()?, jitter)
            .with_good_shot_threshold(self.scoring.good_shot_threshold))
    }
}

impl Default for ReelConfig {
    fn default() -> Self {
        Self::from_file(ReelConfigFile::default())
    }
}

fn env_parse<T: std::str::FromStr>(name: &str, expected: &str) -> Result<Option<T>> {
    match std::env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| anyhow!("{} must be {}", name, expected)),
        _ => Ok(None),
    }
}

fn read_config_file(path: &Path) -> Result<ReelConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("toml"))
        .unwrap_or(false);
    let cfg = if is_toml {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = ReelConfig::default();
        assert_eq!(cfg.sampling.heuristic_interval_ms, 200);
        assert_eq!(cfg.sampling.ml_interval_ms, 1000);
        assert_eq!(cfg.scoring_settings(), ScoringSettings::default());
        assert_eq!(cfg.session_settings(), SessionSettings::default());
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn rejects_out_of_range_threshold() {
        let mut cfg = ReelConfig::default();
        cfg.scoring.match_threshold = 1.5;
        assert!(cfg.validate().is_err());
        cfg.scoring.match_threshold = 0.0;
        assert!(cfg.validate().is_err());
    }
}
