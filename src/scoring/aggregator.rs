//! Running score for one recording take.
//!
//! Turns detector output into discrete, timestamped point awards. Object classes are
//! credited once per take; reference matches are evaluated at most once per match
//! interval and have no dedupe limit. Everything is reset at the start of each take.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::analysis::{DetectionResult, MatchResult};
use crate::scoring::catalog::{room_object, MATCH_EMOJI, MATCH_LABEL, MATCH_POINTS};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoreKind {
    Object,
    Match,
}

/// One discrete point award.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreEvent {
    pub id: String,
    pub points: u32,
    pub label: String,
    pub emoji: String,
    #[serde(rename = "type")]
    pub kind: ScoreKind,
    /// Milliseconds since the Unix epoch.
    pub timestamp: u64,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScoringSettings {
    /// Detections must score strictly above this to count.
    pub detection_threshold: f32,
    pub match_interval_ms: u64,
    pub match_points: u32,
    pub display_window_ms: u64,
}

impl Default for ScoringSettings {
    fn default() -> Self {
        Self {
            detection_threshold: 0.4,
            match_interval_ms: 3000,
            match_points: MATCH_POINTS,
            display_window_ms: 2000,
        }
    }
}

pub struct ScoreAggregator {
    settings: ScoringSettings,
    events: Vec<ScoreEvent>,
    total: u64,
    credited: HashSet<String>,
    /// `None` until the first match check of the take.
    last_match_check_ms: Option<u64>,
    nonce: String,
    seq: u64,
}

impl ScoreAggregator {
    pub fn new(settings: ScoringSettings) -> Self {
        let nonce: [u8; 4] = rand::thread_rng().gen();
        Self {
            settings,
            events: Vec::new(),
            total: 0,
            credited: HashSet::new(),
            last_match_check_ms: None,
            nonce: hex::encode(nonce),
            seq: 0,
        }
    }

    pub fn settings(&self) -> &ScoringSettings {
        &self.settings
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn events(&self) -> &[ScoreEvent] {
        &self.events
    }

    /// Classes already credited in this take.
    pub fn credited(&self) -> impl Iterator<Item = &str> {
        self.credited.iter().map(String::as_str)
    }

    /// Credit first sightings of known room objects. Returns the new events.
    pub fn ingest_detections(&mut self, detections: &[DetectionResult], now_ms: u64) -> Vec<ScoreEvent> {
        let mut awarded = Vec::new();
        for detection in detections {
            if detection.score <= self.settings.detection_threshold {
                continue;
            }
            let Some(object) = room_object(&detection.class) else {
                continue;
            };
            if !self.credited.insert(object.key.to_string()) {
                continue;
            }
            log::debug!("credited {} ({} points)", object.key, object.points);
            awarded.push(self.award(object.points, object.label, object.emoji, ScoreKind::Object, now_ms));
        }
        awarded
    }

    /// True when a match check is due; marks the check as taken.
    pub fn begin_match_check(&mut self, now_ms: u64) -> bool {
        let due = match self.last_match_check_ms {
            None => true,
            Some(last) => now_ms.saturating_sub(last) > self.settings.match_interval_ms,
        };
        if due {
            self.last_match_check_ms = Some(now_ms);
        }
        due
    }

    /// Award the match bonus when the result is a match.
    pub fn apply_match(&mut self, result: &MatchResult, now_ms: u64) -> Option<ScoreEvent> {
        if !result.is_match {
            return None;
        }
        log::debug!("reference match (similarity {:.3})", result.similarity);
        Some(self.award(
            self.settings.match_points,
            MATCH_LABEL,
            MATCH_EMOJI,
            ScoreKind::Match,
            now_ms,
        ))
    }

    /// Rate-limited match check. `evaluate` runs only when a check is due.
    pub fn try_match_check<F>(&mut self, now_ms: u64, evaluate: F) -> Option<MatchResult>
    where
        F: FnOnce() -> MatchResult,
    {
        if !self.begin_match_check(now_ms) {
            return None;
        }
        let result = evaluate();
        self.apply_match(&result, now_ms);
        Some(result)
    }

    /// Events still inside the display window at `now_ms`.
    pub fn visible_events(&self, now_ms: u64) -> Vec<&ScoreEvent> {
        self.events
            .iter()
            .filter(|e| now_ms.saturating_sub(e.timestamp) < self.settings.display_window_ms)
            .collect()
    }

    /// Clear events, total, credited classes and the match-check timestamp.
    pub fn reset(&mut self) {
        self.events.clear();
        self.total = 0;
        self.credited.clear();
        self.last_match_check_ms = None;
    }

    fn award(
        &mut self,
        points: u32,
        label: &str,
        emoji: &str,
        kind: ScoreKind,
        now_ms: u64,
    ) -> ScoreEvent {
        self.seq += 1;
        let event = ScoreEvent {
            id: format!("{}-{}-{}", now_ms, self.nonce, self.seq),
            points,
            label: label.to_string(),
            emoji: emoji.to_string(),
            kind,
            timestamp: now_ms,
        };
        self.total += points as u64;
        self.events.push(event.clone());
        event
    }
}

impl Default for ScoreAggregator {
    fn default() -> Self {
        Self::new(ScoringSettings::default())
    }
}
