use anyhow::{anyhow, Result};
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Which step or prompt a clip was recorded for.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StepRef {
    /// Numbered step of a legacy challenge.
    Index(u32),
    /// Prompt id from a prompt pool.
    Prompt(String),
}

/// Metadata for one finished recording.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClipRecord {
    pub step_id: StepRef,
    /// Recorded seconds, excluding paused time.
    pub duration: f64,
    /// Captured bytes.
    pub size: u64,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_score: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
}

impl ClipRecord {
    pub fn new(step_id: StepRef, recorded_ms: u64, size: u64, finished_at_ms: u64) -> Result<Self> {
        let timestamp = Utc
            .timestamp_millis_opt(finished_at_ms as i64)
            .single()
            .ok_or_else(|| anyhow!("clip timestamp out of range: {}", finished_at_ms))?;
        Ok(Self {
            step_id,
            duration: recorded_ms as f64 / 1000.0,
            size,
            timestamp,
            ai_score: None,
            thumbnail_url: None,
        })
    }

    pub fn with_ai_score(mut self, score: u64) -> Self {
        self.ai_score = Some(score);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_camel_case_iso_timestamp() -> Result<()> {
        let clip = ClipRecord::new(StepRef::Prompt("favorite-corner".into()), 4500, 2048, 0)?
            .with_ai_score(40);
        let json = serde_json::to_value(&clip)?;
        assert_eq!(json["stepId"], "favorite-corner");
        assert_eq!(json["duration"], 4.5);
        assert_eq!(json["aiScore"], 40);
        assert_eq!(json["timestamp"], "1970-01-01T00:00:00Z");
        assert!(json.get("thumbnailUrl").is_none());
        Ok(())
    }

    #[test]
    fn numbered_steps_round_trip() -> Result<()> {
        let clip = ClipRecord::new(StepRef::Index(3), 1000, 1, 1_700_000_000_000)?;
        let parsed: ClipRecord = serde_json::from_str(&serde_json::to_string(&clip)?)?;
        assert_eq!(parsed.step_id, StepRef::Index(3));
        Ok(())
    }
}
