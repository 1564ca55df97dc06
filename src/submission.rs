//! Submission payload validation.
//!
//! A finished challenge is submitted as `{challengeId, videoClips[], totalPoints, userId?}`.
//! Parsing collects every field problem into one [`ValidationErrors`] body instead of
//! stopping at the first.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::OnceLock;

use crate::error::{FieldError, ValidationErrors};
use crate::session::ClipRecord;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionPayload {
    pub challenge_id: String,
    pub video_clips: Vec<ClipRecord>,
    pub total_points: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSubmission {
    challenge_id: Option<Value>,
    video_clips: Option<Value>,
    total_points: Option<Value>,
    user_id: Option<Value>,
}

/// Challenge ids are lowercase slugs: `[a-z0-9][a-z0-9-]{0,63}`.
pub fn validate_challenge_id(challenge_id: &str) -> Result<()> {
    static CHALLENGE_ID_RE: OnceLock<regex::Regex> = OnceLock::new();
    let re = CHALLENGE_ID_RE
        .get_or_init(|| regex::Regex::new(r"^[a-z0-9][a-z0-9-]{0,63}$").unwrap());
    if !re.is_match(challenge_id) {
        return Err(anyhow!(
            "challenge id must match ^[a-z0-9][a-z0-9-]{{0,63}}$"
        ));
    }
    Ok(())
}

impl SubmissionPayload {
    /// Parse and validate a JSON body.
    pub fn parse(raw: &str) -> Result<Self, ValidationErrors> {
        let value: Value = serde_json::from_str(raw)
            .map_err(|e| ValidationErrors::single("", format!("Malformed JSON: {}", e)))?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> Result<Self, ValidationErrors> {
        if !value.is_object() {
            return Err(ValidationErrors::single("", "Expected object"));
        }
        let raw: RawSubmission = serde_json::from_value(value)
            .map_err(|e| ValidationErrors::single("", e.to_string()))?;

        let mut errors = Vec::new();
        let challenge_id = check_challenge_id(raw.challenge_id, &mut errors);
        let video_clips = check_clips(raw.video_clips, &mut errors);
        let total_points = check_points(raw.total_points, &mut errors);
        let user_id = check_user_id(raw.user_id, &mut errors);

        if !errors.is_empty() {
            return Err(ValidationErrors::new(errors));
        }
        Ok(Self {
            challenge_id,
            video_clips,
            total_points,
            user_id,
        })
    }
}

fn field_error(errors: &mut Vec<FieldError>, path: impl Into<String>, message: impl Into<String>) {
    errors.push(FieldError {
        path: path.into(),
        message: message.into(),
    });
}

fn check_challenge_id(value: Option<Value>, errors: &mut Vec<FieldError>) -> String {
    match value {
        None | Some(Value::Null) => field_error(errors, "challengeId", "Required"),
        Some(Value::String(id)) => match validate_challenge_id(&id) {
            Ok(()) => return id,
            Err(e) => field_error(errors, "challengeId", e.to_string()),
        },
        Some(_) => field_error(errors, "challengeId", "Expected string"),
    }
    String::new()
}

fn check_clips(value: Option<Value>, errors: &mut Vec<FieldError>) -> Vec<ClipRecord> {
    let items = match value {
        None | Some(Value::Null) => {
            field_error(errors, "videoClips", "Required");
            return Vec::new();
        }
        Some(Value::Array(items)) => items,
        Some(_) => {
            field_error(errors, "videoClips", "Expected array");
            return Vec::new();
        }
    };
    if items.is_empty() {
        field_error(errors, "videoClips", "At least one clip is required");
        return Vec::new();
    }

    let mut clips = Vec::with_capacity(items.len());
    for (i, item) in items.into_iter().enumerate() {
        match serde_json::from_value::<ClipRecord>(item) {
            Ok(clip) => {
                if !clip.duration.is_finite() || clip.duration < 0.0 {
                    field_error(
                        errors,
                        format!("videoClips.{}.duration", i),
                        "Duration must be a non-negative number",
                    );
                }
                clips.push(clip);
            }
            Err(e) => field_error(errors, format!("videoClips.{}", i), e.to_string()),
        }
    }
    clips
}

fn check_points(value: Option<Value>, errors: &mut Vec<FieldError>) -> u64 {
    match value {
        None | Some(Value::Null) => field_error(errors, "totalPoints", "Required"),
        Some(Value::Number(n)) => {
            if let Some(points) = n.as_u64() {
                return points;
            }
            if n.as_i64().is_some() {
                field_error(errors, "totalPoints", "Points must be non-negative");
            } else {
                field_error(errors, "totalPoints", "Expected integer");
            }
        }
        Some(_) => field_error(errors, "totalPoints", "Expected number"),
    }
    0
}

fn check_user_id(value: Option<Value>, errors: &mut Vec<FieldError>) -> Option<String> {
    match value {
        None | Some(Value::Null) => None,
        Some(Value::String(id)) if !id.trim().is_empty() => Some(id),
        Some(Value::String(_)) => {
            field_error(errors, "userId", "Must not be empty");
            None
        }
        Some(_) => {
            field_error(errors, "userId", "Expected string");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::StepRef;

    #[test]
    fn accepts_valid_payload() {
        let payload = SubmissionPayload::parse(
            r#"{
                "challengeId": "my-room-my-vibe",
                "videoClips": [{"stepId": 0, "duration": 24.5, "size": 1048576,
                                "timestamp": "2024-09-01T12:00:00Z"}],
                "totalPoints": 65,
                "userId": "u-1"
            }"#,
        )
        .unwrap();
        assert_eq!(payload.challenge_id, "my-room-my-vibe");
        assert_eq!(payload.video_clips[0].step_id, StepRef::Index(0));
        assert_eq!(payload.total_points, 65);
    }

    #[test]
    fn collects_every_field_error() {
        let err = SubmissionPayload::parse(
            r#"{"challengeId": "Bad Id!", "videoClips": [], "totalPoints": -3, "userId": 7}"#,
        )
        .unwrap_err();
        let paths: Vec<&str> = err.errors.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, vec!["challengeId", "videoClips", "totalPoints", "userId"]);
        assert_eq!(err.message, "Invalid submission data");
    }

    #[test]
    fn reports_clip_level_errors() {
        let err = SubmissionPayload::parse(
            r#"{"challengeId": "room-tour", "totalPoints": 1,
                "videoClips": [{"stepId": 1, "duration": -1, "size": 1, "timestamp": "2024-09-01T12:00:00Z"},
                               {"stepId": 1, "duration": 1, "size": 1, "timestamp": "yesterday"}]}"#,
        )
        .unwrap_err();
        assert_eq!(err.errors[0].path, "videoClips.0.duration");
        assert_eq!(err.errors[1].path, "videoClips.1");
    }

    #[test]
    fn missing_fields_are_required() {
        let err = SubmissionPayload::parse("{}").unwrap_err();
        assert_eq!(err.errors.len(), 3);
        assert!(err.errors.iter().all(|e| e.message == "Required"));
        assert!(SubmissionPayload::parse("[1]").is_err());
        assert!(SubmissionPayload::parse("not json").is_err());
    }
}
