//! Built-in challenge catalog.
//!
//! A challenge is either a prompt pool (the participant picks up to `max_prompts`) or a
//! fixed list of numbered steps. The catalog also decides which analysis path a challenge
//! runs on.

use anyhow::{anyhow, Result};
use serde::Serialize;

use crate::session::{PromptSlot, StepRef};

/// Challenge that runs on the ML path.
pub const ML_CHALLENGE_ID: &str = "my-room-my-vibe";
/// Prompt whose reference photo is used for match checks on the ML path.
pub const ML_REFERENCE_PROMPT: &str = "favorite-corner";
/// Pattern category for the ML challenge when it falls back to pattern detection.
pub const ML_FALLBACK_CATEGORY: &str = "room-tour";

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengePrompt {
    pub id: &'static str,
    pub text: &'static str,
    pub emoji: &'static str,
    /// Seconds.
    pub duration: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_photo: Option<&'static str>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeStep {
    pub id: u32,
    pub title: &'static str,
    pub emoji: &'static str,
    /// Seconds.
    pub duration: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Challenge {
    pub id: &'static str,
    pub name: &'static str,
    pub tagline: &'static str,
    pub points_per_step: u32,
    pub day_number: u32,
    pub max_prompts: usize,
    pub prompt_pool: Vec<ChallengePrompt>,
    pub steps: Vec<ChallengeStep>,
}

/// How frames of a challenge are analyzed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AnalysisPath {
    /// Pixel heuristics with pattern detection for `category`.
    Heuristic { category: Option<String> },
    /// Object detection and embedding similarity against `reference`.
    Ml { reference: Option<String> },
}

impl Challenge {
    pub fn analysis_path(&self) -> AnalysisPath {
        if self.id == ML_CHALLENGE_ID {
            AnalysisPath::Ml {
                reference: self
                    .prompt(ML_REFERENCE_PROMPT)
                    .and_then(|p| p.reference_photo)
                    .map(str::to_string),
            }
        } else {
            AnalysisPath::Heuristic {
                category: Some(self.id.to_string()),
            }
        }
    }

    /// Pattern category used by pattern-based object detection for this challenge,
    /// including the model-free fallback of the ML path.
    pub fn pattern_category(&self) -> &'static str {
        if self.id == ML_CHALLENGE_ID {
            ML_FALLBACK_CATEGORY
        } else {
            self.id
        }
    }

    pub fn prompt(&self, id: &str) -> Option<&ChallengePrompt> {
        self.prompt_pool.iter().find(|p| p.id == id)
    }

    /// Resolve a prompt selection. An empty selection takes the first `max_prompts`.
    pub fn select_prompts(&self, ids: &[&str]) -> Result<Vec<&ChallengePrompt>> {
        if ids.is_empty() {
            return Ok(self.prompt_pool.iter().take(self.max_prompts).collect());
        }
        if ids.len() > self.max_prompts {
            return Err(anyhow!(
                "{} allows at most {} prompts, got {}",
                self.id,
                self.max_prompts,
                ids.len()
            ));
        }
        ids.iter()
            .map(|id| {
                self.prompt(id)
                    .ok_or_else(|| anyhow!("unknown prompt '{}' for {}", id, self.id))
            })
            .collect()
    }

    /// Prompt slots for a session; numbered steps stand in when there is no prompt pool.
    pub fn prompt_slots(&self, ids: &[&str]) -> Result<Vec<PromptSlot>> {
        if self.prompt_pool.is_empty() {
            return Ok(self
                .steps
                .iter()
                .map(|s| PromptSlot {
                    id: s.id.to_string(),
                    duration_ms: s.duration as u64 * 1000,
                })
                .collect());
        }
        Ok(self
            .select_prompts(ids)?
            .into_iter()
            .map(|p| PromptSlot {
                id: p.id.to_string(),
                duration_ms: p.duration as u64 * 1000,
            })
            .collect())
    }

    /// Step reference recorded on the clip: one clip covers the whole take.
    pub fn clip_step(&self) -> StepRef {
        if self.prompt_pool.is_empty() {
            StepRef::Index(1)
        } else {
            StepRef::Index(0)
        }
    }
}

const fn prompt(id: &'static str, text: &'static str, emoji: &'static str, duration: u32) -> ChallengePrompt {
    ChallengePrompt {
        id,
        text,
        emoji,
        duration,
        reference_photo: None,
    }
}

const fn photo_prompt(
    id: &'static str,
    text: &'static str,
    emoji: &'static str,
    duration: u32,
    photo: &'static str,
) -> ChallengePrompt {
    ChallengePrompt {
        id,
        text,
        emoji,
        duration,
        reference_photo: Some(photo),
    }
}

const fn step(id: u32, title: &'static str, emoji: &'static str, duration: u32) -> ChallengeStep {
    ChallengeStep {
        id,
        title,
        emoji,
        duration,
    }
}

#[derive(Clone, Debug)]
pub struct ChallengeCatalog {
    challenges: Vec<Challenge>,
}

impl ChallengeCatalog {
    pub fn builtin() -> Self {
        let challenges = vec![
            Challenge {
                id: "my-room-my-vibe",
                name: "My Room, My Vibe",
                tagline: "Show what makes your space feel like home",
                points_per_step: 25,
                day_number: 1,
                max_prompts: 5,
                prompt_pool: vec![
                    photo_prompt("favorite-corner", "Show your favorite corner in the room", "🏩", 5, "/reference-photos/cozy-corner.jpg"),
                    photo_prompt("study-setup", "What's your study setup like?", "🎧", 5, "/reference-photos/study-desk.jpg"),
                    photo_prompt("kitchen-tour", "Take us to your kitchen – what do you cook most?", "🍜", 6, "/reference-photos/kitchen.jpg"),
                    photo_prompt("window-view", "What's your view like from the window?", "🌇", 4, "/reference-photos/window-view.jpg"),
                    prompt("love-most", "Say one thing you love most about living here", "❤️", 4),
                    prompt("fridge-tour", "What's in your fridge?", "🧃", 4),
                    prompt("roommate-shoutout", "A roommate shoutout", "👋", 5),
                    photo_prompt("chill-zone", "Your chill-out zone", "🧘", 5, "/reference-photos/living-area.jpg"),
                ],
                steps: Vec::new(),
            },
            Challenge {
                id: "a-day-in-the-life",
                name: "A Day in the Life",
                tagline: "What's your student life really like?",
                points_per_step: 25,
                day_number: 2,
                max_prompts: 5,
                prompt_pool: vec![
                    prompt("morning-routine", "Your morning routine", "🚱", 5),
                    prompt("uni-commute", "Uni walk or commute", "🏃‍♂️", 6),
                    prompt("lunch-time", "What's for lunch?", "🍱", 4),
                    prompt("post-class-hangout", "Where do you hang out post-classes?", "🧳", 5),
                    prompt("study-grind", "Study grind moment", "💻", 5),
                    prompt("evening-chill", "Chill time in the evening", "🌯", 5),
                    prompt("unexpected-moment", "Something unexpected today!", "🎉", 4),
                    prompt("night-view", "Night-time view", "🌙", 4),
                ],
                steps: Vec::new(),
            },
            Challenge {
                id: "flatmates-say",
                name: "Flatmates Say...",
                tagline: "What do your flatmates love (or roast) about living here?",
                points_per_step: 30,
                day_number: 3,
                max_prompts: 5,
                prompt_pool: vec![
                    prompt("introductions", "Everyone introduce themselves", "👋", 6),
                    prompt("one-word", "One word to describe this flat", "🤭", 3),
                    prompt("messy-one", "Who's the messy one?", "🦜", 4),
                    prompt("best-moment", "What's the best shared moment?", "📸", 5),
                    prompt("kitchen-tour", "Group tour of kitchen/dining", "🥣", 6),
                    prompt("recommend", "Would you recommend this place?", "💯", 4),
                ],
                steps: Vec::new(),
            },
            Challenge {
                id: "neighborhood-hacks",
                name: "Neighborhood Hacks",
                tagline: "Tips for surviving (and thriving) in your student city",
                points_per_step: 35,
                day_number: 4,
                max_prompts: 5,
                prompt_pool: vec![
                    prompt("cheapest-grocery", "Cheapest grocery?", "🛒", 4),
                    prompt("favorite-hangout", "Favorite nearby hangout?", "🎮", 5),
                    prompt("coffee-spot", "Coffee or breakfast spot?", "☕", 4),
                    prompt("study-spot", "Study spot outside your room?", "📚", 5),
                    prompt("hidden-gems", "Hidden gems?", "🗺️", 5),
                    prompt("safe-route", "Safest route back home?", "🚶", 5),
                    prompt("wish-knew", "One thing you wish you knew earlier", "🎯", 4),
                ],
                steps: Vec::new(),
            },
            Challenge {
                id: "what-i-wish-i-knew",
                name: "What I Wish I Knew",
                tagline: "Reflect, rant, or review — it all helps someone else",
                points_per_step: 40,
                day_number: 5,
                max_prompts: 5,
                prompt_pool: vec![
                    prompt("surprised-most", "What surprised you the most here?", "😮", 5),
                    prompt("hard-to-adjust", "What was hard to get used to?", "😵", 5),
                    prompt("weird-rule", "A weird rule or policy here", "🗒️", 4),
                    prompt("useful-thing", "Most useful thing you packed", "🎒", 4),
                    prompt("useless-thing", "Most useless thing you brought", "🛫", 4),
                    prompt("big-tip", "One big tip for a new resident", "🔑", 5),
                ],
                steps: Vec::new(),
            },
            Challenge {
                id: "room-tour",
                name: "🛏️ Room Tour in 5 Prompts",
                tagline: "Show us around your cozy corner of the world.",
                points_per_step: 10,
                day_number: 1,
                max_prompts: 5,
                prompt_pool: Vec::new(),
                steps: vec![
                    step(1, "Show us your cozy bed!", "🛏️", 5),
                    step(2, "Pan to your study corner", "📚", 5),
                    step(3, "Open your fridge! What's inside?", "🧃", 6),
                    step(4, "Your bathroom essentials", "🚿", 4),
                    step(5, "Your favorite chill spot", "🌟", 5),
                ],
            },
        ];
        Self { challenges }
    }

    pub fn get(&self, id: &str) -> Option<&Challenge> {
        self.challenges.iter().find(|c| c.id == id)
    }

    pub fn all(&self) -> &[Challenge] {
        &self.challenges
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn my_room_uses_ml_with_favorite_corner() {
        let catalog = ChallengeCatalog::builtin();
        let challenge = catalog.get("my-room-my-vibe").unwrap();
        assert_eq!(
            challenge.analysis_path(),
            AnalysisPath::Ml {
                reference: Some("/reference-photos/cozy-corner.jpg".to_string())
            }
        );
    }

    #[test]
    fn other_challenges_use_their_id_as_category() {
        let catalog = ChallengeCatalog::builtin();
        assert_eq!(
            catalog.get("room-tour").unwrap().analysis_path(),
            AnalysisPath::Heuristic {
                category: Some("room-tour".to_string())
            }
        );
    }

    #[test]
    fn pattern_category_follows_the_challenge() {
        let catalog = ChallengeCatalog::builtin();
        assert_eq!(catalog.get("flatmates-say").unwrap().pattern_category(), "flatmates-say");
        assert_eq!(
            catalog.get(ML_CHALLENGE_ID).unwrap().pattern_category(),
            ML_FALLBACK_CATEGORY
        );
    }

    #[test]
    fn selection_limits_and_durations() -> Result<()> {
        let catalog = ChallengeCatalog::builtin();
        let challenge = catalog.get("my-room-my-vibe").unwrap();
        let slots = challenge.prompt_slots(&["kitchen-tour", "window-view"])?;
        assert_eq!(slots.iter().map(|s| s.duration_ms).sum::<u64>(), 10_000);
        assert!(challenge.select_prompts(&["nope"]).is_err());
        assert!(challenge
            .select_prompts(&["a", "b", "c", "d", "e", "f"])
            .is_err());
        assert_eq!(challenge.select_prompts(&[])?.len(), 5);
        Ok(())
    }

    #[test]
    fn step_challenges_use_steps_as_slots() -> Result<()> {
        let catalog = ChallengeCatalog::builtin();
        let slots = catalog.get("room-tour").unwrap().prompt_slots(&[])?;
        assert_eq!(slots.len(), 5);
        assert_eq!(slots.iter().map(|s| s.duration_ms).sum::<u64>(), 25_000);
        Ok(())
    }
}
