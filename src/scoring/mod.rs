mod aggregator;
pub mod catalog;

pub use aggregator::{ScoreAggregator, ScoreEvent, ScoreKind, ScoringSettings};
pub use catalog::{room_object, RoomObject, MATCH_EMOJI, MATCH_LABEL, MATCH_POINTS, ROOM_OBJECTS};
