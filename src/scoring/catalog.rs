/// A room object worth points the first time it is seen in a take.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RoomObject {
    /// Detector class name.
    pub key: &'static str,
    pub points: u32,
    pub emoji: &'static str,
    pub label: &'static str,
}

pub const ROOM_OBJECTS: [RoomObject; 10] = [
    RoomObject { key: "bed", points: 15, emoji: "🛏️", label: "Bed spotted!" },
    RoomObject { key: "chair", points: 10, emoji: "🪑", label: "Study chair!" },
    RoomObject { key: "laptop", points: 12, emoji: "💻", label: "Study setup!" },
    RoomObject { key: "book", points: 8, emoji: "📚", label: "Study materials!" },
    RoomObject { key: "refrigerator", points: 20, emoji: "🧊", label: "Fridge tour!" },
    RoomObject { key: "microwave", points: 15, emoji: "🔥", label: "Kitchen appliance!" },
    RoomObject { key: "sink", points: 12, emoji: "🚿", label: "Kitchen sink!" },
    RoomObject { key: "couch", points: 18, emoji: "🛋️", label: "Chill zone!" },
    RoomObject { key: "tv", points: 15, emoji: "📺", label: "Entertainment!" },
    RoomObject { key: "desk", points: 12, emoji: "🗃️", label: "Study desk!" },
];

/// Award for a reference-photo match.
pub const MATCH_POINTS: u32 = 25;
pub const MATCH_LABEL: &str = "Perfect room match!";
pub const MATCH_EMOJI: &str = "🎯";

/// Look up a detector class. Unknown classes earn nothing.
pub fn room_object(class: &str) -> Option<&'static RoomObject> {
    ROOM_OBJECTS.iter().find(|o| o.key == class)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_by_class() {
        assert_eq!(room_object("bed").map(|o| o.points), Some(15));
        assert_eq!(room_object("refrigerator").map(|o| o.label), Some("Fridge tour!"));
        assert!(room_object("person").is_none());
    }

    #[test]
    fn keys_are_unique() {
        for (i, a) in ROOM_OBJECTS.iter().enumerate() {
            assert!(ROOM_OBJECTS[i + 1..].iter().all(|b| b.key != a.key));
        }
    }
}
