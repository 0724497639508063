use serde::{Deserialize, Serialize};

/// steam-200k の1行。behavior はまだ検証していない生の文字列。
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawEvent {
    pub user_id: u64,
    pub game: String,
    pub behavior: String,
    pub value: f32,
}

impl RawEvent {
    pub fn new(user_id: u64, game: &str, behavior: &str, value: f32) -> Self {
        Self {
            user_id,
            game: game.to_string(),
            behavior: behavior.to_string(),
            value,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Behavior {
    Purchase,
    Play,
}

impl Behavior {
    pub const ALL: [Behavior; 2] = [Behavior::Purchase, Behavior::Play];

    pub fn as_str(self) -> &'static str {
        match self {
            Behavior::Purchase => "purchase",
            Behavior::Play => "play",
        }
    }

    pub fn parse(s: &str) -> Option<Behavior> {
        Behavior::ALL.into_iter().find(|b| b.as_str() == s)
    }
}

/// (user_id, game) ごとに集約済みの暗黙的フィードバック。weight は常に正。
#[derive(Debug, Clone, PartialEq)]
pub struct WeightedInteraction {
    pub user_id: u64,
    pub game: String,
    pub weight: f32,
}

impl WeightedInteraction {
    pub fn new(user_id: u64, game: &str, weight: f32) -> Self {
        Self {
            user_id,
            game: game.to_string(),
            weight,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    pub title: String,
    pub score: f32,
}
