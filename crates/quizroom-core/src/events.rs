//! Push events delivered to room subscribers.
//!
//! Serialized as `{ "eventType": "...", ...fields }`. The SSE layer also uses
//! [`RoomEvent::event_type`] as the `event:` name.

use serde::{Deserialize, Serialize};

use crate::player::TeamRoster;
use crate::room::GameMode;
use crate::scores::RoomScores;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "eventType",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum RoomEvent {
    /// Sent to the joiner only, before anything else.
    ConnectionEstablished { game_mode: GameMode },
    /// Full list of seated player names.
    PlayerJoined { players: Vec<String> },
    Teams { teams: Vec<TeamRoster> },
    GameStart,
    QuizInfos { question_count: usize },
    Timer { remaining_time: u32 },
    /// An answer was recorded but the question stays open.
    PlayerAnswered { user: String },
    CorrectAnswerFound { user: String, correct_answer: String },
    NextQuestion { question_cursor: usize },
    GameEnd { scores: RoomScores },
}

impl RoomEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::ConnectionEstablished { .. } => "connectionEstablished",
            Self::PlayerJoined { .. } => "playerJoined",
            Self::Teams { .. } => "teams",
            Self::GameStart => "gameStart",
            Self::QuizInfos { .. } => "quizInfos",
            Self::Timer { .. } => "timer",
            Self::PlayerAnswered { .. } => "playerAnswered",
            Self::CorrectAnswerFound { .. } => "correctAnswerFound",
            Self::NextQuestion { .. } => "nextQuestion",
            Self::GameEnd { .. } => "gameEnd",
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
