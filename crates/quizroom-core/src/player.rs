use serde::{Deserialize, Serialize};

use crate::room::RoomId;

pub type UserId = u64;
pub type RoomPlayerId = u64;
pub type TeamId = u64;

/// An account known to the store. Read-only from the room's perspective.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub user_name: String,
}

/// A user's seat in one room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomPlayer {
    pub id: RoomPlayerId,
    pub user_id: UserId,
    pub room_id: RoomId,
    pub user_name: String,
    /// Reset to false every time the question cursor moves.
    pub answered: bool,
    pub score: u32,
    pub team_id: Option<TeamId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Team {
    pub id: TeamId,
    pub room_id: RoomId,
    pub name: String,
}

/// Team name plus member names, as pushed in `teams` events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamRoster {
    pub name: String,
    pub players: Vec<String>,
}
