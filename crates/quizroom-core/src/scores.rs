use serde::{Deserialize, Serialize};

use crate::room::{GameMode, Room};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerScore {
    pub user_name: String,
    pub score: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamScore {
    pub team_name: String,
    /// Arithmetic mean of member scores; 0 for an empty team.
    pub average_score: f64,
    pub players: Vec<PlayerScore>,
}

/// Scoreboard payload. Scrum rooms report players, team rooms report teams.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RoomScores {
    Team {
        #[serde(rename = "teamScores")]
        team_scores: Vec<TeamScore>,
    },
    Scrum {
        scores: Vec<PlayerScore>,
    },
}

fn player_score(user_name: &str, score: u32) -> PlayerScore {
    PlayerScore {
        user_name: user_name.to_string(),
        score,
    }
}

pub fn room_scores(room: &Room) -> RoomScores {
    match room.game_mode {
        GameMode::Scrum => RoomScores::Scrum {
            scores: room
                .players
                .iter()
                .map(|p| player_score(&p.user_name, p.score))
                .collect(),
        },
        GameMode::Team => RoomScores::Team {
            team_scores: room
                .teams
                .iter()
                .map(|team| {
                    let players: Vec<PlayerScore> = room
                        .members_of(team.id)
                        .map(|p| player_score(&p.user_name, p.score))
                        .collect();
                    let average_score = if players.is_empty() {
                        0.0
                    } else {
                        let total: u32 = players.iter().map(|p| p.score).sum();
                        total as f64 / players.len() as f64
                    };
                    TeamScore {
                        team_name: team.name.clone(),
                        average_score,
                        players,
                    }
                })
                .collect(),
        },
    }
}
