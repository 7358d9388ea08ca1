use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::RoomError;
use crate::player::{RoomPlayer, RoomPlayerId, Team, TeamId, TeamRoster, UserId};
use crate::quiz::{Difficulty, Question, QuizId};

/// Human-readable room token, e.g. `brave-otter-sings`.
pub type RoomId = String;

/// Upper bound on room capacity.
pub const MAX_PLAYER_COUNT: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameMode {
    /// First correct answer (or everyone answering) moves the room on.
    Scrum,
    /// Players grouped into teams; questions are paced by a countdown.
    Team,
}

/// Lifecycle state, derived from `launched` and the question cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoomState {
    Lobby,
    Launched,
    Ended,
}

/// Creator-supplied options for a new room.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSettings {
    pub player_count: u32,
    pub game_mode: GameMode,
    #[serde(default)]
    pub difficulty: Option<Difficulty>,
    /// Seconds per question in team rooms. Overrides the difficulty table.
    #[serde(default)]
    pub time_limit: Option<u32>,
    #[serde(default)]
    pub teams: Vec<String>,
}

impl RoomSettings {
    /// Clamp capacity and normalise team names. Scrum rooms drop any teams.
    pub fn validated(mut self, max_player_count: u32) -> Result<Self, RoomError> {
        if self.player_count == 0 {
            return Err(RoomError::Invalid(
                "playerCount must be at least 1".to_string(),
            ));
        }
        self.player_count = self.player_count.min(max_player_count);

        if self.time_limit == Some(0) {
            return Err(RoomError::Invalid(
                "timeLimit must be at least 1 second".to_string(),
            ));
        }

        match self.game_mode {
            GameMode::Scrum => self.teams.clear(),
            GameMode::Team => {
                let mut names: Vec<String> = Vec::with_capacity(self.teams.len());
                for name in &self.teams {
                    let name = name.trim();
                    if name.is_empty() {
                        return Err(RoomError::Invalid("team names cannot be blank".to_string()));
                    }
                    if names.iter().any(|n| n == name) {
                        return Err(RoomError::Invalid(format!("duplicate team name: {name}")));
                    }
                    names.push(name.to_string());
                }
                if names.is_empty() {
                    return Err(RoomError::Invalid(
                        "team mode requires at least one team".to_string(),
                    ));
                }
                self.teams = names;
            },
        }
        Ok(self)
    }
}

/// A room as loaded from the store, with its questions, players and teams.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    pub id: RoomId,
    pub quiz_id: QuizId,
    pub creator_id: UserId,
    pub player_count: u32,
    pub game_mode: GameMode,
    pub difficulty: Option<Difficulty>,
    pub time_limit: Option<u32>,
    pub launched: bool,
    pub question_cursor: usize,
    pub questions: Vec<Question>,
    pub players: Vec<RoomPlayer>,
    pub teams: Vec<Team>,
}

/// Result of a successful join check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    /// Already seated; reconnecting.
    Rejoin,
    /// New seat. `auto_start` is set when this seat fills a scrum room.
    NewPlayer { auto_start: bool },
}

/// Who asked for the room to start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartKind {
    Explicit { requester: UserId },
    /// Triggered by the join that filled the room.
    Implicit,
}

impl Room {
    pub fn state(&self) -> RoomState {
        if !self.launched {
            RoomState::Lobby
        } else if self.question_cursor < self.questions.len() {
            RoomState::Launched
        } else {
            RoomState::Ended
        }
    }

    pub fn question_count(&self) -> usize {
        self.questions.len()
    }

    pub fn player(&self, user_id: UserId) -> Option<&RoomPlayer> {
        self.players.iter().find(|p| p.user_id == user_id)
    }

    pub fn is_member(&self, user_id: UserId) -> bool {
        self.player(user_id).is_some()
    }

    pub fn team_by_name(&self, name: &str) -> Option<&Team> {
        self.teams.iter().find(|t| t.name == name)
    }

    pub fn check_join(&self, user_id: UserId) -> Result<JoinOutcome, RoomError> {
        if self.is_member(user_id) {
            return Ok(JoinOutcome::Rejoin);
        }
        if self.launched {
            return Err(RoomError::AlreadyLaunched);
        }
        let seated = self.players.len();
        if seated >= self.player_count as usize {
            return Err(RoomError::RoomFull);
        }
        let auto_start =
            self.game_mode == GameMode::Scrum && seated + 1 == self.player_count as usize;
        Ok(JoinOutcome::NewPlayer { auto_start })
    }

    /// Returns the seat to move and the target team.
    pub fn check_join_team(
        &self,
        user_id: UserId,
        team_name: &str,
    ) -> Result<(RoomPlayerId, TeamId), RoomError> {
        if self.launched {
            return Err(RoomError::AlreadyLaunched);
        }
        let team = self.team_by_name(team_name).ok_or(RoomError::TeamNotFound)?;
        let player = self.player(user_id).ok_or(RoomError::PlayerNotFound)?;
        if player.team_id == Some(team.id) {
            return Err(RoomError::AlreadyInTeam);
        }
        Ok((player.id, team.id))
    }

    pub fn check_start(&self, kind: StartKind) -> Result<(), RoomError> {
        if let StartKind::Explicit { requester } = kind
            && requester != self.creator_id
        {
            return Err(RoomError::NotCreator);
        }
        if self.state() != RoomState::Lobby {
            return Err(RoomError::AlreadyLaunched);
        }
        if let StartKind::Explicit { .. } = kind {
            if self.players.len() < 2 {
                return Err(RoomError::NotEnoughPlayers);
            }
            if self.game_mode == GameMode::Team && self.players.iter().any(|p| p.team_id.is_none())
            {
                return Err(RoomError::PlayersWithoutTeam);
            }
        }
        Ok(())
    }

    pub fn current_question(&self) -> Result<&Question, RoomError> {
        self.questions
            .get(self.question_cursor)
            .ok_or(RoomError::NoQuestionsLeft)
    }

    /// Countdown for each question of a team room.
    pub fn question_timer_secs(&self) -> u32 {
        self.time_limit
            .unwrap_or_else(|| Difficulty::timer_secs_or_default(self.difficulty))
    }

    pub fn player_names(&self) -> Vec<String> {
        self.players.iter().map(|p| p.user_name.clone()).collect()
    }

    /// Teams in creation order, members in seating order.
    pub fn team_rosters(&self) -> Vec<TeamRoster> {
        self.teams
            .iter()
            .map(|team| TeamRoster {
                name: team.name.clone(),
                players: self
                    .members_of(team.id)
                    .map(|p| p.user_name.clone())
                    .collect(),
            })
            .collect()
    }

    pub fn members_of(&self, team_id: TeamId) -> impl Iterator<Item = &RoomPlayer> {
        self.players
            .iter()
            .filter(move |p| p.team_id == Some(team_id))
    }
}

const ADJECTIVES: &[&str] = &[
    "brave", "calm", "clever", "eager", "fancy", "gentle", "happy", "jolly", "kind", "lucky",
    "mighty", "nimble", "proud", "quick", "quiet", "shiny", "silly", "swift", "witty", "zesty",
];

const NOUNS: &[&str] = &[
    "badger", "beaver", "camel", "falcon", "ferret", "gecko", "heron", "koala", "lemur", "lynx",
    "moose", "otter", "panda", "parrot", "puffin", "rabbit", "salmon", "tiger", "walrus", "yak",
];

const VERBS: &[&str] = &[
    "bakes", "climbs", "dances", "dives", "dreams", "hops", "hums", "jumps", "laughs", "naps",
    "paints", "races", "reads", "rolls", "sings", "skates", "sleeps", "swims", "waves", "yawns",
];

/// Generate an `adjective-noun-verb` room id.
pub fn generate_room_id<R: Rng + ?Sized>(rng: &mut R) -> RoomId {
    let adjective = ADJECTIVES[rng.random_range(0..ADJECTIVES.len())];
    let noun = NOUNS[rng.random_range(0..NOUNS.len())];
    let verb = VERBS[rng.random_range(0..VERBS.len())];
    format!("{adjective}-{noun}-{verb}")
}

pub fn is_valid_room_id(id: &str) -> bool {
    let parts: Vec<&str> = id.split('-').collect();
    parts.len() == 3
        && parts
            .iter()
            .all(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_lowercase()))
}
