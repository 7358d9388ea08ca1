//! Persistence collaborator for rooms, players and teams.
//!
//! The orchestrator only talks to [`RoomStore`]. [`InMemoryStore`] is the
//! implementation the server ships with; it can be seeded with users and
//! quizzes from a JSON file.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::RwLock;

use quizroom_core::player::{RoomPlayer, RoomPlayerId, Team, TeamId, User, UserId};
use quizroom_core::quiz::{Difficulty, Question, Quiz, QuizId};
use quizroom_core::room::{GameMode, Room, RoomId};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Fields of a room at creation time. Questions are copied from the quiz.
#[derive(Debug, Clone)]
pub struct NewRoom {
    pub id: RoomId,
    pub quiz_id: QuizId,
    pub creator_id: UserId,
    pub player_count: u32,
    pub game_mode: GameMode,
    pub difficulty: Option<Difficulty>,
    pub time_limit: Option<u32>,
    pub questions: Vec<Question>,
}

/// Partial room update; `None` fields are left alone.
#[derive(Debug, Clone, Copy, Default)]
pub struct RoomUpdate {
    pub launched: Option<bool>,
    pub question_cursor: Option<usize>,
}

/// Partial player update; `None` fields are left alone.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlayerUpdate {
    pub answered: Option<bool>,
    pub score: Option<u32>,
    pub team_id: Option<TeamId>,
}

impl PlayerUpdate {
    fn apply(&self, player: &mut RoomPlayer) {
        if let Some(answered) = self.answered {
            player.answered = answered;
        }
        if let Some(score) = self.score {
            player.score = score;
        }
        if let Some(team_id) = self.team_id {
            player.team_id = Some(team_id);
        }
    }
}

#[async_trait]
pub trait RoomStore: Send + Sync {
    async fn find_user(&self, id: UserId) -> Result<Option<User>, StoreError>;

    async fn find_quiz(&self, id: QuizId) -> Result<Option<Quiz>, StoreError>;

    /// The room with its questions, players (seating order) and teams
    /// (creation order).
    async fn find_room(&self, id: &str) -> Result<Option<Room>, StoreError>;

    async fn room_exists(&self, id: &str) -> Result<bool, StoreError>;

    /// Fails with `Conflict` when the id is taken.
    async fn create_room(&self, room: NewRoom) -> Result<Room, StoreError>;

    async fn update_room(&self, id: &str, update: RoomUpdate) -> Result<(), StoreError>;

    /// Fails with `Conflict` when the user already has a seat in the room.
    async fn create_room_player(&self, room_id: &str, user: &User)
    -> Result<RoomPlayer, StoreError>;

    async fn update_room_player(
        &self,
        id: RoomPlayerId,
        update: PlayerUpdate,
    ) -> Result<(), StoreError>;

    /// Apply `update` to every player seated in `room_id`.
    async fn update_many_room_players(
        &self,
        room_id: &str,
        update: PlayerUpdate,
    ) -> Result<(), StoreError>;

    async fn create_team(&self, room_id: &str, name: &str) -> Result<Team, StoreError>;

    async fn find_teams(&self, room_id: &str) -> Result<Vec<Team>, StoreError>;
}

/// Users and quizzes to preload, as read from `seed_file`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SeedData {
    pub users: Vec<User>,
    pub quizzes: Vec<Quiz>,
}

#[derive(Default)]
struct Tables {
    users: HashMap<UserId, User>,
    quizzes: HashMap<QuizId, Quiz>,
    rooms: HashMap<RoomId, Room>,
    player_rooms: HashMap<RoomPlayerId, RoomId>,
    next_player_id: RoomPlayerId,
    next_team_id: TeamId,
}

impl Tables {
    fn room_mut(&mut self, id: &str) -> Result<&mut Room, StoreError> {
        self.rooms.get_mut(id).ok_or(StoreError::NotFound("room"))
    }
}

#[derive(Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_seed(seed: SeedData) -> Self {
        let tables = Tables {
            users: seed.users.into_iter().map(|u| (u.id, u)).collect(),
            quizzes: seed.quizzes.into_iter().map(|q| (q.id, q)).collect(),
            ..Tables::default()
        };
        Self {
            tables: RwLock::new(tables),
        }
    }

    pub fn from_seed_file(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| StoreError::Unavailable(format!("{}: {e}", path.display())))?;
        let seed: SeedData = serde_json::from_str(&content)
            .map_err(|e| StoreError::Unavailable(format!("{}: {e}", path.display())))?;
        tracing::info!(
            users = seed.users.len(),
            quizzes = seed.quizzes.len(),
            "Loaded seed data from {}",
            path.display()
        );
        Ok(Self::with_seed(seed))
    }
}

#[async_trait]
impl RoomStore for InMemoryStore {
    async fn find_user(&self, id: UserId) -> Result<Option<User>, StoreError> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn find_quiz(&self, id: QuizId) -> Result<Option<Quiz>, StoreError> {
        Ok(self.tables.read().await.quizzes.get(&id).cloned())
    }

    async fn find_room(&self, id: &str) -> Result<Option<Room>, StoreError> {
        Ok(self.tables.read().await.rooms.get(id).cloned())
    }

    async fn room_exists(&self, id: &str) -> Result<bool, StoreError> {
        Ok(self.tables.read().await.rooms.contains_key(id))
    }

    async fn create_room(&self, new: NewRoom) -> Result<Room, StoreError> {
        let mut tables = self.tables.write().await;
        if tables.rooms.contains_key(&new.id) {
            return Err(StoreError::Conflict(format!("room {} already exists", new.id)));
        }
        let room = Room {
            id: new.id,
            quiz_id: new.quiz_id,
            creator_id: new.creator_id,
            player_count: new.player_count,
            game_mode: new.game_mode,
            difficulty: new.difficulty,
            time_limit: new.time_limit,
            launched: false,
            question_cursor: 0,
            questions: new.questions,
            players: Vec::new(),
            teams: Vec::new(),
        };
        tables.rooms.insert(room.id.clone(), room.clone());
        Ok(room)
    }

    async fn update_room(&self, id: &str, update: RoomUpdate) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        let room = tables.room_mut(id)?;
        if let Some(launched) = update.launched {
            room.launched = launched;
        }
        if let Some(cursor) = update.question_cursor {
            room.question_cursor = cursor;
        }
        Ok(())
    }

    async fn create_room_player(
        &self,
        room_id: &str,
        user: &User,
    ) -> Result<RoomPlayer, StoreError> {
        let mut tables = self.tables.write().await;
        tables.next_player_id += 1;
        let id = tables.next_player_id;
        let room = tables.room_mut(room_id)?;
        if room.is_member(user.id) {
            return Err(StoreError::Conflict(format!(
                "user {} already seated in {room_id}",
                user.id
            )));
        }
        let player = RoomPlayer {
            id,
            user_id: user.id,
            room_id: room_id.to_string(),
            user_name: user.user_name.clone(),
            answered: false,
            score: 0,
            team_id: None,
        };
        room.players.push(player.clone());
        tables.player_rooms.insert(id, room_id.to_string());
        Ok(player)
    }

    async fn update_room_player(
        &self,
        id: RoomPlayerId,
        update: PlayerUpdate,
    ) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        let room_id = tables
            .player_rooms
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound("player"))?;
        let room = tables.room_mut(&room_id)?;
        let player = room
            .players
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(StoreError::NotFound("player"))?;
        update.apply(player);
        Ok(())
    }

    async fn update_many_room_players(
        &self,
        room_id: &str,
        update: PlayerUpdate,
    ) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        let room = tables.room_mut(room_id)?;
        room.players.iter_mut().for_each(|p| update.apply(p));
        Ok(())
    }

    async fn create_team(&self, room_id: &str, name: &str) -> Result<Team, StoreError> {
        let mut tables = self.tables.write().await;
        tables.next_team_id += 1;
        let id = tables.next_team_id;
        let room = tables.room_mut(room_id)?;
        if room.team_by_name(name).is_some() {
            return Err(StoreError::Conflict(format!("team {name} already exists")));
        }
        let team = Team {
            id,
            room_id: room_id.to_string(),
            name: name.to_string(),
        };
        room.teams.push(team.clone());
        Ok(team)
    }

    async fn find_teams(&self, room_id: &str) -> Result<Vec<Team>, StoreError> {
        let tables = self.tables.read().await;
        let room = tables.rooms.get(room_id).ok_or(StoreError::NotFound("room"))?;
        Ok(room.teams.clone())
    }
}
