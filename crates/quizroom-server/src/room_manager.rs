//! Session orchestrator.
//!
//! Every read-modify-write on a room (join, team change, start, answer,
//! advance, timer expiry) runs while holding that room's session lock, so at
//! most one transition per room is in flight. Settle delays are spawned
//! continuations that take the lock again and check the question cursor they
//! were scheduled for before acting.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{Mutex as SessionLock, mpsc};

use quizroom_core::answer::{Advance, resolve_answer};
use quizroom_core::error::RoomError;
use quizroom_core::events::RoomEvent;
use quizroom_core::player::{TeamRoster, User, UserId};
use quizroom_core::quiz::{QuestionView, QuizId};
use quizroom_core::room::{
    GameMode, JoinOutcome, Room, RoomId, RoomSettings, RoomState, StartKind, generate_room_id,
};
use quizroom_core::scores::{RoomScores, room_scores};

use crate::broadcast::{Broadcaster, SubscriptionGuard};
use crate::config::RoomsConfig;
use crate::error::ManagerError;
use crate::store::{NewRoom, PlayerUpdate, RoomStore, RoomUpdate, StoreError};
use crate::timer::TimerEngine;

/// Attempts at drawing an unused room id before giving up.
const ROOM_ID_ATTEMPTS: usize = 10;

/// In-memory state that lives next to the stored room.
#[derive(Default)]
struct RoomSession {
    /// Between the launch and the `gameStart` broadcast.
    starting: bool,
    /// Cursor whose advancement is already scheduled. Answers to it are closed.
    resolving: Option<usize>,
}

type SharedSession = Arc<SessionLock<RoomSession>>;

/// A live subscription to a room's push events. Dropping it unsubscribes.
pub struct JoinedRoom {
    pub subscription: RoomSubscription,
    pub events: mpsc::Receiver<RoomEvent>,
}

/// Unsubscribes on drop, then releases the room's session if nothing else
/// needs it.
pub struct RoomSubscription {
    guard: Option<SubscriptionGuard>,
    manager: Arc<RoomManager>,
    room_id: RoomId,
}

impl Drop for RoomSubscription {
    fn drop(&mut self) {
        drop(self.guard.take());
        self.manager.release_idle_session(&self.room_id);
    }
}

pub struct RoomManager {
    store: Arc<dyn RoomStore>,
    broadcaster: Arc<Broadcaster>,
    timers: Arc<TimerEngine>,
    sessions: Mutex<HashMap<RoomId, SharedSession>>,
    config: RoomsConfig,
}

impl RoomManager {
    pub fn new(store: Arc<dyn RoomStore>, config: RoomsConfig, subscriber_buffer: usize) -> Self {
        let broadcaster = Arc::new(Broadcaster::new(subscriber_buffer));
        let timers = Arc::new(TimerEngine::new(
            Arc::clone(&broadcaster),
            config.timer_tick(),
        ));
        Self {
            store,
            broadcaster,
            timers,
            sessions: Mutex::new(HashMap::new()),
            config,
        }
    }

    pub fn broadcaster(&self) -> &Arc<Broadcaster> {
        &self.broadcaster
    }

    pub fn timers(&self) -> &Arc<TimerEngine> {
        &self.timers
    }

    /// (tracked rooms, open subscriptions, running timers)
    pub fn stats(&self) -> (usize, usize, usize) {
        let rooms = self.sessions.lock().len();
        let (_, subscribers) = self.broadcaster.stats();
        (rooms, subscribers, self.timers.active_count())
    }

    /// The room's session lock. Rooms created elsewhere get a session on
    /// first use; unknown ids fail with `RoomNotFound`.
    async fn session(&self, room_id: &str) -> Result<SharedSession, ManagerError> {
        let existing = self.sessions.lock().get(room_id).cloned();
        if let Some(session) = existing {
            return Ok(session);
        }
        if !self.store.room_exists(room_id).await? {
            return Err(RoomError::RoomNotFound.into());
        }
        Ok(Arc::clone(
            self.sessions
                .lock()
                .entry(room_id.to_string())
                .or_default(),
        ))
    }

    /// Drop the room's in-memory session and stop its timer. The stored room
    /// is untouched; a later operation on it starts a fresh session.
    pub fn remove_session(&self, room_id: &str) -> bool {
        self.timers.interrupt_timer(room_id);
        self.sessions.lock().remove(room_id).is_some()
    }

    /// Drop the session of a room nobody is watching or working on. Rooms
    /// with a pending settle, a closed question or a running timer keep theirs.
    fn release_idle_session(&self, room_id: &str) -> bool {
        if self.broadcaster.subscriber_count(room_id) > 0 || self.timers.is_active(room_id) {
            return false;
        }
        let mut sessions = self.sessions.lock();
        let Some(shared) = sessions.get(room_id) else {
            return false;
        };
        // The map's own reference is the only one, so no operation holds it.
        if Arc::strong_count(shared) > 1 {
            return false;
        }
        let idle = shared
            .try_lock()
            .is_ok_and(|session| !session.starting && session.resolving.is_none());
        if idle {
            sessions.remove(room_id);
            tracing::debug!(room = room_id, "Released idle room session");
        }
        idle
    }

    async fn load(&self, room_id: &str) -> Result<Room, ManagerError> {
        Ok(self
            .store
            .find_room(room_id)
            .await?
            .ok_or(RoomError::RoomNotFound)?)
    }

    pub async fn create_room(
        &self,
        creator: &User,
        quiz_id: QuizId,
        settings: RoomSettings,
    ) -> Result<RoomId, ManagerError> {
        let quiz = self
            .store
            .find_quiz(quiz_id)
            .await?
            .ok_or(RoomError::QuizNotFound)?;
        if !quiz.public {
            return Err(RoomError::QuizNotPublic.into());
        }
        if quiz.questions.is_empty() {
            return Err(RoomError::Invalid("quiz has no questions".to_string()).into());
        }
        let settings = settings.validated(self.config.max_player_count)?;

        let room = self
            .insert_with_unique_id(NewRoom {
                id: RoomId::new(),
                quiz_id,
                creator_id: creator.id,
                player_count: settings.player_count,
                game_mode: settings.game_mode,
                difficulty: settings.difficulty.or(quiz.difficulty),
                time_limit: settings.time_limit,
                questions: quiz.questions,
            })
            .await?;
        for name in &settings.teams {
            self.store.create_team(&room.id, name).await?;
        }
        self.sessions
            .lock()
            .insert(room.id.clone(), SharedSession::default());

        tracing::info!(
            room = %room.id,
            quiz_id,
            creator = creator.id,
            mode = ?room.game_mode,
            capacity = room.player_count,
            teams = settings.teams.len(),
            "Room created"
        );
        Ok(room.id)
    }

    async fn insert_with_unique_id(&self, mut new_room: NewRoom) -> Result<Room, ManagerError> {
        for _ in 0..ROOM_ID_ATTEMPTS {
            new_room.id = generate_room_id(&mut rand::rng());
            if self.store.room_exists(&new_room.id).await? {
                continue;
            }
            match self.store.create_room(new_room.clone()).await {
                Ok(room) => return Ok(room),
                Err(StoreError::Conflict(_)) => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Err(StoreError::Conflict("no unused room id available".to_string()).into())
    }

    /// Seat `user` (or reconnect an existing member) and open a push
    /// subscription. The joiner receives `connectionEstablished` first, then
    /// a replay of launch events if the room already started; everyone then
    /// receives `playerJoined` (and `teams` in team rooms). A join that fills
    /// a scrum room launches it.
    pub async fn join_room(
        self: &Arc<Self>,
        room_id: &str,
        user: &User,
    ) -> Result<JoinedRoom, ManagerError> {
        let lock = self.session(room_id).await?;
        let mut session = lock.lock().await;
        let mut room = self.load(room_id).await?;

        let outcome = room.check_join(user.id)?;
        if let JoinOutcome::NewPlayer { .. } = outcome {
            let player = self.store.create_room_player(room_id, user).await?;
            room.players.push(player);
        }

        let (subscription, events) = self.broadcaster.subscribe_guarded(room_id);
        let me = subscription.id();
        self.broadcaster.send_to(
            room_id,
            me,
            RoomEvent::ConnectionEstablished {
                game_mode: room.game_mode,
            },
        );
        if room.launched && !session.starting {
            self.broadcaster.send_to(room_id, me, RoomEvent::GameStart);
            self.broadcaster.send_to(
                room_id,
                me,
                RoomEvent::QuizInfos {
                    question_count: room.question_count(),
                },
            );
            if room.state() == RoomState::Ended {
                self.broadcaster.send_to(
                    room_id,
                    me,
                    RoomEvent::GameEnd {
                        scores: room_scores(&room),
                    },
                );
            }
        }

        self.broadcaster.broadcast(
            room_id,
            &RoomEvent::PlayerJoined {
                players: room.player_names(),
            },
        );
        if room.game_mode == GameMode::Team {
            self.broadcaster.broadcast(
                room_id,
                &RoomEvent::Teams {
                    teams: room.team_rosters(),
                },
            );
        }

        match outcome {
            JoinOutcome::Rejoin => {
                tracing::debug!(room = room_id, user = user.id, "Player reconnected");
            },
            JoinOutcome::NewPlayer { auto_start } => {
                tracing::info!(
                    room = room_id,
                    user = user.id,
                    seated = room.players.len(),
                    capacity = room.player_count,
                    "Player joined"
                );
                if auto_start {
                    self.launch(&mut session, &room, StartKind::Implicit)
                        .await?;
                }
            },
        }

        Ok(JoinedRoom {
            subscription: RoomSubscription {
                guard: Some(subscription),
                manager: Arc::clone(self),
                room_id: room_id.to_string(),
            },
            events,
        })
    }

    /// Move a player into `team_name` and broadcast the updated roster.
    pub async fn join_team(
        &self,
        room_id: &str,
        user_id: UserId,
        team_name: &str,
    ) -> Result<Vec<TeamRoster>, ManagerError> {
        let lock = self.session(room_id).await?;
        let _session = lock.lock().await;
        let mut room = self.load(room_id).await?;

        let (player_id, team_id) = room.check_join_team(user_id, team_name)?;
        self.store
            .update_room_player(
                player_id,
                PlayerUpdate {
                    team_id: Some(team_id),
                    ..PlayerUpdate::default()
                },
            )
            .await?;
        if let Some(player) = room.players.iter_mut().find(|p| p.id == player_id) {
            player.team_id = Some(team_id);
        }

        let teams = room.team_rosters();
        self.broadcaster.broadcast(
            room_id,
            &RoomEvent::Teams {
                teams: teams.clone(),
            },
        );
        tracing::info!(room = room_id, user = user_id, team = team_name, "Player changed team");
        Ok(teams)
    }

    pub async fn team_roster(&self, room_id: &str) -> Result<Vec<TeamRoster>, ManagerError> {
        Ok(self.load(room_id).await?.team_rosters())
    }

    /// Explicit start by the room creator.
    pub async fn start_room(
        self: &Arc<Self>,
        room_id: &str,
        requester: UserId,
    ) -> Result<(), ManagerError> {
        let lock = self.session(room_id).await?;
        let mut session = lock.lock().await;
        let room = self.load(room_id).await?;
        self.launch(&mut session, &room, StartKind::Explicit { requester })
            .await
    }

    /// Persist `launched` now; broadcast `gameStart` and `quizInfos` after
    /// the launch settle delay.
    async fn launch(
        self: &Arc<Self>,
        session: &mut RoomSession,
        room: &Room,
        kind: StartKind,
    ) -> Result<(), ManagerError> {
        room.check_start(kind)?;
        if session.starting {
            return Err(RoomError::AlreadyLaunched.into());
        }
        self.store
            .update_room(
                &room.id,
                RoomUpdate {
                    launched: Some(true),
                    ..RoomUpdate::default()
                },
            )
            .await?;
        session.starting = true;
        tracing::info!(
            room = %room.id,
            players = room.players.len(),
            implicit = matches!(kind, StartKind::Implicit),
            "Room launched"
        );

        let manager = Arc::clone(self);
        let room_id = room.id.clone();
        let settle = self.config.launch_settle();
        tokio::spawn(async move {
            tokio::time::sleep(settle).await;
            if let Err(e) = manager.finish_launch(&room_id).await {
                tracing::warn!(room = %room_id, error = %e, "Launch continuation failed");
            }
        });
        Ok(())
    }

    async fn finish_launch(self: &Arc<Self>, room_id: &str) -> Result<(), ManagerError> {
        let lock = self.session(room_id).await?;
        let mut session = lock.lock().await;
        session.starting = false;
        let room = self.load(room_id).await?;

        self.broadcaster.broadcast(room_id, &RoomEvent::GameStart);
        self.broadcaster.broadcast(
            room_id,
            &RoomEvent::QuizInfos {
                question_count: room.question_count(),
            },
        );
        if room.game_mode == GameMode::Team && room.state() == RoomState::Launched {
            self.start_question_timer(&room);
        }
        Ok(())
    }

    fn start_question_timer(self: &Arc<Self>, room: &Room) {
        let manager = Arc::clone(self);
        let room_id = room.id.clone();
        let cursor = room.question_cursor;
        self.timers
            .start_timer(&room.id, room.question_timer_secs(), async move {
                if let Err(e) = manager.expire_question(&room_id, cursor).await {
                    tracing::warn!(room = %room_id, error = %e, "Timer expiry failed");
                }
            });
    }

    async fn expire_question(self: &Arc<Self>, room_id: &str, cursor: usize) -> Result<(), ManagerError> {
        let lock = self.session(room_id).await?;
        let mut session = lock.lock().await;
        let room = self.load(room_id).await?;
        if room.question_cursor != cursor || session.resolving.is_some() {
            return Ok(());
        }
        tracing::info!(room = room_id, cursor, "Question timed out");
        self.close_question(&mut session, room_id, cursor);
        Ok(())
    }

    /// Close `cursor` to further answers and schedule the advance.
    fn close_question(self: &Arc<Self>, session: &mut RoomSession, room_id: &str, cursor: usize) {
        session.resolving = Some(cursor);
        let manager = Arc::clone(self);
        let room_id = room_id.to_string();
        let settle = self.config.reveal_settle();
        tokio::spawn(async move {
            tokio::time::sleep(settle).await;
            if let Err(e) = manager.advance(&room_id, cursor).await {
                tracing::warn!(room = %room_id, error = %e, "Advance failed");
            }
        });
    }

    /// Move past `cursor`: bump the cursor, reset `answered`, then broadcast
    /// `nextQuestion` (restarting the countdown in team rooms) or `gameEnd`.
    async fn advance(self: &Arc<Self>, room_id: &str, cursor: usize) -> Result<(), ManagerError> {
        let lock = self.session(room_id).await?;
        let mut session = lock.lock().await;
        let mut room = self.load(room_id).await?;
        if room.question_cursor != cursor {
            tracing::debug!(room = room_id, cursor, "Question already advanced");
            return Ok(());
        }

        let next = cursor + 1;
        self.store
            .update_room(
                room_id,
                RoomUpdate {
                    question_cursor: Some(next),
                    ..RoomUpdate::default()
                },
            )
            .await?;
        self.store
            .update_many_room_players(
                room_id,
                PlayerUpdate {
                    answered: Some(false),
                    ..PlayerUpdate::default()
                },
            )
            .await?;
        session.resolving = None;
        room.question_cursor = next;
        room.players.iter_mut().for_each(|p| p.answered = false);

        if room.state() == RoomState::Ended {
            self.broadcaster.broadcast(
                room_id,
                &RoomEvent::GameEnd {
                    scores: room_scores(&room),
                },
            );
            tracing::info!(room = room_id, questions = room.question_count(), "Game ended");
            self.remove_session(room_id);
        } else {
            self.broadcaster.broadcast(
                room_id,
                &RoomEvent::NextQuestion {
                    question_cursor: next,
                },
            );
            if room.game_mode == GameMode::Team {
                self.start_question_timer(&room);
            }
            tracing::debug!(room = room_id, cursor = next, "Next question");
        }
        Ok(())
    }

    pub async fn current_question(&self, room_id: &str) -> Result<QuestionView, ManagerError> {
        let room = self.load(room_id).await?;
        let question = room.current_question()?;
        Ok(question.view(&mut rand::rng()))
    }

    /// Record one answer. Returns the correct answer whether or not the
    /// submission matched it.
    pub async fn submit_answer(
        self: &Arc<Self>,
        room_id: &str,
        user_id: UserId,
        answer: &str,
    ) -> Result<String, ManagerError> {
        let lock = self.session(room_id).await?;
        let mut session = lock.lock().await;
        let room = self.load(room_id).await?;
        if session.starting {
            return Err(RoomError::NotLaunched.into());
        }

        let resolution = resolve_answer(&room, user_id, answer)?;
        if session.resolving == Some(resolution.question_cursor) {
            return Err(RoomError::QuestionClosed.into());
        }
        self.store
            .update_room_player(
                resolution.player_id,
                PlayerUpdate {
                    answered: Some(true),
                    score: Some(resolution.new_score),
                    ..PlayerUpdate::default()
                },
            )
            .await?;
        tracing::debug!(
            room = room_id,
            user = user_id,
            cursor = resolution.question_cursor,
            correct = resolution.correct,
            "Answer recorded"
        );

        match resolution.advance {
            Advance::Stay => {
                self.broadcaster.broadcast(
                    room_id,
                    &RoomEvent::PlayerAnswered {
                        user: resolution.user_name.clone(),
                    },
                );
            },
            Advance::CorrectAnswerFound => {
                self.broadcaster.broadcast(
                    room_id,
                    &RoomEvent::CorrectAnswerFound {
                        user: resolution.user_name.clone(),
                        correct_answer: resolution.correct_answer.clone(),
                    },
                );
                tracing::info!(
                    room = room_id,
                    user = user_id,
                    cursor = resolution.question_cursor,
                    "Correct answer found"
                );
                self.close_question(&mut session, room_id, resolution.question_cursor);
            },
            Advance::AllAnswered => {
                if self.timers.interrupt_timer(room_id) {
                    tracing::debug!(room = room_id, "Timer interrupted, everyone answered");
                }
                tracing::info!(room = room_id, cursor = resolution.question_cursor, "All players answered");
                self.close_question(&mut session, room_id, resolution.question_cursor);
            },
        }

        Ok(resolution.correct_answer)
    }

    pub async fn room_scores(&self, room_id: &str) -> Result<RoomScores, ManagerError> {
        let room = self.load(room_id).await?;
        Ok(room_scores(&room))
    }
}
