use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Json;
use serde::{Deserialize, Serialize};

use quizroom_core::player::TeamRoster;
use quizroom_core::quiz::{QuestionView, QuizId};
use quizroom_core::room::{RoomId, RoomSettings};
use quizroom_core::scores::RoomScores;

use crate::auth::Identity;
use crate::error::AppError;
use crate::state::AppState;

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    payload
        .map(|Json(value)| value)
        .map_err(|e| AppError::BadRequest(e.body_text()))
}

#[derive(Debug, Serialize)]
pub struct CreateRoomResponse {
    pub id: RoomId,
}

/// POST /api/v1/quiz/{quiz_id}/room: open a room on a public quiz.
pub async fn create_room(
    State(state): State<AppState>,
    Path(quiz_id): Path<String>,
    Identity(user): Identity,
    payload: Result<Json<RoomSettings>, JsonRejection>,
) -> Result<(StatusCode, Json<CreateRoomResponse>), AppError> {
    let quiz_id: QuizId = quiz_id
        .parse()
        .map_err(|_| AppError::BadRequest(format!("invalid quiz id: {quiz_id}")))?;
    let settings = body(payload)?;
    let id = state.rooms.create_room(&user, quiz_id, settings).await?;
    Ok((StatusCode::CREATED, Json(CreateRoomResponse { id })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinTeamBody {
    pub team_name: String,
}

#[derive(Debug, Serialize)]
pub struct TeamsResponse {
    pub teams: Vec<TeamRoster>,
}

/// POST /api/v1/room/{room_id}/team: move the caller into a team.
pub async fn join_team(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    Identity(user): Identity,
    payload: Result<Json<JoinTeamBody>, JsonRejection>,
) -> Result<Json<TeamsResponse>, AppError> {
    let JoinTeamBody { team_name } = body(payload)?;
    let teams = state
        .rooms
        .join_team(&room_id, user.id, team_name.trim())
        .await?;
    Ok(Json(TeamsResponse { teams }))
}

/// GET /api/v1/room/{room_id}/teams
pub async fn teams(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> Result<Json<TeamsResponse>, AppError> {
    let teams = state.rooms.team_roster(&room_id).await?;
    Ok(Json(TeamsResponse { teams }))
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

/// POST /api/v1/room/{room_id}/start: creator-only launch.
pub async fn start_room(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    Identity(user): Identity,
) -> Result<Json<MessageResponse>, AppError> {
    state.rooms.start_room(&room_id, user.id).await?;
    Ok(Json(MessageResponse {
        message: "room started".to_string(),
    }))
}

/// GET /api/v1/room/{room_id}/question
pub async fn current_question(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> Result<Json<QuestionView>, AppError> {
    Ok(Json(state.rooms.current_question(&room_id).await?))
}

#[derive(Debug, Deserialize)]
pub struct AnswerBody {
    pub answer: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerResponse {
    pub correct_answer: String,
}

/// POST /api/v1/room/{room_id}/answer: answer the current question.
pub async fn submit_answer(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    Identity(user): Identity,
    payload: Result<Json<AnswerBody>, JsonRejection>,
) -> Result<Json<AnswerResponse>, AppError> {
    let AnswerBody { answer } = body(payload)?;
    let correct_answer = state
        .rooms
        .submit_answer(&room_id, user.id, &answer)
        .await?;
    Ok(Json(AnswerResponse { correct_answer }))
}

/// GET /api/v1/room/{room_id}/scores
pub async fn room_scores(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> Result<Json<RoomScores>, AppError> {
    Ok(Json(state.rooms.room_scores(&room_id).await?))
}
