//! Answer resolution: validates one submission and decides whether the room
//! moves on to the next question.

use crate::error::RoomError;
use crate::player::{RoomPlayerId, UserId};
use crate::room::{GameMode, Room, RoomState};

/// Whether an accepted answer closes the current question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    /// Keep waiting for more answers (or the timer).
    Stay,
    /// Scrum only: this was the first correct answer.
    CorrectAnswerFound,
    /// Every seated player has now answered.
    AllAnswered,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub player_id: RoomPlayerId,
    pub user_name: String,
    pub correct: bool,
    pub new_score: u32,
    pub correct_answer: String,
    /// Cursor of the question that was answered.
    pub question_cursor: usize,
    pub advance: Advance,
}

/// Check the preconditions for `user_id` answering `answer`, in order:
/// launched, seated, not yet answered, cursor in bounds. Matching is exact
/// and case-sensitive.
pub fn resolve_answer(room: &Room, user_id: UserId, answer: &str) -> Result<Resolution, RoomError> {
    if room.state() == RoomState::Lobby {
        return Err(RoomError::NotLaunched);
    }
    let player = room.player(user_id).ok_or(RoomError::PlayerNotFound)?;
    if player.answered {
        return Err(RoomError::AlreadyAnswered);
    }
    let question = room.current_question()?;

    let correct = answer == question.correct_answer;
    let new_score = if correct {
        player.score + 1
    } else {
        player.score
    };

    let all_answered = room
        .players
        .iter()
        .all(|p| p.answered || p.id == player.id);

    let advance = match room.game_mode {
        GameMode::Scrum if correct => Advance::CorrectAnswerFound,
        _ if all_answered => Advance::AllAnswered,
        _ => Advance::Stay,
    };

    Ok(Resolution {
        player_id: player.id,
        user_name: player.user_name.clone(),
        correct,
        new_score,
        correct_answer: question.correct_answer.clone(),
        question_cursor: room.question_cursor,
        advance,
    })
}
