pub mod answer;
pub mod error;
pub mod events;
pub mod player;
pub mod quiz;
pub mod room;
pub mod scores;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers {
    use crate::player::{RoomPlayer, RoomPlayerId, Team, User, UserId};
    use crate::quiz::{MediaType, Question, QuestionId, Quiz};
    use crate::room::{GameMode, Room};

    /// User id of the creator of rooms built by [`make_room`].
    pub const CREATOR_ID: UserId = 100;

    /// Question `n` (1-based) answers `A{n}` and offers three false answers.
    pub fn make_question(n: usize) -> Question {
        Question {
            id: n as QuestionId,
            text: format!("Question {n}?"),
            correct_answer: format!("A{n}"),
            false_answer_1: Some(format!("B{n}")),
            false_answer_2: Some(format!("C{n}")),
            false_answer_3: Some(format!("D{n}")),
            true_false: false,
            media_type: MediaType::Text,
        }
    }

    /// A public quiz with `question_count` questions built by [`make_question`].
    pub fn make_quiz(id: u64, question_count: usize) -> Quiz {
        Quiz {
            id,
            title: format!("Quiz {id}"),
            public: true,
            difficulty: None,
            questions: (1..=question_count).map(make_question).collect(),
        }
    }

    pub fn make_user(id: UserId, user_name: &str) -> User {
        User {
            id,
            user_name: user_name.to_string(),
        }
    }

    /// An unlaunched room with no players. Team rooms get teams "Red" and
    /// "Blue", in that order.
    pub fn make_room(mode: GameMode, question_count: usize, player_count: u32) -> Room {
        let id = "brave-otter-sings".to_string();
        let teams = match mode {
            GameMode::Scrum => vec![],
            GameMode::Team => ["Red", "Blue"]
                .iter()
                .enumerate()
                .map(|(i, name)| Team {
                    id: i as u64 + 1,
                    room_id: id.clone(),
                    name: name.to_string(),
                })
                .collect(),
        };
        Room {
            quiz_id: 1,
            creator_id: CREATOR_ID,
            player_count,
            game_mode: mode,
            difficulty: None,
            time_limit: None,
            launched: false,
            question_cursor: 0,
            questions: (1..=question_count).map(make_question).collect(),
            players: vec![],
            teams,
            id,
        }
    }

    /// Seat `user_id` in `room` with no team and a zero score.
    pub fn seat(room: &mut Room, user_id: UserId, user_name: &str) {
        let id = room.players.len() as RoomPlayerId + 1;
        room.players.push(RoomPlayer {
            id,
            user_id,
            room_id: room.id.clone(),
            user_name: user_name.to_string(),
            answered: false,
            score: 0,
            team_id: None,
        });
    }
}
