//! Rule violations raised by the room state machine.

/// Coarse classification used by the HTTP layer to pick a status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Forbidden,
    Unauthorized,
    Invalid,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoomError {
    #[error("room not found")]
    RoomNotFound,

    #[error("quiz not found")]
    QuizNotFound,

    #[error("team not found")]
    TeamNotFound,

    #[error("player not found in this room")]
    PlayerNotFound,

    #[error("user not found")]
    UserNotFound,

    #[error("quiz is not published")]
    QuizNotPublic,

    #[error("room is full")]
    RoomFull,

    #[error("room is already launched")]
    AlreadyLaunched,

    #[error("room is not launched yet")]
    NotLaunched,

    #[error("only the room creator can start the room")]
    NotCreator,

    #[error("at least 2 players are required to start")]
    NotEnoughPlayers,

    #[error("every player must join a team before starting")]
    PlayersWithoutTeam,

    #[error("you already answered this question")]
    AlreadyAnswered,

    #[error("this question is already resolved")]
    QuestionClosed,

    #[error("player is already in this team")]
    AlreadyInTeam,

    #[error("no questions left in this quiz")]
    NoQuestionsLeft,

    #[error("{0}")]
    Invalid(String),
}

impl RoomError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::RoomNotFound
            | Self::QuizNotFound
            | Self::TeamNotFound
            | Self::PlayerNotFound
            | Self::NoQuestionsLeft => ErrorKind::NotFound,
            Self::UserNotFound => ErrorKind::Unauthorized,
            Self::QuizNotPublic
            | Self::RoomFull
            | Self::AlreadyLaunched
            | Self::NotLaunched
            | Self::NotCreator
            | Self::NotEnoughPlayers
            | Self::PlayersWithoutTeam
            | Self::AlreadyAnswered
            | Self::QuestionClosed
            | Self::AlreadyInTeam => ErrorKind::Forbidden,
            Self::Invalid(_) => ErrorKind::Invalid,
        }
    }
}
