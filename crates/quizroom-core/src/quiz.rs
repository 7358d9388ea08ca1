use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

pub type QuizId = u64;
pub type QuestionId = u64;

/// Timer duration used when neither the room nor the quiz carries a difficulty.
pub const DEFAULT_TIMER_SECS: u32 = 15;

/// Quiz difficulty. Drives the per-question countdown in team rooms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    /// Seconds allowed per question at this difficulty.
    pub fn timer_secs(self) -> u32 {
        match self {
            Self::Easy => 30,
            Self::Medium => 15,
            Self::Hard => 5,
        }
    }

    pub fn timer_secs_or_default(difficulty: Option<Self>) -> u32 {
        difficulty.map_or(DEFAULT_TIMER_SECS, Self::timer_secs)
    }
}

/// Media attached to a question.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    #[default]
    Text,
    Image,
    Audio,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: QuestionId,
    pub text: String,
    pub correct_answer: String,
    #[serde(default)]
    pub false_answer_1: Option<String>,
    #[serde(default)]
    pub false_answer_2: Option<String>,
    #[serde(default)]
    pub false_answer_3: Option<String>,
    /// True/false questions only offer `false_answer_1` alongside the correct one.
    #[serde(default)]
    pub true_false: bool,
    #[serde(rename = "type", default)]
    pub media_type: MediaType,
}

impl Question {
    /// Answer options in random order. The correct answer appears exactly
    /// once; absent slots and false answers that repeat it are dropped.
    pub fn answer_options<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<String> {
        let false_answers = if self.true_false {
            vec![self.false_answer_1.as_ref()]
        } else {
            vec![
                self.false_answer_1.as_ref(),
                self.false_answer_2.as_ref(),
                self.false_answer_3.as_ref(),
            ]
        };

        let mut options = Vec::with_capacity(false_answers.len() + 1);
        options.push(self.correct_answer.clone());
        options.extend(
            false_answers
                .into_iter()
                .flatten()
                .filter(|a| **a != self.correct_answer)
                .cloned(),
        );
        options.shuffle(rng);
        options
    }

    pub fn view<R: Rng + ?Sized>(&self, rng: &mut R) -> QuestionView {
        QuestionView {
            question: self.text.clone(),
            answers: self.answer_options(rng),
            media_type: self.media_type,
        }
    }
}

/// What a client sees of the current question.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionView {
    pub question: String,
    pub answers: Vec<String>,
    #[serde(rename = "type")]
    pub media_type: MediaType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quiz {
    pub id: QuizId,
    pub title: String,
    #[serde(default)]
    pub public: bool,
    #[serde(default)]
    pub difficulty: Option<Difficulty>,
    #[serde(default)]
    pub questions: Vec<Question>,
}
