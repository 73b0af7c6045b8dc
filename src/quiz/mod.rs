pub mod generator;
pub mod session;
pub mod timer;

pub use generator::generate_questions;
pub use session::{AdvanceTicket, Phase, QuizSession};
pub use timer::{AdvanceTimers, ChatLocks};

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionKind {
    Director,
    Year,
}

/// A multiple-choice question about one film.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Question {
    pub kind: QuestionKind,
    pub prompt: String,
    pub image: Option<String>,
    pub options: Vec<String>,
    pub correct_answer: String,
    pub movie_title: String,
}

impl Question {
    pub fn new(
        kind: QuestionKind,
        prompt: String,
        image: Option<String>,
        options: Vec<String>,
        correct_answer: String,
        movie_title: String,
    ) -> Self {
        Self {
            kind,
            prompt,
            image,
            options,
            correct_answer,
            movie_title,
        }
    }

    pub fn is_correct(&self, option: &str) -> bool {
        option == self.correct_answer
    }

    pub fn has_option(&self, option: &str) -> bool {
        self.options.iter().any(|o| o == option)
    }
}
