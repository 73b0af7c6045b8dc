use serde::{Deserialize, Serialize};

use crate::quiz::Question;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Phase {
    #[default]
    Loading,
    /// Loaded, but there was nothing to ask.
    NoQuestions,
    Active {
        index: usize,
        score: usize,
        selected: Option<String>,
    },
    Result {
        score: usize,
    },
}

/// Identifies the question an answer was given to. A ticket only advances the
/// session it came from, and only before a restart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdvanceTicket {
    pub round: u32,
    pub index: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerOutcome {
    pub correct: bool,
    pub correct_answer: String,
    pub ticket: AdvanceTicket,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AnswerError {
    #[error("no question is waiting for an answer")]
    NotActive,
    #[error("this question was already answered")]
    AlreadyAnswered,
    #[error("{0:?} is not one of the options")]
    UnknownOption(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("advance ticket {0:?} no longer matches the session")]
pub struct AdvanceError(pub AdvanceTicket);

/// Progress through one generated quiz.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizSession {
    questions: Vec<Question>,
    round: u32,
    phase: Phase,
}

impl QuizSession {
    pub fn loading() -> Self {
        Self::default()
    }

    pub fn new(questions: Vec<Question>) -> Self {
        let mut session = Self::loading();
        session.load(questions);
        session
    }

    pub fn load(&mut self, questions: Vec<Question>) {
        self.phase = if questions.is_empty() {
            Phase::NoQuestions
        } else {
            Self::first_question()
        };
        self.questions = questions;
    }

    fn first_question() -> Phase {
        Phase::Active {
            index: 0,
            score: 0,
            selected: None,
        }
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn total(&self) -> usize {
        self.questions.len()
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.phase, Phase::Loading)
    }

    pub fn show_results(&self) -> bool {
        matches!(self.phase, Phase::Result { .. })
    }

    /// Index of the question on screen; the last one once results are shown.
    pub fn index(&self) -> usize {
        match &self.phase {
            Phase::Active { index, .. } => *index,
            Phase::Result { .. } => self.total().saturating_sub(1),
            Phase::Loading | Phase::NoQuestions => 0,
        }
    }

    pub fn score(&self) -> usize {
        match &self.phase {
            Phase::Active { score, .. } | Phase::Result { score } => *score,
            Phase::Loading | Phase::NoQuestions => 0,
        }
    }

    pub fn selected(&self) -> Option<&str> {
        match &self.phase {
            Phase::Active { selected, .. } => selected.as_deref(),
            _ => None,
        }
    }

    pub fn current_question(&self) -> Option<&Question> {
        match &self.phase {
            Phase::Active { index, .. } => self.questions.get(*index),
            _ => None,
        }
    }

    /// The ticket of an answered question still waiting to be advanced past.
    pub fn pending_ticket(&self) -> Option<AdvanceTicket> {
        match &self.phase {
            Phase::Active {
                index,
                selected: Some(_),
                ..
            } => Some(AdvanceTicket {
                round: self.round,
                index: *index,
            }),
            _ => None,
        }
    }

    /// Records the pick for the current question. One answer per question: the
    /// next one is accepted only after [`QuizSession::advance`].
    pub fn answer(&mut self, option: &str) -> Result<AnswerOutcome, AnswerError> {
        let round = self.round;
        let Phase::Active {
            index,
            score,
            selected,
        } = &mut self.phase
        else {
            return Err(AnswerError::NotActive);
        };
        if selected.is_some() {
            return Err(AnswerError::AlreadyAnswered);
        }
        let question = self.questions.get(*index).ok_or(AnswerError::NotActive)?;
        if !question.has_option(option) {
            return Err(AnswerError::UnknownOption(option.to_string()));
        }

        *selected = Some(option.to_string());
        let correct = question.is_correct(option);
        if correct {
            *score += 1;
        }

        Ok(AnswerOutcome {
            correct,
            correct_answer: question.correct_answer.clone(),
            ticket: AdvanceTicket {
                round,
                index: *index,
            },
        })
    }

    /// Moves past an answered question, either to the next one or to the result.
    pub fn advance(&mut self, ticket: AdvanceTicket) -> Result<(), AdvanceError> {
        let (index, score) = match &self.phase {
            Phase::Active {
                index,
                score,
                selected: Some(_),
            } if ticket.round == self.round && ticket.index == *index => (*index, *score),
            _ => return Err(AdvanceError(ticket)),
        };

        self.phase = if index + 1 < self.total() {
            Phase::Active {
                index: index + 1,
                score,
                selected: None,
            }
        } else {
            Phase::Result { score }
        };
        Ok(())
    }

    /// Back to the first question with the same question set.
    pub fn restart(&mut self) {
        if self.questions.is_empty() {
            return;
        }
        self.round = self.round.wrapping_add(1);
        self.phase = Self::first_question();
    }
}
