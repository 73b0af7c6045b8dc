use rand::seq::SliceRandom;
use rand::Rng;

use crate::catalog::Movie;
use crate::quiz::{Question, QuestionKind};

/// Only the head of the catalog is quizzed.
pub const QUIZ_MOVIES: usize = 5;

pub const DIRECTOR_DISTRACTORS: [&str; 3] = ["Hayao Miyazaki", "Isao Takahata", "Gorō Miyazaki"];

/// Wrong years are the release year shifted by these amounts.
pub const YEAR_OFFSETS: [i32; 3] = [2, -3, 5];

/// Builds the quiz for the first [`QUIZ_MOVIES`] films: a director question
/// followed by a year question per film, in catalog order.
///
/// A film without a director or a readable release year is skipped whole, as
/// is one whose year is too close to the `i32` bounds to shift. The window is
/// not refilled from further down the list.
pub fn generate_questions<R: Rng + ?Sized>(movies: &[Movie], rng: &mut R) -> Vec<Question> {
    let mut questions = Vec::with_capacity(QUIZ_MOVIES * 2);

    for movie in movies.iter().take(QUIZ_MOVIES) {
        match (director_question(movie, rng), year_question(movie, rng)) {
            (Some(director), Some(year)) => {
                questions.push(director);
                questions.push(year);
            }
            _ => log::warn!(
                "Skipping film {} ({}) in the quiz: no usable director or release year",
                movie.id,
                movie.title()
            ),
        }
    }

    questions
}

pub fn director_question<R: Rng + ?Sized>(movie: &Movie, rng: &mut R) -> Option<Question> {
    let director = movie.director()?.to_string();

    // A director equal to one of the distractors shows up twice; that is kept.
    let mut options = Vec::with_capacity(DIRECTOR_DISTRACTORS.len() + 1);
    options.push(director.clone());
    options.extend(DIRECTOR_DISTRACTORS.iter().map(|name| name.to_string()));
    options.shuffle(rng);

    Some(Question::new(
        QuestionKind::Director,
        format!("Who directed \"{}\"?", movie.title()),
        movie.image().map(str::to_string),
        options,
        director,
        movie.title().to_string(),
    ))
}

pub fn year_question<R: Rng + ?Sized>(movie: &Movie, rng: &mut R) -> Option<Question> {
    let year = movie.release_year()?;

    let mut options = Vec::with_capacity(YEAR_OFFSETS.len() + 1);
    options.push(year.to_string());
    for offset in YEAR_OFFSETS {
        options.push(year.checked_add(offset)?.to_string());
    }
    options.shuffle(rng);

    Some(Question::new(
        QuestionKind::Year,
        format!("In what year was \"{}\" released?", movie.title()),
        movie.image().map(str::to_string),
        options,
        year.to_string(),
        movie.title().to_string(),
    ))
}
