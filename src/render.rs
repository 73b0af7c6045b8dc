//! Text and keyboards for every screen the bot shows.

use teloxide::types::{KeyboardButton, KeyboardMarkup};

use crate::auth::User;
use crate::catalog::Movie;
use crate::quiz::{Question, QuizSession};

pub const LOG_IN: &str = "Log in";
pub const REGISTER: &str = "Register";

pub const FILMS: &str = "🎬 Films";
pub const QUIZ: &str = "❓ Quiz";
pub const PROFILE: &str = "👤 Profile";
pub const LOG_OUT: &str = "🚪 Log out";

pub const BACK: &str = "⬅️ Back";
pub const PLAY_AGAIN: &str = "⏮️ Play again";
pub const MENU: &str = "🏠 Menu";

pub const LOADING_QUIZ: &str = "Loading some Ghibli magic... ✨";
pub const NO_QUESTIONS: &str = "Could not load the quiz questions. Try again later.";
pub const GHIBLI_FACT: &str = "💡 Did you know? Studio Ghibli was founded in 1985 by Hayao Miyazaki, Isao Takahata and Toshio Suzuki.";

const SCORE_BAR_CELLS: usize = 10;

pub fn auth_keyboard() -> KeyboardMarkup {
    KeyboardMarkup::new(vec![vec![
        KeyboardButton::new(LOG_IN),
        KeyboardButton::new(REGISTER),
    ]])
    .resize_keyboard(true)
}

pub fn menu_keyboard() -> KeyboardMarkup {
    KeyboardMarkup::new(vec![
        vec![KeyboardButton::new(FILMS), KeyboardButton::new(QUIZ)],
        vec![KeyboardButton::new(PROFILE), KeyboardButton::new(LOG_OUT)],
    ])
    .resize_keyboard(true)
}

/// One film per row, then a way back.
pub fn catalog_keyboard<'a>(titles: impl IntoIterator<Item = &'a str>) -> KeyboardMarkup {
    let mut rows: Vec<Vec<KeyboardButton>> = titles
        .into_iter()
        .map(|title| vec![KeyboardButton::new(title)])
        .collect();
    rows.push(vec![KeyboardButton::new(BACK)]);
    KeyboardMarkup::new(rows).resize_keyboard(true)
}

/// Options two by two, like the answer grid of the app.
pub fn options_keyboard(question: &Question) -> KeyboardMarkup {
    let mut rows: Vec<Vec<KeyboardButton>> = question
        .options
        .chunks(2)
        .map(|pair| pair.iter().map(KeyboardButton::new).collect())
        .collect();
    rows.push(vec![KeyboardButton::new(MENU)]);
    KeyboardMarkup::new(rows).resize_keyboard(true)
}

pub fn result_keyboard() -> KeyboardMarkup {
    KeyboardMarkup::new(vec![vec![
        KeyboardButton::new(PLAY_AGAIN),
        KeyboardButton::new(MENU),
    ]])
    .resize_keyboard(true)
}

pub fn film_card(movie: &Movie) -> String {
    let field = |value: &Option<String>| value.clone().unwrap_or_else(|| "—".to_string());
    let rating = movie
        .rt_score
        .map_or_else(|| "—".to_string(), |score| format!("{score}/100"));

    format!(
        "{}\n\nOriginal title: {}\nDirector: {}\nYear: {}\nRating: ⭐ {}\n\n{}",
        movie.title(),
        field(&movie.original_title),
        field(&movie.director),
        field(&movie.release_date),
        rating,
        movie.description.as_deref().unwrap_or_default(),
    )
}

pub fn question_text(session: &QuizSession, question: &Question) -> String {
    format!(
        "{}\nQuestion {}/{}\n\n{}",
        question.movie_title,
        session.index() + 1,
        session.total(),
        question.prompt
    )
}

/// Every option with the right one marked, and the pick marked if it was wrong.
pub fn answer_feedback(question: &Question, selected: &str) -> String {
    let verdict = if question.is_correct(selected) {
        "✅ Correct!"
    } else {
        "❌ Wrong!"
    };

    let lines: Vec<String> = question
        .options
        .iter()
        .map(|option| {
            let mark = if question.is_correct(option) {
                "✅"
            } else if option == selected {
                "❌"
            } else {
                "▫️"
            };
            format!("{mark} {option}")
        })
        .collect();

    format!("{verdict}\n\n{}", lines.join("\n"))
}

pub fn score_bar(score: usize, total: usize) -> String {
    let filled = if total == 0 {
        0
    } else {
        (score * SCORE_BAR_CELLS + total / 2) / total
    }
    .min(SCORE_BAR_CELLS);
    format!(
        "{}{}",
        "▓".repeat(filled),
        "░".repeat(SCORE_BAR_CELLS - filled)
    )
}

pub fn result_text(score: usize, total: usize) -> String {
    format!(
        "🏁 Final results!\n\nYou got {score} of {total} right.\n{}\n\n{GHIBLI_FACT}",
        score_bar(score, total)
    )
}

pub fn profile_text(user: &User) -> String {
    format!("👤 Profile\n\nEmail: {}\nUser id: {}", user.email, user.uid)
}
