mod auth;
mod catalog;
mod config;
mod quiz;
mod render;

use std::sync::Arc;
use std::time::Duration;

use auth::{AuthSessions, FirebaseAuth, LogObserver};
use catalog::{CatalogError, MovieCatalog};
use config::Config;
use dotenv::dotenv;
use quiz::session::AnswerError;
use quiz::{AdvanceTicket, AdvanceTimers, ChatLocks, Phase, QuizSession};
use teloxide::{
    dispatching::dialogue::{serializer::Json, ErasedStorage, SqliteStorage, Storage},
    prelude::*,
    types::{InputFile, KeyboardRemove},
};

type QuizDialogue = Dialogue<State, ErasedStorage<State>>;
type HandlerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;
type DialogueStorage = Arc<ErasedStorage<State>>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum AuthMode {
    LogIn,
    Register,
}

/// A catalog entry kept in the dialogue so a tapped title maps back to its id.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct FilmEntry {
    pub id: String,
    pub title: String,
}

#[derive(Clone, Default, serde::Serialize, serde::Deserialize)]
pub enum State {
    #[default]
    Start,
    ReceiveAuthChoice,
    ReceiveEmail {
        mode: AuthMode,
    },
    ReceivePassword {
        mode: AuthMode,
        email: String,
    },
    Menu,
    Catalog {
        films: Vec<FilmEntry>,
    },
    Quiz {
        session: QuizSession,
    },
}

#[tokio::main]
async fn main() {
    dotenv().ok();
    pretty_env_logger::init();
    log::info!("Starting Ghibli quiz bot...");

    let config = match Config::from_env() {
        Ok(config) => Arc::new(config),
        Err(err) => {
            log::error!("{err}");
            std::process::exit(1);
        }
    };

    let bot = Bot::from_env();

    log::info!("Opening dialogue storage at {}", config.dialogue_db);
    let storage: DialogueStorage = match SqliteStorage::open(&config.dialogue_db, Json).await {
        Ok(storage) => storage.erase(),
        Err(err) => {
            log::error!("Failed to open dialogue storage: {err}");
            std::process::exit(1);
        }
    };

    let catalog = Arc::new(MovieCatalog::new(config.ghibli_api_base.clone()));
    let identity = Arc::new(FirebaseAuth::new(
        config.firebase_auth_endpoint.clone(),
        config.firebase_api_key.clone(),
    ));

    let timers = Arc::new(AdvanceTimers::new());
    let chat_locks = Arc::new(ChatLocks::new());
    let sessions = Arc::new(AuthSessions::new());
    let subscriptions = [
        sessions.subscribe(Arc::new(LogObserver)),
        sessions.subscribe(timers.clone()),
    ];

    // Two surfaces: chats that are not signed in only ever reach the auth steps.
    let handler = Update::filter_message()
        .enter_dialogue::<Message, ErasedStorage<State>, State>()
        .branch(
            dptree::filter(|sessions: Arc<AuthSessions>, msg: Message| {
                !sessions.is_signed_in(msg.chat.id)
            })
            .branch(dptree::case![State::ReceiveAuthChoice].endpoint(receive_auth_choice))
            .branch(dptree::case![State::ReceiveEmail { mode }].endpoint(receive_email))
            .branch(
                dptree::case![State::ReceivePassword { mode, email }].endpoint(receive_password),
            )
            .branch(dptree::endpoint(start)),
        )
        .branch(dptree::case![State::Catalog { films }].endpoint(catalog_choice))
        .branch(dptree::case![State::Quiz { session }].endpoint(quiz_answer))
        .branch(dptree::endpoint(menu_choice));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![
            storage,
            config,
            catalog,
            identity,
            timers,
            chat_locks,
            sessions.clone()
        ])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    // Lets go of the timer registry so its pending advances get aborted.
    for id in subscriptions {
        sessions.unsubscribe(id);
    }
    log::info!("Ghibli quiz bot stopped");
}

const GREETING_TEXT: &str = "Hi! I'm the Studio Ghibli bot. Browse the films or test yourself with a quiz. Log in or create an account to start.";
async fn start(bot: Bot, dialogue: QuizDialogue, msg: Message) -> HandlerResult {
    bot.send_message(msg.chat.id, GREETING_TEXT)
        .reply_markup(render::auth_keyboard())
        .await?;

    dialogue.update(State::ReceiveAuthChoice).await?;
    Ok(())
}

async fn receive_auth_choice(bot: Bot, dialogue: QuizDialogue, msg: Message) -> HandlerResult {
    let mode = match msg.text() {
        Some(render::LOG_IN) => AuthMode::LogIn,
        Some(render::REGISTER) => AuthMode::Register,
        _ => {
            bot.send_message(msg.chat.id, "Please choose one of the options")
                .reply_markup(render::auth_keyboard())
                .await?;
            return Ok(());
        }
    };

    bot.send_message(msg.chat.id, "What is your email?")
        .reply_markup(KeyboardRemove::new())
        .await?;
    dialogue.update(State::ReceiveEmail { mode }).await?;
    Ok(())
}

async fn receive_email(
    bot: Bot,
    dialogue: QuizDialogue,
    mode: AuthMode,
    msg: Message,
) -> HandlerResult {
    let Some(email) = msg.text().map(str::trim).filter(|text| !text.is_empty()) else {
        bot.send_message(msg.chat.id, "Please type your email (as text)")
            .await?;
        return Ok(());
    };

    let prompt = match mode {
        AuthMode::LogIn => "Now your password.",
        AuthMode::Register => "Now pick a password (at least 6 characters).",
    };
    bot.send_message(msg.chat.id, prompt).await?;

    dialogue
        .update(State::ReceivePassword {
            mode,
            email: email.to_string(),
        })
        .await?;
    Ok(())
}

async fn receive_password(
    bot: Bot,
    dialogue: QuizDialogue,
    (mode, email): (AuthMode, String),
    msg: Message,
    identity: Arc<FirebaseAuth>,
    sessions: Arc<AuthSessions>,
) -> HandlerResult {
    let Some(password) = msg.text() else {
        bot.send_message(msg.chat.id, "Please type your password (as text)")
            .await?;
        return Ok(());
    };

    // Best effort: keep the password out of the chat history.
    if let Err(err) = bot.delete_message(msg.chat.id, msg.id).await {
        log::debug!("Could not delete password message in chat {}: {err}", msg.chat.id.0);
    }

    let result = match mode {
        AuthMode::LogIn => identity.sign_in(&email, password).await,
        AuthMode::Register => identity.sign_up(&email, password).await,
    };

    match result {
        Ok(user) => {
            let greeting = format!("Welcome, {}!", user.email);
            sessions.sign_in(msg.chat.id, user);
            bot.send_message(msg.chat.id, greeting)
                .reply_markup(render::menu_keyboard())
                .await?;
            dialogue.update(State::Menu).await?;
        }
        Err(err) => {
            log::warn!("{mode:?} failed for chat {}: {err}", msg.chat.id.0);
            bot.send_message(msg.chat.id, err.user_message())
                .reply_markup(render::auth_keyboard())
                .await?;
            dialogue.update(State::ReceiveAuthChoice).await?;
        }
    }
    Ok(())
}

async fn show_menu(bot: &Bot, dialogue: &QuizDialogue) -> HandlerResult {
    bot.send_message(dialogue.chat_id(), "What would you like to do?")
        .reply_markup(render::menu_keyboard())
        .await?;
    dialogue.update(State::Menu).await?;
    Ok(())
}

async fn menu_choice(
    bot: Bot,
    dialogue: QuizDialogue,
    msg: Message,
    catalog: Arc<MovieCatalog>,
    sessions: Arc<AuthSessions>,
) -> HandlerResult {
    match msg.text() {
        Some(render::FILMS) => show_catalog(&bot, &dialogue, &catalog).await,
        Some(render::QUIZ) => start_quiz(&bot, &dialogue, &catalog).await,
        Some(render::PROFILE) => {
            let text = match sessions.current(msg.chat.id).user() {
                Some(user) => render::profile_text(user),
                None => "You are not signed in.".to_string(),
            };
            bot.send_message(msg.chat.id, text)
                .reply_markup(render::menu_keyboard())
                .await?;
            dialogue.update(State::Menu).await?;
            Ok(())
        }
        Some(render::LOG_OUT) => {
            sessions.sign_out(msg.chat.id);
            bot.send_message(msg.chat.id, "Signed out. See you soon!")
                .reply_markup(render::auth_keyboard())
                .await?;
            dialogue.update(State::ReceiveAuthChoice).await?;
            Ok(())
        }
        _ => show_menu(&bot, &dialogue).await,
    }
}

async fn show_catalog(bot: &Bot, dialogue: &QuizDialogue, catalog: &MovieCatalog) -> HandlerResult {
    let chat = dialogue.chat_id();
    let movies = match catalog.list().await {
        Ok(movies) => movies,
        Err(err) => {
            log::error!("Error fetching films: {err}");
            bot.send_message(chat, "Could not load the films. Try again later.")
                .reply_markup(render::menu_keyboard())
                .await?;
            return Ok(());
        }
    };

    if movies.is_empty() {
        bot.send_message(chat, "The catalog is empty right now.")
            .reply_markup(render::menu_keyboard())
            .await?;
        return Ok(());
    }

    let films: Vec<FilmEntry> = movies
        .iter()
        .map(|movie| FilmEntry {
            id: movie.id.clone(),
            title: movie.title().to_string(),
        })
        .collect();

    bot.send_message(chat, "Studio Ghibli films")
        .reply_markup(render::catalog_keyboard(
            films.iter().map(|film| film.title.as_str()),
        ))
        .await?;
    dialogue.update(State::Catalog { films }).await?;
    Ok(())
}

async fn catalog_choice(
    bot: Bot,
    dialogue: QuizDialogue,
    films: Vec<FilmEntry>,
    msg: Message,
    catalog: Arc<MovieCatalog>,
) -> HandlerResult {
    let Some(text) = msg.text() else {
        bot.send_message(msg.chat.id, "Please pick a film from the list")
            .await?;
        return Ok(());
    };
    if text == render::BACK {
        return show_menu(&bot, &dialogue).await;
    }

    match films.iter().find(|film| film.title == text) {
        Some(film) => show_film(&bot, msg.chat.id, &catalog, &film.id).await,
        None => {
            bot.send_message(msg.chat.id, "Please pick a film from the list")
                .await?;
            Ok(())
        }
    }
}

async fn show_film(bot: &Bot, chat: ChatId, catalog: &MovieCatalog, id: &str) -> HandlerResult {
    let movie = match catalog.get(id).await {
        Ok(movie) => movie,
        Err(CatalogError::NotFound(_)) => {
            bot.send_message(chat, "Film not found").await?;
            return Ok(());
        }
        Err(err) => {
            log::error!("Error fetching film {id}: {err}");
            bot.send_message(chat, "Could not load this film. Try again later.")
                .await?;
            return Ok(());
        }
    };

    if let Some(url) = movie.image().and_then(|image| reqwest::Url::parse(image).ok()) {
        // A poster Telegram cannot fetch should not hide the rest of the card.
        if let Err(err) = bot.send_photo(chat, InputFile::url(url)).await {
            log::warn!("Could not send poster of film {id}: {err}");
        }
    }
    bot.send_message(chat, render::film_card(&movie)).await?;
    Ok(())
}

async fn start_quiz(bot: &Bot, dialogue: &QuizDialogue, catalog: &MovieCatalog) -> HandlerResult {
    let chat = dialogue.chat_id();
    dialogue
        .update(State::Quiz {
            session: QuizSession::loading(),
        })
        .await?;
    bot.send_message(chat, render::LOADING_QUIZ)
        .reply_markup(KeyboardRemove::new())
        .await?;

    let movies = catalog.list().await.unwrap_or_else(|err| {
        log::error!("Error fetching films for the quiz: {err}");
        Vec::new()
    });
    let questions = quiz::generate_questions(&movies, &mut rand::thread_rng());

    let mut session = QuizSession::loading();
    session.load(questions);
    if *session.phase() == Phase::NoQuestions {
        bot.send_message(chat, render::NO_QUESTIONS)
            .reply_markup(render::menu_keyboard())
            .await?;
        dialogue.update(State::Menu).await?;
        return Ok(());
    }

    dialogue
        .update(State::Quiz {
            session: session.clone(),
        })
        .await?;
    show_quiz_screen(bot, chat, &session).await
}

async fn quiz_answer(
    bot: Bot,
    dialogue: QuizDialogue,
    msg: Message,
    timers: Arc<AdvanceTimers>,
    chat_locks: Arc<ChatLocks>,
    config: Arc<Config>,
) -> HandlerResult {
    let chat = msg.chat.id;
    let Some(text) = msg.text() else {
        bot.send_message(chat, "Please pick one of the options")
            .await?;
        return Ok(());
    };

    // A delayed advance may have rewritten the session since this update was
    // routed; only the copy read under the chat lock is current.
    let _guard = chat_locks.lock(chat).await;
    let Some(State::Quiz { mut session }) = dialogue.get().await? else {
        return show_menu(&bot, &dialogue).await;
    };

    if text == render::MENU {
        timers.cancel(chat);
        return show_menu(&bot, &dialogue).await;
    }
    if text == render::PLAY_AGAIN && !session.is_loading() {
        timers.cancel(chat);
        session.restart();
        dialogue
            .update(State::Quiz {
                session: session.clone(),
            })
            .await?;
        return show_quiz_screen(&bot, chat, &session).await;
    }

    match session.phase() {
        // `start_quiz` replaces `Loading` before it returns, so a stored one
        // means that load was cut off, e.g. by a restart of the bot.
        Phase::Loading | Phase::NoQuestions => {
            log::debug!("Chat {} has no quiz in progress", chat.0);
            return show_menu(&bot, &dialogue).await;
        }
        Phase::Result { .. } => return show_quiz_screen(&bot, chat, &session).await,
        Phase::Active { .. } => {}
    }

    let Some(question) = session.current_question().cloned() else {
        return show_menu(&bot, &dialogue).await;
    };

    match session.answer(text) {
        Ok(outcome) => {
            dialogue
                .update(State::Quiz {
                    session: session.clone(),
                })
                .await?;
            bot.send_message(chat, render::answer_feedback(&question, text))
                .await?;
            schedule_advance(
                bot.clone(),
                dialogue.clone(),
                &timers,
                chat_locks.clone(),
                config.advance_delay,
                outcome.ticket,
            );
        }
        Err(AnswerError::AlreadyAnswered) => {
            bot.send_message(chat, "Hold on, the next question is on its way")
                .await?;
            // The stored answer outlived its timer, e.g. across a bot restart.
            if !timers.is_pending(chat) {
                if let Some(ticket) = session.pending_ticket() {
                    log::info!("Rescheduling a lost quiz advance in chat {}", chat.0);
                    schedule_advance(
                        bot.clone(),
                        dialogue.clone(),
                        &timers,
                        chat_locks.clone(),
                        config.advance_delay,
                        ticket,
                    );
                }
            }
        }
        Err(AnswerError::UnknownOption(_)) => {
            bot.send_message(chat, "Please pick one of the options")
                .reply_markup(render::options_keyboard(&question))
                .await?;
        }
        Err(AnswerError::NotActive) => return show_menu(&bot, &dialogue).await,
    }
    Ok(())
}

fn schedule_advance(
    bot: Bot,
    dialogue: QuizDialogue,
    timers: &AdvanceTimers,
    chat_locks: Arc<ChatLocks>,
    delay: Duration,
    ticket: AdvanceTicket,
) {
    let chat = dialogue.chat_id();
    timers.schedule(chat, delay, async move {
        if let Err(err) = advance_quiz(bot, dialogue, &chat_locks, ticket).await {
            log::error!("Failed to advance the quiz in chat {}: {err}", chat.0);
        }
    });
}

/// Runs when the answer delay is over. The chat may have moved on meanwhile,
/// so the stored session decides whether the ticket still applies.
async fn advance_quiz(
    bot: Bot,
    dialogue: QuizDialogue,
    chat_locks: &ChatLocks,
    ticket: AdvanceTicket,
) -> HandlerResult {
    let chat = dialogue.chat_id();
    let _guard = chat_locks.lock(chat).await;
    let Some(State::Quiz { mut session }) = dialogue.get().await? else {
        log::debug!("Chat {} left the quiz before it advanced", chat.0);
        return Ok(());
    };
    if let Err(err) = session.advance(ticket) {
        log::debug!("Ignoring advance in chat {}: {err}", chat.0);
        return Ok(());
    }

    dialogue
        .update(State::Quiz {
            session: session.clone(),
        })
        .await?;
    show_quiz_screen(&bot, chat, &session).await
}

async fn show_quiz_screen(bot: &Bot, chat: ChatId, session: &QuizSession) -> HandlerResult {
    match session.phase() {
        Phase::Active { .. } => {
            let Some(question) = session.current_question() else {
                return Ok(());
            };
            let text = render::question_text(session, question);
            let image = question
                .image
                .as_deref()
                .and_then(|image| reqwest::Url::parse(image).ok());

            if let Some(url) = image {
                let sent = bot
                    .send_photo(chat, InputFile::url(url))
                    .caption(text.clone())
                    .reply_markup(render::options_keyboard(question))
                    .await;
                match sent {
                    Ok(_) => return Ok(()),
                    Err(err) => log::warn!("Could not send question image: {err}"),
                }
            }
            bot.send_message(chat, text)
                .reply_markup(render::options_keyboard(question))
                .await?;
        }
        Phase::Result { score } => {
            bot.send_message(chat, render::result_text(*score, session.total()))
                .reply_markup(render::result_keyboard())
                .await?;
        }
        Phase::Loading => {
            bot.send_message(chat, render::LOADING_QUIZ).await?;
        }
        Phase::NoQuestions => {
            bot.send_message(chat, render::NO_QUESTIONS)
                .reply_markup(render::menu_keyboard())
                .await?;
        }
    }
    Ok(())
}
