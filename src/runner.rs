use std::{
    collections::HashMap,
    fmt,
    str::FromStr,
    sync::{Arc, Mutex, PoisonError},
};

use teloxide::{
    dispatching::dialogue::GetChatId,
    payloads::SendMessageSetters,
    prelude::Requester,
    types::{CallbackQuery, ChatId, Message, ReplyMarkup},
    Bot,
};
use tokio::sync::mpsc;
use tracing::instrument;
use uuid::Uuid;

use crate::{
    database::{
        connection::{IncrementCounter, RecordLead, RetreiveQuiz},
        quiz::{LinkKind, OptionId, Quiz},
    },
    keyboard::{action_keyboard, quizes_keyboard, yes_no_keyboard, TAKE_QUIZ},
    play::player::{self, Input, PlayConfig, SessionHandle},
    render::render_frames,
    state::QuizState,
    HandlerResult, UserDialogue,
};

/// Running sessions, one per chat.
#[derive(Debug, Default)]
pub struct Sessions {
    inner: Mutex<HashMap<ChatId, SessionHandle>>,
}

impl Sessions {
    pub fn start(&self, chat_id: ChatId, handle: SessionHandle) {
        let mut sessions = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        sessions.retain(|_, running| !running.is_finished());
        if let Some(previous) = sessions.insert(chat_id, handle) {
            previous.abort();
        }
    }

    /// `false` if the chat has no live session.
    pub fn send(&self, chat_id: ChatId, input: Input) -> bool {
        let mut sessions = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        match sessions.get(&chat_id) {
            Some(handle) if handle.send(input) => true,
            Some(_) => {
                sessions.remove(&chat_id);
                false
            }
            None => false,
        }
    }

    pub fn stop(&self, chat_id: ChatId) {
        let mut sessions = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(handle) = sessions.remove(&chat_id) {
            handle.abort();
        }
    }
}

/// Callback data carried by inline buttons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Callback {
    Select(OptionId),
    Dismiss,
    OpenLink(LinkKind),
    Retry,
}

impl fmt::Display for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Callback::Select(id) => write!(f, "opt:{id}"),
            Callback::Dismiss => f.write_str("next"),
            Callback::OpenLink(kind) => write!(f, "link:{}", kind.as_str()),
            Callback::Retry => f.write_str("retry"),
        }
    }
}

impl FromStr for Callback {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some(("opt", id)) => id.parse().map(Callback::Select).map_err(|e| e.to_string()),
            Some(("link", kind)) => kind.parse().map(Callback::OpenLink).map_err(|e| e.to_string()),
            None if s == "next" => Ok(Callback::Dismiss),
            None if s == "retry" => Ok(Callback::Retry),
            _ => Err(format!("unknown callback '{s}'")),
        }
    }
}

impl From<Callback> for Input {
    fn from(callback: Callback) -> Self {
        match callback {
            Callback::Select(id) => Input::Select(id),
            Callback::Dismiss => Input::Dismiss,
            Callback::OpenLink(kind) => Input::OpenLink(kind),
            Callback::Retry => Input::Retry,
        }
    }
}

#[instrument(level = "info", skip(bot, dialogue, connection))]
pub(crate) async fn choose_what_to_do<QuizRetriever: RetreiveQuiz>(
    bot: Bot,
    msg: Message,
    dialogue: UserDialogue,
    connection: Arc<QuizRetriever>,
) -> HandlerResult {
    match msg.text() {
        Some(TAKE_QUIZ) => {
            let quizes = connection.retreive_all_quizzes().await?;
            if quizes.is_empty() {
                bot.send_message(msg.chat.id, "No available quizes.").await?;
            } else {
                tracing::info!(chat = %msg.chat.id, "choosing a quiz");
                bot.send_message(msg.chat.id, "Please, choose available quiz:")
                    .reply_markup(quizes_keyboard(&quizes))
                    .await?;
                dialogue.update(QuizState::Selection).await?;
            }
        }
        other => {
            tracing::info!(chat = %msg.chat.id, "invalid message {:?}", other);
            bot.send_message(msg.chat.id, "Invalid input. Please try again.")
                .reply_markup(action_keyboard())
                .await?;
        }
    }

    Ok(())
}

#[instrument(level = "info", skip(bot, dialogue, connection))]
pub(crate) async fn selection<Retreiver: RetreiveQuiz>(
    bot: Bot,
    dialogue: UserDialogue,
    msg: Message,
    connection: Arc<Retreiver>,
) -> HandlerResult {
    let Some(title) = msg.text() else {
        bot.send_message(msg.chat.id, "Failed to retreive quiz: no input provided")
            .await?;
        return Ok(());
    };

    let quizes = connection.retreive_all_quizzes().await?;
    let found = match quizes.iter().find(|(_, t)| t == title) {
        Some((id, _)) => connection.retreive_quiz(*id).await?,
        None => None,
    };

    match found {
        Some(quiz) => {
            tracing::info!(chat = %msg.chat.id, quiz = %quiz.title(), "quiz selected");
            bot.send_message(msg.chat.id, format!("{quiz}\n\nAre you ready to begin? (Yes/No)"))
                .parse_mode(teloxide::types::ParseMode::Html)
                .reply_markup(yes_no_keyboard())
                .await?;
            dialogue
                .update(QuizState::ReadyToRun {
                    quiz: Arc::new(quiz),
                })
                .await?;
        }
        None => {
            tracing::info!(chat = %msg.chat.id, "quiz '{}' not found", title);
            bot.send_message(msg.chat.id, format!("Quiz with name '{}' not found.", title))
                .await?;
        }
    }

    Ok(())
}

#[instrument(level = "info", skip(bot, dialogue, quiz, store, sessions, config))]
pub(crate) async fn running_ready<Store>(
    bot: Bot,
    dialogue: UserDialogue,
    msg: Message,
    quiz: Arc<Quiz>,
    store: Arc<Store>,
    sessions: Arc<Sessions>,
    config: Arc<PlayConfig>,
) -> HandlerResult
where
    Store: RecordLead + IncrementCounter + Send + Sync + 'static,
{
    match msg.text() {
        Some("Yes") | Some("Yes✔️") => {
            bot.send_message(msg.chat.id, "Let's begin!")
                .reply_markup(ReplyMarkup::kb_remove())
                .await?;

            let (frames_tx, frames_rx) = mpsc::unbounded_channel();
            match player::spawn(Arc::clone(&quiz), store, (*config).clone(), frames_tx) {
                Ok(handle) => {
                    tokio::spawn(render_frames(bot.clone(), msg.chat.id, frames_rx));
                    sessions.start(msg.chat.id, handle);
                    dialogue
                        .update(QuizState::Playing {
                            quiz_id: *quiz.uuid(),
                        })
                        .await?;
                }
                Err(e) => {
                    tracing::error!(quiz = %quiz.title(), "quiz can't be played: {e}");
                    bot.send_message(msg.chat.id, format!("Sorry, this quiz can't be played: {e}"))
                        .reply_markup(action_keyboard())
                        .await?;
                    dialogue.update(QuizState::Start).await?;
                }
            }
        }
        Some("No") | Some("No❌") => {
            tracing::info!(chat = %msg.chat.id, quiz = %quiz.title(), "quits quiz");
            bot.send_message(msg.chat.id, "OK. Quitting quiz...").await?;
            dialogue.update(QuizState::Start).await?;
            bot.send_message(msg.chat.id, "What do you want to do now?")
                .reply_markup(action_keyboard())
                .await?;
        }
        _ => {
            bot.send_message(
                msg.chat.id,
                "Please, enter a valid answer <b>Yes</b> or <b>No</b>.",
            )
            .parse_mode(teloxide::types::ParseMode::Html)
            .await?;
        }
    }

    Ok(())
}

#[instrument(level = "debug", skip(bot, dialogue, sessions))]
pub(crate) async fn take_email(
    bot: Bot,
    dialogue: UserDialogue,
    msg: Message,
    quiz_id: Uuid,
    sessions: Arc<Sessions>,
) -> HandlerResult {
    let Some(text) = msg.text() else {
        return Ok(());
    };

    if !sessions.send(msg.chat.id, Input::SubmitEmail(text.to_owned())) {
        session_ended(&bot, &dialogue, msg.chat.id).await?;
    }

    Ok(())
}

#[instrument(level = "debug", skip(bot, dialogue, q, sessions))]
pub(crate) async fn take_callback(
    bot: Bot,
    dialogue: UserDialogue,
    q: CallbackQuery,
    quiz_id: Uuid,
    sessions: Arc<Sessions>,
) -> HandlerResult {
    bot.answer_callback_query(&q.id).await?;

    let Some(chat_id) = q.chat_id() else {
        return Ok(());
    };
    let callback = match q.data.as_deref().map(str::parse::<Callback>) {
        Some(Ok(callback)) => callback,
        Some(Err(e)) => {
            tracing::warn!(%chat_id, "bad callback data: {e}");
            return Ok(());
        }
        None => return Ok(()),
    };

    if matches!(callback, Callback::Select(_) | Callback::Dismiss) {
        if let Some(message) = &q.message {
            if let Err(e) = bot.edit_message_reply_markup(chat_id, message.id()).await {
                tracing::debug!(%chat_id, "keyboard already gone: {e}");
            }
        }
    }

    if !sessions.send(chat_id, callback.into()) {
        session_ended(&bot, &dialogue, chat_id).await?;
    }

    Ok(())
}

async fn session_ended(bot: &Bot, dialogue: &UserDialogue, chat_id: ChatId) -> HandlerResult {
    bot.send_message(chat_id, "This quiz has ended. What do you want to do now?")
        .reply_markup(action_keyboard())
        .await?;
    dialogue.update(QuizState::Start).await?;
    Ok(())
}
