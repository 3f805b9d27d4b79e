use teloxide::{
    payloads::{SendMessageSetters, SendPhotoSetters},
    prelude::Requester,
    types::{ChatAction, ChatId, InputFile, ParseMode},
    utils::html::escape,
    Bot, RequestError,
};
use tokio::sync::mpsc;
use url::Url;

use crate::{
    database::quiz::{Link, LinkKind},
    keyboard::{choices_keyboard, next_keyboard, result_keyboard},
    play::{
        adapter::Frame,
        resolver::ComputedResult,
        share::ShareLinks,
    },
};

/// Sends every frame of one session to `chat_id` until the session drops
/// its end of the channel.
pub(crate) async fn render_frames(bot: Bot, chat_id: ChatId, mut frames: mpsc::UnboundedReceiver<Frame>) {
    while let Some(frame) = frames.recv().await {
        if let Err(e) = render(&bot, chat_id, frame).await {
            tracing::warn!(%chat_id, "failed to render frame: {e}");
        }
    }
    tracing::debug!(%chat_id, "renderer finished");
}

async fn render(bot: &Bot, chat_id: ChatId, frame: Frame) -> Result<(), RequestError> {
    match frame {
        Frame::Typing => {
            bot.send_chat_action(chat_id, ChatAction::Typing).await?;
        }
        Frame::Greeting {
            title,
            description,
            color,
            image_url,
        } => {
            let text = greeting_text(&title, &description, color.as_deref());
            match image_url.as_deref().map(Url::parse) {
                Some(Ok(url)) => {
                    bot.send_photo(chat_id, InputFile::url(url))
                        .caption(text)
                        .parse_mode(ParseMode::Html)
                        .await?;
                }
                other => {
                    if let Some(Err(e)) = other {
                        tracing::debug!(%chat_id, "cover image skipped: {e}");
                    }
                    bot.send_message(chat_id, text)
                        .parse_mode(ParseMode::Html)
                        .await?;
                }
            }
        }
        Frame::Question {
            index,
            total,
            prompt,
            choices,
        } => {
            bot.send_message(chat_id, question_text(index, total, &prompt))
                .parse_mode(ParseMode::Html)
                .reply_markup(choices_keyboard(&choices))
                .await?;
        }
        Frame::UserMessage(text) => {
            bot.send_message(chat_id, format!("<i>{}</i>", escape(&text)))
                .parse_mode(ParseMode::Html)
                .await?;
        }
        Frame::Feedback {
            correct,
            correct_count,
            answered,
        } => {
            bot.send_message(chat_id, feedback_text(correct, correct_count, answered))
                .reply_markup(next_keyboard())
                .await?;
        }
        Frame::Tallying => {
            bot.send_message(chat_id, "Counting up your answers...").await?;
        }
        Frame::EmailPrompt => {
            bot.send_message(chat_id, "Leave your email to see the result:")
                .await?;
        }
        Frame::EmailRejected(e) => {
            bot.send_message(chat_id, format!("{e}. Please try again."))
                .await?;
        }
        Frame::Result { result, share } => {
            bot.send_message(chat_id, result_text(&result, share.as_ref()))
                .parse_mode(ParseMode::Html)
                .reply_markup(result_keyboard(result.variant(), share.as_ref()))
                .await?;
        }
        Frame::Link { kind, link } => {
            bot.send_message(chat_id, link_text(kind, &link))
                .parse_mode(ParseMode::Html)
                .await?;
        }
        Frame::Failed(e) => {
            bot.send_message(chat_id, format!("Sorry, this quiz is broken: {e}. Enter /start to pick another one."))
                .await?;
        }
    }

    Ok(())
}

fn greeting_text(title: &str, description: &str, color: Option<&str>) -> String {
    let mut text = match color.and_then(swatch) {
        Some(swatch) => format!("{swatch} <b>{}</b>", escape(title)),
        None => format!("<b>{}</b>", escape(title)),
    };
    if !description.is_empty() {
        text.push_str(&format!("\n\n{}", escape(description)));
    }
    text
}

/// The colored circle emoji closest to a `#rrggbb` accent color.
fn swatch(color: &str) -> Option<&'static str> {
    let hex = color.trim().trim_start_matches('#');
    if hex.len() != 6 {
        return None;
    }
    let channel = |at: usize| {
        hex.get(at..at + 2)
            .and_then(|pair| u8::from_str_radix(pair, 16).ok())
    };
    let (r, g, b) = (channel(0)?, channel(2)?, channel(4)?);

    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    if max - min < 32 {
        return Some(if max < 128 { "⚫" } else { "⚪" });
    }

    let delta = f32::from(max - min);
    let (rf, gf, bf) = (f32::from(r), f32::from(g), f32::from(b));
    let hue = if max == r {
        60.0 * ((gf - bf) / delta).rem_euclid(6.0)
    } else if max == g {
        60.0 * ((bf - rf) / delta + 2.0)
    } else {
        60.0 * ((rf - gf) / delta + 4.0)
    };

    let swatch = match hue {
        h if !(15.0..330.0).contains(&h) => "🔴",
        h if h < 45.0 && max < 160 => "🟤",
        h if h < 45.0 => "🟠",
        h if h < 70.0 => "🟡",
        h if h < 165.0 => "🟢",
        h if h < 260.0 => "🔵",
        _ => "🟣",
    };
    Some(swatch)
}

fn question_text(index: usize, total: usize, prompt: &str) -> String {
    format!("<b>Question {}/{}</b>\n{}", index + 1, total, escape(prompt))
}

fn feedback_text(correct: bool, correct_count: usize, answered: usize) -> String {
    let verdict = if correct { "Correct✅" } else { "Wrong❌" };
    format!("{verdict} ({correct_count}/{answered})")
}

fn result_text(result: &ComputedResult, share: Option<&ShareLinks>) -> String {
    let variant = result.variant();
    let mut text = format!("<b>{}</b>", escape(variant.title()));
    if !variant.description().is_empty() {
        text.push_str(&format!("\n\n{}", escape(variant.description())));
    }
    if let Some(score) = result.score() {
        text.push_str(&format!(
            "\n\nYou scored {}/{} ({}%).",
            score.correct_count,
            score.total_questions,
            score.percent()
        ));
    }
    if let Some(share) = share {
        text.push_str(&format!("\n\nShare: {}", escape(&share.plain())));
    }
    text
}

fn link_text(kind: LinkKind, link: &Link) -> String {
    let label = match kind {
        LinkKind::Generic => "Open",
        LinkKind::Messenger => "Write to us",
        LinkKind::Qr => "Scan",
    };
    format!(
        "{label}: <a href=\"{}\">{}</a>",
        escape(link.url()),
        escape(link.button_text())
    )
}
