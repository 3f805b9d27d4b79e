use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, KeyboardButton, KeyboardMarkup};

use crate::{
    database::quiz::ResultVariant,
    play::{adapter::Choice, share::ShareLinks},
    runner::Callback,
};

pub(crate) const TAKE_QUIZ: &str = "Take a quiz📝";

pub(crate) fn yes_no_keyboard() -> KeyboardMarkup {
    let keyboard: Vec<Vec<KeyboardButton>> = vec![vec![
        KeyboardButton::new("Yes✔️"),
        KeyboardButton::new("No❌"),
    ]];

    KeyboardMarkup::new(keyboard)
}

pub(crate) fn choices_keyboard(choices: &[Choice]) -> InlineKeyboardMarkup {
    let keyboard: Vec<Vec<InlineKeyboardButton>> = choices
        .iter()
        .map(|choice| {
            vec![InlineKeyboardButton::callback(
                choice.label.clone(),
                Callback::Select(choice.id).to_string(),
            )]
        })
        .collect();

    InlineKeyboardMarkup::new(keyboard)
}

pub(crate) fn next_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::callback(
        "Next ▶️",
        Callback::Dismiss.to_string(),
    )]])
}

pub(crate) fn result_keyboard(variant: &ResultVariant, share: Option<&ShareLinks>) -> InlineKeyboardMarkup {
    let mut keyboard: Vec<Vec<InlineKeyboardButton>> = variant
        .links()
        .map(|(kind, link)| {
            vec![InlineKeyboardButton::callback(
                link.button_text().to_owned(),
                Callback::OpenLink(kind).to_string(),
            )]
        })
        .collect();

    if let Some(share) = share {
        keyboard.push(vec![
            InlineKeyboardButton::url("X", share.x.clone()),
            InlineKeyboardButton::url("Facebook", share.facebook.clone()),
        ]);
        keyboard.push(vec![
            InlineKeyboardButton::url("Telegram", share.telegram.clone()),
            InlineKeyboardButton::url("WhatsApp", share.whatsapp.clone()),
        ]);
    }

    keyboard.push(vec![InlineKeyboardButton::callback(
        "Try again🔁",
        Callback::Retry.to_string(),
    )]);

    InlineKeyboardMarkup::new(keyboard)
}

pub(crate) fn quizes_keyboard(quizes: &[(uuid::Uuid, String)]) -> KeyboardMarkup {
    let keyboard = quizes
        .iter()
        .map(|(_, title)| vec![KeyboardButton::new(title)]);

    KeyboardMarkup::new(keyboard)
}

pub(crate) fn action_keyboard() -> KeyboardMarkup {
    KeyboardMarkup::new(vec![vec![KeyboardButton::new(TAKE_QUIZ)]])
}
