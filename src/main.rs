use std::{borrow::Cow, process::ExitCode, sync::Arc};

use quizplay::{
    config::Settings, database::connection::Connection, runner::Sessions, schema::schema,
    state::QuizState,
};
use teloxide::{
    dispatching::dialogue::InMemStorage,
    error_handlers::IgnoringErrorHandlerSafe,
    prelude::*,
    update_listeners::webhooks::{self, Options},
};
use tracing_subscriber::{fmt::format::FmtSpan, EnvFilter};

#[tokio::main]
async fn main() -> ExitCode {
    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let filter = EnvFilter::try_new(&settings.log_level).unwrap_or_else(|e| {
        eprintln!("LOG_LEVEL '{}' is invalid ({e}), using info", settings.log_level);
        EnvFilter::new("info")
    });
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .with_span_events(FmtSpan::ENTER)
        .with_line_number(true)
        .with_target(false)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("failed to install the tracing subscriber: {e}");
    }
    // teloxide and sqlx still log through `log`.
    if let Err(e) = tracing_log::LogTracer::init() {
        tracing::warn!("failed to forward log records: {e}");
    }

    let connection = match Connection::connect(Cow::Borrowed(&settings.database_url)).await {
        Ok(connection) => Arc::new(connection),
        Err(e) => {
            tracing::error!("failed to connect to the database: {e}");
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = connection.migrate().await {
        tracing::error!("failed to migrate the database: {e}");
        return ExitCode::FAILURE;
    }

    let bot = Bot::new(&settings.teloxide_token);
    tracing::info!("Starting bot...");

    let mut dispatcher = Dispatcher::builder(bot.clone(), schema())
        .dependencies(dptree::deps![
            InMemStorage::<QuizState>::new(),
            connection,
            Arc::new(Sessions::default()),
            Arc::new(settings.play_config())
        ])
        .enable_ctrlc_handler()
        .build();

    match settings.webhook {
        Some(webhook) => {
            let listener = match webhooks::axum(bot, Options::new(webhook.addr, webhook.url)).await {
                Ok(listener) => listener,
                Err(e) => {
                    tracing::error!("failed to build a webhook listener: {e}");
                    return ExitCode::FAILURE;
                }
            };
            dispatcher
                .dispatch_with_listener(listener, Arc::new(IgnoringErrorHandlerSafe))
                .await
        }
        None => dispatcher.dispatch().await,
    }

    ExitCode::SUCCESS
}
