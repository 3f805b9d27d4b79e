use std::sync::Arc;

use uuid::Uuid;

use crate::database::quiz::Quiz;

#[derive(Debug, Clone, Default)]
pub enum QuizState {
    #[default]
    Start,
    Selection,
    ReadyToRun {
        quiz: Arc<Quiz>,
    },
    // The session itself lives in `runner::Sessions`.
    Playing {
        quiz_id: Uuid,
    },
}
