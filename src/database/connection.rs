use std::{borrow::Cow, collections::BTreeMap, error::Error, future::Future};

use sqlx::postgres::PgPool;
use uuid::Uuid;

use super::quiz::{
    AnswerOption, Link, LinkKind, Payload, Question, Quiz, QuizMode, Rank, ResultVariant,
    VariantKey,
};

pub type GenericError = Box<dyn Error + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Counter {
    Views,
    Completions,
    Clicks,
}

pub struct Connection {
    pool: PgPool,
}

impl Connection {
    pub async fn connect(connection_string: Cow<'_, str>) -> Result<Self, sqlx::Error> {
        let pool = PgPool::connect(&connection_string).await?;
        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!().run(&self.pool).await
    }
}

pub trait RetreiveQuiz {
    fn retreive_quiz(
        &self,
        id: Uuid,
    ) -> impl Future<Output = Result<Option<Quiz>, GenericError>> + Send;

    /// Ids and titles of every stored quiz, for pickers.
    fn retreive_all_quizzes(&self)
        -> impl Future<Output = Result<Vec<(Uuid, String)>, GenericError>> + Send;
}

pub trait RecordLead {
    fn record_lead(
        &self,
        quiz_id: Uuid,
        email: String,
    ) -> impl Future<Output = Result<(), GenericError>> + Send;
}

pub trait IncrementCounter {
    fn increment(
        &self,
        quiz_id: Uuid,
        counter: Counter,
    ) -> impl Future<Output = Result<(), GenericError>> + Send;
}

type QuizRecord = (
    Uuid,
    String,
    String,
    String,
    String,
    String,
    bool,
    Option<String>,
    Option<String>,
);

type ResultRecord = (
    String,
    String,
    String,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<String>,
);

impl RetreiveQuiz for Connection {
    async fn retreive_quiz(&self, id: Uuid) -> Result<Option<Quiz>, GenericError> {
        let mut tx = self.pool.begin().await?;

        let quiz_record = sqlx::query_as::<_, QuizRecord>(
            "SELECT uuid, slug, title, description, mode, layout, require_lead, color, image_url FROM quizes WHERE uuid = $1",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some((uuid, slug, title, description, mode, layout, require_lead, color, image_url)) =
            quiz_record
        else {
            return Ok(None);
        };

        let mode: QuizMode = mode.parse()?;
        let mut quiz = Quiz::retreive(uuid, slug, title, description, mode)
            .with_layout(layout.parse()?)
            .with_lead_capture(require_lead)
            .with_color(color)
            .with_image_url(image_url);

        let question_records = sqlx::query_as::<_, (Uuid, String)>(
            "SELECT uuid, text FROM questions WHERE quiz_id = $1 ORDER BY position",
        )
        .bind(uuid)
        .fetch_all(&mut *tx)
        .await?;

        for (question_uuid, text) in question_records {
            let option_records = sqlx::query_as::<_, (Uuid, String, Option<bool>)>(
                "SELECT uuid, label, is_correct FROM options WHERE question_id = $1 ORDER BY position",
            )
            .bind(question_uuid)
            .fetch_all(&mut *tx)
            .await?;

            let mut question = Question::retreive(question_uuid, text, vec![]);
            for (option_uuid, label, is_correct) in option_records {
                let payload = match mode {
                    QuizMode::TypedScore => {
                        let score_records = sqlx::query_as::<_, (String, i32)>(
                            "SELECT variant, points FROM option_scores WHERE option_id = $1",
                        )
                        .bind(option_uuid)
                        .fetch_all(&mut *tx)
                        .await?;

                        let mut scores = BTreeMap::new();
                        for (variant, points) in score_records {
                            scores.insert(variant.parse::<VariantKey>()?, points);
                        }
                        Payload::Scored { scores }
                    }
                    QuizMode::PassFailTest => Payload::Test {
                        is_correct: is_correct.unwrap_or(false),
                    },
                    QuizMode::RandomDraw => Payload::Plain,
                };
                question.add_option(AnswerOption::retreive(option_uuid.into(), label, payload));
            }
            quiz.add_question(question);
        }

        let result_records = sqlx::query_as::<_, ResultRecord>(
            "SELECT key, title, description, link_url, link_text, messenger_url, messenger_text, qr_url, qr_text FROM results WHERE quiz_id = $1 ORDER BY position",
        )
        .bind(uuid)
        .fetch_all(&mut *tx)
        .await?;

        for (key, title, description, link_url, link_text, messenger_url, messenger_text, qr_url, qr_text) in
            result_records
        {
            let mut result = ResultVariant::new(key.parse()?, title, description);
            for (kind, url, text) in [
                (LinkKind::Generic, link_url, link_text),
                (LinkKind::Messenger, messenger_url, messenger_text),
                (LinkKind::Qr, qr_url, qr_text),
            ] {
                if let Some(url) = url {
                    let text = text.unwrap_or_else(|| url.clone());
                    result = result.with_link(kind, Link::new(url, text));
                }
            }
            quiz.add_result(result);
        }

        let rank_records = sqlx::query_as::<_, (i16, String)>(
            "SELECT min_percent, variant FROM ranks WHERE quiz_id = $1 ORDER BY min_percent DESC",
        )
        .bind(uuid)
        .fetch_all(&mut *tx)
        .await?;

        for (min_percent, variant) in rank_records {
            quiz.add_rank(Rank {
                min_percent: u8::try_from(min_percent)?,
                variant: variant.parse()?,
            });
        }

        tx.commit().await?;

        Ok(Some(quiz))
    }

    async fn retreive_all_quizzes(&self) -> Result<Vec<(Uuid, String)>, GenericError> {
        let quizes = sqlx::query_as::<_, (Uuid, String)>("SELECT uuid, title FROM quizes ORDER BY title")
            .fetch_all(&self.pool)
            .await?;

        Ok(quizes)
    }
}

impl RecordLead for Connection {
    async fn record_lead(&self, quiz_id: Uuid, email: String) -> Result<(), GenericError> {
        tracing::debug!(%quiz_id, "recording lead");
        sqlx::query("INSERT INTO leads (uuid, quiz_id, email) VALUES ($1, $2, $3)")
            .bind(Uuid::new_v4())
            .bind(quiz_id)
            .bind(email)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

impl IncrementCounter for Connection {
    async fn increment(&self, quiz_id: Uuid, counter: Counter) -> Result<(), GenericError> {
        let statement = match counter {
            Counter::Views => "UPDATE quizes SET views = views + 1 WHERE uuid = $1",
            Counter::Completions => "UPDATE quizes SET completions = completions + 1 WHERE uuid = $1",
            Counter::Clicks => "UPDATE quizes SET clicks = clicks + 1 WHERE uuid = $1",
        };
        sqlx::query(statement).bind(quiz_id).execute(&self.pool).await?;

        Ok(())
    }
}
