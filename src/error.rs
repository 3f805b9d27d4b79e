use crate::database::quiz::{OptionId, QuizMode, VariantKey};

/// A quiz definition that cannot be played. Never retried.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigurationError {
    #[error("quiz has no questions")]
    NoQuestions,

    #[error("quiz has no result variants")]
    NoResults,

    #[error("quiz has {0} result variants, at most 10 are supported")]
    TooManyResults(usize),

    #[error("result variant {0} is configured twice")]
    DuplicateVariant(VariantKey),

    #[error("variant {0} is referenced but not configured")]
    UnknownVariant(VariantKey),

    #[error("'{0}' is not a variant key (expected A to J)")]
    InvalidVariantKey(String),

    #[error("question #{question} has {count} options, expected 2 to 6")]
    OptionCount { question: usize, count: usize },

    #[error("option '{label}' of question #{question} does not belong in a {mode} quiz")]
    PayloadMismatch {
        question: usize,
        label: String,
        mode: QuizMode,
    },

    #[error("no option of this quiz awards any points")]
    NothingScorable,

    #[error("the given answers did not score any variant")]
    NoScoredVariant,

    #[error("test quiz needs a rank starting at 0%")]
    NoBaseRank,

    #[error("rank threshold {0}% is above 100%")]
    RankOutOfRange(u8),

    #[error("unknown quiz mode '{0}'")]
    UnknownMode(String),

    #[error("unknown layout '{0}'")]
    UnknownLayout(String),

    #[error("unknown link kind '{0}'")]
    UnknownLinkKind(String),
}

/// User input that can be corrected and resubmitted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("'{0}' doesn't look like an email address")]
    MalformedEmail(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlayError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("the session is already finished")]
    Finished,

    #[error("question #{0} is already answered")]
    AlreadyAnswered(usize),

    #[error("option {0} is not offered for the current question")]
    UnknownOption(OptionId),

    #[error("no email is expected right now")]
    NotAwaitingEmail,
}

impl PlayError {
    /// Fatal errors end the session; everything else leaves it where it was.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("{0} should be set")]
    Missing(&'static str),

    #[error("{name} can't be parsed: {reason}")]
    Invalid { name: &'static str, reason: String },
}
