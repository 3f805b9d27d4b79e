use std::{collections::BTreeMap, fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use teloxide::utils::html::escape;
use uuid::Uuid;

use crate::error::ConfigurationError;

pub const MAX_RESULTS: usize = 10;
pub const MIN_OPTIONS: usize = 2;
pub const MAX_OPTIONS: usize = 6;

/// Key of a result variant. A quiz can configure at most ten of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum VariantKey {
    A,
    B,
    C,
    D,
    E,
    F,
    G,
    H,
    I,
    J,
}

impl VariantKey {
    pub const ALL: [VariantKey; MAX_RESULTS] = [
        VariantKey::A,
        VariantKey::B,
        VariantKey::C,
        VariantKey::D,
        VariantKey::E,
        VariantKey::F,
        VariantKey::G,
        VariantKey::H,
        VariantKey::I,
        VariantKey::J,
    ];

    pub fn as_char(self) -> char {
        (b'A' + self as u8) as char
    }
}

impl fmt::Display for VariantKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

impl FromStr for VariantKey {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.trim().chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => VariantKey::ALL
                .into_iter()
                .find(|key| key.as_char() == c.to_ascii_uppercase())
                .ok_or_else(|| ConfigurationError::InvalidVariantKey(s.to_owned())),
            _ => Err(ConfigurationError::InvalidVariantKey(s.to_owned())),
        }
    }
}

/// How a finished session is turned into a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QuizMode {
    TypedScore,
    PassFailTest,
    RandomDraw,
}

impl QuizMode {
    pub fn as_str(self) -> &'static str {
        match self {
            QuizMode::TypedScore => "typed-score",
            QuizMode::PassFailTest => "pass-fail-test",
            QuizMode::RandomDraw => "random-draw",
        }
    }
}

impl fmt::Display for QuizMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QuizMode {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "typed-score" => Ok(QuizMode::TypedScore),
            "pass-fail-test" => Ok(QuizMode::PassFailTest),
            "random-draw" => Ok(QuizMode::RandomDraw),
            other => Err(ConfigurationError::UnknownMode(other.to_owned())),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Layout {
    #[default]
    Card,
    Chat,
}

impl Layout {
    pub fn as_str(self) -> &'static str {
        match self {
            Layout::Card => "card",
            Layout::Chat => "chat",
        }
    }
}

impl FromStr for Layout {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "card" => Ok(Layout::Card),
            "chat" => Ok(Layout::Chat),
            other => Err(ConfigurationError::UnknownLayout(other.to_owned())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OptionId(Uuid);

impl OptionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for OptionId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for OptionId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl fmt::Display for OptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for OptionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// What an option contributes to the result. Which variant is valid is
/// decided by the quiz mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Payload {
    Scored { scores: BTreeMap<VariantKey, i32> },
    Test { is_correct: bool },
    Plain,
}

impl Payload {
    pub fn fits(&self, mode: QuizMode) -> bool {
        matches!(
            (self, mode),
            (Payload::Scored { .. }, QuizMode::TypedScore)
                | (Payload::Test { .. }, QuizMode::PassFailTest)
                | (Payload::Plain, QuizMode::RandomDraw)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerOption {
    id: OptionId,
    label: String,
    payload: Payload,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    uuid: Uuid,
    text: String,
    options: Vec<AnswerOption>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    url: String,
    button_text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkKind {
    Generic,
    Messenger,
    Qr,
}

impl LinkKind {
    pub fn as_str(self) -> &'static str {
        match self {
            LinkKind::Generic => "generic",
            LinkKind::Messenger => "messenger",
            LinkKind::Qr => "qr",
        }
    }
}

impl FromStr for LinkKind {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "generic" => Ok(LinkKind::Generic),
            "messenger" => Ok(LinkKind::Messenger),
            "qr" => Ok(LinkKind::Qr),
            other => Err(ConfigurationError::UnknownLinkKind(other.to_owned())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultVariant {
    key: VariantKey,
    title: String,
    description: String,
    links: BTreeMap<LinkKind, Link>,
}

/// Maps a test score to a variant. `min_percent` is an inclusive lower bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rank {
    pub min_percent: u8,
    pub variant: VariantKey,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quiz {
    uuid: Uuid,
    slug: String,
    title: String,
    description: String,
    mode: QuizMode,
    layout: Layout,
    questions: Vec<Question>,
    results: Vec<ResultVariant>,
    ranks: Vec<Rank>,
    require_lead: bool,
    color: Option<String>,
    image_url: Option<String>,
}

impl fmt::Display for Quiz {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<b>{}</b>\n<i>{}</i>\n\nQuestions: {}",
            escape(self.title()),
            escape(self.description()),
            self.questions().len()
        )
    }
}

impl Quiz {
    pub fn new(title: impl Into<String>, description: impl Into<String>, mode: QuizMode) -> Self {
        let title = title.into();
        Self::retreive(Uuid::new_v4(), slugify(&title), title, description.into(), mode)
    }

    pub fn retreive(
        uuid: Uuid,
        slug: String,
        title: String,
        description: String,
        mode: QuizMode,
    ) -> Self {
        Self {
            uuid,
            slug,
            title,
            description,
            mode,
            layout: Layout::default(),
            questions: vec![],
            results: vec![],
            ranks: vec![],
            require_lead: false,
            color: None,
            image_url: None,
        }
    }

    pub fn with_layout(mut self, layout: Layout) -> Self {
        self.layout = layout;
        self
    }

    pub fn with_lead_capture(mut self, require_lead: bool) -> Self {
        self.require_lead = require_lead;
        self
    }

    pub fn with_color(mut self, color: Option<String>) -> Self {
        self.color = color;
        self
    }

    pub fn with_image_url(mut self, image_url: Option<String>) -> Self {
        self.image_url = image_url;
        self
    }

    pub fn uuid(&self) -> &Uuid {
        &self.uuid
    }

    pub fn slug(&self) -> &str {
        &self.slug
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn mode(&self) -> QuizMode {
        self.mode
    }

    pub fn layout(&self) -> Layout {
        self.layout
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn results(&self) -> &[ResultVariant] {
        &self.results
    }

    pub fn ranks(&self) -> &[Rank] {
        &self.ranks
    }

    pub fn requires_lead(&self) -> bool {
        self.require_lead
    }

    /// Accent color as `#rrggbb`, if one was picked.
    pub fn color(&self) -> Option<&str> {
        self.color.as_deref()
    }

    pub fn image_url(&self) -> Option<&str> {
        self.image_url.as_deref()
    }

    pub fn add_question(&mut self, question: Question) {
        self.questions.push(question);
    }

    pub fn add_result(&mut self, result: ResultVariant) {
        self.results.push(result);
    }

    pub fn add_rank(&mut self, rank: Rank) {
        self.ranks.push(rank);
    }

    pub fn result(&self, key: VariantKey) -> Option<&ResultVariant> {
        self.results.iter().find(|result| result.key() == key)
    }

    /// Checks everything a play session relies on. A quiz that fails here
    /// must not be played.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.questions.is_empty() {
            return Err(ConfigurationError::NoQuestions);
        }
        if self.results.is_empty() {
            return Err(ConfigurationError::NoResults);
        }
        if self.results.len() > MAX_RESULTS {
            return Err(ConfigurationError::TooManyResults(self.results.len()));
        }
        for (i, result) in self.results.iter().enumerate() {
            if self.results[..i].iter().any(|r| r.key() == result.key()) {
                return Err(ConfigurationError::DuplicateVariant(result.key()));
            }
        }

        for (idx, question) in self.questions.iter().enumerate() {
            let count = question.options().len();
            if !(MIN_OPTIONS..=MAX_OPTIONS).contains(&count) {
                return Err(ConfigurationError::OptionCount {
                    question: idx + 1,
                    count,
                });
            }
            for option in question.options() {
                if !option.payload().fits(self.mode) {
                    return Err(ConfigurationError::PayloadMismatch {
                        question: idx + 1,
                        label: option.label().to_owned(),
                        mode: self.mode,
                    });
                }
                if let Payload::Scored { scores } = option.payload() {
                    if let Some(key) = scores.keys().find(|key| self.result(**key).is_none()) {
                        return Err(ConfigurationError::UnknownVariant(*key));
                    }
                }
            }
        }

        match self.mode {
            QuizMode::TypedScore => {
                let scorable = self
                    .questions
                    .iter()
                    .flat_map(|q| q.options())
                    .any(|o| {
                        matches!(o.payload(), Payload::Scored { scores } if scores.values().any(|v| *v > 0))
                    });
                if !scorable {
                    return Err(ConfigurationError::NothingScorable);
                }
            }
            QuizMode::PassFailTest => {
                for rank in &self.ranks {
                    if rank.min_percent > 100 {
                        return Err(ConfigurationError::RankOutOfRange(rank.min_percent));
                    }
                    if self.result(rank.variant).is_none() {
                        return Err(ConfigurationError::UnknownVariant(rank.variant));
                    }
                }
                if !self.ranks.iter().any(|rank| rank.min_percent == 0) {
                    return Err(ConfigurationError::NoBaseRank);
                }
            }
            QuizMode::RandomDraw => {}
        }

        Ok(())
    }
}

impl Question {
    pub fn new(text: impl Into<String>, options: Option<Vec<AnswerOption>>) -> Self {
        Self::retreive(Uuid::new_v4(), text.into(), options.unwrap_or_default())
    }

    pub fn retreive(uuid: Uuid, text: String, options: Vec<AnswerOption>) -> Self {
        Self {
            uuid,
            text,
            options,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn options(&self) -> &[AnswerOption] {
        &self.options
    }

    pub fn option(&self, id: OptionId) -> Option<&AnswerOption> {
        self.options.iter().find(|option| option.id() == id)
    }

    pub fn add_option(&mut self, option: AnswerOption) {
        self.options.push(option);
    }
}

impl AnswerOption {
    pub fn new(label: impl Into<String>, payload: Payload) -> Self {
        Self::retreive(OptionId::new(), label.into(), payload)
    }

    pub fn scored(label: impl Into<String>, scores: impl IntoIterator<Item = (VariantKey, i32)>) -> Self {
        Self::new(
            label,
            Payload::Scored {
                scores: scores.into_iter().collect(),
            },
        )
    }

    pub fn test(label: impl Into<String>, is_correct: bool) -> Self {
        Self::new(label, Payload::Test { is_correct })
    }

    pub fn plain(label: impl Into<String>) -> Self {
        Self::new(label, Payload::Plain)
    }

    pub fn retreive(id: OptionId, label: String, payload: Payload) -> Self {
        Self { id, label, payload }
    }

    pub fn id(&self) -> OptionId {
        self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// `None` outside of test quizzes.
    pub fn is_correct(&self) -> Option<bool> {
        match self.payload {
            Payload::Test { is_correct } => Some(is_correct),
            _ => None,
        }
    }
}

impl Link {
    pub fn new(url: impl Into<String>, button_text: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            button_text: button_text.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn button_text(&self) -> &str {
        &self.button_text
    }
}

impl ResultVariant {
    pub fn new(key: VariantKey, title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            key,
            title: title.into(),
            description: description.into(),
            links: BTreeMap::new(),
        }
    }

    pub fn with_link(mut self, kind: LinkKind, link: Link) -> Self {
        self.links.insert(kind, link);
        self
    }

    pub fn key(&self) -> VariantKey {
        self.key
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn link(&self, kind: LinkKind) -> Option<&Link> {
        self.links.get(&kind)
    }

    pub fn links(&self) -> impl Iterator<Item = (LinkKind, &Link)> {
        self.links.iter().map(|(kind, link)| (*kind, link))
    }
}

fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    for c in title.chars() {
        if c.is_alphanumeric() {
            slug.extend(c.to_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scored_quiz() -> Quiz {
        let mut quiz = Quiz::new("Which Pet?", "Find out", QuizMode::TypedScore);
        quiz.add_result(ResultVariant::new(VariantKey::A, "Cat", "Aloof"));
        quiz.add_result(ResultVariant::new(VariantKey::B, "Dog", "Loyal"));
        quiz.add_question(Question::new(
            "Mornings?",
            Some(vec![
                AnswerOption::scored("Sleep in", [(VariantKey::A, 1)]),
                AnswerOption::scored("Go for a run", [(VariantKey::B, 1)]),
            ]),
        ));
        quiz
    }

    #[test]
    fn variant_keys_parse_case_insensitively() {
        assert_eq!("c".parse::<VariantKey>(), Ok(VariantKey::C));
        assert_eq!(VariantKey::J.to_string(), "J");
        assert!("K".parse::<VariantKey>().is_err());
        assert!("AB".parse::<VariantKey>().is_err());
    }

    #[test]
    fn new_quiz_gets_a_slug() {
        assert_eq!(Quiz::new("What's  your  Vibe?!", "", QuizMode::RandomDraw).slug(), "what-s-your-vibe");
    }

    #[test]
    fn well_formed_quiz_validates() {
        assert_eq!(scored_quiz().validate(), Ok(()));
    }

    #[test]
    fn quiz_without_questions_is_rejected() {
        let mut quiz = Quiz::new("Empty", "", QuizMode::RandomDraw);
        quiz.add_result(ResultVariant::new(VariantKey::A, "Only", ""));
        assert_eq!(quiz.validate(), Err(ConfigurationError::NoQuestions));
    }

    #[test]
    fn quiz_without_results_is_rejected() {
        let mut quiz = Quiz::new("No results", "", QuizMode::RandomDraw);
        quiz.add_question(Question::new(
            "?",
            Some(vec![AnswerOption::plain("a"), AnswerOption::plain("b")]),
        ));
        assert_eq!(quiz.validate(), Err(ConfigurationError::NoResults));
    }

    #[test]
    fn options_must_match_the_mode() {
        let mut quiz = scored_quiz();
        quiz.add_question(Question::new(
            "Mixed",
            Some(vec![AnswerOption::test("yes", true), AnswerOption::test("no", false)]),
        ));
        assert!(matches!(
            quiz.validate(),
            Err(ConfigurationError::PayloadMismatch { question: 2, .. })
        ));
    }

    #[test]
    fn scores_must_reference_configured_variants() {
        let mut quiz = scored_quiz();
        quiz.add_question(Question::new(
            "Stray",
            Some(vec![
                AnswerOption::scored("x", [(VariantKey::F, 2)]),
                AnswerOption::scored("y", [(VariantKey::A, 1)]),
            ]),
        ));
        assert_eq!(quiz.validate(), Err(ConfigurationError::UnknownVariant(VariantKey::F)));
    }

    #[test]
    fn typed_score_quiz_needs_a_scoring_option() {
        let mut quiz = Quiz::new("Flat", "", QuizMode::TypedScore);
        quiz.add_result(ResultVariant::new(VariantKey::A, "A", ""));
        quiz.add_question(Question::new(
            "?",
            Some(vec![
                AnswerOption::scored("a", [(VariantKey::A, 0)]),
                AnswerOption::new(
                    "b",
                    Payload::Scored {
                        scores: BTreeMap::new(),
                    },
                ),
            ]),
        ));
        assert_eq!(quiz.validate(), Err(ConfigurationError::NothingScorable));

        quiz.add_question(Question::new(
            "??",
            Some(vec![
                AnswerOption::scored("minus", [(VariantKey::A, -3)]),
                AnswerOption::scored("zero", [(VariantKey::A, 0)]),
            ]),
        ));
        assert_eq!(quiz.validate(), Err(ConfigurationError::NothingScorable));
    }

    #[test]
    fn test_quiz_needs_a_base_rank() {
        let mut quiz = Quiz::new("Exam", "", QuizMode::PassFailTest);
        quiz.add_result(ResultVariant::new(VariantKey::A, "S", ""));
        quiz.add_question(Question::new(
            "1 + 1",
            Some(vec![AnswerOption::test("2", true), AnswerOption::test("3", false)]),
        ));
        quiz.add_rank(Rank {
            min_percent: 80,
            variant: VariantKey::A,
        });
        assert_eq!(quiz.validate(), Err(ConfigurationError::NoBaseRank));

        quiz.add_rank(Rank {
            min_percent: 0,
            variant: VariantKey::A,
        });
        assert_eq!(quiz.validate(), Ok(()));
    }

    #[test]
    fn question_option_count_is_bounded() {
        let mut quiz = Quiz::new("Lonely", "", QuizMode::RandomDraw);
        quiz.add_result(ResultVariant::new(VariantKey::A, "A", ""));
        quiz.add_question(Question::new("?", Some(vec![AnswerOption::plain("only")])));
        assert_eq!(
            quiz.validate(),
            Err(ConfigurationError::OptionCount { question: 1, count: 1 })
        );
    }
}
