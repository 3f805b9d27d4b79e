use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{
    database::quiz::{AnswerOption, Payload, Quiz, QuizMode, Rank, ResultVariant},
    error::ConfigurationError,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestScore {
    pub correct_count: usize,
    pub total_questions: usize,
}

impl TestScore {
    /// Whether the score reaches `min_percent`, compared without rounding.
    pub fn reaches(&self, min_percent: u8) -> bool {
        self.correct_count * 100 >= usize::from(min_percent) * self.total_questions
    }

    pub fn percent(&self) -> usize {
        if self.total_questions == 0 {
            return 0;
        }
        self.correct_count * 100 / self.total_questions
    }
}

/// The outcome of a finished session. Built once, never changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComputedResult {
    variant: ResultVariant,
    score: Option<TestScore>,
}

impl ComputedResult {
    pub fn variant(&self) -> &ResultVariant {
        &self.variant
    }

    /// Only test quizzes carry a score.
    pub fn score(&self) -> Option<TestScore> {
        self.score
    }
}

/// Picks the result variant for `answers`.
///
/// Typed-score quizzes sum the points each answer gives every variant. The
/// highest total wins, and equal totals go to the variant configured first.
/// Test quizzes map the share of correct answers to the highest rank they
/// reach. Random draws ignore the answers and pick uniformly, so `rng` is
/// consulted only in that mode.
pub fn resolve<R: Rng + ?Sized>(
    quiz: &Quiz,
    answers: &[&AnswerOption],
    rng: &mut R,
) -> Result<ComputedResult, ConfigurationError> {
    let variants = quiz.results();
    if variants.is_empty() {
        return Err(ConfigurationError::NoResults);
    }

    match quiz.mode() {
        QuizMode::TypedScore => {
            // Variants no answer mentions have no score at all, not a zero one.
            let mut totals: Vec<Option<i64>> = vec![None; variants.len()];
            for answer in answers {
                let Payload::Scored { scores } = answer.payload() else {
                    continue;
                };
                for (key, points) in scores {
                    if let Some(pos) = variants.iter().position(|v| v.key() == *key) {
                        *totals[pos].get_or_insert(0) += i64::from(*points);
                    }
                }
            }

            let mut best: Option<(usize, i64)> = None;
            for (pos, total) in totals.iter().enumerate() {
                let Some(total) = *total else {
                    continue;
                };
                if best.map_or(true, |(_, top)| total > top) {
                    best = Some((pos, total));
                }
            }
            let best = match best {
                Some((pos, top)) if top > 0 => pos,
                _ => return Err(ConfigurationError::NoScoredVariant),
            };

            Ok(ComputedResult {
                variant: variants[best].clone(),
                score: None,
            })
        }
        QuizMode::PassFailTest => {
            let score = TestScore {
                correct_count: answers
                    .iter()
                    .filter(|answer| answer.is_correct() == Some(true))
                    .count(),
                total_questions: quiz.questions().len(),
            };

            let mut rank: Option<&Rank> = None;
            for candidate in quiz.ranks() {
                let higher = rank.map_or(true, |r| candidate.min_percent > r.min_percent);
                if score.reaches(candidate.min_percent) && higher {
                    rank = Some(candidate);
                }
            }
            let rank = rank.ok_or(ConfigurationError::NoBaseRank)?;
            let variant = quiz
                .result(rank.variant)
                .ok_or(ConfigurationError::UnknownVariant(rank.variant))?;

            Ok(ComputedResult {
                variant: variant.clone(),
                score: Some(score),
            })
        }
        QuizMode::RandomDraw => Ok(ComputedResult {
            variant: variants[rng.gen_range(0..variants.len())].clone(),
            score: None,
        }),
    }
}
