use std::sync::Arc;

use rand::{seq::SliceRandom, Rng};

use crate::{
    database::quiz::{AnswerOption, OptionId, Question, Quiz},
    error::{ConfigurationError, PlayError},
    play::resolver::{resolve, ComputedResult},
};

/// What follows a committed answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Next {
    Question(usize),
    Finished(ComputedResult),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Advance {
    /// Correctness of the submitted option, only known in test quizzes.
    pub verdict: Option<bool>,
    pub next: Next,
}

/// One attempt at a quiz.
///
/// Options are shuffled per session, but answers are stored by option id,
/// so scoring never depends on the order a user saw.
#[derive(Debug, Clone)]
pub struct PlaySession {
    quiz: Arc<Quiz>,
    order: Vec<Vec<usize>>,
    current: usize,
    answers: Vec<(usize, OptionId)>,
    correct_count: usize,
}

impl PlaySession {
    pub fn start<R: Rng + ?Sized>(quiz: Arc<Quiz>, rng: &mut R) -> Result<Self, ConfigurationError> {
        quiz.validate()?;
        let order = shuffle(&quiz, rng);
        Ok(Self {
            quiz,
            order,
            current: 0,
            answers: vec![],
            correct_count: 0,
        })
    }

    pub fn quiz(&self) -> &Arc<Quiz> {
        &self.quiz
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn total(&self) -> usize {
        self.quiz.questions().len()
    }

    pub fn is_terminal(&self) -> bool {
        self.current >= self.total()
    }

    /// Answers in the order they were given, keyed by question index.
    pub fn answers(&self) -> &[(usize, OptionId)] {
        &self.answers
    }

    pub fn correct_count(&self) -> usize {
        self.correct_count
    }

    pub fn current_question(&self) -> Option<&Question> {
        self.quiz.questions().get(self.current)
    }

    /// Options of question `index` in this session's shuffled order.
    pub fn options(&self, index: usize) -> Vec<&AnswerOption> {
        match (self.quiz.questions().get(index), self.order.get(index)) {
            (Some(question), Some(order)) => order.iter().map(|i| &question.options()[*i]).collect(),
            _ => vec![],
        }
    }

    /// Records `option` against the current question.
    ///
    /// Nothing is committed when this fails. The last answer is only
    /// recorded once the result resolves, so a resolver error leaves the
    /// session on its final question.
    pub fn submit_answer<R: Rng + ?Sized>(
        &mut self,
        option: OptionId,
        rng: &mut R,
    ) -> Result<Advance, PlayError> {
        if self.is_terminal() {
            return Err(PlayError::Finished);
        }
        if self.answers.iter().any(|(idx, _)| *idx == self.current) {
            return Err(PlayError::AlreadyAnswered(self.current));
        }
        let chosen = self.quiz.questions()[self.current]
            .option(option)
            .ok_or(PlayError::UnknownOption(option))?;
        let verdict = chosen.is_correct();

        let next = if self.current + 1 == self.total() {
            let mut given = self.answered_options();
            given.push(chosen);
            Next::Finished(resolve(&self.quiz, &given, rng)?)
        } else {
            Next::Question(self.current + 1)
        };

        self.answers.push((self.current, option));
        if verdict == Some(true) {
            self.correct_count += 1;
        }
        self.current += 1;

        Ok(Advance { verdict, next })
    }

    /// Starts over with a fresh shuffle.
    pub fn retry<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.order = shuffle(&self.quiz, rng);
        self.current = 0;
        self.answers.clear();
        self.correct_count = 0;
    }

    fn answered_options(&self) -> Vec<&AnswerOption> {
        self.answers
            .iter()
            .filter_map(|(idx, id)| self.quiz.questions().get(*idx)?.option(*id))
            .collect()
    }
}

fn shuffle<R: Rng + ?Sized>(quiz: &Quiz, rng: &mut R) -> Vec<Vec<usize>> {
    quiz.questions()
        .iter()
        .map(|question| {
            let mut order: Vec<usize> = (0..question.options().len()).collect();
            order.shuffle(rng);
            order
        })
        .collect()
}
