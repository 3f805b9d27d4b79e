use crate::{
    error::{PlayError, ValidationError},
    play::resolver::ComputedResult,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateState {
    AwaitingCompletion,
    AwaitingEmail(ComputedResult),
    Resolved,
}

/// Whether a finished session's result can be shown yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reveal {
    Now(ComputedResult),
    Withheld,
}

/// An email that passed the gate, with the result it unlocked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lead {
    pub email: String,
    pub result: ComputedResult,
}

/// Withholds a result until an email is captured. Quizzes that don't ask
/// for leads get a gate that lets every result straight through.
#[derive(Debug, Clone)]
pub struct LeadGate {
    required: bool,
    state: GateState,
}

impl LeadGate {
    pub fn new(required: bool) -> Self {
        Self {
            required,
            state: GateState::AwaitingCompletion,
        }
    }

    pub fn state(&self) -> &GateState {
        &self.state
    }

    pub fn is_awaiting_email(&self) -> bool {
        matches!(self.state, GateState::AwaitingEmail(_))
    }

    /// Called once, when the sequencer turns terminal.
    pub fn complete(&mut self, result: ComputedResult) -> Reveal {
        if self.state != GateState::AwaitingCompletion {
            tracing::warn!("lead gate completed twice, keeping {:?}", self.state);
            return Reveal::Withheld;
        }

        if self.required {
            self.state = GateState::AwaitingEmail(result);
            Reveal::Withheld
        } else {
            self.state = GateState::Resolved;
            Reveal::Now(result)
        }
    }

    /// Validates `email` and, if it is accepted, releases the held result.
    /// A rejected email leaves the gate waiting.
    pub fn submit_email(&mut self, email: &str) -> Result<Lead, PlayError> {
        if !self.is_awaiting_email() {
            return Err(PlayError::NotAwaitingEmail);
        }

        let email = email.trim();
        if !email.contains('@') {
            return Err(ValidationError::MalformedEmail(email.to_owned()).into());
        }

        match std::mem::replace(&mut self.state, GateState::Resolved) {
            GateState::AwaitingEmail(result) => Ok(Lead {
                email: email.to_owned(),
                result,
            }),
            other => {
                self.state = other;
                Err(PlayError::NotAwaitingEmail)
            }
        }
    }

    pub fn reset(&mut self) {
        self.state = GateState::AwaitingCompletion;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rand::{rngs::StdRng, SeedableRng};

    use super::*;
    use crate::{
        database::quiz::{AnswerOption, Question, Quiz, QuizMode, ResultVariant, VariantKey},
        play::resolver::resolve,
    };

    fn some_result() -> ComputedResult {
        let mut quiz = Quiz::new("Lucky", "", QuizMode::RandomDraw);
        quiz.add_result(ResultVariant::new(VariantKey::A, "Lucky", ""));
        quiz.add_question(Question::new(
            "Pick",
            Some(vec![AnswerOption::plain("1"), AnswerOption::plain("2")]),
        ));
        let quiz = Arc::new(quiz);
        resolve(&quiz, &[], &mut StdRng::seed_from_u64(21)).unwrap()
    }

    #[test]
    fn passthrough_reveals_immediately() {
        let mut gate = LeadGate::new(false);
        let result = some_result();
        assert_eq!(gate.complete(result.clone()), Reveal::Now(result));
        assert_eq!(gate.state(), &GateState::Resolved);
    }

    #[test]
    fn required_gate_withholds_until_email() {
        let mut gate = LeadGate::new(true);
        let result = some_result();
        assert_eq!(gate.complete(result.clone()), Reveal::Withheld);
        assert!(gate.is_awaiting_email());

        let lead = gate.submit_email("  a@b.com ").unwrap();
        assert_eq!(lead.email, "a@b.com");
        assert_eq!(lead.result, result);
        assert_eq!(gate.state(), &GateState::Resolved);
    }

    #[test]
    fn malformed_email_keeps_waiting() {
        let mut gate = LeadGate::new(true);
        gate.complete(some_result());

        let err = gate.submit_email("not-an-email").unwrap_err();
        assert_eq!(
            err,
            PlayError::Validation(ValidationError::MalformedEmail("not-an-email".into()))
        );
        assert!(gate.is_awaiting_email());
        assert!(gate.submit_email("a@b.com").is_ok());
    }

    #[test]
    fn email_before_completion_is_refused() {
        let mut gate = LeadGate::new(true);
        assert_eq!(gate.submit_email("a@b.com"), Err(PlayError::NotAwaitingEmail));
    }

    #[test]
    fn completion_happens_once() {
        let mut gate = LeadGate::new(false);
        gate.complete(some_result());
        assert_eq!(gate.complete(some_result()), Reveal::Withheld);
    }

    #[test]
    fn reset_waits_for_completion_again() {
        let mut gate = LeadGate::new(true);
        gate.complete(some_result());
        gate.submit_email("a@b.com").unwrap();
        gate.reset();
        assert_eq!(gate.state(), &GateState::AwaitingCompletion);
        assert_eq!(gate.complete(some_result()), Reveal::Withheld);
    }
}
