use std::{sync::Arc, time::Duration};

use rand::{rngs::StdRng, SeedableRng};
use tokio::{
    sync::mpsc,
    task::JoinHandle,
    time::{self, Instant},
};

use crate::{
    database::{
        connection::{Counter, IncrementCounter, RecordLead},
        quiz::{Layout, LinkKind, OptionId, Quiz},
    },
    error::PlayError,
    play::{
        adapter::{Choice, Frame, Presenter, Timing},
        lead_gate::{LeadGate, Reveal},
        resolver::ComputedResult,
        sequencer::{Next, PlaySession},
        share::ShareLinkBuilder,
        timer::Wake,
    },
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Select(OptionId),
    Dismiss,
    SubmitEmail(String),
    OpenLink(LinkKind),
    Retry,
}

#[derive(Debug, Clone)]
pub struct PlayConfig {
    pub timing: Timing,
    pub share: Option<ShareLinkBuilder>,
    /// A session with no input for this long ends on its own.
    pub idle: Duration,
}

impl Default for PlayConfig {
    fn default() -> Self {
        Self {
            timing: Timing::default(),
            share: None,
            idle: Duration::from_secs(30 * 60),
        }
    }
}

/// Drives one play session from user inputs and timer wakes.
///
/// Collaborator calls (counters, leads) are spawned only after the state
/// change they report is committed, and their failures are logged and
/// dropped.
pub struct Player<S> {
    session: PlaySession,
    presenter: Presenter,
    gate: LeadGate,
    store: Arc<S>,
    share: Option<ShareLinkBuilder>,
    rng: StdRng,
    revealed: Option<ComputedResult>,
}

impl<S> Player<S>
where
    S: RecordLead + IncrementCounter + Send + Sync + 'static,
{
    pub fn new(
        quiz: Arc<Quiz>,
        store: Arc<S>,
        config: PlayConfig,
        frames: mpsc::UnboundedSender<Frame>,
    ) -> Result<(Self, mpsc::UnboundedReceiver<Wake>), PlayError> {
        Self::with_rng(quiz, store, config, frames, StdRng::from_entropy())
    }

    pub fn with_rng(
        quiz: Arc<Quiz>,
        store: Arc<S>,
        config: PlayConfig,
        frames: mpsc::UnboundedSender<Frame>,
        mut rng: StdRng,
    ) -> Result<(Self, mpsc::UnboundedReceiver<Wake>), PlayError> {
        let session = PlaySession::start(Arc::clone(&quiz), &mut rng)?;
        let (wakes_tx, wakes_rx) = mpsc::unbounded_channel();
        let player = Self {
            presenter: Presenter::new(quiz.layout(), config.timing, frames, wakes_tx),
            gate: LeadGate::new(quiz.requires_lead()),
            session,
            store,
            share: config.share,
            rng,
            revealed: None,
        };
        Ok((player, wakes_rx))
    }

    pub fn session(&self) -> &PlaySession {
        &self.session
    }

    pub fn gate(&self) -> &LeadGate {
        &self.gate
    }

    pub fn revealed(&self) -> Option<&ComputedResult> {
        self.revealed.as_ref()
    }

    /// Greets the user and puts up the first question.
    pub fn open(&mut self) {
        tracing::info!(quiz = %self.session.quiz().title(), "play started");
        self.count(Counter::Views);

        let quiz = Arc::clone(self.session.quiz());
        self.presenter.say(Frame::Greeting {
            title: quiz.title().to_owned(),
            description: quiz.description().to_owned(),
            color: quiz.color().map(str::to_owned),
            image_url: quiz.image_url().map(str::to_owned),
        });
        self.ask(0);
    }

    pub fn handle(&mut self, input: Input) -> Result<(), PlayError> {
        match input {
            Input::Select(option) => self.select(option),
            Input::Dismiss => {
                if let Some(next) = self.presenter.dismiss() {
                    self.advance(next);
                }
                Ok(())
            }
            Input::SubmitEmail(email) => self.submit_email(email),
            Input::OpenLink(kind) => {
                self.open_link(kind);
                Ok(())
            }
            Input::Retry => {
                self.retry();
                Ok(())
            }
        }
    }

    pub fn wake(&mut self, wake: Wake) {
        if let Some(next) = self.presenter.on_wake(wake) {
            self.advance(next);
        }
    }

    /// Tells the user the quiz can't go on.
    pub fn fail(&mut self, error: PlayError) {
        tracing::error!("play aborted: {error}");
        if let PlayError::Configuration(error) = error {
            self.presenter.reset();
            self.presenter.show(Frame::Failed(error));
        }
    }

    fn select(&mut self, option: OptionId) -> Result<(), PlayError> {
        if self.presenter.is_busy() || self.gate.is_awaiting_email() {
            tracing::debug!(%option, "selection ignored while busy");
            return Ok(());
        }

        let label = self
            .session
            .current_question()
            .and_then(|question| question.option(option))
            .map(|chosen| chosen.label().to_owned());
        let advance = self.session.submit_answer(option, &mut self.rng)?;
        tracing::debug!(
            index = self.session.current_index(),
            verdict = ?advance.verdict,
            "answer committed"
        );

        if let Some(label) = label {
            self.presenter.echo(label);
        }
        match advance.verdict {
            Some(correct) => self.presenter.hold_feedback(
                correct,
                self.session.correct_count(),
                self.session.answers().len(),
                advance.next,
            ),
            None => self.advance(advance.next),
        }

        Ok(())
    }

    fn submit_email(&mut self, email: String) -> Result<(), PlayError> {
        if !self.gate.is_awaiting_email() || self.presenter.is_busy() {
            tracing::debug!("email ignored, nothing is waiting for it");
            return Ok(());
        }

        self.presenter.echo(email.trim());
        match self.gate.submit_email(&email) {
            Ok(lead) => {
                let store = Arc::clone(&self.store);
                let quiz_id = *self.session.quiz().uuid();
                tokio::spawn(async move {
                    if let Err(e) = store.record_lead(quiz_id, lead.email).await {
                        tracing::warn!(%quiz_id, "failed to record lead: {e}");
                    }
                });
                self.reveal(lead.result);
                Ok(())
            }
            Err(PlayError::Validation(e)) => {
                self.presenter.show(Frame::EmailRejected(e.clone()));
                Err(e.into())
            }
            Err(e) => Err(e),
        }
    }

    fn open_link(&mut self, kind: LinkKind) {
        let Some(link) = self
            .revealed
            .as_ref()
            .and_then(|result| result.variant().link(kind))
            .cloned()
        else {
            tracing::debug!(kind = kind.as_str(), "no such link to open");
            return;
        };

        self.count(Counter::Clicks);
        self.presenter.show(Frame::Link { kind, link });
    }

    fn retry(&mut self) {
        tracing::info!(quiz = %self.session.quiz().title(), "retrying");
        self.presenter.reset();
        self.session.retry(&mut self.rng);
        self.gate.reset();
        self.revealed = None;
        self.open();
    }

    fn ask(&mut self, index: usize) {
        let Some(question) = self.session.quiz().questions().get(index) else {
            return;
        };
        let frame = Frame::Question {
            index,
            total: self.session.total(),
            prompt: question.text().to_owned(),
            choices: self
                .session
                .options(index)
                .into_iter()
                .map(|option| Choice {
                    id: option.id(),
                    label: option.label().to_owned(),
                })
                .collect(),
        };
        self.presenter.say(frame);
    }

    fn advance(&mut self, next: Next) {
        match next {
            Next::Question(index) => self.ask(index),
            Next::Finished(result) => {
                tracing::info!(
                    quiz = %self.session.quiz().title(),
                    result = %result.variant().title(),
                    "play completed"
                );
                self.count(Counter::Completions);
                if self.presenter.layout() == Layout::Chat {
                    self.presenter.say(Frame::Tallying);
                }
                match self.gate.complete(result) {
                    Reveal::Now(result) => self.reveal(result),
                    Reveal::Withheld => self.presenter.say(Frame::EmailPrompt),
                }
            }
        }
    }

    fn reveal(&mut self, result: ComputedResult) {
        let share = self.share.as_ref().and_then(|builder| {
            builder
                .build(self.session.quiz(), result.variant().title())
                .map_err(|e| tracing::warn!("failed to build share links: {e}"))
                .ok()
        });
        self.revealed = Some(result.clone());
        self.presenter.say(Frame::Result { result, share });
    }

    fn count(&self, counter: Counter) {
        let store = Arc::clone(&self.store);
        let quiz_id = *self.session.quiz().uuid();
        tokio::spawn(async move {
            if let Err(e) = store.increment(quiz_id, counter).await {
                tracing::warn!(%quiz_id, ?counter, "failed to increment counter: {e}");
            }
        });
    }
}

/// Input side of a running session. Dropping it ends the session.
#[derive(Debug)]
pub struct SessionHandle {
    inputs: mpsc::UnboundedSender<Input>,
    task: JoinHandle<()>,
}

impl SessionHandle {
    /// `false` once the session has ended.
    pub fn send(&self, input: Input) -> bool {
        self.inputs.send(input).is_ok()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    pub fn abort(&self) {
        self.task.abort();
    }
}

/// Starts a session on its own task. Frames come out of `frames`.
pub fn spawn<S>(
    quiz: Arc<Quiz>,
    store: Arc<S>,
    config: PlayConfig,
    frames: mpsc::UnboundedSender<Frame>,
) -> Result<SessionHandle, PlayError>
where
    S: RecordLead + IncrementCounter + Send + Sync + 'static,
{
    let idle = config.idle;
    let (player, wakes) = Player::new(quiz, store, config, frames)?;
    let (inputs, rx) = mpsc::unbounded_channel();
    let task = tokio::spawn(drive(player, rx, wakes, idle));
    Ok(SessionHandle { inputs, task })
}

async fn drive<S>(
    mut player: Player<S>,
    mut inputs: mpsc::UnboundedReceiver<Input>,
    mut wakes: mpsc::UnboundedReceiver<Wake>,
    idle: Duration,
) where
    S: RecordLead + IncrementCounter + Send + Sync + 'static,
{
    let deadline = time::sleep(idle);
    tokio::pin!(deadline);

    player.open();
    loop {
        tokio::select! {
            input = inputs.recv() => {
                let Some(input) = input else {
                    break;
                };
                deadline.as_mut().reset(Instant::now() + idle);
                if let Err(e) = player.handle(input) {
                    if e.is_fatal() {
                        player.fail(e);
                        break;
                    }
                    tracing::debug!("input rejected: {e}");
                }
            }
            Some(wake) = wakes.recv() => player.wake(wake),
            () = &mut deadline => {
                tracing::info!(quiz = %player.session().quiz().title(), "session idle, closing");
                break;
            }
        }
    }
    tracing::debug!("session closed");
}
