use std::{collections::VecDeque, time::Duration};

use tokio::sync::mpsc;

use crate::{
    database::quiz::{Layout, Link, LinkKind, OptionId},
    error::{ConfigurationError, ValidationError},
    play::{
        resolver::ComputedResult,
        sequencer::Next,
        share::ShareLinks,
        timer::{TimerSlot, Wake, WakeKind},
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    /// How long the chat layout "types" before each bot message.
    pub typing: Duration,
    /// How long test feedback stays up before advancing on its own.
    pub feedback: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            typing: Duration::from_millis(1000),
            feedback: Duration::from_millis(1500),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Choice {
    pub id: OptionId,
    pub label: String,
}

/// Everything a shell has to render, in the order it has to render it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Typing,
    Greeting {
        title: String,
        description: String,
        color: Option<String>,
        image_url: Option<String>,
    },
    Question {
        index: usize,
        total: usize,
        prompt: String,
        choices: Vec<Choice>,
    },
    UserMessage(String),
    Feedback {
        correct: bool,
        correct_count: usize,
        answered: usize,
    },
    Tallying,
    EmailPrompt,
    EmailRejected(ValidationError),
    Result {
        result: ComputedResult,
        share: Option<ShareLinks>,
    },
    Link {
        kind: LinkKind,
        link: Link,
    },
    Failed(ConfigurationError),
}

/// Turns sequencer transitions into frames for one layout.
///
/// Card layout emits everything at once. Chat layout queues bot messages and
/// plays them one by one, each behind its own typing indicator. Test feedback
/// blocks input until either the user dismisses it or the feedback timer
/// fires, whichever comes first; the held advance is handed out exactly once.
/// Typing and feedback share one timer slot and never overlap.
#[derive(Debug)]
pub struct Presenter {
    layout: Layout,
    timing: Timing,
    frames: mpsc::UnboundedSender<Frame>,
    timer: TimerSlot,
    outbox: VecDeque<Frame>,
    typing: bool,
    feedback: Option<Next>,
}

impl Presenter {
    pub fn new(
        layout: Layout,
        timing: Timing,
        frames: mpsc::UnboundedSender<Frame>,
        wakes: mpsc::UnboundedSender<Wake>,
    ) -> Self {
        Self {
            layout,
            timing,
            frames,
            timer: TimerSlot::new(wakes),
            outbox: VecDeque::new(),
            typing: false,
            feedback: None,
        }
    }

    pub fn layout(&self) -> Layout {
        self.layout
    }

    /// A bot-authored frame.
    pub fn say(&mut self, frame: Frame) {
        match self.layout {
            Layout::Card => self.emit(frame),
            Layout::Chat => {
                self.outbox.push_back(frame);
                if !self.typing {
                    self.start_typing();
                }
            }
        }
    }

    /// A user-authored line. Only the chat layout echoes it back.
    pub fn echo(&mut self, text: impl Into<String>) {
        if self.layout == Layout::Chat {
            self.emit(Frame::UserMessage(text.into()));
        }
    }

    /// Shown right away in both layouts.
    pub fn show(&mut self, frame: Frame) {
        self.emit(frame);
    }

    pub fn hold_feedback(&mut self, correct: bool, correct_count: usize, answered: usize, next: Next) {
        debug_assert!(!self.typing, "feedback while typing");
        self.emit(Frame::Feedback {
            correct,
            correct_count,
            answered,
        });
        self.feedback = Some(next);
        self.timer.arm(self.timing.feedback, WakeKind::Feedback);
    }

    /// Skips the rest of the feedback delay. Returns the same advance the
    /// timer would have, or `None` if it was already handed out.
    pub fn dismiss(&mut self) -> Option<Next> {
        let next = self.feedback.take()?;
        self.timer.cancel();
        Some(next)
    }

    /// Feeds a timer wake back in. A feedback wake returns the held advance.
    pub fn on_wake(&mut self, wake: Wake) -> Option<Next> {
        if !self.timer.take(&wake) {
            tracing::debug!(?wake, "stale wake dropped");
            return None;
        }

        match wake.kind {
            WakeKind::Feedback => self.feedback.take(),
            WakeKind::Typing => {
                self.typing = false;
                if let Some(frame) = self.outbox.pop_front() {
                    self.emit(frame);
                }
                if !self.outbox.is_empty() {
                    self.start_typing();
                }
                None
            }
        }
    }

    /// Input is ignored while this holds.
    pub fn is_busy(&self) -> bool {
        self.typing || self.feedback.is_some()
    }

    pub fn reset(&mut self) {
        self.timer.cancel();
        self.outbox.clear();
        self.typing = false;
        self.feedback = None;
    }

    fn start_typing(&mut self) {
        self.typing = true;
        self.emit(Frame::Typing);
        self.timer.arm(self.timing.typing, WakeKind::Typing);
    }

    fn emit(&self, frame: Frame) {
        if self.frames.send(frame).is_err() {
            tracing::debug!("frame receiver is gone");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn presenter(
        layout: Layout,
    ) -> (
        Presenter,
        mpsc::UnboundedReceiver<Frame>,
        mpsc::UnboundedReceiver<Wake>,
    ) {
        let (frames_tx, frames_rx) = mpsc::unbounded_channel();
        let (wakes_tx, wakes_rx) = mpsc::unbounded_channel();
        (
            Presenter::new(layout, Timing::default(), frames_tx, wakes_tx),
            frames_rx,
            wakes_rx,
        )
    }

    fn drain(frames: &mut mpsc::UnboundedReceiver<Frame>) -> Vec<Frame> {
        let mut out = vec![];
        while let Ok(frame) = frames.try_recv() {
            out.push(frame);
        }
        out
    }

    fn greeting() -> Frame {
        Frame::Greeting {
            title: "Hi".into(),
            description: String::new(),
            color: None,
            image_url: None,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn card_layout_renders_immediately() {
        let (mut presenter, mut frames, _wakes) = presenter(Layout::Card);
        presenter.say(greeting());
        presenter.say(Frame::Tallying);
        presenter.echo("ignored in cards");

        assert_eq!(drain(&mut frames), vec![greeting(), Frame::Tallying]);
        assert!(!presenter.is_busy());
    }

    #[tokio::test(start_paused = true)]
    async fn chat_layout_types_one_message_at_a_time() {
        let (mut presenter, mut frames, mut wakes) = presenter(Layout::Chat);
        presenter.say(greeting());
        presenter.say(Frame::Tallying);
        presenter.echo("me");

        assert_eq!(drain(&mut frames), vec![Frame::Typing, Frame::UserMessage("me".into())]);
        assert!(presenter.is_busy());

        let wake = wakes.recv().await.unwrap();
        assert_eq!(presenter.on_wake(wake), None);
        assert_eq!(drain(&mut frames), vec![greeting(), Frame::Typing]);

        let wake = wakes.recv().await.unwrap();
        presenter.on_wake(wake);
        assert_eq!(drain(&mut frames), vec![Frame::Tallying]);
        assert!(!presenter.is_busy());
    }

    #[tokio::test(start_paused = true)]
    async fn typing_waits_for_the_configured_delay() {
        let (mut presenter, _frames, mut wakes) = presenter(Layout::Chat);
        let started = tokio::time::Instant::now();
        presenter.say(greeting());
        wakes.recv().await.unwrap();
        assert!(started.elapsed() >= Timing::default().typing);
    }

    #[tokio::test(start_paused = true)]
    async fn dismissal_and_expiry_hand_out_one_advance() {
        let (mut presenter, mut frames, mut wakes) = presenter(Layout::Card);
        presenter.hold_feedback(true, 1, 1, Next::Question(1));
        assert_eq!(
            drain(&mut frames),
            vec![Frame::Feedback {
                correct: true,
                correct_count: 1,
                answered: 1
            }]
        );
        assert!(presenter.is_busy());

        let wake = wakes.recv().await.unwrap();
        assert_eq!(presenter.on_wake(wake), Some(Next::Question(1)));
        assert_eq!(presenter.dismiss(), None);
        assert_eq!(presenter.on_wake(wake), None);
        assert!(!presenter.is_busy());
    }

    #[tokio::test(start_paused = true)]
    async fn dismissal_cancels_the_feedback_timer() {
        let (mut presenter, _frames, mut wakes) = presenter(Layout::Card);
        presenter.hold_feedback(false, 0, 1, Next::Question(1));

        assert_eq!(presenter.dismiss(), Some(Next::Question(1)));
        assert_eq!(presenter.dismiss(), None);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(wakes.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn reset_drops_queued_messages() {
        let (mut presenter, mut frames, mut wakes) = presenter(Layout::Chat);
        presenter.say(greeting());
        presenter.say(Frame::Tallying);
        presenter.reset();
        drain(&mut frames);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(wakes.try_recv().is_err());
        assert!(!presenter.is_busy());
        assert!(drain(&mut frames).is_empty());
    }
}
