use std::time::Duration;

use tokio::{sync::mpsc, task::JoinHandle};

/// Identifies one armed timer. Wakes that carry an older ticket are stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeKind {
    Typing,
    Feedback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Wake {
    pub ticket: Ticket,
    pub kind: WakeKind,
}

/// Holds at most one single-shot timer. Arming a new one cancels the
/// previous one.
#[derive(Debug)]
pub struct TimerSlot {
    wakes: mpsc::UnboundedSender<Wake>,
    pending: Option<(Ticket, JoinHandle<()>)>,
    issued: u64,
}

impl TimerSlot {
    pub fn new(wakes: mpsc::UnboundedSender<Wake>) -> Self {
        Self {
            wakes,
            pending: None,
            issued: 0,
        }
    }

    pub fn arm(&mut self, delay: Duration, kind: WakeKind) -> Ticket {
        self.cancel();
        self.issued += 1;
        let ticket = Ticket(self.issued);
        let wakes = self.wakes.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // The session may be gone already.
            let _ = wakes.send(Wake { ticket, kind });
        });
        self.pending = Some((ticket, handle));
        ticket
    }

    /// Safe to call any number of times, armed or not.
    pub fn cancel(&mut self) -> bool {
        match self.pending.take() {
            Some((_, handle)) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    /// Accepts `wake` if it belongs to the pending timer and disarms it.
    pub fn take(&mut self, wake: &Wake) -> bool {
        match &self.pending {
            Some((ticket, _)) if *ticket == wake.ticket => {
                self.pending = None;
                true
            }
            _ => false,
        }
    }

    pub fn is_armed(&self) -> bool {
        self.pending.is_some()
    }
}

impl Drop for TimerSlot {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn armed_timer_fires_once() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut slot = TimerSlot::new(tx);
        let ticket = slot.arm(Duration::from_millis(1500), WakeKind::Feedback);

        let wake = rx.recv().await.unwrap();
        assert_eq!(wake.ticket, ticket);
        assert!(slot.take(&wake));
        assert!(!slot.take(&wake));
        assert!(!slot.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_timer_never_fires() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut slot = TimerSlot::new(tx);
        slot.arm(Duration::from_millis(1500), WakeKind::Feedback);

        assert!(slot.cancel());
        assert!(!slot.cancel());

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn rearming_makes_the_old_ticket_stale() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut slot = TimerSlot::new(tx);
        let old = slot.arm(Duration::from_millis(100), WakeKind::Typing);
        let new = slot.arm(Duration::from_millis(200), WakeKind::Typing);
        assert_ne!(old, new);

        let wake = rx.recv().await.unwrap();
        assert_eq!(wake.ticket, new);
        assert!(!slot.take(&Wake {
            ticket: old,
            kind: WakeKind::Typing
        }));
        assert!(slot.take(&wake));
    }
}
