use crate::ads::{AttemptId, PresentationTicket};
use crate::session::controller::InternalEvent;
use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Identity of a timer or background task owned by a session.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub(crate) enum TimerKey {
    AdLoad(AttemptId),
    AdTimeout(AttemptId),
    PresentationDelay(PresentationTicket),
    Presentation(PresentationTicket),
    BackVerification,
    ConsentPrompt(u64),
}

/// Session-scoped timers and tasks. Each one runs under a child of the
/// session's root token and reports back over the worker's internal channel.
/// Nothing reports after [`TimerSet::cancel_all`].
pub(crate) struct TimerSet {
    root: CancellationToken,
    active: HashMap<TimerKey, CancellationToken>,
    tx: mpsc::UnboundedSender<InternalEvent>,
}

impl TimerSet {
    pub fn new(tx: mpsc::UnboundedSender<InternalEvent>) -> Self {
        Self {
            root: CancellationToken::new(),
            active: HashMap::new(),
            tx,
        }
    }

    /// Delivers `event` after `after`, replacing any timer with the same key.
    pub fn schedule(&mut self, key: TimerKey, after: Duration, event: InternalEvent) {
        self.spawn(key, tokio::time::sleep(after), move |_| event);
    }

    /// Runs `fut` and delivers its output mapped through `map`, replacing any
    /// task with the same key. Cancelling drops `fut`.
    pub fn spawn<F, T, M>(&mut self, key: TimerKey, fut: F, map: M)
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
        M: FnOnce(T) -> InternalEvent + Send + 'static,
    {
        let token = self.arm(key);
        let tx = self.tx.clone();

        tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = token.cancelled() => {}
                out = fut => {
                    if !token.is_cancelled() {
                        let _ = tx.send(map(out));
                    }
                }
            }
        });
    }

    pub fn cancel(&mut self, key: TimerKey) {
        if let Some(token) = self.active.remove(&key) {
            token.cancel();
        }
    }

    /// Forget a timer that already delivered its event.
    pub fn settle(&mut self, key: TimerKey) {
        self.active.remove(&key);
    }

    pub fn is_armed(&self, key: TimerKey) -> bool {
        self.active.contains_key(&key)
    }

    pub fn cancel_all(&mut self) {
        self.root.cancel();
        self.active.clear();
    }

    fn arm(&mut self, key: TimerKey) -> CancellationToken {
        if let Some(old) = self.active.remove(&key) {
            old.cancel();
        }

        let token = self.root.child_token();
        self.active.insert(key, token.clone());
        token
    }
}
