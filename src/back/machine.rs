use crate::back::BackActionMode;
use crate::events::CloseReason;
use crate::session::Session;
use std::time::Duration;
use tokio::time::Instant;
use url::Url;

/// What the session should do with a back press.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackOutcome {
    Close(CloseReason),
    /// Navigate back and verify the page moved within `verify_after`
    GoBack {
        verify_after: Duration,
        generation: u64,
    },
    ShowConfirmation(String),
    Ignore,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackState {
    Idle,
    AwaitingBackResult {
        original_url: Option<Url>,
        deadline: Instant,
        generation: u64,
    },
    AwaitingConfirmation {
        armed_at: Instant,
    },
}

/// Result of a verification timer reaching the machine.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum VerifyResult {
    /// The timer belongs to an older press
    Stale,
    Moved,
    DidNotMove,
}

/// What the web view reports at the moment of a back press.
#[derive(Debug, Clone, Copy)]
pub struct BackContext<'a> {
    pub current_url: Option<&'a Url>,
    /// Entries the web view can go back to, most recent last
    pub backward_history: &'a [Url],
}

/// Turns back presses into actions according to the session's policy.
///
/// History-back has two guards: repeated presses on the same URL within the
/// loop window close the browser, and a back that leaves the page where it
/// was after the verification timeout closes it as well.
#[derive(Debug)]
pub struct BackActionStateMachine {
    state: BackState,
    verify_timeout: Duration,
    loop_window: Duration,
    loop_threshold: u32,
    terminal_patterns: Vec<String>,
    generation: u64,
}

impl BackActionStateMachine {
    pub fn new(
        verify_timeout: Duration,
        loop_window: Duration,
        loop_threshold: u32,
        terminal_patterns: Vec<String>,
    ) -> Self {
        Self {
            state: BackState::Idle,
            verify_timeout,
            loop_window,
            loop_threshold,
            terminal_patterns,
            generation: 0,
        }
    }

    pub fn state(&self) -> &BackState {
        &self.state
    }

    pub fn reset(&mut self) {
        self.state = BackState::Idle;
    }

    pub fn on_back(
        &mut self,
        session: &mut Session,
        ctx: BackContext<'_>,
        now: Instant,
    ) -> BackOutcome {
        match session.back_policy.mode {
            BackActionMode::Exit => {
                self.state = BackState::Idle;
                BackOutcome::Close(CloseReason::ExitPolicy)
            }
            BackActionMode::Ignore => BackOutcome::Ignore,
            BackActionMode::ConfirmExit => self.confirm_exit(session, now),
            BackActionMode::HistoryBack => self.history_back(session, ctx, now),
        }
    }

    /// The verification timer of `generation` fired. `live_url` is what the
    /// web view shows right now.
    pub fn on_verify_elapsed(
        &mut self,
        session: &mut Session,
        generation: u64,
        live_url: Option<&Url>,
    ) -> VerifyResult {
        let BackState::AwaitingBackResult {
            original_url,
            generation: pending,
            ..
        } = &self.state
        else {
            return VerifyResult::Stale;
        };
        if *pending != generation {
            return VerifyResult::Stale;
        }

        let moved = original_url.as_ref() != live_url;
        self.state = BackState::Idle;
        if moved {
            session.back_action_repeat_count = 0;
            VerifyResult::Moved
        } else {
            VerifyResult::DidNotMove
        }
    }

    /// A page committed. Returns `true` when this resolved a pending
    /// verification, so its timer can be cancelled.
    pub fn on_url_changed(&mut self, session: &mut Session, url: &Url) -> bool {
        match &self.state {
            BackState::AwaitingBackResult { original_url, .. }
                if original_url.as_ref() != Some(url) =>
            {
                self.state = BackState::Idle;
                session.back_action_repeat_count = 0;
                true
            }
            _ => false,
        }
    }

    fn confirm_exit(&mut self, session: &Session, now: Instant) -> BackOutcome {
        let window = session.back_policy.confirm_window();
        if let BackState::AwaitingConfirmation { armed_at } = self.state {
            if now.duration_since(armed_at) < window {
                self.state = BackState::Idle;
                return BackOutcome::Close(CloseReason::ConfirmedExit);
            }
        }

        self.state = BackState::AwaitingConfirmation { armed_at: now };
        BackOutcome::ShowConfirmation(session.back_policy.confirm_message.clone())
    }

    fn history_back(
        &mut self,
        session: &mut Session,
        ctx: BackContext<'_>,
        now: Instant,
    ) -> BackOutcome {
        let url = ctx.current_url.cloned();
        let verifying = matches!(
            self.state,
            BackState::AwaitingBackResult { deadline, .. } if now < deadline
        );

        let repeated = session.last_back_action_url == url
            && session
                .last_back_action_at
                .is_some_and(|at| now.duration_since(at) < self.loop_window);
        if repeated {
            session.back_action_repeat_count += 1;
        } else {
            session.back_action_repeat_count = 1;
        }
        session.last_back_action_url = url.clone();
        session.last_back_action_at = Some(now);

        if session.back_action_repeat_count >= self.loop_threshold {
            log::warn!(
                "Session[{}] back pressed {} times on the same page, closing",
                session.id,
                session.back_action_repeat_count
            );
            self.state = BackState::Idle;
            return BackOutcome::Close(CloseReason::BackLoop);
        }

        // A press during verification only counts towards the loop guard;
        // the pending window keeps its original URL and deadline.
        if verifying {
            return BackOutcome::Ignore;
        }

        if let Some(u) = &url {
            if self.is_terminal_page(u) {
                self.state = BackState::Idle;
                return BackOutcome::Close(CloseReason::TerminalPage);
            }
        }

        let can_go_back = ctx
            .backward_history
            .iter()
            .any(|entry| Some(entry) != url.as_ref());
        if !can_go_back {
            self.state = BackState::Idle;
            return BackOutcome::Close(CloseReason::NoHistory);
        }

        self.generation += 1;
        self.state = BackState::AwaitingBackResult {
            original_url: url,
            deadline: now + self.verify_timeout,
            generation: self.generation,
        };
        BackOutcome::GoBack {
            verify_after: self.verify_timeout,
            generation: self.generation,
        }
    }

    fn is_terminal_page(&self, url: &Url) -> bool {
        let path = url.path();
        self.terminal_patterns.iter().any(|p| path.contains(p.as_str()))
    }
}
