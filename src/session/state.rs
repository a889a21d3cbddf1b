use crate::back::BackActionPolicy;
use serde::Serialize;
use std::collections::VecDeque;
use std::fmt::{Display, Formatter};
use tokio::time::Instant;
use url::Url;
use uuid::Uuid;

/// A unique identifier for a browser session.
///
/// Internally a `SessionId` wraps a [`Uuid`]. It is `Copy` and hashable so it
/// can be used as a log prefix or map key. Treat it as an opaque handle; the
/// representation may change.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Create a new unique `SessionId` using a random UUID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for SessionId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Mutable state of one browser session, shared by the navigation and
/// back-button engines. Lives inside the session worker only.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: SessionId,
    pub current_url: Option<Url>,
    /// Forward-committed loads, oldest first
    history: VecDeque<Url>,
    history_limit: usize,
    pub back_policy: BackActionPolicy,

    pub last_navigation_at: Option<Instant>,
    pub is_navigating_back: bool,

    pub is_moving_to_external_app: bool,
    pub last_external_app_at: Option<Instant>,
    pub pending_external_url: Option<Url>,

    pub last_back_action_url: Option<Url>,
    pub last_back_action_at: Option<Instant>,
    pub back_action_repeat_count: u32,
}

impl Session {
    pub fn new(id: SessionId, back_policy: BackActionPolicy, history_limit: usize) -> Self {
        Self {
            id,
            current_url: None,
            history: VecDeque::new(),
            history_limit: history_limit.max(1),
            back_policy,
            last_navigation_at: None,
            is_navigating_back: false,
            is_moving_to_external_app: false,
            last_external_app_at: None,
            pending_external_url: None,
            last_back_action_url: None,
            last_back_action_at: None,
            back_action_repeat_count: 0,
        }
    }

    pub fn history(&self) -> impl Iterator<Item = &Url> {
        self.history.iter()
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    pub fn current_host(&self) -> Option<&str> {
        self.current_url.as_ref().and_then(|u| u.host_str())
    }

    /// Records a committed main-frame load.
    ///
    /// Loads reached through history navigation are not appended, and a load
    /// never duplicates the entry right before it.
    pub fn record_commit(&mut self, url: Url) {
        if self.is_navigating_back {
            self.is_navigating_back = false;
        } else {
            self.push_history(url.clone());
        }
        self.current_url = Some(url);
    }

    /// Appends `url` unless it is already somewhere in the history.
    pub fn remember(&mut self, url: &Url) {
        if !self.history.contains(url) {
            self.push_history(url.clone());
        }
    }

    pub(crate) fn mark_external(&mut self, now: Instant, pending: Option<Url>) {
        self.is_moving_to_external_app = true;
        self.last_external_app_at = Some(now);
        if pending.is_some() {
            self.pending_external_url = pending;
        }
    }

    fn push_history(&mut self, url: Url) {
        if self.history.back() == Some(&url) {
            return;
        }
        self.history.push_back(url);
        while self.history.len() > self.history_limit {
            self.history.pop_front();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    fn session(limit: usize) -> Session {
        Session::new(SessionId::new(), BackActionPolicy::default(), limit)
    }

    #[test]
    fn commits_append_without_adjacent_duplicates() {
        let mut s = session(50);
        s.record_commit(url("https://a.com/1"));
        s.record_commit(url("https://a.com/1"));
        s.record_commit(url("https://a.com/2"));

        assert_eq!(s.history_len(), 2);
        assert_eq!(s.current_url, Some(url("https://a.com/2")));
        assert_eq!(s.current_host(), Some("a.com"));
    }

    #[test]
    fn history_is_bounded() {
        let mut s = session(50);
        for i in 0..60 {
            s.record_commit(url(&format!("https://a.com/{i}")));
        }
        assert_eq!(s.history_len(), 50);
        assert_eq!(s.history().next(), Some(&url("https://a.com/10")));
    }

    #[test]
    fn back_navigation_is_not_recorded() {
        let mut s = session(50);
        s.record_commit(url("https://a.com/1"));
        s.record_commit(url("https://a.com/2"));

        s.is_navigating_back = true;
        s.record_commit(url("https://a.com/1"));

        assert_eq!(s.history_len(), 2);
        assert!(!s.is_navigating_back);
        assert_eq!(s.current_url, Some(url("https://a.com/1")));
    }

    #[test]
    fn remember_skips_known_urls() {
        let mut s = session(50);
        s.record_commit(url("https://a.com/1"));
        s.record_commit(url("https://a.com/2"));
        s.remember(&url("https://a.com/1"));
        assert_eq!(s.history_len(), 2);
        s.remember(&url("https://a.com/3"));
        assert_eq!(s.history_len(), 3);
    }

    #[test]
    fn session_ids_are_unique() {
        assert_ne!(SessionId::new(), SessionId::new());
    }
}
