//! Session events and commands.
//!
//! Defines what flows into a session worker ([`SessionCommand`]) and what the
//! worker broadcasts back to the host ([`SessionEvent`]).
//!
//! # Main Types
//!
//! - [`SessionCommand`]: Commands from the host and the page bridge.
//! - [`SessionEvent`]: Events emitted by a session, such as ad results and closing.
//! - [`CloseReason`]: Why a session closed.

use crate::ads::AdResult;
use crate::back::BackActionPolicy;
use crate::bridge::BridgeMessage;
use crate::consent::TrackingStatus;
use crate::navigation::{NavigationDecision, NavigationRequest};
use crate::session::{SessionId, SessionSnapshot};
use serde::Serialize;
use std::fmt::Display;
use tokio::sync::oneshot;
use url::Url;

/// Why a session was closed
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum CloseReason {
    /// The page posted a close message
    PageRequested,
    /// The user tapped the close button
    CloseButton,
    /// Back pressed under the exit policy
    ExitPolicy,
    /// Second back press within the confirmation window
    ConfirmedExit,
    /// Back pressed repeatedly on the same page
    BackLoop,
    TerminalPage,
    /// History back did not change the page
    BackDidNotMove,
    NoHistory,
    /// The host dropped or shut down the session
    HostShutdown,
}

impl Display for CloseReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CloseReason::PageRequested => write!(f, "page requested"),
            CloseReason::CloseButton => write!(f, "close button"),
            CloseReason::ExitPolicy => write!(f, "exit policy"),
            CloseReason::ConfirmedExit => write!(f, "confirmed exit"),
            CloseReason::BackLoop => write!(f, "back loop"),
            CloseReason::TerminalPage => write!(f, "terminal page"),
            CloseReason::BackDidNotMove => write!(f, "back did not move"),
            CloseReason::NoHistory => write!(f, "no history"),
            CloseReason::HostShutdown => write!(f, "host shutdown"),
        }
    }
}

/// Commands that can be sent to a session worker
#[derive(Debug)]
pub enum SessionCommand {
    // ****************************************
    // ** Page bridge
    /// Decoded message posted by the page
    Bridge(BridgeMessage),

    // ****************************************
    // ** Navigation
    /// Decide whether a navigation may proceed in place
    DecideNavigation {
        request: NavigationRequest,
        reply: oneshot::Sender<NavigationDecision>,
    },
    /// Decide what to do with a request to open a new window
    DecideNewWindow {
        url: Url,
        reply: oneshot::Sender<NavigationDecision>,
    },
    /// Main frame started loading
    PageLoadStarted,
    /// Main frame committed to a new URL
    PageCommitted { url: Url },
    /// Main frame finished loading
    PageLoadFinished { url: Url },

    // ****************************************
    // ** Back / close
    BackPressed,
    ClosePressed,
    SetBackPolicy(BackActionPolicy),

    // ****************************************
    // ** Host lifecycle
    /// The host app came back to the foreground
    AppResumed,
    Snapshot {
        reply: oneshot::Sender<SessionSnapshot>,
    },
    /// Close the session and wait for teardown
    Shutdown { reply: oneshot::Sender<()> },
}

#[derive(Debug, Clone)]
pub enum SessionEvent {
    // ****************************************
    // ** Session lifecycle
    /// Session worker is running
    Opened { session_id: SessionId, url: Option<Url> },
    /// Session has been torn down. Nothing is emitted after this.
    Closed { session_id: SessionId, reason: CloseReason },

    // ****************************************
    // ** Navigation
    /// A navigation policy decision was made
    NavigationDecided {
        session_id: SessionId,
        url: Url,
        decision: NavigationDecision,
    },
    /// No app could handle an external hand-off
    ExternalAppUnavailable {
        session_id: SessionId,
        url: Url,
        app_hint: Option<String>,
    },

    // ****************************************
    // ** Page services
    /// An ad request reached its terminal result
    AdResult {
        session_id: SessionId,
        callback: String,
        result: AdResult,
    },
    /// Confirm-exit prompt is shown
    BackConfirmationShown { session_id: SessionId, message: String },
    /// A consent status was reported to the page
    ConsentResult {
        session_id: SessionId,
        callback: String,
        status: TrackingStatus,
    },
}

impl SessionEvent {
    pub fn session_id(&self) -> SessionId {
        match self {
            SessionEvent::Opened { session_id, .. }
            | SessionEvent::Closed { session_id, .. }
            | SessionEvent::NavigationDecided { session_id, .. }
            | SessionEvent::ExternalAppUnavailable { session_id, .. }
            | SessionEvent::AdResult { session_id, .. }
            | SessionEvent::BackConfirmationShown { session_id, .. }
            | SessionEvent::ConsentResult { session_id, .. } => *session_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn close_reason_display() {
        assert_eq!(CloseReason::BackDidNotMove.to_string(), "back did not move");
        assert_eq!(CloseReason::HostShutdown.to_string(), "host shutdown");
    }

    #[test]
    fn event_exposes_session_id() {
        let id = SessionId::new();
        let ev = SessionEvent::Closed {
            session_id: id,
            reason: CloseReason::CloseButton,
        };
        assert_eq!(ev.session_id(), id);
    }
}
