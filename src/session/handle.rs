use crate::back::BackActionPolicy;
use crate::bridge::BridgeMessage;
use crate::errors::{BrowserError, Result};
use crate::events::{SessionCommand, SessionEvent};
use crate::navigation::{NavigationDecision, NavigationRequest};
use crate::session::{SessionId, SessionSnapshot};
use tokio::sync::{broadcast, mpsc, oneshot};
use url::Url;

/// Cloneable handle to a running session. Dropping every handle closes the
/// session.
#[derive(Clone)]
pub struct SessionHandle {
    session_id: SessionId,
    cmd_tx: mpsc::Sender<SessionCommand>,
    event_tx: broadcast::Sender<SessionEvent>,
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("session_id", &self.session_id)
            .field("closed", &self.cmd_tx.is_closed())
            .finish()
    }
}

impl SessionHandle {
    pub(crate) fn new(
        session_id: SessionId,
        cmd_tx: mpsc::Sender<SessionCommand>,
        event_tx: broadcast::Sender<SessionEvent>,
    ) -> Self {
        Self {
            session_id,
            cmd_tx,
            event_tx,
        }
    }

    pub fn id(&self) -> SessionId {
        self.session_id
    }

    /// Events from this point on. Earlier events are not replayed.
    pub fn subscribe_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.event_tx.subscribe()
    }

    pub fn is_closed(&self) -> bool {
        self.cmd_tx.is_closed()
    }

    async fn send(&self, cmd: SessionCommand) -> Result<()> {
        self.cmd_tx.send(cmd).await.map_err(|_| BrowserError::SessionClosed)
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> SessionCommand,
    ) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.send(make(tx)).await?;
        rx.await.map_err(|_| BrowserError::ChannelClosed)
    }

    /// Decode a raw message body posted by the page and forward it.
    pub async fn post_message(&self, json: &str) -> Result<()> {
        let msg = BridgeMessage::decode(json)?;
        self.post(msg).await
    }

    pub async fn post(&self, msg: BridgeMessage) -> Result<()> {
        self.send(SessionCommand::Bridge(msg)).await
    }

    pub async fn decide_navigation(
        &self,
        request: NavigationRequest,
    ) -> Result<NavigationDecision> {
        self.request(|reply| SessionCommand::DecideNavigation { request, reply })
            .await
    }

    pub async fn decide_new_window(&self, url: Url) -> Result<NavigationDecision> {
        self.request(|reply| SessionCommand::DecideNewWindow { url, reply }).await
    }

    pub async fn page_load_started(&self) -> Result<()> {
        self.send(SessionCommand::PageLoadStarted).await
    }

    pub async fn page_committed(&self, url: Url) -> Result<()> {
        self.send(SessionCommand::PageCommitted { url }).await
    }

    pub async fn page_load_finished(&self, url: Url) -> Result<()> {
        self.send(SessionCommand::PageLoadFinished { url }).await
    }

    pub async fn back_pressed(&self) -> Result<()> {
        self.send(SessionCommand::BackPressed).await
    }

    pub async fn close_pressed(&self) -> Result<()> {
        self.send(SessionCommand::ClosePressed).await
    }

    pub async fn set_back_policy(&self, policy: BackActionPolicy) -> Result<()> {
        self.send(SessionCommand::SetBackPolicy(policy)).await
    }

    pub async fn app_resumed(&self) -> Result<()> {
        self.send(SessionCommand::AppResumed).await
    }

    /// Current session state. Also a barrier: every command sent before it
    /// has been handled once this returns.
    pub async fn snapshot(&self) -> Result<SessionSnapshot> {
        self.request(|reply| SessionCommand::Snapshot { reply }).await
    }

    /// Close the session and wait until it is torn down.
    pub async fn shutdown(&self) -> Result<()> {
        self.request(|reply| SessionCommand::Shutdown { reply }).await
    }
}
