//! Entry point for hosts: configure once, then launch sessions.

use crate::config::BrowserConfig;
use crate::consent::ConsentStore;
use crate::errors::{BrowserError, Result};
use crate::services::SessionServices;
use crate::session::{SessionController, SessionHandle};
use std::sync::Arc;
use tokio::task::JoinHandle;
use url::Url;

/// Owns the browser configuration and the consent record shared by every
/// session it launches. Create one per app and pass it around explicitly.
#[derive(Debug, Default)]
pub struct BrowserManager {
    config: Option<Arc<BrowserConfig>>,
    consent: ConsentStore,
}

impl BrowserManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `config`. Later calls are ignored; use
    /// [`update_config`](Self::update_config) to change it.
    pub fn initialize(&mut self, config: BrowserConfig) {
        if self.config.is_some() {
            log::debug!("Browser manager already initialized");
            return;
        }

        log::info!("Browser manager initialized");
        self.config = Some(Arc::new(config));
    }

    pub fn is_initialized(&self) -> bool {
        self.config.is_some()
    }

    pub fn config(&self) -> Option<&BrowserConfig> {
        self.config.as_deref()
    }

    /// Replaces the configuration for sessions launched from now on.
    pub fn update_config(&mut self, config: BrowserConfig) -> Result<()> {
        if self.config.is_none() {
            return Err(BrowserError::NotInitialized);
        }
        self.config = Some(Arc::new(config));
        Ok(())
    }

    pub fn consent_store(&self) -> ConsentStore {
        self.consent.clone()
    }

    /// Opens a session and spawns its worker on the current tokio runtime.
    /// `url` overrides the configured start URL for this session only.
    pub fn launch(
        &self,
        services: SessionServices,
        url: Option<&str>,
    ) -> Result<(SessionHandle, JoinHandle<()>)> {
        let config = self.config.as_ref().ok_or(BrowserError::NotInitialized)?;

        let config = match url {
            Some(url) => {
                Url::parse(url)?;
                Arc::new(config.with_url(url))
            }
            None => config.clone(),
        };

        let (handle, join) = SessionController::spawn(config, services, self.consent.clone());
        log::info!("Session[{}] launched", handle.id());
        Ok((handle, join))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ads::AdPresenters;
    use crate::consent::{ConsentProvider, TrackingStatus};
    use crate::events::SessionEvent;
    use crate::services::{ExternalOpener, HostUi, PageBridge, WebView};
    use futures::future::BoxFuture;
    use futures::FutureExt;

    struct Inert;

    impl WebView for Inert {
        fn load_in_place(&self, _url: &Url) {}
        fn go_back(&self) {}
        fn current_url(&self) -> Option<Url> {
            None
        }
        fn backward_history(&self) -> Vec<Url> {
            vec![]
        }
        fn set_user_agent(&self, _user_agent: &str) {}
    }

    impl ExternalOpener for Inert {
        fn open_externally(&self, _url: &Url) -> bool {
            true
        }
    }

    impl PageBridge for Inert {
        fn evaluate(&self, _script: &str) {}
    }

    impl HostUi for Inert {
        fn show_loading_cover(&self) {}
        fn hide_loading_cover(&self) {}
        fn set_page_loading(&self, _loading: bool) {}
        fn show_confirmation(&self, _message: &str) {}
        fn prompt_install(&self, _app_hint: Option<&str>) {}
        fn dismiss(&self) {}
    }

    impl ConsentProvider for Inert {
        fn current_status(&self) -> TrackingStatus {
            TrackingStatus::Denied
        }
        fn request_permission(&self) -> BoxFuture<'static, TrackingStatus> {
            futures::future::ready(TrackingStatus::Denied).boxed()
        }
        fn advertising_identifier(&self) -> String {
            String::new()
        }
    }

    fn services() -> SessionServices {
        let inert = Arc::new(Inert);
        SessionServices {
            presenters: AdPresenters::new(),
            web_view: inert.clone(),
            opener: inert.clone(),
            bridge: inert.clone(),
            ui: inert.clone(),
            consent: inert,
        }
    }

    #[tokio::test]
    async fn launch_requires_initialization() {
        let manager = BrowserManager::new();
        assert!(matches!(
            manager.launch(services(), None),
            Err(BrowserError::NotInitialized)
        ));
    }

    #[test]
    fn initialize_only_once() {
        let mut manager = BrowserManager::new();
        manager.initialize(BrowserConfig::default().with_url("https://a.com/"));
        manager.initialize(BrowserConfig::default().with_url("https://b.com/"));
        assert_eq!(manager.config().unwrap().url.as_deref(), Some("https://a.com/"));

        manager
            .update_config(BrowserConfig::default().with_url("https://c.com/"))
            .unwrap();
        assert_eq!(manager.config().unwrap().url.as_deref(), Some("https://c.com/"));
    }

    #[test]
    fn update_before_initialize_fails() {
        let mut manager = BrowserManager::new();
        assert!(matches!(
            manager.update_config(BrowserConfig::default()),
            Err(BrowserError::NotInitialized)
        ));
    }

    #[tokio::test]
    async fn launch_with_url_override() {
        let mut manager = BrowserManager::new();
        manager.initialize(BrowserConfig::default().with_url("https://a.com/"));

        assert!(matches!(
            manager.launch(services(), Some("not a url")),
            Err(BrowserError::InvalidUrl(_))
        ));

        let (handle, join) = manager.launch(services(), Some("https://b.com/start")).unwrap();
        let mut events = handle.subscribe_events();
        handle.shutdown().await.unwrap();
        join.await.unwrap();

        let mut closed = false;
        while let Ok(ev) = events.try_recv() {
            closed |= matches!(ev, SessionEvent::Closed { .. });
        }
        assert!(closed);
        // configured URL is untouched
        assert_eq!(manager.config().unwrap().url.as_deref(), Some("https://a.com/"));
    }
}
