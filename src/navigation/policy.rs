use crate::config::{BrowserConfig, DeepLinkScheme};
use crate::navigation::domain::same_site;
use crate::session::Session;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;
use url::Url;

/// What triggered a navigation, as reported by the web view.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NavigationKind {
    BackForward,
    Reload,
    FormSubmit,
    LinkActivated,
    Other,
}

impl NavigationKind {
    /// Kinds that are dropped when they follow another navigation too
    /// closely. Form submissions still move the clock but always go through.
    fn is_debounced(&self) -> bool {
        matches!(self, NavigationKind::LinkActivated | NavigationKind::Other)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationRequest {
    pub url: Url,
    pub kind: NavigationKind,
    pub is_main_frame: bool,
}

impl NavigationRequest {
    pub fn new(url: Url, kind: NavigationKind) -> Self {
        Self {
            url,
            kind,
            is_main_frame: true,
        }
    }

    pub fn sub_frame(mut self) -> Self {
        self.is_main_frame = false;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationDecision {
    AllowInPlace,
    /// A new-window request that is loaded in the current view instead
    AllowNewInPlace,
    /// Hand the URL to a native app, optionally naming which one
    RedirectToExternalApp(Option<String>),
    Block,
}

/// Ordered rule set that routes every navigation of a session.
///
/// Rules are evaluated first-match-wins. Deciding mutates the session's
/// debounce clock and external hand-off bookkeeping; the load itself is left
/// to the caller.
#[derive(Debug, Clone)]
pub struct NavigationPolicy {
    debounce: Duration,
    external_dedupe_window: Duration,
    deep_link_schemes: Vec<DeepLinkScheme>,
    app_store_schemes: Vec<String>,
    app_store_hosts: Vec<String>,
    ad_domains: Vec<String>,
    auth_hosts: Vec<String>,
}

impl NavigationPolicy {
    pub fn from_config(config: &BrowserConfig) -> Self {
        Self {
            debounce: config.navigation_debounce,
            external_dedupe_window: config.external_dedupe_window,
            deep_link_schemes: config.deep_link_schemes.clone(),
            app_store_schemes: config.app_store_schemes.clone(),
            app_store_hosts: config.app_store_hosts.clone(),
            ad_domains: config.ad_domains.clone(),
            auth_hosts: config.auth_hosts.clone(),
        }
    }

    pub fn decide(
        &self,
        req: &NavigationRequest,
        session: &mut Session,
        now: Instant,
    ) -> NavigationDecision {
        let url = &req.url;

        if req.kind == NavigationKind::BackForward {
            session.is_navigating_back = true;
            return NavigationDecision::AllowInPlace;
        }

        // The first load and sub-frames never touch the debounce clock.
        let initial_load = session.current_url.is_none();
        if !initial_load && req.is_main_frame {
            if req.kind.is_debounced() {
                if let Some(last) = session.last_navigation_at {
                    if now.duration_since(last) < self.debounce {
                        log::debug!("Session[{}] debounced navigation to {}", session.id, url);
                        return NavigationDecision::Block;
                    }
                }
            }
            session.last_navigation_at = Some(now);
        }

        if self.is_duplicate_external(url, session, now) {
            session.pending_external_url = None;
            return NavigationDecision::Block;
        }

        if matches!(url.scheme(), "about" | "javascript" | "data") {
            return NavigationDecision::AllowInPlace;
        }

        if url.host_str().is_some_and(|h| self.is_auth_host(h)) {
            return NavigationDecision::AllowInPlace;
        }

        if let Some(decision) = self.external_scheme(url, session, now) {
            return decision;
        }

        let (Some(current), Some(candidate)) = (session.current_host(), url.host_str()) else {
            return NavigationDecision::AllowInPlace;
        };
        if same_site(current, candidate) {
            return NavigationDecision::AllowInPlace;
        }

        if !req.is_main_frame {
            return NavigationDecision::AllowInPlace;
        }

        if req.kind == NavigationKind::LinkActivated {
            let pending = self.is_ad_domain(candidate).then(|| url.clone());
            session.mark_external(now, pending);
            return NavigationDecision::RedirectToExternalApp(None);
        }

        NavigationDecision::AllowInPlace
    }

    /// Routes a page request to open `url` in a new window. Same-site targets
    /// load in the current view and are remembered in history.
    pub fn decide_new_window(
        &self,
        url: &Url,
        session: &mut Session,
        now: Instant,
    ) -> NavigationDecision {
        if let Some(decision) = self.external_scheme(url, session, now) {
            return decision;
        }

        let same = match (session.current_host(), url.host_str()) {
            (Some(current), Some(candidate)) => same_site(current, candidate),
            _ => true,
        };
        if same {
            session.remember(url);
            return NavigationDecision::AllowNewInPlace;
        }

        session.mark_external(now, None);
        NavigationDecision::RedirectToExternalApp(None)
    }

    /// Deep links, app-store links and any other non-web scheme.
    fn external_scheme(
        &self,
        url: &Url,
        session: &mut Session,
        now: Instant,
    ) -> Option<NavigationDecision> {
        let scheme = url.scheme();

        if let Some(hint) = self.deep_link_hint(scheme) {
            session.mark_external(now, None);
            return Some(NavigationDecision::RedirectToExternalApp(Some(hint.to_string())));
        }

        if self.is_app_store(url) {
            session.mark_external(now, None);
            return Some(NavigationDecision::RedirectToExternalApp(None));
        }

        if !matches!(scheme, "http" | "https" | "about" | "javascript" | "data") {
            session.mark_external(now, None);
            return Some(NavigationDecision::RedirectToExternalApp(Some(scheme.to_string())));
        }

        None
    }

    fn is_duplicate_external(&self, url: &Url, session: &Session, now: Instant) -> bool {
        match (&session.pending_external_url, session.last_external_app_at) {
            (Some(pending), Some(at)) => {
                now.duration_since(at) < self.external_dedupe_window && pending == url
            }
            _ => false,
        }
    }

    fn deep_link_hint(&self, scheme: &str) -> Option<&str> {
        self.deep_link_schemes
            .iter()
            .find(|d| d.scheme.eq_ignore_ascii_case(scheme))
            .map(|d| d.app_hint.as_str())
    }

    fn is_app_store(&self, url: &Url) -> bool {
        if self.app_store_schemes.iter().any(|s| s.eq_ignore_ascii_case(url.scheme())) {
            return true;
        }
        url.host_str()
            .is_some_and(|h| self.app_store_hosts.iter().any(|s| s.eq_ignore_ascii_case(h)))
    }

    fn is_auth_host(&self, host: &str) -> bool {
        self.auth_hosts.iter().any(|h| h.eq_ignore_ascii_case(host))
    }

    fn is_ad_domain(&self, host: &str) -> bool {
        let host = host.to_ascii_lowercase();
        self.ad_domains
            .iter()
            .any(|d| host == *d || host.ends_with(&format!(".{d}")))
    }
}
