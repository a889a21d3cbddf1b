//! Collaborators a session drives but does not own.
//!
//! The host implements these against its web engine, UI toolkit and OS
//! services. All calls are made from the session worker and must not block.

use crate::ads::AdPresenters;
use crate::consent::ConsentProvider;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;
use url::Url;

/// The embedded web view.
pub trait WebView: Send + Sync {
    fn load_in_place(&self, url: &Url);
    fn go_back(&self);
    /// URL the view is showing right now
    fn current_url(&self) -> Option<Url>;
    /// Entries the view can go back to, most recent last
    fn backward_history(&self) -> Vec<Url>;
    fn set_user_agent(&self, user_agent: &str);
}

pub trait ExternalOpener: Send + Sync {
    /// Hand `url` to the OS. Returns `false` when no installed app can take it.
    fn open_externally(&self, url: &Url) -> bool;
}

/// Script evaluation inside the page.
pub trait PageBridge: Send + Sync {
    fn evaluate(&self, script: &str);
}

/// Native chrome around the web view.
pub trait HostUi: Send + Sync {
    /// Full-screen cover while an ad loads
    fn show_loading_cover(&self);
    fn hide_loading_cover(&self);
    /// Small page-loading indicator
    fn set_page_loading(&self, loading: bool);
    fn show_confirmation(&self, message: &str);
    /// Offer to install the app behind an unhandled deep link
    fn prompt_install(&self, app_hint: Option<&str>);
    /// Remove the browser from screen
    fn dismiss(&self);
}

/// Everything a session needs from the host.
#[derive(Clone)]
pub struct SessionServices {
    pub presenters: AdPresenters,
    pub web_view: Arc<dyn WebView>,
    pub opener: Arc<dyn ExternalOpener>,
    pub bridge: Arc<dyn PageBridge>,
    pub ui: Arc<dyn HostUi>,
    pub consent: Arc<dyn ConsentProvider>,
}

impl Debug for SessionServices {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionServices")
            .field("presenters", &self.presenters)
            .finish_non_exhaustive()
    }
}
