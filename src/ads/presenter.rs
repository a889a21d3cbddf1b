use crate::ads::{AdHandle, AdLoadError, AdType, PresentationOutcome};
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

/// Capability an ad SDK exposes for one ad type. The session owns one
/// presenter per [`AdType`] and never inspects the concrete ad objects.
pub trait FullscreenAdPresenter: Send + Sync {
    fn ad_type(&self) -> AdType;

    /// Load an ad for `unit`. The session races this against its own timeout
    /// and drops the future when the attempt is abandoned.
    fn load(&self, unit: &str) -> BoxFuture<'static, Result<AdHandle, AdLoadError>>;

    /// Present a loaded ad; resolves once it leaves the screen.
    fn present(&self, handle: AdHandle) -> BoxFuture<'static, PresentationOutcome>;
}

/// Registry of presenters, keyed by the ad type they serve.
#[derive(Clone, Default)]
pub struct AdPresenters {
    by_type: HashMap<AdType, Arc<dyn FullscreenAdPresenter>>,
}

impl AdPresenters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a presenter under its own [`FullscreenAdPresenter::ad_type`],
    /// replacing any earlier one.
    pub fn register(mut self, presenter: Arc<dyn FullscreenAdPresenter>) -> Self {
        self.by_type.insert(presenter.ad_type(), presenter);
        self
    }

    pub fn get(&self, ad_type: AdType) -> Option<Arc<dyn FullscreenAdPresenter>> {
        self.by_type.get(&ad_type).cloned()
    }
}

impl Debug for AdPresenters {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let mut types: Vec<_> = self.by_type.keys().map(|t| t.as_str()).collect();
        types.sort_unstable();
        f.debug_struct("AdPresenters").field("types", &types).finish()
    }
}
