use futures::future::BoxFuture;
use futures::FutureExt;
use inapp_browser::ads::{
    AdHandle, AdLoadError, AdPresenters, AdType, FullscreenAdPresenter, PresentationOutcome,
};
use inapp_browser::back::{BackActionMode, BackActionPolicy};
use inapp_browser::consent::{ConsentProvider, TrackingStatus};
use inapp_browser::navigation::{NavigationKind, NavigationRequest};
use inapp_browser::services::{ExternalOpener, HostUi, PageBridge, SessionServices, WebView};
use inapp_browser::{BrowserConfig, BrowserManager, SessionEvent};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use url::Url;

/// Prints every call instead of driving a real web view.
#[derive(Default)]
struct ConsoleShell {
    current: Mutex<Option<Url>>,
}

impl WebView for ConsoleShell {
    fn load_in_place(&self, url: &Url) {
        println!("[webview] load {url}");
        *self.current.lock().unwrap() = Some(url.clone());
    }
    fn go_back(&self) {
        println!("[webview] go back");
    }
    fn current_url(&self) -> Option<Url> {
        self.current.lock().unwrap().clone()
    }
    fn backward_history(&self) -> Vec<Url> {
        vec![]
    }
    fn set_user_agent(&self, user_agent: &str) {
        println!("[webview] user agent {user_agent}");
    }
}

impl ExternalOpener for ConsoleShell {
    fn open_externally(&self, url: &Url) -> bool {
        println!("[os] open {url}");
        url.scheme() != "coupang"
    }
}

impl PageBridge for ConsoleShell {
    fn evaluate(&self, script: &str) {
        println!("[page] {script}");
    }
}

impl HostUi for ConsoleShell {
    fn show_loading_cover(&self) {
        println!("[ui] loading cover on");
    }
    fn hide_loading_cover(&self) {
        println!("[ui] loading cover off");
    }
    fn set_page_loading(&self, loading: bool) {
        println!("[ui] page loading {loading}");
    }
    fn show_confirmation(&self, message: &str) {
        println!("[ui] toast: {message}");
    }
    fn prompt_install(&self, app_hint: Option<&str>) {
        println!("[ui] install prompt for {app_hint:?}");
    }
    fn dismiss(&self) {
        println!("[ui] dismissed");
    }
}

impl ConsentProvider for ConsoleShell {
    fn current_status(&self) -> TrackingStatus {
        TrackingStatus::NotDetermined
    }
    fn request_permission(&self) -> BoxFuture<'static, TrackingStatus> {
        futures::future::ready(TrackingStatus::Authorized).boxed()
    }
    fn advertising_identifier(&self) -> String {
        "00000000-0000-0000-0000-000000000000".into()
    }
}

/// Rewarded ads: the first unit never fills, every other unit loads after
/// a short delay and pays out.
struct DemoRewardAds;

impl FullscreenAdPresenter for DemoRewardAds {
    fn ad_type(&self) -> AdType {
        AdType::Reward
    }

    fn load(&self, unit: &str) -> BoxFuture<'static, Result<AdHandle, AdLoadError>> {
        let unit = unit.to_string();
        async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            if unit.ends_with("primary") {
                Err(AdLoadError::NoFill)
            } else {
                Ok(AdHandle::new(unit))
            }
        }
        .boxed()
    }

    fn present(&self, handle: AdHandle) -> BoxFuture<'static, PresentationOutcome> {
        println!("[ads] presenting {}", handle.id());
        async {
            tokio::time::sleep(Duration::from_millis(300)).await;
            PresentationOutcome::EarnedReward
        }
        .boxed()
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // Configure once, like an app would at startup
    let config = BrowserConfig::builder()
        .url("https://shop.example.com/")
        .debug_enabled(true)
        .back_policy(BackActionPolicy::new(BackActionMode::ConfirmExit))
        .build()?;

    let mut manager = BrowserManager::new();
    manager.initialize(config);

    let shell = Arc::new(ConsoleShell::default());
    let services = SessionServices {
        presenters: AdPresenters::new().register(Arc::new(DemoRewardAds)),
        web_view: shell.clone(),
        opener: shell.clone(),
        bridge: shell.clone(),
        ui: shell.clone(),
        consent: shell.clone(),
    };

    let (session, join) = manager.launch(services, None)?;
    let mut events = session.subscribe_events();

    // The page commits and asks for a rewarded ad with one fallback unit
    session.page_committed(Url::parse("https://shop.example.com/")?).await?;
    let reward = serde_json::json!({
        "type": "reward",
        "adUnit": "ca-app/primary;ca-app/backup",
        "callbackFunction": "window.onReward",
    });
    session.post_message(&reward.to_string()).await?;

    // A few navigations
    for (target, kind) in [
        ("https://m.example.com/deals", NavigationKind::LinkActivated),
        ("https://news.example.org/", NavigationKind::LinkActivated),
        ("coupang://product/42", NavigationKind::LinkActivated),
    ] {
        tokio::time::sleep(Duration::from_millis(600)).await;
        let decision = session
            .decide_navigation(NavigationRequest::new(Url::parse(target)?, kind))
            .await?;
        println!("[demo] {target} -> {decision:?}");
    }

    session
        .post_message(r#"{"type":"checkAdIdConsentStatus","callbackFunction":"onConsent"}"#)
        .await?;

    // Confirm-exit: two presses within the window close the browser
    session.back_pressed().await?;
    session.back_pressed().await?;

    while let Ok(event) = events.recv().await {
        println!("[event] {event:?}");
        if let SessionEvent::Closed { .. } = event {
            break;
        }
    }

    join.await?;
    Ok(())
}
