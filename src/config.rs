//! Browser configuration.
//!
//! `BrowserConfig` controls a single in-app browser session: the start URL,
//! the identity it presents to pages, the default back-button policy, and
//! every timing window and lookup table the session engines consult.
//!
//! `BrowserConfig` provides sensible defaults via [`Default`] and a fluent
//! [`BrowserConfig::builder()`] for customization with validation.
//!
//! # Examples
//!
//! ## Use defaults
//! ```rust
//! use inapp_browser::config::BrowserConfig;
//! let cfg = BrowserConfig::default();
//! assert_eq!(cfg.history_limit, 50);
//! ```
//!
//! ## Customize with the builder
//! ```rust
//! use inapp_browser::config::BrowserConfig;
//! use inapp_browser::back::{BackActionMode, BackActionPolicy};
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let cfg = BrowserConfig::builder()
//!     .url("https://shop.example.com/")
//!     .debug_enabled(true)
//!     .back_policy(BackActionPolicy::new(BackActionMode::ConfirmExit))
//!     .build()?; // returns Result<BrowserConfig, ConfigError>
//! # Ok(()) }
//! ```
//!
//! # Errors
//!
//! Builder validation can return [`ConfigError`] if values are invalid
//! (e.g. an unparsable start URL, a zero history limit, or a negative
//! confirmation timeout).

use crate::back::BackActionPolicy;
use std::fmt;
use std::time::Duration;
use url::Url;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0 Mobile/15E148 Safari/604.1";

/// A custom URL scheme that belongs to a known native app.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeepLinkScheme {
    pub scheme: String,
    pub app_hint: String,
}

impl DeepLinkScheme {
    pub fn new(scheme: impl Into<String>, app_hint: impl Into<String>) -> Self {
        Self {
            scheme: scheme.into(),
            app_hint: app_hint.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BrowserConfig {
    /// Page loaded when the session opens
    pub url: Option<String>,
    pub user_agent: String,
    pub debug_enabled: bool,
    /// Back-button policy a fresh session starts with
    pub back_policy: BackActionPolicy,

    /// Budget for a single ad unit attempt
    pub ad_attempt_timeout: Duration,
    pub navigation_debounce: Duration,
    /// Window in which a repeated hand-off of the same URL is swallowed
    pub external_dedupe_window: Duration,
    /// How long a history-back waits for the page to actually move
    pub back_verify_timeout: Duration,
    pub back_loop_window: Duration,
    pub back_loop_threshold: u32,
    pub history_limit: usize,

    pub deep_link_schemes: Vec<DeepLinkScheme>,
    pub app_store_schemes: Vec<String>,
    pub app_store_hosts: Vec<String>,
    pub ad_domains: Vec<String>,
    /// Hosts that must stay in place so login flows complete
    pub auth_hosts: Vec<String>,
    pub terminal_page_patterns: Vec<String>,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            url: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            debug_enabled: false,
            back_policy: BackActionPolicy::default(),

            ad_attempt_timeout: Duration::from_secs(7),
            navigation_debounce: Duration::from_millis(500),
            external_dedupe_window: Duration::from_secs(2),
            back_verify_timeout: Duration::from_secs(3),
            back_loop_window: Duration::from_secs(5),
            back_loop_threshold: 3,
            history_limit: 50,

            deep_link_schemes: vec![
                DeepLinkScheme::new("coupang", "coupang"),
                DeepLinkScheme::new("kakaotalk", "kakaotalk"),
                DeepLinkScheme::new("kakaolink", "kakaotalk"),
                DeepLinkScheme::new("kakaoplus", "kakaotalk"),
            ],
            app_store_schemes: strings(&["itms-apps", "itms-appss", "market"]),
            app_store_hosts: strings(&["apps.apple.com", "itunes.apple.com", "play.google.com"]),
            ad_domains: strings(&[
                "doubleclick.net",
                "googleadservices.com",
                "googlesyndication.com",
                "adservice.google.com",
            ]),
            auth_hosts: strings(&["accounts.google.com", "oauth2.googleapis.com"]),
            terminal_page_patterns: strings(&[
                "/success", "/error", "/complete", "/finish", "/done", "/result",
            ]),
        }
    }
}

impl BrowserConfig {
    pub fn builder() -> BrowserConfigBuilder {
        BrowserConfigBuilder::default()
    }

    /// Returns a copy of this config pointing at another start URL.
    pub fn with_url(&self, url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..self.clone()
        }
    }

    /// Parsed start URL, if one is configured and valid.
    pub fn start_url(&self) -> Option<Url> {
        self.url.as_deref().and_then(|u| Url::parse(u).ok())
    }
}

/// Builder for [`BrowserConfig`], mirroring the zone config builder.
#[derive(Debug, Clone, Default)]
pub struct BrowserConfigBuilder {
    inner: BrowserConfig,
}

impl BrowserConfigBuilder {
    #[inline]
    fn map(mut self, f: impl FnOnce(&mut BrowserConfig)) -> Self {
        f(&mut self.inner);
        self
    }

    pub fn url<S: Into<String>>(self, url: S) -> Self { self.map(|c| c.url = Some(url.into())) }
    pub fn user_agent<S: Into<String>>(self, ua: S) -> Self { self.map(|c| c.user_agent = ua.into()) }
    pub fn debug_enabled(self, on: bool) -> Self { self.map(|c| c.debug_enabled = on) }
    pub fn back_policy(self, policy: BackActionPolicy) -> Self { self.map(|c| c.back_policy = policy) }
    pub fn ad_attempt_timeout(self, d: Duration) -> Self { self.map(|c| c.ad_attempt_timeout = d) }
    pub fn navigation_debounce(self, d: Duration) -> Self { self.map(|c| c.navigation_debounce = d) }
    pub fn external_dedupe_window(self, d: Duration) -> Self { self.map(|c| c.external_dedupe_window = d) }
    pub fn back_verify_timeout(self, d: Duration) -> Self { self.map(|c| c.back_verify_timeout = d) }
    pub fn back_loop_window(self, d: Duration) -> Self { self.map(|c| c.back_loop_window = d) }
    pub fn back_loop_threshold(self, n: u32) -> Self { self.map(|c| c.back_loop_threshold = n) }
    pub fn history_limit(self, n: usize) -> Self { self.map(|c| c.history_limit = n) }
    pub fn deep_link_scheme<S: Into<String>, H: Into<String>>(self, scheme: S, hint: H) -> Self {
        self.map(|c| c.deep_link_schemes.push(DeepLinkScheme::new(scheme, hint)))
    }
    pub fn ad_domain<S: Into<String>>(self, domain: S) -> Self { self.map(|c| c.ad_domains.push(domain.into())) }
    pub fn auth_host<S: Into<String>>(self, host: S) -> Self { self.map(|c| c.auth_hosts.push(host.into())) }

    /// Apply multiple changes in one go.
    pub fn with(self, f: impl FnOnce(&mut BrowserConfig)) -> Self { self.map(f) }

    /// Validate and build the final config.
    pub fn build(self) -> Result<BrowserConfig, ConfigError> {
        validate(&self.inner)?;
        Ok(self.inner)
    }
}

// ---------- Validation ----------

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    InvalidUrl(String),
    ZeroHistoryLimit,
    ZeroLoopThreshold,
    ZeroAdTimeout,
    InvalidConfirmTimeout(f64),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidUrl(u) => write!(f, "start url {u:?} cannot be parsed"),
            ConfigError::ZeroHistoryLimit => write!(f, "history_limit must be at least 1"),
            ConfigError::ZeroLoopThreshold => write!(f, "back_loop_threshold must be at least 1"),
            ConfigError::ZeroAdTimeout => write!(f, "ad_attempt_timeout must be non-zero"),
            ConfigError::InvalidConfirmTimeout(t) => {
                write!(f, "confirm timeout {t} must be a finite, non-negative number of seconds")
            }
        }
    }
}
impl std::error::Error for ConfigError {}

fn validate(c: &BrowserConfig) -> Result<(), ConfigError> {
    if let Some(url) = &c.url {
        if Url::parse(url).is_err() {
            return Err(ConfigError::InvalidUrl(url.clone()));
        }
    }
    if c.history_limit == 0 {
        return Err(ConfigError::ZeroHistoryLimit);
    }
    if c.back_loop_threshold == 0 {
        return Err(ConfigError::ZeroLoopThreshold);
    }
    if c.ad_attempt_timeout.is_zero() {
        return Err(ConfigError::ZeroAdTimeout);
    }
    let t = c.back_policy.confirm_timeout_seconds;
    if !t.is_finite() || t < 0.0 {
        return Err(ConfigError::InvalidConfirmTimeout(t));
    }
    Ok(())
}
