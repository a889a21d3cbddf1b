//! In-app browser session core.
//!
//! Embeds a host page inside a native shell and brokers three host services to
//! it: full-screen ad delivery with multi-unit fallback, navigation
//! containment, and a configurable back-button policy. Rendering, the ad SDK and
//! the web engine itself are collaborators reached through the traits in
//! [`services`] and [`ads::FullscreenAdPresenter`].
//!
//! A session runs as a single worker task (see [`session::SessionController`])
//! and is driven through a cloneable [`session::SessionHandle`].

pub mod ads;
pub mod back;
pub mod bridge;
pub mod config;
pub mod consent;
pub mod errors;
pub mod events;
pub mod manager;
pub mod navigation;
pub mod services;
pub mod session;

pub use config::{BrowserConfig, BrowserConfigBuilder};
pub use errors::{BrowserError, Result};
pub use events::{CloseReason, SessionEvent};
pub use manager::BrowserManager;
pub use session::{SessionController, SessionHandle, SessionId};

/// Capacity of the command and event channels of a session.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 128;
