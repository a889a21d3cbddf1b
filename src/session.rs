//! A single in-app browser session.
//!
//! [`SessionController`] owns the session state and all engines and runs as
//! one tokio task. Hosts talk to it through [`SessionHandle`].

mod controller;
mod handle;
mod state;
mod timers;


pub use controller::{SessionController, SessionSnapshot};
pub use handle::SessionHandle;
pub use state::{Session, SessionId};
