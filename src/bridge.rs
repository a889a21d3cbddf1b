//! Page bridge: messages a page posts to the native side and the callback
//! scripts the native side evaluates in the page.

mod callback;
mod message;

pub use callback::{ad_result_script, consent_script, validate_callback_name};
pub use message::{AdRequestMessage, BridgeMessage};
