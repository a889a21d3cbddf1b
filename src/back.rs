//! Back-button handling: the per-session [`BackActionPolicy`] and the
//! [`BackActionStateMachine`] that turns a back press into an action.

mod machine;
mod policy;

pub use machine::{BackActionStateMachine, BackContext, BackOutcome, BackState, VerifyResult};
pub use policy::{BackActionMode, BackActionPolicy};
