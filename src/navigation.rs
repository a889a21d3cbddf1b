//! Navigation containment: which loads stay in the embedded page and which
//! are handed off to native apps.

mod domain;
mod policy;

pub use domain::{base_domain, same_site};
pub use policy::{NavigationDecision, NavigationKind, NavigationPolicy, NavigationRequest};
