//! Full-screen ad delivery: [`AdUnitChain`], [`AdDeliveryPipeline`] and the
//! [`FullscreenAdPresenter`] seam towards the ad SDK.

mod chain;
mod pipeline;
mod presenter;
mod types;

pub use chain::AdUnitChain;
pub use pipeline::{AdAttempt, AdDeliveryPipeline, AdEffect, AttemptState};
pub use presenter::{AdPresenters, FullscreenAdPresenter};
pub use types::{
    AdFailure, AdHandle, AdLoadError, AdOutcome, AdRequestOptions, AdResult, AdType, AttemptId,
    PresentationOutcome, PresentationTicket,
};
