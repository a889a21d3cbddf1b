use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::time::Duration;

/// Kind of full-screen ad a page can request.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdType {
    Reward,
    Interstitial,
    RewardedInterstitial,
}

impl AdType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdType::Reward => "reward",
            AdType::Interstitial => "interstitial",
            AdType::RewardedInterstitial => "rewarded_interstitial",
        }
    }

    /// Reward-bearing ads only succeed when the user earned the reward.
    pub fn is_reward_bearing(&self) -> bool {
        !matches!(self, AdType::Interstitial)
    }
}

impl Display for AdType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal outcome reported to the page.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AdOutcome {
    Success,
    Cancelled,
    Failed,
    NotAvailable,
}

impl AdOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdOutcome::Success => "success",
            AdOutcome::Cancelled => "cancelled",
            AdOutcome::Failed => "failed",
            AdOutcome::NotAvailable => "not_available",
        }
    }

    /// Maps how a presentation ended onto the page-visible outcome.
    pub fn from_presentation(ad_type: AdType, outcome: &PresentationOutcome) -> Self {
        match outcome {
            PresentationOutcome::EarnedReward => AdOutcome::Success,
            PresentationOutcome::DismissedWithoutReward if ad_type.is_reward_bearing() => {
                AdOutcome::Cancelled
            }
            PresentationOutcome::DismissedWithoutReward => AdOutcome::Success,
            PresentationOutcome::FailedToPresent(_) => AdOutcome::Failed,
        }
    }
}

impl Display for AdOutcome {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The single page-visible result of one ad request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdResult {
    pub ad_type: AdType,
    pub outcome: AdOutcome,
    pub ad_unit: String,
    pub display_index: usize,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct AdRequestOptions {
    /// Present as soon as the ad is loaded, after `delay`
    pub auto_show: bool,
    pub delay: Duration,
}

impl AdRequestOptions {
    pub fn auto_show(delay: Duration) -> Self {
        Self { auto_show: true, delay }
    }
}

/// Opaque reference to an ad loaded by a presenter. Only the presenter that
/// produced it knows what it points to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdHandle {
    id: String,
}

impl AdHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

/// How a presented ad left the screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresentationOutcome {
    EarnedReward,
    DismissedWithoutReward,
    FailedToPresent(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AdLoadError {
    #[error("no ad available for this unit")]
    NoFill,
    #[error("network error: {0}")]
    Network(String),
    #[error("ad sdk error: {0}")]
    Sdk(String),
    #[error("no presenter registered for {0} ads")]
    Unsupported(AdType),
}

/// Internal failure taxonomy of the pipeline. Logged, then translated into an
/// [`AdOutcome`]; never surfaced to callers.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AdFailure {
    #[error("unit {unit:?} failed to load: {source}")]
    LoadFailure { unit: String, source: AdLoadError },
    #[error("unit {unit:?} did not load within {after:?}")]
    Timeout { unit: String, after: Duration },
    #[error("all {units} ad unit(s) failed")]
    ChainExhausted { units: usize },
    #[error("no loaded ad for unit {unit:?}")]
    NotAvailable { unit: String },
}

/// Identifies one load attempt for one unit.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AttemptId(pub(crate) u64);

/// Identifies one pending or running presentation.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PresentationTicket(pub(crate) u64);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ad_type_names_match_bridge_strings() {
        assert_eq!(AdType::Reward.to_string(), "reward");
        assert_eq!(AdType::Interstitial.to_string(), "interstitial");
        assert_eq!(AdType::RewardedInterstitial.to_string(), "rewarded_interstitial");

        let t: AdType = serde_json::from_str("\"rewarded_interstitial\"").unwrap();
        assert_eq!(t, AdType::RewardedInterstitial);
    }

    #[test]
    fn presentation_outcome_mapping() {
        use PresentationOutcome::*;

        assert_eq!(AdOutcome::from_presentation(AdType::Reward, &EarnedReward), AdOutcome::Success);
        assert_eq!(
            AdOutcome::from_presentation(AdType::Reward, &DismissedWithoutReward),
            AdOutcome::Cancelled
        );
        assert_eq!(
            AdOutcome::from_presentation(AdType::RewardedInterstitial, &DismissedWithoutReward),
            AdOutcome::Cancelled
        );
        assert_eq!(
            AdOutcome::from_presentation(AdType::Interstitial, &DismissedWithoutReward),
            AdOutcome::Success
        );
        assert_eq!(
            AdOutcome::from_presentation(AdType::Interstitial, &FailedToPresent("x".into())),
            AdOutcome::Failed
        );
    }

    #[test]
    fn outcome_strings() {
        assert_eq!(AdOutcome::NotAvailable.as_str(), "not_available");
        assert_eq!(AdOutcome::Cancelled.to_string(), "cancelled");
    }
}
