use crate::ads::{AdRequestOptions, AdType};
use crate::back::BackActionMode;
use crate::bridge::validate_callback_name;
use crate::errors::{BrowserError, Result};
use serde::Deserialize;
use std::time::Duration;

/// Message posted by a page, decoded at the bridge boundary.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type")]
pub enum BridgeMessage {
    #[serde(rename = "reward")]
    Reward(AdRequestMessage),
    #[serde(rename = "interstitial")]
    Interstitial(AdRequestMessage),
    #[serde(rename = "rewarded_interstitial")]
    RewardedInterstitial(AdRequestMessage),
    /// Close the browser
    #[serde(rename = "close")]
    Close,
    #[serde(rename = "setBackAction")]
    SetBackAction { action: BackActionMode },
    #[serde(rename = "setBackConfirmMessage")]
    SetBackConfirmMessage { message: String },
    /// Confirmation window in seconds
    #[serde(rename = "setBackConfirmTimeout")]
    SetBackConfirmTimeout { timeout: f64 },
    /// Act as if the user pressed back
    #[serde(rename = "triggerBackAction")]
    TriggerBackAction,
    #[serde(rename = "requestAdIdConsent")]
    RequestAdIdConsent {
        #[serde(rename = "callbackFunction")]
        callback_function: String,
    },
    #[serde(rename = "checkAdIdConsentStatus")]
    CheckAdIdConsentStatus {
        #[serde(rename = "callbackFunction")]
        callback_function: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdRequestMessage {
    /// `;`-separated fallback chain
    pub ad_unit: String,
    pub callback_function: String,
    #[serde(default)]
    pub delay_ms: Option<u64>,
    #[serde(default)]
    pub auto_show: bool,
}

impl AdRequestMessage {
    pub fn options(&self) -> AdRequestOptions {
        AdRequestOptions {
            auto_show: self.auto_show,
            delay: Duration::from_millis(self.delay_ms.unwrap_or(0)),
        }
    }
}

impl BridgeMessage {
    /// Decodes and validates a JSON message body.
    pub fn decode(json: &str) -> Result<Self> {
        let msg: BridgeMessage = serde_json::from_str(json)?;
        msg.validate()?;
        Ok(msg)
    }

    /// Ad type and request fields of ad messages.
    pub fn ad_request(&self) -> Option<(AdType, &AdRequestMessage)> {
        match self {
            BridgeMessage::Reward(m) => Some((AdType::Reward, m)),
            BridgeMessage::Interstitial(m) => Some((AdType::Interstitial, m)),
            BridgeMessage::RewardedInterstitial(m) => Some((AdType::RewardedInterstitial, m)),
            _ => None,
        }
    }

    fn validate(&self) -> Result<()> {
        if let Some((_, m)) = self.ad_request() {
            return validate_callback_name(&m.callback_function);
        }

        match self {
            BridgeMessage::RequestAdIdConsent { callback_function }
            | BridgeMessage::CheckAdIdConsentStatus { callback_function } => {
                validate_callback_name(callback_function)
            }
            BridgeMessage::SetBackConfirmTimeout { timeout }
                if !timeout.is_finite() || *timeout < 0.0 =>
            {
                Err(BrowserError::InvalidMessage(format!("invalid confirm timeout {timeout}")))
            }
            _ => Ok(()),
        }
    }
}
