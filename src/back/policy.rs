use serde::{Deserialize, Serialize};
use std::time::Duration;

/// What a back press does.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackActionMode {
    /// Close the browser right away
    Exit,
    /// First press arms, a second press within the timeout closes
    ConfirmExit,
    /// Go back in page history, closing when there is nowhere to go
    #[default]
    HistoryBack,
    Ignore,
}

/// Back-button policy of a session. Pages may replace any of its fields
/// through the bridge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackActionPolicy {
    pub mode: BackActionMode,
    pub confirm_message: String,
    pub confirm_timeout_seconds: f64,
}

impl BackActionPolicy {
    pub fn new(mode: BackActionMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    /// Window in which a second press confirms the exit. Invalid values
    /// collapse to zero.
    pub fn confirm_window(&self) -> Duration {
        Duration::try_from_secs_f64(self.confirm_timeout_seconds).unwrap_or(Duration::ZERO)
    }
}

impl Default for BackActionPolicy {
    fn default() -> Self {
        Self {
            mode: BackActionMode::HistoryBack,
            confirm_message: "Press back again to exit.".to_string(),
            confirm_timeout_seconds: 2.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modes_use_bridge_names() {
        let mode: BackActionMode = serde_json::from_str("\"confirm-exit\"").unwrap();
        assert_eq!(mode, BackActionMode::ConfirmExit);
        let mode: BackActionMode = serde_json::from_str("\"history-back\"").unwrap();
        assert_eq!(mode, BackActionMode::HistoryBack);
        assert_eq!(serde_json::to_string(&BackActionMode::Exit).unwrap(), "\"exit\"");
        assert!(serde_json::from_str::<BackActionMode>("\"back\"").is_err());
    }

    #[test]
    fn default_policy() {
        let policy = BackActionPolicy::default();
        assert_eq!(policy.mode, BackActionMode::HistoryBack);
        assert_eq!(policy.confirm_window(), Duration::from_secs(2));
    }

    #[test]
    fn invalid_timeout_collapses_to_zero() {
        let policy = BackActionPolicy {
            confirm_timeout_seconds: f64::NAN,
            ..BackActionPolicy::default()
        };
        assert_eq!(policy.confirm_window(), Duration::ZERO);
    }
}
