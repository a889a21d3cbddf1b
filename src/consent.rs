//! Advertising-identifier consent.
//!
//! The OS tracking permission is owned by a [`ConsentProvider`]; the
//! [`ConsentStore`] remembers what the user answered across sessions of one
//! [`BrowserManager`](crate::BrowserManager).

use futures::future::BoxFuture;
use serde::Serialize;
use std::sync::{Arc, PoisonError, RwLock};

/// OS-level tracking authorization.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum TrackingStatus {
    NotDetermined,
    Restricted,
    Denied,
    Authorized,
}

impl TrackingStatus {
    /// Numeric code reported to pages
    pub fn code(&self) -> u8 {
        match self {
            TrackingStatus::NotDetermined => 0,
            TrackingStatus::Restricted => 1,
            TrackingStatus::Denied => 2,
            TrackingStatus::Authorized => 3,
        }
    }
}

pub trait ConsentProvider: Send + Sync {
    fn current_status(&self) -> TrackingStatus;

    /// Ask the user. Resolves with the status after the prompt closes.
    fn request_permission(&self) -> BoxFuture<'static, TrackingStatus>;

    fn advertising_identifier(&self) -> String;
}

/// What a consent callback hands to the page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsentPayload {
    pub status: TrackingStatus,
    pub status_code: u8,
    /// Empty unless tracking is authorized
    pub ad_id: String,
    pub can_request_permission: bool,
}

impl ConsentPayload {
    pub fn new(status: TrackingStatus, provider: &dyn ConsentProvider) -> Self {
        let ad_id = match status {
            TrackingStatus::Authorized => provider.advertising_identifier(),
            _ => String::new(),
        };

        Self {
            status,
            status_code: status.code(),
            ad_id,
            can_request_permission: status == TrackingStatus::NotDetermined,
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsentStatus {
    #[default]
    Unknown,
    Granted,
    Denied,
}

/// Shared record of the user's consent answer.
#[derive(Debug, Clone, Default)]
pub struct ConsentStore {
    inner: Arc<RwLock<ConsentStatus>>,
}

impl ConsentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> ConsentStatus {
        *self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set(&self, status: ConsentStatus) {
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = status;
    }

    /// Forget the answer so the page can ask again.
    pub fn reset(&self) {
        self.set(ConsentStatus::Unknown);
    }

    /// Records the result of a permission prompt. An undetermined result
    /// leaves the stored answer alone.
    pub fn record(&self, status: TrackingStatus) {
        match status {
            TrackingStatus::Authorized => self.set(ConsentStatus::Granted),
            TrackingStatus::Denied | TrackingStatus::Restricted => self.set(ConsentStatus::Denied),
            TrackingStatus::NotDetermined => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;

    struct Fixed(TrackingStatus);

    impl ConsentProvider for Fixed {
        fn current_status(&self) -> TrackingStatus {
            self.0
        }
        fn request_permission(&self) -> BoxFuture<'static, TrackingStatus> {
            futures::future::ready(self.0).boxed()
        }
        fn advertising_identifier(&self) -> String {
            "AAAA-BBBB".into()
        }
    }

    #[test]
    fn payload_discloses_id_only_when_authorized() {
        let p = ConsentPayload::new(TrackingStatus::Authorized, &Fixed(TrackingStatus::Authorized));
        assert_eq!(p.ad_id, "AAAA-BBBB");
        assert_eq!(p.status_code, 3);
        assert!(!p.can_request_permission);

        let provider = Fixed(TrackingStatus::Authorized);
        let p = ConsentPayload::new(TrackingStatus::NotDetermined, &provider);
        assert_eq!(p.ad_id, "");
        assert_eq!(p.status_code, 0);
        assert!(p.can_request_permission);
    }

    #[test]
    fn payload_json_field_names() {
        let p = ConsentPayload::new(TrackingStatus::Restricted, &Fixed(TrackingStatus::Restricted));
        assert_eq!(
            p.to_json(),
            r#"{"status":"restricted","statusCode":1,"adId":"","canRequestPermission":false}"#
        );
    }

    #[test]
    fn store_records_prompt_results() {
        let store = ConsentStore::new();
        assert_eq!(store.status(), ConsentStatus::Unknown);

        store.record(TrackingStatus::Authorized);
        assert_eq!(store.status(), ConsentStatus::Granted);

        store.record(TrackingStatus::NotDetermined);
        assert_eq!(store.status(), ConsentStatus::Granted);

        store.record(TrackingStatus::Restricted);
        assert_eq!(store.status(), ConsentStatus::Denied);

        let shared = store.clone();
        shared.reset();
        assert_eq!(store.status(), ConsentStatus::Unknown);
    }

    #[test]
    fn provider_prompt_resolves() {
        let prompt = Fixed(TrackingStatus::Denied).request_permission();
        let status = futures::executor::block_on(prompt);
        assert_eq!(status, TrackingStatus::Denied);
    }
}
