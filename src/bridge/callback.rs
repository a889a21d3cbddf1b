use crate::ads::AdResult;
use crate::consent::ConsentPayload;
use crate::errors::{BrowserError, Result};
use serde_json::Value;

/// Accepts dotted JavaScript identifier paths like `window.app.onAd`.
pub fn validate_callback_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name.split('.').all(|segment| {
            let mut chars = segment.chars();
            match chars.next() {
                Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$' => {
                    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
                }
                _ => false,
            }
        });

    if valid {
        Ok(())
    } else {
        Err(BrowserError::InvalidCallbackName(name.to_string()))
    }
}

/// `javascript:cb("reward","success","unitA",1);`
pub fn ad_result_script(callback: &str, result: &AdResult) -> String {
    format!(
        "javascript:{}({},{},{},{});",
        callback,
        Value::from(result.ad_type.as_str()),
        Value::from(result.outcome.as_str()),
        Value::from(result.ad_unit.as_str()),
        result.display_index
    )
}

/// `javascript:cb({"status":...,"statusCode":...,"adId":...,"canRequestPermission":...});`
pub fn consent_script(callback: &str, payload: &ConsentPayload) -> String {
    format!("javascript:{}({});", callback, payload.to_json())
}
