use base64::Engine;
use base64::engine::general_purpose::{URL_SAFE, URL_SAFE_NO_PAD};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::ChronikosError;
use crate::types::locale::Locale;

const P256DH_LEN: usize = 65;
const AUTH_LEN: usize = 16;
const BODY_PREVIEW_CHARS: usize = 100;

/// Browser-issued `PushSubscription.toJSON()` shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushSubscription {
    pub endpoint: String,
    #[serde(default, rename = "expirationTime", skip_serializing_if = "Option::is_none")]
    pub expiration_time: Option<i64>,
    pub keys: PushKeys,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushKeys {
    pub p256dh: String,
    pub auth: String,
}

impl PushSubscription {
    /// Check the endpoint is https and both keys decode to the sizes RFC 8291 requires.
    pub fn validate(&self) -> Result<(), ChronikosError> {
        let endpoint = Url::parse(&self.endpoint)
            .map_err(|e| ChronikosError::InvalidInput(format!("invalid push endpoint: {e}")))?;
        if endpoint.scheme() != "https" {
            return Err(ChronikosError::InvalidInput(
                "push endpoint must use https".to_string(),
            ));
        }
        check_key("p256dh", &self.keys.p256dh, P256DH_LEN)?;
        check_key("auth", &self.keys.auth, AUTH_LEN)?;
        Ok(())
    }
}

fn check_key(name: &str, value: &str, expected: usize) -> Result<(), ChronikosError> {
    let decoded = URL_SAFE_NO_PAD
        .decode(value)
        .or_else(|_| URL_SAFE.decode(value))
        .map_err(|_| ChronikosError::InvalidInput(format!("{name} key is not url-safe base64")))?;
    if decoded.len() != expected {
        return Err(ChronikosError::InvalidInput(format!(
            "{name} key must be {expected} bytes, got {}",
            decoded.len()
        )));
    }
    Ok(())
}

/// JSON payload the service worker renders as a notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushPayload {
    pub title: String,
    pub body: String,
    pub icon: String,
    pub badge: String,
    pub data: PushData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushData {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fact_id: Option<i64>,
    /// Milliseconds since the Unix epoch.
    pub date_of_arrival: i64,
}

impl PushPayload {
    /// Notification announcing a daily fact.
    pub fn for_fact(
        fact_id: i64,
        heading: Option<&str>,
        content: &str,
        locale: Locale,
        icon: &str,
        now_millis: i64,
    ) -> Self {
        let title = heading
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .unwrap_or(locale.default_notification_title())
            .to_string();
        Self {
            title,
            body: body_preview(content),
            icon: icon.to_string(),
            badge: icon.to_string(),
            data: PushData {
                url: format!("/{}?factId={fact_id}", locale.code()),
                fact_id: Some(fact_id),
                date_of_arrival: now_millis,
            },
        }
    }

    /// Free-text notification, used for test broadcasts.
    pub fn message(title: &str, body: &str, icon: &str, now_millis: i64) -> Self {
        Self {
            title: title.to_string(),
            body: body.to_string(),
            icon: icon.to_string(),
            badge: icon.to_string(),
            data: PushData {
                url: "/".to_string(),
                fact_id: None,
                date_of_arrival: now_millis,
            },
        }
    }
}

/// First 100 characters of the fact text below its title line.
fn body_preview(content: &str) -> String {
    let mut lines = content.trim().lines();
    let first = lines.next().unwrap_or_default();
    let rest = lines.collect::<Vec<_>>().join(" ");
    let text = if rest.trim().is_empty() { first } else { rest.trim() };

    let mut chars = text.chars();
    let preview: String = chars.by_ref().take(BODY_PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{preview}...")
    } else {
        preview
    }
}
