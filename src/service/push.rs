use async_trait::async_trait;
use tracing::debug;
use web_push::{
    ContentEncoding, IsahcWebPushClient, SubscriptionInfo, VapidSignatureBuilder, WebPushClient,
    WebPushMessageBuilder,
};

use crate::config::PushConfig;
use crate::error::ChronikosError;
use crate::types::push::{PushPayload, PushSubscription};

/// Delivers one encrypted payload to one browser subscription.
#[async_trait]
pub trait PushSender: Send + Sync {
    /// `Err(ChronikosError::PushSubscriptionGone)` means the subscription should be dropped.
    async fn send(
        &self,
        subscription: &PushSubscription,
        payload: &PushPayload,
    ) -> Result<(), ChronikosError>;
}

/// Web Push (RFC 8030) with VAPID, `aes128gcm` payload encryption.
pub struct WebPushSender {
    client: IsahcWebPushClient,
    vapid_pem: Vec<u8>,
    subject: String,
    ttl: u32,
}

impl WebPushSender {
    pub fn new(vapid_pem: impl Into<Vec<u8>>, cfg: &PushConfig) -> Result<Self, ChronikosError> {
        Ok(Self {
            client: IsahcWebPushClient::new()?,
            vapid_pem: vapid_pem.into(),
            subject: cfg.vapid_subject.clone(),
            ttl: cfg.ttl_secs,
        })
    }
}

#[async_trait]
impl PushSender for WebPushSender {
    async fn send(
        &self,
        subscription: &PushSubscription,
        payload: &PushPayload,
    ) -> Result<(), ChronikosError> {
        let info = SubscriptionInfo::new(
            subscription.endpoint.clone(),
            subscription.keys.p256dh.clone(),
            subscription.keys.auth.clone(),
        );
        let mut sig = VapidSignatureBuilder::from_pem(self.vapid_pem.as_slice(), &info)?;
        sig.add_claim("sub", self.subject.as_str());

        let content = serde_json::to_vec(payload)?;
        let mut builder = WebPushMessageBuilder::new(&info);
        builder.set_payload(ContentEncoding::Aes128Gcm, &content);
        builder.set_ttl(self.ttl);
        builder.set_vapid_signature(sig.build()?);

        self.client.send(builder.build()?).await?;
        debug!(endpoint = %subscription.endpoint, "push delivered");
        Ok(())
    }
}

/// Used when no VAPID key is configured; every send fails.
pub struct DisabledPushSender;

#[async_trait]
impl PushSender for DisabledPushSender {
    async fn send(
        &self,
        _subscription: &PushSubscription,
        _payload: &PushPayload,
    ) -> Result<(), ChronikosError> {
        Err(ChronikosError::PushNotConfigured)
    }
}
