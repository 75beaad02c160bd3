use axum::{Json, extract::State};
use axum_extra::extract::WithRejection;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::db::models::DbProfile;
use crate::middleware::auth::AuthUser;
use crate::service::schedule::{parse_notification_time, parse_timezone};
use crate::types::locale::Locale;
use crate::types::push::PushSubscription;
use crate::{ChronikosError, router::AppState};

/// Profile as shown to its owner; the raw push subscription stays server-side.
#[derive(Debug, Serialize)]
pub struct ProfileView {
    pub user_id: String,
    pub experience_level: String,
    pub preferred_fact_length: String,
    pub language: String,
    pub locale: Locale,
    pub daily_notification_enabled: bool,
    pub notification_time: Option<String>,
    pub timezone: String,
    pub has_push_subscription: bool,
    pub interests: Vec<InterestView>,
}

#[derive(Debug, Serialize)]
pub struct InterestView {
    pub category: String,
    pub interest_level: i64,
}

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub success: bool,
    pub profile: ProfileView,
}

async fn load_view(state: &AppState, user_id: &str) -> Result<ProfileView, ChronikosError> {
    let profile = state
        .storage
        .get_profile(user_id)
        .await?
        .unwrap_or_else(|| DbProfile::empty(user_id, Utc::now()));
    let interests = state
        .storage
        .list_interests(user_id)
        .await?
        .into_iter()
        .map(|(category, interest_level)| InterestView {
            category,
            interest_level,
        })
        .collect();
    Ok(ProfileView {
        locale: profile.locale(),
        has_push_subscription: profile.subscription().is_some(),
        user_id: profile.user_id,
        experience_level: profile.experience_level,
        preferred_fact_length: profile.preferred_fact_length,
        language: profile.language,
        daily_notification_enabled: profile.daily_notification_enabled,
        notification_time: profile.notification_time,
        timezone: profile.timezone,
        interests,
    })
}

/// GET /api/profile
pub async fn get_profile_handler(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<ProfileResponse>, ChronikosError> {
    let profile = load_view(&state, &user.user_id).await?;
    Ok(Json(ProfileResponse {
        success: true,
        profile,
    }))
}

#[derive(Debug, Deserialize)]
pub struct NotificationSettings {
    pub daily_notification_enabled: bool,
    pub notification_time: String,
    pub timezone: String,
}

/// PUT /api/profile/notifications
pub async fn update_notifications_handler(
    State(state): State<AppState>,
    user: AuthUser,
    WithRejection(Json(req), _): WithRejection<Json<NotificationSettings>, ChronikosError>,
) -> Result<Json<ProfileResponse>, ChronikosError> {
    let time = parse_notification_time(&req.notification_time)?;
    let tz = parse_timezone(&req.timezone)?;

    state
        .storage
        .upsert_notification_settings(
            &user.user_id,
            req.daily_notification_enabled,
            &time.format("%H:%M").to_string(),
            tz.name(),
            Utc::now(),
        )
        .await?;
    info!(
        user_id = %user.user_id,
        enabled = req.daily_notification_enabled,
        time = %time.format("%H:%M"),
        timezone = tz.name(),
        "notification settings saved"
    );

    let profile = load_view(&state, &user.user_id).await?;
    Ok(Json(ProfileResponse {
        success: true,
        profile,
    }))
}

#[derive(Debug, Deserialize)]
pub struct SubscribeRequest {
    pub subscription: PushSubscription,
}

#[derive(Debug, Serialize)]
pub struct SubscriptionResponse {
    pub success: bool,
    pub daily_notification_enabled: bool,
}

/// POST /api/push/subscribe
pub async fn subscribe_handler(
    State(state): State<AppState>,
    user: AuthUser,
    WithRejection(Json(req), _): WithRejection<Json<SubscribeRequest>, ChronikosError>,
) -> Result<Json<SubscriptionResponse>, ChronikosError> {
    req.subscription.validate()?;
    let json = serde_json::to_string(&req.subscription)?;
    state
        .storage
        .set_push_subscription(&user.user_id, Some(&json), Utc::now())
        .await?;
    info!(user_id = %user.user_id, "push subscription stored");
    Ok(Json(SubscriptionResponse {
        success: true,
        daily_notification_enabled: true,
    }))
}

/// POST /api/push/unsubscribe
pub async fn unsubscribe_handler(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<SubscriptionResponse>, ChronikosError> {
    state
        .storage
        .set_push_subscription(&user.user_id, None, Utc::now())
        .await?;
    info!(user_id = %user.user_id, "push subscription removed");
    Ok(Json(SubscriptionResponse {
        success: true,
        daily_notification_enabled: false,
    }))
}
