use axum::{Json, extract::State};
use axum_extra::extract::WithRejection;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::middleware::auth::RequireCronSecret;
use crate::service::dispatch::{
    BroadcastReport, DispatchReport, NotificationStatus, TEST_NOTIFICATION_TITLE,
};
use crate::{ChronikosError, router::AppState};

#[derive(Debug, Serialize)]
pub struct DispatchResponse {
    pub success: bool,
    pub message: String,
    pub report: DispatchReport,
}

/// GET|POST /api/cron/notifications, called by an external scheduler every few minutes.
pub async fn cron_notifications_handler(
    State(state): State<AppState>,
    _auth: RequireCronSecret,
) -> Result<Json<DispatchResponse>, ChronikosError> {
    let report = state.dispatch_handle.run(Utc::now()).await?;
    let message = if report.due == 0 {
        "No users scheduled for notification at this time".to_string()
    } else {
        format!("Scheduled notifications sent to {} users", report.sent)
    };
    Ok(Json(DispatchResponse {
        success: true,
        message,
        report,
    }))
}

#[derive(Debug, Deserialize)]
pub struct TestNotificationRequest {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct BroadcastResponse {
    pub success: bool,
    pub message: String,
    pub report: BroadcastReport,
}

/// POST /api/test-notification
pub async fn test_notification_handler(
    State(state): State<AppState>,
    _auth: RequireCronSecret,
    WithRejection(Json(req), _): WithRejection<Json<TestNotificationRequest>, ChronikosError>,
) -> Result<Json<BroadcastResponse>, ChronikosError> {
    let message = req
        .message
        .filter(|m| !m.trim().is_empty())
        .ok_or_else(|| ChronikosError::InvalidInput("Message is required".to_string()))?;
    let title = req
        .title
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| TEST_NOTIFICATION_TITLE.to_string());

    let report = state.dispatcher.broadcast(&title, &message, Utc::now()).await?;
    Ok(Json(BroadcastResponse {
        success: true,
        message: format!("Notifications sent to {} users", report.sent),
        report,
    }))
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub success: bool,
    #[serde(flatten)]
    pub status: NotificationStatus,
}

/// GET /api/notification-status
pub async fn notification_status_handler(
    State(state): State<AppState>,
    _auth: RequireCronSecret,
) -> Result<Json<StatusResponse>, ChronikosError> {
    let status = state.dispatcher.status(Utc::now()).await?;
    Ok(Json(StatusResponse {
        success: true,
        status,
    }))
}
