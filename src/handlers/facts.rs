use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_extra::extract::WithRejection;
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::refused;
use crate::db::models::HistoryEntry;
use crate::middleware::auth::AuthUser;
use crate::service::facts::FactOutcome;
use crate::{ChronikosError, router::AppState};

const HISTORY_LIMIT: i64 = 100;

#[derive(Debug, Serialize)]
pub struct FactResponse {
    pub success: bool,
    pub record: String,
    pub daily_fact_id: i64,
    pub heading: String,
    pub fact_date: NaiveDate,
}

/// POST /api/fact
pub async fn fact_handler(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Response, ChronikosError> {
    match state.facts.deliver(&user.user_id, Utc::now()).await? {
        FactOutcome::Delivered(fact) => Ok(Json(FactResponse {
            success: true,
            record: fact.fact_content,
            daily_fact_id: fact.id,
            heading: fact.fact_heading,
            fact_date: fact.fact_date,
        })
        .into_response()),
        FactOutcome::Cooldown => Ok(refused(StatusCode::OK, "wait_24h")),
        FactOutcome::AnalysisMissing => Ok(refused(StatusCode::OK, "analysis_missing")),
    }
}

#[derive(Debug, Deserialize)]
pub struct ReadRequest {
    #[serde(default)]
    pub daily_fact_id: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

/// POST /api/read
pub async fn read_handler(
    State(state): State<AppState>,
    user: AuthUser,
    WithRejection(Json(req), _): WithRejection<Json<ReadRequest>, ChronikosError>,
) -> Result<Response, ChronikosError> {
    let Some(daily_fact_id) = req.daily_fact_id else {
        return Ok(refused(StatusCode::BAD_REQUEST, "missing_parameters"));
    };
    if !state
        .storage
        .mark_read(&user.user_id, daily_fact_id, Utc::now())
        .await?
    {
        debug!(user_id = %user.user_id, daily_fact_id, "read receipt for unknown delivery");
        return Ok(refused(StatusCode::NOT_FOUND, "delivery_not_found"));
    }
    Ok(Json(SuccessResponse { success: true }).into_response())
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub success: bool,
    /// All deliveries ever made to the user; `entries` holds at most the latest 100.
    pub total: i64,
    pub read: i64,
    pub entries: Vec<HistoryEntry>,
}

/// GET /api/history
pub async fn history_handler(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<HistoryResponse>, ChronikosError> {
    let entries = state.storage.history(&user.user_id, HISTORY_LIMIT).await?;
    let (total, read) = state.storage.history_totals(&user.user_id).await?;
    Ok(Json(HistoryResponse {
        success: true,
        total,
        read,
        entries,
    }))
}
