use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_extra::extract::WithRejection;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::refused;
use crate::middleware::auth::AuthUser;
use crate::service::onboarding;
use crate::types::questionnaire::QuestionnaireData;
use crate::{ChronikosError, router::AppState};

#[derive(Debug, Serialize)]
pub struct CategoriesResponse {
    pub success: bool,
    pub categories: Vec<String>,
}

/// GET /api/interest-categories
pub async fn interest_categories_handler(
    State(state): State<AppState>,
) -> Result<Json<CategoriesResponse>, ChronikosError> {
    let categories = state
        .storage
        .list_categories()
        .await?
        .into_iter()
        .map(|c| c.name)
        .collect();
    Ok(Json(CategoriesResponse {
        success: true,
        categories,
    }))
}

#[derive(Debug, Serialize)]
pub struct QuestionnaireResponse {
    pub success: bool,
    pub user_id: String,
    pub onboarding_response_id: i64,
}

/// POST /api/questionnaire
pub async fn questionnaire_handler(
    State(state): State<AppState>,
    user: AuthUser,
    WithRejection(Json(data), _): WithRejection<Json<QuestionnaireData>, ChronikosError>,
) -> Result<Json<QuestionnaireResponse>, ChronikosError> {
    let onboarding_response_id =
        onboarding::submit_questionnaire(&state.storage, &user.user_id, &data, Utc::now()).await?;
    Ok(Json(QuestionnaireResponse {
        success: true,
        user_id: user.user_id,
        onboarding_response_id,
    }))
}

#[derive(Debug, Deserialize)]
pub struct AnalysisRequest {
    pub answers: QuestionnaireData,
    pub onboarding_response_id: i64,
}

#[derive(Debug, Serialize)]
pub struct RecordResponse {
    pub success: bool,
    pub record: String,
}

/// POST /api/analysis
pub async fn analysis_handler(
    State(state): State<AppState>,
    user: AuthUser,
    WithRejection(Json(req), _): WithRejection<Json<AnalysisRequest>, ChronikosError>,
) -> Result<Response, ChronikosError> {
    let result = onboarding::analyze(
        &state.storage,
        state.generator.as_ref(),
        &user.user_id,
        &req.answers,
        req.onboarding_response_id,
        Utc::now(),
    )
    .await;

    match result {
        Ok(record) => Ok(Json(RecordResponse {
            success: true,
            record,
        })
        .into_response()),
        Err(ChronikosError::NotFound(_)) => Ok(refused(
            StatusCode::NOT_FOUND,
            "onboarding_response_not_found",
        )),
        Err(e) => Err(e),
    }
}
