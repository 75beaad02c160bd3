pub mod facts;
pub mod notifications;
pub mod onboarding;
pub mod profile;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

/// `{ "success": false, "reason": ... }` for expected refusals that are not errors.
pub(crate) fn refused(status: StatusCode, reason: &'static str) -> Response {
    (status, Json(json!({ "success": false, "reason": reason }))).into_response()
}
