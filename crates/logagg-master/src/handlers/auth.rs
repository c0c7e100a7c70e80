//! Credential check endpoint

use axum::{
    extract::{Query, State},
    Json,
};

use crate::{models::*, AppState};

/// `ping` answers `success: true` either way; the outcome is in `details`.
pub async fn ping(State(state): State<AppState>, Query(query): Query<AuthQuery>) -> Json<ApiResponse> {
    if state.auth.check(&query.key, &query.secret) {
        Json(ApiResponse::ok_with_details("Authentication passed"))
    } else {
        tracing::debug!("Ping with wrong credentials");
        Json(ApiResponse::ok_with_details("Authentication failed"))
    }
}
