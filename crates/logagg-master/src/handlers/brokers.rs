//! Broker and broker API registration endpoints

use axum::{
    extract::{Query, State},
    Json,
};

use super::authorize;
use crate::error::Result;
use crate::lifecycle::Registration;
use crate::{models::*, AppState};

pub async fn register_broker(
    State(state): State<AppState>,
    Query(query): Query<RegisterBrokerQuery>,
) -> Result<Json<ApiResponse>> {
    authorize(&state, &query.key, &query.secret)?;

    let details = match state
        .lifecycle
        .register_broker(&query.tcp_address, &query.http_address)
        .await?
    {
        Registration::Registered => "Added broker details",
        Registration::Duplicate => "Duplicate broker details",
    };
    Ok(Json(ApiResponse::ok_with_details(details)))
}

pub async fn get_brokers(
    State(state): State<AppState>,
    Query(query): Query<AuthQuery>,
) -> Result<Json<ApiResponse<BrokerList>>> {
    authorize(&state, &query.key, &query.secret)?;

    let brokers = state.registry.list_brokers().await?;
    Ok(Json(ApiResponse::ok(BrokerList { brokers })))
}

pub async fn register_broker_api(
    State(state): State<AppState>,
    Query(query): Query<RegisterBrokerApiQuery>,
) -> Result<Json<ApiResponse>> {
    authorize(&state, &query.key, &query.secret)?;

    let details = match state
        .lifecycle
        .register_broker_api(&query.host, query.port)
        .await?
    {
        Registration::Registered => "Added broker api details",
        Registration::Duplicate => "Duplicate broker api details",
    };
    Ok(Json(ApiResponse::ok_with_details(details)))
}
