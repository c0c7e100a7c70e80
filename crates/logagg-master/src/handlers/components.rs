//! Component registration and listing

use axum::{
    extract::{Query, State},
    Json,
};
use logagg_registry::Namespace;

use crate::error::{MasterError, Result};
use crate::lifecycle::Registration;
use crate::{models::*, AppState};

pub async fn register_component(
    State(state): State<AppState>,
    Query(query): Query<RegisterComponentQuery>,
) -> Result<Json<ApiResponse>> {
    let namespace = Namespace::from_name(&query.namespace);
    let registration = state
        .lifecycle
        .register_component(namespace, &query.topic_name, &query.host, &query.port)
        .await?;

    Ok(Json(match registration {
        Registration::Registered => ApiResponse::ok(NoData {}),
        Registration::Duplicate => ApiResponse::ok_with_details("Duplicate component details"),
    }))
}

pub async fn get_components(
    State(state): State<AppState>,
    Query(query): Query<TopicQuery>,
) -> Result<Json<ApiResponse<ComponentsInfo>>> {
    if state.registry.get_topic(&query.topic_name).await?.is_none() {
        return Err(MasterError::TopicNotFound(query.topic_name));
    }

    let components_info = state.registry.list_components(&query.topic_name).await?;
    Ok(Json(ApiResponse::ok(ComponentsInfo { components_info })))
}
