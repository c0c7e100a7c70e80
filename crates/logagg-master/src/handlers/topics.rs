//! Topic endpoints

use axum::{
    extract::{Query, State},
    Json,
};
use logagg_registry::Topic;

use super::authorize;
use crate::error::{MasterError, Result};
use crate::{models::*, AppState};

/// Bare list, without the response envelope.
pub async fn get_topics(State(state): State<AppState>) -> Result<Json<Vec<Topic>>> {
    Ok(Json(state.registry.list_topics().await?))
}

pub async fn get_topic_info(
    State(state): State<AppState>,
    Query(query): Query<TopicQuery>,
) -> Result<Json<ApiResponse<TopicInfo>>> {
    let topic_info = state
        .registry
        .get_topic(&query.topic_name)
        .await?
        .ok_or_else(|| MasterError::TopicNotFound(query.topic_name.clone()))?;

    Ok(Json(ApiResponse::ok(TopicInfo { topic_info })))
}

/// Stop every collector of the topic, then remove the topic.
pub async fn delete_topic(
    State(state): State<AppState>,
    Query(query): Query<DeleteTopicQuery>,
) -> Result<Json<ApiResponse<TopicDeleted>>> {
    authorize(&state, &query.key, &query.secret)?;

    let collectors_stopped = state.lifecycle.delete_topic(&query.topic_name).await?;
    Ok(Json(ApiResponse::ok(TopicDeleted { collectors_stopped })))
}
