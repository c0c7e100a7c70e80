//! Collector file-tracking endpoints
//!
//! The master only relays: it checks that the collector is registered under
//! the topic, forwards the request and returns the collector's file list.

use axum::{
    extract::{Query, State},
    Json,
};
use logagg_registry::{Component, ComponentKey, Namespace};

use crate::error::{MasterError, Result};
use crate::{models::*, AppState};

async fn find_collector(
    state: &AppState,
    topic_name: &str,
    host: &str,
    port: &str,
) -> Result<Component> {
    if state.registry.get_topic(topic_name).await?.is_none() {
        return Err(MasterError::TopicNotFound(topic_name.to_string()));
    }

    let key = ComponentKey {
        host: host.to_string(),
        port: port.to_string(),
    };
    state
        .registry
        .find_component(topic_name, &key, Namespace::Collector)
        .await?
        .ok_or_else(|| MasterError::CollectorNotFound {
            host: host.to_string(),
            port: port.to_string(),
        })
}

pub async fn collector_add_file(
    State(state): State<AppState>,
    Query(query): Query<CollectorAddFileQuery>,
) -> Result<Json<ApiResponse<TrackedFiles>>> {
    let collector = find_collector(
        &state,
        &query.topic_name,
        &query.collector_host,
        &query.collector_port,
    )
    .await?;

    let fpaths = state
        .collectors
        .add_file(&collector.address(), &query.fpath, &query.formatter)
        .await?;

    tracing::info!(
        topic = %query.topic_name,
        collector = %collector.address(),
        fpath = %query.fpath,
        "File added to collector"
    );
    Ok(Json(ApiResponse::ok(TrackedFiles { fpaths })))
}

pub async fn collector_remove_file(
    State(state): State<AppState>,
    Query(query): Query<CollectorRemoveFileQuery>,
) -> Result<Json<ApiResponse<TrackedFiles>>> {
    let collector = find_collector(
        &state,
        &query.topic_name,
        &query.collector_host,
        &query.collector_port,
    )
    .await?;

    let fpaths = state
        .collectors
        .remove_file(&collector.address(), &query.fpath)
        .await?;

    tracing::info!(
        topic = %query.topic_name,
        collector = %collector.address(),
        fpath = %query.fpath,
        "File removed from collector"
    );
    Ok(Json(ApiResponse::ok(TrackedFiles { fpaths })))
}
