//! Streaming log tail endpoint

use axum::{
    extract::{Query, State},
    http::header,
    response::{IntoResponse, Response},
};

use crate::error::Result;
use crate::{models::*, AppState};

/// Stream the topic's logs as newline-delimited text.
///
/// Failures before the first byte return the usual JSON envelope; once
/// streaming, the body simply ends when the upstream does.
pub async fn tail_logs(
    State(state): State<AppState>,
    Query(query): Query<TopicQuery>,
) -> Result<Response> {
    let stream = state.tail.open(&query.topic_name).await?;

    Ok((
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        stream.into_body(),
    )
        .into_response())
}
