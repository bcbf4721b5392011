//! Route handlers (§6.1). Each one validates its own query/path params,
//! delegates to the [`Engine`], and converts the result to a response —
//! `EngineError` already implements `IntoResponse` so most handlers just
//! propagate it with `?`/`map_err`-free `match`.

use std::time::Instant;

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::id::JobId;
use crate::store::Store;

use super::dto::{
    ConsumeQuery, ConsumeResponse, CountResponse, DeadLetterPeekResponse, DeleteDeadLetterQuery,
    HealthResponse, PeekResponse, PublishQuery, PublishResponse, RespawnQuery, SizeResponse,
};
use super::AppState;

fn bad_request(msg: impl Into<String>) -> Response {
    (StatusCode::BAD_REQUEST, Json(serde_json::json!({ "error": msg.into() }))).into_response()
}

pub async fn publish<S: Store>(
    State(state): State<AppState<S>>,
    Path((ns, queue)): Path<(String, String)>,
    Query(query): Query<PublishQuery>,
    body: Bytes,
) -> Response {
    if body.len() as u32 > state.max_body_bytes {
        return (
            StatusCode::PAYLOAD_TOO_LARGE,
            Json(serde_json::json!({
                "error": format!("body of {} bytes exceeds the {} byte limit", body.len(), state.max_body_bytes)
            })),
        )
            .into_response();
    }

    let ttl = query.ttl.unwrap_or(state.default_ttl_s);
    let tries = query.tries.unwrap_or(state.default_tries);

    match state
        .engine
        .publish(&ns, &queue, body.to_vec(), ttl, query.delay, tries)
        .await
    {
        Ok(job_id) => (
            StatusCode::CREATED,
            Json(PublishResponse {
                msg: "published",
                job_id: job_id.to_string(),
            }),
        )
            .into_response(),
        Err(error) => error.into_response(),
    }
}

pub async fn consume<S: Store>(
    State(state): State<AppState<S>>,
    Path((ns, queue_list)): Path<(String, String)>,
    Query(query): Query<ConsumeQuery>,
) -> Response {
    let queues: Vec<String> = queue_list.split(',').map(str::to_string).collect();
    let start = Instant::now();

    let result = if queues.len() == 1 {
        state.engine.consume(&ns, &queues[0], query.ttr, query.timeout).await
    } else {
        state
            .engine
            .consume_multi(&ns, &queues, query.ttr, query.timeout)
            .await
    };

    match result {
        Ok(Some(job)) => {
            let elapsed_ms = start.elapsed().as_millis() as u64;
            (StatusCode::OK, Json(ConsumeResponse::from_job(job, elapsed_ms))).into_response()
        },
        Ok(None) => StatusCode::NOT_FOUND.into_response(),
        Err(error) => error.into_response(),
    }
}

pub async fn delete_job<S: Store>(
    State(state): State<AppState<S>>,
    Path((ns, queue, id)): Path<(String, String, String)>,
) -> Response {
    let job_id: JobId = match id.parse() {
        Ok(job_id) => job_id,
        Err(_) => return bad_request("invalid job id"),
    };

    match state.engine.delete(&ns, &queue, job_id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(error) => error.into_response(),
    }
}

pub async fn peek_queue<S: Store>(
    State(state): State<AppState<S>>,
    Path((ns, queue)): Path<(String, String)>,
) -> Response {
    match state.engine.peek(&ns, &queue, None).await {
        Ok(job) => (StatusCode::OK, Json(PeekResponse::from(job))).into_response(),
        Err(error) => error.into_response(),
    }
}

pub async fn peek_job<S: Store>(
    State(state): State<AppState<S>>,
    Path((ns, queue, id)): Path<(String, String, String)>,
) -> Response {
    let job_id: JobId = match id.parse() {
        Ok(job_id) => job_id,
        Err(_) => return bad_request("invalid job id"),
    };

    match state.engine.peek(&ns, &queue, Some(job_id)).await {
        Ok(job) => (StatusCode::OK, Json(PeekResponse::from(job))).into_response(),
        Err(error) => error.into_response(),
    }
}

pub async fn size<S: Store>(
    State(state): State<AppState<S>>,
    Path((ns, queue)): Path<(String, String)>,
) -> Response {
    match state.engine.size(&ns, &queue).await {
        Ok(size) => (StatusCode::OK, Json(SizeResponse { size })).into_response(),
        Err(error) => error.into_response(),
    }
}

pub async fn peek_dead_letter<S: Store>(
    State(state): State<AppState<S>>,
    Path((ns, queue)): Path<(String, String)>,
) -> Response {
    match state.engine.peek_dead_letter(&ns, &queue).await {
        Ok((size, head)) => (
            StatusCode::OK,
            Json(DeadLetterPeekResponse {
                deadletter_size: size,
                deadletter_head: head.map(|id| id.to_string()),
            }),
        )
            .into_response(),
        Err(error) => error.into_response(),
    }
}

pub async fn respawn_dead_letter<S: Store>(
    State(state): State<AppState<S>>,
    Path((ns, queue)): Path<(String, String)>,
    Query(query): Query<RespawnQuery>,
) -> Response {
    if query.limit < 1 {
        return bad_request("limit must be >= 1");
    }
    if query.ttl < 0 {
        return bad_request("ttl must be >= 0");
    }

    match state
        .engine
        .respawn_dead_letter(&ns, &queue, query.limit as u32, query.ttl as u32)
        .await
    {
        Ok(count) => (StatusCode::OK, Json(CountResponse { count })).into_response(),
        Err(error) => error.into_response(),
    }
}

pub async fn delete_dead_letter<S: Store>(
    State(state): State<AppState<S>>,
    Path((ns, queue)): Path<(String, String)>,
    Query(query): Query<DeleteDeadLetterQuery>,
) -> Response {
    if query.limit < 1 {
        return bad_request("limit must be >= 1");
    }

    match state
        .engine
        .delete_dead_letter(&ns, &queue, query.limit as u32)
        .await
    {
        Ok(_count) => StatusCode::NO_CONTENT.into_response(),
        Err(error) => error.into_response(),
    }
}

pub async fn destroy<S: Store>(
    State(state): State<AppState<S>>,
    Path((ns, queue)): Path<(String, String)>,
) -> Response {
    match state.engine.destroy(&ns, &queue).await {
        Ok(_count) => StatusCode::NO_CONTENT.into_response(),
        Err(error) => error.into_response(),
    }
}

pub async fn healthz() -> Response {
    (StatusCode::OK, Json(HealthResponse { status: "ok" })).into_response()
}

pub async fn metrics() -> Response {
    StatusCode::NOT_IMPLEMENTED.into_response()
}
