//! End-to-end scenarios (SPEC_FULL.md §8) exercised through the axum router
//! backed by the in-memory store, via `tower::ServiceExt::oneshot`.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use tempoq::engine::{pumper, Engine};
use tempoq::http::router;
use tempoq::store::MemoryStore;

/// Builds a router over a fresh in-memory store, with the Pumper running in
/// the background so delayed/TTR timer events actually fire during a test.
/// The pumper task is never explicitly cancelled — it dies with the test's
/// own single-threaded runtime when the test function returns.
fn app() -> axum::Router {
    let store = Arc::new(MemoryStore::new());
    let engine = Engine::new(Arc::clone(&store));
    pumper::spawn(store, 50, tokio_util::sync::CancellationToken::new());
    router(engine, 60, 1, 65535)
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().method("GET").uri(uri).body(Body::empty()).unwrap()
}

fn put(uri: &str, body: &'static [u8]) -> Request<Body> {
    Request::builder()
        .method("PUT")
        .uri(uri)
        .body(Body::from(body))
        .unwrap()
}

fn delete(uri: &str) -> Request<Body> {
    Request::builder().method("DELETE").uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn scenario_1_publish_consume_delete_peek() {
    let app = app();

    let resp = app.clone().oneshot(put("/ns/q?delay=0&ttl=60&tries=1", b"hello")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let created = body_json(resp).await;
    let job_id = created["job_id"].as_str().unwrap().to_string();

    let resp = app.clone().oneshot(get("/ns/q?timeout=0&ttr=30")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let consumed = body_json(resp).await;
    assert_eq!(consumed["job_id"], job_id);
    assert_eq!(consumed["data"], "aGVsbG8=");

    let resp = app
        .clone()
        .oneshot(delete(&format!("/ns/q/job/{job_id}")))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let resp = app.clone().oneshot(get("/ns/q/peek")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn scenario_2_delayed_publish_becomes_ready() {
    let app = app();

    let resp = app.clone().oneshot(put("/ns/q?delay=2&ttl=60&tries=1", b"x")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let created = body_json(resp).await;
    let job_id = created["job_id"].as_str().unwrap().to_string();

    let resp = app.clone().oneshot(get("/ns/q?timeout=1")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    tokio::time::sleep(Duration::from_secs(2)).await;

    let resp = app.clone().oneshot(get("/ns/q?timeout=5")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let consumed = body_json(resp).await;
    assert_eq!(consumed["job_id"], job_id);
}

#[tokio::test]
async fn scenario_3_retries_then_dead_letters() {
    let app = app();

    let resp = app
        .clone()
        .oneshot(put("/ns/q?delay=0&ttl=60&tries=2", b"job"))
        .await
        .unwrap();
    let created = body_json(resp).await;
    let job_id = created["job_id"].as_str().unwrap().to_string();

    let resp = app.clone().oneshot(get("/ns/q?ttr=1&timeout=0")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await["job_id"], job_id);

    tokio::time::sleep(Duration::from_millis(1300)).await;

    let resp = app.clone().oneshot(get("/ns/q?ttr=1&timeout=0")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK, "job should be redelivered after TTR lapses");
    assert_eq!(body_json(resp).await["job_id"], job_id);

    tokio::time::sleep(Duration::from_millis(1300)).await;

    let resp = app.clone().oneshot(get("/ns/q/deadletter")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let dl = body_json(resp).await;
    assert_eq!(dl["deadletter_size"], 1);
    assert_eq!(dl["deadletter_head"], job_id);
}

#[tokio::test]
async fn scenario_4_respawn_dead_letter() {
    let app = app();

    let resp = app
        .clone()
        .oneshot(put("/ns/q?delay=0&ttl=60&tries=1", b"job"))
        .await
        .unwrap();
    let created = body_json(resp).await;
    let job_id = created["job_id"].as_str().unwrap().to_string();

    let resp = app.clone().oneshot(get("/ns/q?ttr=1&timeout=0")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    tokio::time::sleep(Duration::from_millis(1300)).await;

    let resp = app.clone().oneshot(get("/ns/q/deadletter")).await.unwrap();
    assert_eq!(body_json(resp).await["deadletter_size"], 1);

    let resp = app
        .clone()
        .oneshot(put("/ns/q/deadletter?limit=1&ttl=30", b""))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await["count"], 1);

    let resp = app.clone().oneshot(get("/ns/q?timeout=0")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await["job_id"], job_id);
}

#[tokio::test]
async fn scenario_5_fifo_within_a_queue() {
    let app = app();

    let mut ids = Vec::new();
    for body in [&b"p1"[..], &b"p2"[..], &b"p3"[..]] {
        let resp = app.clone().oneshot(put("/ns/q?delay=0&ttl=60&tries=1", body)).await.unwrap();
        let created = body_json(resp).await;
        ids.push(created["job_id"].as_str().unwrap().to_string());
    }

    for expected in ids {
        let resp = app.clone().oneshot(get("/ns/q?timeout=0")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await["job_id"], expected);
    }
}

#[tokio::test]
async fn scenario_6_oversized_body_rejected() {
    let app = app();
    let body = vec![0u8; 70_000];
    let resp = app
        .oneshot(
            Request::builder()
                .method("PUT")
                .uri("/ns/q")
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn publish_rejects_zero_tries() {
    let app = app();
    let resp = app.oneshot(put("/ns/q?tries=0", b"x")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn publish_rejects_ttl_below_delay() {
    let app = app();
    let resp = app.oneshot(put("/ns/q?delay=10&ttl=5", b"x")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn consume_multi_rejects_zero_timeout() {
    let app = app();
    let resp = app.oneshot(get("/ns/a,b?timeout=0")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn consume_multi_serves_the_queue_with_a_job() {
    let app = app();

    let resp = app.clone().oneshot(put("/ns/b?delay=0&ttl=60&tries=1", b"hi")).await.unwrap();
    let created = body_json(resp).await;
    let job_id = created["job_id"].as_str().unwrap().to_string();

    let resp = app.clone().oneshot(get("/ns/a,b?timeout=1&ttr=1")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await["job_id"], job_id);
}

#[tokio::test]
async fn destroy_clears_the_queue() {
    let app = app();
    app.clone().oneshot(put("/ns/q?delay=0&ttl=60&tries=1", b"1")).await.unwrap();
    app.clone().oneshot(put("/ns/q?delay=0&ttl=60&tries=1", b"2")).await.unwrap();

    let resp = app.clone().oneshot(delete("/ns/q")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let resp = app.clone().oneshot(get("/ns/q/size")).await.unwrap();
    assert_eq!(body_json(resp).await["size"], 0);

    let resp = app.clone().oneshot(get("/ns/q/peek")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn healthz_and_metrics() {
    let app = app();

    let resp = app.clone().oneshot(get("/healthz")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await["status"], "ok");

    let resp = app.oneshot(get("/metrics")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_IMPLEMENTED);
}
