//! HTTP surface tests: routing, bearer guard, and error bodies.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::util::ServiceExt;

use common::{game_row, service, StubExecutor};
use trend_engine::server::{build_router, AppState};

fn app(exec: StubExecutor, token: &str) -> Router {
    build_router(AppState::new(service(Arc::new(exec)), token))
}

async fn send(app: Router, req: Request<Body>) -> (StatusCode, Value) {
    let resp = app.oneshot(req).await.unwrap();
    let status = resp.status();
    let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, json)
}

fn post(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn one_game() -> StubExecutor {
    StubExecutor::with_rows(vec![game_row(
        "g1", 2024, "KC", "BAL", true, (27, 20), Some(-3.0), Some(44.5), Some(-150), "Shawn Hochuli",
    )])
}

#[tokio::test]
async fn test_health_ok_and_degraded() {
    let req = || Request::builder().uri("/health").body(Body::empty()).unwrap();

    let (status, body) = send(app(StubExecutor::default(), ""), req()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["clickhouse"], true);
    assert!(body["version"].is_string());

    let (status, body) = send(app(StubExecutor::unreachable(), ""), req()).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "degraded");
}

#[tokio::test]
async fn test_team_route() {
    let req = post("/api/query/team", r#"{"team":"kc"}"#);
    let (status, body) = send(app(one_game(), ""), req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["team"], "KC");
    assert_eq!(body["league"], "nfl");
    assert_eq!(body["games"], 1);
    assert_eq!(body["rows"].as_array().unwrap().len(), 1);
    assert_eq!(body["ats"]["wins"], 1);
}

#[tokio::test]
async fn test_validation_error_body() {
    let req = post("/api/query/team", r#"{"team":"K"}"#);
    let (status, body) = send(app(one_game(), ""), req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");
    assert!(body["message"].as_str().unwrap().contains("team"));
}

#[tokio::test]
async fn test_malformed_and_unknown_fields_rejected() {
    let (status, body) = send(app(one_game(), ""), post("/api/query/trend", "{not json")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");

    let (status, _) = send(
        app(one_game(), ""),
        post("/api/query/trend", r#"{"filters":{"spread_minimum":3}}"#),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_backend_failure_is_bad_gateway() {
    let (status, body) = send(
        app(StubExecutor::failing("Unknown table"), ""),
        post("/api/query/trend", "{}"),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"], "backend_error");
}

#[tokio::test]
async fn test_referee_not_found() {
    let (status, body) = send(
        app(StubExecutor::default(), ""),
        post("/api/query/referee", r#"{"referee":"Nobody"}"#),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");
}

#[tokio::test]
async fn test_bearer_guard() {
    let body = r#"{"team":"KC"}"#;

    let (status, resp) = send(app(one_game(), "s3cret"), post("/api/query/team", body)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(resp["error"], "unauthorized");

    let mut wrong = post("/api/query/team", body);
    wrong
        .headers_mut()
        .insert("authorization", "Bearer nope".parse().unwrap());
    let (status, _) = send(app(one_game(), "s3cret"), wrong).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let mut right = post("/api/query/team", body);
    right
        .headers_mut()
        .insert("authorization", "Bearer s3cret".parse().unwrap());
    let (status, _) = send(app(one_game(), "s3cret"), right).await;
    assert_eq!(status, StatusCode::OK);

    // Health stays open.
    let health = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let (status, _) = send(app(one_game(), "s3cret"), health).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_batch_route() {
    let payload = json!({
        "queries": [
            { "kind": "team", "request": { "team": "KC" } },
            {
                "kind": "prop",
                "request": { "league": "nba", "prop_type": "receptions", "player_id": "x1" }
            },
        ]
    });
    let req = post("/api/query/batch", &payload.to_string());
    let (status, body) = send(app(one_game(), ""), req).await;
    assert_eq!(status, StatusCode::OK);
    let outcomes = body.as_array().unwrap();
    assert_eq!(outcomes.len(), 2);
    assert_eq!(outcomes[0]["ok"], true);
    assert_eq!(outcomes[1]["ok"], false);
    assert_eq!(outcomes[1]["kind"], "prop");
}

#[tokio::test]
async fn test_cache_stats_and_clear() {
    let app = app(one_game(), "");

    let (status, _) = send(app.clone(), post("/api/query/team", r#"{"team":"KC"}"#)).await;
    assert_eq!(status, StatusCode::OK);

    let stats = Request::builder().uri("/api/cache").body(Body::empty()).unwrap();
    let (status, body) = send(app.clone(), stats).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["entries"], 1);
    assert_eq!(body["ttl_secs"], 1800);

    let clear = Request::builder()
        .method("DELETE")
        .uri("/api/cache")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(app, clear).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["cleared"], 1);
}
