//! Route handlers. Each one validates the body, hands it to the query
//! service, and returns the serialized response.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::query::batch::{BatchOutcome, BatchRequest};
use crate::query::prop_query::PropQueryRequest;
use crate::query::referee_query::RefereeQueryRequest;
use crate::query::team_query::TeamQueryRequest;
use crate::query::trend_query::TrendQueryRequest;
use crate::state::cache::CacheStats;

use super::error::AppError;
use super::AppState;

type JsonBody<T> = Result<Json<T>, JsonRejection>;

pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let clickhouse = match state.service.executor().ping().await {
        Ok(()) => true,
        Err(e) => {
            warn!(error = %e, "ClickHouse ping failed");
            false
        }
    };
    let (status, label) = if clickhouse {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };
    (
        status,
        Json(json!({
            "status": label,
            "version": env!("CARGO_PKG_VERSION"),
            "clickhouse": clickhouse,
        })),
    )
}

pub async fn team_query(
    State(state): State<AppState>,
    body: JsonBody<TeamQueryRequest>,
) -> Result<Json<Value>, AppError> {
    let Json(req) = body?;
    Ok(Json(state.service.team(&req).await?))
}

pub async fn trend_query(
    State(state): State<AppState>,
    body: JsonBody<TrendQueryRequest>,
) -> Result<Json<Value>, AppError> {
    let Json(req) = body?;
    Ok(Json(state.service.trend(&req).await?))
}

pub async fn prop_query(
    State(state): State<AppState>,
    body: JsonBody<PropQueryRequest>,
) -> Result<Json<Value>, AppError> {
    let Json(req) = body?;
    Ok(Json(state.service.prop(&req).await?))
}

pub async fn referee_query(
    State(state): State<AppState>,
    body: JsonBody<RefereeQueryRequest>,
) -> Result<Json<Value>, AppError> {
    let Json(req) = body?;
    Ok(Json(state.service.referee(&req).await?))
}

pub async fn batch_query(
    State(state): State<AppState>,
    body: JsonBody<BatchRequest>,
) -> Result<Json<Vec<BatchOutcome>>, AppError> {
    let Json(req) = body?;
    Ok(Json(state.service.batch(req).await?))
}

pub async fn cache_stats(State(state): State<AppState>) -> Json<CacheStats> {
    Json(state.service.cache().stats())
}

pub async fn clear_cache(State(state): State<AppState>) -> Json<Value> {
    let cleared = state.service.cache().clear();
    info!(cleared, "Query cache cleared");
    Json(json!({ "cleared": cleared }))
}
