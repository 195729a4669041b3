//! HTTP surface: axum router, bearer-token guard, and shared state.

pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::auth::check_bearer;
use crate::query::service::QueryService;

use error::AppError;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<QueryService>,
    /// Empty means `/api/*` is open.
    pub api_token: Arc<str>,
}

impl AppState {
    pub fn new(service: Arc<QueryService>, api_token: &str) -> Self {
        Self {
            service,
            api_token: Arc::from(api_token),
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    let api = Router::new()
        .route("/query/team", post(routes::team_query))
        .route("/query/trend", post(routes::trend_query))
        .route("/query/prop", post(routes::prop_query))
        .route("/query/referee", post(routes::referee_query))
        .route("/query/batch", post(routes::batch_query))
        .route("/cache", get(routes::cache_stats).delete(routes::clear_cache))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_token));

    Router::new()
        .route("/health", get(routes::health))
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn require_token(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    if !state.api_token.is_empty() {
        let header = req
            .headers()
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok());
        check_bearer(header, &state.api_token)?;
    }
    Ok(next.run(req).await)
}
