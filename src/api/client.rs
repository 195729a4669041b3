//! Async client for the ClickHouse HTTP interface.
//!
//! Features:
//! - Header or basic-auth credentials
//! - Rate limiting (configurable, default 20 req/sec)
//! - Automatic retries with exponential backoff on transient failures
//! - Typed placeholders sent as `param_*` URL parameters

use async_trait::async_trait;
use governor::{Quota, RateLimiter};
use reqwest::Client;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::auth::ClickHouseAuth;
use crate::config::Settings;
use crate::data::models::QueryResult;
use crate::query::sql::ParameterizedQuery;

use super::errors::ClickHouseError;
use super::executor::QueryExecutor;

const BACKOFF_BASE_MS: u64 = 500;
const BACKOFF_MAX_MS: u64 = 30_000;

/// Exponential backoff before retry `attempt + 1`, capped at 30s.
fn backoff_delay(attempt: u32) -> Duration {
    let ms = 2u64
        .checked_pow(attempt)
        .map_or(BACKOFF_MAX_MS, |factor| BACKOFF_BASE_MS.saturating_mul(factor))
        .min(BACKOFF_MAX_MS);
    Duration::from_millis(ms)
}

/// Connection settings for [`ClickHouseClient`].
#[derive(Debug, Clone)]
pub struct ClickHouseConfig {
    pub url: String,
    pub database: String,
    pub rate_limit: u32,
    pub max_retries: u32,
    pub timeout_secs: u64,
}

impl ClickHouseConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            url: settings.clickhouse_url.clone(),
            database: settings.clickhouse_database.clone(),
            rate_limit: settings.clickhouse_rate_limit,
            max_retries: settings.clickhouse_max_retries,
            timeout_secs: settings.clickhouse_timeout_secs,
        }
    }
}

/// Async HTTP client for ClickHouse.
pub struct ClickHouseClient {
    auth: ClickHouseAuth,
    base_url: String,
    database: String,
    client: Client,
    rate_limiter: Arc<
        RateLimiter<
            governor::state::NotKeyed,
            governor::state::InMemoryState,
            governor::clock::DefaultClock,
        >,
    >,
    max_retries: u32,
}

impl ClickHouseClient {
    pub fn new(auth: ClickHouseAuth, config: &ClickHouseConfig) -> Result<Self, ClickHouseError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .pool_max_idle_per_host(20)
            .tcp_keepalive(Duration::from_secs(30))
            .build()
            .map_err(|e| ClickHouseError::Network(e.to_string()))?;

        let quota =
            Quota::per_second(NonZeroU32::new(config.rate_limit).unwrap_or(NonZeroU32::MIN));
        let rate_limiter = Arc::new(RateLimiter::direct(quota));

        Ok(Self {
            auth,
            base_url: config.url.trim_end_matches('/').to_string(),
            database: config.database.clone(),
            client,
            rate_limiter,
            max_retries: config.max_retries.max(1),
        })
    }

    // =========================================================================
    // Core request method
    // =========================================================================

    /// POST `body` to the root endpoint; return the raw response text.
    async fn request(
        &self,
        body: &str,
        params: &[(String, String)],
    ) -> Result<String, ClickHouseError> {
        let url = format!("{}/", self.base_url);
        let headers = self
            .auth
            .to_header_map()
            .map_err(|e| ClickHouseError::Authentication(e.to_string()))?;
        let mut last_error: Option<ClickHouseError> = None;

        for attempt in 0..self.max_retries {
            let last_attempt = attempt + 1 == self.max_retries;

            // Rate limiting
            self.rate_limiter.until_ready().await;

            // Fresh id per attempt so server-side logs keep retries apart.
            let query_id = Uuid::new_v4().to_string();

            debug!(
                query_id = %query_id,
                attempt = attempt + 1,
                bytes = body.len(),
                "ClickHouse request"
            );

            let result = self
                .client
                .post(&url)
                .headers(headers.clone())
                .query(&[("database", self.database.as_str()), ("query_id", query_id.as_str())])
                .query(params)
                .body(body.to_string())
                .send()
                .await;

            match result {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        return response
                            .text()
                            .await
                            .map_err(|e| ClickHouseError::Network(e.to_string()));
                    }

                    // Rate limited: always retry
                    if status.as_u16() == 429 {
                        let retry_after = response
                            .headers()
                            .get("Retry-After")
                            .and_then(|v| v.to_str().ok())
                            .and_then(|v| v.parse::<u64>().ok())
                            .unwrap_or(1);
                        warn!(retry_after, attempt = attempt + 1, "Rate limited");
                        last_error = Some(ClickHouseError::RateLimited { retry_after });
                        if !last_attempt {
                            let wait = Duration::from_secs(retry_after)
                                .min(Duration::from_millis(BACKOFF_MAX_MS));
                            tokio::time::sleep(wait).await;
                        }
                        continue;
                    }

                    let code_header = response
                        .headers()
                        .get("X-ClickHouse-Exception-Code")
                        .and_then(|v| v.to_str().ok())
                        .map(str::to_string);
                    let body_text = response.text().await.unwrap_or_default();
                    let err = ClickHouseError::from_response(
                        status.as_u16(),
                        code_header.as_deref(),
                        &body_text,
                    );

                    // Transient server errors: retry with backoff
                    if err.is_retryable() {
                        let delay = backoff_delay(attempt);
                        warn!(
                            status_code = status.as_u16(),
                            error = %err,
                            delay_ms = delay.as_millis() as u64,
                            attempt = attempt + 1,
                            "Server error, retrying"
                        );
                        if !last_attempt {
                            tokio::time::sleep(delay).await;
                        }
                        last_error = Some(err);
                        continue;
                    }

                    // Anything else fails the same way again
                    return Err(err);
                }
                Err(e) => {
                    let delay = backoff_delay(attempt);
                    warn!(
                        error = %e,
                        delay_ms = delay.as_millis() as u64,
                        attempt = attempt + 1,
                        "Network error, retrying"
                    );
                    if !last_attempt {
                        tokio::time::sleep(delay).await;
                    }

                    if e.is_timeout() {
                        last_error = Some(ClickHouseError::Timeout(e.to_string()));
                    } else {
                        last_error = Some(ClickHouseError::Network(e.to_string()));
                    }
                    continue;
                }
            }
        }

        Err(ClickHouseError::MaxRetriesExceeded {
            attempts: self.max_retries,
            last_error: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "Unknown error".to_string()),
        })
    }
}

#[async_trait]
impl QueryExecutor for ClickHouseClient {
    async fn query_rows(
        &self,
        query: &ParameterizedQuery,
    ) -> Result<QueryResult<serde_json::Value>, ClickHouseError> {
        let started = Instant::now();

        let mut params = vec![
            ("default_format".to_string(), "JSON".to_string()),
            ("output_format_json_quote_64bit_integers".to_string(), "0".to_string()),
        ];
        params.extend(query.params.to_url_pairs());

        let text = self.request(&query.sql, &params).await?;
        let result: QueryResult<serde_json::Value> = serde_json::from_str(&text)
            .map_err(|e| ClickHouseError::Deserialization(e.to_string()))?;

        info!(
            rows = result.rows,
            rows_read = result.statistics.as_ref().map(|s| s.rows_read).unwrap_or(0),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "ClickHouse query complete"
        );

        Ok(result)
    }

    async fn command(&self, sql: &str) -> Result<(), ClickHouseError> {
        self.request(sql, &[]).await.map(|_| ())
    }

    async fn ping(&self) -> Result<(), ClickHouseError> {
        let url = format!("{}/ping", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ClickHouseError::Network(e.to_string()))?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if status.is_success() && body.trim() == "Ok." {
            Ok(())
        } else {
            Err(ClickHouseError::from_response(status.as_u16(), None, &body))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AuthScheme;
    use crate::query::sql::Params;
    use axum::extract::{Query, State};
    use axum::http::{HeaderMap, StatusCode};
    use axum::response::{IntoResponse, Response};
    use axum::routing::{get, post};
    use axum::Router;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    // =========================================================================
    // Local ClickHouse stand-in
    // =========================================================================

    #[derive(Debug, Clone)]
    struct Seen {
        params: HashMap<String, String>,
        user: Option<String>,
        body: String,
    }

    #[derive(Clone)]
    struct Stub {
        hits: Arc<AtomicUsize>,
        seen: Arc<Mutex<Vec<Seen>>>,
        reply: fn(usize) -> Response,
    }

    async fn handle(
        State(stub): State<Stub>,
        Query(params): Query<HashMap<String, String>>,
        headers: HeaderMap,
        body: String,
    ) -> Response {
        let n = stub.hits.fetch_add(1, Ordering::SeqCst);
        stub.seen.lock().unwrap().push(Seen {
            params,
            user: headers
                .get("X-ClickHouse-User")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
            body,
        });
        (stub.reply)(n)
    }

    async fn serve(reply: fn(usize) -> Response, ping_body: &'static str) -> (String, Stub) {
        let stub = Stub {
            hits: Arc::new(AtomicUsize::new(0)),
            seen: Arc::new(Mutex::new(Vec::new())),
            reply,
        };
        let app = Router::new()
            .route("/", post(handle))
            .route("/ping", get(move || async move { ping_body }))
            .with_state(stub.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}"), stub)
    }

    fn client(url: &str, max_retries: u32) -> ClickHouseClient {
        let auth = ClickHouseAuth::new("analyst", "pw", AuthScheme::Headers).unwrap();
        let config = ClickHouseConfig {
            url: url.to_string(),
            database: "betting".to_string(),
            rate_limit: 1000,
            max_retries,
            timeout_secs: 5,
        };
        ClickHouseClient::new(auth, &config).unwrap()
    }

    fn query() -> ParameterizedQuery {
        let mut params = Params::new();
        let team = params.bind("KC");
        let sql = format!("SELECT team FROM nfl_games WHERE home_team = {team}");
        ParameterizedQuery::new(sql, params)
    }

    fn ok_json() -> Response {
        (
            StatusCode::OK,
            r#"{"data":[{"team":"KC"}],"rows":1,
                "statistics":{"elapsed":0.002,"rows_read":272,"bytes_read":4096}}"#,
        )
            .into_response()
    }

    fn too_many_queries() -> Response {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            [("X-ClickHouse-Exception-Code", "202")],
            "Code: 202. DB::Exception: Too many simultaneous queries",
        )
            .into_response()
    }

    fn always_ok(_: usize) -> Response {
        ok_json()
    }

    fn transient_then_ok(n: usize) -> Response {
        if n == 0 {
            too_many_queries()
        } else {
            ok_json()
        }
    }

    fn always_transient(_: usize) -> Response {
        too_many_queries()
    }

    fn unknown_identifier(_: usize) -> Response {
        (
            StatusCode::NOT_FOUND,
            [("X-ClickHouse-Exception-Code", "47")],
            "Code: 47. DB::Exception: Missing columns: 'hometeam'",
        )
            .into_response()
    }

    fn rate_limited_then_ok(n: usize) -> Response {
        if n == 0 {
            (StatusCode::TOO_MANY_REQUESTS, [("Retry-After", "0")], "slow down").into_response()
        } else {
            ok_json()
        }
    }

    // =========================================================================
    // Backoff
    // =========================================================================

    #[test]
    fn test_backoff_doubles_then_caps() {
        assert_eq!(backoff_delay(0), Duration::from_millis(500));
        assert_eq!(backoff_delay(1), Duration::from_millis(1000));
        assert_eq!(backoff_delay(3), Duration::from_millis(4000));
        assert_eq!(backoff_delay(6), Duration::from_secs(30));
        assert_eq!(backoff_delay(64), Duration::from_secs(30));
        assert_eq!(backoff_delay(u32::MAX), Duration::from_secs(30));
    }

    // =========================================================================
    // Requests
    // =========================================================================

    #[tokio::test]
    async fn test_query_sends_params_and_parses_rows() {
        let (url, stub) = serve(always_ok, "Ok.\n").await;
        let result = client(&url, 3).query_rows(&query()).await.unwrap();

        assert_eq!(result.rows, 1);
        assert_eq!(result.data[0]["team"], "KC");
        assert_eq!(result.statistics.unwrap().rows_read, 272);

        let seen = stub.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        let req = &seen[0];
        assert_eq!(req.params.get("database").map(String::as_str), Some("betting"));
        assert_eq!(req.params.get("default_format").map(String::as_str), Some("JSON"));
        assert_eq!(req.params.get("param_p0").map(String::as_str), Some("KC"));
        assert!(req.params.get("query_id").is_some_and(|id| id.len() == 36));
        assert_eq!(req.user.as_deref(), Some("analyst"));
        assert_eq!(req.body, "SELECT team FROM nfl_games WHERE home_team = {p0:String}");
    }

    #[tokio::test]
    async fn test_transient_error_retried_with_fresh_query_id() {
        let (url, stub) = serve(transient_then_ok, "Ok.\n").await;
        let result = client(&url, 3).query_rows(&query()).await.unwrap();

        assert_eq!(result.rows, 1);
        assert_eq!(stub.hits.load(Ordering::SeqCst), 2);
        let seen = stub.seen.lock().unwrap();
        assert_ne!(seen[0].params.get("query_id"), seen[1].params.get("query_id"));
    }

    #[tokio::test]
    async fn test_rate_limit_honours_retry_after() {
        let (url, stub) = serve(rate_limited_then_ok, "Ok.\n").await;
        let result = client(&url, 2).query_rows(&query()).await.unwrap();
        assert_eq!(result.rows, 1);
        assert_eq!(stub.hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_deterministic_error_fails_immediately() {
        let (url, stub) = serve(unknown_identifier, "Ok.\n").await;
        let started = Instant::now();
        let err = client(&url, 3).query_rows(&query()).await.unwrap_err();

        match err {
            ClickHouseError::Server { code, .. } => assert_eq!(code, Some(47)),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(stub.hits.load(Ordering::SeqCst), 1);
        assert!(started.elapsed() < Duration::from_millis(400));
    }

    #[tokio::test]
    async fn test_last_attempt_does_not_sleep() {
        let (url, stub) = serve(always_transient, "Ok.\n").await;
        let started = Instant::now();
        let err = client(&url, 1).query_rows(&query()).await.unwrap_err();

        assert!(matches!(err, ClickHouseError::MaxRetriesExceeded { attempts: 1, .. }));
        assert_eq!(stub.hits.load(Ordering::SeqCst), 1);
        assert!(started.elapsed() < Duration::from_millis(400));
    }

    #[tokio::test]
    async fn test_retries_exhausted() {
        let (url, stub) = serve(always_transient, "Ok.\n").await;
        let started = Instant::now();
        let err = client(&url, 2).query_rows(&query()).await.unwrap_err();

        match err {
            ClickHouseError::MaxRetriesExceeded { attempts, last_error } => {
                assert_eq!(attempts, 2);
                assert!(last_error.contains("Too many simultaneous queries"));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(stub.hits.load(Ordering::SeqCst), 2);
        // One 500ms backoff between the two attempts; a second 1s sleep after
        // the last attempt would push this past 1.5s.
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(500));
        assert!(elapsed < Duration::from_millis(1400));
    }

    // =========================================================================
    // Ping
    // =========================================================================

    #[tokio::test]
    async fn test_ping() {
        let (url, _) = serve(always_ok, "Ok.\n").await;
        assert!(client(&url, 1).ping().await.is_ok());

        let (url, _) = serve(always_ok, "starting").await;
        assert!(client(&url, 1).ping().await.is_err());
    }
}
