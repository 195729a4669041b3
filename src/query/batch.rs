//! Several independent queries in one request, run with bounded fan-out.

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{info, warn};

use super::prop_query::PropQueryRequest;
use super::referee_query::RefereeQueryRequest;
use super::service::QueryService;
use super::team_query::TeamQueryRequest;
use super::trend_query::TrendQueryRequest;
use super::QueryError;

/// One query of a batch: `{"kind": "team", "request": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "request", rename_all = "snake_case")]
pub enum BatchItem {
    Team(TeamQueryRequest),
    Trend(TrendQueryRequest),
    Prop(PropQueryRequest),
    Referee(RefereeQueryRequest),
}

impl BatchItem {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Team(_) => "team",
            Self::Trend(_) => "trend",
            Self::Prop(_) => "prop",
            Self::Referee(_) => "referee",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BatchRequest {
    pub queries: Vec<BatchItem>,
}

/// Per-item result; one failing query doesn't fail the batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchOutcome {
    pub kind: &'static str,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Run every query, at most `concurrency` at a time, preserving order.
pub async fn run_batch(
    service: Arc<QueryService>,
    queries: Vec<BatchItem>,
    concurrency: usize,
    max_queries: usize,
) -> Result<Vec<BatchOutcome>, QueryError> {
    if queries.len() > max_queries {
        return Err(QueryError::Validation(format!(
            "batch holds {} queries, limit is {}",
            queries.len(),
            max_queries
        )));
    }

    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut tasks = Vec::with_capacity(queries.len());

    for item in queries {
        let service = service.clone();
        let sem = semaphore.clone();
        let kind = item.kind();

        let handle = tokio::spawn(async move {
            let _permit = sem.acquire_owned().await.ok();
            service.dispatch(&item).await
        });
        tasks.push((kind, handle));
    }

    let (kinds, handles): (Vec<_>, Vec<_>) = tasks.into_iter().unzip();
    let outcomes: Vec<BatchOutcome> = join_all(handles)
        .await
        .into_iter()
        .zip(kinds)
        .map(|(joined, kind)| match joined {
            Ok(Ok(value)) => BatchOutcome {
                kind,
                ok: true,
                result: Some(value),
                error: None,
            },
            Ok(Err(e)) => BatchOutcome {
                kind,
                ok: false,
                result: None,
                error: Some(e.to_string()),
            },
            Err(e) => {
                warn!(kind, error = %e, "Batch task failed");
                BatchOutcome {
                    kind,
                    ok: false,
                    result: None,
                    error: Some("query task failed".to_string()),
                }
            }
        })
        .collect();

    info!(
        queries = outcomes.len(),
        failed = outcomes.iter().filter(|o| !o.ok).count(),
        "Batch complete"
    );
    Ok(outcomes)
}
