//! Dispatch front door: builds each query, serves it from the cache when
//! possible, and otherwise runs it against the executor.

use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use tracing::debug;

use crate::api::executor::QueryExecutor;
use crate::config::Settings;
use crate::state::cache::QueryCache;

use super::batch::{run_batch, BatchItem, BatchOutcome, BatchRequest};
use super::filters::current_date;
use super::prop_query::{self, PropQueryRequest};
use super::referee_query::{self, RefereeQueryRequest};
use super::sql::ParameterizedQuery;
use super::team_query::{self, TeamQueryRequest};
use super::trend_query::{self, TrendQueryRequest};
use super::{QueryContext, QueryError};

#[derive(Debug, Clone, Copy)]
pub struct ServiceLimits {
    pub max_rows: u64,
    pub batch_concurrency: usize,
    pub batch_max_queries: usize,
}

impl ServiceLimits {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            max_rows: settings.query_max_rows,
            batch_concurrency: settings.batch_concurrency,
            batch_max_queries: settings.batch_max_queries,
        }
    }
}

pub struct QueryService {
    executor: Arc<dyn QueryExecutor>,
    cache: QueryCache,
    limits: ServiceLimits,
}

impl QueryService {
    pub fn new(executor: Arc<dyn QueryExecutor>, cache: QueryCache, limits: ServiceLimits) -> Self {
        Self {
            executor,
            cache,
            limits,
        }
    }

    pub fn executor(&self) -> &dyn QueryExecutor {
        self.executor.as_ref()
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    fn context(&self) -> QueryContext<'_> {
        QueryContext {
            executor: self.executor.as_ref(),
            max_rows: self.limits.max_rows,
            today: current_date(),
        }
    }

    async fn cached<R, F>(
        &self,
        kind: &str,
        query: &ParameterizedQuery,
        run: F,
    ) -> Result<serde_json::Value, QueryError>
    where
        R: Serialize,
        F: Future<Output = Result<R, QueryError>>,
    {
        let key = format!("{kind}:{}", query.cache_key());
        if let Some(value) = self.cache.get(&key) {
            debug!(kind, "Query served from cache");
            return Ok(value);
        }

        let response = run.await?;
        let value = serde_json::to_value(&response)
            .map_err(|e| QueryError::Serialization(e.to_string()))?;
        self.cache.insert(key, value.clone());
        Ok(value)
    }

    pub async fn team(&self, req: &TeamQueryRequest) -> Result<serde_json::Value, QueryError> {
        let ctx = self.context();
        let query = team_query::build_query(req, &ctx)?;
        self.cached("team", &query, team_query::execute(req, &query, &ctx)).await
    }

    pub async fn trend(&self, req: &TrendQueryRequest) -> Result<serde_json::Value, QueryError> {
        let ctx = self.context();
        let query = trend_query::build_query(req, &ctx)?;
        // Grouping happens after the fetch, so it belongs in the key too.
        let kind = format!("trend:{:?}:{:?}", req.group_by, req.min_games);
        self.cached(&kind, &query, trend_query::execute(req, &query, &ctx)).await
    }

    pub async fn prop(&self, req: &PropQueryRequest) -> Result<serde_json::Value, QueryError> {
        let ctx = self.context();
        let query = prop_query::build_query(req, &ctx)?;
        let kind = format!("prop:{:?}", req.line);
        self.cached(&kind, &query, prop_query::execute(req, &query, &ctx)).await
    }

    pub async fn referee(
        &self,
        req: &RefereeQueryRequest,
    ) -> Result<serde_json::Value, QueryError> {
        let ctx = self.context();
        let query = referee_query::build_query(req, &ctx)?;
        let kind = format!("referee:{:?}", req.min_games);
        self.cached(&kind, &query, referee_query::execute(req, &query, &ctx)).await
    }

    pub async fn dispatch(&self, item: &BatchItem) -> Result<serde_json::Value, QueryError> {
        match item {
            BatchItem::Team(req) => self.team(req).await,
            BatchItem::Trend(req) => self.trend(req).await,
            BatchItem::Prop(req) => self.prop(req).await,
            BatchItem::Referee(req) => self.referee(req).await,
        }
    }

    pub async fn batch(
        self: &Arc<Self>,
        req: BatchRequest,
    ) -> Result<Vec<BatchOutcome>, QueryError> {
        run_batch(
            self.clone(),
            req.queries,
            self.limits.batch_concurrency,
            self.limits.batch_max_queries,
        )
        .await
    }
}
