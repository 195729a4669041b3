//! The seam between query dispatchers and the store that runs their SQL.

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use crate::data::models::QueryResult;
use crate::query::sql::ParameterizedQuery;

use super::errors::ClickHouseError;

/// Runs parameterized SQL and returns rows as JSON objects.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    async fn query_rows(
        &self,
        query: &ParameterizedQuery,
    ) -> Result<QueryResult<serde_json::Value>, ClickHouseError>;

    /// Statement with no result set (DDL, inserts).
    async fn command(&self, sql: &str) -> Result<(), ClickHouseError>;

    async fn ping(&self) -> Result<(), ClickHouseError>;
}

/// Run a query and deserialize each row into `T`.
pub async fn fetch<T: DeserializeOwned>(
    executor: &dyn QueryExecutor,
    query: &ParameterizedQuery,
) -> Result<QueryResult<T>, ClickHouseError> {
    let raw = executor.query_rows(query).await?;
    let data = raw
        .data
        .into_iter()
        .map(|row| {
            serde_json::from_value(row).map_err(|e| ClickHouseError::Deserialization(e.to_string()))
        })
        .collect::<Result<Vec<T>, _>>()?;

    Ok(QueryResult {
        data,
        rows: raw.rows,
        statistics: raw.statistics,
    })
}
