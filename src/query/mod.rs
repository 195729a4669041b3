//! Betting-trend query engine.
//!
//! Filter objects become WHERE conditions (`filters`) over a team-perspective
//! view of the games table (`perspective`). Each dispatcher turns one typed
//! request into exactly one parameterized query, runs it, and summarizes the
//! rows (`summary`).

pub mod batch;
pub mod filters;
pub mod perspective;
pub mod prop_query;
pub mod referee_query;
pub mod service;
pub mod sql;
pub mod summary;
pub mod team_query;
pub mod trend_query;

use chrono::NaiveDate;
use thiserror::Error;

use crate::api::errors::ClickHouseError;
use crate::api::executor::QueryExecutor;

#[derive(Error, Debug)]
pub enum QueryError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error(transparent)]
    Backend(#[from] ClickHouseError),
}

/// What every dispatcher needs to build and run its query.
#[derive(Clone, Copy)]
pub struct QueryContext<'a> {
    pub executor: &'a dyn QueryExecutor,
    /// Hard cap on rows any query may return.
    pub max_rows: u64,
    /// Anchor for relative time periods.
    pub today: NaiveDate,
}

/// Row limit for a request: `last_n` if given, never above `max_rows`.
pub(crate) fn row_limit(last_n: Option<u32>, max_rows: u64) -> Result<u64, QueryError> {
    match last_n {
        Some(0) => Err(QueryError::Validation("last_n_games must be at least 1".to_string())),
        Some(n) => Ok(u64::from(n).min(max_rows)),
        None => Ok(max_rows),
    }
}

/// Drop rows past `max_rows`; true when any were dropped.
pub(crate) fn cap_rows<T>(rows: &mut Vec<T>, max_rows: u64) -> bool {
    let cap = usize::try_from(max_rows).unwrap_or(usize::MAX);
    if rows.len() > cap {
        rows.truncate(cap);
        true
    } else {
        false
    }
}

/// Free-text names (players, referees, bookmakers) must be short and non-empty.
pub(crate) fn validate_name(field: &str, value: &str) -> Result<String, QueryError> {
    let value = value.trim();
    if value.is_empty() || value.chars().count() > 64 || value.chars().any(char::is_control) {
        return Err(QueryError::Validation(format!(
            "{field} must be 1-64 printable characters"
        )));
    }
    Ok(value.to_string())
}
