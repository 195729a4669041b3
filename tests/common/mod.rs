//! Shared fixtures: an in-memory executor and row builders.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use trend_engine::api::{ClickHouseError, QueryExecutor};
use trend_engine::data::models::QueryResult;
use trend_engine::query::service::{QueryService, ServiceLimits};
use trend_engine::query::sql::ParameterizedQuery;
use trend_engine::query::QueryContext;
use trend_engine::state::QueryCache;

/// Returns canned rows for every query and records what it was asked.
#[derive(Default)]
pub struct StubExecutor {
    rows: Vec<Value>,
    failure: Option<String>,
    down: bool,
    pub queries: Mutex<Vec<ParameterizedQuery>>,
    pub commands: Mutex<Vec<String>>,
    pub calls: AtomicUsize,
}

impl StubExecutor {
    pub fn with_rows(rows: Vec<Value>) -> Self {
        Self {
            rows,
            ..Self::default()
        }
    }

    /// Every query fails with a syntax error.
    pub fn failing(message: &str) -> Self {
        Self {
            failure: Some(message.to_string()),
            ..Self::default()
        }
    }

    /// Ping fails.
    pub fn unreachable() -> Self {
        Self {
            down: true,
            ..Self::default()
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_query(&self) -> ParameterizedQuery {
        self.queries.lock().unwrap().last().cloned().unwrap()
    }
}

#[async_trait]
impl QueryExecutor for StubExecutor {
    async fn query_rows(
        &self,
        query: &ParameterizedQuery,
    ) -> Result<QueryResult<Value>, ClickHouseError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.queries.lock().unwrap().push(query.clone());
        match &self.failure {
            Some(msg) => Err(ClickHouseError::Syntax(msg.clone())),
            None => Ok(QueryResult::from_rows(self.rows.clone())),
        }
    }

    async fn command(&self, sql: &str) -> Result<(), ClickHouseError> {
        self.commands.lock().unwrap().push(sql.to_string());
        Ok(())
    }

    async fn ping(&self) -> Result<(), ClickHouseError> {
        if self.down {
            Err(ClickHouseError::Network("connection refused".to_string()))
        } else {
            Ok(())
        }
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Fixed "today" in the middle of the 2024 NFL season.
pub fn ctx(executor: &StubExecutor) -> QueryContext<'_> {
    QueryContext {
        executor,
        max_rows: 500,
        today: date(2024, 11, 20),
    }
}

pub fn service(executor: Arc<StubExecutor>) -> Arc<QueryService> {
    Arc::new(QueryService::new(
        executor,
        QueryCache::new(Duration::from_secs(1800), 100),
        ServiceLimits {
            max_rows: 500,
            batch_concurrency: 2,
            batch_max_queries: 3,
        },
    ))
}

/// One team-perspective row as ClickHouse returns it.
#[allow(clippy::too_many_arguments)]
pub fn game_row(
    game_id: &str,
    season: u16,
    team: &str,
    opponent: &str,
    is_home: bool,
    score: (i32, i32),
    spread: Option<f64>,
    total: Option<f64>,
    moneyline: Option<i32>,
    referee: &str,
) -> Value {
    json!({
        "game_id": game_id,
        "game_date": format!("{season}-10-06"),
        "season": season,
        "week": 5,
        "team": team,
        "opponent": opponent,
        "is_home": is_home,
        "team_score": score.0,
        "opponent_score": score.1,
        "team_spread": spread,
        "total_line": total,
        "team_moneyline": moneyline,
        "team_offense_rank": 4,
        "team_defense_rank": 12,
        "opponent_offense_rank": 20,
        "opponent_defense_rank": 8,
        "team_rest_days": 7,
        "division_game": false,
        "conference_game": true,
        "playoffs": false,
        "referee": referee,
    })
}

pub fn prop_row(game_id: &str, line: f64, actual: f64, over_odds: Option<i32>) -> Value {
    json!({
        "game_id": game_id,
        "game_date": "2024-10-06",
        "season": 2024,
        "week": 5,
        "player_id": "00-0033873",
        "player_name": "Patrick Mahomes",
        "team": "KC",
        "opponent": "NO",
        "is_home": true,
        "prop_type": "player_pass_yds",
        "bookmaker": "consensus",
        "line": line,
        "over_odds": over_odds,
        "under_odds": -110,
        "actual_value": actual,
        "team_spread": -5.5,
    })
}
