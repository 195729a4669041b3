//! League-wide trend query: every team-game matching a filter set, with an
//! optional breakdown by team or season.
//!
//! Without a location or side filter each game is counted from both sides,
//! so an unfiltered ATS record sits near .500 by construction.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};

use crate::api::executor::fetch;
use crate::data::models::{League, TeamGameRow};

use super::filters::{FilterBuilder, TrendFilters};
use super::sql::{Params, ParameterizedQuery, WhereClause};
use super::summary::{summarize_games, GameSummary};
use super::{cap_rows, perspective, QueryContext, QueryError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendGrouping {
    None,
    Team,
    Season,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TrendQueryRequest {
    #[serde(default)]
    pub league: League,
    #[serde(default)]
    pub filters: TrendFilters,
    #[serde(default)]
    pub group_by: Option<TrendGrouping>,
    /// Groups with fewer games are dropped.
    #[serde(default)]
    pub min_games: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TrendGroup {
    pub key: String,
    #[serde(flatten)]
    pub summary: GameSummary,
}

#[derive(Debug, Clone, Serialize)]
pub struct TrendQueryResponse {
    pub league: League,
    /// The row cap was hit; records cover the most recent games only.
    pub truncated: bool,
    pub summary: GameSummary,
    pub groups: Vec<TrendGroup>,
}

pub fn build_query(
    req: &TrendQueryRequest,
    ctx: &QueryContext<'_>,
) -> Result<ParameterizedQuery, QueryError> {
    let mut params = Params::new();
    let view = perspective::view(req.league, &mut params);

    let mut clause = WhereClause::new();
    FilterBuilder::new().apply(&req.filters, req.league, ctx.today, &mut params, &mut clause)?;

    let sql = format!(
        "SELECT {} FROM ({}) {} ORDER BY game_date DESC, game_id, team LIMIT {}",
        perspective::column_list(None),
        view,
        clause.to_sql(),
        // One row past the cap tells a full result from a cut one.
        params.bind(ctx.max_rows.saturating_add(1)),
    );
    Ok(ParameterizedQuery::new(sql, params))
}

/// Split rows into groups and summarize each; best ATS first.
pub fn group_rows(
    rows: &[TeamGameRow],
    grouping: TrendGrouping,
    min_games: u32,
) -> Vec<TrendGroup> {
    let mut buckets: BTreeMap<String, Vec<TeamGameRow>> = BTreeMap::new();
    for row in rows {
        let key = match grouping {
            TrendGrouping::None => return Vec::new(),
            TrendGrouping::Team => row.team.clone(),
            TrendGrouping::Season => row.season.to_string(),
        };
        buckets.entry(key).or_default().push(row.clone());
    }

    let mut groups: Vec<TrendGroup> = buckets
        .into_iter()
        .filter(|(_, rows)| rows.len() as u32 >= min_games)
        .map(|(key, rows)| TrendGroup {
            key,
            summary: summarize_games(&rows),
        })
        .collect();

    // BTreeMap order breaks remaining ties by key; sort_by is stable.
    groups.sort_by(|a, b| {
        b.summary
            .ats
            .win_pct
            .cmp(&a.summary.ats.win_pct)
            .then(b.summary.games.cmp(&a.summary.games))
    });
    groups
}

pub async fn execute(
    req: &TrendQueryRequest,
    query: &ParameterizedQuery,
    ctx: &QueryContext<'_>,
) -> Result<TrendQueryResponse, QueryError> {
    let mut result = fetch::<TeamGameRow>(ctx.executor, query).await?;
    let truncated = cap_rows(&mut result.data, ctx.max_rows);
    if truncated {
        warn!(max_rows = ctx.max_rows, "Trend query hit the row cap");
    }

    let summary = summarize_games(&result.data);
    let groups = group_rows(
        &result.data,
        req.group_by.unwrap_or(TrendGrouping::None),
        req.min_games.unwrap_or(1),
    );

    debug!(rows = result.data.len(), groups = groups.len(), "Trend query summarized");

    Ok(TrendQueryResponse {
        league: req.league,
        truncated,
        summary,
        groups,
    })
}

pub async fn run(
    req: &TrendQueryRequest,
    ctx: &QueryContext<'_>,
) -> Result<TrendQueryResponse, QueryError> {
    let query = build_query(req, ctx)?;
    execute(req, &query, ctx).await
}
