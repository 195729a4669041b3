//! Team query: one team's games under a filter set, with ATS, totals and
//! moneyline records.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::api::executor::fetch;
use crate::data::models::{League, TeamGameRow};

use super::filters::{validate_team_code, FilterBuilder, TrendFilters};
use super::sql::{Params, ParameterizedQuery, WhereClause};
use super::summary::{summarize_games, GameSummary};
use super::{perspective, row_limit, QueryContext, QueryError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TeamQueryRequest {
    #[serde(default)]
    pub league: League,
    pub team: String,
    #[serde(default)]
    pub filters: TrendFilters,
    #[serde(default)]
    pub last_n_games: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TeamQueryResponse {
    pub league: League,
    pub team: String,
    #[serde(flatten)]
    pub summary: GameSummary,
    /// Graded rows, newest first.
    pub rows: Vec<TeamGameRow>,
}

pub fn build_query(
    req: &TeamQueryRequest,
    ctx: &QueryContext<'_>,
) -> Result<ParameterizedQuery, QueryError> {
    let team = validate_team_code("team", &req.team)?;
    let limit = row_limit(req.last_n_games, ctx.max_rows)?;

    let mut params = Params::new();
    let view = perspective::view(req.league, &mut params);

    let mut clause = WhereClause::new();
    FilterBuilder::new().apply(&req.filters, req.league, ctx.today, &mut params, &mut clause)?;
    clause.push(format!("team = {}", params.bind(team)));

    let sql = format!(
        "SELECT {} FROM ({}) {} ORDER BY game_date DESC, game_id LIMIT {}",
        perspective::column_list(None),
        view,
        clause.to_sql(),
        params.bind(limit),
    );
    Ok(ParameterizedQuery::new(sql, params))
}

pub async fn execute(
    req: &TeamQueryRequest,
    query: &ParameterizedQuery,
    ctx: &QueryContext<'_>,
) -> Result<TeamQueryResponse, QueryError> {
    let result = fetch::<TeamGameRow>(ctx.executor, query).await?;
    let summary = summarize_games(&result.data);

    debug!(
        team = %req.team,
        games = summary.games,
        ats_wins = summary.ats.wins,
        ats_losses = summary.ats.losses,
        "Team query summarized"
    );

    Ok(TeamQueryResponse {
        league: req.league,
        team: req.team.trim().to_ascii_uppercase(),
        summary,
        rows: result.data,
    })
}

pub async fn run(
    req: &TeamQueryRequest,
    ctx: &QueryContext<'_>,
) -> Result<TeamQueryResponse, QueryError> {
    let query = build_query(req, ctx)?;
    execute(req, &query, ctx).await
}
