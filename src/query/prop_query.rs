//! Player-prop query: graded prop lines for one player and market, joined to
//! the game so every trend filter applies.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::api::executor::fetch;
use crate::data::models::{League, PropRow, PropType};

use super::filters::{FilterBuilder, TrendFilters};
use super::sql::{Params, ParameterizedQuery, WhereClause};
use super::summary::{summarize_props, PropSummary};
use super::{perspective, row_limit, validate_name, QueryContext, QueryError};

/// Book used when the request doesn't name one.
pub const DEFAULT_BOOKMAKER: &str = "consensus";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PropQueryRequest {
    #[serde(default)]
    pub league: League,
    pub prop_type: PropType,
    #[serde(default)]
    pub player_id: Option<String>,
    #[serde(default)]
    pub player_name: Option<String>,
    /// Grade every game against this line instead of the historical one.
    #[serde(default)]
    pub line: Option<f64>,
    #[serde(default)]
    pub bookmaker: Option<String>,
    #[serde(default)]
    pub filters: TrendFilters,
    #[serde(default)]
    pub last_n_games: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PropQueryResponse {
    pub player: String,
    pub prop_type: PropType,
    pub market: &'static str,
    pub line_override: Option<f64>,
    #[serde(flatten)]
    pub summary: PropSummary,
    /// Graded rows, newest first.
    pub rows: Vec<PropRow>,
}

pub fn build_query(
    req: &PropQueryRequest,
    ctx: &QueryContext<'_>,
) -> Result<ParameterizedQuery, QueryError> {
    let table = req.league.prop_table().ok_or_else(|| {
        QueryError::Validation(format!("player props are not available for {}", req.league))
    })?;
    if req.player_id.is_none() && req.player_name.is_none() {
        return Err(QueryError::Validation(
            "player_id or player_name is required".to_string(),
        ));
    }
    if let Some(line) = req.line {
        if !line.is_finite() || line < 0.0 {
            return Err(QueryError::Validation("line must be a non-negative number".to_string()));
        }
    }
    let bookmaker = validate_name(
        "bookmaker",
        req.bookmaker.as_deref().unwrap_or(DEFAULT_BOOKMAKER),
    )?;
    let limit = row_limit(req.last_n_games, ctx.max_rows)?;

    let mut params = Params::new();
    let view = perspective::view(req.league, &mut params);

    let mut clause = WhereClause::new();
    FilterBuilder::with_alias("g").apply(
        &req.filters,
        req.league,
        ctx.today,
        &mut params,
        &mut clause,
    )?;
    clause.push(format!("p.prop_type = {}", params.bind(req.prop_type.market_key())));
    clause.push(format!("p.bookmaker = {}", params.bind(bookmaker)));
    clause.push("isNotNull(p.actual_value)");
    if let Some(id) = &req.player_id {
        let id = validate_name("player_id", id)?;
        clause.push(format!("p.player_id = {}", params.bind(id)));
    }
    if let Some(name) = &req.player_name {
        let name = validate_name("player_name", name)?;
        clause.push(format!("lower(p.player_name) = lower({})", params.bind(name)));
    }

    let sql = format!(
        "SELECT p.game_id AS game_id, g.game_date AS game_date, g.season AS season, g.week AS week, \
         p.player_id AS player_id, p.player_name AS player_name, p.team AS team, \
         g.opponent AS opponent, g.is_home AS is_home, p.prop_type AS prop_type, \
         p.bookmaker AS bookmaker, p.line AS line, p.over_odds AS over_odds, \
         p.under_odds AS under_odds, p.actual_value AS actual_value, g.team_spread AS team_spread \
         FROM {table} AS p FINAL \
         INNER JOIN ({view}) AS g ON p.game_id = g.game_id AND p.team = g.team \
         {where_sql} ORDER BY g.game_date DESC LIMIT {limit}",
        where_sql = clause.to_sql(),
        limit = params.bind(limit),
    );
    Ok(ParameterizedQuery::new(sql, params))
}

pub async fn execute(
    req: &PropQueryRequest,
    query: &ParameterizedQuery,
    ctx: &QueryContext<'_>,
) -> Result<PropQueryResponse, QueryError> {
    let result = fetch::<PropRow>(ctx.executor, query).await?;
    let summary = summarize_props(&result.data, req.line);

    let player = result
        .data
        .first()
        .map(|r| r.player_name.clone())
        .or_else(|| req.player_name.clone())
        .or_else(|| req.player_id.clone())
        .unwrap_or_default();

    debug!(
        player = %player,
        market = req.prop_type.market_key(),
        games = summary.games,
        "Prop query summarized"
    );

    Ok(PropQueryResponse {
        player,
        prop_type: req.prop_type,
        market: req.prop_type.market_key(),
        line_override: req.line,
        summary,
        rows: result.data,
    })
}

pub async fn run(
    req: &PropQueryRequest,
    ctx: &QueryContext<'_>,
) -> Result<PropQueryResponse, QueryError> {
    let query = build_query(req, ctx)?;
    execute(req, &query, ctx).await
}
