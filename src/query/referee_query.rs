//! Referee query: how games officiated by each referee went for the home
//! side and against the total.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::api::executor::fetch;
use crate::data::models::{League, TeamGameRow};

use super::filters::{FilterBuilder, TrendFilters};
use super::sql::{Params, ParameterizedQuery, WhereClause};
use super::summary::{summarize_games, Record};
use super::{cap_rows, perspective, validate_name, QueryContext, QueryError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RefereeQueryRequest {
    #[serde(default)]
    pub league: League,
    #[serde(default)]
    pub referee: Option<String>,
    #[serde(default)]
    pub filters: TrendFilters,
    #[serde(default)]
    pub min_games: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RefereeSummary {
    pub referee: String,
    pub games: u32,
    pub home_ats: Record,
    pub home_moneyline: Record,
    pub over: Record,
    pub under: Record,
    pub avg_total_points: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RefereeQueryResponse {
    pub league: League,
    pub truncated: bool,
    pub referees: Vec<RefereeSummary>,
}

pub fn build_query(
    req: &RefereeQueryRequest,
    ctx: &QueryContext<'_>,
) -> Result<ParameterizedQuery, QueryError> {
    // Rows are home-side only, so a location filter has no meaning here.
    if req.filters.location.is_some() {
        return Err(QueryError::Validation(
            "location filter is not supported for referee queries".to_string(),
        ));
    }

    let mut params = Params::new();
    let view = perspective::home_only_view(req.league, &mut params);

    let mut clause = WhereClause::new();
    FilterBuilder::new().apply(&req.filters, req.league, ctx.today, &mut params, &mut clause)?;
    clause.push("referee != ''");
    if let Some(name) = &req.referee {
        let name = validate_name("referee", name)?;
        clause.push(format!("referee = {}", params.bind(name)));
    }

    let sql = format!(
        "SELECT {} FROM ({}) {} ORDER BY game_date DESC, game_id LIMIT {}",
        perspective::column_list(None),
        view,
        clause.to_sql(),
        // One row past the cap tells a full result from a cut one.
        params.bind(ctx.max_rows.saturating_add(1)),
    );
    Ok(ParameterizedQuery::new(sql, params))
}

/// Per-referee summaries, busiest referee first.
pub fn summarize_referees(rows: &[TeamGameRow], min_games: u32) -> Vec<RefereeSummary> {
    let mut buckets: BTreeMap<&str, Vec<TeamGameRow>> = BTreeMap::new();
    for row in rows {
        buckets.entry(row.referee.as_str()).or_default().push(row.clone());
    }

    let mut referees: Vec<RefereeSummary> = buckets
        .into_iter()
        .filter(|(_, rows)| rows.len() as u32 >= min_games)
        .map(|(name, rows)| {
            let s = summarize_games(&rows);
            RefereeSummary {
                referee: name.to_string(),
                games: s.games,
                home_ats: s.ats,
                home_moneyline: s.moneyline,
                over: s.over,
                under: s.under,
                avg_total_points: s.avg_total_points,
            }
        })
        .collect();

    referees.sort_by(|a, b| b.games.cmp(&a.games));
    referees
}

pub async fn execute(
    req: &RefereeQueryRequest,
    query: &ParameterizedQuery,
    ctx: &QueryContext<'_>,
) -> Result<RefereeQueryResponse, QueryError> {
    let mut result = fetch::<TeamGameRow>(ctx.executor, query).await?;
    let truncated = cap_rows(&mut result.data, ctx.max_rows);
    let referees = summarize_referees(&result.data, req.min_games.unwrap_or(1));

    if let Some(name) = &req.referee {
        if referees.is_empty() {
            return Err(QueryError::NotFound(format!("no games found for referee {}", name.trim())));
        }
    }

    Ok(RefereeQueryResponse {
        league: req.league,
        truncated,
        referees,
    })
}

pub async fn run(
    req: &RefereeQueryRequest,
    ctx: &QueryContext<'_>,
) -> Result<RefereeQueryResponse, QueryError> {
    let query = build_query(req, ctx)?;
    execute(req, &query, ctx).await
}
