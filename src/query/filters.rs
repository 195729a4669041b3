//! Declarative trend filters and their translation into WHERE conditions.
//!
//! Column names refer to the team-perspective view (see `perspective`), so the
//! same filter object works for team, league-wide, prop and referee queries.

use chrono::{NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use crate::data::models::League;

use super::sql::{Params, SqlParam, WhereClause};
use super::QueryError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimePeriod {
    ThisSeason,
    LastSeason,
    #[serde(rename = "last_3_seasons")]
    Last3Seasons,
    #[serde(rename = "last_5_seasons")]
    Last5Seasons,
    AllTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Location {
    Home,
    Away,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Favorite,
    Underdog,
}

/// Inclusive rank window; 1 is the best unit in the league.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RankRange {
    #[serde(default)]
    pub min: Option<u16>,
    #[serde(default)]
    pub max: Option<u16>,
}

impl RankRange {
    pub fn top(n: u16) -> Self {
        Self {
            min: None,
            max: Some(n),
        }
    }

    pub fn between(min: u16, max: u16) -> Self {
        Self {
            min: Some(min),
            max: Some(max),
        }
    }

    fn validate(&self, field: &str) -> Result<(), QueryError> {
        if self.min == Some(0) || self.max == Some(0) {
            return Err(QueryError::Validation(format!("{field} ranks start at 1")));
        }
        check_order(field, self.min, self.max)
    }
}

/// Every knob a trend query can turn. All fields are optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TrendFilters {
    pub time_period: Option<TimePeriod>,
    pub season: Option<u16>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub week_min: Option<u16>,
    pub week_max: Option<u16>,

    pub location: Option<Location>,
    pub side: Option<Side>,
    pub spread_min: Option<f64>,
    pub spread_max: Option<f64>,
    pub total_min: Option<f64>,
    pub total_max: Option<f64>,
    pub moneyline_min: Option<i32>,
    pub moneyline_max: Option<i32>,

    pub team_offense_rank: Option<RankRange>,
    pub team_defense_rank: Option<RankRange>,
    pub opponent_offense_rank: Option<RankRange>,
    pub opponent_defense_rank: Option<RankRange>,

    pub opponent: Option<String>,
    pub division_game: Option<bool>,
    pub conference_game: Option<bool>,
    pub playoffs: Option<bool>,
    pub rest_days_min: Option<u16>,
    pub rest_days_max: Option<u16>,
    pub day_of_week: Option<Weekday>,
}

impl TrendFilters {
    /// Reject contradictory or malformed filters before any SQL is built.
    pub fn validate(&self) -> Result<(), QueryError> {
        if self.season.is_some() && self.time_period.is_some() {
            return Err(QueryError::Validation(
                "season and time_period cannot both be set".to_string(),
            ));
        }
        check_order("date", self.start_date, self.end_date)?;
        check_order("week", self.week_min, self.week_max)?;
        check_order("spread", self.spread_min, self.spread_max)?;
        check_order("total", self.total_min, self.total_max)?;
        check_order("moneyline", self.moneyline_min, self.moneyline_max)?;
        check_order("rest_days", self.rest_days_min, self.rest_days_max)?;

        for (field, range) in [
            ("team_offense_rank", &self.team_offense_rank),
            ("team_defense_rank", &self.team_defense_rank),
            ("opponent_offense_rank", &self.opponent_offense_rank),
            ("opponent_defense_rank", &self.opponent_defense_rank),
        ] {
            if let Some(r) = range {
                r.validate(field)?;
            }
        }

        if let Some(opp) = &self.opponent {
            validate_team_code("opponent", opp)?;
        }
        Ok(())
    }
}

fn check_order<T: PartialOrd>(
    field: &str,
    min: Option<T>,
    max: Option<T>,
) -> Result<(), QueryError> {
    match (min, max) {
        (Some(lo), Some(hi)) if lo > hi => Err(QueryError::Validation(format!(
            "{field}: minimum is greater than maximum"
        ))),
        _ => Ok(()),
    }
}

/// Team abbreviations are 2–5 ASCII letters; returned upper-cased.
pub fn validate_team_code(field: &str, code: &str) -> Result<String, QueryError> {
    let code = code.trim();
    if (2..=5).contains(&code.len()) && code.chars().all(|c| c.is_ascii_alphabetic()) {
        Ok(code.to_ascii_uppercase())
    } else {
        Err(QueryError::Validation(format!(
            "{field} must be a 2-5 letter team abbreviation, got {code:?}"
        )))
    }
}

/// Translates [`TrendFilters`] into conditions over the perspective view.
#[derive(Debug, Clone, Copy, Default)]
pub struct FilterBuilder<'a> {
    alias: Option<&'a str>,
}

impl<'a> FilterBuilder<'a> {
    pub fn new() -> Self {
        Self { alias: None }
    }

    /// Prefix every column with `alias.`; used when the view is joined.
    pub fn with_alias(alias: &'a str) -> Self {
        Self { alias: Some(alias) }
    }

    pub fn col(&self, name: &str) -> String {
        match self.alias {
            Some(a) => format!("{a}.{name}"),
            None => name.to_string(),
        }
    }

    /// Validate `filters` and push one condition per set field.
    ///
    /// `today` anchors relative time periods.
    pub fn apply(
        &self,
        filters: &TrendFilters,
        league: League,
        today: NaiveDate,
        params: &mut Params,
        clause: &mut WhereClause,
    ) -> Result<(), QueryError> {
        filters.validate()?;

        // Unplayed games never count.
        clause.push(format!("isNotNull({})", self.col("team_score")));

        let current = league.season_for(today);
        match filters.time_period {
            Some(TimePeriod::ThisSeason) => {
                clause.push(format!("{} = {}", self.col("season"), params.bind(current)));
            }
            Some(TimePeriod::LastSeason) => {
                clause.push(format!("{} = {}", self.col("season"), params.bind(current - 1)));
            }
            Some(TimePeriod::Last3Seasons) => {
                clause.push(format!("{} >= {}", self.col("season"), params.bind(current - 2)));
            }
            Some(TimePeriod::Last5Seasons) => {
                clause.push(format!("{} >= {}", self.col("season"), params.bind(current - 4)));
            }
            Some(TimePeriod::AllTime) | None => {}
        }
        if let Some(season) = filters.season {
            clause.push(format!("{} = {}", self.col("season"), params.bind(season)));
        }

        self.range(clause, params, "game_date", filters.start_date, filters.end_date);
        self.range(clause, params, "week", filters.week_min, filters.week_max);

        match filters.location {
            Some(Location::Home) => clause.push(format!("{} = true", self.col("is_home"))),
            Some(Location::Away) => clause.push(format!("{} = false", self.col("is_home"))),
            None => {}
        }

        // Pick'em games (spread 0) are neither favorite nor underdog.
        match filters.side {
            Some(Side::Favorite) => clause.push(format!("{} < 0", self.col("team_spread"))),
            Some(Side::Underdog) => clause.push(format!("{} > 0", self.col("team_spread"))),
            None => {}
        }

        self.float_range(
            clause,
            params,
            "team_spread",
            "spread",
            filters.spread_min,
            filters.spread_max,
        )?;
        self.float_range(
            clause,
            params,
            "total_line",
            "total",
            filters.total_min,
            filters.total_max,
        )?;
        self.range(
            clause,
            params,
            "team_moneyline",
            filters.moneyline_min.map(i64::from),
            filters.moneyline_max.map(i64::from),
        );

        for (column, range) in [
            ("team_offense_rank", filters.team_offense_rank),
            ("team_defense_rank", filters.team_defense_rank),
            ("opponent_offense_rank", filters.opponent_offense_rank),
            ("opponent_defense_rank", filters.opponent_defense_rank),
        ] {
            if let Some(r) = range {
                self.range(clause, params, column, r.min, r.max);
            }
        }

        if let Some(opp) = &filters.opponent {
            let code = validate_team_code("opponent", opp)?;
            clause.push(format!("{} = {}", self.col("opponent"), params.bind(code)));
        }

        for (column, flag) in [
            ("division_game", filters.division_game),
            ("conference_game", filters.conference_game),
            ("playoffs", filters.playoffs),
        ] {
            if let Some(v) = flag {
                clause.push(format!("{} = {}", self.col(column), v));
            }
        }

        self.range(clause, params, "team_rest_days", filters.rest_days_min, filters.rest_days_max);

        if let Some(day) = filters.day_of_week {
            clause.push(format!(
                "toDayOfWeek({}) = {}",
                self.col("game_date"),
                params.bind(day.number_from_monday())
            ));
        }

        Ok(())
    }

    fn range<T: Into<SqlParam>>(
        &self,
        clause: &mut WhereClause,
        params: &mut Params,
        column: &str,
        min: Option<T>,
        max: Option<T>,
    ) {
        if let Some(lo) = min {
            clause.push(format!("{} >= {}", self.col(column), params.bind(lo)));
        }
        if let Some(hi) = max {
            clause.push(format!("{} <= {}", self.col(column), params.bind(hi)));
        }
    }

    fn float_range(
        &self,
        clause: &mut WhereClause,
        params: &mut Params,
        column: &str,
        field: &str,
        min: Option<f64>,
        max: Option<f64>,
    ) -> Result<(), QueryError> {
        if let Some(lo) = min {
            let p = params.bind_float(&format!("{field}_min"), lo)?;
            clause.push(format!("{} >= {}", self.col(column), p));
        }
        if let Some(hi) = max {
            let p = params.bind_float(&format!("{field}_max"), hi)?;
            clause.push(format!("{} <= {}", self.col(column), p));
        }
        Ok(())
    }
}

/// Today's date (UTC) for anchoring relative periods.
pub fn current_date() -> NaiveDate {
    chrono::Utc::now().date_naive()
}
