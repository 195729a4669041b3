//! Core data models: leagues, prop markets, and the row shapes the
//! dispatchers read back from ClickHouse.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// Enums
// =============================================================================

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum League {
    #[default]
    Nfl,
    Ncaaf,
    Nba,
    Ncaab,
    Nhl,
    Mlb,
}

impl League {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Nfl => "nfl",
            Self::Ncaaf => "ncaaf",
            Self::Nba => "nba",
            Self::Ncaab => "ncaab",
            Self::Nhl => "nhl",
            Self::Mlb => "mlb",
        }
    }

    /// Table holding one row per game. NFL has its own; the rest share
    /// `games`, keyed by the `sport` column.
    pub fn games_table(&self) -> &'static str {
        match self {
            Self::Nfl => "nfl_games",
            _ => "games",
        }
    }

    /// Whether rows must be narrowed with `sport = <league>`.
    pub fn is_shared_table(&self) -> bool {
        self.games_table() == "games"
    }

    pub fn prop_table(&self) -> Option<&'static str> {
        match self {
            Self::Nfl => Some("nfl_prop_lines"),
            _ => None,
        }
    }

    /// Month the regular season opens in.
    pub fn season_start_month(&self) -> u32 {
        match self {
            Self::Nfl | Self::Ncaaf => 8,
            Self::Nba | Self::Ncaab | Self::Nhl => 10,
            Self::Mlb => 3,
        }
    }

    /// Season a date belongs to, labelled by the year the season opened.
    pub fn season_for(&self, date: NaiveDate) -> u16 {
        let year = date.year() as u16;
        if date.month() >= self.season_start_month() {
            year
        } else {
            year - 1
        }
    }
}

impl fmt::Display for League {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Player prop markets, keyed the way sportsbook feeds key them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropType {
    PassingYards,
    PassingTds,
    PassCompletions,
    PassAttempts,
    Interceptions,
    RushingYards,
    RushAttempts,
    ReceivingYards,
    Receptions,
}

impl PropType {
    pub fn market_key(&self) -> &'static str {
        match self {
            Self::PassingYards => "player_pass_yds",
            Self::PassingTds => "player_pass_tds",
            Self::PassCompletions => "player_pass_completions",
            Self::PassAttempts => "player_pass_attempts",
            Self::Interceptions => "player_pass_interceptions",
            Self::RushingYards => "player_rush_yds",
            Self::RushAttempts => "player_rush_attempts",
            Self::ReceivingYards => "player_reception_yds",
            Self::Receptions => "player_receptions",
        }
    }
}

// =============================================================================
// Rows
// =============================================================================

/// One game from one team's point of view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamGameRow {
    pub game_id: String,
    pub game_date: NaiveDate,
    pub season: u16,
    #[serde(default)]
    pub week: Option<u16>,
    pub team: String,
    pub opponent: String,
    pub is_home: bool,
    pub team_score: i32,
    pub opponent_score: i32,
    #[serde(default)]
    pub team_spread: Option<f64>,
    #[serde(default)]
    pub total_line: Option<f64>,
    #[serde(default)]
    pub team_moneyline: Option<i32>,
    #[serde(default)]
    pub team_offense_rank: Option<u16>,
    #[serde(default)]
    pub team_defense_rank: Option<u16>,
    #[serde(default)]
    pub opponent_offense_rank: Option<u16>,
    #[serde(default)]
    pub opponent_defense_rank: Option<u16>,
    #[serde(default)]
    pub team_rest_days: Option<u16>,
    #[serde(default)]
    pub division_game: bool,
    #[serde(default)]
    pub conference_game: bool,
    #[serde(default)]
    pub playoffs: bool,
    #[serde(default)]
    pub referee: String,
}

impl TeamGameRow {
    pub fn margin(&self) -> i32 {
        self.team_score - self.opponent_score
    }

    pub fn total_points(&self) -> i32 {
        self.team_score + self.opponent_score
    }
}

/// A graded player prop line joined with its game context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropRow {
    pub game_id: String,
    pub game_date: NaiveDate,
    pub season: u16,
    #[serde(default)]
    pub week: Option<u16>,
    pub player_id: String,
    pub player_name: String,
    pub team: String,
    pub opponent: String,
    pub is_home: bool,
    pub prop_type: String,
    pub bookmaker: String,
    pub line: f64,
    #[serde(default)]
    pub over_odds: Option<i32>,
    #[serde(default)]
    pub under_odds: Option<i32>,
    pub actual_value: f64,
    #[serde(default)]
    pub team_spread: Option<f64>,
}

// =============================================================================
// ClickHouse JSON envelope
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryStatistics {
    #[serde(default)]
    pub elapsed: f64,
    #[serde(default)]
    pub rows_read: u64,
    #[serde(default)]
    pub bytes_read: u64,
}

/// Body of a `FORMAT JSON` response.
#[derive(Debug, Clone, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct QueryResult<T> {
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
    #[serde(default)]
    pub rows: u64,
    #[serde(default)]
    pub statistics: Option<QueryStatistics>,
}

impl<T> QueryResult<T> {
    pub fn from_rows(data: Vec<T>) -> Self {
        let rows = data.len() as u64;
        Self {
            data,
            rows,
            statistics: None,
        }
    }
}
