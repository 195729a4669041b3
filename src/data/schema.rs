//! Table definitions the query engine reads from.
//!
//! Games are keyed by `(season, game_id)` and deduplicated on merge, so
//! backfills can re-insert a whole season. Every read goes through `FINAL`.

use tracing::info;

use crate::api::errors::ClickHouseError;
use crate::api::executor::QueryExecutor;

const GAME_COLUMNS: &str = "\
    game_id String, \
    game_date Date, \
    season UInt16, \
    week Nullable(UInt16), \
    home_team LowCardinality(String), \
    away_team LowCardinality(String), \
    home_score Nullable(Int32), \
    away_score Nullable(Int32), \
    home_spread Nullable(Float64), \
    total_line Nullable(Float64), \
    home_moneyline Nullable(Int32), \
    away_moneyline Nullable(Int32), \
    home_offense_rank Nullable(UInt16), \
    home_defense_rank Nullable(UInt16), \
    away_offense_rank Nullable(UInt16), \
    away_defense_rank Nullable(UInt16), \
    home_rest_days Nullable(UInt16), \
    away_rest_days Nullable(UInt16), \
    division_game Bool DEFAULT false, \
    conference_game Bool DEFAULT false, \
    playoffs Bool DEFAULT false, \
    referee String DEFAULT '', \
    updated_at DateTime DEFAULT now()";

pub fn nfl_games_ddl() -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS nfl_games ({GAME_COLUMNS}) \
         ENGINE = ReplacingMergeTree(updated_at) ORDER BY (season, game_id)"
    )
}

/// Shared by every league except NFL; `sport` is the league code.
pub fn games_ddl() -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS games (sport LowCardinality(String), {GAME_COLUMNS}) \
         ENGINE = ReplacingMergeTree(updated_at) ORDER BY (sport, season, game_id)"
    )
}

pub const NFL_PROP_LINES_DDL: &str = "CREATE TABLE IF NOT EXISTS nfl_prop_lines (\
    game_id String, \
    player_id String, \
    player_name String, \
    team LowCardinality(String), \
    prop_type LowCardinality(String), \
    bookmaker LowCardinality(String), \
    line Float64, \
    over_odds Nullable(Int32), \
    under_odds Nullable(Int32), \
    actual_value Nullable(Float64), \
    updated_at DateTime DEFAULT now()\
    ) ENGINE = ReplacingMergeTree(updated_at) \
    ORDER BY (game_id, player_id, prop_type, bookmaker)";

pub const LIVE_ODDS_SNAPSHOTS_DDL: &str = "CREATE TABLE IF NOT EXISTS live_odds_snapshots (\
    game_id String, \
    captured_at DateTime64(3), \
    bookmaker LowCardinality(String), \
    home_spread Nullable(Float64), \
    total_line Nullable(Float64), \
    home_moneyline Nullable(Int32), \
    away_moneyline Nullable(Int32)\
    ) ENGINE = MergeTree ORDER BY (game_id, captured_at)";

/// Every statement, in creation order.
pub fn statements() -> Vec<(&'static str, String)> {
    vec![
        ("nfl_games", nfl_games_ddl()),
        ("games", games_ddl()),
        ("nfl_prop_lines", NFL_PROP_LINES_DDL.to_string()),
        ("live_odds_snapshots", LIVE_ODDS_SNAPSHOTS_DDL.to_string()),
    ]
}

/// Create any missing tables. Safe to run on every start.
pub async fn ensure_schema(executor: &dyn QueryExecutor) -> Result<(), ClickHouseError> {
    for (table, ddl) in statements() {
        executor.command(&ddl).await?;
        info!(table, "Table ready");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::perspective;

    #[test]
    fn test_game_tables_cover_perspective_sources() {
        // Every home_/away_ column the view reads must exist.
        for col in [
            "home_team", "away_team", "home_score", "away_score", "home_spread",
            "home_moneyline", "away_moneyline", "home_rest_days", "away_rest_days",
            "home_offense_rank", "away_defense_rank", "referee", "playoffs",
        ] {
            assert!(GAME_COLUMNS.contains(&format!("{col} ")), "missing {col}");
        }
        assert!(perspective::COLUMNS.contains(&"total_line"));
    }

    #[test]
    fn test_engines_and_keys() {
        assert!(nfl_games_ddl().ends_with("ORDER BY (season, game_id)"));
        assert!(games_ddl().contains("(sport LowCardinality(String), game_id String"));
        assert!(NFL_PROP_LINES_DDL.contains("ReplacingMergeTree(updated_at)"));
        assert!(LIVE_ODDS_SNAPSHOTS_DDL
            .ends_with("ENGINE = MergeTree ORDER BY (game_id, captured_at)"));
    }

    #[test]
    fn test_statement_order() {
        let names: Vec<_> = statements().into_iter().map(|(t, _)| t).collect();
        assert_eq!(names, ["nfl_games", "games", "nfl_prop_lines", "live_odds_snapshots"]);
    }
}
