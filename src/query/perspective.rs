//! Team-perspective projection of a per-game table.
//!
//! Games are stored once per matchup with `home_*` / `away_*` columns. Most
//! questions are asked from one team's side ("as a road underdog, ..."), so
//! the view unions a home projection and an away projection into one row per
//! (game, team). Spreads are stored from the home side and negated for the
//! away row.

use crate::data::models::League;

use super::sql::Params;

/// Columns exposed by the view, in select order.
pub const COLUMNS: &[&str] = &[
    "game_id",
    "game_date",
    "season",
    "week",
    "team",
    "opponent",
    "is_home",
    "team_score",
    "opponent_score",
    "team_spread",
    "total_line",
    "team_moneyline",
    "team_offense_rank",
    "team_defense_rank",
    "opponent_offense_rank",
    "opponent_defense_rank",
    "team_rest_days",
    "division_game",
    "conference_game",
    "playoffs",
    "referee",
];

/// Comma-separated column list, optionally alias-qualified.
pub fn column_list(alias: Option<&str>) -> String {
    COLUMNS
        .iter()
        .map(|c| match alias {
            Some(a) => format!("{a}.{c}"),
            None => (*c).to_string(),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn side_projection(league: League, home: bool, sport_filter: Option<&str>) -> String {
    let (us, them) = if home { ("home", "away") } else { ("away", "home") };
    let spread = if home { "home_spread" } else { "-home_spread" };

    let mut sql = format!(
        "SELECT game_id, game_date, season, week, \
         {us}_team AS team, {them}_team AS opponent, {is_home} AS is_home, \
         {us}_score AS team_score, {them}_score AS opponent_score, \
         {spread} AS team_spread, total_line, {us}_moneyline AS team_moneyline, \
         {us}_offense_rank AS team_offense_rank, {us}_defense_rank AS team_defense_rank, \
         {them}_offense_rank AS opponent_offense_rank, {them}_defense_rank AS opponent_defense_rank, \
         {us}_rest_days AS team_rest_days, division_game, conference_game, playoffs, referee \
         FROM {table} FINAL",
        is_home = home,
        table = league.games_table(),
    );
    if let Some(placeholder) = sport_filter {
        sql.push_str(&format!(" WHERE sport = {placeholder}"));
    }
    sql
}

fn sport_placeholder(league: League, params: &mut Params) -> Option<String> {
    league
        .is_shared_table()
        .then(|| params.bind(league.as_str()))
}

/// Both sides of every game: two rows per matchup.
pub fn view(league: League, params: &mut Params) -> String {
    let sport = sport_placeholder(league, params);
    format!(
        "{} UNION ALL {}",
        side_projection(league, true, sport.as_deref()),
        side_projection(league, false, sport.as_deref())
    )
}

/// Home side only: one row per matchup.
pub fn home_only_view(league: League, params: &mut Params) -> String {
    let sport = sport_placeholder(league, params);
    side_projection(league, true, sport.as_deref())
}
