//! Win/loss records, units and ROI over query rows.
//!
//! Spread and total bets are priced at the standard -110 unless the row
//! carries its own price. Profit is measured in units risked:
//!     +150 pays 1.50 units per unit risked
//!     -150 pays 0.6667 units per unit risked
//! A loss costs 1 unit; a push returns the stake.

use rust_decimal::Decimal;
use serde::Serialize;

use crate::data::models::{PropRow, TeamGameRow};

/// Standard price on spreads and totals.
pub const STANDARD_PRICE: i32 = -110;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Win,
    Loss,
    Push,
}

/// Profit per unit risked at American `odds`. `None` for odds inside (-100, 100).
pub fn american_profit(odds: i32) -> Option<Decimal> {
    if odds >= 100 {
        Some(Decimal::from(odds) / Decimal::ONE_HUNDRED)
    } else if odds <= -100 {
        Some(Decimal::ONE_HUNDRED / Decimal::from(odds.unsigned_abs()))
    } else {
        None
    }
}

fn grade(value: f64) -> Outcome {
    if value > 0.0 {
        Outcome::Win
    } else if value < 0.0 {
        Outcome::Loss
    } else {
        Outcome::Push
    }
}

/// Against the spread. `None` when the game has no line.
pub fn grade_ats(row: &TeamGameRow) -> Option<Outcome> {
    row.team_spread.map(|spread| grade(row.margin() as f64 + spread))
}

/// Over side of the total. `None` when the game has no total.
pub fn grade_over(row: &TeamGameRow) -> Option<Outcome> {
    row.total_line.map(|line| grade(row.total_points() as f64 - line))
}

pub fn grade_moneyline(row: &TeamGameRow) -> Outcome {
    grade(row.margin() as f64)
}

fn flip(outcome: Outcome) -> Outcome {
    match outcome {
        Outcome::Win => Outcome::Loss,
        Outcome::Loss => Outcome::Win,
        Outcome::Push => Outcome::Push,
    }
}

/// A betting record.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Record {
    pub wins: u32,
    pub losses: u32,
    pub pushes: u32,
    /// wins / (wins + losses); pushes excluded.
    pub win_pct: Decimal,
    pub units: Decimal,
    /// units / (wins + losses) × 100.
    pub roi: Decimal,
}

impl Record {
    pub fn decisions(&self) -> u32 {
        self.wins + self.losses
    }

    pub fn total(&self) -> u32 {
        self.wins + self.losses + self.pushes
    }
}

/// Accumulates outcomes into a [`Record`].
#[derive(Debug, Clone, Default)]
pub struct RecordBuilder {
    wins: u32,
    losses: u32,
    pushes: u32,
    units: Decimal,
}

impl RecordBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one bet at `odds`; invalid odds fall back to the standard price.
    pub fn add(&mut self, outcome: Outcome, odds: Option<i32>) {
        match outcome {
            Outcome::Win => {
                let profit = odds
                    .and_then(american_profit)
                    .or_else(|| american_profit(STANDARD_PRICE))
                    .unwrap_or(Decimal::ONE);
                self.wins += 1;
                self.units += profit;
            }
            Outcome::Loss => {
                self.losses += 1;
                self.units -= Decimal::ONE;
            }
            Outcome::Push => self.pushes += 1,
        }
    }

    pub fn finish(&self) -> Record {
        let decisions = Decimal::from(self.wins + self.losses);
        let (win_pct, roi) = if decisions.is_zero() {
            (Decimal::ZERO, Decimal::ZERO)
        } else {
            (
                (Decimal::from(self.wins) / decisions).round_dp(4),
                (self.units / decisions * Decimal::ONE_HUNDRED).round_dp(4),
            )
        };
        Record {
            wins: self.wins,
            losses: self.losses,
            pushes: self.pushes,
            win_pct,
            units: self.units.round_dp(4),
            roi,
        }
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

fn mean(sum: f64, n: usize) -> f64 {
    if n == 0 {
        0.0
    } else {
        round2(sum / n as f64)
    }
}

/// Records for every market over a set of team-perspective rows.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GameSummary {
    pub games: u32,
    pub ats: Record,
    pub over: Record,
    pub under: Record,
    pub moneyline: Record,
    pub avg_margin: f64,
    pub avg_total_points: f64,
}

pub fn summarize_games(rows: &[TeamGameRow]) -> GameSummary {
    let mut ats = RecordBuilder::new();
    let mut over = RecordBuilder::new();
    let mut under = RecordBuilder::new();
    let mut moneyline = RecordBuilder::new();
    let mut margin_sum = 0.0;
    let mut total_sum = 0.0;

    for row in rows {
        if let Some(outcome) = grade_ats(row) {
            ats.add(outcome, None);
        }
        if let Some(outcome) = grade_over(row) {
            over.add(outcome, None);
            under.add(flip(outcome), None);
        }
        moneyline.add(grade_moneyline(row), row.team_moneyline);
        margin_sum += row.margin() as f64;
        total_sum += row.total_points() as f64;
    }

    GameSummary {
        games: rows.len() as u32,
        ats: ats.finish(),
        over: over.finish(),
        under: under.finish(),
        moneyline: moneyline.finish(),
        avg_margin: mean(margin_sum, rows.len()),
        avg_total_points: mean(total_sum, rows.len()),
    }
}

/// Over/under records for graded prop lines.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PropSummary {
    pub games: u32,
    pub over: Record,
    pub under: Record,
    pub avg_actual: f64,
    pub avg_line: f64,
    /// Mean of actual − line.
    pub avg_margin: f64,
}

/// Grade prop rows; `line_override` replaces each row's historical line.
pub fn summarize_props(rows: &[PropRow], line_override: Option<f64>) -> PropSummary {
    let mut over = RecordBuilder::new();
    let mut under = RecordBuilder::new();
    let mut actual_sum = 0.0;
    let mut line_sum = 0.0;

    for row in rows {
        let line = line_override.unwrap_or(row.line);
        let outcome = grade(row.actual_value - line);
        over.add(outcome, row.over_odds);
        under.add(flip(outcome), row.under_odds);
        actual_sum += row.actual_value;
        line_sum += line;
    }

    PropSummary {
        games: rows.len() as u32,
        over: over.finish(),
        under: under.finish(),
        avg_actual: mean(actual_sum, rows.len()),
        avg_line: mean(line_sum, rows.len()),
        avg_margin: mean(actual_sum - line_sum, rows.len()),
    }
}
