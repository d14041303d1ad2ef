//! Monthly and yearly rollups of closed trades.

use std::collections::BTreeMap;

use chrono::Datelike;
use serde::{Deserialize, Serialize};

use super::position::Trade;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyBreakdown {
    pub year: i32,
    pub month: u32,
    pub trades: usize,
    pub wins: usize,
    pub losses: usize,
    pub pnl: f64,
    pub win_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YearlyBreakdown {
    pub year: i32,
    pub trades: usize,
    pub wins: usize,
    pub losses: usize,
    pub pnl: f64,
    pub win_rate: f64,
    pub best_month_pnl: f64,
    pub worst_month_pnl: f64,
}

#[derive(Default)]
struct Bucket {
    trades: usize,
    wins: usize,
    losses: usize,
    pnl: f64,
}

impl Bucket {
    fn add(&mut self, trade: &Trade) {
        self.trades += 1;
        self.pnl += trade.pnl;
        if trade.is_win() {
            self.wins += 1;
        } else if trade.is_loss() {
            self.losses += 1;
        }
    }

    fn win_rate(&self) -> f64 {
        if self.trades > 0 {
            self.wins as f64 / self.trades as f64
        } else {
            0.0
        }
    }
}

/// Group trades by the calendar month they closed in, oldest first.
pub fn monthly_breakdown(trades: &[Trade]) -> Vec<MonthlyBreakdown> {
    let mut buckets: BTreeMap<(i32, u32), Bucket> = BTreeMap::new();
    for trade in trades {
        let key = (trade.closed_at.year(), trade.closed_at.month());
        buckets.entry(key).or_default().add(trade);
    }

    buckets
        .into_iter()
        .map(|((year, month), b)| MonthlyBreakdown {
            year,
            month,
            trades: b.trades,
            wins: b.wins,
            losses: b.losses,
            pnl: b.pnl,
            win_rate: b.win_rate(),
        })
        .collect()
}

/// Roll monthly rows up into calendar years.
pub fn yearly_breakdown(months: &[MonthlyBreakdown]) -> Vec<YearlyBreakdown> {
    let mut years: BTreeMap<i32, YearlyBreakdown> = BTreeMap::new();
    for m in months {
        let year = years.entry(m.year).or_insert_with(|| YearlyBreakdown {
            year: m.year,
            trades: 0,
            wins: 0,
            losses: 0,
            pnl: 0.0,
            win_rate: 0.0,
            best_month_pnl: m.pnl,
            worst_month_pnl: m.pnl,
        });
        year.trades += m.trades;
        year.wins += m.wins;
        year.losses += m.losses;
        year.pnl += m.pnl;
        year.best_month_pnl = year.best_month_pnl.max(m.pnl);
        year.worst_month_pnl = year.worst_month_pnl.min(m.pnl);
    }

    years
        .into_values()
        .map(|mut y| {
            if y.trades > 0 {
                y.win_rate = y.wins as f64 / y.trades as f64;
            }
            y
        })
        .collect()
}
