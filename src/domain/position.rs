//! Open positions and closed trade records.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::ohlcv::Bar;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    /// +1 for long, -1 for short.
    pub fn sign(self) -> f64 {
        match self {
            Direction::Long => 1.0,
            Direction::Short => -1.0,
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            Direction::Long => Direction::Short,
            Direction::Short => Direction::Long,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    StopLoss,
    TakeProfit,
    Signal,
    ForcedClose,
}

impl std::fmt::Display for ExitReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ExitReason::StopLoss => "stop_loss",
            ExitReason::TakeProfit => "take_profit",
            ExitReason::Signal => "signal",
            ExitReason::ForcedClose => "forced_close",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Position {
    pub id: u64,
    pub direction: Direction,
    pub entry_price: f64,
    /// Always positive; the side lives in `direction`.
    pub quantity: f64,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
    pub opened_at: NaiveDateTime,
    pub entry_commission: f64,
}

impl Position {
    /// Capital escrowed at entry.
    pub fn entry_notional(&self) -> f64 {
        self.quantity * self.entry_price
    }

    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        self.direction.sign() * self.quantity * (price - self.entry_price)
    }

    /// Whether the bar's range reaches the stop-loss level.
    pub fn should_stop_loss(&self, bar: &Bar) -> bool {
        match (self.stop_loss, self.direction) {
            (None, _) => false,
            (Some(level), Direction::Long) => bar.low <= level,
            (Some(level), Direction::Short) => bar.high >= level,
        }
    }

    /// Whether the bar's range reaches the take-profit level.
    pub fn should_take_profit(&self, bar: &Bar) -> bool {
        match (self.take_profit, self.direction) {
            (None, _) => false,
            (Some(level), Direction::Long) => bar.high >= level,
            (Some(level), Direction::Short) => bar.low <= level,
        }
    }

    /// Level and reason of the exit this bar triggers, if any.
    ///
    /// Stop-loss wins when both levels sit inside the bar's range: OHLC data
    /// does not say which was touched first.
    pub fn triggered_exit(&self, bar: &Bar) -> Option<(f64, ExitReason)> {
        if self.should_stop_loss(bar) {
            return self.stop_loss.map(|level| (level, ExitReason::StopLoss));
        }
        if self.should_take_profit(bar) {
            return self.take_profit.map(|level| (level, ExitReason::TakeProfit));
        }
        None
    }
}

/// Immutable ledger record of a closed position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub id: u64,
    pub direction: Direction,
    pub entry_price: f64,
    pub exit_price: f64,
    pub quantity: f64,
    /// Entry plus exit commission.
    pub commission: f64,
    pub pnl: f64,
    pub exit_reason: ExitReason,
    pub opened_at: NaiveDateTime,
    pub closed_at: NaiveDateTime,
}

impl Trade {
    /// PnL implied by the record's own fields.
    pub fn expected_pnl(&self) -> f64 {
        self.direction.sign() * (self.exit_price - self.entry_price) * self.quantity
            - self.commission
    }

    pub fn is_win(&self) -> bool {
        self.pnl > 0.0
    }

    pub fn is_loss(&self) -> bool {
        self.pnl < 0.0
    }

    pub fn duration_hours(&self) -> f64 {
        (self.closed_at - self.opened_at).num_seconds() as f64 / 3600.0
    }
}
