//! Portfolio state: cash, the position book, the trade ledger and the equity curve.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::position::{Direction, Position, Trade};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub timestamp: NaiveDateTime,
    pub equity: f64,
}

/// Open positions of a single run, in opening order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PositionBook {
    positions: Vec<Position>,
}

impl PositionBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&mut self, position: Position) {
        debug_assert!(position.quantity > 0.0);
        self.positions.push(position);
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Position> {
        self.positions.iter()
    }

    pub fn get(&self, id: u64) -> Option<&Position> {
        self.positions.iter().find(|p| p.id == id)
    }

    pub fn remove(&mut self, id: u64) -> Option<Position> {
        let idx = self.positions.iter().position(|p| p.id == id)?;
        Some(self.positions.remove(idx))
    }

    pub fn ids(&self) -> Vec<u64> {
        self.positions.iter().map(|p| p.id).collect()
    }

    pub fn ids_in_direction(&self, direction: Direction) -> Vec<u64> {
        self.positions
            .iter()
            .filter(|p| p.direction == direction)
            .map(|p| p.id)
            .collect()
    }

    /// Sum of entry notionals held in escrow by open positions.
    pub fn escrowed(&self) -> f64 {
        self.positions.iter().map(Position::entry_notional).sum()
    }

    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        self.positions.iter().map(|p| p.unrealized_pnl(price)).sum()
    }
}

/// Append-only record of closed trades, ordered by close time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TradeLedger {
    trades: Vec<Trade>,
}

impl TradeLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, trade: Trade) {
        debug_assert!(
            self.trades
                .last()
                .is_none_or(|last| last.closed_at <= trade.closed_at)
        );
        self.trades.push(trade);
    }

    pub fn len(&self) -> usize {
        self.trades.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trades.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Trade> {
        self.trades.iter()
    }

    pub fn as_slice(&self) -> &[Trade] {
        &self.trades
    }

    pub fn pnls(&self) -> Vec<f64> {
        self.trades.iter().map(|t| t.pnl).collect()
    }
}

impl From<Vec<Trade>> for TradeLedger {
    fn from(trades: Vec<Trade>) -> Self {
        Self { trades }
    }
}

impl<'a> IntoIterator for &'a TradeLedger {
    type Item = &'a Trade;
    type IntoIter = std::slice::Iter<'a, Trade>;

    fn into_iter(self) -> Self::IntoIter {
        self.trades.iter()
    }
}

/// One equity sample per bar, preceded by a seed point.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EquityCurve {
    points: Vec<EquityPoint>,
}

impl EquityCurve {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            points: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, timestamp: NaiveDateTime, equity: f64) {
        self.points.push(EquityPoint { timestamp, equity });
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn last(&self) -> Option<&EquityPoint> {
        self.points.last()
    }

    pub fn as_slice(&self) -> &[EquityPoint] {
        &self.points
    }

    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.equity).collect()
    }
}

impl From<Vec<EquityPoint>> for EquityCurve {
    fn from(points: Vec<EquityPoint>) -> Self {
        Self { points }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Portfolio {
    /// Cash not escrowed by open positions.
    pub cash: f64,
    pub initial_capital: f64,
    pub book: PositionBook,
    pub ledger: TradeLedger,
    pub equity_curve: EquityCurve,
}

impl Portfolio {
    pub fn new(initial_capital: f64) -> Self {
        Portfolio {
            cash: initial_capital,
            initial_capital,
            book: PositionBook::new(),
            ledger: TradeLedger::new(),
            equity_curve: EquityCurve::new(),
        }
    }

    pub fn position_count(&self) -> usize {
        self.book.len()
    }

    pub fn record_trade(&mut self, trade: Trade) {
        self.ledger.push(trade);
    }

    pub fn record_equity(&mut self, timestamp: NaiveDateTime, equity: f64) {
        self.equity_curve.push(timestamp, equity);
    }

    /// Free cash plus capital escrowed in open positions.
    pub fn balance(&self) -> f64 {
        self.cash + self.book.escrowed()
    }

    /// Balance plus unrealized PnL marked at `price`.
    pub fn total_equity(&self, price: f64) -> f64 {
        self.balance() + self.book.unrealized_pnl(price)
    }
}
