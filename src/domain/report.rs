//! Assembles the final report from a finished run.

use serde::{Deserialize, Serialize};

use super::backtest::{BacktestResult, SimulationConfig};
use super::metrics::{self, PerformanceReport};
use super::monte_carlo::MonteCarloSummary;
use super::portfolio::EquityPoint;
use super::position::Trade;

/// How many ledger or curve rows to carry into the report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportSelection {
    #[default]
    All,
    None,
    /// The most recent `n` rows.
    Last(usize),
}

impl ReportSelection {
    pub fn apply<T: Clone>(self, rows: &[T]) -> Vec<T> {
        match self {
            ReportSelection::All => rows.to_vec(),
            ReportSelection::None => Vec::new(),
            ReportSelection::Last(n) => rows[rows.len().saturating_sub(n)..].to_vec(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestReport {
    pub run_id: u64,
    pub config: SimulationConfig,
    pub performance: PerformanceReport,
    pub monte_carlo: Option<MonteCarloSummary>,
    pub trades: Vec<Trade>,
    pub equity_curve: Vec<EquityPoint>,
}

impl BacktestReport {
    pub fn trade_pnls(&self) -> Vec<f64> {
        self.trades.iter().map(|t| t.pnl).collect()
    }
}

/// Summarize `result` and bundle it with the optional Monte Carlo output.
pub fn assemble(
    result: &BacktestResult,
    config: &SimulationConfig,
    monte_carlo: Option<MonteCarloSummary>,
    trades: ReportSelection,
    equity: ReportSelection,
) -> BacktestReport {
    let performance = metrics::summarize(&result.ledger, &result.equity_curve, config);
    BacktestReport {
        run_id: result.run_id,
        config: config.clone(),
        performance,
        monte_carlo,
        trades: trades.apply(result.ledger.as_slice()),
        equity_curve: equity.apply(result.equity_curve.as_slice()),
    }
}
