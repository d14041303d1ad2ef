//! Performance metrics and statistics.
//!
//! [`summarize`] is a pure function of the ledger, the equity curve and the
//! configuration. Every ratio it reports is finite: undefined divisions
//! yield 0.

use serde::{Deserialize, Serialize};

use super::backtest::SimulationConfig;
use super::calendar::{self, MonthlyBreakdown, YearlyBreakdown};
use super::portfolio::{EquityCurve, TradeLedger};
use super::position::ExitReason;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitReasonCounts {
    pub stop_loss: usize,
    pub take_profit: usize,
    pub signal: usize,
    pub forced_close: usize,
}

impl ExitReasonCounts {
    fn record(&mut self, reason: ExitReason) {
        match reason {
            ExitReason::StopLoss => self.stop_loss += 1,
            ExitReason::TakeProfit => self.take_profit += 1,
            ExitReason::Signal => self.signal += 1,
            ExitReason::ForcedClose => self.forced_close += 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceReport {
    pub initial_capital: f64,
    pub final_capital: f64,
    pub total_return: f64,
    pub total_return_percent: f64,
    pub annualized_return_percent: f64,

    pub max_drawdown: f64,
    pub max_drawdown_percent: f64,
    /// Longest run of bars spent below a prior peak.
    pub max_drawdown_duration: usize,

    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    pub calmar_ratio: f64,
    pub annualized_volatility_percent: f64,
    pub recovery_factor: f64,

    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub breakeven_trades: usize,
    /// Fraction of trades with positive PnL, in `[0, 1]`.
    pub win_rate: f64,
    pub gross_profit: f64,
    /// Positive magnitude of summed losses.
    pub gross_loss: f64,
    pub total_pnl: f64,
    pub profit_factor: f64,
    pub expectancy: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub largest_win: f64,
    pub largest_loss: f64,
    pub avg_trade_duration_hours: f64,
    pub total_commission: f64,
    pub exit_reasons: ExitReasonCounts,

    pub max_consecutive_wins: usize,
    pub max_consecutive_losses: usize,

    pub monthly: Vec<MonthlyBreakdown>,
    pub yearly: Vec<YearlyBreakdown>,
}

fn safe_div(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        return 0.0;
    }
    finite_or_zero(numerator / denominator)
}

fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() { value } else { 0.0 }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct Drawdown {
    amount: f64,
    percent: f64,
    duration: usize,
}

fn compute_drawdown(equity: &[f64]) -> Drawdown {
    let Some(&first) = equity.first() else {
        return Drawdown::default();
    };

    let mut peak = first;
    let mut worst = Drawdown::default();
    let mut underwater = 0usize;

    for &value in equity {
        if value >= peak {
            peak = value;
            underwater = 0;
            continue;
        }

        underwater += 1;
        worst.duration = worst.duration.max(underwater);

        let amount = peak - value;
        if amount > worst.amount {
            worst.amount = amount;
        }
        if peak > 0.0 {
            let percent = (amount / peak * 100.0).clamp(0.0, 100.0);
            worst.percent = worst.percent.max(percent);
        }
    }

    worst
}

fn bar_returns(equity: &[f64], initial_capital: f64) -> Vec<f64> {
    equity
        .windows(2)
        .map(|w| safe_div(w[1] - w[0], initial_capital))
        .collect()
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn sample_std(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let variance =
        values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}

/// Deviation below this fraction of the mean is rounding noise, not volatility.
const NEGLIGIBLE_DEVIATION: f64 = 1e-9;

fn is_negligible(deviation: f64, mean: f64) -> bool {
    deviation <= mean.abs() * NEGLIGIBLE_DEVIATION
}

fn sharpe(excess: &[f64], periods_per_year: f64) -> f64 {
    if excess.len() < 2 {
        return 0.0;
    }
    let m = mean(excess);
    let sd = sample_std(excess);
    if is_negligible(sd, m) {
        return 0.0;
    }
    safe_div(m, sd) * periods_per_year.sqrt()
}

fn sortino(excess: &[f64], periods_per_year: f64) -> f64 {
    let downside: Vec<f64> = excess.iter().copied().filter(|r| *r <= 0.0).collect();
    if downside.is_empty() {
        return 0.0;
    }
    let m = mean(excess);
    let deviation = (downside.iter().map(|r| r * r).sum::<f64>() / downside.len() as f64).sqrt();
    if is_negligible(deviation, m) {
        return 0.0;
    }
    safe_div(m, deviation) * periods_per_year.sqrt()
}

fn annualized_return_percent(
    total_return_fraction: f64,
    periods: usize,
    periods_per_year: f64,
) -> f64 {
    let growth = 1.0 + total_return_fraction;
    if periods == 0 || growth <= 0.0 {
        return 0.0;
    }
    finite_or_zero((growth.powf(periods_per_year / periods as f64) - 1.0) * 100.0)
}

fn max_streaks(ledger: &TradeLedger) -> (usize, usize) {
    let (mut wins, mut losses) = (0usize, 0usize);
    let (mut max_wins, mut max_losses) = (0usize, 0usize);
    for trade in ledger {
        if trade.is_win() {
            wins += 1;
            losses = 0;
        } else if trade.is_loss() {
            losses += 1;
            wins = 0;
        } else {
            wins = 0;
            losses = 0;
        }
        max_wins = max_wins.max(wins);
        max_losses = max_losses.max(losses);
    }
    (max_wins, max_losses)
}

/// Derive a [`PerformanceReport`] from a finished run.
pub fn summarize(
    ledger: &TradeLedger,
    curve: &EquityCurve,
    config: &SimulationConfig,
) -> PerformanceReport {
    let initial_capital = config.initial_capital;
    let equity = curve.values();
    let final_capital = curve.last().map_or(initial_capital, |p| p.equity);

    let total_return = final_capital - initial_capital;
    let total_return_fraction = safe_div(total_return, initial_capital);
    let total_return_percent = total_return_fraction * 100.0;

    let drawdown = compute_drawdown(&equity);

    let returns = bar_returns(&equity, initial_capital);
    let per_period_rf = safe_div(config.risk_free_rate, config.periods_per_year);
    let excess: Vec<f64> = returns.iter().map(|r| r - per_period_rf).collect();
    let periods_per_year = config.periods_per_year;

    let mut winning_trades = 0usize;
    let mut losing_trades = 0usize;
    let mut gross_profit = 0.0_f64;
    let mut gross_loss = 0.0_f64;
    let mut largest_win = 0.0_f64;
    let mut largest_loss = 0.0_f64;
    let mut total_hours = 0.0_f64;
    let mut total_commission = 0.0_f64;
    let mut exit_reasons = ExitReasonCounts::default();

    for trade in ledger {
        let pnl = trade.pnl;
        if pnl > 0.0 {
            winning_trades += 1;
            gross_profit += pnl;
            largest_win = largest_win.max(pnl);
        } else if pnl < 0.0 {
            losing_trades += 1;
            gross_loss += pnl.abs();
            largest_loss = largest_loss.max(pnl.abs());
        }
        total_hours += trade.duration_hours();
        total_commission += trade.commission;
        exit_reasons.record(trade.exit_reason);
    }

    let total_trades = ledger.len();
    let breakeven_trades = total_trades - winning_trades - losing_trades;
    let (max_consecutive_wins, max_consecutive_losses) = max_streaks(ledger);
    let monthly = calendar::monthly_breakdown(ledger.as_slice());
    let yearly = calendar::yearly_breakdown(&monthly);

    PerformanceReport {
        initial_capital,
        final_capital,
        total_return: finite_or_zero(total_return),
        total_return_percent,
        annualized_return_percent: annualized_return_percent(
            total_return_fraction,
            returns.len(),
            periods_per_year,
        ),

        max_drawdown: drawdown.amount,
        max_drawdown_percent: drawdown.percent,
        max_drawdown_duration: drawdown.duration,

        sharpe_ratio: finite_or_zero(sharpe(&excess, periods_per_year)),
        sortino_ratio: finite_or_zero(sortino(&excess, periods_per_year)),
        calmar_ratio: safe_div(total_return_percent, drawdown.percent),
        annualized_volatility_percent: finite_or_zero(
            sample_std(&returns) * periods_per_year.sqrt() * 100.0,
        ),
        recovery_factor: safe_div(total_return, drawdown.amount),

        total_trades,
        winning_trades,
        losing_trades,
        breakeven_trades,
        win_rate: safe_div(winning_trades as f64, total_trades as f64),
        gross_profit,
        gross_loss,
        total_pnl: gross_profit - gross_loss,
        profit_factor: safe_div(gross_profit, gross_loss),
        expectancy: safe_div(gross_profit - gross_loss, total_trades as f64),
        avg_win: safe_div(gross_profit, winning_trades as f64),
        avg_loss: safe_div(gross_loss, losing_trades as f64),
        largest_win,
        largest_loss,
        avg_trade_duration_hours: safe_div(total_hours, total_trades as f64),
        total_commission,
        exit_reasons,

        max_consecutive_wins,
        max_consecutive_losses,

        monthly,
        yearly,
    }
}
