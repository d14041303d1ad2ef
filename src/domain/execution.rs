//! Trade execution and fill simulation.
//!
//! Implements entry/exit logic with slippage, fractional position sizing,
//! commissions, and stop-loss/take-profit trigger checking.

use chrono::NaiveDateTime;
use tracing::debug;

use super::ohlcv::Bar;
use super::portfolio::Portfolio;
use super::position::{Direction, ExitReason, Position, Trade};
use super::signal::EntryHints;

/// Cost and sizing parameters applied to every fill.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExecutionConfig {
    pub position_size_fraction: f64,
    pub slippage_fraction: f64,
    pub commission_fraction: f64,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        ExecutionConfig {
            position_size_fraction: 0.25,
            slippage_fraction: 0.0,
            commission_fraction: 0.0,
        }
    }
}

/// Commission on a fill: notional * commission_fraction.
pub fn calculate_commission(notional: f64, commission_fraction: f64) -> f64 {
    notional.abs() * commission_fraction
}

/// Long entry (buy) pays up: market_price * (1 + slippage).
pub fn apply_slippage_long_entry(market_price: f64, slippage_fraction: f64) -> f64 {
    market_price * (1.0 + slippage_fraction)
}

/// Short entry (sell short) receives down: market_price * (1 - slippage).
pub fn apply_slippage_short_entry(market_price: f64, slippage_fraction: f64) -> f64 {
    market_price * (1.0 - slippage_fraction)
}

/// Long exit (sell) receives down: market_price * (1 - slippage).
pub fn apply_slippage_long_exit(market_price: f64, slippage_fraction: f64) -> f64 {
    market_price * (1.0 - slippage_fraction)
}

/// Short exit (buy to cover) pays up: market_price * (1 + slippage).
pub fn apply_slippage_short_exit(market_price: f64, slippage_fraction: f64) -> f64 {
    market_price * (1.0 + slippage_fraction)
}

pub fn entry_execution_price(direction: Direction, market_price: f64, slippage: f64) -> f64 {
    match direction {
        Direction::Long => apply_slippage_long_entry(market_price, slippage),
        Direction::Short => apply_slippage_short_entry(market_price, slippage),
    }
}

pub fn exit_execution_price(direction: Direction, market_price: f64, slippage: f64) -> f64 {
    match direction {
        Direction::Long => apply_slippage_long_exit(market_price, slippage),
        Direction::Short => apply_slippage_short_exit(market_price, slippage),
    }
}

/// Realized PnL of a round trip, net of commission.
pub fn trade_pnl(
    direction: Direction,
    entry_price: f64,
    exit_price: f64,
    quantity: f64,
    commission: f64,
) -> f64 {
    direction.sign() * (exit_price - entry_price) * quantity - commission
}

/// Result of an entry attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum EntryResult {
    Entered {
        id: u64,
        quantity: f64,
        execution_price: f64,
        notional: f64,
        commission: f64,
    },
    InsufficientCapital,
}

fn usable_level(level: Option<f64>) -> Option<f64> {
    level.filter(|l| l.is_finite() && *l > 0.0)
}

/// Open a position sized from free cash.
///
/// 1. Apply slippage against the trader
/// 2. Budget = free cash * position_size_fraction
/// 3. Quantity = budget / execution price (fractional)
/// 4. Escrow notional and pay entry commission out of free cash
/// 5. Add the position to the book
pub fn enter_position(
    portfolio: &mut Portfolio,
    id: u64,
    direction: Direction,
    market_price: f64,
    timestamp: NaiveDateTime,
    hints: EntryHints,
    config: &ExecutionConfig,
) -> EntryResult {
    if portfolio.cash <= 0.0 {
        return EntryResult::InsufficientCapital;
    }

    let execution_price = entry_execution_price(direction, market_price, config.slippage_fraction);
    if !(execution_price.is_finite() && execution_price > 0.0) {
        return EntryResult::InsufficientCapital;
    }

    let budget = portfolio.cash * config.position_size_fraction;
    let quantity = budget / execution_price;
    if !(quantity.is_finite() && quantity > 0.0) {
        return EntryResult::InsufficientCapital;
    }

    let notional = quantity * execution_price;
    let commission = calculate_commission(notional, config.commission_fraction);
    portfolio.cash -= notional + commission;

    portfolio.book.open(Position {
        id,
        direction,
        entry_price: execution_price,
        quantity,
        stop_loss: usable_level(hints.stop_loss),
        take_profit: usable_level(hints.take_profit),
        opened_at: timestamp,
        entry_commission: commission,
    });

    debug!(
        id,
        ?direction,
        quantity,
        price = execution_price,
        commission,
        "opened position"
    );

    EntryResult::Entered {
        id,
        quantity,
        execution_price,
        notional,
        commission,
    }
}

/// Close a position at an already-determined execution price.
///
/// Returns the escrowed notional plus the price PnL minus the exit
/// commission to free cash and appends the trade to the ledger.
pub fn exit_position(
    portfolio: &mut Portfolio,
    id: u64,
    exit_price: f64,
    timestamp: NaiveDateTime,
    reason: ExitReason,
    config: &ExecutionConfig,
) -> Option<Trade> {
    let position = portfolio.book.remove(id)?;

    let exit_notional = position.quantity * exit_price;
    let exit_commission = calculate_commission(exit_notional, config.commission_fraction);
    let commission = position.entry_commission + exit_commission;
    let price_pnl = position.unrealized_pnl(exit_price);

    portfolio.cash += position.entry_notional() + price_pnl - exit_commission;

    let trade = Trade {
        id: position.id,
        direction: position.direction,
        entry_price: position.entry_price,
        exit_price,
        quantity: position.quantity,
        commission,
        pnl: trade_pnl(
            position.direction,
            position.entry_price,
            exit_price,
            position.quantity,
            commission,
        ),
        exit_reason: reason,
        opened_at: position.opened_at,
        closed_at: timestamp,
    };

    debug!(id, %reason, price = exit_price, pnl = trade.pnl, "closed position");

    portfolio.record_trade(trade.clone());
    Some(trade)
}

/// Close the given positions at the market price, slippage-adjusted per side.
///
/// Returns the number of positions closed.
pub fn close_at_market(
    portfolio: &mut Portfolio,
    ids: &[u64],
    market_price: f64,
    timestamp: NaiveDateTime,
    reason: ExitReason,
    config: &ExecutionConfig,
) -> usize {
    let mut closed = 0;
    for &id in ids {
        let Some(direction) = portfolio.book.get(id).map(|p| p.direction) else {
            continue;
        };
        let price = exit_execution_price(direction, market_price, config.slippage_fraction);
        if exit_position(portfolio, id, price, timestamp, reason, config).is_some() {
            closed += 1;
        }
    }
    closed
}

/// Check stop-loss and take-profit levels against the bar's range.
///
/// Two passes: collect triggered positions first, then exit each at its
/// trigger level. Returns the number of positions exited.
pub fn check_triggers(portfolio: &mut Portfolio, bar: &Bar, config: &ExecutionConfig) -> usize {
    let triggered: Vec<(u64, f64, ExitReason)> = portfolio
        .book
        .iter()
        .filter_map(|pos| {
            pos.triggered_exit(bar)
                .map(|(level, reason)| (pos.id, level, reason))
        })
        .collect();

    let count = triggered.len();

    for (id, level, reason) in triggered {
        exit_position(portfolio, id, level, bar.timestamp, reason, config);
    }

    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts(day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, day)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn bar(day: u32, low: f64, high: f64, close: f64) -> Bar {
        Bar {
            timestamp: ts(day),
            open: close,
            high,
            low,
            close,
            volume: 1_000.0,
        }
    }

    fn make_config() -> ExecutionConfig {
        ExecutionConfig {
            position_size_fraction: 0.25,
            slippage_fraction: 0.0005,
            commission_fraction: 0.001,
        }
    }

    fn frictionless(position_size_fraction: f64) -> ExecutionConfig {
        ExecutionConfig {
            position_size_fraction,
            slippage_fraction: 0.0,
            commission_fraction: 0.0,
        }
    }

    #[test]
    fn commission_is_fraction_of_notional() {
        assert!((calculate_commission(10_000.0, 0.001) - 10.0).abs() < 1e-12);
        assert!((calculate_commission(10_000.0, 0.0)).abs() < f64::EPSILON);
    }

    #[test]
    fn slippage_moves_against_trader() {
        assert!((apply_slippage_long_entry(100.0, 0.0005) - 100.05).abs() < 1e-9);
        assert!((apply_slippage_short_entry(100.0, 0.0005) - 99.95).abs() < 1e-9);
        assert!((apply_slippage_long_exit(100.0, 0.0005) - 99.95).abs() < 1e-9);
        assert!((apply_slippage_short_exit(100.0, 0.0005) - 100.05).abs() < 1e-9);
    }

    #[test]
    fn enter_long_sizes_from_free_cash() {
        let mut portfolio = Portfolio::new(100_000.0);
        let config = make_config();

        let result = enter_position(
            &mut portfolio,
            1,
            Direction::Long,
            100.0,
            ts(2),
            EntryHints::default(),
            &config,
        );

        match result {
            EntryResult::Entered {
                quantity,
                execution_price,
                notional,
                commission,
                ..
            } => {
                let expected_price = 100.0 * 1.0005;
                assert!((execution_price - expected_price).abs() < 1e-9);
                assert!((quantity - 25_000.0 / expected_price).abs() < 1e-9);
                assert!((notional - 25_000.0).abs() < 1e-6);
                assert!((commission - 25.0).abs() < 1e-6);
                assert!((portfolio.cash - (100_000.0 - 25_000.0 - 25.0)).abs() < 1e-6);
            }
            EntryResult::InsufficientCapital => panic!("expected entry to succeed"),
        }

        let pos = portfolio.book.get(1).unwrap();
        assert_eq!(pos.direction, Direction::Long);
        assert!(pos.quantity > 0.0);
    }

    #[test]
    fn enter_rejected_without_cash() {
        let mut portfolio = Portfolio::new(1_000.0);
        portfolio.cash = 0.0;
        let result = enter_position(
            &mut portfolio,
            1,
            Direction::Long,
            100.0,
            ts(2),
            EntryHints::default(),
            &make_config(),
        );
        assert_eq!(result, EntryResult::InsufficientCapital);
        assert!(portfolio.book.is_empty());
    }

    #[test]
    fn enter_rejected_for_zero_price() {
        let mut portfolio = Portfolio::new(1_000.0);
        let result = enter_position(
            &mut portfolio,
            1,
            Direction::Long,
            0.0,
            ts(2),
            EntryHints::default(),
            &make_config(),
        );
        assert_eq!(result, EntryResult::InsufficientCapital);
    }

    #[test]
    fn unusable_hints_are_dropped() {
        let mut portfolio = Portfolio::new(1_000.0);
        let hints = EntryHints {
            stop_loss: Some(f64::NAN),
            take_profit: Some(-5.0),
        };
        enter_position(
            &mut portfolio,
            1,
            Direction::Long,
            100.0,
            ts(2),
            hints,
            &frictionless(1.0),
        );
        let pos = portfolio.book.get(1).unwrap();
        assert_eq!(pos.stop_loss, None);
        assert_eq!(pos.take_profit, None);
    }

    #[test]
    fn round_trip_commission_matches_worked_example() {
        let mut portfolio = Portfolio::new(10_000.0);
        let config = ExecutionConfig {
            position_size_fraction: 0.1,
            slippage_fraction: 0.0,
            commission_fraction: 0.001,
        };

        enter_position(
            &mut portfolio,
            1,
            Direction::Long,
            100.0,
            ts(2),
            EntryHints::default(),
            &config,
        );
        let trade =
            exit_position(&mut portfolio, 1, 110.0, ts(3), ExitReason::Signal, &config).unwrap();

        assert!((trade.quantity - 10.0).abs() < 1e-9);
        assert!((trade.commission - 2.1).abs() < 1e-9);
        assert!((trade.pnl - 97.9).abs() < 1e-9);
        assert!((portfolio.cash - 10_097.9).abs() < 1e-9);
    }

    #[test]
    fn short_round_trip_settles_cash() {
        let mut portfolio = Portfolio::new(10_000.0);
        let config = frictionless(0.5);

        enter_position(
            &mut portfolio,
            1,
            Direction::Short,
            100.0,
            ts(2),
            EntryHints::default(),
            &config,
        );
        assert!((portfolio.cash - 5_000.0).abs() < 1e-9);

        let trade =
            exit_position(&mut portfolio, 1, 90.0, ts(3), ExitReason::Signal, &config).unwrap();

        // 50 shares short from 100 to 90
        assert!((trade.pnl - 500.0).abs() < 1e-9);
        assert!((portfolio.cash - 10_500.0).abs() < 1e-9);
        assert!(portfolio.book.is_empty());
        assert_eq!(portfolio.ledger.len(), 1);
    }

    #[test]
    fn exit_nonexistent_position() {
        let mut portfolio = Portfolio::new(10_000.0);
        let result = exit_position(
            &mut portfolio,
            42,
            100.0,
            ts(2),
            ExitReason::Signal,
            &make_config(),
        );
        assert!(result.is_none());
    }

    #[test]
    fn close_at_market_applies_exit_slippage() {
        let mut portfolio = Portfolio::new(10_000.0);
        let config = ExecutionConfig {
            position_size_fraction: 0.5,
            slippage_fraction: 0.01,
            commission_fraction: 0.0,
        };
        enter_position(
            &mut portfolio,
            1,
            Direction::Long,
            100.0,
            ts(2),
            EntryHints::default(),
            &config,
        );

        let closed = close_at_market(
            &mut portfolio,
            &[1, 7],
            100.0,
            ts(3),
            ExitReason::Signal,
            &config,
        );

        assert_eq!(closed, 1);
        let trade = &portfolio.ledger.as_slice()[0];
        assert!((trade.entry_price - 101.0).abs() < 1e-9);
        assert!((trade.exit_price - 99.0).abs() < 1e-9);
        assert!(trade.pnl < 0.0);
    }

    #[test]
    fn check_triggers_exits_at_stop_level() {
        let mut portfolio = Portfolio::new(1_000.0);
        let config = frictionless(1.0);
        enter_position(
            &mut portfolio,
            1,
            Direction::Long,
            100.0,
            ts(2),
            EntryHints {
                stop_loss: Some(95.0),
                take_profit: Some(110.0),
            },
            &config,
        );

        let exited = check_triggers(&mut portfolio, &bar(3, 94.0, 101.0, 99.0), &config);

        assert_eq!(exited, 1);
        let trade = &portfolio.ledger.as_slice()[0];
        assert_eq!(trade.exit_reason, ExitReason::StopLoss);
        assert!((trade.exit_price - 95.0).abs() < f64::EPSILON);
        assert!((trade.pnl + 50.0).abs() < 1e-9);
    }

    #[test]
    fn check_triggers_take_profit_short() {
        let mut portfolio = Portfolio::new(1_000.0);
        let config = frictionless(1.0);
        enter_position(
            &mut portfolio,
            1,
            Direction::Short,
            100.0,
            ts(2),
            EntryHints {
                stop_loss: Some(105.0),
                take_profit: Some(90.0),
            },
            &config,
        );

        let exited = check_triggers(&mut portfolio, &bar(3, 89.0, 99.0, 95.0), &config);

        assert_eq!(exited, 1);
        let trade = &portfolio.ledger.as_slice()[0];
        assert_eq!(trade.exit_reason, ExitReason::TakeProfit);
        assert!((trade.pnl - 100.0).abs() < 1e-9);
    }

    #[test]
    fn check_triggers_none_when_range_inside_levels() {
        let mut portfolio = Portfolio::new(1_000.0);
        let config = frictionless(1.0);
        enter_position(
            &mut portfolio,
            1,
            Direction::Long,
            100.0,
            ts(2),
            EntryHints {
                stop_loss: Some(95.0),
                take_profit: Some(110.0),
            },
            &config,
        );

        let exited = check_triggers(&mut portfolio, &bar(3, 96.0, 109.0, 100.0), &config);
        assert_eq!(exited, 0);
        assert_eq!(portfolio.position_count(), 1);
    }
}
