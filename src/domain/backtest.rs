//! Backtest engine and event loop.
//!
//! `SimulationConfig` defines run parameters; [`run`] drives the bar-by-bar
//! loop over one series; [`run_batch`] fans independent runs out over a
//! bounded rayon pool.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::error::BacksimError;
use super::execution::{self, EntryResult, ExecutionConfig};
use super::ohlcv::{Bar, validate_bars};
use super::portfolio::{EquityCurve, Portfolio, TradeLedger};
use super::position::{Direction, ExitReason};
use super::signal::{EntryHints, Signal, SignalSource};

pub const DEFAULT_PERIODS_PER_YEAR: f64 = 252.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub initial_capital: f64,
    pub position_size_fraction: f64,
    pub max_open_positions: usize,
    pub slippage_fraction: f64,
    pub commission_fraction: f64,
    pub use_monte_carlo: bool,
    pub monte_carlo_samples: usize,
    /// Annual risk-free rate used for excess returns.
    pub risk_free_rate: f64,
    /// Annualization factor for per-bar returns.
    pub periods_per_year: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        SimulationConfig {
            initial_capital: 100_000.0,
            position_size_fraction: 0.25,
            max_open_positions: 1,
            slippage_fraction: 0.0,
            commission_fraction: 0.0,
            use_monte_carlo: false,
            monte_carlo_samples: 1_000,
            risk_free_rate: 0.0,
            periods_per_year: DEFAULT_PERIODS_PER_YEAR,
        }
    }
}

impl SimulationConfig {
    /// Check the numeric bounds the engine relies on.
    pub fn validate(&self) -> Result<(), BacksimError> {
        if !(self.initial_capital.is_finite() && self.initial_capital > 0.0) {
            return Err(BacksimError::invalid_config(
                "initial_capital",
                "must be positive",
            ));
        }
        if !(self.position_size_fraction > 0.0 && self.position_size_fraction <= 1.0) {
            return Err(BacksimError::invalid_config(
                "position_size_fraction",
                "must be in (0, 1]",
            ));
        }
        if self.max_open_positions < 1 {
            return Err(BacksimError::invalid_config(
                "max_open_positions",
                "must be at least 1",
            ));
        }
        if !(self.slippage_fraction.is_finite() && self.slippage_fraction >= 0.0) {
            return Err(BacksimError::invalid_config(
                "slippage_fraction",
                "must be non-negative",
            ));
        }
        if !(self.commission_fraction.is_finite() && self.commission_fraction >= 0.0) {
            return Err(BacksimError::invalid_config(
                "commission_fraction",
                "must be non-negative",
            ));
        }
        if self.monte_carlo_samples < 1 {
            return Err(BacksimError::invalid_config(
                "monte_carlo_samples",
                "must be at least 1",
            ));
        }
        if !self.risk_free_rate.is_finite() {
            return Err(BacksimError::invalid_config(
                "risk_free_rate",
                "must be finite",
            ));
        }
        if !(self.periods_per_year.is_finite() && self.periods_per_year > 0.0) {
            return Err(BacksimError::invalid_config(
                "periods_per_year",
                "must be positive",
            ));
        }
        Ok(())
    }

    pub fn execution(&self) -> ExecutionConfig {
        ExecutionConfig {
            position_size_fraction: self.position_size_fraction,
            slippage_fraction: self.slippage_fraction,
            commission_fraction: self.commission_fraction,
        }
    }
}

/// Cooperative cancellation flag, checked by the engine between bars.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

static NEXT_RUN_ID: AtomicU64 = AtomicU64::new(1);

/// State scoped to one simulation run: its id, the position-id sequence and
/// the cancellation flag.
#[derive(Debug)]
pub struct RunContext {
    run_id: u64,
    next_position_id: u64,
    cancel: CancellationToken,
}

impl RunContext {
    pub fn new(run_id: u64) -> Self {
        RunContext {
            run_id,
            next_position_id: 1,
            cancel: CancellationToken::new(),
        }
    }

    /// Context with a process-unique run id.
    pub fn fresh() -> Self {
        Self::new(NEXT_RUN_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn run_id(&self) -> u64 {
        self.run_id
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    fn next_position_id(&mut self) -> u64 {
        let id = self.next_position_id;
        self.next_position_id += 1;
        id
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestResult {
    pub run_id: u64,
    pub ledger: TradeLedger,
    pub equity_curve: EquityCurve,
    pub final_capital: f64,
}

/// Run a backtest with a fresh [`RunContext`].
pub fn run<S>(
    bars: &[Bar],
    source: &S,
    config: &SimulationConfig,
) -> Result<BacktestResult, BacksimError>
where
    S: SignalSource + ?Sized,
{
    run_with_context(bars, source, config, &mut RunContext::fresh())
}

/// Run a backtest over `bars`, asking `source` for one signal per bar.
///
/// Per bar: resolve stop-loss/take-profit exits at their levels, query the
/// signal, close opposing or exited positions at the slippage-adjusted close,
/// open new positions while under `max_open_positions`, then mark equity.
/// The final bar force-closes everything before its equity point is taken.
pub fn run_with_context<S>(
    bars: &[Bar],
    source: &S,
    config: &SimulationConfig,
    ctx: &mut RunContext,
) -> Result<BacktestResult, BacksimError>
where
    S: SignalSource + ?Sized,
{
    config.validate()?;
    validate_bars(bars)?;

    info!(
        run_id = ctx.run_id,
        bars = bars.len(),
        initial_capital = config.initial_capital,
        "starting simulation"
    );

    let exec = config.execution();
    let mut portfolio = Portfolio::new(config.initial_capital);
    portfolio.equity_curve = EquityCurve::with_capacity(bars.len() + 1);
    portfolio.record_equity(bars[0].timestamp, config.initial_capital);

    let last_index = bars.len() - 1;

    for (index, bar) in bars.iter().enumerate() {
        if ctx.cancel.is_cancelled() {
            warn!(run_id = ctx.run_id, bars_processed = index, "simulation cancelled");
            return Err(BacksimError::Cancelled {
                bars_processed: index,
            });
        }

        execution::check_triggers(&mut portfolio, bar, &exec);

        let signal = source
            .signal(bar, index, &bars[..=index])
            .map_err(|source| BacksimError::SignalSourceFailure { index, source })?;

        apply_signal(&mut portfolio, ctx, bar, signal, config, &exec);

        if index == last_index && !portfolio.book.is_empty() {
            let ids = portfolio.book.ids();
            let closed = execution::close_at_market(
                &mut portfolio,
                &ids,
                bar.close,
                bar.timestamp,
                ExitReason::ForcedClose,
                &exec,
            );
            debug!(closed, "force-closed open positions at end of run");
        }

        let equity = portfolio.total_equity(bar.close);
        portfolio.record_equity(bar.timestamp, equity);
    }

    let final_capital = portfolio.balance();

    info!(
        run_id = ctx.run_id,
        trades = portfolio.ledger.len(),
        final_capital,
        "simulation complete"
    );

    Ok(BacktestResult {
        run_id: ctx.run_id,
        ledger: portfolio.ledger,
        equity_curve: portfolio.equity_curve,
        final_capital,
    })
}

fn apply_signal(
    portfolio: &mut Portfolio,
    ctx: &mut RunContext,
    bar: &Bar,
    signal: Signal,
    config: &SimulationConfig,
    exec: &ExecutionConfig,
) {
    let (direction, hints): (Direction, EntryHints) = match signal {
        Signal::Hold => return,
        Signal::Exit => {
            let ids = portfolio.book.ids();
            execution::close_at_market(
                portfolio,
                &ids,
                bar.close,
                bar.timestamp,
                ExitReason::Signal,
                exec,
            );
            return;
        }
        Signal::EnterLong(hints) => (Direction::Long, hints),
        Signal::EnterShort(hints) => (Direction::Short, hints),
    };

    let opposing = portfolio.book.ids_in_direction(direction.opposite());
    if !opposing.is_empty() {
        execution::close_at_market(
            portfolio,
            &opposing,
            bar.close,
            bar.timestamp,
            ExitReason::Signal,
            exec,
        );
    }

    if portfolio.position_count() >= config.max_open_positions {
        return;
    }

    let id = ctx.next_position_id();
    let result = execution::enter_position(
        portfolio,
        id,
        direction,
        bar.close,
        bar.timestamp,
        hints,
        exec,
    );
    if result == EntryResult::InsufficientCapital {
        debug!(at = %bar.timestamp, "entry skipped: insufficient capital");
    }
}

/// One independent simulation in a batch.
#[derive(Debug, Clone)]
pub struct BacktestJob {
    pub name: String,
    pub bars: Vec<Bar>,
    pub config: SimulationConfig,
}

/// Result of one batch job, in submission order.
#[derive(Debug)]
pub struct BatchOutcome {
    pub name: String,
    pub result: Result<BacktestResult, BacksimError>,
}

/// Run independent jobs in parallel on a pool of at most `max_threads`
/// workers (0 uses rayon's default). Each job owns its own portfolio.
pub fn run_batch<S>(
    jobs: &[BacktestJob],
    source: &S,
    max_threads: usize,
) -> Result<Vec<BatchOutcome>, BacksimError>
where
    S: SignalSource + Sync + ?Sized,
{
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(max_threads)
        .build()
        .map_err(|e| BacksimError::invalid_config("max_threads", e.to_string()))?;

    info!(
        jobs = jobs.len(),
        threads = pool.current_num_threads(),
        "starting batch"
    );

    let outcomes = pool.install(|| {
        jobs.par_iter()
            .map(|job| {
                let result = run(&job.bars, source, &job.config);
                if let Err(e) = &result {
                    warn!(job = %job.name, error = %e, "batch job failed");
                }
                BatchOutcome {
                    name: job.name.clone(),
                    result,
                }
            })
            .collect::<Vec<_>>()
    });

    Ok(outcomes)
}
