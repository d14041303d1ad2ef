//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::json_report_adapter::JsonReportAdapter;
use crate::domain::backtest::{self as backtest_engine, DEFAULT_PERIODS_PER_YEAR, SimulationConfig};
use crate::domain::config_validation::{
    validate_monte_carlo_config, validate_simulation_config, validate_strategy_config,
};
use crate::domain::error::BacksimError;
use crate::domain::monte_carlo::MonteCarloResampler;
use crate::domain::ohlcv::Bar;
use crate::domain::report::{self, BacktestReport, ReportSelection};
use crate::domain::strategy::{BuyAndHold, MovingAverageCross, StopLevels, Strategy};
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use crate::ports::report_port::ReportPort;

#[derive(Parser, Debug)]
#[command(name = "backsim", about = "Bar-by-bar backtest simulator")]
pub struct Cli {
    /// Debug-level logging (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a backtest over a bar file
    Run {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        bars: PathBuf,
        /// Write the full JSON report here
        #[arg(short, long)]
        report: Option<PathBuf>,
        #[arg(long)]
        equity_csv: Option<PathBuf>,
        #[arg(long)]
        trades_csv: Option<PathBuf>,
        /// Monte Carlo seed, overriding [monte_carlo] seed
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Validate a simulation configuration
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Show bar count and date range of a bar file
    Info {
        #[arg(short, long)]
        bars: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Run {
            config,
            bars,
            report,
            equity_csv,
            trades_csv,
            seed,
        } => run_simulation(
            &config,
            &bars,
            &OutputPaths {
                report,
                equity_csv,
                trades_csv,
            },
            seed,
        ),
        Command::Validate { config } => run_validate(&config),
        Command::Info { bars } => run_info(&bars),
    }
}

#[derive(Debug, Default)]
pub struct OutputPaths {
    pub report: Option<PathBuf>,
    pub equity_csv: Option<PathBuf>,
    pub trades_csv: Option<PathBuf>,
}

/// Monte Carlo settings from `[monte_carlo]` that live outside `SimulationConfig`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MonteCarloOptions {
    pub seed: Option<u64>,
    pub ruin_threshold: f64,
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|err| {
        eprintln!("error: {err}");
        ExitCode::from(&err)
    })
}

pub fn validate_all(adapter: &dyn ConfigPort) -> Result<(), BacksimError> {
    validate_simulation_config(adapter)?;
    validate_monte_carlo_config(adapter)?;
    validate_strategy_config(adapter)?;
    Ok(())
}

fn count(adapter: &dyn ConfigPort, section: &str, key: &str, default: i64) -> usize {
    adapter.get_int(section, key, default).max(0) as usize
}

pub fn build_simulation_config(adapter: &dyn ConfigPort) -> Result<SimulationConfig, BacksimError> {
    let config = SimulationConfig {
        initial_capital: adapter.get_double("simulation", "initial_capital", 100_000.0),
        position_size_fraction: adapter.get_double("simulation", "position_size", 0.25),
        max_open_positions: count(adapter, "simulation", "max_open_positions", 1),
        slippage_fraction: adapter.get_double("simulation", "slippage", 0.0),
        commission_fraction: adapter.get_double("simulation", "commission", 0.0),
        use_monte_carlo: adapter.get_bool("monte_carlo", "enabled", false),
        monte_carlo_samples: count(adapter, "monte_carlo", "samples", 1000),
        risk_free_rate: adapter.get_double("simulation", "risk_free_rate", 0.0),
        periods_per_year: adapter.get_double(
            "simulation",
            "periods_per_year",
            DEFAULT_PERIODS_PER_YEAR,
        ),
    };
    config.validate()?;
    Ok(config)
}

pub fn build_monte_carlo_options(
    adapter: &dyn ConfigPort,
) -> Result<MonteCarloOptions, BacksimError> {
    let seed = match adapter.get_string("monte_carlo", "seed") {
        Some(raw) => Some(raw.trim().parse::<u64>().map_err(|_| {
            BacksimError::ConfigInvalid {
                section: "monte_carlo".into(),
                key: "seed".into(),
                reason: "seed must be a non-negative integer".into(),
            }
        })?),
        None => None,
    };
    Ok(MonteCarloOptions {
        seed,
        ruin_threshold: adapter.get_double("monte_carlo", "ruin_threshold", 0.5),
    })
}

pub fn build_strategy(adapter: &dyn ConfigPort) -> Result<Strategy, BacksimError> {
    let stops = StopLevels {
        stop_loss_pct: adapter.get_double("strategy", "stop_loss_pct", 0.0),
        take_profit_pct: adapter.get_double("strategy", "take_profit_pct", 0.0),
    };
    let kind = adapter
        .get_string("strategy", "type")
        .unwrap_or_else(|| "buy_and_hold".to_string());

    match kind.trim() {
        "buy_and_hold" => Ok(Strategy::BuyAndHold(BuyAndHold { stops })),
        "ma_cross" => {
            let strategy = MovingAverageCross::new(
                count(adapter, "strategy", "fast", 10),
                count(adapter, "strategy", "slow", 30),
            )?
            .with_stops(stops)
            .with_shorts(adapter.get_bool("strategy", "allow_short", false));
            Ok(Strategy::MaCross(strategy))
        }
        other => Err(BacksimError::ConfigInvalid {
            section: "strategy".into(),
            key: "type".into(),
            reason: format!("unknown strategy type {other:?}"),
        }),
    }
}

/// Validate the config, simulate over `bars`, optionally resample, and
/// assemble the report.
pub fn build_report(
    adapter: &dyn ConfigPort,
    bars: &[Bar],
    seed_override: Option<u64>,
) -> Result<BacktestReport, BacksimError> {
    validate_all(adapter)?;
    let config = build_simulation_config(adapter)?;
    let strategy = build_strategy(adapter)?;
    let mc = build_monte_carlo_options(adapter)?;

    tracing::info!(strategy = strategy.name(), "strategy loaded");

    let result = backtest_engine::run(bars, &strategy, &config)?;

    let monte_carlo = if config.use_monte_carlo {
        let mut resampler =
            MonteCarloResampler::new(config.monte_carlo_samples, config.initial_capital)
                .with_ruin_threshold(mc.ruin_threshold);
        if let Some(seed) = seed_override.or(mc.seed) {
            resampler = resampler.with_seed(seed);
        }
        resampler.run(&result.ledger.pnls())
    } else {
        None
    };

    Ok(report::assemble(
        &result,
        &config,
        monte_carlo,
        ReportSelection::All,
        ReportSelection::All,
    ))
}

fn run_simulation(
    config_path: &Path,
    bars_path: &Path,
    outputs: &OutputPaths,
    seed: Option<u64>,
) -> ExitCode {
    // Stage 1: Load config
    eprintln!("Loading config from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    // Stage 2: Load bars
    eprintln!("Loading bars from {}", bars_path.display());
    let bars = match CsvAdapter::new().load_bars(bars_path) {
        Ok(b) => b,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    // Stage 3: Simulate, resample, assemble
    let report = match build_report(&adapter, &bars, seed) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    // Stage 4: Outputs
    if let Err(e) = write_outputs(&report, outputs) {
        eprintln!("error: {e}");
        return (&e).into();
    }

    print_summary(&report);
    ExitCode::SUCCESS
}

pub fn write_outputs(report: &BacktestReport, outputs: &OutputPaths) -> Result<(), BacksimError> {
    if let Some(path) = &outputs.report {
        JsonReportAdapter::new().write(report, path)?;
        eprintln!("Report written to {}", path.display());
    }
    if let Some(path) = &outputs.equity_csv {
        CsvAdapter::write_equity_curve(path, &report.equity_curve)?;
        eprintln!("Equity curve written to {}", path.display());
    }
    if let Some(path) = &outputs.trades_csv {
        CsvAdapter::write_trades(path, &report.trades)?;
        eprintln!("Trades written to {}", path.display());
    }
    Ok(())
}

fn print_summary(report: &BacktestReport) {
    let p = &report.performance;
    println!("Run {}", report.run_id);
    println!("  Final capital:   {:.2}", p.final_capital);
    println!(
        "  Total return:    {:.2} ({:.2}%)",
        p.total_return, p.total_return_percent
    );
    println!(
        "  Max drawdown:    {:.2} ({:.2}%)",
        p.max_drawdown, p.max_drawdown_percent
    );
    println!("  Sharpe ratio:    {:.3}", p.sharpe_ratio);
    println!("  Sortino ratio:   {:.3}", p.sortino_ratio);
    println!(
        "  Trades:          {} ({:.1}% win rate)",
        p.total_trades,
        p.win_rate * 100.0
    );
    println!("  Profit factor:   {:.3}", p.profit_factor);

    if let Some(mc) = &report.monte_carlo {
        println!(
            "  Monte Carlo:     {} samples, final capital p5 {:.2} / p95 {:.2}",
            mc.samples, mc.final_capital.p5, mc.final_capital.p95
        );
        if let Some(risk) = &mc.risk {
            println!(
                "  Risk of ruin:    {:.2}% (max drawdown p95 {:.2})",
                risk.probability_of_ruin * 100.0,
                risk.max_drawdown.p95
            );
        }
    }
}

fn run_validate(config_path: &Path) -> ExitCode {
    eprintln!("Validating config: {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    if let Err(e) = validate_all(&adapter) {
        eprintln!("error: {e}");
        return (&e).into();
    }

    let config = match build_simulation_config(&adapter) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };
    let strategy = match build_strategy(&adapter) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    eprintln!("\nSimulation:");
    eprintln!("  initial_capital:    {}", config.initial_capital);
    eprintln!("  position_size:      {}", config.position_size_fraction);
    eprintln!("  max_open_positions: {}", config.max_open_positions);
    eprintln!("  slippage:           {}", config.slippage_fraction);
    eprintln!("  commission:         {}", config.commission_fraction);
    eprintln!("\nStrategy: {}", strategy.name());
    if config.use_monte_carlo {
        eprintln!("Monte Carlo: {} samples", config.monte_carlo_samples);
    }

    eprintln!("\nConfiguration is valid.");
    ExitCode::SUCCESS
}

fn run_info(bars_path: &Path) -> ExitCode {
    match CsvAdapter::new().describe(bars_path) {
        Ok(Some((first, last, count))) => {
            println!("{}: {} bars, {} to {}", bars_path.display(), count, first, last);
            ExitCode::SUCCESS
        }
        Ok(None) => {
            eprintln!("{}: no bars found", bars_path.display());
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}
