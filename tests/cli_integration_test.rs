//! CLI integration tests for config loading and the run pipeline.
//!
//! Tests cover:
//! - Building typed config and strategy from INI files on disk
//! - `build_report` over CSV bars written to disk
//! - Output files (JSON report, equity and trade CSVs)
//! - Exit codes for config and data errors

mod common;

use backsim::adapters::csv_adapter::CsvAdapter;
use backsim::adapters::file_config_adapter::FileConfigAdapter;
use backsim::cli::{self, Cli, OutputPaths};
use backsim::domain::error::BacksimError;
use backsim::domain::strategy::Strategy;
use backsim::ports::data_port::DataPort;
use clap::Parser;
use common::*;
use std::io::Write;
use std::process::ExitCode;

fn same_code(a: ExitCode, b: ExitCode) -> bool {
    format!("{a:?}") == format!("{b:?}")
}

fn write_temp(content: &str, suffix: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

const VALID_INI: &str = r#"
[simulation]
initial_capital = 10000
position_size = 0.5
max_open_positions = 1
slippage = 0.0005
commission = 0.001

[monte_carlo]
enabled = true
samples = 300
seed = 42
ruin_threshold = 0.8

[strategy]
type = ma_cross
fast = 2
slow = 6
stop_loss_pct = 8
"#;

mod config_loading {
    use super::*;

    #[test]
    fn loads_config_from_disk() {
        let file = write_temp(VALID_INI, ".ini");
        let adapter = cli::load_config(file.path()).unwrap();

        let config = cli::build_simulation_config(&adapter).unwrap();
        assert_eq!(config.initial_capital, 10_000.0);
        assert_eq!(config.position_size_fraction, 0.5);
        assert!(config.use_monte_carlo);
        assert_eq!(config.monte_carlo_samples, 300);

        match cli::build_strategy(&adapter).unwrap() {
            Strategy::MaCross(s) => {
                assert_eq!((s.fast, s.slow), (2, 6));
                assert_eq!(s.stops.stop_loss_pct, 8.0);
                assert!(!s.allow_short);
            }
            other => panic!("unexpected strategy {other:?}"),
        }
    }

    #[test]
    fn validate_all_reports_first_bad_key() {
        let ini = VALID_INI.replace("position_size = 0.5", "position_size = 2");
        let adapter = FileConfigAdapter::from_string(&ini).unwrap();
        match cli::validate_all(&adapter).unwrap_err() {
            BacksimError::ConfigInvalid { section, key, .. } => {
                assert_eq!(section, "simulation");
                assert_eq!(key, "position_size");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn risk_free_rate_bounds_agree_with_engine() {
        for rate in ["-0.01", "1.5"] {
            let ini = VALID_INI.replace(
                "commission = 0.001",
                &format!("commission = 0.001\nrisk_free_rate = {rate}"),
            );
            let adapter = FileConfigAdapter::from_string(&ini).unwrap();
            cli::validate_all(&adapter).unwrap();
            let config = cli::build_simulation_config(&adapter).unwrap();
            assert!(config.validate().is_ok());
        }
    }

    #[test]
    fn bad_strategy_type() {
        let ini = VALID_INI.replace("type = ma_cross", "type = grid");
        let adapter = FileConfigAdapter::from_string(&ini).unwrap();
        assert!(matches!(
            cli::build_strategy(&adapter),
            Err(BacksimError::ConfigInvalid { .. })
        ));
    }
}

mod run_pipeline {
    use super::*;

    fn bars_file() -> tempfile::NamedTempFile {
        write_temp(&bars_csv(&sawtooth_bars(150, 100.0, 15.0, 8)), ".csv")
    }

    #[test]
    fn build_report_from_files() {
        let config = FileConfigAdapter::from_string(VALID_INI).unwrap();
        let bars_file = bars_file();
        let bars = CsvAdapter::new().load_bars(bars_file.path()).unwrap();

        let report = cli::build_report(&config, &bars, None).unwrap();

        assert_eq!(report.equity_curve.len(), bars.len() + 1);
        assert!(report.performance.total_trades > 0);
        let last = report.equity_curve.last().unwrap();
        assert!((last.equity - report.performance.final_capital).abs() < 1e-9);

        let mc = report.monte_carlo.as_ref().unwrap();
        assert_eq!(mc.seed, 42);
        assert_eq!(mc.samples, 300);
    }

    #[test]
    fn seed_override_wins() {
        let config = FileConfigAdapter::from_string(VALID_INI).unwrap();
        let bars = sawtooth_bars(150, 100.0, 15.0, 8);

        let report = cli::build_report(&config, &bars, Some(7)).unwrap();
        assert_eq!(report.monte_carlo.unwrap().seed, 7);
    }

    #[test]
    fn seeded_reports_are_reproducible() {
        let config = FileConfigAdapter::from_string(VALID_INI).unwrap();
        let bars = sawtooth_bars(150, 100.0, 15.0, 8);

        let a = cli::build_report(&config, &bars, None).unwrap();
        let b = cli::build_report(&config, &bars, None).unwrap();
        assert_eq!(a.performance, b.performance);
        assert_eq!(a.monte_carlo, b.monte_carlo);
    }

    #[test]
    fn monte_carlo_disabled() {
        let ini = VALID_INI.replace("enabled = true", "enabled = false");
        let config = FileConfigAdapter::from_string(&ini).unwrap();
        let report = cli::build_report(&config, &sawtooth_bars(60, 100.0, 15.0, 8), None).unwrap();
        assert!(report.monte_carlo.is_none());
    }

    #[test]
    fn empty_bars_is_insufficient_data() {
        let config = FileConfigAdapter::from_string(VALID_INI).unwrap();
        let err = cli::build_report(&config, &[], None).unwrap_err();
        assert!(matches!(err, BacksimError::InsufficientData { .. }));
        assert!(same_code(ExitCode::from(&err), ExitCode::from(5)));
    }

    #[test]
    fn writes_all_outputs() {
        let config = FileConfigAdapter::from_string(VALID_INI).unwrap();
        let report = cli::build_report(&config, &sawtooth_bars(80, 100.0, 15.0, 8), None).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let outputs = OutputPaths {
            report: Some(dir.path().join("report.json")),
            equity_csv: Some(dir.path().join("csv/equity.csv")),
            trades_csv: Some(dir.path().join("csv/trades.csv")),
        };
        cli::write_outputs(&report, &outputs).unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(dir.path().join("report.json")).unwrap())
                .unwrap();
        assert!(json["performance"]["sharpe_ratio"].is_number());

        let equity = std::fs::read_to_string(dir.path().join("csv/equity.csv")).unwrap();
        assert_eq!(equity.lines().count(), report.equity_curve.len() + 1);

        let trades = std::fs::read_to_string(dir.path().join("csv/trades.csv")).unwrap();
        assert_eq!(trades.lines().count(), report.trades.len() + 1);
    }
}

mod commands {
    use super::*;

    #[test]
    fn validate_command_succeeds() {
        let file = write_temp(VALID_INI, ".ini");
        let cli = Cli::try_parse_from([
            "backsim",
            "validate",
            "--config",
            file.path().to_str().unwrap(),
        ])
        .unwrap();
        assert!(same_code(cli::run(cli), ExitCode::SUCCESS));
    }

    #[test]
    fn validate_command_rejects_bad_config() {
        let file = write_temp("[simulation]\ninitial_capital = -5\n", ".ini");
        let cli = Cli::try_parse_from([
            "backsim",
            "validate",
            "--config",
            file.path().to_str().unwrap(),
        ])
        .unwrap();
        assert!(same_code(cli::run(cli), ExitCode::from(2)));
    }

    #[test]
    fn run_command_end_to_end() {
        let config = write_temp(VALID_INI, ".ini");
        let bars = write_temp(&bars_csv(&sawtooth_bars(100, 100.0, 15.0, 8)), ".csv");
        let dir = tempfile::tempdir().unwrap();
        let report_path = dir.path().join("out/report.json");

        let cli = Cli::try_parse_from([
            "backsim",
            "run",
            "--config",
            config.path().to_str().unwrap(),
            "--bars",
            bars.path().to_str().unwrap(),
            "--report",
            report_path.to_str().unwrap(),
        ])
        .unwrap();

        assert!(same_code(cli::run(cli), ExitCode::SUCCESS));
        assert!(report_path.exists());
    }

    #[test]
    fn info_on_missing_file_fails() {
        let cli =
            Cli::try_parse_from(["backsim", "info", "--bars", "/nonexistent/bars.csv"]).unwrap();
        assert!(same_code(cli::run(cli), ExitCode::from(1)));
    }
}
