//! Pretty-printed JSON report adapter.

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::Path;

use tracing::info;

use crate::domain::error::BacksimError;
use crate::domain::report::BacktestReport;
use crate::ports::report_port::ReportPort;

pub struct JsonReportAdapter;

impl JsonReportAdapter {
    pub fn new() -> Self {
        Self
    }

    pub fn to_string(report: &BacktestReport) -> Result<String, BacksimError> {
        Ok(serde_json::to_string_pretty(report)?)
    }
}

impl Default for JsonReportAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportPort for JsonReportAdapter {
    fn write(&self, report: &BacktestReport, output_path: &Path) -> Result<(), BacksimError> {
        if let Some(parent) = output_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let writer = BufWriter::new(File::create(output_path)?);
        serde_json::to_writer_pretty(writer, report)?;
        info!(path = %output_path.display(), "wrote report");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::backtest::{SimulationConfig, run};
    use crate::domain::ohlcv::Bar;
    use crate::domain::report::{ReportSelection, assemble};
    use crate::domain::strategy::BuyAndHold;
    use chrono::NaiveDate;
    use tempfile::tempdir;

    fn sample_report() -> BacktestReport {
        let bars: Vec<Bar> = [100.0, 101.0, 104.0]
            .iter()
            .enumerate()
            .map(|(i, &close)| Bar {
                timestamp: NaiveDate::from_ymd_opt(2024, 5, 1 + i as u32)
                    .unwrap()
                    .and_hms_opt(0, 0, 0)
                    .unwrap(),
                open: close,
                high: close,
                low: close,
                close,
                volume: 1.0,
            })
            .collect();
        let config = SimulationConfig {
            initial_capital: 1_000.0,
            ..SimulationConfig::default()
        };
        let result = run(&bars, &BuyAndHold::default(), &config).unwrap();
        assemble(&result, &config, None, ReportSelection::All, ReportSelection::All)
    }

    #[test]
    fn writes_report_into_nested_directory() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/deep/report.json");

        JsonReportAdapter::new().write(&sample_report(), &path).unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&contents).unwrap();
        assert_eq!(value["performance"]["total_trades"], 1);
        assert_eq!(value["trades"][0]["exit_reason"], "forced_close");
        assert_eq!(value["equity_curve"].as_array().unwrap().len(), 4);
        assert!(value["monte_carlo"].is_null());
    }

    #[test]
    fn to_string_is_pretty() {
        let json = JsonReportAdapter::to_string(&sample_report()).unwrap();
        assert!(json.contains("\n  \"run_id\""));
    }
}
