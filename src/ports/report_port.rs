//! Report output port trait.

use std::path::Path;

use crate::domain::error::BacksimError;
use crate::domain::report::BacktestReport;

/// Port for writing backtest reports.
pub trait ReportPort {
    fn write(&self, report: &BacktestReport, output_path: &Path) -> Result<(), BacksimError>;
}
