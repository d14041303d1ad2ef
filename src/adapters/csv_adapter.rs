//! CSV bar feed and ledger/curve export.

use crate::domain::error::BacksimError;
use crate::domain::ohlcv::Bar;
use crate::domain::portfolio::EquityPoint;
use crate::domain::position::Trade;
use crate::ports::data_port::DataPort;
use chrono::{NaiveDate, NaiveDateTime};
use std::fs::{self, File};
use std::io::Read;
use std::path::Path;
use tracing::debug;

const TIMESTAMP_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

#[derive(Debug, Clone, Copy, Default)]
pub struct CsvAdapter;

impl CsvAdapter {
    pub fn new() -> Self {
        Self
    }

    /// Parse `timestamp,open,high,low,close,volume` rows with a header line.
    pub fn parse_bars<R: Read>(reader: R) -> Result<Vec<Bar>, BacksimError> {
        let mut rdr = csv::Reader::from_reader(reader);
        let mut bars = Vec::new();

        for (row, result) in rdr.records().enumerate() {
            let record = result?;
            let line = row + 2;

            let field = |idx: usize, name: &str| {
                record
                    .get(idx)
                    .map(str::trim)
                    .ok_or_else(|| BacksimError::DataFormat {
                        reason: format!("line {line}: missing {name} column"),
                    })
            };
            let number = |idx: usize, name: &str| -> Result<f64, BacksimError> {
                field(idx, name)?
                    .parse()
                    .map_err(|e| BacksimError::DataFormat {
                        reason: format!("line {line}: invalid {name} value: {e}"),
                    })
            };

            let timestamp = parse_timestamp(field(0, "timestamp")?).ok_or_else(|| {
                BacksimError::DataFormat {
                    reason: format!(
                        "line {line}: invalid timestamp, expected YYYY-MM-DD or YYYY-MM-DD HH:MM:SS"
                    ),
                }
            })?;

            bars.push(Bar {
                timestamp,
                open: number(1, "open")?,
                high: number(2, "high")?,
                low: number(3, "low")?,
                close: number(4, "close")?,
                volume: number(5, "volume")?,
            });
        }

        bars.sort_by_key(|b| b.timestamp);
        Ok(bars)
    }

    pub fn write_equity_curve(path: &Path, points: &[EquityPoint]) -> Result<(), BacksimError> {
        create_parent(path)?;
        let mut wtr = csv::Writer::from_path(path)?;
        if points.is_empty() {
            wtr.write_record(["timestamp", "equity"])?;
        }
        for point in points {
            wtr.serialize(point)?;
        }
        wtr.flush()?;
        debug!(path = %path.display(), rows = points.len(), "wrote equity curve");
        Ok(())
    }

    pub fn write_trades(path: &Path, trades: &[Trade]) -> Result<(), BacksimError> {
        create_parent(path)?;
        let mut wtr = csv::Writer::from_path(path)?;
        if trades.is_empty() {
            wtr.write_record([
                "id",
                "direction",
                "entry_price",
                "exit_price",
                "quantity",
                "commission",
                "pnl",
                "exit_reason",
                "opened_at",
                "closed_at",
            ])?;
        }
        for trade in trades {
            wtr.serialize(trade)?;
        }
        wtr.flush()?;
        debug!(path = %path.display(), rows = trades.len(), "wrote trade ledger");
        Ok(())
    }
}

fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

fn create_parent(path: &Path) -> Result<(), BacksimError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

impl DataPort for CsvAdapter {
    fn load_bars(&self, path: &Path) -> Result<Vec<Bar>, BacksimError> {
        let file = File::open(path)?;
        let bars = Self::parse_bars(file)?;
        debug!(path = %path.display(), bars = bars.len(), "loaded bars");
        Ok(bars)
    }
}
