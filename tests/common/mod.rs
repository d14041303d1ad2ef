#![allow(dead_code)]

use backsim::domain::backtest::SimulationConfig;
use backsim::domain::error::BacksimError;
pub use backsim::domain::ohlcv::Bar;
use backsim::ports::data_port::DataPort;
use chrono::{NaiveDate, NaiveDateTime};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// In-memory bar feed keyed by path.
pub struct MockDataPort {
    pub data: HashMap<PathBuf, Vec<Bar>>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
        }
    }

    pub fn with_bars(mut self, path: &str, bars: Vec<Bar>) -> Self {
        self.data.insert(PathBuf::from(path), bars);
        self
    }
}

impl DataPort for MockDataPort {
    fn load_bars(&self, path: &Path) -> Result<Vec<Bar>, BacksimError> {
        self.data.get(path).cloned().ok_or_else(|| {
            BacksimError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{} not found", path.display()),
            ))
        })
    }
}

pub fn day(offset: i64) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
        + chrono::Duration::days(offset)
}

/// Bar with a small symmetric range around `close`.
pub fn make_bar(offset: i64, close: f64) -> Bar {
    Bar {
        timestamp: day(offset),
        open: close,
        high: close + 1.0,
        low: close - 1.0,
        close,
        volume: 1000.0,
    }
}

pub fn make_bar_range(offset: i64, low: f64, high: f64, close: f64) -> Bar {
    Bar {
        timestamp: day(offset),
        open: close,
        high,
        low,
        close,
        volume: 1000.0,
    }
}

pub fn bars_from_closes(closes: &[f64]) -> Vec<Bar> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &c)| make_bar_range(i as i64, c, c, c))
        .collect()
}

/// Linear trend of `count` bars starting at `start_price`.
pub fn generate_bars(count: usize, start_price: f64, step: f64) -> Vec<Bar> {
    (0..count)
        .map(|i| make_bar(i as i64, start_price + step * i as f64))
        .collect()
}

/// Sawtooth: rises for `period` bars then falls for `period` bars.
pub fn sawtooth_bars(count: usize, base: f64, amplitude: f64, period: usize) -> Vec<Bar> {
    (0..count)
        .map(|i| {
            let phase = i % (2 * period);
            let offset = if phase < period {
                phase as f64
            } else {
                (2 * period - phase) as f64
            };
            make_bar(i as i64, base + amplitude * offset / period as f64)
        })
        .collect()
}

pub fn sample_config() -> SimulationConfig {
    SimulationConfig {
        initial_capital: 10_000.0,
        position_size_fraction: 1.0,
        max_open_positions: 1,
        slippage_fraction: 0.0,
        commission_fraction: 0.0,
        use_monte_carlo: false,
        monte_carlo_samples: 100,
        risk_free_rate: 0.0,
        periods_per_year: 252.0,
    }
}

pub fn bars_csv(bars: &[Bar]) -> String {
    let mut out = String::from("timestamp,open,high,low,close,volume\n");
    for b in bars {
        out.push_str(&format!(
            "{},{},{},{},{},{}\n",
            b.timestamp.format("%Y-%m-%d %H:%M:%S"),
            b.open,
            b.high,
            b.low,
            b.close,
            b.volume
        ));
    }
    out
}
