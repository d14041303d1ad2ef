//! Built-in signal sources.
//!
//! Both strategies are pure functions of the history slice the engine hands
//! them; neither keeps state between bars.

use serde::{Deserialize, Serialize};

use super::error::BacksimError;
use super::ohlcv::Bar;
use super::signal::{EntryHints, Signal, SignalResult, SignalSource};

fn sma(closes: impl Iterator<Item = f64>, period: usize) -> f64 {
    closes.take(period).sum::<f64>() / period as f64
}

/// Percent distances below/above the entry close for stop-loss and
/// take-profit. Zero disables a level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StopLevels {
    pub stop_loss_pct: f64,
    pub take_profit_pct: f64,
}

impl StopLevels {
    fn hints(&self, close: f64, long: bool) -> EntryHints {
        let level = |pct: f64, up: bool| {
            (pct > 0.0).then(|| {
                if up {
                    close * (1.0 + pct / 100.0)
                } else {
                    close * (1.0 - pct / 100.0)
                }
            })
        };
        EntryHints {
            stop_loss: level(self.stop_loss_pct, !long),
            take_profit: level(self.take_profit_pct, long),
        }
    }
}

/// Enter long when the fast SMA crosses above the slow SMA. A cross below
/// exits, or reverses into a short when shorts are allowed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovingAverageCross {
    pub fast: usize,
    pub slow: usize,
    pub stops: StopLevels,
    pub allow_short: bool,
}

impl MovingAverageCross {
    pub fn new(fast: usize, slow: usize) -> Result<Self, BacksimError> {
        if fast == 0 {
            return Err(BacksimError::invalid_config("fast", "must be at least 1"));
        }
        if fast >= slow {
            return Err(BacksimError::invalid_config(
                "fast",
                format!("fast period {fast} must be below slow period {slow}"),
            ));
        }
        Ok(MovingAverageCross {
            fast,
            slow,
            stops: StopLevels::default(),
            allow_short: false,
        })
    }

    pub fn with_stops(mut self, stops: StopLevels) -> Self {
        self.stops = stops;
        self
    }

    pub fn with_shorts(mut self, allow_short: bool) -> Self {
        self.allow_short = allow_short;
        self
    }

    /// Bars needed before the first crossover can be detected.
    pub fn warmup(&self) -> usize {
        self.slow + 1
    }

    /// (fast, slow) averages ending `lag` bars before the end of `history`.
    fn averages(&self, history: &[Bar], lag: usize) -> (f64, f64) {
        let closes = || history.iter().rev().skip(lag).map(|b| b.close);
        (sma(closes(), self.fast), sma(closes(), self.slow))
    }
}

impl SignalSource for MovingAverageCross {
    fn signal(&self, bar: &Bar, _index: usize, history: &[Bar]) -> SignalResult {
        if history.len() < self.warmup() {
            return Ok(Signal::Hold);
        }

        let (fast_now, slow_now) = self.averages(history, 0);
        let (fast_prev, slow_prev) = self.averages(history, 1);

        if fast_prev <= slow_prev && fast_now > slow_now {
            return Ok(Signal::EnterLong(self.stops.hints(bar.close, true)));
        }
        if fast_prev >= slow_prev && fast_now < slow_now {
            if self.allow_short {
                return Ok(Signal::EnterShort(self.stops.hints(bar.close, false)));
            }
            return Ok(Signal::Exit);
        }
        Ok(Signal::Hold)
    }
}

/// Enter long on the first bar and hold until the end of the run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BuyAndHold {
    pub stops: StopLevels,
}

impl SignalSource for BuyAndHold {
    fn signal(&self, bar: &Bar, index: usize, _history: &[Bar]) -> SignalResult {
        if index == 0 {
            Ok(Signal::EnterLong(self.stops.hints(bar.close, true)))
        } else {
            Ok(Signal::Hold)
        }
    }
}

/// Strategy selected from configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Strategy {
    MaCross(MovingAverageCross),
    BuyAndHold(BuyAndHold),
}

impl Strategy {
    pub fn name(&self) -> &'static str {
        match self {
            Strategy::MaCross(_) => "ma_cross",
            Strategy::BuyAndHold(_) => "buy_and_hold",
        }
    }
}

impl SignalSource for Strategy {
    fn signal(&self, bar: &Bar, index: usize, history: &[Bar]) -> SignalResult {
        match self {
            Strategy::MaCross(s) => s.signal(bar, index, history),
            Strategy::BuyAndHold(s) => s.signal(bar, index, history),
        }
    }
}
