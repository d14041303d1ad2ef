//! Per-bar trading decisions and the signal source capability.
//!
//! A signal source is any pure function of `(bar, index, history)`. The engine
//! hands it shared references only, with `history` ending at the current bar,
//! so it can neither mutate engine state nor look ahead.

use serde::{Deserialize, Serialize};

use super::error::SourceError;
use super::ohlcv::Bar;

/// Optional absolute price levels attached to an entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EntryHints {
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Signal {
    EnterLong(EntryHints),
    EnterShort(EntryHints),
    Exit,
    Hold,
}

impl Signal {
    pub fn long() -> Self {
        Signal::EnterLong(EntryHints::default())
    }

    pub fn short() -> Self {
        Signal::EnterShort(EntryHints::default())
    }

    pub fn long_with(stop_loss: f64, take_profit: f64) -> Self {
        Signal::EnterLong(EntryHints {
            stop_loss: Some(stop_loss),
            take_profit: Some(take_profit),
        })
    }

    pub fn short_with(stop_loss: f64, take_profit: f64) -> Self {
        Signal::EnterShort(EntryHints {
            stop_loss: Some(stop_loss),
            take_profit: Some(take_profit),
        })
    }
}

pub type SignalResult = Result<Signal, SourceError>;

/// Produces one [`Signal`] per bar.
pub trait SignalSource {
    fn signal(&self, bar: &Bar, index: usize, history: &[Bar]) -> SignalResult;
}

impl<F, E> SignalSource for F
where
    F: Fn(&Bar, usize, &[Bar]) -> Result<Signal, E>,
    E: Into<SourceError>,
{
    fn signal(&self, bar: &Bar, index: usize, history: &[Bar]) -> SignalResult {
        self(bar, index, history).map_err(Into::into)
    }
}
