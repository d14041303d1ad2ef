//! OHLCV bar representation.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::error::BacksimError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    fn is_finite(&self) -> bool {
        self.open.is_finite()
            && self.high.is_finite()
            && self.low.is_finite()
            && self.close.is_finite()
    }
}

/// Check that a bar series is non-empty, strictly time-ordered and numerically sane.
pub fn validate_bars(bars: &[Bar]) -> Result<(), BacksimError> {
    if bars.is_empty() {
        return Err(BacksimError::InsufficientData { bars: 0, minimum: 1 });
    }

    for (index, bar) in bars.iter().enumerate() {
        if !bar.is_finite() {
            return Err(BacksimError::InvalidData {
                index,
                reason: "non-finite price".into(),
            });
        }
        if bar.low > bar.high {
            return Err(BacksimError::InvalidData {
                index,
                reason: format!("low {} above high {}", bar.low, bar.high),
            });
        }
    }

    for (i, pair) in bars.windows(2).enumerate() {
        if pair[1].timestamp <= pair[0].timestamp {
            let reason = if pair[1].timestamp == pair[0].timestamp {
                format!("duplicate timestamp {}", pair[1].timestamp)
            } else {
                format!(
                    "timestamp {} precedes {}",
                    pair[1].timestamp, pair[0].timestamp
                )
            };
            return Err(BacksimError::InvalidData {
                index: i + 1,
                reason,
            });
        }
    }

    Ok(())
}
