//! Bar feed port trait.

use std::path::Path;

use crate::domain::error::BacksimError;
use crate::domain::ohlcv::Bar;

pub trait DataPort {
    /// Load a time-ordered bar series.
    fn load_bars(&self, path: &Path) -> Result<Vec<Bar>, BacksimError>;

    /// Bar count with the first and last timestamps, or `None` when empty.
    fn describe(
        &self,
        path: &Path,
    ) -> Result<Option<(chrono::NaiveDateTime, chrono::NaiveDateTime, usize)>, BacksimError> {
        let bars = self.load_bars(path)?;
        Ok(match (bars.first(), bars.last()) {
            (Some(first), Some(last)) => Some((first.timestamp, last.timestamp, bars.len())),
            _ => None,
        })
    }
}
