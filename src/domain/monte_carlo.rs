//! Monte Carlo resampling of realized trade outcomes.
//!
//! Each trial replays the trade PnLs in a random order and walks the
//! resulting equity path. The ordering does not change the final value but
//! does change the path, so the interesting spread is in drawdown and
//! worst-equity, reported when risk-of-ruin analysis is requested.

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Summary statistics of one sampled quantity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Distribution {
    pub mean: f64,
    /// Sample standard deviation.
    pub std: f64,
    pub min: f64,
    pub max: f64,
    pub p5: f64,
    pub p95: f64,
}

impl Distribution {
    /// `None` for an empty sample.
    pub fn from_values(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }

        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);
        let min = sorted[0];
        let max = sorted[sorted.len() - 1];

        if min == max {
            return Some(Distribution {
                mean: min,
                std: 0.0,
                min,
                max,
                p5: min,
                p95: max,
            });
        }

        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let std = if values.len() > 1 {
            (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0)).sqrt()
        } else {
            0.0
        };

        Some(Distribution {
            mean,
            std,
            min,
            max,
            p5: percentile(&sorted, 5.0),
            p95: percentile(&sorted, 95.0),
        })
    }
}

/// Linearly interpolated percentile of an ascending, non-empty slice.
pub fn percentile(sorted: &[f64], pct: f64) -> f64 {
    if sorted.len() == 1 {
        return sorted[0];
    }
    let rank = (pct / 100.0).clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let weight = rank - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * weight
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskOfRuin {
    /// Fraction of initial capital at or below which a trial counts as ruined.
    pub ruin_threshold: f64,
    pub probability_of_ruin: f64,
    /// Max drawdown in dollars of every trial, in trial order.
    pub max_drawdowns: Vec<f64>,
    pub max_drawdown: Distribution,
    pub max_drawdown_percent: Distribution,
    pub worst_equity: Distribution,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonteCarloSummary {
    pub samples: usize,
    pub trade_count: usize,
    /// Base seed the trials were derived from.
    pub seed: u64,
    pub final_capital: Distribution,
    pub risk: Option<RiskOfRuin>,
}

#[derive(Debug, Clone, Copy)]
struct TrialOutcome {
    final_capital: f64,
    worst_equity: f64,
    max_drawdown: f64,
    max_drawdown_percent: f64,
}

fn run_trial(pnls: &[f64], initial_capital: f64, final_capital: f64, seed: u64) -> TrialOutcome {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut order = pnls.to_vec();
    order.shuffle(&mut rng);

    let mut equity = initial_capital;
    let mut peak = initial_capital;
    let mut worst_equity = initial_capital;
    let mut max_drawdown = 0.0_f64;
    let mut max_drawdown_percent = 0.0_f64;

    for pnl in order {
        equity += pnl;
        worst_equity = worst_equity.min(equity);
        if equity > peak {
            peak = equity;
            continue;
        }
        let drawdown = peak - equity;
        max_drawdown = max_drawdown.max(drawdown);
        if peak > 0.0 {
            max_drawdown_percent = max_drawdown_percent.max((drawdown / peak * 100.0).min(100.0));
        }
    }

    TrialOutcome {
        final_capital,
        worst_equity,
        max_drawdown,
        max_drawdown_percent,
    }
}

/// Builder-style resampler over a fixed number of trials.
#[derive(Debug, Clone)]
pub struct MonteCarloResampler {
    samples: usize,
    initial_capital: f64,
    seed: Option<u64>,
    ruin_threshold: Option<f64>,
}

impl MonteCarloResampler {
    pub fn new(samples: usize, initial_capital: f64) -> Self {
        MonteCarloResampler {
            samples,
            initial_capital,
            seed: None,
            ruin_threshold: None,
        }
    }

    /// Make the trials reproducible.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Also report drawdown distributions and the probability that a
    /// trial's equity falls to `initial_capital * fraction` or below.
    pub fn with_ruin_threshold(mut self, fraction: f64) -> Self {
        self.ruin_threshold = Some(fraction);
        self
    }

    /// `None` when there are no trades or no trials to run.
    pub fn run(&self, trade_pnls: &[f64]) -> Option<MonteCarloSummary> {
        if trade_pnls.is_empty() || self.samples == 0 {
            return None;
        }

        let seed = self.seed.unwrap_or_else(rand::random);
        let initial_capital = self.initial_capital;
        let final_capital = initial_capital + trade_pnls.iter().sum::<f64>();

        info!(
            samples = self.samples,
            trades = trade_pnls.len(),
            seed,
            "starting Monte Carlo resampling"
        );

        let outcomes: Vec<TrialOutcome> = (0..self.samples)
            .into_par_iter()
            .map(|trial| {
                run_trial(
                    trade_pnls,
                    initial_capital,
                    final_capital,
                    seed.wrapping_add(trial as u64),
                )
            })
            .collect();

        let finals: Vec<f64> = outcomes.iter().map(|o| o.final_capital).collect();
        let final_distribution = Distribution::from_values(&finals)?;

        let risk = match self.ruin_threshold {
            Some(threshold) => Some(self.risk_of_ruin(&outcomes, threshold)?),
            None => None,
        };

        if let Some(r) = &risk {
            debug!(
                probability_of_ruin = r.probability_of_ruin,
                p95_drawdown = r.max_drawdown.p95,
                "risk of ruin computed"
            );
        }
        info!(mean_final = final_distribution.mean, "Monte Carlo resampling complete");

        Some(MonteCarloSummary {
            samples: self.samples,
            trade_count: trade_pnls.len(),
            seed,
            final_capital: final_distribution,
            risk,
        })
    }

    fn risk_of_ruin(&self, outcomes: &[TrialOutcome], threshold: f64) -> Option<RiskOfRuin> {
        let ruin_level = self.initial_capital * threshold;
        let max_drawdowns: Vec<f64> = outcomes.iter().map(|o| o.max_drawdown).collect();
        let percents: Vec<f64> = outcomes.iter().map(|o| o.max_drawdown_percent).collect();
        let worst: Vec<f64> = outcomes.iter().map(|o| o.worst_equity).collect();
        let ruined = worst.iter().filter(|w| **w <= ruin_level).count();

        Some(RiskOfRuin {
            ruin_threshold: threshold,
            probability_of_ruin: ruined as f64 / outcomes.len() as f64,
            max_drawdown: Distribution::from_values(&max_drawdowns)?,
            max_drawdown_percent: Distribution::from_values(&percents)?,
            worst_equity: Distribution::from_values(&worst)?,
            max_drawdowns,
        })
    }
}

/// Resample `trade_pnls` over `samples` trials.
pub fn resample(
    trade_pnls: &[f64],
    samples: usize,
    initial_capital: f64,
    seed: Option<u64>,
) -> Option<MonteCarloSummary> {
    let mut resampler = MonteCarloResampler::new(samples, initial_capital);
    if let Some(seed) = seed {
        resampler = resampler.with_seed(seed);
    }
    resampler.run(trade_pnls)
}
