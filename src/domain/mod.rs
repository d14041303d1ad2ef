//! Core domain types and logic.

pub mod ohlcv;
pub mod signal;
pub mod position;
pub mod portfolio;
pub mod execution;
pub mod backtest;
pub mod metrics;
pub mod calendar;
pub mod monte_carlo;
pub mod report;
pub mod strategy;
pub mod config_validation;
pub mod error;
