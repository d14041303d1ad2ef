//! Configuration validation.
//!
//! Checks raw INI values before any typed config is built.

use crate::domain::error::BacksimError;
use crate::ports::config_port::ConfigPort;

fn invalid(section: &str, key: &str, reason: &str) -> BacksimError {
    BacksimError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

pub fn validate_simulation_config(config: &dyn ConfigPort) -> Result<(), BacksimError> {
    validate_initial_capital(config)?;
    validate_position_size(config)?;
    validate_max_open_positions(config)?;
    validate_costs(config)?;
    validate_risk_free_rate(config)?;
    validate_periods_per_year(config)?;
    Ok(())
}

pub fn validate_monte_carlo_config(config: &dyn ConfigPort) -> Result<(), BacksimError> {
    let samples = config.get_int("monte_carlo", "samples", 1000);
    if samples < 1 {
        return Err(invalid("monte_carlo", "samples", "samples must be at least 1"));
    }
    let threshold = config.get_double("monte_carlo", "ruin_threshold", 0.5);
    if !(threshold > 0.0 && threshold <= 1.0) {
        return Err(invalid(
            "monte_carlo",
            "ruin_threshold",
            "ruin_threshold must be in (0, 1]",
        ));
    }
    if let Some(seed) = config.get_string("monte_carlo", "seed") {
        if seed.trim().parse::<u64>().is_err() {
            return Err(invalid(
                "monte_carlo",
                "seed",
                "seed must be a non-negative integer",
            ));
        }
    }
    Ok(())
}

pub fn validate_strategy_config(config: &dyn ConfigPort) -> Result<(), BacksimError> {
    let kind = config
        .get_string("strategy", "type")
        .unwrap_or_else(|| "buy_and_hold".to_string());
    match kind.trim() {
        "buy_and_hold" => {}
        "ma_cross" => validate_periods(config)?,
        _ => {
            return Err(invalid(
                "strategy",
                "type",
                "type must be ma_cross or buy_and_hold",
            ));
        }
    }
    validate_stop_loss(config)?;
    validate_take_profit(config)?;
    Ok(())
}

fn validate_initial_capital(config: &dyn ConfigPort) -> Result<(), BacksimError> {
    let value = config.get_double("simulation", "initial_capital", 0.0);
    if !(value.is_finite() && value > 0.0) {
        return Err(invalid(
            "simulation",
            "initial_capital",
            "initial_capital must be positive",
        ));
    }
    Ok(())
}

fn validate_position_size(config: &dyn ConfigPort) -> Result<(), BacksimError> {
    let value = config.get_double("simulation", "position_size", 0.25);
    if value <= 0.0 || value > 1.0 {
        return Err(invalid(
            "simulation",
            "position_size",
            "position_size must be in (0, 1]",
        ));
    }
    Ok(())
}

fn validate_max_open_positions(config: &dyn ConfigPort) -> Result<(), BacksimError> {
    let value = config.get_int("simulation", "max_open_positions", 1);
    if value < 1 {
        return Err(invalid(
            "simulation",
            "max_open_positions",
            "max_open_positions must be at least 1",
        ));
    }
    Ok(())
}

fn validate_costs(config: &dyn ConfigPort) -> Result<(), BacksimError> {
    for key in ["slippage", "commission"] {
        let value = config.get_double("simulation", key, 0.0);
        if !(value.is_finite() && value >= 0.0) {
            return Err(invalid("simulation", key, "must be non-negative"));
        }
    }
    Ok(())
}

fn validate_risk_free_rate(config: &dyn ConfigPort) -> Result<(), BacksimError> {
    let value = config.get_double("simulation", "risk_free_rate", 0.0);
    if !value.is_finite() {
        return Err(invalid(
            "simulation",
            "risk_free_rate",
            "risk_free_rate must be finite",
        ));
    }
    Ok(())
}

fn validate_periods_per_year(config: &dyn ConfigPort) -> Result<(), BacksimError> {
    let value = config.get_double("simulation", "periods_per_year", 252.0);
    if !(value.is_finite() && value > 0.0) {
        return Err(invalid(
            "simulation",
            "periods_per_year",
            "periods_per_year must be positive",
        ));
    }
    Ok(())
}

fn validate_periods(config: &dyn ConfigPort) -> Result<(), BacksimError> {
    let fast = config.get_int("strategy", "fast", 10);
    let slow = config.get_int("strategy", "slow", 30);
    if fast < 1 {
        return Err(invalid("strategy", "fast", "fast must be at least 1"));
    }
    if slow <= fast {
        return Err(invalid("strategy", "slow", "slow must be greater than fast"));
    }
    Ok(())
}

fn validate_stop_loss(config: &dyn ConfigPort) -> Result<(), BacksimError> {
    let value = config.get_double("strategy", "stop_loss_pct", 0.0);
    if !(0.0..100.0).contains(&value) {
        return Err(invalid(
            "strategy",
            "stop_loss_pct",
            "stop_loss_pct must be in [0, 100)",
        ));
    }
    Ok(())
}

fn validate_take_profit(config: &dyn ConfigPort) -> Result<(), BacksimError> {
    let value = config.get_double("strategy", "take_profit_pct", 0.0);
    if !(value.is_finite() && value >= 0.0) {
        return Err(invalid(
            "strategy",
            "take_profit_pct",
            "take_profit_pct must be non-negative",
        ));
    }
    Ok(())
}
