//! Trading configuration.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Which signal strategy drives entries and exits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    /// Always trade the one configured primary symbol; exits every cycle
    Simple,
    /// Chase upward movers above a change-percent threshold
    Pump,
    /// Buy the deepest 24h loser
    Dump,
    /// Mean-reversion off the shallowest negative mover
    Flat,
}

impl StrategyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::Simple => "simple",
            StrategyKind::Pump => "pump",
            StrategyKind::Dump => "dump",
            StrategyKind::Flat => "flat",
        }
    }
}

/// How buy orders are sized.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SizingMode {
    /// Spend a fixed notional amount of the quote asset
    FixedValue(Decimal),
    /// Spend a percentage of the quote-asset balance
    FixedPercent(Decimal),
}

/// Configuration for the trading loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradingConfig {
    /// Quote/settlement asset (e.g. "USDT")
    pub secondary_symbol: String,

    /// Selected signal strategy
    pub strategy: StrategyKind,

    /// Target primary symbol for the `simple` strategy
    pub target_symbol: Option<String>,

    /// Evaluation cadence while holding a position
    pub heartbeat_interval: Duration,

    /// Evaluation cadence while flat
    pub next_trade_delay: Duration,

    /// Buy order sizing mode
    pub sizing: SizingMode,

    /// 24h change threshold for the `pump` strategy, in percent
    pub change_percent: Decimal,

    /// Balances below this USDT value are treated as dust
    pub min_trade_usd_value: Decimal,

    /// Commission charged per trade, in percent
    pub commission_percent: Decimal,

    /// Paper trading: simulate fills instead of placing orders
    pub paper: bool,
}

impl TradingConfig {
    /// Validate cross-field constraints that clap cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.strategy == StrategyKind::Simple && self.target_symbol.is_none() {
            bail!("the simple strategy requires a target primary symbol");
        }
        match self.sizing {
            SizingMode::FixedValue(v) if v <= Decimal::ZERO => {
                bail!("fixed trade value must be positive")
            }
            SizingMode::FixedPercent(p) if p <= Decimal::ZERO || p > dec!(100) => {
                bail!("fixed trade percent must be in (0, 100]")
            }
            _ => Ok(()),
        }
    }
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            secondary_symbol: "USDT".to_string(),
            strategy: StrategyKind::Simple,
            target_symbol: None,
            heartbeat_interval: Duration::from_secs(60),
            next_trade_delay: Duration::from_secs(60),
            sizing: SizingMode::FixedPercent(dec!(100)),
            change_percent: Decimal::ZERO,
            min_trade_usd_value: dec!(10),
            commission_percent: dec!(0.075),
            paper: true,
        }
    }
}

/// Parse a compact interval: an integer in 1..=60 followed by `s`, `m` or `h`.
pub fn parse_interval(input: &str) -> Result<Duration> {
    let (value, unit) = input.split_at(input.len().saturating_sub(1));
    let value: u64 = value
        .parse()
        .with_context(|| format!("invalid interval format: {input:?}"))?;

    if !(1..=60).contains(&value) {
        bail!("interval value out of range (1-60): {input:?}");
    }

    let secs = match unit {
        "s" => value,
        "m" => value * 60,
        "h" => value * 60 * 60,
        _ => bail!("invalid interval unit (expected s, m or h): {input:?}"),
    };

    Ok(Duration::from_secs(secs))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_interval_units() {
        assert_eq!(parse_interval("45s").unwrap(), Duration::from_secs(45));
        assert_eq!(parse_interval("1m").unwrap(), Duration::from_secs(60));
        assert_eq!(parse_interval("2h").unwrap(), Duration::from_secs(7200));
        assert_eq!(parse_interval("60m").unwrap(), Duration::from_secs(3600));
    }

    #[test]
    fn test_parse_interval_rejects_bad_input() {
        assert!(parse_interval("0m").is_err());
        assert!(parse_interval("61m").is_err());
        assert!(parse_interval("5x").is_err());
        assert!(parse_interval("m").is_err());
        assert!(parse_interval("").is_err());
        assert!(parse_interval("1.5m").is_err());
    }

    #[test]
    fn test_validate_simple_needs_target() {
        let config = TradingConfig {
            strategy: StrategyKind::Simple,
            target_symbol: None,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = TradingConfig {
            target_symbol: Some("ETH".to_string()),
            ..config
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_sizing_bounds() {
        let config = TradingConfig {
            strategy: StrategyKind::Pump,
            sizing: SizingMode::FixedPercent(dec!(150)),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = TradingConfig {
            sizing: SizingMode::FixedValue(dec!(0)),
            ..config
        };
        assert!(config.validate().is_err());
    }
}
