//! Market snapshot normalization: raw 24h ticker statistics into a uniform,
//! filtered record set.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::api::types::Ticker24h;
use crate::error::{BotError, BotResult};

/// One symbol's latest 24h window, normalized for strategy evaluation.
///
/// Immutable once constructed; a full cycle produces a fresh ordered sequence
/// of these, one per eligible symbol.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TickerSnapshot {
    /// The tradable asset (e.g. "ETH")
    pub primary_symbol: String,

    /// The quote asset balances are denominated in (e.g. "USDT")
    pub secondary_symbol: String,

    /// Combined ticker name as the exchange knows it (e.g. "ETHUSDT")
    pub ticker_name: String,

    /// Last traded price in the 24h window
    pub last_price: Decimal,

    /// 24h price change in percent
    pub price_change_percent: Decimal,

    /// Window open, milliseconds since epoch
    pub open_time: i64,

    /// Window close, milliseconds since epoch
    pub close_time: i64,
}

/// Normalize raw per-symbol 24h statistics.
///
/// Keeps only tickers quoted in `secondary`, drops leveraged-token primaries
/// (suffix "UP"/"DOWN"), and parses numeric fields strictly. A malformed
/// numeric field is a data error — silently coercing to zero has produced
/// unintended trades.
pub fn normalize_tickers(raw: &[Ticker24h], secondary: &str) -> BotResult<Vec<TickerSnapshot>> {
    let mut snapshots = Vec::with_capacity(raw.len());

    for stats in raw {
        if !stats.symbol.ends_with(secondary) {
            continue;
        }

        let primary = stats
            .symbol
            .split(secondary)
            .next()
            .unwrap_or_default()
            .to_string();

        if primary.ends_with("UP") || primary.ends_with("DOWN") {
            continue;
        }

        let last_price = parse_decimal(&stats.last_price, &stats.symbol, "lastPrice")?;
        let price_change_percent = parse_decimal(
            &stats.price_change_percent,
            &stats.symbol,
            "priceChangePercent",
        )?;

        snapshots.push(TickerSnapshot {
            primary_symbol: primary,
            secondary_symbol: secondary.to_string(),
            ticker_name: stats.symbol.clone(),
            last_price,
            price_change_percent,
            open_time: stats.open_time,
            close_time: stats.close_time,
        });
    }

    Ok(snapshots)
}

fn parse_decimal(value: &str, symbol: &str, field: &str) -> BotResult<Decimal> {
    Decimal::from_str(value)
        .map_err(|e| BotError::data(format!("{symbol}: bad {field} {value:?}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn raw(symbol: &str, last_price: &str, change: &str) -> Ticker24h {
        Ticker24h {
            symbol: symbol.to_string(),
            last_price: last_price.to_string(),
            price_change_percent: change.to_string(),
            open_time: 1_700_000_000_000,
            close_time: 1_700_086_400_000,
        }
    }

    #[test]
    fn test_filters_quote_and_leveraged_symbols() {
        let input = vec![
            raw("ETHUSDT", "2000.5", "3.2"),
            raw("ETHBTC", "0.05", "1.0"),
            raw("BTCUPUSDT", "12.0", "8.0"),
            raw("BTCDOWNUSDT", "4.0", "-8.0"),
            raw("SOLUSDT", "150.0", "-2.4"),
        ];

        let out = normalize_tickers(&input, "USDT").unwrap();

        let names: Vec<_> = out.iter().map(|t| t.ticker_name.as_str()).collect();
        assert_eq!(names, vec!["ETHUSDT", "SOLUSDT"]);

        for snap in &out {
            assert!(snap.ticker_name.ends_with("USDT"));
            assert!(!snap.primary_symbol.ends_with("UP"));
            assert!(!snap.primary_symbol.ends_with("DOWN"));
        }

        assert_eq!(out[0].primary_symbol, "ETH");
        assert_eq!(out[0].last_price, dec!(2000.5));
        assert_eq!(out[1].price_change_percent, dec!(-2.4));
    }

    #[test]
    fn test_malformed_price_fails_fast() {
        let input = vec![raw("ETHUSDT", "not-a-number", "3.2")];

        let err = normalize_tickers(&input, "USDT").unwrap_err();
        assert!(matches!(err, BotError::Data(_)));
        assert!(err.to_string().contains("lastPrice"));
    }

    #[test]
    fn test_malformed_change_percent_fails_fast() {
        let input = vec![raw("ETHUSDT", "2000.5", "")];

        let err = normalize_tickers(&input, "USDT").unwrap_err();
        assert!(matches!(err, BotError::Data(_)));
    }
}
