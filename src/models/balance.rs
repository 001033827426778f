//! Account balance valued in USDT terms.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One asset's free balance plus its valuation in USDT.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetBalance {
    pub symbol: String,

    /// Free quantity available for trading
    pub available: Decimal,

    /// `available` converted at the asset's last USDT price (1:1 for USDT)
    pub usdt_rate: Decimal,
}

impl AssetBalance {
    pub fn new(symbol: impl Into<String>, available: Decimal, usdt_rate: Decimal) -> Self {
        Self {
            symbol: symbol.into(),
            available,
            usdt_rate,
        }
    }
}

/// Sum of all balances in USDT terms.
pub fn total_usdt_rate(balances: &[AssetBalance]) -> Decimal {
    balances.iter().map(|b| b.usdt_rate).sum()
}

/// Drop dust positions below the minimum tradable USDT value.
pub fn filter_dust(balances: Vec<AssetBalance>, min_usdt_value: Decimal) -> Vec<AssetBalance> {
    balances
        .into_iter()
        .filter(|b| b.usdt_rate > min_usdt_value)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_total_and_dust_filter() {
        let balances = vec![
            AssetBalance::new("USDT", dec!(100), dec!(100)),
            AssetBalance::new("ETH", dec!(0.5), dec!(1000)),
            AssetBalance::new("SHIB", dec!(10), dec!(0.01)),
        ];

        assert_eq!(total_usdt_rate(&balances), dec!(1100.01));

        let kept = filter_dust(balances, dec!(10));
        let symbols: Vec<_> = kept.iter().map(|b| b.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["USDT", "ETH"]);
    }
}
