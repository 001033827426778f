//! Append-only trade ledger.
//!
//! One CSV row per cycle outcome. The file is recreated at process start;
//! `count` and the cumulative profit are process-wide running totals carried
//! across entries. Rows are never modified once written.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::info;

/// Fixed header, kept stable so ledger files stay comparable across runs.
const HEADERS: [&str; 11] = [
    "Count",
    "Date",
    "BTC / USDT price",
    "Token name",
    "24h price change %",
    "Trade",
    "Trade price",
    "Comission",
    "Profit %",
    "Profit total %",
    "Market average",
];

/// Numeric columns are persisted at this precision.
const PRECISION: u32 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeKind {
    Buy,
    Sell,
    Pass,
}

impl TradeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeKind::Buy => "BUY",
            TradeKind::Sell => "SELL",
            TradeKind::Pass => "PASS",
        }
    }
}

/// One recorded cycle outcome.
#[derive(Debug, Clone)]
pub struct LedgerEntry {
    pub count: u64,
    pub date: DateTime<Utc>,
    pub btc_usdt_price: Decimal,
    pub symbol: String,
    pub price_change_percent: Decimal,
    pub kind: TradeKind,
    pub trade_price: Option<Decimal>,
    pub commission: Decimal,
    pub profit_percent: Decimal,
    pub profit_total_percent: Decimal,
    pub market_average_price: Decimal,
}

/// Market context attached to every row.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarketContext {
    pub btc_usdt_price: Decimal,
    pub market_average_price: Decimal,
}

/// Append-only CSV trade ledger with running profit totals.
pub struct TradeLedger {
    path: PathBuf,
    commission_percent: Decimal,
    count: u64,
    profit_total: Decimal,
    last_price: Option<Decimal>,
}

impl TradeLedger {
    /// Create (truncating any previous file) and write the header row.
    pub fn create(path: impl AsRef<Path>, commission_percent: Decimal) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let file = File::create(&path)
            .with_context(|| format!("failed to create ledger file {}", path.display()))?;
        let mut writer = csv::Writer::from_writer(file);
        writer.write_record(HEADERS)?;
        writer.flush()?;

        info!(path = %path.display(), "Ledger file created");

        Ok(Self {
            path,
            commission_percent,
            count: 0,
            profit_total: Decimal::ZERO,
            last_price: None,
        })
    }

    pub fn profit_total(&self) -> Decimal {
        self.profit_total
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    /// Record an executed buy. Commission is charged; no price-delta profit
    /// is realized on entry.
    pub fn record_buy(
        &mut self,
        symbol: &str,
        price: Decimal,
        price_change_percent: Decimal,
        market: MarketContext,
    ) -> Result<LedgerEntry> {
        let profit_percent = -self.commission_percent;
        self.profit_total += profit_percent;
        self.last_price = Some(price);

        let entry = self.build_entry(
            TradeKind::Buy,
            symbol,
            Some(price),
            price_change_percent,
            price * self.commission_percent,
            profit_percent,
            market,
        );
        self.append(&entry)?;
        Ok(entry)
    }

    /// Record an executed sell. The previous recorded trade price is the
    /// entry price; without one the price-delta term is zero.
    pub fn record_sell(
        &mut self,
        symbol: &str,
        price: Decimal,
        price_change_percent: Decimal,
        market: MarketContext,
    ) -> Result<LedgerEntry> {
        let profit_percent = match self.last_price.filter(|p| !p.is_zero()) {
            Some(entry_price) => {
                (price - entry_price) / (entry_price / Decimal::from(100)) - self.commission_percent
            }
            None => -self.commission_percent,
        };
        self.profit_total += profit_percent;
        self.last_price = Some(price);

        let entry = self.build_entry(
            TradeKind::Sell,
            symbol,
            Some(price),
            price_change_percent,
            price * self.commission_percent,
            profit_percent,
            market,
        );
        self.append(&entry)?;
        Ok(entry)
    }

    /// Record a pass: informational only, totals unchanged.
    pub fn record_pass(
        &mut self,
        symbol: Option<&str>,
        price_change_percent: Decimal,
        market: MarketContext,
    ) -> Result<LedgerEntry> {
        let entry = self.build_entry(
            TradeKind::Pass,
            symbol.unwrap_or(""),
            None,
            price_change_percent,
            Decimal::ZERO,
            Decimal::ZERO,
            market,
        );
        self.append(&entry)?;
        Ok(entry)
    }

    #[allow(clippy::too_many_arguments)]
    fn build_entry(
        &mut self,
        kind: TradeKind,
        symbol: &str,
        trade_price: Option<Decimal>,
        price_change_percent: Decimal,
        commission: Decimal,
        profit_percent: Decimal,
        market: MarketContext,
    ) -> LedgerEntry {
        self.count += 1;
        LedgerEntry {
            count: self.count,
            date: Utc::now(),
            btc_usdt_price: market.btc_usdt_price,
            symbol: symbol.to_string(),
            price_change_percent,
            kind,
            trade_price,
            commission,
            profit_percent,
            profit_total_percent: self.profit_total,
            market_average_price: market.market_average_price,
        }
    }

    fn append(&self, entry: &LedgerEntry) -> Result<()> {
        let file = OpenOptions::new()
            .append(true)
            .open(&self.path)
            .with_context(|| format!("failed to open ledger file {}", self.path.display()))?;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);

        writer.write_record([
            entry.count.to_string(),
            entry.date.to_rfc3339(),
            entry.btc_usdt_price.round_dp(PRECISION).to_string(),
            entry.symbol.clone(),
            entry.price_change_percent.round_dp(PRECISION).to_string(),
            entry.kind.as_str().to_string(),
            entry
                .trade_price
                .map(|p| p.round_dp(PRECISION).to_string())
                .unwrap_or_default(),
            entry.commission.round_dp(PRECISION).to_string(),
            entry.profit_percent.round_dp(PRECISION).to_string(),
            entry.profit_total_percent.round_dp(PRECISION).to_string(),
            entry.market_average_price.round_dp(PRECISION).to_string(),
        ])?;
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::str::FromStr;

    fn market() -> MarketContext {
        MarketContext {
            btc_usdt_price: dec!(60000.12345),
            market_average_price: dec!(123.45678),
        }
    }

    fn temp_ledger(commission: Decimal) -> (tempfile::TempDir, TradeLedger) {
        let dir = tempfile::tempdir().unwrap();
        let ledger = TradeLedger::create(dir.path().join("trades.csv"), commission).unwrap();
        (dir, ledger)
    }

    #[test]
    fn test_create_truncates_previous_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trades.csv");

        let mut ledger = TradeLedger::create(&path, dec!(0.1)).unwrap();
        ledger
            .record_buy("ETH", dec!(2000), dec!(3), market())
            .unwrap();

        // Recreating starts the file and the totals over.
        let ledger = TradeLedger::create(&path, dec!(0.1)).unwrap();
        assert_eq!(ledger.count(), 0);
        assert_eq!(ledger.profit_total(), Decimal::ZERO);

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 1); // header only
        assert!(content.starts_with("Count,Date,BTC / USDT price"));
    }

    #[test]
    fn test_buy_then_sell_at_same_price_costs_two_commissions() {
        let commission = dec!(0.25);
        let (_dir, mut ledger) = temp_ledger(commission);

        ledger
            .record_buy("ETH", dec!(2000), dec!(3), market())
            .unwrap();
        assert_eq!(ledger.profit_total(), dec!(-0.25));

        ledger
            .record_sell("ETH", dec!(2000), dec!(1), market())
            .unwrap();
        assert_eq!(ledger.profit_total(), commission * dec!(-2));
    }

    #[test]
    fn test_sell_profit_uses_previous_trade_price() {
        let (_dir, mut ledger) = temp_ledger(dec!(0.1));

        ledger
            .record_buy("ETH", dec!(100), dec!(3), market())
            .unwrap();
        let entry = ledger
            .record_sell("ETH", dec!(110), dec!(1), market())
            .unwrap();

        // (110 - 100) / (100 / 100) - 0.1 = 9.9
        assert_eq!(entry.profit_percent, dec!(9.9));
        assert_eq!(ledger.profit_total(), dec!(9.8));
    }

    #[test]
    fn test_sell_without_prior_price_charges_commission_only() {
        let (_dir, mut ledger) = temp_ledger(dec!(0.1));

        let entry = ledger
            .record_sell("ETH", dec!(110), dec!(1), market())
            .unwrap();
        assert_eq!(entry.profit_percent, dec!(-0.1));
    }

    #[test]
    fn test_pass_leaves_totals_unchanged() {
        let (_dir, mut ledger) = temp_ledger(dec!(0.1));

        ledger
            .record_buy("ETH", dec!(2000), dec!(3), market())
            .unwrap();
        let before = ledger.profit_total();

        let entry = ledger
            .record_pass(Some("ETH"), dec!(-1.5), market())
            .unwrap();
        assert_eq!(entry.profit_percent, Decimal::ZERO);
        assert_eq!(entry.trade_price, None);
        assert_eq!(ledger.profit_total(), before);
        assert_eq!(entry.count, 2);
    }

    #[test]
    fn test_rows_round_trip_at_four_decimals() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trades.csv");
        let mut ledger = TradeLedger::create(&path, dec!(0.075)).unwrap();

        let buy = ledger
            .record_buy("ETH", dec!(1234.567891), dec!(2.718281), market())
            .unwrap();
        let sell = ledger
            .record_sell("ETH", dec!(1250.123456), dec!(-3.141592), market())
            .unwrap();

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 2);

        for (row, entry) in rows.iter().zip([&buy, &sell]) {
            assert_eq!(row[0].parse::<u64>().unwrap(), entry.count);
            assert_eq!(
                Decimal::from_str(&row[2]).unwrap(),
                entry.btc_usdt_price.round_dp(4)
            );
            assert_eq!(&row[3], entry.symbol.as_str());
            assert_eq!(
                Decimal::from_str(&row[4]).unwrap(),
                entry.price_change_percent.round_dp(4)
            );
            assert_eq!(&row[5], entry.kind.as_str());
            assert_eq!(
                Decimal::from_str(&row[6]).unwrap(),
                entry.trade_price.unwrap().round_dp(4)
            );
            assert_eq!(
                Decimal::from_str(&row[7]).unwrap(),
                entry.commission.round_dp(4)
            );
            assert_eq!(
                Decimal::from_str(&row[8]).unwrap(),
                entry.profit_percent.round_dp(4)
            );
            assert_eq!(
                Decimal::from_str(&row[9]).unwrap(),
                entry.profit_total_percent.round_dp(4)
            );
            assert_eq!(
                Decimal::from_str(&row[10]).unwrap(),
                entry.market_average_price.round_dp(4)
            );
        }
    }
}
