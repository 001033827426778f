//! Signal strategies: turn a normalized market snapshot plus the position
//! state into a buy/sell decision.
//!
//! The four strategies share the same plumbing (candidate eligibility, sell
//! detection, market-average reference price) and differ only in how they
//! rank buy candidates. `simple` is the odd one out: it targets one fixed
//! symbol and exits every cycle, which makes it useful mainly for smoke
//! testing the whole pipeline.

use std::collections::HashSet;

use rust_decimal::Decimal;
use tracing::debug;

use crate::error::{BotError, BotResult};
use crate::models::{PositionState, TickerSnapshot};
use crate::trading::{StrategyKind, TradingConfig};

/// Outcome of one strategy evaluation.
#[derive(Debug, Clone)]
pub struct SignalResult {
    /// Candidate to enter, when one qualifies
    pub buy: Option<TickerSnapshot>,

    /// Snapshot entry for the currently held symbol, when holding
    pub sell: Option<TickerSnapshot>,

    pub is_buy_signal: bool,
    pub is_sell_signal: bool,

    /// BTC/USDT reference price at evaluation time
    pub btc_usdt_price: Decimal,

    /// Market-wide average of tradable last prices, with the BTC price
    /// subtracted from the sum before dividing. The subtraction (rather than
    /// exclusion) is intentional and kept for parity with the recorded
    /// ledger history.
    pub market_average_price: Decimal,
}

/// Evaluates the configured strategy against a market snapshot.
pub struct SignalEngine {
    strategy: StrategyKind,
    target_symbol: Option<String>,
    change_percent: Decimal,
}

impl SignalEngine {
    pub fn new(config: &TradingConfig) -> Self {
        Self {
            strategy: config.strategy,
            target_symbol: config.target_symbol.clone(),
            change_percent: config.change_percent,
        }
    }

    pub fn strategy(&self) -> StrategyKind {
        self.strategy
    }

    /// Evaluate one cycle. `tradable` holds the ticker names the exchange
    /// currently allows spot trading on.
    pub fn evaluate(
        &self,
        snapshot: &[TickerSnapshot],
        tradable: &HashSet<String>,
        state: &PositionState,
        btc_usdt_price: Decimal,
    ) -> BotResult<SignalResult> {
        let market_average_price = market_average(snapshot, tradable, btc_usdt_price);

        let buy = match self.strategy {
            StrategyKind::Simple => self.find_target(snapshot),
            StrategyKind::Pump => {
                let ranked = self.ranked_candidates(snapshot, tradable, state);
                ranked
                    .into_iter()
                    .filter(|t| t.price_change_percent > self.change_percent)
                    .last()
                    .cloned()
            }
            StrategyKind::Dump => {
                let ranked = self.ranked_candidates(snapshot, tradable, state);
                ranked.into_iter().last().cloned()
            }
            StrategyKind::Flat => {
                let ranked = self.ranked_candidates(snapshot, tradable, state);
                ranked
                    .into_iter()
                    .find(|t| t.price_change_percent < Decimal::ZERO)
                    .cloned()
            }
        };

        if self.strategy == StrategyKind::Simple && state.is_flat() && buy.is_none() {
            return Err(BotError::data(format!(
                "target symbol {:?} not present in market snapshot",
                self.target_symbol
            )));
        }

        let sell = state
            .current_symbol()
            .map(|held| {
                snapshot
                    .iter()
                    .find(|t| t.primary_symbol == held)
                    .cloned()
                    .ok_or_else(|| {
                        BotError::data(format!("held symbol {held} missing from market snapshot"))
                    })
            })
            .transpose()?;

        let is_buy_signal = state.is_flat() && buy.is_some();
        let is_sell_signal = match self.strategy {
            StrategyKind::Simple => true,
            _ => price_dropped_since_last_check(state, sell.as_ref()),
        };

        debug!(
            strategy = self.strategy.as_str(),
            buy = buy.as_ref().map(|t| t.primary_symbol.as_str()),
            sell = sell.as_ref().map(|t| t.primary_symbol.as_str()),
            is_buy_signal,
            is_sell_signal,
            "evaluated signals"
        );

        Ok(SignalResult {
            buy,
            sell,
            is_buy_signal,
            is_sell_signal,
            btc_usdt_price,
            market_average_price,
        })
    }

    /// Eligible candidates ranked by 24h change, best first: actively
    /// tradable, not the last-traded symbol, not the held symbol.
    fn ranked_candidates<'a>(
        &self,
        snapshot: &'a [TickerSnapshot],
        tradable: &HashSet<String>,
        state: &PositionState,
    ) -> Vec<&'a TickerSnapshot> {
        let mut candidates: Vec<&TickerSnapshot> = snapshot
            .iter()
            .filter(|t| tradable.contains(&t.ticker_name))
            .filter(|t| t.primary_symbol != state.last_trade().symbol)
            .filter(|t| Some(t.primary_symbol.as_str()) != state.current_symbol())
            .collect();

        candidates.sort_by(|a, b| b.price_change_percent.cmp(&a.price_change_percent));
        candidates
    }

    fn find_target(&self, snapshot: &[TickerSnapshot]) -> Option<TickerSnapshot> {
        let target = self.target_symbol.as_deref()?;
        snapshot
            .iter()
            .find(|t| t.primary_symbol == target)
            .cloned()
    }
}

/// Sell when the held symbol's price dropped since the previous check.
fn price_dropped_since_last_check(
    state: &PositionState,
    sell: Option<&TickerSnapshot>,
) -> bool {
    let Some(sell) = sell else {
        return false;
    };
    let last_check = state.last_check();

    Some(last_check.symbol.as_str()) == state.current_symbol()
        && last_check
            .price
            .map_or(false, |prior| sell.last_price < prior)
}

/// Average of tradable last prices with the BTC/USDT price subtracted from
/// the sum, not excluded from the set.
fn market_average(
    snapshot: &[TickerSnapshot],
    tradable: &HashSet<String>,
    btc_usdt_price: Decimal,
) -> Decimal {
    let prices: Vec<Decimal> = snapshot
        .iter()
        .filter(|t| tradable.contains(&t.ticker_name))
        .map(|t| t.last_price)
        .collect();

    if prices.is_empty() {
        return Decimal::ZERO;
    }

    let sum: Decimal = prices.iter().sum();
    (sum - btc_usdt_price) / Decimal::from(prices.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn snap(primary: &str, last_price: Decimal, change: Decimal) -> TickerSnapshot {
        TickerSnapshot {
            primary_symbol: primary.to_string(),
            secondary_symbol: "USDT".to_string(),
            ticker_name: format!("{primary}USDT"),
            last_price,
            price_change_percent: change,
            open_time: 0,
            close_time: 0,
        }
    }

    fn tradable(snapshot: &[TickerSnapshot]) -> HashSet<String> {
        snapshot.iter().map(|t| t.ticker_name.clone()).collect()
    }

    fn engine(strategy: StrategyKind) -> SignalEngine {
        SignalEngine::new(&TradingConfig {
            strategy,
            target_symbol: Some("AAA".to_string()),
            change_percent: dec!(5),
            ..Default::default()
        })
    }

    #[test]
    fn test_pump_picks_least_extreme_qualifier() {
        let snapshot = vec![
            snap("AAA", dec!(10), dec!(12)),
            snap("BBB", dec!(20), dec!(8)),
            snap("CCC", dec!(30), dec!(6)),
            snap("DDD", dec!(40), dec!(-3)),
        ];
        let state = PositionState::new("USDT");

        let result = engine(StrategyKind::Pump)
            .evaluate(&snapshot, &tradable(&snapshot), &state, dec!(0))
            .unwrap();

        // 12, 8 and 6 qualify above the 5% threshold; the reversed tie-break
        // selects the least extreme mover.
        assert_eq!(result.buy.unwrap().primary_symbol, "CCC");
        assert!(result.is_buy_signal);
        assert!(!result.is_sell_signal);
    }

    #[test]
    fn test_pump_no_qualifier_means_no_buy() {
        let snapshot = vec![
            snap("AAA", dec!(10), dec!(4)),
            snap("BBB", dec!(20), dec!(-2)),
        ];
        let state = PositionState::new("USDT");

        let result = engine(StrategyKind::Pump)
            .evaluate(&snapshot, &tradable(&snapshot), &state, dec!(0))
            .unwrap();

        assert!(result.buy.is_none());
        assert!(!result.is_buy_signal);
    }

    #[test]
    fn test_dump_picks_lowest_change() {
        let snapshot = vec![
            snap("AAA", dec!(10), dec!(12)),
            snap("BBB", dec!(20), dec!(-7)),
            snap("CCC", dec!(30), dec!(2)),
        ];
        let state = PositionState::new("USDT");

        let result = engine(StrategyKind::Dump)
            .evaluate(&snapshot, &tradable(&snapshot), &state, dec!(0))
            .unwrap();

        assert_eq!(result.buy.unwrap().primary_symbol, "BBB");
    }

    #[test]
    fn test_flat_picks_highest_negative_change() {
        let snapshot = vec![
            snap("AAA", dec!(10), dec!(12)),
            snap("BBB", dec!(20), dec!(-7)),
            snap("CCC", dec!(30), dec!(-1)),
        ];
        let state = PositionState::new("USDT");

        let result = engine(StrategyKind::Flat)
            .evaluate(&snapshot, &tradable(&snapshot), &state, dec!(0))
            .unwrap();

        assert_eq!(result.buy.unwrap().primary_symbol, "CCC");
    }

    #[test]
    fn test_candidates_exclude_last_trade_held_and_untradable() {
        let snapshot = vec![
            snap("AAA", dec!(10), dec!(12)),
            snap("BBB", dec!(20), dec!(8)),
            snap("CCC", dec!(30), dec!(6)),
        ];
        // AAA was the last trade: buy it, sell it again.
        let mut state = PositionState::new("USDT");
        state.record_buy("AAA", dec!(10)).unwrap();
        state.record_sell("USDT").unwrap();

        // BBB is not currently tradable.
        let mut tradable = tradable(&snapshot);
        tradable.remove("BBBUSDT");

        let result = engine(StrategyKind::Dump)
            .evaluate(&snapshot, &tradable, &state, dec!(0))
            .unwrap();

        assert_eq!(result.buy.unwrap().primary_symbol, "CCC");
    }

    #[test]
    fn test_sell_signal_fires_on_price_drop() {
        let state = {
            let mut s = PositionState::new("USDT");
            s.record_buy("XXX", dec!(100)).unwrap();
            s
        };
        let tradable_set = tradable(&[snap("XXX", dec!(0), dec!(0))]);

        let dropped = vec![snap("XXX", dec!(95), dec!(-1))];
        let result = engine(StrategyKind::Pump)
            .evaluate(&dropped, &tradable_set, &state, dec!(0))
            .unwrap();
        assert!(result.is_sell_signal);
        assert_eq!(result.sell.unwrap().primary_symbol, "XXX");

        let rose = vec![snap("XXX", dec!(105), dec!(1))];
        let result = engine(StrategyKind::Pump)
            .evaluate(&rose, &tradable_set, &state, dec!(0))
            .unwrap();
        assert!(!result.is_sell_signal);
    }

    #[test]
    fn test_missing_sell_candidate_while_holding_is_error() {
        let mut state = PositionState::new("USDT");
        state.record_buy("GONE", dec!(50)).unwrap();

        let snapshot = vec![snap("AAA", dec!(10), dec!(2))];
        let err = engine(StrategyKind::Pump)
            .evaluate(&snapshot, &tradable(&snapshot), &state, dec!(0))
            .unwrap_err();

        assert!(matches!(err, BotError::Data(_)));
    }

    #[test]
    fn test_simple_buys_target_and_always_sells() {
        let snapshot = vec![
            snap("AAA", dec!(10), dec!(-42)),
            snap("BBB", dec!(20), dec!(99)),
        ];
        let flat_state = PositionState::new("USDT");

        // Flat: buy the configured target regardless of its change percent.
        let result = engine(StrategyKind::Simple)
            .evaluate(&snapshot, &tradable(&snapshot), &flat_state, dec!(0))
            .unwrap();
        assert!(result.is_buy_signal);
        assert_eq!(result.buy.unwrap().primary_symbol, "AAA");

        // Holding: sell signal is unconditional.
        let mut holding = PositionState::new("USDT");
        holding.record_buy("AAA", dec!(10)).unwrap();
        let result = engine(StrategyKind::Simple)
            .evaluate(&snapshot, &tradable(&snapshot), &holding, dec!(0))
            .unwrap();
        assert!(result.is_sell_signal);
    }

    #[test]
    fn test_market_average_subtracts_btc_price_from_sum() {
        let snapshot = vec![
            snap("BTC", dec!(60000), dec!(1)),
            snap("AAA", dec!(300), dec!(2)),
            snap("BBB", dec!(600), dec!(3)),
        ];
        let state = PositionState::new("USDT");

        let result = engine(StrategyKind::Dump)
            .evaluate(&snapshot, &tradable(&snapshot), &state, dec!(60000))
            .unwrap();

        // (60000 + 300 + 600 - 60000) / 3, BTC stays in the denominator.
        assert_eq!(result.market_average_price, dec!(300));
    }
}
