//! Single-position state machine.
//!
//! The bot holds at most one non-quote asset at a time. This struct is the
//! only mutable trading state in the process; the heartbeat loop advances it
//! exactly once per cycle, after the cycle's order outcome is known.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::{BotError, BotResult};

/// A symbol paired with the price it was last seen at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolPrice {
    pub symbol: String,
    pub price: Option<Decimal>,
}

/// Tracks what is currently held plus the last-trade/last-check memory the
/// strategies use to detect a price drop since the prior cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionState {
    current_symbol: Option<String>,
    last_trade: SymbolPrice,
    last_check: SymbolPrice,
}

impl PositionState {
    /// Fresh flat state, seeded to the quote symbol with no price.
    pub fn new(secondary_symbol: &str) -> Self {
        let seed = SymbolPrice {
            symbol: secondary_symbol.to_string(),
            price: None,
        };
        Self {
            current_symbol: None,
            last_trade: seed.clone(),
            last_check: seed,
        }
    }

    pub fn is_flat(&self) -> bool {
        self.current_symbol.is_none()
    }

    pub fn current_symbol(&self) -> Option<&str> {
        self.current_symbol.as_deref()
    }

    pub fn last_trade(&self) -> &SymbolPrice {
        &self.last_trade
    }

    pub fn last_check(&self) -> &SymbolPrice {
        &self.last_check
    }

    /// `Flat -> Holding(symbol)` after an executed buy.
    pub fn record_buy(&mut self, symbol: &str, price: Decimal) -> BotResult<()> {
        if let Some(held) = &self.current_symbol {
            return Err(BotError::data(format!(
                "buy transition for {symbol} while already holding {held}"
            )));
        }

        self.current_symbol = Some(symbol.to_string());
        self.last_trade = SymbolPrice {
            symbol: symbol.to_string(),
            price: Some(price),
        };
        self.last_check = self.last_trade.clone();
        Ok(())
    }

    /// `Holding -> Flat` after an executed sell.
    pub fn record_sell(&mut self, secondary_symbol: &str) -> BotResult<()> {
        if self.current_symbol.is_none() {
            return Err(BotError::data(
                "sell transition while flat".to_string(),
            ));
        }

        self.current_symbol = None;
        self.last_check = SymbolPrice {
            symbol: secondary_symbol.to_string(),
            price: Some(dec!(1)),
        };
        Ok(())
    }

    /// Self-transition on a pass: remember the evaluated symbol and price so
    /// the next cycle can detect a drop. Held state is unchanged.
    pub fn record_pass(&mut self, evaluated: Option<(&str, Decimal)>) {
        if let Some((symbol, price)) = evaluated {
            self.last_check = SymbolPrice {
                symbol: symbol.to_string(),
                price: Some(price),
            };
        }
    }
}
