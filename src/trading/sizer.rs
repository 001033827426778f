//! Order sizing against the exchange's quantity and notional constraints.

use rust_decimal::Decimal;
use tracing::debug;

use crate::api::types::ExchangeConstraints;
use crate::trading::SizingMode;

/// Truncate `quantity` down to the nearest multiple of `step`.
///
/// Rounds toward zero — never up past an exchange-allowed step. A zero step
/// passes the quantity through unchanged.
pub fn round_step(quantity: Decimal, step: Decimal) -> Decimal {
    if step.is_zero() {
        return quantity;
    }
    (quantity / step).floor() * step
}

/// Computes tradable quantities for market orders.
///
/// A returned quantity of zero means the trade is infeasible under the
/// exchange's rules; callers must treat it as "do not trade", never as a
/// valid zero-size order.
pub struct OrderSizer {
    mode: SizingMode,
}

impl OrderSizer {
    pub fn new(mode: SizingMode) -> Self {
        Self { mode }
    }

    /// Buy quantity from the quote-asset balance at the given price.
    pub fn buy_quantity(
        &self,
        secondary_balance: Decimal,
        price: Decimal,
        constraints: &ExchangeConstraints,
    ) -> Decimal {
        let step = constraints.step_size;

        let raw = match self.mode {
            // One step subtracted as a safety margin before truncation.
            SizingMode::FixedValue(value) => value / price - step,
            SizingMode::FixedPercent(percent) => secondary_balance / price / Decimal::from(100) * percent,
        };

        let quantity = round_step(raw, step);
        self.enforce_minimums(quantity, price, constraints, "buy")
    }

    /// Sell quantity: the full available base-asset balance.
    pub fn sell_quantity(
        &self,
        primary_balance: Decimal,
        price: Decimal,
        constraints: &ExchangeConstraints,
    ) -> Decimal {
        let quantity = round_step(primary_balance, constraints.step_size);
        self.enforce_minimums(quantity, price, constraints, "sell")
    }

    fn enforce_minimums(
        &self,
        quantity: Decimal,
        price: Decimal,
        constraints: &ExchangeConstraints,
        side: &str,
    ) -> Decimal {
        let insufficient = quantity < constraints.min_order_quantity
            || quantity * price < constraints.min_order_value;

        if insufficient {
            debug!(
                side,
                %quantity,
                %price,
                min_qty = %constraints.min_order_quantity,
                min_value = %constraints.min_order_value,
                "order below exchange minimums"
            );
            return Decimal::ZERO;
        }

        quantity
    }
}
