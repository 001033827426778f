//! Wire and boundary types for the Binance REST API.
//!
//! Numeric fields arrive as strings on the wire; they stay strings here and
//! are parsed at the boundary where a bad value can be reported with context.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One entry from GET /api/v3/ticker/24hr.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticker24h {
    pub symbol: String,
    pub last_price: String,
    pub price_change_percent: String,
    #[serde(default)]
    pub open_time: i64,
    #[serde(default)]
    pub close_time: i64,
}

/// GET /api/v3/ticker/price response.
#[derive(Debug, Clone, Deserialize)]
pub struct PriceTicker {
    pub symbol: String,
    pub price: String,
}

/// GET /api/v3/exchangeInfo response.
#[derive(Debug, Clone, Deserialize)]
pub struct ExchangeInfo {
    pub symbols: Vec<SymbolInfo>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolInfo {
    pub symbol: String,
    pub status: String,
    #[serde(default)]
    pub is_spot_trading_allowed: bool,
    #[serde(default)]
    pub filters: Vec<SymbolFilter>,
}

/// Exchange filter entries, tagged by `filterType`. Binance publishes many
/// filter kinds; only the ones the sizer needs are modeled.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "filterType")]
pub enum SymbolFilter {
    #[serde(rename = "LOT_SIZE", rename_all = "camelCase")]
    LotSize { min_qty: String, step_size: String },
    #[serde(rename = "MIN_NOTIONAL", rename_all = "camelCase")]
    MinNotional { min_notional: String },
    #[serde(rename = "NOTIONAL", rename_all = "camelCase")]
    Notional { min_notional: String },
    #[serde(other)]
    Other,
}

/// Per-ticker order constraints extracted from the exchange filters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeConstraints {
    pub min_order_quantity: Decimal,
    pub min_order_value: Decimal,
    pub step_size: Decimal,
}

/// Signed GET /api/v3/account response.
#[derive(Debug, Clone, Deserialize)]
pub struct AccountInfo {
    pub balances: Vec<RawBalance>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawBalance {
    pub asset: String,
    pub free: String,
}

/// One asset's free balance, parsed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolBalance {
    pub symbol: String,
    pub available: Decimal,
}

/// Signed POST /api/v3/order response.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawOrderResponse {
    pub symbol: String,
    pub order_id: u64,
    pub status: String,
    pub executed_qty: String,
}

/// Order outcome at the core's boundary.
#[derive(Debug, Clone)]
pub struct MarketOrderResponse {
    pub status: String,
    pub executed_quantity: Decimal,
}

impl MarketOrderResponse {
    pub fn is_filled(&self) -> bool {
        self.status == "FILLED"
    }
}
