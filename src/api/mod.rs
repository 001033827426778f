//! Binance REST collaborators: market data, account, orders, notifications.

mod binance;
mod notify;
pub mod types;

pub use binance::BinanceClient;
pub use notify::Notifier;
pub use types::{ExchangeConstraints, MarketOrderResponse, SymbolBalance, Ticker24h};
