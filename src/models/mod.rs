//! Data models for market snapshots, balances, and the position state.

mod balance;
mod position;
mod ticker;

pub use balance::{filter_dust, total_usdt_rate, AssetBalance};
pub use position::{PositionState, SymbolPrice};
pub use ticker::{normalize_tickers, TickerSnapshot};
