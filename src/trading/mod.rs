//! Trading logic: signal strategies, order sizing, configuration.

mod config;
mod signal;
mod sizer;

pub use config::{parse_interval, SizingMode, StrategyKind, TradingConfig};
pub use signal::{SignalEngine, SignalResult};
pub use sizer::{round_step, OrderSizer};
