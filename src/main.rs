//! Binance Surfer Bot
//!
//! Spot trading bot that holds at most one position at a time: entries come
//! from one of four selectable signal strategies, orders are market orders
//! sized against the exchange's quantity filters, and every decision lands
//! in an append-only CSV ledger.

mod api;
mod bot;
mod error;
mod ledger;
mod models;
mod trading;

use std::collections::HashSet;
use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use dotenvy::dotenv;
use rust_decimal::Decimal;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use crate::api::{BinanceClient, Notifier};
use crate::bot::{Bot, BotConfig};
use crate::models::{normalize_tickers, PositionState};
use crate::trading::{parse_interval, SignalEngine, SizingMode, StrategyKind, TradingConfig};

/// Binance surfer bot CLI.
#[derive(Parser)]
#[command(name = "surfer")]
#[command(about = "Trade one Binance spot position at a time", long_about = None)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

/// Trading parameters, overridable from the environment.
#[derive(Args)]
struct TradingArgs {
    /// Quote/settlement asset
    #[arg(long, env = "SECONDARY_SYMBOL", default_value = "USDT")]
    secondary_symbol: String,

    /// Signal strategy
    #[arg(long, env = "STRATEGY", value_enum, default_value_t = StrategyKind::Simple)]
    strategy: StrategyKind,

    /// Target primary symbol for the simple strategy
    #[arg(long, env = "PRIMARY_SYMBOL")]
    target_symbol: Option<String>,

    /// Evaluation cadence while holding (e.g. 30s, 1m, 2h)
    #[arg(long, env = "HEARTBEAT_INTERVAL", default_value = "1m")]
    heartbeat_interval: String,

    /// Evaluation cadence while flat
    #[arg(long, env = "NEXT_TRADE_DELAY", default_value = "1m")]
    next_trade_delay: String,

    /// Buy a fixed quote-asset notional instead of a balance percentage
    #[arg(long, env = "FIXED_TRADE_VALUE")]
    fixed_value: Option<Decimal>,

    /// Percentage of the quote balance to spend per buy
    #[arg(long, env = "FIXED_TRADE_PERCENT", default_value = "100")]
    fixed_percent: Decimal,

    /// 24h change threshold for the pump strategy, in percent
    #[arg(long, env = "CHANGE_PERCENT", default_value = "0")]
    change_percent: Decimal,

    /// Balances below this USDT value are ignored as dust
    #[arg(long, env = "MIN_TRADE_USD_VALUE", default_value = "10")]
    min_trade_usd_value: Decimal,

    /// Commission charged per trade, in percent
    #[arg(long, env = "COMMISSION_PERCENT", default_value = "0.075")]
    commission_percent: Decimal,

    /// Paper trading: simulate fills, place no real orders
    #[arg(long, env = "PAPER_TRADING")]
    paper: bool,

    /// Trade ledger file, recreated at startup
    #[arg(long, env = "REPORT_FILE", default_value = "trades.csv")]
    ledger: PathBuf,
}

impl TradingArgs {
    fn into_config(self) -> Result<(TradingConfig, PathBuf)> {
        let sizing = match self.fixed_value {
            Some(value) => SizingMode::FixedValue(value),
            None => SizingMode::FixedPercent(self.fixed_percent),
        };

        let config = TradingConfig {
            secondary_symbol: self.secondary_symbol,
            strategy: self.strategy,
            target_symbol: self.target_symbol,
            heartbeat_interval: parse_interval(&self.heartbeat_interval)
                .context("bad heartbeat interval")?,
            next_trade_delay: parse_interval(&self.next_trade_delay)
                .context("bad next trade delay")?,
            sizing,
            change_percent: self.change_percent,
            min_trade_usd_value: self.min_trade_usd_value,
            commission_percent: self.commission_percent,
            paper: self.paper,
        };
        config.validate()?;

        Ok((config, self.ledger))
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Start the trading loop
    Run {
        #[command(flatten)]
        trading: TradingArgs,
    },

    /// Evaluate the strategy once and print the signals, read-only
    Signals {
        #[command(flatten)]
        trading: TradingArgs,
    },

    /// Show the effective configuration
    Config {
        #[command(flatten)]
        trading: TradingArgs,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    let cli = Cli::parse();

    // Setup logging
    let log_level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Run { trading } => {
            let (config, ledger_path) = trading.into_config()?;
            let client = binance_client()?;
            let notifier = notifier();

            println!("\n=== {} Surfer Bot ===", config.secondary_symbol);
            println!("Strategy: {}", config.strategy.as_str());
            println!(
                "Mode: {}",
                if config.paper {
                    "PAPER TRADING (no real orders)"
                } else {
                    "LIVE TRADING"
                }
            );
            println!("Ledger: {}", ledger_path.display());
            println!("\nPress Ctrl+C to stop.\n");

            let bot_config = BotConfig {
                trading: config,
                ledger_path,
            };
            let mut bot = Bot::new(bot_config, client, notifier)?;

            if let Err(e) = bot.run().await {
                tracing::error!(error = %e, "Bot error");
            }
        }

        Commands::Signals { trading } => {
            let (config, _) = trading.into_config()?;
            let client = binance_client()?;

            info!(strategy = config.strategy.as_str(), "Evaluating signals");

            let btc_usdt_price = client.last_price("BTCUSDT").await?;
            let tradable: HashSet<String> =
                client.tradable_symbols().await?.into_iter().collect();
            let stats = client.ticker_stats().await?;
            let snapshot = normalize_tickers(&stats, &config.secondary_symbol)?;

            let state = PositionState::new(&config.secondary_symbol);
            let engine = SignalEngine::new(&config);
            let result = engine.evaluate(&snapshot, &tradable, &state, btc_usdt_price)?;

            println!("\n=== Signals ({}) ===", config.strategy.as_str());
            println!("Symbols in snapshot: {}", snapshot.len());
            println!("BTC / USDT price:    {btc_usdt_price}");
            println!("Market average:      {:.4}", result.market_average_price);

            match &result.buy {
                Some(buy) => println!(
                    "Buy candidate:       {} @ {} ({}% 24h)",
                    buy.primary_symbol, buy.last_price, buy.price_change_percent
                ),
                None => println!("Buy candidate:       none"),
            }
            println!("Buy signal:          {}", result.is_buy_signal);
            println!("Sell signal:         {}", result.is_sell_signal);
        }

        Commands::Config { trading } => {
            let (config, ledger_path) = trading.into_config()?;

            println!("\n=== Configuration ===\n");
            println!("Secondary symbol:    {}", config.secondary_symbol);
            println!("Strategy:            {}", config.strategy.as_str());
            println!(
                "Target symbol:       {}",
                config.target_symbol.as_deref().unwrap_or("-")
            );
            println!(
                "Heartbeat interval:  {}s",
                config.heartbeat_interval.as_secs()
            );
            println!("Next trade delay:    {}s", config.next_trade_delay.as_secs());
            match config.sizing {
                SizingMode::FixedValue(v) => println!("Sizing:              fixed value {v}"),
                SizingMode::FixedPercent(p) => println!("Sizing:              {p}% of balance"),
            }
            println!("Change threshold:    {}%", config.change_percent);
            println!("Min trade value:     {} USD", config.min_trade_usd_value);
            println!("Commission:          {}%", config.commission_percent);
            println!("Paper trading:       {}", config.paper);
            println!("Ledger file:         {}", ledger_path.display());
        }
    }

    Ok(())
}

fn binance_client() -> Result<BinanceClient> {
    let api_key = env::var("BINANCE_API_KEY").unwrap_or_default();
    let secret_key = env::var("BINANCE_API_SECRET").unwrap_or_default();
    BinanceClient::new(api_key, secret_key)
}

fn notifier() -> Notifier {
    let token = env::var("TELEGRAM_BOT_TOKEN").ok();
    let chat_id = env::var("TELEGRAM_CHAT_ID").ok();
    Notifier::new(token, chat_id)
}
