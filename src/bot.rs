//! Bot runner: the heartbeat loop.
//!
//! Each cycle: gather balances, evaluate the selected strategy against a
//! fresh market snapshot, branch into the sell/buy/pass path, advance the
//! position state, write exactly one ledger row, then sleep — the next-trade
//! delay while flat, the heartbeat interval while holding. One cycle fully
//! completes before the next begins; the position state and the ledger are
//! owned by this loop alone.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::{error, info, warn};

use crate::api::{BinanceClient, MarketOrderResponse, Notifier};
use crate::error::{BotError, BotResult};
use crate::ledger::{MarketContext, TradeLedger};
use crate::models::{
    filter_dust, normalize_tickers, total_usdt_rate, AssetBalance, PositionState, TickerSnapshot,
};
use crate::trading::{OrderSizer, SignalEngine, SignalResult, SizingMode, TradingConfig};

/// BTC/USDT is the reference price recorded with every ledger row.
const REFERENCE_TICKER: &str = "BTCUSDT";

/// Bot configuration beyond the trading parameters themselves.
#[derive(Debug, Clone)]
pub struct BotConfig {
    pub trading: TradingConfig,

    /// Ledger file location; recreated at startup
    pub ledger_path: PathBuf,
}

/// Synthetic account used in paper mode: the quote seed, replaced by the
/// held asset on a simulated buy.
struct PaperAccount {
    balances: Vec<AssetBalance>,
}

impl PaperAccount {
    fn new(secondary_symbol: &str) -> Self {
        Self {
            balances: vec![AssetBalance::new(secondary_symbol, dec!(100), dec!(100))],
        }
    }
}

/// Main bot runner.
pub struct Bot {
    config: TradingConfig,
    client: BinanceClient,
    notifier: Notifier,
    engine: SignalEngine,
    sizer: OrderSizer,
    ledger: TradeLedger,
    state: PositionState,
    paper: Option<PaperAccount>,
    cycle_count: u64,

    // Shutdown signal
    shutdown: Arc<AtomicBool>,
}

impl Bot {
    pub fn new(config: BotConfig, client: BinanceClient, notifier: Notifier) -> Result<Self> {
        config.trading.validate()?;

        let trading = config.trading;
        let ledger = TradeLedger::create(&config.ledger_path, trading.commission_percent)
            .context("failed to initialize trade ledger")?;

        let engine = SignalEngine::new(&trading);
        let sizer = OrderSizer::new(trading.sizing);
        let state = PositionState::new(&trading.secondary_symbol);
        let paper = trading
            .paper
            .then(|| PaperAccount::new(&trading.secondary_symbol));

        Ok(Self {
            config: trading,
            client,
            notifier,
            engine,
            sizer,
            ledger,
            state,
            paper,
            cycle_count: 0,
            shutdown: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Get shutdown signal for external control.
    pub fn shutdown_signal(&self) -> Arc<AtomicBool> {
        self.shutdown.clone()
    }

    /// Main run loop. Returns only on shutdown.
    pub async fn run(&mut self) -> Result<()> {
        info!(
            strategy = self.config.strategy.as_str(),
            secondary = %self.config.secondary_symbol,
            paper = self.config.paper,
            notifications = self.notifier.is_enabled(),
            "Starting bot"
        );

        self.send_start_message().await;
        if !self.config.paper {
            if let Err(e) = self.report_startup_balances().await {
                warn!(error = %e, "Startup balance report failed");
            }
        }

        // Register shutdown handler
        let shutdown = self.shutdown.clone();
        tokio::spawn(async move {
            tokio::signal::ctrl_c().await.ok();
            info!("Shutdown signal received");
            shutdown.store(true, Ordering::SeqCst);
        });

        while !self.shutdown.load(Ordering::SeqCst) {
            self.cycle_count += 1;
            info!(cycle = self.cycle_count, "Cycle start");

            match self.cycle().await {
                Ok(()) => {}
                // A collaborator failure aborts the cycle without a ledger
                // row; the next scheduled cycle proceeds as normal.
                Err(e) => error!(error = %e, "Cycle aborted"),
            }

            let delay = if self.state.is_flat() {
                self.config.next_trade_delay
            } else {
                self.config.heartbeat_interval
            };
            info!(cycle = self.cycle_count, delay_secs = delay.as_secs(), "Cycle end");

            tokio::time::sleep(delay).await;
        }

        info!("Bot stopped");
        Ok(())
    }

    /// One heartbeat cycle.
    ///
    /// Data, constraint and execution errors abort only the trade attempt
    /// and fall through to a PASS row; collaborator errors propagate and
    /// skip the ledger entirely.
    async fn cycle(&mut self) -> BotResult<()> {
        let balances = self.gather_balances().await?;
        let total = total_usdt_rate(&balances);
        info!(total_usdt = %total, assets = balances.len(), "Account balances");

        let signals = match self.evaluate_signals().await {
            Ok(signals) => signals,
            Err(e) if e.aborts_cycle() => return Err(e),
            Err(e) => {
                warn!(error = %e, "Evaluation failed, recording pass");
                self.write_pass(None, MarketContext::default())?;
                return Ok(());
            }
        };

        let market = MarketContext {
            btc_usdt_price: signals.btc_usdt_price,
            market_average_price: signals.market_average_price,
        };

        let holding = !self.state.is_flat();
        let sell_candidate = signals.sell.clone();
        let buy_candidate = signals.buy.clone();

        if let (true, true, Some(sell)) = (signals.is_sell_signal, holding, sell_candidate) {
            match self.execute_sell(&sell).await {
                Ok(executed) => {
                    self.state.record_sell(&self.config.secondary_symbol)?;
                    self.ledger
                        .record_sell(
                            &sell.primary_symbol,
                            sell.last_price,
                            sell.price_change_percent,
                            market,
                        )
                        .map_err(|e| BotError::collaborator("ledger write", e))?;
                    self.notify_trade("Sold", &sell, executed).await;
                }
                Err(e) if e.aborts_cycle() => return Err(e),
                Err(e) => {
                    warn!(error = %e, "Sell attempt failed, recording pass");
                    self.write_pass(Some(&sell), market)?;
                }
            }
        } else if let (true, false, Some(buy)) = (signals.is_buy_signal, holding, buy_candidate) {
            match self.execute_buy(&buy).await {
                Ok(executed) => {
                    self.state.record_buy(&buy.primary_symbol, buy.last_price)?;
                    self.ledger
                        .record_buy(
                            &buy.primary_symbol,
                            buy.last_price,
                            buy.price_change_percent,
                            market,
                        )
                        .map_err(|e| BotError::collaborator("ledger write", e))?;
                    info!(symbol = %buy.primary_symbol, "New current symbol");
                    self.notify_trade("Bought", &buy, executed).await;
                }
                Err(e) if e.aborts_cycle() => return Err(e),
                Err(e) => {
                    warn!(error = %e, "Buy attempt failed, recording pass");
                    self.write_pass(None, market)?;
                }
            }
        } else {
            let evaluated = signals
                .sell
                .as_ref()
                .map(|t| (t.primary_symbol.as_str(), t.last_price));
            self.state.record_pass(evaluated);
            self.write_pass(signals.sell.as_ref(), market)?;
        }

        info!(
            current_symbol = self.state.current_symbol().unwrap_or("-"),
            profit_total = %self.ledger.profit_total(),
            "Cycle outcome recorded"
        );

        Ok(())
    }

    /// Fetch the market snapshot and run the strategy over it.
    async fn evaluate_signals(&self) -> BotResult<SignalResult> {
        let btc_usdt_price = self.client.last_price(REFERENCE_TICKER).await?;
        let tradable: HashSet<String> =
            self.client.tradable_symbols().await?.into_iter().collect();
        let stats = self.client.ticker_stats().await?;

        let snapshot = normalize_tickers(&stats, &self.config.secondary_symbol)?;

        self.engine
            .evaluate(&snapshot, &tradable, &self.state, btc_usdt_price)
    }

    /// Execute the sell path, returning the executed quantity.
    async fn execute_sell(&mut self, sell: &TickerSnapshot) -> BotResult<Decimal> {
        if let Some(paper) = &mut self.paper {
            // Simulated full fill of the held unit at the observed price.
            let quantity = paper
                .balances
                .iter()
                .find(|b| b.symbol == sell.primary_symbol)
                .map(|b| b.available)
                .unwrap_or(dec!(1));
            info!(symbol = %sell.primary_symbol, %quantity, "Paper sell");
            return Ok(quantity);
        }

        let constraints = self.client.exchange_constraints(&sell.ticker_name).await?;
        let balance = self.client.asset_balance(&sell.primary_symbol).await?;
        let price = self.client.last_price(&sell.ticker_name).await?;

        let quantity = self.sizer.sell_quantity(balance, price, &constraints);
        if quantity.is_zero() {
            return Err(BotError::constraint(format!(
                "no sellable {} quantity under exchange minimums",
                sell.primary_symbol
            )));
        }

        let response = self.client.market_sell(&sell.ticker_name, quantity).await?;
        check_filled(&response)?;
        Ok(response.executed_quantity)
    }

    /// Execute the buy path, returning the executed quantity.
    async fn execute_buy(&mut self, buy: &TickerSnapshot) -> BotResult<Decimal> {
        if self.paper.is_some() {
            // Simulated one-unit fill; the synthetic account now holds the
            // primary and an empty quote balance.
            let usdt_rate = self
                .client
                .last_price(&format!("{}USDT", buy.primary_symbol))
                .await
                .unwrap_or(Decimal::ZERO);
            if let Some(paper) = &mut self.paper {
                paper.balances = vec![
                    AssetBalance::new(buy.primary_symbol.clone(), dec!(1), usdt_rate),
                    AssetBalance::new(self.config.secondary_symbol.clone(), dec!(0), dec!(0)),
                ];
            }
            info!(symbol = %buy.primary_symbol, "Paper buy");
            return Ok(dec!(1));
        }

        let balance = self
            .client
            .asset_balance(&self.config.secondary_symbol)
            .await?;

        if let SizingMode::FixedValue(value) = self.config.sizing {
            if balance < value {
                return Err(BotError::constraint(format!(
                    "{} balance {balance} below fixed trade value {value}",
                    self.config.secondary_symbol
                )));
            }
        }

        let constraints = self.client.exchange_constraints(&buy.ticker_name).await?;
        let price = self.client.last_price(&buy.ticker_name).await?;

        let quantity = self.sizer.buy_quantity(balance, price, &constraints);
        if quantity.is_zero() {
            return Err(BotError::constraint(format!(
                "no buyable {} quantity under exchange minimums",
                buy.primary_symbol
            )));
        }

        let response = self.client.market_buy(&buy.ticker_name, quantity).await?;
        check_filled(&response)?;
        Ok(response.executed_quantity)
    }

    /// Balances valued in USDT terms: synthetic in paper mode, fetched and
    /// converted at last prices otherwise.
    async fn gather_balances(&self) -> BotResult<Vec<AssetBalance>> {
        if let Some(paper) = &self.paper {
            return Ok(paper.balances.clone());
        }

        let raw = self.client.account_balances().await?;
        let prices = self.client.all_prices().await?;

        let mut balances = Vec::new();
        for entry in raw {
            if entry.available.is_zero() {
                continue;
            }

            let usdt_rate = if entry.symbol == "USDT" {
                entry.available
            } else {
                match prices.get(&format!("{}USDT", entry.symbol)) {
                    Some(price) => entry.available * price,
                    // No USDT market for this asset; it cannot be valued.
                    None => continue,
                }
            };

            balances.push(AssetBalance::new(entry.symbol, entry.available, usdt_rate));
        }

        balances.sort_by(|a, b| b.usdt_rate.cmp(&a.usdt_rate));
        Ok(balances)
    }

    fn write_pass(
        &mut self,
        evaluated: Option<&TickerSnapshot>,
        market: MarketContext,
    ) -> BotResult<()> {
        let symbol = evaluated.map(|t| t.primary_symbol.as_str());
        let change = evaluated
            .map(|t| t.price_change_percent)
            .unwrap_or(Decimal::ZERO);

        self.ledger
            .record_pass(symbol, change, market)
            .map_err(|e| BotError::collaborator("ledger write", e))?;
        Ok(())
    }

    async fn send_start_message(&self) {
        let mut message = format!(
            "<b>{} Surfer Bot started</b>\n\n",
            self.config.secondary_symbol
        );
        message += &format!("<b>Strategy:</b> {}\n", self.config.strategy.as_str());
        message += &format!(
            "<b>Heartbeat interval:</b> {}s\n",
            self.config.heartbeat_interval.as_secs()
        );
        message += &format!(
            "<b>Next trade delay:</b> {}s\n",
            self.config.next_trade_delay.as_secs()
        );
        self.notifier.notify(&message).await;
    }

    /// Log and send the account holdings at startup.
    async fn report_startup_balances(&self) -> BotResult<()> {
        let balances = self.gather_balances().await?;
        let total = total_usdt_rate(&balances);
        let tradable = filter_dust(balances.clone(), self.config.min_trade_usd_value);

        info!(
            assets = tradable.len(),
            total_usdt = %total,
            "Startup account balances"
        );

        let mut message = "<b>Current account balances:</b>\n\n".to_string();
        for balance in &balances {
            message += &format!(
                "<b>{} {}</b> = {:.2} USDT\n",
                balance.available, balance.symbol, balance.usdt_rate
            );
        }
        message += &format!("\n<b>USDT rate total balance:</b> {total:.2} USDT\n");
        self.notifier.notify(&message).await;

        Ok(())
    }

    async fn notify_trade(&self, verb: &str, ticker: &TickerSnapshot, quantity: Decimal) {
        let message = format!(
            "<b>{} price</b>: {} {}\n<b>{}</b>: {} {}",
            ticker.primary_symbol,
            ticker.last_price,
            ticker.secondary_symbol,
            verb,
            quantity,
            ticker.primary_symbol
        );
        self.notifier.notify(&message).await;
    }
}

fn check_filled(response: &MarketOrderResponse) -> BotResult<()> {
    if !response.is_filled() {
        return Err(BotError::Execution {
            status: response.status.clone(),
        });
    }
    Ok(())
}
