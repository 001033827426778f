//! Binance spot REST client.
//!
//! Thin wrapper over the endpoints the trading core needs. Signed endpoints
//! use the standard Binance scheme: HMAC-SHA256 over the urlencoded query
//! string (timestamp included), signature appended, API key in the
//! `X-MBX-APIKEY` header.

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::{Client, Method};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use sha2::Sha256;
use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

use crate::api::types::*;
use crate::error::{BotError, BotResult};

const BASE_URL: &str = "https://api.binance.com";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const RECV_WINDOW: &str = "60000";

type HmacSha256 = Hmac<Sha256>;

/// Authenticated Binance REST client.
pub struct BinanceClient {
    client: Client,
    base_url: String,
    api_key: String,
    secret_key: String,
}

impl BinanceClient {
    pub fn new(api_key: String, secret_key: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: BASE_URL.to_string(),
            api_key,
            secret_key,
        })
    }

    /// Create with custom base URL (for testing).
    pub fn with_base_url(api_key: String, secret_key: String, base_url: String) -> Result<Self> {
        let mut client = Self::new(api_key, secret_key)?;
        client.base_url = base_url;
        Ok(client)
    }

    /// 24h statistics for every symbol on the exchange.
    pub async fn ticker_stats(&self) -> BotResult<Vec<Ticker24h>> {
        let url = format!("{}/api/v3/ticker/24hr", self.base_url);
        self.get_json(&url)
            .await
            .map_err(|e| BotError::collaborator("get 24h ticker stats", e))
    }

    /// Ticker names currently open for spot trading.
    pub async fn tradable_symbols(&self) -> BotResult<Vec<String>> {
        let info = self
            .exchange_info()
            .await
            .map_err(|e| BotError::collaborator("get exchange info", e))?;

        Ok(info
            .symbols
            .into_iter()
            .filter(|s| s.status == "TRADING")
            .filter(|s| s.is_spot_trading_allowed)
            .map(|s| s.symbol)
            .collect())
    }

    /// Quantity and notional constraints for one ticker. Fetched fresh per
    /// order; the exchange may change them at any time.
    pub async fn exchange_constraints(&self, ticker_name: &str) -> BotResult<ExchangeConstraints> {
        let info = self
            .exchange_info()
            .await
            .map_err(|e| BotError::collaborator("get exchange info", e))?;

        let symbol = info
            .symbols
            .iter()
            .find(|s| s.symbol == ticker_name)
            .ok_or_else(|| BotError::data(format!("unknown ticker {ticker_name}")))?;

        let mut min_order_quantity = None;
        let mut min_order_value = None;
        let mut step_size = None;

        for filter in &symbol.filters {
            match filter {
                SymbolFilter::LotSize {
                    min_qty, step_size: step, ..
                } => {
                    min_order_quantity = Some(parse_field(min_qty, ticker_name, "minQty")?);
                    step_size = Some(parse_field(step, ticker_name, "stepSize")?);
                }
                SymbolFilter::MinNotional { min_notional }
                | SymbolFilter::Notional { min_notional } => {
                    min_order_value = Some(parse_field(min_notional, ticker_name, "minNotional")?);
                }
                SymbolFilter::Other => {}
            }
        }

        match (min_order_quantity, min_order_value, step_size) {
            (Some(min_order_quantity), Some(min_order_value), Some(step_size)) => {
                Ok(ExchangeConstraints {
                    min_order_quantity,
                    min_order_value,
                    step_size,
                })
            }
            _ => Err(BotError::data(format!(
                "incomplete exchange filters for {ticker_name}"
            ))),
        }
    }

    /// Last traded prices for every ticker, keyed by ticker name.
    pub async fn all_prices(&self) -> BotResult<HashMap<String, Decimal>> {
        let url = format!("{}/api/v3/ticker/price", self.base_url);
        let tickers: Vec<PriceTicker> = self
            .get_json(&url)
            .await
            .map_err(|e| BotError::collaborator("get price list", e))?;

        let mut prices = HashMap::with_capacity(tickers.len());
        for ticker in tickers {
            let price = parse_field(&ticker.price, &ticker.symbol, "price")?;
            prices.insert(ticker.symbol, price);
        }
        Ok(prices)
    }

    /// Last traded price for one ticker.
    pub async fn last_price(&self, ticker_name: &str) -> BotResult<Decimal> {
        let url = format!(
            "{}/api/v3/ticker/price?symbol={}",
            self.base_url, ticker_name
        );
        let ticker: PriceTicker = self
            .get_json(&url)
            .await
            .map_err(|e| BotError::collaborator("get last price", e))?;

        parse_field(&ticker.price, ticker_name, "price")
    }

    /// All non-empty free balances on the account.
    pub async fn account_balances(&self) -> BotResult<Vec<SymbolBalance>> {
        let account: AccountInfo = self
            .send_signed_request(Method::GET, "/api/v3/account", vec![])
            .await
            .map_err(|e| BotError::collaborator("get account balances", e))?;

        let mut balances = Vec::new();
        for raw in account.balances {
            let available = parse_field(&raw.free, &raw.asset, "free")?;
            balances.push(SymbolBalance {
                symbol: raw.asset,
                available,
            });
        }
        Ok(balances)
    }

    /// Free balance for one asset; zero when the asset is absent.
    pub async fn asset_balance(&self, symbol: &str) -> BotResult<Decimal> {
        let balances = self.account_balances().await?;
        Ok(balances
            .into_iter()
            .find(|b| b.symbol == symbol)
            .map(|b| b.available)
            .unwrap_or(Decimal::ZERO))
    }

    /// Place a market buy. Quantity must already satisfy the exchange
    /// constraints; see `OrderSizer`.
    pub async fn market_buy(
        &self,
        ticker_name: &str,
        quantity: Decimal,
    ) -> BotResult<MarketOrderResponse> {
        self.market_order("BUY", ticker_name, quantity)
            .await
            .map_err(|e| BotError::collaborator("market buy", e))
    }

    /// Place a market sell.
    pub async fn market_sell(
        &self,
        ticker_name: &str,
        quantity: Decimal,
    ) -> BotResult<MarketOrderResponse> {
        self.market_order("SELL", ticker_name, quantity)
            .await
            .map_err(|e| BotError::collaborator("market sell", e))
    }

    async fn market_order(
        &self,
        side: &str,
        ticker_name: &str,
        quantity: Decimal,
    ) -> Result<MarketOrderResponse> {
        let client_order_id = Uuid::new_v4().to_string();
        let params = vec![
            ("symbol", ticker_name.to_string()),
            ("side", side.to_string()),
            ("type", "MARKET".to_string()),
            ("quantity", quantity.to_string()),
            ("newClientOrderId", client_order_id),
        ];

        info!(side, ticker = ticker_name, %quantity, "Placing market order");

        let resp: RawOrderResponse = self
            .send_signed_request(Method::POST, "/api/v3/order", params)
            .await?;

        info!(
            order_id = resp.order_id,
            symbol = %resp.symbol,
            status = %resp.status,
            "Order response"
        );

        let executed_quantity = Decimal::from_str(&resp.executed_qty)
            .with_context(|| format!("bad executedQty {:?}", resp.executed_qty))?;

        Ok(MarketOrderResponse {
            status: resp.status,
            executed_quantity,
        })
    }

    async fn exchange_info(&self) -> Result<ExchangeInfo> {
        let url = format!("{}/api/v3/exchangeInfo", self.base_url);
        self.get_json(&url).await
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        debug!(url, "GET");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("request to {url} failed"))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("{url} returned {status}: {body}"));
        }

        response
            .json()
            .await
            .with_context(|| format!("bad response body from {url}"))
    }

    fn sign_query(&self, mut params: Vec<(&str, String)>) -> Result<String> {
        params.push(("recvWindow", RECV_WINDOW.to_string()));
        params.push(("timestamp", Utc::now().timestamp_millis().to_string()));

        let query = serde_urlencoded::to_string(&params)?;

        let mut mac = HmacSha256::new_from_slice(self.secret_key.as_bytes())
            .context("Invalid secret key length")?;
        mac.update(query.as_bytes());
        let signature = hex::encode(mac.finalize().into_bytes());

        Ok(format!("{query}&signature={signature}"))
    }

    async fn send_signed_request<T: DeserializeOwned>(
        &self,
        method: Method,
        endpoint: &str,
        params: Vec<(&str, String)>,
    ) -> Result<T> {
        let query = self.sign_query(params)?;
        let url = format!("{}{}?{}", self.base_url, endpoint, query);

        let response = self
            .client
            .request(method, &url)
            .header("X-MBX-APIKEY", &self.api_key)
            .send()
            .await
            .with_context(|| format!("request to {endpoint} failed"))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("{endpoint} returned {status}: {body}"));
        }

        response
            .json()
            .await
            .with_context(|| format!("bad response body from {endpoint}"))
    }
}

fn parse_field(value: &str, symbol: &str, field: &str) -> BotResult<Decimal> {
    Decimal::from_str(value)
        .map_err(|e| BotError::data(format!("{symbol}: bad {field} {value:?}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_exchange_filter_deserialization() {
        let json = r#"{
            "symbols": [{
                "symbol": "ETHUSDT",
                "status": "TRADING",
                "isSpotTradingAllowed": true,
                "filters": [
                    {"filterType": "PRICE_FILTER", "minPrice": "0.01", "maxPrice": "10000", "tickSize": "0.01"},
                    {"filterType": "LOT_SIZE", "minQty": "0.0001", "maxQty": "9000", "stepSize": "0.0001"},
                    {"filterType": "NOTIONAL", "minNotional": "5.0", "applyMinToMarket": true}
                ]
            }]
        }"#;

        let info: ExchangeInfo = serde_json::from_str(json).unwrap();
        let symbol = &info.symbols[0];
        assert_eq!(symbol.symbol, "ETHUSDT");
        assert!(symbol.is_spot_trading_allowed);

        let lot = symbol
            .filters
            .iter()
            .find(|f| matches!(f, SymbolFilter::LotSize { .. }))
            .unwrap();
        match lot {
            SymbolFilter::LotSize { step_size, .. } => assert_eq!(step_size, "0.0001"),
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_order_response_filled() {
        let resp = MarketOrderResponse {
            status: "FILLED".to_string(),
            executed_quantity: dec!(1.5),
        };
        assert!(resp.is_filled());

        let resp = MarketOrderResponse {
            status: "EXPIRED".to_string(),
            executed_quantity: dec!(0),
        };
        assert!(!resp.is_filled());
    }
}
