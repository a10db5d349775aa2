#![deny(warnings)]

//! Blocking HTTP client for the game's tRPC market API.
//!
//! Requests use the batch form `GET {base}/{procedure}?batch=1&input={"0":{..}}`
//! and responses arrive as `[{"result":{"data":..}}]`. Nothing is retried;
//! callers degrade to partial data on error.

use chrono::{DateTime, Utc};
use market_core::{
    AnalyticsConfig, CompanyInfo, GatewayError, MarketGateway, OrderBook, OrderLevel, PriceMap,
    TradeItem, TradePage, WorkerInfo,
};
use reqwest::blocking::Client;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

#[derive(Deserialize)]
struct Envelope<T> {
    result: EnvelopeResult<T>,
}

#[derive(Deserialize)]
struct EnvelopeResult<T> {
    data: T,
}

#[derive(Deserialize)]
struct WireOrder {
    price: f64,
    quantity: f64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireTopOrders {
    #[serde(default)]
    buy_orders: Vec<WireOrder>,
    #[serde(default)]
    sell_orders: Vec<WireOrder>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireTransaction {
    created_at: DateTime<Utc>,
    quantity: f64,
    #[serde(default)]
    price: Option<f64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireTransactions {
    #[serde(default)]
    items: Vec<WireTransaction>,
    #[serde(default)]
    next_cursor: Option<String>,
}

#[derive(Deserialize)]
struct WireCompanyIds {
    #[serde(default)]
    items: Vec<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireCompany {
    #[serde(rename = "_id")]
    id: String,
    name: String,
    item_code: String,
}

#[derive(Deserialize)]
struct WireWorker {
    user: String,
    wage: f64,
}

#[derive(Deserialize)]
struct WireWorkers {
    #[serde(default)]
    workers: Vec<WireWorker>,
}

fn decimal(procedure: &str, value: f64) -> Result<Decimal, GatewayError> {
    Decimal::from_f64(value).ok_or_else(|| GatewayError::Decode {
        procedure: procedure.to_string(),
        message: format!("non-finite number {value}"),
    })
}

fn levels(procedure: &str, orders: Vec<WireOrder>) -> Result<Vec<OrderLevel>, GatewayError> {
    orders
        .into_iter()
        .map(|o| {
            let price = decimal(procedure, o.price)?;
            let quantity = decimal(procedure, o.quantity)?;
            Ok(OrderLevel::new(price, quantity))
        })
        .collect()
}

/// Unwrap the first element of a tRPC batch response.
fn decode_batch<T: DeserializeOwned>(procedure: &str, body: &str) -> Result<T, GatewayError> {
    let envelopes: Vec<Envelope<T>> =
        serde_json::from_str(body).map_err(|e| GatewayError::Decode {
            procedure: procedure.to_string(),
            message: format!("{e}; body was '{body}'"),
        })?;
    envelopes
        .into_iter()
        .next()
        .map(|env| env.result.data)
        .ok_or_else(|| GatewayError::Decode {
            procedure: procedure.to_string(),
            message: "empty batch response".to_string(),
        })
}

#[derive(Debug, Clone)]
pub struct TrpcGateway {
    client: Client,
    base_url: String,
    trade_page_size: u32,
}

impl TrpcGateway {
    pub fn new(
        base_url: impl Into<String>,
        timeout: Duration,
        trade_page_size: u32,
    ) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Transport {
                procedure: "client".to_string(),
                message: e.to_string(),
            })?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            trade_page_size,
        })
    }

    pub fn from_config(cfg: &AnalyticsConfig) -> Result<Self, GatewayError> {
        Self::new(
            cfg.api_base_url.clone(),
            Duration::from_secs(cfg.request_timeout_secs),
            cfg.trade_page_size,
        )
    }

    fn call<T: DeserializeOwned>(&self, procedure: &str, input: Value) -> Result<T, GatewayError> {
        let url = format!("{}/{}", self.base_url.trim_end_matches('/'), procedure);
        let batch_input = json!({ "0": input }).to_string();
        let transport = |e: reqwest::Error| GatewayError::Transport {
            procedure: procedure.to_string(),
            message: e.to_string(),
        };

        let resp = self
            .client
            .get(&url)
            .query(&[("batch", "1"), ("input", batch_input.as_str())])
            .send()
            .map_err(transport)?;
        let status = resp.status();
        let body = resp.text().map_err(transport)?;
        debug!(procedure, status = status.as_u16(), bytes = body.len(), "api call");

        if !status.is_success() {
            return Err(GatewayError::Status {
                procedure: procedure.to_string(),
                status: status.as_u16(),
                body,
            });
        }
        decode_batch(procedure, &body)
    }
}

const PRICES: &str = "itemTrading.getPrices";
const TOP_ORDERS: &str = "tradingOrder.getTopOrders";
const TRANSACTIONS: &str = "transaction.getPaginatedTransactions";
const USER_COMPANIES: &str = "company.getCompanies";
const COMPANY: &str = "company.getById";
const WORKERS: &str = "worker.getWorkers";

fn prices_from_wire(raw: BTreeMap<String, f64>) -> Result<PriceMap, GatewayError> {
    raw.into_iter()
        .map(|(code, price)| Ok((code, decimal(PRICES, price)?)))
        .collect()
}

fn trade_page_from_wire(raw: WireTransactions) -> Result<TradePage, GatewayError> {
    let items = raw
        .items
        .into_iter()
        .map(|t| {
            Ok(TradeItem {
                timestamp: t.created_at,
                quantity: decimal(TRANSACTIONS, t.quantity)?,
                price: t.price.map(|p| decimal(TRANSACTIONS, p)).transpose()?,
            })
        })
        .collect::<Result<Vec<_>, GatewayError>>()?;
    Ok(TradePage {
        items,
        next_cursor: raw.next_cursor,
    })
}

impl MarketGateway for TrpcGateway {
    fn get_prices(&self) -> Result<PriceMap, GatewayError> {
        let raw: BTreeMap<String, f64> = self.call(PRICES, json!({}))?;
        prices_from_wire(raw)
    }

    fn get_order_book(&self, resource: &str, limit: u32) -> Result<OrderBook, GatewayError> {
        let raw: WireTopOrders =
            self.call(TOP_ORDERS, json!({ "itemCode": resource, "limit": limit }))?;
        Ok(OrderBook {
            resource: resource.to_string(),
            bids: levels(TOP_ORDERS, raw.buy_orders)?,
            asks: levels(TOP_ORDERS, raw.sell_orders)?,
        })
    }

    fn get_trade_page(
        &self,
        resource: &str,
        cursor: Option<&str>,
    ) -> Result<TradePage, GatewayError> {
        let mut input = json!({
            "itemCode": resource,
            "limit": self.trade_page_size,
            "transactionType": "trading",
        });
        if let Some(cursor) = cursor {
            input["cursor"] = Value::from(cursor);
        }
        trade_page_from_wire(self.call(TRANSACTIONS, input)?)
    }

    fn get_company_workers(&self, company_id: &str) -> Result<Vec<WorkerInfo>, GatewayError> {
        let raw: WireWorkers = self.call(WORKERS, json!({ "companyId": company_id }))?;
        raw.workers
            .into_iter()
            .map(|w| {
                Ok(WorkerInfo {
                    worker_id: w.user,
                    wage: decimal(WORKERS, w.wage)?,
                })
            })
            .collect()
    }

    fn get_user_companies(&self, user_id: &str) -> Result<Vec<String>, GatewayError> {
        let raw: WireCompanyIds = self.call(USER_COMPANIES, json!({ "userId": user_id }))?;
        Ok(raw.items)
    }

    fn get_company(&self, company_id: &str) -> Result<CompanyInfo, GatewayError> {
        let raw: WireCompany = self.call(COMPANY, json!({ "companyId": company_id }))?;
        Ok(CompanyInfo {
            id: raw.id,
            name: raw.name,
            resource: raw.item_code,
        })
    }
}
