//! Contract with the market snapshot source, plus an in-memory implementation.

use crate::{CompanyInfo, OrderBook, OrderLevel, PriceMap, TradeItem, TradePage, WorkerInfo};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Upstream fetch failures. Reports degrade to partial data on any of these.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("transport error calling {procedure}: {message}")]
    Transport { procedure: String, message: String },
    #[error("{procedure} returned HTTP {status}: {body}")]
    Status {
        procedure: String,
        status: u16,
        body: String,
    },
    #[error("could not decode {procedure} response: {message}")]
    Decode { procedure: String, message: String },
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },
}

/// Read-only access to live market data.
///
/// Every call is blocking; implementations do not retry.
pub trait MarketGateway {
    /// Current price per resource. May be partial.
    fn get_prices(&self) -> Result<PriceMap, GatewayError>;

    /// Top `limit` orders on each side of the book.
    fn get_order_book(&self, resource: &str, limit: u32) -> Result<OrderBook, GatewayError>;

    /// One page of trade history, newest first. `cursor` of `None` asks for
    /// the first page.
    fn get_trade_page(
        &self,
        resource: &str,
        cursor: Option<&str>,
    ) -> Result<TradePage, GatewayError>;

    fn get_company_workers(&self, company_id: &str) -> Result<Vec<WorkerInfo>, GatewayError>;

    fn get_user_companies(&self, user_id: &str) -> Result<Vec<String>, GatewayError>;

    fn get_company(&self, company_id: &str) -> Result<CompanyInfo, GatewayError>;
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct StaticBook {
    #[serde(default)]
    pub bids: Vec<OrderLevel>,
    #[serde(default)]
    pub asks: Vec<OrderLevel>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StaticCompany {
    pub name: String,
    pub resource: String,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub workers: Vec<WorkerInfo>,
}

fn default_page_size() -> usize {
    50
}

/// Fixed market snapshot held in memory, typically read from a YAML file.
///
/// Trades are stored newest first and served in pages of `page_size`, the
/// cursor being the offset of the next page.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct StaticGateway {
    #[serde(default)]
    pub prices: PriceMap,
    #[serde(default)]
    pub order_books: BTreeMap<String, StaticBook>,
    #[serde(default)]
    pub trades: BTreeMap<String, Vec<TradeItem>>,
    #[serde(default)]
    pub companies: BTreeMap<String, StaticCompany>,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

impl StaticGateway {
    pub fn new() -> Self {
        Self {
            page_size: default_page_size(),
            ..Self::default()
        }
    }

    pub fn from_yaml_str(text: &str) -> Result<Self, GatewayError> {
        serde_yaml::from_str(text).map_err(|e| GatewayError::Decode {
            procedure: "snapshot".into(),
            message: e.to_string(),
        })
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, GatewayError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| GatewayError::Transport {
            procedure: "snapshot".into(),
            message: format!("{}: {e}", path.display()),
        })?;
        Self::from_yaml_str(&text)
    }
}

impl MarketGateway for StaticGateway {
    fn get_prices(&self) -> Result<PriceMap, GatewayError> {
        Ok(self.prices.clone())
    }

    fn get_order_book(&self, resource: &str, limit: u32) -> Result<OrderBook, GatewayError> {
        let book = self.order_books.get(resource).cloned().unwrap_or_default();
        let mut bids = book.bids;
        let mut asks = book.asks;
        bids.sort_by(|a, b| b.price.cmp(&a.price));
        asks.sort_by(|a, b| a.price.cmp(&b.price));
        bids.truncate(limit as usize);
        asks.truncate(limit as usize);
        Ok(OrderBook {
            resource: resource.to_string(),
            bids,
            asks,
        })
    }

    fn get_trade_page(
        &self,
        resource: &str,
        cursor: Option<&str>,
    ) -> Result<TradePage, GatewayError> {
        let trades = self.trades.get(resource).map(Vec::as_slice).unwrap_or(&[]);
        let offset = match cursor {
            None => 0,
            Some(c) => c.parse::<usize>().map_err(|e| GatewayError::Decode {
                procedure: "trades".into(),
                message: format!("bad cursor {c:?}: {e}"),
            })?,
        };
        let start = offset.min(trades.len());
        let end = (start + self.page_size.max(1)).min(trades.len());
        let next_cursor = (end < trades.len()).then(|| end.to_string());
        Ok(TradePage {
            items: trades[start..end].to_vec(),
            next_cursor,
        })
    }

    fn get_company_workers(&self, company_id: &str) -> Result<Vec<WorkerInfo>, GatewayError> {
        self.companies
            .get(company_id)
            .map(|c| c.workers.clone())
            .ok_or_else(|| GatewayError::NotFound {
                kind: "company",
                id: company_id.to_string(),
            })
    }

    fn get_user_companies(&self, user_id: &str) -> Result<Vec<String>, GatewayError> {
        Ok(self
            .companies
            .iter()
            .filter(|(_, c)| c.owner.as_deref() == Some(user_id))
            .map(|(id, _)| id.clone())
            .collect())
    }

    fn get_company(&self, company_id: &str) -> Result<CompanyInfo, GatewayError> {
        self.companies
            .get(company_id)
            .map(|c| CompanyInfo {
                id: company_id.to_string(),
                name: c.name.clone(),
                resource: c.resource.clone(),
            })
            .ok_or_else(|| GatewayError::NotFound {
                kind: "company",
                id: company_id.to_string(),
            })
    }
}
