//! Order-book depth and spread.

use market_core::{OrderBook, OrderLevel};
use rust_decimal::Decimal;
use serde::Serialize;

/// `lowest_ask - highest_bid`, or `None` if either side is empty.
pub fn spread(book: &OrderBook) -> Option<Decimal> {
    Some(book.lowest_ask()? - book.highest_bid()?)
}

/// Spread as a percentage of the lowest ask.
pub fn spread_pct(book: &OrderBook) -> Option<Decimal> {
    let ask = book.lowest_ask()?;
    if ask.is_zero() {
        return None;
    }
    Some((ask - book.highest_bid()?) / ask * Decimal::ONE_HUNDRED)
}

/// Drop bids priced at or below `min_bid_price`. Asks are kept as is.
pub fn without_dust(book: &OrderBook, min_bid_price: Decimal) -> OrderBook {
    OrderBook {
        resource: book.resource.clone(),
        bids: book
            .bids
            .iter()
            .filter(|l| l.price > min_bid_price)
            .cloned()
            .collect(),
        asks: book.asks.clone(),
    }
}

/// Aggregate liquidity on both sides of a book.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DepthSummary {
    pub resource: String,
    pub highest_bid: Option<Decimal>,
    pub lowest_ask: Option<Decimal>,
    pub spread: Option<Decimal>,
    pub spread_pct: Option<Decimal>,
    /// Cost of buying every listed ask.
    pub total_ask_cost: Decimal,
    pub total_ask_quantity: Decimal,
    /// Revenue from selling into every listed bid.
    pub total_bid_revenue: Decimal,
    pub total_bid_quantity: Decimal,
}

fn notional(levels: &[OrderLevel]) -> (Decimal, Decimal) {
    levels.iter().fold((Decimal::ZERO, Decimal::ZERO), |(value, qty), l| {
        (value + l.price * l.quantity, qty + l.quantity)
    })
}

pub fn depth_summary(book: &OrderBook) -> DepthSummary {
    let (total_ask_cost, total_ask_quantity) = notional(&book.asks);
    let (total_bid_revenue, total_bid_quantity) = notional(&book.bids);
    DepthSummary {
        resource: book.resource.clone(),
        highest_bid: book.highest_bid(),
        lowest_ask: book.lowest_ask(),
        spread: spread(book),
        spread_pct: spread_pct(book),
        total_ask_cost,
        total_ask_quantity,
        total_bid_revenue,
        total_bid_quantity,
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum Side {
    Bid,
    Ask,
}

/// One step of the cumulative depth chart.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DepthPoint {
    pub side: Side,
    pub price: Decimal,
    pub cumulative_quantity: Decimal,
}

/// Cumulative quantity walking away from the touch: bids from the highest
/// price down, then asks from the lowest price up.
pub fn depth_curve(book: &OrderBook) -> Vec<DepthPoint> {
    let mut bids = book.bids.clone();
    bids.sort_by(|a, b| b.price.cmp(&a.price));
    let mut asks = book.asks.clone();
    asks.sort_by(|a, b| a.price.cmp(&b.price));

    let mut points = Vec::with_capacity(bids.len() + asks.len());
    for (side, levels) in [(Side::Bid, bids), (Side::Ask, asks)] {
        let mut running = Decimal::ZERO;
        for level in levels {
            running += level.quantity;
            points.push(DepthPoint {
                side,
                price: level.price,
                cumulative_quantity: running,
            });
        }
    }
    points
}
