//! Trading volume over a rolling window from the paginated trade feed.

use chrono::{DateTime, Duration, Utc};
use market_core::MarketGateway;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, warn};

/// Why the feed walk ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum VolumeStop {
    /// Reached a trade older than the window start.
    WindowReached,
    /// The feed had no further pages.
    HistoryExhausted,
    /// Stopped at the page bound; the sum may be incomplete.
    PageLimit,
    /// A page fetch failed; the sum covers the pages read before it.
    FetchFailed,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct VolumeSummary {
    pub resource: String,
    pub window_start: DateTime<Utc>,
    pub total_quantity: Decimal,
    /// Sum of `price * quantity` over trades that carry a price.
    pub notional: Decimal,
    pub trade_count: usize,
    pub pages_fetched: usize,
    pub stop: VolumeStop,
}

impl VolumeSummary {
    /// True when the window was fully covered.
    pub fn is_complete(&self) -> bool {
        matches!(
            self.stop,
            VolumeStop::WindowReached | VolumeStop::HistoryExhausted
        )
    }
}

/// Sum traded quantity for `resource` between `now - window` and `now`.
///
/// The feed is newest first, so the walk stops at the first trade older
/// than the window start. At most `max_pages` pages are requested. A
/// negative window is treated as empty; one reaching past the earliest
/// representable time starts there. Sums saturate rather than overflow.
pub fn rolling_volume<G: MarketGateway + ?Sized>(
    gateway: &G,
    resource: &str,
    now: DateTime<Utc>,
    window: Duration,
    max_pages: usize,
) -> VolumeSummary {
    let window_start = now
        .checked_sub_signed(window.max(Duration::zero()))
        .unwrap_or(DateTime::<Utc>::MIN_UTC);
    let mut total_quantity = Decimal::ZERO;
    let mut notional = Decimal::ZERO;
    let mut trade_count = 0;
    let mut pages_fetched = 0;
    let mut cursor: Option<String> = None;

    let stop = 'pages: loop {
        if pages_fetched >= max_pages {
            warn!(resource, max_pages, "trade history page bound reached");
            break VolumeStop::PageLimit;
        }
        let page = match gateway.get_trade_page(resource, cursor.as_deref()) {
            Ok(page) => page,
            Err(e) => {
                warn!(resource, error = %e, "trade history fetch failed");
                break VolumeStop::FetchFailed;
            }
        };
        pages_fetched += 1;
        debug!(
            resource,
            page = pages_fetched,
            items = page.items.len(),
            "trade page"
        );

        for trade in &page.items {
            if trade.timestamp < window_start {
                break 'pages VolumeStop::WindowReached;
            }
            total_quantity = total_quantity.saturating_add(trade.quantity);
            if let Some(price) = trade.price {
                notional = notional.saturating_add(price.saturating_mul(trade.quantity));
            }
            trade_count += 1;
        }

        match page.next_cursor {
            Some(next) => cursor = Some(next),
            None => break VolumeStop::HistoryExhausted,
        }
    };

    VolumeSummary {
        resource: resource.to_string(),
        window_start,
        total_quantity,
        notional,
        trade_count,
        pages_fetched,
        stop,
    }
}
