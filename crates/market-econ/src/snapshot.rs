//! Fetch helpers that turn gateway failures into partial data.

use market_core::{MarketGateway, PriceMap, WorkerRecord};
use tracing::{info, warn};

/// Current prices, or an empty map if the fetch fails.
pub fn fetch_prices<G: MarketGateway + ?Sized>(gateway: &G) -> PriceMap {
    match gateway.get_prices() {
        Ok(prices) => prices,
        Err(e) => {
            warn!(error = %e, "price snapshot unavailable");
            PriceMap::new()
        }
    }
}

/// Every worker of every company owned by `user_id`.
///
/// Companies whose details or roster cannot be fetched are skipped.
pub fn collect_worker_records<G: MarketGateway + ?Sized>(
    gateway: &G,
    user_id: &str,
) -> Vec<WorkerRecord> {
    let company_ids = match gateway.get_user_companies(user_id) {
        Ok(ids) => ids,
        Err(e) => {
            warn!(user_id, error = %e, "company list unavailable");
            return Vec::new();
        }
    };

    let mut records = Vec::new();
    for company_id in &company_ids {
        let company = match gateway.get_company(company_id) {
            Ok(c) => c,
            Err(e) => {
                warn!(company_id, error = %e, "skipping company");
                continue;
            }
        };
        let workers = match gateway.get_company_workers(company_id) {
            Ok(w) => w,
            Err(e) => {
                warn!(company_id, error = %e, "skipping company roster");
                continue;
            }
        };
        records.extend(workers.into_iter().map(|w| WorkerRecord {
            worker_id: w.worker_id,
            company_id: company.id.clone(),
            company_name: company.name.clone(),
            resource: company.resource.clone(),
            wage: w.wage,
        }));
    }
    info!(
        user_id,
        companies = company_ids.len(),
        workers = records.len(),
        "collected worker roster"
    );
    records
}
