use chrono::{Duration, TimeZone, Utc};
use market_core::{AnalyticsConfig, Catalog, MarketGateway, StaticGateway};
use market_econ::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::path::PathBuf;

fn snapshot() -> StaticGateway {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../assets/snapshot.yaml");
    StaticGateway::load(path).expect("snapshot fixture")
}

fn params() -> ReportParams {
    let cfg = AnalyticsConfig::default();
    ReportParams {
        cost_per_pp: cfg.cost_per_pp,
        production_bonus: cfg.production_bonus,
        pricing: InputPricing::Produced,
        use_deposit_bonus: cfg.use_deposit_bonus,
    }
}

#[test]
fn roi_report_over_builtin_catalog() {
    let catalog = Catalog::builtin().unwrap();
    let gw = snapshot();
    let prices = fetch_prices(&gw);
    let report = roi_report(&catalog, &prices, &params()).unwrap();

    assert_eq!(report.rows.len(), catalog.len());
    assert!(report.skipped.is_empty());
    // fish: cost 0.1, price 0.2
    assert_eq!(report.rows[0].resource, "fish");
    assert_eq!(report.rows[0].roi, Roi::Finite(dec!(100)));

    let bread = report.rows.iter().find(|r| r.resource == "bread").unwrap();
    assert_eq!(bread.production_cost, dec!(2.0));
    assert!(!bread.profitable);
    assert_eq!(bread.roi, Roi::Finite(dec!(-10)));

    let steak = report.rows.iter().find(|r| r.resource == "steak").unwrap();
    assert_eq!(steak.production_cost, dec!(4.0));
}

#[test]
fn worker_report_from_user_roster() {
    let catalog = Catalog::builtin().unwrap();
    let gw = snapshot();
    let prices = fetch_prices(&gw);
    let roster = collect_worker_records(&gw, "demo-user");
    assert_eq!(roster.len(), 4);

    let report = worker_report(&catalog, &prices, &roster, &params()).unwrap();
    assert_eq!(report.workers.len(), 4);
    assert_eq!(report.workers[0].worker_id, "chen");
    assert_eq!(report.workers[0].production_cost, dec!(0.72));

    let bram = report.workers.iter().find(|w| w.worker_id == "bram").unwrap();
    assert_eq!(bram.wage_level, WageLevel::Above);
    assert!(!bram.profitable);

    let ammo_co = report
        .companies
        .iter()
        .find(|c| c.company_id == "co-ammo")
        .unwrap();
    assert_eq!(ammo_co.worker_count, 3);
    assert_eq!(ammo_co.company_name, "Northside Munitions");
    assert!(ammo_co.profitable);
    assert_eq!(report.companies.len(), 2);
}

#[test]
fn volume_and_depth_from_snapshot() {
    let gw = snapshot();
    let now = Utc.with_ymd_and_hms(2026, 10, 15, 12, 0, 0).unwrap();
    let volume = rolling_volume(&gw, "ammo", now, Duration::hours(24), 10);
    assert_eq!(volume.total_quantity, dec!(295));
    assert_eq!(volume.notional, dec!(292.4));
    assert_eq!(volume.pages_fetched, 3);
    assert_eq!(volume.stop, VolumeStop::WindowReached);

    let book = gw.get_order_book("bread", 10).unwrap();
    let summary = depth_summary(&without_dust(&book, dec!(0.001)));
    assert_eq!(summary.spread, Some(dec!(0.07)));
    assert_eq!(summary.total_bid_quantity, dec!(465));
    assert_eq!(depth_curve(&without_dust(&book, dec!(0.001))).len(), 6);
}

#[test]
fn break_even_with_deposit_bonus() {
    let catalog = Catalog::builtin().unwrap();
    let prices = fetch_prices(&snapshot());
    let plain = max_sustainable_cost(&catalog, "fish", Decimal::ZERO, &prices, false).unwrap();
    let deposit = max_sustainable_cost(&catalog, "fish", Decimal::ZERO, &prices, true).unwrap();
    assert_eq!(plain, dec!(0.2));
    // 0.2 / (1 / 1.3)
    assert!((deposit - dec!(0.26)).abs() < dec!(0.000000001));
}
