#![deny(warnings)]

//! Production economics over the recipe catalog.
//!
//! This crate provides:
//! - Recursive production cost with per-call memoization ([`CostEvaluator`])
//! - The break-even cost per production point ([`max_sustainable_cost`])
//! - ROI and worker/company profitability reports
//! - Order-book depth and rolling trade volume accessors

use rust_decimal::Decimal;
use thiserror::Error;

pub mod book;
pub mod cost;
pub mod report;
pub mod snapshot;
pub mod solver;
pub mod volume;

pub use book::{
    depth_curve, depth_summary, spread, spread_pct, without_dust, DepthPoint, DepthSummary, Side,
};
pub use cost::{production_cost, CostEvaluator, CostParams, InputPricing};
pub use report::{
    roi_report, worker_report, CompanyProfitability, ProfitabilityRecord, ReportParams, Roi,
    RoiReport, SkippedRow, WageLevel, WorkerProfitability, WorkerReport,
};
pub use snapshot::{collect_worker_records, fetch_prices};
pub use solver::{max_sustainable_cost, DEPOSIT_BONUS};
pub use volume::{rolling_volume, VolumeStop, VolumeSummary};

/// Errors produced by the cost engine. All of them are per-row: report
/// builders skip the affected row and carry on.
#[derive(Debug, Error, PartialEq)]
pub enum EconError {
    #[error("resource not found in catalog: {0}")]
    ResourceNotFound(String),
    /// Recursion re-entered a resource already being evaluated.
    #[error("cyclic recipe: {}", .0.join(" -> "))]
    CyclicRecipe(Vec<String>),
    /// A market price needed for the calculation is unknown.
    #[error("no market price for {missing} (needed for {resource})")]
    Indeterminate { resource: String, missing: String },
    #[error("invalid {name}: {value}")]
    InvalidParameter { name: &'static str, value: Decimal },
    /// An intermediate value left the range of `Decimal`.
    #[error("arithmetic overflow while costing {0}")]
    Overflow(String),
}

/// Production points needed per unit once the bonus is applied, or `None`
/// if the result does not fit in a `Decimal`.
pub fn effective_pp(base_pp: Decimal, production_bonus: Decimal) -> Option<Decimal> {
    Decimal::ONE
        .checked_add(production_bonus)
        .and_then(|divisor| base_pp.checked_div(divisor))
}
