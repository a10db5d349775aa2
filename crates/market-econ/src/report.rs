//! Profitability reports built on the cost evaluator and solver.

use crate::{max_sustainable_cost, CostEvaluator, CostParams, EconError, InputPricing};
use market_core::{Catalog, PriceMap, WorkerRecord};
use rust_decimal::Decimal;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, info};

/// Return relative to production cost, `profit / cost * 100`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum Roi {
    Finite(Decimal),
    /// Free to produce and sells for something.
    Infinite,
    /// Free to produce and sells for nothing.
    Undefined,
}

impl Roi {
    /// A ratio too large for `Decimal` saturates at `Decimal::MAX`/`MIN`.
    pub fn from_profit(profit: Decimal, cost: Decimal) -> Self {
        if cost.is_zero() {
            if profit > Decimal::ZERO {
                Roi::Infinite
            } else {
                Roi::Undefined
            }
        } else {
            let pct = profit
                .checked_div(cost)
                .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED));
            Roi::Finite(pct.unwrap_or_else(|| {
                if profit.is_sign_negative() != cost.is_sign_negative() {
                    Decimal::MIN
                } else {
                    Decimal::MAX
                }
            }))
        }
    }

    pub fn value(&self) -> Option<Decimal> {
        match self {
            Roi::Finite(v) => Some(*v),
            _ => None,
        }
    }
}

/// `Infinite` ranks above every finite value, `Undefined` below.
impl Ord for Roi {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Roi::Finite(a), Roi::Finite(b)) => a.cmp(b),
            (Roi::Infinite, Roi::Infinite) | (Roi::Undefined, Roi::Undefined) => Ordering::Equal,
            (Roi::Infinite, _) | (_, Roi::Undefined) => Ordering::Greater,
            (Roi::Undefined, _) | (_, Roi::Infinite) => Ordering::Less,
        }
    }
}

impl PartialOrd for Roi {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Roi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Roi::Finite(v) => write!(f, "{:.1}%", v),
            Roi::Infinite => write!(f, "inf"),
            Roi::Undefined => write!(f, "N/A"),
        }
    }
}

/// Caller-supplied parameters shared by both report shapes.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct ReportParams {
    /// Reference labor price per PP.
    pub cost_per_pp: Decimal,
    pub production_bonus: Decimal,
    pub pricing: InputPricing,
    /// Add the deposit bonus to raw materials in break-even figures.
    pub use_deposit_bonus: bool,
}

impl ReportParams {
    pub fn cost_params(&self) -> Result<CostParams, EconError> {
        CostParams::new(self.cost_per_pp, self.production_bonus)
    }
}

/// A row left out of a report and why.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SkippedRow {
    pub subject: String,
    pub reason: String,
}

impl SkippedRow {
    fn new(subject: impl Into<String>, reason: impl fmt::Display) -> Self {
        let row = Self {
            subject: subject.into(),
            reason: reason.to_string(),
        };
        debug!(subject = %row.subject, reason = %row.reason, "row skipped");
        row
    }
}

/// One resource's profitability at the reference labor price.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ProfitabilityRecord {
    pub resource: String,
    pub market_price: Decimal,
    pub production_cost: Decimal,
    pub profit: Decimal,
    pub roi: Roi,
    pub profitable: bool,
    /// Break-even cost per PP, absent when an input price is unknown.
    pub max_cost_per_pp: Option<Decimal>,
    /// Whether the reference cost per PP is at or under the break-even.
    pub sustainable: Option<bool>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct RoiReport {
    /// Ranked by ROI, best first.
    pub rows: Vec<ProfitabilityRecord>,
    pub skipped: Vec<SkippedRow>,
}

fn break_even(
    catalog: &Catalog,
    resource: &str,
    prices: &PriceMap,
    params: &ReportParams,
) -> Option<Decimal> {
    match max_sustainable_cost(
        catalog,
        resource,
        params.production_bonus,
        prices,
        params.use_deposit_bonus,
    ) {
        Ok(max) => Some(max),
        Err(e) => {
            debug!(resource, error = %e, "break-even indeterminate");
            None
        }
    }
}

/// Profitability of every catalog resource that has a market price.
///
/// All rows share one evaluator, so each resource is costed once per
/// report. Only invalid parameters fail the whole report.
pub fn roi_report(
    catalog: &Catalog,
    prices: &PriceMap,
    params: &ReportParams,
) -> Result<RoiReport, EconError> {
    let overrides = params.pricing.overrides(catalog, prices);
    let mut evaluator =
        CostEvaluator::new(catalog, params.cost_params()?)?.with_overrides(overrides.as_ref());

    let mut report = RoiReport::default();
    for recipe in catalog.iter() {
        let Some(&market_price) = prices.get(&recipe.code) else {
            report
                .skipped
                .push(SkippedRow::new(&recipe.code, "no market price"));
            continue;
        };
        let costed = evaluator.evaluate(&recipe.code).and_then(|cost| {
            market_price
                .checked_sub(cost)
                .map(|profit| (cost, profit))
                .ok_or_else(|| EconError::Overflow(recipe.code.clone()))
        });
        let (production_cost, profit) = match costed {
            Ok(costed) => costed,
            Err(e) => {
                report.skipped.push(SkippedRow::new(&recipe.code, e));
                continue;
            }
        };
        let max_cost_per_pp = break_even(catalog, &recipe.code, prices, params);
        report.rows.push(ProfitabilityRecord {
            resource: recipe.code.clone(),
            market_price,
            production_cost,
            profit,
            roi: Roi::from_profit(profit, production_cost),
            profitable: profit > Decimal::ZERO,
            max_cost_per_pp,
            sustainable: max_cost_per_pp.map(|max| params.cost_per_pp <= max),
        });
    }
    report
        .rows
        .sort_by(|a, b| b.roi.cmp(&a.roi).then_with(|| a.resource.cmp(&b.resource)));
    info!(
        rows = report.rows.len(),
        skipped = report.skipped.len(),
        "roi report built"
    );
    Ok(report)
}

/// Wage relative to the reference cost per PP.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum WageLevel {
    Above,
    Below,
}

impl WageLevel {
    /// A wage equal to the reference counts as `Below`.
    pub fn classify(wage: Decimal, reference: Decimal) -> Self {
        if wage > reference {
            WageLevel::Above
        } else {
            WageLevel::Below
        }
    }
}

/// Profitability of one worker's output when their wage is the cost per PP.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct WorkerProfitability {
    pub worker_id: String,
    pub company_id: String,
    pub company_name: String,
    pub resource: String,
    pub wage: Decimal,
    pub market_price: Decimal,
    pub production_cost: Decimal,
    pub profit: Decimal,
    pub profit_pct: Roi,
    pub profitable: bool,
    pub wage_level: WageLevel,
    /// Highest wage at which the output still breaks even.
    pub max_wage: Option<Decimal>,
    pub sustainable: Option<bool>,
}

/// Per-company aggregate, costed at the average wage.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CompanyProfitability {
    pub company_id: String,
    pub company_name: String,
    pub resource: String,
    pub worker_count: usize,
    pub average_wage: Decimal,
    pub market_price: Decimal,
    pub production_cost: Decimal,
    pub profit: Decimal,
    pub profitable: bool,
    /// `profit / price * 100`; absent for a zero price or when the ratio
    /// does not fit in a `Decimal`.
    pub margin_pct: Option<Decimal>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct WorkerReport {
    /// Ranked by profit percentage, best first.
    pub workers: Vec<WorkerProfitability>,
    /// Ranked by margin, best first.
    pub companies: Vec<CompanyProfitability>,
    pub skipped: Vec<SkippedRow>,
}

struct CompanyAcc<'r> {
    first: &'r WorkerRecord,
    wages: Vec<Decimal>,
    market_price: Decimal,
}

fn wage_cost(
    catalog: &Catalog,
    resource: &str,
    wage: Decimal,
    production_bonus: Decimal,
    overrides: Option<&PriceMap>,
) -> Result<Decimal, EconError> {
    // A new wage is a new parameter set, so every call gets a cold cache.
    CostEvaluator::new(catalog, CostParams::new(wage, production_bonus)?)?
        .with_overrides(overrides)
        .evaluate(resource)
}

/// Worker- and company-level profitability, using each wage as the cost
/// per PP.
pub fn worker_report(
    catalog: &Catalog,
    prices: &PriceMap,
    workers: &[WorkerRecord],
    params: &ReportParams,
) -> Result<WorkerReport, EconError> {
    params.cost_params()?;
    let overrides = params.pricing.overrides(catalog, prices);
    let mut report = WorkerReport::default();
    let mut companies: BTreeMap<&str, CompanyAcc> = BTreeMap::new();
    let mut break_evens: BTreeMap<&str, Option<Decimal>> = BTreeMap::new();

    for record in workers {
        let Some(&market_price) = prices.get(&record.resource) else {
            report.skipped.push(SkippedRow::new(
                &record.worker_id,
                format!("no market price for {}", record.resource),
            ));
            continue;
        };
        let costed = wage_cost(
            catalog,
            &record.resource,
            record.wage,
            params.production_bonus,
            overrides.as_ref(),
        )
        .and_then(|cost| {
            market_price
                .checked_sub(cost)
                .map(|profit| (cost, profit))
                .ok_or_else(|| EconError::Overflow(record.resource.clone()))
        });
        let (production_cost, profit) = match costed {
            Ok(costed) => costed,
            Err(e) => {
                report.skipped.push(SkippedRow::new(&record.worker_id, e));
                continue;
            }
        };
        let max_wage = *break_evens
            .entry(record.resource.as_str())
            .or_insert_with(|| break_even(catalog, &record.resource, prices, params));
        report.workers.push(WorkerProfitability {
            worker_id: record.worker_id.clone(),
            company_id: record.company_id.clone(),
            company_name: record.company_name.clone(),
            resource: record.resource.clone(),
            wage: record.wage,
            market_price,
            production_cost,
            profit,
            profit_pct: Roi::from_profit(profit, production_cost),
            profitable: profit > Decimal::ZERO,
            wage_level: WageLevel::classify(record.wage, params.cost_per_pp),
            max_wage,
            sustainable: max_wage.map(|max| record.wage <= max),
        });
        companies
            .entry(record.company_id.as_str())
            .or_insert_with(|| CompanyAcc {
                first: record,
                wages: Vec::new(),
                market_price,
            })
            .wages
            .push(record.wage);
    }

    for (company_id, acc) in companies {
        let worker_count = acc.wages.len();
        let overflow = || EconError::Overflow(acc.first.resource.clone());
        let costed = acc
            .wages
            .iter()
            .try_fold(Decimal::ZERO, |sum, wage| sum.checked_add(*wage))
            .and_then(|total| total.checked_div(Decimal::from(worker_count)))
            .ok_or_else(overflow)
            .and_then(|average_wage| {
                let cost = wage_cost(
                    catalog,
                    &acc.first.resource,
                    average_wage,
                    params.production_bonus,
                    overrides.as_ref(),
                )?;
                let profit = acc.market_price.checked_sub(cost).ok_or_else(overflow)?;
                Ok((average_wage, cost, profit))
            });
        let (average_wage, production_cost, profit) = match costed {
            Ok(costed) => costed,
            Err(e) => {
                report.skipped.push(SkippedRow::new(company_id, e));
                continue;
            }
        };
        let margin_pct = profit
            .checked_div(acc.market_price)
            .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED));
        report.companies.push(CompanyProfitability {
            company_id: company_id.to_string(),
            company_name: acc.first.company_name.clone(),
            resource: acc.first.resource.clone(),
            worker_count,
            average_wage,
            market_price: acc.market_price,
            production_cost,
            profit,
            profitable: profit > Decimal::ZERO,
            margin_pct,
        });
    }

    report.workers.sort_by(|a, b| {
        b.profit_pct
            .cmp(&a.profit_pct)
            .then_with(|| a.worker_id.cmp(&b.worker_id))
    });
    // `None` sorts below any margin.
    report.companies.sort_by(|a, b| {
        b.margin_pct
            .cmp(&a.margin_pct)
            .then_with(|| a.company_id.cmp(&b.company_id))
    });
    info!(
        workers = report.workers.len(),
        companies = report.companies.len(),
        skipped = report.skipped.len(),
        "worker report built"
    );
    Ok(report)
}
