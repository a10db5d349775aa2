#![deny(warnings)]

//! Command-line front end for the market analytics engine.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use market_core::{AnalyticsConfig, Catalog, MarketGateway, PriceMap, StaticGateway};
use market_econ::{
    collect_worker_records, depth_curve, depth_summary, fetch_prices, max_sustainable_cost,
    roi_report, rolling_volume, without_dust, EconError, InputPricing, ReportParams, Side,
};
use market_gateway::TrpcGateway;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("GIT_SHA"),
    " ",
    env!("BUILD_DATE"),
    ")"
);

#[derive(Parser)]
#[command(name = "market-cli")]
#[command(about = "Production cost and market analytics for the trading economy")]
#[command(version = VERSION)]
struct Cli {
    /// YAML file with analytics settings
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Read market data from a YAML snapshot instead of the live API
    #[arg(long, global = true)]
    snapshot: Option<PathBuf>,

    /// Reference cost of one production point
    #[arg(long, global = true)]
    cost_per_pp: Option<Decimal>,

    /// Production bonus as a fraction (0.25 = +25%)
    #[arg(long, global = true)]
    bonus: Option<Decimal>,

    /// Apply the raw-material deposit bonus in break-even figures
    #[arg(long, global = true, conflicts_with = "no_deposit_bonus")]
    deposit_bonus: bool,

    /// Ignore the deposit bonus even if the config enables it
    #[arg(long, global = true)]
    no_deposit_bonus: bool,

    /// How ingredients are priced
    #[arg(long, value_enum, global = true)]
    pricing: Option<Pricing>,

    /// Print JSON instead of a table
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Pricing {
    Produced,
    MarketRaw,
    Market,
}

impl From<Pricing> for InputPricing {
    fn from(p: Pricing) -> Self {
        match p {
            Pricing::Produced => InputPricing::Produced,
            Pricing::MarketRaw => InputPricing::MarketRaw,
            Pricing::Market => InputPricing::Market,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Order-book spread and depth for a resource
    Depth {
        resource: String,

        /// Levels to request per side
        #[arg(short, long)]
        limit: Option<u32>,

        /// Also print the cumulative depth curve
        #[arg(long)]
        curve: bool,
    },

    /// Rank every resource by return on production cost
    Roi {
        /// Hide unprofitable rows
        #[arg(long)]
        profitable_only: bool,
    },

    /// Highest cost per PP at which a resource still breaks even
    MaxCost { resource: String },

    /// Profitability of every worker employed by a user's companies
    Workers { user_id: String },

    /// Traded quantity over the trailing window
    Volume {
        resource: String,

        /// Window length in hours
        #[arg(long)]
        hours: Option<i64>,
    },

    /// List the recipe catalog
    Catalog,
}

fn load_config(cli: &Cli) -> Result<AnalyticsConfig> {
    let mut cfg = match &cli.config {
        Some(path) => AnalyticsConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => AnalyticsConfig::default(),
    };
    if let Some(v) = cli.cost_per_pp {
        cfg.cost_per_pp = v;
    }
    if let Some(v) = cli.bonus {
        cfg.production_bonus = v;
    }
    if cli.deposit_bonus {
        cfg.use_deposit_bonus = true;
    }
    if cli.no_deposit_bonus {
        cfg.use_deposit_bonus = false;
    }
    match cli.command {
        Commands::Depth {
            limit: Some(limit),
            ..
        } => cfg.order_limit = limit,
        Commands::Volume {
            hours: Some(hours),
            ..
        } => cfg.volume_window_hours = hours,
        _ => {}
    }
    cfg.validate().context("invalid settings")?;
    Ok(cfg)
}

fn load_catalog(cfg: &AnalyticsConfig) -> Result<Catalog> {
    match &cfg.catalog_path {
        Some(path) => {
            Catalog::load(path).with_context(|| format!("loading catalog {}", path.display()))
        }
        None => Catalog::builtin().context("built-in catalog"),
    }
}

fn gateway(cli: &Cli, cfg: &AnalyticsConfig) -> Result<Box<dyn MarketGateway>> {
    match &cli.snapshot {
        Some(path) => {
            info!(path = %path.display(), "using offline snapshot");
            let gw = StaticGateway::load(path)
                .with_context(|| format!("loading snapshot {}", path.display()))?;
            Ok(Box::new(gw))
        }
        None => {
            info!(url = %cfg.api_base_url, "using live API");
            Ok(Box::new(TrpcGateway::from_config(cfg)?))
        }
    }
}

/// Break-even cost per PP, or `None` when a needed price is unknown.
fn max_cost(
    catalog: &Catalog,
    resource: &str,
    cfg: &AnalyticsConfig,
    prices: &PriceMap,
) -> Result<Option<Decimal>> {
    match max_sustainable_cost(
        catalog,
        resource,
        cfg.production_bonus,
        prices,
        cfg.use_deposit_bonus,
    ) {
        Ok(max) => Ok(Some(max)),
        Err(EconError::Indeterminate { missing, .. }) => {
            warn!(resource, missing = %missing, "no market price, break-even unknown");
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn fmt_dec(d: Decimal) -> String {
    d.round_dp(4).normalize().to_string()
}

fn fmt_opt(d: Option<Decimal>) -> String {
    d.map(fmt_dec).unwrap_or_else(|| "-".to_string())
}

fn main() -> Result<()> {
    // Logging setup
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = load_config(&cli)?;
    let params = ReportParams {
        cost_per_pp: cfg.cost_per_pp,
        production_bonus: cfg.production_bonus,
        pricing: cli.pricing.map(InputPricing::from).unwrap_or_default(),
        use_deposit_bonus: cfg.use_deposit_bonus,
    };

    match &cli.command {
        Commands::Catalog => {
            let catalog = load_catalog(&cfg)?;
            if cli.json {
                return print_json(&catalog.iter().collect::<Vec<_>>());
            }
            println!("{:<12} {:>8}  ingredients", "resource", "base_pp");
            for recipe in catalog.iter() {
                let ingredients = recipe
                    .ingredients
                    .iter()
                    .map(|(code, qty)| format!("{} x{}", code, fmt_dec(*qty)))
                    .collect::<Vec<_>>()
                    .join(", ");
                let ingredients = if ingredients.is_empty() {
                    "(raw)".to_string()
                } else {
                    ingredients
                };
                println!("{:<12} {:>8}  {}", recipe.code, fmt_dec(recipe.base_pp), ingredients);
            }
        }

        Commands::Depth {
            resource,
            curve,
            ..
        } => {
            let gw = gateway(&cli, &cfg)?;
            let book = gw
                .get_order_book(resource, cfg.order_limit)
                .with_context(|| format!("order book for {resource}"))?;
            let book = without_dust(&book, cfg.min_bid_price);
            let summary = depth_summary(&book);
            let points = depth_curve(&book);
            if cli.json {
                return print_json(&serde_json::json!({ "summary": summary, "curve": points }));
            }
            println!("{}", summary.resource);
            println!("  highest bid   {}", fmt_opt(summary.highest_bid));
            println!("  lowest ask    {}", fmt_opt(summary.lowest_ask));
            println!(
                "  spread        {} ({}%)",
                fmt_opt(summary.spread),
                fmt_opt(summary.spread_pct)
            );
            println!(
                "  asks          {} units, {} to clear",
                fmt_dec(summary.total_ask_quantity),
                fmt_dec(summary.total_ask_cost)
            );
            println!(
                "  bids          {} units, {} if filled",
                fmt_dec(summary.total_bid_quantity),
                fmt_dec(summary.total_bid_revenue)
            );
            if *curve {
                println!("{:<5} {:>10} {:>12}", "side", "price", "cumulative");
                for p in &points {
                    let side = match p.side {
                        Side::Bid => "bid",
                        Side::Ask => "ask",
                    };
                    println!(
                        "{:<5} {:>10} {:>12}",
                        side,
                        fmt_dec(p.price),
                        fmt_dec(p.cumulative_quantity)
                    );
                }
            }
        }

        Commands::Roi { profitable_only } => {
            let catalog = load_catalog(&cfg)?;
            let gw = gateway(&cli, &cfg)?;
            let prices = fetch_prices(gw.as_ref());
            let mut report = roi_report(&catalog, &prices, &params)?;
            if *profitable_only {
                report.rows.retain(|r| r.profitable);
            }
            if cli.json {
                return print_json(&report);
            }
            println!(
                "{:<12} {:>10} {:>10} {:>10} {:>9} {:>10}",
                "resource", "price", "cost", "profit", "roi", "max/pp"
            );
            for row in &report.rows {
                println!(
                    "{:<12} {:>10} {:>10} {:>10} {:>9} {:>10}",
                    row.resource,
                    fmt_dec(row.market_price),
                    fmt_dec(row.production_cost),
                    fmt_dec(row.profit),
                    row.roi.to_string(),
                    fmt_opt(row.max_cost_per_pp)
                );
            }
            for skipped in &report.skipped {
                println!("skipped {}: {}", skipped.subject, skipped.reason);
            }
        }

        Commands::MaxCost { resource } => {
            let catalog = load_catalog(&cfg)?;
            let gw = gateway(&cli, &cfg)?;
            let prices = fetch_prices(gw.as_ref());
            let max = max_cost(&catalog, resource, &cfg, &prices)?;
            let sustainable = max.map(|max| cfg.cost_per_pp <= max);
            if cli.json {
                return print_json(&serde_json::json!({
                    "resource": resource,
                    "max_cost_per_pp": max,
                    "cost_per_pp": cfg.cost_per_pp,
                    "sustainable": sustainable,
                }));
            }
            let verdict = match sustainable {
                Some(true) => "sustainable",
                Some(false) => "loss-making",
                None => "N/A",
            };
            println!(
                "{resource}: break-even at {} per PP (current {}, {})",
                max.map(fmt_dec).unwrap_or_else(|| "N/A".to_string()),
                fmt_dec(cfg.cost_per_pp),
                verdict
            );
        }

        Commands::Workers { user_id } => {
            let catalog = load_catalog(&cfg)?;
            let gw = gateway(&cli, &cfg)?;
            let prices = fetch_prices(gw.as_ref());
            let roster = collect_worker_records(gw.as_ref(), user_id);
            if roster.is_empty() {
                warn!(user_id = %user_id, "no workers found");
            }
            let report = market_econ::worker_report(&catalog, &prices, &roster, &params)?;
            if cli.json {
                return print_json(&report);
            }
            println!(
                "{:<14} {:<20} {:<10} {:>7} {:>9} {:>9} {:>9}",
                "worker", "company", "resource", "wage", "cost", "profit", "profit%"
            );
            for w in &report.workers {
                println!(
                    "{:<14} {:<20} {:<10} {:>7} {:>9} {:>9} {:>9}",
                    w.worker_id,
                    w.company_name,
                    w.resource,
                    fmt_dec(w.wage),
                    fmt_dec(w.production_cost),
                    fmt_dec(w.profit),
                    w.profit_pct.to_string()
                );
            }
            println!();
            println!(
                "{:<20} {:<10} {:>7} {:>9} {:>9} {:>9}",
                "company", "resource", "workers", "avg wage", "profit", "margin%"
            );
            for c in &report.companies {
                println!(
                    "{:<20} {:<10} {:>7} {:>9} {:>9} {:>9}",
                    c.company_name,
                    c.resource,
                    c.worker_count,
                    fmt_dec(c.average_wage),
                    fmt_dec(c.profit),
                    fmt_opt(c.margin_pct)
                );
            }
            for skipped in &report.skipped {
                println!("skipped {}: {}", skipped.subject, skipped.reason);
            }
        }

        Commands::Volume { resource, .. } => {
            let gw = gateway(&cli, &cfg)?;
            let summary = rolling_volume(
                gw.as_ref(),
                resource,
                chrono::Utc::now(),
                cfg.volume_window(),
                cfg.max_trade_pages,
            );
            if !summary.is_complete() {
                warn!(stop = ?summary.stop, "volume is a lower bound");
            }
            if cli.json {
                return print_json(&summary);
            }
            println!(
                "{}: {} units in {} trades since {} (notional {}, {} pages)",
                summary.resource,
                fmt_dec(summary.total_quantity),
                summary.trade_count,
                summary.window_start.format("%Y-%m-%d %H:%M UTC"),
                fmt_dec(summary.notional),
                summary.pages_fetched
            );
        }
    }

    Ok(())
}
