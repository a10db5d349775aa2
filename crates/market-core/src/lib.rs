#![deny(warnings)]

//! Core domain models and invariants for the market analytics engine.
//!
//! This crate defines the recipe catalog, market snapshot types and the
//! gateway contract shared by the analytics and transport crates, with
//! validation helpers that reject malformed recipe data at start-up.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

pub mod config;
pub mod gateway;

pub use config::{AnalyticsConfig, ConfigError, MAX_VOLUME_WINDOW_HOURS};
pub use gateway::{GatewayError, MarketGateway, StaticGateway};

/// Current market price per resource code. Absent keys mean "unknown".
pub type PriceMap = BTreeMap<String, Decimal>;

const BUILTIN_RECIPES: &str = include_str!("../../../assets/recipes.yaml");

/// A production recipe for one resource.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    /// Resource code, e.g. "ammo".
    pub code: String,
    /// Production points per unit at zero bonus (> 0).
    pub base_pp: Decimal,
    /// Units of each ingredient consumed per unit produced (>= 0).
    /// Empty for raw materials.
    #[serde(default)]
    pub ingredients: BTreeMap<String, Decimal>,
}

impl Recipe {
    /// A recipe with no ingredients; add them with [`Recipe::with_ingredient`].
    pub fn new(code: impl Into<String>, base_pp: Decimal) -> Self {
        Self {
            code: code.into(),
            base_pp,
            ingredients: BTreeMap::new(),
        }
    }

    pub fn with_ingredient(mut self, code: impl Into<String>, quantity: Decimal) -> Self {
        self.ingredients.insert(code.into(), quantity);
        self
    }

    /// Raw materials have no ingredients and are extracted directly.
    pub fn is_raw(&self) -> bool {
        self.ingredients.is_empty()
    }
}

/// Catalog integrity errors. All of them are fatal at load time.
#[derive(Debug, Error, PartialEq)]
pub enum CatalogError {
    #[error("duplicate recipe for resource: {0}")]
    DuplicateResource(String),
    /// Base PP must be strictly positive.
    #[error("base PP for {0} must be > 0")]
    NonPositiveBasePp(String),
    /// Ingredient quantities must be non-negative.
    #[error("negative quantity of {ingredient} in recipe for {resource}")]
    NegativeQuantity { resource: String, ingredient: String },
    #[error("recipe for {resource} references unknown ingredient {ingredient}")]
    IngredientNotFound { resource: String, ingredient: String },
    /// The ingredient graph must be acyclic.
    #[error("cyclic recipe: {}", .0.join(" -> "))]
    CyclicRecipe(Vec<String>),
    #[error("could not read catalog: {0}")]
    Parse(String),
}

/// Validate a single recipe in isolation.
pub fn validate_recipe(recipe: &Recipe) -> Result<(), CatalogError> {
    if recipe.base_pp <= Decimal::ZERO {
        return Err(CatalogError::NonPositiveBasePp(recipe.code.clone()));
    }
    for (ingredient, qty) in &recipe.ingredients {
        if *qty < Decimal::ZERO {
            return Err(CatalogError::NegativeQuantity {
                resource: recipe.code.clone(),
                ingredient: ingredient.clone(),
            });
        }
    }
    Ok(())
}

#[derive(Clone, Copy, PartialEq)]
enum Mark {
    InProgress,
    Done,
}

/// Depth-first search for a cycle. Returns the offending path, first and
/// last element equal.
fn find_cycle(recipes: &BTreeMap<String, Recipe>) -> Option<Vec<String>> {
    let mut marks: BTreeMap<&str, Mark> = BTreeMap::new();
    let mut stack: Vec<&str> = Vec::new();
    for code in recipes.keys() {
        if let Some(cycle) = visit(code, recipes, &mut marks, &mut stack) {
            return Some(cycle);
        }
    }
    None
}

fn visit<'a>(
    code: &'a str,
    recipes: &'a BTreeMap<String, Recipe>,
    marks: &mut BTreeMap<&'a str, Mark>,
    stack: &mut Vec<&'a str>,
) -> Option<Vec<String>> {
    match marks.get(code) {
        Some(Mark::Done) => return None,
        Some(Mark::InProgress) => {
            let start = stack.iter().position(|c| *c == code).unwrap_or(0);
            let mut cycle: Vec<String> = stack[start..].iter().map(|c| c.to_string()).collect();
            cycle.push(code.to_string());
            return Some(cycle);
        }
        None => {}
    }
    marks.insert(code, Mark::InProgress);
    stack.push(code);
    if let Some(recipe) = recipes.get(code) {
        for ingredient in recipe.ingredients.keys() {
            if let Some(cycle) = visit(ingredient.as_str(), recipes, marks, stack) {
                return Some(cycle);
            }
        }
    }
    stack.pop();
    marks.insert(code, Mark::Done);
    None
}

#[derive(Deserialize)]
struct CatalogFile {
    recipes: Vec<Recipe>,
}

/// Immutable, validated set of recipes keyed by resource code.
#[derive(Clone, Debug, PartialEq)]
pub struct Catalog {
    recipes: BTreeMap<String, Recipe>,
}

impl Catalog {
    /// Build a catalog, rejecting duplicates, bad quantities, dangling
    /// ingredient references and cycles.
    pub fn new(recipes: Vec<Recipe>) -> Result<Self, CatalogError> {
        let mut map = BTreeMap::new();
        for recipe in recipes {
            validate_recipe(&recipe)?;
            if map.contains_key(&recipe.code) {
                return Err(CatalogError::DuplicateResource(recipe.code));
            }
            map.insert(recipe.code.clone(), recipe);
        }
        for recipe in map.values() {
            for ingredient in recipe.ingredients.keys() {
                if !map.contains_key(ingredient) {
                    return Err(CatalogError::IngredientNotFound {
                        resource: recipe.code.clone(),
                        ingredient: ingredient.clone(),
                    });
                }
            }
        }
        if let Some(cycle) = find_cycle(&map) {
            return Err(CatalogError::CyclicRecipe(cycle));
        }
        debug!(recipes = map.len(), "catalog validated");
        Ok(Self { recipes: map })
    }

    /// Build a catalog without any validation, so tests can feed malformed
    /// graphs to code that must still cope with them.
    #[cfg(any(test, feature = "test-util"))]
    pub fn new_unchecked(recipes: Vec<Recipe>) -> Self {
        Self {
            recipes: recipes.into_iter().map(|r| (r.code.clone(), r)).collect(),
        }
    }

    pub fn from_yaml_str(text: &str) -> Result<Self, CatalogError> {
        let file: CatalogFile =
            serde_yaml::from_str(text).map_err(|e| CatalogError::Parse(e.to_string()))?;
        Self::new(file.recipes)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|e| CatalogError::Parse(format!("{}: {e}", path.display())))?;
        Self::from_yaml_str(&text)
    }

    /// The recipe table shipped with the crate.
    pub fn builtin() -> Result<Self, CatalogError> {
        Self::from_yaml_str(BUILTIN_RECIPES)
    }

    pub fn get(&self, code: &str) -> Option<&Recipe> {
        self.recipes.get(code)
    }

    pub fn contains(&self, code: &str) -> bool {
        self.recipes.contains_key(code)
    }

    /// Recipes in resource-code order.
    pub fn iter(&self) -> impl Iterator<Item = &Recipe> {
        self.recipes.values()
    }

    pub fn len(&self) -> usize {
        self.recipes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recipes.is_empty()
    }
}

/// One price level of an order book.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrderLevel {
    pub price: Decimal,
    pub quantity: Decimal,
}

impl OrderLevel {
    pub fn new(price: Decimal, quantity: Decimal) -> Self {
        Self { price, quantity }
    }
}

/// Outstanding buy (bid) and sell (ask) orders for one resource.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderBook {
    pub resource: String,
    #[serde(default)]
    pub bids: Vec<OrderLevel>,
    #[serde(default)]
    pub asks: Vec<OrderLevel>,
}

impl OrderBook {
    pub fn highest_bid(&self) -> Option<Decimal> {
        self.bids.iter().map(|l| l.price).max()
    }

    pub fn lowest_ask(&self) -> Option<Decimal> {
        self.asks.iter().map(|l| l.price).min()
    }

    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }
}

/// A single executed trade from the history feed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TradeItem {
    pub timestamp: DateTime<Utc>,
    pub quantity: Decimal,
    #[serde(default)]
    pub price: Option<Decimal>,
}

/// One page of trade history, newest first. No cursor means no more pages.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TradePage {
    pub items: Vec<TradeItem>,
    #[serde(default)]
    pub next_cursor: Option<String>,
}

/// A worker employed by a company, paid `wage` per production point.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorkerInfo {
    pub worker_id: String,
    pub wage: Decimal,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CompanyInfo {
    pub id: String,
    pub name: String,
    /// Resource code the company produces.
    pub resource: String,
}

/// A worker joined with the company and resource they produce for.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorkerRecord {
    pub worker_id: String,
    pub company_id: String,
    pub company_name: String,
    pub resource: String,
    pub wage: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn ammo_catalog() -> Catalog {
        Catalog::new(vec![
            Recipe::new("lead", dec!(1)),
            Recipe::new("ammo", dec!(4)).with_ingredient("lead", dec!(4)),
        ])
        .unwrap()
    }

    #[test]
    fn builtin_catalog_is_valid() {
        let catalog = Catalog::builtin().unwrap();
        assert!(catalog.len() > 10);
        assert!(catalog.get("lead").unwrap().is_raw());
        let ammo = catalog.get("ammo").unwrap();
        assert_eq!(ammo.base_pp, dec!(4));
        assert_eq!(ammo.ingredients["lead"], dec!(4));
    }

    #[test]
    fn iteration_is_ordered_by_code() {
        let catalog = ammo_catalog();
        let codes: Vec<&str> = catalog.iter().map(|r| r.code.as_str()).collect();
        assert_eq!(codes, vec!["ammo", "lead"]);
    }

    #[test]
    fn rejects_self_reference() {
        let err = Catalog::new(vec![Recipe::new("ouro", dec!(1)).with_ingredient("ouro", dec!(1))])
            .unwrap_err();
        assert_eq!(
            err,
            CatalogError::CyclicRecipe(vec!["ouro".to_string(), "ouro".to_string()])
        );
    }

    #[test]
    fn rejects_transitive_cycle() {
        let err = Catalog::new(vec![
            Recipe::new("a", dec!(1)).with_ingredient("b", dec!(1)),
            Recipe::new("b", dec!(1)).with_ingredient("c", dec!(2)),
            Recipe::new("c", dec!(1)).with_ingredient("a", dec!(1)),
        ])
        .unwrap_err();
        match err {
            CatalogError::CyclicRecipe(path) => {
                assert_eq!(path.first(), path.last());
                assert_eq!(path.len(), 4);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn shared_ingredients_are_not_cycles() {
        // Diamond: d needs b and c, both need a.
        let catalog = Catalog::new(vec![
            Recipe::new("a", dec!(1)),
            Recipe::new("b", dec!(1)).with_ingredient("a", dec!(1)),
            Recipe::new("c", dec!(1)).with_ingredient("a", dec!(1)),
            Recipe::new("d", dec!(1))
                .with_ingredient("b", dec!(1))
                .with_ingredient("c", dec!(1)),
        ]);
        assert!(catalog.is_ok());
    }

    #[test]
    fn rejects_malformed_recipes() {
        assert_eq!(
            Catalog::new(vec![Recipe::new("lead", dec!(0))]).unwrap_err(),
            CatalogError::NonPositiveBasePp("lead".into())
        );
        assert_eq!(
            Catalog::new(vec![Recipe::new("lead", dec!(1)), Recipe::new("lead", dec!(2))])
                .unwrap_err(),
            CatalogError::DuplicateResource("lead".into())
        );
        assert!(matches!(
            Catalog::new(vec![Recipe::new("ammo", dec!(4)).with_ingredient("lead", dec!(4))]),
            Err(CatalogError::IngredientNotFound { .. })
        ));
        assert!(matches!(
            Catalog::new(vec![
                Recipe::new("lead", dec!(1)),
                Recipe::new("ammo", dec!(4)).with_ingredient("lead", dec!(-1)),
            ]),
            Err(CatalogError::NegativeQuantity { .. })
        ));
    }

    #[test]
    fn yaml_catalog_parses_numbers() {
        let text = r#"
recipes:
  - code: lead
    base_pp: 1
  - code: ammo
    base_pp: 4
    ingredients:
      lead: 4
"#;
        assert_eq!(Catalog::from_yaml_str(text).unwrap(), ammo_catalog());
        assert!(matches!(
            Catalog::from_yaml_str("recipes: 12"),
            Err(CatalogError::Parse(_))
        ));
    }

    #[test]
    fn order_book_best_prices() {
        let book = OrderBook {
            resource: "lead".into(),
            bids: vec![
                OrderLevel::new(dec!(0.09), dec!(10)),
                OrderLevel::new(dec!(0.095), dec!(5)),
            ],
            asks: vec![
                OrderLevel::new(dec!(0.11), dec!(3)),
                OrderLevel::new(dec!(0.10), dec!(7)),
            ],
        };
        assert_eq!(book.highest_bid(), Some(dec!(0.095)));
        assert_eq!(book.lowest_ask(), Some(dec!(0.10)));
        assert_eq!(OrderBook::default().highest_bid(), None);
    }

    #[test]
    fn trade_page_json_roundtrip() {
        let page = TradePage {
            items: vec![TradeItem {
                timestamp: DateTime::parse_from_rfc3339("2026-10-14T12:00:00Z")
                    .unwrap()
                    .with_timezone(&Utc),
                quantity: dec!(5),
                price: Some(dec!(0.1)),
            }],
            next_cursor: Some("abc".into()),
        };
        let s = serde_json::to_string(&page).unwrap();
        let back: TradePage = serde_json::from_str(&s).unwrap();
        assert_eq!(back, page);
    }

    proptest! {
        #[test]
        fn chains_are_acyclic(len in 1usize..30) {
            let mut recipes = vec![Recipe::new("r0", dec!(1))];
            for i in 1..len {
                recipes.push(
                    Recipe::new(format!("r{i}"), Decimal::from(i as u64))
                        .with_ingredient(format!("r{}", i - 1), dec!(2)),
                );
            }
            prop_assert!(Catalog::new(recipes).is_ok());
        }

        #[test]
        fn closing_a_chain_is_detected(len in 2usize..30) {
            let last = format!("r{}", len - 1);
            let mut recipes = vec![Recipe::new("r0", dec!(1)).with_ingredient(last, dec!(1))];
            for i in 1..len {
                recipes.push(
                    Recipe::new(format!("r{i}"), dec!(1))
                        .with_ingredient(format!("r{}", i - 1), dec!(1)),
                );
            }
            let is_cycle = matches!(Catalog::new(recipes), Err(CatalogError::CyclicRecipe(_)));
            prop_assert!(is_cycle);
        }
    }
}
