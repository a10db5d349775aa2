//! Fully amortized production cost through the ingredient graph.

use crate::{effective_pp, EconError};
use market_core::{Catalog, PriceMap, Recipe};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::trace;

/// Labor price and productivity used for one cost calculation.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CostParams {
    /// Price paid per production point (> 0).
    pub cost_per_pp: Decimal,
    /// Fractional bonus reducing the PP required (>= 0).
    pub production_bonus: Decimal,
}

impl CostParams {
    pub fn new(cost_per_pp: Decimal, production_bonus: Decimal) -> Result<Self, EconError> {
        let params = Self {
            cost_per_pp,
            production_bonus,
        };
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> Result<(), EconError> {
        if self.cost_per_pp <= Decimal::ZERO {
            return Err(EconError::InvalidParameter {
                name: "cost_per_pp",
                value: self.cost_per_pp,
            });
        }
        if self.production_bonus < Decimal::ZERO {
            return Err(EconError::InvalidParameter {
                name: "production_bonus",
                value: self.production_bonus,
            });
        }
        Ok(())
    }
}

/// Which ingredients are priced at the observed market price instead of
/// being produced in-house.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InputPricing {
    /// Every ingredient is produced; market prices are ignored.
    #[default]
    Produced,
    /// Raw materials are bought at market, everything else is produced.
    MarketRaw,
    /// Any ingredient with a known market price is bought.
    Market,
}

impl InputPricing {
    /// The override map this mode implies, or `None` for full production.
    pub fn overrides(&self, catalog: &Catalog, prices: &PriceMap) -> Option<PriceMap> {
        match self {
            InputPricing::Produced => None,
            InputPricing::MarketRaw => Some(
                prices
                    .iter()
                    .filter(|(code, _)| catalog.get(code).is_some_and(Recipe::is_raw))
                    .map(|(code, price)| (code.clone(), *price))
                    .collect(),
            ),
            InputPricing::Market => Some(prices.clone()),
        }
    }
}

/// Recursive cost evaluator bound to one parameter set.
///
/// The memo table lives and dies with the evaluator, so a new parameter set
/// always means a new evaluator and a cold cache.
pub struct CostEvaluator<'a> {
    catalog: &'a Catalog,
    params: CostParams,
    overrides: Option<&'a PriceMap>,
    cache: HashMap<String, Decimal>,
    in_progress: Vec<String>,
}

impl<'a> CostEvaluator<'a> {
    pub fn new(catalog: &'a Catalog, params: CostParams) -> Result<Self, EconError> {
        params.validate()?;
        Ok(Self {
            catalog,
            params,
            overrides: None,
            cache: HashMap::new(),
            in_progress: Vec::new(),
        })
    }

    /// Price overridden ingredients at these prices instead of descending.
    pub fn with_overrides(mut self, overrides: Option<&'a PriceMap>) -> Self {
        self.overrides = overrides;
        self.cache.clear();
        self
    }

    pub fn params(&self) -> CostParams {
        self.params
    }

    /// Number of resources resolved so far.
    pub fn cached(&self) -> usize {
        self.cache.len()
    }

    /// Production cost of one unit of `resource`.
    ///
    /// The top-level resource is always produced; overrides only apply to
    /// its ingredients.
    pub fn evaluate(&mut self, resource: &str) -> Result<Decimal, EconError> {
        if let Some(cost) = self.cache.get(resource) {
            return Ok(*cost);
        }
        if let Some(start) = self.in_progress.iter().position(|r| r == resource) {
            let mut path = self.in_progress[start..].to_vec();
            path.push(resource.to_string());
            return Err(EconError::CyclicRecipe(path));
        }
        let catalog = self.catalog;
        let recipe = catalog
            .get(resource)
            .ok_or_else(|| EconError::ResourceNotFound(resource.to_string()))?;

        self.in_progress.push(resource.to_string());
        let result = self.evaluate_recipe(recipe);
        self.in_progress.pop();

        let cost = result?;
        trace!(resource, %cost, "resolved production cost");
        self.cache.insert(resource.to_string(), cost);
        Ok(cost)
    }

    fn evaluate_recipe(&mut self, recipe: &'a Recipe) -> Result<Decimal, EconError> {
        let overflow = || EconError::Overflow(recipe.code.clone());
        let mut cost = effective_pp(recipe.base_pp, self.params.production_bonus)
            .and_then(|pp| pp.checked_mul(self.params.cost_per_pp))
            .ok_or_else(overflow)?;
        for (ingredient, qty) in &recipe.ingredients {
            let unit_cost = match self.overrides.and_then(|o| o.get(ingredient)) {
                Some(price) => *price,
                None => self.evaluate(ingredient)?,
            };
            cost = qty
                .checked_mul(unit_cost)
                .and_then(|line| cost.checked_add(line))
                .ok_or_else(overflow)?;
        }
        Ok(cost)
    }
}

/// One-shot cost of a single resource with a fresh cache.
pub fn production_cost(
    catalog: &Catalog,
    resource: &str,
    params: CostParams,
    overrides: Option<&PriceMap>,
) -> Result<Decimal, EconError> {
    CostEvaluator::new(catalog, params)?
        .with_overrides(overrides)
        .evaluate(resource)
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

    fn params(cost_per_pp: Decimal, bonus: Decimal) -> CostParams {
        CostParams::new(cost_per_pp, bonus).unwrap()
    }

    #[test]
    fn ammo_example() {
        let catalog = ammo_catalog();
        let p = params(dec!(0.1), dec!(0));
        assert_eq!(production_cost(&catalog, "lead", p, None).unwrap(), dec!(0.1));
        assert_eq!(production_cost(&catalog, "ammo", p, None).unwrap(), dec!(0.8));
    }

    #[test]
    fn bonus_reduces_labor_share() {
        let catalog = ammo_catalog();
        let p = params(dec!(0.1), dec!(1));
        // (4/2 + 4 * 1/2) * 0.1
        assert_eq!(production_cost(&catalog, "ammo", p, None).unwrap(), dec!(0.4));
    }

    #[test]
    fn overrides_replace_ingredient_cost() {
        let catalog = ammo_catalog();
        let p = params(dec!(0.1), dec!(0));
        let prices: PriceMap = [("lead".to_string(), dec!(0.25))].into_iter().collect();
        let cost = production_cost(&catalog, "ammo", p, Some(&prices)).unwrap();
        assert_eq!(cost, dec!(0.4) + dec!(1.0));
        // The evaluated resource itself is never overridden.
        let lead = production_cost(&catalog, "lead", p, Some(&prices)).unwrap();
        assert_eq!(lead, dec!(0.1));
    }

    #[test]
    fn pricing_modes_build_expected_overrides() {
        let catalog = ammo_catalog();
        let prices: PriceMap = [
            ("lead".to_string(), dec!(0.2)),
            ("ammo".to_string(), dec!(1.0)),
        ]
        .into_iter()
        .collect();
        assert_eq!(InputPricing::Produced.overrides(&catalog, &prices), None);
        let raw = InputPricing::MarketRaw.overrides(&catalog, &prices).unwrap();
        assert_eq!(raw.len(), 1);
        assert_eq!(raw["lead"], dec!(0.2));
        assert_eq!(InputPricing::Market.overrides(&catalog, &prices).unwrap(), prices);
    }

    #[test]
    fn unknown_resource_is_reported() {
        let catalog = ammo_catalog();
        let p = params(dec!(0.1), dec!(0));
        let err = production_cost(&catalog, "case1", p, None).unwrap_err();
        assert_eq!(err, EconError::ResourceNotFound("case1".into()));
    }

    #[test]
    fn rejects_invalid_parameters() {
        assert!(matches!(
            CostParams::new(dec!(0), dec!(0)),
            Err(EconError::InvalidParameter {
                name: "cost_per_pp",
                ..
            })
        ));
        assert!(matches!(
            CostParams::new(dec!(0.1), dec!(-0.5)),
            Err(EconError::InvalidParameter {
                name: "production_bonus",
                ..
            })
        ));
        let bad = CostParams {
            cost_per_pp: dec!(-1),
            production_bonus: dec!(0),
        };
        assert!(CostEvaluator::new(&ammo_catalog(), bad).is_err());
    }

    #[test]
    fn overflow_is_an_error_not_a_panic() {
        let catalog = ammo_catalog();
        let p = params(Decimal::MAX, dec!(0));
        let mut eval = CostEvaluator::new(&catalog, p).unwrap();
        assert_eq!(eval.evaluate("lead").unwrap(), Decimal::MAX);
        assert_eq!(eval.evaluate("ammo"), Err(EconError::Overflow("ammo".into())));
        // The failed resource is not cached and the evaluator stays usable.
        assert_eq!(eval.cached(), 1);
        assert_eq!(eval.evaluate("lead").unwrap(), Decimal::MAX);

        let huge: PriceMap = [("lead".to_string(), Decimal::MAX)].into_iter().collect();
        let p = params(dec!(0.1), dec!(0));
        assert!(matches!(
            production_cost(&catalog, "ammo", p, Some(&huge)),
            Err(EconError::Overflow(_))
        ));
        let builtin = Catalog::builtin().unwrap();
        let p = params(Decimal::MAX, dec!(0));
        assert!(matches!(
            production_cost(&builtin, "cocain", p, None),
            Err(EconError::Overflow(_))
        ));
    }

    #[test]
    fn cycle_guard_reports_the_loop() {
        let catalog = Catalog::new_unchecked(vec![
            Recipe::new("a", dec!(1)).with_ingredient("b", dec!(1)),
            Recipe::new("b", dec!(1)).with_ingredient("a", dec!(1)),
            Recipe::new("c", dec!(1)),
        ]);
        let mut eval = CostEvaluator::new(&catalog, params(dec!(1), dec!(0))).unwrap();
        assert_eq!(
            eval.evaluate("a"),
            Err(EconError::CyclicRecipe(vec!["a".into(), "b".into(), "a".into()]))
        );
        // The in-progress stack unwinds, so unrelated resources still resolve.
        assert_eq!(eval.evaluate("c").unwrap(), dec!(1));
        assert_eq!(eval.cached(), 1);
    }

    #[test]
    fn shared_ingredients_are_resolved_once() {
        let catalog = Catalog::new(vec![
            Recipe::new("a", dec!(1)),
            Recipe::new("b", dec!(1)).with_ingredient("a", dec!(2)),
            Recipe::new("c", dec!(1)).with_ingredient("a", dec!(3)),
            Recipe::new("d", dec!(1))
                .with_ingredient("b", dec!(1))
                .with_ingredient("c", dec!(1)),
        ])
        .unwrap();
        let mut eval = CostEvaluator::new(&catalog, params(dec!(1), dec!(0))).unwrap();
        // d = 1 + (1 + 2) + (1 + 3)
        assert_eq!(eval.evaluate("d").unwrap(), dec!(8));
        assert_eq!(eval.cached(), 4);
        assert_eq!(eval.evaluate("b").unwrap(), dec!(3));
    }

    proptest! {
        #[test]
        fn raw_material_cost_is_closed_form(cents in 1i64..100_000, bonus_pct in 0i64..300) {
            let catalog = Catalog::builtin().unwrap();
            let c = Decimal::new(cents, 2);
            let b = Decimal::new(bonus_pct, 2);
            for recipe in catalog.iter().filter(|r| r.is_raw()) {
                let cost = production_cost(&catalog, &recipe.code, params(c, b), None).unwrap();
                prop_assert_eq!(cost, (recipe.base_pp / (Decimal::ONE + b)) * c);
            }
        }

        #[test]
        fn monotonic_in_cost_per_pp(
            cents in 1i64..100_000,
            step in 1i64..1_000,
            bonus_pct in 0i64..300,
        ) {
            let catalog = Catalog::builtin().unwrap();
            let b = Decimal::new(bonus_pct, 2);
            let mut low = CostEvaluator::new(&catalog, params(Decimal::new(cents, 2), b)).unwrap();
            let mut high =
                CostEvaluator::new(&catalog, params(Decimal::new(cents + step, 2), b)).unwrap();
            for recipe in catalog.iter() {
                let code = &recipe.code;
                prop_assert!(low.evaluate(code).unwrap() <= high.evaluate(code).unwrap());
            }
        }

        #[test]
        fn non_increasing_in_bonus(
            cents in 1i64..100_000,
            bonus_pct in 0i64..300,
            step in 1i64..100,
        ) {
            let catalog = Catalog::builtin().unwrap();
            let c = Decimal::new(cents, 2);
            let low_bonus = params(c, Decimal::new(bonus_pct, 2));
            let high_bonus = params(c, Decimal::new(bonus_pct + step, 2));
            let mut low = CostEvaluator::new(&catalog, low_bonus).unwrap();
            let mut high = CostEvaluator::new(&catalog, high_bonus).unwrap();
            for recipe in catalog.iter() {
                let code = &recipe.code;
                prop_assert!(low.evaluate(code).unwrap() >= high.evaluate(code).unwrap());
            }
        }
    }
}
