//! Break-even cost per production point.

use crate::{effective_pp, EconError};
use market_core::{Catalog, PriceMap};
use rust_decimal::Decimal;

/// Extra production bonus for raw materials extracted from a deposit (+30%).
pub const DEPOSIT_BONUS: Decimal = Decimal::from_parts(3, 0, 0, false, 1);

/// Highest cost per PP at which producing `resource` still breaks even.
///
/// Ingredients are valued at their market price; there is no descent
/// into their own production cost. Returns zero when the ingredients alone
/// cost at least as much as the product, and `Indeterminate` when any
/// needed price is unknown.
pub fn max_sustainable_cost(
    catalog: &Catalog,
    resource: &str,
    production_bonus: Decimal,
    prices: &PriceMap,
    use_deposit_bonus: bool,
) -> Result<Decimal, EconError> {
    if production_bonus < Decimal::ZERO {
        return Err(EconError::InvalidParameter {
            name: "production_bonus",
            value: production_bonus,
        });
    }
    let recipe = catalog
        .get(resource)
        .ok_or_else(|| EconError::ResourceNotFound(resource.to_string()))?;
    let indeterminate = |missing: &str| EconError::Indeterminate {
        resource: resource.to_string(),
        missing: missing.to_string(),
    };
    let market_price = *prices.get(resource).ok_or_else(|| indeterminate(resource))?;

    let overflow = || EconError::Overflow(resource.to_string());
    let mut ingredient_cost = Decimal::ZERO;
    for (ingredient, qty) in &recipe.ingredients {
        let price = prices
            .get(ingredient)
            .ok_or_else(|| indeterminate(ingredient))?;
        ingredient_cost = qty
            .checked_mul(*price)
            .and_then(|line| ingredient_cost.checked_add(line))
            .ok_or_else(overflow)?;
    }
    if market_price <= ingredient_cost {
        return Ok(Decimal::ZERO);
    }

    let bonus = if use_deposit_bonus && recipe.is_raw() {
        production_bonus
            .checked_add(DEPOSIT_BONUS)
            .ok_or_else(overflow)?
    } else {
        production_bonus
    };
    market_price
        .checked_sub(ingredient_cost)
        .zip(effective_pp(recipe.base_pp, bonus))
        .and_then(|(margin, pp)| margin.checked_div(pp))
        .ok_or_else(overflow)
}
