//! Minimal-change planning for cart reconciliation.
//!
//! Both store implementations read the cart's current lines and the catalog
//! rows inside their transaction, hand them to [`SyncPlan::build`], and then
//! apply the resulting inserts, updates and deletes before committing.

use std::collections::{BTreeMap, HashMap, HashSet};

use common::{FoodItemId, Money, RestaurantId};

use crate::{CartItem, DesiredItem, FoodItem, Result, StoreError};

/// Upper bound on the quantity of a single cart line.
pub const MAX_ITEM_QUANTITY: u32 = 999;

/// A cart line as it will exist after the sync commits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlannedItem {
    pub food_item_id: FoodItemId,
    pub quantity: u32,
    pub unit_price: Money,
}

/// The writes needed to turn a cart's current lines into the desired set.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SyncPlan {
    pub inserts: Vec<PlannedItem>,
    pub updates: Vec<PlannedItem>,
    pub deletes: Vec<FoodItemId>,
    /// Restaurant of the resulting cart; `None` when the cart ends up empty.
    pub restaurant_id: Option<RestaurantId>,
    /// Sum of quantity × catalog price over the resulting lines.
    pub total: Money,
}

/// Checks a desired item set without touching the store.
///
/// Returns the single restaurant the items belong to, or `None` for an
/// empty set.
pub fn validate_desired_items(desired: &[DesiredItem]) -> Result<Option<RestaurantId>> {
    let mut seen = HashSet::with_capacity(desired.len());
    for item in desired {
        if item.quantity == 0 || item.quantity > MAX_ITEM_QUANTITY {
            return Err(StoreError::Validation(format!(
                "Quantity for food item {} must be between 1 and {MAX_ITEM_QUANTITY}, got {}",
                item.food_item_id, item.quantity
            )));
        }
        if !seen.insert(item.food_item_id) {
            return Err(StoreError::Validation(format!(
                "Food item {} appears more than once",
                item.food_item_id
            )));
        }
    }

    let Some(first) = desired.first() else {
        return Ok(None);
    };
    if let Some(other) = desired
        .iter()
        .find(|item| item.restaurant_id != first.restaurant_id)
    {
        return Err(StoreError::InvalidState(format!(
            "Cart items must come from a single restaurant, found {} and {}",
            first.restaurant_id, other.restaurant_id
        )));
    }

    Ok(Some(first.restaurant_id))
}

impl SyncPlan {
    /// Diffs `existing` against `desired`, pricing every desired line from `catalog`.
    ///
    /// Fails without producing any writes if the desired set is invalid, names
    /// an unknown food item, or claims a restaurant the catalog disagrees with.
    pub fn build(
        existing: &[CartItem],
        desired: &[DesiredItem],
        catalog: &[FoodItem],
    ) -> Result<Self> {
        let restaurant_id = validate_desired_items(desired)?;

        let catalog: HashMap<FoodItemId, &FoodItem> =
            catalog.iter().map(|item| (item.id, item)).collect();
        let mut current: BTreeMap<FoodItemId, &CartItem> = existing
            .iter()
            .map(|item| (item.food_item_id, item))
            .collect();

        let mut plan = SyncPlan {
            restaurant_id,
            ..SyncPlan::default()
        };

        for wanted in desired {
            let food = catalog.get(&wanted.food_item_id).ok_or_else(|| {
                StoreError::NotFound(format!("Food item {}", wanted.food_item_id))
            })?;
            if food.restaurant_id != wanted.restaurant_id {
                return Err(StoreError::InvalidState(format!(
                    "Food item {} belongs to restaurant {}, not {}",
                    food.id, food.restaurant_id, wanted.restaurant_id
                )));
            }

            let line = PlannedItem {
                food_item_id: wanted.food_item_id,
                quantity: wanted.quantity,
                unit_price: food.unit_price,
            };
            plan.total += line.unit_price.multiply(line.quantity);

            match current.remove(&wanted.food_item_id) {
                Some(have) if have.quantity == line.quantity && have.unit_price == line.unit_price => {}
                Some(_) => plan.updates.push(line),
                None => plan.inserts.push(line),
            }
        }

        // Whatever was not claimed by a desired line goes away.
        plan.deletes = current.into_keys().collect();

        Ok(plan)
    }

    /// Returns true if applying the plan would not touch any item row.
    pub fn is_noop(&self) -> bool {
        self.inserts.is_empty() && self.updates.is_empty() && self.deletes.is_empty()
    }
}
