//! Ingredient model and related transfer types

use serde::{Deserialize, Serialize};

/// Ingredient entity: reference data recipes attach with an amount.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Ingredient {
    /// Unique identifier
    pub id: i64,
    /// Ingredient name
    pub name: String,
    /// Unit the amount is expressed in, e.g. "g" or "pcs"
    pub measurement_unit: String,
}

/// An (ingredient id, amount) pair from a recipe write payload
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct IngredientAmount {
    pub id: i64,
    pub amount: i64,
}

/// An ingredient as it appears inside a recipe: catalog fields joined with
/// the per-recipe amount.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipeIngredient {
    pub id: i64,
    pub name: String,
    pub measurement_unit: String,
    pub amount: i64,
}

/// One consolidated row of a shopping list: total amount per distinct
/// (name, unit) pair across the cart's recipes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ShoppingListItem {
    pub name: String,
    pub measurement_unit: String,
    pub total_amount: i64,
}
