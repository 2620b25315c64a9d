//! Data models
//!
//! Entities and input/transfer types used throughout the Platter service:
//! database rows (User, Tag, Ingredient, Recipe, Session and the join
//! records), validated input structs for writes, and pagination containers.

mod ingredient;
mod recipe;
mod session;
mod tag;
mod user;

pub use ingredient::{Ingredient, IngredientAmount, RecipeIngredient, ShoppingListItem};
pub use recipe::{ListParams, PagedResult, Recipe, RecipeDetails, RecipeFilter, RecipeInput};
pub use session::Session;
pub use tag::Tag;
pub use user::{CreateUserInput, User, UserProfile};
