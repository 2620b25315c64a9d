//! Business logic services
//!
//! Services implement the application rules on top of the repositories:
//! validation, permissions, toggles, aggregation and rendering. Handlers in
//! the API layer talk to services only.

pub mod image;
pub mod ingredient;
pub mod password;
pub mod recipe;
pub mod shopping_list;
pub mod tag;
pub mod user;

pub use image::ImageStore;
pub use ingredient::IngredientService;
pub use recipe::{RecipeService, RecipeServiceError};
pub use tag::TagService;
pub use user::{UserService, UserServiceError};
