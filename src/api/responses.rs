//! Shared API response types
//!
//! Common response structures used across multiple endpoints, with `From`
//! conversions from the domain models. Viewer-relative flags serialize as
//! JSON `null` when the requester is anonymous.

use serde::Serialize;

use crate::models::{Recipe, RecipeDetails, RecipeIngredient, Tag, UserProfile};

/// A user as returned by every user-bearing endpoint
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: i64,
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    /// Whether the requester follows this user; null for anonymous
    pub is_subscribed: Option<bool>,
}

impl From<UserProfile> for UserResponse {
    fn from(profile: UserProfile) -> Self {
        Self {
            id: profile.user.id,
            email: profile.user.email,
            username: profile.user.username,
            first_name: profile.user.first_name,
            last_name: profile.user.last_name,
            is_subscribed: profile.is_subscribed,
        }
    }
}

/// Tag payload
#[derive(Debug, Serialize)]
pub struct TagResponse {
    pub id: i64,
    pub name: String,
    pub color: String,
    pub slug: String,
}

impl From<Tag> for TagResponse {
    fn from(tag: Tag) -> Self {
        Self {
            id: tag.id,
            name: tag.name,
            color: tag.color,
            slug: tag.slug,
        }
    }
}

/// An ingredient row inside a recipe payload
#[derive(Debug, Serialize)]
pub struct RecipeIngredientResponse {
    pub id: i64,
    pub name: String,
    pub measurement_unit: String,
    pub amount: i64,
}

impl From<RecipeIngredient> for RecipeIngredientResponse {
    fn from(item: RecipeIngredient) -> Self {
        Self {
            id: item.id,
            name: item.name,
            measurement_unit: item.measurement_unit,
            amount: item.amount,
        }
    }
}

/// Full recipe payload for list and detail endpoints
#[derive(Debug, Serialize)]
pub struct RecipeResponse {
    pub id: i64,
    pub tags: Vec<TagResponse>,
    pub author: UserResponse,
    pub ingredients: Vec<RecipeIngredientResponse>,
    /// Whether the requester favorited this recipe; null for anonymous
    pub is_favorited: Option<bool>,
    /// Whether this recipe is in the requester's cart; null for anonymous
    pub is_in_shopping_cart: Option<bool>,
    pub name: String,
    pub image: Option<String>,
    pub text: String,
    pub cooking_time: i64,
    pub created_at: String,
}

impl RecipeResponse {
    /// Build the response; the author's `is_subscribed` flag is supplied by
    /// the caller because it is viewer-relative.
    pub fn from_details(details: RecipeDetails, author_is_subscribed: Option<bool>) -> Self {
        Self {
            id: details.recipe.id,
            tags: details.tags.into_iter().map(Into::into).collect(),
            author: UserResponse {
                id: details.author.id,
                email: details.author.email,
                username: details.author.username,
                first_name: details.author.first_name,
                last_name: details.author.last_name,
                is_subscribed: author_is_subscribed,
            },
            ingredients: details.ingredients.into_iter().map(Into::into).collect(),
            is_favorited: details.is_favorited,
            is_in_shopping_cart: details.is_in_shopping_cart,
            name: details.recipe.name,
            image: details.recipe.image.map(media_url),
            text: details.recipe.text,
            cooking_time: details.recipe.cooking_time,
            created_at: details.recipe.created_at.to_rfc3339(),
        }
    }
}

/// Minified recipe payload used by toggle responses and subscription
/// listings
#[derive(Debug, Serialize)]
pub struct RecipeMinifiedResponse {
    pub id: i64,
    pub name: String,
    pub image: Option<String>,
    pub cooking_time: i64,
}

impl From<Recipe> for RecipeMinifiedResponse {
    fn from(recipe: Recipe) -> Self {
        Self {
            id: recipe.id,
            name: recipe.name,
            image: recipe.image.map(media_url),
            cooking_time: recipe.cooking_time,
        }
    }
}

/// Public URL of a stored media path
pub fn media_url(path: String) -> String {
    format!("/media/{}", path)
}
