//! Recipe service
//!
//! Business logic for the recipe aggregate:
//! - nested-payload validation (cooking time, ingredient amounts,
//!   duplicate ids, referenced catalog ids)
//! - transactional create/update with full join-set replacement
//! - author-only mutation
//! - favorite and shopping-cart toggles with distinct error variants
//! - shopping-list aggregation for the export endpoint

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::db::repositories::{
    IngredientRepository, RecipeRepository, RecipeWrite, TagRepository,
};
use crate::models::{
    ListParams, PagedResult, Recipe, RecipeDetails, RecipeFilter, RecipeInput, ShoppingListItem,
    User,
};
use crate::services::image::{ImageError, ImageStore};

/// Error types for recipe service operations
#[derive(Debug, thiserror::Error)]
pub enum RecipeServiceError {
    /// Validation error (invalid input)
    #[error("{0}")]
    Validation(String),

    /// Recipe referenced by id does not exist
    #[error("Recipe with id = {0} not found")]
    RecipeNotFound(i64),

    /// Tag referenced by a write payload does not exist
    #[error("Tag with id = {0} not found")]
    TagNotFound(i64),

    /// Ingredient referenced by a write payload does not exist
    #[error("Ingredient with id = {0} not found")]
    IngredientNotFound(i64),

    /// Relation already present on an add toggle
    #[error("{0}")]
    AlreadyExists(String),

    /// Relation absent on a remove toggle
    #[error("{0}")]
    NotInList(String),

    /// Non-author mutation attempt
    #[error("Only the author may modify this recipe")]
    PermissionDenied,

    /// Internal error
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<ImageError> for RecipeServiceError {
    fn from(err: ImageError) -> Self {
        match err {
            ImageError::Internal(e) => RecipeServiceError::Internal(e),
            other => RecipeServiceError::Validation(other.to_string()),
        }
    }
}

/// Recipe service
pub struct RecipeService {
    recipe_repo: Arc<dyn RecipeRepository>,
    tag_repo: Arc<dyn TagRepository>,
    ingredient_repo: Arc<dyn IngredientRepository>,
    images: ImageStore,
}

impl RecipeService {
    pub fn new(
        recipe_repo: Arc<dyn RecipeRepository>,
        tag_repo: Arc<dyn TagRepository>,
        ingredient_repo: Arc<dyn IngredientRepository>,
        images: ImageStore,
    ) -> Self {
        Self {
            recipe_repo,
            tag_repo,
            ingredient_repo,
            images,
        }
    }

    /// Create a recipe from a nested payload and return it as the viewer
    /// (the author) would read it back.
    pub async fn create(
        &self,
        author: &User,
        input: RecipeInput,
    ) -> Result<RecipeDetails, RecipeServiceError> {
        self.validate(&input).await?;

        let image = match &input.image {
            Some(data_uri) => Some(self.images.store_data_uri(data_uri).await?),
            None => None,
        };

        let write = RecipeWrite {
            name: input.name,
            text: input.text,
            cooking_time: input.cooking_time,
            image,
            tags: input.tags,
            ingredients: input.ingredients,
        };

        let recipe_id = self
            .recipe_repo
            .create(author.id, &write)
            .await
            .context("Failed to create recipe")?;

        self.get(recipe_id, Some(author.id)).await
    }

    /// Re-write a recipe (author only): replaces the tag and ingredient
    /// sets in full, keeps the stored image when the payload omits one.
    pub async fn update(
        &self,
        actor: &User,
        recipe_id: i64,
        input: RecipeInput,
    ) -> Result<RecipeDetails, RecipeServiceError> {
        let existing = self
            .recipe_repo
            .get_by_id(recipe_id)
            .await
            .context("Failed to load recipe")?
            .ok_or(RecipeServiceError::RecipeNotFound(recipe_id))?;

        if existing.author_id != actor.id {
            return Err(RecipeServiceError::PermissionDenied);
        }

        self.validate(&input).await?;

        let image = match &input.image {
            Some(data_uri) => Some(self.images.store_data_uri(data_uri).await?),
            None => None,
        };

        let write = RecipeWrite {
            name: input.name,
            text: input.text,
            cooking_time: input.cooking_time,
            image,
            tags: input.tags,
            ingredients: input.ingredients,
        };

        self.recipe_repo
            .update(recipe_id, &write)
            .await
            .context("Failed to update recipe")?;

        self.get(recipe_id, Some(actor.id)).await
    }

    /// Delete a recipe (author only).
    pub async fn delete(&self, actor: &User, recipe_id: i64) -> Result<(), RecipeServiceError> {
        let existing = self
            .recipe_repo
            .get_by_id(recipe_id)
            .await
            .context("Failed to load recipe")?
            .ok_or(RecipeServiceError::RecipeNotFound(recipe_id))?;

        if existing.author_id != actor.id {
            return Err(RecipeServiceError::PermissionDenied);
        }

        self.recipe_repo
            .delete(recipe_id)
            .await
            .context("Failed to delete recipe")?;

        Ok(())
    }

    /// Get one recipe with viewer-relative flags.
    pub async fn get(
        &self,
        recipe_id: i64,
        viewer: Option<i64>,
    ) -> Result<RecipeDetails, RecipeServiceError> {
        self.recipe_repo
            .get_details(recipe_id, viewer)
            .await
            .context("Failed to load recipe details")?
            .ok_or(RecipeServiceError::RecipeNotFound(recipe_id))
    }

    /// List recipes newest first with filters and viewer-relative flags.
    pub async fn list(
        &self,
        filter: &RecipeFilter,
        viewer: Option<i64>,
        params: &ListParams,
    ) -> Result<PagedResult<RecipeDetails>, RecipeServiceError> {
        Ok(self
            .recipe_repo
            .list(filter, viewer, params)
            .await
            .context("Failed to list recipes")?)
    }

    /// An author's recipes, newest first, optionally capped.
    pub async fn by_author(
        &self,
        author_id: i64,
        limit: Option<i64>,
    ) -> Result<Vec<Recipe>, RecipeServiceError> {
        Ok(self
            .recipe_repo
            .list_by_author(author_id, limit)
            .await
            .context("Failed to list author recipes")?)
    }

    /// Number of recipes an author has published.
    pub async fn count_by_author(&self, author_id: i64) -> Result<i64, RecipeServiceError> {
        Ok(self
            .recipe_repo
            .count_by_author(author_id)
            .await
            .context("Failed to count author recipes")?)
    }

    /// Add a recipe to the user's favorites; returns the recipe for the
    /// minified response.
    pub async fn favorite(
        &self,
        user_id: i64,
        recipe_id: i64,
    ) -> Result<Recipe, RecipeServiceError> {
        let recipe = self.require_recipe(recipe_id).await?;

        let inserted = self
            .recipe_repo
            .add_favorite(user_id, recipe_id)
            .await
            .context("Failed to add favorite")?;
        if !inserted {
            return Err(RecipeServiceError::AlreadyExists(format!(
                "Recipe with id = {} is already in favorites",
                recipe_id
            )));
        }

        Ok(recipe)
    }

    /// Remove a recipe from the user's favorites.
    pub async fn unfavorite(
        &self,
        user_id: i64,
        recipe_id: i64,
    ) -> Result<(), RecipeServiceError> {
        self.require_recipe(recipe_id).await?;

        let removed = self
            .recipe_repo
            .remove_favorite(user_id, recipe_id)
            .await
            .context("Failed to remove favorite")?;
        if !removed {
            return Err(RecipeServiceError::NotInList(format!(
                "Recipe with id = {} is not in favorites",
                recipe_id
            )));
        }

        Ok(())
    }

    /// Add a recipe to the user's shopping cart.
    pub async fn add_to_cart(
        &self,
        user_id: i64,
        recipe_id: i64,
    ) -> Result<Recipe, RecipeServiceError> {
        let recipe = self.require_recipe(recipe_id).await?;

        let inserted = self
            .recipe_repo
            .add_cart_item(user_id, recipe_id)
            .await
            .context("Failed to add cart item")?;
        if !inserted {
            return Err(RecipeServiceError::AlreadyExists(format!(
                "Recipe with id = {} is already in the shopping cart",
                recipe_id
            )));
        }

        Ok(recipe)
    }

    /// Remove a recipe from the user's shopping cart.
    pub async fn remove_from_cart(
        &self,
        user_id: i64,
        recipe_id: i64,
    ) -> Result<(), RecipeServiceError> {
        self.require_recipe(recipe_id).await?;

        let removed = self
            .recipe_repo
            .remove_cart_item(user_id, recipe_id)
            .await
            .context("Failed to remove cart item")?;
        if !removed {
            return Err(RecipeServiceError::NotInList(format!(
                "Recipe with id = {} is not in the shopping cart",
                recipe_id
            )));
        }

        Ok(())
    }

    /// Consolidated shopping list over the user's cart recipes.
    pub async fn shopping_list(
        &self,
        user_id: i64,
    ) -> Result<Vec<ShoppingListItem>, RecipeServiceError> {
        Ok(self
            .recipe_repo
            .shopping_list(user_id)
            .await
            .context("Failed to build shopping list")?)
    }

    async fn require_recipe(&self, recipe_id: i64) -> Result<Recipe, RecipeServiceError> {
        self.recipe_repo
            .get_by_id(recipe_id)
            .await
            .context("Failed to load recipe")?
            .ok_or(RecipeServiceError::RecipeNotFound(recipe_id))
    }

    /// Validate a write payload against the catalog.
    async fn validate(&self, input: &RecipeInput) -> Result<(), RecipeServiceError> {
        if input.name.trim().is_empty() {
            return Err(RecipeServiceError::Validation(
                "Recipe name must not be empty".to_string(),
            ));
        }
        if input.text.trim().is_empty() {
            return Err(RecipeServiceError::Validation(
                "Recipe text must not be empty".to_string(),
            ));
        }
        if input.cooking_time < 1 {
            return Err(RecipeServiceError::Validation(
                "Cooking time must be at least 1 minute".to_string(),
            ));
        }
        if input.ingredients.is_empty() {
            return Err(RecipeServiceError::Validation(
                "A recipe needs at least one ingredient".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for item in &input.ingredients {
            if item.amount < 1 {
                return Err(RecipeServiceError::Validation(format!(
                    "Amount for ingredient id = {} must be at least 1",
                    item.id
                )));
            }
            if !seen.insert(item.id) {
                return Err(RecipeServiceError::Validation(format!(
                    "Ingredient id = {} appears more than once",
                    item.id
                )));
            }
        }

        // Referenced catalog ids must exist; the error names the first
        // missing one
        let tag_ids: Vec<i64> = {
            let mut unique: Vec<i64> = input.tags.clone();
            unique.sort_unstable();
            unique.dedup();
            unique
        };
        let known_tags: HashSet<i64> = self
            .tag_repo
            .existing_ids(&tag_ids)
            .await
            .context("Failed to check tag ids")?
            .into_iter()
            .collect();
        if let Some(missing) = tag_ids.iter().find(|id| !known_tags.contains(id)) {
            return Err(RecipeServiceError::TagNotFound(*missing));
        }

        let ingredient_ids: Vec<i64> = input.ingredients.iter().map(|i| i.id).collect();
        let known_ingredients: HashSet<i64> = self
            .ingredient_repo
            .existing_ids(&ingredient_ids)
            .await
            .context("Failed to check ingredient ids")?
            .into_iter()
            .collect();
        if let Some(missing) = ingredient_ids
            .iter()
            .find(|id| !known_ingredients.contains(id))
        {
            return Err(RecipeServiceError::IngredientNotFound(*missing));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MediaConfig;
    use crate::db::repositories::{
        SqlxIngredientRepository, SqlxRecipeRepository, SqlxTagRepository, SqlxUserRepository,
        UserRepository,
    };
    use crate::db::{create_test_pool, migrations};
    use crate::models::IngredientAmount;
    use base64::engine::general_purpose::STANDARD as BASE64;
    use base64::Engine;

    struct Fixture {
        _media_dir: tempfile::TempDir,
        service: RecipeService,
        author: User,
        other: User,
        tag_id: i64,
        flour_id: i64,
        sugar_id: i64,
    }

    async fn setup() -> Fixture {
        let pool = create_test_pool().await.expect("pool");
        migrations::run_migrations(&pool).await.expect("migrations");

        let users = SqlxUserRepository::new(pool.clone());
        let author = users
            .create(&User::new(
                "author".to_string(),
                "author@example.com".to_string(),
                "Test".to_string(),
                "Author".to_string(),
                "hash".to_string(),
            ))
            .await
            .expect("author");
        let other = users
            .create(&User::new(
                "other".to_string(),
                "other@example.com".to_string(),
                "Test".to_string(),
                "Other".to_string(),
                "hash".to_string(),
            ))
            .await
            .expect("other");

        let tag_repo = SqlxTagRepository::boxed(pool.clone());
        let tag_id = tag_repo.list().await.expect("tags")[0].id;

        let ingredient_repo = SqlxIngredientRepository::boxed(pool.clone());
        let flour_id = ingredient_repo.create("flour", "g").await.expect("flour").id;
        let sugar_id = ingredient_repo.create("sugar", "g").await.expect("sugar").id;

        let media_dir = tempfile::tempdir().expect("media dir");
        let images = ImageStore::new(&MediaConfig {
            path: media_dir.path().to_path_buf(),
            max_image_size: 1024 * 1024,
        });

        Fixture {
            service: RecipeService::new(
                SqlxRecipeRepository::boxed(pool),
                tag_repo,
                ingredient_repo,
                images,
            ),
            _media_dir: media_dir,
            author,
            other,
            tag_id,
            flour_id,
            sugar_id,
        }
    }

    fn valid_input(fixture: &Fixture) -> RecipeInput {
        RecipeInput {
            name: "Pancakes".to_string(),
            text: "Mix and fry.".to_string(),
            cooking_time: 20,
            image: Some(format!(
                "data:image/png;base64,{}",
                BASE64.encode(b"fake png")
            )),
            tags: vec![fixture.tag_id],
            ingredients: vec![
                IngredientAmount {
                    id: fixture.flour_id,
                    amount: 200,
                },
                IngredientAmount {
                    id: fixture.sugar_id,
                    amount: 50,
                },
            ],
        }
    }

    #[tokio::test]
    async fn test_create_returns_details_with_flags() {
        let fixture = setup().await;

        let details = fixture
            .service
            .create(&fixture.author, valid_input(&fixture))
            .await
            .expect("create");

        assert_eq!(details.recipe.name, "Pancakes");
        assert_eq!(details.author.id, fixture.author.id);
        assert_eq!(details.ingredients.len(), 2);
        assert_eq!(details.is_favorited, Some(false));
        assert!(details
            .recipe
            .image
            .as_deref()
            .is_some_and(|p| p.ends_with(".png")));
    }

    #[tokio::test]
    async fn test_create_rejects_zero_cooking_time() {
        let fixture = setup().await;
        let mut input = valid_input(&fixture);
        input.cooking_time = 0;

        let result = fixture.service.create(&fixture.author, input).await;

        assert!(matches!(result, Err(RecipeServiceError::Validation(_))));
    }

    #[tokio::test]
    async fn test_create_rejects_empty_ingredients() {
        let fixture = setup().await;
        let mut input = valid_input(&fixture);
        input.ingredients.clear();

        let result = fixture.service.create(&fixture.author, input).await;

        assert!(matches!(result, Err(RecipeServiceError::Validation(_))));
    }

    #[tokio::test]
    async fn test_create_rejects_duplicate_ingredient_ids() {
        let fixture = setup().await;
        let mut input = valid_input(&fixture);
        input.ingredients = vec![
            IngredientAmount {
                id: fixture.flour_id,
                amount: 100,
            },
            IngredientAmount {
                id: fixture.flour_id,
                amount: 200,
            },
        ];

        let result = fixture.service.create(&fixture.author, input).await;

        assert!(matches!(result, Err(RecipeServiceError::Validation(_))));
    }

    #[tokio::test]
    async fn test_create_names_missing_ingredient() {
        let fixture = setup().await;
        let mut input = valid_input(&fixture);
        input.ingredients.push(IngredientAmount {
            id: 99999,
            amount: 10,
        });

        let result = fixture.service.create(&fixture.author, input).await;

        assert!(matches!(
            result,
            Err(RecipeServiceError::IngredientNotFound(99999))
        ));
    }

    #[tokio::test]
    async fn test_create_names_missing_tag() {
        let fixture = setup().await;
        let mut input = valid_input(&fixture);
        input.tags.push(99999);

        let result = fixture.service.create(&fixture.author, input).await;

        assert!(matches!(result, Err(RecipeServiceError::TagNotFound(99999))));
    }

    #[tokio::test]
    async fn test_update_requires_author() {
        let fixture = setup().await;
        let details = fixture
            .service
            .create(&fixture.author, valid_input(&fixture))
            .await
            .expect("create");

        let mut input = valid_input(&fixture);
        input.name = "Hijacked".to_string();
        let result = fixture
            .service
            .update(&fixture.other, details.recipe.id, input)
            .await;

        assert!(matches!(result, Err(RecipeServiceError::PermissionDenied)));
    }

    #[tokio::test]
    async fn test_update_validates_cooking_time() {
        let fixture = setup().await;
        let details = fixture
            .service
            .create(&fixture.author, valid_input(&fixture))
            .await
            .expect("create");

        let mut input = valid_input(&fixture);
        input.cooking_time = 0;
        let result = fixture
            .service
            .update(&fixture.author, details.recipe.id, input)
            .await;

        assert!(matches!(result, Err(RecipeServiceError::Validation(_))));
    }

    #[tokio::test]
    async fn test_update_unknown_recipe() {
        let fixture = setup().await;

        let result = fixture
            .service
            .update(&fixture.author, 99999, valid_input(&fixture))
            .await;

        assert!(matches!(
            result,
            Err(RecipeServiceError::RecipeNotFound(99999))
        ));
    }

    #[tokio::test]
    async fn test_delete_requires_author() {
        let fixture = setup().await;
        let details = fixture
            .service
            .create(&fixture.author, valid_input(&fixture))
            .await
            .expect("create");

        let result = fixture
            .service
            .delete(&fixture.other, details.recipe.id)
            .await;
        assert!(matches!(result, Err(RecipeServiceError::PermissionDenied)));

        fixture
            .service
            .delete(&fixture.author, details.recipe.id)
            .await
            .expect("delete");
        let result = fixture.service.get(details.recipe.id, None).await;
        assert!(matches!(result, Err(RecipeServiceError::RecipeNotFound(_))));
    }

    #[tokio::test]
    async fn test_favorite_toggle_contract() {
        let fixture = setup().await;
        let details = fixture
            .service
            .create(&fixture.author, valid_input(&fixture))
            .await
            .expect("create");
        let recipe_id = details.recipe.id;
        let viewer = fixture.other.id;

        let minified = fixture
            .service
            .favorite(viewer, recipe_id)
            .await
            .expect("favorite");
        assert_eq!(minified.id, recipe_id);

        // Second add conflicts
        let result = fixture.service.favorite(viewer, recipe_id).await;
        assert!(matches!(result, Err(RecipeServiceError::AlreadyExists(_))));

        fixture
            .service
            .unfavorite(viewer, recipe_id)
            .await
            .expect("unfavorite");

        // Second remove is a missing relation
        let result = fixture.service.unfavorite(viewer, recipe_id).await;
        assert!(matches!(result, Err(RecipeServiceError::NotInList(_))));
    }

    #[tokio::test]
    async fn test_toggle_distinguishes_missing_recipe() {
        let fixture = setup().await;

        let result = fixture.service.favorite(fixture.other.id, 99999).await;
        assert!(matches!(
            result,
            Err(RecipeServiceError::RecipeNotFound(99999))
        ));

        let result = fixture.service.remove_from_cart(fixture.other.id, 99999).await;
        assert!(matches!(
            result,
            Err(RecipeServiceError::RecipeNotFound(99999))
        ));
    }

    #[tokio::test]
    async fn test_cart_toggle_and_shopping_list() {
        let fixture = setup().await;
        let first = fixture
            .service
            .create(&fixture.author, valid_input(&fixture))
            .await
            .expect("create");

        let mut second_input = valid_input(&fixture);
        second_input.name = "Second".to_string();
        second_input.ingredients = vec![IngredientAmount {
            id: fixture.flour_id,
            amount: 100,
        }];
        let second = fixture
            .service
            .create(&fixture.author, second_input)
            .await
            .expect("create");

        let viewer = fixture.other.id;
        fixture
            .service
            .add_to_cart(viewer, first.recipe.id)
            .await
            .expect("cart");
        fixture
            .service
            .add_to_cart(viewer, second.recipe.id)
            .await
            .expect("cart");

        let list = fixture.service.shopping_list(viewer).await.expect("list");

        let flour = list
            .iter()
            .find(|item| item.name == "flour")
            .expect("flour row");
        assert_eq!(flour.total_amount, 300);
    }
}
