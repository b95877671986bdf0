use async_trait::async_trait;

use super::{
    error::StoreError,
    pagination::PageQuery,
    schema::{
        Id, Ingredient, LinkedTag, NewRecipe, NewTag, NewUser, Recipe, RecipeChanges,
        RecipeFilter, RecipeMark, RecipePart, RecipeRow, ShoppingListItem, SubscriptionRow, Tag,
        User, UserRow,
    },
};

/// Repository over the whole data model.
///
/// Every viewer-relative read takes the viewer explicitly. Implementations
/// return viewer-relative columns (`is_subscribed`, `is_favorited`,
/// `is_in_shopping_cart`) filled in when a viewer is given and `None`
/// otherwise. Constraint violations are reported as [`StoreError`] variants
/// carrying the constraint name from `crate::constants`.
#[async_trait]
pub trait Store: Send + Sync {
    async fn create_user(&self, user: &NewUser) -> Result<User, StoreError>;
    async fn get_user(&self, id: Id, viewer: Option<Id>) -> Result<Option<UserRow>, StoreError>;
    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
    /// Newest users first, with the total row count.
    async fn fetch_users(
        &self,
        viewer: Option<Id>,
        page: &PageQuery,
    ) -> Result<(Vec<UserRow>, i64), StoreError>;
    async fn users_by_ids(
        &self,
        ids: &[Id],
        viewer: Option<Id>,
    ) -> Result<Vec<UserRow>, StoreError>;
    async fn set_password(&self, id: Id, password: &str) -> Result<(), StoreError>;
    async fn delete_user(&self, id: Id) -> Result<bool, StoreError>;

    async fn create_tag(&self, tag: &NewTag) -> Result<Tag, StoreError>;
    async fn list_tags(&self) -> Result<Vec<Tag>, StoreError>;
    async fn get_tag(&self, id: Id) -> Result<Option<Tag>, StoreError>;
    async fn tags_by_ids(&self, ids: &[Id]) -> Result<Vec<Tag>, StoreError>;
    async fn tags_by_slugs(&self, slugs: &[String]) -> Result<Vec<Tag>, StoreError>;
    async fn recipe_tags(&self, recipe_ids: &[Id]) -> Result<Vec<LinkedTag>, StoreError>;

    async fn create_ingredient(
        &self,
        name: &str,
        measurement_unit: &str,
    ) -> Result<Ingredient, StoreError>;
    /// Case-insensitive search; prefix matches sort before other matches.
    async fn search_ingredients(&self, name: Option<&str>) -> Result<Vec<Ingredient>, StoreError>;
    async fn get_ingredient(&self, id: Id) -> Result<Option<Ingredient>, StoreError>;
    async fn ingredients_by_ids(&self, ids: &[Id]) -> Result<Vec<Ingredient>, StoreError>;
    /// Fails with a foreign key violation while any recipe uses the ingredient.
    async fn delete_ingredient(&self, id: Id) -> Result<bool, StoreError>;
    async fn recipe_parts(&self, recipe_ids: &[Id]) -> Result<Vec<RecipePart>, StoreError>;

    /// Newest recipes first, with the total row count.
    async fn fetch_recipes(
        &self,
        filter: &RecipeFilter,
        viewer: Option<Id>,
        page: &PageQuery,
    ) -> Result<(Vec<RecipeRow>, i64), StoreError>;
    async fn get_recipe(&self, id: Id, viewer: Option<Id>)
        -> Result<Option<RecipeRow>, StoreError>;
    /// Writes the recipe with its tag and ingredient links atomically.
    async fn create_recipe(&self, author: Id, recipe: &NewRecipe) -> Result<Recipe, StoreError>;
    /// Applies the supplied fields atomically; `None` when the recipe is gone.
    async fn update_recipe(
        &self,
        id: Id,
        changes: &RecipeChanges,
    ) -> Result<Option<Recipe>, StoreError>;
    async fn delete_recipe(&self, id: Id) -> Result<bool, StoreError>;
    /// Newest first per author, at most `limit` per author.
    async fn author_recipes(
        &self,
        author_ids: &[Id],
        limit: Option<i64>,
    ) -> Result<Vec<Recipe>, StoreError>;
    async fn count_author_recipes(&self, author_id: Id) -> Result<i64, StoreError>;

    /// `false` when the mark already existed.
    async fn add_mark(&self, mark: RecipeMark, user: Id, recipe: Id) -> Result<bool, StoreError>;
    /// `false` when there was no mark to remove.
    async fn remove_mark(&self, mark: RecipeMark, user: Id, recipe: Id)
        -> Result<bool, StoreError>;
    async fn has_mark(&self, mark: RecipeMark, user: Id, recipe: Id) -> Result<bool, StoreError>;

    /// `false` when the subscription already existed.
    async fn subscribe(&self, user: Id, author: Id) -> Result<bool, StoreError>;
    async fn unsubscribe(&self, user: Id, author: Id) -> Result<bool, StoreError>;
    async fn is_subscribed(&self, user: Id, author: Id) -> Result<bool, StoreError>;
    /// Followed authors, most recent subscription first.
    async fn fetch_subscriptions(
        &self,
        user: Id,
        page: &PageQuery,
    ) -> Result<(Vec<SubscriptionRow>, i64), StoreError>;

    /// Cart ingredients grouped by name and unit with summed amounts.
    async fn shopping_list(&self, user: Id) -> Result<Vec<ShoppingListItem>, StoreError>;
}
