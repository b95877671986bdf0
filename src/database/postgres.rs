use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, Pool, Postgres};

use super::{
    actions::{ingredients, recipes, subscriptions, tags, users},
    error::StoreError,
    pagination::PageQuery,
    schema::{
        Id, Ingredient, LinkedTag, NewRecipe, NewTag, NewUser, Recipe, RecipeChanges,
        RecipeFilter, RecipeMark, RecipePart, RecipeRow, ShoppingListItem, SubscriptionRow, Tag,
        User, UserRow,
    },
    store::Store,
};

/// [`Store`] backed by a PostgreSQL pool.
#[derive(Clone)]
pub struct PgStore {
    pool: Pool<Postgres>,
}

impl PgStore {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;

        log::info!("Connected to database ({max_connections} connections)");
        Ok(Self::new(pool))
    }

    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        log::info!("Migrations applied");
        Ok(())
    }
}

#[async_trait]
impl Store for PgStore {
    async fn create_user(&self, user: &NewUser) -> Result<User, StoreError> {
        users::create_user(user, &self.pool).await
    }

    async fn get_user(&self, id: Id, viewer: Option<Id>) -> Result<Option<UserRow>, StoreError> {
        users::get_user(id, viewer, &self.pool).await
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        users::get_user_by_email(email, &self.pool).await
    }

    async fn fetch_users(
        &self,
        viewer: Option<Id>,
        page: &PageQuery,
    ) -> Result<(Vec<UserRow>, i64), StoreError> {
        users::fetch_users(viewer, page, &self.pool).await
    }

    async fn users_by_ids(
        &self,
        ids: &[Id],
        viewer: Option<Id>,
    ) -> Result<Vec<UserRow>, StoreError> {
        users::users_by_ids(ids, viewer, &self.pool).await
    }

    async fn set_password(&self, id: Id, password: &str) -> Result<(), StoreError> {
        users::set_password(id, password, &self.pool).await
    }

    async fn delete_user(&self, id: Id) -> Result<bool, StoreError> {
        users::delete_user(id, &self.pool).await
    }

    async fn create_tag(&self, tag: &NewTag) -> Result<Tag, StoreError> {
        tags::create_tag(tag, &self.pool).await
    }

    async fn list_tags(&self) -> Result<Vec<Tag>, StoreError> {
        tags::list_tags(&self.pool).await
    }

    async fn get_tag(&self, id: Id) -> Result<Option<Tag>, StoreError> {
        tags::get_tag(id, &self.pool).await
    }

    async fn tags_by_ids(&self, ids: &[Id]) -> Result<Vec<Tag>, StoreError> {
        tags::tags_by_ids(ids, &self.pool).await
    }

    async fn tags_by_slugs(&self, slugs: &[String]) -> Result<Vec<Tag>, StoreError> {
        tags::tags_by_slugs(slugs, &self.pool).await
    }

    async fn recipe_tags(&self, recipe_ids: &[Id]) -> Result<Vec<LinkedTag>, StoreError> {
        tags::list_recipe_tags(recipe_ids, &self.pool).await
    }

    async fn create_ingredient(
        &self,
        name: &str,
        measurement_unit: &str,
    ) -> Result<Ingredient, StoreError> {
        ingredients::create_ingredient(name, measurement_unit, &self.pool).await
    }

    async fn search_ingredients(&self, name: Option<&str>) -> Result<Vec<Ingredient>, StoreError> {
        ingredients::search_ingredients(name, &self.pool).await
    }

    async fn get_ingredient(&self, id: Id) -> Result<Option<Ingredient>, StoreError> {
        ingredients::get_ingredient(id, &self.pool).await
    }

    async fn ingredients_by_ids(&self, ids: &[Id]) -> Result<Vec<Ingredient>, StoreError> {
        ingredients::ingredients_by_ids(ids, &self.pool).await
    }

    async fn delete_ingredient(&self, id: Id) -> Result<bool, StoreError> {
        ingredients::delete_ingredient(id, &self.pool).await
    }

    async fn recipe_parts(&self, recipe_ids: &[Id]) -> Result<Vec<RecipePart>, StoreError> {
        ingredients::list_recipe_parts(recipe_ids, &self.pool).await
    }

    async fn fetch_recipes(
        &self,
        filter: &RecipeFilter,
        viewer: Option<Id>,
        page: &PageQuery,
    ) -> Result<(Vec<RecipeRow>, i64), StoreError> {
        recipes::fetch_recipes(filter, viewer, page, &self.pool).await
    }

    async fn get_recipe(
        &self,
        id: Id,
        viewer: Option<Id>,
    ) -> Result<Option<RecipeRow>, StoreError> {
        recipes::get_recipe(id, viewer, &self.pool).await
    }

    async fn create_recipe(&self, author: Id, recipe: &NewRecipe) -> Result<Recipe, StoreError> {
        recipes::create_recipe(author, recipe, &self.pool).await
    }

    async fn update_recipe(
        &self,
        id: Id,
        changes: &RecipeChanges,
    ) -> Result<Option<Recipe>, StoreError> {
        recipes::update_recipe(id, changes, &self.pool).await
    }

    async fn delete_recipe(&self, id: Id) -> Result<bool, StoreError> {
        recipes::delete_recipe(id, &self.pool).await
    }

    async fn author_recipes(
        &self,
        author_ids: &[Id],
        limit: Option<i64>,
    ) -> Result<Vec<Recipe>, StoreError> {
        recipes::author_recipes(author_ids, limit, &self.pool).await
    }

    async fn count_author_recipes(&self, author_id: Id) -> Result<i64, StoreError> {
        recipes::count_author_recipes(author_id, &self.pool).await
    }

    async fn add_mark(&self, mark: RecipeMark, user: Id, recipe: Id) -> Result<bool, StoreError> {
        recipes::add_mark(mark, user, recipe, &self.pool).await
    }

    async fn remove_mark(
        &self,
        mark: RecipeMark,
        user: Id,
        recipe: Id,
    ) -> Result<bool, StoreError> {
        recipes::remove_mark(mark, user, recipe, &self.pool).await
    }

    async fn has_mark(&self, mark: RecipeMark, user: Id, recipe: Id) -> Result<bool, StoreError> {
        recipes::has_mark(mark, user, recipe, &self.pool).await
    }

    async fn subscribe(&self, user: Id, author: Id) -> Result<bool, StoreError> {
        subscriptions::subscribe(user, author, &self.pool).await
    }

    async fn unsubscribe(&self, user: Id, author: Id) -> Result<bool, StoreError> {
        subscriptions::unsubscribe(user, author, &self.pool).await
    }

    async fn is_subscribed(&self, user: Id, author: Id) -> Result<bool, StoreError> {
        subscriptions::is_subscribed(user, author, &self.pool).await
    }

    async fn fetch_subscriptions(
        &self,
        user: Id,
        page: &PageQuery,
    ) -> Result<(Vec<SubscriptionRow>, i64), StoreError> {
        subscriptions::fetch_subscriptions(user, page, &self.pool).await
    }

    async fn shopping_list(&self, user: Id) -> Result<Vec<ShoppingListItem>, StoreError> {
        recipes::shopping_list(user, &self.pool).await
    }
}
