use std::collections::{BTreeMap, HashMap, HashSet};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::constants::{
    FORBIDDEN_USERNAMES, INGREDIENT_UNIQUE, MAX_SMALL_INTEGER, MIN_COOKING_TIME,
    MIN_INGREDIENT_AMOUNT, RECIPE_AMOUNT_RANGE, RECIPE_AUTHOR_FK, RECIPE_COOKING_TIME_RANGE,
    RECIPE_INGREDIENT_PROTECT, RECIPE_INGREDIENT_UNIQUE, RECIPE_TAG_FK, RESERVED_USERNAMES,
    SUBSCRIPTION_SELF, TAG_COLOR_FORMAT, TAG_NAME_UNIQUE, TAG_SLUG_UNIQUE, USER_EMAIL_UNIQUE,
    USER_USERNAME_UNIQUE,
};

use super::{
    error::StoreError,
    pagination::PageQuery,
    schema::{
        Id, Ingredient, LinkedTag, NewRecipe, NewTag, NewUser, Recipe, RecipeChanges,
        RecipeFilter, RecipeIngredientForm, RecipeMark, RecipePart, RecipeRow, ShoppingListItem,
        SubscriptionRow, Tag, User, UserRow,
    },
    store::Store,
};

#[derive(Debug, Clone, Copy)]
struct PartEntry {
    id: Id,
    recipe_id: Id,
    ingredient_id: Id,
    amount: i32,
}

#[derive(Debug, Clone, Copy)]
struct MarkEntry {
    user_id: Id,
    recipe_id: Id,
}

#[derive(Debug, Clone, Copy)]
struct SubscriptionEntry {
    id: Id,
    user_id: Id,
    author_id: Id,
}

#[derive(Debug, Default)]
struct Tables {
    users: Vec<User>,
    tags: Vec<Tag>,
    ingredients: Vec<Ingredient>,
    recipes: Vec<Recipe>,
    recipe_tags: Vec<(Id, Id)>,
    recipe_ingredients: Vec<PartEntry>,
    favorites: Vec<MarkEntry>,
    shopping_cart: Vec<MarkEntry>,
    subscriptions: Vec<SubscriptionEntry>,
    sequences: HashMap<&'static str, Id>,
}

fn page_slice<T>(rows: Vec<T>, page: &PageQuery) -> Vec<T> {
    rows.into_iter()
        .skip(page.offset().max(0) as usize)
        .take(page.limit.max(0) as usize)
        .collect()
}

fn is_hex_color(color: &str) -> bool {
    color.len() == 7
        && color.starts_with('#')
        && color[1..].chars().all(|c| c.is_ascii_hexdigit())
}

impl Tables {
    fn next_id(&mut self, table: &'static str) -> Id {
        let sequence = self.sequences.entry(table).or_insert(0);
        *sequence += 1;
        *sequence
    }

    fn marks(&self, mark: RecipeMark) -> &Vec<MarkEntry> {
        match mark {
            RecipeMark::Favorite => &self.favorites,
            RecipeMark::ShoppingCart => &self.shopping_cart,
        }
    }

    fn marks_mut(&mut self, mark: RecipeMark) -> &mut Vec<MarkEntry> {
        match mark {
            RecipeMark::Favorite => &mut self.favorites,
            RecipeMark::ShoppingCart => &mut self.shopping_cart,
        }
    }

    fn has_mark(&self, mark: RecipeMark, user_id: Id, recipe_id: Id) -> bool {
        self.marks(mark)
            .iter()
            .any(|m| m.user_id == user_id && m.recipe_id == recipe_id)
    }

    fn is_subscribed(&self, user_id: Id, author_id: Id) -> bool {
        self.subscriptions
            .iter()
            .any(|s| s.user_id == user_id && s.author_id == author_id)
    }

    fn user(&self, id: Id) -> Option<&User> {
        self.users.iter().find(|user| user.id == id)
    }

    fn recipe(&self, id: Id) -> Option<&Recipe> {
        self.recipes.iter().find(|recipe| recipe.id == id)
    }

    fn user_row(&self, user: &User, viewer: Option<Id>) -> UserRow {
        UserRow {
            user: user.clone(),
            is_subscribed: viewer.map(|viewer| self.is_subscribed(viewer, user.id)),
            count: 0,
        }
    }

    fn recipe_row(&self, recipe: &Recipe, viewer: Option<Id>) -> RecipeRow {
        RecipeRow {
            recipe: recipe.clone(),
            is_favorited: viewer.map(|v| self.has_mark(RecipeMark::Favorite, v, recipe.id)),
            is_in_shopping_cart: viewer
                .map(|v| self.has_mark(RecipeMark::ShoppingCart, v, recipe.id)),
            count: 0,
        }
    }

    fn matches(&self, recipe: &Recipe, filter: &RecipeFilter) -> bool {
        if filter.author.is_some_and(|author| recipe.author_id != author) {
            return false;
        }

        if !filter.tags.is_empty() {
            let tagged = self
                .recipe_tags
                .iter()
                .filter(|(recipe_id, _)| *recipe_id == recipe.id)
                .filter_map(|(_, tag_id)| self.tags.iter().find(|tag| tag.id == *tag_id))
                .any(|tag| filter.tags.contains(&tag.slug));
            if !tagged {
                return false;
            }
        }

        if let Some(user) = filter.favorited_by {
            if !self.has_mark(RecipeMark::Favorite, user, recipe.id) {
                return false;
            }
        }

        if let Some(user) = filter.in_cart_of {
            if !self.has_mark(RecipeMark::ShoppingCart, user, recipe.id) {
                return false;
            }
        }

        true
    }

    fn check_cooking_time(cooking_time: i32) -> Result<(), StoreError> {
        if !(MIN_COOKING_TIME..=MAX_SMALL_INTEGER).contains(&cooking_time) {
            return Err(StoreError::check(RECIPE_COOKING_TIME_RANGE));
        }
        Ok(())
    }

    fn check_tags(&self, tags: &[Id]) -> Result<(), StoreError> {
        if tags.iter().any(|id| !self.tags.iter().any(|tag| tag.id == *id)) {
            return Err(StoreError::foreign_key(RECIPE_TAG_FK));
        }
        Ok(())
    }

    fn check_parts(&self, parts: &[RecipeIngredientForm]) -> Result<(), StoreError> {
        let mut seen = HashSet::new();
        for part in parts {
            if !self.ingredients.iter().any(|i| i.id == part.id) {
                return Err(StoreError::foreign_key(RECIPE_INGREDIENT_PROTECT));
            }
            if !(MIN_INGREDIENT_AMOUNT..=MAX_SMALL_INTEGER).contains(&part.amount) {
                return Err(StoreError::check(RECIPE_AMOUNT_RANGE));
            }
            if !seen.insert(part.id) {
                return Err(StoreError::unique(RECIPE_INGREDIENT_UNIQUE));
            }
        }
        Ok(())
    }

    fn link_tags(&mut self, recipe_id: Id, tags: &[Id]) {
        for tag_id in tags {
            if !self.recipe_tags.contains(&(recipe_id, *tag_id)) {
                self.recipe_tags.push((recipe_id, *tag_id));
            }
        }
    }

    fn link_parts(&mut self, recipe_id: Id, parts: &[RecipeIngredientForm]) {
        for part in parts {
            let id = self.next_id("recipe_ingredients");
            self.recipe_ingredients.push(PartEntry {
                id,
                recipe_id,
                ingredient_id: part.id,
                amount: part.amount,
            });
        }
    }

    fn remove_recipe(&mut self, id: Id) -> bool {
        let before = self.recipes.len();
        self.recipes.retain(|recipe| recipe.id != id);
        self.recipe_tags.retain(|(recipe_id, _)| *recipe_id != id);
        self.recipe_ingredients.retain(|part| part.recipe_id != id);
        self.favorites.retain(|mark| mark.recipe_id != id);
        self.shopping_cart.retain(|mark| mark.recipe_id != id);
        self.recipes.len() < before
    }
}

/// [`Store`] kept in process memory, enforcing the same constraints as the
/// PostgreSQL schema. Writers validate every constraint before mutating.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn create_user(&self, user: &NewUser) -> Result<User, StoreError> {
        let mut tables = self.tables.write().await;

        if tables.users.iter().any(|u| u.email == user.email) {
            return Err(StoreError::unique(USER_EMAIL_UNIQUE));
        }
        if tables.users.iter().any(|u| u.username == user.username) {
            return Err(StoreError::unique(USER_USERNAME_UNIQUE));
        }
        if RESERVED_USERNAMES.contains(&user.username.as_str()) {
            return Err(StoreError::check(FORBIDDEN_USERNAMES));
        }

        let row = User {
            id: tables.next_id("users"),
            email: user.email.clone(),
            username: user.username.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            password: user.password.clone(),
            date_joined: Utc::now(),
        };
        tables.users.push(row.clone());

        Ok(row)
    }

    async fn get_user(&self, id: Id, viewer: Option<Id>) -> Result<Option<UserRow>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.user(id).map(|user| tables.user_row(user, viewer)))
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.users.iter().find(|user| user.email == email).cloned())
    }

    async fn fetch_users(
        &self,
        viewer: Option<Id>,
        page: &PageQuery,
    ) -> Result<(Vec<UserRow>, i64), StoreError> {
        let tables = self.tables.read().await;

        let mut users: Vec<&User> = tables.users.iter().collect();
        users.sort_by(|a, b| {
            b.date_joined
                .cmp(&a.date_joined)
                .then_with(|| b.id.cmp(&a.id))
        });

        let total = users.len() as i64;
        let rows = page_slice(users, page)
            .into_iter()
            .map(|user| UserRow {
                count: total,
                ..tables.user_row(user, viewer)
            })
            .collect();

        Ok((rows, total))
    }

    async fn users_by_ids(
        &self,
        ids: &[Id],
        viewer: Option<Id>,
    ) -> Result<Vec<UserRow>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .iter()
            .filter(|user| ids.contains(&user.id))
            .map(|user| tables.user_row(user, viewer))
            .collect())
    }

    async fn set_password(&self, id: Id, password: &str) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        if let Some(user) = tables.users.iter_mut().find(|user| user.id == id) {
            user.password = password.to_owned();
        }
        Ok(())
    }

    async fn delete_user(&self, id: Id) -> Result<bool, StoreError> {
        let mut tables = self.tables.write().await;

        let before = tables.users.len();
        tables.users.retain(|user| user.id != id);
        if tables.users.len() == before {
            return Ok(false);
        }

        let owned: Vec<Id> = tables
            .recipes
            .iter()
            .filter(|recipe| recipe.author_id == id)
            .map(|recipe| recipe.id)
            .collect();
        for recipe_id in owned {
            tables.remove_recipe(recipe_id);
        }
        tables.favorites.retain(|mark| mark.user_id != id);
        tables.shopping_cart.retain(|mark| mark.user_id != id);
        tables
            .subscriptions
            .retain(|s| s.user_id != id && s.author_id != id);

        Ok(true)
    }

    async fn create_tag(&self, tag: &NewTag) -> Result<Tag, StoreError> {
        let mut tables = self.tables.write().await;

        if tables.tags.iter().any(|t| t.name == tag.name) {
            return Err(StoreError::unique(TAG_NAME_UNIQUE));
        }
        if tables.tags.iter().any(|t| t.slug == tag.slug) {
            return Err(StoreError::unique(TAG_SLUG_UNIQUE));
        }
        if !is_hex_color(&tag.color) {
            return Err(StoreError::check(TAG_COLOR_FORMAT));
        }

        let row = Tag {
            id: tables.next_id("tags"),
            name: tag.name.clone(),
            color: tag.color.clone(),
            slug: tag.slug.clone(),
        };
        tables.tags.push(row.clone());

        Ok(row)
    }

    async fn list_tags(&self) -> Result<Vec<Tag>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.tags.clone())
    }

    async fn get_tag(&self, id: Id) -> Result<Option<Tag>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.tags.iter().find(|tag| tag.id == id).cloned())
    }

    async fn tags_by_ids(&self, ids: &[Id]) -> Result<Vec<Tag>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .tags
            .iter()
            .filter(|tag| ids.contains(&tag.id))
            .cloned()
            .collect())
    }

    async fn tags_by_slugs(&self, slugs: &[String]) -> Result<Vec<Tag>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .tags
            .iter()
            .filter(|tag| slugs.contains(&tag.slug))
            .cloned()
            .collect())
    }

    async fn recipe_tags(&self, recipe_ids: &[Id]) -> Result<Vec<LinkedTag>, StoreError> {
        let tables = self.tables.read().await;

        let mut links: Vec<LinkedTag> = tables
            .recipe_tags
            .iter()
            .filter(|(recipe_id, _)| recipe_ids.contains(recipe_id))
            .filter_map(|(recipe_id, tag_id)| {
                tables
                    .tags
                    .iter()
                    .find(|tag| tag.id == *tag_id)
                    .map(|tag| LinkedTag {
                        recipe_id: *recipe_id,
                        tag: tag.clone(),
                    })
            })
            .collect();
        links.sort_by_key(|link| (link.recipe_id, link.tag.id));

        Ok(links)
    }

    async fn create_ingredient(
        &self,
        name: &str,
        measurement_unit: &str,
    ) -> Result<Ingredient, StoreError> {
        let mut tables = self.tables.write().await;

        if tables
            .ingredients
            .iter()
            .any(|i| i.name == name && i.measurement_unit == measurement_unit)
        {
            return Err(StoreError::unique(INGREDIENT_UNIQUE));
        }

        let row = Ingredient {
            id: tables.next_id("ingredients"),
            name: name.to_owned(),
            measurement_unit: measurement_unit.to_owned(),
        };
        tables.ingredients.push(row.clone());

        Ok(row)
    }

    async fn search_ingredients(&self, name: Option<&str>) -> Result<Vec<Ingredient>, StoreError> {
        let tables = self.tables.read().await;

        let term = name.map(str::to_lowercase);
        let mut list: Vec<(bool, &Ingredient)> = tables
            .ingredients
            .iter()
            .filter_map(|ingredient| {
                let lowered = ingredient.name.to_lowercase();
                match &term {
                    Some(term) if !lowered.contains(term.as_str()) => None,
                    Some(term) => Some((!lowered.starts_with(term.as_str()), ingredient)),
                    None => Some((false, ingredient)),
                }
            })
            .collect();
        list.sort_by(|(a_rank, a), (b_rank, b)| {
            a_rank
                .cmp(b_rank)
                .then_with(|| a.name.cmp(&b.name))
                .then_with(|| a.id.cmp(&b.id))
        });

        Ok(list.into_iter().map(|(_, i)| i.clone()).collect())
    }

    async fn get_ingredient(&self, id: Id) -> Result<Option<Ingredient>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.ingredients.iter().find(|i| i.id == id).cloned())
    }

    async fn ingredients_by_ids(&self, ids: &[Id]) -> Result<Vec<Ingredient>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .ingredients
            .iter()
            .filter(|i| ids.contains(&i.id))
            .cloned()
            .collect())
    }

    async fn delete_ingredient(&self, id: Id) -> Result<bool, StoreError> {
        let mut tables = self.tables.write().await;

        if tables
            .recipe_ingredients
            .iter()
            .any(|part| part.ingredient_id == id)
        {
            return Err(StoreError::foreign_key(RECIPE_INGREDIENT_PROTECT));
        }

        let before = tables.ingredients.len();
        tables.ingredients.retain(|i| i.id != id);
        Ok(tables.ingredients.len() < before)
    }

    async fn recipe_parts(&self, recipe_ids: &[Id]) -> Result<Vec<RecipePart>, StoreError> {
        let tables = self.tables.read().await;

        let mut parts: Vec<(Id, RecipePart)> = tables
            .recipe_ingredients
            .iter()
            .filter(|part| recipe_ids.contains(&part.recipe_id))
            .filter_map(|part| {
                tables
                    .ingredients
                    .iter()
                    .find(|i| i.id == part.ingredient_id)
                    .map(|ingredient| {
                        (
                            part.id,
                            RecipePart {
                                recipe_id: part.recipe_id,
                                ingredient_id: ingredient.id,
                                name: ingredient.name.clone(),
                                measurement_unit: ingredient.measurement_unit.clone(),
                                amount: part.amount,
                            },
                        )
                    })
            })
            .collect();
        parts.sort_by_key(|(id, part)| (part.recipe_id, *id));

        Ok(parts.into_iter().map(|(_, part)| part).collect())
    }

    async fn fetch_recipes(
        &self,
        filter: &RecipeFilter,
        viewer: Option<Id>,
        page: &PageQuery,
    ) -> Result<(Vec<RecipeRow>, i64), StoreError> {
        let tables = self.tables.read().await;

        let mut recipes: Vec<&Recipe> = tables
            .recipes
            .iter()
            .filter(|recipe| tables.matches(recipe, filter))
            .collect();
        recipes.sort_by(|a, b| b.pub_date.cmp(&a.pub_date).then_with(|| b.id.cmp(&a.id)));

        let total = recipes.len() as i64;
        let rows = page_slice(recipes, page)
            .into_iter()
            .map(|recipe| RecipeRow {
                count: total,
                ..tables.recipe_row(recipe, viewer)
            })
            .collect();

        Ok((rows, total))
    }

    async fn get_recipe(
        &self,
        id: Id,
        viewer: Option<Id>,
    ) -> Result<Option<RecipeRow>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .recipe(id)
            .map(|recipe| tables.recipe_row(recipe, viewer)))
    }

    async fn create_recipe(&self, author: Id, recipe: &NewRecipe) -> Result<Recipe, StoreError> {
        let mut tables = self.tables.write().await;

        if tables.user(author).is_none() {
            return Err(StoreError::foreign_key(RECIPE_AUTHOR_FK));
        }
        Tables::check_cooking_time(recipe.cooking_time)?;
        tables.check_tags(&recipe.tags)?;
        tables.check_parts(&recipe.ingredients)?;

        let row = Recipe {
            id: tables.next_id("recipes"),
            author_id: author,
            name: recipe.name.clone(),
            text: recipe.text.clone(),
            image: recipe.image.clone(),
            cooking_time: recipe.cooking_time,
            pub_date: Utc::now(),
        };
        tables.recipes.push(row.clone());
        tables.link_tags(row.id, &recipe.tags);
        tables.link_parts(row.id, &recipe.ingredients);

        Ok(row)
    }

    async fn update_recipe(
        &self,
        id: Id,
        changes: &RecipeChanges,
    ) -> Result<Option<Recipe>, StoreError> {
        let mut tables = self.tables.write().await;

        if tables.recipe(id).is_none() {
            return Ok(None);
        }
        if let Some(cooking_time) = changes.cooking_time {
            Tables::check_cooking_time(cooking_time)?;
        }
        if let Some(tags) = &changes.tags {
            tables.check_tags(tags)?;
        }
        if let Some(parts) = &changes.ingredients {
            tables.check_parts(parts)?;
        }

        if let Some(tags) = &changes.tags {
            tables.recipe_tags.retain(|(recipe_id, _)| *recipe_id != id);
            tables.link_tags(id, tags);
        }
        if let Some(parts) = &changes.ingredients {
            tables.recipe_ingredients.retain(|part| part.recipe_id != id);
            tables.link_parts(id, parts);
        }

        let Some(recipe) = tables.recipes.iter_mut().find(|recipe| recipe.id == id) else {
            return Ok(None);
        };
        if let Some(name) = &changes.name {
            recipe.name = name.clone();
        }
        if let Some(text) = &changes.text {
            recipe.text = text.clone();
        }
        if let Some(image) = &changes.image {
            recipe.image = image.clone();
        }
        if let Some(cooking_time) = changes.cooking_time {
            recipe.cooking_time = cooking_time;
        }

        Ok(Some(recipe.clone()))
    }

    async fn delete_recipe(&self, id: Id) -> Result<bool, StoreError> {
        let mut tables = self.tables.write().await;
        Ok(tables.remove_recipe(id))
    }

    async fn author_recipes(
        &self,
        author_ids: &[Id],
        limit: Option<i64>,
    ) -> Result<Vec<Recipe>, StoreError> {
        let tables = self.tables.read().await;

        let mut recipes: Vec<&Recipe> = tables
            .recipes
            .iter()
            .filter(|recipe| author_ids.contains(&recipe.author_id))
            .collect();
        recipes.sort_by(|a, b| {
            a.author_id
                .cmp(&b.author_id)
                .then_with(|| b.pub_date.cmp(&a.pub_date))
                .then_with(|| b.id.cmp(&a.id))
        });

        let mut taken: HashMap<Id, i64> = HashMap::new();
        Ok(recipes
            .into_iter()
            .filter(|recipe| {
                let position = taken.entry(recipe.author_id).or_insert(0);
                *position += 1;
                limit.map_or(true, |limit| *position <= limit)
            })
            .cloned()
            .collect())
    }

    async fn count_author_recipes(&self, author_id: Id) -> Result<i64, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .recipes
            .iter()
            .filter(|recipe| recipe.author_id == author_id)
            .count() as i64)
    }

    async fn add_mark(&self, mark: RecipeMark, user: Id, recipe: Id) -> Result<bool, StoreError> {
        let mut tables = self.tables.write().await;

        if tables.user(user).is_none() {
            return Err(StoreError::foreign_key(&format!("{}_user_id_fkey", mark.table())));
        }
        if tables.recipe(recipe).is_none() {
            return Err(StoreError::foreign_key(&format!("{}_recipe_id_fkey", mark.table())));
        }
        if tables.has_mark(mark, user, recipe) {
            return Ok(false);
        }

        tables.marks_mut(mark).push(MarkEntry {
            user_id: user,
            recipe_id: recipe,
        });

        Ok(true)
    }

    async fn remove_mark(
        &self,
        mark: RecipeMark,
        user: Id,
        recipe: Id,
    ) -> Result<bool, StoreError> {
        let mut tables = self.tables.write().await;

        let marks = tables.marks_mut(mark);
        let before = marks.len();
        marks.retain(|m| !(m.user_id == user && m.recipe_id == recipe));
        Ok(marks.len() < before)
    }

    async fn has_mark(&self, mark: RecipeMark, user: Id, recipe: Id) -> Result<bool, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.has_mark(mark, user, recipe))
    }

    async fn subscribe(&self, user: Id, author: Id) -> Result<bool, StoreError> {
        let mut tables = self.tables.write().await;

        if tables.user(user).is_none() {
            return Err(StoreError::foreign_key("subscriptions_user_id_fkey"));
        }
        if tables.user(author).is_none() {
            return Err(StoreError::foreign_key("subscriptions_author_id_fkey"));
        }
        if user == author {
            return Err(StoreError::check(SUBSCRIPTION_SELF));
        }
        if tables.is_subscribed(user, author) {
            return Ok(false);
        }

        let id = tables.next_id("subscriptions");
        tables.subscriptions.push(SubscriptionEntry {
            id,
            user_id: user,
            author_id: author,
        });

        Ok(true)
    }

    async fn unsubscribe(&self, user: Id, author: Id) -> Result<bool, StoreError> {
        let mut tables = self.tables.write().await;

        let before = tables.subscriptions.len();
        tables
            .subscriptions
            .retain(|s| !(s.user_id == user && s.author_id == author));
        Ok(tables.subscriptions.len() < before)
    }

    async fn is_subscribed(&self, user: Id, author: Id) -> Result<bool, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.is_subscribed(user, author))
    }

    async fn fetch_subscriptions(
        &self,
        user: Id,
        page: &PageQuery,
    ) -> Result<(Vec<SubscriptionRow>, i64), StoreError> {
        let tables = self.tables.read().await;

        let mut subscriptions: Vec<&SubscriptionEntry> = tables
            .subscriptions
            .iter()
            .filter(|s| s.user_id == user)
            .collect();
        subscriptions.sort_by(|a, b| b.id.cmp(&a.id));

        let total = subscriptions.len() as i64;
        let rows = page_slice(subscriptions, page)
            .into_iter()
            .filter_map(|s| tables.user(s.author_id))
            .map(|author| SubscriptionRow {
                author: author.clone(),
                recipes_count: tables
                    .recipes
                    .iter()
                    .filter(|recipe| recipe.author_id == author.id)
                    .count() as i64,
                count: total,
            })
            .collect();

        Ok((rows, total))
    }

    async fn shopping_list(&self, user: Id) -> Result<Vec<ShoppingListItem>, StoreError> {
        let tables = self.tables.read().await;

        let mut totals: BTreeMap<(String, String), i64> = BTreeMap::new();
        for mark in tables.shopping_cart.iter().filter(|m| m.user_id == user) {
            for part in tables
                .recipe_ingredients
                .iter()
                .filter(|part| part.recipe_id == mark.recipe_id)
            {
                if let Some(ingredient) = tables.ingredients.iter().find(|i| i.id == part.ingredient_id)
                {
                    *totals
                        .entry((ingredient.name.clone(), ingredient.measurement_unit.clone()))
                        .or_insert(0) += i64::from(part.amount);
                }
            }
        }

        Ok(totals
            .into_iter()
            .map(|((name, measurement_unit), amount)| ShoppingListItem {
                name,
                measurement_unit,
                amount,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(name: &str) -> NewUser {
        NewUser {
            email: format!("{name}@example.com"),
            username: name.to_owned(),
            first_name: name.to_owned(),
            last_name: String::from("Tester"),
            password: String::from("hash"),
        }
    }

    fn new_recipe(name: &str, ingredients: Vec<RecipeIngredientForm>) -> NewRecipe {
        NewRecipe {
            name: name.to_owned(),
            text: String::from("Mix."),
            image: String::from("recipes/images/x.png"),
            cooking_time: 10,
            tags: vec![],
            ingredients,
        }
    }

    #[tokio::test]
    async fn shopping_list_sums_amounts_per_ingredient() {
        let store = MemoryStore::new();
        let user = store.create_user(&new_user("cook")).await.unwrap();
        let flour = store.create_ingredient("flour", "g").await.unwrap();
        let milk = store.create_ingredient("milk", "ml").await.unwrap();

        let a = store
            .create_recipe(
                user.id,
                &new_recipe("A", vec![RecipeIngredientForm { id: flour.id, amount: 200 }]),
            )
            .await
            .unwrap();
        let b = store
            .create_recipe(
                user.id,
                &new_recipe(
                    "B",
                    vec![
                        RecipeIngredientForm { id: flour.id, amount: 300 },
                        RecipeIngredientForm { id: milk.id, amount: 100 },
                    ],
                ),
            )
            .await
            .unwrap();
        for recipe in [a.id, b.id] {
            assert!(store
                .add_mark(RecipeMark::ShoppingCart, user.id, recipe)
                .await
                .unwrap());
        }

        let list = store.shopping_list(user.id).await.unwrap();
        assert_eq!(
            list,
            vec![
                ShoppingListItem {
                    name: String::from("flour"),
                    measurement_unit: String::from("g"),
                    amount: 500,
                },
                ShoppingListItem {
                    name: String::from("milk"),
                    measurement_unit: String::from("ml"),
                    amount: 100,
                },
            ]
        );
    }

    #[tokio::test]
    async fn referenced_ingredient_is_protected() {
        let store = MemoryStore::new();
        let user = store.create_user(&new_user("cook")).await.unwrap();
        let used = store.create_ingredient("sugar", "g").await.unwrap();
        let unused = store.create_ingredient("salt", "g").await.unwrap();
        store
            .create_recipe(
                user.id,
                &new_recipe("Cake", vec![RecipeIngredientForm { id: used.id, amount: 5 }]),
            )
            .await
            .unwrap();

        assert!(matches!(
            store.delete_ingredient(used.id).await,
            Err(StoreError::ForeignKeyViolation { constraint }) if constraint == RECIPE_INGREDIENT_PROTECT
        ));
        assert!(store.delete_ingredient(unused.id).await.unwrap());
    }

    #[tokio::test]
    async fn failed_recipe_write_leaves_nothing_behind() {
        let store = MemoryStore::new();
        let user = store.create_user(&new_user("cook")).await.unwrap();
        let egg = store.create_ingredient("egg", "pcs").await.unwrap();

        let result = store
            .create_recipe(
                user.id,
                &new_recipe(
                    "Omelette",
                    vec![
                        RecipeIngredientForm { id: egg.id, amount: 2 },
                        RecipeIngredientForm { id: egg.id, amount: 3 },
                    ],
                ),
            )
            .await;

        assert!(matches!(result, Err(StoreError::UniqueViolation { .. })));
        let (rows, total) = store
            .fetch_recipes(&RecipeFilter::default(), None, &PageQuery::new(1, 10))
            .await
            .unwrap();
        assert!(rows.is_empty());
        assert_eq!(total, 0);
    }

    #[tokio::test]
    async fn marks_and_subscriptions_are_unique() {
        let store = MemoryStore::new();
        let reader = store.create_user(&new_user("reader")).await.unwrap();
        let author = store.create_user(&new_user("author")).await.unwrap();
        let recipe = store
            .create_recipe(author.id, &new_recipe("Soup", vec![]))
            .await
            .unwrap();

        assert!(store.add_mark(RecipeMark::Favorite, reader.id, recipe.id).await.unwrap());
        assert!(!store.add_mark(RecipeMark::Favorite, reader.id, recipe.id).await.unwrap());

        assert!(store.subscribe(reader.id, author.id).await.unwrap());
        assert!(!store.subscribe(reader.id, author.id).await.unwrap());
        assert!(matches!(
            store.subscribe(reader.id, reader.id).await,
            Err(StoreError::CheckViolation { .. })
        ));
    }

    #[tokio::test]
    async fn viewer_flags_are_annotated_only_for_a_viewer() {
        let store = MemoryStore::new();
        let author = store.create_user(&new_user("author")).await.unwrap();
        let recipe = store
            .create_recipe(author.id, &new_recipe("Soup", vec![]))
            .await
            .unwrap();
        store
            .add_mark(RecipeMark::Favorite, author.id, recipe.id)
            .await
            .unwrap();

        let anonymous = store.get_recipe(recipe.id, None).await.unwrap().unwrap();
        assert_eq!(anonymous.is_favorited, None);

        let own = store
            .get_recipe(recipe.id, Some(author.id))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(own.is_favorited, Some(true));
        assert_eq!(own.is_in_shopping_cart, Some(false));
    }

    #[tokio::test]
    async fn deleting_a_recipe_drops_its_marks_and_links() {
        let store = MemoryStore::new();
        let reader = store.create_user(&new_user("reader")).await.unwrap();
        let author = store.create_user(&new_user("author")).await.unwrap();
        let salt = store.create_ingredient("salt", "g").await.unwrap();
        let tag = store
            .create_tag(&NewTag {
                name: String::from("Lunch"),
                color: String::from("#49B64E"),
                slug: String::from("lunch"),
            })
            .await
            .unwrap();
        let mut soup = new_recipe("Soup", vec![RecipeIngredientForm { id: salt.id, amount: 5 }]);
        soup.tags = vec![tag.id];
        let recipe = store.create_recipe(author.id, &soup).await.unwrap();
        for mark in [RecipeMark::Favorite, RecipeMark::ShoppingCart] {
            store.add_mark(mark, reader.id, recipe.id).await.unwrap();
        }

        assert!(store.delete_recipe(recipe.id).await.unwrap());

        for mark in [RecipeMark::Favorite, RecipeMark::ShoppingCart] {
            assert!(!store.has_mark(mark, reader.id, recipe.id).await.unwrap());
        }
        assert!(store.recipe_parts(&[recipe.id]).await.unwrap().is_empty());
        assert!(store.recipe_tags(&[recipe.id]).await.unwrap().is_empty());
        assert!(store.shopping_list(reader.id).await.unwrap().is_empty());
        assert!(store.delete_ingredient(salt.id).await.unwrap());
        assert!(!store.delete_recipe(recipe.id).await.unwrap());
    }

    #[tokio::test]
    async fn deleting_a_user_cascades() {
        let store = MemoryStore::new();
        let reader = store.create_user(&new_user("reader")).await.unwrap();
        let author = store.create_user(&new_user("author")).await.unwrap();
        let recipe = store
            .create_recipe(author.id, &new_recipe("Soup", vec![]))
            .await
            .unwrap();
        store
            .add_mark(RecipeMark::ShoppingCart, reader.id, recipe.id)
            .await
            .unwrap();
        store.subscribe(reader.id, author.id).await.unwrap();
        assert_eq!(store.count_author_recipes(author.id).await.unwrap(), 1);

        assert!(store.delete_user(author.id).await.unwrap());

        assert_eq!(store.count_author_recipes(author.id).await.unwrap(), 0);

        assert!(store.get_recipe(recipe.id, None).await.unwrap().is_none());
        assert!(!store
            .has_mark(RecipeMark::ShoppingCart, reader.id, recipe.id)
            .await
            .unwrap());
        assert!(!store.is_subscribed(reader.id, author.id).await.unwrap());
    }
}
