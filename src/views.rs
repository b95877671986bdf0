use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::database::{
    error::StoreError,
    schema::{
        Annotation, Id, Recipe, RecipeFlags, RecipeMark, RecipePart, RecipeRow, SubscriptionRow,
        Tag, User, UserRow,
    },
    store::Store,
};

#[derive(Debug, Clone, Serialize)]
pub struct UserView {
    pub email: String,
    pub id: Id,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub is_subscribed: bool,
}

impl UserView {
    fn new(user: User, is_subscribed: bool) -> Self {
        Self {
            email: user.email,
            id: user.id,
            username: user.username,
            first_name: user.first_name,
            last_name: user.last_name,
            is_subscribed,
        }
    }
}

/// Registration response; carries no viewer-relative field.
#[derive(Debug, Clone, Serialize)]
pub struct CreatedUserView {
    pub email: String,
    pub id: Id,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
}

impl From<User> for CreatedUserView {
    fn from(user: User) -> Self {
        Self {
            email: user.email,
            id: user.id,
            username: user.username,
            first_name: user.first_name,
            last_name: user.last_name,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RecipeIngredientView {
    pub id: Id,
    pub name: String,
    pub measurement_unit: String,
    pub amount: i32,
}

impl From<RecipePart> for RecipeIngredientView {
    fn from(part: RecipePart) -> Self {
        Self {
            id: part.ingredient_id,
            name: part.name,
            measurement_unit: part.measurement_unit,
            amount: part.amount,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RecipeView {
    pub id: Id,
    pub tags: Vec<Tag>,
    pub author: UserView,
    pub ingredients: Vec<RecipeIngredientView>,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
    pub name: String,
    pub image: String,
    pub text: String,
    pub cooking_time: i32,
}

/// Short form used by marks and subscriptions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecipeBrief {
    pub id: Id,
    pub name: String,
    pub image: String,
    pub cooking_time: i32,
}

impl From<Recipe> for RecipeBrief {
    fn from(recipe: Recipe) -> Self {
        Self {
            id: recipe.id,
            name: recipe.name,
            image: recipe.image,
            cooking_time: recipe.cooking_time,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionView {
    #[serde(flatten)]
    pub author: UserView,
    pub recipes: Vec<RecipeBrief>,
    pub recipes_count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TokenView {
    pub auth_token: String,
}

pub async fn resolve_subscribed(
    store: &dyn Store,
    viewer: Option<Id>,
    path: &str,
    author_id: Id,
    annotation: Annotation<bool>,
) -> Result<bool, StoreError> {
    match (viewer, annotation) {
        (None, _) => Ok(false),
        (Some(_), Annotation::Annotated(value)) => Ok(value),
        (Some(viewer), Annotation::Unannotated) => {
            log::warn!("{path}: is_subscribed was not annotated, checking user {author_id} separately");
            store.is_subscribed(viewer, author_id).await
        }
    }
}

pub async fn resolve_recipe_flags(
    store: &dyn Store,
    viewer: Option<Id>,
    path: &str,
    recipe_id: Id,
    annotation: Annotation<RecipeFlags>,
) -> Result<RecipeFlags, StoreError> {
    match (viewer, annotation) {
        (None, _) => Ok(RecipeFlags::default()),
        (Some(_), Annotation::Annotated(flags)) => Ok(flags),
        (Some(viewer), Annotation::Unannotated) => {
            log::warn!(
                "{path}: is_favorited/is_in_shopping_cart were not annotated, checking recipe {recipe_id} separately"
            );
            Ok(RecipeFlags {
                is_favorited: store.has_mark(RecipeMark::Favorite, viewer, recipe_id).await?,
                is_in_shopping_cart: store
                    .has_mark(RecipeMark::ShoppingCart, viewer, recipe_id)
                    .await?,
            })
        }
    }
}

pub async fn user_view(
    store: &dyn Store,
    viewer: Option<Id>,
    path: &str,
    row: UserRow,
) -> Result<UserView, StoreError> {
    let is_subscribed =
        resolve_subscribed(store, viewer, path, row.user.id, row.subscribed()).await?;
    Ok(UserView::new(row.user, is_subscribed))
}

/// Full recipe payloads for a page of rows. Authors, tags and ingredients
/// are loaded with one query each.
pub async fn recipe_views(
    store: &dyn Store,
    viewer: Option<Id>,
    path: &str,
    rows: Vec<RecipeRow>,
) -> Result<Vec<RecipeView>, StoreError> {
    if rows.is_empty() {
        return Ok(vec![]);
    }

    let recipe_ids: Vec<Id> = rows.iter().map(|row| row.recipe.id).collect();
    let author_ids: Vec<Id> = rows
        .iter()
        .map(|row| row.recipe.author_id)
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();

    let mut authors: HashMap<Id, UserRow> = store
        .users_by_ids(&author_ids, viewer)
        .await?
        .into_iter()
        .map(|row| (row.user.id, row))
        .collect();

    let mut tags: HashMap<Id, Vec<Tag>> = HashMap::new();
    for link in store.recipe_tags(&recipe_ids).await? {
        tags.entry(link.recipe_id).or_default().push(link.tag);
    }

    let mut parts: HashMap<Id, Vec<RecipeIngredientView>> = HashMap::new();
    for part in store.recipe_parts(&recipe_ids).await? {
        parts.entry(part.recipe_id).or_default().push(part.into());
    }

    let mut author_views: HashMap<Id, UserView> = HashMap::new();
    let mut views = Vec::with_capacity(rows.len());
    for row in rows {
        let flags = resolve_recipe_flags(store, viewer, path, row.recipe.id, row.flags()).await?;
        let recipe = row.recipe;

        let author = match author_views.get(&recipe.author_id) {
            Some(view) => view.clone(),
            None => {
                let author_row = authors.remove(&recipe.author_id).ok_or_else(|| {
                    StoreError::new(format!("Author {} of recipe {} is missing", recipe.author_id, recipe.id))
                })?;
                let view = user_view(store, viewer, path, author_row).await?;
                author_views.insert(recipe.author_id, view.clone());
                view
            }
        };

        views.push(RecipeView {
            id: recipe.id,
            tags: tags.remove(&recipe.id).unwrap_or_default(),
            author,
            ingredients: parts.remove(&recipe.id).unwrap_or_default(),
            is_favorited: flags.is_favorited,
            is_in_shopping_cart: flags.is_in_shopping_cart,
            name: recipe.name,
            image: recipe.image,
            text: recipe.text,
            cooking_time: recipe.cooking_time,
        });
    }

    Ok(views)
}

pub async fn recipe_view(
    store: &dyn Store,
    viewer: Option<Id>,
    path: &str,
    row: RecipeRow,
) -> Result<RecipeView, StoreError> {
    let id = row.recipe.id;
    recipe_views(store, viewer, path, vec![row])
        .await?
        .pop()
        .ok_or_else(|| StoreError::new(format!("Recipe {id} could not be presented")))
}

/// Subscription payloads; each author's recipes are newest first and cut to
/// `recipes_limit` when given.
pub async fn subscription_views(
    store: &dyn Store,
    rows: Vec<SubscriptionRow>,
    recipes_limit: Option<i64>,
) -> Result<Vec<SubscriptionView>, StoreError> {
    let author_ids: Vec<Id> = rows.iter().map(|row| row.author.id).collect();

    let mut recipes: HashMap<Id, Vec<RecipeBrief>> = HashMap::new();
    for recipe in store.author_recipes(&author_ids, recipes_limit).await? {
        recipes.entry(recipe.author_id).or_default().push(recipe.into());
    }

    Ok(rows
        .into_iter()
        .map(|row| SubscriptionView {
            recipes: recipes.remove(&row.author.id).unwrap_or_default(),
            recipes_count: row.recipes_count,
            author: UserView::new(row.author, true),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{
        memory::MemoryStore,
        schema::{NewRecipe, NewUser},
    };

    async fn seeded() -> (MemoryStore, Id, Id) {
        let store = MemoryStore::new();
        let user = store
            .create_user(&NewUser {
                email: String::from("cook@example.com"),
                username: String::from("cook"),
                first_name: String::from("Cook"),
                last_name: String::from("Book"),
                password: String::new(),
            })
            .await
            .unwrap();
        let recipe = store
            .create_recipe(
                user.id,
                &NewRecipe {
                    name: String::from("Toast"),
                    text: String::from("Toast it."),
                    image: String::from("toast.png"),
                    cooking_time: 3,
                    tags: vec![],
                    ingredients: vec![],
                },
            )
            .await
            .unwrap();
        store
            .add_mark(RecipeMark::Favorite, user.id, recipe.id)
            .await
            .unwrap();
        (store, user.id, recipe.id)
    }

    #[tokio::test]
    async fn anonymous_viewer_never_sees_flags() {
        let (store, _, recipe) = seeded().await;

        let flags = resolve_recipe_flags(
            &store,
            None,
            "/api/recipes/",
            recipe,
            Annotation::Annotated(RecipeFlags {
                is_favorited: true,
                is_in_shopping_cart: true,
            }),
        )
        .await
        .unwrap();

        assert_eq!(flags, RecipeFlags::default());
    }

    #[tokio::test]
    async fn unannotated_rows_fall_back_to_a_lookup() {
        let (store, user, recipe) = seeded().await;

        let flags = resolve_recipe_flags(
            &store,
            Some(user),
            "/api/recipes/",
            recipe,
            Annotation::Unannotated,
        )
        .await
        .unwrap();

        assert!(flags.is_favorited);
        assert!(!flags.is_in_shopping_cart);
    }

    #[tokio::test]
    async fn annotated_values_are_trusted() {
        let (store, user, _) = seeded().await;

        let subscribed =
            resolve_subscribed(&store, Some(user), "/api/users/", 99, Annotation::Annotated(true))
                .await
                .unwrap();

        assert!(subscribed);
    }
}
