use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::{FAVORITE_UNIQUE, SHOPPING_UNIQUE};

pub type Id = i32;

/// A viewer-relative value that a query either computed in place or left out.
///
/// `Unannotated` rows need a per-row fallback query before the value can be
/// shown to an authenticated viewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Annotation<T> {
    Annotated(T),
    Unannotated,
}

impl<T> From<Option<T>> for Annotation<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(value) => Self::Annotated(value),
            None => Self::Unannotated,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RecipeFlags {
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
}

/// Join rows whose existence marks a recipe for one user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecipeMark {
    Favorite,
    ShoppingCart,
}

impl RecipeMark {
    pub fn table(&self) -> &'static str {
        match self {
            RecipeMark::Favorite => "favorites",
            RecipeMark::ShoppingCart => "shopping_cart",
        }
    }

    pub fn constraint(&self) -> &'static str {
        match self {
            RecipeMark::Favorite => FAVORITE_UNIQUE,
            RecipeMark::ShoppingCart => SHOPPING_UNIQUE,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RecipeMark::Favorite => "favorites",
            RecipeMark::ShoppingCart => "the shopping cart",
        }
    }
}

#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
pub struct User {
    pub id: Id,
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub date_joined: DateTime<Utc>,
}

#[derive(sqlx::FromRow, Debug, Clone)]
pub struct UserRow {
    #[sqlx(flatten)]
    pub user: User,
    pub is_subscribed: Option<bool>,
    #[sqlx(default)]
    pub count: i64,
}

impl UserRow {
    pub fn subscribed(&self) -> Annotation<bool> {
        self.is_subscribed.into()
    }
}

#[derive(sqlx::FromRow, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: Id,
    pub name: String,
    pub color: String,
    pub slug: String,
}

#[derive(sqlx::FromRow, Debug, Clone)]
pub struct LinkedTag {
    pub recipe_id: Id,
    #[sqlx(flatten)]
    pub tag: Tag,
}

#[derive(sqlx::FromRow, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ingredient {
    pub id: Id,
    pub name: String,
    pub measurement_unit: String,
}

#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
pub struct Recipe {
    pub id: Id,
    pub author_id: Id,
    pub name: String,
    pub text: String,
    pub image: String,
    pub cooking_time: i32,
    pub pub_date: DateTime<Utc>,
}

#[derive(sqlx::FromRow, Debug, Clone)]
pub struct RecipeRow {
    #[sqlx(flatten)]
    pub recipe: Recipe,
    pub is_favorited: Option<bool>,
    pub is_in_shopping_cart: Option<bool>,
    #[sqlx(default)]
    pub count: i64,
}

impl RecipeRow {
    pub fn flags(&self) -> Annotation<RecipeFlags> {
        match (self.is_favorited, self.is_in_shopping_cart) {
            (Some(is_favorited), Some(is_in_shopping_cart)) => Annotation::Annotated(RecipeFlags {
                is_favorited,
                is_in_shopping_cart,
            }),
            _ => Annotation::Unannotated,
        }
    }
}

#[derive(sqlx::FromRow, Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecipePart {
    pub recipe_id: Id,
    pub ingredient_id: Id,
    pub name: String,
    pub measurement_unit: String,
    pub amount: i32,
}

#[derive(sqlx::FromRow, Debug, Clone)]
pub struct SubscriptionRow {
    #[sqlx(flatten)]
    pub author: User,
    pub recipes_count: i64,
    #[sqlx(default)]
    pub count: i64,
}

#[derive(sqlx::FromRow, Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShoppingListItem {
    pub name: String,
    pub measurement_unit: String,
    pub amount: i64,
}

/// Insert form for users; `password` is already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewTag {
    pub name: String,
    pub color: String,
    pub slug: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipeIngredientForm {
    pub id: Id,
    pub amount: i32,
}

/// Fully validated recipe ready to be written in one transaction.
#[derive(Debug, Clone)]
pub struct NewRecipe {
    pub name: String,
    pub text: String,
    pub image: String,
    pub cooking_time: i32,
    pub tags: Vec<Id>,
    pub ingredients: Vec<RecipeIngredientForm>,
}

/// Partial recipe update; `None` keeps the stored value.
#[derive(Debug, Clone, Default)]
pub struct RecipeChanges {
    pub name: Option<String>,
    pub text: Option<String>,
    pub image: Option<String>,
    pub cooking_time: Option<i32>,
    pub tags: Option<Vec<Id>>,
    pub ingredients: Option<Vec<RecipeIngredientForm>>,
}

#[derive(Debug, Clone, Default)]
pub struct RecipeFilter {
    pub author: Option<Id>,
    pub tags: Vec<String>,
    pub favorited_by: Option<Id>,
    pub in_cart_of: Option<Id>,
}
