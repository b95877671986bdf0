use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use validator::Validate;

use crate::{
    constants::{INGREDIENT_UNIQUE, TAG_NAME_UNIQUE, TAG_SLUG_UNIQUE},
    database::{
        error::StoreError,
        form::Form,
        schema::{Id, Ingredient, NewTag, Tag},
        store::Store,
    },
    error::{ApiError, FieldErrors},
};

static COLOR_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^#([0-9a-fA-F]{2}){3}$").expect("COLOR_PATTERN: invalid regex pattern")
});
static SLUG_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[-a-zA-Z0-9_]+$").expect("SLUG_PATTERN: invalid regex pattern"));

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct TagForm {
    #[validate(length(min = 1, max = 50, message = "Ensure this field has between 1 and 50 characters."))]
    pub name: String,
    pub color: String,
    #[validate(length(min = 1, max = 50, message = "Ensure this field has between 1 and 50 characters."))]
    pub slug: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct IngredientForm {
    #[validate(length(min = 1, max = 100, message = "Ensure this field has between 1 and 100 characters."))]
    pub name: String,
    #[validate(length(min = 1, max = 32, message = "Ensure this field has between 1 and 32 characters."))]
    pub measurement_unit: String,
}

pub async fn list_tags(store: &dyn Store) -> Result<Vec<Tag>, ApiError> {
    Ok(store.list_tags().await?)
}

pub async fn get_tag(store: &dyn Store, id: Id) -> Result<Tag, ApiError> {
    store.get_tag(id).await?.ok_or_else(ApiError::not_found)
}

/// Ingredients matching `name`, prefix matches first.
pub async fn list_ingredients(store: &dyn Store, form: &Form) -> Result<Vec<Ingredient>, ApiError> {
    let name = form.get_str("name").filter(|name| !name.is_empty());
    Ok(store.search_ingredients(name).await?)
}

pub async fn get_ingredient(store: &dyn Store, id: Id) -> Result<Ingredient, ApiError> {
    store
        .get_ingredient(id)
        .await?
        .ok_or_else(ApiError::not_found)
}

pub async fn create_tag(store: &dyn Store, form: TagForm) -> Result<Tag, ApiError> {
    let mut errors: FieldErrors = match form.validate() {
        Ok(()) => FieldErrors::new(),
        Err(e) => e.into(),
    };
    if !COLOR_PATTERN.is_match(&form.color) {
        errors.add("color", "Enter a color in #RRGGBB format.");
    }
    if !SLUG_PATTERN.is_match(&form.slug) {
        errors.add(
            "slug",
            "Enter a valid slug consisting of letters, numbers, underscores or hyphens.",
        );
    }
    errors.into_result()?;

    let tag = store
        .create_tag(&NewTag {
            name: form.name,
            color: form.color,
            slug: form.slug,
        })
        .await
        .map_err(|e| match e {
            StoreError::UniqueViolation { constraint } if constraint == TAG_NAME_UNIQUE => {
                ApiError::field("name", "tag with this name already exists.")
            }
            StoreError::UniqueViolation { constraint } if constraint == TAG_SLUG_UNIQUE => {
                ApiError::field("slug", "tag with this slug already exists.")
            }
            other => other.into(),
        })?;
    log::info!("Created tag {} ({})", tag.id, tag.slug);

    Ok(tag)
}

pub async fn create_ingredient(store: &dyn Store, form: IngredientForm) -> Result<Ingredient, ApiError> {
    form.validate()?;

    let ingredient = store
        .create_ingredient(&form.name, &form.measurement_unit)
        .await
        .map_err(|e| match e {
            StoreError::UniqueViolation { constraint } if constraint == INGREDIENT_UNIQUE => {
                ApiError::non_field("The fields name, measurement_unit must make a unique set.")
            }
            other => other.into(),
        })?;
    log::info!("Created ingredient {} ({})", ingredient.id, ingredient.name);

    Ok(ingredient)
}

/// Refused while any recipe still uses the ingredient.
pub async fn delete_ingredient(store: &dyn Store, id: Id) -> Result<(), ApiError> {
    let deleted = store.delete_ingredient(id).await.map_err(|e| match e {
        StoreError::ForeignKeyViolation { .. } => ApiError::ProtectedReference(format!(
            "Ingredient {id} is used in recipes and cannot be deleted."
        )),
        other => other.into(),
    })?;
    if !deleted {
        return Err(ApiError::not_found());
    }
    log::info!("Deleted ingredient {id}");

    Ok(())
}
