use std::collections::HashSet;

use serde::Deserialize;
use validator::Validate;

use crate::{
    authentication::{
        jwt::SessionData,
        permissions::{ensure_author, viewer_id},
    },
    constants::{
        MAX_SMALL_INTEGER, MIN_INGREDIENT_AMOUNT, RECIPE_INGREDIENT_PROTECT,
        RECIPE_INGREDIENT_UNIQUE, RECIPE_TAG_FK,
    },
    database::{
        error::StoreError,
        form::Form,
        pagination::{Page, PageQuery},
        schema::{Id, NewRecipe, RecipeChanges, RecipeFilter, RecipeIngredientForm, RecipeMark},
        store::Store,
    },
    error::{ApiError, FieldErrors},
    export,
    state::AppState,
    views::{recipe_view, recipe_views, RecipeBrief, RecipeView},
};

const REQUIRED: &str = "This field is required.";

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct RecipeForm {
    pub ingredients: Option<Vec<RecipeIngredientForm>>,
    pub tags: Option<Vec<Id>>,
    #[validate(length(min = 1, message = "This field may not be blank."))]
    pub image: Option<String>,
    #[validate(length(
        min = 1,
        max = 200,
        message = "Ensure this field has between 1 and 200 characters."
    ))]
    pub name: Option<String>,
    #[validate(length(min = 1, message = "This field may not be blank."))]
    pub text: Option<String>,
    #[validate(range(
        min = 1,
        max = 32767,
        message = "Ensure this value is between 1 and 32767."
    ))]
    pub cooking_time: Option<i32>,
}

fn field_errors(form: &RecipeForm) -> FieldErrors {
    match form.validate() {
        Ok(()) => FieldErrors::new(),
        Err(e) => e.into(),
    }
}

async fn check_ingredients(
    store: &dyn Store,
    ingredients: &[RecipeIngredientForm],
    errors: &mut FieldErrors,
) -> Result<(), StoreError> {
    if ingredients.is_empty() {
        errors.add("ingredients", "A recipe needs at least one ingredient.");
        return Ok(());
    }

    let mut seen = HashSet::new();
    for part in ingredients {
        if !(MIN_INGREDIENT_AMOUNT..=MAX_SMALL_INTEGER).contains(&part.amount) {
            errors.add(
                "ingredients",
                format!("Amount of ingredient {} must be between 1 and 32767.", part.id),
            );
        }
        if !seen.insert(part.id) {
            errors.add(
                "ingredients",
                format!("Ingredient {} is listed more than once.", part.id),
            );
        }
    }

    let ids: Vec<Id> = seen.into_iter().collect();
    let known: HashSet<Id> = store
        .ingredients_by_ids(&ids)
        .await?
        .into_iter()
        .map(|ingredient| ingredient.id)
        .collect();
    for part in ingredients {
        if !known.contains(&part.id) {
            errors.add(
                "ingredients",
                format!("Invalid pk \"{}\" - object does not exist.", part.id),
            );
        }
    }

    Ok(())
}

/// Collapses repeated ids, keeping first-seen order.
async fn check_tags(
    store: &dyn Store,
    tags: &[Id],
    errors: &mut FieldErrors,
) -> Result<Vec<Id>, StoreError> {
    let mut seen = HashSet::new();
    let tags: Vec<Id> = tags.iter().copied().filter(|id| seen.insert(*id)).collect();

    let known: HashSet<Id> = store
        .tags_by_ids(&tags)
        .await?
        .into_iter()
        .map(|tag| tag.id)
        .collect();
    for id in tags.iter().filter(|id| !known.contains(id)) {
        errors.add("tags", format!("Invalid pk \"{id}\" - object does not exist."));
    }

    Ok(tags)
}

/// Store-side constraint failures that slipped past validation.
fn write_error(error: StoreError) -> ApiError {
    match error {
        StoreError::ForeignKeyViolation { constraint } if constraint == RECIPE_TAG_FK => {
            ApiError::field("tags", "Tag does not exist.")
        }
        StoreError::ForeignKeyViolation { constraint }
            if constraint == RECIPE_INGREDIENT_PROTECT =>
        {
            ApiError::field("ingredients", "Ingredient does not exist.")
        }
        StoreError::UniqueViolation { constraint } if constraint == RECIPE_INGREDIENT_UNIQUE => {
            ApiError::field("ingredients", "Ingredients must not repeat.")
        }
        other => other.into(),
    }
}

fn gather<T>(result: Result<T, ApiError>, errors: &mut FieldErrors) -> Result<Option<T>, ApiError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(ApiError::Validation(e)) => {
            errors.merge(e);
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

async fn recipe_filter(
    store: &dyn Store,
    viewer: Option<Id>,
    form: &Form,
) -> Result<RecipeFilter, ApiError> {
    let mut errors = FieldErrors::new();
    let mut filter = RecipeFilter::default();

    filter.author = gather(form.get_number::<Id>("author"), &mut errors)?.flatten();

    let slugs: Vec<String> = form
        .get_all("tags")
        .into_iter()
        .filter(|slug| !slug.is_empty())
        .map(str::to_owned)
        .collect();
    if !slugs.is_empty() {
        let known: HashSet<String> = store
            .tags_by_slugs(&slugs)
            .await?
            .into_iter()
            .map(|tag| tag.slug)
            .collect();
        for slug in slugs.iter().filter(|slug| !known.contains(*slug)) {
            errors.add(
                "tags",
                format!("Select a valid choice. {slug} is not one of the available choices."),
            );
        }
    }
    filter.tags = slugs;

    let favorited = gather(form.get_bool("is_favorited"), &mut errors)?.flatten();
    let in_cart = gather(form.get_bool("is_in_shopping_cart"), &mut errors)?.flatten();
    errors.into_result()?;

    if let Some(viewer) = viewer {
        if favorited == Some(true) {
            filter.favorited_by = Some(viewer);
        }
        if in_cart == Some(true) {
            filter.in_cart_of = Some(viewer);
        }
    }

    Ok(filter)
}

pub async fn list(
    state: &AppState,
    session: Option<&SessionData>,
    path: &str,
    form: &Form,
) -> Result<Page<RecipeView>, ApiError> {
    let store = state.store();
    let viewer = viewer_id(session);
    let page = PageQuery::from_form(form, state.config.page_size)?;
    let filter = recipe_filter(store, viewer, form).await?;

    let (rows, total) = store.fetch_recipes(&filter, viewer, &page).await?;
    let views = recipe_views(store, viewer, path, rows).await?;

    Page::from_rows(views, total, &page, path, form)
}

pub async fn retrieve(
    state: &AppState,
    session: Option<&SessionData>,
    path: &str,
    id: Id,
) -> Result<RecipeView, ApiError> {
    let store = state.store();
    let viewer = viewer_id(session);

    let row = store
        .get_recipe(id, viewer)
        .await?
        .ok_or_else(ApiError::not_found)?;

    Ok(recipe_view(store, viewer, path, row).await?)
}

pub async fn create(
    state: &AppState,
    session: &SessionData,
    path: &str,
    form: RecipeForm,
) -> Result<RecipeView, ApiError> {
    let store = state.store();
    let mut errors = field_errors(&form);

    for (field, missing) in [
        ("ingredients", form.ingredients.is_none()),
        ("tags", form.tags.is_none()),
        ("image", form.image.is_none()),
        ("name", form.name.is_none()),
        ("text", form.text.is_none()),
        ("cooking_time", form.cooking_time.is_none()),
    ] {
        if missing {
            errors.add(field, REQUIRED);
        }
    }

    if let Some(ingredients) = &form.ingredients {
        check_ingredients(store, ingredients, &mut errors).await?;
    }
    let tags = match &form.tags {
        Some(tags) => Some(check_tags(store, tags, &mut errors).await?),
        None => None,
    };
    errors.into_result()?;

    let (
        Some(ingredients),
        Some(tags),
        Some(image),
        Some(name),
        Some(text),
        Some(cooking_time),
    ) = (form.ingredients, tags, form.image, form.name, form.text, form.cooking_time)
    else {
        return Err(ApiError::non_field(REQUIRED));
    };

    let recipe = store
        .create_recipe(
            session.user_id,
            &NewRecipe {
                name,
                text,
                image,
                cooking_time,
                tags,
                ingredients,
            },
        )
        .await
        .map_err(write_error)?;
    log::info!("User {} created recipe {}", session.user_id, recipe.id);

    retrieve(state, Some(session), path, recipe.id).await
}

pub async fn update(
    state: &AppState,
    session: &SessionData,
    path: &str,
    id: Id,
    form: RecipeForm,
) -> Result<RecipeView, ApiError> {
    let store = state.store();

    let row = store
        .get_recipe(id, None)
        .await?
        .ok_or_else(ApiError::not_found)?;
    ensure_author(session, &row.recipe)?;

    let mut errors = field_errors(&form);
    if let Some(ingredients) = &form.ingredients {
        check_ingredients(store, ingredients, &mut errors).await?;
    }
    let tags = match &form.tags {
        Some(tags) => Some(check_tags(store, tags, &mut errors).await?),
        None => None,
    };
    errors.into_result()?;

    let changes = RecipeChanges {
        name: form.name,
        text: form.text,
        image: form.image,
        cooking_time: form.cooking_time,
        tags,
        ingredients: form.ingredients,
    };
    store
        .update_recipe(id, &changes)
        .await
        .map_err(write_error)?
        .ok_or_else(ApiError::not_found)?;
    log::info!("User {} updated recipe {id}", session.user_id);

    retrieve(state, Some(session), path, id).await
}

pub async fn delete(state: &AppState, session: &SessionData, id: Id) -> Result<(), ApiError> {
    let store = state.store();

    let row = store
        .get_recipe(id, None)
        .await?
        .ok_or_else(ApiError::not_found)?;
    ensure_author(session, &row.recipe)?;

    if !store.delete_recipe(id).await? {
        return Err(ApiError::not_found());
    }
    log::info!("User {} deleted recipe {id}", session.user_id);

    Ok(())
}

pub async fn add_mark(
    state: &AppState,
    session: &SessionData,
    id: Id,
    mark: RecipeMark,
) -> Result<RecipeBrief, ApiError> {
    let store = state.store();

    let row = store
        .get_recipe(id, None)
        .await?
        .ok_or_else(ApiError::not_found)?;

    let added = store
        .add_mark(mark, session.user_id, id)
        .await
        .map_err(|e| match e {
            StoreError::ForeignKeyViolation { .. } => ApiError::not_found(),
            other => other.into(),
        })?;
    if !added {
        return Err(ApiError::Conflict(format!(
            "Recipe is already in {}.",
            mark.label()
        )));
    }
    log::debug!("User {} added recipe {id} to {}", session.user_id, mark.table());

    Ok(row.recipe.into())
}

pub async fn remove_mark(
    state: &AppState,
    session: &SessionData,
    id: Id,
    mark: RecipeMark,
) -> Result<(), ApiError> {
    let store = state.store();

    if store.get_recipe(id, None).await?.is_none() {
        return Err(ApiError::not_found());
    }

    if !store.remove_mark(mark, session.user_id, id).await? {
        return Err(ApiError::NotFound(format!("Recipe is not in {}.", mark.label())));
    }
    log::debug!("User {} removed recipe {id} from {}", session.user_id, mark.table());

    Ok(())
}

pub async fn download_shopping_cart(
    state: &AppState,
    session: &SessionData,
) -> Result<Vec<u8>, ApiError> {
    let items = state.store().shopping_list(session.user_id).await?;
    log::info!(
        "User {} exported a shopping list with {} lines",
        session.user_id,
        items.len()
    );

    Ok(export::render_shopping_list(&items))
}
