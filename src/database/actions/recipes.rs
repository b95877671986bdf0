use crate::database::{
    error::StoreError,
    pagination::PageQuery,
    schema::{
        Id, NewRecipe, Recipe, RecipeChanges, RecipeFilter, RecipeIngredientForm, RecipeMark,
        RecipeRow, ShoppingListItem,
    },
};

use sqlx::{PgConnection, Pool, Postgres, QueryBuilder};

const RECIPE_COLUMNS: &str =
    "r.id, r.author_id, r.name, r.text, r.image, r.cooking_time, r.pub_date";

/// Viewer flags computed in the listing query itself, NULL without a viewer.
fn push_flags(builder: &mut QueryBuilder<Postgres>, viewer: Option<Id>) {
    match viewer {
        Some(viewer) => {
            builder
                .push(", EXISTS(SELECT 1 FROM favorites f WHERE f.recipe_id = r.id AND f.user_id = ")
                .push_bind(viewer)
                .push(") AS is_favorited")
                .push(", EXISTS(SELECT 1 FROM shopping_cart c WHERE c.recipe_id = r.id AND c.user_id = ")
                .push_bind(viewer)
                .push(") AS is_in_shopping_cart");
        }
        None => {
            builder.push(", NULL::BOOLEAN AS is_favorited, NULL::BOOLEAN AS is_in_shopping_cart");
        }
    }
}

fn push_filter(builder: &mut QueryBuilder<Postgres>, filter: &RecipeFilter) {
    if let Some(author) = filter.author {
        builder.push(" AND r.author_id = ").push_bind(author);
    }

    if !filter.tags.is_empty() {
        builder
            .push(
                " AND EXISTS(SELECT 1 FROM recipe_tags rt JOIN tags t ON t.id = rt.tag_id \
                 WHERE rt.recipe_id = r.id AND t.slug = ANY(",
            )
            .push_bind(filter.tags.clone())
            .push("))");
    }

    if let Some(user) = filter.favorited_by {
        builder
            .push(" AND EXISTS(SELECT 1 FROM favorites ff WHERE ff.recipe_id = r.id AND ff.user_id = ")
            .push_bind(user)
            .push(")");
    }

    if let Some(user) = filter.in_cart_of {
        builder
            .push(" AND EXISTS(SELECT 1 FROM shopping_cart cc WHERE cc.recipe_id = r.id AND cc.user_id = ")
            .push_bind(user)
            .push(")");
    }
}

pub async fn fetch_recipes(
    filter: &RecipeFilter,
    viewer: Option<Id>,
    page: &PageQuery,
    pool: &Pool<Postgres>,
) -> Result<(Vec<RecipeRow>, i64), StoreError> {
    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(format!("SELECT {RECIPE_COLUMNS}"));
    push_flags(&mut builder, viewer);
    builder.push(", COUNT(*) OVER() AS count FROM recipes r WHERE TRUE");
    push_filter(&mut builder, filter);
    builder
        .push(" ORDER BY r.pub_date DESC, r.id DESC LIMIT ")
        .push_bind(page.limit)
        .push(" OFFSET ")
        .push_bind(page.offset());

    let rows: Vec<RecipeRow> = builder.build_query_as().fetch_all(pool).await?;

    let total = rows.first().map(|row| row.count).unwrap_or(0);
    Ok((rows, total))
}

pub async fn get_recipe(
    id: Id,
    viewer: Option<Id>,
    pool: &Pool<Postgres>,
) -> Result<Option<RecipeRow>, StoreError> {
    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(format!("SELECT {RECIPE_COLUMNS}"));
    push_flags(&mut builder, viewer);
    builder.push(" FROM recipes r WHERE r.id = ").push_bind(id);

    let row: Option<RecipeRow> = builder.build_query_as().fetch_optional(pool).await?;

    Ok(row)
}

async fn insert_tags(recipe_id: Id, tags: &[Id], conn: &mut PgConnection) -> Result<(), StoreError> {
    if tags.is_empty() {
        return Ok(());
    }

    let mut query_builder: QueryBuilder<Postgres> =
        QueryBuilder::new("INSERT INTO recipe_tags (recipe_id, tag_id) ");
    query_builder.push_values(tags.iter(), |mut b, tag_id| {
        b.push_bind(recipe_id).push_bind(*tag_id);
    });
    query_builder.push(" ON CONFLICT DO NOTHING");

    query_builder.build().execute(&mut *conn).await?;

    Ok(())
}

async fn insert_parts(
    recipe_id: Id,
    ingredients: &[RecipeIngredientForm],
    conn: &mut PgConnection,
) -> Result<(), StoreError> {
    if ingredients.is_empty() {
        return Ok(());
    }

    let mut query_builder: QueryBuilder<Postgres> =
        QueryBuilder::new("INSERT INTO recipe_ingredients (recipe_id, ingredient_id, amount) ");
    query_builder.push_values(ingredients.iter(), |mut b, part| {
        b.push_bind(recipe_id)
            .push_bind(part.id)
            .push_bind(part.amount);
    });

    query_builder.build().execute(&mut *conn).await?;

    Ok(())
}

pub async fn create_recipe(
    author: Id,
    recipe: &NewRecipe,
    pool: &Pool<Postgres>,
) -> Result<Recipe, StoreError> {
    let mut tr = pool.begin().await?;

    let row: Recipe = sqlx::query_as(
        "
        INSERT INTO recipes (author_id, name, text, image, cooking_time)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
    ",
    )
    .bind(author)
    .bind(&recipe.name)
    .bind(&recipe.text)
    .bind(&recipe.image)
    .bind(recipe.cooking_time)
    .fetch_one(&mut *tr)
    .await?;

    insert_tags(row.id, &recipe.tags, &mut *tr).await?;
    insert_parts(row.id, &recipe.ingredients, &mut *tr).await?;

    tr.commit().await?;

    Ok(row)
}

pub async fn update_recipe(
    id: Id,
    changes: &RecipeChanges,
    pool: &Pool<Postgres>,
) -> Result<Option<Recipe>, StoreError> {
    let mut tr = pool.begin().await?;

    let row: Option<Recipe> = sqlx::query_as(
        "
        UPDATE recipes SET
            name = COALESCE($2, name),
            text = COALESCE($3, text),
            image = COALESCE($4, image),
            cooking_time = COALESCE($5, cooking_time)
        WHERE id = $1
        RETURNING *
    ",
    )
    .bind(id)
    .bind(&changes.name)
    .bind(&changes.text)
    .bind(&changes.image)
    .bind(changes.cooking_time)
    .fetch_optional(&mut *tr)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    if let Some(tags) = &changes.tags {
        sqlx::query("DELETE FROM recipe_tags WHERE recipe_id = $1")
            .bind(id)
            .execute(&mut *tr)
            .await?;
        insert_tags(id, tags, &mut *tr).await?;
    }

    if let Some(ingredients) = &changes.ingredients {
        sqlx::query("DELETE FROM recipe_ingredients WHERE recipe_id = $1")
            .bind(id)
            .execute(&mut *tr)
            .await?;
        insert_parts(id, ingredients, &mut *tr).await?;
    }

    tr.commit().await?;

    Ok(Some(row))
}

pub async fn delete_recipe(id: Id, pool: &Pool<Postgres>) -> Result<bool, StoreError> {
    let result = sqlx::query("DELETE FROM recipes WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn author_recipes(
    author_ids: &[Id],
    limit: Option<i64>,
    pool: &Pool<Postgres>,
) -> Result<Vec<Recipe>, StoreError> {
    if author_ids.is_empty() {
        return Ok(vec![]);
    }

    let list: Vec<Recipe> = sqlx::query_as(
        "
        SELECT id, author_id, name, text, image, cooking_time, pub_date FROM (
            SELECT r.*, ROW_NUMBER() OVER (
                PARTITION BY r.author_id ORDER BY r.pub_date DESC, r.id DESC
            ) AS position
            FROM recipes r
            WHERE r.author_id = ANY($1)
        ) ranked
        WHERE $2::BIGINT IS NULL OR position <= $2
        ORDER BY author_id, pub_date DESC, id DESC
    ",
    )
    .bind(author_ids)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(list)
}

pub async fn count_author_recipes(author_id: Id, pool: &Pool<Postgres>) -> Result<i64, StoreError> {
    let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM recipes WHERE author_id = $1")
        .bind(author_id)
        .fetch_one(pool)
        .await?;

    Ok(row.0)
}

pub async fn add_mark(
    mark: RecipeMark,
    user_id: Id,
    recipe_id: Id,
    pool: &Pool<Postgres>,
) -> Result<bool, StoreError> {
    let result = sqlx::query(&format!(
        "INSERT INTO {} (user_id, recipe_id) VALUES ($1, $2) ON CONFLICT ON CONSTRAINT {} DO NOTHING",
        mark.table(),
        mark.constraint()
    ))
    .bind(user_id)
    .bind(recipe_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn remove_mark(
    mark: RecipeMark,
    user_id: Id,
    recipe_id: Id,
    pool: &Pool<Postgres>,
) -> Result<bool, StoreError> {
    let result = sqlx::query(&format!(
        "DELETE FROM {} WHERE user_id = $1 AND recipe_id = $2",
        mark.table()
    ))
    .bind(user_id)
    .bind(recipe_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn has_mark(
    mark: RecipeMark,
    user_id: Id,
    recipe_id: Id,
    pool: &Pool<Postgres>,
) -> Result<bool, StoreError> {
    let row: (bool,) = sqlx::query_as(&format!(
        "SELECT EXISTS(SELECT 1 FROM {} WHERE user_id = $1 AND recipe_id = $2)",
        mark.table()
    ))
    .bind(user_id)
    .bind(recipe_id)
    .fetch_one(pool)
    .await?;

    Ok(row.0)
}

pub async fn shopping_list(
    user_id: Id,
    pool: &Pool<Postgres>,
) -> Result<Vec<ShoppingListItem>, StoreError> {
    let list: Vec<ShoppingListItem> = sqlx::query_as(
        "
        SELECT i.name, i.measurement_unit, SUM(ri.amount)::BIGINT AS amount
        FROM shopping_cart c
        JOIN recipe_ingredients ri ON ri.recipe_id = c.recipe_id
        JOIN ingredients i ON i.id = ri.ingredient_id
        WHERE c.user_id = $1
        GROUP BY i.name, i.measurement_unit
        ORDER BY i.name, i.measurement_unit
    ",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(list)
}
