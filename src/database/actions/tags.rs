use crate::database::{
    error::StoreError,
    schema::{Id, LinkedTag, NewTag, Tag},
};

use sqlx::{Pool, Postgres};

pub async fn create_tag(tag: &NewTag, pool: &Pool<Postgres>) -> Result<Tag, StoreError> {
    let row: Tag =
        sqlx::query_as("INSERT INTO tags (name, color, slug) VALUES ($1, $2, $3) RETURNING *")
            .bind(&tag.name)
            .bind(&tag.color)
            .bind(&tag.slug)
            .fetch_one(pool)
            .await?;

    Ok(row)
}

pub async fn get_tag(id: Id, pool: &Pool<Postgres>) -> Result<Option<Tag>, StoreError> {
    let row: Option<Tag> = sqlx::query_as("SELECT * FROM tags WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    Ok(row)
}

pub async fn list_tags(pool: &Pool<Postgres>) -> Result<Vec<Tag>, StoreError> {
    let list: Vec<Tag> = sqlx::query_as("SELECT * FROM tags ORDER BY id")
        .fetch_all(pool)
        .await?;

    Ok(list)
}

pub async fn tags_by_ids(ids: &[Id], pool: &Pool<Postgres>) -> Result<Vec<Tag>, StoreError> {
    let list: Vec<Tag> = sqlx::query_as("SELECT * FROM tags WHERE id = ANY($1) ORDER BY id")
        .bind(ids)
        .fetch_all(pool)
        .await?;

    Ok(list)
}

pub async fn tags_by_slugs(
    slugs: &[String],
    pool: &Pool<Postgres>,
) -> Result<Vec<Tag>, StoreError> {
    let list: Vec<Tag> = sqlx::query_as("SELECT * FROM tags WHERE slug = ANY($1) ORDER BY id")
        .bind(slugs)
        .fetch_all(pool)
        .await?;

    Ok(list)
}

pub async fn list_recipe_tags(
    recipe_ids: &[Id],
    pool: &Pool<Postgres>,
) -> Result<Vec<LinkedTag>, StoreError> {
    if recipe_ids.is_empty() {
        return Ok(vec![]);
    }

    let list: Vec<LinkedTag> = sqlx::query_as(
        "
        SELECT rt.recipe_id, t.id, t.name, t.color, t.slug
        FROM recipe_tags rt
        JOIN tags t ON t.id = rt.tag_id
        WHERE rt.recipe_id = ANY($1)
        ORDER BY rt.recipe_id, t.id
    ",
    )
    .bind(recipe_ids)
    .fetch_all(pool)
    .await?;

    Ok(list)
}
