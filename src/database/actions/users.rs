use crate::database::{
    error::StoreError,
    pagination::PageQuery,
    schema::{Id, NewUser, User, UserRow},
};

use sqlx::{Pool, Postgres};

pub(crate) const USER_COLUMNS: &str =
    "u.id, u.email, u.username, u.first_name, u.last_name, u.password, u.date_joined";

/// `is_subscribed` for the viewer bound at `$param`, NULL without a viewer.
pub(crate) fn subscribed_column(param: usize) -> String {
    format!(
        "CASE WHEN ${param}::INTEGER IS NULL THEN NULL ELSE EXISTS(
            SELECT 1 FROM subscriptions s WHERE s.user_id = ${param} AND s.author_id = u.id
        ) END AS is_subscribed"
    )
}

pub async fn create_user(user: &NewUser, pool: &Pool<Postgres>) -> Result<User, StoreError> {
    let row: User = sqlx::query_as(
        "
        INSERT INTO users (email, username, first_name, last_name, password)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
    ",
    )
    .bind(&user.email)
    .bind(&user.username)
    .bind(&user.first_name)
    .bind(&user.last_name)
    .bind(&user.password)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

pub async fn get_user(
    id: Id,
    viewer: Option<Id>,
    pool: &Pool<Postgres>,
) -> Result<Option<UserRow>, StoreError> {
    let row: Option<UserRow> = sqlx::query_as(&format!(
        "SELECT {USER_COLUMNS}, {} FROM users u WHERE u.id = $1",
        subscribed_column(2)
    ))
    .bind(id)
    .bind(viewer)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

pub async fn get_user_by_email(
    email: &str,
    pool: &Pool<Postgres>,
) -> Result<Option<User>, StoreError> {
    let row: Option<User> = sqlx::query_as("SELECT * FROM users WHERE email = $1")
        .bind(email)
        .fetch_optional(pool)
        .await?;

    Ok(row)
}

pub async fn fetch_users(
    viewer: Option<Id>,
    page: &PageQuery,
    pool: &Pool<Postgres>,
) -> Result<(Vec<UserRow>, i64), StoreError> {
    let rows: Vec<UserRow> = sqlx::query_as(&format!(
        "
        SELECT {USER_COLUMNS}, {}, COUNT(*) OVER() AS count
        FROM users u
        ORDER BY u.date_joined DESC, u.id DESC
        LIMIT $2 OFFSET $3
    ",
        subscribed_column(1)
    ))
    .bind(viewer)
    .bind(page.limit)
    .bind(page.offset())
    .fetch_all(pool)
    .await?;

    let total = rows.first().map(|row| row.count).unwrap_or(0);
    Ok((rows, total))
}

pub async fn users_by_ids(
    ids: &[Id],
    viewer: Option<Id>,
    pool: &Pool<Postgres>,
) -> Result<Vec<UserRow>, StoreError> {
    if ids.is_empty() {
        return Ok(vec![]);
    }

    let rows: Vec<UserRow> = sqlx::query_as(&format!(
        "SELECT {USER_COLUMNS}, {} FROM users u WHERE u.id = ANY($1)",
        subscribed_column(2)
    ))
    .bind(ids)
    .bind(viewer)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

pub async fn set_password(id: Id, password: &str, pool: &Pool<Postgres>) -> Result<(), StoreError> {
    sqlx::query("UPDATE users SET password = $2 WHERE id = $1")
        .bind(id)
        .bind(password)
        .execute(pool)
        .await?;

    Ok(())
}

pub async fn delete_user(id: Id, pool: &Pool<Postgres>) -> Result<bool, StoreError> {
    let result = sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}
