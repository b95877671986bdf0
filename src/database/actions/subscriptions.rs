use crate::constants::SUBSCRIPTION_UNIQUE;
use crate::database::{
    error::StoreError,
    pagination::PageQuery,
    schema::{Id, SubscriptionRow},
};

use sqlx::{Pool, Postgres};

use super::users::USER_COLUMNS;

pub async fn subscribe(user_id: Id, author_id: Id, pool: &Pool<Postgres>) -> Result<bool, StoreError> {
    let result = sqlx::query(&format!(
        "INSERT INTO subscriptions (user_id, author_id) VALUES ($1, $2) ON CONFLICT ON CONSTRAINT {SUBSCRIPTION_UNIQUE} DO NOTHING"
    ))
    .bind(user_id)
    .bind(author_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn unsubscribe(
    user_id: Id,
    author_id: Id,
    pool: &Pool<Postgres>,
) -> Result<bool, StoreError> {
    let result = sqlx::query("DELETE FROM subscriptions WHERE user_id = $1 AND author_id = $2")
        .bind(user_id)
        .bind(author_id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn is_subscribed(
    user_id: Id,
    author_id: Id,
    pool: &Pool<Postgres>,
) -> Result<bool, StoreError> {
    let row: (bool,) = sqlx::query_as(
        "SELECT EXISTS(SELECT 1 FROM subscriptions WHERE user_id = $1 AND author_id = $2)",
    )
    .bind(user_id)
    .bind(author_id)
    .fetch_one(pool)
    .await?;

    Ok(row.0)
}

pub async fn fetch_subscriptions(
    user_id: Id,
    page: &PageQuery,
    pool: &Pool<Postgres>,
) -> Result<(Vec<SubscriptionRow>, i64), StoreError> {
    let rows: Vec<SubscriptionRow> = sqlx::query_as(&format!(
        "
        SELECT {USER_COLUMNS},
            (SELECT COUNT(*) FROM recipes r WHERE r.author_id = u.id) AS recipes_count,
            COUNT(*) OVER() AS count
        FROM subscriptions s
        JOIN users u ON u.id = s.author_id
        WHERE s.user_id = $1
        ORDER BY s.id DESC
        LIMIT $2 OFFSET $3
    "
    ))
    .bind(user_id)
    .bind(page.limit)
    .bind(page.offset())
    .fetch_all(pool)
    .await?;

    let total = rows.first().map(|row| row.count).unwrap_or(0);
    Ok((rows, total))
}
