use sqlx::PgPool;

use crate::db::models::GlobalMute;

pub async fn get(pool: &PgPool, user_id: i64) -> Result<Option<GlobalMute>, sqlx::Error> {
    sqlx::query_as::<_, GlobalMute>("SELECT * FROM global_mutes WHERE user_id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await
}

/// Check if a user currently has an active global mute
pub async fn is_user_gmuted(pool: &PgPool, user_id: i64) -> Result<bool, sqlx::Error> {
    let row: (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM global_mutes WHERE user_id = $1 AND muted",
    )
    .bind(user_id)
    .fetch_one(pool)
    .await?;

    Ok(row.0 > 0)
}

/// Mark a user as globally muted, creating the row on first use
pub async fn gmute_user(
    pool: &PgPool,
    user_id: i64,
    name: &str,
    reason: Option<&str>,
) -> Result<GlobalMute, sqlx::Error> {
    sqlx::query_as::<_, GlobalMute>(
        r#"
        INSERT INTO global_mutes (user_id, name, reason, muted, mute_count)
        VALUES ($1, $2, $3, TRUE, 1)
        ON CONFLICT (user_id)
        DO UPDATE SET
            name = EXCLUDED.name,
            reason = EXCLUDED.reason,
            muted = TRUE,
            mute_count = global_mutes.mute_count + 1,
            updated_at = NOW()
        RETURNING *
        "#,
    )
    .bind(user_id)
    .bind(name)
    .bind(reason)
    .fetch_one(pool)
    .await
}

/// Replace the reason of an active mute, returning the previous one
pub async fn update_gmute_reason(
    pool: &PgPool,
    user_id: i64,
    name: &str,
    reason: &str,
) -> Result<Option<String>, sqlx::Error> {
    let row: Option<(Option<String>,)> = sqlx::query_as(
        r#"
        UPDATE global_mutes AS g
        SET name = $2, reason = $3, updated_at = NOW()
        FROM (SELECT user_id, reason FROM global_mutes WHERE user_id = $1) AS old
        WHERE g.user_id = old.user_id AND g.muted
        RETURNING old.reason
        "#,
    )
    .bind(user_id)
    .bind(name)
    .bind(reason)
    .fetch_optional(pool)
    .await?;

    Ok(row.and_then(|(reason,)| reason))
}

/// Clear an active mute. The row is kept for its history.
pub async fn ungmute_user(pool: &PgPool, user_id: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE global_mutes
        SET muted = FALSE, updated_at = NOW()
        WHERE user_id = $1 AND muted
        "#,
    )
    .bind(user_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Write a previously read record back verbatim
pub async fn restore(pool: &PgPool, record: &GlobalMute) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO global_mutes (user_id, name, reason, muted, mute_count, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (user_id)
        DO UPDATE SET
            name = EXCLUDED.name,
            reason = EXCLUDED.reason,
            muted = EXCLUDED.muted,
            mute_count = EXCLUDED.mute_count,
            updated_at = EXCLUDED.updated_at
        "#,
    )
    .bind(record.user_id)
    .bind(&record.name)
    .bind(&record.reason)
    .bind(record.muted)
    .bind(record.mute_count)
    .bind(record.updated_at)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn delete(pool: &PgPool, user_id: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM global_mutes WHERE user_id = $1")
        .bind(user_id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// All currently muted users, ordered by user id
pub async fn get_gmute_list(pool: &PgPool) -> Result<Vec<GlobalMute>, sqlx::Error> {
    sqlx::query_as::<_, GlobalMute>(
        "SELECT * FROM global_mutes WHERE muted ORDER BY user_id",
    )
    .fetch_all(pool)
    .await
}

pub async fn num_gmuted_users(pool: &PgPool) -> Result<i64, sqlx::Error> {
    let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM global_mutes WHERE muted")
        .fetch_one(pool)
        .await?;

    Ok(row.0)
}
