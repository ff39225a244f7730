use sqlx::PgPool;

use crate::db::models::GmuteSetting;

pub async fn get(pool: &PgPool, chat_id: i64) -> Result<Option<GmuteSetting>, sqlx::Error> {
    sqlx::query_as::<_, GmuteSetting>("SELECT * FROM gmute_settings WHERE chat_id = $1")
        .bind(chat_id)
        .fetch_optional(pool)
        .await
}

/// Whether a chat enforces gmutes. Chats never configured do.
pub async fn does_chat_gmute(pool: &PgPool, chat_id: i64) -> Result<bool, sqlx::Error> {
    Ok(get(pool, chat_id).await?.map(|s| s.enforce).unwrap_or(true))
}

pub async fn set_enforce(
    pool: &PgPool,
    chat_id: i64,
    enforce: bool,
) -> Result<GmuteSetting, sqlx::Error> {
    sqlx::query_as::<_, GmuteSetting>(
        r#"
        INSERT INTO gmute_settings (chat_id, enforce)
        VALUES ($1, $2)
        ON CONFLICT (chat_id)
        DO UPDATE SET enforce = EXCLUDED.enforce
        RETURNING *
        "#,
    )
    .bind(chat_id)
    .bind(enforce)
    .fetch_one(pool)
    .await
}

/// Move a chat's preference to its new id. Returns false if there was none,
/// or if both ids are the same.
pub async fn migrate_chat(
    pool: &PgPool,
    old_chat_id: i64,
    new_chat_id: i64,
) -> Result<bool, sqlx::Error> {
    if old_chat_id == new_chat_id {
        return Ok(false);
    }

    let mut tx = pool.begin().await?;

    let copied = sqlx::query(
        r#"
        INSERT INTO gmute_settings (chat_id, enforce)
        SELECT $2, enforce FROM gmute_settings WHERE chat_id = $1
        ON CONFLICT (chat_id)
        DO UPDATE SET enforce = EXCLUDED.enforce
        "#,
    )
    .bind(old_chat_id)
    .bind(new_chat_id)
    .execute(&mut *tx)
    .await?;

    if copied.rows_affected() == 0 {
        tx.rollback().await?;
        return Ok(false);
    }

    sqlx::query("DELETE FROM gmute_settings WHERE chat_id = $1")
        .bind(old_chat_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(true)
}
