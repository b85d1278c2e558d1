/// Message repository. Conversation access control lives in the
/// handlers; everything here assumes the pair is allowed to talk.
use crate::models::Message;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

const MESSAGE_COLUMNS: &str = "id, from_user, to_user, body, read, created_at";

pub async fn insert_message(
    pool: &PgPool,
    from_user: Uuid,
    to_user: Uuid,
    body: &str,
) -> Result<Message, sqlx::Error> {
    sqlx::query_as::<_, Message>(&format!(
        r#"
        INSERT INTO messages (from_user, to_user, body)
        VALUES ($1, $2, $3)
        RETURNING {MESSAGE_COLUMNS}
        "#
    ))
    .bind(from_user)
    .bind(to_user)
    .bind(body)
    .fetch_one(pool)
    .await
}

/// Fetch a page of conversation history, newest first. When `before` is
/// set, only messages strictly older than it are returned; callers
/// reverse the page for chronological display.
pub async fn history(
    pool: &PgPool,
    a: Uuid,
    b: Uuid,
    before: Option<DateTime<Utc>>,
    page: i64,
    limit: i64,
) -> Result<(Vec<Message>, i64), sqlx::Error> {
    let total = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT COUNT(*) FROM messages
        WHERE (from_user = $1 AND to_user = $2) OR (from_user = $2 AND to_user = $1)
        "#,
    )
    .bind(a)
    .bind(b)
    .fetch_one(pool)
    .await?;

    let messages = sqlx::query_as::<_, Message>(&format!(
        r#"
        SELECT {MESSAGE_COLUMNS}
        FROM messages
        WHERE ((from_user = $1 AND to_user = $2) OR (from_user = $2 AND to_user = $1))
          AND ($3::timestamptz IS NULL OR created_at < $3)
        ORDER BY created_at DESC
        LIMIT $4 OFFSET $5
        "#
    ))
    .bind(a)
    .bind(b)
    .bind(before)
    .bind(limit)
    .bind((page - 1) * limit)
    .fetch_all(pool)
    .await?;

    Ok((messages, total))
}

/// Mark every unread message from `from_user` to `reader` as read.
/// Returns the number of messages affected.
pub async fn mark_read(pool: &PgPool, reader: Uuid, from_user: Uuid) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE messages
        SET read = TRUE
        WHERE to_user = $1 AND from_user = $2 AND read = FALSE
        "#,
    )
    .bind(reader)
    .bind(from_user)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

/// One row per conversation partner in the chat list.
#[derive(Debug, sqlx::FromRow, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatPartner {
    pub partner_id: Uuid,
    pub partner_name: String,
    pub partner_photo: Option<String>,
    pub partner_badge: String,
    pub last_message: Option<String>,
    pub last_message_at: Option<DateTime<Utc>>,
    pub unread_count: i64,
}

/// List the user's conversation partners: everyone they share an
/// accepted collaboration with, most recent activity first. Returns the
/// page plus the total partner count.
pub async fn chat_list(
    pool: &PgPool,
    user_id: Uuid,
    page: i64,
    limit: i64,
) -> Result<(Vec<ChatPartner>, i64), sqlx::Error> {
    let total = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT COUNT(*) FROM collaboration_requests
        WHERE status = 'accepted' AND (from_user = $1 OR to_user = $1)
        "#,
    )
    .bind(user_id)
    .fetch_one(pool)
    .await?;

    let partners = sqlx::query_as::<_, ChatPartner>(
        r#"
        WITH partners AS (
            SELECT CASE WHEN from_user = $1 THEN to_user ELSE from_user END AS partner_id
            FROM collaboration_requests
            WHERE status = 'accepted' AND (from_user = $1 OR to_user = $1)
        )
        SELECT p.partner_id,
               u.name AS partner_name,
               u.photo AS partner_photo,
               u.badge AS partner_badge,
               m.body AS last_message,
               m.created_at AS last_message_at,
               (SELECT COUNT(*) FROM messages
                WHERE to_user = $1 AND from_user = p.partner_id AND read = FALSE)
                   AS unread_count
        FROM partners p
        JOIN users u ON u.id = p.partner_id
        LEFT JOIN LATERAL (
            SELECT body, created_at
            FROM messages
            WHERE (from_user = $1 AND to_user = p.partner_id)
               OR (from_user = p.partner_id AND to_user = $1)
            ORDER BY created_at DESC
            LIMIT 1
        ) m ON TRUE
        ORDER BY m.created_at DESC NULLS LAST, u.name
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(user_id)
    .bind(limit)
    .bind((page - 1) * limit)
    .fetch_all(pool)
    .await?;

    Ok((partners, total))
}

#[derive(Debug, sqlx::FromRow, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageCounts {
    pub total: i64,
    pub new_last_30_days: i64,
}

/// Admin dashboard: platform-wide message counts.
pub async fn message_counts(pool: &PgPool) -> Result<MessageCounts, sqlx::Error> {
    sqlx::query_as::<_, MessageCounts>(
        r#"
        SELECT COUNT(*) AS total,
               COUNT(*) FILTER (WHERE created_at > NOW() - INTERVAL '30 days') AS new_last_30_days
        FROM messages
        "#,
    )
    .fetch_one(pool)
    .await
}
