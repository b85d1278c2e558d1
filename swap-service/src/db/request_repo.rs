/// Collaboration request repository
use crate::models::{CollaborationRequest, XP_COLLABORATION_ACCEPTED};
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

const REQUEST_COLUMNS: &str = "id, from_user, to_user, message, status, created_at, updated_at";

/// Find the request between two users, in either direction.
pub async fn find_between(
    pool: &PgPool,
    a: Uuid,
    b: Uuid,
) -> Result<Option<CollaborationRequest>, sqlx::Error> {
    sqlx::query_as::<_, CollaborationRequest>(&format!(
        r#"
        SELECT {REQUEST_COLUMNS}
        FROM collaboration_requests
        WHERE (from_user = $1 AND to_user = $2) OR (from_user = $2 AND to_user = $1)
        "#
    ))
    .bind(a)
    .bind(b)
    .fetch_optional(pool)
    .await
}

pub async fn find_by_id(
    pool: &PgPool,
    id: Uuid,
) -> Result<Option<CollaborationRequest>, sqlx::Error> {
    sqlx::query_as::<_, CollaborationRequest>(&format!(
        r#"
        SELECT {REQUEST_COLUMNS}
        FROM collaboration_requests
        WHERE id = $1
        "#
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
}

/// Insert a pending request. The unordered-pair unique index rejects a
/// second request between the same two users regardless of direction;
/// callers map that violation to a conflict.
pub async fn create_request(
    pool: &PgPool,
    from_user: Uuid,
    to_user: Uuid,
    message: &str,
) -> Result<CollaborationRequest, sqlx::Error> {
    sqlx::query_as::<_, CollaborationRequest>(&format!(
        r#"
        INSERT INTO collaboration_requests (from_user, to_user, message)
        VALUES ($1, $2, $3)
        RETURNING {REQUEST_COLUMNS}
        "#
    ))
    .bind(from_user)
    .bind(to_user)
    .bind(message)
    .fetch_one(pool)
    .await
}

/// Accept a pending request addressed to `to_user`.
///
/// The status transition is a compare-and-set on `status = 'pending'`;
/// concurrent accept/reject calls race on that row and exactly one wins.
/// The winning transaction also enqueues the XP awards for both parties,
/// so a request can never award XP twice.
pub async fn accept_request(
    pool: &PgPool,
    id: Uuid,
    to_user: Uuid,
) -> Result<Option<CollaborationRequest>, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let request = sqlx::query_as::<_, CollaborationRequest>(&format!(
        r#"
        UPDATE collaboration_requests
        SET status = 'accepted', updated_at = NOW()
        WHERE id = $1 AND to_user = $2 AND status = 'pending'
        RETURNING {REQUEST_COLUMNS}
        "#
    ))
    .bind(id)
    .bind(to_user)
    .fetch_optional(&mut *tx)
    .await?;

    let Some(request) = request else {
        tx.rollback().await?;
        return Ok(None);
    };

    for user_id in [request.from_user, request.to_user] {
        sqlx::query(
            r#"
            INSERT INTO xp_awards (request_id, user_id, amount)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(request.id)
        .bind(user_id)
        .bind(XP_COLLABORATION_ACCEPTED)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(Some(request))
}

/// Reject a pending request addressed to `to_user`.
pub async fn reject_request(
    pool: &PgPool,
    id: Uuid,
    to_user: Uuid,
) -> Result<Option<CollaborationRequest>, sqlx::Error> {
    sqlx::query_as::<_, CollaborationRequest>(&format!(
        r#"
        UPDATE collaboration_requests
        SET status = 'rejected', updated_at = NOW()
        WHERE id = $1 AND to_user = $2 AND status = 'pending'
        RETURNING {REQUEST_COLUMNS}
        "#
    ))
    .bind(id)
    .bind(to_user)
    .fetch_optional(pool)
    .await
}

#[derive(Debug, Clone, Copy)]
pub enum RequestDirection {
    Received,
    Sent,
}

impl RequestDirection {
    fn column(self) -> &'static str {
        match self {
            Self::Received => "to_user",
            Self::Sent => "from_user",
        }
    }
}

/// Sort keys accepted by the request listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestSortBy {
    CreatedAt,
    UpdatedAt,
}

impl RequestSortBy {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "created_at" => Some(Self::CreatedAt),
            "updated_at" => Some(Self::UpdatedAt),
            _ => None,
        }
    }

    fn column(self) -> &'static str {
        match self {
            Self::CreatedAt => "created_at",
            Self::UpdatedAt => "updated_at",
        }
    }
}

/// Per-status counts over a user's requests in one direction,
/// unaffected by the listing's status filter.
#[derive(Debug, sqlx::FromRow, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusCounts {
    pub all: i64,
    pub pending: i64,
    pub accepted: i64,
    pub rejected: i64,
}

pub async fn status_counts(
    pool: &PgPool,
    user_id: Uuid,
    direction: RequestDirection,
) -> Result<StatusCounts, sqlx::Error> {
    sqlx::query_as::<_, StatusCounts>(&format!(
        r#"
        SELECT COUNT(*) AS "all",
               COUNT(*) FILTER (WHERE status = 'pending') AS pending,
               COUNT(*) FILTER (WHERE status = 'accepted') AS accepted,
               COUNT(*) FILTER (WHERE status = 'rejected') AS rejected
        FROM collaboration_requests
        WHERE {} = $1
        "#,
        direction.column()
    ))
    .bind(user_id)
    .fetch_one(pool)
    .await
}

/// A request row joined with both participants' public fields, as the
/// listings display them.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RequestListRow {
    pub id: Uuid,
    pub from_user: Uuid,
    pub to_user: Uuid,
    pub message: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub from_name: String,
    pub from_photo: Option<String>,
    pub from_skills: Vec<String>,
    pub from_xp: i32,
    pub from_badge: String,
    pub to_name: String,
    pub to_photo: Option<String>,
    pub to_skills: Vec<String>,
    pub to_xp: i32,
    pub to_badge: String,
}

/// Paginated listing of a user's requests in one direction.
pub async fn list_requests(
    pool: &PgPool,
    user_id: Uuid,
    direction: RequestDirection,
    status: Option<&str>,
    sort_by: RequestSortBy,
    descending: bool,
    page: i64,
    limit: i64,
) -> Result<(Vec<RequestListRow>, i64), sqlx::Error> {
    let column = direction.column();
    let order = if descending { "DESC" } else { "ASC" };

    let total = sqlx::query_scalar::<_, i64>(&format!(
        r#"
        SELECT COUNT(*) FROM collaboration_requests
        WHERE {column} = $1 AND ($2::text IS NULL OR status = $2)
        "#
    ))
    .bind(user_id)
    .bind(status)
    .fetch_one(pool)
    .await?;

    let requests = sqlx::query_as::<_, RequestListRow>(&format!(
        r#"
        SELECT r.id, r.from_user, r.to_user, r.message, r.status,
               r.created_at, r.updated_at,
               f.name AS from_name, f.photo AS from_photo,
               f.skills AS from_skills, f.xp AS from_xp, f.badge AS from_badge,
               t.name AS to_name, t.photo AS to_photo,
               t.skills AS to_skills, t.xp AS to_xp, t.badge AS to_badge
        FROM collaboration_requests r
        JOIN users f ON f.id = r.from_user
        JOIN users t ON t.id = r.to_user
        WHERE r.{column} = $1 AND ($2::text IS NULL OR r.status = $2)
        ORDER BY r.{} {order}
        LIMIT $3 OFFSET $4
        "#,
        sort_by.column()
    ))
    .bind(user_id)
    .bind(status)
    .bind(limit)
    .bind((page - 1) * limit)
    .fetch_all(pool)
    .await?;

    Ok((requests, total))
}

/// True when the pair shares an accepted collaboration. Gates messaging.
pub async fn accepted_exists(pool: &PgPool, a: Uuid, b: Uuid) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar::<_, bool>(
        r#"
        SELECT EXISTS(
            SELECT 1 FROM collaboration_requests
            WHERE status = 'accepted'
              AND ((from_user = $1 AND to_user = $2) OR (from_user = $2 AND to_user = $1))
        )
        "#,
    )
    .bind(a)
    .bind(b)
    .fetch_one(pool)
    .await
}

#[derive(Debug, sqlx::FromRow)]
pub struct UserRequestCounts {
    pub total_sent: i64,
    pub pending_sent: i64,
    pub accepted_sent: i64,
    pub total_received: i64,
    pub pending_received: i64,
    pub accepted_received: i64,
}

/// Per-user request counters feeding success and response rates.
pub async fn user_request_counts(
    pool: &PgPool,
    user_id: Uuid,
) -> Result<UserRequestCounts, sqlx::Error> {
    sqlx::query_as::<_, UserRequestCounts>(
        r#"
        SELECT COUNT(*) FILTER (WHERE from_user = $1) AS total_sent,
               COUNT(*) FILTER (WHERE from_user = $1 AND status = 'pending') AS pending_sent,
               COUNT(*) FILTER (WHERE from_user = $1 AND status = 'accepted') AS accepted_sent,
               COUNT(*) FILTER (WHERE to_user = $1) AS total_received,
               COUNT(*) FILTER (WHERE to_user = $1 AND status = 'pending') AS pending_received,
               COUNT(*) FILTER (WHERE to_user = $1 AND status = 'accepted') AS accepted_received
        FROM collaboration_requests
        WHERE from_user = $1 OR to_user = $1
        "#,
    )
    .bind(user_id)
    .fetch_one(pool)
    .await
}

#[derive(Debug, sqlx::FromRow, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestCounts {
    pub total: i64,
    pub pending: i64,
    pub accepted: i64,
    pub rejected: i64,
    pub new_last_30_days: i64,
}

/// Admin dashboard: platform-wide request counts.
pub async fn request_counts(pool: &PgPool) -> Result<RequestCounts, sqlx::Error> {
    sqlx::query_as::<_, RequestCounts>(
        r#"
        SELECT COUNT(*) AS total,
               COUNT(*) FILTER (WHERE status = 'pending') AS pending,
               COUNT(*) FILTER (WHERE status = 'accepted') AS accepted,
               COUNT(*) FILTER (WHERE status = 'rejected') AS rejected,
               COUNT(*) FILTER (WHERE created_at > NOW() - INTERVAL '30 days') AS new_last_30_days
        FROM collaboration_requests
        "#,
    )
    .fetch_one(pool)
    .await
}
