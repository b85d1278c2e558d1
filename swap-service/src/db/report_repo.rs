/// Abuse report repository
use crate::models::Report;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

const REPORT_COLUMNS: &str = "id, from_user, to_user, reason, message, status, \
     reviewed_by, reviewed_at, resolution, created_at";

/// Insert a report. The (from_user, to_user) unique constraint rejects
/// a second report by the same reporter against the same user; callers
/// map that violation to a conflict.
pub async fn create_report(
    pool: &PgPool,
    from_user: Uuid,
    to_user: Uuid,
    reason: &str,
    message: &str,
) -> Result<Report, sqlx::Error> {
    sqlx::query_as::<_, Report>(&format!(
        r#"
        INSERT INTO reports (from_user, to_user, reason, message)
        VALUES ($1, $2, $3, $4)
        RETURNING {REPORT_COLUMNS}
        "#
    ))
    .bind(from_user)
    .bind(to_user)
    .bind(reason)
    .bind(message)
    .fetch_one(pool)
    .await
}

pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Report>, sqlx::Error> {
    sqlx::query_as::<_, Report>(&format!(
        r#"
        SELECT {REPORT_COLUMNS}
        FROM reports
        WHERE id = $1
        "#
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
}

/// Sort keys accepted by the report listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportSortBy {
    CreatedAt,
    Reason,
}

impl ReportSortBy {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "created_at" => Some(Self::CreatedAt),
            "reason" => Some(Self::Reason),
            _ => None,
        }
    }

    fn column(self) -> &'static str {
        match self {
            Self::CreatedAt => "created_at",
            Self::Reason => "reason",
        }
    }
}

/// A report row joined with both parties' contact fields, as the
/// moderation queue displays them.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ReportListRow {
    pub id: Uuid,
    pub from_user: Uuid,
    pub to_user: Uuid,
    pub reason: String,
    pub message: String,
    pub status: String,
    pub reviewed_by: Option<Uuid>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub resolution: Option<String>,
    pub created_at: DateTime<Utc>,
    pub from_name: String,
    pub from_email: String,
    pub from_photo: Option<String>,
    pub to_name: String,
    pub to_email: String,
    pub to_photo: Option<String>,
}

/// Admin: paginated report listing, optionally filtered by reason.
pub async fn list_reports(
    pool: &PgPool,
    reason: Option<&str>,
    sort_by: ReportSortBy,
    descending: bool,
    page: i64,
    limit: i64,
) -> Result<(Vec<ReportListRow>, i64), sqlx::Error> {
    let order = if descending { "DESC" } else { "ASC" };

    let total = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT COUNT(*) FROM reports
        WHERE ($1::text IS NULL OR reason = $1)
        "#,
    )
    .bind(reason)
    .fetch_one(pool)
    .await?;

    let reports = sqlx::query_as::<_, ReportListRow>(&format!(
        r#"
        SELECT r.id, r.from_user, r.to_user, r.reason, r.message, r.status,
               r.reviewed_by, r.reviewed_at, r.resolution, r.created_at,
               f.name AS from_name, f.email AS from_email, f.photo AS from_photo,
               t.name AS to_name, t.email AS to_email, t.photo AS to_photo
        FROM reports r
        JOIN users f ON f.id = r.from_user
        JOIN users t ON t.id = r.to_user
        WHERE ($1::text IS NULL OR r.reason = $1)
        ORDER BY r.{} {order}
        LIMIT $2 OFFSET $3
        "#,
        sort_by.column()
    ))
    .bind(reason)
    .bind(limit)
    .bind((page - 1) * limit)
    .fetch_all(pool)
    .await?;

    Ok((reports, total))
}

/// Admin: mark a pending report reviewed, stamping the reviewer.
pub async fn review_report(
    pool: &PgPool,
    id: Uuid,
    reviewer: Uuid,
    resolution: Option<&str>,
) -> Result<Option<Report>, sqlx::Error> {
    sqlx::query_as::<_, Report>(&format!(
        r#"
        UPDATE reports
        SET status = 'reviewed', reviewed_by = $2, reviewed_at = NOW(), resolution = $3
        WHERE id = $1 AND status = 'pending'
        RETURNING {REPORT_COLUMNS}
        "#
    ))
    .bind(id)
    .bind(reviewer)
    .bind(resolution)
    .fetch_optional(pool)
    .await
}

#[derive(Debug, sqlx::FromRow, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportCounts {
    pub total: i64,
    pub pending: i64,
    pub reviewed: i64,
    pub last_7_days: i64,
    pub new_last_30_days: i64,
}

pub async fn report_counts(pool: &PgPool) -> Result<ReportCounts, sqlx::Error> {
    sqlx::query_as::<_, ReportCounts>(
        r#"
        SELECT COUNT(*) AS total,
               COUNT(*) FILTER (WHERE status = 'pending') AS pending,
               COUNT(*) FILTER (WHERE status = 'reviewed') AS reviewed,
               COUNT(*) FILTER (WHERE created_at > NOW() - INTERVAL '7 days') AS last_7_days,
               COUNT(*) FILTER (WHERE created_at > NOW() - INTERVAL '30 days') AS new_last_30_days
        FROM reports
        "#,
    )
    .fetch_one(pool)
    .await
}

/// Breakdown of reports by reason.
#[derive(Debug, sqlx::FromRow, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReasonCount {
    pub reason: String,
    pub count: i64,
}

pub async fn counts_by_reason(pool: &PgPool) -> Result<Vec<ReasonCount>, sqlx::Error> {
    sqlx::query_as::<_, ReasonCount>(
        r#"
        SELECT reason, COUNT(*) AS count
        FROM reports
        GROUP BY reason
        ORDER BY count DESC
        "#,
    )
    .fetch_all(pool)
    .await
}

/// Users with the most reports against them, for the moderation queue.
#[derive(Debug, sqlx::FromRow, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportedUser {
    pub user_id: Uuid,
    pub name: String,
    pub report_count: i64,
}

pub async fn most_reported(pool: &PgPool, limit: i64) -> Result<Vec<ReportedUser>, sqlx::Error> {
    sqlx::query_as::<_, ReportedUser>(
        r#"
        SELECT r.to_user AS user_id, u.name, COUNT(*) AS report_count
        FROM reports r
        JOIN users u ON u.id = r.to_user
        GROUP BY r.to_user, u.name
        ORDER BY report_count DESC, u.name
        LIMIT $1
        "#,
    )
    .bind(limit)
    .fetch_all(pool)
    .await
}
