use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::db::report_repo::{self, ReportSortBy};
use crate::db::{self, user_repo};
use crate::error::AppError;
use crate::middleware::jwt_auth::AuthUser;
use crate::models::is_valid_report_reason;
use crate::response::{self, clamp_limit, clamp_page, Pagination};

fn parse_id(raw: &str, what: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| AppError::Validation(format!("Invalid {} id", what)))
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateReportBody {
    pub reason: String,

    #[validate(length(max = 500, message = "Message must be at most 500 characters"))]
    pub message: Option<String>,
}

/// POST /api/report/{reportedUserId}
pub async fn create(
    pool: web::Data<PgPool>,
    auth: AuthUser,
    path: web::Path<String>,
    body: web::Json<CreateReportBody>,
) -> Result<HttpResponse, AppError> {
    body.validate()?;
    let reported = parse_id(&path.into_inner(), "user")?;

    if reported == auth.id {
        return Err(AppError::Validation(
            "You cannot report yourself".to_string(),
        ));
    }

    if !is_valid_report_reason(&body.reason) {
        return Err(AppError::Validation(format!(
            "Invalid report reason: {}",
            body.reason
        )));
    }

    if user_repo::find_by_id(&pool, reported).await?.is_none() {
        return Err(AppError::NotFound("User not found".to_string()));
    }

    let message = body.message.as_deref().unwrap_or("").trim();
    let report = report_repo::create_report(&pool, auth.id, reported, &body.reason, message)
        .await
        .map_err(|e| {
            if db::is_unique_violation(&e) {
                AppError::Conflict("You have already reported this user".to_string())
            } else {
                AppError::Database(e)
            }
        })?;

    info!(report_id = %report.id, from = %auth.id, reported = %reported, "user reported");

    Ok(response::created("Report submitted", report))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportListQuery {
    pub reason: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

/// GET /api/report/all (admin)
pub async fn list_all(
    pool: web::Data<PgPool>,
    auth: AuthUser,
    query: web::Query<ReportListQuery>,
) -> Result<HttpResponse, AppError> {
    auth.require_admin()?;

    if let Some(reason) = query.reason.as_deref() {
        if !is_valid_report_reason(reason) {
            return Err(AppError::Validation(format!(
                "Invalid report reason: {}",
                reason
            )));
        }
    }

    let sort_by = match query.sort_by.as_deref() {
        None => ReportSortBy::CreatedAt,
        Some(raw) => ReportSortBy::parse(raw)
            .ok_or_else(|| AppError::Validation(format!("Invalid sort field: {}", raw)))?,
    };
    let descending = match query.sort_order.as_deref() {
        None | Some("desc") => true,
        Some("asc") => false,
        Some(other) => {
            return Err(AppError::Validation(format!("Invalid sort order: {}", other)))
        }
    };

    let page = clamp_page(query.page);
    let limit = clamp_limit(query.limit, 20, 100);

    let (reports, total) = report_repo::list_reports(
        &pool,
        query.reason.as_deref(),
        sort_by,
        descending,
        page,
        limit,
    )
    .await?;
    let reason_counts = report_repo::counts_by_reason(&pool).await?;

    let reports: Vec<_> = reports
        .iter()
        .map(|r| {
            json!({
                "id": r.id,
                "fromUser": {
                    "id": r.from_user,
                    "name": r.from_name,
                    "email": r.from_email,
                    "photo": r.from_photo,
                },
                "toUser": {
                    "id": r.to_user,
                    "name": r.to_name,
                    "email": r.to_email,
                    "photo": r.to_photo,
                },
                "reason": r.reason,
                "message": r.message,
                "status": r.status,
                "reviewedBy": r.reviewed_by,
                "reviewedAt": r.reviewed_at,
                "resolution": r.resolution,
                "createdAt": r.created_at,
            })
        })
        .collect();

    Ok(response::ok(
        "Reports fetched",
        json!({
            "reports": reports,
            "reasonCounts": reason_counts,
            "pagination": Pagination::new(page, limit, total),
        }),
    ))
}

/// GET /api/report/stats (admin)
pub async fn stats(pool: web::Data<PgPool>, auth: AuthUser) -> Result<HttpResponse, AppError> {
    auth.require_admin()?;

    let counts = report_repo::report_counts(&pool).await?;
    let by_reason = report_repo::counts_by_reason(&pool).await?;
    let most_reported = report_repo::most_reported(&pool, 10).await?;

    Ok(response::ok(
        "Report stats fetched",
        json!({
            "counts": counts,
            "byReason": by_reason,
            "mostReported": most_reported,
        }),
    ))
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ReviewBody {
    #[validate(length(max = 1000, message = "Resolution must be at most 1000 characters"))]
    pub resolution: Option<String>,
}

/// PUT /api/admin/reports/{reportId}/review (admin)
pub async fn review(
    pool: web::Data<PgPool>,
    auth: AuthUser,
    path: web::Path<String>,
    body: web::Json<ReviewBody>,
) -> Result<HttpResponse, AppError> {
    auth.require_admin()?;
    body.validate()?;
    let report_id = parse_id(&path.into_inner(), "report")?;

    if report_repo::find_by_id(&pool, report_id).await?.is_none() {
        return Err(AppError::NotFound("Report not found".to_string()));
    }

    let Some(report) =
        report_repo::review_report(&pool, report_id, auth.id, body.resolution.as_deref()).await?
    else {
        return Err(AppError::Conflict(
            "This report has already been reviewed".to_string(),
        ));
    };

    info!(report_id = %report.id, reviewer = %auth.id, "report reviewed");

    Ok(response::ok("Report reviewed", report))
}
