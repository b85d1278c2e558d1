use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::db::request_repo::{self, RequestDirection, RequestSortBy};
use crate::db::{self, user_repo};
use crate::error::AppError;
use crate::middleware::jwt_auth::AuthUser;
use crate::models::{REQUEST_ACCEPTED, REQUEST_PENDING, REQUEST_REJECTED};
use crate::response::{self, clamp_limit, clamp_page, Pagination};
use crate::workers::xp_awards;

fn parse_id(raw: &str, what: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| AppError::Validation(format!("Invalid {} id", what)))
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateRequestBody {
    #[validate(length(max = 500, message = "Message must be at most 500 characters"))]
    pub message: Option<String>,
}

/// POST /api/request/{toUserId}
pub async fn create(
    pool: web::Data<PgPool>,
    auth: AuthUser,
    path: web::Path<String>,
    body: web::Json<CreateRequestBody>,
) -> Result<HttpResponse, AppError> {
    body.validate()?;
    let to_user = parse_id(&path.into_inner(), "user")?;

    if to_user == auth.id {
        return Err(AppError::Validation(
            "You cannot send a request to yourself".to_string(),
        ));
    }

    let target = user_repo::find_by_id(&pool, to_user)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    if target.is_blocked {
        return Err(AppError::Authorization("This user is blocked".to_string()));
    }

    if !target.is_public {
        return Err(AppError::Authorization("This profile is private".to_string()));
    }

    // Pre-check for a friendlier message; the unique index is the
    // actual guarantee.
    if let Some(existing) = request_repo::find_between(&pool, auth.id, to_user).await? {
        let message = match existing.status.as_str() {
            REQUEST_ACCEPTED => "You are already collaborating with this user",
            REQUEST_REJECTED => "A previous request between you and this user was declined",
            _ => "A request between you and this user is already pending",
        };
        return Err(AppError::Conflict(message.to_string()));
    }

    let message = body.message.as_deref().unwrap_or("").trim();
    let request = request_repo::create_request(&pool, auth.id, to_user, message)
        .await
        .map_err(|e| {
            if db::is_unique_violation(&e) {
                AppError::Conflict(
                    "A request already exists between you and this user".to_string(),
                )
            } else {
                AppError::Database(e)
            }
        })?;

    let sender = user_repo::find_by_id(&pool, auth.id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    info!(request_id = %request.id, from = %auth.id, to = %to_user, "collaboration request sent");

    Ok(response::created(
        "Collaboration request sent",
        json!({
            "request": request,
            "fromUser": sender.public_profile(),
            "toUser": target.public_profile(),
        }),
    ))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    pub status: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

fn parse_status_filter(raw: Option<&str>) -> Result<Option<String>, AppError> {
    match raw {
        None | Some("all") => Ok(None),
        Some(s @ (REQUEST_PENDING | REQUEST_ACCEPTED | REQUEST_REJECTED)) => {
            Ok(Some(s.to_string()))
        }
        Some(other) => Err(AppError::Validation(format!("Invalid status: {}", other))),
    }
}

async fn list(
    pool: &PgPool,
    auth: &AuthUser,
    direction: RequestDirection,
    query: &ListQuery,
) -> Result<HttpResponse, AppError> {
    let status = parse_status_filter(query.status.as_deref())?;
    let sort_by = match query.sort_by.as_deref() {
        None => RequestSortBy::CreatedAt,
        Some(raw) => RequestSortBy::parse(raw)
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
    let limit = clamp_limit(query.limit, 10, 50);

    let (requests, total) = request_repo::list_requests(
        pool,
        auth.id,
        direction,
        status.as_deref(),
        sort_by,
        descending,
        page,
        limit,
    )
    .await?;
    let counts = request_repo::status_counts(pool, auth.id, direction).await?;

    let requests: Vec<_> = requests
        .iter()
        .map(|r| {
            json!({
                "id": r.id,
                "fromUser": {
                    "id": r.from_user,
                    "name": r.from_name,
                    "photo": r.from_photo,
                    "skills": r.from_skills,
                    "xp": r.from_xp,
                    "badge": r.from_badge,
                },
                "toUser": {
                    "id": r.to_user,
                    "name": r.to_name,
                    "photo": r.to_photo,
                    "skills": r.to_skills,
                    "xp": r.to_xp,
                    "badge": r.to_badge,
                },
                "message": r.message,
                "status": r.status,
                "createdAt": r.created_at,
                "updatedAt": r.updated_at,
            })
        })
        .collect();

    Ok(response::ok(
        "Requests fetched",
        json!({
            "requests": requests,
            "statusCounts": counts,
            "pagination": Pagination::new(page, limit, total),
        }),
    ))
}

/// GET /api/request/received
pub async fn received(
    pool: web::Data<PgPool>,
    auth: AuthUser,
    query: web::Query<ListQuery>,
) -> Result<HttpResponse, AppError> {
    list(&pool, &auth, RequestDirection::Received, &query).await
}

/// GET /api/request/sent
pub async fn sent(
    pool: web::Data<PgPool>,
    auth: AuthUser,
    query: web::Query<ListQuery>,
) -> Result<HttpResponse, AppError> {
    list(&pool, &auth, RequestDirection::Sent, &query).await
}

/// POST /api/request/{requestId}/accept
pub async fn accept(
    pool: web::Data<PgPool>,
    auth: AuthUser,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let request_id = parse_id(&path.into_inner(), "request")?;

    let existing = request_repo::find_by_id(&pool, request_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Request not found".to_string()))?;

    if existing.to_user != auth.id {
        return Err(AppError::Authorization(
            "Only the recipient can respond to this request".to_string(),
        ));
    }

    // Conditional update: of two racing accept/reject calls exactly one
    // sees the pending row.
    let Some(request) = request_repo::accept_request(&pool, request_id, auth.id).await? else {
        return Err(AppError::Conflict(
            "This request has already been processed".to_string(),
        ));
    };

    // Best-effort inline application; the background worker retries
    // anything this misses.
    if let Err(e) = xp_awards::apply_for_request(&pool, request.id).await {
        warn!(request_id = %request.id, error = %e, "inline XP application failed");
    }

    info!(request_id = %request.id, user_id = %auth.id, "collaboration request accepted");

    Ok(response::ok(
        "Collaboration request accepted",
        json!({
            "request": request,
            "xpAwarded": crate::models::XP_COLLABORATION_ACCEPTED,
        }),
    ))
}

/// POST /api/request/{requestId}/reject
pub async fn reject(
    pool: web::Data<PgPool>,
    auth: AuthUser,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let request_id = parse_id(&path.into_inner(), "request")?;

    let existing = request_repo::find_by_id(&pool, request_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Request not found".to_string()))?;

    if existing.to_user != auth.id {
        return Err(AppError::Authorization(
            "Only the recipient can respond to this request".to_string(),
        ));
    }

    let Some(request) = request_repo::reject_request(&pool, request_id, auth.id).await? else {
        return Err(AppError::Conflict(
            "This request has already been processed".to_string(),
        ));
    };

    info!(request_id = %request.id, user_id = %auth.id, "collaboration request rejected");

    Ok(response::ok("Collaboration request rejected", request))
}

/// GET /api/request/stats
pub async fn stats(pool: web::Data<PgPool>, auth: AuthUser) -> Result<HttpResponse, AppError> {
    let counts = request_repo::user_request_counts(&pool, auth.id).await?;

    let success_rate = if counts.total_sent > 0 {
        ((counts.accepted_sent as f64 / counts.total_sent as f64) * 100.0).round() as i64
    } else {
        0
    };

    // Counts every non-pending received request as responded.
    let responded_received =
        counts.accepted_received + (counts.total_received - counts.pending_received - counts.accepted_received);
    let response_rate = if counts.total_received > 0 {
        ((responded_received as f64 / counts.total_received as f64) * 100.0).round() as i64
    } else {
        0
    };

    Ok(response::ok(
        "Request stats fetched",
        json!({
            "sent": {
                "total": counts.total_sent,
                "pending": counts.pending_sent,
                "accepted": counts.accepted_sent,
            },
            "received": {
                "total": counts.total_received,
                "pending": counts.pending_received,
                "accepted": counts.accepted_received,
            },
            "totalCollaborations": counts.accepted_sent + counts.accepted_received,
            "successRate": success_rate,
            "responseRate": response_rate,
        }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_filter_parsing() {
        assert_eq!(parse_status_filter(None).unwrap(), None);
        assert_eq!(parse_status_filter(Some("all")).unwrap(), None);
        assert_eq!(
            parse_status_filter(Some("pending")).unwrap(),
            Some("pending".to_string())
        );
        assert!(parse_status_filter(Some("bogus")).is_err());
    }
}
