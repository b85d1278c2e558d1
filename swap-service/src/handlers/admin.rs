use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::db::user_repo::{
    self, AdminUserQuery, SortOrder, UserSortBy, UserStatusFilter,
};
use crate::db::{chat_repo, report_repo, request_repo};
use crate::error::AppError;
use crate::middleware::jwt_auth::AuthUser;
use crate::models::BADGES;
use crate::response::{self, clamp_limit, clamp_page, Pagination};

fn parse_user_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| AppError::Validation("Invalid user id".to_string()))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminUsersQuery {
    pub search: Option<String>,
    pub status: Option<String>,
    pub badge: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

/// GET /api/admin/users
pub async fn list_users(
    pool: web::Data<PgPool>,
    auth: AuthUser,
    query: web::Query<AdminUsersQuery>,
) -> Result<HttpResponse, AppError> {
    auth.require_admin()?;

    let status = match query.status.as_deref() {
        None => UserStatusFilter::All,
        Some(raw) => UserStatusFilter::parse(raw)
            .ok_or_else(|| AppError::Validation(format!("Invalid status filter: {}", raw)))?,
    };
    let sort_by = match query.sort_by.as_deref() {
        None => UserSortBy::CreatedAt,
        Some(raw) => UserSortBy::parse(raw)
            .ok_or_else(|| AppError::Validation(format!("Invalid sort field: {}", raw)))?,
    };
    let sort_order = match query.sort_order.as_deref() {
        None => SortOrder::Desc,
        Some(raw) => SortOrder::parse(raw)
            .ok_or_else(|| AppError::Validation(format!("Invalid sort order: {}", raw)))?,
    };

    if let Some(badge) = query.badge.as_deref() {
        if !BADGES.contains(&badge) {
            return Err(AppError::Validation(format!("Invalid badge: {}", badge)));
        }
    }

    let page = clamp_page(query.page);
    let limit = clamp_limit(query.limit, 20, 100);

    let admin_query = AdminUserQuery {
        search: query.search.clone(),
        status,
        badge: query.badge.clone(),
        sort_by,
        sort_order,
        page,
        limit,
    };

    let (users, total) = user_repo::list_users(&pool, &admin_query).await?;
    let counts = user_repo::user_counts(&pool).await?;
    let badges = user_repo::badge_distribution(&pool).await?;

    Ok(response::ok(
        "Users fetched",
        json!({
            "users": users,
            "stats": counts,
            "badgeDistribution": badges,
            "pagination": Pagination::new(page, limit, total),
        }),
    ))
}

async fn set_blocked(
    pool: &PgPool,
    auth: &AuthUser,
    raw_id: &str,
    blocked: bool,
) -> Result<HttpResponse, AppError> {
    auth.require_admin()?;
    let user_id = parse_user_id(raw_id)?;

    let user = user_repo::find_by_id(pool, user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    if user.is_admin() {
        return Err(AppError::Authorization(
            "Admin accounts cannot be moderated".to_string(),
        ));
    }

    if user.is_blocked == blocked {
        let state = if blocked { "blocked" } else { "unblocked" };
        return Err(AppError::Validation(format!("User is already {}", state)));
    }

    let user = user_repo::set_blocked(pool, user_id, blocked)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    info!(user_id = %user.id, blocked, admin = %auth.id, "user block state changed");

    let message = if blocked { "User blocked" } else { "User unblocked" };
    Ok(response::ok(message, user))
}

/// PUT /api/admin/user/{id}/block
pub async fn block_user(
    pool: web::Data<PgPool>,
    auth: AuthUser,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    set_blocked(&pool, &auth, &path.into_inner(), true).await
}

/// PUT /api/admin/user/{id}/unblock
pub async fn unblock_user(
    pool: web::Data<PgPool>,
    auth: AuthUser,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    set_blocked(&pool, &auth, &path.into_inner(), false).await
}

/// DELETE /api/admin/user/{id}
pub async fn delete_user(
    pool: web::Data<PgPool>,
    auth: AuthUser,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    auth.require_admin()?;
    let user_id = parse_user_id(&path.into_inner())?;

    let user = user_repo::find_by_id(&pool, user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    if user.is_admin() {
        return Err(AppError::Authorization(
            "Admin accounts cannot be deleted".to_string(),
        ));
    }

    // Requests, messages, reports and XP rows fall to FK cascade.
    user_repo::delete_user(&pool, user_id).await?;

    info!(user_id = %user_id, admin = %auth.id, "user deleted");

    Ok(response::ok("User deleted", json!({ "id": user_id })))
}

/// GET /api/admin/dashboard
pub async fn dashboard(pool: web::Data<PgPool>, auth: AuthUser) -> Result<HttpResponse, AppError> {
    auth.require_admin()?;

    let users = user_repo::user_counts(&pool).await?;
    let requests = request_repo::request_counts(&pool).await?;
    let reports = report_repo::report_counts(&pool).await?;
    let messages = chat_repo::message_counts(&pool).await?;
    let top_skills = user_repo::top_skills(&pool, 10).await?;
    let growth = user_repo::signup_growth(&pool).await?;

    Ok(response::ok(
        "Dashboard fetched",
        json!({
            "users": users,
            "requests": requests,
            "reports": reports,
            "messages": messages,
            "topSkills": top_skills,
            "userGrowth": growth,
        }),
    ))
}
