use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::db::user_repo::{self, ProfileUpdate, SortOrder, UserSearch, UserSortBy};
use crate::db::{self, request_repo};
use crate::error::AppError;
use crate::middleware::jwt_auth::AuthUser;
use crate::models::{badge_for_xp, level_for_xp, BADGES};
use crate::response::{self, clamp_limit, clamp_page, Pagination};

const MAX_SKILLS: usize = 20;

fn parse_user_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| AppError::Validation("Invalid user id".to_string()))
}

fn validate_skills(skills: &[String]) -> Result<(), AppError> {
    if skills.len() > MAX_SKILLS {
        return Err(AppError::Validation(format!(
            "At most {} skills are allowed",
            MAX_SKILLS
        )));
    }
    if skills
        .iter()
        .any(|s| s.trim().is_empty() || s.chars().count() > 50)
    {
        return Err(AppError::Validation(
            "Each skill must be 1 to 50 characters".to_string(),
        ));
    }
    Ok(())
}

/// GET /api/user/me
pub async fn me(pool: web::Data<PgPool>, auth: AuthUser) -> Result<HttpResponse, AppError> {
    let user = user_repo::find_by_id(&pool, auth.id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    Ok(response::ok("Profile fetched", user))
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    #[validate(length(min = 2, max = 100, message = "Name must be 2 to 100 characters"))]
    pub name: Option<String>,

    #[validate(email(message = "Invalid email address"))]
    pub email: Option<String>,

    pub phone: Option<String>,

    #[validate(url(message = "Photo must be a valid URL"))]
    pub photo: Option<String>,

    #[validate(length(max = 500, message = "Bio must be at most 500 characters"))]
    pub bio: Option<String>,

    pub skills: Option<Vec<String>>,

    pub is_public: Option<bool>,
}

/// PUT /api/user/me
pub async fn update_me(
    pool: web::Data<PgPool>,
    auth: AuthUser,
    body: web::Json<UpdateProfileRequest>,
) -> Result<HttpResponse, AppError> {
    body.validate()?;

    if let Some(skills) = &body.skills {
        validate_skills(skills)?;
    }

    if let Some(email) = &body.email {
        if user_repo::email_taken(&pool, email, Some(auth.id)).await? {
            return Err(AppError::Conflict("Email is already registered".to_string()));
        }
    }

    let update = ProfileUpdate {
        name: body.name.as_ref().map(|n| n.trim().to_string()),
        email: body.email.clone(),
        phone: body.phone.clone(),
        photo: body.photo.clone(),
        bio: body.bio.clone(),
        skills: body
            .skills
            .as_ref()
            .map(|s| s.iter().map(|x| x.trim().to_string()).collect()),
        is_public: body.is_public,
    };

    let user = user_repo::update_profile(&pool, auth.id, &update)
        .await
        .map_err(|e| {
            if db::is_unique_violation(&e) {
                AppError::Conflict("Email is already registered".to_string())
            } else {
                AppError::Database(e)
            }
        })?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    info!(user_id = %auth.id, "profile updated");

    Ok(response::ok("Profile updated", user))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchQuery {
    pub skills: Option<String>,
    pub name: Option<String>,
    pub min_xp: Option<i32>,
    pub max_xp: Option<i32>,
    pub badge: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

/// GET /api/user/search
pub async fn search(
    pool: web::Data<PgPool>,
    auth: AuthUser,
    query: web::Query<SearchQuery>,
) -> Result<HttpResponse, AppError> {
    let sort_by = match query.sort_by.as_deref() {
        None => UserSortBy::Xp,
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

    let skills = query
        .skills
        .as_deref()
        .map(|s| {
            s.split(',')
                .map(|x| x.trim().to_string())
                .filter(|x| !x.is_empty())
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();

    let search = UserSearch {
        skills,
        name: query.name.clone(),
        min_xp: query.min_xp,
        max_xp: query.max_xp,
        badge: query.badge.clone(),
        sort_by,
        sort_order,
        page: clamp_page(query.page),
        limit: clamp_limit(query.limit, 12, 50),
    };

    let (users, total) = user_repo::search_users(&pool, auth.id, &search).await?;
    let profiles: Vec<_> = users.iter().map(|u| u.public_profile()).collect();

    Ok(response::ok(
        "Users fetched",
        json!({
            "users": profiles,
            "pagination": Pagination::new(search.page, search.limit, total),
        }),
    ))
}

#[derive(Debug, Deserialize)]
pub struct SuggestionsQuery {
    pub query: Option<String>,
}

/// GET /api/user/skills/suggestions
pub async fn skill_suggestions(
    pool: web::Data<PgPool>,
    _auth: AuthUser,
    query: web::Query<SuggestionsQuery>,
) -> Result<HttpResponse, AppError> {
    let term = query.query.as_deref().unwrap_or("").trim().to_string();
    if term.len() < 2 {
        return Err(AppError::Validation(
            "Query must be at least 2 characters".to_string(),
        ));
    }

    let suggestions = user_repo::skill_suggestions(&pool, &term, 10).await?;

    Ok(response::ok("Skill suggestions fetched", suggestions))
}

/// GET /api/user/stats
pub async fn stats(pool: web::Data<PgPool>, auth: AuthUser) -> Result<HttpResponse, AppError> {
    let user = user_repo::find_by_id(&pool, auth.id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    let counts = request_repo::user_request_counts(&pool, auth.id).await?;

    let success_rate = if counts.total_sent > 0 {
        ((counts.accepted_sent as f64 / counts.total_sent as f64) * 100.0).round() as i64
    } else {
        0
    };

    Ok(response::ok(
        "Stats fetched",
        json!({
            "xp": user.xp,
            "level": level_for_xp(user.xp),
            "badge": badge_for_xp(user.xp),
            "collaborations": counts.accepted_sent + counts.accepted_received,
            "requestsSent": counts.total_sent,
            "requestsReceived": counts.total_received,
            "skillsCount": user.skills.len(),
            "joinedAt": user.created_at,
            "successRate": success_rate,
        }),
    ))
}

/// GET /api/user/{userId}
pub async fn get_user(
    pool: web::Data<PgPool>,
    auth: AuthUser,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let user_id = parse_user_id(&path.into_inner())?;

    let user = user_repo::find_by_id(&pool, user_id)
        .await?
        .filter(|u| !u.is_blocked)
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    if !user.is_public && user.id != auth.id {
        return Err(AppError::Authorization("This profile is private".to_string()));
    }

    Ok(response::ok("User fetched", user.public_profile()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skill_length_counts_characters_not_bytes() {
        // 50 two-byte characters is a valid skill
        let wide = "é".repeat(50);
        assert!(validate_skills(&[wide]).is_ok());

        let too_long = "é".repeat(51);
        assert!(validate_skills(&[too_long]).is_err());
    }

    #[test]
    fn skill_list_bounds() {
        assert!(validate_skills(&[]).is_ok());
        assert!(validate_skills(&["   ".to_string()]).is_err());

        let many: Vec<String> = (0..=MAX_SKILLS).map(|i| format!("skill-{}", i)).collect();
        assert!(validate_skills(&many).is_err());
    }
}
