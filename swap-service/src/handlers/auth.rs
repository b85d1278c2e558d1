use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use sqlx::PgPool;
use tracing::info;
use validator::Validate;

use crate::config::Config;
use crate::db::{self, user_repo};
use crate::error::AppError;
use crate::response;
use crate::security::{jwt, password};

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    #[validate(length(min = 2, max = 100, message = "Name must be 2 to 100 characters"))]
    pub name: String,

    #[validate(email(message = "Invalid email address"))]
    pub email: String,

    pub phone: String,

    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

fn validate_phone(phone: &str) -> Result<(), AppError> {
    let digits = phone.chars().filter(|c| c.is_ascii_digit()).count();
    let allowed = phone
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | '(' | ')' | ' '));

    if !(7..=15).contains(&digits) || !allowed {
        return Err(AppError::Validation("Invalid phone number".to_string()));
    }
    Ok(())
}

/// POST /api/auth/signup
pub async fn signup(
    pool: web::Data<PgPool>,
    config: web::Data<Config>,
    body: web::Json<SignupRequest>,
) -> Result<HttpResponse, AppError> {
    body.validate()?;
    validate_phone(&body.phone)?;

    if user_repo::email_taken(&pool, &body.email, None).await? {
        return Err(AppError::Conflict("Email is already registered".to_string()));
    }

    let password_hash = password::hash_password(&body.password)?;

    let user = user_repo::create_user(&pool, body.name.trim(), &body.email, &body.phone, &password_hash)
        .await
        .map_err(|e| {
            if db::is_unique_violation(&e) {
                AppError::Conflict("Email is already registered".to_string())
            } else {
                AppError::Database(e)
            }
        })?;

    let token = jwt::generate_token(user.id, &user.role, config.jwt.token_ttl)
        .map_err(|e| AppError::Internal(e.to_string()))?;

    info!(user_id = %user.id, "user signed up");

    Ok(response::created(
        "Account created successfully",
        json!({ "token": token, "user": user }),
    ))
}

/// POST /api/auth/login
pub async fn login(
    pool: web::Data<PgPool>,
    config: web::Data<Config>,
    body: web::Json<LoginRequest>,
) -> Result<HttpResponse, AppError> {
    body.validate()?;

    let user = user_repo::find_by_email(&pool, &body.email)
        .await?
        .ok_or_else(|| AppError::Authentication("Invalid email or password".to_string()))?;

    if !password::verify_password(&body.password, &user.password_hash)? {
        return Err(AppError::Authentication(
            "Invalid email or password".to_string(),
        ));
    }

    // Blocked accounts are rejected at the authentication boundary.
    if user.is_blocked {
        return Err(AppError::Authorization("Account is blocked".to_string()));
    }

    let token = jwt::generate_token(user.id, &user.role, config.jwt.token_ttl)
        .map_err(|e| AppError::Internal(e.to_string()))?;

    info!(user_id = %user.id, "user logged in");

    Ok(response::ok(
        "Logged in successfully",
        json!({ "token": token, "user": user }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phone_validation() {
        assert!(validate_phone("+1 (555) 123-4567").is_ok());
        assert!(validate_phone("5551234567").is_ok());
        assert!(validate_phone("123").is_err());
        assert!(validate_phone("not-a-phone").is_err());
        assert!(validate_phone("+12345678901234567890").is_err());
    }

    #[test]
    fn signup_body_validation() {
        let body = SignupRequest {
            name: "A".to_string(),
            email: "not-an-email".to_string(),
            phone: "5551234567".to_string(),
            password: "short".to_string(),
        };
        assert!(body.validate().is_err());

        let body = SignupRequest {
            name: "Alex".to_string(),
            email: "alex@example.com".to_string(),
            phone: "5551234567".to_string(),
            password: "secret1".to_string(),
        };
        assert!(body.validate().is_ok());
    }
}
