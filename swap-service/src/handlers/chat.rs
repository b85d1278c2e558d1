use actix_web::{web, HttpResponse};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::db::{chat_repo, request_repo, user_repo};
use crate::error::AppError;
use crate::middleware::jwt_auth::AuthUser;
use crate::models::User;
use crate::response::{self, clamp_limit, clamp_page, Pagination};

const MAX_MESSAGE_LEN: usize = 1000;

fn parse_user_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| AppError::Validation("Invalid user id".to_string()))
}

/// Shared guards for every conversation endpoint: no self-chat, the
/// partner must exist and not be blocked, and the pair must share an
/// accepted collaboration.
async fn authorize_conversation(
    pool: &PgPool,
    caller: Uuid,
    partner_id: Uuid,
) -> Result<User, AppError> {
    if partner_id == caller {
        return Err(AppError::Validation(
            "You cannot chat with yourself".to_string(),
        ));
    }

    let partner = user_repo::find_by_id(pool, partner_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    if partner.is_blocked {
        return Err(AppError::Authorization("This user is blocked".to_string()));
    }

    if !request_repo::accepted_exists(pool, caller, partner_id).await? {
        return Err(AppError::Authorization(
            "You can only chat with users you are collaborating with".to_string(),
        ));
    }

    Ok(partner)
}

#[derive(Debug, Deserialize)]
pub struct SendMessageBody {
    pub message: String,
}

/// POST /api/chat/{userId}
pub async fn send(
    pool: web::Data<PgPool>,
    auth: AuthUser,
    path: web::Path<String>,
    body: web::Json<SendMessageBody>,
) -> Result<HttpResponse, AppError> {
    let partner_id = parse_user_id(&path.into_inner())?;

    let text = body.message.trim();
    if text.is_empty() {
        return Err(AppError::Validation("Message cannot be empty".to_string()));
    }
    if text.chars().count() > MAX_MESSAGE_LEN {
        return Err(AppError::Validation(format!(
            "Message must be at most {} characters",
            MAX_MESSAGE_LEN
        )));
    }

    let partner = authorize_conversation(&pool, auth.id, partner_id).await?;

    let sender = user_repo::find_by_id(&pool, auth.id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    let message = chat_repo::insert_message(&pool, auth.id, partner_id, text).await?;

    info!(message_id = %message.id, from = %auth.id, to = %partner_id, "message sent");

    Ok(response::created(
        "Message sent",
        json!({
            "message": message,
            "sender": { "id": sender.id, "name": sender.name, "photo": sender.photo },
            "recipient": { "id": partner.id, "name": partner.name, "photo": partner.photo },
        }),
    ))
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub before: Option<DateTime<Utc>>,
}

/// GET /api/chat/{userId}
pub async fn history(
    pool: web::Data<PgPool>,
    auth: AuthUser,
    path: web::Path<String>,
    query: web::Query<HistoryQuery>,
) -> Result<HttpResponse, AppError> {
    let partner_id = parse_user_id(&path.into_inner())?;
    let partner = authorize_conversation(&pool, auth.id, partner_id).await?;

    let page = clamp_page(query.page);
    let limit = clamp_limit(query.limit, 50, 100);

    let (mut messages, total) =
        chat_repo::history(&pool, auth.id, partner_id, query.before, page, limit).await?;

    // Query sorts newest-first for paging; display wants oldest-first.
    messages.reverse();

    let payload: Vec<_> = messages
        .iter()
        .map(|m| {
            json!({
                "id": m.id,
                "fromUser": m.from_user,
                "toUser": m.to_user,
                "body": m.body,
                "read": m.read,
                "createdAt": m.created_at,
                "isMe": m.from_user == auth.id,
            })
        })
        .collect();

    Ok(response::ok(
        "Messages fetched",
        json!({
            "partner": { "id": partner.id, "name": partner.name, "photo": partner.photo },
            "messages": payload,
            "pagination": Pagination::new(page, limit, total),
        }),
    ))
}

/// POST /api/chat/{userId}/read
pub async fn mark_read(
    pool: web::Data<PgPool>,
    auth: AuthUser,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let partner_id = parse_user_id(&path.into_inner())?;
    authorize_conversation(&pool, auth.id, partner_id).await?;

    let updated = chat_repo::mark_read(&pool, auth.id, partner_id).await?;

    Ok(response::ok(
        "Messages marked as read",
        json!({ "updated": updated }),
    ))
}

#[derive(Debug, Deserialize)]
pub struct ChatListQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

/// GET /api/chat
pub async fn chat_list(
    pool: web::Data<PgPool>,
    auth: AuthUser,
    query: web::Query<ChatListQuery>,
) -> Result<HttpResponse, AppError> {
    let page = clamp_page(query.page);
    let limit = clamp_limit(query.limit, 20, 50);

    let (partners, total) = chat_repo::chat_list(&pool, auth.id, page, limit).await?;

    Ok(response::ok(
        "Chats fetched",
        json!({
            "chats": partners,
            "pagination": Pagination::new(page, limit, total),
        }),
    ))
}
