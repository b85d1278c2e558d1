use actix_web::{web, HttpResponse};
use serde_json::json;
use sqlx::PgPool;

/// GET /api/health
pub async fn health(pool: web::Data<PgPool>) -> HttpResponse {
    let db_ok = sqlx::query_scalar::<_, i32>("SELECT 1")
        .fetch_one(pool.get_ref())
        .await
        .is_ok();

    let status = if db_ok { "ok" } else { "degraded" };
    let body = json!({
        "status": status,
        "database": if db_ok { "up" } else { "down" },
        "timestamp": chrono::Utc::now(),
    });

    if db_ok {
        HttpResponse::Ok().json(body)
    } else {
        HttpResponse::ServiceUnavailable().json(body)
    }
}
