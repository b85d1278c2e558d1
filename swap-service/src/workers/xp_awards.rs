//! XP award worker.
//!
//! Awards are enqueued in the transaction that accepts a collaboration
//! request and applied here. The accept handler drains its own awards
//! inline on the happy path; this worker retries anything left behind
//! by a crash or a transient failure.

use crate::models::badge_for_xp;
use sqlx::PgPool;
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

const POLL_INTERVAL: Duration = Duration::from_secs(30);
const BATCH_SIZE: i64 = 100;

/// Apply a single award. The claim is a compare-and-set on
/// `awarded_at IS NULL`, so concurrent appliers cannot double-credit.
/// Returns false when the award was already applied.
pub async fn apply_award(pool: &PgPool, award_id: Uuid) -> Result<bool, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let claimed = sqlx::query_as::<_, (Uuid, i32)>(
        r#"
        UPDATE xp_awards
        SET awarded_at = NOW()
        WHERE id = $1 AND awarded_at IS NULL
        RETURNING user_id, amount
        "#,
    )
    .bind(award_id)
    .fetch_optional(&mut *tx)
    .await?;

    let Some((user_id, amount)) = claimed else {
        tx.rollback().await?;
        return Ok(false);
    };

    let new_xp = sqlx::query_scalar::<_, i32>(
        r#"
        UPDATE users
        SET xp = xp + $2, updated_at = NOW()
        WHERE id = $1
        RETURNING xp
        "#,
    )
    .bind(user_id)
    .bind(amount)
    .fetch_optional(&mut *tx)
    .await?;

    // User may have been deleted; still consume the award.
    if let Some(new_xp) = new_xp {
        sqlx::query(
            r#"
            UPDATE users
            SET badge = $2
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .bind(badge_for_xp(new_xp))
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(true)
}

/// Drain the awards enqueued for one request. Called inline right after
/// an accept commits so XP lands without waiting for the poll loop.
pub async fn apply_for_request(pool: &PgPool, request_id: Uuid) -> Result<(), sqlx::Error> {
    let ids = sqlx::query_scalar::<_, Uuid>(
        r#"
        SELECT id FROM xp_awards
        WHERE request_id = $1 AND awarded_at IS NULL
        "#,
    )
    .bind(request_id)
    .fetch_all(pool)
    .await?;

    for id in ids {
        apply_award(pool, id).await?;
    }

    Ok(())
}

async fn drain_pending(pool: &PgPool) -> Result<usize, sqlx::Error> {
    let ids = sqlx::query_scalar::<_, Uuid>(
        r#"
        SELECT id FROM xp_awards
        WHERE awarded_at IS NULL
        ORDER BY created_at
        LIMIT $1
        "#,
    )
    .bind(BATCH_SIZE)
    .fetch_all(pool)
    .await?;

    let mut applied = 0;
    for id in ids {
        if apply_award(pool, id).await? {
            applied += 1;
        }
    }
    Ok(applied)
}

/// Spawn the background retry loop. Runs for the lifetime of the
/// service; errors are logged and the next tick retries.
pub fn spawn(pool: PgPool) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(POLL_INTERVAL);
        loop {
            interval.tick().await;
            match drain_pending(&pool).await {
                Ok(0) => {}
                Ok(n) => debug!(applied = n, "applied pending XP awards"),
                Err(e) => warn!(error = %e, "XP award drain failed"),
            }
        }
    });
}
