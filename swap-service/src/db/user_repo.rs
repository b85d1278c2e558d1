/// User repository - handles all database operations for users
use crate::models::User;
use sqlx::{PgPool, Postgres, QueryBuilder, Row};
use uuid::Uuid;

const USER_COLUMNS: &str = "id, name, email, phone, password_hash, photo, bio, skills, \
     is_public, is_blocked, xp, badge, role, created_at, updated_at";

/// Create a new user in the database
pub async fn create_user(
    pool: &PgPool,
    name: &str,
    email: &str,
    phone: &str,
    password_hash: &str,
) -> Result<User, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!(
        r#"
        INSERT INTO users (name, email, phone, password_hash)
        VALUES ($1, $2, $3, $4)
        RETURNING {USER_COLUMNS}
        "#
    ))
    .bind(name)
    .bind(email.to_lowercase())
    .bind(phone)
    .bind(password_hash)
    .fetch_one(pool)
    .await
}

/// Find a user by email
pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!(
        r#"
        SELECT {USER_COLUMNS}
        FROM users
        WHERE email = $1
        "#
    ))
    .bind(email.to_lowercase())
    .fetch_optional(pool)
    .await
}

/// Find a user by ID
pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!(
        r#"
        SELECT {USER_COLUMNS}
        FROM users
        WHERE id = $1
        "#
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
}

/// Check if email is already taken by someone other than `exclude`.
pub async fn email_taken(
    pool: &PgPool,
    email: &str,
    exclude: Option<Uuid>,
) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar::<_, bool>(
        r#"
        SELECT EXISTS(SELECT 1 FROM users WHERE email = $1 AND ($2::uuid IS NULL OR id <> $2))
        "#,
    )
    .bind(email.to_lowercase())
    .bind(exclude)
    .fetch_one(pool)
    .await
}

/// Fields a user may change on their own profile. `None` leaves the
/// stored value untouched.
#[derive(Debug, Default)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub photo: Option<String>,
    pub bio: Option<String>,
    pub skills: Option<Vec<String>>,
    pub is_public: Option<bool>,
}

/// Apply a partial profile update
pub async fn update_profile(
    pool: &PgPool,
    user_id: Uuid,
    update: &ProfileUpdate,
) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!(
        r#"
        UPDATE users
        SET name = COALESCE($2, name),
            email = COALESCE($3, email),
            phone = COALESCE($4, phone),
            photo = COALESCE($5, photo),
            bio = COALESCE($6, bio),
            skills = COALESCE($7, skills),
            is_public = COALESCE($8, is_public),
            updated_at = NOW()
        WHERE id = $1
        RETURNING {USER_COLUMNS}
        "#
    ))
    .bind(user_id)
    .bind(update.name.as_deref())
    .bind(update.email.as_deref().map(|e| e.to_lowercase()))
    .bind(update.phone.as_deref())
    .bind(update.photo.as_deref())
    .bind(update.bio.as_deref())
    .bind(update.skills.as_deref())
    .bind(update.is_public)
    .fetch_optional(pool)
    .await
}

/// Sort keys accepted by the user search and admin listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserSortBy {
    Name,
    Xp,
    CreatedAt,
    UpdatedAt,
}

impl UserSortBy {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "name" => Some(Self::Name),
            "xp" => Some(Self::Xp),
            "created_at" => Some(Self::CreatedAt),
            "updated_at" => Some(Self::UpdatedAt),
            _ => None,
        }
    }

    fn column(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Xp => "xp",
            Self::CreatedAt => "created_at",
            Self::UpdatedAt => "updated_at",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "asc" => Some(Self::Asc),
            "desc" => Some(Self::Desc),
            _ => None,
        }
    }

    fn keyword(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

#[derive(Debug)]
pub struct UserSearch {
    pub skills: Vec<String>,
    pub name: Option<String>,
    pub min_xp: Option<i32>,
    pub max_xp: Option<i32>,
    pub badge: Option<String>,
    pub sort_by: UserSortBy,
    pub sort_order: SortOrder,
    pub page: i64,
    pub limit: i64,
}

impl Default for UserSearch {
    fn default() -> Self {
        UserSearch {
            skills: Vec::new(),
            name: None,
            min_xp: None,
            max_xp: None,
            badge: None,
            sort_by: UserSortBy::Xp,
            sort_order: SortOrder::Desc,
            page: 1,
            limit: 12,
        }
    }
}

/// Search public, non-blocked profiles, excluding the caller.
/// Returns the page of users plus the total match count.
pub async fn search_users(
    pool: &PgPool,
    viewer: Uuid,
    search: &UserSearch,
) -> Result<(Vec<User>, i64), sqlx::Error> {
    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(format!(
        "SELECT {USER_COLUMNS}, COUNT(*) OVER() AS total FROM users \
         WHERE is_public = TRUE AND is_blocked = FALSE AND id <> "
    ));
    builder.push_bind(viewer);

    if !search.skills.is_empty() {
        builder.push(" AND skills && ");
        builder.push_bind(&search.skills);
    }

    if let Some(name) = search.name.as_deref().filter(|n| !n.is_empty()) {
        builder.push(" AND name ILIKE ");
        builder.push_bind(format!("%{}%", name));
    }

    if let Some(min_xp) = search.min_xp {
        builder.push(" AND xp >= ");
        builder.push_bind(min_xp);
    }

    if let Some(max_xp) = search.max_xp {
        builder.push(" AND xp <= ");
        builder.push_bind(max_xp);
    }

    if let Some(badge) = search.badge.as_deref().filter(|b| !b.is_empty()) {
        builder.push(" AND badge = ");
        builder.push_bind(badge);
    }

    builder.push(format!(
        " ORDER BY {} {} LIMIT ",
        search.sort_by.column(),
        search.sort_order.keyword()
    ));
    builder.push_bind(search.limit);
    builder.push(" OFFSET ");
    builder.push_bind((search.page - 1) * search.limit);

    let rows = builder.build().fetch_all(pool).await?;

    let total = rows
        .first()
        .map(|row| row.get::<i64, _>("total"))
        .unwrap_or(0);
    let users = rows
        .iter()
        .map(sqlx::FromRow::from_row)
        .collect::<Result<Vec<User>, _>>()?;

    Ok((users, total))
}

#[derive(Debug, sqlx::FromRow, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillSuggestion {
    pub skill: String,
    pub count: i64,
}

/// Distinct skills of unblocked users matching a query, most common
/// first. Feeds the autocomplete endpoint.
pub async fn skill_suggestions(
    pool: &PgPool,
    query: &str,
    limit: i64,
) -> Result<Vec<SkillSuggestion>, sqlx::Error> {
    sqlx::query_as::<_, SkillSuggestion>(
        r#"
        SELECT skill, COUNT(*) AS count
        FROM users, unnest(skills) AS skill
        WHERE is_blocked = FALSE AND skill ILIKE $1
        GROUP BY skill
        ORDER BY count DESC, skill
        LIMIT $2
        "#,
    )
    .bind(format!("%{}%", query))
    .bind(limit)
    .fetch_all(pool)
    .await
}

/// Admin: set or clear the blocked flag
pub async fn set_blocked(
    pool: &PgPool,
    user_id: Uuid,
    blocked: bool,
) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!(
        r#"
        UPDATE users
        SET is_blocked = $2, updated_at = NOW()
        WHERE id = $1
        RETURNING {USER_COLUMNS}
        "#
    ))
    .bind(user_id)
    .bind(blocked)
    .fetch_optional(pool)
    .await
}

/// Admin: permanently delete a user; dependent rows cascade.
pub async fn delete_user(pool: &PgPool, user_id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Blocked-state filter for the admin user listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserStatusFilter {
    All,
    Active,
    Blocked,
}

impl UserStatusFilter {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "all" => Some(Self::All),
            "active" => Some(Self::Active),
            "blocked" => Some(Self::Blocked),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub struct AdminUserQuery {
    pub search: Option<String>,
    pub status: UserStatusFilter,
    pub badge: Option<String>,
    pub sort_by: UserSortBy,
    pub sort_order: SortOrder,
    pub page: i64,
    pub limit: i64,
}

/// Admin: paginated user listing with name/email/skill search.
pub async fn list_users(
    pool: &PgPool,
    query: &AdminUserQuery,
) -> Result<(Vec<User>, i64), sqlx::Error> {
    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(format!(
        "SELECT {USER_COLUMNS}, COUNT(*) OVER() AS total FROM users WHERE TRUE"
    ));

    if let Some(search) = query.search.as_deref().filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", search);
        builder.push(" AND (name ILIKE ");
        builder.push_bind(pattern.clone());
        builder.push(" OR email ILIKE ");
        builder.push_bind(pattern.clone());
        builder.push(" OR EXISTS (SELECT 1 FROM unnest(skills) s WHERE s ILIKE ");
        builder.push_bind(pattern);
        builder.push("))");
    }

    match query.status {
        UserStatusFilter::All => {}
        UserStatusFilter::Active => {
            builder.push(" AND is_blocked = FALSE");
        }
        UserStatusFilter::Blocked => {
            builder.push(" AND is_blocked = TRUE");
        }
    }

    if let Some(badge) = query.badge.as_deref().filter(|b| !b.is_empty()) {
        builder.push(" AND badge = ");
        builder.push_bind(badge);
    }

    builder.push(format!(
        " ORDER BY {} {} LIMIT ",
        query.sort_by.column(),
        query.sort_order.keyword()
    ));
    builder.push_bind(query.limit);
    builder.push(" OFFSET ");
    builder.push_bind((query.page - 1) * query.limit);

    let rows = builder.build().fetch_all(pool).await?;

    let total = rows
        .first()
        .map(|row| row.get::<i64, _>("total"))
        .unwrap_or(0);
    let users = rows
        .iter()
        .map(sqlx::FromRow::from_row)
        .collect::<Result<Vec<User>, _>>()?;

    Ok((users, total))
}

#[derive(Debug, sqlx::FromRow, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserCounts {
    pub total: i64,
    pub active: i64,
    pub blocked: i64,
    pub public: i64,
    pub new_last_30_days: i64,
}

/// Aggregate user counts in one pass.
pub async fn user_counts(pool: &PgPool) -> Result<UserCounts, sqlx::Error> {
    sqlx::query_as::<_, UserCounts>(
        r#"
        SELECT COUNT(*) AS total,
               COUNT(*) FILTER (WHERE NOT is_blocked) AS active,
               COUNT(*) FILTER (WHERE is_blocked) AS blocked,
               COUNT(*) FILTER (WHERE is_public AND NOT is_blocked) AS public,
               COUNT(*) FILTER (WHERE created_at > NOW() - INTERVAL '30 days') AS new_last_30_days
        FROM users
        "#,
    )
    .fetch_one(pool)
    .await
}

#[derive(Debug, sqlx::FromRow, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BadgeCount {
    pub badge: String,
    pub count: i64,
}

pub async fn badge_distribution(pool: &PgPool) -> Result<Vec<BadgeCount>, sqlx::Error> {
    sqlx::query_as::<_, BadgeCount>(
        r#"
        SELECT badge, COUNT(*) AS count
        FROM users
        GROUP BY badge
        ORDER BY count DESC
        "#,
    )
    .fetch_all(pool)
    .await
}

#[derive(Debug, sqlx::FromRow, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillCount {
    pub skill: String,
    pub count: i64,
}

/// Most common skills across all profiles, for the admin dashboard.
pub async fn top_skills(pool: &PgPool, limit: i64) -> Result<Vec<SkillCount>, sqlx::Error> {
    sqlx::query_as::<_, SkillCount>(
        r#"
        SELECT skill, COUNT(*) AS count
        FROM users, unnest(skills) AS skill
        GROUP BY skill
        ORDER BY count DESC, skill
        LIMIT $1
        "#,
    )
    .bind(limit)
    .fetch_all(pool)
    .await
}

#[derive(Debug, sqlx::FromRow, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailySignups {
    pub day: chrono::NaiveDate,
    pub count: i64,
}

/// Signups per day over the trailing week.
pub async fn signup_growth(pool: &PgPool) -> Result<Vec<DailySignups>, sqlx::Error> {
    sqlx::query_as::<_, DailySignups>(
        r#"
        SELECT created_at::date AS day, COUNT(*) AS count
        FROM users
        WHERE created_at > NOW() - INTERVAL '7 days'
        GROUP BY day
        ORDER BY day
        "#,
    )
    .fetch_all(pool)
    .await
}
