use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

pub const REQUEST_PENDING: &str = "pending";
pub const REQUEST_ACCEPTED: &str = "accepted";
pub const REQUEST_REJECTED: &str = "rejected";

pub const REPORT_PENDING: &str = "pending";
pub const REPORT_REVIEWED: &str = "reviewed";

pub const ROLE_USER: &str = "user";
pub const ROLE_ADMIN: &str = "admin";

/// Accepted values for `reports.reason`; mirrored by a CHECK constraint.
pub const REPORT_REASONS: [&str; 6] = [
    "Inappropriate behavior",
    "Harassment or bullying",
    "Spam or fake profile",
    "Inappropriate content",
    "Scam or fraud",
    "Other",
];

/// XP granted to each party when a collaboration request is accepted.
pub const XP_COLLABORATION_ACCEPTED: i32 = 50;

/// Badge names in ascending XP order.
pub const BADGES: [&str; 5] = ["Newcomer", "Contributor", "Collaborator", "Mentor", "Expert"];

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub photo: Option<String>,
    pub bio: String,
    pub skills: Vec<String>,
    pub is_public: bool,
    pub is_blocked: bool,
    pub xp: i32,
    pub badge: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Profile shape exposed to other users: no email or phone, no
/// moderation state, level fields computed from XP.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicProfile {
    pub id: Uuid,
    pub name: String,
    pub photo: Option<String>,
    pub bio: String,
    pub skills: Vec<String>,
    pub xp: i32,
    pub level: i32,
    pub next_level_xp: i32,
    pub progress_to_next_level: i32,
    pub badge: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct CollaborationRequest {
    pub id: Uuid,
    pub from_user: Uuid,
    pub to_user: Uuid,
    pub message: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: Uuid,
    pub from_user: Uuid,
    pub to_user: Uuid,
    pub body: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Report {
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
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct XpAward {
    pub id: Uuid,
    pub request_id: Option<Uuid>,
    pub user_id: Uuid,
    pub amount: i32,
    pub awarded_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Badge tiers by accumulated XP. Stored on the user and recomputed
/// whenever XP changes.
pub fn badge_for_xp(xp: i32) -> &'static str {
    match xp {
        x if x < 100 => "Newcomer",
        x if x < 300 => "Contributor",
        x if x < 600 => "Collaborator",
        x if x < 1000 => "Mentor",
        _ => "Expert",
    }
}

/// Level grows by one for every 100 XP, starting at 1. Computed, never
/// stored.
pub fn level_for_xp(xp: i32) -> i32 {
    xp / 100 + 1
}

pub fn next_level_xp(xp: i32) -> i32 {
    level_for_xp(xp) * 100
}

pub fn progress_to_next_level(xp: i32) -> i32 {
    xp % 100
}

pub fn is_valid_report_reason(reason: &str) -> bool {
    REPORT_REASONS.contains(&reason)
}

impl User {
    pub fn public_profile(&self) -> PublicProfile {
        PublicProfile {
            id: self.id,
            name: self.name.clone(),
            photo: self.photo.clone(),
            bio: self.bio.clone(),
            skills: self.skills.clone(),
            xp: self.xp,
            level: level_for_xp(self.xp),
            next_level_xp: next_level_xp(self.xp),
            progress_to_next_level: progress_to_next_level(self.xp),
            badge: self.badge.clone(),
            created_at: self.created_at,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == ROLE_ADMIN
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn badge_thresholds() {
        assert_eq!(badge_for_xp(0), "Newcomer");
        assert_eq!(badge_for_xp(99), "Newcomer");
        assert_eq!(badge_for_xp(100), "Contributor");
        assert_eq!(badge_for_xp(299), "Contributor");
        assert_eq!(badge_for_xp(300), "Collaborator");
        assert_eq!(badge_for_xp(599), "Collaborator");
        assert_eq!(badge_for_xp(600), "Mentor");
        assert_eq!(badge_for_xp(999), "Mentor");
        assert_eq!(badge_for_xp(1000), "Expert");
        assert_eq!(badge_for_xp(5000), "Expert");
    }

    #[test]
    fn level_per_hundred_xp() {
        assert_eq!(level_for_xp(0), 1);
        assert_eq!(level_for_xp(99), 1);
        assert_eq!(level_for_xp(100), 2);
        assert_eq!(level_for_xp(250), 3);
        assert_eq!(next_level_xp(250), 300);
        assert_eq!(progress_to_next_level(250), 50);
    }

    #[test]
    fn report_reasons_are_recognized() {
        for reason in [
            "Inappropriate behavior",
            "Harassment or bullying",
            "Spam or fake profile",
            "Inappropriate content",
            "Scam or fraud",
            "Other",
        ] {
            assert!(is_valid_report_reason(reason), "rejected: {}", reason);
        }
        assert!(!is_valid_report_reason("Something else"));
        assert!(!is_valid_report_reason("Harassment"));
        assert!(!is_valid_report_reason("spam or fake profile"));
    }
}
