use serde::{Deserialize, Serialize};
use sqlx::postgres::PgRow;
use sqlx::Row;
use time::OffsetDateTime;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub username: Option<String>,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub profile_image_url: Option<String>,
    pub bio: Option<String>,
    pub website: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Column list for a bare `users u` row.
pub(crate) const USER_COLUMNS: &str = "u.id, u.username, u.email, u.first_name, u.last_name, \
     u.profile_image_url, u.bio, u.website, u.created_at, u.updated_at";

impl User {
    pub(crate) fn from_row(row: &PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            username: row.try_get("username")?,
            email: row.try_get("email")?,
            first_name: row.try_get("first_name")?,
            last_name: row.try_get("last_name")?,
            profile_image_url: row.try_get("profile_image_url")?,
            bio: row.try_get("bio")?,
            website: row.try_get("website")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    /// Reads a user whose columns were aliased with a common prefix
    /// (`author_id`, `author_username`, ...) inside a wider row.
    pub(crate) fn from_prefixed_row(row: &PgRow, prefix: &str) -> Result<Self, sqlx::Error> {
        let col = |name: &str| format!("{}{}", prefix, name);
        Ok(Self {
            id: row.try_get(col("id").as_str())?,
            username: row.try_get(col("username").as_str())?,
            email: row.try_get(col("email").as_str())?,
            first_name: row.try_get(col("first_name").as_str())?,
            last_name: row.try_get(col("last_name").as_str())?,
            profile_image_url: row.try_get(col("profile_image_url").as_str())?,
            bio: row.try_get(col("bio").as_str())?,
            website: row.try_get(col("website").as_str())?,
            created_at: row.try_get(col("created_at").as_str())?,
            updated_at: row.try_get(col("updated_at").as_str())?,
        })
    }
}

/// Identity fields written on every login callback.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpsertUser {
    pub id: String,
    pub username: Option<String>,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub profile_image_url: Option<String>,
}

/// Profile page payload: the user plus viewer-relative follow state and counts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(flatten)]
    pub user: User,
    pub is_following: bool,
    pub posts_count: i64,
    pub followers_count: i64,
    pub following_count: i64,
}

/// A user listed in explore suggestions or search results.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    #[serde(flatten)]
    pub user: User,
    pub followers_count: i64,
    pub is_following: bool,
}
