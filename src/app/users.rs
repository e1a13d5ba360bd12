use anyhow::Result;
use sqlx::Row;

use crate::domain::user::{UpsertUser, User, UserProfile};
use crate::infra::db::Db;

#[derive(Clone)]
pub struct UserService {
    db: Db,
}

impl UserService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn get_user(&self, user_id: &str) -> Result<Option<User>> {
        let row = sqlx::query(
            "SELECT id, username, email, first_name, last_name, profile_image_url, bio, website, \
                    created_at, updated_at \
             FROM users WHERE id = $1",
        )
        .bind(user_id)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.as_ref().map(User::from_row).transpose()?)
    }

    pub async fn get_by_username(&self, username: &str) -> Result<Option<User>> {
        let row = sqlx::query(
            "SELECT id, username, email, first_name, last_name, profile_image_url, bio, website, \
                    created_at, updated_at \
             FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.as_ref().map(User::from_row).transpose()?)
    }

    /// Profile with the viewer's follow state and post/follower/following counts.
    pub async fn get_profile(&self, username: &str, viewer_id: &str) -> Result<Option<UserProfile>> {
        let row = sqlx::query(
            "SELECT u.id, u.username, u.email, u.first_name, u.last_name, u.profile_image_url, \
                    u.bio, u.website, u.created_at, u.updated_at, \
                    EXISTS ( \
                        SELECT 1 FROM follows WHERE follower_id = $2 AND following_id = u.id \
                    ) AS is_following, \
                    (SELECT COUNT(*) FROM posts WHERE user_id = u.id) AS posts_count, \
                    (SELECT COUNT(*) FROM follows WHERE following_id = u.id) AS followers_count, \
                    (SELECT COUNT(*) FROM follows WHERE follower_id = u.id) AS following_count \
             FROM users u \
             WHERE u.username = $1",
        )
        .bind(username)
        .bind(viewer_id)
        .fetch_optional(self.db.pool())
        .await?;

        let profile = match row {
            Some(row) => Some(UserProfile {
                user: User::from_row(&row)?,
                is_following: row.try_get("is_following")?,
                posts_count: row.try_get("posts_count")?,
                followers_count: row.try_get("followers_count")?,
                following_count: row.try_get("following_count")?,
            }),
            None => None,
        };

        Ok(profile)
    }

    /// Inserts or refreshes the identity fields of a user. Claims missing from
    /// the incoming identity keep their stored values.
    pub async fn upsert_user(&self, user: &UpsertUser) -> Result<User> {
        let row = sqlx::query(
            "INSERT INTO users (id, username, email, first_name, last_name, profile_image_url) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             ON CONFLICT (id) DO UPDATE \
             SET username = COALESCE(EXCLUDED.username, users.username), \
                 email = COALESCE(EXCLUDED.email, users.email), \
                 first_name = COALESCE(EXCLUDED.first_name, users.first_name), \
                 last_name = COALESCE(EXCLUDED.last_name, users.last_name), \
                 profile_image_url = COALESCE(EXCLUDED.profile_image_url, users.profile_image_url), \
                 updated_at = now() \
             RETURNING id, username, email, first_name, last_name, profile_image_url, bio, website, \
                       created_at, updated_at",
        )
        .bind(&user.id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.profile_image_url)
        .fetch_one(self.db.pool())
        .await?;

        Ok(User::from_row(&row)?)
    }
}
