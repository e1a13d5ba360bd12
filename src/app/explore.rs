use anyhow::Result;
use sqlx::Row;

use crate::domain::hashtag::{HashtagTrending, TRENDING_HASHTAGS};
use crate::domain::user::{User, UserSummary};
use crate::infra::db::Db;

const SUGGESTED_USERS_LIMIT: i64 = 10;

#[derive(Clone)]
pub struct ExploreService {
    db: Db,
}

impl ExploreService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub fn trending_hashtags(&self) -> Vec<HashtagTrending> {
        TRENDING_HASHTAGS.to_vec()
    }

    /// Accounts the user does not follow yet, excluding the user.
    pub async fn suggested_users(&self, user_id: &str) -> Result<Vec<UserSummary>> {
        let rows = sqlx::query(
            "SELECT u.id, u.username, u.email, u.first_name, u.last_name, u.profile_image_url, \
                    u.bio, u.website, u.created_at, u.updated_at, \
                    (SELECT COUNT(*) FROM follows WHERE following_id = u.id) AS followers_count \
             FROM users u \
             WHERE u.id <> $1 \
               AND NOT EXISTS ( \
                   SELECT 1 FROM follows WHERE follower_id = $1 AND following_id = u.id \
               ) \
             ORDER BY u.created_at DESC, u.id \
             LIMIT $2",
        )
        .bind(user_id)
        .bind(SUGGESTED_USERS_LIMIT)
        .fetch_all(self.db.pool())
        .await?;

        let mut users = Vec::with_capacity(rows.len());
        for row in &rows {
            users.push(UserSummary {
                user: User::from_row(row)?,
                followers_count: row.try_get("followers_count")?,
                is_following: false,
            });
        }

        Ok(users)
    }
}
